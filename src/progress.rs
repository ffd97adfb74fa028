use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use log::{error, info};

pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Monotonic counters shared with the reporter. Only ever read for display.
#[derive(Debug, Default)]
pub struct Counters {
    frames_read: AtomicUsize,
    frames_written: AtomicUsize,
}

impl Counters {
    pub fn frames_read(&self) -> usize {
        self.frames_read.load(Ordering::Relaxed)
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written.load(Ordering::Relaxed)
    }

    pub(crate) fn add_read(&self, n: usize) {
        self.frames_read.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_written(&self, n: usize) {
        self.frames_written.fetch_add(n, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    pub frame: usize,
    pub fps: f64,
    pub time: f64,
    pub speed: f64,
    pub total_percent: Option<f64>,
    pub runtime: f64,
}

impl Display for ProgressLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame= {}  fps= {:.2}  time= {:.2}s  speed= {:.2}x  ", self.frame, self.fps, self.time, self.speed)?;
        if let Some(total) = self.total_percent {
            write!(f, "total= {:.2}%  ", total)?;
        }
        write!(f, "runtime= {:.2}s", self.runtime)
    }
}

/// Rates are averaged with the previous report to keep the output steady
#[derive(Debug)]
pub struct ProgressStats {
    framerate: f64,
    total_frames: Option<usize>,
    start: Instant,
    last_time: Instant,
    last_index: usize,
    last_fps: f64,
    last_speed: f64,
}

impl ProgressStats {
    pub fn new(framerate: f64, total_frames: Option<usize>, start: Instant) -> Self {
        Self {
            framerate,
            total_frames,
            start,
            last_time: start,
            last_index: 0,
            last_fps: 0.0,
            last_speed: 0.0,
        }
    }

    pub fn update(&mut self, current_index: usize, now: Instant) -> ProgressLine {
        let frames = current_index.saturating_sub(self.last_index) as f64;
        let elapsed = now.saturating_duration_since(self.last_time).as_secs_f64();

        let (fps, speed) = if elapsed > 0.0 {
            (
                (frames / elapsed + self.last_fps) / 2.0,
                (frames / (elapsed * self.framerate) + self.last_speed) / 2.0,
            )
        } else {
            (self.last_fps, self.last_speed)
        };

        self.last_fps = fps;
        self.last_speed = speed;
        self.last_index = current_index;
        self.last_time = now;

        ProgressLine {
            frame: current_index,
            fps,
            time: current_index as f64 / self.framerate,
            speed,
            total_percent: self.total_frames
                .filter(|total| *total > 0)
                .map(|total| 100.0 * current_index as f64 / total as f64),
            runtime: now.saturating_duration_since(self.start).as_secs_f64(),
        }
    }
}

/// Background thread logging progress on a fixed schedule
pub struct ProgressReporter {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn start(counters: Arc<Counters>, framerate: f64, total_frames: Option<usize>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = stop.clone();
            std::thread::spawn(move || Self::report_task(&counters, &stop, framerate, total_frames, interval))
        };
        Self { stop, handle }
    }

    fn report_task(counters: &Counters, stop: &AtomicBool, framerate: f64, total_frames: Option<usize>, interval: Duration) {
        let start = Instant::now();
        let mut stats = ProgressStats::new(framerate, total_frames, start);
        let mut next_report = start + interval;
        while !stop.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now < next_report {
                std::thread::park_timeout(next_report - now);
                continue;
            }
            next_report += interval;
            info!("{}", stats.update(counters.frames_read(), now));
        }
        info!("{} frames processed in {:.2} seconds", counters.frames_read(), start.elapsed().as_secs_f64());
    }

    /// Stops the reporter and waits for its final report
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        self.handle.thread().unpark();
        if self.handle.join().is_err() {
            error!("Progress reporter panicked");
        }
    }
}
