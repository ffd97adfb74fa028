use std::collections::VecDeque;
use image::GrayImage;

/// One distinct frame standing in for one or more consecutive near identical input frames
#[derive(Debug, Clone)]
pub struct Representative<F> {
    /// Written to the output unchanged, `count` times
    pub full: F,
    /// Only used for comparing
    pub proxy: GrayImage,
    /// How often `full` will be written. Never below 1.
    pub count: usize,
    /// Dissimilarity to the previous representative at the time this one was created
    pub priority: f64,
    /// Position of the first absorbed frame in the input
    pub source_index: usize,
}

impl<F> Representative<F> {
    pub fn new(full: F, proxy: GrayImage, priority: f64, source_index: usize) -> Self {
        Self { full, proxy, count: 1, priority, source_index }
    }
}

/// Bounded FIFO of representatives, written from the head and filled at the tail
#[derive(Debug)]
pub struct Window<F> {
    entries: VecDeque<Representative<F>>,
    capacity: usize,
}

impl<F> Window<F> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn head(&self) -> Option<&Representative<F>> {
        self.entries.front()
    }

    pub fn tail(&self) -> Option<&Representative<F>> {
        self.entries.back()
    }

    pub fn tail_mut(&mut self) -> Option<&mut Representative<F>> {
        self.entries.back_mut()
    }

    pub fn get(&self, i: usize) -> Option<&Representative<F>> {
        self.entries.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Representative<F>> {
        self.entries.iter()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut VecDeque<Representative<F>> {
        &mut self.entries
    }

    /// Appends at the tail, handing the representative back if the window is full
    pub fn try_push(&mut self, representative: Representative<F>) -> Result<(), Representative<F>> {
        if self.is_full() {
            return Err(representative);
        }
        debug_assert!(
            self.tail().map_or(true, |tail| tail.source_index < representative.source_index),
            "source indices must increase towards the tail"
        );
        self.entries.push_back(representative);
        Ok(())
    }

    /// Evicts the head and admits `seed` at the tail in one step
    pub fn rotate(&mut self, seed: Representative<F>) -> Option<Representative<F>> {
        let head = self.entries.pop_front();
        debug_assert!(
            self.tail().map_or(true, |tail| tail.source_index < seed.source_index),
            "source indices must increase towards the tail"
        );
        self.entries.push_back(seed);
        head
    }

    /// Removes all representatives, head first
    pub fn drain(&mut self) -> impl Iterator<Item = Representative<F>> + '_ {
        self.entries.drain(..)
    }
}
