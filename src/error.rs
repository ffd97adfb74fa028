use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not open video \"{}\": {reason}", path.display())]
    SourceOpen { path: PathBuf, reason: String },
    #[error("could not probe video: {0}")]
    Probe(String),
    #[error("decoder error: {0}")]
    Decode(String),
    #[error("could not build comparison image: {0}")]
    Proxy(String),
    #[error("could not write frame: {0}")]
    Sink(#[from] std::io::Error),
    #[error("encoder exited with {0}")]
    Encoder(String),
    #[error("{0}")]
    Usage(String),
}

impl Error {
    /// Process exit code used by the command line tool
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) => 1,
            Error::SourceOpen { .. } | Error::Probe(_) => 2,
            Error::Decode(_) | Error::Proxy(_) | Error::Sink(_) | Error::Encoder(_) => 3,
        }
    }
}
