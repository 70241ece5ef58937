use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Line exceeded max length")]
    LineLength,
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}
