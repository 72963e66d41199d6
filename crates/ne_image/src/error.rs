use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("format error: {0}")]
    Format(String),
    #[error("range error: {0}")]
    Range(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
