#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Unknown outcome: {0}")]
    UnknownOutcome(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
