use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The provider refused the request (safety filters, blocklists).
    #[error("Blocked by provider: {0}")]
    Blocked(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AiError {
    pub fn is_blocked(&self) -> bool {
        matches!(self, AiError::Blocked(_))
    }
}

pub type Result<T> = std::result::Result<T, AiError>;
