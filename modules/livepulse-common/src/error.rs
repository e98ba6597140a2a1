use thiserror::Error;

#[derive(Error, Debug)]
pub enum LivePulseError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Rate limit signal: {0}")]
    RateLimited(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Connection attempt timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
