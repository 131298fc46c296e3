use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManafilesError {
    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
