use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid severity '{0}', expected one of LOW, MEDIUM, HIGH")]
    InvalidSeverity(String),

    #[error("invalid categories: {0:?}")]
    InvalidCategories(Vec<String>),

    #[error("resource ID has an invalid format: {0}")]
    InvalidResourceId(String),
}
