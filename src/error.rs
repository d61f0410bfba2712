use thiserror::Error;

#[derive(Error, Debug)]
pub enum MosaicError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Introspection error: {0}")]
    Introspection(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<sqlx::Error> for MosaicError {
    fn from(err: sqlx::Error) -> Self {
        MosaicError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MosaicError>;
