//! Error types for factfind

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or unsupported schema. Aborts the conversation.
    #[error("schema error: {0}")]
    Schema(String),

    /// Invalid obfuscation or pipeline configuration. Aborts the run
    /// before any generation happens.
    #[error("config error: {0}")]
    Config(String),

    /// Evaluation inputs were generated against different schemas.
    /// Fatal for that conversation only; the batch continues.
    #[error("schema fingerprint mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
