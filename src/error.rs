//! Error types for the soil report engine.

use thiserror::Error;

/// Errors surfaced by nutrient processing, narrative generation and report export
#[derive(Debug, Error)]
pub enum SoilError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    /// An in-flight guard is already held for this operation
    #[error("{0} already in progress")]
    Busy(&'static str),

    #[error("comment service failed: {0}")]
    Remote(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Table(#[from] polars::prelude::PolarsError),
}

pub type Result<T> = std::result::Result<T, SoilError>;

impl SoilError {
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        SoilError::Parse {
            what: what.into(),
            message: message.into(),
        }
    }
}
