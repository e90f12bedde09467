use thiserror::Error;

use crate::cloud::client::ApiError;

/// Errors surfaced by document handling and persistence.
#[derive(Debug, Error)]
pub enum PulsarError {
    /// Structural problems in an imported or restored document, all of them.
    #[error("invalid diagram: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("storage unavailable: {0}")]
    Storage(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl PulsarError {
    /// The individual validation messages, if this is a validation failure.
    pub fn validation_errors(&self) -> &[String] {
        match self {
            PulsarError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, PulsarError>;
