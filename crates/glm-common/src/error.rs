//! Error types for the GLM lightning TOE tile service.

use thiserror::Error;

/// Result type alias using [`GlmError`].
pub type GlmResult<T> = Result<T, GlmError>;

/// Primary error type shared across all crates in this workspace.
#[derive(Debug, Error)]
pub enum GlmError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Invalid NetCDF data: {0}")]
    NetCdfError(String),

    #[error("Object storage error: {0}")]
    StorageError(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rendering failed: {0}")]
    RenderError(String),

    #[error("Projection error: {0}")]
    ProjectionError(String),

    #[error("Service not initialized: {0}")]
    NotInitialized(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl GlmError {
    /// HTTP status code this error should be reported as by an adapter.
    pub fn http_status_code(&self) -> u16 {
        match self {
            GlmError::MissingParameter(_) | GlmError::InvalidParameter { .. } => 400,
            GlmError::NotInitialized(_) => 503,
            GlmError::Timeout => 504,
            GlmError::StorageError(_) => 502,
            _ => 500,
        }
    }
}

impl From<std::io::Error> for GlmError {
    fn from(err: std::io::Error) -> Self {
        GlmError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for GlmError {
    fn from(err: serde_json::Error) -> Self {
        GlmError::InternalError(format!("JSON error: {err}"))
    }
}
