//! Common error type and result alias used across the crate.
use std::path::PathBuf;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Workflow { path: PathBuf, message: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("comfyui error: {0}")]
    ComfyUI(String),

    #[error("config error: {0}")]
    Config(String),
}

impl AppError {
    /// Attach a path to an io error, since bare `std::io::Error` messages
    /// don't say which file was involved.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io { path: path.into(), source }
    }
}
