use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the dispatcher
/// can tell fatal failures (configuration, processors) from transport noise.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),

    #[error("processor error: {0}")]
    Processor(String),
}

pub type Result<T> = std::result::Result<T, Error>;
