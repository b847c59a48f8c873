use std::time::Duration;

/// Core error type for the orchestrator.
///
/// Adapter crates map their specific errors into this type so the router and the
/// transport can treat failures uniformly (startup-fatal vs per-request).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("capability '{key}' failed: {message}")]
    Capability { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
