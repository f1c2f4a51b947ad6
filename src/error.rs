use std::path::PathBuf;
use thiserror::Error;

#[allow(dead_code)]
#[derive(Error, Debug)]
pub enum RaglineError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("No retrieval strategies enabled")]
    NoStrategiesEnabled,

    #[error("Invalid config value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Failures raised by external collaborators (generation, embedding, search).
///
/// Transient kinds (connectivity, timeout, overload) are eligible for retry;
/// everything else fails the call immediately.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process failed with exit code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid input rejected by backend: {0}")]
    InvalidInput(String),

    #[error("Malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout(_) | BackendError::Io(_) | BackendError::Unavailable(_)
        )
    }
}

/// Shared result of a single-flight cache computation.
///
/// Carries a rendered error message rather than the source error so the
/// failure can be cloned out to every waiter.
#[derive(Error, Debug, Clone)]
#[error("Cached computation failed: {0}")]
pub struct CacheError(pub String);

impl CacheError {
    pub fn from_backend(err: &BackendError) -> Self {
        CacheError(err.to_string())
    }
}
