use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error("source file not found: {0}")]
    #[diagnostic(help("point the source directory at an unpacked TTD download"))]
    SourceNotFound(PathBuf),

    #[error("malformed source row {line}: {message}")]
    MalformedRow { line: usize, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("empty identifier")]
    EmptyIdentifier,

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("id mapping connection failed: {0}")]
    Connection(String),

    #[error("id mapping request failed: {0}")]
    Http(String),

    #[error("id mapping service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("id mapping response could not be decoded: {0}")]
    Decode(String),

    #[error("batch timed out after {0} seconds")]
    BatchTimeout(u64),
}

impl ResolveError {
    pub fn is_transient(&self) -> bool {
        match self {
            ResolveError::Connection(_) | ResolveError::BatchTimeout(_) => true,
            ResolveError::Status { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}
