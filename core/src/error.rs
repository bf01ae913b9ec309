use thiserror::Error;

/// Failures that stop a pipeline before it touches the destination.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("refusing to write to protected tab '{tab}' in environment '{env}'")]
    ProtectedTab { tab: String, env: String },
    #[error("write-back has {actual} rows but the source has {expected}")]
    RowCountMismatch { expected: usize, actual: usize },
}
