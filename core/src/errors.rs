//! Error types for the filebridge core crate.
//!
//! Adapters and local filesystem helpers report [`FileError`]. Everything
//! that crosses the crate boundary is a [`CoreError`]; the server maps it to
//! an HTTP status and a machine-readable code.

use thiserror::Error;

/// Top-level error type for registry, queue and transfer operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Handshake, authentication or network failure while connecting.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The referenced session id is unknown (never connected or already
    /// disconnected).
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// The protocol has no primitive for the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A file or directory transfer failed. The same message is stored on
    /// the transfer record.
    #[error("Transfer failed: {message}")]
    Transfer {
        transfer_id: String,
        message: String,
    },

    /// A local filesystem operation failed.
    #[error("Filesystem error: {0}")]
    Filesystem(String),

    /// A remote file operation failed outside of a transfer.
    #[error("File error: {0}")]
    File(FileError),

    /// Invalid parameters (unknown protocol, malformed mode string, ...).
    #[error("Config error: {0}")]
    Config(String),
}

impl From<FileError> for CoreError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NotSupported(op) => CoreError::Unsupported(op),
            other => CoreError::File(other),
        }
    }
}

/// Errors related to remote and local file operations.
#[derive(Error, Debug)]
pub enum FileError {
    /// The requested file or directory was not found.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Permission was denied for the requested operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A file operation failed (protocol error, closed connection, ...).
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// The protocol cannot perform this operation at all.
    #[error("{0} is not supported by this protocol")]
    NotSupported(String),

    /// A low-level I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Map `std::io::Error` to `FileError` based on error kind, keeping the path.
pub fn map_io_error(e: std::io::Error, path: &str) -> FileError {
    match e.kind() {
        std::io::ErrorKind::NotFound => FileError::NotFound(path.to_string()),
        std::io::ErrorKind::PermissionDenied => FileError::PermissionDenied(path.to_string()),
        _ => FileError::OperationFailed(format!("{path}: {e}")),
    }
}
