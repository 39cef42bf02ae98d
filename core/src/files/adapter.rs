//! The uniform remote-operation interface every protocol backend implements.
//!
//! Callers outside `backends` only ever see `dyn ProtocolAdapter`; the
//! concrete backend is chosen once by the connector when the session is
//! created.

use std::path::Path;

use crate::config::ProtocolKind;
use crate::errors::FileError;
use crate::files::{DirListing, FileEntry};

/// Remote filesystem operations over one authenticated session.
///
/// Implementations serialize their own remote round-trips: two calls on the
/// same adapter never interleave on the wire, so server-side state such as
/// the FTP working directory cannot leak between concurrent callers. All
/// paths are absolute remote paths.
#[async_trait::async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Protocol spoken by this adapter.
    fn kind(&self) -> ProtocolKind;

    /// List a directory: directories first, then files, each group by name;
    /// `.` and `..` are never returned.
    async fn list(&self, path: &str) -> Result<DirListing, FileError>;

    /// Metadata for a single file or directory.
    async fn stat(&self, path: &str) -> Result<FileEntry, FileError>;

    /// Create a directory and any missing parents. An existing directory is
    /// not an error.
    async fn make_directory(&self, path: &str) -> Result<(), FileError>;

    /// Delete a file, or a directory together with its contents.
    async fn remove(&self, path: &str, is_directory: bool) -> Result<(), FileError>;

    /// Rename or move a file or directory.
    async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), FileError>;

    /// Change the permission bits of a path.
    ///
    /// Returns [`FileError::NotSupported`] without touching the connection
    /// when the protocol has no such command.
    async fn change_permissions(&self, path: &str, mode: u32) -> Result<(), FileError>;

    /// Download `remote_path` into `local_path`, returning the byte count.
    async fn get_file(&self, remote_path: &str, local_path: &Path) -> Result<u64, FileError>;

    /// Upload `local_path` to `remote_path`, returning the byte count.
    async fn put_file(&self, local_path: &Path, remote_path: &str) -> Result<u64, FileError>;

    /// Close the session. Later calls fail with an operation error.
    async fn close(&self) -> Result<(), FileError>;
}
