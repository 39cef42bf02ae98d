//! Recursive directory replication between the local disk and a remote
//! session.
//!
//! Walks are depth-first and strictly sequential. The first failing step
//! aborts the walk and nothing already copied is rolled back.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tracing::debug;

use crate::errors::{CoreError, FileError};
use crate::files::local;
use crate::files::utils::join_remote_path;
use crate::files::ProtocolAdapter;

type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CoreError>> + Send + 'a>>;

/// What a successful walk copied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub files: u64,
    /// Directories created on the destination, the root included.
    pub directories: u64,
    pub bytes: u64,
}

/// Mirrors directory trees through one adapter.
pub struct DirectoryWalker<'a> {
    adapter: &'a dyn ProtocolAdapter,
}

impl<'a> DirectoryWalker<'a> {
    pub fn new(adapter: &'a dyn ProtocolAdapter) -> Self {
        Self { adapter }
    }

    /// Copy the local tree `local_root` to `remote_root`, creating
    /// `remote_root` first.
    pub async fn upload(&self, local_root: &Path, remote_root: &str) -> Result<WalkSummary, CoreError> {
        let mut summary = WalkSummary::default();
        self.adapter.make_directory(remote_root).await?;
        summary.directories += 1;
        self.upload_dir(local_root, remote_root, &mut summary).await?;
        Ok(summary)
    }

    /// Copy the remote tree `remote_root` to `local_root`, creating
    /// `local_root` first.
    pub async fn download(&self, remote_root: &str, local_root: &Path) -> Result<WalkSummary, CoreError> {
        let mut summary = WalkSummary::default();
        local::create_dir_all(local_root)
            .await
            .map_err(|e| local_error("mkdir", local_root, e))?;
        summary.directories += 1;
        self.download_dir(remote_root, local_root, &mut summary).await?;
        Ok(summary)
    }

    fn upload_dir<'b>(
        &'b self,
        local_dir: &'b Path,
        remote_dir: &'b str,
        summary: &'b mut WalkSummary,
    ) -> WalkFuture<'b> {
        Box::pin(async move {
            let entries = local::list_dir(local_dir)
                .await
                .map_err(|e| local_error("read_dir", local_dir, e))?;

            for entry in entries {
                let local_child = local_dir.join(&entry.name);
                let remote_child = join_remote_path(remote_dir, &entry.name);
                if entry.is_directory {
                    self.adapter.make_directory(&remote_child).await?;
                    summary.directories += 1;
                    self.upload_dir(&local_child, &remote_child, summary).await?;
                } else {
                    let bytes = self.adapter.put_file(&local_child, &remote_child).await?;
                    debug!(remote = %remote_child, bytes, "Uploaded");
                    summary.files += 1;
                    summary.bytes += bytes;
                }
            }
            Ok(())
        })
    }

    fn download_dir<'b>(
        &'b self,
        remote_dir: &'b str,
        local_dir: &'b Path,
        summary: &'b mut WalkSummary,
    ) -> WalkFuture<'b> {
        Box::pin(async move {
            let listing = self.adapter.list(remote_dir).await?;

            for entry in listing.entries {
                let remote_child = join_remote_path(remote_dir, &entry.name);
                let local_child = local_dir.join(&entry.name);
                if entry.is_directory {
                    local::create_dir_all(&local_child)
                        .await
                        .map_err(|e| local_error("mkdir", &local_child, e))?;
                    summary.directories += 1;
                    self.download_dir(&remote_child, &local_child, summary).await?;
                } else {
                    let bytes = self.adapter.get_file(&remote_child, &local_child).await?;
                    debug!(remote = %remote_child, bytes, "Downloaded");
                    summary.files += 1;
                    summary.bytes += bytes;
                }
            }
            Ok(())
        })
    }
}

fn local_error(op: &str, path: &Path, e: FileError) -> CoreError {
    CoreError::Filesystem(format!("{op} {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryServer;
    use crate::config::ProtocolKind;

    #[tokio::test]
    async fn upload_mirrors_nested_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("site");
        std::fs::create_dir_all(root.join("css")).unwrap();
        std::fs::create_dir_all(root.join("empty")).unwrap();
        std::fs::write(root.join("index.html"), "<html>").unwrap();
        std::fs::write(root.join("css/main.css"), "body{}").unwrap();

        let server = MemoryServer::new();
        let adapter = server.session(ProtocolKind::Sftp);
        let summary = DirectoryWalker::new(&adapter)
            .upload(&root, "/www/site")
            .await
            .unwrap();

        assert_eq!(
            summary,
            WalkSummary {
                files: 2,
                directories: 3,
                bytes: 12,
            }
        );
        assert_eq!(server.read_file("/www/site/index.html").unwrap(), b"<html>");
        assert_eq!(server.read_file("/www/site/css/main.css").unwrap(), b"body{}");
        assert!(server.is_dir("/www/site/empty"));
    }

    #[tokio::test]
    async fn download_mirrors_nested_tree() {
        let server = MemoryServer::new();
        server.add_file("/data/a.txt", b"alpha");
        server.add_file("/data/sub/b.txt", b"beta");
        server.add_dir("/data/sub/deeper");
        let adapter = server.session(ProtocolKind::Ftp);

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("data");
        let summary = DirectoryWalker::new(&adapter)
            .download("/data", &target)
            .await
            .unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.directories, 3);
        assert_eq!(std::fs::read(target.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(std::fs::read(target.join("sub/b.txt")).unwrap(), b"beta");
        assert!(target.join("sub/deeper").is_dir());
    }

    #[tokio::test]
    async fn first_failure_aborts_walk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("up");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.txt"), "a").unwrap();
        std::fs::write(root.join("b.txt"), "b").unwrap();
        std::fs::write(root.join("c.txt"), "c").unwrap();

        let server = MemoryServer::new();
        server.fail_on("/dst/up/b.txt");
        let adapter = server.session(ProtocolKind::Sftp);
        let err = DirectoryWalker::new(&adapter)
            .upload(&root, "/dst/up")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("/dst/up/b.txt"));
        assert!(server.exists("/dst/up/a.txt"));
        assert!(!server.exists("/dst/up/c.txt"));
    }

    #[tokio::test]
    async fn missing_local_root_is_filesystem_error() {
        let server = MemoryServer::new();
        let adapter = server.session(ProtocolKind::Sftp);
        let err = DirectoryWalker::new(&adapter)
            .upload(Path::new("/definitely/not/here"), "/dst")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Filesystem(ref m) if m.contains("read_dir")));
    }
}
