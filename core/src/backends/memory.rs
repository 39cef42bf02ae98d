//! In-process remote filesystem.
//!
//! [`MemoryServer`] is a shared tree of directories and files; each
//! [`MemoryAdapter`] is one session against it. FTP-family sessions emulate
//! the server-side working directory: `list` changes it, yields to the
//! scheduler, and then lists whatever the working directory is at that
//! moment. A session that did not serialize its operations would therefore
//! return the wrong directory under concurrency.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use tokio::sync::Mutex;

use crate::config::{ConnectConfig, ProtocolKind};
use crate::connection::Connector;
use crate::errors::{map_io_error, CoreError, FileError};
use crate::files::utils::{format_permissions, join_remote_path, remote_file_name, remote_parent};
use crate::files::{entry_type, finalize_listing, DirListing, FileEntry, ProtocolAdapter};

#[derive(Debug, Clone)]
enum Node {
    Dir { mode: u32 },
    File { data: Vec<u8>, mode: u32 },
}

#[derive(Default)]
struct ServerInner {
    nodes: StdMutex<BTreeMap<String, Node>>,
    failing: StdMutex<HashSet<String>>,
    close_fails: AtomicBool,
}

/// A shared in-memory remote filesystem.
#[derive(Clone, Default)]
pub struct MemoryServer {
    inner: Arc<ServerInner>,
}

impl MemoryServer {
    /// An empty server containing only `/`.
    pub fn new() -> Self {
        let server = Self::default();
        server
            .nodes()
            .insert("/".to_string(), Node::Dir { mode: 0o755 });
        server
    }

    fn nodes(&self) -> MutexGuard<'_, BTreeMap<String, Node>> {
        self.inner.nodes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a directory and its parents.
    pub fn add_dir(&self, path: &str) {
        let mut nodes = self.nodes();
        for prefix in ancestors_and_self(&normalize("/", path)) {
            nodes
                .entry(prefix)
                .or_insert(Node::Dir { mode: 0o755 });
        }
    }

    /// Create a file, creating parent directories as needed.
    pub fn add_file(&self, path: &str, data: &[u8]) {
        let path = normalize("/", path);
        if let Some(parent) = remote_parent(&path) {
            self.add_dir(&parent);
        }
        self.nodes().insert(
            path,
            Node::File {
                data: data.to_vec(),
                mode: 0o644,
            },
        );
    }

    /// Contents of a file, `None` for directories and missing paths.
    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        match self.nodes().get(&normalize("/", path)) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.nodes().get(&normalize("/", path)), Some(Node::Dir { .. }))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.nodes().contains_key(&normalize("/", path))
    }

    /// Permission bits of a path.
    pub fn mode(&self, path: &str) -> Option<u32> {
        self.nodes().get(&normalize("/", path)).map(|node| match node {
            Node::Dir { mode } | Node::File { mode, .. } => *mode,
        })
    }

    /// Make every future transfer of `path` (in either direction) fail.
    pub fn fail_on(&self, path: &str) {
        self.inner
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(normalize("/", path));
    }

    fn is_failing(&self, path: &str) -> bool {
        self.inner
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(path)
    }

    /// Make every future session close report an error. The session is
    /// still marked closed.
    pub fn fail_close(&self) {
        self.inner.close_fails.store(true, Ordering::SeqCst);
    }

    /// Open a new session speaking `kind`.
    pub fn session(&self, kind: ProtocolKind) -> MemoryAdapter {
        MemoryAdapter {
            kind,
            server: self.clone(),
            session: Mutex::new(SessionState {
                cwd: "/".to_string(),
                closed: false,
            }),
            remote_calls: AtomicUsize::new(0),
        }
    }
}

struct SessionState {
    cwd: String,
    closed: bool,
}

/// One session against a [`MemoryServer`].
pub struct MemoryAdapter {
    kind: ProtocolKind,
    server: MemoryServer,
    session: Mutex<SessionState>,
    remote_calls: AtomicUsize,
}

impl MemoryAdapter {
    /// Number of operations that reached the "wire".
    pub fn remote_calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    async fn begin(&self) -> Result<tokio::sync::MutexGuard<'_, SessionState>, FileError> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        let session = self.session.lock().await;
        if session.closed {
            return Err(FileError::OperationFailed("connection closed".to_string()));
        }
        Ok(session)
    }

    fn entry_for(&self, path: &str, node: &Node) -> FileEntry {
        let name = remote_file_name(path);
        let (is_directory, size, mode) = match node {
            Node::Dir { mode } => (true, 0, *mode),
            Node::File { data, mode } => (false, data.len() as u64, *mode),
        };
        FileEntry {
            file_type: entry_type(&name, is_directory),
            name,
            path: path.to_string(),
            is_directory,
            size,
            modified: String::new(),
            permissions: Some(format_permissions(mode)),
            owner: None,
            group: None,
        }
    }
}

#[async_trait::async_trait]
impl ProtocolAdapter for MemoryAdapter {
    fn kind(&self) -> ProtocolKind {
        self.kind
    }

    async fn list(&self, path: &str) -> Result<DirListing, FileError> {
        let mut session = self.begin().await?;
        let target = normalize(&session.cwd, path);
        if !self.server.is_dir(&target) {
            return Err(FileError::NotFound(target));
        }

        let dir = if self.kind.is_ftp_family() {
            session.cwd = target;
            // Give other tasks a chance to run between CWD and LIST.
            tokio::task::yield_now().await;
            session.cwd.clone()
        } else {
            target
        };

        let nodes = self.server.nodes();
        let mut entries: Vec<FileEntry> = nodes
            .iter()
            .filter(|(key, _)| key.as_str() != "/" && remote_parent(key).as_deref() == Some(dir.as_str()))
            .map(|(key, node)| self.entry_for(key, node))
            .collect();
        if self.kind.is_ftp_family() {
            for dot in [".", ".."] {
                entries.push(self.entry_for(&join_remote_path(&dir, dot), &Node::Dir { mode: 0o755 }));
            }
        }

        Ok(DirListing {
            path: dir,
            entries: finalize_listing(entries),
        })
    }

    async fn stat(&self, path: &str) -> Result<FileEntry, FileError> {
        let session = self.begin().await?;
        let target = normalize(&session.cwd, path);
        let nodes = self.server.nodes();
        let node = nodes
            .get(&target)
            .ok_or_else(|| FileError::NotFound(target.clone()))?;
        Ok(self.entry_for(&target, node))
    }

    async fn make_directory(&self, path: &str) -> Result<(), FileError> {
        let session = self.begin().await?;
        let target = normalize(&session.cwd, path);
        let mut nodes = self.server.nodes();
        for prefix in ancestors_and_self(&target) {
            match nodes.get(&prefix) {
                Some(Node::Dir { .. }) => {}
                Some(Node::File { .. }) => {
                    return Err(FileError::OperationFailed(format!(
                        "{prefix}: exists and is not a directory"
                    )))
                }
                None => {
                    nodes.insert(prefix, Node::Dir { mode: 0o755 });
                }
            }
        }
        Ok(())
    }

    async fn remove(&self, path: &str, is_directory: bool) -> Result<(), FileError> {
        let session = self.begin().await?;
        let target = normalize(&session.cwd, path);
        let mut nodes = self.server.nodes();
        let found_dir = match nodes.get(&target) {
            None => return Err(FileError::NotFound(target)),
            Some(node) => matches!(node, Node::Dir { .. }),
        };
        if found_dir != is_directory {
            let reason = if found_dir { "is a directory" } else { "not a directory" };
            return Err(FileError::OperationFailed(format!("{target}: {reason}")));
        }
        let prefix = format!("{}/", target.trim_end_matches('/'));
        nodes.retain(|key, _| key != &target && !key.starts_with(&prefix));
        Ok(())
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), FileError> {
        let session = self.begin().await?;
        let from = normalize(&session.cwd, old_path);
        let to = normalize(&session.cwd, new_path);
        let mut nodes = self.server.nodes();
        if !nodes.contains_key(&from) {
            return Err(FileError::NotFound(from));
        }
        if let Some(parent) = remote_parent(&to) {
            if !matches!(nodes.get(&parent), Some(Node::Dir { .. })) {
                return Err(FileError::NotFound(parent));
            }
        }

        let prefix = format!("{from}/");
        let moved: Vec<String> = nodes
            .keys()
            .filter(|key| **key == from || key.starts_with(&prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = nodes.remove(&key) {
                let renamed = format!("{to}{}", &key[from.len()..]);
                nodes.insert(renamed, node);
            }
        }
        Ok(())
    }

    async fn change_permissions(&self, path: &str, mode: u32) -> Result<(), FileError> {
        if self.kind.is_ftp_family() {
            return Err(FileError::NotSupported("chmod".to_string()));
        }
        let session = self.begin().await?;
        let target = normalize(&session.cwd, path);
        let mut nodes = self.server.nodes();
        match nodes.get_mut(&target) {
            Some(Node::Dir { mode: m }) | Some(Node::File { mode: m, .. }) => {
                *m = mode & 0o7777;
                Ok(())
            }
            None => Err(FileError::NotFound(target)),
        }
    }

    async fn get_file(&self, remote_path: &str, local_path: &Path) -> Result<u64, FileError> {
        let session = self.begin().await?;
        let source = normalize(&session.cwd, remote_path);
        if self.server.is_failing(&source) {
            return Err(FileError::OperationFailed(format!("{source}: connection reset")));
        }
        let data = match self.server.nodes().get(&source) {
            Some(Node::File { data, .. }) => data.clone(),
            Some(Node::Dir { .. }) => {
                return Err(FileError::OperationFailed(format!("{source}: is a directory")))
            }
            None => return Err(FileError::NotFound(source)),
        };
        tokio::fs::write(local_path, &data)
            .await
            .map_err(|e| map_io_error(e, &local_path.to_string_lossy()))?;
        Ok(data.len() as u64)
    }

    async fn put_file(&self, local_path: &Path, remote_path: &str) -> Result<u64, FileError> {
        let session = self.begin().await?;
        let target = normalize(&session.cwd, remote_path);
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| map_io_error(e, &local_path.to_string_lossy()))?;
        if self.server.is_failing(&target) {
            return Err(FileError::OperationFailed(format!("{target}: connection reset")));
        }

        let mut nodes = self.server.nodes();
        if let Some(parent) = remote_parent(&target) {
            if !matches!(nodes.get(&parent), Some(Node::Dir { .. })) {
                return Err(FileError::NotFound(parent));
            }
        }
        if matches!(nodes.get(&target), Some(Node::Dir { .. })) {
            return Err(FileError::OperationFailed(format!("{target}: is a directory")));
        }
        let len = data.len() as u64;
        nodes.insert(target, Node::File { data, mode: 0o644 });
        Ok(len)
    }

    async fn close(&self) -> Result<(), FileError> {
        self.session.lock().await.closed = true;
        if self.server.inner.close_fails.load(Ordering::SeqCst) {
            return Err(FileError::OperationFailed("socket broken".to_string()));
        }
        Ok(())
    }
}

/// [`Connector`] that opens sessions against a [`MemoryServer`].
#[derive(Clone)]
pub struct MemoryConnector {
    server: MemoryServer,
    password: Option<String>,
}

impl MemoryConnector {
    pub fn new(server: MemoryServer) -> Self {
        Self {
            server,
            password: None,
        }
    }

    /// Reject logins whose password differs from `password`.
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, config: &ConnectConfig) -> Result<Box<dyn ProtocolAdapter>, CoreError> {
        if let Some(expected) = &self.password {
            if config.credentials.password.as_deref() != Some(expected.as_str()) {
                return Err(CoreError::Connection(format!(
                    "{}: authentication failed for {}",
                    config.address(),
                    config.username
                )));
            }
        }
        Ok(Box::new(self.server.session(config.protocol)))
    }
}

/// Resolve `path` against `cwd`, collapsing `.`, `..` and duplicate slashes.
fn normalize(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{cwd}/{path}")
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// `/a/b` yields `/`, `/a`, `/a/b`.
fn ancestors_and_self(path: &str) -> Vec<String> {
    let mut result = vec!["/".to_string()];
    let mut current = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);
        result.push(current.clone());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_resolves_relative_paths() {
        assert_eq!(normalize("/home/u", "docs"), "/home/u/docs");
        assert_eq!(normalize("/home/u", "../v/./x"), "/home/v/x");
        assert_eq!(normalize("/", "//a///b/"), "/a/b");
        assert_eq!(normalize("/a", ".."), "/");
    }

    #[tokio::test]
    async fn list_sorts_and_hides_dot_entries() {
        let server = MemoryServer::new();
        server.add_file("/srv/b.txt", b"b");
        server.add_file("/srv/a.txt", b"a");
        server.add_dir("/srv/zeta");
        let adapter = server.session(ProtocolKind::Ftp);

        let listing = adapter.list("/srv").await.unwrap();
        assert_eq!(listing.path, "/srv");
        let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn make_directory_is_recursive_and_idempotent() {
        let server = MemoryServer::new();
        let adapter = server.session(ProtocolKind::Sftp);
        adapter.make_directory("/x/y/z").await.unwrap();
        adapter.make_directory("/x/y/z").await.unwrap();
        assert!(server.is_dir("/x/y"));
        assert!(server.is_dir("/x/y/z"));
    }

    #[tokio::test]
    async fn rename_moves_subtrees() {
        let server = MemoryServer::new();
        server.add_file("/old/inner/f.txt", b"data");
        let adapter = server.session(ProtocolKind::Sftp);
        adapter.rename("/old", "/new").await.unwrap();
        assert!(!server.exists("/old"));
        assert_eq!(server.read_file("/new/inner/f.txt").unwrap(), b"data");
    }

    #[tokio::test]
    async fn ftp_chmod_never_reaches_the_wire() {
        let server = MemoryServer::new();
        server.add_file("/f", b"");
        let adapter = server.session(ProtocolKind::Ftps);
        let err = adapter.change_permissions("/f", 0o600).await.unwrap_err();
        assert!(matches!(err, FileError::NotSupported(_)));
        assert_eq!(adapter.remote_calls(), 0);
    }

    #[tokio::test]
    async fn sftp_chmod_updates_mode() {
        let server = MemoryServer::new();
        server.add_file("/f", b"");
        let adapter = server.session(ProtocolKind::Sftp);
        adapter.change_permissions("/f", 0o600).await.unwrap();
        assert_eq!(server.mode("/f"), Some(0o600));
    }

    #[tokio::test]
    async fn closed_sessions_reject_operations() {
        let server = MemoryServer::new();
        let adapter = server.session(ProtocolKind::Sftp);
        adapter.close().await.unwrap();
        let err = adapter.list("/").await.unwrap_err();
        assert!(err.to_string().contains("connection closed"));
    }

    #[tokio::test]
    async fn connector_checks_password() {
        let connector = MemoryConnector::new(MemoryServer::new()).with_password("s3cret");
        let config = ConnectConfig::new(ProtocolKind::Ftp, "mem", "alice").with_password("nope");
        assert!(matches!(
            connector.connect(&config).await,
            Err(CoreError::Connection(_))
        ));
        let config = config.with_password("s3cret");
        let adapter = connector.connect(&config).await.unwrap();
        assert_eq!(adapter.kind(), ProtocolKind::Ftp);
    }
}
