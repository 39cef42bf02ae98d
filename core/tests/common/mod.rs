//! Shared test utilities for filebridge core integration tests.
//!
//! The in-memory helpers build a registry, queue and service wired to a
//! [`MemoryServer`]. The live helpers target the containers from
//! `tests/docker/docker-compose.yml` and skip when they are not running.

// Each integration test is compiled as its own crate, so not every test file
// uses every function from this shared module. Suppress dead_code warnings.
#![allow(dead_code)]

use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use filebridge_core::backends::memory::{MemoryConnector, MemoryServer};
use filebridge_core::config::{ConnectConfig, ProtocolKind};
use filebridge_core::connection::ConnectionRegistry;
use filebridge_core::transfer::{ProgressBroadcaster, TransferQueue, TransferService};

/// SFTP container (atmoz/sftp).
pub const PORT_SFTP: u16 = 2222;
/// Plain FTP container, passive ports 21000-21010.
pub const PORT_FTP: u16 = 2121;

pub const TEST_USER: &str = "testuser";
pub const TEST_PASSWORD: &str = "testpass";

/// Check if a TCP port is reachable on the given host.
///
/// Returns `true` if a TCP connection can be established within 2 seconds.
pub fn is_port_reachable(host: &str, port: u16) -> bool {
    let addr = format!("{host}:{port}");
    if let Ok(addr) = addr.parse() {
        TcpStream::connect_timeout(&addr, Duration::from_secs(2)).is_ok()
    } else {
        false
    }
}

/// Skip the current test if a container is not reachable on the given port.
macro_rules! require_server {
    ($port:expr) => {
        if !common::is_port_reachable("127.0.0.1", $port) {
            eprintln!(
                "SKIPPED: test server not reachable on port {} \
                 (start with: cd tests/docker && docker compose up -d)",
                $port
            );
            return;
        }
    };
}
pub(crate) use require_server;

/// Everything a transfer test needs, backed by one in-memory server.
pub struct Harness {
    pub server: MemoryServer,
    pub registry: Arc<ConnectionRegistry>,
    pub queue: Arc<TransferQueue>,
    pub broadcaster: Arc<ProgressBroadcaster>,
    pub service: TransferService,
}

impl Harness {
    pub fn new() -> Self {
        let server = MemoryServer::new();
        let registry = Arc::new(ConnectionRegistry::new(Box::new(
            MemoryConnector::new(server.clone()).with_password(TEST_PASSWORD),
        )));
        let broadcaster = Arc::new(ProgressBroadcaster::new());
        let queue = Arc::new(TransferQueue::new(broadcaster.clone()));
        let service = TransferService::new(registry.clone(), queue.clone());
        Self {
            server,
            registry,
            queue,
            broadcaster,
            service,
        }
    }

    /// Connect and return the session id.
    pub async fn connect(&self, kind: ProtocolKind) -> String {
        self.registry
            .connect(memory_config(kind))
            .await
            .expect("in-memory connect should succeed")
            .id
            .clone()
    }
}

pub fn memory_config(kind: ProtocolKind) -> ConnectConfig {
    ConnectConfig::new(kind, "memory.test", TEST_USER).with_password(TEST_PASSWORD)
}

pub fn live_config(kind: ProtocolKind, port: u16) -> ConnectConfig {
    ConnectConfig::new(kind, "127.0.0.1", TEST_USER)
        .with_port(port)
        .with_password(TEST_PASSWORD)
}

/// Write `files` (relative path, contents) below `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}
