pub mod sites;

use std::path::PathBuf;
use std::sync::Arc;

use filebridge_core::connection::ConnectionRegistry;
use filebridge_core::transfer::{ProgressBroadcaster, TransferQueue, TransferService};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use sites::SiteStore;

/// Shared handles injected into every route.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub queue: Arc<TransferQueue>,
    pub broadcaster: Arc<ProgressBroadcaster>,
    pub transfers: Arc<TransferService>,
    pub sites: Arc<SiteStore>,
    pub upload_dir: PathBuf,
    /// Cancelled once on shutdown; long-lived sockets watch it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the components around `registry`.
    pub fn new(
        registry: ConnectionRegistry,
        config: &ServerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let registry = Arc::new(registry);
        let broadcaster = Arc::new(ProgressBroadcaster::new());
        let queue = Arc::new(TransferQueue::new(broadcaster.clone()));
        let transfers = Arc::new(TransferService::new(registry.clone(), queue.clone()));
        Self {
            registry,
            queue,
            broadcaster,
            transfers,
            sites: Arc::new(SiteStore::new(config.sites_file.clone())),
            upload_dir: config.upload_dir.clone(),
            shutdown,
        }
    }
}
