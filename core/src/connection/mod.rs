//! Live remote sessions.
//!
//! [`ConnectionRegistry`] owns every open session, keyed by an opaque id
//! handed to the client at connect time. Lookups hand out `Arc<Session>`, so
//! an in-flight operation keeps its adapter alive even if the session is
//! disconnected meanwhile; the adapter itself then reports "connection
//! closed".

mod connector;

pub use connector::{Connector, NetworkConnector};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ConnectConfig, ProtocolKind};
use crate::errors::CoreError;
use crate::files::ProtocolAdapter;

/// One authenticated session.
pub struct Session {
    pub id: String,
    pub kind: ProtocolKind,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub connected_at: DateTime<Utc>,
    adapter: Box<dyn ProtocolAdapter>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn adapter(&self) -> &dyn ProtocolAdapter {
        self.adapter.as_ref()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            conn_id: self.id.clone(),
            protocol: self.kind,
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            connected_at: self.connected_at,
        }
    }
}

/// Public description of a session. Never carries credentials.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub conn_id: String,
    pub protocol: ProtocolKind,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub connected_at: DateTime<Utc>,
}

/// Registry of open sessions.
pub struct ConnectionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    connector: Box<dyn Connector>,
}

impl ConnectionRegistry {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            connector,
        }
    }

    /// A registry that dials real servers.
    pub fn with_network() -> Self {
        Self::new(Box::new(NetworkConnector))
    }

    /// Open and register a new session.
    ///
    /// The handshake happens outside the registry lock; a failed attempt
    /// leaves the registry unchanged.
    pub async fn connect(&self, config: ConnectConfig) -> Result<Arc<Session>, CoreError> {
        info!(
            protocol = %config.protocol,
            address = %config.address(),
            username = %config.username,
            "Connecting"
        );
        let adapter = match self.connector.connect(&config).await {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(address = %config.address(), "Connection failed: {e}");
                return Err(e);
            }
        };

        let session = Arc::new(Session {
            id: uuid::Uuid::new_v4().to_string(),
            kind: config.protocol,
            port: config.effective_port(),
            host: config.host,
            username: config.username,
            connected_at: Utc::now(),
            adapter,
        });

        self.sessions
            .lock()
            .await
            .insert(session.id.clone(), session.clone());
        info!(conn_id = %session.id, "Session registered");
        Ok(session)
    }

    /// Look up a session by id.
    pub async fn get(&self, id: &str) -> Result<Arc<Session>, CoreError> {
        self.sessions
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotConnected(id.to_string()))
    }

    /// Remove a session and close its adapter.
    ///
    /// The entry is removed before closing, so a failing close still leaves
    /// the id unknown; the close error is returned to the caller.
    pub async fn disconnect(&self, id: &str) -> Result<(), CoreError> {
        let session = self
            .sessions
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| CoreError::NotConnected(id.to_string()))?;

        if let Err(e) = session.adapter().close().await {
            warn!(conn_id = %id, "Error while closing session: {e}");
            return Err(CoreError::Connection(format!("close {id}: {e}")));
        }
        info!(conn_id = %id, "Session disconnected");
        Ok(())
    }

    /// Snapshot of all open sessions, oldest first.
    pub async fn sessions(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .lock()
            .await
            .values()
            .map(|s| s.info())
            .collect();
        infos.sort_by_key(|s| s.connected_at);
        infos
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Close every session, giving each at most `timeout`. Used on shutdown.
    pub async fn close_all(&self, timeout: Duration) {
        let drained: Vec<Arc<Session>> = self
            .sessions
            .lock()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect();

        for session in drained {
            match tokio::time::timeout(timeout, session.adapter().close()).await {
                Ok(Ok(())) => debug!(conn_id = %session.id, "Session closed"),
                Ok(Err(e)) => warn!(conn_id = %session.id, "Error while closing session: {e}"),
                Err(_) => warn!(conn_id = %session.id, "Timed out closing session"),
            }
        }
    }
}
