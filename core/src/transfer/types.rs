use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Upload,
    Download,
}

/// Lifecycle state of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Queued,
    Transferring,
    Completed,
    Failed,
}

impl TransferStatus {
    /// Completed and failed records never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One file or directory transfer as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub id: String,
    pub kind: TransferKind,
    pub file_name: String,
    /// Byte size for single files; unknown for directories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub status: TransferStatus,
    /// 0 to 100.
    pub progress: u8,
    pub local_path: String,
    pub remote_path: String,
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TransferRecord {
    pub fn new(kind: TransferKind, file_name: &str, local_path: &str, remote_path: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            file_name: file_name.to_string(),
            size: None,
            status: TransferStatus::Queued,
            progress: 0,
            local_path: local_path.to_string(),
            remote_path: remote_path.to_string(),
            is_directory: false,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn directory(mut self) -> Self {
        self.is_directory = true;
        self.size = None;
        self
    }
}

/// A partial change to a record. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct TransferUpdate {
    pub status: Option<TransferStatus>,
    pub progress: Option<u8>,
    pub error: Option<String>,
    pub size: Option<u64>,
}

impl TransferUpdate {
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            status: Some(TransferStatus::Completed),
            progress: Some(100),
            ..Self::default()
        }
    }

    pub fn failed(message: &str) -> Self {
        let message = if message.trim().is_empty() {
            "unknown error"
        } else {
            message
        };
        Self {
            status: Some(TransferStatus::Failed),
            error: Some(message.to_string()),
            ..Self::default()
        }
    }
}
