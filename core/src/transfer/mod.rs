//! Transfer bookkeeping and execution.
//!
//! - [`TransferQueue`] holds one [`TransferRecord`] per transfer and enforces
//!   its lifecycle.
//! - [`ProgressBroadcaster`] fans record changes out to live subscribers.
//! - [`DirectoryWalker`] mirrors whole trees in either direction.
//! - [`TransferService`] ties a session, a record and the actual copy
//!   together.

pub mod broadcast;
pub mod queue;
pub mod service;
pub mod types;
pub mod walker;

pub use broadcast::{ProgressBroadcaster, TransferEvent, TRANSFER_UPDATE_EVENT};
pub use queue::TransferQueue;
pub use service::TransferService;
pub use types::{TransferKind, TransferRecord, TransferStatus, TransferUpdate};
pub use walker::{DirectoryWalker, WalkSummary};
