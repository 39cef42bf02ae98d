//! Route handlers, one module per API area.

pub mod connection;
pub mod events;
pub mod local;
pub mod remote;
pub mod sites;
pub mod transfer;
