pub mod backends;
pub mod config;
pub mod connection;
pub mod errors;
pub mod files;
pub mod transfer;
