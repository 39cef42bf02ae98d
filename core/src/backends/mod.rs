//! Concrete [`ProtocolAdapter`](crate::files::ProtocolAdapter) implementations.
//!
//! The network backends depend on native libraries (libssh2, a TLS stack)
//! and are gated behind cargo features. The in-memory backend is always
//! available and is what the test suites drive.

#[cfg(feature = "ftp")]
pub mod ftp;
pub mod memory;
#[cfg(feature = "sftp")]
pub mod sftp;

#[cfg(feature = "sftp")]
use std::net::TcpStream;
#[cfg(any(feature = "ftp", feature = "sftp"))]
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// How long to wait for the TCP handshake with a remote host.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Resolve `host:port` to the first usable socket address.
#[cfg(any(feature = "ftp", feature = "sftp"))]
pub(crate) fn resolve_addr(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no address found for {host}"),
        )
    })
}

/// Open a TCP connection with [`CONNECT_TIMEOUT`].
#[cfg(feature = "sftp")]
pub(crate) fn connect_tcp(host: &str, port: u16) -> std::io::Result<TcpStream> {
    let addr = resolve_addr(host, port)?;
    TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
}
