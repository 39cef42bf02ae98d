use crate::config::ConnectConfig;
#[cfg(any(feature = "ftp", feature = "sftp"))]
use crate::config::ProtocolKind;
use crate::errors::CoreError;
use crate::files::ProtocolAdapter;

/// Opens authenticated adapter sessions.
///
/// The registry depends on this seam rather than on concrete backends, so it
/// can be driven by an in-memory server in tests.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectConfig) -> Result<Box<dyn ProtocolAdapter>, CoreError>;
}

/// Connector for real FTP, FTPS and SFTP servers.
///
/// Protocols whose backend was compiled out fail with
/// [`CoreError::Unsupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NetworkConnector;

#[async_trait::async_trait]
impl Connector for NetworkConnector {
    async fn connect(&self, config: &ConnectConfig) -> Result<Box<dyn ProtocolAdapter>, CoreError> {
        let config = config.clone();
        match config.protocol {
            #[cfg(feature = "ftp")]
            ProtocolKind::Ftp | ProtocolKind::Ftps => {
                let adapter = tokio::task::spawn_blocking(move || {
                    crate::backends::ftp::FtpAdapter::connect(&config)
                })
                .await
                .map_err(|e| CoreError::Connection(format!("Task join failed: {e}")))??;
                Ok(Box::new(adapter))
            }
            #[cfg(feature = "sftp")]
            ProtocolKind::Sftp => {
                let adapter = tokio::task::spawn_blocking(move || {
                    crate::backends::sftp::SftpAdapter::connect(&config)
                })
                .await
                .map_err(|e| CoreError::Connection(format!("Task join failed: {e}")))??;
                Ok(Box::new(adapter))
            }
            #[allow(unreachable_patterns)]
            other => Err(CoreError::Unsupported(format!(
                "{other} support is not compiled in"
            ))),
        }
    }
}
