//! IPC bridge server.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use crate::ipc::IpcRouter;
use crate::routes::create_router;

/// Bridge listener configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
}

impl BridgeConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7420,
        }
    }
}

/// HTTP server exposing the IPC channels.
pub struct IpcServer {
    config: BridgeConfig,
    router: IpcRouter,
}

impl IpcServer {
    pub fn new(config: BridgeConfig, router: IpcRouter) -> Self {
        Self { config, router }
    }

    /// Get the server address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.router.clone());

        let addr: SocketAddr = self.addr().parse()?;
        let listener = TcpListener::bind(addr).await?;

        info!("IPC bridge listening on {}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("IPC bridge stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crontaber_core::{JobsService, MemoryJobStore, SchedulerRegistry, ShellExecutor};

    fn create_test_router() -> IpcRouter {
        let store = Arc::new(MemoryJobStore::new());
        let registry = SchedulerRegistry::new(store.clone(), Arc::new(ShellExecutor::new()));
        IpcRouter::new(Arc::new(JobsService::new(store, registry)))
    }

    #[test]
    fn test_bridge_config_default() {
        let config = BridgeConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 7420);
    }

    #[test]
    fn test_server_addr() {
        let server = IpcServer::new(BridgeConfig::new("0.0.0.0", 3000), create_test_router());
        assert_eq!(server.addr(), "0.0.0.0:3000");
    }

    #[tokio::test]
    async fn test_run_rejects_bad_address() {
        let server = IpcServer::new(BridgeConfig::new("not an ip", 80), create_test_router());
        assert!(server.run(async {}).await.is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let server = IpcServer::new(BridgeConfig::new("127.0.0.1", 0), create_test_router());
        server.run(async {}).await.unwrap();
    }
}
