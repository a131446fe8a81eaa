//! The `run` command: scheduler plus IPC bridge in the foreground.

use std::sync::Arc;

use tracing::{error, info};

use crontaber_api::{BridgeConfig, IpcRouter, IpcServer};
use crontaber_config::Config;
use crontaber_core::{
    CommandExecutor, FileJobStore, JobStore, JobsService, SchedulerRegistry, ShellExecutor,
};

/// Build the jobs service from configuration.
pub(crate) async fn build_service(
    config: &Config,
) -> Result<Arc<JobsService>, Box<dyn std::error::Error>> {
    let mut store = FileJobStore::new(&config.storage.data_dir).await?;
    if let Some(max) = config.storage.max_executions_per_job {
        store = store.with_retention(max);
    }
    let store: Arc<dyn JobStore> = Arc::new(store);

    let executor: Arc<dyn CommandExecutor> = match &config.executor.shell {
        Some(shell) => Arc::new(ShellExecutor::with_shell(shell)),
        None => Arc::new(ShellExecutor::new()),
    };

    let registry = SchedulerRegistry::new(store.clone(), executor);
    Ok(Arc::new(JobsService::new(store, registry)))
}

/// Run until Ctrl+C.
pub(crate) async fn run_scheduler(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting Crontaber v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", config.storage.data_dir.display());

    let service = build_service(&config).await?;
    let armed = service.start_jobs().await?;
    info!("{} jobs armed", armed);

    let bridge = BridgeConfig::new(config.server.host.clone(), config.server.port);
    let server = IpcServer::new(bridge, IpcRouter::new(service.clone()));
    let result = server.run(shutdown_signal()).await;

    service.shutdown();
    info!("Crontaber stopped");
    result
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crontaber_core::{JobStatus, NewJob};
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = temp_dir.path().to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_build_service_uses_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let service = build_service(&test_config(&temp_dir)).await.unwrap();
        assert!(temp_dir.path().join("jobs").is_dir());

        service.start_jobs().await.unwrap();
        let job = service
            .create_job(NewJob {
                name: "ping".to_string(),
                command: "echo ping".to_string(),
                frequency: "@hourly".to_string(),
                auto_start: true,
                ..NewJob::default()
            })
            .await
            .unwrap();
        assert!(
            temp_dir
                .path()
                .join("jobs")
                .join(format!("{}.json", job.id))
                .exists()
        );
        service.shutdown();
    }

    #[tokio::test]
    async fn test_build_service_applies_retention() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.storage.max_executions_per_job = Some(1);

        let service = build_service(&config).await.unwrap();
        service.start_jobs().await.unwrap();
        let job = service
            .create_job(NewJob {
                name: "twice".to_string(),
                command: "echo twice".to_string(),
                frequency: "@daily".to_string(),
                auto_start: true,
                ..NewJob::default()
            })
            .await
            .unwrap();

        let timer = service.registry().find(&job.id).unwrap();
        timer.fire().await;
        timer.fire().await;

        let view = service.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(view.job.executions.len(), 1);
        assert_eq!(view.status, JobStatus::Active);
        service.shutdown();
    }
}
