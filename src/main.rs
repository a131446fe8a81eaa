//! Crontaber - recurring shell command scheduler.
//!
//! Main entry point for the scheduler daemon and its CLI client.

use std::path::Path;

use clap::Parser;
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crontaber_config::{Config, ConfigLoader, ConfigValidator};

mod cli;
mod client;
mod cmd_job;
mod cmd_run;

use cli::{Cli, Commands};
use client::IpcClient;

/// Initialize tracing with console output and, optionally, a daily log file.
fn init_tracing(config: &Config, log_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let file_layer = match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("crontaber")
                .filename_suffix("log")
                .max_log_files(30)
                .build(log_dir)?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // The guard flushes the file writer on drop; keep it for the
            // whole program.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Commands::Run {
        host: None,
        port: None,
    });

    // Only the scheduler writes log files; client commands log to stderr.
    let log_dir = match &command {
        Commands::Run { .. } if config.logging.file => Some(config.storage.logs_dir()),
        _ => None,
    };
    init_tracing(&config, log_dir.as_deref())?;

    let warnings = ConfigValidator::validate(&config).into_result()?;
    for warning in warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }

    match command {
        Commands::Run { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_run::run_scheduler(config).await
        }
        Commands::Job { action } => {
            let client = IpcClient::new(config.server.base_url());
            cmd_job::handle_job_command(&client, action).await
        }
        Commands::Schedule { action } => cmd_job::handle_schedule_command(action),
    }
}
