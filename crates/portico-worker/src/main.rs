use std::{env, path::Path, sync::Arc};

use anyhow::Context;
use config::Config;
use portico_proxy::prelude::{CapabilitiesConfig, Forwarder, ForwarderBuilder};
use portico_tasks::prelude::{builtin_registry, TaskBackendConfig, TasksConfig, WorkerPool};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize, Serialize)]
struct WorkerConfig {
    #[serde(default)]
    capabilities: CapabilitiesConfig,
    #[serde(default)]
    tasks: TasksConfig,
}

impl WorkerConfig {
    fn load() -> anyhow::Result<Self> {
        let config_file = env::var("WORKER_CONFIG_FILE")
            .unwrap_or_else(|_| "config/worker.local.toml".to_string());

        let mut builder = Config::builder();
        if Path::new(&config_file).exists() {
            builder = builder.add_source(config::File::from(Path::new(&config_file)));
        }
        builder = builder.add_source(config::Environment::with_prefix("WORKER").separator("__"));

        let config: WorkerConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = WorkerConfig::load()?;
    if matches!(config.tasks.backend, TaskBackendConfig::Memory) {
        warn!("memory task backend is process-local; results are invisible to other processes");
    }

    let capabilities = Arc::new(
        config
            .capabilities
            .build_registry()
            .map_err(|err| anyhow::anyhow!("capability config: {err}"))?,
    );
    let forwarder: Arc<dyn Forwarder> = Arc::new(
        ForwarderBuilder::default()
            .build()
            .map_err(|err| anyhow::anyhow!("http client: {err}"))?,
    );
    let registry = Arc::new(builtin_registry(forwarder, capabilities));

    let (broker, results) = config
        .tasks
        .build_backends()
        .await
        .map_err(|err| anyhow::anyhow!("task backends: {err}"))?;
    let pool = WorkerPool::new(broker, results, registry, config.tasks.worker_pool_config());

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    info!(queue = %config.tasks.queue, workers = config.tasks.workers, "worker pool starting");
    pool.run(stop_rx)
        .await
        .map_err(|err| anyhow::anyhow!("worker pool failure: {err}"))?;
    info!("worker pool stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
