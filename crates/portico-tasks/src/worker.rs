use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::broker::TaskBroker;
use crate::errors::TaskError;
use crate::model::{Delivery, TaskRecord};
use crate::registry::OperationRegistry;
use crate::results::ResultStore;

#[derive(Clone, Debug)]
pub struct WorkerPoolConfig {
    pub queue: String,
    pub workers: usize,
    pub poll_interval: Duration,
    pub lease_ms: i64,
    pub result_ttl_ms: i64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            queue: "portico.tasks".into(),
            workers: 4,
            poll_interval: Duration::from_millis(250),
            lease_ms: 60_000,
            result_ttl_ms: 86_400_000,
        }
    }
}

/// Pulls envelopes, executes them through the registry, writes outcomes.
/// A handler failure fails the task, never the worker.
pub struct WorkerPool {
    broker: Arc<dyn TaskBroker>,
    results: Arc<dyn ResultStore>,
    registry: Arc<OperationRegistry>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(
        broker: Arc<dyn TaskBroker>,
        results: Arc<dyn ResultStore>,
        registry: Arc<OperationRegistry>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            broker,
            results,
            registry,
            config,
        }
    }

    /// Run until every worker has observed the shutdown signal.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), TaskError> {
        let requeued = self.broker.recover(&self.config.queue).await?;
        if requeued > 0 {
            info!(queue = %self.config.queue, requeued, "requeued stranded deliveries");
        }

        let mut workers = JoinSet::new();
        for index in 0..self.config.workers.max(1) {
            let broker = self.broker.clone();
            let results = self.results.clone();
            let registry = self.registry.clone();
            let config = self.config.clone();
            let shutdown = shutdown.clone();
            let worker_id = format!("worker-{index}");
            workers.spawn(async move {
                worker_loop(broker, results, registry, config, shutdown, worker_id).await;
            });
        }

        while workers.join_next().await.is_some() {}
        Ok(())
    }
}

async fn worker_loop(
    broker: Arc<dyn TaskBroker>,
    results: Arc<dyn ResultStore>,
    registry: Arc<OperationRegistry>,
    config: WorkerPoolConfig,
    mut shutdown: watch::Receiver<bool>,
    worker_id: String,
) {
    loop {
        if *shutdown.borrow() {
            info!(worker = %worker_id, "worker stopping");
            return;
        }

        match broker
            .pull(&config.queue, &worker_id, config.lease_ms)
            .await
        {
            Ok(Some(delivery)) => {
                execute(&broker, &results, &registry, &config, &worker_id, delivery).await;
            }
            Ok(None) => {
                if idle_wait(&mut shutdown, config.poll_interval).await {
                    return;
                }
            }
            Err(err) => {
                warn!(worker = %worker_id, "broker pull failed: {err}");
                if idle_wait(&mut shutdown, config.poll_interval).await {
                    return;
                }
            }
        }
    }
}

/// Sleep between pulls, waking early on shutdown. Returns true when the
/// worker should stop (signal flipped or every sender is gone).
async fn idle_wait(shutdown: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    tokio::select! {
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        _ = tokio::time::sleep(interval) => false,
    }
}

async fn execute(
    broker: &Arc<dyn TaskBroker>,
    results: &Arc<dyn ResultStore>,
    registry: &Arc<OperationRegistry>,
    config: &WorkerPoolConfig,
    worker_id: &str,
    delivery: Delivery,
) {
    let task = delivery.task.clone();
    let record = match registry.dispatch(&task.operation, task.args.clone()).await {
        Ok(result) => TaskRecord::succeeded(task.id.clone(), result),
        Err(err) => {
            let obj = err.into_inner();
            warn!(
                worker = %worker_id,
                task = %task.id,
                operation = %task.operation,
                code = %obj.code,
                "task failed: {}",
                obj.message_dev.as_deref().unwrap_or(&obj.message_user)
            );
            TaskRecord::failed(task.id.clone(), obj.code.id, obj.message_user)
        }
    };

    if let Err(err) = results.put(record, config.result_ttl_ms).await {
        // No ack: the lease lapses and the envelope is redelivered.
        warn!(worker = %worker_id, task = %task.id, "failed to store result: {err}");
        return;
    }

    if let Err(err) = broker.ack(&config.queue, &delivery).await {
        warn!(worker = %worker_id, task = %task.id, "ack failed: {err}");
    }
}
