use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::broker::TaskBroker;
use crate::errors::TaskError;
use crate::memory::{InMemoryBroker, InMemoryResultStore};
use crate::results::ResultStore;
use crate::worker::WorkerPoolConfig;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskBackendConfig {
    Memory,
    Redis {
        #[serde(default = "default_redis_url")]
        url: String,
    },
}

impl Default for TaskBackendConfig {
    fn default() -> Self {
        TaskBackendConfig::Memory
    }
}

fn default_redis_url() -> String {
    "redis://portico-redis:6379/0".to_string()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TasksConfig {
    #[serde(default)]
    pub backend: TaskBackendConfig,
    #[serde(default = "TasksConfig::default_queue")]
    pub queue: String,
    #[serde(default = "TasksConfig::default_workers")]
    pub workers: usize,
    #[serde(default = "TasksConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "TasksConfig::default_lease_ms")]
    pub lease_ms: i64,
    #[serde(default = "TasksConfig::default_result_ttl_ms")]
    pub result_ttl_ms: i64,
    /// Run the worker pool inside the enqueuing process. Defaults to true
    /// for the memory backend (nothing else could drain the queue) and
    /// false for redis.
    #[serde(default)]
    pub inline_worker: Option<bool>,
}

impl TasksConfig {
    fn default_queue() -> String {
        "portico.tasks".to_string()
    }

    fn default_workers() -> usize {
        4
    }

    fn default_poll_interval_ms() -> u64 {
        250
    }

    fn default_lease_ms() -> i64 {
        60_000
    }

    fn default_result_ttl_ms() -> i64 {
        86_400_000
    }

    pub fn run_inline_worker(&self) -> bool {
        self.inline_worker
            .unwrap_or(matches!(self.backend, TaskBackendConfig::Memory))
    }

    pub fn worker_pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            queue: self.queue.clone(),
            workers: self.workers,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            lease_ms: self.lease_ms,
            result_ttl_ms: self.result_ttl_ms,
        }
    }

    pub async fn build_backends(
        &self,
    ) -> Result<(Arc<dyn TaskBroker>, Arc<dyn ResultStore>), TaskError> {
        match &self.backend {
            TaskBackendConfig::Memory => Ok((
                Arc::new(InMemoryBroker::default()),
                Arc::new(InMemoryResultStore::default()),
            )),
            #[cfg(feature = "redis-backend")]
            TaskBackendConfig::Redis { url } => {
                let backend = crate::redis::RedisBackend::connect(url).await?;
                Ok((
                    Arc::new(crate::redis::RedisBroker::new(backend.clone())),
                    Arc::new(crate::redis::RedisResultStore::new(backend)),
                ))
            }
            #[cfg(not(feature = "redis-backend"))]
            TaskBackendConfig::Redis { .. } => Err(TaskError::feature_disabled(
                "redis-backend",
                "task backend 'redis' is not compiled in",
            )),
        }
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            backend: TaskBackendConfig::default(),
            queue: Self::default_queue(),
            workers: Self::default_workers(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            lease_ms: Self::default_lease_ms(),
            result_ttl_ms: Self::default_result_ttl_ms(),
            inline_worker: None,
        }
    }
}
