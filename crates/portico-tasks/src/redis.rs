//! Redis-backed broker and result store.
//!
//! Queue protocol: `LPUSH` onto the queue list, `RPOPLPUSH` into a
//! per-queue processing list so a crashed worker's deliveries survive,
//! `LREM` from the processing list on ack. `recover` drains the
//! processing list back onto the queue at worker-pool startup. Results
//! are plain keys written with `SET .. EX`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use crate::broker::TaskBroker;
use crate::errors::TaskError;
use crate::model::{Delivery, TaskEnvelope, TaskId, TaskRecord};
use crate::results::ResultStore;

#[derive(Clone)]
pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    /// Connect once at startup; the managed connection reconnects on its
    /// own and is shared for the process lifetime.
    pub async fn connect(url: &str) -> Result<Self, TaskError> {
        let client = redis::Client::open(url)
            .map_err(|err| TaskError::provider_unavailable(&format!("redis url: {err}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| TaskError::provider_unavailable(&format!("redis connect: {err}")))?;
        Ok(Self { manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

fn processing_key(queue: &str) -> String {
    format!("{queue}:processing")
}

fn result_key(id: &TaskId) -> String {
    format!("portico:result:{id}")
}

#[derive(Clone)]
pub struct RedisBroker {
    backend: RedisBackend,
}

impl RedisBroker {
    pub fn new(backend: RedisBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl TaskBroker for RedisBroker {
    async fn publish(&self, queue: &str, task: &TaskEnvelope) -> Result<(), TaskError> {
        let payload = serde_json::to_string(task)
            .map_err(|err| TaskError::unknown(&format!("encode task: {err}")))?;
        let mut conn = self.backend.conn();
        let _: () = conn
            .lpush(queue, payload)
            .await
            .map_err(|err| TaskError::provider_unavailable(&format!("redis lpush: {err}")))?;
        Ok(())
    }

    async fn pull(
        &self,
        queue: &str,
        _worker: &str,
        _lease_ms: i64,
    ) -> Result<Option<Delivery>, TaskError> {
        let mut conn = self.backend.conn();
        let raw: Option<String> = conn
            .rpoplpush(queue, processing_key(queue))
            .await
            .map_err(|err| TaskError::provider_unavailable(&format!("redis rpoplpush: {err}")))?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str::<TaskEnvelope>(&raw) {
            Ok(task) => Ok(Some(Delivery { task, receipt: raw })),
            Err(err) => {
                // Drop the poison entry so it cannot wedge the queue.
                warn!(queue, "discarding undecodable task payload: {err}");
                let _: i64 = conn
                    .lrem(processing_key(queue), 1, &raw)
                    .await
                    .map_err(|err| {
                        TaskError::provider_unavailable(&format!("redis lrem: {err}"))
                    })?;
                Ok(None)
            }
        }
    }

    async fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), TaskError> {
        let mut conn = self.backend.conn();
        let removed: i64 = conn
            .lrem(processing_key(queue), 1, &delivery.receipt)
            .await
            .map_err(|err| TaskError::provider_unavailable(&format!("redis lrem: {err}")))?;
        if removed == 0 {
            return Err(TaskError::not_found("delivery is not in flight"));
        }
        Ok(())
    }

    async fn recover(&self, queue: &str) -> Result<usize, TaskError> {
        let mut conn = self.backend.conn();
        let mut count = 0usize;
        loop {
            let moved: Option<String> = conn
                .rpoplpush(processing_key(queue), queue)
                .await
                .map_err(|err| {
                    TaskError::provider_unavailable(&format!("redis recover: {err}"))
                })?;
            if moved.is_none() {
                break;
            }
            count += 1;
        }
        Ok(count)
    }
}

#[derive(Clone)]
pub struct RedisResultStore {
    backend: RedisBackend,
}

impl RedisResultStore {
    pub fn new(backend: RedisBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ResultStore for RedisResultStore {
    async fn put(&self, record: TaskRecord, ttl_ms: i64) -> Result<(), TaskError> {
        let payload = serde_json::to_string(&record)
            .map_err(|err| TaskError::unknown(&format!("encode result: {err}")))?;
        let ttl_secs = (ttl_ms / 1_000).max(1) as u64;
        let mut conn = self.backend.conn();
        let _: () = conn
            .set_ex(result_key(&record.id), payload, ttl_secs)
            .await
            .map_err(|err| TaskError::provider_unavailable(&format!("redis set: {err}")))?;
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> Result<Option<TaskRecord>, TaskError> {
        let mut conn = self.backend.conn();
        let raw: Option<String> = conn
            .get(result_key(id))
            .await
            .map_err(|err| TaskError::provider_unavailable(&format!("redis get: {err}")))?;
        match raw {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|err| TaskError::unknown(&format!("decode result: {err}"))),
        }
    }
}
