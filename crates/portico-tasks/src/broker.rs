use async_trait::async_trait;

use crate::errors::TaskError;
use crate::model::{Delivery, TaskEnvelope};

/// Ordered at-least-once delivery of task envelopes. The broker owns all
/// in-flight state; producers and workers share nothing else.
#[async_trait]
pub trait TaskBroker: Send + Sync {
    async fn publish(&self, queue: &str, task: &TaskEnvelope) -> Result<(), TaskError>;

    /// Take the next envelope off the queue under a lease. Returns `None`
    /// when the queue is empty; never blocks past the backend's own I/O.
    async fn pull(
        &self,
        queue: &str,
        worker: &str,
        lease_ms: i64,
    ) -> Result<Option<Delivery>, TaskError>;

    async fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), TaskError>;

    /// Requeue deliveries stranded by a crashed worker. Called once at
    /// worker-pool startup; returns how many envelopes were requeued.
    async fn recover(&self, queue: &str) -> Result<usize, TaskError>;
}
