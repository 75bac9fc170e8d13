use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use portico_types::prelude::now_ms;

use crate::broker::TaskBroker;
use crate::errors::TaskError;
use crate::model::{Delivery, TaskEnvelope};

struct LeasedTask {
    task: TaskEnvelope,
    lease_until: i64,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<TaskEnvelope>,
    in_flight: HashMap<String, LeasedTask>,
}

impl QueueState {
    fn requeue_expired(&mut self, now: i64) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, leased)| leased.lease_until <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();
        for receipt in expired {
            if let Some(leased) = self.in_flight.remove(&receipt) {
                self.ready.push_front(leased.task);
            }
        }
    }
}

/// Process-local FIFO broker with lease-based redelivery. Suitable for a
/// single deployable (inline worker pool) and for tests.
#[derive(Default, Clone)]
pub struct InMemoryBroker {
    inner: Arc<RwLock<HashMap<String, QueueState>>>,
}

#[async_trait]
impl TaskBroker for InMemoryBroker {
    async fn publish(&self, queue: &str, task: &TaskEnvelope) -> Result<(), TaskError> {
        let mut guard = self.inner.write();
        guard
            .entry(queue.to_string())
            .or_default()
            .ready
            .push_back(task.clone());
        Ok(())
    }

    async fn pull(
        &self,
        queue: &str,
        _worker: &str,
        lease_ms: i64,
    ) -> Result<Option<Delivery>, TaskError> {
        let now = now_ms();
        let mut guard = self.inner.write();
        let state = guard.entry(queue.to_string()).or_default();
        state.requeue_expired(now);

        let Some(mut task) = state.ready.pop_front() else {
            return Ok(None);
        };
        task.attempts += 1;
        let receipt = task.id.0.clone();
        state.in_flight.insert(
            receipt.clone(),
            LeasedTask {
                task: task.clone(),
                lease_until: now + lease_ms,
            },
        );
        Ok(Some(Delivery { task, receipt }))
    }

    async fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), TaskError> {
        let mut guard = self.inner.write();
        let state = guard
            .get_mut(queue)
            .ok_or_else(|| TaskError::not_found("queue has no in-flight deliveries"))?;
        if state.in_flight.remove(&delivery.receipt).is_none() {
            return Err(TaskError::not_found("delivery is not in flight"));
        }
        Ok(())
    }

    async fn recover(&self, queue: &str) -> Result<usize, TaskError> {
        let mut guard = self.inner.write();
        let Some(state) = guard.get_mut(queue) else {
            return Ok(0);
        };
        let receipts: Vec<String> = state.in_flight.keys().cloned().collect();
        let count = receipts.len();
        for receipt in receipts {
            if let Some(leased) = state.in_flight.remove(&receipt) {
                state.ready.push_front(leased.task);
            }
        }
        Ok(count)
    }
}
