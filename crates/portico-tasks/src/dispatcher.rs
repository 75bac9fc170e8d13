use std::sync::Arc;

use serde_json::Value;

use crate::broker::TaskBroker;
use crate::errors::TaskError;
use crate::model::{TaskEnvelope, TaskId, TaskRecord, TaskState, TaskStatus};
use crate::results::ResultStore;

/// Producer-side handle: enqueue work, poll outcomes. Owned by the
/// gateway process; never waits on execution.
#[derive(Clone)]
pub struct TaskDispatcher {
    broker: Arc<dyn TaskBroker>,
    results: Arc<dyn ResultStore>,
    queue: String,
    result_ttl_ms: i64,
}

impl TaskDispatcher {
    pub fn new(
        broker: Arc<dyn TaskBroker>,
        results: Arc<dyn ResultStore>,
        queue: impl Into<String>,
        result_ttl_ms: i64,
    ) -> Self {
        Self {
            broker,
            results,
            queue: queue.into(),
            result_ttl_ms,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub async fn enqueue(&self, operation: &str, args: Value) -> Result<TaskId, TaskError> {
        let task = TaskEnvelope::new(operation, args);
        // Pending marker goes in before the publish: a poll racing the
        // enqueue must see `pending`, never `unknown`.
        self.results
            .put(TaskRecord::pending(task.id.clone()), self.result_ttl_ms)
            .await?;
        self.broker.publish(&self.queue, &task).await?;
        Ok(task.id)
    }

    pub async fn poll(&self, id: &TaskId) -> Result<TaskState, TaskError> {
        Ok(match self.results.get(id).await? {
            None => TaskState::Unknown,
            Some(record) => match record.status {
                TaskStatus::Pending => TaskState::Pending,
                TaskStatus::Succeeded { result } => TaskState::Succeeded(result),
                TaskStatus::Failed { code, message } => TaskState::Failed { code, message },
            },
        })
    }
}
