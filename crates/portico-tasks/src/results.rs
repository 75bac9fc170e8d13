use async_trait::async_trait;

use crate::errors::TaskError;
use crate::model::{TaskId, TaskRecord};

/// Keyed store of task outcomes (and pending markers). Records expire per
/// the retention TTL; a missing record reads as "unknown identifier".
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn put(&self, record: TaskRecord, ttl_ms: i64) -> Result<(), TaskError>;

    async fn get(&self, id: &TaskId) -> Result<Option<TaskRecord>, TaskError>;
}
