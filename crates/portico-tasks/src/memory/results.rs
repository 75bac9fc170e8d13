use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use portico_types::prelude::now_ms;

use crate::errors::TaskError;
use crate::model::{TaskId, TaskRecord};
use crate::results::ResultStore;

struct StoredRecord {
    record: TaskRecord,
    expires_at: i64,
}

/// Process-local result store. Expiry is applied lazily on read.
#[derive(Default, Clone)]
pub struct InMemoryResultStore {
    inner: Arc<RwLock<HashMap<String, StoredRecord>>>,
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, record: TaskRecord, ttl_ms: i64) -> Result<(), TaskError> {
        let mut guard = self.inner.write();
        guard.insert(
            record.id.0.clone(),
            StoredRecord {
                record,
                expires_at: now_ms() + ttl_ms,
            },
        );
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> Result<Option<TaskRecord>, TaskError> {
        let mut guard = self.inner.write();
        match guard.get(&id.0) {
            None => Ok(None),
            Some(stored) if stored.expires_at <= now_ms() => {
                guard.remove(&id.0);
                Ok(None)
            }
            Some(stored) => Ok(Some(stored.record.clone())),
        }
    }
}
