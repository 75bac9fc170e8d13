use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::TaskError;

/// One named asynchronous operation. Handlers must be idempotent or
/// side-effect-free on partial completion: the broker may deliver the
/// same envelope more than once after a worker crash.
#[async_trait]
pub trait Operation: Send + Sync {
    async fn run(&self, args: Value) -> Result<Value, TaskError>;
}

/// Name → handler table. Workers dispatch by operation name; an
/// unregistered name fails the task with a stable code.
#[derive(Default, Clone)]
pub struct OperationRegistry {
    handlers: HashMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn register(&mut self, name: &str, operation: Arc<dyn Operation>) {
        self.handlers.insert(name.to_string(), operation);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    pub async fn dispatch(&self, name: &str, args: Value) -> Result<Value, TaskError> {
        match self.get(name) {
            Some(operation) => operation.run(args).await,
            None => Err(TaskError::op_unknown(name)),
        }
    }
}
