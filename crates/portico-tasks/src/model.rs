use portico_types::prelude::now_ms;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new_random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The unit of asynchronous work as it travels through the broker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: TaskId,
    pub operation: String,
    pub args: Value,
    pub enqueued_at: i64,
    #[serde(default)]
    pub attempts: u32,
}

impl TaskEnvelope {
    pub fn new(operation: &str, args: Value) -> Self {
        Self {
            id: TaskId::new_random(),
            operation: operation.to_string(),
            args,
            enqueued_at: now_ms(),
            attempts: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Succeeded { result: Value },
    Failed { code: String, message: String },
}

/// What the result store holds for one task id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    #[serde(flatten)]
    pub status: TaskStatus,
    pub updated_at: i64,
}

impl TaskRecord {
    pub fn pending(id: TaskId) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            updated_at: now_ms(),
        }
    }

    pub fn succeeded(id: TaskId, result: Value) -> Self {
        Self {
            id,
            status: TaskStatus::Succeeded { result },
            updated_at: now_ms(),
        }
    }

    pub fn failed(id: TaskId, code: &str, message: String) -> Self {
        Self {
            id,
            status: TaskStatus::Failed {
                code: code.to_string(),
                message,
            },
            updated_at: now_ms(),
        }
    }
}

/// Poll outcome. `Unknown` means the identifier was never issued or its
/// record has expired; a lost task stays `Pending` until expiry.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskState {
    Pending,
    Succeeded(Value),
    Failed { code: String, message: String },
    Unknown,
}

/// One leased delivery from the broker. `receipt` is what `ack` needs to
/// settle it and is backend-specific.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub task: TaskEnvelope,
    pub receipt: String,
}
