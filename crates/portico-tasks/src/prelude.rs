pub use crate::broker::TaskBroker;
pub use crate::config::{TaskBackendConfig, TasksConfig};
pub use crate::dispatcher::TaskDispatcher;
pub use crate::errors::TaskError;
pub use crate::memory::{InMemoryBroker, InMemoryResultStore};
pub use crate::model::{Delivery, TaskEnvelope, TaskId, TaskRecord, TaskState, TaskStatus};
pub use crate::ops::{builtin_registry, CapabilityInvokeOp, PingOp};
pub use crate::registry::{Operation, OperationRegistry};
pub use crate::results::ResultStore;
pub use crate::worker::{WorkerPool, WorkerPoolConfig};

#[cfg(feature = "redis-backend")]
pub use crate::redis::{RedisBackend, RedisBroker, RedisResultStore};
