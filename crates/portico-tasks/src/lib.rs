//! Task dispatch layer: decouples task submission from execution.
//!
//! Producers call [`dispatcher::TaskDispatcher::enqueue`] and get a task id
//! back immediately; a [`worker::WorkerPool`] pulls envelopes from a
//! [`broker::TaskBroker`], executes them through the
//! [`registry::OperationRegistry`], and writes outcomes to a
//! [`results::ResultStore`] for later polling. Backends are in-memory by
//! default; the `redis-backend` feature adds Redis implementations so the
//! gateway and the worker binary can run as separate processes.

pub mod broker;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod memory;
pub mod model;
pub mod ops;
pub mod registry;
pub mod results;
pub mod worker;
pub mod prelude;

#[cfg(feature = "redis-backend")]
pub mod redis;
