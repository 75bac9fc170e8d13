//! Built-in operations shared by the gateway's inline pool and the
//! standalone worker binary.

use std::sync::Arc;

use async_trait::async_trait;
use http::Method;
use portico_proxy::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::TaskError;
use crate::registry::{Operation, OperationRegistry};

/// Liveness stub: proves the queue, a worker, and the result store are
/// wired together without touching any downstream.
pub struct PingOp;

#[async_trait]
impl Operation for PingOp {
    async fn run(&self, _args: Value) -> Result<Value, TaskError> {
        Ok(Value::String("pong".into()))
    }
}

#[derive(Deserialize)]
struct InvokeArgs {
    capability: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
}

/// Asynchronous counterpart of the gateway's relay routes: forwards the
/// payload to a named capability through the proxy core and records the
/// relayed status and body as the task result.
pub struct CapabilityInvokeOp {
    forwarder: Arc<dyn Forwarder>,
    capabilities: Arc<CapabilityRegistry>,
}

impl CapabilityInvokeOp {
    pub fn new(forwarder: Arc<dyn Forwarder>, capabilities: Arc<CapabilityRegistry>) -> Self {
        Self {
            forwarder,
            capabilities,
        }
    }
}

#[async_trait]
impl Operation for CapabilityInvokeOp {
    async fn run(&self, args: Value) -> Result<Value, TaskError> {
        let args: InvokeArgs = serde_json::from_value(args)
            .map_err(|err| TaskError::schema(&format!("invalid invoke args: {err}")))?;

        let endpoint = self
            .capabilities
            .endpoint(&args.capability)
            .ok_or_else(|| {
                TaskError::schema(&format!("unknown capability: {}", args.capability))
            })?
            .clone();

        let method = match args.method.as_deref() {
            None => None,
            Some(raw) => Some(
                Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
                    .map_err(|err| TaskError::schema(&format!("invalid method {raw}: {err}")))?,
            ),
        };

        let request = ForwardRequest {
            method,
            path: args.path,
            query: args.query,
            body: match args.payload {
                Some(payload) => Body::Json(payload),
                None => Body::Empty,
            },
        };

        let response = self.forwarder.forward(&endpoint, request).await?;
        Ok(json!({
            "status": response.status.as_u16(),
            "body": response.body,
        }))
    }
}

/// The registry both binaries start from.
pub fn builtin_registry(
    forwarder: Arc<dyn Forwarder>,
    capabilities: Arc<CapabilityRegistry>,
) -> OperationRegistry {
    let mut registry = OperationRegistry::default();
    registry.register("ping", Arc::new(PingOp));
    registry.register(
        "capability.invoke",
        Arc::new(CapabilityInvokeOp::new(forwarder, capabilities)),
    );
    registry
}
