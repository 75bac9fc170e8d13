use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::Value;

#[derive(Clone, Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Bytes),
    Json(Value),
}

/// An opaque payload headed for a capability endpoint. `method` and `path`
/// default to the endpoint's own; operations may override them.
#[derive(Clone, Debug, Default)]
pub struct ForwardRequest {
    pub method: Option<Method>,
    pub path: Option<String>,
    pub query: Option<String>,
    pub body: Body,
}

impl ForwardRequest {
    pub fn json(value: Value) -> Self {
        Self {
            body: Body::Json(value),
            ..Self::default()
        }
    }

    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }
}

/// The downstream's answer, untouched: its status code and parsed body.
#[derive(Clone, Debug)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub body: Value,
    pub elapsed: Duration,
}
