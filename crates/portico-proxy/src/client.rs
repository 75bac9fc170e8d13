use std::time::Instant;

use async_trait::async_trait;

use crate::endpoint::CapabilityEndpoint;
use crate::errors::ProxyError;
use crate::policy::PoolPolicy;
use crate::types::{Body, ForwardRequest, ForwardResponse};

#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Perform one downstream call. No retry is attempted; the retry
    /// policy, if any, belongs to the caller.
    async fn forward(
        &self,
        endpoint: &CapabilityEndpoint,
        request: ForwardRequest,
    ) -> Result<ForwardResponse, ProxyError>;
}

#[derive(Clone)]
pub struct ReqwestForwarder {
    client: reqwest::Client,
}

#[async_trait]
impl Forwarder for ReqwestForwarder {
    async fn forward(
        &self,
        endpoint: &CapabilityEndpoint,
        request: ForwardRequest,
    ) -> Result<ForwardResponse, ProxyError> {
        let url = endpoint.url_for(request.path.as_deref(), request.query.as_deref())?;
        let method = request.method.unwrap_or_else(|| endpoint.method.clone());

        let mut req_builder = self
            .client
            .request(method, url)
            .timeout(endpoint.timeout);

        match &request.body {
            Body::Empty => {}
            Body::Bytes(bytes) => {
                req_builder = req_builder.body(bytes.clone());
            }
            Body::Json(value) => {
                req_builder = req_builder.json(value);
            }
        }

        let start = Instant::now();
        let response = req_builder.send().await.map_err(|err| {
            if err.is_timeout() {
                ProxyError::Timeout {
                    timeout_ms: endpoint.timeout.as_millis() as u64,
                }
            } else if err.is_connect() {
                ProxyError::unreachable(&format!("connect error: {err}"))
            } else {
                ProxyError::unreachable(&format!("request error: {err}"))
            }
        })?;

        let status = response.status();
        let body_bytes = response.bytes().await.map_err(|err| {
            if err.is_timeout() {
                ProxyError::Timeout {
                    timeout_ms: endpoint.timeout.as_millis() as u64,
                }
            } else {
                ProxyError::unreachable(&format!("response body error: {err}"))
            }
        })?;

        let body = if body_bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body_bytes).map_err(|err| {
                ProxyError::MalformedUpstreamBody {
                    detail: format!("invalid json from upstream: {err}"),
                }
            })?
        };

        Ok(ForwardResponse {
            status,
            body,
            elapsed: start.elapsed(),
        })
    }
}

#[derive(Default)]
pub struct ForwarderBuilder {
    policy: PoolPolicy,
    client: Option<reqwest::Client>,
}

impl ForwarderBuilder {
    pub fn with_policy(mut self, policy: PoolPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<ReqwestForwarder, ProxyError> {
        let client = match self.client {
            Some(client) => client,
            None => build_reqwest_client(&self.policy)?,
        };
        Ok(ReqwestForwarder { client })
    }
}

fn build_reqwest_client(policy: &PoolPolicy) -> Result<reqwest::Client, ProxyError> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .tcp_keepalive(Some(policy.tcp_keepalive))
        .connect_timeout(policy.connect_timeout)
        .pool_max_idle_per_host(policy.max_idle_per_host)
        .build()
        .map_err(|err| ProxyError::invalid_request(&format!("failed to build http client: {err}")))
}
