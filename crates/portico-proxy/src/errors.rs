use portico_errors::prelude::*;

/// Transport-level failure of a downstream call. Downstream 4xx/5xx are
/// NOT errors here; a reachable backend's status is relayed verbatim.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("upstream unreachable: {detail}")]
    Unreachable { detail: String },
    #[error("upstream timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("upstream body malformed: {detail}")]
    MalformedUpstreamBody { detail: String },
    #[error("invalid proxy request: {detail}")]
    InvalidRequest { detail: String },
}

impl ProxyError {
    pub fn unreachable(detail: &str) -> Self {
        ProxyError::Unreachable {
            detail: detail.to_string(),
        }
    }

    pub fn invalid_request(detail: &str) -> Self {
        ProxyError::InvalidRequest {
            detail: detail.to_string(),
        }
    }

    /// Project into the shared error model for logging and HTTP surfaces.
    /// Connection internals stay in the dev message.
    pub fn error_obj(&self) -> ErrorObj {
        match self {
            ProxyError::Unreachable { detail } => ErrorBuilder::new(codes::UPSTREAM_UNREACHABLE)
                .user_msg("Upstream service is unreachable.")
                .dev_msg(detail.clone())
                .build(),
            ProxyError::Timeout { timeout_ms } => ErrorBuilder::new(codes::UPSTREAM_TIMEOUT)
                .user_msg("Upstream service did not respond in time.")
                .dev_msg(format!("no response within {timeout_ms}ms"))
                .build(),
            ProxyError::MalformedUpstreamBody { detail } => {
                ErrorBuilder::new(codes::UPSTREAM_MALFORMED)
                    .user_msg("Upstream service returned an unreadable response.")
                    .dev_msg(detail.clone())
                    .build()
            }
            ProxyError::InvalidRequest { detail } => ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                .user_msg("Request could not be forwarded.")
                .dev_msg(detail.clone())
                .build(),
        }
    }
}
