use serde::Serialize;

use crate::codes::ErrorCode;

/// Full error record. `message_user` is safe to show to callers;
/// `message_dev` may carry transport detail and stays in logs.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{code}: {message_user}")]
pub struct ErrorObj {
    pub code: ErrorCode,
    pub http_status: u16,
    pub message_user: String,
    pub message_dev: Option<String>,
}

impl ErrorObj {
    pub fn to_public(&self) -> PublicErrorView {
        PublicErrorView {
            code: self.code.id,
            message: self.message_user.clone(),
        }
    }
}

/// Caller-visible projection of an [`ErrorObj`]. Serialized as the body of
/// every gateway-generated error response.
#[derive(Clone, Debug, Serialize)]
pub struct PublicErrorView {
    pub code: &'static str,
    pub message: String,
}

pub struct ErrorBuilder {
    code: ErrorCode,
    http_status: u16,
    message_user: Option<String>,
    message_dev: Option<String>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            http_status: code.http_status,
            message_user: None,
            message_dev: None,
        }
    }

    pub fn user_msg(mut self, msg: impl Into<String>) -> Self {
        self.message_user = Some(msg.into());
        self
    }

    pub fn dev_msg(mut self, msg: impl Into<String>) -> Self {
        self.message_dev = Some(msg.into());
        self
    }

    pub fn http_status(mut self, status: u16) -> Self {
        self.http_status = status;
        self
    }

    pub fn build(self) -> ErrorObj {
        ErrorObj {
            code: self.code,
            http_status: self.http_status,
            message_user: self
                .message_user
                .unwrap_or_else(|| "Request failed.".to_string()),
            message_dev: self.message_dev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes;

    #[test]
    fn public_view_hides_dev_detail() {
        let obj = ErrorBuilder::new(codes::UPSTREAM_UNREACHABLE)
            .user_msg("Upstream service is unreachable.")
            .dev_msg("connect error: tcp 127.0.0.1:1 refused")
            .build();
        let view = obj.to_public();
        assert_eq!(view.code, "NET.UPSTREAM_UNREACHABLE");
        let encoded = serde_json::to_value(&view).unwrap();
        assert!(encoded.get("message_dev").is_none());
        assert_eq!(encoded["code"], "NET.UPSTREAM_UNREACHABLE");
    }

    #[test]
    fn builder_defaults_status_from_code() {
        let obj = ErrorBuilder::new(codes::UPSTREAM_TIMEOUT).build();
        assert_eq!(obj.http_status, 504);
        let overridden = ErrorBuilder::new(codes::UPSTREAM_TIMEOUT)
            .http_status(503)
            .build();
        assert_eq!(overridden.http_status, 503);
    }
}
