//! Stable error codes surfaced to callers.
//!
//! Codes are part of the public contract: callers branch on them to tell
//! "the backend rejected your request" apart from "the gateway could not
//! reach the backend". Add new codes here; never rename existing ones.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorCode {
    pub id: &'static str,
    pub http_status: u16,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id)
    }
}

pub const SCHEMA_VALIDATION: ErrorCode = ErrorCode {
    id: "SCHEMA.VALIDATION",
    http_status: 400,
};

pub const UPSTREAM_UNREACHABLE: ErrorCode = ErrorCode {
    id: "NET.UPSTREAM_UNREACHABLE",
    http_status: 502,
};

pub const UPSTREAM_TIMEOUT: ErrorCode = ErrorCode {
    id: "NET.UPSTREAM_TIMEOUT",
    http_status: 504,
};

pub const UPSTREAM_MALFORMED: ErrorCode = ErrorCode {
    id: "NET.UPSTREAM_MALFORMED",
    http_status: 502,
};

pub const TASK_UNKNOWN: ErrorCode = ErrorCode {
    id: "TASK.UNKNOWN",
    http_status: 404,
};

pub const TASK_OP_UNKNOWN: ErrorCode = ErrorCode {
    id: "TASK.OP_UNKNOWN",
    http_status: 422,
};

pub const PROVIDER_UNAVAILABLE: ErrorCode = ErrorCode {
    id: "PROVIDER.UNAVAILABLE",
    http_status: 503,
};

pub const UNKNOWN_INTERNAL: ErrorCode = ErrorCode {
    id: "UNKNOWN.INTERNAL",
    http_status: 500,
};
