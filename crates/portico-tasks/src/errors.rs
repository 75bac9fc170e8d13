use portico_errors::prelude::*;
use portico_proxy::errors::ProxyError;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct TaskError(pub Box<ErrorObj>);

impl TaskError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn schema(msg: &str) -> Self {
        TaskError(Box::new(
            ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                .user_msg("Task arguments failed validation.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn op_unknown(name: &str) -> Self {
        TaskError(Box::new(
            ErrorBuilder::new(codes::TASK_OP_UNKNOWN)
                .user_msg("Operation is not registered.")
                .dev_msg(format!("unknown operation: {name}"))
                .build(),
        ))
    }

    pub fn not_found(msg: &str) -> Self {
        TaskError(Box::new(
            ErrorBuilder::new(codes::TASK_UNKNOWN)
                .user_msg("Task is unknown or has expired.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn provider_unavailable(msg: &str) -> Self {
        TaskError(Box::new(
            ErrorBuilder::new(codes::PROVIDER_UNAVAILABLE)
                .user_msg("Task infrastructure is unavailable.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn feature_disabled(feature: &str, detail: &str) -> Self {
        TaskError(Box::new(
            ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                .user_msg("Required capability is disabled.")
                .dev_msg(format!("feature '{feature}' is disabled: {detail}"))
                .build(),
        ))
    }

    pub fn unknown(msg: &str) -> Self {
        TaskError(Box::new(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Task execution failed.")
                .dev_msg(msg)
                .build(),
        ))
    }
}

impl From<ProxyError> for TaskError {
    fn from(err: ProxyError) -> Self {
        TaskError(Box::new(err.error_obj()))
    }
}
