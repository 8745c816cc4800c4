use thiserror::Error;
use yaruki_core::ApplicationError;

use crate::client::WorkflowApp;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DifyError {
    #[error("{app} workflow request failed: {message}")]
    Request { app: WorkflowApp, message: String },
    #[error("{app} workflow returned HTTP {status}: {body}")]
    Status { app: WorkflowApp, status: u16, body: String },
    #[error("{app} workflow response could not be decoded: {message}")]
    Decode { app: WorkflowApp, message: String },
    #[error("{app} workflow run failed: {message}")]
    RunFailed { app: WorkflowApp, message: String },
    #[error("workflow output `{0}` is missing or malformed")]
    MissingOutput(String),
    #[error("dify client could not be built: {0}")]
    Build(String),
}

impl From<DifyError> for ApplicationError {
    fn from(value: DifyError) -> Self {
        match value {
            DifyError::Build(message) => Self::Configuration(message),
            other => Self::Workflow(other.to_string()),
        }
    }
}
