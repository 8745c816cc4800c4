use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use yaruki_core::config::DifyConfig;

use crate::error::DifyError;
use crate::inputs::WorkflowInputs;
use crate::outputs::WorkflowOutputs;

/// The four Dify apps the bot talks to. Each one has its own bearer token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkflowApp {
    /// App 1: rewrites a message in a softer tone and returns related knowledge.
    Softener,
    /// App 2: generates an illustration to accompany a delivered message.
    Illustration,
    /// App 3: extracts a task list from channel history.
    TaskExtractor,
    /// App 4: answers a prompt with channel history as context.
    Assistant,
}

impl WorkflowApp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Softener => "softener",
            Self::Illustration => "illustration",
            Self::TaskExtractor => "task_extractor",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for WorkflowApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait WorkflowClient: Send + Sync {
    async fn run(
        &self,
        app: WorkflowApp,
        inputs: WorkflowInputs,
    ) -> Result<WorkflowOutputs, DifyError>;
}

#[derive(Serialize)]
struct WorkflowRequest<'a> {
    inputs: &'a WorkflowInputs,
    response_mode: &'static str,
    user: &'a str,
}

#[derive(Deserialize)]
struct WorkflowResponse {
    data: WorkflowData,
}

#[derive(Deserialize)]
struct WorkflowData {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    outputs: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Clone)]
pub struct DifyClient {
    http: reqwest::Client,
    workflow_url: String,
    user: String,
    softener_token: SecretString,
    illustration_token: SecretString,
    task_extractor_token: SecretString,
    assistant_token: SecretString,
}

impl fmt::Debug for DifyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DifyClient")
            .field("workflow_url", &self.workflow_url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl DifyClient {
    pub fn from_config(config: &DifyConfig) -> Result<Self, DifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| DifyError::Build(error.to_string()))?;

        Ok(Self {
            http,
            workflow_url: config.workflow_url.clone(),
            user: config.user.clone(),
            softener_token: config.softener_token.clone(),
            illustration_token: config.illustration_token.clone(),
            task_extractor_token: config.task_extractor_token.clone(),
            assistant_token: config.assistant_token.clone(),
        })
    }

    fn token_for(&self, app: WorkflowApp) -> &SecretString {
        match app {
            WorkflowApp::Softener => &self.softener_token,
            WorkflowApp::Illustration => &self.illustration_token,
            WorkflowApp::TaskExtractor => &self.task_extractor_token,
            WorkflowApp::Assistant => &self.assistant_token,
        }
    }
}

#[async_trait]
impl WorkflowClient for DifyClient {
    async fn run(
        &self,
        app: WorkflowApp,
        inputs: WorkflowInputs,
    ) -> Result<WorkflowOutputs, DifyError> {
        let body = WorkflowRequest { inputs: &inputs, response_mode: "blocking", user: &self.user };

        info!(
            event_name = "dify.workflow.request",
            app = %app,
            input_keys = ?inputs.keys().collect::<Vec<_>>(),
            "running dify workflow"
        );

        let response = self
            .http
            .post(&self.workflow_url)
            .bearer_auth(self.token_for(app).expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| DifyError::Request { app, message: error.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "dify.workflow.http_error",
                app = %app,
                status = status.as_u16(),
                "dify workflow returned an error status"
            );
            return Err(DifyError::Status { app, status: status.as_u16(), body });
        }

        let envelope: WorkflowResponse = response
            .json()
            .await
            .map_err(|error| DifyError::Decode { app, message: error.to_string() })?;

        if envelope.data.status.as_deref().is_some_and(|status| status != "succeeded") {
            let message = envelope
                .data
                .error
                .or(envelope.data.status)
                .unwrap_or_else(|| "unknown error".to_owned());
            warn!(event_name = "dify.workflow.run_failed", app = %app, error = %message, "dify workflow run failed");
            return Err(DifyError::RunFailed { app, message });
        }

        let outputs = envelope.data.outputs.ok_or_else(|| DifyError::Decode {
            app,
            message: "response is missing `data.outputs`".to_owned(),
        })?;

        debug!(
            event_name = "dify.workflow.completed",
            app = %app,
            output_keys = ?outputs.keys().collect::<Vec<_>>(),
            "dify workflow completed"
        );

        Ok(WorkflowOutputs::new(outputs))
    }
}
