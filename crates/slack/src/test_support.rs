//! In-memory fakes shared by handler tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{Map, Value};
use yaruki_core::config::{AppConfig, BotConfig};
use yaruki_core::FixedClock;
use yaruki_dify::{DifyError, WorkflowApp, WorkflowClient, WorkflowInputs, WorkflowOutputs};

use crate::blocks::ModalView;
use crate::events::{BotServices, SlackEnvelope, SlackEvent};
use crate::web_api::{AuthIdentity, PostMessage, SlackApi, SlackApiError};

#[derive(Clone, Debug, PartialEq)]
pub enum SlackCall {
    History { channel: String, limit: u16 },
    Ephemeral { channel: String, user: String, text: String },
    Post(PostMessage),
    Schedule { channel: String, text: String, post_at: i64 },
    ViewsOpen { trigger_id: String, view: ModalView },
    ViewsUpdate { view_id: String, hash: Option<String>, view: ModalView },
    Webhook { url: String, body: Value },
}

#[derive(Default)]
pub struct FakeSlack {
    calls: Mutex<Vec<SlackCall>>,
    history: Vec<Value>,
}

impl FakeSlack {
    pub fn with_history(history: Vec<Value>) -> Self {
        Self { calls: Mutex::new(Vec::new()), history }
    }

    pub fn calls(&self) -> Vec<SlackCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn record(&self, call: SlackCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl SlackApi for FakeSlack {
    async fn conversations_history(
        &self,
        channel: &str,
        limit: u16,
    ) -> Result<Vec<Value>, SlackApiError> {
        self.record(SlackCall::History { channel: channel.to_owned(), limit });
        Ok(self.history.clone())
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
    ) -> Result<(), SlackApiError> {
        self.record(SlackCall::Ephemeral {
            channel: channel.to_owned(),
            user: user.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn post_message(&self, message: PostMessage) -> Result<String, SlackApiError> {
        self.record(SlackCall::Post(message));
        Ok("1730000000.000100".to_owned())
    }

    async fn schedule_message(
        &self,
        channel: &str,
        text: &str,
        post_at: i64,
    ) -> Result<String, SlackApiError> {
        self.record(SlackCall::Schedule { channel: channel.to_owned(), text: text.to_owned(), post_at });
        Ok("Q1298393284".to_owned())
    }

    async fn views_open(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        self.record(SlackCall::ViewsOpen { trigger_id: trigger_id.to_owned(), view: view.clone() });
        Ok(())
    }

    async fn views_update(
        &self,
        view_id: &str,
        hash: Option<&str>,
        view: &ModalView,
    ) -> Result<(), SlackApiError> {
        self.record(SlackCall::ViewsUpdate {
            view_id: view_id.to_owned(),
            hash: hash.map(str::to_owned),
            view: view.clone(),
        });
        Ok(())
    }

    async fn auth_test(&self) -> Result<AuthIdentity, SlackApiError> {
        Ok(AuthIdentity {
            team: Some("yaruki".to_owned()),
            user: Some("yaruki-bot".to_owned()),
            user_id: Some("UBOT".to_owned()),
            bot_id: Some("BBOT".to_owned()),
        })
    }

    async fn post_webhook(&self, url: &str, body: &Value) -> Result<(), SlackApiError> {
        self.record(SlackCall::Webhook { url: url.to_owned(), body: body.clone() });
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeWorkflows {
    responses: Mutex<HashMap<WorkflowApp, Result<Value, DifyError>>>,
    calls: Mutex<Vec<(WorkflowApp, WorkflowInputs)>>,
}

impl FakeWorkflows {
    pub fn respond(self, app: WorkflowApp, outputs: Value) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(app, Ok(outputs));
        }
        self
    }

    pub fn fail(self, app: WorkflowApp, error: DifyError) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(app, Err(error));
        }
        self
    }

    pub fn calls(&self) -> Vec<(WorkflowApp, WorkflowInputs)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WorkflowClient for FakeWorkflows {
    async fn run(
        &self,
        app: WorkflowApp,
        inputs: WorkflowInputs,
    ) -> Result<WorkflowOutputs, DifyError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((app, inputs));
        }
        let response = self
            .responses
            .lock()
            .ok()
            .and_then(|responses| responses.get(&app).cloned())
            .unwrap_or_else(|| Ok(Value::Object(Map::new())));

        match response? {
            Value::Object(outputs) => Ok(WorkflowOutputs::new(outputs)),
            _ => Ok(WorkflowOutputs::default()),
        }
    }
}

/// 2025-03-10 10:00:00 JST
pub fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 1, 0, 0).single().expect("valid instant")
}

pub fn bot_config() -> BotConfig {
    AppConfig::default().bot
}

pub fn services(
    slack: Arc<FakeSlack>,
    workflows: Arc<FakeWorkflows>,
    bot: BotConfig,
) -> BotServices {
    BotServices {
        slack,
        workflows,
        clock: Arc::new(FixedClock(fixed_now())),
        bot: Arc::new(bot),
    }
}

pub fn envelope(event: SlackEvent) -> SlackEnvelope {
    SlackEnvelope { envelope_id: "env-test".to_owned(), event }
}
