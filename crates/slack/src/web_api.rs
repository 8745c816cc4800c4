//! Slack Web API surface used by the bot.
//!
//! Handlers only see the [`SlackApi`] trait; [`SlackWebClient`] is the
//! `reqwest` implementation used at runtime.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};
use yaruki_core::ApplicationError;

use crate::blocks::{Block, ModalView};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("{method} request failed: {message}")]
    Request { method: String, message: String },
    #[error("{method} response could not be decoded: {message}")]
    Decode { method: String, message: String },
    #[error("{method} returned error `{error}`")]
    Api { method: String, error: String },
    #[error("{method} response is missing `{field}`")]
    MissingField { method: String, field: String },
    #[error("webhook delivery failed with HTTP {status}")]
    Webhook { status: u16 },
}

impl From<SlackApiError> for ApplicationError {
    fn from(value: SlackApiError) -> Self {
        Self::Slack(value.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PostMessage {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Block>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl PostMessage {
    pub fn text(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self { channel: channel.into(), text: Some(text.into()), ..Self::default() }
    }

    pub fn blocks(channel: impl Into<String>, fallback: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            channel: channel.into(),
            text: Some(fallback.into()),
            blocks: Some(blocks),
            thread_ts: None,
        }
    }

    pub fn in_thread(mut self, thread_ts: Option<String>) -> Self {
        self.thread_ts = thread_ts;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuthIdentity {
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Raw message objects, newest first as Slack returns them.
    async fn conversations_history(
        &self,
        channel: &str,
        limit: u16,
    ) -> Result<Vec<Value>, SlackApiError>;
    async fn post_ephemeral(&self, channel: &str, user: &str, text: &str)
        -> Result<(), SlackApiError>;
    /// Returns the `ts` of the posted message.
    async fn post_message(&self, message: PostMessage) -> Result<String, SlackApiError>;
    /// Returns the `scheduled_message_id`.
    async fn schedule_message(
        &self,
        channel: &str,
        text: &str,
        post_at: i64,
    ) -> Result<String, SlackApiError>;
    async fn views_open(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError>;
    async fn views_update(
        &self,
        view_id: &str,
        hash: Option<&str>,
        view: &ModalView,
    ) -> Result<(), SlackApiError>;
    async fn auth_test(&self) -> Result<AuthIdentity, SlackApiError>;
    async fn post_webhook(&self, url: &str, body: &Value) -> Result<(), SlackApiError>;
}

#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    bot_token: SecretString,
    api_base_url: String,
}

impl fmt::Debug for SlackWebClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackWebClient").field("api_base_url", &self.api_base_url).finish()
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, Value>,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString, api_base_url: impl Into<String>) -> Result<Self, SlackApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| SlackApiError::Request {
                method: "client.build".to_owned(),
                message: error.to_string(),
            })?;
        Ok(Self {
            http,
            bot_token,
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Opens a Socket Mode connection and returns its `wss://` URL. This is
    /// the only method authenticated with the app-level token.
    pub async fn connections_open(&self, app_token: &SecretString) -> Result<String, SlackApiError> {
        let method = "apps.connections.open";
        debug!(event_name = "slack.api.call", method, "opening socket mode connection");
        let response = self
            .http
            .post(self.method_url(method))
            .bearer_auth(app_token.expose_secret())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(|error| request_error(method, error))?;
        let mut envelope = decode_envelope(method, response).await?;
        take_string(method, &mut envelope, "url")
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base_url)
    }

    async fn call(&self, method: &str, body: Value) -> Result<ApiEnvelope, SlackApiError> {
        debug!(event_name = "slack.api.call", method, "calling slack web api");
        let response = self
            .http
            .post(self.method_url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| request_error(method, error))?;
        decode_envelope(method, response).await
    }

    /// Read methods such as `conversations.history` take query arguments
    /// and ignore a JSON body.
    async fn call_query(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<ApiEnvelope, SlackApiError> {
        debug!(event_name = "slack.api.call", method, "calling slack web api");
        let response = self
            .http
            .get(self.method_url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|error| request_error(method, error))?;
        decode_envelope(method, response).await
    }
}

fn request_error(method: &str, error: reqwest::Error) -> SlackApiError {
    SlackApiError::Request { method: method.to_owned(), message: error.to_string() }
}

async fn decode_envelope(
    method: &str,
    response: reqwest::Response,
) -> Result<ApiEnvelope, SlackApiError> {
    let envelope: ApiEnvelope = response.json().await.map_err(|error| SlackApiError::Decode {
        method: method.to_owned(),
        message: error.to_string(),
    })?;

    if !envelope.ok {
        let error = envelope.error.unwrap_or_else(|| "unknown".to_owned());
        warn!(event_name = "slack.api.error", method, error = %error, "slack api returned an error");
        return Err(SlackApiError::Api { method: method.to_owned(), error });
    }

    Ok(envelope)
}

fn take_string(method: &str, envelope: &mut ApiEnvelope, field: &str) -> Result<String, SlackApiError> {
    match envelope.rest.remove(field) {
        Some(Value::String(value)) => Ok(value),
        _ => Err(SlackApiError::MissingField { method: method.to_owned(), field: field.to_owned() }),
    }
}

fn encode<T: Serialize>(method: &str, value: &T) -> Result<Value, SlackApiError> {
    serde_json::to_value(value).map_err(|error| SlackApiError::Decode {
        method: method.to_owned(),
        message: error.to_string(),
    })
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn conversations_history(
        &self,
        channel: &str,
        limit: u16,
    ) -> Result<Vec<Value>, SlackApiError> {
        let method = "conversations.history";
        let mut envelope = self
            .call_query(method, &[("channel", channel.to_owned()), ("limit", limit.to_string())])
            .await?;
        match envelope.rest.remove("messages") {
            Some(Value::Array(messages)) => Ok(messages),
            _ => Err(SlackApiError::MissingField {
                method: method.to_owned(),
                field: "messages".to_owned(),
            }),
        }
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
    ) -> Result<(), SlackApiError> {
        self.call("chat.postEphemeral", json!({"channel": channel, "user": user, "text": text}))
            .await?;
        Ok(())
    }

    async fn post_message(&self, message: PostMessage) -> Result<String, SlackApiError> {
        let method = "chat.postMessage";
        let mut envelope = self.call(method, encode(method, &message)?).await?;
        take_string(method, &mut envelope, "ts")
    }

    async fn schedule_message(
        &self,
        channel: &str,
        text: &str,
        post_at: i64,
    ) -> Result<String, SlackApiError> {
        let method = "chat.scheduleMessage";
        let mut envelope = self
            .call(method, json!({"channel": channel, "text": text, "post_at": post_at}))
            .await?;
        take_string(method, &mut envelope, "scheduled_message_id")
    }

    async fn views_open(&self, trigger_id: &str, view: &ModalView) -> Result<(), SlackApiError> {
        let method = "views.open";
        self.call(method, json!({"trigger_id": trigger_id, "view": encode(method, view)?}))
            .await?;
        Ok(())
    }

    async fn views_update(
        &self,
        view_id: &str,
        hash: Option<&str>,
        view: &ModalView,
    ) -> Result<(), SlackApiError> {
        let method = "views.update";
        let mut body = json!({"view_id": view_id, "view": encode(method, view)?});
        if let Some(hash) = hash {
            body["hash"] = Value::String(hash.to_owned());
        }
        self.call(method, body).await?;
        Ok(())
    }

    async fn auth_test(&self) -> Result<AuthIdentity, SlackApiError> {
        let method = "auth.test";
        let envelope = self.call(method, json!({})).await?;
        serde_json::from_value(Value::Object(envelope.rest)).map_err(|error| {
            SlackApiError::Decode { method: method.to_owned(), message: error.to_string() }
        })
    }

    async fn post_webhook(&self, url: &str, body: &Value) -> Result<(), SlackApiError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|error| request_error("webhook", error))?;
        let status = response.status();
        if !status.is_success() {
            warn!(event_name = "slack.webhook.error", status = status.as_u16(), "webhook rejected");
            return Err(SlackApiError::Webhook { status: status.as_u16() });
        }
        Ok(())
    }
}
