use async_trait::async_trait;
use tracing::{info, warn};
use yaruki_core::{format_today, parse_reminder_time, ApplicationError};
use yaruki_dify::inputs::assistant_inputs;
use yaruki_dify::WorkflowApp;

use crate::events::{
    BotServices, EventContext, EventHandler, EventHandlerError, HandlerResult, Route,
    SlackEnvelope, SlackEvent, SlashCommandPayload,
};
use crate::history::{history_json, prepare_history};

pub const ASSISTANT_COMMAND: &str = "/yaruki";
pub const REMINDER_COMMAND: &str = "/yaruki_reminder";
pub const LOGGED_COMMAND: &str = "/command";

const REMINDER_USAGE: &str = "例: `/yaruki_reminder 30分後`、`/yaruki_reminder 18:30`、`/yaruki_reminder 明日 9:00`";

/// Runs the assistant workflow over recent channel history and returns its
/// `text` output. Shared by `/yaruki` and the channel message relay.
pub(crate) async fn ask_assistant(
    services: &BotServices,
    channel_id: &str,
    limit: u16,
    prompt: &str,
) -> Result<String, EventHandlerError> {
    let messages = services.slack.conversations_history(channel_id, limit).await?;
    let history = prepare_history(messages);
    let today = format_today(services.clock.now_utc(), services.bot.utc_offset());

    let outputs = services
        .workflows
        .run(
            WorkflowApp::Assistant,
            assistant_inputs(history_json(&history), today, prompt.to_owned()),
        )
        .await?;
    Ok(outputs.text()?)
}

fn user_safe_message(error: EventHandlerError, ctx: &EventContext) -> &'static str {
    ApplicationError::from(error).into_interface(ctx.correlation_id.clone()).user_message()
}

fn slash_payload<'a>(envelope: &'a SlackEnvelope) -> Option<&'a SlashCommandPayload> {
    match &envelope.event {
        SlackEvent::SlashCommand(payload) => Some(payload),
        _ => None,
    }
}

/// `/yaruki <prompt>`: answer privately using the channel as context.
pub struct AssistantCommandHandler {
    services: BotServices,
}

impl AssistantCommandHandler {
    pub fn new(services: BotServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl EventHandler for AssistantCommandHandler {
    fn routes(&self) -> Vec<Route> {
        vec![Route::Command(ASSISTANT_COMMAND.to_owned())]
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _route: &Route,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(payload) = slash_payload(envelope) else {
            return Ok(HandlerResult::Ignored);
        };

        info!(
            event_name = "ingress.slack.command",
            command = %payload.command,
            correlation_id = %ctx.correlation_id,
            channel_id = %payload.channel_id,
            user_id = %payload.user_id,
            "running assistant command"
        );

        let answer = ask_assistant(
            &self.services,
            &payload.channel_id,
            self.services.bot.command_history_limit,
            &payload.text,
        )
        .await;

        let text = match answer {
            Ok(text) => text,
            Err(error) => {
                warn!(
                    event_name = "ingress.slack.command_failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "assistant command failed"
                );
                user_safe_message(error, ctx).to_owned()
            }
        };

        self.services.slack.post_ephemeral(&payload.channel_id, &payload.user_id, &text).await?;
        Ok(HandlerResult::Processed)
    }
}

/// `/yaruki_reminder [when]`: schedule the reminder into the caller's DM.
pub struct ReminderCommandHandler {
    services: BotServices,
}

impl ReminderCommandHandler {
    pub fn new(services: BotServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl EventHandler for ReminderCommandHandler {
    fn routes(&self) -> Vec<Route> {
        vec![Route::Command(REMINDER_COMMAND.to_owned())]
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _route: &Route,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(payload) = slash_payload(envelope) else {
            return Ok(HandlerResult::Ignored);
        };

        let bot = &self.services.bot;
        let offset = bot.utc_offset();
        let now = self.services.clock.now_utc();

        let post_at = match parse_reminder_time(&payload.text, now, offset, bot.reminder_delay_secs) {
            Ok(post_at) => post_at,
            Err(error) => {
                info!(
                    event_name = "ingress.slack.reminder_rejected",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "reminder time rejected"
                );
                let text = format!(
                    "{} {REMINDER_USAGE}",
                    user_safe_message(EventHandlerError::from(error), ctx)
                );
                self.services
                    .slack
                    .post_ephemeral(&payload.channel_id, &payload.user_id, &text)
                    .await?;
                return Ok(HandlerResult::Processed);
            }
        };

        let scheduled_id = self
            .services
            .slack
            .schedule_message(&payload.user_id, &bot.reminder_text, post_at.timestamp())
            .await?;

        let local = post_at.with_timezone(&offset).format("%Y年%m月%d日 %H:%M");
        info!(
            event_name = "ingress.slack.reminder_scheduled",
            correlation_id = %ctx.correlation_id,
            user_id = %payload.user_id,
            scheduled_message_id = %scheduled_id,
            post_at = post_at.timestamp(),
            "reminder scheduled"
        );

        self.services
            .slack
            .post_ephemeral(
                &payload.channel_id,
                &payload.user_id,
                &format!("{local} にリマインドします。"),
            )
            .await?;
        Ok(HandlerResult::Processed)
    }
}

/// `/command`: acknowledged by the socket runner, otherwise only logged.
pub struct LoggedCommandHandler;

#[async_trait]
impl EventHandler for LoggedCommandHandler {
    fn routes(&self) -> Vec<Route> {
        vec![Route::Command(LOGGED_COMMAND.to_owned())]
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _route: &Route,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(payload) = slash_payload(envelope) else {
            return Ok(HandlerResult::Ignored);
        };

        info!(
            event_name = "ingress.slack.command",
            command = %payload.command,
            correlation_id = %ctx.correlation_id,
            channel_id = %payload.channel_id,
            user_id = %payload.user_id,
            text = %payload.text,
            "slash command received"
        );
        Ok(HandlerResult::Processed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use serde_json::json;
    use yaruki_dify::{DifyError, WorkflowApp};

    use super::{
        AssistantCommandHandler, LoggedCommandHandler, ReminderCommandHandler, ASSISTANT_COMMAND,
        REMINDER_COMMAND,
    };
    use crate::events::{
        EventContext, EventHandler, HandlerResult, Route, SlackEvent, SlashCommandPayload,
    };
    use crate::test_support::{
        bot_config, envelope, fixed_now, services, FakeSlack, FakeWorkflows, SlackCall,
    };

    fn command(name: &str, text: &str) -> SlackEvent {
        SlackEvent::SlashCommand(SlashCommandPayload {
            command: name.to_owned(),
            text: text.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            trigger_id: "T1".to_owned(),
        })
    }

    #[tokio::test]
    async fn assistant_command_posts_workflow_text_ephemerally() {
        let slack = Arc::new(FakeSlack::with_history(vec![
            json!({"ts": "2.0", "text": "二番目", "blocks": []}),
            json!({"ts": "1.0", "text": "一番目"}),
        ]));
        let workflows = Arc::new(
            FakeWorkflows::default().respond(WorkflowApp::Assistant, json!({"text": "まとめました"})),
        );
        let handler =
            AssistantCommandHandler::new(services(slack.clone(), workflows.clone(), bot_config()));

        let route = Route::Command(ASSISTANT_COMMAND.to_owned());
        let result = handler
            .handle(&envelope(command(ASSISTANT_COMMAND, "要約して")), &route, &EventContext::default())
            .await
            .expect("handled");
        assert_eq!(result, HandlerResult::Processed);

        assert_eq!(
            slack.calls(),
            vec![
                SlackCall::History { channel: "C1".to_owned(), limit: 20 },
                SlackCall::Ephemeral {
                    channel: "C1".to_owned(),
                    user: "U1".to_owned(),
                    text: "まとめました".to_owned()
                },
            ]
        );

        let calls = workflows.calls();
        let (app, inputs) = &calls[0];
        assert_eq!(*app, WorkflowApp::Assistant);
        assert_eq!(inputs["prompt"], "要約して");
        assert_eq!(inputs["today"], "2025年03月10日 10:00:00");
        let history: serde_json::Value =
            serde_json::from_str(inputs["chat_history"].as_str().expect("string input"))
                .expect("history is json");
        assert_eq!(
            history,
            json!([{"ts": "1.0", "text": "一番目"}, {"ts": "2.0", "text": "二番目"}])
        );
    }

    #[tokio::test]
    async fn assistant_command_reports_workflow_failure_without_detail() {
        let slack = Arc::new(FakeSlack::default());
        let workflows = Arc::new(FakeWorkflows::default().fail(
            WorkflowApp::Assistant,
            DifyError::Status { app: WorkflowApp::Assistant, status: 500, body: "secret detail".to_owned() },
        ));
        let handler = AssistantCommandHandler::new(services(slack.clone(), workflows, bot_config()));

        let route = Route::Command(ASSISTANT_COMMAND.to_owned());
        handler
            .handle(&envelope(command(ASSISTANT_COMMAND, "hi")), &route, &EventContext::default())
            .await
            .expect("failure is reported to the user");

        let Some(SlackCall::Ephemeral { text, .. }) = slack.calls().pop() else {
            panic!("expected an ephemeral error message");
        };
        assert!(text.contains("AI ワークフロー"));
        assert!(!text.contains("secret detail"));
    }

    #[tokio::test]
    async fn reminder_defaults_to_configured_delay_in_callers_dm() {
        let slack = Arc::new(FakeSlack::default());
        let handler = ReminderCommandHandler::new(services(
            slack.clone(),
            Arc::new(FakeWorkflows::default()),
            bot_config(),
        ));

        let route = Route::Command(REMINDER_COMMAND.to_owned());
        handler
            .handle(&envelope(command(REMINDER_COMMAND, "")), &route, &EventContext::default())
            .await
            .expect("handled");

        let calls = slack.calls();
        assert_eq!(
            calls[0],
            SlackCall::Schedule {
                channel: "U1".to_owned(),
                text: "議事録の修正終わった？🍔".to_owned(),
                post_at: (fixed_now() + Duration::seconds(30)).timestamp(),
            }
        );
        assert!(matches!(
            &calls[1],
            SlackCall::Ephemeral { text, .. } if text == "2025年03月10日 10:00 にリマインドします。"
        ));
    }

    #[tokio::test]
    async fn reminder_with_bad_time_only_explains_usage() {
        let slack = Arc::new(FakeSlack::default());
        let handler = ReminderCommandHandler::new(services(
            slack.clone(),
            Arc::new(FakeWorkflows::default()),
            bot_config(),
        ));

        let route = Route::Command(REMINDER_COMMAND.to_owned());
        handler
            .handle(&envelope(command(REMINDER_COMMAND, "someday")), &route, &EventContext::default())
            .await
            .expect("handled");

        let calls = slack.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], SlackCall::Ephemeral { text, .. } if text.contains("30分後")));
    }

    #[tokio::test]
    async fn logged_command_only_acknowledges() {
        let route = Route::Command("/command".to_owned());
        let result = LoggedCommandHandler
            .handle(&envelope(command("/command", "anything")), &route, &EventContext::default())
            .await
            .expect("handled");
        assert_eq!(result, HandlerResult::Processed);
    }
}
