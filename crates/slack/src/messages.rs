use async_trait::async_trait;
use tracing::{info, warn};

use crate::commands::ask_assistant;
use crate::events::{
    BotServices, EventContext, EventHandler, EventHandlerError, HandlerResult, Route,
    SlackEnvelope, SlackEvent,
};
use crate::web_api::PostMessage;

/// Answers user messages in channels the bot is a member of, replying in the
/// same thread when the message was threaded.
pub struct MessageRelayHandler {
    services: BotServices,
}

impl MessageRelayHandler {
    pub fn new(services: BotServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl EventHandler for MessageRelayHandler {
    fn routes(&self) -> Vec<Route> {
        vec![Route::Message]
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _route: &Route,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(message) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(prompt) = message.text.as_deref().filter(|_| message.is_user_message()) else {
            return Ok(HandlerResult::Ignored);
        };

        info!(
            event_name = "ingress.slack.message",
            correlation_id = %ctx.correlation_id,
            channel_id = %message.channel_id,
            ts = %message.ts,
            threaded = message.thread_ts.is_some(),
            "relaying channel message to assistant"
        );

        let answer = match ask_assistant(
            &self.services,
            &message.channel_id,
            self.services.bot.message_history_limit,
            prompt,
        )
        .await
        {
            Ok(answer) => answer,
            Err(EventHandlerError::Workflow(error)) => {
                warn!(
                    event_name = "ingress.slack.message_failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "assistant workflow failed; no reply posted"
                );
                return Ok(HandlerResult::Processed);
            }
            Err(error) => return Err(error),
        };

        self.services
            .slack
            .post_message(
                PostMessage::text(&message.channel_id, answer).in_thread(message.thread_ts.clone()),
            )
            .await?;
        Ok(HandlerResult::Processed)
    }
}
