//! Shortcut app 1, "やわらかコミュニケーター": rewrite a message in a softer
//! tone, pick a recipient and related documents, then deliver it with an
//! illustration.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};
use yaruki_dify::inputs::{illustration_inputs, softener_inputs};
use yaruki_dify::{Illustration, SoftenedMessage, WorkflowApp};

use crate::blocks::{Block, Element, MessageBuilder, MessageTemplate, ModalView, OptionObject, TextObject};
use crate::events::{
    BlockActionsEvent, BotServices, EventContext, EventHandler, EventHandlerError, HandlerResult,
    Route, SelectedOption, SlackEnvelope, SlackEvent, ShortcutEvent, ViewSubmissionEvent,
};
use crate::web_api::PostMessage;

pub const SHORTCUT_ID: &str = "test_shortcut1";
pub const CALLBACK_ID: &str = "APP_1_CALLBACK_ID";
pub const MESSAGE_BLOCK_ID: &str = "APP1_MODAL1_BLOCK1_ID";
// This input uses the same string for its block id and action id.
pub const MESSAGE_ACTION_ID: &str = "APP1_MODAL1_BLOCK1_ID";
pub const SOFTEN_BLOCK_ID: &str = "APP1_MODAL1_BLOCK2_ID";
pub const SOFTEN_ACTION_ID: &str = "APP1_MODAL1_BLOCK2_ACTIONID";
pub const SOFTENED_BLOCK_ID: &str = "APP1_MODAL1_BLOCK3_ID";
pub const SOFTENED_ACTION_ID: &str = "APP1_MODAL1_BLOCK3_ACTIONID";
pub const RECIPIENT_BLOCK_ID: &str = "APP1_MODAL1_BLOCK4_ID";
pub const RECIPIENT_ACTION_ID: &str = "APP1_MODAL1_BLOCK4_ACTIONID";
pub const REFERENCES_BLOCK_ID: &str = "APP1_MODAL1_BLOCK5_ID";
pub const REFERENCES_ACTION_ID: &str = "APP1_MODAL1_BLOCK5_ACTIONID";

const BUTTON_VALUE: &str = "click_me_123";

/// The softener modal. Blocks 3-5 appear once a softened message exists;
/// block 5 only when the workflow returned related documents.
pub fn softener_view(
    message: Option<&str>,
    softened: Option<&SoftenedMessage>,
    default_recipient: Option<&str>,
) -> ModalView {
    let mut view = ModalView::new(CALLBACK_ID, "やわらかコミュニケーター")
        .submit("送信")
        .close("閉じる")
        .block(Block::Input {
            block_id: MESSAGE_BLOCK_ID.to_owned(),
            element: Element::multiline_input(MESSAGE_ACTION_ID, message.map(str::to_owned)),
            label: TextObject::plain("送りたい内容"),
        })
        .block(Block::Actions {
            block_id: Some(SOFTEN_BLOCK_ID.to_owned()),
            elements: vec![Element::button(SOFTEN_ACTION_ID, "やわらかくする").with_value(BUTTON_VALUE)],
        });

    let Some(softened) = softened else {
        return view;
    };

    view = view
        .block(Block::Input {
            block_id: SOFTENED_BLOCK_ID.to_owned(),
            element: Element::multiline_input(SOFTENED_ACTION_ID, Some(softened.result.clone())),
            label: TextObject::plain("やわらか"),
        })
        .block(Block::Section {
            block_id: Some(RECIPIENT_BLOCK_ID.to_owned()),
            text: TextObject::mrkdwn("送信先を選択"),
            accessory: Some(Element::UsersSelect {
                action_id: RECIPIENT_ACTION_ID.to_owned(),
                placeholder: Some(TextObject::plain_emoji("Select a user")),
                initial_user: default_recipient.map(str::to_owned),
            }),
        });

    if !softened.knowledge.is_empty() {
        let options = softened
            .knowledge
            .iter()
            .map(|segment| {
                OptionObject::mrkdwn(
                    &segment.document_name,
                    Some(&segment.content),
                    segment.segment_id.clone(),
                )
            })
            .collect();
        view = view.block(Block::Section {
            block_id: Some(REFERENCES_BLOCK_ID.to_owned()),
            text: TextObject::mrkdwn("関連ドキュメントを選択（任意）"),
            accessory: Some(Element::Checkboxes {
                action_id: REFERENCES_ACTION_ID.to_owned(),
                options,
            }),
        });
    }

    view
}

/// Message delivered to the chosen recipient.
pub fn delivery_message(
    to_user: &str,
    from_user: &str,
    softened: &str,
    illustration: Option<&Illustration>,
    references: &[SelectedOption],
) -> MessageTemplate {
    let header = format!("<@{to_user}> さんへ <@{from_user}> さんからメッセージが届いています。");

    let mut builder = MessageBuilder::new(header.clone())
        .section(|section| {
            section.mrkdwn(header.clone());
        })
        .divider()
        .section(|section| {
            section.mrkdwn(softened);
            if let Some(illustration) = illustration {
                section.accessory(Element::Image {
                    image_url: illustration.url.clone(),
                    alt_text: illustration.prompt.clone(),
                });
            }
        });

    if !references.is_empty() {
        builder = builder
            .divider()
            .section(|section| {
                section.mrkdwn("関連ドキュメント");
            })
            .bullet_list(|list| {
                for reference in references {
                    list.item([
                        format!("{}:\n", reference.text),
                        format!("{}:\n", reference.description),
                    ]);
                }
            });
    }

    builder.build()
}

pub struct SoftenerHandler {
    services: BotServices,
}

impl SoftenerHandler {
    pub fn new(services: BotServices) -> Self {
        Self { services }
    }

    async fn open_modal(
        &self,
        shortcut: &ShortcutEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        info!(
            event_name = "ingress.slack.shortcut",
            callback_id = %shortcut.callback_id,
            correlation_id = %ctx.correlation_id,
            user_id = %shortcut.user_id,
            "opening softener modal"
        );
        let view = softener_view(shortcut.message_text.as_deref(), None, None);
        self.services.slack.views_open(&shortcut.trigger_id, &view).await?;
        Ok(HandlerResult::Processed)
    }

    async fn soften(
        &self,
        event: &BlockActionsEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(view) = &event.view else {
            return Err(EventHandlerError::InvalidPayload {
                route: SOFTEN_ACTION_ID.to_owned(),
                detail: "the modal view".to_owned(),
            });
        };
        let message = view.state.text_value(MESSAGE_BLOCK_ID, MESSAGE_ACTION_ID);

        let outputs = self
            .services
            .workflows
            .run(
                WorkflowApp::Softener,
                softener_inputs(message.clone(), self.services.bot.softener_role.clone()),
            )
            .await
            .and_then(|outputs| outputs.softened());
        let softened = match outputs {
            Ok(softened) => softened,
            Err(error) => {
                warn!(
                    event_name = "ingress.slack.softener_failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "softener workflow failed; leaving modal unchanged"
                );
                return Ok(HandlerResult::Processed);
            }
        };

        info!(
            event_name = "ingress.slack.softened",
            correlation_id = %ctx.correlation_id,
            references = softened.knowledge.len(),
            "softened message ready"
        );

        let updated = softener_view(
            message.as_deref(),
            Some(&softened),
            self.services.bot.default_recipient.as_deref(),
        );
        self.services.slack.views_update(&view.id, view.hash.as_deref(), &updated).await?;
        Ok(HandlerResult::Processed)
    }

    async fn deliver(
        &self,
        submission: &ViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let state = &submission.view.state;
        let message = state.text_value(MESSAGE_BLOCK_ID, MESSAGE_ACTION_ID);
        let softened = state.text_value(SOFTENED_BLOCK_ID, SOFTENED_ACTION_ID).or(message);
        let references = state.selected_options(REFERENCES_BLOCK_ID, REFERENCES_ACTION_ID);

        let Some(recipient) = state.selected_user(RECIPIENT_BLOCK_ID, RECIPIENT_ACTION_ID) else {
            warn!(
                event_name = "ingress.slack.delivery_skipped",
                correlation_id = %ctx.correlation_id,
                "softener submission has no recipient"
            );
            return Ok(HandlerResult::Processed);
        };

        let Some(webhook_url) = self.services.bot.recipients.get(&recipient) else {
            warn!(
                event_name = "ingress.slack.delivery_skipped",
                correlation_id = %ctx.correlation_id,
                recipient = %recipient,
                "recipient is not configured for delivery"
            );
            return Ok(HandlerResult::Processed);
        };

        let illustration = match self
            .services
            .workflows
            .run(WorkflowApp::Illustration, illustration_inputs())
            .await
            .and_then(|outputs| outputs.illustration())
        {
            Ok(illustration) => Some(illustration),
            Err(error) => {
                warn!(
                    event_name = "ingress.slack.illustration_failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "illustration workflow failed; delivering without image"
                );
                None
            }
        };

        let template = delivery_message(
            &recipient,
            &submission.user_id,
            softened.as_deref().unwrap_or_default(),
            illustration.as_ref(),
            &references,
        );

        if self.services.bot.deliver_via_webhook {
            let body = json!({ "text": template.fallback_text, "blocks": template.blocks });
            self.services.slack.post_webhook(webhook_url, &body).await?;
        } else {
            self.services
                .slack
                .post_message(PostMessage::blocks(&recipient, template.fallback_text, template.blocks))
                .await?;
        }

        info!(
            event_name = "ingress.slack.delivered",
            correlation_id = %ctx.correlation_id,
            recipient = %recipient,
            via_webhook = self.services.bot.deliver_via_webhook,
            references = references.len(),
            "softened message delivered"
        );
        Ok(HandlerResult::Processed)
    }
}

#[async_trait]
impl EventHandler for SoftenerHandler {
    fn routes(&self) -> Vec<Route> {
        vec![
            Route::Shortcut(SHORTCUT_ID.to_owned()),
            Route::Action(SOFTEN_ACTION_ID.to_owned()),
            Route::Action(RECIPIENT_ACTION_ID.to_owned()),
            Route::Action(REFERENCES_ACTION_ID.to_owned()),
            Route::View(CALLBACK_ID.to_owned()),
        ]
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        route: &Route,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        match (&envelope.event, route) {
            (SlackEvent::Shortcut(shortcut), Route::Shortcut(_)) => self.open_modal(shortcut, ctx).await,
            (SlackEvent::BlockActions(event), Route::Action(action_id)) if action_id == SOFTEN_ACTION_ID => {
                self.soften(event, ctx).await
            }
            (SlackEvent::BlockActions(event), Route::Action(action_id)) => {
                info!(
                    event_name = "ingress.slack.action",
                    action_id = %action_id,
                    correlation_id = %ctx.correlation_id,
                    user_id = %event.user_id,
                    "softener selection changed"
                );
                Ok(HandlerResult::Processed)
            }
            (SlackEvent::ViewSubmission(submission), Route::View(_)) => self.deliver(submission, ctx).await,
            _ => Ok(HandlerResult::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use yaruki_dify::{DifyError, KnowledgeSegment, SoftenedMessage, WorkflowApp};

    use super::{
        softener_view, SoftenerHandler, CALLBACK_ID, RECIPIENT_ACTION_ID, RECIPIENT_BLOCK_ID,
        REFERENCES_BLOCK_ID, SHORTCUT_ID, SOFTENED_BLOCK_ID, SOFTEN_ACTION_ID,
    };
    use crate::blocks::{Block, Element, OPTION_TEXT_MAX_CHARS};
    use crate::events::{
        BlockAction, BlockActionsEvent, EventContext, EventHandler, HandlerResult, Route,
        ShortcutEvent, SlackEvent, ViewPayload, ViewState, ViewSubmissionEvent,
    };
    use crate::test_support::{bot_config, envelope, services, FakeSlack, FakeWorkflows, SlackCall};

    fn state(values: Value) -> ViewState {
        serde_json::from_value(json!({ "values": values })).expect("view state")
    }

    fn block_ids(view: &crate::blocks::ModalView) -> Vec<Option<&str>> {
        view.blocks.iter().map(Block::block_id).collect()
    }

    #[test]
    fn initial_modal_has_message_input_and_soften_button() {
        let view = softener_view(Some("早く直して"), None, None);
        assert_eq!(view.callback_id, CALLBACK_ID);
        assert_eq!(block_ids(&view), vec![Some("APP1_MODAL1_BLOCK1_ID"), Some("APP1_MODAL1_BLOCK2_ID")]);
        assert!(matches!(
            &view.blocks[0],
            Block::Input { element: Element::PlainTextInput { initial_value: Some(value), .. }, .. }
                if value == "早く直して"
        ));
    }

    #[test]
    fn references_block_only_when_knowledge_exists() {
        let without = SoftenedMessage { result: "やわらか".to_owned(), knowledge: vec![] };
        assert!(softener_view(None, Some(&without), None).find_block(REFERENCES_BLOCK_ID).is_none());

        let with = SoftenedMessage {
            result: "やわらか".to_owned(),
            knowledge: vec![KnowledgeSegment {
                document_name: "運用.md".to_owned(),
                segment_id: "seg-1".to_owned(),
                content: "抜粋".to_owned(),
            }],
        };
        let view = softener_view(None, Some(&with), Some("U2"));
        assert!(view.find_block(SOFTENED_BLOCK_ID).is_some());
        assert!(matches!(
            view.find_block(RECIPIENT_BLOCK_ID),
            Some(Block::Section { accessory: Some(Element::UsersSelect { initial_user: Some(user), .. }), .. })
                if user == "U2"
        ));
        assert!(view.find_block(REFERENCES_BLOCK_ID).is_some());
    }

    #[test]
    fn long_knowledge_segments_fit_slack_option_limits() {
        let softened = SoftenedMessage {
            result: "やわらか".to_owned(),
            knowledge: vec![KnowledgeSegment {
                document_name: "運".repeat(100),
                segment_id: "seg-1".to_owned(),
                content: "抜粋".repeat(100),
            }],
        };
        let view = softener_view(None, Some(&softened), None);

        let Some(Block::Section { accessory: Some(Element::Checkboxes { options, .. }), .. }) =
            view.find_block(REFERENCES_BLOCK_ID)
        else {
            panic!("references block should hold checkboxes");
        };
        let option = &options[0];
        assert_eq!(option.text.text().chars().count(), OPTION_TEXT_MAX_CHARS);
        assert!(option.text.text().ends_with('…'));
        let description = option.description.as_ref().expect("description");
        assert_eq!(description.text().chars().count(), OPTION_TEXT_MAX_CHARS);
        assert_eq!(option.value, "seg-1");
    }

    #[tokio::test]
    async fn shortcut_opens_modal_with_trigger() {
        let slack = Arc::new(FakeSlack::default());
        let handler =
            SoftenerHandler::new(services(slack.clone(), Arc::new(FakeWorkflows::default()), bot_config()));

        let event = SlackEvent::Shortcut(ShortcutEvent {
            callback_id: SHORTCUT_ID.to_owned(),
            trigger_id: "trig-1".to_owned(),
            user_id: "U1".to_owned(),
            channel_id: None,
            message_text: None,
        });
        handler
            .handle(&envelope(event), &Route::Shortcut(SHORTCUT_ID.to_owned()), &EventContext::default())
            .await
            .expect("handled");

        assert!(matches!(
            slack.calls().as_slice(),
            [SlackCall::ViewsOpen { trigger_id, view }] if trigger_id == "trig-1" && view.blocks.len() == 2
        ));
    }

    #[tokio::test]
    async fn soften_button_updates_view_with_result_and_references() {
        let slack = Arc::new(FakeSlack::default());
        let workflows = Arc::new(FakeWorkflows::default().respond(
            WorkflowApp::Softener,
            json!({
                "result": "お手すきの際にご確認ください",
                "knowledge": [{"content": "抜粋", "metadata": {"document_name": "運用.md", "segment_id": "seg-1"}}]
            }),
        ));
        let handler = SoftenerHandler::new(services(slack.clone(), workflows.clone(), bot_config()));

        let event = SlackEvent::BlockActions(BlockActionsEvent {
            user_id: "U1".to_owned(),
            trigger_id: None,
            actions: vec![BlockAction {
                action_id: SOFTEN_ACTION_ID.to_owned(),
                block_id: None,
                value: Some("click_me_123".to_owned()),
            }],
            view: Some(ViewPayload {
                id: "V1".to_owned(),
                hash: Some("hash-1".to_owned()),
                callback_id: CALLBACK_ID.to_owned(),
                state: state(json!({"APP1_MODAL1_BLOCK1_ID": {"APP1_MODAL1_BLOCK1_ID": {"value": "早く直して"}}})),
            }),
        });
        handler
            .handle(&envelope(event), &Route::Action(SOFTEN_ACTION_ID.to_owned()), &EventContext::default())
            .await
            .expect("handled");

        let (app, inputs) = &workflows.calls()[0];
        assert_eq!(*app, WorkflowApp::Softener);
        assert_eq!(inputs["input"], "早く直して");
        assert_eq!(inputs["role"], "上司");

        let calls = slack.calls();
        let [SlackCall::ViewsUpdate { view_id, hash, view }] = calls.as_slice() else {
            panic!("expected a single views.update, got {calls:?}");
        };
        assert_eq!(view_id, "V1");
        assert_eq!(hash.as_deref(), Some("hash-1"));
        assert_eq!(view.blocks.len(), 5);
    }

    #[tokio::test]
    async fn soften_failure_leaves_modal_untouched() {
        let slack = Arc::new(FakeSlack::default());
        let workflows = Arc::new(FakeWorkflows::default().fail(
            WorkflowApp::Softener,
            DifyError::RunFailed { app: WorkflowApp::Softener, message: "boom".to_owned() },
        ));
        let handler = SoftenerHandler::new(services(slack.clone(), workflows, bot_config()));

        let event = SlackEvent::BlockActions(BlockActionsEvent {
            user_id: "U1".to_owned(),
            trigger_id: None,
            actions: vec![BlockAction { action_id: SOFTEN_ACTION_ID.to_owned(), block_id: None, value: None }],
            view: Some(ViewPayload::default()),
        });
        let result = handler
            .handle(&envelope(event), &Route::Action(SOFTEN_ACTION_ID.to_owned()), &EventContext::default())
            .await
            .expect("workflow failures are logged, not raised");

        assert_eq!(result, HandlerResult::Processed);
        assert!(slack.calls().is_empty());
    }

    fn submission(recipient: &str) -> SlackEvent {
        SlackEvent::ViewSubmission(ViewSubmissionEvent {
            user_id: "U1".to_owned(),
            view: ViewPayload {
                id: "V1".to_owned(),
                hash: None,
                callback_id: CALLBACK_ID.to_owned(),
                state: state(json!({
                    "APP1_MODAL1_BLOCK1_ID": {"APP1_MODAL1_BLOCK1_ID": {"value": "早く直して"}},
                    "APP1_MODAL1_BLOCK3_ID": {"APP1_MODAL1_BLOCK3_ACTIONID": {"value": "お手すきの際に"}},
                    "APP1_MODAL1_BLOCK4_ID": {"APP1_MODAL1_BLOCK4_ACTIONID": {"selected_user": recipient}},
                    "APP1_MODAL1_BLOCK5_ID": {"APP1_MODAL1_BLOCK5_ACTIONID": {"selected_options": [
                        {"text": {"type": "mrkdwn", "text": "運用.md"},
                         "description": {"type": "mrkdwn", "text": "抜粋"},
                         "value": "seg-1"}
                    ]}}
                })),
            },
        })
    }

    fn illustrated() -> Arc<FakeWorkflows> {
        Arc::new(FakeWorkflows::default().respond(
            WorkflowApp::Illustration,
            json!({"prompt": "smiling cat", "url": "https://img.example/cat.png"}),
        ))
    }

    #[tokio::test]
    async fn submission_delivers_to_authorized_recipient() {
        let slack = Arc::new(FakeSlack::default());
        let mut bot = bot_config();
        bot.recipients.insert("U2".to_owned(), "https://hooks.slack.com/services/T/B/X".to_owned());
        let workflows = illustrated();
        let handler = SoftenerHandler::new(services(slack.clone(), workflows.clone(), bot));

        handler
            .handle(&envelope(submission("U2")), &Route::View(CALLBACK_ID.to_owned()), &EventContext::default())
            .await
            .expect("handled");

        assert_eq!(workflows.calls()[0].0, WorkflowApp::Illustration);
        assert!(workflows.calls()[0].1.is_empty());

        let calls = slack.calls();
        let [SlackCall::Post(message)] = calls.as_slice() else {
            panic!("expected one chat.postMessage, got {calls:?}");
        };
        assert_eq!(message.channel, "U2");
        let blocks = serde_json::to_value(message.blocks.as_ref().expect("blocks")).expect("encode");
        assert_eq!(
            blocks[0]["text"]["text"],
            "<@U2> さんへ <@U1> さんからメッセージが届いています。"
        );
        assert_eq!(blocks[2]["text"]["text"], "お手すきの際に");
        assert_eq!(blocks[2]["accessory"]["image_url"], "https://img.example/cat.png");
        assert_eq!(blocks[2]["accessory"]["alt_text"], "smiling cat");
        assert_eq!(blocks[4]["text"]["text"], "関連ドキュメント");
        assert_eq!(
            blocks[5]["elements"][0]["elements"][0]["elements"],
            json!([{"type": "text", "text": "運用.md:\n"}, {"type": "text", "text": "抜粋:\n"}])
        );
    }

    #[tokio::test]
    async fn submission_for_unconfigured_recipient_is_skipped() {
        let slack = Arc::new(FakeSlack::default());
        let workflows = illustrated();
        let handler = SoftenerHandler::new(services(slack.clone(), workflows.clone(), bot_config()));

        handler
            .handle(&envelope(submission("U9")), &Route::View(CALLBACK_ID.to_owned()), &EventContext::default())
            .await
            .expect("handled");

        assert!(slack.calls().is_empty());
        assert!(workflows.calls().is_empty());
    }

    #[tokio::test]
    async fn submission_uses_webhook_when_configured() {
        let slack = Arc::new(FakeSlack::default());
        let mut bot = bot_config();
        bot.deliver_via_webhook = true;
        bot.recipients.insert("U2".to_owned(), "https://hooks.slack.com/services/T/B/X".to_owned());
        let handler = SoftenerHandler::new(services(slack.clone(), illustrated(), bot));

        handler
            .handle(&envelope(submission("U2")), &Route::View(CALLBACK_ID.to_owned()), &EventContext::default())
            .await
            .expect("handled");

        assert!(matches!(
            slack.calls().as_slice(),
            [SlackCall::Webhook { url, body }]
                if url == "https://hooks.slack.com/services/T/B/X" && body["blocks"].is_array()
        ));
    }

    #[tokio::test]
    async fn recipient_selection_is_only_logged() {
        let slack = Arc::new(FakeSlack::default());
        let handler =
            SoftenerHandler::new(services(slack.clone(), Arc::new(FakeWorkflows::default()), bot_config()));

        let event = SlackEvent::BlockActions(BlockActionsEvent {
            user_id: "U1".to_owned(),
            trigger_id: None,
            actions: vec![BlockAction { action_id: RECIPIENT_ACTION_ID.to_owned(), block_id: None, value: None }],
            view: None,
        });
        let result = handler
            .handle(&envelope(event), &Route::Action(RECIPIENT_ACTION_ID.to_owned()), &EventContext::default())
            .await
            .expect("handled");

        assert_eq!(result, HandlerResult::Processed);
        assert!(slack.calls().is_empty());
    }
}
