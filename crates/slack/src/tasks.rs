//! Shortcut app 2: pull open tasks out of the task channel's history.

use async_trait::async_trait;
use tracing::{info, warn};
use yaruki_core::format_today;
use yaruki_dify::inputs::task_inputs;
use yaruki_dify::{Task, WorkflowApp};

use crate::blocks::{Block, Element, ModalView, TextObject};
use crate::events::{
    BlockActionsEvent, BotServices, EventContext, EventHandler, EventHandlerError, HandlerResult,
    Route, SlackEnvelope, SlackEvent,
};
use crate::history::{history_json, prepare_history};

pub const SHORTCUT_ID: &str = "task_manager_001";
pub const CALLBACK_ID: &str = "APP2_CALLBACK_ID";
pub const FETCH_BLOCK_ID: &str = "APP2_MODAL1_BLOCK1_ID";
pub const FETCH_ACTION_ID: &str = "APP2_MODAL1_BLOCK1_ACTIONID";
pub const TASKS_BLOCK_ID: &str = "APP2_MODAL1_BLOCK2_ID";
pub const TASKS_ACTION_ID: &str = "APP2_MODAL1_BLOCK2_ACTIONID";
pub const CHANGES_BLOCK_ID: &str = "APP2_MODAL1_BLOCK3_ID";
pub const CHANGES_ACTION_ID: &str = "APP2_MODAL1_BLOCK3_ACTIONID";
pub const REQUEST_BLOCK_ID: &str = "APP2_MODAL1_BLOCK4_ID";
pub const REQUEST_ACTION_ID: &str = "APP2_MODAL1_BLOCK4_ACTIONID";

pub fn task_view(tasks: Option<&[Task]>) -> ModalView {
    let view = ModalView::new(CALLBACK_ID, "モーダル").submit("送信").close("閉じる").block(
        Block::Actions {
            block_id: Some(FETCH_BLOCK_ID.to_owned()),
            elements: vec![Element::button(FETCH_ACTION_ID, "タスク取得")],
        },
    );

    let Some(tasks) = tasks.filter(|tasks| !tasks.is_empty()) else {
        return view;
    };

    let lines = tasks.iter().map(Task::summary_line).collect::<Vec<_>>().join("\n");
    view.block(Block::Input {
        block_id: TASKS_BLOCK_ID.to_owned(),
        element: Element::multiline_input(TASKS_ACTION_ID, Some(lines)),
        label: TextObject::plain("タスク"),
    })
    .block(Block::Input {
        block_id: CHANGES_BLOCK_ID.to_owned(),
        element: Element::multiline_input(CHANGES_ACTION_ID, None),
        label: TextObject::plain("変更ある？？"),
    })
    .block(Block::Actions {
        block_id: Some(REQUEST_BLOCK_ID.to_owned()),
        elements: vec![Element::button(REQUEST_ACTION_ID, "お願い！")],
    })
}

pub struct TaskManagerHandler {
    services: BotServices,
}

impl TaskManagerHandler {
    pub fn new(services: BotServices) -> Self {
        Self { services }
    }

    async fn fetch_tasks(
        &self,
        event: &BlockActionsEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(view) = &event.view else {
            return Err(EventHandlerError::InvalidPayload {
                route: FETCH_ACTION_ID.to_owned(),
                detail: "the modal view".to_owned(),
            });
        };

        let bot = &self.services.bot;
        let messages = self.services.slack.conversations_history(&bot.task_channel, bot.task_history_limit).await?;
        let history = prepare_history(messages);
        let date = format_today(self.services.clock.now_utc(), bot.utc_offset());

        let tasks = match self
            .services
            .workflows
            .run(WorkflowApp::TaskExtractor, task_inputs(history_json(&history), date))
            .await
            .and_then(|outputs| outputs.task_list())
        {
            Ok(tasks) => tasks,
            Err(error) => {
                warn!(
                    event_name = "ingress.slack.task_extraction_failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "task extractor failed; leaving modal unchanged"
                );
                return Ok(HandlerResult::Processed);
            }
        };

        info!(
            event_name = "ingress.slack.tasks_extracted",
            correlation_id = %ctx.correlation_id,
            channel_id = %bot.task_channel,
            messages = history.len(),
            tasks = tasks.len(),
            "task list ready"
        );

        self.services.slack.views_update(&view.id, view.hash.as_deref(), &task_view(Some(&tasks))).await?;
        Ok(HandlerResult::Processed)
    }
}

#[async_trait]
impl EventHandler for TaskManagerHandler {
    fn routes(&self) -> Vec<Route> {
        vec![
            Route::Shortcut(SHORTCUT_ID.to_owned()),
            Route::Action(FETCH_ACTION_ID.to_owned()),
            Route::Action(REQUEST_ACTION_ID.to_owned()),
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
            (SlackEvent::Shortcut(shortcut), Route::Shortcut(_)) => {
                self.services.slack.views_open(&shortcut.trigger_id, &task_view(None)).await?;
                Ok(HandlerResult::Processed)
            }
            (SlackEvent::BlockActions(event), Route::Action(action_id)) if action_id == FETCH_ACTION_ID => {
                self.fetch_tasks(event, ctx).await
            }
            (event @ (SlackEvent::BlockActions(_) | SlackEvent::ViewSubmission(_)), _) => {
                info!(
                    event_name = "ingress.slack.task_request",
                    route = %route,
                    correlation_id = %ctx.correlation_id,
                    user_id = event.user_id().unwrap_or("unknown"),
                    "task request received"
                );
                Ok(HandlerResult::Processed)
            }
            _ => Ok(HandlerResult::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use yaruki_dify::{DifyError, Task, WorkflowApp};

    use super::{task_view, TaskManagerHandler, FETCH_ACTION_ID, REQUEST_ACTION_ID, SHORTCUT_ID, TASKS_BLOCK_ID};
    use crate::blocks::{Block, Element};
    use crate::events::{
        BlockAction, BlockActionsEvent, EventContext, EventHandler, HandlerResult, Route,
        ShortcutEvent, SlackEvent, ViewPayload,
    };
    use crate::test_support::{bot_config, envelope, services, FakeSlack, FakeWorkflows, SlackCall};

    fn fetch_click() -> SlackEvent {
        SlackEvent::BlockActions(BlockActionsEvent {
            user_id: "U1".to_owned(),
            trigger_id: None,
            actions: vec![BlockAction { action_id: FETCH_ACTION_ID.to_owned(), block_id: None, value: None }],
            view: Some(ViewPayload {
                id: "V2".to_owned(),
                hash: Some("h2".to_owned()),
                callback_id: super::CALLBACK_ID.to_owned(),
                state: Default::default(),
            }),
        })
    }

    #[test]
    fn task_lines_fill_the_task_input() {
        let tasks = vec![
            Task { term: "3/12".to_owned(), description: "議事録修正".to_owned(), status: "未着手".to_owned() },
            Task { term: "3/14".to_owned(), description: "資料共有".to_owned(), status: "完了".to_owned() },
        ];
        let view = task_view(Some(&tasks));
        assert_eq!(view.blocks.len(), 4);
        assert!(matches!(
            view.find_block(TASKS_BLOCK_ID),
            Some(Block::Input { element: Element::PlainTextInput { initial_value: Some(lines), .. }, .. })
                if lines == "3/12 議事録修正 未着手\n3/14 資料共有 完了"
        ));
        assert_eq!(task_view(None).blocks.len(), 1);
    }

    #[test]
    fn empty_task_list_keeps_only_the_fetch_button() {
        let view = task_view(Some(&[]));
        assert_eq!(view, task_view(None));
        assert!(view.find_block(TASKS_BLOCK_ID).is_none());
    }

    #[tokio::test]
    async fn shortcut_opens_empty_task_modal() {
        let slack = Arc::new(FakeSlack::default());
        let handler =
            TaskManagerHandler::new(services(slack.clone(), Arc::new(FakeWorkflows::default()), bot_config()));

        let event = SlackEvent::Shortcut(ShortcutEvent {
            callback_id: SHORTCUT_ID.to_owned(),
            trigger_id: "trig-2".to_owned(),
            user_id: "U1".to_owned(),
            channel_id: None,
            message_text: None,
        });
        handler
            .handle(&envelope(event), &Route::Shortcut(SHORTCUT_ID.to_owned()), &EventContext::default())
            .await
            .expect("handled");

        assert_eq!(
            slack.calls(),
            vec![SlackCall::ViewsOpen { trigger_id: "trig-2".to_owned(), view: task_view(None) }]
        );
    }

    #[tokio::test]
    async fn fetch_reads_task_channel_and_updates_view() {
        let slack = Arc::new(FakeSlack::with_history(vec![json!({"ts": "1.0", "text": "明日までに議事録"})]));
        let workflows = Arc::new(FakeWorkflows::default().respond(
            WorkflowApp::TaskExtractor,
            json!({"task_list": "[{\"term\": \"3/11\", \"description\": \"議事録\", \"status\": \"未着手\"}]"}),
        ));
        let handler = TaskManagerHandler::new(services(slack.clone(), workflows.clone(), bot_config()));

        handler
            .handle(&envelope(fetch_click()), &Route::Action(FETCH_ACTION_ID.to_owned()), &EventContext::default())
            .await
            .expect("handled");

        let calls = slack.calls();
        assert_eq!(calls[0], SlackCall::History { channel: "C07S4DSDMBQ".to_owned(), limit: 100 });
        let SlackCall::ViewsUpdate { view_id, hash, view } = &calls[1] else {
            panic!("expected views.update, got {calls:?}");
        };
        assert_eq!(view_id, "V2");
        assert_eq!(hash.as_deref(), Some("h2"));
        assert_eq!(view.blocks.len(), 4);

        let workflow_calls = workflows.calls();
        let (app, inputs) = &workflow_calls[0];
        assert_eq!(*app, WorkflowApp::TaskExtractor);
        assert_eq!(inputs["date"], "2025年03月10日 10:00:00");
        assert!(inputs["chat_history"].as_str().is_some_and(|history| history.contains("明日までに議事録")));
    }

    #[tokio::test]
    async fn extractor_failure_does_not_update_view() {
        let slack = Arc::new(FakeSlack::default());
        let workflows = Arc::new(
            FakeWorkflows::default()
                .fail(WorkflowApp::TaskExtractor, DifyError::MissingOutput("task_list".to_owned())),
        );
        let handler = TaskManagerHandler::new(services(slack.clone(), workflows, bot_config()));

        let result = handler
            .handle(&envelope(fetch_click()), &Route::Action(FETCH_ACTION_ID.to_owned()), &EventContext::default())
            .await
            .expect("handled");

        assert_eq!(result, HandlerResult::Processed);
        assert!(!slack.calls().iter().any(|call| matches!(call, SlackCall::ViewsUpdate { .. })));
    }

    #[tokio::test]
    async fn request_button_is_only_logged() {
        let slack = Arc::new(FakeSlack::default());
        let handler =
            TaskManagerHandler::new(services(slack.clone(), Arc::new(FakeWorkflows::default()), bot_config()));

        let event = SlackEvent::BlockActions(BlockActionsEvent {
            user_id: "U1".to_owned(),
            trigger_id: None,
            actions: vec![BlockAction { action_id: REQUEST_ACTION_ID.to_owned(), block_id: None, value: None }],
            view: None,
        });
        let result = handler
            .handle(&envelope(event), &Route::Action(REQUEST_ACTION_ID.to_owned()), &EventContext::default())
            .await
            .expect("handled");

        assert_eq!(result, HandlerResult::Processed);
        assert!(slack.calls().is_empty());
    }
}
