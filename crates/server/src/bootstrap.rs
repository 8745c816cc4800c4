use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use yaruki_core::config::{AppConfig, ConfigError};
use yaruki_core::SystemClock;
use yaruki_dify::{DifyClient, DifyError};
use yaruki_slack::socket::ReconnectPolicy;
use yaruki_slack::{
    bot_dispatcher, BotServices, ConnectionStatus, SlackApiError, SlackWebClient, SocketModeRunner,
    WebSocketTransport,
};

pub struct Application {
    pub config: AppConfig,
    pub slack_runner: SocketModeRunner,
    pub connection_status: ConnectionStatus,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("slack client setup failed: {0}")]
    SlackClient(#[source] SlackApiError),
    #[error("dify client setup failed: {0}")]
    DifyClient(#[source] DifyError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let slack = SlackWebClient::new(config.slack.bot_token.clone(), config.slack.api_base_url.clone())
        .map_err(BootstrapError::SlackClient)?;
    let workflows = DifyClient::from_config(&config.dify).map_err(BootstrapError::DifyClient)?;

    let services = BotServices {
        slack: Arc::new(slack.clone()),
        workflows: Arc::new(workflows),
        clock: Arc::new(SystemClock),
        bot: Arc::new(config.bot.clone()),
    };
    let dispatcher = bot_dispatcher(services);
    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        routes = dispatcher.route_count(),
        recipients = config.bot.recipients.len(),
        "slack handlers registered"
    );

    let transport = WebSocketTransport::new(slack, config.slack.app_token.clone());
    let connection_status = ConnectionStatus::default();
    let slack_runner =
        SocketModeRunner::new(Arc::new(transport), Arc::new(dispatcher), ReconnectPolicy::default())
            .with_status(connection_status.clone());

    Ok(Application { config, slack_runner, connection_status })
}
