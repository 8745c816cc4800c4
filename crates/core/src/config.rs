use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "yaruki.toml";
pub const RECIPIENT_ENV_PREFIX: &str = "YARUKI_RECIPIENT_";
pub const LEGACY_RECIPIENT_ENV_PREFIX: &str = "WEBHOOK_URL_";

/// Slack caps `chat.scheduleMessage` at 120 days in the future.
pub const MAX_SCHEDULE_HORIZON_SECS: u64 = 120 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub dify: DifyConfig,
    pub bot: BotConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct DifyConfig {
    pub workflow_url: String,
    pub user: String,
    pub timeout_secs: u64,
    pub softener_token: SecretString,
    pub illustration_token: SecretString,
    pub task_extractor_token: SecretString,
    pub assistant_token: SecretString,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub utc_offset_minutes: i32,
    pub command_history_limit: u16,
    pub message_history_limit: u16,
    pub task_history_limit: u16,
    pub task_channel: String,
    pub reminder_text: String,
    pub reminder_delay_secs: u64,
    pub softener_role: String,
    pub default_recipient: Option<String>,
    /// User id -> incoming webhook URL. An entry authorizes delivery to that user.
    pub recipients: BTreeMap<String, String>,
    pub deliver_via_webhook: bool,
}

impl BotConfig {
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_api_base_url: Option<String>,
    pub dify_workflow_url: Option<String>,
    pub health_check_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                app_token: String::new().into(),
                bot_token: String::new().into(),
                api_base_url: "https://slack.com/api".to_string(),
            },
            dify: DifyConfig {
                workflow_url: String::new(),
                user: "yaruki".to_string(),
                timeout_secs: 60,
                softener_token: String::new().into(),
                illustration_token: String::new().into(),
                task_extractor_token: String::new().into(),
                assistant_token: String::new().into(),
            },
            bot: BotConfig {
                utc_offset_minutes: 9 * 60,
                command_history_limit: 20,
                message_history_limit: 10,
                task_history_limit: 100,
                task_channel: "C07S4DSDMBQ".to_string(),
                reminder_text: "議事録の修正終わった？🍔".to_string(),
                reminder_delay_secs: 30,
                softener_role: "上司".to_string(),
                default_recipient: None,
                recipients: BTreeMap::new(),
                deliver_via_webhook: false,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(slack_app_token_value) = slack.app_token {
                self.slack.app_token = secret_value(slack_app_token_value);
            }
            if let Some(slack_bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(slack_bot_token_value);
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
        }

        if let Some(dify) = patch.dify {
            if let Some(workflow_url) = dify.workflow_url {
                self.dify.workflow_url = workflow_url;
            }
            if let Some(user) = dify.user {
                self.dify.user = user;
            }
            if let Some(timeout_secs) = dify.timeout_secs {
                self.dify.timeout_secs = timeout_secs;
            }
            if let Some(token) = dify.softener_token {
                self.dify.softener_token = secret_value(token);
            }
            if let Some(token) = dify.illustration_token {
                self.dify.illustration_token = secret_value(token);
            }
            if let Some(token) = dify.task_extractor_token {
                self.dify.task_extractor_token = secret_value(token);
            }
            if let Some(token) = dify.assistant_token {
                self.dify.assistant_token = secret_value(token);
            }
        }

        if let Some(bot) = patch.bot {
            if let Some(utc_offset_minutes) = bot.utc_offset_minutes {
                self.bot.utc_offset_minutes = utc_offset_minutes;
            }
            if let Some(limit) = bot.command_history_limit {
                self.bot.command_history_limit = limit;
            }
            if let Some(limit) = bot.message_history_limit {
                self.bot.message_history_limit = limit;
            }
            if let Some(limit) = bot.task_history_limit {
                self.bot.task_history_limit = limit;
            }
            if let Some(task_channel) = bot.task_channel {
                self.bot.task_channel = task_channel;
            }
            if let Some(reminder_text) = bot.reminder_text {
                self.bot.reminder_text = reminder_text;
            }
            if let Some(reminder_delay_secs) = bot.reminder_delay_secs {
                self.bot.reminder_delay_secs = reminder_delay_secs;
            }
            if let Some(softener_role) = bot.softener_role {
                self.bot.softener_role = softener_role;
            }
            if let Some(default_recipient) = bot.default_recipient {
                self.bot.default_recipient = Some(default_recipient);
            }
            if let Some(recipients) = bot.recipients {
                self.bot.recipients.extend(recipients);
            }
            if let Some(deliver_via_webhook) = bot.deliver_via_webhook {
                self.bot.deliver_via_webhook = deliver_via_webhook;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env_with_alias("YARUKI_SLACK_APP_TOKEN", "SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env_with_alias("YARUKI_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("YARUKI_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }

        if let Some(value) = read_env_with_alias("YARUKI_DIFY_WORKFLOW_URL", "DIFY_API_APP_URL") {
            self.dify.workflow_url = value;
        }
        if let Some(value) = read_env_with_alias("YARUKI_DIFY_USER", "DIFY_API_TOKEN_USER") {
            self.dify.user = value;
        }
        if let Some(value) = read_env("YARUKI_DIFY_TIMEOUT_SECS") {
            self.dify.timeout_secs = parse_u64("YARUKI_DIFY_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) =
            read_env_with_alias("YARUKI_DIFY_SOFTENER_TOKEN", "DIFY_API_APP1_TOKEN")
        {
            self.dify.softener_token = secret_value(value);
        }
        if let Some(value) =
            read_env_with_alias("YARUKI_DIFY_ILLUSTRATION_TOKEN", "DIFY_API_APP2_TOKEN")
        {
            self.dify.illustration_token = secret_value(value);
        }
        if let Some(value) =
            read_env_with_alias("YARUKI_DIFY_TASK_EXTRACTOR_TOKEN", "DIFY_API_APP3_TOKEN")
        {
            self.dify.task_extractor_token = secret_value(value);
        }
        if let Some(value) =
            read_env_with_alias("YARUKI_DIFY_ASSISTANT_TOKEN", "DIFY_API_APP4_TOKEN")
        {
            self.dify.assistant_token = secret_value(value);
        }

        if let Some(value) = read_env("YARUKI_BOT_UTC_OFFSET_MINUTES") {
            self.bot.utc_offset_minutes = parse_i32("YARUKI_BOT_UTC_OFFSET_MINUTES", &value)?;
        }
        if let Some(value) = read_env("YARUKI_BOT_COMMAND_HISTORY_LIMIT") {
            self.bot.command_history_limit =
                parse_u16("YARUKI_BOT_COMMAND_HISTORY_LIMIT", &value)?;
        }
        if let Some(value) = read_env("YARUKI_BOT_MESSAGE_HISTORY_LIMIT") {
            self.bot.message_history_limit =
                parse_u16("YARUKI_BOT_MESSAGE_HISTORY_LIMIT", &value)?;
        }
        if let Some(value) = read_env("YARUKI_BOT_TASK_HISTORY_LIMIT") {
            self.bot.task_history_limit = parse_u16("YARUKI_BOT_TASK_HISTORY_LIMIT", &value)?;
        }
        if let Some(value) = read_env("YARUKI_BOT_TASK_CHANNEL") {
            self.bot.task_channel = value;
        }
        if let Some(value) = read_env("YARUKI_BOT_REMINDER_TEXT") {
            self.bot.reminder_text = value;
        }
        if let Some(value) = read_env("YARUKI_BOT_REMINDER_DELAY_SECS") {
            self.bot.reminder_delay_secs = parse_u64("YARUKI_BOT_REMINDER_DELAY_SECS", &value)?;
        }
        if let Some(value) = read_env("YARUKI_BOT_SOFTENER_ROLE") {
            self.bot.softener_role = value;
        }
        if let Some(value) = read_env("YARUKI_BOT_DEFAULT_RECIPIENT") {
            self.bot.default_recipient = Some(value);
        }
        if let Some(value) = read_env("YARUKI_BOT_DELIVER_VIA_WEBHOOK") {
            self.bot.deliver_via_webhook = parse_bool("YARUKI_BOT_DELIVER_VIA_WEBHOOK", &value)?;
        }
        self.bot.recipients.extend(recipient_env_entries());

        if let Some(value) = read_env("YARUKI_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("YARUKI_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("YARUKI_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level = read_env("YARUKI_LOGGING_LEVEL").or_else(|| read_env("YARUKI_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("YARUKI_LOGGING_FORMAT").or_else(|| read_env("YARUKI_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(api_base_url) = overrides.slack_api_base_url {
            self.slack.api_base_url = api_base_url;
        }
        if let Some(workflow_url) = overrides.dify_workflow_url {
            self.dify.workflow_url = workflow_url;
        }
        if let Some(health_check_port) = overrides.health_check_port {
            self.server.health_check_port = health_check_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_dify(&self.dify)?;
        validate_bot(&self.bot)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.app_token is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens".to_string()
        ));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    if !is_http_url(&slack.api_base_url) {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_dify(dify: &DifyConfig) -> Result<(), ConfigError> {
    let workflow_url = dify.workflow_url.trim();
    if workflow_url.is_empty() {
        return Err(ConfigError::Validation(
            "dify.workflow_url is required (legacy env: DIFY_API_APP_URL)".to_string(),
        ));
    }
    if !is_http_url(workflow_url) {
        return Err(ConfigError::Validation(
            "dify.workflow_url must start with http:// or https://".to_string(),
        ));
    }

    if dify.user.trim().is_empty() {
        return Err(ConfigError::Validation("dify.user must not be empty".to_string()));
    }

    if dify.timeout_secs == 0 || dify.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "dify.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let tokens = [
        ("dify.softener_token", "DIFY_API_APP1_TOKEN", &dify.softener_token),
        ("dify.illustration_token", "DIFY_API_APP2_TOKEN", &dify.illustration_token),
        ("dify.task_extractor_token", "DIFY_API_APP3_TOKEN", &dify.task_extractor_token),
        ("dify.assistant_token", "DIFY_API_APP4_TOKEN", &dify.assistant_token),
    ];
    for (key, legacy_env, token) in tokens {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{key} is required (legacy env: {legacy_env})"
            )));
        }
    }

    Ok(())
}

fn validate_bot(bot: &BotConfig) -> Result<(), ConfigError> {
    if !(-12 * 60..=14 * 60).contains(&bot.utc_offset_minutes) {
        return Err(ConfigError::Validation(
            "bot.utc_offset_minutes must be in range -720..=840".to_string(),
        ));
    }

    let limits = [
        ("bot.command_history_limit", bot.command_history_limit),
        ("bot.message_history_limit", bot.message_history_limit),
        ("bot.task_history_limit", bot.task_history_limit),
    ];
    for (key, limit) in limits {
        if limit == 0 || limit > 999 {
            return Err(ConfigError::Validation(format!("{key} must be in range 1..=999")));
        }
    }

    if bot.task_channel.trim().is_empty() {
        return Err(ConfigError::Validation("bot.task_channel must not be empty".to_string()));
    }

    if bot.reminder_text.trim().is_empty() {
        return Err(ConfigError::Validation("bot.reminder_text must not be empty".to_string()));
    }

    if bot.reminder_delay_secs == 0 || bot.reminder_delay_secs > MAX_SCHEDULE_HORIZON_SECS {
        return Err(ConfigError::Validation(format!(
            "bot.reminder_delay_secs must be in range 1..={MAX_SCHEDULE_HORIZON_SECS}"
        )));
    }

    for (user_id, url) in &bot.recipients {
        if !is_http_url(url) {
            return Err(ConfigError::Validation(format!(
                "bot.recipients.{user_id} must start with http:// or https://"
            )));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_with_alias(key: &str, legacy_key: &str) -> Option<String> {
    read_env(key).or_else(|| read_env(legacy_key))
}

fn recipient_env_entries() -> Vec<(String, String)> {
    env::vars()
        .filter_map(|(key, value)| {
            let user_id = key
                .strip_prefix(RECIPIENT_ENV_PREFIX)
                .or_else(|| key.strip_prefix(LEGACY_RECIPIENT_ENV_PREFIX))?;
            let value = value.trim();
            (!user_id.is_empty() && !value.is_empty())
                .then(|| (user_id.to_string(), value.to_string()))
        })
        .collect()
}

fn parse_i32(key: &str, value: &str) -> Result<i32, ConfigError> {
    value.parse::<i32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    dify: Option<DifyPatch>,
    bot: Option<BotPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DifyPatch {
    workflow_url: Option<String>,
    user: Option<String>,
    timeout_secs: Option<u64>,
    softener_token: Option<String>,
    illustration_token: Option<String>,
    task_extractor_token: Option<String>,
    assistant_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    utc_offset_minutes: Option<i32>,
    command_history_limit: Option<u16>,
    message_history_limit: Option<u16>,
    task_history_limit: Option<u16>,
    task_channel: Option<String>,
    reminder_text: Option<String>,
    reminder_delay_secs: Option<u64>,
    softener_role: Option<String>,
    default_recipient: Option<String>,
    recipients: Option<BTreeMap<String, String>>,
    deliver_via_webhook: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
