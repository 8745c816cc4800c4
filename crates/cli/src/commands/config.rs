use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use toml::Value;
use yaruki_core::config::{
    resolve_config_path, AppConfig, LoadOptions, LEGACY_RECIPIENT_ENV_PREFIX, RECIPIENT_ENV_PREFIX,
};

use super::{CommandResult, EXIT_CONFIG_FAILURE, EXIT_OK};

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Field {
    Field { key, value: value.into(), env_keys }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG_FAILURE,
            )
        }
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source =
            field_source(field.key, field.env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.push(render_line(
        "bot.recipients",
        &render_recipients(&config),
        recipients_source(config_file_doc.as_ref(), config_file_path.as_deref()),
    ));

    CommandResult { exit_code: EXIT_OK, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let bot = &config.bot;
    vec![
        field(
            "slack.app_token",
            redact_token(&config.slack.app_token),
            &["YARUKI_SLACK_APP_TOKEN", "SLACK_APP_TOKEN"],
        ),
        field(
            "slack.bot_token",
            redact_token(&config.slack.bot_token),
            &["YARUKI_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN"],
        ),
        field("slack.api_base_url", &config.slack.api_base_url, &["YARUKI_SLACK_API_BASE_URL"]),
        field(
            "dify.workflow_url",
            &config.dify.workflow_url,
            &["YARUKI_DIFY_WORKFLOW_URL", "DIFY_API_APP_URL"],
        ),
        field("dify.user", &config.dify.user, &["YARUKI_DIFY_USER", "DIFY_API_TOKEN_USER"]),
        field("dify.timeout_secs", config.dify.timeout_secs.to_string(), &["YARUKI_DIFY_TIMEOUT_SECS"]),
        field(
            "dify.softener_token",
            redact_token(&config.dify.softener_token),
            &["YARUKI_DIFY_SOFTENER_TOKEN", "DIFY_API_APP1_TOKEN"],
        ),
        field(
            "dify.illustration_token",
            redact_token(&config.dify.illustration_token),
            &["YARUKI_DIFY_ILLUSTRATION_TOKEN", "DIFY_API_APP2_TOKEN"],
        ),
        field(
            "dify.task_extractor_token",
            redact_token(&config.dify.task_extractor_token),
            &["YARUKI_DIFY_TASK_EXTRACTOR_TOKEN", "DIFY_API_APP3_TOKEN"],
        ),
        field(
            "dify.assistant_token",
            redact_token(&config.dify.assistant_token),
            &["YARUKI_DIFY_ASSISTANT_TOKEN", "DIFY_API_APP4_TOKEN"],
        ),
        field(
            "bot.utc_offset_minutes",
            bot.utc_offset_minutes.to_string(),
            &["YARUKI_BOT_UTC_OFFSET_MINUTES"],
        ),
        field(
            "bot.command_history_limit",
            bot.command_history_limit.to_string(),
            &["YARUKI_BOT_COMMAND_HISTORY_LIMIT"],
        ),
        field(
            "bot.message_history_limit",
            bot.message_history_limit.to_string(),
            &["YARUKI_BOT_MESSAGE_HISTORY_LIMIT"],
        ),
        field(
            "bot.task_history_limit",
            bot.task_history_limit.to_string(),
            &["YARUKI_BOT_TASK_HISTORY_LIMIT"],
        ),
        field("bot.task_channel", &bot.task_channel, &["YARUKI_BOT_TASK_CHANNEL"]),
        field("bot.reminder_text", &bot.reminder_text, &["YARUKI_BOT_REMINDER_TEXT"]),
        field(
            "bot.reminder_delay_secs",
            bot.reminder_delay_secs.to_string(),
            &["YARUKI_BOT_REMINDER_DELAY_SECS"],
        ),
        field("bot.softener_role", &bot.softener_role, &["YARUKI_BOT_SOFTENER_ROLE"]),
        field(
            "bot.default_recipient",
            bot.default_recipient.as_deref().unwrap_or("<unset>"),
            &["YARUKI_BOT_DEFAULT_RECIPIENT"],
        ),
        field(
            "bot.deliver_via_webhook",
            bot.deliver_via_webhook.to_string(),
            &["YARUKI_BOT_DELIVER_VIA_WEBHOOK"],
        ),
        field("server.bind_address", &config.server.bind_address, &["YARUKI_SERVER_BIND_ADDRESS"]),
        field(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["YARUKI_SERVER_HEALTH_CHECK_PORT"],
        ),
        field("logging.level", &config.logging.level, &["YARUKI_LOGGING_LEVEL", "YARUKI_LOG_LEVEL"]),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["YARUKI_LOGGING_FORMAT", "YARUKI_LOG_FORMAT"],
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    file_source(key_path, config_file_doc, config_file_path).unwrap_or_else(|| "default".to_string())
}

fn file_source(
    key_path: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> Option<String> {
    let doc = config_file_doc?;
    contains_path(doc, key_path).then(|| {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        format!("file ({file_path})")
    })
}

// Recipients merge file entries with every `*_<USER_ID>` env var.
fn recipients_source(config_file_doc: Option<&Value>, config_file_path: Option<&Path>) -> String {
    let from_env = env::vars_os().any(|(key, _)| {
        key.to_str().is_some_and(|key| {
            key.starts_with(RECIPIENT_ENV_PREFIX) || key.starts_with(LEGACY_RECIPIENT_ENV_PREFIX)
        })
    });
    if from_env {
        return format!("env ({RECIPIENT_ENV_PREFIX}*, {LEGACY_RECIPIENT_ENV_PREFIX}*)");
    }

    file_source("bot.recipients", config_file_doc, config_file_path)
        .unwrap_or_else(|| "default".to_string())
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// User ids only; webhook URLs embed credentials.
fn render_recipients(config: &AppConfig) -> String {
    if config.bot.recipients.is_empty() {
        return "<none>".to_string();
    }
    config.bot.recipients.keys().cloned().collect::<Vec<_>>().join(", ")
}

fn redact_token(token: &SecretString) -> String {
    let trimmed = token.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
