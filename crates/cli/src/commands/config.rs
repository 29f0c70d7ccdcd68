use std::fs;
use std::path::{Path, PathBuf};

use paybot_core::config::{read_field_env, resolve_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::CommandResult;

struct Sources {
    file_path: Option<PathBuf>,
    file_doc: Option<Value>,
}

impl Sources {
    fn detect() -> Self {
        let file_path = resolve_config_path(None);
        let file_doc = load_config_file_doc(file_path.as_deref());
        Self { file_path, file_doc }
    }

    fn of(&self, key_path: &str) -> String {
        if let Some((env_key, _)) = read_field_env(key_path) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_owned());
                return format!("file ({file_path})");
            }
        }

        "default".to_owned()
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let sources = Sources::detect();
    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_owned()];
    let mut push = |key: &str, value: String| lines.push(render_line(key, &value, sources.of(key)));

    push("slack.bot_token", redact_token(config.slack.bot_token.expose_secret()));
    push(
        "slack.app_token",
        config
            .slack
            .app_token
            .as_ref()
            .map(|token| redact_token(token.expose_secret()))
            .unwrap_or_else(unset),
    );
    push("slack.signing_secret", redact_secret(config.slack.signing_secret.as_ref()));
    push("slack.channel_id", optional(config.slack.channel_id.as_deref()));
    push("slack.api_base_url", config.slack.api_base_url.clone());

    push("notify.primary_user_id", optional(config.notify.primary_user_id.as_deref()));
    push("notify.secondary_user_id", optional(config.notify.secondary_user_id.as_deref()));

    push("mail.smtp_host", config.mail.smtp_host.clone());
    push("mail.smtp_port", config.mail.smtp_port.to_string());
    push("mail.sender", optional(config.mail.sender.as_deref()));
    push("mail.password", redact_secret(config.mail.password.as_ref()));
    push("mail.receivers", list(&config.mail.receivers));
    push("mail.escalation_receivers", list(&config.mail.escalation_receivers));

    push("storage.csv_path", config.storage.csv_path.display().to_string());
    push("storage.workbook_name", config.storage.workbook_name.clone());
    push("form.offer_update", config.form.offer_update.to_string());

    push("server.bind_address", config.server.bind_address.clone());
    push("server.port", config.server.port.to_string());
    push("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string());
    push("keepalive.url", optional(config.keepalive.url.as_deref()));
    push("keepalive.interval_secs", config.keepalive.interval_secs.to_string());

    push("logging.level", config.logging.level.clone());
    push("logging.format", format!("{:?}", config.logging.format));

    lines.push(format!("delivery mode: {:?}", config.slack.delivery_mode()));
    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
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

fn unset() -> String {
    "<unset>".to_owned()
}

fn optional(value: Option<&str>) -> String {
    value.map(str::to_owned).unwrap_or_else(unset)
}

fn list(values: &[String]) -> String {
    if values.is_empty() {
        unset()
    } else {
        values.join(", ")
    }
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) if !secret.expose_secret().trim().is_empty() => "<redacted>".to_owned(),
        _ => unset(),
    }
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_owned();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_owned()
}
