use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["paybot.toml", "config/paybot.toml"];

/// Environment keys per config path. The first key is the prefixed name; later keys are
/// the bare names the bot has historically been deployed with.
pub const ENV_KEYS: &[(&str, &[&str])] = &[
    ("slack.bot_token", &["PAYBOT_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN"]),
    ("slack.app_token", &["PAYBOT_SLACK_APP_TOKEN", "SLACK_APP_TOKEN"]),
    ("slack.signing_secret", &["PAYBOT_SLACK_SIGNING_SECRET", "SLACK_SIGNING_SECRET"]),
    ("slack.channel_id", &["PAYBOT_SLACK_CHANNEL_ID", "CHANNEL_ID"]),
    ("slack.api_base_url", &["PAYBOT_SLACK_API_BASE_URL"]),
    ("notify.primary_user_id", &["PAYBOT_NOTIFY_PRIMARY_USER_ID"]),
    ("notify.secondary_user_id", &["PAYBOT_NOTIFY_SECONDARY_USER_ID"]),
    ("mail.smtp_host", &["PAYBOT_MAIL_SMTP_HOST"]),
    ("mail.smtp_port", &["PAYBOT_MAIL_SMTP_PORT"]),
    ("mail.sender", &["PAYBOT_MAIL_SENDER", "EMAIL_SENDER"]),
    ("mail.password", &["PAYBOT_MAIL_PASSWORD", "EMAIL_PASSWORD"]),
    ("mail.receivers", &["PAYBOT_MAIL_RECEIVERS", "EMAIL_RECEIVER"]),
    ("mail.escalation_receivers", &["PAYBOT_MAIL_ESCALATION_RECEIVERS"]),
    ("storage.csv_path", &["PAYBOT_STORAGE_CSV_PATH"]),
    ("storage.workbook_name", &["PAYBOT_STORAGE_WORKBOOK_NAME"]),
    ("form.offer_update", &["PAYBOT_FORM_OFFER_UPDATE"]),
    ("server.bind_address", &["PAYBOT_SERVER_BIND_ADDRESS"]),
    ("server.port", &["PAYBOT_SERVER_PORT", "PORT"]),
    ("server.graceful_shutdown_secs", &["PAYBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
    ("keepalive.url", &["PAYBOT_KEEPALIVE_URL"]),
    ("keepalive.interval_secs", &["PAYBOT_KEEPALIVE_INTERVAL_SECS"]),
    ("logging.level", &["PAYBOT_LOGGING_LEVEL", "PAYBOT_LOG_LEVEL"]),
    ("logging.format", &["PAYBOT_LOGGING_FORMAT", "PAYBOT_LOG_FORMAT"]),
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub notify: NotifyConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
    pub form: FormConfig,
    pub server: ServerConfig,
    pub keepalive: KeepAliveConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    /// Socket Mode is used when this is set; otherwise the HTTP routes serve events.
    pub app_token: Option<SecretString>,
    pub signing_secret: Option<SecretString>,
    pub channel_id: Option<String>,
    pub api_base_url: String,
}

impl SlackConfig {
    pub fn delivery_mode(&self) -> DeliveryMode {
        match &self.app_token {
            Some(token) if !token.expose_secret().trim().is_empty() => DeliveryMode::SocketMode,
            _ => DeliveryMode::Http,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    SocketMode,
    Http,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NotifyConfig {
    pub primary_user_id: Option<String>,
    pub secondary_user_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender: Option<String>,
    pub password: Option<SecretString>,
    pub receivers: Vec<String>,
    pub escalation_receivers: Vec<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_owned(),
            smtp_port: 465,
            sender: None,
            password: None,
            receivers: Vec::new(),
            escalation_receivers: Vec::new(),
        }
    }
}

impl MailConfig {
    /// Names of the settings that must be present before a message can be sent.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.sender.as_deref().map_or(true, |value| value.trim().is_empty()) {
            missing.push("mail.sender");
        }
        if self.password.as_ref().map_or(true, |value| value.expose_secret().trim().is_empty()) {
            missing.push("mail.password");
        }
        if self.receivers.is_empty() {
            missing.push("mail.receivers");
        }
        missing
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub csv_path: PathBuf,
    pub workbook_name: String,
}

#[derive(Clone, Debug)]
pub struct FormConfig {
    pub offer_update: bool,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct KeepAliveConfig {
    pub url: Option<String>,
    pub interval_secs: u64,
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
    pub slack_bot_token: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_channel_id: Option<String>,
    pub csv_path: Option<PathBuf>,
    pub server_port: Option<u16>,
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
                bot_token: String::new().into(),
                app_token: None,
                signing_secret: None,
                channel_id: None,
                api_base_url: "https://slack.com/api".to_owned(),
            },
            notify: NotifyConfig::default(),
            mail: MailConfig::default(),
            storage: StorageConfig {
                csv_path: PathBuf::from("payment_data.csv"),
                workbook_name: "Payment Data.xlsx".to_owned(),
            },
            form: FormConfig { offer_update: true },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_owned(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            keepalive: KeepAliveConfig { url: None, interval_secs: 600 },
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
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
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
            if let Some(app_token) = slack.app_token {
                self.slack.app_token = non_empty(app_token).map(secret_value);
            }
            if let Some(signing_secret) = slack.signing_secret {
                self.slack.signing_secret = non_empty(signing_secret).map(secret_value);
            }
            if let Some(channel_id) = slack.channel_id {
                self.slack.channel_id = non_empty(channel_id);
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
        }

        if let Some(notify) = patch.notify {
            if let Some(primary) = notify.primary_user_id {
                self.notify.primary_user_id = non_empty(primary);
            }
            if let Some(secondary) = notify.secondary_user_id {
                self.notify.secondary_user_id = non_empty(secondary);
            }
        }

        if let Some(mail) = patch.mail {
            if let Some(smtp_host) = mail.smtp_host {
                self.mail.smtp_host = smtp_host;
            }
            if let Some(smtp_port) = mail.smtp_port {
                self.mail.smtp_port = smtp_port;
            }
            if let Some(sender) = mail.sender {
                self.mail.sender = non_empty(sender);
            }
            if let Some(password) = mail.password {
                self.mail.password = non_empty(password).map(secret_value);
            }
            if let Some(receivers) = mail.receivers {
                self.mail.receivers = clean_list(receivers);
            }
            if let Some(escalation_receivers) = mail.escalation_receivers {
                self.mail.escalation_receivers = clean_list(escalation_receivers);
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(csv_path) = storage.csv_path {
                self.storage.csv_path = csv_path;
            }
            if let Some(workbook_name) = storage.workbook_name {
                self.storage.workbook_name = workbook_name;
            }
        }

        if let Some(form) = patch.form {
            if let Some(offer_update) = form.offer_update {
                self.form.offer_update = offer_update;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(keepalive) = patch.keepalive {
            if let Some(url) = keepalive.url {
                self.keepalive.url = non_empty(url);
            }
            if let Some(interval_secs) = keepalive.interval_secs {
                self.keepalive.interval_secs = interval_secs;
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
        if let Some((_, value)) = read_field_env("slack.bot_token") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some((_, value)) = read_field_env("slack.app_token") {
            self.slack.app_token = Some(secret_value(value));
        }
        if let Some((_, value)) = read_field_env("slack.signing_secret") {
            self.slack.signing_secret = Some(secret_value(value));
        }
        if let Some((_, value)) = read_field_env("slack.channel_id") {
            self.slack.channel_id = Some(value);
        }
        if let Some((_, value)) = read_field_env("slack.api_base_url") {
            self.slack.api_base_url = value;
        }

        if let Some((_, value)) = read_field_env("notify.primary_user_id") {
            self.notify.primary_user_id = Some(value);
        }
        if let Some((_, value)) = read_field_env("notify.secondary_user_id") {
            self.notify.secondary_user_id = Some(value);
        }

        if let Some((_, value)) = read_field_env("mail.smtp_host") {
            self.mail.smtp_host = value;
        }
        if let Some((key, value)) = read_field_env("mail.smtp_port") {
            self.mail.smtp_port = parse_u16(key, &value)?;
        }
        if let Some((_, value)) = read_field_env("mail.sender") {
            self.mail.sender = Some(value);
        }
        if let Some((_, value)) = read_field_env("mail.password") {
            self.mail.password = Some(secret_value(value));
        }
        if let Some((_, value)) = read_field_env("mail.receivers") {
            self.mail.receivers = split_list(&value);
        }
        if let Some((_, value)) = read_field_env("mail.escalation_receivers") {
            self.mail.escalation_receivers = split_list(&value);
        }

        if let Some((_, value)) = read_field_env("storage.csv_path") {
            self.storage.csv_path = PathBuf::from(value);
        }
        if let Some((_, value)) = read_field_env("storage.workbook_name") {
            self.storage.workbook_name = value;
        }

        if let Some((key, value)) = read_field_env("form.offer_update") {
            self.form.offer_update = parse_bool(key, &value)?;
        }

        if let Some((_, value)) = read_field_env("server.bind_address") {
            self.server.bind_address = value;
        }
        if let Some((key, value)) = read_field_env("server.port") {
            self.server.port = parse_u16(key, &value)?;
        }
        if let Some((key, value)) = read_field_env("server.graceful_shutdown_secs") {
            self.server.graceful_shutdown_secs = parse_u64(key, &value)?;
        }

        if let Some((_, value)) = read_field_env("keepalive.url") {
            self.keepalive.url = Some(value);
        }
        if let Some((key, value)) = read_field_env("keepalive.interval_secs") {
            self.keepalive.interval_secs = parse_u64(key, &value)?;
        }

        if let Some((_, value)) = read_field_env("logging.level") {
            self.logging.level = value;
        }
        if let Some((_, value)) = read_field_env("logging.format") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(bot_token);
        }
        if let Some(app_token) = overrides.slack_app_token {
            self.slack.app_token = non_empty(app_token).map(secret_value);
        }
        if let Some(channel_id) = overrides.slack_channel_id {
            self.slack.channel_id = non_empty(channel_id);
        }
        if let Some(csv_path) = overrides.csv_path {
            self.storage.csv_path = csv_path;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_mail(&self.mail)?;
        validate_storage(&self.storage)?;
        validate_server(&self.server)?;
        validate_keepalive(&self.keepalive)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Returns the config file `load` would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_PATHS.into_iter().map(PathBuf::from).find(|path| path.exists())
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

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_owned()
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

    if let Some(app_token) = &slack.app_token {
        let app_token = app_token.expose_secret();
        if !app_token.starts_with("xapp-") {
            let hint = if app_token.starts_with("xoxb-") {
                " (hint: you may have used the bot token instead of the app token)"
            } else {
                ""
            };
            return Err(ConfigError::Validation(format!(
                "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens"
            )));
        }
    }

    if slack.delivery_mode() == DeliveryMode::Http {
        let missing = slack
            .signing_secret
            .as_ref()
            .map_or(true, |secret| secret.expose_secret().trim().is_empty());
        if missing {
            return Err(ConfigError::Validation(
                "slack.signing_secret is required when slack.app_token is not set (HTTP mode)"
                    .to_owned(),
            ));
        }
    }

    if !slack.api_base_url.starts_with("http://") && !slack.api_base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_owned(),
        ));
    }

    Ok(())
}

fn validate_mail(mail: &MailConfig) -> Result<(), ConfigError> {
    if mail.smtp_port == 0 {
        return Err(ConfigError::Validation("mail.smtp_port must be greater than zero".to_owned()));
    }
    if mail.smtp_host.trim().is_empty() {
        return Err(ConfigError::Validation("mail.smtp_host must not be empty".to_owned()));
    }
    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if storage.csv_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("storage.csv_path must not be empty".to_owned()));
    }
    if !storage.workbook_name.ends_with(".xlsx") {
        return Err(ConfigError::Validation(
            "storage.workbook_name must end with `.xlsx`".to_owned(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_owned()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

fn validate_keepalive(keepalive: &KeepAliveConfig) -> Result<(), ConfigError> {
    if let Some(url) = &keepalive.url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "keepalive.url must start with http:// or https://".to_owned(),
            ));
        }
        if keepalive.interval_secs < 30 {
            return Err(ConfigError::Validation(
                "keepalive.interval_secs must be at least 30".to_owned(),
            ));
        }
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_owned(),
        )),
    }
}

/// Environment keys consulted for a config path, in lookup order.
pub fn env_keys(key_path: &str) -> &'static [&'static str] {
    ENV_KEYS.iter().find(|(path, _)| *path == key_path).map(|(_, keys)| *keys).unwrap_or(&[])
}

/// First non-empty environment value for a config path, with the key it came from.
pub fn read_field_env(key_path: &str) -> Option<(&'static str, String)> {
    env_keys(key_path).iter().find_map(|key| read_env(key).map(|value| (*key, value)))
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values.into_iter().filter_map(|value| non_empty(value.trim().to_owned())).collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| {
        ConfigError::InvalidEnvOverride { key: key.to_owned(), value: value.to_owned() }
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    notify: Option<NotifyPatch>,
    mail: Option<MailPatch>,
    storage: Option<StoragePatch>,
    form: Option<FormPatch>,
    server: Option<ServerPatch>,
    keepalive: Option<KeepAlivePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    app_token: Option<String>,
    signing_secret: Option<String>,
    channel_id: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NotifyPatch {
    primary_user_id: Option<String>,
    secondary_user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MailPatch {
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    sender: Option<String>,
    password: Option<String>,
    receivers: Option<Vec<String>>,
    escalation_receivers: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    csv_path: Option<PathBuf>,
    workbook_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FormPatch {
    offer_update: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct KeepAlivePatch {
    url: Option<String>,
    interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
