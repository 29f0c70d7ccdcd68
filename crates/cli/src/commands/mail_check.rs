use paybot_core::config::{AppConfig, LoadOptions};
use paybot_core::mail::SmtpMailer;

use crate::commands::{runtime, CommandResult};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "mail-check",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let missing = config.mail.missing_settings();
    if !missing.is_empty() {
        return CommandResult::failure(
            "mail-check",
            "mail_config",
            format!("missing {}", missing.join(", ")),
            3,
        );
    }

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "mail-check",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                4,
            );
        }
    };

    let mailer = SmtpMailer::from_config(&config.mail);
    match runtime.block_on(mailer.test_connection()) {
        Ok(()) => CommandResult::success(
            "mail-check",
            format!(
                "logged in to {}:{} as {}",
                config.mail.smtp_host,
                config.mail.smtp_port,
                mailer.sender().unwrap_or("<unset>")
            ),
        ),
        Err(error) => CommandResult::failure("mail-check", "smtp_login", error.to_string(), 5),
    }
}
