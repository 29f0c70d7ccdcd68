use std::path::Path;

use paybot_core::config::{AppConfig, DeliveryMode, LoadOptions};
use paybot_slack::SlackWebClient;
use serde::Serialize;

use crate::commands::{runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CHECKS_AFTER_CONFIG: [&str; 5] =
    ["slack_auth", "delivery_mode", "notification_channel", "mail_settings", "record_log"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_owned(),
            });
            checks.push(check_slack_auth(&config));
            checks.push(check_delivery_mode(&config));
            checks.push(check_notification_channel(&config));
            checks.push(check_mail_settings(&config));
            checks.push(check_record_log(&config.storage.csv_path));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(CHECKS_AFTER_CONFIG.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_owned(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_owned()
    } else {
        "doctor: one or more readiness checks failed".to_owned()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_slack_auth(config: &AppConfig) -> DoctorCheck {
    let fail = |details: String| DoctorCheck { name: "slack_auth", status: CheckStatus::Fail, details };

    let client = match SlackWebClient::from_config(&config.slack) {
        Ok(client) => client,
        Err(error) => return fail(error.to_string()),
    };
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => return fail(format!("failed to initialize async runtime: {error}")),
    };

    match runtime.block_on(client.auth_test()) {
        Ok(identity) => DoctorCheck {
            name: "slack_auth",
            status: CheckStatus::Pass,
            details: format!("bot token authenticated as `{}` in `{}`", identity.user, identity.team),
        },
        Err(error) => fail(error.to_string()),
    }
}

fn check_delivery_mode(config: &AppConfig) -> DoctorCheck {
    let details = match config.slack.delivery_mode() {
        DeliveryMode::SocketMode => "socket mode (slack.app_token is set)",
        DeliveryMode::Http => "http mode (/slack/events and /slack/commands, signed requests)",
    };
    DoctorCheck { name: "delivery_mode", status: CheckStatus::Pass, details: details.to_owned() }
}

fn check_notification_channel(config: &AppConfig) -> DoctorCheck {
    match config.slack.channel_id.as_deref() {
        Some(channel_id) => DoctorCheck {
            name: "notification_channel",
            status: CheckStatus::Pass,
            details: format!("summaries go to {channel_id}"),
        },
        None => DoctorCheck {
            name: "notification_channel",
            status: CheckStatus::Fail,
            details: "slack.channel_id is not set; summaries and uploads will fail".to_owned(),
        },
    }
}

fn check_mail_settings(config: &AppConfig) -> DoctorCheck {
    let missing = config.mail.missing_settings();
    if missing.is_empty() {
        DoctorCheck {
            name: "mail_settings",
            status: CheckStatus::Pass,
            details: format!(
                "{} recipient(s) via {}:{}",
                config.mail.receivers.len(),
                config.mail.smtp_host,
                config.mail.smtp_port
            ),
        }
    } else {
        DoctorCheck {
            name: "mail_settings",
            status: CheckStatus::Fail,
            details: format!("missing {}; email notifications will fail", missing.join(", ")),
        }
    }
}

fn check_record_log(csv_path: &Path) -> DoctorCheck {
    let parent = csv_path.parent().filter(|parent| !parent.as_os_str().is_empty());
    let writable_dir = parent.map_or(true, Path::is_dir);

    if csv_path.is_file() || (!csv_path.exists() && writable_dir) {
        DoctorCheck {
            name: "record_log",
            status: CheckStatus::Pass,
            details: format!("record log at {}", csv_path.display()),
        }
    } else {
        DoctorCheck {
            name: "record_log",
            status: CheckStatus::Fail,
            details: format!("{} cannot be created or is not a file", csv_path.display()),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
