use std::sync::Arc;

use paybot_core::audit::TracingAuditSink;
use paybot_core::config::{AppConfig, ConfigError, DeliveryMode, LoadOptions};
use paybot_core::export::summary::SummaryError;
use paybot_core::export::{ChannelPublisher, CsvLog, ExportPipeline, MailTransport, SummaryRenderer};
use paybot_core::mail::SmtpMailer;
use paybot_core::{EscalationPolicy, SessionStore};
use paybot_slack::api::SlackApi;
use paybot_slack::{
    form_dispatcher, FormService, Ingress, ReconnectPolicy, SlackApiError, SlackSocketTransport,
    SlackWebClient, SocketModeRunner,
};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub mode: DeliveryMode,
    pub sessions: Arc<SessionStore>,
    pub ingress: Arc<Ingress>,
    /// Present only in Socket Mode.
    pub socket_runner: Option<SocketModeRunner>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("slack client setup failed: {0}")]
    Slack(#[from] SlackApiError),
    #[error("summary templates failed to load: {0}")]
    Template(#[from] SummaryError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let client = SlackWebClient::from_config(&config.slack)?;
    let mailer = SmtpMailer::from_config(&config.mail);
    warn_about_unconfigured_sinks(&config);

    let (sessions, ingress) =
        wire(&config, Arc::new(client.clone()), Arc::new(client.clone()), Arc::new(mailer))?;

    let mode = config.slack.delivery_mode();
    let socket_runner = match mode {
        DeliveryMode::SocketMode => Some(SocketModeRunner::new(
            Arc::new(SlackSocketTransport::new(client)),
            Arc::clone(&ingress),
            ReconnectPolicy::default(),
        )),
        DeliveryMode::Http => None,
    };
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        delivery_mode = ?mode,
        csv_path = %config.storage.csv_path.display(),
        "application wired"
    );

    Ok(Application { config, mode, sessions, ingress, socket_runner })
}

/// Builds the session store and the ingress path on top of the given outbound adapters.
pub fn wire(
    config: &AppConfig,
    api: Arc<dyn SlackApi>,
    publisher: Arc<dyn ChannelPublisher>,
    mailer: Arc<dyn MailTransport>,
) -> Result<(Arc<SessionStore>, Arc<Ingress>), BootstrapError> {
    let pipeline = ExportPipeline::new(
        CsvLog::new(config.storage.csv_path.clone()),
        publisher,
        mailer,
        EscalationPolicy::new(&config.notify, &config.mail),
        SummaryRenderer::new()?,
        config.slack.channel_id.clone(),
        config.storage.workbook_name.clone(),
    );

    let sessions = Arc::new(SessionStore::new());
    let service = FormService::new(
        Arc::clone(&sessions),
        Arc::new(pipeline),
        Arc::new(TracingAuditSink),
        config.form.offer_update,
    );
    let ingress = Arc::new(Ingress::new(form_dispatcher(service), api));
    Ok((sessions, ingress))
}

// Missing sinks are not fatal; submissions still land in the record log.
fn warn_about_unconfigured_sinks(config: &AppConfig) {
    if config.slack.channel_id.is_none() {
        warn!(
            event_name = "system.bootstrap.channel_missing",
            correlation_id = "bootstrap",
            "slack.channel_id is not set; channel summaries and uploads will fail"
        );
    }
    let missing = config.mail.missing_settings();
    if !missing.is_empty() {
        warn!(
            event_name = "system.bootstrap.mail_incomplete",
            correlation_id = "bootstrap",
            missing = %missing.join(", "),
            "mail settings incomplete; email notifications will fail"
        );
    }
}
