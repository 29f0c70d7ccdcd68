use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::submission::Submission;
use crate::export::sinks::{
    ChannelPublisher, FileUpload, MailAttachment, MailTransport, OutboundMail, SinkError,
};
use crate::export::spreadsheet::{build_workbook, WorkbookArtifact, XLSX_CONTENT_TYPE};
use crate::export::summary::SummaryRenderer;
use crate::export::table::{submission_row, CsvLog, COLUMNS};
use crate::notify::{EscalationDecision, EscalationPolicy};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    RecordLog,
    ChannelPost,
    FileUpload,
    Email,
}

impl SinkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RecordLog => "record_log",
            Self::ChannelPost => "channel_post",
            Self::FileUpload => "file_upload",
            Self::Email => "email",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RecordLog => "record log",
            Self::ChannelPost => "channel summary",
            Self::FileUpload => "spreadsheet upload",
            Self::Email => "email notification",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SinkOutcome {
    Delivered,
    Failed(String),
    Skipped(String),
}

impl SinkOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for SinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => f.write_str("delivered"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SinkReport {
    pub sink: SinkKind,
    pub outcome: SinkOutcome,
}

/// What the user should hear about an export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportVerdict {
    Submitted,
    SavedWithWarnings { failed: Vec<SinkKind> },
    SaveFailed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub escalation: EscalationDecision,
    pub sinks: Vec<SinkReport>,
}

impl ExportReport {
    pub fn outcome(&self, sink: SinkKind) -> Option<&SinkOutcome> {
        self.sinks.iter().find(|report| report.sink == sink).map(|report| &report.outcome)
    }

    pub fn saved(&self) -> bool {
        self.outcome(SinkKind::RecordLog).is_some_and(SinkOutcome::is_delivered)
    }

    pub fn verdict(&self) -> ExportVerdict {
        if !self.saved() {
            return ExportVerdict::SaveFailed;
        }
        let failed = self
            .sinks
            .iter()
            .filter(|report| report.sink != SinkKind::RecordLog && !report.outcome.is_delivered())
            .map(|report| report.sink)
            .collect::<Vec<_>>();
        if failed.is_empty() {
            ExportVerdict::Submitted
        } else {
            ExportVerdict::SavedWithWarnings { failed }
        }
    }
}

/// Runs every sink for one completed submission. Sinks are attempted in a fixed order and
/// never roll each other back; only a workbook failure short-circuits the two sinks that
/// need the file.
pub struct ExportPipeline {
    log: CsvLog,
    publisher: Arc<dyn ChannelPublisher>,
    mailer: Arc<dyn MailTransport>,
    policy: EscalationPolicy,
    renderer: SummaryRenderer,
    channel_id: Option<String>,
    workbook_name: String,
}

impl ExportPipeline {
    pub fn new(
        log: CsvLog,
        publisher: Arc<dyn ChannelPublisher>,
        mailer: Arc<dyn MailTransport>,
        policy: EscalationPolicy,
        renderer: SummaryRenderer,
        channel_id: Option<String>,
        workbook_name: impl Into<String>,
    ) -> Self {
        Self {
            log,
            publisher,
            mailer,
            policy,
            renderer,
            channel_id: channel_id.filter(|id| !id.trim().is_empty()),
            workbook_name: workbook_name.into(),
        }
    }

    pub fn record_log(&self) -> &CsvLog {
        &self.log
    }

    pub async fn export(&self, submission: &Submission) -> ExportReport {
        let escalation = self.policy.evaluate(&submission.amount);
        let mut sinks = Vec::with_capacity(4);

        let logged = self.log.append(submission).await;
        sinks.push(record(SinkKind::RecordLog, logged));

        let posted = match self.channel() {
            Ok(channel_id) => {
                let text = self.renderer.channel_text(submission, &escalation);
                self.publisher.post_text(channel_id, &text).await
            }
            Err(error) => Err(error),
        };
        sinks.push(record(SinkKind::ChannelPost, posted));

        match build_workbook(&self.workbook_name, &COLUMNS, &[submission_row(submission)]) {
            Ok(workbook) => {
                let uploaded = self.upload(submission, &workbook).await;
                sinks.push(record(SinkKind::FileUpload, uploaded));
                let emailed = self.email(submission, &escalation, workbook).await;
                sinks.push(record(SinkKind::Email, emailed));
            }
            Err(error) => {
                warn!(
                    event_name = "export.workbook_failed",
                    user_id = %submission.user_id,
                    error = %error,
                    "workbook could not be built; skipping upload and email"
                );
                let reason = format!("workbook unavailable: {error}");
                sinks.push(SinkReport {
                    sink: SinkKind::FileUpload,
                    outcome: SinkOutcome::Skipped(reason.clone()),
                });
                sinks.push(SinkReport { sink: SinkKind::Email, outcome: SinkOutcome::Skipped(reason) });
            }
        }

        let report = ExportReport { escalation, sinks };
        for sink in &report.sinks {
            if sink.outcome.is_delivered() {
                info!(
                    event_name = "export.sink_delivered",
                    user_id = %submission.user_id,
                    sink = sink.sink.as_str(),
                    escalated = report.escalation.escalated,
                    "export sink delivered"
                );
            } else {
                warn!(
                    event_name = "export.sink_not_delivered",
                    user_id = %submission.user_id,
                    sink = sink.sink.as_str(),
                    outcome = %sink.outcome,
                    "export sink not delivered"
                );
            }
        }
        report
    }

    fn channel(&self) -> Result<&str, SinkError> {
        self.channel_id
            .as_deref()
            .ok_or_else(|| SinkError::NotConfigured("slack.channel_id".to_owned()))
    }

    async fn upload(
        &self,
        submission: &Submission,
        workbook: &WorkbookArtifact,
    ) -> Result<(), SinkError> {
        let channel_id = self.channel()?;
        self.publisher
            .upload_file(
                channel_id,
                FileUpload {
                    file_name: workbook.file_name.clone(),
                    title: format!("Payment Data - {}", submission.timestamp_label()),
                    bytes: workbook.bytes.clone(),
                },
            )
            .await
    }

    async fn email(
        &self,
        submission: &Submission,
        escalation: &EscalationDecision,
        workbook: WorkbookArtifact,
    ) -> Result<(), SinkError> {
        if escalation.mail_recipients.is_empty() {
            return Err(SinkError::NotConfigured("mail.receivers".to_owned()));
        }
        let body = self
            .renderer
            .email_body(submission, escalation)
            .map_err(|error| SinkError::Transport(error.to_string()))?;

        self.mailer
            .send(OutboundMail {
                recipients: escalation.mail_recipients.clone(),
                subject: self.renderer.email_subject(submission, escalation),
                body,
                attachment: Some(MailAttachment {
                    file_name: workbook.file_name,
                    content_type: XLSX_CONTENT_TYPE.to_owned(),
                    bytes: workbook.bytes,
                }),
            })
            .await
    }
}

fn record(sink: SinkKind, result: Result<(), SinkError>) -> SinkReport {
    let outcome = match result {
        Ok(()) => SinkOutcome::Delivered,
        Err(error) => SinkOutcome::Failed(error.to_string()),
    };
    SinkReport { sink, outcome }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::export::sinks::{ChannelPublisher, FileUpload, MailTransport, OutboundMail, SinkError};

    /// Records everything it is asked to deliver; optionally fails.
    #[derive(Default)]
    pub struct RecordingPublisher {
        pub posts: Mutex<Vec<(String, String)>>,
        pub uploads: Mutex<Vec<(String, FileUpload)>>,
        pub fail_uploads: bool,
    }

    #[async_trait]
    impl ChannelPublisher for RecordingPublisher {
        async fn post_text(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
            self.posts.lock().expect("posts lock").push((channel_id.to_owned(), text.to_owned()));
            Ok(())
        }

        async fn upload_file(&self, channel_id: &str, upload: FileUpload) -> Result<(), SinkError> {
            if self.fail_uploads {
                return Err(SinkError::Rejected("not_in_channel".to_owned()));
            }
            self.uploads.lock().expect("uploads lock").push((channel_id.to_owned(), upload));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutboundMail>>,
        pub fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingMailer {
        async fn send(&self, mail: OutboundMail) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Transport("535 authentication failed".to_owned()));
            }
            self.sent.lock().expect("sent lock").push(mail);
            Ok(())
        }
    }
}
