//! SMTP delivery for submission emails.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::config::MailConfig;
use crate::export::sinks::{MailTransport, OutboundMail, SinkError};

const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Clone, Debug)]
pub struct SmtpMailer {
    host: String,
    port: u16,
    sender: Option<String>,
    password: Option<SecretString>,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Self {
        Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            sender: config.sender.clone(),
            password: config.password.clone(),
        }
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, SinkError> {
        let sender = self.sender.as_deref().ok_or_else(|| not_configured("mail.sender"))?;
        let password = self.password.as_ref().ok_or_else(|| not_configured("mail.password"))?;
        let credentials =
            Credentials::new(sender.to_owned(), password.expose_secret().to_owned());

        // 465 speaks TLS from the first byte; anything else upgrades with STARTTLS
        let builder = if self.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
        }
        .map_err(|error| SinkError::Transport(error.to_string()))?;

        Ok(builder.port(self.port).credentials(credentials).build())
    }

    /// Logs in without sending anything.
    pub async fn test_connection(&self) -> Result<(), SinkError> {
        let transport = self.transport()?;
        match transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(SinkError::Rejected(format!(
                "{}:{} did not accept the connection",
                self.host, self.port
            ))),
            Err(error) => Err(SinkError::Transport(error.to_string())),
        }
    }

    fn build_message(&self, mail: OutboundMail) -> Result<Message, SinkError> {
        let sender = self.sender.as_deref().ok_or_else(|| not_configured("mail.sender"))?;
        if mail.recipients.is_empty() {
            return Err(not_configured("mail.receivers"));
        }

        let mut builder = Message::builder().from(parse_mailbox(sender)?).subject(mail.subject);
        for recipient in &mail.recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        let message = match mail.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|error| SinkError::Rejected(error.to_string()))?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(mail.body))
                        .singlepart(
                            Attachment::new(attachment.file_name)
                                .body(attachment.bytes, content_type),
                        ),
                )
            }
            None => builder.singlepart(SinglePart::plain(mail.body)),
        };
        message.map_err(|error| SinkError::Rejected(error.to_string()))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, mail: OutboundMail) -> Result<(), SinkError> {
        let recipients = mail.recipients.len();
        let message = self.build_message(mail)?;
        let transport = self.transport()?;

        transport.send(message).await.map_err(|error| SinkError::Transport(error.to_string()))?;
        info!(event_name = "mail.sent", recipients, "submission email sent");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SinkError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|error| SinkError::Rejected(format!("invalid address `{address}`: {error}")))
}

fn not_configured(key: &str) -> SinkError {
    SinkError::NotConfigured(key.to_owned())
}

#[cfg(test)]
mod tests {
    use super::SmtpMailer;
    use crate::config::MailConfig;
    use crate::export::sinks::{MailAttachment, MailTransport, OutboundMail, SinkError};

    fn mail(recipients: &[&str]) -> OutboundMail {
        OutboundMail {
            recipients: recipients.iter().map(|r| (*r).to_owned()).collect(),
            subject: "New Payment Application - 2026-03-01 09:30".to_owned(),
            body: "A new payment application has been received.".to_owned(),
            attachment: Some(MailAttachment {
                file_name: "Payment Data.xlsx".to_owned(),
                content_type: "application/octet-stream".to_owned(),
                bytes: b"PK\x03\x04".to_vec(),
            }),
        }
    }

    fn configured() -> SmtpMailer {
        SmtpMailer::from_config(&MailConfig {
            sender: Some("bot@example.com".to_owned()),
            password: Some("app-password".to_owned().into()),
            receivers: vec!["accounts@example.com".to_owned()],
            ..MailConfig::default()
        })
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_connecting() {
        let mailer = SmtpMailer::from_config(&MailConfig::default());
        let error = mailer.send(mail(&["accounts@example.com"])).await.expect_err("no sender");

        assert_eq!(error, SinkError::NotConfigured("mail.sender".to_owned()));
        assert!(matches!(
            mailer.test_connection().await,
            Err(SinkError::NotConfigured(_))
        ));
    }

    #[test]
    fn message_carries_every_recipient_and_the_attachment() {
        let message = configured()
            .build_message(mail(&["accounts@example.com", "director@example.com"]))
            .expect("message");
        let raw = String::from_utf8(message.formatted()).expect("utf8 message");

        assert!(raw.contains("accounts@example.com"));
        assert!(raw.contains("director@example.com"));
        assert!(raw.contains("Payment Data.xlsx"));
        assert!(raw.contains("multipart/mixed"));
    }

    #[test]
    fn invalid_recipient_is_rejected() {
        let error = configured().build_message(mail(&["not an address"])).expect_err("invalid");
        assert!(matches!(error, SinkError::Rejected(_)));
    }

    #[test]
    fn empty_recipient_list_is_a_configuration_gap() {
        let error = configured().build_message(mail(&[])).expect_err("no recipients");
        assert_eq!(error, SinkError::NotConfigured("mail.receivers".to_owned()));
    }
}
