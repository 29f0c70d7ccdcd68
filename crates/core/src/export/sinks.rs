use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("{0} is not configured")]
    NotConfigured(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("rejected by remote: {0}")]
    Rejected(String),
    #[error("io failure: {0}")]
    Io(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub title: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMail {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment: Option<MailAttachment>,
}

/// Posts into a chat channel on behalf of the bot.
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    async fn post_text(&self, channel_id: &str, text: &str) -> Result<(), SinkError>;
    async fn upload_file(&self, channel_id: &str, upload: FileUpload) -> Result<(), SinkError>;
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: OutboundMail) -> Result<(), SinkError>;
}
