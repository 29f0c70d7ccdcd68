//! Slack interface for the payment bot.
//!
//! - **Socket Mode** (`socket`) - WebSocket connection to Slack, no public URL needed
//! - **Slash commands** (`commands`) - `/start`, `/form`, `/cancel`
//! - **Events** (`events`) - direct messages, mentions and the Home tab
//! - **Conversation** (`form`) - drives the questionnaire and the export
//! - **Block Kit** (`blocks`) - prompt and reply rendering
//! - **Web API** (`api`) - `chat.postMessage`, file uploads, `views.publish`
//! - **Request signing** (`signature`) - verification for the HTTP endpoints
//!
//! ```text
//! Socket Mode / HTTP → Ingress → EventDispatcher → FormService → FlowEngine
//!                         ↓                              ↓
//!                  chat.postMessage ← Block Kit    ExportPipeline
//! ```

pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod form;
pub mod ingress;
pub mod signature;
pub mod socket;

pub use api::{SlackApi, SlackApiError, SlackWebClient};
pub use events::{form_dispatcher, EventDispatcher, SlackEnvelope, SlackEvent};
pub use form::FormService;
pub use ingress::Ingress;
pub use socket::{ReconnectPolicy, SlackSocketTransport, SocketModeRunner};
