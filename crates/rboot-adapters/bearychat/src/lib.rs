//! BearyChat adapter for rboot.
//!
//! - **Inbound**: an HTTP endpoint for BearyChat outgoing robots
//!   (`POST /bearychat` on `0.0.0.0:9900` by default)
//! - **Outbound**: JSON payloads posted to an incoming webhook
//!
//! Message headers `channel`, `user`, `notification`, `markdown` and
//! `attachments` (a JSON array, see [`attach`]) map onto the corresponding
//! webhook fields.
//!
//! ```rust,ignore
//! use rboot_adapter_bearychat::BearyChatAdapter;
//!
//! let mut bot = Rboot::new();
//! bot.register_adapter::<BearyChatAdapter>();
//! bot.run().await?;
//! ```

#![warn(missing_docs)]

mod adapter;
mod config;
mod payload;
mod server;
mod webhook;

pub use adapter::BearyChatAdapter;
pub use config::{BearyChatConfig, DEFAULT_BASE_URL};
pub use payload::{
    ATTACHMENTS_HEADER, Attachment, CHANNEL_HEADER, MARKDOWN_HEADER, NOTIFICATION_HEADER,
    OutgoingRequest, Response, USER_HEADER, WebhookReply, attach,
};
pub use webhook::{WebhookClient, resolve_webhook_url};
