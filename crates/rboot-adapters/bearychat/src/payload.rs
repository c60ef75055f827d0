//! BearyChat wire types.
//!
//! [`Response`] is what the incoming webhook accepts; [`OutgoingRequest`] is
//! what an outgoing robot posts to us.

use std::collections::HashMap;

use rboot_core::{Message, User};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Header selecting the target channel of a reply.
pub const CHANNEL_HEADER: &str = "channel";
/// Header selecting the target user of a direct reply.
pub const USER_HEADER: &str = "user";
/// Header carrying the notification text shown in alerts.
pub const NOTIFICATION_HEADER: &str = "notification";
/// Header enabling markdown rendering (`true`/`1`).
pub const MARKDOWN_HEADER: &str = "markdown";
/// Header carrying a JSON array of [`Attachment`]s.
pub const ATTACHMENTS_HEADER: &str = "attachments";

/// Incoming-webhook payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Message body.
    pub text: String,
    /// Text shown in push notifications instead of the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<String>,
    /// Render `text` as markdown.
    #[serde(default, skip_serializing_if = "is_false")]
    pub markdown: bool,
    /// Target channel; the webhook's default channel when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Target user of a direct message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Rich attachments rendered below the text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// A rich attachment of a [`Response`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Bold heading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Attachment body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Side bar color, e.g. `#ffa500`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Images, each a map with at least a `url` key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<HashMap<String, String>>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Stores `attachments` in the [`ATTACHMENTS_HEADER`] of `message`.
pub fn attach(mut message: Message, attachments: &[Attachment]) -> Message {
    match serde_json::to_string(attachments) {
        Ok(encoded) => message.set_header(ATTACHMENTS_HEADER, encoded),
        Err(e) => warn!(error = %e, "Failed to encode attachments"),
    }
    message
}

impl Response {
    /// Builds the payload for an outbound message.
    ///
    /// The content becomes `text`; the routing headers fill the optional
    /// fields. A malformed attachments header is logged and skipped.
    pub fn from_message(message: &Message) -> Self {
        let header = |name| message.header(name).map(str::to_string);

        let response = Self {
            text: message.content.clone(),
            notification: header(NOTIFICATION_HEADER),
            markdown: message
                .header(MARKDOWN_HEADER)
                .is_some_and(|v| matches!(v.trim(), "true" | "1")),
            channel: header(CHANNEL_HEADER),
            user: header(USER_HEADER),
            attachments: Vec::new(),
        };

        let Some(raw) = message.header(ATTACHMENTS_HEADER) else {
            return response;
        };
        match serde_json::from_str::<Vec<Attachment>>(raw) {
            Ok(attachments) => attachments
                .into_iter()
                .fold(response, Response::with_attachment),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed attachments header");
                response
            }
        }
    }

    /// Adds an attachment (builder pattern).
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Body returned by the incoming webhook. A non-zero `code` is a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebhookReply {
    /// `0` on success.
    #[serde(default)]
    pub code: i64,
    /// Echo of the accepted payload.
    #[serde(default)]
    pub request: Option<serde_json::Value>,
    /// Failure description when `code` is non-zero.
    #[serde(default)]
    pub error: Option<String>,
}

/// Request posted by a BearyChat outgoing robot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutgoingRequest {
    /// Robot token, compared against the configured one.
    #[serde(default)]
    pub token: Option<String>,
    /// Message text, including the trigger word.
    pub text: String,
    /// Sender name.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Channel the message was posted in.
    #[serde(default)]
    pub channel_name: Option<String>,
    /// Word that triggered the robot.
    #[serde(default)]
    pub trigger_word: Option<String>,
}

impl OutgoingRequest {
    /// Converts the request into an inbound message addressed to `bot`.
    ///
    /// The trigger word, if any, is stripped from the front of the text so
    /// rules see only the command. The channel is kept in the `channel`
    /// header.
    pub fn into_message(self, bot: &User) -> Message {
        let mut text = self.text.trim();
        if let Some(trigger) = self.trigger_word.as_deref().filter(|t| !t.is_empty())
            && let Some(rest) = text.strip_prefix(trigger)
        {
            text = rest.trim_start();
        }

        let sender = self.user_name.unwrap_or_default();
        let mut message = Message::text(User::new(sender.clone(), sender), bot.clone(), text);
        if let Some(channel) = self.channel_name.filter(|c| !c.is_empty()) {
            message.set_header(CHANNEL_HEADER, channel);
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_minimal_response_omits_optional_fields() {
        let response = Response::from_message(&Message::new("pong"));
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({ "text": "pong" }));
    }

    #[test]
    fn test_headers_fill_payload() {
        let message = Message::new("**done**")
            .with_header(CHANNEL_HEADER, "ops")
            .with_header(NOTIFICATION_HEADER, "deploy finished")
            .with_header(MARKDOWN_HEADER, "true");

        let response = Response::from_message(&message).with_attachment(Attachment {
            title: Some("build".into()),
            color: Some("#00ff00".into()),
            images: vec![HashMap::from([("url".to_string(), "https://x/y.png".to_string())])],
            ..Default::default()
        });

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "text": "**done**",
                "notification": "deploy finished",
                "markdown": true,
                "channel": "ops",
                "attachments": [{
                    "title": "build",
                    "color": "#00ff00",
                    "images": [{ "url": "https://x/y.png" }],
                }],
            })
        );
    }

    #[test]
    fn test_attachments_header_fills_payload() {
        let attachment = Attachment {
            title: Some("report".into()),
            text: Some("all green".into()),
            ..Default::default()
        };
        let message = attach(Message::new("status"), std::slice::from_ref(&attachment));

        let response = Response::from_message(&message);
        assert_eq!(response.attachments, vec![attachment]);
        assert_eq!(
            serde_json::to_value(&response).unwrap()["attachments"],
            json!([{ "title": "report", "text": "all green" }])
        );
    }

    #[test]
    fn test_malformed_attachments_header_is_skipped() {
        let message = Message::new("status").with_header(ATTACHMENTS_HEADER, "{not json");

        let response = Response::from_message(&message);
        assert_eq!(response.text, "status");
        assert!(response.attachments.is_empty());
    }

    #[test]
    fn test_outgoing_request_to_message() {
        let request: OutgoingRequest = serde_json::from_value(json!({
            "token": "t",
            "text": "!bot ping",
            "trigger_word": "!bot",
            "user_name": "alice",
            "channel_name": "general",
        }))
        .unwrap();

        let message = request.into_message(&User::with_id("Rboot"));

        assert_eq!(message.content, "ping");
        assert_eq!(message.from.id, "alice");
        assert_eq!(message.to.id, "Rboot");
        assert_eq!(message.header(CHANNEL_HEADER), Some("general"));
    }

    #[test]
    fn test_webhook_reply_tolerates_missing_fields() {
        let reply: WebhookReply = serde_json::from_str("{}").unwrap();
        assert_eq!(reply.code, 0);
    }
}
