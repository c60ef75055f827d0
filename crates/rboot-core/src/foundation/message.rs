//! Message and user types shared by adapters, scripts and the dispatcher.
//!
//! A [`Message`] is produced by an adapter when something arrives on the
//! transport. Once it enters the dispatcher every task works on its own clone,
//! so scripts never observe each other's changes.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Header carrying the name of the rule that matched a message.
///
/// The dispatcher sets it on the copy handed to the script.
pub const RULE_HEADER: &str = "rule";

// ============================================================================
// User
// ============================================================================

/// Identity used to address messages.
///
/// Two users are equal when their ids are equal; the display name is
/// informational only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    /// Opaque transport-level identifier.
    pub id: String,
    /// Human-readable display name.
    #[serde(default)]
    pub name: String,
}

impl User {
    /// Creates a user with an id and a display name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Creates a user whose display name equals its id.
    pub fn with_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
        }
    }

    /// Returns true if the user carries no id.
    pub fn is_anonymous(&self) -> bool {
        self.id.is_empty()
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// A chat message travelling between the adapter and the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Sender of the message.
    #[serde(default)]
    pub from: User,
    /// Recipient of the message.
    #[serde(default)]
    pub to: User,
    /// Text content that rules are matched against.
    pub content: String,
    /// Free-form transport metadata (channel, markdown flag, ...).
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Message {
    /// Creates a message with the given content and default users.
    ///
    /// Scripts usually return messages built this way; the dispatcher fills
    /// in the addressing before publishing them.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Creates an addressed text message, as adapters produce them.
    pub fn text(from: User, to: User, content: impl Into<String>) -> Self {
        Self {
            from,
            to,
            content: content.into(),
            headers: HashMap::new(),
        }
    }

    /// Sets the sender (builder pattern).
    pub fn with_from(mut self, from: User) -> Self {
        self.from = from;
        self
    }

    /// Sets the recipient (builder pattern).
    pub fn with_to(mut self, to: User) -> Self {
        self.to = to;
        self
    }

    /// Adds a header (builder pattern).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets a header in place.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Returns the value of a header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Addresses this message as a reply to `original`.
    ///
    /// The reply goes back to whoever sent the original and appears to come
    /// from whoever received it.
    pub fn reply_to(mut self, original: &Message) -> Self {
        self.from = original.to.clone();
        self.to = original.from.clone();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_user_equality_by_id() {
        let a = User::new("42", "alice");
        let b = User::new("42", "renamed");
        let c = User::new("43", "alice");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<User> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_user_display_falls_back_to_id() {
        assert_eq!(User::new("7", "").to_string(), "7");
        assert_eq!(User::new("7", "bob").to_string(), "bob");
        assert!(User::default().is_anonymous());
    }

    #[test]
    fn test_reply_swaps_addressing() {
        let a = User::with_id("a");
        let b = User::with_id("b");
        let original = Message::new("ping").with_from(a.clone()).with_to(b.clone());

        let reply = Message::new("pong").reply_to(&original);

        assert_eq!(reply.from, b);
        assert_eq!(reply.to, a);
        assert_eq!(reply.content, "pong");
    }

    #[test]
    fn test_text_is_addressed() {
        let msg = Message::text(User::with_id("a"), User::with_id("b"), "hello");

        assert_eq!(msg.from.id, "a");
        assert_eq!(msg.to.id, "b");
        assert_eq!(msg.content, "hello");
        assert!(msg.headers.is_empty());
        assert_eq!(
            msg,
            Message::new("hello")
                .with_from(User::with_id("a"))
                .with_to(User::with_id("b"))
        );
    }

    #[test]
    fn test_headers() {
        let mut msg = Message::new("hi").with_header("channel", "general");
        msg.set_header(RULE_HEADER, "greet");

        assert_eq!(msg.header("channel"), Some("general"));
        assert_eq!(msg.header(RULE_HEADER), Some("greet"));
        assert_eq!(msg.header("missing"), None);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let msg: Message = serde_json::from_str(r#"{"content":"hello"}"#).unwrap();
        assert_eq!(msg.content, "hello");
        assert!(msg.from.is_anonymous());
        assert!(msg.headers.is_empty());
    }
}
