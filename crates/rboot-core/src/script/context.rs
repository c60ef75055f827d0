//! Per-message execution context.

use tokio::sync::mpsc;

use super::matcher::MatchResult;
use crate::foundation::{Contacts, Message, RULE_HEADER, ScriptError, ScriptResult, User};
use crate::memorizer::BoxedMemorizer;

/// Everything a script action can see while handling one message.
///
/// Each task builds its own context, so the match state and the message copy
/// are never shared between concurrently handled messages.
#[derive(Clone)]
pub struct ScriptContext {
    message: Message,
    matched: MatchResult,
    memorizer: BoxedMemorizer,
    outgoing: mpsc::Sender<Message>,
    contacts: Contacts,
}

impl ScriptContext {
    /// Creates a context for `message`.
    ///
    /// The message copy gets the matched rule name in its `rule` header.
    pub fn new(
        mut message: Message,
        matched: MatchResult,
        memorizer: BoxedMemorizer,
        outgoing: mpsc::Sender<Message>,
    ) -> Self {
        message.set_header(RULE_HEADER, matched.rule.clone());
        Self {
            message,
            matched,
            memorizer,
            outgoing,
            contacts: Contacts::new(),
        }
    }

    /// Shares the adapter's roster (builder pattern).
    pub fn with_contacts(mut self, contacts: Contacts) -> Self {
        self.contacts = contacts;
        self
    }

    /// Returns the triggering message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Returns the triggering message content.
    pub fn content(&self) -> &str {
        &self.message.content
    }

    /// Returns the sender of the triggering message.
    pub fn sender(&self) -> &User {
        &self.message.from
    }

    /// Returns the matched script name.
    pub fn script(&self) -> &str {
        &self.matched.script
    }

    /// Returns the matched rule name.
    pub fn rule(&self) -> &str {
        &self.matched.rule
    }

    /// Returns all captures; index 0 is the whole match.
    pub fn captures(&self) -> &[String] {
        &self.matched.captures
    }

    /// Returns one capture by index.
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.matched.captures.get(index).map(String::as_str)
    }

    /// Returns the shared memorizer.
    pub fn memorizer(&self) -> &BoxedMemorizer {
        &self.memorizer
    }

    /// Returns the users known to the adapter.
    pub fn contacts(&self) -> &Contacts {
        &self.contacts
    }

    /// Publishes a reply right away, before the action returns.
    ///
    /// The reply is addressed back to the sender of the triggering message.
    pub async fn send(&self, reply: Message) -> ScriptResult<()> {
        self.outgoing
            .send(reply.reply_to(&self.message))
            .await
            .map_err(|_| ScriptError::OutboundClosed)
    }
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("message", &self.message)
            .field("matched", &self.matched)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::memorizer::MemoryMemorizer;

    fn matched() -> MatchResult {
        MatchResult {
            script: "echo".into(),
            rule: "echo".into(),
            captures: vec!["echo hi".into(), "hi".into()],
        }
    }

    #[tokio::test]
    async fn test_context_exposes_match_and_rule_header() {
        let (tx, _rx) = mpsc::channel(1);
        let msg = Message::new("echo hi").with_from(User::with_id("u"));
        let ctx = ScriptContext::new(msg, matched(), Arc::new(MemoryMemorizer::new()), tx);

        assert_eq!(ctx.message().header(RULE_HEADER), Some("echo"));
        assert_eq!(ctx.capture(1), Some("hi"));
        assert_eq!(ctx.capture(2), None);
        assert_eq!(ctx.sender().id, "u");
        assert_eq!(ctx.script(), "echo");
    }

    #[test]
    fn test_contacts_are_shared() {
        let (tx, _rx) = mpsc::channel(1);
        let contacts = Contacts::new();
        let ctx = ScriptContext::new(
            Message::new("echo hi"),
            matched(),
            Arc::new(MemoryMemorizer::new()),
            tx,
        )
        .with_contacts(contacts.clone());

        assert!(ctx.contacts().is_empty());
        contacts.add(User::new("u1", "alice"));
        assert_eq!(ctx.contacts().find("alice").map(|u| u.id), Some("u1".into()));
    }

    #[tokio::test]
    async fn test_send_addresses_reply() {
        let (tx, mut rx) = mpsc::channel(1);
        let msg = Message::new("echo hi")
            .with_from(User::with_id("alice"))
            .with_to(User::with_id("bot"));
        let ctx = ScriptContext::new(msg, matched(), Arc::new(MemoryMemorizer::new()), tx);

        ctx.send(Message::new("hi")).await.unwrap();

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.to.id, "alice");
        assert_eq!(reply.from.id, "bot");

        drop(rx);
        assert!(matches!(
            ctx.send(Message::new("late")).await,
            Err(ScriptError::OutboundClosed)
        ));
    }
}
