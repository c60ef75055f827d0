//! # rboot Core
//!
//! The message dispatch engine of the rboot chat-bot router.
//!
//! This crate owns the inbound/outbound message flow: it matches inbound
//! message content against a registry of scripts, runs the matching script on
//! its own task, and publishes the replies back to the transport adapter.
//!
//! ## Layers
//!
//! ### Foundation
//!
//! - **Messages**: [`Message`] and [`User`]
//! - **Contacts**: roster of users known to the transport ([`Contacts`])
//! - **Errors**: one `thiserror` enum per component plus `*Result` aliases
//!
//! ### Collaborators
//!
//! - **Memorizer**: key/value store used by scripts ([`Memorizer`])
//! - **Adapter**: transport bridge exposing inbound and outbound streams ([`Adapter`])
//!
//! ### Engine
//!
//! - **Rule Matcher**: first-match rule evaluation ([`match_script`])
//! - **Script Registry**: read-only catalog after startup ([`ScriptRegistry`])
//! - **Dispatcher**: the consumer loop with per-message tasks ([`Dispatcher`])
//! - **Event Stream**: secondary publish/subscribe path ([`EventStream`])
//!
//! ## Data Flow
//!
//! ```text
//! ┌─────────┐  inbound  ┌────────────┐     ┌─────────┐     ┌──────────┐
//! │ Adapter │──────────▶│ Dispatcher │────▶│ Matcher │────▶│ Registry │
//! │         │◀──────────│  (1 task   │◀────┴─────────┘     └──────────┘
//! └─────────┘  outbound │ per msg)   │────▶ script action ──▶ replies
//!                       └────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rboot_core::{Dispatcher, MemoryMemorizer, Message, Script, ScriptContext, ScriptRegistry};
//!
//! let mut registry = ScriptRegistry::new();
//! registry.register(
//!     Script::new("ping", |_ctx: ScriptContext| async move {
//!         Ok(vec![Message::new("pong")])
//!     })
//!     .rule("ping", r"^ping$"),
//! )?;
//!
//! let dispatcher = Dispatcher::new(registry, Arc::new(MemoryMemorizer::new()));
//! let handle = dispatcher.start(adapter.incoming()?, adapter.outgoing())?;
//! ```

pub mod adapter;
pub mod dispatcher;
pub mod event;
pub mod foundation;
pub mod memorizer;
pub mod script;

pub use adapter::{Adapter, AdapterInit, AdapterPipes, BoxedAdapter, ConfigurableAdapter};
pub use dispatcher::{DispatchStats, Dispatcher, DispatcherConfig, DispatcherState};
pub use event::{
    BoxedSubscriber, Event, EventContext, EventPublisher, EventStream, Subscriber, WILDCARD_TOPIC,
};
pub use foundation::{
    AdapterError, AdapterResult, Contacts, DispatchError, DispatchResult, EventError,
    EventResult, MemorizerError, MemorizerResult, Message, RULE_HEADER, RegistryError,
    RegistryResult, ScriptError, ScriptResult, User,
};
pub use memorizer::{BoxedMemorizer, FileMemorizer, MemoryMemorizer, Memorizer, NoopMemorizer};
pub use script::{
    Action, BoxFuture, BoxedAction, ExactRule, MatchResult, RegexRule, Rule, Script,
    ScriptContext, ScriptRegistry, match_script,
};

/// Prelude for writing scripts.
pub mod prelude {
    pub use super::foundation::{Contacts, Message, ScriptError, ScriptResult, User};
    pub use super::memorizer::Memorizer;
    pub use super::script::{ExactRule, RegexRule, Script, ScriptContext, ScriptRegistry};
}
