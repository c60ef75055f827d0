//! Scripts: named behaviors triggered by rules.
//!
//! A [`Script`] pairs an ordered list of named rules with an [`Action`]. The
//! action receives a per-message [`ScriptContext`] and returns the replies to
//! publish.
//!
//! # Example
//!
//! ```rust,ignore
//! use rboot_core::prelude::*;
//!
//! let echo = Script::new("echo", |ctx: ScriptContext| async move {
//!     let text = ctx.capture(1).unwrap_or_default().to_string();
//!     Ok(vec![Message::new(text)])
//! })
//! .rule("echo", r"^echo (.+)$")
//! .description("echo <text> - repeat text");
//! ```

mod context;
mod matcher;
mod registry;
mod rule;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;

pub use context::ScriptContext;
pub use matcher::{MatchResult, match_script};
pub use registry::ScriptRegistry;
pub use rule::{ExactRule, RegexRule, Rule};

use crate::foundation::{Message, ScriptResult};

pub use futures::future::BoxFuture;

// ============================================================================
// Action
// ============================================================================

/// The behavior of a script.
///
/// Implemented for every `Fn(ScriptContext) -> impl Future<Output =
/// ScriptResult<Vec<Message>>>`, so async closures and functions work as
/// actions directly.
pub trait Action: Send + Sync + 'static {
    /// Runs the action for one matched message.
    fn call(&self, ctx: ScriptContext) -> BoxFuture<'static, ScriptResult<Vec<Message>>>;
}

impl<F, Fut> Action for F
where
    F: Fn(ScriptContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ScriptResult<Vec<Message>>> + Send + 'static,
{
    fn call(&self, ctx: ScriptContext) -> BoxFuture<'static, ScriptResult<Vec<Message>>> {
        (self)(ctx).boxed()
    }
}

/// A type-erased action.
pub type BoxedAction = Arc<dyn Action>;

// ============================================================================
// Script
// ============================================================================

/// How a rule was declared; regexes are compiled on registration.
#[derive(Clone)]
pub(crate) enum RuleSource {
    Pattern(String),
    Custom(Arc<dyn Rule>),
}

/// A named behavior with its rules.
#[derive(Clone)]
pub struct Script {
    name: String,
    description: Option<String>,
    rules: Vec<(String, RuleSource)>,
    action: BoxedAction,
}

impl Script {
    /// Creates a script without rules.
    pub fn new(name: impl Into<String>, action: impl Action) -> Self {
        Self {
            name: name.into(),
            description: None,
            rules: Vec::new(),
            action: Arc::new(action),
        }
    }

    /// Adds a regular-expression rule.
    ///
    /// Rules are evaluated in the order they are added.
    pub fn rule(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.rules
            .push((name.into(), RuleSource::Pattern(pattern.into())));
        self
    }

    /// Adds a custom rule.
    pub fn rule_with(mut self, name: impl Into<String>, rule: impl Rule) -> Self {
        self.rules
            .push((name.into(), RuleSource::Custom(Arc::new(rule))));
        self
    }

    /// Sets a one-line description shown by help output.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Returns the script name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description, if any.
    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the rule names in declaration order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(name, _)| name.as_str())
    }

    /// Runs the action.
    pub fn call(&self, ctx: ScriptContext) -> BoxFuture<'static, ScriptResult<Vec<Message>>> {
        self.action.call(ctx)
    }

    pub(crate) fn rule_sources(&self) -> &[(String, RuleSource)] {
        &self.rules
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("rules", &self.rule_names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
