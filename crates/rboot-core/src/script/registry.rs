//! Script registry.
//!
//! Append-only while the bot is being assembled. The dispatcher takes it by
//! value and shares it behind an `Arc`, so it is read-only once running.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::matcher::{MatchResult, match_script};
use super::rule::{RegexRule, Rule};
use super::{RuleSource, Script};
use crate::foundation::{RegistryError, RegistryResult};

/// One compiled rule in global traversal order.
pub(crate) struct RuleEntry {
    pub(crate) script: usize,
    pub(crate) name: String,
    pub(crate) rule: Arc<dyn Rule>,
}

/// Catalog of scripts and the ordered list of their rules.
#[derive(Default)]
pub struct ScriptRegistry {
    scripts: Vec<Script>,
    index: HashMap<String, usize>,
    rules: Vec<RuleEntry>,
}

impl ScriptRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a script, compiling its rules.
    ///
    /// Nothing is added if any rule fails to compile.
    pub fn register(&mut self, script: Script) -> RegistryResult<()> {
        if self.index.contains_key(script.name()) {
            return Err(RegistryError::DuplicateName {
                name: script.name().to_string(),
            });
        }
        if script.rule_sources().is_empty() {
            return Err(RegistryError::NoRules {
                name: script.name().to_string(),
            });
        }

        let position = self.scripts.len();
        let mut compiled = Vec::with_capacity(script.rule_sources().len());
        for (rule_name, source) in script.rule_sources() {
            let rule: Arc<dyn Rule> = match source {
                RuleSource::Pattern(pattern) => {
                    let regex =
                        RegexRule::new(pattern).map_err(|e| RegistryError::InvalidPattern {
                            script: script.name().to_string(),
                            rule: rule_name.clone(),
                            reason: e.to_string(),
                        })?;
                    Arc::new(regex)
                }
                RuleSource::Custom(rule) => rule.clone(),
            };
            compiled.push(RuleEntry {
                script: position,
                name: rule_name.clone(),
                rule,
            });
        }

        debug!(script = %script.name(), rules = compiled.len(), "Registered script");

        self.rules.extend(compiled);
        self.index.insert(script.name().to_string(), position);
        self.scripts.push(script);
        Ok(())
    }

    /// Registers a script (builder pattern).
    pub fn with(mut self, script: Script) -> RegistryResult<Self> {
        self.register(script)?;
        Ok(self)
    }

    /// Looks up a script by name.
    pub fn resolve(&self, name: &str) -> RegistryResult<&Script> {
        self.index
            .get(name)
            .map(|&i| &self.scripts[i])
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })
    }

    /// Finds the first rule matching `content`.
    pub fn match_script(&self, content: &str) -> Option<MatchResult> {
        match_script(self, content)
    }

    /// Returns the number of scripts.
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Returns true if no script is registered.
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Returns the script names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scripts.iter().map(Script::name)
    }

    /// Renders one line per script: its name and description.
    pub fn help(&self) -> String {
        self.scripts
            .iter()
            .map(|script| match script.get_description() {
                Some(text) => format!("{}: {}", script.name(), text),
                None => script.name().to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub(crate) fn rule_entries(&self) -> &[RuleEntry] {
        &self.rules
    }

    pub(crate) fn script_at(&self, position: usize) -> &Script {
        &self.scripts[position]
    }
}

impl std::fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field("scripts", &self.names().collect::<Vec<_>>())
            .field("rules", &self.rules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::{Message, ScriptResult};
    use crate::script::{ExactRule, ScriptContext};

    async fn nothing(_ctx: ScriptContext) -> ScriptResult<Vec<Message>> {
        Ok(Vec::new())
    }

    fn noop(name: &str) -> Script {
        Script::new(name, nothing)
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = ScriptRegistry::new();
        registry
            .register(noop("ping").rule("ping", "^ping$").description("reply pong"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("ping").unwrap().name(), "ping");
        assert!(matches!(
            registry.resolve("pong"),
            Err(RegistryError::NotFound { ref name }) if name == "pong"
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ScriptRegistry::new();
        registry.register(noop("ping").rule("a", "a")).unwrap();

        let err = registry.register(noop("ping").rule("b", "b")).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { ref name } if name == "ping"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_pattern_leaves_registry_untouched() {
        let mut registry = ScriptRegistry::new();
        let err = registry
            .register(noop("bad").rule("ok", "fine").rule("broken", "(oops"))
            .unwrap_err();

        assert!(matches!(
            err,
            RegistryError::InvalidPattern { ref script, ref rule, .. }
                if script == "bad" && rule == "broken"
        ));
        assert!(registry.is_empty());
        assert!(registry.match_script("fine").is_none());
    }

    #[test]
    fn test_script_without_rules_rejected() {
        let mut registry = ScriptRegistry::new();
        assert!(matches!(
            registry.register(noop("empty")),
            Err(RegistryError::NoRules { .. })
        ));
    }

    #[test]
    fn test_names_and_help_in_registration_order() {
        let registry = ScriptRegistry::new()
            .with(noop("zeta").rule("z", "z").description("last letter"))
            .unwrap()
            .with(noop("alpha").rule_with("a", ExactRule::new("a")))
            .unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), ["zeta", "alpha"]);
        assert_eq!(registry.help(), "zeta: last letter\nalpha");
    }
}
