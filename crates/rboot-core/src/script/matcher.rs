//! First-match rule evaluation.

use tracing::trace;

use super::registry::ScriptRegistry;

/// Outcome of a successful match.
///
/// Owned by the task handling the message; never stored on shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Name of the matched script.
    pub script: String,
    /// Name of the rule that matched.
    pub rule: String,
    /// Whole match followed by the capture groups.
    pub captures: Vec<String>,
}

/// Evaluates `content` against every rule of `registry`.
///
/// Scripts are visited in registration order and rules in declaration order
/// within a script. The first rule that matches wins.
pub fn match_script(registry: &ScriptRegistry, content: &str) -> Option<MatchResult> {
    registry.rule_entries().iter().find_map(|entry| {
        let captures = entry.rule.captures(content)?;
        let script = registry.script_at(entry.script).name().to_string();
        trace!(script = %script, rule = %entry.name, "Rule matched");
        Some(MatchResult {
            script,
            rule: entry.name.clone(),
            captures,
        })
    })
}
