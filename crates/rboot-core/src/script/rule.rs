//! Rule predicates evaluated against message content.

use std::fmt;

use regex::Regex;

/// A named predicate over message content.
///
/// A rule that matches returns its captures: index 0 is the whole matched
/// text, followed by one entry per capture group.
pub trait Rule: Send + Sync + 'static {
    /// Evaluates the rule against `content`.
    fn captures(&self, content: &str) -> Option<Vec<String>>;

    /// Human-readable form of the rule, used in logs and help output.
    fn describe(&self) -> String;
}

// ============================================================================
// RegexRule
// ============================================================================

/// Regular expression rule, searched anywhere in the content.
///
/// Anchor the pattern (`^...$`) to match the whole content.
#[derive(Debug, Clone)]
pub struct RegexRule {
    regex: Regex,
}

impl RegexRule {
    /// Compiles `pattern`.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// Returns the source pattern.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Rule for RegexRule {
    fn captures(&self, content: &str) -> Option<Vec<String>> {
        self.regex.captures(content).map(|caps| {
            caps.iter()
                .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect()
        })
    }

    fn describe(&self) -> String {
        format!("/{}/", self.regex.as_str())
    }
}

// ============================================================================
// ExactRule
// ============================================================================

/// Case-insensitive comparison against the whole (trimmed) content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactRule {
    text: String,
}

impl ExactRule {
    /// Creates a rule matching `text` exactly, ignoring case.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_lowercase(),
        }
    }
}

impl Rule for ExactRule {
    fn captures(&self, content: &str) -> Option<Vec<String>> {
        let trimmed = content.trim();
        (trimmed.to_lowercase() == self.text).then(|| vec![trimmed.to_string()])
    }

    fn describe(&self) -> String {
        format!("\"{}\"", self.text)
    }
}

impl fmt::Display for ExactRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_captures_include_whole_match() {
        let rule = RegexRule::new(r"^echo (\w+)(?: (\d+))?$").unwrap();

        assert_eq!(
            rule.captures("echo hello 3"),
            Some(vec!["echo hello 3".into(), "hello".into(), "3".into()])
        );
        // Non-participating group yields an empty string.
        assert_eq!(
            rule.captures("echo hello"),
            Some(vec!["echo hello".into(), "hello".into(), String::new()])
        );
        assert_eq!(rule.captures("say hello"), None);
    }

    #[test]
    fn test_regex_is_unanchored_by_default() {
        let rule = RegexRule::new("ping").unwrap();
        assert_eq!(rule.captures("well, ping me"), Some(vec!["ping".into()]));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(RegexRule::new("(unclosed").is_err());
    }

    #[test]
    fn test_exact_rule_ignores_case_and_padding() {
        let rule = ExactRule::new("Help");

        assert_eq!(rule.captures("  HELP "), Some(vec!["HELP".into()]));
        assert_eq!(rule.captures("help me"), None);
        assert_eq!(rule.describe(), "\"help\"");
    }
}
