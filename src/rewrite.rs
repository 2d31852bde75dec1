//! Text rewrite rules applied by a database handle.
//!
//! Both rules are plain values owned by the handle that builds them, so two handles
//! with different prefixes never see each other's settings.

/// Placeholder token substituted with the configured table prefix.
pub const PREFIX_TOKEN: &str = "#__";

/// Replaces every occurrence of [`PREFIX_TOKEN`] with a fixed table prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRule {
    prefix: String,
}

impl PrefixRule {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Substitutes the prefix for each non-overlapping token, scanning left to right.
    pub fn apply(&self, sql: &str) -> String {
        sql.replace(PREFIX_TOKEN, &self.prefix)
    }
}

/// Backslash-escapes quotes and backslashes for inclusion in a SQL string literal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscapeRule;

impl EscapeRule {
    pub fn new() -> Self {
        EscapeRule
    }

    /// Single pass over the input; inserted backslashes are never rescanned.
    pub fn apply(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len() + s.len() / 8);
        for c in s.chars() {
            match c {
                '\'' => out.push_str("\\'"),
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                _ => out.push(c),
            }
        }
        out
    }
}
