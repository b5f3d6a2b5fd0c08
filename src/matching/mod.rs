//! Wildcard name matching.
//!
//! Two dialects share a single state-set automaton:
//! - **Simple**: `*` matches zero or more characters, `?` exactly one.
//! - **ExtendedDos**: the legacy Win32 rules. Expressions are first rewritten
//!   by [`translate_win32_expression`] into an alphabet with `<`, `>` and `"`
//!   that reproduces 8.3 period quirks (`*.` = "no extension", `?` before an
//!   extension may match nothing, ...).
//!
//! Only ExtendedDos treats `\` as an escape; in Simple it is an ordinary
//! character, as it is in Unix file names.

mod automaton;
pub mod translate;

pub use translate::{escape_structural, translate_win32_expression};

use std::fmt;

/// Which wildcard dialect an expression is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchType {
    /// `*` and `?` only.
    #[default]
    Simple,
    /// Legacy DOS/Win32 semantics.
    ExtendedDos,
}

/// Case sensitivity of name comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchCasing {
    /// Insensitive on Windows and macOS, sensitive elsewhere.
    #[default]
    PlatformDefault,
    CaseSensitive,
    CaseInsensitive,
}

impl MatchCasing {
    /// Resolve to the flag the matcher takes.
    pub fn ignore_case(self) -> bool {
        match self {
            MatchCasing::PlatformDefault => !platform_is_case_sensitive(),
            MatchCasing::CaseSensitive => false,
            MatchCasing::CaseInsensitive => true,
        }
    }
}

fn platform_is_case_sensitive() -> bool {
    !(cfg!(windows) || cfg!(target_os = "macos") || cfg!(target_os = "ios"))
}

/// A matcher-ready expression. Built once per enumeration and reused for
/// every candidate name.
#[derive(Clone, PartialEq, Eq)]
pub struct CompiledExpression {
    pattern: String,
    chars: Vec<char>,
    match_type: MatchType,
}

impl CompiledExpression {
    /// Compile a single-segment expression.
    ///
    /// For [`MatchType::ExtendedDos`] the "match everything" spellings (`""`,
    /// `"."`, `"*"`, `"*.*"`) collapse to `"*"`. Where `\` is not a directory
    /// separator, the structural characters `\ " < >` are escaped so they stay
    /// literal, then the expression is translated.
    pub fn new(expression: &str, match_type: MatchType) -> Self {
        let pattern = match match_type {
            MatchType::Simple => expression.to_string(),
            MatchType::ExtendedDos => {
                if std::path::MAIN_SEPARATOR != '\\' {
                    let escaped = escape_structural(expression);
                    translate_win32_expression(&escaped).into_owned()
                } else {
                    translate_win32_expression(expression).into_owned()
                }
            }
        };

        Self::from_translated(pattern, match_type)
    }

    /// Wrap an already-translated pattern without rewriting it.
    pub fn from_translated(pattern: impl Into<String>, match_type: MatchType) -> Self {
        let pattern = pattern.into();
        let chars = pattern.chars().collect();
        Self {
            pattern,
            chars,
            match_type,
        }
    }

    /// The translated pattern text.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    /// True for the bare `*` pattern.
    pub fn matches_everything(&self) -> bool {
        self.chars.len() == 1 && self.chars[0] == '*'
    }

    /// Test a name against this expression.
    pub fn is_match(&self, name: &str, ignore_case: bool) -> bool {
        if self.matches_everything() {
            return !name.is_empty();
        }
        let name: Vec<char> = name.chars().collect();
        automaton::match_pattern(
            &self.chars,
            &name,
            ignore_case,
            self.match_type == MatchType::ExtendedDos,
        )
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("pattern", &self.pattern)
            .field("match_type", &self.match_type)
            .finish()
    }
}

/// Match `name` against an untranslated Simple expression (`*`, `?`, `\`).
pub fn matches_simple_expression(expression: &str, name: &str, ignore_case: bool) -> bool {
    let expression: Vec<char> = expression.chars().collect();
    let name: Vec<char> = name.chars().collect();
    automaton::match_pattern(&expression, &name, ignore_case, false)
}

/// Match `name` against an expression already in the extended alphabet.
///
/// Callers holding a raw legacy expression should pass it through
/// [`translate_win32_expression`] first.
pub fn matches_win32_expression(expression: &str, name: &str, ignore_case: bool) -> bool {
    let expression: Vec<char> = expression.chars().collect();
    let name: Vec<char> = name.chars().collect();
    automaton::match_pattern(&expression, &name, ignore_case, true)
}

/// Test `name` against a compiled expression.
pub fn is_match(expression: &CompiledExpression, name: &str, ignore_case: bool) -> bool {
    expression.is_match(name, ignore_case)
}
