//! # Error Types
//!
//! Build-time and parse-time errors.
//!
//! [`GrammarError`] aborts grammar or table construction. [`ParseError`]
//! carries everything needed to report a failed parse: the location (with
//! line/column computed against the input), the terminals the failing state
//! accepted, the tokens that could be recognized at the position across the
//! whole terminal set, and for GLR parses the heads that were still alive.
//!
//! Lexical ambiguity is fatal only for the deterministic LR driver; the GLR
//! driver forks on it and never raises [`ParseError::Disambiguation`].

use crate::common::Location;
use thiserror::Error;

/// Errors detected while building a grammar or its tables.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("undefined grammar symbol '{name}' referenced in production '{production}'")]
    UndefinedSymbol { name: String, production: String },

    #[error("non-terminal '{name}' has no productions")]
    NoProductions { name: String },

    #[error("production '{production}' is not reachable from the start symbol")]
    UnreachableProduction { production: String },

    #[error(
        "FIRST set empty for grammar symbol '{name}'; \
         the symbol recurses infinitely"
    )]
    InfiniteRecursion { name: String },

    #[error("invalid recognizer /{pattern}/: {message}")]
    InvalidRecognizer { pattern: String, message: String },

    #[error("terminal '{name}' has no recognizer")]
    MissingRecognizer { name: String },

    #[error("duplicate grammar symbol '{name}'")]
    DuplicateSymbol { name: String },

    #[error("unknown symbol '{name}'")]
    UnknownSymbol { name: String },

    #[error("the LR driver requires a conflict-free table; {count} conflict(s) remain:\n{details}")]
    UnresolvedConflicts { count: usize, details: String },

    #[error("invalid table snapshot: {message}")]
    InvalidSnapshot { message: String },
}

/// Errors raised while parsing.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// No action applies at the current `(state, position, token)`, or no
    /// token could be recognized where the state requires one.
    #[error(
        "error at {location} => \"{context}\"; expected: {}{}",
        join_or(.symbols_expected),
        tokens_ahead_suffix(.tokens_ahead)
    )]
    UnexpectedInput {
        location: Location,
        /// Input excerpt around the failure position.
        context: String,
        /// Terminals the failing state accepts (keys of its ACTION row).
        symbols_expected: Vec<String>,
        /// What the recognizer could produce at the position across the
        /// entire terminal set, filtered by the `unexpected: false` meta
        /// flag.
        tokens_ahead: Vec<String>,
        /// Symbols on top of the stack: a singleton for LR, the set across
        /// heads for GLR.
        symbols_before: Vec<String>,
        /// GLR only: heads alive when the frontier died.
        last_heads: Vec<String>,
    },

    /// Lexical ambiguity that disambiguation could not reduce to a single
    /// token. Raised only by the LR driver.
    #[error(
        "error at {location} => \"{context}\"; can't disambiguate between: {}",
        join_or(.symbols)
    )]
    Disambiguation {
        location: Location,
        context: String,
        symbols: Vec<String>,
    },
}

impl ParseError {
    /// Location of this error in the input.
    #[must_use]
    pub const fn location(&self) -> &Location {
        match self {
            Self::UnexpectedInput { location, .. } | Self::Disambiguation { location, .. } => {
                location
            }
        }
    }

    /// Absolute byte offset of this error.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.location().position
    }
}

fn join_or(items: &[String]) -> String {
    if items.is_empty() {
        "nothing".to_owned()
    } else {
        items.join(" or ")
    }
}

fn tokens_ahead_suffix(tokens: &[String]) -> String {
    if tokens.is_empty() {
        String::new()
    } else {
        format!("; found: {}", tokens.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::LineIndex;

    #[test]
    fn unexpected_input_message() {
        let input = "a + b";
        let index = LineIndex::new(input);
        let err = ParseError::UnexpectedInput {
            location: Location::new(None, 4, &index),
            context: "a + *b".to_owned(),
            symbols_expected: vec!["num".to_owned(), "lparen".to_owned()],
            tokens_ahead: vec!["id(\"b\")".to_owned()],
            symbols_before: vec!["plus".to_owned()],
            last_heads: Vec::new(),
        };
        let message = err.to_string();
        assert!(message.contains("1:5"));
        assert!(message.contains("num or lparen"));
        assert!(message.contains("id(\"b\")"));
    }
}
