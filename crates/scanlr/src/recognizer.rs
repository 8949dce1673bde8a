//! Terminal recognizers
//!
//! A recognizer decides whether its terminal matches the input at a given
//! position. String and regex recognizers cover textual grammars; custom
//! recognizers are arbitrary user callables registered per terminal name.
//!
//! Recognition is always anchored: a match starts exactly at the queried
//! position. Regex patterns are compiled once at grammar build time.

use crate::error::GrammarError;
use regex_automata::{meta, Anchored, Input};
use std::any::Any;
use std::rc::Rc;

/// A successful recognition at some input position.
#[derive(Clone)]
pub struct TokenMatch {
    /// Number of bytes matched.
    pub length: usize,
    /// Opaque payload forwarded verbatim to user actions.
    pub additional_data: Option<Rc<dyn Any>>,
}

impl TokenMatch {
    #[must_use]
    pub const fn new(length: usize) -> Self {
        Self {
            length,
            additional_data: None,
        }
    }
}

impl std::fmt::Debug for TokenMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenMatch")
            .field("length", &self.length)
            .field("additional_data", &self.additional_data.is_some())
            .finish()
    }
}

/// User-supplied recognizer callable: `(input, position)` to an optional
/// match. Shared (`Rc`) so the nested layout parser can reuse the same
/// registrations.
pub type CustomRecognizerFn = Rc<dyn Fn(&str, usize) -> Option<TokenMatch>>;

/// Recognizer attached to a terminal.
pub enum Recognizer {
    /// No recognizer. Reserved sentinels (`STOP`, `EMPTY`) and terminals
    /// awaiting a per-name custom registration carry this.
    None,
    /// Literal string match.
    StringMatch { value: String, ignore_case: bool },
    /// Anchored regex match.
    Regex { pattern: Box<str>, regex: meta::Regex },
    /// Arbitrary user callable.
    Custom(CustomRecognizerFn),
}

impl Recognizer {
    /// Literal string recognizer.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::StringMatch {
            value: value.into(),
            ignore_case: false,
        }
    }

    /// Case-insensitive literal string recognizer (ASCII case folding).
    #[must_use]
    pub fn string_ignore_case(value: impl Into<String>) -> Self {
        Self::StringMatch {
            value: value.into(),
            ignore_case: true,
        }
    }

    /// Compile a regex recognizer.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::InvalidRecognizer`] if the pattern does not
    /// compile.
    pub fn regex(pattern: &str) -> Result<Self, GrammarError> {
        let regex =
            meta::Regex::new(pattern).map_err(|source| GrammarError::InvalidRecognizer {
                pattern: pattern.to_owned(),
                message: source.to_string(),
            })?;
        Ok(Self::Regex {
            pattern: pattern.into(),
            regex,
        })
    }

    /// Whether this is a literal string recognizer. String matches beat
    /// regex matches during lexical disambiguation.
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::StringMatch { .. })
    }

    /// Literal length used to order terminals for scanning, longest first.
    #[must_use]
    pub fn specificity(&self) -> usize {
        match self {
            Self::StringMatch { value, .. } => value.len(),
            _ => 0,
        }
    }

    /// Run the recognizer at `pos`.
    ///
    /// `keyword` enforces the word-boundary rule of keyword terminals: the
    /// byte following the match must not be a word character.
    #[must_use]
    pub fn recognize(&self, input: &str, pos: usize, keyword: bool) -> Option<TokenMatch> {
        let matched = match self {
            Self::None => None,
            Self::StringMatch { value, ignore_case } => {
                let candidate = input.get(pos..pos + value.len())?;
                let matches = if *ignore_case {
                    candidate.eq_ignore_ascii_case(value)
                } else {
                    candidate == value
                };
                matches.then(|| TokenMatch::new(value.len()))
            }
            Self::Regex { regex, .. } => {
                let search = Input::new(input).range(pos..).anchored(Anchored::Yes);
                regex
                    .find(search)
                    .filter(|m| !m.is_empty())
                    .map(|m| TokenMatch::new(m.len()))
            }
            Self::Custom(f) => f(input, pos),
        };

        match matched {
            Some(m) if keyword && starts_with_word_char(&input[pos + m.length..]) => None,
            other => other,
        }
    }
}

fn starts_with_word_char(rest: &str) -> bool {
    rest.chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

impl std::fmt::Debug for Recognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::StringMatch { value, ignore_case } => f
                .debug_struct("StringMatch")
                .field("value", value)
                .field("ignore_case", ignore_case)
                .finish(),
            Self::Regex { pattern, .. } => f.debug_tuple("Regex").field(pattern).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_match_is_anchored() {
        let r = Recognizer::string("for");
        assert_eq!(r.recognize("for x", 0, false).unwrap().length, 3);
        assert!(r.recognize("x for", 0, false).is_none());
        assert_eq!(r.recognize("x for", 2, false).unwrap().length, 3);
    }

    #[test]
    fn keyword_requires_word_boundary() {
        let r = Recognizer::string("for");
        assert!(r.recognize("fortune", 0, true).is_none());
        assert_eq!(r.recognize("for tune", 0, true).unwrap().length, 3);
        assert_eq!(r.recognize("for", 0, true).unwrap().length, 3);
        assert!(r.recognize("for_", 0, true).is_none());
    }

    #[test]
    fn regex_match_is_anchored_and_non_empty() {
        let r = Recognizer::regex(r"\d+").unwrap();
        assert_eq!(r.recognize("42abc", 0, false).unwrap().length, 2);
        assert!(r.recognize("abc42", 0, false).is_none());
        let opt = Recognizer::regex(r"\d*").unwrap();
        assert!(opt.recognize("abc", 0, false).is_none());
    }

    #[test]
    fn invalid_regex_is_a_grammar_error() {
        assert!(Recognizer::regex("(unclosed").is_err());
    }

    #[test]
    fn ignore_case_string() {
        let r = Recognizer::string_ignore_case("select");
        assert_eq!(r.recognize("SELECT *", 0, false).unwrap().length, 6);
    }
}
