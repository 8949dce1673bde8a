//! Tokens produced by the scannerless recognition runtime

use crate::grammar::TermIndex;
use std::any::Any;
use std::rc::Rc;

/// A token recognized at a parse position.
///
/// Tokens borrow their matched text from the input; they never outlive it.
/// The layout consumed immediately before the token travels with it so that
/// actions can reconstruct the input exactly.
#[derive(Clone)]
pub struct Token<'i> {
    pub terminal: TermIndex,
    /// The matched substring.
    pub value: &'i str,
    /// Absolute byte offset of the match start.
    pub start: usize,
    /// Layout (whitespace/comments) consumed right before this token.
    pub layout_content: &'i str,
    /// Opaque recognizer payload, forwarded to actions verbatim.
    pub additional_data: Option<Rc<dyn Any>>,
}

impl<'i> Token<'i> {
    #[must_use]
    pub fn new(terminal: TermIndex, value: &'i str, start: usize) -> Self {
        Self {
            terminal,
            value,
            start,
            layout_content: "",
            additional_data: None,
        }
    }

    /// Match length in bytes. Zero for `STOP`.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.value.len()
    }

    /// Absolute offset just past the match.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start + self.value.len()
    }

    /// Whether this is the end-of-input sentinel.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        self.terminal == TermIndex::STOP
    }
}

impl PartialEq for Token<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.terminal == other.terminal && self.start == other.start && self.value == other.value
    }
}

impl Eq for Token<'_> {}

impl std::fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("terminal", &self.terminal)
            .field("value", &self.value)
            .field("start", &self.start)
            .finish()
    }
}
