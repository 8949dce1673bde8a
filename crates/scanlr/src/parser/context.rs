//! Parse context exposed to user callbacks

use crate::grammar::{Grammar, ProdIndex, Symbol};
use crate::table::StateId;
use crate::token::Token;
use crate::value::Value;

/// Snapshot of the parse state handed to actions, the dynamic
/// disambiguation filter and the error hook.
///
/// Every field is maintained by the driver; `extra` is the caller's
/// mutable scratchpad and travels through the whole parse untouched by the
/// core. The error hook may additionally set `start_position` and
/// `token_ahead` to steer recovery.
pub struct Context<'g, 'i> {
    pub grammar: &'g Grammar,
    pub input: &'i str,
    pub file_name: Option<String>,
    /// Start of the current token or reduction span.
    pub start_position: usize,
    /// End of the current token or reduction span.
    pub end_position: usize,
    /// Layout consumed right before the current position.
    pub layout_content: &'i str,
    /// The token being shifted (shift actions only).
    pub token: Option<Token<'i>>,
    /// The lookahead token, when one is known.
    pub token_ahead: Option<Token<'i>>,
    /// The production being reduced (reduce actions only).
    pub production: Option<ProdIndex>,
    /// Symbol of the current action.
    pub symbol: Option<Symbol>,
    pub state: StateId,
    /// User scratchpad, carried by the parser through every callback.
    pub extra: Value<'i>,
}

impl<'g, 'i> Context<'g, 'i> {
    #[must_use]
    pub fn new(grammar: &'g Grammar, input: &'i str, file_name: Option<String>) -> Self {
        Self {
            grammar,
            input,
            file_name,
            start_position: 0,
            end_position: 0,
            layout_content: "",
            token: None,
            token_ahead: None,
            production: None,
            symbol: None,
            state: StateId(0),
            extra: Value::None,
        }
    }

    /// The input slice covered by the current span.
    #[must_use]
    pub fn span_text(&self) -> &'i str {
        &self.input[self.start_position..self.end_position]
    }
}

/// Kind of action submitted to the dynamic disambiguation filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicAction {
    Shift,
    Reduce,
}

/// One candidate action offered to the dynamic disambiguation filter.
///
/// The filter runs after all static resolution, once per candidate action
/// per head; returning `false` drops the candidate.
pub struct DynamicCall<'c, 'g, 'i> {
    pub context: &'c Context<'g, 'i>,
    pub action: DynamicAction,
    pub token: Option<&'c Token<'i>>,
    pub production: Option<ProdIndex>,
    pub from_state: StateId,
    pub to_state: Option<StateId>,
}

/// Dynamic disambiguation filter.
///
/// Invoked once with `None` when parsing starts so stateful filters can
/// reset themselves.
pub type DynamicFilter =
    Box<dyn for<'c, 'g, 'i> FnMut(Option<&DynamicCall<'c, 'g, 'i>>) -> bool>;
