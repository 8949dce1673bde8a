//! # Deterministic LR driver
//!
//! Table-directed shift/reduce execution over a string input. Terminals
//! are recognized contextually at each position from the current state's
//! acceptable set (no tokenization pass), layout is consumed before every
//! recognition, and the driver either builds a parse tree (default) or
//! invokes user actions in-line during reductions.
//!
//! The driver requires a conflict-free table; grammars that keep conflicts
//! belong to the GLR driver. Lexical ambiguity that survives
//! disambiguation is an error here, never in GLR.

pub mod actions;
pub mod context;
pub mod recovery;

pub use actions::{builtin_action, call_actions, ActionFn, ActionSet, SymbolActions};
pub use context::{Context, DynamicAction, DynamicCall, DynamicFilter};
pub use recovery::{ErrorRecovery, RecoveryFn};

use crate::common::{position_context, LineIndex, Location};
use crate::error::{GrammarError, ParseError};
use crate::grammar::{Grammar, Symbol, TermIndex};
use crate::recognizer::{CustomRecognizerFn, Recognizer, TokenMatch};
use crate::scanner::Scanner;
use crate::table::{Action, LrTable, StateId, TableConfig, TableKind};
use crate::token::Token;
use crate::tree::TreeNode;
use crate::value::Value;
use hashbrown::HashMap;
use std::rc::Rc;

/// Override point for token recognition and lexical disambiguation.
///
/// Receives the parse context and a thunk running the default procedure;
/// whatever it returns are the candidate tokens.
pub type TokenRecognitionHook = Box<
    dyn for<'g, 'i> Fn(&Context<'g, 'i>, &mut dyn FnMut() -> Vec<Token<'i>>) -> Vec<Token<'i>>,
>;

/// Configures and builds a [`Parser`].
pub struct ParserBuilder<'g> {
    grammar: &'g Grammar,
    kind: TableKind,
    prefer_shifts: bool,
    prefer_shifts_over_empty: bool,
    ws: Option<String>,
    consume_input: bool,
    lexical_disambiguation: bool,
    recovery: ErrorRecovery,
    custom: HashMap<String, CustomRecognizerFn>,
    token_hook: Option<TokenRecognitionHook>,
    dynamic_filter: Option<DynamicFilter>,
    table: Option<LrTable>,
    require_deterministic: bool,
    build_layout: bool,
}

impl<'g> ParserBuilder<'g> {
    #[must_use]
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            kind: TableKind::Lalr,
            prefer_shifts: true,
            prefer_shifts_over_empty: true,
            ws: Some(" \n\t".to_owned()),
            consume_input: true,
            lexical_disambiguation: true,
            recovery: ErrorRecovery::Off,
            custom: HashMap::new(),
            token_hook: None,
            dynamic_filter: None,
            table: None,
            require_deterministic: true,
            build_layout: true,
        }
    }

    /// SLR or LALR item sets.
    #[must_use]
    pub fn kind(mut self, kind: TableKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn prefer_shifts(mut self, on: bool) -> Self {
        self.prefer_shifts = on;
        self
    }

    #[must_use]
    pub fn prefer_shifts_over_empty(mut self, on: bool) -> Self {
        self.prefer_shifts_over_empty = on;
        self
    }

    /// Whitespace skipped between tokens when the grammar has no `LAYOUT`
    /// rule. `None` disables skipping.
    #[must_use]
    pub fn ws(mut self, ws: Option<&str>) -> Self {
        self.ws = ws.map(str::to_owned);
        self
    }

    /// When `false`, the parse may stop at any position where the state
    /// expects `STOP` (prefix parsing).
    #[must_use]
    pub fn consume_input(mut self, on: bool) -> Self {
        self.consume_input = on;
        self
    }

    #[must_use]
    pub fn lexical_disambiguation(mut self, on: bool) -> Self {
        self.lexical_disambiguation = on;
        self
    }

    #[must_use]
    pub fn error_recovery(mut self, recovery: ErrorRecovery) -> Self {
        self.recovery = recovery;
        self
    }

    /// Register a custom recognizer for the terminal with the given name.
    #[must_use]
    pub fn recognizer(
        mut self,
        terminal: &str,
        f: impl Fn(&str, usize) -> Option<TokenMatch> + 'static,
    ) -> Self {
        self.custom.insert(terminal.to_owned(), Rc::new(f));
        self
    }

    /// Install the custom token recognition hook.
    #[must_use]
    pub fn token_recognition(mut self, hook: TokenRecognitionHook) -> Self {
        self.token_hook = Some(hook);
        self
    }

    /// Install the dynamic disambiguation filter.
    #[must_use]
    pub fn dynamic_filter(mut self, filter: DynamicFilter) -> Self {
        self.dynamic_filter = Some(filter);
        self
    }

    /// Use a previously built (or snapshot-reloaded) table instead of
    /// building one. The table must come from the same grammar and
    /// policies.
    #[must_use]
    pub fn table(mut self, table: LrTable) -> Self {
        self.table = Some(table);
        self
    }

    pub(crate) fn accept_conflicts(mut self) -> Self {
        self.require_deterministic = false;
        self
    }

    fn no_layout(mut self) -> Self {
        self.build_layout = false;
        self
    }

    /// Build the parser.
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarError`] when the table keeps conflicts (LR only),
    /// a custom recognizer names an unknown terminal, or a terminal ends up
    /// without any recognizer.
    pub fn build(mut self) -> Result<Parser<'g>, GrammarError> {
        let table_config = TableConfig {
            kind: self.kind,
            prefer_shifts: self.prefer_shifts,
            prefer_shifts_over_empty: self.prefer_shifts_over_empty,
        };
        let table = match self.table.take() {
            Some(table) => table,
            None => LrTable::build(self.grammar, table_config),
        };
        if self.require_deterministic {
            table.check_deterministic(self.grammar)?;
        }

        let mut custom: HashMap<TermIndex, CustomRecognizerFn, ahash::RandomState> =
            HashMap::default();
        for (name, f) in self.custom {
            let index = self
                .grammar
                .term_by_name(&name)
                .ok_or(GrammarError::UnknownSymbol { name: name.clone() })?;
            custom.insert(index, f);
        }
        for index in self.grammar.term_indices() {
            if index == TermIndex::STOP || index == TermIndex::EMPTY {
                continue;
            }
            let terminal = self.grammar.terminal(index);
            if matches!(terminal.recognizer, Recognizer::None) && !custom.contains_key(&index) {
                return Err(GrammarError::MissingRecognizer {
                    name: terminal.name.clone().into(),
                });
            }
        }

        let layout = if self.build_layout && self.grammar.layout().is_some() {
            let layout_start = self.grammar.layout().expect("layout symbol");
            // The layout sub-parser is always a deterministic LR parser;
            // shift preference stays on even when the outer parser (GLR)
            // turned it off.
            let layout_config = TableConfig {
                kind: self.kind,
                prefer_shifts: true,
                prefer_shifts_over_empty: true,
            };
            let layout_table = LrTable::build_for_start(self.grammar, layout_start, layout_config);
            layout_table.check_deterministic(self.grammar)?;
            let mut builder = ParserBuilder::new(self.grammar)
                .kind(self.kind)
                .consume_input(false)
                .ws(None)
                .no_layout();
            builder.custom = custom
                .iter()
                .map(|(t, f)| (self.grammar.terminal(*t).name.to_string(), Rc::clone(f)))
                .collect();
            builder = builder.table(layout_table);
            Some(Box::new(builder.build()?))
        } else {
            None
        };

        Ok(Parser {
            table,
            scanner: Scanner::new(
                self.grammar,
                custom,
                self.ws,
                self.lexical_disambiguation,
                self.consume_input,
            ),
            layout,
            token_hook: self.token_hook,
            dynamic_filter: self.dynamic_filter,
            recovery: self.recovery,
            errors: Vec::new(),
        })
    }
}

/// The deterministic LR parser.
pub struct Parser<'g> {
    pub(crate) table: LrTable,
    pub(crate) scanner: Scanner<'g>,
    pub(crate) layout: Option<Box<Parser<'g>>>,
    pub(crate) token_hook: Option<TokenRecognitionHook>,
    pub(crate) dynamic_filter: Option<DynamicFilter>,
    pub(crate) recovery: ErrorRecovery,
    pub(crate) errors: Vec<ParseError>,
}

impl std::fmt::Debug for Parser<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("table", &self.table)
            .field("layout", &self.layout)
            .field("recovery", &self.recovery)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl<'g> Parser<'g> {
    /// Build a parser with default settings.
    ///
    /// # Errors
    ///
    /// See [`ParserBuilder::build`].
    pub fn new(grammar: &'g Grammar) -> Result<Self, GrammarError> {
        ParserBuilder::new(grammar).build()
    }

    #[must_use]
    pub fn grammar(&self) -> &'g Grammar {
        self.scanner.grammar()
    }

    #[must_use]
    pub const fn table(&self) -> &LrTable {
        &self.table
    }

    /// Errors recovered from during the last parse.
    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Parse, building a parse tree with the default actions.
    ///
    /// # Errors
    ///
    /// Returns the [`ParseError`] that stopped the parse.
    pub fn parse<'i>(&mut self, input: &'i str) -> Result<TreeNode<'i>, ParseError> {
        self.parse_named(input, None)
    }

    /// Like [`parse`](Self::parse), with a file name for error reporting.
    ///
    /// # Errors
    ///
    /// Returns the [`ParseError`] that stopped the parse.
    pub fn parse_named<'i>(
        &mut self,
        input: &'i str,
        file_name: Option<&str>,
    ) -> Result<TreeNode<'i>, ParseError> {
        let mut semantics = TreeSemantics;
        self.drive(input, 0, file_name, &mut semantics)
            .map(|(tree, _)| tree)
    }

    /// Parse, invoking the actions in-line during reductions.
    ///
    /// # Errors
    ///
    /// Returns the [`ParseError`] that stopped the parse.
    pub fn parse_with_actions<'i>(
        &mut self,
        input: &'i str,
        actions: &ActionSet,
    ) -> Result<Value<'i>, ParseError> {
        let mut semantics = ValueSemantics { actions };
        self.drive(input, 0, None, &mut semantics)
            .map(|(value, _)| value)
    }

    /// Parse a span starting at `pos`, reporting only how far it reached.
    /// Drives the nested layout grammar.
    pub(crate) fn parse_span(&mut self, input: &str, pos: usize) -> Option<usize> {
        let mut semantics = SpanSemantics;
        self.drive(input, pos, None, &mut semantics)
            .ok()
            .map(|(_, end)| end)
    }

    /// Consume layout before a token: the nested `LAYOUT` parser when the
    /// grammar defines one, the configured whitespace set otherwise.
    pub(crate) fn skip_layout<'i>(&mut self, input: &'i str, pos: usize) -> (usize, &'i str) {
        if let Some(layout) = self.layout.as_mut() {
            match layout.parse_span(input, pos) {
                Some(end) if end > pos => (end, &input[pos..end]),
                _ => (pos, ""),
            }
        } else {
            self.scanner.skip_ws(input, pos)
        }
    }

    /// Recognize candidate tokens for `state` at `pos`, routing through the
    /// custom token recognition hook when installed.
    pub(crate) fn recognize<'i>(
        &mut self,
        state: StateId,
        input: &'i str,
        pos: usize,
        ctx: &Context<'g, 'i>,
    ) -> Vec<Token<'i>> {
        let scanner = &self.scanner;
        let table = &self.table;
        let mut default = || scanner.next_tokens(table, state, input, pos).into_vec();
        match &self.token_hook {
            Some(hook) => hook(ctx, &mut default),
            None => default(),
        }
    }

    pub(crate) fn init_dynamic_filter(&mut self) {
        if let Some(filter) = self.dynamic_filter.as_mut() {
            filter(None);
        }
    }

    pub(crate) fn build_parse_error(
        &self,
        input: &str,
        line_index: &LineIndex,
        pos: usize,
        state: StateId,
        file_name: Option<&str>,
    ) -> ParseError {
        let grammar = self.scanner.grammar();
        ParseError::UnexpectedInput {
            location: Location::new(file_name, pos, line_index),
            context: position_context(input, pos),
            symbols_expected: self
                .table
                .expected_terminals(state)
                .iter()
                .map(|t| grammar.terminal(*t).name.to_string())
                .collect(),
            tokens_ahead: self.scanner.tokens_ahead(input, pos),
            symbols_before: self
                .table
                .state_symbol(state)
                .map(|s| grammar.symbol_name(s).to_owned())
                .into_iter()
                .collect(),
            last_heads: Vec::new(),
        }
    }

    fn drive<'i, S: Semantics<'g, 'i>>(
        &mut self,
        input: &'i str,
        start: usize,
        file_name: Option<&str>,
        semantics: &mut S,
    ) -> Result<(S::Output, usize), ParseError> {
        let grammar = self.scanner.grammar();
        let line_index = LineIndex::new(input);
        let mut ctx = Context::new(grammar, input, file_name.map(str::to_owned));
        self.errors.clear();
        self.init_dynamic_filter();

        let mut stack: Vec<StackEntry<S::Output>> = vec![StackEntry {
            state: StateId(0),
            value: None,
            start,
            end: start,
        }];
        let mut pos = start;
        let mut token_ahead: Option<Token<'i>> = None;

        loop {
            let state = stack.last().expect("non-empty stack").state;
            ctx.state = state;

            if token_ahead.is_none() {
                let (after_layout, layout) = self.skip_layout(input, pos);
                ctx.start_position = after_layout;
                ctx.layout_content = layout;
                let candidates = self.recognize(state, input, after_layout, &ctx);

                let mut real: Vec<Token<'i>> =
                    candidates.iter().filter(|t| !t.is_stop()).cloned().collect();
                let stop = candidates.into_iter().find(Token::is_stop);

                let chosen = match real.len() {
                    0 => stop,
                    1 => real.pop(),
                    _ => {
                        return Err(ParseError::Disambiguation {
                            location: Location::new(file_name, after_layout, &line_index),
                            context: position_context(input, after_layout),
                            symbols: real
                                .iter()
                                .map(|t| grammar.terminal(t.terminal).name.to_string())
                                .collect(),
                        });
                    }
                };
                match chosen {
                    Some(mut token) => {
                        token.layout_content = layout;
                        pos = after_layout;
                        token_ahead = Some(token);
                    }
                    None => {
                        let (new_pos, new_token) = self.try_recover(
                            input,
                            &line_index,
                            after_layout,
                            state,
                            file_name,
                            &mut ctx,
                        )?;
                        pos = new_pos;
                        token_ahead = new_token;
                        continue;
                    }
                }
            }

            let token = token_ahead.clone().expect("token ahead");
            ctx.token_ahead = Some(token.clone());

            let action = self.table.actions(state, token.terminal).first().copied();
            let action = match action {
                Some(action) if self.action_allowed(&ctx, state, &token, action) => Some(action),
                _ => None,
            };

            match action {
                Some(Action::Shift(target)) => {
                    ctx.start_position = token.start;
                    ctx.end_position = token.end();
                    ctx.layout_content = token.layout_content;
                    ctx.symbol = Some(Symbol::Terminal(token.terminal));
                    ctx.token = Some(token.clone());
                    let value = semantics.shift(&ctx);
                    ctx.token = None;
                    stack.push(StackEntry {
                        state: target,
                        value: Some(value),
                        start: token.start,
                        end: token.end(),
                    });
                    pos = token.end();
                    token_ahead = None;
                }
                Some(Action::Reduce(production)) => {
                    let prod = grammar.production(production);
                    let count = prod.rhs.len();
                    let split = stack.len() - count;
                    let popped: Vec<StackEntry<S::Output>> = stack.drain(split..).collect();
                    let span_start = popped.first().map_or(token.start, |e| e.start);
                    let span_end = popped.last().map_or(token.start, |e| e.end);
                    let children: Vec<S::Output> = popped
                        .into_iter()
                        .map(|e| e.value.expect("value on stack"))
                        .collect();

                    ctx.start_position = span_start;
                    ctx.end_position = span_end;
                    ctx.production = Some(production);
                    ctx.symbol = Some(Symbol::NonTerminal(prod.symbol));
                    let value = semantics.reduce(&ctx, children);
                    ctx.production = None;

                    let top = stack.last().expect("non-empty stack").state;
                    let target = self
                        .table
                        .goto(top, prod.symbol)
                        .expect("GOTO entry for reduced non-terminal");
                    stack.push(StackEntry {
                        state: target,
                        value: Some(value),
                        start: span_start,
                        end: span_end,
                    });
                }
                Some(Action::Accept) => {
                    let stop_entry = stack.pop().expect("STOP on stack");
                    let result = stack
                        .pop()
                        .and_then(|e| e.value)
                        .expect("result under STOP");
                    return Ok((result, stop_entry.start));
                }
                None => {
                    let error_pos = token.start;
                    let (new_pos, new_token) =
                        self.try_recover(input, &line_index, error_pos, state, file_name, &mut ctx)?;
                    pos = new_pos;
                    token_ahead = new_token;
                }
            }
        }
    }

    /// Dynamic-filter veto for a single resolved action.
    fn action_allowed(
        &mut self,
        ctx: &Context<'g, '_>,
        state: StateId,
        token: &Token<'_>,
        action: Action,
    ) -> bool {
        if self.dynamic_filter.is_none() {
            return true;
        }
        let grammar = self.scanner.grammar();
        let (kind, production, to_state, dynamic) = match action {
            Action::Shift(target) => (
                DynamicAction::Shift,
                None,
                Some(target),
                grammar.terminal(token.terminal).dynamic,
            ),
            Action::Reduce(p) => (
                DynamicAction::Reduce,
                Some(p),
                None,
                grammar.production(p).dynamic,
            ),
            Action::Accept => return true,
        };
        if !dynamic {
            return true;
        }
        let call = DynamicCall {
            context: ctx,
            action: kind,
            token: Some(token),
            production,
            from_state: state,
            to_state,
        };
        match self.dynamic_filter.as_mut() {
            Some(filter) => filter(Some(&call)),
            None => true,
        }
    }

    fn try_recover<'i>(
        &mut self,
        input: &'i str,
        line_index: &LineIndex,
        pos: usize,
        state: StateId,
        file_name: Option<&str>,
        ctx: &mut Context<'g, 'i>,
    ) -> Result<(usize, Option<Token<'i>>), ParseError> {
        let mut error = self.build_parse_error(input, line_index, pos, state, file_name);
        match &mut self.recovery {
            ErrorRecovery::Off => Err(error),
            ErrorRecovery::Default => {
                let expected = self.table.expected_terminals(state);
                match self.scanner.scan_for_expected(input, pos, &expected) {
                    Some(token) => {
                        self.errors.push(error);
                        Ok((token.start, Some(token)))
                    }
                    None => Err(error),
                }
            }
            ErrorRecovery::Custom(hook) => {
                ctx.start_position = pos;
                ctx.token_ahead = None;
                if hook(ctx, &mut error) {
                    self.errors.push(error);
                    let new_pos = ctx
                        .token_ahead
                        .as_ref()
                        .map_or(ctx.start_position, |t| t.start);
                    Ok((new_pos, ctx.token_ahead.clone()))
                } else {
                    Err(error)
                }
            }
        }
    }
}

struct StackEntry<O> {
    state: StateId,
    value: Option<O>,
    start: usize,
    end: usize,
}

/// Semantic result construction, parameterizing the driver over the build
/// mode.
pub(crate) trait Semantics<'g, 'i> {
    type Output;
    /// Result of shifting `ctx.token`.
    fn shift(&mut self, ctx: &Context<'g, 'i>) -> Self::Output;
    /// Result of reducing `ctx.production` over the popped children.
    fn reduce(&mut self, ctx: &Context<'g, 'i>, children: Vec<Self::Output>) -> Self::Output;
}

/// Default mode: build a parse tree.
pub(crate) struct TreeSemantics;

impl<'g, 'i> Semantics<'g, 'i> for TreeSemantics {
    type Output = TreeNode<'i>;

    fn shift(&mut self, ctx: &Context<'g, 'i>) -> TreeNode<'i> {
        TreeNode::Term {
            token: ctx.token.clone().expect("token on shift"),
        }
    }

    fn reduce(&mut self, ctx: &Context<'g, 'i>, children: Vec<TreeNode<'i>>) -> TreeNode<'i> {
        let production = ctx.production.expect("production on reduce");
        TreeNode::NonTerm {
            symbol: ctx.grammar.production(production).symbol,
            production,
            start: ctx.start_position,
            end: ctx.end_position,
            children,
        }
    }
}

/// In-line mode: invoke user actions during reductions.
pub(crate) struct ValueSemantics<'a> {
    pub actions: &'a ActionSet,
}

impl<'g, 'i> Semantics<'g, 'i> for ValueSemantics<'_> {
    type Output = Value<'i>;

    fn shift(&mut self, ctx: &Context<'g, 'i>) -> Value<'i> {
        let token = ctx.token.as_ref().expect("token on shift");
        Value::borrowed(token.value)
    }

    fn reduce(&mut self, ctx: &Context<'g, 'i>, children: Vec<Value<'i>>) -> Value<'i> {
        let production = ctx.production.expect("production on reduce");
        match self.actions.for_production(ctx.grammar, production) {
            Some(f) => f(ctx, children),
            None => actions::default_reduce(children),
        }
    }
}

/// Recognition-only mode used by the layout parser.
pub(crate) struct SpanSemantics;

impl<'g, 'i> Semantics<'g, 'i> for SpanSemantics {
    type Output = ();

    fn shift(&mut self, _ctx: &Context<'g, 'i>) {}

    fn reduce(&mut self, _ctx: &Context<'g, 'i>, _children: Vec<()>) {}
}
