//! # GLR driver
//!
//! Tomita-style generalized LR over a graph-structured stack. Where the
//! deterministic driver needs a conflict-free table, this driver keeps
//! every action an ACTION cell retained and forks: on conflicting actions,
//! and on lexically ambiguous tokens. All derivations land in a shared
//! packed parse forest.
//!
//! Heads are processed in batches per input position. Within a batch every
//! reachable reduction is performed before any shift (reductions are
//! iterated to a fixed point; the SPPF's idempotent packed-alternative
//! insertion makes re-visits no-ops), which guarantees that semantic
//! results for a span are unified before anything shifts over them.

mod forest;
mod gss;

pub use forest::{visit, CycleError, Forest, SppfId, Tree};

use crate::common::{position_context, LineIndex, Location};
use crate::error::{GrammarError, ParseError};
use crate::grammar::Grammar;
use crate::parser::{
    Context, DynamicAction, DynamicCall, ErrorRecovery, Parser, ParserBuilder,
    TokenRecognitionHook,
};
use crate::recognizer::TokenMatch;
use crate::table::{Action, StateId, TableKind};
use crate::token::Token;
use forest::Sppf;
use gss::{Gss, GssNodeId};
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Configures and builds a [`GlrParser`].
///
/// Defaults differ from the deterministic driver: both shift-preference
/// policies are off, so every alternative survives into the table.
pub struct GlrParserBuilder<'g> {
    inner: ParserBuilder<'g>,
}

impl<'g> GlrParserBuilder<'g> {
    #[must_use]
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            inner: ParserBuilder::new(grammar)
                .prefer_shifts(false)
                .prefer_shifts_over_empty(false)
                .accept_conflicts(),
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: TableKind) -> Self {
        self.inner = self.inner.kind(kind);
        self
    }

    #[must_use]
    pub fn prefer_shifts(mut self, on: bool) -> Self {
        self.inner = self.inner.prefer_shifts(on);
        self
    }

    #[must_use]
    pub fn prefer_shifts_over_empty(mut self, on: bool) -> Self {
        self.inner = self.inner.prefer_shifts_over_empty(on);
        self
    }

    #[must_use]
    pub fn ws(mut self, ws: Option<&str>) -> Self {
        self.inner = self.inner.ws(ws);
        self
    }

    /// When `false`, every prefix parse the grammar admits is returned as
    /// an additional forest root.
    #[must_use]
    pub fn consume_input(mut self, on: bool) -> Self {
        self.inner = self.inner.consume_input(on);
        self
    }

    #[must_use]
    pub fn lexical_disambiguation(mut self, on: bool) -> Self {
        self.inner = self.inner.lexical_disambiguation(on);
        self
    }

    #[must_use]
    pub fn error_recovery(mut self, recovery: ErrorRecovery) -> Self {
        self.inner = self.inner.error_recovery(recovery);
        self
    }

    #[must_use]
    pub fn recognizer(
        mut self,
        terminal: &str,
        f: impl Fn(&str, usize) -> Option<TokenMatch> + 'static,
    ) -> Self {
        self.inner = self.inner.recognizer(terminal, f);
        self
    }

    #[must_use]
    pub fn token_recognition(mut self, hook: TokenRecognitionHook) -> Self {
        self.inner = self.inner.token_recognition(hook);
        self
    }

    #[must_use]
    pub fn dynamic_filter(mut self, filter: crate::parser::DynamicFilter) -> Self {
        self.inner = self.inner.dynamic_filter(filter);
        self
    }

    /// Build the parser.
    ///
    /// # Errors
    ///
    /// See [`ParserBuilder::build`]; unresolved conflicts are *not* an
    /// error here.
    pub fn build(self) -> Result<GlrParser<'g>, GrammarError> {
        Ok(GlrParser {
            base: self.inner.build()?,
        })
    }
}

/// The generalized LR parser.
pub struct GlrParser<'g> {
    base: Parser<'g>,
}

impl<'g> GlrParser<'g> {
    /// Build with default settings.
    ///
    /// # Errors
    ///
    /// See [`GlrParserBuilder::build`].
    pub fn new(grammar: &'g Grammar) -> Result<Self, GrammarError> {
        GlrParserBuilder::new(grammar).build()
    }

    #[must_use]
    pub fn grammar(&self) -> &'g Grammar {
        self.base.grammar()
    }

    /// Errors recovered from during the last parse.
    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        self.base.errors()
    }

    /// Parse the input into a forest of every derivation.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when no head reaches acceptance.
    pub fn parse<'i>(&mut self, input: &'i str) -> Result<Forest<'g, 'i>, ParseError> {
        self.parse_named(input, None)
    }

    /// Like [`parse`](Self::parse), with a file name for error reporting.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when no head reaches acceptance.
    pub fn parse_named<'i>(
        &mut self,
        input: &'i str,
        file_name: Option<&str>,
    ) -> Result<Forest<'g, 'i>, ParseError> {
        let grammar = self.base.grammar();
        let line_index = LineIndex::new(input);
        let mut ctx = Context::new(grammar, input, file_name.map(str::to_owned));
        self.base.errors.clear();
        self.base.init_dynamic_filter();

        let mut gss = Gss::new();
        let mut sppf = Sppf::new();
        let mut pending: BTreeMap<usize, Vec<GssNodeId>> = BTreeMap::new();
        let (root, _) = gss.find_or_create(StateId(0), 0);
        pending.entry(0).or_default().push(root);

        let mut accepted: Vec<GssNodeId> = Vec::new();
        let mut dying: Vec<(GssNodeId, usize)> = Vec::new();
        let mut last_position = 0usize;
        let mut last_recovery: Option<usize> = None;

        loop {
            while let Some((batch_pos, batch)) = pending.pop_first() {
                self.process_batch(
                    input, batch_pos, batch, &mut ctx, &mut gss, &mut sppf, &mut pending,
                    &mut accepted, &mut dying, &mut last_position,
                );
            }

            if !accepted.is_empty() || matches!(self.base.recovery, ErrorRecovery::Off) {
                break;
            }
            let Some(error_pos) = dying.iter().map(|(_, p)| *p).max() else {
                break;
            };
            // Strictly forward progress between recoveries.
            if last_recovery.is_some_and(|p| error_pos <= p) {
                break;
            }
            last_recovery = Some(error_pos);

            let error =
                self.frontier_error(input, &line_index, &gss, &dying, last_position, file_name);
            let heads: Vec<GssNodeId> = dying
                .iter()
                .filter(|(_, p)| *p == error_pos)
                .map(|(n, _)| *n)
                .collect();
            dying.clear();
            let mut resumed = false;
            for head in heads {
                let state = gss.node(head).state;
                let expected = self.base.table.expected_terminals(state);
                if let Some(token) = self
                    .base
                    .scanner
                    .scan_for_expected(input, error_pos, &expected)
                {
                    let (node, created) = gss.find_or_create(state, token.start);
                    let links: SmallVec<[gss::GssLink; 2]> = gss.node(head).links.clone();
                    for link in links {
                        gss.add_link(node, link.parent, link.sppf);
                    }
                    if created {
                        pending.entry(token.start).or_default().push(node);
                    }
                    resumed = true;
                }
            }
            if resumed {
                self.base.errors.push(error);
            } else {
                break;
            }
        }

        if accepted.is_empty() {
            return Err(self.frontier_error(
                input,
                &line_index,
                &gss,
                &dying,
                last_position,
                file_name,
            ));
        }

        // Forest roots: the results under the start symbol, one link level
        // below each accepting head (whose own links carry STOP).
        let mut seen = HashSet::new();
        let mut roots = Vec::new();
        for &acc in &accepted {
            for link in &gss.node(acc).links {
                for parent_link in &gss.node(link.parent).links {
                    if seen.insert(parent_link.sppf.0) {
                        roots.push(parent_link.sppf);
                    }
                }
            }
        }
        Ok(Forest::new(grammar, sppf, roots))
    }

    #[allow(clippy::too_many_arguments)]
    fn process_batch<'i>(
        &mut self,
        input: &'i str,
        batch_pos: usize,
        batch: Vec<GssNodeId>,
        ctx: &mut Context<'g, 'i>,
        gss: &mut Gss,
        sppf: &mut Sppf<'i>,
        pending: &mut BTreeMap<usize, Vec<GssNodeId>>,
        accepted: &mut Vec<GssNodeId>,
        dying: &mut Vec<(GssNodeId, usize)>,
        last_position: &mut usize,
    ) {
        let grammar = self.base.grammar();
        let (scan_pos, layout) = self.base.skip_layout(input, batch_pos);
        *last_position = (*last_position).max(scan_pos);
        ctx.start_position = scan_pos;
        ctx.layout_content = layout;

        let mut frontier = batch;
        let mut tokens_cache: HashMap<StateId, Rc<Vec<Token<'i>>>, ahash::RandomState> =
            HashMap::default();
        let mut reduce_veto: HashMap<
            (GssNodeId, crate::grammar::ProdIndex, crate::grammar::TermIndex),
            bool,
            ahash::RandomState,
        > = HashMap::default();

        // Reduce-before-shift: iterate reductions to a fixed point over
        // the (growing) batch before any shift happens.
        let mut changed = true;
        while changed {
            changed = false;
            let mut idx = 0;
            while idx < frontier.len() {
                let node = frontier[idx];
                idx += 1;
                let state = gss.node(node).state;
                ctx.state = state;
                let tokens =
                    Self::tokens_for(&mut self.base, &mut tokens_cache, state, input, scan_pos, layout, ctx);

                for token in tokens.iter() {
                    let actions: SmallVec<[Action; 1]> =
                        SmallVec::from_slice(self.base.table.actions(state, token.terminal));
                    for action in actions {
                        let Action::Reduce(production) = action else {
                            continue;
                        };
                        let prod = grammar.production(production);
                        if prod.dynamic
                            && !self.reduce_allowed(
                                ctx,
                                &mut reduce_veto,
                                node,
                                production,
                                token,
                                state,
                            )
                        {
                            continue;
                        }

                        for path in gss.paths(node, prod.rhs.len()) {
                            let root_state = gss.node(path.root).state;
                            let Some(target_state) = self.base.table.goto(root_state, prod.symbol)
                            else {
                                continue;
                            };
                            let (start, end) = if path.children.is_empty() {
                                (scan_pos, scan_pos)
                            } else {
                                let first = sppf.span(path.children[0]).0;
                                let last =
                                    sppf.span(path.children[path.children.len() - 1]).1;
                                (first, last)
                            };
                            let result = sppf.nonterm_node(prod.symbol, start, end);
                            let packed_new =
                                sppf.add_packed(result, production, path.children.clone());
                            let (target, created) = gss.find_or_create(target_state, batch_pos);
                            if created {
                                frontier.push(target);
                            }
                            let link_new = gss.add_link(target, path.root, result);
                            changed |= created || link_new || packed_new;
                        }
                    }
                }
            }
        }

        // Shift and accept pass.
        for &node in &frontier {
            let state = gss.node(node).state;
            ctx.state = state;
            let tokens =
                Self::tokens_for(&mut self.base, &mut tokens_cache, state, input, scan_pos, layout, ctx);
            if tokens.is_empty() {
                dying.push((node, scan_pos));
                continue;
            }
            let mut alive = false;
            for token in tokens.iter() {
                let actions: SmallVec<[Action; 1]> =
                    SmallVec::from_slice(self.base.table.actions(state, token.terminal));
                for action in actions {
                    match action {
                        Action::Shift(target_state) => {
                            if grammar.terminal(token.terminal).dynamic
                                && !self.shift_allowed(ctx, token, state, target_state)
                            {
                                continue;
                            }
                            let result = sppf.term_node(token);
                            let (target, created) = gss.find_or_create(target_state, token.end());
                            gss.add_link(target, node, result);
                            if created {
                                pending.entry(token.end()).or_default().push(target);
                            }
                            alive = true;
                        }
                        Action::Accept => {
                            if token.is_stop() && !accepted.contains(&node) {
                                accepted.push(node);
                            }
                            alive = true;
                        }
                        Action::Reduce(_) => {
                            alive = true;
                        }
                    }
                }
            }
            if !alive {
                dying.push((node, scan_pos));
            }
        }
    }

    fn tokens_for<'i>(
        base: &mut Parser<'g>,
        cache: &mut HashMap<StateId, Rc<Vec<Token<'i>>>, ahash::RandomState>,
        state: StateId,
        input: &'i str,
        scan_pos: usize,
        layout: &'i str,
        ctx: &Context<'g, 'i>,
    ) -> Rc<Vec<Token<'i>>> {
        if let Some(tokens) = cache.get(&state) {
            return Rc::clone(tokens);
        }
        let mut tokens = base.recognize(state, input, scan_pos, ctx);
        for token in &mut tokens {
            token.layout_content = layout;
        }
        let tokens = Rc::new(tokens);
        cache.insert(state, Rc::clone(&tokens));
        tokens
    }

    fn reduce_allowed<'i>(
        &mut self,
        ctx: &Context<'g, 'i>,
        veto: &mut HashMap<
            (GssNodeId, crate::grammar::ProdIndex, crate::grammar::TermIndex),
            bool,
            ahash::RandomState,
        >,
        node: GssNodeId,
        production: crate::grammar::ProdIndex,
        token: &Token<'i>,
        from_state: StateId,
    ) -> bool {
        let key = (node, production, token.terminal);
        if let Some(&allowed) = veto.get(&key) {
            return allowed;
        }
        let allowed = match self.base.dynamic_filter.as_mut() {
            Some(filter) => filter(Some(&DynamicCall {
                context: ctx,
                action: DynamicAction::Reduce,
                token: Some(token),
                production: Some(production),
                from_state,
                to_state: None,
            })),
            None => true,
        };
        veto.insert(key, allowed);
        allowed
    }

    fn shift_allowed<'i>(
        &mut self,
        ctx: &Context<'g, 'i>,
        token: &Token<'i>,
        from_state: StateId,
        to_state: StateId,
    ) -> bool {
        match self.base.dynamic_filter.as_mut() {
            Some(filter) => filter(Some(&DynamicCall {
                context: ctx,
                action: DynamicAction::Shift,
                token: Some(token),
                production: None,
                from_state,
                to_state: Some(to_state),
            })),
            None => true,
        }
    }

    fn frontier_error(
        &self,
        input: &str,
        line_index: &LineIndex,
        gss: &Gss,
        dying: &[(GssNodeId, usize)],
        last_position: usize,
        file_name: Option<&str>,
    ) -> ParseError {
        let grammar = self.base.grammar();
        let error_pos = dying
            .iter()
            .map(|(_, p)| *p)
            .max()
            .unwrap_or(last_position);

        let mut symbols_expected: Vec<String> = Vec::new();
        let mut symbols_before: Vec<String> = Vec::new();
        let mut last_heads: Vec<String> = Vec::new();
        for (node, pos) in dying {
            if *pos != error_pos {
                continue;
            }
            let state = gss.node(*node).state;
            for terminal in self.base.table.expected_terminals(state) {
                let name = grammar.terminal(terminal).name.to_string();
                if !symbols_expected.contains(&name) {
                    symbols_expected.push(name);
                }
            }
            if let Some(symbol) = self.base.table.state_symbol(state) {
                let name = grammar.symbol_name(symbol).to_owned();
                if !symbols_before.contains(&name) {
                    symbols_before.push(name);
                }
            }
            last_heads.push(format!("state={}, position={pos}", state.0));
        }

        ParseError::UnexpectedInput {
            location: Location::new(file_name, error_pos, line_index),
            context: position_context(input, error_pos),
            symbols_expected,
            tokens_ahead: self.base.scanner.tokens_ahead(input, error_pos),
            symbols_before,
            last_heads,
        }
    }
}
