//! # Grammar IR
//!
//! In-memory representation of context-free grammars: terminals with their
//! recognizers and disambiguation flags, non-terminals with their ordered
//! productions, and the augmented start production `S' -> S STOP`.
//!
//! A [`Grammar`] is immutable once built. Construction goes through
//! [`GrammarBuilder`], which interns literal-string terminals, resolves
//! symbol references by name and validates the IR invariants before
//! yielding the grammar. How the IR was produced (hand-written, desugared
//! from a grammar file, generated) is irrelevant to the rest of the crate.
//!
//! ## Reserved symbols
//!
//! - `STOP`: the end-of-input sentinel, terminal id 0. Appears only in the
//!   augmented production.
//! - `EMPTY`: marker for an explicitly empty right-hand side, terminal id 1.
//!   Contributes to nullability, never to FIRST, and is never recognized.
//! - `S'`: the augmented start symbol, non-terminal id 0, with the single
//!   production `S' -> S STOP` at production id 0.
//! - `LAYOUT`: optional non-terminal matched between tokens.

pub mod analysis;
pub mod builder;
pub mod validate;

pub use analysis::{Analysis, TermSet};
pub use builder::{GrammarBuilder, ProductionBuilder, RuleBuilder, TerminalBuilder};

use crate::recognizer::Recognizer;
use crate::value::Value;
use compact_str::CompactString;
use hashbrown::HashMap;
use smallvec::SmallVec;

/// Index of a terminal in the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TermIndex(pub usize);

impl TermIndex {
    /// The end-of-input sentinel.
    pub const STOP: Self = Self(0);
    /// The empty right-hand side marker.
    pub const EMPTY: Self = Self(1);
}

/// Index of a non-terminal in the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NonTermIndex(pub usize);

impl NonTermIndex {
    /// The augmented start symbol `S'`.
    pub const AUGMENTED: Self = Self(0);
}

/// Index of a production in the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ProdIndex(pub usize);

impl ProdIndex {
    /// The augmented production `S' -> S STOP`.
    pub const AUGMENTED: Self = Self(0);
}

/// A grammar symbol, terminal or non-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Symbol {
    Terminal(TermIndex),
    NonTerminal(NonTermIndex),
}

impl Symbol {
    #[must_use]
    pub const fn as_terminal(self) -> Option<TermIndex> {
        match self {
            Self::Terminal(t) => Some(t),
            Self::NonTerminal(_) => None,
        }
    }

    #[must_use]
    pub const fn as_nonterminal(self) -> Option<NonTermIndex> {
        match self {
            Self::NonTerminal(n) => Some(n),
            Self::Terminal(_) => None,
        }
    }
}

/// Default priority for terminals and productions.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Associativity of a production, used in shift/reduce resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Associativity {
    #[default]
    None,
    Left,
    Right,
}

/// A terminal symbol: identity, recognizer and lexical disambiguation data.
#[derive(Debug)]
pub struct Terminal {
    pub name: CompactString,
    pub recognizer: Recognizer,
    /// Lexical priority; higher wins during disambiguation.
    pub priority: i32,
    /// Tie-break flag consulted after priority, specificity and length.
    pub prefer: bool,
    /// Short-circuits scanning once this terminal matches.
    pub finish: bool,
    /// String match must end at a word boundary.
    pub keyword: bool,
    /// Invites the dynamic disambiguation filter on actions over this
    /// terminal.
    pub dynamic: bool,
    /// User metadata. `unexpected: false` excludes the terminal from the
    /// `tokens_ahead` listing of parse errors.
    pub meta: HashMap<CompactString, Value<'static>>,
}

impl Terminal {
    /// Whether errors may list this terminal among the tokens ahead.
    #[must_use]
    pub fn reported_as_expected(&self) -> bool {
        !matches!(self.meta.get("unexpected"), Some(Value::Bool(false)))
    }
}

/// A non-terminal symbol with its ordered productions.
#[derive(Debug)]
pub struct NonTerminal {
    pub name: CompactString,
    pub productions: Vec<ProdIndex>,
}

/// Right-hand side of a production.
pub type Rhs = SmallVec<[Symbol; 4]>;

/// A single production.
#[derive(Debug)]
pub struct Production {
    /// The non-terminal this production derives.
    pub symbol: NonTermIndex,
    pub rhs: Rhs,
    /// Production priority; higher wins during conflict resolution.
    pub priority: i32,
    pub assoc: Associativity,
    /// Invites the dynamic disambiguation filter on reductions by this
    /// production.
    pub dynamic: bool,
    /// Disables the parser-wide `prefer_shifts` policy for this production.
    pub no_prefer_shift: bool,
    /// Disables the parser-wide `prefer_shifts_over_empty` policy for this
    /// production.
    pub no_prefer_shift_over_empty: bool,
    /// Named matches: `(name, rhs index)` pairs feeding the `obj` built-in
    /// action.
    pub named: Vec<(CompactString, usize)>,
    pub meta: HashMap<CompactString, Value<'static>>,
}

impl Production {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }
}

/// An immutable context-free grammar.
///
/// Built by [`GrammarBuilder`]; see the module docs for the reserved
/// symbols every grammar contains.
#[derive(Debug)]
pub struct Grammar {
    pub(crate) terminals: Vec<Terminal>,
    pub(crate) nonterminals: Vec<NonTerminal>,
    pub(crate) productions: Vec<Production>,
    pub(crate) start: NonTermIndex,
    pub(crate) layout: Option<NonTermIndex>,
    pub(crate) term_by_name: HashMap<CompactString, TermIndex>,
    pub(crate) nonterm_by_name: HashMap<CompactString, NonTermIndex>,
}

impl Grammar {
    /// Start building a grammar.
    #[must_use]
    pub fn builder() -> GrammarBuilder {
        GrammarBuilder::new()
    }

    #[must_use]
    pub fn terminal(&self, index: TermIndex) -> &Terminal {
        &self.terminals[index.0]
    }

    #[must_use]
    pub fn nonterminal(&self, index: NonTermIndex) -> &NonTerminal {
        &self.nonterminals[index.0]
    }

    #[must_use]
    pub fn production(&self, index: ProdIndex) -> &Production {
        &self.productions[index.0]
    }

    /// Productions of a non-terminal, in declaration order.
    #[must_use]
    pub fn productions_of(&self, index: NonTermIndex) -> &[ProdIndex] {
        &self.nonterminals[index.0].productions
    }

    #[must_use]
    pub fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    #[must_use]
    pub fn nonterminal_count(&self) -> usize {
        self.nonterminals.len()
    }

    #[must_use]
    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    /// The user-declared start symbol.
    #[must_use]
    pub const fn start(&self) -> NonTermIndex {
        self.start
    }

    /// The `LAYOUT` non-terminal, if the grammar defines one.
    #[must_use]
    pub const fn layout(&self) -> Option<NonTermIndex> {
        self.layout
    }

    #[must_use]
    pub fn term_by_name(&self, name: &str) -> Option<TermIndex> {
        self.term_by_name.get(name).copied()
    }

    #[must_use]
    pub fn nonterm_by_name(&self, name: &str) -> Option<NonTermIndex> {
        self.nonterm_by_name.get(name).copied()
    }

    #[must_use]
    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        match symbol {
            Symbol::Terminal(t) => &self.terminals[t.0].name,
            Symbol::NonTerminal(n) => &self.nonterminals[n.0].name,
        }
    }

    /// Render a production as `Lhs -> rhs...`.
    #[must_use]
    pub fn production_str(&self, index: ProdIndex) -> String {
        let prod = self.production(index);
        let lhs = &self.nonterminals[prod.symbol.0].name;
        if prod.rhs.is_empty() {
            return format!("{lhs} -> EMPTY");
        }
        let rhs: Vec<&str> = prod.rhs.iter().map(|s| self.symbol_name(*s)).collect();
        format!("{lhs} -> {}", rhs.join(" "))
    }

    /// Iterate terminal indices, reserved sentinels included.
    pub fn term_indices(&self) -> impl Iterator<Item = TermIndex> {
        (0..self.terminals.len()).map(TermIndex)
    }

    /// Iterate non-terminal indices, the augmented symbol included.
    pub fn nonterm_indices(&self) -> impl Iterator<Item = NonTermIndex> {
        (0..self.nonterminals.len()).map(NonTermIndex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_symbols_are_stable() {
        let grammar = Grammar::builder()
            .terminal_str("a", "a")
            .rule("S", |r| r.prod(&["a"]))
            .build()
            .unwrap();

        assert_eq!(grammar.terminal(TermIndex::STOP).name, "STOP");
        assert_eq!(grammar.terminal(TermIndex::EMPTY).name, "EMPTY");
        assert_eq!(grammar.nonterminal(NonTermIndex::AUGMENTED).name, "S'");
        let augmented = grammar.production(ProdIndex::AUGMENTED);
        assert_eq!(augmented.rhs.len(), 2);
        assert_eq!(augmented.rhs[1], Symbol::Terminal(TermIndex::STOP));
    }

    #[test]
    fn production_rendering() {
        let grammar = Grammar::builder()
            .terminal_str("plus", "+")
            .rule("E", |r| r.prod(&["E", "plus", "E"]).prod(&["num"]))
            .terminal_regex("num", r"\d+")
            .build()
            .unwrap();

        let e = grammar.nonterm_by_name("E").unwrap();
        let prods = grammar.productions_of(e);
        assert_eq!(grammar.production_str(prods[0]), "E -> E plus E");
        assert_eq!(grammar.production_str(prods[1]), "E -> num");
    }
}
