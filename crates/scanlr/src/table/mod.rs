//! # LR tables
//!
//! The ACTION/GOTO tables driving both parsers. A table is built once per
//! `(grammar, policies, kind)` and is immutable afterwards; with the
//! `serialize` feature it can be snapshotted to JSON and reloaded
//! behaviorally identical.
//!
//! ACTION cells hold a *list* of actions. After static conflict resolution
//! the deterministic LR driver refuses tables where any list is longer than
//! one; the GLR driver forks on them instead.

mod builder;
mod item;

use crate::error::GrammarError;
use crate::grammar::{Grammar, NonTermIndex, ProdIndex, Symbol, TermIndex};
use smallvec::SmallVec;

/// Index of an automaton state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StateId(pub usize);

/// A parse action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    Shift(StateId),
    Reduce(ProdIndex),
    Accept,
}

/// Which item sets the constructor builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TableKind {
    /// LR(0) items with FOLLOW-set reduce rows.
    Slr,
    /// LR(1) items with state merging by core (the default).
    #[default]
    Lalr,
}

/// Policies baked into a table.
#[derive(Debug, Clone, Copy)]
pub struct TableConfig {
    pub kind: TableKind,
    pub prefer_shifts: bool,
    pub prefer_shifts_over_empty: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            kind: TableKind::Lalr,
            prefer_shifts: true,
            prefer_shifts_over_empty: true,
        }
    }
}

/// One ACTION cell: the terminal, its scan-stop flag and the resolved
/// actions.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionRow {
    pub terminal: TermIndex,
    /// Scanning may stop once this terminal matches.
    pub finish: bool,
    pub actions: SmallVec<[Action; 1]>,
}

/// A single automaton state.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TableState {
    /// ACTION rows in scanning order.
    pub actions: Vec<ActionRow>,
    pub gotos: Vec<(NonTermIndex, StateId)>,
    /// Symbol shifted/gone-to into this state; `None` for state 0.
    pub symbol: Option<Symbol>,
}

/// ACTION/GOTO tables plus the policies they were resolved under.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LrTable {
    kind: TableKind,
    prefer_shifts: bool,
    prefer_shifts_over_empty: bool,
    start: NonTermIndex,
    states: Vec<TableState>,
}

impl LrTable {
    /// Build the table for the grammar's start symbol.
    #[must_use]
    pub fn build(grammar: &Grammar, config: TableConfig) -> Self {
        builder::build(grammar, grammar.start(), config)
    }

    /// Build a table that starts from an arbitrary non-terminal. Used for
    /// the nested layout parser.
    #[must_use]
    pub fn build_for_start(grammar: &Grammar, start: NonTermIndex, config: TableConfig) -> Self {
        builder::build(grammar, start, config)
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub const fn kind(&self) -> TableKind {
        self.kind
    }

    #[must_use]
    pub const fn start(&self) -> NonTermIndex {
        self.start
    }

    /// ACTION rows of a state, in scanning order.
    #[must_use]
    pub fn rows(&self, state: StateId) -> &[ActionRow] {
        &self.states[state.0].actions
    }

    /// Actions under a terminal, empty when none apply.
    #[must_use]
    pub fn actions(&self, state: StateId, terminal: TermIndex) -> &[Action] {
        self.states[state.0]
            .actions
            .iter()
            .find(|row| row.terminal == terminal)
            .map_or(&[], |row| &row.actions)
    }

    #[must_use]
    pub fn goto(&self, state: StateId, nt: NonTermIndex) -> Option<StateId> {
        self.states[state.0]
            .gotos
            .iter()
            .find(|(n, _)| *n == nt)
            .map(|(_, s)| *s)
    }

    /// Symbol that was shifted or gone-to when entering the state.
    #[must_use]
    pub fn state_symbol(&self, state: StateId) -> Option<Symbol> {
        self.states[state.0].symbol
    }

    /// Terminals with at least one action in the state.
    #[must_use]
    pub fn expected_terminals(&self, state: StateId) -> Vec<TermIndex> {
        self.states[state.0]
            .actions
            .iter()
            .map(|row| row.terminal)
            .collect()
    }

    /// Remaining conflicts after static resolution.
    #[must_use]
    pub fn conflicts(&self) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        for (id, state) in self.states.iter().enumerate() {
            for row in &state.actions {
                if row.actions.len() <= 1 {
                    continue;
                }
                let kind = if row.actions.iter().any(|a| matches!(a, Action::Shift(_))) {
                    ConflictKind::ShiftReduce
                } else {
                    ConflictKind::ReduceReduce
                };
                conflicts.push(Conflict {
                    state: StateId(id),
                    terminal: row.terminal,
                    productions: row
                        .actions
                        .iter()
                        .filter_map(|a| match a {
                            Action::Reduce(p) => Some(*p),
                            _ => None,
                        })
                        .collect(),
                    kind,
                });
            }
        }
        conflicts
    }

    /// Verify the table is deterministic, as the LR driver requires.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::UnresolvedConflicts`] describing every ACTION
    /// cell that still holds more than one action.
    pub fn check_deterministic(&self, grammar: &Grammar) -> Result<(), GrammarError> {
        let conflicts = self.conflicts();
        if conflicts.is_empty() {
            return Ok(());
        }
        let details = conflicts
            .iter()
            .map(|c| c.describe(grammar))
            .collect::<Vec<_>>()
            .join("\n");
        Err(GrammarError::UnresolvedConflicts {
            count: conflicts.len(),
            details,
        })
    }

    /// Serialize the table to JSON.
    ///
    /// # Errors
    ///
    /// Propagates the underlying serialization failure.
    #[cfg(feature = "serialize")]
    pub fn snapshot(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Reload a table from [`snapshot`](Self::snapshot) output.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::InvalidSnapshot`] when the payload does not
    /// decode.
    #[cfg(feature = "serialize")]
    pub fn from_snapshot(snapshot: &str) -> Result<Self, GrammarError> {
        serde_json::from_str(snapshot).map_err(|err| GrammarError::InvalidSnapshot {
            message: err.to_string(),
        })
    }
}

/// Conflict kinds reported by [`LrTable::conflicts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

/// An ACTION cell that kept more than one action.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub state: StateId,
    pub terminal: TermIndex,
    pub productions: Vec<ProdIndex>,
    pub kind: ConflictKind,
}

impl Conflict {
    /// Human-readable one-line description.
    #[must_use]
    pub fn describe(&self, grammar: &Grammar) -> String {
        let prods = self
            .productions
            .iter()
            .map(|p| format!("'{}'", grammar.production_str(*p)))
            .collect::<Vec<_>>()
            .join(" or ");
        match self.kind {
            ConflictKind::ShiftReduce => format!(
                "state {} on '{}': shift or reduce by {prods}",
                self.state.0,
                grammar.terminal(self.terminal).name
            ),
            ConflictKind::ReduceReduce => format!(
                "state {} on '{}': reduce by {prods}",
                self.state.0,
                grammar.terminal(self.terminal).name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

    fn expr_grammar(with_priorities: bool) -> Grammar {
        // E -> E + E | E * E | num
        let builder = Grammar::builder().terminal_regex("num", r"\d+");
        let builder = if with_priorities {
            builder.rule("E", |r| {
                r.prod_with(&["E", "'+'", "E"], |p| p.priority(5).assoc_left())
                    .prod_with(&["E", "'*'", "E"], |p| p.priority(6).assoc_left())
                    .prod(&["num"])
            })
        } else {
            builder.rule("E", |r| {
                r.prod_with(&["E", "'+'", "E"], |p| p.no_prefer_shift())
                    .prod_with(&["E", "'*'", "E"], |p| p.no_prefer_shift())
                    .prod(&["num"])
            })
        };
        builder.build().unwrap()
    }

    #[test]
    fn priorities_and_assoc_make_expression_grammar_deterministic() {
        let grammar = expr_grammar(true);
        let table = LrTable::build(&grammar, TableConfig::default());
        assert!(table.conflicts().is_empty());
        assert!(table.check_deterministic(&grammar).is_ok());
    }

    #[test]
    fn bare_expression_grammar_keeps_conflicts_for_glr() {
        let grammar = expr_grammar(false);
        let table = LrTable::build(
            &grammar,
            TableConfig {
                prefer_shifts: false,
                prefer_shifts_over_empty: false,
                ..TableConfig::default()
            },
        );
        let conflicts = table.conflicts();
        assert!(!conflicts.is_empty());
        assert!(table.check_deterministic(&grammar).is_err());
        assert!(conflicts
            .iter()
            .all(|c| c.kind == ConflictKind::ShiftReduce));
    }

    #[test]
    fn no_prefer_shift_opt_out_keeps_conflicts_under_the_policy() {
        let grammar = expr_grammar(false);
        let table = LrTable::build(&grammar, TableConfig::default());
        assert!(!table.conflicts().is_empty());
    }

    #[test]
    fn accept_appears_only_under_stop() {
        let grammar = expr_grammar(true);
        let table = LrTable::build(&grammar, TableConfig::default());
        for state in 0..table.state_count() {
            for row in table.rows(StateId(state)) {
                if row.actions.contains(&Action::Accept) {
                    assert_eq!(row.terminal, TermIndex::STOP);
                }
            }
        }
    }

    #[test]
    fn every_table_symbol_exists_in_the_grammar() {
        let grammar = expr_grammar(true);
        let table = LrTable::build(&grammar, TableConfig::default());
        for state in 0..table.state_count() {
            let id = StateId(state);
            for row in table.rows(id) {
                assert!(row.terminal.0 < grammar.terminal_count());
                for action in &row.actions {
                    if let Action::Reduce(p) = action {
                        assert!(p.0 < grammar.production_count());
                    }
                }
            }
        }
    }

    #[test]
    fn slr_and_lalr_agree_on_simple_grammar() {
        let grammar = Grammar::builder()
            .terminal_regex("id", r"[a-z]+")
            .rule("S", |r| r.prod(&["id", "'='", "id"]))
            .build()
            .unwrap();
        let lalr = LrTable::build(
            &grammar,
            TableConfig {
                kind: TableKind::Lalr,
                ..TableConfig::default()
            },
        );
        let slr = LrTable::build(
            &grammar,
            TableConfig {
                kind: TableKind::Slr,
                ..TableConfig::default()
            },
        );
        assert!(lalr.conflicts().is_empty());
        assert!(slr.conflicts().is_empty());
        assert_eq!(lalr.state_count(), slr.state_count());
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn snapshot_round_trips() {
        let grammar = expr_grammar(true);
        let table = LrTable::build(&grammar, TableConfig::default());
        let snapshot = table.snapshot().unwrap();
        let reloaded = LrTable::from_snapshot(&snapshot).unwrap();
        assert_eq!(reloaded.state_count(), table.state_count());
        for state in 0..table.state_count() {
            let id = StateId(state);
            for (a, b) in table.rows(id).iter().zip(reloaded.rows(id)) {
                assert_eq!(a.terminal, b.terminal);
                assert_eq!(a.actions, b.actions);
            }
        }
    }
}
