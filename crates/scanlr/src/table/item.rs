//! LR items and item sets
//!
//! An [`LrItem`] is a production with a dot position and a lookahead set.
//! Item identity is the `(production, dot)` core; lookaheads are unioned in
//! place as construction and LALR merging progress. SLR construction uses
//! the same type with empty lookahead sets (LR(0) items).

use crate::grammar::{Analysis, Grammar, NonTermIndex, ProdIndex, Symbol, TermIndex, TermSet};
use smallvec::SmallVec;

/// A production with a parse position and a lookahead set.
#[derive(Debug, Clone)]
pub(crate) struct LrItem {
    pub production: ProdIndex,
    pub dot: usize,
    pub follow: TermSet,
}

impl LrItem {
    pub(crate) fn new(production: ProdIndex, dot: usize, follow: TermSet) -> Self {
        Self {
            production,
            dot,
            follow,
        }
    }

    pub(crate) const fn core(&self) -> (ProdIndex, usize) {
        (self.production, self.dot)
    }
}

/// Resolves production right-hand sides during table construction.
///
/// The augmented production is viewed as `S' -> start STOP` where `start`
/// is the table's start symbol; this lets the layout sub-parser reuse the
/// grammar with `LAYOUT` as its start without touching the IR.
pub(crate) struct ProdView<'g> {
    grammar: &'g Grammar,
    augmented_rhs: [Symbol; 2],
}

impl<'g> ProdView<'g> {
    pub(crate) fn new(grammar: &'g Grammar, start: NonTermIndex) -> Self {
        Self {
            grammar,
            augmented_rhs: [
                Symbol::NonTerminal(start),
                Symbol::Terminal(TermIndex::STOP),
            ],
        }
    }

    pub(crate) fn rhs(&self, production: ProdIndex) -> &[Symbol] {
        if production == ProdIndex::AUGMENTED {
            &self.augmented_rhs
        } else {
            &self.grammar.production(production).rhs
        }
    }

    pub(crate) fn lhs(&self, production: ProdIndex) -> NonTermIndex {
        self.grammar.production(production).symbol
    }

    pub(crate) const fn grammar(&self) -> &'g Grammar {
        self.grammar
    }
}

/// A state of the automaton under construction: a set of items closed under
/// the closure rule, plus its discovered transitions.
#[derive(Debug)]
pub(crate) struct ItemSet {
    /// Items; the first `kernel_len` are kernel items.
    pub items: Vec<LrItem>,
    pub kernel_len: usize,
    /// Symbol this state was reached over. `None` only for state 0.
    pub symbol: Option<Symbol>,
    /// Transitions in discovery order.
    pub transitions: Vec<(Symbol, usize)>,
}

impl ItemSet {
    pub(crate) fn new(kernel: Vec<LrItem>, symbol: Option<Symbol>) -> Self {
        let kernel_len = kernel.len();
        Self {
            items: kernel,
            kernel_len,
            symbol,
            transitions: Vec::new(),
        }
    }

    pub(crate) fn kernel(&self) -> &[LrItem] {
        &self.items[..self.kernel_len]
    }

    pub(crate) fn find_item(&self, core: (ProdIndex, usize)) -> Option<usize> {
        self.items.iter().position(|i| i.core() == core)
    }

    /// Two states are the same automaton node iff their kernel cores are
    /// identical.
    pub(crate) fn same_kernel(&self, other_kernel: &[LrItem]) -> bool {
        if self.kernel_len != other_kernel.len() {
            return false;
        }
        other_kernel
            .iter()
            .all(|item| self.kernel().iter().any(|k| k.core() == item.core()))
    }

    pub(crate) fn target(&self, symbol: Symbol) -> Option<usize> {
        self.transitions
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, id)| *id)
    }
}

/// Whether LR(1) lookaheads are tracked during closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemKind {
    Lr0,
    Lr1,
}

/// Close the item set in place.
///
/// For every item `A -> alpha . B beta, la` and production `B -> gamma`,
/// adds `B -> . gamma` with lookahead `FIRST(beta la)` (LR(1)) or an empty
/// lookahead (LR(0)). Iterates until no item or lookahead changes, so it
/// also serves as the refresh step of LALR lookahead propagation.
pub(crate) fn closure(set: &mut ItemSet, view: &ProdView<'_>, analysis: &Analysis, kind: ItemKind) {
    let mut changed = true;
    while changed {
        changed = false;
        let mut idx = 0;
        while idx < set.items.len() {
            let item = &set.items[idx];
            let rhs = view.rhs(item.production);
            let Some(Symbol::NonTerminal(nt)) = rhs.get(item.dot).copied() else {
                idx += 1;
                continue;
            };

            let lookahead = match kind {
                ItemKind::Lr0 => TermSet::default(),
                ItemKind::Lr1 => analysis.first_of_sequence(&rhs[item.dot + 1..], &item.follow),
            };

            // SmallVec keeps borrow of `set.items` short.
            let productions: SmallVec<[ProdIndex; 8]> =
                SmallVec::from_slice(view.grammar().productions_of(nt));
            for production in productions {
                if let Some(existing) = set.find_item((production, 0)) {
                    for t in &lookahead {
                        changed |= set.items[existing].follow.insert(*t);
                    }
                } else {
                    set.items
                        .push(LrItem::new(production, 0, lookahead.clone()));
                    changed = true;
                }
            }
            idx += 1;
        }
    }
}

/// Group the items of a closed set by the symbol after the dot, in item
/// order, and return the advanced kernels of the successor states.
pub(crate) fn successor_kernels(set: &ItemSet, view: &ProdView<'_>) -> Vec<(Symbol, Vec<LrItem>)> {
    let mut groups: Vec<(Symbol, Vec<LrItem>)> = Vec::new();
    for item in &set.items {
        let rhs = view.rhs(item.production);
        let Some(symbol) = rhs.get(item.dot).copied() else {
            continue;
        };
        let advanced = LrItem::new(item.production, item.dot + 1, item.follow.clone());
        match groups.iter_mut().find(|(s, _)| *s == symbol) {
            Some((_, items)) => {
                if let Some(existing) = items.iter_mut().find(|i| i.core() == advanced.core()) {
                    existing.follow.extend(advanced.follow.iter().copied());
                } else {
                    items.push(advanced);
                }
            }
            None => groups.push((symbol, vec![advanced])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

    fn grammar() -> Grammar {
        Grammar::builder()
            .rule("S", |r| r.prod(&["A", "'b'"]))
            .rule("A", |r| r.prod(&["'a'"]).prod(&["EMPTY"]))
            .build()
            .unwrap()
    }

    #[test]
    fn closure_adds_child_items_with_lookaheads() {
        let grammar = grammar();
        let analysis = Analysis::new(&grammar);
        let view = ProdView::new(&grammar, grammar.start());

        let mut state = ItemSet::new(
            vec![LrItem::new(ProdIndex::AUGMENTED, 0, TermSet::default())],
            None,
        );
        closure(&mut state, &view, &analysis, ItemKind::Lr1);

        // Kernel + S -> . A 'b' + two A productions.
        assert_eq!(state.items.len(), 4);
        let a = grammar.nonterm_by_name("A").unwrap();
        let a_prods = grammar.productions_of(a);
        let b_term = grammar.term_by_name("b").unwrap();
        let item = &state.items[state.find_item((a_prods[1], 0)).unwrap()];
        // A -> . (empty) is reduced on FIRST of what follows A in S.
        assert!(item.follow.contains(&b_term));
    }

    #[test]
    fn successors_group_by_next_symbol() {
        let grammar = grammar();
        let analysis = Analysis::new(&grammar);
        let view = ProdView::new(&grammar, grammar.start());

        let mut state = ItemSet::new(
            vec![LrItem::new(ProdIndex::AUGMENTED, 0, TermSet::default())],
            None,
        );
        closure(&mut state, &view, &analysis, ItemKind::Lr1);
        let successors = successor_kernels(&state, &view);

        // S, A and 'a' all appear after a dot.
        assert_eq!(successors.len(), 3);
        for (_, kernel) in &successors {
            assert!(kernel.iter().all(|i| i.dot == 1));
        }
    }
}
