//! Grammar invariant validation
//!
//! Runs as the last step of [`GrammarBuilder::build`]. Symbol resolution
//! and duplicate detection already happened during construction; this pass
//! checks the properties that need the whole grammar: reachability from the
//! augmented start and termination of derivations.
//!
//! [`GrammarBuilder::build`]: super::GrammarBuilder::build

use super::{Analysis, Grammar, NonTermIndex, Symbol};
use crate::error::GrammarError;
use hashbrown::HashSet;

pub(super) fn validate(grammar: &Grammar) -> Result<(), GrammarError> {
    let reachable = reachable_nonterminals(grammar);

    for (idx, prod) in grammar.productions.iter().enumerate() {
        if !reachable.contains(&prod.symbol) {
            return Err(GrammarError::UnreachableProduction {
                production: grammar.production_str(super::ProdIndex(idx)),
            });
        }
    }

    let analysis = Analysis::new(grammar);
    for nt in grammar.nonterm_indices() {
        if nt == NonTermIndex::AUGMENTED || !reachable.contains(&nt) {
            continue;
        }
        if analysis.first(nt).is_empty() && !analysis.nullable(nt) {
            return Err(GrammarError::InfiniteRecursion {
                name: grammar.nonterminal(nt).name.clone().into(),
            });
        }
    }

    Ok(())
}

fn reachable_nonterminals(grammar: &Grammar) -> HashSet<NonTermIndex, ahash::RandomState> {
    let mut reachable: HashSet<NonTermIndex, ahash::RandomState> = HashSet::default();
    let mut worklist = vec![NonTermIndex::AUGMENTED];
    if let Some(layout) = grammar.layout {
        worklist.push(layout);
    }
    for root in &worklist {
        reachable.insert(*root);
    }
    while let Some(nt) = worklist.pop() {
        for &prod in grammar.productions_of(nt) {
            for symbol in &grammar.production(prod).rhs {
                if let Symbol::NonTerminal(n) = symbol
                    && reachable.insert(*n)
                {
                    worklist.push(*n);
                }
            }
        }
    }
    reachable
}
