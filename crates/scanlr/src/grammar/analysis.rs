//! NULLABLE / FIRST / FOLLOW analysis
//!
//! All three are computed by fixed-point iteration over the grammar; the
//! lattices are finite so termination is guaranteed. `EMPTY` contributes to
//! nullability (an explicitly empty right-hand side has no symbols) but is
//! never a member of a FIRST set.

use super::{Grammar, NonTermIndex, Symbol, TermIndex};
use hashbrown::HashSet;

/// Set of terminal indices.
pub type TermSet = HashSet<TermIndex, ahash::RandomState>;

/// Grammar analysis results: nullability, FIRST and FOLLOW sets per
/// non-terminal.
#[derive(Debug)]
pub struct Analysis {
    nullable: Vec<bool>,
    first: Vec<TermSet>,
    follow: Vec<TermSet>,
}

impl Analysis {
    #[must_use]
    pub fn new(grammar: &Grammar) -> Self {
        let nullable = compute_nullable(grammar);
        let first = compute_first(grammar, &nullable);
        let follow = compute_follow(grammar, &nullable, &first);
        Self {
            nullable,
            first,
            follow,
        }
    }

    #[must_use]
    pub fn nullable(&self, nt: NonTermIndex) -> bool {
        self.nullable[nt.0]
    }

    /// Whether the whole sequence can derive the empty string.
    #[must_use]
    pub fn nullable_seq(&self, symbols: &[Symbol]) -> bool {
        symbols.iter().all(|s| match s {
            Symbol::Terminal(_) => false,
            Symbol::NonTerminal(n) => self.nullable[n.0],
        })
    }

    #[must_use]
    pub fn first(&self, nt: NonTermIndex) -> &TermSet {
        &self.first[nt.0]
    }

    #[must_use]
    pub fn follow(&self, nt: NonTermIndex) -> &TermSet {
        &self.follow[nt.0]
    }

    /// `FIRST(symbols lookahead)`: terminals that can begin a sentential
    /// form derived from `symbols`, falling through to `lookahead` when the
    /// whole sequence is nullable.
    #[must_use]
    pub fn first_of_sequence(&self, symbols: &[Symbol], lookahead: &TermSet) -> TermSet {
        let mut result = TermSet::default();
        for symbol in symbols {
            match symbol {
                Symbol::Terminal(t) => {
                    result.insert(*t);
                    return result;
                }
                Symbol::NonTerminal(n) => {
                    result.extend(self.first[n.0].iter().copied());
                    if !self.nullable[n.0] {
                        return result;
                    }
                }
            }
        }
        result.extend(lookahead.iter().copied());
        result
    }
}

fn compute_nullable(grammar: &Grammar) -> Vec<bool> {
    let mut nullable = vec![false; grammar.nonterminal_count()];
    let mut changed = true;
    while changed {
        changed = false;
        for prod in &grammar.productions {
            if nullable[prod.symbol.0] {
                continue;
            }
            let all_nullable = prod.rhs.iter().all(|s| match s {
                Symbol::Terminal(_) => false,
                Symbol::NonTerminal(n) => nullable[n.0],
            });
            if all_nullable {
                nullable[prod.symbol.0] = true;
                changed = true;
            }
        }
    }
    nullable
}

fn compute_first(grammar: &Grammar, nullable: &[bool]) -> Vec<TermSet> {
    let mut first: Vec<TermSet> = (0..grammar.nonterminal_count())
        .map(|_| TermSet::default())
        .collect();
    let mut changed = true;
    while changed {
        changed = false;
        for prod in &grammar.productions {
            let lhs = prod.symbol.0;
            for symbol in &prod.rhs {
                match symbol {
                    Symbol::Terminal(t) => {
                        changed |= first[lhs].insert(*t);
                        break;
                    }
                    Symbol::NonTerminal(n) => {
                        if *n != prod.symbol {
                            // Split borrows via index ordering.
                            let additions: Vec<TermIndex> =
                                first[n.0].difference(&first[lhs]).copied().collect();
                            if !additions.is_empty() {
                                changed = true;
                                first[lhs].extend(additions);
                            }
                        }
                        if !nullable[n.0] {
                            break;
                        }
                    }
                }
            }
        }
    }
    first
}

fn compute_follow(grammar: &Grammar, nullable: &[bool], first: &[TermSet]) -> Vec<TermSet> {
    let mut follow: Vec<TermSet> = (0..grammar.nonterminal_count())
        .map(|_| TermSet::default())
        .collect();
    follow[grammar.start.0].insert(TermIndex::STOP);
    if let Some(layout) = grammar.layout {
        // The layout sub-parser treats LAYOUT as its start symbol.
        follow[layout.0].insert(TermIndex::STOP);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for prod in &grammar.productions {
            for (idx, symbol) in prod.rhs.iter().enumerate() {
                let Symbol::NonTerminal(n) = symbol else {
                    continue;
                };
                let mut additions: Vec<TermIndex> = Vec::new();
                let mut rest_nullable = true;
                for rest in &prod.rhs[idx + 1..] {
                    match rest {
                        Symbol::Terminal(t) => {
                            additions.push(*t);
                            rest_nullable = false;
                            break;
                        }
                        Symbol::NonTerminal(m) => {
                            additions.extend(first[m.0].iter().copied());
                            if !nullable[m.0] {
                                rest_nullable = false;
                                break;
                            }
                        }
                    }
                }
                if rest_nullable && *n != prod.symbol {
                    additions.extend(follow[prod.symbol.0].iter().copied());
                }
                for t in additions {
                    changed |= follow[n.0].insert(t);
                }
            }
        }
    }
    follow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

    fn sample() -> Grammar {
        // S -> A B 'c' ; A -> 'a' | EMPTY ; B -> 'b'
        Grammar::builder()
            .rule("S", |r| r.prod(&["A", "B", "'c'"]))
            .rule("A", |r| r.prod(&["'a'"]).prod(&["EMPTY"]))
            .rule("B", |r| r.prod(&["'b'"]))
            .build()
            .unwrap()
    }

    #[test]
    fn nullable_fixed_point() {
        let grammar = sample();
        let analysis = Analysis::new(&grammar);
        let a = grammar.nonterm_by_name("A").unwrap();
        let s = grammar.nonterm_by_name("S").unwrap();
        assert!(analysis.nullable(a));
        assert!(!analysis.nullable(s));
    }

    #[test]
    fn first_sees_through_nullable_prefix() {
        let grammar = sample();
        let analysis = Analysis::new(&grammar);
        let s = grammar.nonterm_by_name("S").unwrap();
        let a_term = grammar.term_by_name("a").unwrap();
        let b_term = grammar.term_by_name("b").unwrap();
        assert!(analysis.first(s).contains(&a_term));
        assert!(analysis.first(s).contains(&b_term));
    }

    #[test]
    fn follow_of_start_contains_stop() {
        let grammar = sample();
        let analysis = Analysis::new(&grammar);
        let s = grammar.nonterm_by_name("S").unwrap();
        assert!(analysis.follow(s).contains(&TermIndex::STOP));
    }

    #[test]
    fn follow_through_nullable_sibling() {
        let grammar = sample();
        let analysis = Analysis::new(&grammar);
        let a = grammar.nonterm_by_name("A").unwrap();
        let b_term = grammar.term_by_name("b").unwrap();
        assert!(analysis.follow(a).contains(&b_term));
    }

    #[test]
    fn first_of_sequence_falls_through_to_lookahead() {
        let grammar = sample();
        let analysis = Analysis::new(&grammar);
        let a = grammar.nonterm_by_name("A").unwrap();
        let mut la = TermSet::default();
        la.insert(TermIndex::STOP);
        let seq = [Symbol::NonTerminal(a)];
        let first = analysis.first_of_sequence(&seq, &la);
        assert!(first.contains(&TermIndex::STOP));
        assert!(first.contains(&grammar.term_by_name("a").unwrap()));
    }
}
