//! ACTION/GOTO table construction
//!
//! Builds the canonical collection of item sets with LALR-style merging,
//! then emits and statically resolves the ACTION/GOTO tables. The driver
//! policies (`prefer_shifts`, `prefer_shifts_over_empty`) take part in
//! resolution, so the table is a pure function of
//! `(grammar, policies, kind)`.

use super::item::{closure, successor_kernels, ItemKind, ItemSet, LrItem, ProdView};
use super::{Action, ActionRow, LrTable, StateId, TableConfig, TableKind, TableState};
use crate::grammar::{
    Analysis, Associativity, Grammar, NonTermIndex, ProdIndex, Symbol, TermIndex, TermSet,
};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::collections::VecDeque;

pub(super) fn build(grammar: &Grammar, start: NonTermIndex, config: TableConfig) -> LrTable {
    let analysis = Analysis::new(grammar);
    let view = ProdView::new(grammar, start);
    let item_kind = match config.kind {
        TableKind::Slr => ItemKind::Lr0,
        TableKind::Lalr => ItemKind::Lr1,
    };

    let mut states: Vec<ItemSet> = vec![ItemSet::new(
        vec![LrItem::new(ProdIndex::AUGMENTED, 0, TermSet::default())],
        None,
    )];
    let mut queue: VecDeque<usize> = VecDeque::from([0]);

    while let Some(current) = queue.pop_front() {
        closure(&mut states[current], &view, &analysis, item_kind);

        for (symbol, kernel) in successor_kernels(&states[current], &view) {
            let target = match find_state(&states, &kernel) {
                Some(existing) => {
                    let merged = match config.kind {
                        TableKind::Slr => true,
                        TableKind::Lalr => try_merge(&mut states[existing], &kernel, &view),
                    };
                    if merged {
                        existing
                    } else {
                        push_state(&mut states, &mut queue, kernel, symbol)
                    }
                }
                None => push_state(&mut states, &mut queue, kernel, symbol),
            };
            states[current].transitions.push((symbol, target));
        }
    }

    if config.kind == TableKind::Lalr {
        propagate_lookaheads(&mut states, &view, &analysis);
    }

    emit(grammar, &view, &analysis, &states, config, start)
}

fn push_state(
    states: &mut Vec<ItemSet>,
    queue: &mut VecDeque<usize>,
    kernel: Vec<LrItem>,
    symbol: Symbol,
) -> usize {
    let id = states.len();
    states.push(ItemSet::new(kernel, Some(symbol)));
    queue.push_back(id);
    id
}

fn find_state(states: &[ItemSet], kernel: &[LrItem]) -> Option<usize> {
    states.iter().position(|s| s.same_kernel(kernel))
}

/// Merge a candidate kernel into an existing state with the same cores.
///
/// The merge is rejected (returns `false`) when unioning lookaheads would
/// manufacture a reduce/reduce conflict that existed in neither input: for
/// some completed kernel item, the lookaheads the merge would add intersect
/// the lookahead of another completed item.
fn try_merge(state: &mut ItemSet, kernel: &[LrItem], view: &ProdView<'_>) -> bool {
    let at_end = |item: &LrItem| view.rhs(item.production).len() == item.dot;

    for incoming in kernel.iter().filter(|i| at_end(i)) {
        let Some(idx) = state.find_item(incoming.core()) else {
            return false;
        };
        let added: Vec<TermIndex> = incoming
            .follow
            .difference(&state.items[idx].follow)
            .copied()
            .collect();
        if added.is_empty() {
            continue;
        }
        for (other_idx, other) in state.kernel().iter().enumerate() {
            if other_idx == idx || !at_end(other) {
                continue;
            }
            if added.iter().any(|t| other.follow.contains(t)) {
                return false;
            }
        }
    }

    for incoming in kernel {
        if let Some(idx) = state.find_item(incoming.core()) {
            state.items[idx]
                .follow
                .extend(incoming.follow.iter().copied());
        }
    }
    true
}

/// Propagate lookaheads across transitions until stable.
///
/// LALR merging may update lookaheads of states whose successors were
/// already built; refreshing every closure and pushing kernel lookaheads
/// forward to a fixed point restores consistency.
fn propagate_lookaheads(states: &mut [ItemSet], view: &ProdView<'_>, analysis: &Analysis) {
    let mut update = true;
    while update {
        update = false;
        for source in 0..states.len() {
            closure(&mut states[source], view, analysis, ItemKind::Lr1);

            let transitions = states[source].transitions.clone();
            for (_, target) in transitions {
                let mut additions: Vec<(usize, Vec<TermIndex>)> = Vec::new();
                for (k_idx, kernel_item) in states[target].kernel().iter().enumerate() {
                    if kernel_item.dot == 0 {
                        continue;
                    }
                    let source_core = (kernel_item.production, kernel_item.dot - 1);
                    if let Some(s_idx) = states[source].find_item(source_core) {
                        let new_terms: Vec<TermIndex> = states[source].items[s_idx]
                            .follow
                            .difference(&kernel_item.follow)
                            .copied()
                            .collect();
                        if !new_terms.is_empty() {
                            additions.push((k_idx, new_terms));
                        }
                    }
                }
                for (k_idx, terms) in additions {
                    update = true;
                    states[target].items[k_idx].follow.extend(terms);
                }
            }
        }
    }
}

fn emit(
    grammar: &Grammar,
    view: &ProdView<'_>,
    analysis: &Analysis,
    states: &[ItemSet],
    config: TableConfig,
    start: NonTermIndex,
) -> LrTable {
    let mut table_states = Vec::with_capacity(states.len());

    for state in states {
        // Highest production priority per shift terminal, consulted when a
        // reduce competes with that shift.
        let mut max_shift_prior: HashMap<TermIndex, i32, ahash::RandomState> = HashMap::default();
        for item in &state.items {
            if let Some(Symbol::Terminal(t)) = view.rhs(item.production).get(item.dot) {
                let prior = grammar.production(item.production).priority;
                max_shift_prior
                    .entry(*t)
                    .and_modify(|p| *p = (*p).max(prior))
                    .or_insert(prior);
            }
        }

        let mut rows: Vec<(TermIndex, SmallVec<[Action; 1]>)> = Vec::new();
        let mut gotos: Vec<(NonTermIndex, StateId)> = Vec::new();

        for (symbol, target) in &state.transitions {
            match symbol {
                Symbol::NonTerminal(n) => gotos.push((*n, StateId(*target))),
                Symbol::Terminal(t) => {
                    rows.push((*t, SmallVec::from_elem(Action::Shift(StateId(*target)), 1)));
                }
            }
        }

        for item in &state.items {
            if view.rhs(item.production).len() != item.dot {
                continue;
            }
            if item.production == ProdIndex::AUGMENTED {
                // Accepting state: the augmented item is complete only after
                // STOP was shifted.
                insert_action(&mut rows, TermIndex::STOP, Action::Accept);
                continue;
            }
            let lookahead: Vec<TermIndex> = match config.kind {
                TableKind::Lalr => item.follow.iter().copied().collect(),
                TableKind::Slr => analysis
                    .follow(view.lhs(item.production))
                    .iter()
                    .copied()
                    .collect(),
            };
            for t in lookahead {
                insert_reduce(grammar, &mut rows, &max_shift_prior, config, t, item.production);
            }
        }

        sort_for_scanning(grammar, &mut rows);
        let finish = finish_flags(grammar, &rows);
        let actions = rows
            .into_iter()
            .zip(finish)
            .map(|((terminal, actions), finish)| ActionRow {
                terminal,
                finish,
                actions,
            })
            .collect();

        table_states.push(TableState {
            actions,
            gotos,
            symbol: state.symbol,
        });
    }

    LrTable {
        kind: config.kind,
        prefer_shifts: config.prefer_shifts,
        prefer_shifts_over_empty: config.prefer_shifts_over_empty,
        start,
        states: table_states,
    }
}

fn insert_action(rows: &mut Vec<(TermIndex, SmallVec<[Action; 1]>)>, t: TermIndex, action: Action) {
    match rows.iter_mut().find(|(term, _)| *term == t) {
        Some((_, actions)) => {
            if !actions.contains(&action) {
                actions.push(action);
            }
        }
        None => rows.push((t, SmallVec::from_elem(action, 1))),
    }
}

/// Place a reduce under `t`, resolving conflicts in the declarative order:
/// priority, associativity, `prefer_shifts` (honoring the production's
/// opt-out), `prefer_shifts_over_empty` (likewise). Whatever survives stays
/// in the list; the GLR driver forks on it.
fn insert_reduce(
    grammar: &Grammar,
    rows: &mut Vec<(TermIndex, SmallVec<[Action; 1]>)>,
    max_shift_prior: &HashMap<TermIndex, i32, ahash::RandomState>,
    config: TableConfig,
    t: TermIndex,
    production: ProdIndex,
) {
    let prod = grammar.production(production);
    let Some((_, actions)) = rows.iter_mut().find(|(term, _)| *term == t) else {
        rows.push((t, SmallVec::from_elem(Action::Reduce(production), 1)));
        return;
    };

    let mut keep_reduce = true;
    if let Some(shift_at) = actions.iter().position(|a| matches!(a, Action::Shift(_))) {
        let shift_prior = max_shift_prior.get(&t).copied().unwrap_or_default();
        match prod.priority.cmp(&shift_prior) {
            std::cmp::Ordering::Greater => {
                actions.remove(shift_at);
            }
            std::cmp::Ordering::Less => keep_reduce = false,
            std::cmp::Ordering::Equal => match prod.assoc {
                Associativity::Left => {
                    actions.remove(shift_at);
                }
                Associativity::Right => keep_reduce = false,
                Associativity::None => {
                    let empty = prod.rhs.is_empty();
                    if empty {
                        if config.prefer_shifts_over_empty && !prod.no_prefer_shift_over_empty {
                            keep_reduce = false;
                        }
                    } else if config.prefer_shifts && !prod.no_prefer_shift {
                        keep_reduce = false;
                    }
                }
            },
        }
    }
    if !keep_reduce {
        return;
    }

    let reduce_priors: Vec<i32> = actions
        .iter()
        .filter_map(|a| match a {
            Action::Reduce(p) => Some(grammar.production(*p).priority),
            _ => None,
        })
        .collect();
    if let Some(&existing_prior) = reduce_priors.first() {
        match prod.priority.cmp(&existing_prior) {
            std::cmp::Ordering::Greater => {
                actions.retain(|a| !matches!(a, Action::Reduce(_)));
                actions.push(Action::Reduce(production));
            }
            std::cmp::Ordering::Equal => {
                if !actions.contains(&Action::Reduce(production)) {
                    actions.push(Action::Reduce(production));
                }
            }
            std::cmp::Ordering::Less => {}
        }
    } else {
        actions.push(Action::Reduce(production));
    }
}

/// Scanning order: priority first, then literal strings over other
/// recognizers, longer literals first.
fn sort_for_scanning(grammar: &Grammar, rows: &mut [(TermIndex, SmallVec<[Action; 1]>)]) {
    rows.sort_by(|(a, _), (b, _)| {
        let ta = grammar.terminal(*a);
        let tb = grammar.terminal(*b);
        tb.priority
            .cmp(&ta.priority)
            .then_with(|| tb.recognizer.is_string().cmp(&ta.recognizer.is_string()))
            .then_with(|| tb.recognizer.specificity().cmp(&ta.recognizer.specificity()))
    });
}

/// A terminal's flag is set when a match at that terminal makes trying the
/// rest pointless: the terminal is explicitly `finish`, every later
/// terminal has strictly lower priority, or the terminal is a literal
/// string (which wins over anything sorted after it).
fn finish_flags(grammar: &Grammar, rows: &[(TermIndex, SmallVec<[Action; 1]>)]) -> Vec<bool> {
    let mut flags = Vec::with_capacity(rows.len());
    let mut later_priority: Option<i32> = None;
    for (term, _) in rows.iter().rev() {
        let terminal = grammar.terminal(*term);
        flags.push(
            terminal.finish
                || later_priority.is_some_and(|p| terminal.priority > p)
                || terminal.recognizer.is_string(),
        );
        later_priority = Some(terminal.priority);
    }
    flags.reverse();
    flags
}
