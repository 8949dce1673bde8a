//! Shared packed parse forest (SPPF)
//!
//! The GLR driver records every derivation in one DAG. Non-terminal nodes
//! are unified by `(symbol, start, end)`; a node holds one *packed
//! alternative* per derivation of that span, so a node with more than one
//! alternative is an ambiguity. Adding an alternative that already exists
//! (same production, same children) is a no-op.
//!
//! Trees are lazy views over the forest: enumeration by index decodes a
//! mixed-radix number over the ambiguity degrees in left-to-right,
//! top-down order, and child views are produced on demand without copying
//! forest data.

use crate::grammar::{Grammar, NonTermIndex, ProdIndex, Symbol, TermIndex};
use crate::token::Token;
use crate::tree::TreeNode;
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use std::any::Any;
use std::rc::Rc;
use thiserror::Error;

/// Index of a node in the forest arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SppfId(pub(crate) usize);

/// One derivation of a non-terminal node's span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PackedAlternative {
    pub production: ProdIndex,
    pub children: SmallVec<[SppfId; 4]>,
}

pub(crate) enum SppfNode<'i> {
    Term {
        terminal: TermIndex,
        start: usize,
        end: usize,
        value: &'i str,
        layout_content: &'i str,
        additional_data: Option<Rc<dyn Any>>,
    },
    NonTerm {
        symbol: NonTermIndex,
        start: usize,
        end: usize,
        packed: Vec<PackedAlternative>,
    },
}

/// Arena of SPPF nodes with unification maps.
pub(crate) struct Sppf<'i> {
    nodes: Vec<SppfNode<'i>>,
    term_index: HashMap<(TermIndex, usize), SppfId, ahash::RandomState>,
    nonterm_index: HashMap<(NonTermIndex, usize, usize), SppfId, ahash::RandomState>,
}

impl<'i> Sppf<'i> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            term_index: HashMap::default(),
            nonterm_index: HashMap::default(),
        }
    }

    pub(crate) fn node(&self, id: SppfId) -> &SppfNode<'i> {
        &self.nodes[id.0]
    }

    /// Terminal nodes are shared per `(terminal, start)`.
    pub(crate) fn term_node(&mut self, token: &Token<'i>) -> SppfId {
        let key = (token.terminal, token.start);
        if let Some(&id) = self.term_index.get(&key) {
            return id;
        }
        let id = SppfId(self.nodes.len());
        self.nodes.push(SppfNode::Term {
            terminal: token.terminal,
            start: token.start,
            end: token.end(),
            value: token.value,
            layout_content: token.layout_content,
            additional_data: token.additional_data.clone(),
        });
        self.term_index.insert(key, id);
        id
    }

    /// Find or create the non-terminal node for a span.
    pub(crate) fn nonterm_node(&mut self, symbol: NonTermIndex, start: usize, end: usize) -> SppfId {
        let key = (symbol, start, end);
        if let Some(&id) = self.nonterm_index.get(&key) {
            return id;
        }
        let id = SppfId(self.nodes.len());
        self.nodes.push(SppfNode::NonTerm {
            symbol,
            start,
            end,
            packed: Vec::new(),
        });
        self.nonterm_index.insert(key, id);
        id
    }

    /// Add a derivation to a non-terminal node. Returns `false` when an
    /// identical alternative is already present.
    pub(crate) fn add_packed(
        &mut self,
        id: SppfId,
        production: ProdIndex,
        children: SmallVec<[SppfId; 4]>,
    ) -> bool {
        let SppfNode::NonTerm { packed, .. } = &mut self.nodes[id.0] else {
            return false;
        };
        let alternative = PackedAlternative {
            production,
            children,
        };
        if packed.contains(&alternative) {
            return false;
        }
        packed.push(alternative);
        true
    }

    /// `(start, end)` of any node.
    pub(crate) fn span(&self, id: SppfId) -> (usize, usize) {
        match self.node(id) {
            SppfNode::Term { start, end, .. } | SppfNode::NonTerm { start, end, .. } => {
                (*start, *end)
            }
        }
    }

    fn children_of(&self, id: SppfId, alternative: usize) -> &[SppfId] {
        match self.node(id) {
            SppfNode::Term { .. } => &[],
            SppfNode::NonTerm { packed, .. } => {
                packed.get(alternative).map_or(&[], |alt| &alt.children)
            }
        }
    }
}

/// The forest of accepted parses.
///
/// Indexing yields lazy [`Tree`] views; `solutions` is the number of
/// distinct trees encoded. Trees and the forest borrow the parsed input
/// and must not outlive it.
pub struct Forest<'g, 'i> {
    grammar: &'g Grammar,
    sppf: Sppf<'i>,
    roots: Vec<SppfId>,
    /// Trees per node, present only when the forest is finite.
    node_solutions: Option<Vec<usize>>,
    ambiguities: usize,
}

impl std::fmt::Debug for Forest<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forest")
            .field("roots", &self.roots)
            .field("node_solutions", &self.node_solutions)
            .field("ambiguities", &self.ambiguities)
            .finish_non_exhaustive()
    }
}

impl<'g, 'i> Forest<'g, 'i> {
    pub(crate) fn new(grammar: &'g Grammar, sppf: Sppf<'i>, roots: Vec<SppfId>) -> Self {
        let node_solutions = compute_solutions(&sppf, &roots);
        let ambiguities = count_ambiguities(&sppf, &roots);
        Self {
            grammar,
            sppf,
            roots,
            node_solutions,
            ambiguities,
        }
    }

    #[must_use]
    pub const fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Whether the number of encoded trees is finite. Cyclic grammars
    /// (e.g. `A: A | 'a';`) produce infinite families.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.node_solutions.is_some()
    }

    /// Number of distinct trees encoded.
    ///
    /// # Panics
    ///
    /// Panics when the forest encodes infinitely many trees; check
    /// [`is_finite`](Self::is_finite) first.
    #[must_use]
    pub fn solutions(&self) -> usize {
        let sols = self
            .node_solutions
            .as_ref()
            .expect("forest encodes infinitely many trees");
        self.roots.iter().map(|r| sols[r.0]).sum()
    }

    /// Number of ambiguous non-terminal nodes reachable from the roots.
    #[must_use]
    pub const fn ambiguities(&self) -> usize {
        self.ambiguities
    }

    /// The `idx`-th tree, or `None` past [`solutions`](Self::solutions).
    #[must_use]
    pub fn get_tree(&self, idx: usize) -> Option<Tree<'_, 'g, 'i>> {
        let sols = self.node_solutions.as_ref()?;
        let mut counter = idx;
        for &root in &self.roots {
            let root_solutions = sols[root.0];
            if counter < root_solutions {
                return Some(Tree::new(self, root, counter));
            }
            counter -= root_solutions;
        }
        None
    }

    /// Any one tree, without enumeration: the first packed alternative is
    /// chosen at every ambiguous node. Works on infinite forests too.
    #[must_use]
    pub fn get_first_tree(&self) -> Option<Tree<'_, 'g, 'i>> {
        self.roots.first().map(|&root| Tree::new(self, root, 0))
    }

    /// Iterate all trees in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = Tree<'_, 'g, 'i>> {
        (0..self.solutions()).filter_map(|i| self.get_tree(i))
    }

    /// Textual rendering of the whole forest, marking ambiguities.
    #[must_use]
    pub fn to_str(&self) -> String {
        let mut out = String::new();
        let mut on_stack = HashSet::new();
        for &root in &self.roots {
            self.write_node(root, 0, &mut on_stack, &mut out);
        }
        out
    }

    fn write_node(
        &self,
        id: SppfId,
        depth: usize,
        on_stack: &mut HashSet<usize>,
        out: &mut String,
    ) {
        let indent = "  ".repeat(depth);
        match self.sppf.node(id) {
            SppfNode::Term {
                terminal,
                start,
                end,
                value,
                ..
            } => {
                let name = &self.grammar.terminal(*terminal).name;
                out.push_str(&format!("{indent}{name}[{start}->{end}, \"{value}\"]\n"));
            }
            SppfNode::NonTerm {
                symbol,
                start,
                end,
                packed,
            } => {
                let name = &self.grammar.nonterminal(*symbol).name;
                if !on_stack.insert(id.0) {
                    out.push_str(&format!("{indent}{name}[{start}->{end}] ...\n"));
                    return;
                }
                if packed.len() > 1 {
                    out.push_str(&format!(
                        "{indent}{name}[{start}->{end}] - ambiguity({})\n",
                        packed.len()
                    ));
                    for (n, alt) in packed.iter().enumerate() {
                        out.push_str(&format!("{indent}  {}:\n", n + 1));
                        for &child in &alt.children {
                            self.write_node(child, depth + 2, on_stack, out);
                        }
                    }
                } else {
                    out.push_str(&format!("{indent}{name}[{start}->{end}]\n"));
                    for alt in packed {
                        for &child in &alt.children {
                            self.write_node(child, depth + 1, on_stack, out);
                        }
                    }
                }
                on_stack.remove(&id.0);
            }
        }
    }

    /// Graphviz rendering of the shared forest. Ambiguous nodes are
    /// highlighted and each packed alternative becomes an intermediate
    /// node.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from(DOT_HEADER);
        let mut seen = HashSet::new();
        let mut stack: Vec<SppfId> = self.roots.clone();
        while let Some(id) = stack.pop() {
            if !seen.insert(id.0) {
                continue;
            }
            match self.sppf.node(id) {
                SppfNode::Term {
                    terminal,
                    start,
                    end,
                    value,
                    ..
                } => {
                    let name = &self.grammar.terminal(*terminal).name;
                    out.push_str(&format!(
                        "{} [label=\"{}\"];\n",
                        id.0,
                        dot_escape(&format!("{name}({value})[{start}-{end}]"))
                    ));
                }
                SppfNode::NonTerm {
                    symbol,
                    start,
                    end,
                    packed,
                } => {
                    let name = &self.grammar.nonterminal(*symbol).name;
                    let fill = if packed.len() > 1 {
                        " fillcolor=lightsalmon"
                    } else {
                        ""
                    };
                    out.push_str(&format!(
                        "{} [label=\"{}\"{fill}];\n",
                        id.0,
                        dot_escape(&format!("{name}[{start}-{end}]"))
                    ));
                    for (n, alt) in packed.iter().enumerate() {
                        if packed.len() > 1 {
                            let alt_id = format!("{}_{n}", id.0);
                            out.push_str(&format!(
                                "{alt_id} [shape=point];\n{} -> {alt_id};\n",
                                id.0
                            ));
                            for &child in &alt.children {
                                out.push_str(&format!("{alt_id} -> {};\n", child.0));
                                stack.push(child);
                            }
                        } else {
                            for &child in &alt.children {
                                out.push_str(&format!("{} -> {};\n", id.0, child.0));
                                stack.push(child);
                            }
                        }
                    }
                }
            }
        }
        out.push_str("}\n");
        out
    }
}

const DOT_HEADER: &str = "digraph forest {\n\
    rankdir=TD\n\
    fontsize=8\n\
    node[style=filled, fillcolor=aliceblue]\n\
    nodesep=0.3\n\n";

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Per-node tree counts, or `None` when a cycle makes the forest
/// infinite. Terminal nodes count 1; a non-terminal counts the sum over
/// its packed alternatives of the product of child counts.
fn compute_solutions(sppf: &Sppf<'_>, roots: &[SppfId]) -> Option<Vec<usize>> {
    let mut solutions: Vec<Option<usize>> = vec![None; sppf.nodes.len()];
    let mut on_stack: HashSet<usize> = HashSet::new();

    // Proper nested DFS frames: `on_stack` holds exactly the ancestors of
    // the node being expanded, so re-entering one is a genuine cycle while
    // a child shared between alternatives is not.
    struct Frame {
        id: SppfId,
        children: Vec<SppfId>,
        next: usize,
    }
    let frame = |sppf: &Sppf<'_>, id: SppfId| {
        let children = match sppf.node(id) {
            SppfNode::Term { .. } => Vec::new(),
            SppfNode::NonTerm { packed, .. } => packed
                .iter()
                .flat_map(|alt| alt.children.iter().copied())
                .collect(),
        };
        Frame {
            id,
            children,
            next: 0,
        }
    };

    for &root in roots {
        if solutions[root.0].is_some() {
            continue;
        }
        let mut stack = vec![frame(sppf, root)];
        on_stack.insert(root.0);
        while let Some(top) = stack.last_mut() {
            if top.next < top.children.len() {
                let child = top.children[top.next];
                top.next += 1;
                if solutions[child.0].is_some() {
                    continue;
                }
                if on_stack.contains(&child.0) {
                    // This derivation embeds itself.
                    return None;
                }
                on_stack.insert(child.0);
                stack.push(frame(sppf, child));
            } else {
                let id = top.id;
                let count = match sppf.node(id) {
                    SppfNode::Term { .. } => 1,
                    SppfNode::NonTerm { packed, .. } => packed
                        .iter()
                        .map(|alt| {
                            alt.children
                                .iter()
                                .map(|c| solutions[c.0].unwrap_or(0))
                                .product::<usize>()
                        })
                        .sum(),
                };
                solutions[id.0] = Some(count);
                on_stack.remove(&id.0);
                stack.pop();
            }
        }
    }
    Some(solutions.into_iter().map(|s| s.unwrap_or(0)).collect())
}

fn count_ambiguities(sppf: &Sppf<'_>, roots: &[SppfId]) -> usize {
    let mut seen = HashSet::new();
    let mut stack: Vec<SppfId> = roots.to_vec();
    let mut count = 0;
    while let Some(id) = stack.pop() {
        if !seen.insert(id.0) {
            continue;
        }
        if let SppfNode::NonTerm { packed, .. } = sppf.node(id) {
            if packed.len() > 1 {
                count += 1;
            }
            for alt in packed {
                stack.extend(alt.children.iter().copied());
            }
        }
    }
    count
}

/// A lazy view of one tree in the forest.
///
/// Obtained from [`Forest::get_tree`]; children are produced on demand and
/// reference forest data without copying. Restartable: asking for children
/// twice yields the same views.
#[derive(Clone, Copy)]
pub struct Tree<'f, 'g, 'i> {
    forest: &'f Forest<'g, 'i>,
    node: SppfId,
    alternative: usize,
    counter: usize,
}

impl<'f, 'g, 'i> Tree<'f, 'g, 'i> {
    fn new(forest: &'f Forest<'g, 'i>, node: SppfId, mut counter: usize) -> Self {
        let mut alternative = 0;
        if counter > 0
            && let SppfNode::NonTerm { packed, .. } = forest.sppf.node(node)
            && let Some(sols) = forest.node_solutions.as_ref()
        {
            // Find the alternative bucket the counter falls into.
            for (idx, alt) in packed.iter().enumerate() {
                let alt_solutions: usize = alt.children.iter().map(|c| sols[c.0]).product();
                if counter < alt_solutions {
                    alternative = idx;
                    break;
                }
                counter -= alt_solutions;
                alternative = idx + 1;
            }
        }
        Self {
            forest,
            node,
            alternative,
            counter,
        }
    }

    #[must_use]
    pub fn is_term(&self) -> bool {
        matches!(self.forest.sppf.node(self.node), SppfNode::Term { .. })
    }

    #[must_use]
    pub fn is_nonterm(&self) -> bool {
        !self.is_term()
    }

    #[must_use]
    pub fn symbol(&self) -> Symbol {
        match self.forest.sppf.node(self.node) {
            SppfNode::Term { terminal, .. } => Symbol::Terminal(*terminal),
            SppfNode::NonTerm { symbol, .. } => Symbol::NonTerminal(*symbol),
        }
    }

    /// Production of the chosen packed alternative.
    #[must_use]
    pub fn production(&self) -> Option<ProdIndex> {
        match self.forest.sppf.node(self.node) {
            SppfNode::Term { .. } => None,
            SppfNode::NonTerm { packed, .. } => {
                packed.get(self.alternative).map(|alt| alt.production)
            }
        }
    }

    #[must_use]
    pub fn start(&self) -> usize {
        match self.forest.sppf.node(self.node) {
            SppfNode::Term { start, .. } | SppfNode::NonTerm { start, .. } => *start,
        }
    }

    #[must_use]
    pub fn end(&self) -> usize {
        match self.forest.sppf.node(self.node) {
            SppfNode::Term { end, .. } | SppfNode::NonTerm { end, .. } => *end,
        }
    }

    /// Matched text for terminal leaves.
    #[must_use]
    pub fn value(&self) -> Option<&'i str> {
        match self.forest.sppf.node(self.node) {
            SppfNode::Term { value, .. } => Some(value),
            SppfNode::NonTerm { .. } => None,
        }
    }

    /// Layout consumed right before this terminal.
    #[must_use]
    pub fn layout_content(&self) -> Option<&'i str> {
        match self.forest.sppf.node(self.node) {
            SppfNode::Term { layout_content, .. } => Some(layout_content),
            SppfNode::NonTerm { .. } => None,
        }
    }

    /// Child views, decoding the per-child counters of the mixed-radix
    /// enumeration.
    #[must_use]
    pub fn children(&self) -> Vec<Tree<'f, 'g, 'i>> {
        let child_ids = self.forest.sppf.children_of(self.node, self.alternative);
        if child_ids.is_empty() {
            return Vec::new();
        }
        if self.counter == 0 {
            return child_ids
                .iter()
                .map(|&c| Tree::new(self.forest, c, 0))
                .collect();
        }
        let sols = self
            .forest
            .node_solutions
            .as_ref()
            .expect("enumeration with non-zero counter requires a finite forest");
        let weights: Vec<usize> = child_ids.iter().map(|c| sols[c.0]).collect();
        let mut counter = self.counter;
        let mut children = Vec::with_capacity(child_ids.len());
        for (idx, &child) in child_ids.iter().enumerate() {
            let factor: usize = weights[idx + 1..].iter().product();
            children.push(Tree::new(self.forest, child, counter / factor));
            counter %= factor;
        }
        children
    }

    /// Materialize this tree as a [`TreeNode`], e.g. to run actions over
    /// it with [`call_actions`](crate::parser::call_actions).
    ///
    /// # Panics
    ///
    /// Panics when the selection re-enters a node, which can only happen
    /// for infinite (cyclic) derivations.
    #[must_use]
    pub fn build(&self) -> TreeNode<'i> {
        let mut on_stack = HashSet::new();
        self.build_guarded(&mut on_stack)
    }

    fn build_guarded(&self, on_stack: &mut HashSet<usize>) -> TreeNode<'i> {
        match self.forest.sppf.node(self.node) {
            SppfNode::Term {
                terminal,
                start,
                value,
                layout_content,
                additional_data,
                ..
            } => TreeNode::Term {
                token: Token {
                    terminal: *terminal,
                    value,
                    start: *start,
                    layout_content,
                    additional_data: additional_data.clone(),
                },
            },
            SppfNode::NonTerm {
                symbol, start, end, ..
            } => {
                assert!(
                    on_stack.insert(self.node.0),
                    "cannot materialize an infinite derivation"
                );
                let children = self
                    .children()
                    .iter()
                    .map(|c| c.build_guarded(on_stack))
                    .collect();
                on_stack.remove(&self.node.0);
                TreeNode::NonTerm {
                    symbol: *symbol,
                    production: self.production().expect("packed alternative"),
                    start: *start,
                    end: *end,
                    children,
                }
            }
        }
    }

    /// Indented textual rendering of this tree.
    #[must_use]
    pub fn to_str(&self) -> String {
        let mut out = String::new();
        self.write(0, &mut out);
        out
    }

    fn write(&self, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match self.forest.sppf.node(self.node) {
            SppfNode::Term {
                terminal,
                start,
                end,
                value,
                ..
            } => {
                let name = &self.forest.grammar.terminal(*terminal).name;
                out.push_str(&format!("{indent}{name}[{start}->{end}, \"{value}\"]\n"));
            }
            SppfNode::NonTerm {
                symbol, start, end, ..
            } => {
                let name = &self.forest.grammar.nonterminal(*symbol).name;
                out.push_str(&format!("{indent}{name}[{start}->{end}]\n"));
                for child in self.children() {
                    child.write(depth + 1, out);
                }
            }
        }
    }
}

/// Error raised by [`visit`] when cycle checking is on and the structure
/// loops.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cycle detected during traversal at node {node}")]
pub struct CycleError {
    pub node: usize,
}

/// Iterative depth-first traversal over an id-addressed structure.
///
/// `children` yields the nodes below a node; `f` combines a node with the
/// results of its children. With `memoize` the result of each node is
/// computed once (DAG traversal); with `check_cycles` re-entering a node
/// on the current path fails with [`CycleError`].
///
/// # Errors
///
/// Returns [`CycleError`] when `check_cycles` is set and the structure
/// loops.
pub fn visit<K, R>(
    root: K,
    children: impl Fn(K) -> Vec<K>,
    mut f: impl FnMut(K, Vec<R>) -> R,
    memoize: bool,
    check_cycles: bool,
) -> Result<R, CycleError>
where
    K: Copy + Eq + std::hash::Hash + Into<usize>,
    R: Clone,
{
    let mut cache: HashMap<K, R> = HashMap::new();
    let mut on_stack: HashSet<K> = HashSet::new();

    struct Frame<K, R> {
        node: K,
        pending: Vec<K>,
        results: Vec<R>,
    }
    let mut stack = vec![Frame {
        node: root,
        pending: {
            let mut c = children(root);
            c.reverse();
            c
        },
        results: Vec::new(),
    }];
    on_stack.insert(root);
    let mut final_result: Option<R> = None;

    while let Some(frame) = stack.last_mut() {
        if let Some(next) = frame.pending.pop() {
            if check_cycles && on_stack.contains(&next) {
                return Err(CycleError { node: next.into() });
            }
            if memoize && let Some(cached) = cache.get(&next) {
                frame.results.push(cached.clone());
                continue;
            }
            stack.push(Frame {
                node: next,
                pending: {
                    let mut c = children(next);
                    c.reverse();
                    c
                },
                results: Vec::new(),
            });
            on_stack.insert(next);
        } else {
            let frame = stack.pop().expect("frame");
            on_stack.remove(&frame.node);
            let result = f(frame.node, frame.results);
            if memoize {
                cache.insert(frame.node, result.clone());
            }
            match stack.last_mut() {
                Some(parent) => parent.results.push(result),
                None => final_result = Some(result),
            }
        }
    }
    Ok(final_result.expect("visitor result"))
}

impl From<SppfId> for usize {
    fn from(id: SppfId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

    fn grammar() -> Grammar {
        Grammar::builder()
            .terminal_regex("num", r"\d+")
            .rule("E", |r| r.prod(&["E", "'+'", "E"]).prod(&["num"]))
            .build()
            .unwrap()
    }

    fn leaf<'i>(sppf: &mut Sppf<'i>, g: &Grammar, value: &'i str, start: usize) -> SppfId {
        let num = g.term_by_name("num").unwrap();
        sppf.term_node(&Token::new(num, value, start))
    }

    #[test]
    fn packed_alternative_insertion_is_idempotent() {
        let g = grammar();
        let e = g.nonterm_by_name("E").unwrap();
        let prods = g.productions_of(e).to_vec();
        let mut sppf = Sppf::new();

        let n1 = leaf(&mut sppf, &g, "1", 0);
        let node = sppf.nonterm_node(e, 0, 1);
        assert!(sppf.add_packed(node, prods[1], SmallVec::from_slice(&[n1])));
        assert!(!sppf.add_packed(node, prods[1], SmallVec::from_slice(&[n1])));
    }

    #[test]
    fn nonterm_nodes_are_unified_by_span() {
        let g = grammar();
        let e = g.nonterm_by_name("E").unwrap();
        let mut sppf = Sppf::new();
        let a = sppf.nonterm_node(e, 0, 5);
        let b = sppf.nonterm_node(e, 0, 5);
        let c = sppf.nonterm_node(e, 0, 3);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn cyclic_forest_is_not_finite() {
        let g = Grammar::builder()
            .terminal_str("a", "a")
            .rule("A", |r| r.prod(&["A"]).prod(&["a"]))
            .build()
            .unwrap();
        let a_nt = g.nonterm_by_name("A").unwrap();
        let prods = g.productions_of(a_nt).to_vec();
        let mut sppf = Sppf::new();

        let leaf = leaf(&mut sppf, &g, "a", 0);
        let node = sppf.nonterm_node(a_nt, 0, 1);
        sppf.add_packed(node, prods[1], SmallVec::from_slice(&[leaf]));
        // Self-embedding derivation A -> A.
        sppf.add_packed(node, prods[0], SmallVec::from_slice(&[node]));

        let forest = Forest::new(&g, sppf, vec![node]);
        assert!(!forest.is_finite());
        assert_eq!(forest.ambiguities(), 1);
        // First-tree fast path still works.
        let first = forest.get_first_tree().unwrap();
        assert_eq!(first.start(), 0);
    }

    #[test]
    fn visitor_memoizes_shared_nodes() {
        let g = grammar();
        let e = g.nonterm_by_name("E").unwrap();
        let prods = g.productions_of(e).to_vec();
        let mut sppf = Sppf::new();
        let shared = leaf(&mut sppf, &g, "1", 0);
        let top = sppf.nonterm_node(e, 0, 1);
        sppf.add_packed(top, prods[1], SmallVec::from_slice(&[shared]));

        let mut visits = 0;
        let result = visit(
            top,
            |id| match sppf.node(id) {
                SppfNode::NonTerm { packed, .. } => packed
                    .iter()
                    .flat_map(|alt| alt.children.iter().copied())
                    .collect(),
                SppfNode::Term { .. } => Vec::new(),
            },
            |_, children: Vec<usize>| {
                visits += 1;
                1 + children.iter().sum::<usize>()
            },
            true,
            true,
        )
        .unwrap();
        assert_eq!(result, 2);
        assert_eq!(visits, 2);
    }

    #[test]
    fn visitor_detects_cycles() {
        let g = Grammar::builder()
            .terminal_str("a", "a")
            .rule("A", |r| r.prod(&["A"]).prod(&["a"]))
            .build()
            .unwrap();
        let a_nt = g.nonterm_by_name("A").unwrap();
        let prods = g.productions_of(a_nt).to_vec();
        let mut sppf = Sppf::new();
        let node = sppf.nonterm_node(a_nt, 0, 1);
        sppf.add_packed(node, prods[0], SmallVec::from_slice(&[node]));

        let result = visit(
            node,
            |id| match sppf.node(id) {
                SppfNode::NonTerm { packed, .. } => packed
                    .iter()
                    .flat_map(|alt| alt.children.iter().copied())
                    .collect(),
                SppfNode::Term { .. } => Vec::new(),
            },
            |_, _: Vec<usize>| 0,
            true,
            true,
        );
        assert!(result.is_err());
    }
}
