//! Graph-structured stack
//!
//! The set of concurrent LR stacks of a GLR parse, sharing common
//! prefixes: a DAG of nodes keyed by `(state, position)` whose links carry
//! the semantic result (an SPPF node) produced when the link was created.
//! Nodes live in an arena and are discarded when the parse ends.

use super::forest::SppfId;
use crate::table::StateId;
use hashbrown::HashMap;
use smallvec::SmallVec;

/// Index of a GSS node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GssNodeId(pub usize);

/// An edge to a parse-stack predecessor, carrying the semantic result
/// shifted or reduced over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GssLink {
    pub parent: GssNodeId,
    pub sppf: SppfId,
}

#[derive(Debug)]
pub(crate) struct GssNode {
    pub state: StateId,
    pub position: usize,
    pub links: SmallVec<[GssLink; 2]>,
}

/// A reduction path of fixed length through the stack.
pub(crate) struct ReductionPath {
    /// Node the path ends at (the reduction's origin for GOTO).
    pub root: GssNodeId,
    /// Semantic results along the path, in right-hand-side order.
    pub children: SmallVec<[SppfId; 4]>,
}

#[derive(Debug, Default)]
pub(crate) struct Gss {
    nodes: Vec<GssNode>,
    by_key: HashMap<(StateId, usize), GssNodeId, ahash::RandomState>,
}

impl Gss {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn node(&self, id: GssNodeId) -> &GssNode {
        &self.nodes[id.0]
    }

    /// Find or create the node for `(state, position)`. The `bool` is
    /// `true` when the node was created.
    pub(crate) fn find_or_create(&mut self, state: StateId, position: usize) -> (GssNodeId, bool) {
        if let Some(&id) = self.by_key.get(&(state, position)) {
            return (id, false);
        }
        let id = GssNodeId(self.nodes.len());
        self.nodes.push(GssNode {
            state,
            position,
            links: SmallVec::new(),
        });
        self.by_key.insert((state, position), id);
        (id, true)
    }

    /// Add a link unless an identical one exists. The `bool` is `true`
    /// when the link is new.
    pub(crate) fn add_link(&mut self, from: GssNodeId, parent: GssNodeId, sppf: SppfId) -> bool {
        let link = GssLink { parent, sppf };
        let links = &mut self.nodes[from.0].links;
        if links.contains(&link) {
            return false;
        }
        links.push(link);
        true
    }

    /// Every path of `length` links starting at `from`, with the semantic
    /// results collected in production right-hand-side order.
    pub(crate) fn paths(&self, from: GssNodeId, length: usize) -> Vec<ReductionPath> {
        if length == 0 {
            return vec![ReductionPath {
                root: from,
                children: SmallVec::new(),
            }];
        }
        let mut result = Vec::new();
        // Children accumulate from the head backwards; reversed at the end.
        let mut stack: Vec<(GssNodeId, usize, SmallVec<[SppfId; 4]>)> =
            vec![(from, length, SmallVec::new())];
        while let Some((node, remaining, acc)) = stack.pop() {
            for link in &self.nodes[node.0].links {
                let mut acc = acc.clone();
                acc.push(link.sppf);
                if remaining == 1 {
                    let mut children = acc;
                    children.reverse();
                    result.push(ReductionPath {
                        root: link.parent,
                        children,
                    });
                } else {
                    stack.push((link.parent, remaining - 1, acc));
                }
            }
        }
        result
    }
}
