//! Parse trees built by the default actions
//!
//! The deterministic driver's default semantics build a [`TreeNode`] per
//! shift and reduction. Trees borrow token text from the input and can be
//! walked afterwards with user actions (`call_actions`), which is the
//! recommended route for side-effecting actions.

use crate::grammar::{Grammar, NonTermIndex, ProdIndex};
use crate::token::Token;

/// A node of the parse tree.
#[derive(Debug, Clone)]
pub enum TreeNode<'i> {
    /// A shifted token.
    Term { token: Token<'i> },
    /// A reduction.
    NonTerm {
        symbol: NonTermIndex,
        production: ProdIndex,
        start: usize,
        end: usize,
        children: Vec<TreeNode<'i>>,
    },
}

impl<'i> TreeNode<'i> {
    #[must_use]
    pub const fn is_term(&self) -> bool {
        matches!(self, Self::Term { .. })
    }

    #[must_use]
    pub const fn is_nonterm(&self) -> bool {
        matches!(self, Self::NonTerm { .. })
    }

    /// Children of a non-terminal node, empty for terminals.
    #[must_use]
    pub fn children(&self) -> &[TreeNode<'i>] {
        match self {
            Self::Term { .. } => &[],
            Self::NonTerm { children, .. } => children,
        }
    }

    #[must_use]
    pub const fn start(&self) -> usize {
        match self {
            Self::Term { token } => token.start,
            Self::NonTerm { start, .. } => *start,
        }
    }

    #[must_use]
    pub const fn end(&self) -> usize {
        match self {
            Self::Term { token } => token.start + token.value.len(),
            Self::NonTerm { end, .. } => *end,
        }
    }

    /// Matched text for terminals, `None` for non-terminals.
    #[must_use]
    pub const fn value(&self) -> Option<&'i str> {
        match self {
            Self::Term { token } => Some(token.value),
            Self::NonTerm { .. } => None,
        }
    }

    /// Indented textual rendering of the subtree.
    #[must_use]
    pub fn to_str(&self, grammar: &Grammar) -> String {
        let mut out = String::new();
        self.write(grammar, 0, &mut out);
        out
    }

    fn write(&self, grammar: &Grammar, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match self {
            Self::Term { token } => {
                let name = &grammar.terminal(token.terminal).name;
                out.push_str(&format!(
                    "{indent}{name}[{}->{}, \"{}\"]\n",
                    token.start,
                    token.end(),
                    token.value
                ));
            }
            Self::NonTerm {
                symbol,
                start,
                end,
                children,
                ..
            } => {
                let name = &grammar.nonterminal(*symbol).name;
                out.push_str(&format!("{indent}{name}[{start}->{end}]\n"));
                for child in children {
                    child.write(grammar, depth + 1, out);
                }
            }
        }
    }
}
