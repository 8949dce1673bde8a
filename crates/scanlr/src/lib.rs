//! # scanlr
//!
//! A scannerless LR(1)/GLR parser generator and runtime for context-free
//! grammars.
//!
//! ## Overview
//!
//! scanlr turns a grammar IR into ACTION/GOTO tables and drives them over
//! string input. It provides:
//!
//! - **Table construction**: canonical LR(1) item sets with LALR-style
//!   state merging (or SLR), declarative conflict resolution via
//!   priorities, associativities and shift-preference policies
//! - **Scannerless recognition**: terminals are recognized contextually
//!   from the current state's acceptable set, with lexical disambiguation
//!   and layout (whitespace/comment) handling
//! - **Deterministic LR driver**: shift/reduce execution building a parse
//!   tree or invoking user actions in-line
//! - **GLR driver**: a graph-structured stack that forks on conflicts and
//!   lexical ambiguity, producing a shared packed parse forest with lazy
//!   tree enumeration
//!
//! ## Quick start
//!
//! ```
//! use scanlr::{Grammar, Parser};
//!
//! let grammar = Grammar::builder()
//!     .terminal_regex("num", r"\d+")
//!     .rule("Sum", |r| r.prod(&["Sum", "'+'", "num"]).prod(&["num"]))
//!     .build()?;
//!
//! let mut parser = Parser::new(&grammar)?;
//! let tree = parser.parse("1 + 2 + 3")?;
//! assert!(tree.is_nonterm());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Ambiguous grammars go through the GLR driver instead:
//!
//! ```
//! use scanlr::{Grammar, GlrParser};
//!
//! let grammar = Grammar::builder()
//!     .terminal_regex("num", r"\d+")
//!     .rule("E", |r| {
//!         r.prod(&["E", "'+'", "E"])
//!             .prod(&["E", "'*'", "E"])
//!             .prod(&["num"])
//!     })
//!     .build()?;
//!
//! let mut parser = GlrParser::new(&grammar)?;
//! let forest = parser.parse("1 + 2 * 3")?;
//! assert_eq!(forest.solutions(), 2);
//! assert_eq!(forest.ambiguities(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`grammar`] - Grammar IR and builder
//! - [`table`] - LR table construction and snapshots
//! - [`parser`] - Deterministic driver, actions, context, recovery
//! - [`glr`] - GLR driver and parse forest
//! - [`recognizer`] - String/regex/custom terminal recognizers
//! - [`error`] - Build-time and parse-time errors

pub mod common;
pub mod error;
pub mod glr;
pub mod grammar;
pub mod parser;
pub mod recognizer;
pub mod table;
pub mod token;
pub mod tree;
pub mod value;

mod scanner;

pub use error::{GrammarError, ParseError};
pub use glr::{visit, CycleError, Forest, GlrParser, GlrParserBuilder, Tree};
pub use grammar::{Associativity, Grammar, GrammarBuilder, NonTermIndex, ProdIndex, TermIndex};
pub use parser::{
    builtin_action, call_actions, ActionSet, Context, DynamicAction, DynamicCall, DynamicFilter,
    ErrorRecovery, Parser, ParserBuilder,
};
pub use recognizer::{Recognizer, TokenMatch};
pub use table::{Action, LrTable, StateId, TableConfig, TableKind};
pub use token::Token;
pub use tree::TreeNode;
pub use value::Value;
