//! User actions and the built-in action library
//!
//! Actions map reduction children to semantic values. They are resolved to
//! per-production tables at parser construction (no name lookups during the
//! parse): a production uses the action named by its `action` metadata, or
//! the one registered under its left-hand side symbol name, or the default
//! (tokens become strings, reductions pass through a single child or build
//! a list).
//!
//! The built-in actions cover the shapes BNF sugar desugars into:
//! optionals, one-or-more and zero-or-more repetitions with or without
//! separators (left- and right-recursive), plus `obj` for named matches.

use super::context::Context;
use crate::grammar::Grammar;
use crate::tree::TreeNode;
use crate::value::Value;
use compact_str::CompactString;
use hashbrown::HashMap;

/// An action callable: context and child results to a value.
pub type ActionFn = Box<dyn for<'g, 'i> Fn(&Context<'g, 'i>, Vec<Value<'i>>) -> Value<'i>>;

/// Actions registered under one name.
pub enum SymbolActions {
    /// One action for every production of the symbol.
    Single(ActionFn),
    /// One action per production, indexed by the production's position
    /// among its symbol's alternatives.
    PerProduction(Vec<ActionFn>),
}

/// A collection of named actions, resolved against a grammar at parser
/// construction.
#[derive(Default)]
pub struct ActionSet {
    by_name: HashMap<CompactString, SymbolActions>,
}

impl ActionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action for a symbol or action name.
    #[must_use]
    pub fn with(
        mut self,
        name: &str,
        action: impl for<'g, 'i> Fn(&Context<'g, 'i>, Vec<Value<'i>>) -> Value<'i> + 'static,
    ) -> Self {
        self.by_name
            .insert(name.into(), SymbolActions::Single(Box::new(action)));
        self
    }

    /// Register one action per production alternative.
    #[must_use]
    pub fn with_per_production(mut self, name: &str, actions: Vec<ActionFn>) -> Self {
        self.by_name
            .insert(name.into(), SymbolActions::PerProduction(actions));
        self
    }

    /// Register a built-in action under a symbol name.
    ///
    /// # Panics
    ///
    /// Panics if `builtin` is not one of the built-in action identifiers.
    #[must_use]
    pub fn with_builtin(mut self, name: &str, builtin: &str) -> Self {
        let actions = builtin_action(builtin)
            .unwrap_or_else(|| panic!("unknown built-in action '{builtin}'"));
        self.by_name.insert(name.into(), actions);
        self
    }

    fn lookup(&self, name: &str) -> Option<&SymbolActions> {
        self.by_name.get(name)
    }

    /// The action for a production: explicit `action` metadata first, then
    /// the left-hand side symbol name.
    pub(crate) fn for_production<'a>(
        &'a self,
        grammar: &Grammar,
        production: crate::grammar::ProdIndex,
    ) -> Option<&'a ActionFn> {
        let prod = grammar.production(production);
        let meta_name = prod.meta.get("action").and_then(Value::as_str);
        let symbol_name = grammar.nonterminal(prod.symbol).name.as_str();
        let actions = meta_name
            .and_then(|name| self.lookup(name))
            .or_else(|| self.lookup(symbol_name))?;
        match actions {
            SymbolActions::Single(f) => Some(f),
            SymbolActions::PerProduction(fs) => {
                let position = grammar
                    .productions_of(prod.symbol)
                    .iter()
                    .position(|p| *p == production)?;
                fs.get(position)
            }
        }
    }
}

/// Default semantics when no action is registered: no children gives
/// `None`, one child passes through, more build a list.
pub(crate) fn default_reduce<'i>(mut children: Vec<Value<'i>>) -> Value<'i> {
    match children.len() {
        0 => Value::None,
        1 => children.pop().unwrap_or(Value::None),
        _ => Value::List(children),
    }
}

/// Resolve a built-in action by identifier.
///
/// Identifiers: `none`, `nochange`, `empty`, `single`, `inner`, `optional`,
/// `collect`, `collect_sep`, `collect_optional`, `collect_sep_optional`,
/// `collect_right`, `collect_right_sep`, `collect_right_optional`,
/// `collect_right_sep_optional`, `obj`.
#[must_use]
pub fn builtin_action(name: &str) -> Option<SymbolActions> {
    let single = |f: ActionFn| Some(SymbolActions::Single(f));
    match name {
        "none" => single(Box::new(|_, _| Value::None)),
        "nochange" => single(Box::new(|_, children| default_reduce(children))),
        "empty" => single(Box::new(|_, _| Value::List(Vec::new()))),
        "single" => single(Box::new(|_, children| take_at(children, 0))),
        // Drops the enclosing pair: '(' inner ')'.
        "inner" => single(Box::new(|_, mut children| {
            if children.len() < 3 {
                return default_reduce(children);
            }
            children.pop();
            children.remove(0);
            default_reduce(children)
        })),
        "optional" => Some(SymbolActions::PerProduction(vec![
            Box::new(|_, children| take_at(children, 0)),
            Box::new(|_, _| Value::None),
        ])),
        "collect" => Some(SymbolActions::PerProduction(vec![
            Box::new(|_, children| append_left(children, 1)),
            Box::new(|_, children| list_of(children)),
        ])),
        "collect_sep" => Some(SymbolActions::PerProduction(vec![
            Box::new(|_, children| append_left(children, 2)),
            Box::new(|_, children| list_of(children)),
        ])),
        "collect_optional" => Some(SymbolActions::PerProduction(vec![
            Box::new(|_, children| append_left(children, 1)),
            Box::new(|_, children| list_of(children)),
            Box::new(|_, _| Value::List(Vec::new())),
        ])),
        "collect_sep_optional" => Some(SymbolActions::PerProduction(vec![
            Box::new(|_, children| append_left(children, 2)),
            Box::new(|_, children| list_of(children)),
            Box::new(|_, _| Value::List(Vec::new())),
        ])),
        "collect_right" => Some(SymbolActions::PerProduction(vec![
            Box::new(|_, children| prepend_right(children)),
            Box::new(|_, children| list_of(children)),
        ])),
        "collect_right_sep" => Some(SymbolActions::PerProduction(vec![
            Box::new(|_, children| prepend_right(children)),
            Box::new(|_, children| list_of(children)),
        ])),
        "collect_right_optional" => Some(SymbolActions::PerProduction(vec![
            Box::new(|_, children| prepend_right(children)),
            Box::new(|_, children| list_of(children)),
            Box::new(|_, _| Value::List(Vec::new())),
        ])),
        "collect_right_sep_optional" => Some(SymbolActions::PerProduction(vec![
            Box::new(|_, children| prepend_right(children)),
            Box::new(|_, children| list_of(children)),
            Box::new(|_, _| Value::List(Vec::new())),
        ])),
        "obj" => single(Box::new(|ctx, children| obj_action(ctx, children))),
        _ => None,
    }
}

fn take_at(mut children: Vec<Value<'_>>, idx: usize) -> Value<'_> {
    if idx < children.len() {
        children.swap_remove(idx)
    } else {
        Value::None
    }
}

fn list_of(children: Vec<Value<'_>>) -> Value<'_> {
    Value::List(children.into_iter().filter(|v| !v.is_none()).collect())
}

/// `Elements Element` or `Elements sep Element`: push the last child onto
/// the list in the first.
fn append_left(mut children: Vec<Value<'_>>, item_idx: usize) -> Value<'_> {
    let item = if children.len() > item_idx {
        children.swap_remove(item_idx)
    } else {
        Value::None
    };
    let mut list = match children.into_iter().next() {
        Some(Value::List(items)) => items,
        Some(other) if !other.is_none() => vec![other],
        _ => Vec::new(),
    };
    if !item.is_none() {
        list.push(item);
    }
    Value::List(list)
}

/// `Element Elements` or `Element sep Elements`: push the first child onto
/// the front of the list in the last.
fn prepend_right(mut children: Vec<Value<'_>>) -> Value<'_> {
    let rest = children.pop().unwrap_or(Value::None);
    let item = children.into_iter().next().unwrap_or(Value::None);
    let mut list = match rest {
        Value::List(items) => items,
        other if !other.is_none() => vec![other],
        _ => Vec::new(),
    };
    if !item.is_none() {
        list.insert(0, item);
    }
    Value::List(list)
}

/// Build a record from the production's named matches.
fn obj_action<'i>(ctx: &Context<'_, 'i>, children: Vec<Value<'i>>) -> Value<'i> {
    let mut fields: HashMap<String, Value<'i>> = HashMap::new();
    if let Some(production) = ctx.production {
        for (name, idx) in &ctx.grammar.production(production).named {
            if let Some(value) = children.get(*idx) {
                fields.insert(name.to_string(), value.clone());
            }
        }
    }
    Value::Object(fields)
}

/// Walk a built parse tree bottom-up, invoking the actions.
///
/// This is the tree-then-walk mode: the tree was produced by the default
/// semantics, and user actions run afterwards, only over branches that
/// survived parsing.
#[must_use]
pub fn call_actions<'i>(
    root: &TreeNode<'i>,
    actions: &ActionSet,
    ctx: &mut Context<'_, 'i>,
) -> Value<'i> {
    // Iterative post-order walk; trees can be deep for long inputs.
    enum Step<'a, 'i> {
        Enter(&'a TreeNode<'i>),
        Exit(&'a TreeNode<'i>),
    }
    let mut stack = vec![Step::Enter(root)];
    let mut results: Vec<Vec<Value<'i>>> = vec![Vec::new()];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(node) => match node {
                TreeNode::Term { token } => {
                    results
                        .last_mut()
                        .expect("result frame")
                        .push(Value::borrowed(token.value));
                }
                TreeNode::NonTerm { children, .. } => {
                    stack.push(Step::Exit(node));
                    results.push(Vec::new());
                    for child in children.iter().rev() {
                        stack.push(Step::Enter(child));
                    }
                }
            },
            Step::Exit(node) => {
                let TreeNode::NonTerm {
                    symbol,
                    production,
                    start,
                    end,
                    ..
                } = node
                else {
                    continue;
                };
                let children = results.pop().expect("children frame");
                ctx.production = Some(*production);
                ctx.symbol = Some(crate::grammar::Symbol::NonTerminal(*symbol));
                ctx.start_position = *start;
                ctx.end_position = *end;
                let value = match actions.for_production(ctx.grammar, *production) {
                    Some(f) => f(ctx, children),
                    None => default_reduce(children),
                };
                results.last_mut().expect("result frame").push(value);
            }
        }
    }

    results
        .pop()
        .and_then(|mut vs| if vs.is_empty() { None } else { Some(vs.remove(0)) })
        .unwrap_or(Value::None)
}
