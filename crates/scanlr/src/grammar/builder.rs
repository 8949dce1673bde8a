//! Programmatic grammar construction
//!
//! [`GrammarBuilder`] is the only way to obtain a [`Grammar`]. Collaborators
//! that parse a surface grammar syntax are expected to desugar into calls on
//! this builder; the core accepts any IR the builder validates.
//!
//! Right-hand sides reference symbols by name. An element wrapped in single
//! quotes (`"'+'"`) denotes an inline literal terminal; literals are
//! interned by value so the same literal always maps to the same terminal.
//! A rule named `LAYOUT` becomes the layout non-terminal.

use super::{
    Associativity, Grammar, NonTermIndex, NonTerminal, ProdIndex, Production, Rhs, Symbol,
    TermIndex, Terminal, DEFAULT_PRIORITY,
};
use crate::error::GrammarError;
use crate::recognizer::Recognizer;
use crate::value::Value;
use compact_str::CompactString;
use hashbrown::HashMap;

/// Builder for [`Grammar`] values.
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    terminals: Vec<TerminalSpec>,
    rules: Vec<RuleSpec>,
    start: Option<CompactString>,
    error: Option<GrammarError>,
}

#[derive(Debug)]
struct TerminalSpec {
    name: CompactString,
    recognizer: Recognizer,
    priority: i32,
    prefer: bool,
    finish: bool,
    keyword: bool,
    dynamic: bool,
    meta: HashMap<CompactString, Value<'static>>,
}

#[derive(Debug)]
struct RuleSpec {
    name: CompactString,
    productions: Vec<ProductionSpec>,
}

#[derive(Debug)]
struct ProductionSpec {
    rhs: Vec<CompactString>,
    priority: i32,
    assoc: Associativity,
    dynamic: bool,
    no_prefer_shift: bool,
    no_prefer_shift_over_empty: bool,
    named: Vec<(CompactString, usize)>,
    meta: HashMap<CompactString, Value<'static>>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a terminal, configuring it through the closure.
    #[must_use]
    pub fn terminal(mut self, name: &str, f: impl FnOnce(TerminalBuilder) -> TerminalBuilder) -> Self {
        let built = f(TerminalBuilder::new(name));
        match built.recognizer {
            Ok(recognizer) => self.terminals.push(TerminalSpec {
                name: built.name,
                recognizer,
                priority: built.priority,
                prefer: built.prefer,
                finish: built.finish,
                keyword: built.keyword,
                dynamic: built.dynamic,
                meta: built.meta,
            }),
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Shorthand for a literal-string terminal.
    #[must_use]
    pub fn terminal_str(self, name: &str, literal: &str) -> Self {
        let literal = literal.to_owned();
        self.terminal(name, move |t| t.string(literal))
    }

    /// Shorthand for a regex terminal.
    #[must_use]
    pub fn terminal_regex(self, name: &str, pattern: &str) -> Self {
        let pattern = pattern.to_owned();
        self.terminal(name, move |t| t.regex(&pattern))
    }

    /// Declare a terminal whose recognizer is registered on the parser by
    /// name (custom recognizers for non-default matching).
    #[must_use]
    pub fn terminal_external(self, name: &str) -> Self {
        self.terminal(name, |t| t)
    }

    /// Declare a non-terminal and its productions.
    #[must_use]
    pub fn rule(mut self, name: &str, f: impl FnOnce(RuleBuilder) -> RuleBuilder) -> Self {
        let built = f(RuleBuilder::new());
        self.rules.push(RuleSpec {
            name: name.into(),
            productions: built.productions,
        });
        self
    }

    /// Set the start symbol. Defaults to the first declared rule that is not
    /// `LAYOUT`.
    #[must_use]
    pub fn start(mut self, name: &str) -> Self {
        self.start = Some(name.into());
        self
    }

    fn record_error(&mut self, err: GrammarError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Finish construction.
    ///
    /// # Errors
    ///
    /// Returns the first [`GrammarError`] found: invalid recognizers,
    /// duplicate or undefined symbols, rules without productions, an
    /// unknown start symbol, unreachable productions or infinitely
    /// recursive symbols.
    pub fn build(self) -> Result<Grammar, GrammarError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut terminals = vec![
            Terminal {
                name: "STOP".into(),
                recognizer: Recognizer::None,
                priority: DEFAULT_PRIORITY,
                prefer: false,
                finish: false,
                keyword: false,
                dynamic: false,
                meta: HashMap::new(),
            },
            Terminal {
                name: "EMPTY".into(),
                recognizer: Recognizer::None,
                priority: DEFAULT_PRIORITY,
                prefer: false,
                finish: false,
                keyword: false,
                dynamic: false,
                meta: HashMap::new(),
            },
        ];
        let mut term_by_name: HashMap<CompactString, TermIndex> = HashMap::new();
        term_by_name.insert("STOP".into(), TermIndex::STOP);
        term_by_name.insert("EMPTY".into(), TermIndex::EMPTY);

        // Literal value -> interned terminal.
        let mut term_by_literal: HashMap<String, TermIndex> = HashMap::new();

        for spec in self.terminals {
            if term_by_name.contains_key(&spec.name) {
                return Err(GrammarError::DuplicateSymbol {
                    name: spec.name.into(),
                });
            }
            if let Recognizer::StringMatch { value, .. } = &spec.recognizer {
                term_by_literal
                    .entry(value.clone())
                    .or_insert(TermIndex(terminals.len()));
            }
            term_by_name.insert(spec.name.clone(), TermIndex(terminals.len()));
            terminals.push(Terminal {
                name: spec.name,
                recognizer: spec.recognizer,
                priority: spec.priority,
                prefer: spec.prefer,
                finish: spec.finish,
                keyword: spec.keyword,
                dynamic: spec.dynamic,
                meta: spec.meta,
            });
        }

        let mut nonterminals = vec![NonTerminal {
            name: "S'".into(),
            productions: vec![ProdIndex::AUGMENTED],
        }];
        let mut nonterm_by_name: HashMap<CompactString, NonTermIndex> = HashMap::new();
        nonterm_by_name.insert("S'".into(), NonTermIndex::AUGMENTED);

        for rule in &self.rules {
            if term_by_name.contains_key(&rule.name) || nonterm_by_name.contains_key(&rule.name) {
                return Err(GrammarError::DuplicateSymbol {
                    name: rule.name.clone().into(),
                });
            }
            if rule.productions.is_empty() {
                return Err(GrammarError::NoProductions {
                    name: rule.name.clone().into(),
                });
            }
            nonterm_by_name.insert(rule.name.clone(), NonTermIndex(nonterminals.len()));
            nonterminals.push(NonTerminal {
                name: rule.name.clone(),
                productions: Vec::new(),
            });
        }

        let layout = nonterm_by_name.get("LAYOUT").copied();

        let start_name = match &self.start {
            Some(name) => name.clone(),
            None => self
                .rules
                .iter()
                .map(|r| r.name.clone())
                .find(|name| name != "LAYOUT")
                .ok_or(GrammarError::UnknownSymbol {
                    name: "<start>".to_owned(),
                })?,
        };
        let start = *nonterm_by_name
            .get(&start_name)
            .ok_or_else(|| GrammarError::UnknownSymbol {
                name: start_name.clone().into(),
            })?;

        // Production 0 is the augmented S' -> S STOP.
        let mut productions = vec![Production {
            symbol: NonTermIndex::AUGMENTED,
            rhs: Rhs::from_slice(&[
                Symbol::NonTerminal(start),
                Symbol::Terminal(TermIndex::STOP),
            ]),
            priority: DEFAULT_PRIORITY,
            assoc: Associativity::None,
            dynamic: false,
            no_prefer_shift: false,
            no_prefer_shift_over_empty: false,
            named: Vec::new(),
            meta: HashMap::new(),
        }];

        for RuleSpec {
            name: rule_name,
            productions: rule_productions,
        } in self.rules
        {
            let lhs = nonterm_by_name[&rule_name];
            let production_str = |rhs: &[CompactString]| {
                let rhs = rhs.iter().map(CompactString::as_str).collect::<Vec<_>>();
                format!("{rule_name} -> {}", rhs.join(" "))
            };
            for spec in rule_productions {
                let mut rhs = Rhs::new();
                for element in &spec.rhs {
                    if element == "EMPTY" {
                        // EMPTY marks an explicitly empty alternative; it
                        // matches nothing and contributes no symbol.
                        continue;
                    }
                    if element == "STOP" || element == "S'" {
                        return Err(GrammarError::UndefinedSymbol {
                            name: element.clone().into(),
                            production: production_str(&spec.rhs),
                        });
                    }
                    let symbol = if let Some(literal) = as_inline_literal(element) {
                        let next = TermIndex(terminals.len());
                        let index = *term_by_literal.entry(literal.to_owned()).or_insert(next);
                        if index == next {
                            term_by_name.entry(literal.into()).or_insert(index);
                            terminals.push(Terminal {
                                name: literal.into(),
                                recognizer: Recognizer::string(literal),
                                priority: DEFAULT_PRIORITY,
                                prefer: false,
                                finish: false,
                                keyword: false,
                                dynamic: false,
                                meta: HashMap::new(),
                            });
                        }
                        Symbol::Terminal(index)
                    } else if let Some(&t) = term_by_name.get(element) {
                        Symbol::Terminal(t)
                    } else if let Some(&n) = nonterm_by_name.get(element) {
                        Symbol::NonTerminal(n)
                    } else {
                        return Err(GrammarError::UndefinedSymbol {
                            name: element.clone().into(),
                            production: production_str(&spec.rhs),
                        });
                    };
                    rhs.push(symbol);
                }

                let index = ProdIndex(productions.len());
                nonterminals[lhs.0].productions.push(index);
                productions.push(Production {
                    symbol: lhs,
                    rhs,
                    priority: spec.priority,
                    assoc: spec.assoc,
                    dynamic: spec.dynamic,
                    no_prefer_shift: spec.no_prefer_shift,
                    no_prefer_shift_over_empty: spec.no_prefer_shift_over_empty,
                    named: spec.named,
                    meta: spec.meta,
                });
            }
        }

        let grammar = Grammar {
            terminals,
            nonterminals,
            productions,
            start,
            layout,
            term_by_name,
            nonterm_by_name,
        };
        super::validate::validate(&grammar)?;
        Ok(grammar)
    }
}

fn as_inline_literal(element: &str) -> Option<&str> {
    element
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .filter(|literal| !literal.is_empty())
}

/// Per-terminal configuration used by [`GrammarBuilder::terminal`].
#[derive(Debug)]
pub struct TerminalBuilder {
    name: CompactString,
    recognizer: Result<Recognizer, GrammarError>,
    priority: i32,
    prefer: bool,
    finish: bool,
    keyword: bool,
    dynamic: bool,
    meta: HashMap<CompactString, Value<'static>>,
}

impl TerminalBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            recognizer: Ok(Recognizer::None),
            priority: DEFAULT_PRIORITY,
            prefer: false,
            finish: false,
            keyword: false,
            dynamic: false,
            meta: HashMap::new(),
        }
    }

    /// Literal string recognizer.
    #[must_use]
    pub fn string(mut self, literal: impl Into<String>) -> Self {
        self.recognizer = Ok(Recognizer::string(literal));
        self
    }

    /// Case-insensitive literal string recognizer.
    #[must_use]
    pub fn string_ignore_case(mut self, literal: impl Into<String>) -> Self {
        self.recognizer = Ok(Recognizer::string_ignore_case(literal));
        self
    }

    /// Regex recognizer; compile errors surface from
    /// [`GrammarBuilder::build`].
    #[must_use]
    pub fn regex(mut self, pattern: &str) -> Self {
        self.recognizer = Recognizer::regex(pattern);
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Win lexical ties against other terminals of the same priority and
    /// match length.
    #[must_use]
    pub fn prefer(mut self) -> Self {
        self.prefer = true;
        self
    }

    /// Stop scanning other terminals once this one matches.
    #[must_use]
    pub fn finish(mut self) -> Self {
        self.finish = true;
        self
    }

    /// Require a word boundary after the match.
    #[must_use]
    pub fn keyword(mut self) -> Self {
        self.keyword = true;
        self
    }

    /// Route actions over this terminal through the dynamic disambiguation
    /// filter.
    #[must_use]
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    #[must_use]
    pub fn meta(mut self, key: &str, value: Value<'static>) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

/// Collects the productions of one rule.
#[derive(Debug, Default)]
pub struct RuleBuilder {
    productions: Vec<ProductionSpec>,
}

impl RuleBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Add a production with default settings.
    #[must_use]
    pub fn prod(self, rhs: &[&str]) -> Self {
        self.prod_with(rhs, |p| p)
    }

    /// Add an explicitly empty production.
    #[must_use]
    pub fn empty_prod(self) -> Self {
        self.prod(&[])
    }

    /// Add a production configured through the closure.
    #[must_use]
    pub fn prod_with(
        mut self,
        rhs: &[&str],
        f: impl FnOnce(ProductionBuilder) -> ProductionBuilder,
    ) -> Self {
        let built = f(ProductionBuilder::new(rhs));
        self.productions.push(built.spec);
        self
    }
}

/// Per-production configuration used by [`RuleBuilder::prod_with`].
#[derive(Debug)]
pub struct ProductionBuilder {
    spec: ProductionSpec,
}

impl ProductionBuilder {
    fn new(rhs: &[&str]) -> Self {
        Self {
            spec: ProductionSpec {
                rhs: rhs.iter().map(|s| CompactString::from(*s)).collect(),
                priority: DEFAULT_PRIORITY,
                assoc: Associativity::None,
                dynamic: false,
                no_prefer_shift: false,
                no_prefer_shift_over_empty: false,
                named: Vec::new(),
                meta: HashMap::new(),
            },
        }
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.spec.priority = priority;
        self
    }

    #[must_use]
    pub fn assoc_left(mut self) -> Self {
        self.spec.assoc = Associativity::Left;
        self
    }

    #[must_use]
    pub fn assoc_right(mut self) -> Self {
        self.spec.assoc = Associativity::Right;
        self
    }

    /// Route reductions by this production through the dynamic
    /// disambiguation filter.
    #[must_use]
    pub fn dynamic(mut self) -> Self {
        self.spec.dynamic = true;
        self
    }

    /// Opt this production out of the parser-wide `prefer_shifts` policy.
    #[must_use]
    pub fn no_prefer_shift(mut self) -> Self {
        self.spec.no_prefer_shift = true;
        self
    }

    /// Opt this production out of the parser-wide
    /// `prefer_shifts_over_empty` policy.
    #[must_use]
    pub fn no_prefer_shift_over_empty(mut self) -> Self {
        self.spec.no_prefer_shift_over_empty = true;
        self
    }

    /// Name the match at `rhs_index`, for the `obj` built-in action.
    #[must_use]
    pub fn named(mut self, name: &str, rhs_index: usize) -> Self {
        self.spec.named.push((name.into(), rhs_index));
        self
    }

    #[must_use]
    pub fn meta(mut self, key: &str, value: Value<'static>) -> Self {
        self.spec.meta.insert(key.into(), value);
        self
    }
}
