//! End-to-end tests for the GLR driver and the parse forest

use scanlr::{
    call_actions, ActionSet, Context, DynamicAction, Grammar, GlrParser, GlrParserBuilder, Parser,
    Value,
};

fn ambiguous_expr_grammar() -> Grammar {
    Grammar::builder()
        .terminal_regex("num", r"\d+")
        .rule("E", |r| {
            r.prod(&["E", "'+'", "E"])
                .prod(&["E", "'*'", "E"])
                .prod(&["num"])
        })
        .build()
        .unwrap()
}

fn eval_actions() -> ActionSet {
    fn binop<'g, 'i>(_: &Context<'g, 'i>, children: Vec<Value<'i>>) -> Value<'i> {
        let left = children[0].as_f64().expect("left");
        let right = children[2].as_f64().expect("right");
        match children[1].as_str().expect("op") {
            "+" => Value::Float(left + right),
            "*" => Value::Float(left * right),
            other => panic!("unexpected operator {other}"),
        }
    }
    fn number<'g, 'i>(_: &Context<'g, 'i>, children: Vec<Value<'i>>) -> Value<'i> {
        Value::Float(children[0].as_str().expect("digits").parse().expect("f64"))
    }
    ActionSet::new().with_per_production(
        "E",
        vec![Box::new(binop), Box::new(binop), Box::new(number)],
    )
}

#[test]
fn ambiguous_expression_yields_two_solutions() {
    let grammar = ambiguous_expr_grammar();
    let mut parser = GlrParser::new(&grammar).unwrap();

    let forest = parser.parse("1 + 2 * 3").unwrap();
    assert!(forest.is_finite());
    assert_eq!(forest.solutions(), 2);
    assert_eq!(forest.ambiguities(), 1);

    let actions = eval_actions();
    let mut values: Vec<f64> = (0..forest.solutions())
        .map(|i| {
            let tree = forest.get_tree(i).unwrap().build();
            let mut ctx = Context::new(&grammar, "1 + 2 * 3", None);
            call_actions(&tree, &actions, &mut ctx).as_f64().unwrap()
        })
        .collect();
    values.sort_by(f64::total_cmp);
    assert_eq!(values, [7.0, 9.0]);
}

#[test]
fn enumeration_is_restartable_and_exhaustive() {
    let grammar = ambiguous_expr_grammar();
    let mut parser = GlrParser::new(&grammar).unwrap();
    let forest = parser.parse("1 + 2 * 3 + 4").unwrap();

    let first_pass: Vec<String> = forest.iter().map(|t| t.to_str()).collect();
    let second_pass: Vec<String> = forest.iter().map(|t| t.to_str()).collect();
    assert_eq!(first_pass, second_pass);
    assert_eq!(first_pass.len(), forest.solutions());

    // Every enumerated tree is distinct.
    let mut unique = first_pass.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), first_pass.len());
}

#[test]
fn forest_trees_cover_the_input_span() {
    let grammar = ambiguous_expr_grammar();
    let input = "1 + 2 * 3";
    let mut parser = GlrParser::new(&grammar).unwrap();
    let forest = parser.parse(input).unwrap();
    for tree in forest.iter() {
        assert_eq!(tree.start(), 0);
        assert_eq!(tree.end(), input.len());
    }
}

#[test]
fn lr_and_glr_agree_on_unambiguous_grammars() {
    let grammar = Grammar::builder()
        .terminal_regex("num", r"\d+")
        .rule("Sum", |r| {
            r.prod(&["Sum", "'+'", "num"]).prod(&["num"])
        })
        .build()
        .unwrap();
    let input = "1 + 2 + 3";

    let mut lr = Parser::new(&grammar).unwrap();
    let lr_tree = lr.parse(input).unwrap();

    let mut glr = GlrParser::new(&grammar).unwrap();
    let forest = glr.parse(input).unwrap();
    assert_eq!(forest.solutions(), 1);
    let glr_tree = forest.get_first_tree().unwrap().build();

    assert_eq!(lr_tree.to_str(&grammar), glr_tree.to_str(&grammar));
}

#[test]
fn priorities_remove_ambiguity_in_glr_too() {
    let grammar = Grammar::builder()
        .terminal_regex("num", r"\d+")
        .rule("E", |r| {
            r.prod_with(&["E", "'+'", "E"], |p| p.priority(5).assoc_left())
                .prod_with(&["E", "'*'", "E"], |p| p.priority(6).assoc_left())
                .prod(&["num"])
        })
        .build()
        .unwrap();
    let mut parser = GlrParser::new(&grammar).unwrap();
    let forest = parser.parse("1 + 2 * 3").unwrap();
    assert_eq!(forest.solutions(), 1);
    assert_eq!(forest.ambiguities(), 0);
}

#[test]
fn forest_renderings_mark_ambiguity() {
    let grammar = ambiguous_expr_grammar();
    let mut parser = GlrParser::new(&grammar).unwrap();
    let forest = parser.parse("1 + 2 * 3").unwrap();

    assert!(forest.to_str().contains("ambiguity(2)"));
    let dot = forest.to_dot();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("lightsalmon"));
}

#[test]
fn lexical_forks_explore_both_terminals() {
    // Two terminals recognize the same text; the LR driver refuses, GLR
    // forks and keeps both derivations.
    let grammar = Grammar::builder()
        .terminal_regex("word", r"[a-z]+")
        .terminal_regex("name", r"[a-z]+")
        .rule("S", |r| r.prod(&["word"]).prod(&["name"]))
        .build()
        .unwrap();
    let mut parser = GlrParser::new(&grammar).unwrap();
    let forest = parser.parse("abc").unwrap();
    assert_eq!(forest.solutions(), 2);
    assert_eq!(forest.ambiguities(), 1);
}

#[test]
fn empty_productions_reduce_within_the_frontier() {
    // As: As 'a' | EMPTY;
    let grammar = Grammar::builder()
        .rule("As", |r| r.prod(&["As", "'a'"]).prod(&["EMPTY"]))
        .build()
        .unwrap();
    let mut parser = GlrParser::new(&grammar).unwrap();

    let forest = parser.parse("aaa").unwrap();
    assert_eq!(forest.solutions(), 1);
    let tree = forest.get_first_tree().unwrap();
    assert_eq!(tree.end(), 3);

    let empty = parser.parse("").unwrap();
    assert_eq!(empty.solutions(), 1);
}

#[test]
fn cyclic_grammar_produces_an_infinite_forest() {
    // A: A | 'a'; admits infinitely many derivations of "a".
    let grammar = Grammar::builder()
        .rule("A", |r| r.prod(&["A"]).prod(&["'a'"]))
        .build()
        .unwrap();
    let mut parser = GlrParser::new(&grammar).unwrap();
    let forest = parser.parse("a").unwrap();

    assert!(!forest.is_finite());
    assert_eq!(forest.ambiguities(), 1);
    let first = forest.get_first_tree().unwrap();
    assert_eq!(first.start(), 0);
    assert_eq!(first.end(), 1);
}

#[test]
fn prefix_parses_are_returned_when_consume_input_is_off() {
    // S: S 'a' | 'a'; on "aaa" the prefixes "a", "aa", "aaa" all parse.
    let grammar = Grammar::builder()
        .rule("S", |r| r.prod(&["S", "'a'"]).prod(&["'a'"]))
        .build()
        .unwrap();
    let mut parser = GlrParserBuilder::new(&grammar)
        .consume_input(false)
        .build()
        .unwrap();
    let forest = parser.parse("aaa").unwrap();
    assert_eq!(forest.solutions(), 3);
}

#[test]
fn dynamic_filter_prunes_alternatives() {
    // Right-associativity enforced dynamically: reject reducing E + E
    // while another '+' is ahead.
    let grammar = Grammar::builder()
        .terminal_regex("num", r"\d+")
        .rule("E", |r| {
            r.prod_with(&["E", "'+'", "E"], |p| p.dynamic()).prod(&["num"])
        })
        .build()
        .unwrap();

    let mut unfiltered = GlrParser::new(&grammar).unwrap();
    let without = unfiltered.parse("1 + 2 + 3").unwrap();
    assert_eq!(without.solutions(), 2);

    let mut parser = GlrParserBuilder::new(&grammar)
        .dynamic_filter(Box::new(|call| {
            let Some(call) = call else {
                // Initialization call at parse start.
                return true;
            };
            match call.action {
                DynamicAction::Reduce => call
                    .token
                    .is_none_or(|t| t.value != "+"),
                DynamicAction::Shift => true,
            }
        }))
        .build()
        .unwrap();
    let forest = parser.parse("1 + 2 + 3").unwrap();
    assert_eq!(forest.solutions(), 1);
}

#[test]
fn glr_works_with_a_layout_grammar() {
    let grammar = Grammar::builder()
        .terminal_regex("num", r"\d+")
        .terminal_regex("ws", r"\s+")
        .rule("E", |r| {
            r.prod(&["E", "'+'", "E"]).prod(&["num"])
        })
        .rule("LAYOUT", |r| r.prod(&["ws"]).prod(&["EMPTY"]))
        .build()
        .unwrap();
    let mut parser = GlrParser::new(&grammar).unwrap();
    let forest = parser.parse("1 + 2 + 3").unwrap();
    assert_eq!(forest.solutions(), 2);
}

#[test]
fn failed_glr_parse_reports_the_dying_heads() {
    let grammar = ambiguous_expr_grammar();
    let mut parser = GlrParser::new(&grammar).unwrap();
    let err = parser.parse("1 + + 2").unwrap_err();
    let scanlr::ParseError::UnexpectedInput {
        symbols_expected,
        last_heads,
        ..
    } = &err
    else {
        panic!("expected UnexpectedInput");
    };
    assert!(symbols_expected.iter().any(|s| s == "num"));
    assert!(!last_heads.is_empty());
}

#[test]
fn raising_priority_never_adds_trees() {
    let flat = ambiguous_expr_grammar();
    let prioritized = Grammar::builder()
        .terminal_regex("num", r"\d+")
        .rule("E", |r| {
            r.prod(&["E", "'+'", "E"])
                .prod_with(&["E", "'*'", "E"], |p| p.priority(15))
                .prod(&["num"])
        })
        .build()
        .unwrap();

    for input in ["1 + 2 * 3", "1 * 2 + 3", "1 + 2", "7"] {
        let mut base = GlrParser::new(&flat).unwrap();
        let mut raised = GlrParser::new(&prioritized).unwrap();
        let base_solutions = base.parse(input).unwrap().solutions();
        let raised_solutions = raised.parse(input).unwrap().solutions();
        assert!(
            raised_solutions <= base_solutions,
            "{input}: {raised_solutions} > {base_solutions}"
        );
    }
}
