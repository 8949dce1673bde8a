//! End-to-end tests for the deterministic LR driver

use scanlr::{
    ActionSet, Context, ErrorRecovery, Grammar, ParseError, Parser, ParserBuilder, TokenMatch,
    TreeNode, Value,
};

fn arithmetic_grammar() -> Grammar {
    Grammar::builder()
        .terminal_regex("num", r"\d+(\.\d+)?")
        .rule("E", |r| {
            r.prod_with(&["E", "'+'", "E"], |p| p.priority(5).assoc_left())
                .prod_with(&["E", "'-'", "E"], |p| p.priority(5).assoc_left())
                .prod_with(&["E", "'*'", "E"], |p| p.priority(6).assoc_left())
                .prod_with(&["E", "'/'", "E"], |p| p.priority(6).assoc_left())
                .prod_with(&["E", "'^'", "E"], |p| p.priority(7).assoc_right())
                .prod(&["'('", "E", "')'"])
                .prod(&["num"])
        })
        .build()
        .unwrap()
}

fn binop<'g, 'i>(ctx: &Context<'g, 'i>, children: Vec<Value<'i>>) -> Value<'i> {
    let left = children[0].as_f64().expect("left operand");
    let right = children[2].as_f64().expect("right operand");
    let op = children[1].as_str().expect("operator");
    let result = match op {
        "+" => left + right,
        "-" => left - right,
        "*" => left * right,
        "/" => left / right,
        "^" => left.powf(right),
        other => panic!("unexpected operator {other}"),
    };
    let _ = ctx;
    Value::Float(result)
}

fn paren<'g, 'i>(_ctx: &Context<'g, 'i>, mut children: Vec<Value<'i>>) -> Value<'i> {
    children.swap_remove(1)
}

fn number<'g, 'i>(_ctx: &Context<'g, 'i>, children: Vec<Value<'i>>) -> Value<'i> {
    Value::Float(children[0].as_str().expect("digits").parse().expect("f64"))
}

fn arithmetic_actions() -> ActionSet {
    ActionSet::new().with_per_production(
        "E",
        vec![
            Box::new(binop),
            Box::new(binop),
            Box::new(binop),
            Box::new(binop),
            Box::new(binop),
            Box::new(paren),
            Box::new(number),
        ],
    )
}

#[test]
fn arithmetic_with_priorities_evaluates() {
    let grammar = arithmetic_grammar();
    let mut parser = Parser::new(&grammar).unwrap();
    let result = parser
        .parse_with_actions("34 + 4.6 / 2 * 4^2^2 + 78", &arithmetic_actions())
        .unwrap();
    let value = result.as_f64().unwrap();
    assert!((value - 700.8).abs() < 1e-9, "got {value}");
}

#[test]
fn tree_then_walk_matches_inline_actions() {
    let grammar = arithmetic_grammar();
    let mut parser = Parser::new(&grammar).unwrap();
    let input = "2 * (3 + 4)";

    let inline = parser
        .parse_with_actions(input, &arithmetic_actions())
        .unwrap();
    let tree = parser.parse(input).unwrap();
    let mut ctx = Context::new(&grammar, input, None);
    let walked = scanlr::call_actions(&tree, &arithmetic_actions(), &mut ctx);

    assert_eq!(inline.as_f64(), walked.as_f64());
    assert_eq!(inline.as_f64(), Some(14.0));
}

#[test]
fn optional_symbol_matches_presence_and_absence() {
    // S: 'a' b? 'c';
    let grammar = Grammar::builder()
        .terminal_str("b", "b")
        .rule("S", |r| r.prod(&["'a'", "Bopt", "'c'"]))
        .rule("Bopt", |r| r.prod(&["b"]).prod(&["EMPTY"]))
        .build()
        .unwrap();
    let actions = ActionSet::new().with_builtin("Bopt", "optional");
    let mut parser = Parser::new(&grammar).unwrap();

    let with_b = parser.parse_with_actions("a b c", &actions).unwrap();
    let Value::List(items) = with_b else {
        panic!("expected list, got {with_b:?}");
    };
    assert_eq!(items[0].as_str(), Some("a"));
    assert_eq!(items[1].as_str(), Some("b"));
    assert_eq!(items[2].as_str(), Some("c"));

    let without_b = parser.parse_with_actions("a c", &actions).unwrap();
    let Value::List(items) = without_b else {
        panic!("expected list, got {without_b:?}");
    };
    assert_eq!(items[0].as_str(), Some("a"));
    assert!(items[1].is_none());
    assert_eq!(items[2].as_str(), Some("c"));
}

#[test]
fn one_or_more_with_separator() {
    // S: 'x' e+[,];
    let grammar = Grammar::builder()
        .terminal_regex("e", r"\d+")
        .rule("S", |r| r.prod(&["'x'", "Es"]))
        .rule("Es", |r| r.prod(&["Es", "','", "e"]).prod(&["e"]))
        .build()
        .unwrap();
    let actions = ActionSet::new().with_builtin("Es", "collect_sep");
    let mut parser = Parser::new(&grammar).unwrap();

    let result = parser.parse_with_actions("x 1, 2, 3", &actions).unwrap();
    let Value::List(items) = result else {
        panic!("expected list");
    };
    assert_eq!(items[0].as_str(), Some("x"));
    let Value::List(es) = &items[1] else {
        panic!("expected inner list");
    };
    let es: Vec<_> = es.iter().filter_map(Value::as_str).collect();
    assert_eq!(es, ["1", "2", "3"]);
}

#[test]
fn missing_repetition_reports_expected_symbols() {
    let grammar = Grammar::builder()
        .terminal_regex("e", r"\d+")
        .rule("S", |r| r.prod(&["'x'", "Es"]))
        .rule("Es", |r| r.prod(&["Es", "','", "e"]).prod(&["e"]))
        .build()
        .unwrap();
    let mut parser = Parser::new(&grammar).unwrap();

    let err = parser.parse("x").unwrap_err();
    let ParseError::UnexpectedInput {
        symbols_expected, ..
    } = &err
    else {
        panic!("expected UnexpectedInput, got {err}");
    };
    assert!(symbols_expected.iter().any(|s| s == "e"), "{err}");
}

#[test]
fn layout_rule_consumes_comments_and_exposes_content() {
    let grammar = Grammar::builder()
        .terminal_regex("num", r"\d+")
        .terminal_regex("ws", r"\s+")
        .terminal_regex("comment", r"//.*")
        .rule("S", |r| r.prod(&["num", "'+'", "num"]))
        .rule("LAYOUT", |r| {
            r.prod(&["LAYOUT", "Discard"]).prod(&["Discard"]).prod(&["EMPTY"])
        })
        .rule("Discard", |r| r.prod(&["ws"]).prod(&["comment"]))
        .build()
        .unwrap();
    let mut parser = Parser::new(&grammar).unwrap();

    let input = "1 + // sum\n 2";
    let tree = parser.parse(input).unwrap();
    let TreeNode::NonTerm { children, .. } = &tree else {
        panic!("expected non-terminal root");
    };
    let TreeNode::Term { token } = &children[2] else {
        panic!("expected terminal");
    };
    assert_eq!(token.value, "2");
    assert_eq!(token.layout_content, " // sum\n ");
}

#[test]
fn layout_round_trip_reconstructs_input() {
    let grammar = Grammar::builder()
        .terminal_regex("num", r"\d+")
        .terminal_regex("ws", r"\s+")
        .terminal_regex("comment", r"//.*")
        .rule("S", |r| r.prod(&["num", "'+'", "num"]))
        .rule("LAYOUT", |r| {
            r.prod(&["LAYOUT", "Discard"]).prod(&["Discard"]).prod(&["EMPTY"])
        })
        .rule("Discard", |r| r.prod(&["ws"]).prod(&["comment"]))
        .build()
        .unwrap();
    let mut parser = Parser::new(&grammar).unwrap();

    let input = "1 + // sum\n 2";
    let tree = parser.parse(input).unwrap();
    let mut rebuilt = String::new();
    fn collect(node: &TreeNode<'_>, out: &mut String) {
        match node {
            TreeNode::Term { token } => {
                out.push_str(token.layout_content);
                out.push_str(token.value);
            }
            TreeNode::NonTerm { children, .. } => {
                for child in children {
                    collect(child, out);
                }
            }
        }
    }
    collect(&tree, &mut rebuilt);
    assert_eq!(rebuilt, input);
}

#[test]
fn keyword_terminals_respect_word_boundaries() {
    // S: "for" ID "=" INT "to" INT;
    let grammar = Grammar::builder()
        .terminal("for_kw", |t| t.string("for").keyword())
        .terminal("to_kw", |t| t.string("to").keyword())
        .terminal_regex("id", r"[a-zA-Z_]\w*")
        .terminal_regex("int", r"\d+")
        .rule("S", |r| {
            r.prod(&["for_kw", "id", "'='", "int", "to_kw", "int"])
        })
        .build()
        .unwrap();
    let mut parser = Parser::new(&grammar).unwrap();

    assert!(parser.parse("fora=10 to20").is_err());
    assert!(parser.parse("for a = 10 to 20").is_ok());
}

#[test]
fn default_recovery_skips_garbage_and_records_the_error() {
    let grammar = Grammar::builder()
        .terminal_regex("num", r"\d+")
        .rule("E", |r| {
            r.prod_with(&["E", "'+'", "E"], |p| p.assoc_left()).prod(&["num"])
        })
        .build()
        .unwrap();
    let mut parser = ParserBuilder::new(&grammar)
        .error_recovery(ErrorRecovery::Default)
        .build()
        .unwrap();

    let tree = parser.parse("1 + ?! 2").unwrap();
    assert!(tree.is_nonterm());
    assert_eq!(parser.errors().len(), 1);
    assert!(parser.errors()[0].to_string().contains("expected"));
}

#[test]
fn custom_recovery_hook_can_reposition_the_parse() {
    let grammar = Grammar::builder()
        .terminal_regex("num", r"\d+")
        .rule("E", |r| {
            r.prod_with(&["E", "'+'", "E"], |p| p.assoc_left()).prod(&["num"])
        })
        .build()
        .unwrap();
    let mut parser = ParserBuilder::new(&grammar)
        .error_recovery(ErrorRecovery::Custom(Box::new(|ctx, _error| {
            // Skip a single offending byte and retry.
            ctx.start_position += 1;
            ctx.token_ahead = None;
            true
        })))
        .build()
        .unwrap();

    let tree = parser.parse("1 + ? 2").unwrap();
    assert!(tree.is_nonterm());
    assert_eq!(parser.errors().len(), 1);
}

#[test]
fn prefix_parse_with_consume_input_off() {
    let grammar = Grammar::builder()
        .rule("S", |r| r.prod(&["'a'", "'b'"]))
        .build()
        .unwrap();

    let mut strict = Parser::new(&grammar).unwrap();
    assert!(strict.parse("abc").is_err());

    let mut prefix = ParserBuilder::new(&grammar)
        .consume_input(false)
        .build()
        .unwrap();
    let tree = prefix.parse("abc").unwrap();
    assert_eq!(tree.end(), 2);
}

#[test]
fn custom_recognizer_registered_by_terminal_name() {
    let grammar = Grammar::builder()
        .terminal_external("even")
        .rule("S", |r| r.prod(&["even"]))
        .build()
        .unwrap();
    let mut parser = ParserBuilder::new(&grammar)
        .recognizer("even", |input, pos| {
            let len = input[pos..]
                .bytes()
                .take_while(|b| b.is_ascii_digit())
                .count();
            (len > 0 && input[pos..pos + len].parse::<u64>().ok()? % 2 == 0)
                .then(|| TokenMatch::new(len))
        })
        .build()
        .unwrap();

    assert!(parser.parse("42").is_ok());
    assert!(parser.parse("43").is_err());
}

#[test]
fn missing_recognizer_is_a_build_error() {
    let grammar = Grammar::builder()
        .terminal_external("mystery")
        .rule("S", |r| r.prod(&["mystery"]))
        .build()
        .unwrap();
    let err = Parser::new(&grammar).unwrap_err();
    assert!(err.to_string().contains("mystery"));
}

#[test]
fn conflicted_grammar_is_rejected_by_the_lr_driver() {
    // Ambiguous expression grammar with both policies off.
    let grammar = Grammar::builder()
        .terminal_regex("num", r"\d+")
        .rule("E", |r| r.prod(&["E", "'+'", "E"]).prod(&["num"]))
        .build()
        .unwrap();
    let err = ParserBuilder::new(&grammar)
        .prefer_shifts(false)
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("conflict"));
}

#[test]
fn lexical_ambiguity_is_fatal_for_lr() {
    // Two regex terminals matching the same text with equal priority.
    let grammar = Grammar::builder()
        .terminal_regex("id1", r"[a-z]+")
        .terminal_regex("id2", r"[a-z]+")
        .rule("S", |r| r.prod(&["id1"]).prod(&["id2"]))
        .build()
        .unwrap();
    let mut parser = Parser::new(&grammar).unwrap();
    let err = parser.parse("abc").unwrap_err();
    assert!(matches!(err, ParseError::Disambiguation { .. }));
}

#[test]
fn obj_action_builds_a_record_from_named_matches() {
    let grammar = Grammar::builder()
        .terminal_regex("id", r"[a-z]+")
        .terminal_regex("int", r"\d+")
        .rule("Assign", |r| {
            r.prod_with(&["id", "'='", "int"], |p| {
                p.named("name", 0).named("value", 2)
            })
        })
        .build()
        .unwrap();
    let actions = ActionSet::new().with_builtin("Assign", "obj");
    let mut parser = Parser::new(&grammar).unwrap();

    let result = parser.parse_with_actions("x = 5", &actions).unwrap();
    let fields = result.as_object().unwrap();
    assert_eq!(fields["name"].as_str(), Some("x"));
    assert_eq!(fields["value"].as_str(), Some("5"));
}

#[cfg(feature = "serialize")]
#[test]
fn parser_over_a_reloaded_table_behaves_identically() {
    use scanlr::{LrTable, TableConfig};

    let grammar = arithmetic_grammar();
    let table = LrTable::build(&grammar, TableConfig::default());
    let snapshot = table.snapshot().unwrap();

    let mut fresh = Parser::new(&grammar).unwrap();
    let mut reloaded = ParserBuilder::new(&grammar)
        .table(LrTable::from_snapshot(&snapshot).unwrap())
        .build()
        .unwrap();

    let input = "1 + 2 * 3";
    let a = fresh.parse(input).unwrap().to_str(&grammar);
    let b = reloaded.parse(input).unwrap().to_str(&grammar);
    assert_eq!(a, b);
}
