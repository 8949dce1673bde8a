//! Scannerless token recognition runtime
//!
//! There is no tokenization pass. At every parse position the driver asks
//! this runtime for the tokens the *current state* can accept: the
//! terminals with ACTION entries are tried in the table's scanning order,
//! layout is consumed first, and the successful matches go through lexical
//! disambiguation.
//!
//! `STOP` never competes with real matches: it is appended as an extra
//! candidate when the position is at end of input, or whenever the state
//! expects it and the parser was configured not to consume the whole input
//! (that is how prefix parses arise).

use crate::grammar::{Grammar, TermIndex};
use crate::recognizer::CustomRecognizerFn;
use crate::table::{LrTable, StateId};
use crate::token::Token;
use hashbrown::HashMap;
use smallvec::SmallVec;

/// Candidate tokens at one position.
pub(crate) type Candidates<'i> = SmallVec<[Token<'i>; 2]>;

/// Token recognition configuration shared by both drivers.
pub(crate) struct Scanner<'g> {
    grammar: &'g Grammar,
    custom: HashMap<TermIndex, CustomRecognizerFn, ahash::RandomState>,
    /// Whitespace characters skipped between tokens when the grammar has no
    /// `LAYOUT` rule. `None` disables skipping.
    ws: Option<String>,
    lexical_disambiguation: bool,
    consume_input: bool,
}

impl<'g> Scanner<'g> {
    pub(crate) fn new(
        grammar: &'g Grammar,
        custom: HashMap<TermIndex, CustomRecognizerFn, ahash::RandomState>,
        ws: Option<String>,
        lexical_disambiguation: bool,
        consume_input: bool,
    ) -> Self {
        Self {
            grammar,
            custom,
            ws,
            lexical_disambiguation,
            consume_input,
        }
    }

    pub(crate) const fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Consume configured whitespace starting at `pos`. Layout grammars are
    /// handled by the drivers, which run a nested parser instead.
    pub(crate) fn skip_ws<'i>(&self, input: &'i str, pos: usize) -> (usize, &'i str) {
        let Some(ws) = &self.ws else {
            return (pos, "");
        };
        let mut end = pos;
        for c in input[pos..].chars() {
            if !ws.contains(c) {
                break;
            }
            end += c.len_utf8();
        }
        (end, &input[pos..end])
    }

    /// Recognize the tokens acceptable in `state` at `pos`.
    ///
    /// Returns the lexically disambiguated real matches followed by a
    /// `STOP` candidate when one applies. The deterministic driver treats
    /// more than one real candidate as a disambiguation error; the GLR
    /// driver forks on all of them.
    pub(crate) fn next_tokens<'i>(
        &self,
        table: &LrTable,
        state: StateId,
        input: &'i str,
        pos: usize,
    ) -> Candidates<'i> {
        let mut matches: SmallVec<[(TermIndex, usize, Option<std::rc::Rc<dyn std::any::Any>>); 4]> =
            SmallVec::new();
        // Determined up front: a finish short-circuit below must not hide
        // an expected STOP.
        let stop_expected = !table.actions(state, TermIndex::STOP).is_empty();

        for row in table.rows(state) {
            let terminal = row.terminal;
            if terminal == TermIndex::STOP || terminal == TermIndex::EMPTY {
                continue;
            }
            if let Some(m) = self.recognize_one(terminal, input, pos) {
                matches.push((terminal, m.length, m.additional_data));
                if row.finish {
                    break;
                }
            }
        }

        if self.lexical_disambiguation {
            self.disambiguate(&mut matches);
        }

        let mut tokens: Candidates<'i> = matches
            .into_iter()
            .map(|(terminal, length, additional_data)| Token {
                terminal,
                value: &input[pos..pos + length],
                start: pos,
                layout_content: "",
                additional_data,
            })
            .collect();

        if pos == input.len() || (!self.consume_input && stop_expected) {
            tokens.push(Token::new(TermIndex::STOP, &input[pos..pos], pos));
        }
        tokens
    }

    fn recognize_one(
        &self,
        terminal: TermIndex,
        input: &str,
        pos: usize,
    ) -> Option<crate::recognizer::TokenMatch> {
        let term = self.grammar.terminal(terminal);
        if let Some(custom) = self.custom.get(&terminal) {
            // A zero-length match would stall the drivers; only STOP may be
            // empty.
            return custom(input, pos).filter(|m| m.length > 0);
        }
        term.recognizer.recognize(input, pos, term.keyword)
    }

    /// Lexical disambiguation over the successful matches:
    /// highest terminal priority, then string recognizers over regex
    /// recognizers, then longest match, then the `prefer` flag.
    fn disambiguate(
        &self,
        matches: &mut SmallVec<[(TermIndex, usize, Option<std::rc::Rc<dyn std::any::Any>>); 4]>,
    ) {
        if matches.len() <= 1 {
            return;
        }

        let max_priority = matches
            .iter()
            .map(|(t, _, _)| self.grammar.terminal(*t).priority)
            .max()
            .unwrap_or_default();
        matches.retain(|(t, _, _)| self.grammar.terminal(*t).priority == max_priority);

        let is_string =
            |t: &TermIndex| !self.custom.contains_key(t) && self.grammar.terminal(*t).recognizer.is_string();
        if matches.iter().any(|(t, _, _)| is_string(t)) {
            matches.retain(|(t, _, _)| is_string(t));
        }

        let max_len = matches.iter().map(|(_, len, _)| *len).max().unwrap_or(0);
        matches.retain(|(_, len, _)| *len == max_len);

        if matches.iter().any(|(t, _, _)| self.grammar.terminal(*t).prefer) {
            matches.retain(|(t, _, _)| self.grammar.terminal(*t).prefer);
        }
    }

    /// Everything the recognizers could produce at `pos` across the whole
    /// terminal set, for error reporting. Terminals carrying the
    /// `unexpected: false` meta flag are left out.
    pub(crate) fn tokens_ahead(&self, input: &str, pos: usize) -> Vec<String> {
        let mut ahead = Vec::new();
        for terminal in self.grammar.term_indices() {
            if terminal == TermIndex::STOP || terminal == TermIndex::EMPTY {
                continue;
            }
            let term = self.grammar.terminal(terminal);
            if !term.reported_as_expected() {
                continue;
            }
            if let Some(m) = self.recognize_one(terminal, input, pos) {
                ahead.push(format!("{}(\"{}\")", term.name, &input[pos..pos + m.length]));
            }
        }
        ahead
    }

    /// Scan forward from `pos` for the first position where one of
    /// `expected` recognizes a token. Default error recovery.
    pub(crate) fn scan_for_expected<'i>(
        &self,
        input: &'i str,
        mut pos: usize,
        expected: &[TermIndex],
    ) -> Option<Token<'i>> {
        while pos <= input.len() {
            for &terminal in expected {
                if terminal == TermIndex::STOP || terminal == TermIndex::EMPTY {
                    continue;
                }
                if let Some(m) = self.recognize_one(terminal, input, pos) {
                    return Some(Token {
                        terminal,
                        value: &input[pos..pos + m.length],
                        start: pos,
                        layout_content: "",
                        additional_data: m.additional_data,
                    });
                }
            }
            match input[pos..].chars().next() {
                Some(c) => pos += c.len_utf8(),
                None => break,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use crate::table::{LrTable, TableConfig};

    fn scanner_for(grammar: &Grammar) -> (Scanner<'_>, LrTable) {
        let table = LrTable::build(grammar, TableConfig::default());
        let scanner = Scanner::new(grammar, HashMap::default(), Some(" \n\t".to_owned()), true, true);
        (scanner, table)
    }

    #[test]
    fn keyword_loses_to_identifier_on_longer_word() {
        let grammar = Grammar::builder()
            .terminal("for_kw", |t| t.string("for").keyword())
            .terminal_regex("id", r"[a-zA-Z_]\w*")
            .rule("S", |r| r.prod(&["for_kw", "id"]))
            .build()
            .unwrap();
        let (scanner, table) = scanner_for(&grammar);

        let tokens = scanner.next_tokens(&table, StateId(0), "fortune", 0);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].terminal, grammar.term_by_name("id").unwrap());
        assert_eq!(tokens[0].value, "fortune");
    }

    #[test]
    fn string_beats_regex_of_same_priority() {
        let grammar = Grammar::builder()
            .terminal_str("kw", "let")
            .terminal_regex("id", r"[a-z]+")
            .rule("S", |r| r.prod(&["kw"]).prod(&["id"]))
            .build()
            .unwrap();
        let (scanner, table) = scanner_for(&grammar);

        let tokens = scanner.next_tokens(&table, StateId(0), "let", 0);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].terminal, grammar.term_by_name("kw").unwrap());
    }

    #[test]
    fn stop_candidate_at_end_of_input() {
        let grammar = Grammar::builder()
            .terminal_str("a", "a")
            .rule("S", |r| r.prod(&["a"]))
            .build()
            .unwrap();
        let (scanner, table) = scanner_for(&grammar);

        let tokens = scanner.next_tokens(&table, StateId(0), "", 0);
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_stop());
    }

    #[test]
    fn ws_skipping_records_layout() {
        let grammar = Grammar::builder()
            .terminal_str("a", "a")
            .rule("S", |r| r.prod(&["a"]))
            .build()
            .unwrap();
        let (scanner, _) = scanner_for(&grammar);
        let (pos, layout) = scanner.skip_ws("  \n a", 0);
        assert_eq!(pos, 4);
        assert_eq!(layout, "  \n ");
    }

    #[test]
    fn recovery_scan_finds_next_expected_token() {
        let grammar = Grammar::builder()
            .terminal_regex("num", r"\d+")
            .rule("S", |r| r.prod(&["num"]))
            .build()
            .unwrap();
        let (scanner, _) = scanner_for(&grammar);
        let num = grammar.term_by_name("num").unwrap();
        let token = scanner.scan_for_expected("?! 42", 0, &[num]).unwrap();
        assert_eq!(token.start, 3);
        assert_eq!(token.value, "42");
    }
}
