// tern-parser - Incremental parser tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Integration tests for the incremental parser: literals, containers,
//! reader macros, at-sign forms, long strings, streaming, error recovery
//! and the feeding contract.

mod common;

use common::*;
use tern_parser::{ConsumeError, FrameKind, MAX_VALUE_DEPTH, TernVal};

/// Feed `input` followed by a newline, then produce one form.
fn parse_streamed(input: &str) -> Option<TernVal> {
    let mut parser = Parser::new();
    feed(&mut parser, input);
    parser.consume(b'\n').unwrap();
    assert_eq!(parser.status(), ParserStatus::Root, "input {:?}", input);
    parser.produce()
}

// =============================================================================
// Literals
// =============================================================================

#[test]
fn test_literals_streamed() {
    let cases = vec![
        ("nil", TernVal::nil()),
        ("true", TernVal::bool(true)),
        ("false", TernVal::bool(false)),
        ("hello", sym("hello")),
        (":hello", kw("hello")),
        ("\"hello\"", string("hello")),
        ("12.4", num(12.4)),
        ("-12.4", num(-12.4)),
    ];
    for (input, expected) in cases {
        assert_eq!(parse_streamed(input), Some(expected), "input {:?}", input);
    }
}

#[test]
fn test_numbers() {
    assert_reads!("0", num(0.0));
    assert_reads!("1_000_000", num(1_000_000.0));
    assert_reads!("0xFF", num(255.0));
    assert_reads!("8r777", num(511.0));
    assert_reads!("1e-2", num(0.01));
    assert_reads!(".5", num(0.5));
    assert_reads!("-.5", num(-0.5));
}

#[test]
fn test_number_like_symbols() {
    assert_reads!("+", sym("+"));
    assert_reads!("-foo", sym("-foo"));
    assert_reads!(".method", sym(".method"));
    assert_reads!("...", sym("..."));
}

#[test]
fn test_keywords() {
    assert_reads!(":", kw(""));
    assert_reads!(":a/b", kw("a/b"));
    assert_reads!("::x", kw(":x"));
}

#[test]
fn test_string_drops_raw_newlines() {
    assert_reads!("\"a\nb\r\nc\"", string("abc"));
    assert_reads!("\"a\\nb\"", string("a\nb"));
}

#[test]
fn test_hex_escape_any_byte() {
    assert_reads!("\"\\xff\\x00\"", TernVal::string([0xffu8, 0x00]));
}

// =============================================================================
// Containers
// =============================================================================

#[test]
fn test_tuple() {
    let value = read_one("(1 :hello)");
    let tuple = value.as_tuple().expect("tuple");
    assert_eq!(tuple.len(), 2);
    assert_eq!(tuple.get(0), Some(&num(1.0)));
    assert_eq!(tuple.get(1), Some(&kw("hello")));
    assert!(!tuple.is_bracketed());
}

#[test]
fn test_bracket_tuple() {
    let parens = read_one("(1 :hello)");
    let brackets = read_one("[1 :hello]");
    assert!(brackets.as_tuple().expect("tuple").is_bracketed());
    assert_eq!(parens, brackets);
    assert_eq!(parens.hash().unwrap(), brackets.hash().unwrap());
}

#[test]
fn test_nested() {
    assert_reads!(
        "(a [b (c)] ())",
        TernVal::tuple(vec![
            sym("a"),
            TernVal::tuple(vec![sym("b"), TernVal::tuple(vec![sym("c")])]),
            TernVal::tuple(vec![]),
        ])
    );
}

#[test]
fn test_struct() {
    let expected =
        TernVal::structure(vec![(kw("a"), num(1.0)), (kw("b"), string("two"))]).unwrap();
    assert_reads!("{:a 1 :b \"two\"}", expected.clone());
    assert_reads!("{:b \"two\" :a 1}", expected);
}

#[test]
fn test_struct_duplicate_keys() {
    let value = read_one("{:a 1 :a 2}");
    let st = value.as_struct().expect("struct");
    assert_eq!(st.len(), 1);
    assert_eq!(st.get(&kw("a")).unwrap(), Some(&num(2.0)));
}

#[test]
fn test_tuple_positions() {
    let forms = read_all("(a)\n  (b\n   (c))").unwrap();
    let first = forms[0].as_tuple().unwrap();
    assert_eq!((first.line(), first.column()), (1, 1));

    let second = forms[1].as_tuple().unwrap();
    assert_eq!((second.line(), second.column()), (2, 3));
    let inner = second.get(1).unwrap().as_tuple().unwrap();
    assert_eq!((inner.line(), inner.column()), (3, 4));
}

#[test]
fn test_deep_struct_key_is_syntax_error() {
    let depth = tern_parser::MAX_VALUE_DEPTH + 4;
    let source = format!("{{{}{} 1}}", "(".repeat(depth), ")".repeat(depth));
    assert_read_err!(source.as_str(), "value nesting exceeds depth limit");
}

// =============================================================================
// Reader macros
// =============================================================================

#[test]
fn test_reader_macros() {
    let cases = [
        ("'x", "quote"),
        (",x", "unquote"),
        (";x", "splice"),
        ("~x", "quasiquote"),
        ("|x", "short-fn"),
    ];
    for (input, name) in cases {
        assert_reads!(input, TernVal::tuple(vec![sym(name), sym("x")]));
    }
}

#[test]
fn test_reader_macro_chain() {
    assert_reads!(
        "~(a ,b ;c)",
        TernVal::tuple(vec![
            sym("quasiquote"),
            TernVal::tuple(vec![
                sym("a"),
                TernVal::tuple(vec![sym("unquote"), sym("b")]),
                TernVal::tuple(vec![sym("splice"), sym("c")]),
            ]),
        ])
    );
    assert_reads!(
        "',x",
        TernVal::tuple(vec![
            sym("quote"),
            TernVal::tuple(vec![sym("unquote"), sym("x")]),
        ])
    );
}

#[test]
fn test_reader_macro_position() {
    let value = read_one("  'x");
    let tuple = value.as_tuple().unwrap();
    assert_eq!((tuple.line(), tuple.column()), (1, 3));
}

#[test]
fn test_short_fn() {
    assert_reads!(
        "|(+ $ 1)",
        TernVal::tuple(vec![
            sym("short-fn"),
            TernVal::tuple(vec![sym("+"), sym("$"), num(1.0)]),
        ])
    );
}

// =============================================================================
// At-sign forms
// =============================================================================

#[test]
fn test_at_array() {
    for input in ["@[1 2]", "@(1 2)"] {
        let value = read_one(input);
        match &value {
            TernVal::Array(array) => {
                assert_eq!(*array.items(), vec![num(1.0), num(2.0)]);
            }
            other => panic!("expected array for {}, got {}", input, other),
        }
    }
    // Fresh instance each time
    assert_ne!(read_one("@[]"), read_one("@[]"));
}

#[test]
fn test_at_table() {
    let value = read_one("@{:a 1}");
    match &value {
        TernVal::Table(table) => {
            assert_eq!(table.len(), 1);
            assert_eq!(table.get(&kw("a")).unwrap(), Some(num(1.0)));
        }
        other => panic!("expected table, got {}", other),
    }
}

#[test]
fn test_at_buffer() {
    match read_one("@\"hi\\n\"") {
        TernVal::Buffer(buffer) => assert_eq!(buffer.to_vec(), b"hi\n".to_vec()),
        other => panic!("expected buffer, got {}", other),
    }
    match read_one("@``raw`text``") {
        TernVal::Buffer(buffer) => assert_eq!(buffer.to_vec(), b"raw`text".to_vec()),
        other => panic!("expected buffer, got {}", other),
    }
}

#[test]
fn test_at_symbol_fallback() {
    assert_reads!("@foo", sym("@foo"));
    assert_reads!("@", sym("@"));
    assert_reads!("(@ x)", TernVal::tuple(vec![sym("@"), sym("x")]));
}

// =============================================================================
// Long strings
// =============================================================================

#[test]
fn test_long_string_basic() {
    assert_reads!("`hello`", string("hello"));
    assert_reads!("`a\\nb`", string("a\\nb"));
}

#[test]
fn test_long_string_needs_matching_run() {
    assert_reads!("``a`b``", string("a`b"));
    assert_reads!("```x``y```", string("x``y"));
}

#[test]
fn test_long_string_strips_one_newline_each_side() {
    assert_reads!("`\nhello\n`", string("hello"));
    assert_reads!("`\n\nhello\n\n`", string("\nhello\n"));
}

#[test]
fn test_long_string_streaming() {
    let mut parser = Parser::new();
    feed(&mut parser, "``one`");
    assert_eq!(parser.status(), ParserStatus::Pending);
    assert_eq!(parser.buffer(), b"one");
    feed(&mut parser, "`");
    // Closing run complete, but only the next byte ends the string
    assert!(!parser.has_more());
    feed(&mut parser, " ");
    assert_eq!(parser.produce(), Some(string("one")));
}

// =============================================================================
// Comments
// =============================================================================

#[test]
fn test_comments() {
    assert_reads!("# comment\n42", num(42.0));
    assert_reads!(
        "(1 # two\n 3)",
        TernVal::tuple(vec![num(1.0), num(3.0)])
    );
    assert!(read_all("# only a comment").unwrap().is_empty());
}

// =============================================================================
// Streaming
// =============================================================================

#[test]
fn test_pending_forms() {
    let mut parser = Parser::new();
    feed(&mut parser, "1 2 (3");
    assert_eq!(parser.pending(), 2);
    assert_eq!(parser.status(), ParserStatus::Pending);
    assert_eq!(parser.produce(), Some(num(1.0)));
    assert_eq!(parser.produce(), Some(num(2.0)));
    assert!(!parser.has_more());
    assert_eq!(parser.produce(), None);

    feed(&mut parser, ")");
    assert_eq!(parser.status(), ParserStatus::Root);
    assert_eq!(parser.produce(), Some(TernVal::tuple(vec![num(3.0)])));
}

#[test]
fn test_token_needs_delimiter() {
    let mut parser = Parser::new();
    feed(&mut parser, "hello");
    assert_eq!(parser.status(), ParserStatus::Pending);
    assert_eq!(parser.buffer(), b"hello");
    assert!(!parser.has_more());
    feed(&mut parser, ")");
    // The delimiter ends the token, then fails at the root
    assert!(parser.has_more());
    assert_eq!(parser.status(), ParserStatus::Error);
}

#[test]
fn test_frames_inspection() {
    let mut parser = Parser::new();
    feed(&mut parser, "(1\n [2 \"ab");
    let frames = parser.frames();
    let kinds: Vec<FrameKind> = frames.iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![
            FrameKind::Root,
            FrameKind::Tuple,
            FrameKind::BracketTuple,
            FrameKind::String,
        ]
    );
    assert_eq!((frames[1].line, frames[1].column), (1, 1));
    assert_eq!((frames[2].line, frames[2].column), (2, 2));
    assert_eq!((frames[3].line, frames[3].column), (2, 5));
    assert_eq!(parser.buffer(), b"ab");
}

#[test]
fn test_line_counting() {
    let mut parser = Parser::new();
    feed(&mut parser, "a\r\nb");
    assert_eq!(parser.position(), (2, 1));
    feed(&mut parser, "\n\n");
    assert_eq!(parser.position(), (4, 0));
    feed(&mut parser, "\r\r");
    assert_eq!(parser.position(), (6, 0));
}

#[test]
fn test_consume_bytes_stops_at_error() {
    let mut parser = Parser::new();
    let consumed = parser.consume_bytes(b"(1 2)) 3").unwrap();
    assert_eq!(consumed, 6);
    assert_eq!(parser.status(), ParserStatus::Error);
    assert!(parser.has_more());
}

// =============================================================================
// Errors and the feeding contract
// =============================================================================

#[test]
fn test_lone_close_paren() {
    let mut parser = Parser::new();
    parser.consume(b')').unwrap();
    assert_eq!(parser.status(), ParserStatus::Error);
    assert!(!parser.has_more());
    assert_eq!(parser.consume(b'1'), Err(ConsumeError::UncheckedError));

    let err = parser.error().unwrap();
    assert_eq!(err.message, "unexpected delimiter");
    assert_eq!((err.line, err.column), (1, 1));
    assert_eq!(parser.status(), ParserStatus::Root);
}

#[test]
fn test_error_flushes_and_resumes() {
    let mut parser = Parser::new();
    feed(&mut parser, "ok (a ]");
    assert_eq!(parser.status(), ParserStatus::Error);
    let err = parser.error().unwrap();
    assert_eq!(err.message, "mismatched delimiter ], ( opened at line 1, column 4");
    assert_eq!(parser.pending(), 0);
    assert!(parser.error().is_none());

    feed(&mut parser, "(b) ");
    assert_eq!(parser.produce(), Some(TernVal::tuple(vec![sym("b")])));
}

#[test]
fn test_syntax_errors() {
    assert_read_err!("}", "unexpected delimiter");
    assert_read_err!("(}", "mismatched delimiter }");
    assert_read_err!("{:a}", "struct and table literals expect even number of arguments");
    assert_read_err!("@{1 2 3}", "struct and table literals expect even number of arguments");
    assert_read_err!("12abc", "symbol literal cannot start with a digit");
    assert_read_err!("\"\\y\"", "invalid string escape sequence");
    assert_read_err!("\"\\x4g\"", "invalid hex digit in hex escape");
    assert_read_err!("\\", "unexpected character");
}

#[test]
fn test_eof_reports_open_forms() {
    assert_read_err!("(1 [2", "unexpected end of source, [ opened at line 1, column 4");
    assert_read_err!("\"abc", "unexpected end of source, \" opened at line 1, column 1");
    assert_read_err!("``abc`", "unexpected end of source, `` opened at line 1, column 1");
    assert_read_err!("'", "unexpected end of source, ' opened at line 1, column 1");
}

#[test]
fn test_eof_kills_parser() {
    let mut parser = Parser::new();
    feed(&mut parser, "(a b)\nc");
    parser.eof().unwrap();
    assert_eq!(parser.status(), ParserStatus::Dead);
    assert_eq!(parser.position(), (2, 1));
    assert_eq!(parser.pending(), 2);
    assert_eq!(parser.consume(b' '), Err(ConsumeError::Dead));
    assert_eq!(parser.eof(), Err(ConsumeError::Dead));

    // Finished forms stay available
    assert_eq!(
        parser.produce(),
        Some(TernVal::tuple(vec![sym("a"), sym("b")]))
    );
    assert_eq!(parser.produce(), Some(sym("c")));
}

#[test]
fn test_eof_error_is_taken_before_dead() {
    let mut parser = Parser::new();
    feed(&mut parser, "(");
    parser.eof().unwrap();
    assert_eq!(parser.status(), ParserStatus::Error);
    assert!(parser.error().is_some());
    assert_eq!(parser.status(), ParserStatus::Dead);
}

#[test]
fn test_flush_discards_partial_state() {
    let mut parser = Parser::new();
    feed(&mut parser, "1 (2 \"three");
    parser.flush();
    assert_eq!(parser.status(), ParserStatus::Root);
    assert_eq!(parser.pending(), 0);
    assert!(parser.buffer().is_empty());
    assert_eq!(parser.frames().len(), 1);
    feed(&mut parser, "4 ");
    assert_eq!(parser.produce(), Some(num(4.0)));
}

// =============================================================================
// Nesting limits and volume
// =============================================================================

fn nested_parens(depth: usize) -> String {
    format!("{}x{}", "(".repeat(depth), ")".repeat(depth))
}

#[test]
fn test_deepest_nesting_is_hashable() {
    let src = nested_parens(MAX_VALUE_DEPTH);
    let a = read_one(&src);
    let b = read_one(&src);
    assert_eq!(a.equals(&b), Ok(true));
    assert_eq!(a.hash(), b.hash());
    assert!(a.hash().is_ok());

    let mut table = HashTable::new();
    assert_eq!(table.insert(a, num(1.0)).unwrap(), None);
    assert_eq!(table.lookup(&b).unwrap(), Some(&num(1.0)));
}

#[test]
fn test_nesting_past_limit_is_an_error() {
    assert_read_err!(&nested_parens(MAX_VALUE_DEPTH + 1), "too much recursion");
    assert_read_err!(&"@[".repeat(MAX_VALUE_DEPTH + 1), "too much recursion");
    assert_read_err!(&"{:k ".repeat(MAX_VALUE_DEPTH + 1), "too much recursion");

    // Reader macros wrap their form in a tuple, so they count as a level
    let quoted = format!("{}x", "'".repeat(MAX_VALUE_DEPTH));
    assert!(read_one(&quoted).hash().is_ok());
    assert_read_err!(&format!("'{}", quoted), "too much recursion");
    assert_read_err!(
        &format!("{}'x", "[".repeat(MAX_VALUE_DEPTH)),
        "too much recursion"
    );
}

#[test]
fn test_runaway_nesting_recovers() {
    let mut parser = Parser::new();
    let count = parser
        .consume_bytes("(".repeat(20_000).as_bytes())
        .unwrap();
    assert_eq!(count, MAX_VALUE_DEPTH + 1);
    assert_eq!(parser.status(), ParserStatus::Error);
    assert_eq!(parser.error().unwrap().message, "too much recursion");

    feed(&mut parser, "(1) ");
    assert_eq!(parser.produce(), Some(TernVal::tuple(vec![num(1.0)])));
}

#[test]
fn test_many_forms() {
    let n = 100_000;
    let forms = read_all(&"1 :k ".repeat(n)).unwrap();
    assert_eq!(forms.len(), 2 * n);
    assert!(forms.chunks(2).all(|pair| pair[0] == num(1.0) && pair[1] == kw("k")));

    let mut parser = Parser::new();
    feed(&mut parser, &"(a) ".repeat(n));
    assert_eq!(parser.pending(), n);
    let mut produced = 0;
    while let Some(form) = parser.produce() {
        assert_eq!(form, TernVal::tuple(vec![sym("a")]));
        produced += 1;
    }
    assert_eq!(produced, n);
    assert_eq!(parser.pending(), 0);
}
