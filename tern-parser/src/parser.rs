// tern-parser - Incremental parser for Tern
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Byte-at-a-time parser for Tern source.
//!
//! The parser is a pushdown automaton. Every grammar production in progress
//! is a [`Frame`] on an explicit stack, holding a continuation that handles
//! the next byte. A continuation either consumes the byte or asks the driver
//! to hand the same byte to whichever frame is on top afterwards. Closing a
//! container, ending a token, or leaving an at-sign prefix can all happen
//! without advancing the input.
//!
//! Nothing blocks: callers feed bytes with [`Parser::consume`] whenever they
//! have them, and pull finished top-level forms out with
//! [`Parser::produce`].
//!
//! # Example
//!
//! ```
//! use tern_parser::{Parser, ParserStatus};
//!
//! let mut parser = Parser::new();
//! parser.consume_bytes(b"(1 :hello").unwrap();
//! assert_eq!(parser.status(), ParserStatus::Pending);
//! parser.consume(b')').unwrap();
//! let form = parser.produce().unwrap();
//! assert_eq!(form.to_string(), "(1 :hello)");
//! ```

use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::{ConsumeError, ParseError};
use crate::symbol::{Keyword, Symbol};
use crate::value::{
    MAX_VALUE_DEPTH, TUPLE_FLAG_BRACKETCTOR, TernStruct, TernTable, TernTuple, TernVal,
};

// Frame flags. The low byte of a reader-macro frame holds the macro char.
const FLAG_CONTAINER: u32 = 0x100;
const FLAG_BUFFER: u32 = 0x200;
const FLAG_PARENS: u32 = 0x400;
const FLAG_SQRBRACKETS: u32 = 0x800;
const FLAG_CURLYBRACKETS: u32 = 0x1000;
const FLAG_STRING: u32 = 0x2000;
const FLAG_LONGSTRING: u32 = 0x4000;
const FLAG_READERMAC: u32 = 0x8000;
const FLAG_ATSYM: u32 = 0x10000;
const FLAG_COMMENT: u32 = 0x20000;
const FLAG_TOKEN: u32 = 0x40000;
const FLAG_INSTRING: u32 = 0x100000;
const FLAG_END_CANDIDATE: u32 = 0x200000;

/// One bit per byte value; set when the byte may appear in a symbol.
/// Bytes above 0x7f are accepted here and checked for UTF-8 afterwards.
const SYMBOL_CHARS: [u32; 8] = [
    0x0000_0000,
    0xf7ff_ec72,
    0xc7ff_ffff,
    0x07ff_fffe,
    0xffff_ffff,
    0xffff_ffff,
    0xffff_ffff,
    0xffff_ffff,
];

#[inline]
fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c | 0)
}

/// True if `c` may appear in a symbol or keyword.
#[inline]
pub fn is_symbol_char(c: u8) -> bool {
    SYMBOL_CHARS[(c >> 5) as usize] & (1 << (c & 0x1f)) != 0
}

fn escape_value(c: u8) -> Option<u8> {
    match c {
        b'n' => Some(b'\n'),
        b't' => Some(b'\t'),
        b'r' => Some(b'\r'),
        b'0' | b'z' => Some(0),
        b'a' => Some(0x07),
        b'f' => Some(0x0c),
        b'v' => Some(0x0b),
        b'e' => Some(0x1b),
        b'"' => Some(b'"'),
        b'\\' => Some(b'\\'),
        _ => None,
    }
}

fn reader_macro_name(c: u8) -> &'static str {
    match c {
        b'\'' => "quote",
        b',' => "unquote",
        b';' => "splice",
        b'~' => "quasiquote",
        b'|' => "short-fn",
        _ => "<unknown>",
    }
}

// ============================================================================
// Number scanning
// ============================================================================

/// Scan a numeric literal.
///
/// Accepts an optional sign followed by decimal (`1_000.5e-3`), hexadecimal
/// (`0xff`) or radix (`2r1010`, `16rff.8&2`) forms. Underscores may separate
/// digits. Decimal numbers take an `e`/`E` or `&` exponent, other bases only
/// `&`, with the exponent written in the same base.
///
/// Returns `None` if the token is not a number.
pub fn scan_number(token: &[u8]) -> Option<f64> {
    use num_traits::Num;

    let text = std::str::from_utf8(token).ok()?;
    let (negative, body) = if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (false, rest)
    } else {
        (false, text)
    };

    let (radix, digits) = if let Some(rest) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        (16, rest)
    } else if let Some(r_pos) = body.find(['r', 'R'])
        && (1..=2).contains(&r_pos)
        && body[..r_pos].bytes().all(|b| b.is_ascii_digit())
    {
        let radix: u32 = body[..r_pos].parse().ok()?;
        if !(2..=36).contains(&radix) {
            return None;
        }
        (radix, &body[r_pos + 1..])
    } else {
        (10, body)
    };

    let exp_pos = digits.find(|c: char| c == '&' || (radix == 10 && (c == 'e' || c == 'E')));
    let (mantissa, exponent) = match exp_pos {
        Some(pos) => (&digits[..pos], Some(&digits[pos + 1..])),
        None => (digits, None),
    };

    let mut cleaned = String::with_capacity(mantissa.len());
    let mut seen_digit = false;
    let mut seen_point = false;
    for c in mantissa.chars() {
        match c {
            '_' if seen_digit => {}
            '.' if !seen_point => {
                seen_point = true;
                cleaned.push(c);
            }
            c if c.is_digit(radix) => {
                seen_digit = true;
                cleaned.push(c);
            }
            _ => return None,
        }
    }
    if !seen_digit {
        return None;
    }

    let magnitude = match exponent {
        None => f64::from_str_radix(&cleaned, radix).ok()?,
        Some(exp) => {
            let (exp_negative, exp_digits) = if let Some(rest) = exp.strip_prefix('-') {
                (true, rest)
            } else if let Some(rest) = exp.strip_prefix('+') {
                (false, rest)
            } else {
                (false, exp)
            };
            if exp_digits.is_empty() || !exp_digits.chars().all(|c| c.is_digit(radix)) {
                return None;
            }
            if radix == 10 {
                let sign = if exp_negative { "-" } else { "" };
                let literal = format!("{}e{}{}", cleaned, sign, exp_digits);
                f64::from_str_radix(&literal, 10).ok()?
            } else {
                let mantissa = f64::from_str_radix(&cleaned, radix).ok()?;
                let power = i32::from_str_radix(exp_digits, radix).unwrap_or(i32::MAX);
                let power = if exp_negative { -power } else { power };
                mantissa * f64::from(radix).powi(power)
            }
        }
    };

    Some(if negative { -magnitude } else { magnitude })
}

// ============================================================================
// Parser state
// ============================================================================

/// What a continuation did with the byte it was given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    /// The byte is handled; the driver moves on.
    Consumed,
    /// Hand the same byte to the new top frame.
    Reprocess,
}

type Consumer = fn(&mut Parser, usize, u8) -> Step;

/// One in-progress production on the parser stack.
#[derive(Clone, Copy)]
struct Frame {
    counter: usize,
    argn: usize,
    flags: u32,
    line: usize,
    column: usize,
    consumer: Consumer,
}

/// Coarse parser state, for prompts and callers polling after each byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParserStatus {
    /// Nothing is open
    Root,
    /// A syntax error is waiting to be taken with [`Parser::error`]
    Error,
    /// A form is open
    Pending,
    /// End of input was signalled, or the parser hit a fatal condition
    Dead,
}

/// The production an open frame belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Root,
    Tuple,
    BracketTuple,
    Array,
    Struct,
    Table,
    String,
    Buffer,
    LongString,
    LongBuffer,
    /// Holds the prefix character
    ReaderMacro(u8),
    Comment,
    Token,
    AtSign,
}

/// Snapshot of one open frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub kind: FrameKind,
    pub line: usize,
    pub column: usize,
}

/// Incremental parser state.
pub struct Parser {
    /// Finished top-level forms, oldest first
    forms: VecDeque<TernVal>,
    /// Arguments of every open container
    args: Vec<TernVal>,
    frames: Vec<Frame>,
    /// Scratch bytes of the token, string or comment being read
    buf: Vec<u8>,
    line: usize,
    column: usize,
    lookback: Option<u8>,
    dead: bool,
    error: Option<ParseError>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        let mut parser = Parser {
            forms: VecDeque::new(),
            args: Vec::new(),
            frames: Vec::new(),
            buf: Vec::new(),
            line: 1,
            column: 0,
            lookback: None,
            dead: false,
            error: None,
        };
        parser.push_frame(root, FLAG_CONTAINER);
        parser
    }

    // ========================================================================
    // Public interface
    // ========================================================================

    /// Feed one byte.
    ///
    /// Fails without touching any state if the parser is dead or a syntax
    /// error is still pending. Syntax errors found while handling `c` are
    /// not returned here; poll [`Parser::status`] or [`Parser::error`].
    pub fn consume(&mut self, c: u8) -> Result<(), ConsumeError> {
        self.check_live()?;
        match c {
            b'\r' => {
                self.line += 1;
                self.column = 0;
            }
            b'\n' => {
                self.column = 0;
                if self.lookback != Some(b'\r') {
                    self.line += 1;
                }
            }
            _ => self.column += 1,
        }

        while self.error.is_none() && !self.dead {
            let Some(index) = self.frames.len().checked_sub(1) else {
                self.fatal("frame stack is empty");
                break;
            };
            let consumer = self.frames[index].consumer;
            if consumer(self, index, c) == Step::Consumed {
                break;
            }
        }

        self.lookback = Some(c);
        Ok(())
    }

    /// Feed bytes until the input runs out or a syntax error is pending.
    /// Returns how many bytes were consumed.
    pub fn consume_bytes(&mut self, bytes: &[u8]) -> Result<usize, ConsumeError> {
        let mut count = 0;
        for &c in bytes {
            self.consume(c)?;
            count += 1;
            if self.error.is_some() {
                break;
            }
        }
        Ok(count)
    }

    /// Signal end of input. The parser is dead afterwards.
    ///
    /// An open container or string is reported as a pending error.
    pub fn eof(&mut self) -> Result<(), ConsumeError> {
        self.check_live()?;
        let (line, column) = (self.line, self.column);
        self.consume(b'\n')?;
        if self.error.is_none()
            && let Some(top) = self.frames.len().checked_sub(1)
            && top > 0
        {
            let message = self.describe_open("unexpected end of source", top);
            self.set_error(message);
        }
        self.line = line;
        self.column = column;
        self.dead = true;
        debug!(line, column, "parser reached end of input");
        Ok(())
    }

    pub fn status(&self) -> ParserStatus {
        if self.error.is_some() {
            ParserStatus::Error
        } else if self.dead {
            ParserStatus::Dead
        } else if self.frames.len() > 1 {
            ParserStatus::Pending
        } else {
            ParserStatus::Root
        }
    }

    /// Take the pending syntax error, if any.
    ///
    /// Taking an error also flushes all partial state, so feeding can
    /// resume from the root.
    pub fn error(&mut self) -> Option<ParseError> {
        let err = self.error.take()?;
        self.flush();
        Some(err)
    }

    /// Discard every open frame, the scratch buffer and all finished forms
    /// not yet produced.
    pub fn flush(&mut self) {
        self.forms.clear();
        self.args.clear();
        self.buf.clear();
        self.frames.clear();
        self.push_frame(root, FLAG_CONTAINER);
    }

    /// Pop the oldest finished top-level form.
    pub fn produce(&mut self) -> Option<TernVal> {
        self.forms.pop_front()
    }

    /// True if [`Parser::produce`] would return a form.
    pub fn has_more(&self) -> bool {
        !self.forms.is_empty()
    }

    /// Number of finished top-level forms waiting to be produced.
    pub fn pending(&self) -> usize {
        self.forms.len()
    }

    /// Current (line, column). Lines start at 1; the column counts bytes
    /// since the last line break.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    /// Every open frame, outermost first.
    pub fn frames(&self) -> Vec<FrameInfo> {
        self.frames
            .iter()
            .enumerate()
            .map(|(i, frame)| FrameInfo {
                kind: frame_kind(i, frame.flags),
                line: frame.line,
                column: frame.column,
            })
            .collect()
    }

    /// Bytes of the token or string currently being read.
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    // ========================================================================
    // Stack management
    // ========================================================================

    fn check_live(&self) -> Result<(), ConsumeError> {
        if self.dead {
            Err(ConsumeError::Dead)
        } else if self.error.is_some() {
            Err(ConsumeError::UncheckedError)
        } else {
            Ok(())
        }
    }

    fn set_error(&mut self, message: impl Into<String>) {
        let err = ParseError::new(message, self.line, self.column);
        debug!(line = err.line, column = err.column, message = %err.message, "syntax error");
        self.error = Some(err);
    }

    fn fatal(&mut self, reason: &str) {
        debug!(reason, "parser is dead");
        self.dead = true;
    }

    fn push_frame(&mut self, consumer: Consumer, flags: u32) {
        trace!(depth = self.frames.len(), flags, "push frame");
        self.frames.push(Frame {
            counter: 0,
            argn: 0,
            flags,
            line: self.line,
            column: self.column,
            consumer,
        });
    }

    /// Push a container or reader-macro frame, unless that would nest
    /// values deeper than they can be hashed and compared.
    fn push_nested(&mut self, consumer: Consumer, flags: u32) {
        // The root frame does not count as a level
        if self.frames.len() > MAX_VALUE_DEPTH {
            self.set_error("too much recursion");
            return;
        }
        self.push_frame(consumer, flags);
    }

    /// Pop the top frame and fold `value` into whatever is below it.
    ///
    /// A container takes the value as its next argument. A reader-macro
    /// frame wraps it as `(name value)` and is popped in turn.
    fn pop_frame(&mut self, mut value: TernVal) {
        loop {
            if self.frames.len() < 2 {
                self.fatal("popped the root frame");
                return;
            }
            self.frames.pop();
            let depth = self.frames.len();
            trace!(depth, "pop frame");
            let Some(below) = self.frames.last_mut() else {
                return;
            };
            if depth == 1 {
                self.forms.push_back(value);
                return;
            } else if below.flags & FLAG_CONTAINER != 0 {
                below.argn += 1;
                self.args.push(value);
                return;
            } else if below.flags & FLAG_READERMAC != 0 {
                let name = reader_macro_name((below.flags & 0xff) as u8);
                value = TernVal::Tuple(Rc::new(TernTuple::with_position(
                    vec![TernVal::symbol(Symbol::new(name)), value],
                    0,
                    below.line,
                    below.column,
                )));
            } else {
                return;
            }
        }
    }

    /// Remove the last `n` arguments, in source order.
    fn take_args(&mut self, n: usize) -> Option<Vec<TernVal>> {
        let start = self.args.len().checked_sub(n)?;
        Some(self.args.split_off(start))
    }

    /// Close the container at `index` with delimiter `c`.
    fn close_container(&mut self, index: usize, c: u8) -> Step {
        if index == 0 {
            self.set_error("unexpected delimiter");
            return Step::Consumed;
        }
        let frame = self.frames[index];
        let closes_seq = (c == b')' && frame.flags & FLAG_PARENS != 0)
            || (c == b']' && frame.flags & FLAG_SQRBRACKETS != 0);
        let closes_map = c == b'}' && frame.flags & FLAG_CURLYBRACKETS != 0;

        if !closes_seq && !closes_map {
            let message = self.describe_open(&format!("mismatched delimiter {}", c as char), index);
            self.set_error(message);
            return Step::Consumed;
        }
        if closes_map && frame.argn % 2 == 1 {
            self.set_error("struct and table literals expect even number of arguments");
            return Step::Consumed;
        }
        let Some(items) = self.take_args(frame.argn) else {
            self.fatal("argument stack underflow");
            return Step::Consumed;
        };

        let value = if closes_seq {
            if frame.flags & FLAG_ATSYM != 0 {
                TernVal::array(items)
            } else {
                let flags = if c == b']' { TUPLE_FLAG_BRACKETCTOR } else { 0 };
                TernVal::Tuple(Rc::new(TernTuple::with_position(
                    items,
                    flags,
                    frame.line,
                    frame.column,
                )))
            }
        } else {
            let pairs = into_pairs(items);
            let built = if frame.flags & FLAG_ATSYM != 0 {
                TernTable::from_pairs(pairs).map(TernVal::Table)
            } else {
                TernStruct::from_pairs(pairs).map(|s| TernVal::Struct(Rc::new(s)))
            };
            match built {
                Ok(value) => value,
                Err(e) => {
                    self.set_error(e.to_string());
                    return Step::Consumed;
                }
            }
        };
        self.pop_frame(value);
        Step::Consumed
    }

    /// `message` plus where the frame at `index` was opened.
    fn describe_open(&self, message: &str, index: usize) -> String {
        let frame = &self.frames[index];
        let opener = if frame.flags & FLAG_PARENS != 0 {
            "(".to_string()
        } else if frame.flags & FLAG_SQRBRACKETS != 0 {
            "[".to_string()
        } else if frame.flags & FLAG_CURLYBRACKETS != 0 {
            "{".to_string()
        } else if frame.flags & FLAG_STRING != 0 {
            "\"".to_string()
        } else if frame.flags & FLAG_LONGSTRING != 0 {
            "`".repeat(frame.argn.max(1))
        } else if frame.flags & FLAG_READERMAC != 0 {
            ((frame.flags & 0xff) as u8 as char).to_string()
        } else {
            "?".to_string()
        };
        format!(
            "{}, {} opened at line {}, column {}",
            message, opener, frame.line, frame.column
        )
    }

    /// Turn the finished token in the scratch buffer into a value.
    fn classify_token(&self, non_ascii: bool) -> Result<TernVal, &'static str> {
        let token = self.buf.as_slice();
        let Some(&first) = token.first() else {
            return Err("empty symbol invalid");
        };
        let starts_with_digit = first.is_ascii_digit();
        let starts_number = starts_with_digit || matches!(first, b'-' | b'+' | b'.');

        if first == b':' {
            let name = &token[1..];
            // Full UTF-8 validation only when a high byte was seen
            if non_ascii && std::str::from_utf8(name).is_err() {
                return Err("invalid utf-8 in keyword");
            }
            return Ok(TernVal::keyword(Keyword::new(name)));
        }
        if starts_number && let Some(n) = scan_number(token) {
            return Ok(TernVal::number(n));
        }
        match token {
            b"nil" => Ok(TernVal::nil()),
            b"false" => Ok(TernVal::bool(false)),
            b"true" => Ok(TernVal::bool(true)),
            _ if starts_with_digit => Err("symbol literal cannot start with a digit"),
            _ if non_ascii && std::str::from_utf8(token).is_err() => {
                Err("invalid utf-8 in symbol")
            }
            _ => Ok(TernVal::symbol(Symbol::new(token))),
        }
    }

    /// Build the string or buffer for the frame at `index` and pop it.
    fn finish_string(&mut self, index: usize) {
        let flags = self.frames[index].flags;
        let mut bytes = self.buf.as_slice();
        if flags & FLAG_LONGSTRING != 0 {
            if let [b'\n', rest @ ..] = bytes {
                bytes = rest;
            }
            if let [rest @ .., b'\n'] = bytes {
                bytes = rest;
            }
        }
        let value = if flags & FLAG_BUFFER != 0 {
            TernVal::buffer(bytes)
        } else {
            TernVal::string(bytes)
        };
        self.buf.clear();
        self.pop_frame(value);
    }
}

fn into_pairs(items: Vec<TernVal>) -> Vec<(TernVal, TernVal)> {
    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut items = items.into_iter();
    while let (Some(key), Some(value)) = (items.next(), items.next()) {
        pairs.push((key, value));
    }
    pairs
}

fn frame_kind(index: usize, flags: u32) -> FrameKind {
    let at = flags & FLAG_ATSYM != 0;
    let buffer = flags & FLAG_BUFFER != 0;
    if index == 0 {
        FrameKind::Root
    } else if flags & (FLAG_PARENS | FLAG_SQRBRACKETS) != 0 {
        if at {
            FrameKind::Array
        } else if flags & FLAG_SQRBRACKETS != 0 {
            FrameKind::BracketTuple
        } else {
            FrameKind::Tuple
        }
    } else if flags & FLAG_CURLYBRACKETS != 0 {
        if at { FrameKind::Table } else { FrameKind::Struct }
    } else if flags & FLAG_STRING != 0 {
        if buffer { FrameKind::Buffer } else { FrameKind::String }
    } else if flags & FLAG_LONGSTRING != 0 {
        if buffer {
            FrameKind::LongBuffer
        } else {
            FrameKind::LongString
        }
    } else if flags & FLAG_READERMAC != 0 {
        FrameKind::ReaderMacro((flags & 0xff) as u8)
    } else if flags & FLAG_COMMENT != 0 {
        FrameKind::Comment
    } else if flags & FLAG_TOKEN != 0 {
        FrameKind::Token
    } else {
        FrameKind::AtSign
    }
}

// ============================================================================
// Continuations
// ============================================================================

/// Containers, reader-macro frames and the root.
fn root(p: &mut Parser, index: usize, c: u8) -> Step {
    match c {
        b'\'' | b',' | b';' | b'~' | b'|' => {
            p.push_nested(root, FLAG_READERMAC | u32::from(c));
            Step::Consumed
        }
        b'"' => {
            p.push_frame(stringchar, FLAG_STRING);
            Step::Consumed
        }
        b'#' => {
            p.push_frame(comment, FLAG_COMMENT);
            Step::Consumed
        }
        b'@' => {
            p.push_frame(atsign, FLAG_ATSYM);
            Step::Consumed
        }
        b'`' => {
            p.push_frame(longstring, FLAG_LONGSTRING);
            Step::Consumed
        }
        b')' | b']' | b'}' => p.close_container(index, c),
        b'(' => {
            p.push_nested(root, FLAG_CONTAINER | FLAG_PARENS);
            Step::Consumed
        }
        b'[' => {
            p.push_nested(root, FLAG_CONTAINER | FLAG_SQRBRACKETS);
            Step::Consumed
        }
        b'{' => {
            p.push_nested(root, FLAG_CONTAINER | FLAG_CURLYBRACKETS);
            Step::Consumed
        }
        _ if is_whitespace(c) => Step::Consumed,
        _ if is_symbol_char(c) => {
            p.push_frame(tokenchar, FLAG_TOKEN);
            Step::Reprocess
        }
        _ => {
            p.set_error("unexpected character");
            Step::Consumed
        }
    }
}

fn tokenchar(p: &mut Parser, index: usize, c: u8) -> Step {
    if is_symbol_char(c) {
        p.buf.push(c);
        if c > 0x7f {
            p.frames[index].argn = 1;
        }
        return Step::Consumed;
    }
    match p.classify_token(p.frames[index].argn != 0) {
        Ok(value) => {
            p.buf.clear();
            p.pop_frame(value);
        }
        Err(message) => p.set_error(message),
    }
    Step::Reprocess
}

fn stringchar(p: &mut Parser, index: usize, c: u8) -> Step {
    match c {
        b'\\' => p.frames[index].consumer = escape1,
        b'"' => p.finish_string(index),
        // Raw line breaks are not part of the string
        b'\n' | b'\r' => {}
        _ => p.buf.push(c),
    }
    Step::Consumed
}

fn escape1(p: &mut Parser, index: usize, c: u8) -> Step {
    if c == b'x' {
        let frame = &mut p.frames[index];
        frame.counter = 2;
        frame.argn = 0;
        frame.consumer = escapeh;
    } else if let Some(byte) = escape_value(c) {
        p.buf.push(byte);
        p.frames[index].consumer = stringchar;
    } else {
        p.set_error("invalid string escape sequence");
    }
    Step::Consumed
}

fn escapeh(p: &mut Parser, index: usize, c: u8) -> Step {
    let Some(digit) = (c as char).to_digit(16) else {
        p.set_error("invalid hex digit in hex escape");
        return Step::Consumed;
    };
    let frame = &mut p.frames[index];
    frame.argn = (frame.argn << 4) + digit as usize;
    frame.counter -= 1;
    if frame.counter == 0 {
        let byte = (frame.argn & 0xff) as u8;
        frame.argn = 0;
        frame.consumer = stringchar;
        p.buf.push(byte);
    }
    Step::Consumed
}

/// Long strings open with a run of backticks (`argn` counts them) and close
/// with a run of exactly the same length. Shorter runs are content.
fn longstring(p: &mut Parser, index: usize, c: u8) -> Step {
    let frame = p.frames[index];
    if frame.flags & FLAG_INSTRING != 0 {
        if c == b'`' {
            let frame = &mut p.frames[index];
            frame.flags = (frame.flags | FLAG_END_CANDIDATE) & !FLAG_INSTRING;
            frame.counter = 1;
        } else {
            p.buf.push(c);
        }
        Step::Consumed
    } else if frame.flags & FLAG_END_CANDIDATE != 0 {
        if frame.counter == frame.argn {
            p.finish_string(index);
            return Step::Reprocess;
        }
        if c == b'`' && frame.counter < frame.argn {
            p.frames[index].counter += 1;
            return Step::Consumed;
        }
        // Too short to close: the run was content
        p.buf.extend(std::iter::repeat_n(b'`', frame.counter));
        p.buf.push(c);
        let frame = &mut p.frames[index];
        frame.counter = 0;
        frame.flags = (frame.flags | FLAG_INSTRING) & !FLAG_END_CANDIDATE;
        Step::Consumed
    } else {
        // Still in the opening run; the first byte here accounts for the
        // backtick the root consumed.
        let frame = &mut p.frames[index];
        frame.argn += 1;
        if c != b'`' {
            frame.flags |= FLAG_INSTRING;
            p.buf.push(c);
        }
        Step::Consumed
    }
}

fn comment(p: &mut Parser, _index: usize, c: u8) -> Step {
    if c == b'\n' {
        p.frames.pop();
        p.buf.clear();
    } else {
        p.buf.push(c);
    }
    Step::Consumed
}

/// After `@`: pick the mutable form of the next literal, or read `@` as
/// the first byte of a symbol.
fn atsign(p: &mut Parser, _index: usize, c: u8) -> Step {
    p.frames.pop();
    match c {
        b'{' => p.push_nested(root, FLAG_CONTAINER | FLAG_CURLYBRACKETS | FLAG_ATSYM),
        b'[' => p.push_nested(root, FLAG_CONTAINER | FLAG_SQRBRACKETS | FLAG_ATSYM),
        b'(' => p.push_nested(root, FLAG_CONTAINER | FLAG_PARENS | FLAG_ATSYM),
        b'"' => p.push_frame(stringchar, FLAG_STRING | FLAG_BUFFER),
        b'`' => p.push_frame(longstring, FLAG_LONGSTRING | FLAG_BUFFER),
        _ => {
            p.push_frame(tokenchar, FLAG_TOKEN);
            p.buf.push(b'@');
            return Step::Reprocess;
        }
    }
    Step::Consumed
}

// ============================================================================
// Convenience functions
// ============================================================================

fn contract_error(parser: &Parser, err: ConsumeError) -> ParseError {
    let (line, column) = parser.position();
    ParseError::new(err.to_string(), line, column)
}

/// Parse a string and return the first form.
pub fn read(source: &str) -> Result<Option<TernVal>, ParseError> {
    let mut parser = Parser::new();
    for &c in source.as_bytes() {
        parser.consume(c).map_err(|e| contract_error(&parser, e))?;
        if let Some(err) = parser.error() {
            return Err(err);
        }
        if let Some(form) = parser.produce() {
            return Ok(Some(form));
        }
    }
    parser.eof().map_err(|e| contract_error(&parser, e))?;
    if let Some(err) = parser.error() {
        return Err(err);
    }
    Ok(parser.produce())
}

/// Parse a string and return all forms.
pub fn read_all(source: &str) -> Result<Vec<TernVal>, ParseError> {
    let mut parser = Parser::new();
    parser
        .consume_bytes(source.as_bytes())
        .map_err(|e| contract_error(&parser, e))?;
    if let Some(err) = parser.error() {
        return Err(err);
    }
    parser.eof().map_err(|e| contract_error(&parser, e))?;
    if let Some(err) = parser.error() {
        return Err(err);
    }
    let mut forms = Vec::with_capacity(parser.pending());
    while let Some(form) = parser.produce() {
        forms.push(form);
    }
    Ok(forms)
}

// ============================================================================
// Tests
// ============================================================================
