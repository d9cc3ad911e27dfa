// tern-parser - Value types for Tern
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Core value type for Tern.
//!
//! `TernVal` is the closed enum of every value the reader can produce.
//!
//! Tuples and structs are values: they compare and hash by content. Arrays,
//! tables and buffers are mutable, so they compare and hash by identity
//! only. Each of them carries an [`ObjectId`] drawn when the instance is
//! created. Cloning a `TernVal` shares the instance and keeps the id.
//!
//! Hashing and equality return `Result` because a value nested too deeply
//! cannot be walked safely; the error propagates through every enclosing
//! container and hash table operation.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use im::Vector;

use crate::error::{Result, ValueError};
use crate::hashtable::HashTable;
use crate::strhash::{hash_bytes, mix32};
use crate::symbol::{Keyword, Symbol};

// Thread-local print settings (can be configured by the embedding program)
thread_local! {
    /// Maximum number of elements to print in a container.
    /// None means unlimited, Some(n) means print at most n elements.
    static PRINT_LENGTH: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Get the current print-length setting.
pub fn get_print_length() -> Option<usize> {
    PRINT_LENGTH.with(|pl| pl.get())
}

/// Set the print-length setting. Returns the previous value.
pub fn set_print_length(len: Option<usize>) -> Option<usize> {
    PRINT_LENGTH.with(|pl| pl.replace(len))
}

/// Tuple flag set when the tuple was written with square brackets.
pub const TUPLE_FLAG_BRACKETCTOR: u32 = 0x10000;

/// Hash shared by NaN and both infinities.
pub const NON_FINITE_HASH: u32 = 1618033;

/// Deepest tuple/struct nesting that hashing and equality will walk.
pub const MAX_VALUE_DEPTH: usize = 256;

const STRUCT_HASH_SEED: u32 = 0x2e5a_9f31;

// ============================================================================
// Identity tokens
// ============================================================================

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a mutable container instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    fn fresh() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// 32-bit hash of the identity.
    pub fn hash32(self) -> u32 {
        mix32((self.0 ^ (self.0 >> 32)) as u32)
    }
}

fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_VALUE_DEPTH {
        Err(ValueError::NestingTooDeep {
            limit: MAX_VALUE_DEPTH,
        })
    } else {
        Ok(())
    }
}

/// Hash of a number: truncated integer part for finite values, a fixed
/// sentinel for NaN and the infinities.
///
/// Out-of-range magnitudes saturate in the `f64 -> i64` cast before the
/// truncation to 32 bits.
#[inline]
pub fn number_hash(n: f64) -> u32 {
    if n.is_finite() {
        (n as i64) as u32
    } else {
        NON_FINITE_HASH
    }
}

// ============================================================================
// TernVal
// ============================================================================

/// A Tern value.
#[derive(Clone)]
pub enum TernVal {
    /// The nil value
    Nil,
    /// Boolean true or false
    Bool(bool),
    /// Double-precision number (the only numeric type)
    Number(f64),
    /// Immutable byte string
    String(Rc<[u8]>),
    /// Identifier
    Symbol(Symbol),
    /// Self-evaluating tag
    Keyword(Keyword),
    /// Immutable sequence with source position
    Tuple(Rc<TernTuple>),
    /// Mutable sequence, compared by identity
    Array(TernArray),
    /// Immutable mapping
    Struct(Rc<TernStruct>),
    /// Mutable mapping, compared by identity
    Table(TernTable),
    /// Mutable byte buffer, compared by identity
    Buffer(TernBuffer),
}

// ============================================================================
// Tuple
// ============================================================================

/// An immutable sequence of values.
///
/// `flags`, `line` and `column` are reader metadata. They never take part in
/// equality or hashing.
#[derive(Clone)]
pub struct TernTuple {
    items: Vector<TernVal>,
    flags: u32,
    line: usize,
    column: usize,
}

impl TernTuple {
    pub fn new(items: Vec<TernVal>) -> Self {
        TernTuple::with_position(items, 0, 0, 0)
    }

    pub fn with_position(items: Vec<TernVal>, flags: u32, line: usize, column: usize) -> Self {
        TernTuple {
            items: items.into_iter().collect(),
            flags,
            line,
            column,
        }
    }

    pub fn items(&self) -> &Vector<TernVal> {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&TernVal> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// True if the tuple was written with square brackets.
    pub fn is_bracketed(&self) -> bool {
        self.flags & TUPLE_FLAG_BRACKETCTOR != 0
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    fn hash_at_depth(&self, depth: usize) -> Result<u32> {
        check_depth(depth)?;
        // Must match peer implementations bit for bit.
        let len = self.items.len() as u32;
        let step = 82520u32.wrapping_add(len).wrapping_add(len);
        let mut x: u32 = 0x345678;
        let mut mult: u32 = 1000003;
        for item in self.items.iter() {
            let y = item.hash_at_depth(depth + 1)?;
            x ^= y.wrapping_mul(mult);
            mult = mult.wrapping_add(step);
        }
        Ok(x)
    }

    fn equals_at_depth(&self, other: &TernTuple, depth: usize) -> Result<bool> {
        check_depth(depth)?;
        if self.items.len() != other.items.len() {
            return Ok(false);
        }
        for (a, b) in self.items.iter().zip(other.items.iter()) {
            if !a.equals_at_depth(b, depth + 1)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

// ============================================================================
// Array
// ============================================================================

/// A mutable sequence of values.
#[derive(Clone)]
pub struct TernArray {
    id: ObjectId,
    items: Rc<RefCell<Vec<TernVal>>>,
}

impl TernArray {
    pub fn new(items: Vec<TernVal>) -> Self {
        TernArray {
            id: ObjectId::fresh(),
            items: Rc::new(RefCell::new(items)),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn items(&self) -> Ref<'_, Vec<TernVal>> {
        self.items.borrow()
    }

    pub fn get(&self, index: usize) -> Option<TernVal> {
        self.items.borrow().get(index).cloned()
    }

    pub fn push(&self, value: TernVal) {
        self.items.borrow_mut().push(value);
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

// ============================================================================
// Struct
// ============================================================================

/// An immutable mapping. Entry order is irrelevant to equality and hashing.
#[derive(Clone, Default)]
pub struct TernStruct {
    entries: HashTable,
}

impl TernStruct {
    /// Build a struct from pairs. A repeated key keeps its last value.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (TernVal, TernVal)>) -> Result<Self> {
        Ok(TernStruct {
            entries: HashTable::from_pairs(pairs)?,
        })
    }

    pub fn get(&self, key: &TernVal) -> Result<Option<&TernVal>> {
        self.entries.lookup(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TernVal, &TernVal)> {
        self.entries.iter()
    }

    fn hash_at_depth(&self, depth: usize) -> Result<u32> {
        check_depth(depth)?;
        // Order independent: each entry is mixed on its own, then summed.
        let mut x = STRUCT_HASH_SEED ^ (self.entries.len() as u32);
        for (key, value) in self.entries.iter() {
            let kh = key.hash_at_depth(depth + 1)?;
            let vh = value.hash_at_depth(depth + 1)?;
            x = x.wrapping_add(mix32(kh.wrapping_mul(1000003) ^ vh));
        }
        Ok(x)
    }

    fn equals_at_depth(&self, other: &TernStruct, depth: usize) -> Result<bool> {
        check_depth(depth)?;
        if self.entries.len() != other.entries.len() {
            return Ok(false);
        }
        for (key, value) in self.entries.iter() {
            match other.entries.lookup(key)? {
                Some(theirs) => {
                    if !value.equals_at_depth(theirs, depth + 1)? {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }
        Ok(true)
    }
}

// ============================================================================
// Table
// ============================================================================

/// A mutable mapping backed by [`HashTable`].
#[derive(Clone)]
pub struct TernTable {
    id: ObjectId,
    entries: Rc<RefCell<HashTable>>,
}

impl TernTable {
    pub fn new() -> Self {
        TernTable::from_table(HashTable::new())
    }

    pub fn from_table(table: HashTable) -> Self {
        TernTable {
            id: ObjectId::fresh(),
            entries: Rc::new(RefCell::new(table)),
        }
    }

    /// Build a table from pairs. A repeated key keeps its last value.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (TernVal, TernVal)>) -> Result<Self> {
        Ok(TernTable::from_table(HashTable::from_pairs(pairs)?))
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn get(&self, key: &TernVal) -> Result<Option<TernVal>> {
        Ok(self.entries.borrow().lookup(key)?.cloned())
    }

    pub fn put(&self, key: TernVal, value: TernVal) -> Result<Option<TernVal>> {
        self.entries.borrow_mut().insert(key, value)
    }

    pub fn remove(&self, key: &TernVal) -> Result<Option<TernVal>> {
        self.entries.borrow_mut().delete(key)
    }

    pub fn entries(&self) -> Ref<'_, HashTable> {
        self.entries.borrow()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Default for TernTable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Buffer
// ============================================================================

/// A growable byte sink.
#[derive(Clone)]
pub struct TernBuffer {
    id: ObjectId,
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl TernBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        TernBuffer {
            id: ObjectId::fresh(),
            bytes: Rc::new(RefCell::new(Vec::with_capacity(capacity))),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let buffer = TernBuffer::with_capacity(bytes.len());
        buffer.push_bytes(bytes);
        buffer
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Append bytes to the end of the buffer.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.bytes.borrow_mut().extend_from_slice(bytes);
    }

    pub fn bytes(&self) -> Ref<'_, Vec<u8>> {
        self.bytes.borrow()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.borrow().is_empty()
    }
}

// ============================================================================
// Constructors and accessors
// ============================================================================

impl TernVal {
    /// Create a nil value
    pub fn nil() -> Self {
        TernVal::Nil
    }

    /// Create a boolean value
    pub fn bool(b: bool) -> Self {
        TernVal::Bool(b)
    }

    /// Create a number value
    pub fn number(n: f64) -> Self {
        TernVal::Number(n)
    }

    /// Create a string value
    pub fn string(bytes: impl AsRef<[u8]>) -> Self {
        TernVal::String(Rc::from(bytes.as_ref()))
    }

    /// Create a symbol value
    pub fn symbol(sym: Symbol) -> Self {
        TernVal::Symbol(sym)
    }

    /// Create a keyword value
    pub fn keyword(kw: Keyword) -> Self {
        TernVal::Keyword(kw)
    }

    /// Create a parenthesised tuple without position information
    pub fn tuple(items: Vec<TernVal>) -> Self {
        TernVal::Tuple(Rc::new(TernTuple::new(items)))
    }

    /// Create a tuple flagged as written with square brackets
    pub fn bracket_tuple(items: Vec<TernVal>) -> Self {
        TernVal::Tuple(Rc::new(TernTuple::with_position(
            items,
            TUPLE_FLAG_BRACKETCTOR,
            0,
            0,
        )))
    }

    /// Create a new array
    pub fn array(items: Vec<TernVal>) -> Self {
        TernVal::Array(TernArray::new(items))
    }

    /// Create a struct from key-value pairs
    pub fn structure(pairs: Vec<(TernVal, TernVal)>) -> Result<Self> {
        Ok(TernVal::Struct(Rc::new(TernStruct::from_pairs(pairs)?)))
    }

    /// Create a new table from key-value pairs
    pub fn table(pairs: Vec<(TernVal, TernVal)>) -> Result<Self> {
        Ok(TernVal::Table(TernTable::from_pairs(pairs)?))
    }

    /// Create a new buffer holding a copy of `bytes`
    pub fn buffer(bytes: impl AsRef<[u8]>) -> Self {
        TernVal::Buffer(TernBuffer::from_bytes(bytes.as_ref()))
    }

    /// Check if this value is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, TernVal::Nil)
    }

    /// Check if this value is truthy (not nil and not false)
    pub fn is_truthy(&self) -> bool {
        !matches!(self, TernVal::Nil | TernVal::Bool(false))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            TernVal::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&TernTuple> {
        match self {
            TernVal::Tuple(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&TernStruct> {
        match self {
            TernVal::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Identity of a mutable container; None for value types.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            TernVal::Array(a) => Some(a.id()),
            TernVal::Table(t) => Some(t.id()),
            TernVal::Buffer(b) => Some(b.id()),
            _ => None,
        }
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            TernVal::Nil => "nil",
            TernVal::Bool(_) => "boolean",
            TernVal::Number(_) => "number",
            TernVal::String(_) => "string",
            TernVal::Symbol(_) => "symbol",
            TernVal::Keyword(_) => "keyword",
            TernVal::Tuple(_) => "tuple",
            TernVal::Array(_) => "array",
            TernVal::Struct(_) => "struct",
            TernVal::Table(_) => "table",
            TernVal::Buffer(_) => "buffer",
        }
    }

    // ========================================================================
    // Hashing and equality
    // ========================================================================

    /// 32-bit hash, consistent with [`TernVal::equals`].
    pub fn hash(&self) -> Result<u32> {
        self.hash_at_depth(0)
    }

    fn hash_at_depth(&self, depth: usize) -> Result<u32> {
        match self {
            TernVal::Nil => Ok(0),
            TernVal::Bool(b) => Ok(u32::from(*b)),
            TernVal::Number(n) => Ok(number_hash(*n)),
            TernVal::String(s) => Ok(hash_bytes(s)),
            TernVal::Symbol(sym) => Ok(hash_bytes(sym.as_bytes())),
            TernVal::Keyword(kw) => Ok(hash_bytes(kw.as_bytes())),
            TernVal::Tuple(t) => t.hash_at_depth(depth),
            TernVal::Struct(s) => s.hash_at_depth(depth),
            TernVal::Array(a) => Ok(a.id().hash32()),
            TernVal::Table(t) => Ok(t.id().hash32()),
            TernVal::Buffer(b) => Ok(b.id().hash32()),
        }
    }

    /// Value equality. Tuples and structs compare by content; arrays,
    /// tables and buffers by identity. Different variants are never equal.
    pub fn equals(&self, other: &TernVal) -> Result<bool> {
        self.equals_at_depth(other, 0)
    }

    fn equals_at_depth(&self, other: &TernVal, depth: usize) -> Result<bool> {
        match (self, other) {
            (TernVal::Nil, TernVal::Nil) => Ok(true),
            (TernVal::Bool(a), TernVal::Bool(b)) => Ok(a == b),
            (TernVal::Number(a), TernVal::Number(b)) => Ok(a == b),
            (TernVal::String(a), TernVal::String(b)) => Ok(a == b),
            (TernVal::Symbol(a), TernVal::Symbol(b)) => Ok(a == b),
            (TernVal::Keyword(a), TernVal::Keyword(b)) => Ok(a == b),
            (TernVal::Tuple(a), TernVal::Tuple(b)) => {
                if Rc::ptr_eq(a, b) {
                    Ok(true)
                } else {
                    a.equals_at_depth(b, depth)
                }
            }
            (TernVal::Struct(a), TernVal::Struct(b)) => {
                if Rc::ptr_eq(a, b) {
                    Ok(true)
                } else {
                    a.equals_at_depth(b, depth)
                }
            }
            (TernVal::Array(a), TernVal::Array(b)) => Ok(a.id() == b.id()),
            (TernVal::Table(a), TernVal::Table(b)) => Ok(a.id() == b.id()),
            (TernVal::Buffer(a), TernVal::Buffer(b)) => Ok(a.id() == b.id()),
            _ => Ok(false),
        }
    }
}

// ============================================================================
// Display implementation
// ============================================================================

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        write!(f, "nan")
    } else if n.is_infinite() {
        if n > 0.0 {
            write!(f, "inf")
        } else {
            write!(f, "-inf")
        }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    write!(f, "\"")?;
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '"' => write!(f, "\\\"")?,
                '\\' => write!(f, "\\\\")?,
                '\n' => write!(f, "\\n")?,
                '\t' => write!(f, "\\t")?,
                '\r' => write!(f, "\\r")?,
                '\0' => write!(f, "\\0")?,
                c if c.is_ascii_control() => write!(f, "\\x{:02X}", c as u32)?,
                c => write!(f, "{}", c)?,
            }
        }
        for b in chunk.invalid() {
            write!(f, "\\x{:02X}", b)?;
        }
    }
    write!(f, "\"")
}

fn write_seq<'a>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    close: &str,
    total: usize,
    items: impl Iterator<Item = &'a TernVal>,
) -> fmt::Result {
    let shown = get_print_length().unwrap_or(total).min(total);
    write!(f, "{}", open)?;
    for (i, item) in items.take(shown).enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", item)?;
    }
    if shown < total {
        if shown > 0 {
            write!(f, " ")?;
        }
        write!(f, "...")?;
    }
    write!(f, "{}", close)
}

fn write_map<'a>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    len: usize,
    entries: impl Iterator<Item = (&'a TernVal, &'a TernVal)>,
) -> fmt::Result {
    let shown = get_print_length().unwrap_or(len).min(len);
    write!(f, "{}", open)?;
    for (i, (k, v)) in entries.take(shown).enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{} {}", k, v)?;
    }
    if shown < len {
        if shown > 0 {
            write!(f, " ")?;
        }
        write!(f, "...")?;
    }
    write!(f, "}}")
}

impl fmt::Display for TernVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Note: tuple position metadata is not displayed
        match self {
            TernVal::Nil => write!(f, "nil"),
            TernVal::Bool(b) => write!(f, "{}", b),
            TernVal::Number(n) => write_number(f, *n),
            TernVal::String(s) => write_escaped(f, s),
            TernVal::Symbol(sym) => write!(f, "{}", sym),
            TernVal::Keyword(kw) => write!(f, "{}", kw),
            TernVal::Tuple(t) => {
                if t.is_bracketed() {
                    write_seq(f, "[", "]", t.len(), t.items().iter())
                } else {
                    write_seq(f, "(", ")", t.len(), t.items().iter())
                }
            }
            TernVal::Array(a) => {
                let items = a.items();
                write_seq(f, "@[", "]", items.len(), items.iter())
            }
            TernVal::Struct(s) => write_map(f, "{", s.len(), s.iter()),
            TernVal::Table(t) => {
                let entries = t.entries();
                write_map(f, "@{", entries.len(), entries.iter())
            }
            TernVal::Buffer(b) => {
                write!(f, "@")?;
                write_escaped(f, &b.bytes())
            }
        }
    }
}

impl fmt::Debug for TernVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

// ============================================================================
// Equality (for assertions and collections of values)
// ============================================================================

impl PartialEq for TernVal {
    /// Same as [`TernVal::equals`]; values too deep to compare are unequal.
    fn eq(&self, other: &Self) -> bool {
        self.equals(other).unwrap_or(false)
    }
}

// ============================================================================
// Tests
// ============================================================================
