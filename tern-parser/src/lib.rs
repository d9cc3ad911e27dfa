// tern-parser - Value model, hash table and incremental parser for Tern
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # tern-parser
//!
//! Front end for the Tern language: the `TernVal` value model, an
//! open-addressing `HashTable` keyed by values, and a byte-at-a-time
//! `Parser` that turns source text into values.

pub mod error;
pub mod hashtable;
pub mod parser;
pub mod strhash;
pub mod symbol;
pub mod value;

pub use error::{ConsumeError, ParseError, Result, ValueError};
pub use hashtable::HashTable;
pub use im::Vector;
pub use parser::{FrameInfo, FrameKind, Parser, ParserStatus, read, read_all};
pub use symbol::{Keyword, Symbol};
pub use value::{
    MAX_VALUE_DEPTH, NON_FINITE_HASH, ObjectId, TUPLE_FLAG_BRACKETCTOR, TernArray, TernBuffer,
    TernStruct, TernTable, TernTuple, TernVal, get_print_length, set_print_length,
};
