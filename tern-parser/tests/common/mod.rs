// tern-parser - Common test utilities
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Shared test helpers for tern-parser integration tests.
//!
//! # Usage
//!
//! In your test file, add:
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Available Helpers
//!
//! - [`read_one`] - Read the first form of a string, panicking on errors
//! - [`feed`] - Feed a string to a parser one byte at a time
//! - [`sym`], [`kw`], [`num`], [`string`] - Leaf value constructors
//! - [`zipf_keys`] - A seeded Zipf-distributed key population
//!
//! # Macros
//!
//! - [`assert_reads!`] - Assert that source text reads as an expected value
//! - [`assert_read_err!`] - Assert that reading produces a syntax error

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[allow(unused_imports)]
pub use tern_parser::{
    HashTable, Keyword, ParseError, Parser, ParserStatus, Symbol, TernVal, read, read_all,
};

/// Read the first form of `s`.
///
/// # Panics
///
/// Panics if `s` has a syntax error or contains no form.
pub fn read_one(s: &str) -> TernVal {
    match read(s) {
        Ok(Some(form)) => form,
        Ok(None) => panic!("no form in {:?}", s),
        Err(e) => panic!("failed to read {:?}: {}", s, e),
    }
}

/// Feed every byte of `s` to `parser`.
///
/// # Panics
///
/// Panics on a contract violation (dead parser or unchecked error).
pub fn feed(parser: &mut Parser, s: &str) {
    for &c in s.as_bytes() {
        parser.consume(c).expect("parser refused input");
    }
}

pub fn sym(name: &str) -> TernVal {
    TernVal::symbol(Symbol::new(name))
}

pub fn kw(name: &str) -> TernVal {
    TernVal::keyword(Keyword::new(name))
}

pub fn num(n: f64) -> TernVal {
    TernVal::number(n)
}

pub fn string(s: &str) -> TernVal {
    TernVal::string(s)
}

/// `count` keys drawn from a Zipf distribution over `0..=imax` with
/// exponent `s` and offset `v`: P(k) is proportional to `(v + k)^-s`.
///
/// Deterministic for a given seed.
pub fn zipf_keys(count: usize, s: f64, v: f64, imax: u64, seed: u64) -> Vec<u64> {
    let weights: Vec<f64> = (0..=imax).map(|k| (v + k as f64).powf(-s)).collect();
    let total: f64 = weights.iter().sum();
    let mut cdf = Vec::with_capacity(weights.len());
    let mut acc = 0.0;
    for w in &weights {
        acc += w / total;
        cdf.push(acc);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let u: f64 = rng.r#gen();
            let k = cdf.partition_point(|&p| p < u);
            k.min(imax as usize) as u64
        })
        .collect()
}

/// Assert that reading `input` yields the expected first form.
#[macro_export]
macro_rules! assert_reads {
    ($input:expr, $expected:expr) => {
        let result = $crate::common::read($input);
        assert!(
            result.is_ok(),
            "Failed to read '{}': {:?}",
            $input,
            result.as_ref().err()
        );
        assert_eq!(
            result.unwrap(),
            Some($expected),
            "Reading '{}' did not match expected",
            $input
        );
    };
}

/// Assert that reading `input` fails with a message starting with `prefix`.
#[macro_export]
macro_rules! assert_read_err {
    ($input:expr, $prefix:expr) => {
        let result = $crate::common::read_all($input);
        match result {
            Ok(forms) => panic!("Expected error for '{}' but got {:?}", $input, forms),
            Err(e) => assert!(
                e.message.starts_with($prefix),
                "Error for '{}' was {:?}, expected prefix {:?}",
                $input,
                e.message,
                $prefix
            ),
        }
    };
}
