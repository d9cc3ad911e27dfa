// tern-parser - Interned symbol and keyword names
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Symbols and keywords are immutable byte strings.
//!
//! # Interning
//!
//! Both share one global interner, so two names with the same bytes point at
//! the same allocation. Equality is a pointer comparison and the parser does
//! not allocate a fresh name every time `foo` shows up in the source.
//!
//! Interned names are never deallocated. Memory grows with the number of
//! distinct names seen during the program's lifetime, which is bounded for
//! ordinary source text.
//!
//! The value-model hash of a name is computed from its bytes (see
//! [`crate::strhash::hash_bytes`]), never from the pointer, so it is stable
//! across runs.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Global name interner
static NAME_INTERNER: OnceLock<Mutex<HashSet<Arc<[u8]>>>> = OnceLock::new();

fn intern(bytes: &[u8]) -> Arc<[u8]> {
    let mut names = NAME_INTERNER
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = names.get(bytes) {
        return Arc::clone(existing);
    }
    let name: Arc<[u8]> = Arc::from(bytes);
    names.insert(Arc::clone(&name));
    name
}

macro_rules! interned_name {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name {
            bytes: Arc<[u8]>,
        }

        impl $name {
            /// Intern a name from raw bytes.
            pub fn new(bytes: impl AsRef<[u8]>) -> Self {
                $name {
                    bytes: intern(bytes.as_ref()),
                }
            }

            /// The name's bytes.
            #[inline]
            #[must_use]
            pub fn as_bytes(&self) -> &[u8] {
                &self.bytes
            }

            /// The name as UTF-8, if it is valid UTF-8.
            #[must_use]
            pub fn as_str(&self) -> Option<&str> {
                std::str::from_utf8(&self.bytes).ok()
            }

            #[inline]
            pub fn len(&self) -> usize {
                self.bytes.len()
            }

            #[inline]
            pub fn is_empty(&self) -> bool {
                self.bytes.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, String::from_utf8_lossy(&self.bytes))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl PartialEq for $name {
            #[inline]
            fn eq(&self, other: &Self) -> bool {
                // Due to interning, pointer comparison is sufficient
                Arc::ptr_eq(&self.bytes, &other.bytes)
            }
        }

        impl Eq for $name {}

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.bytes.cmp(&other.bytes)
            }
        }

        impl Hash for $name {
            #[inline]
            fn hash<H: Hasher>(&self, state: &mut H) {
                Arc::as_ptr(&self.bytes).hash(state);
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name::new(s)
            }
        }
    };
}

interned_name!(
    /// An identifier such as `defn` or `+`.
    Symbol,
    ""
);

interned_name!(
    /// A self-evaluating tag, printed with a leading colon.
    ///
    /// The stored bytes do not include the colon.
    Keyword,
    ":"
);
