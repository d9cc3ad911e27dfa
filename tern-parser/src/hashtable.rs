// tern-parser - Open-addressing hash table keyed by values
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Open-addressing hash table from [`TernVal`] to [`TernVal`].
//!
//! Capacity is always a power of two and probing is triangular
//! (`h, h+1, h+3, h+6, ...`), which visits every slot exactly once before
//! repeating. Each occupied slot keeps the key's 32-bit hash, so probes only
//! call [`TernVal::equals`] on a hash match and resizing never rehashes a key.
//!
//! Deletion leaves a tombstone. Tombstones count against the load factor and
//! are purged whenever the table is rebuilt.

use std::fmt;

use tracing::trace;

use crate::error::Result;
use crate::value::TernVal;

/// Smallest non-zero capacity.
pub const MIN_CAPACITY: usize = 8;

#[derive(Clone, Default)]
enum Slot {
    #[default]
    Empty,
    Tombstone,
    Occupied {
        hash: u32,
        key: TernVal,
        value: TernVal,
    },
}

/// A mapping from values to values, compared with the value model's
/// hash/equality contract.
#[derive(Clone, Default)]
pub struct HashTable {
    slots: Vec<Slot>,
    len: usize,
    tombstones: usize,
}

#[inline]
fn load_limit(capacity: usize) -> usize {
    capacity / 4 * 3
}

/// Slots needed to hold `n` bindings without resizing. Saturates at the
/// largest power of two instead of overflowing.
fn slots_for(n: usize) -> usize {
    n.saturating_mul(4)
        .div_ceil(3)
        .saturating_add(1)
        .checked_next_power_of_two()
        .unwrap_or(1 << (usize::BITS - 1))
        .max(MIN_CAPACITY)
}

impl HashTable {
    /// An empty table. No storage is allocated until the first insert.
    pub fn new() -> Self {
        HashTable {
            slots: Vec::new(),
            len: 0,
            tombstones: 0,
        }
    }

    /// An empty table that can hold `n` bindings without resizing.
    pub fn with_capacity(n: usize) -> Self {
        if n == 0 {
            return HashTable::new();
        }
        HashTable {
            slots: vec![Slot::Empty; slots_for(n)],
            len: 0,
            tombstones: 0,
        }
    }

    /// Build a table from pairs. A later pair overwrites an earlier one with
    /// an equal key.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (TernVal, TernVal)>) -> Result<Self> {
        let pairs = pairs.into_iter();
        let mut table = HashTable::with_capacity(pairs.size_hint().0);
        for (key, value) in pairs {
            table.insert(key, value)?;
        }
        Ok(table)
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots currently allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the slot holding `key`, if any.
    fn find(&self, key: &TernVal, hash: u32) -> Result<Option<usize>> {
        if self.slots.is_empty() {
            return Ok(None);
        }
        let mask = self.slots.len() - 1;
        let mut index = hash as usize & mask;
        for step in 1..=self.slots.len() {
            match &self.slots[index] {
                Slot::Empty => return Ok(None),
                Slot::Tombstone => {}
                Slot::Occupied { hash: h, key: k, .. } => {
                    if *h == hash && k.equals(key)? {
                        return Ok(Some(index));
                    }
                }
            }
            index = (index + step) & mask;
        }
        Ok(None)
    }

    /// First free slot (empty or tombstone) on the probe sequence of `hash`.
    fn free_slot(&self, hash: u32) -> usize {
        let mask = self.slots.len() - 1;
        let mut index = hash as usize & mask;
        let mut step = 1;
        while let Slot::Occupied { .. } = self.slots[index] {
            index = (index + step) & mask;
            step += 1;
        }
        index
    }

    /// Make room for one more binding, growing or purging tombstones.
    fn reserve_one(&mut self) {
        let capacity = self.slots.len();
        if capacity == 0 {
            self.rebuild(MIN_CAPACITY);
            return;
        }
        let limit = load_limit(capacity);
        if self.len + self.tombstones < limit {
            return;
        }
        if self.len + 1 < limit / 2 {
            self.rebuild(capacity);
        } else {
            self.rebuild(capacity * 2);
        }
    }

    fn rebuild(&mut self, capacity: usize) {
        trace!(
            old_capacity = self.slots.len(),
            new_capacity = capacity,
            len = self.len,
            tombstones = self.tombstones,
            "rebuilding hash table"
        );
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; capacity]);
        self.tombstones = 0;
        for slot in old {
            if let Slot::Occupied { hash, key, value } = slot {
                let index = self.free_slot(hash);
                self.slots[index] = Slot::Occupied { hash, key, value };
            }
        }
    }

    /// Bind `key` to `value`. Returns the previous value if the key was
    /// already present; the length only grows for a new key.
    pub fn insert(&mut self, key: TernVal, value: TernVal) -> Result<Option<TernVal>> {
        let hash = key.hash()?;
        if let Some(index) = self.find(&key, hash)?
            && let Slot::Occupied { value: slot, .. } = &mut self.slots[index]
        {
            return Ok(Some(std::mem::replace(slot, value)));
        }
        self.reserve_one();
        let index = self.free_slot(hash);
        if let Slot::Tombstone = self.slots[index] {
            self.tombstones -= 1;
        }
        self.slots[index] = Slot::Occupied { hash, key, value };
        self.len += 1;
        Ok(None)
    }

    /// The value bound to `key`, if any.
    pub fn lookup(&self, key: &TernVal) -> Result<Option<&TernVal>> {
        let hash = key.hash()?;
        Ok(match self.find(key, hash)? {
            Some(index) => match &self.slots[index] {
                Slot::Occupied { value, .. } => Some(value),
                _ => None,
            },
            None => None,
        })
    }

    pub fn contains_key(&self, key: &TernVal) -> Result<bool> {
        Ok(self.lookup(key)?.is_some())
    }

    /// Remove the binding for `key`, returning its value if it was present.
    pub fn delete(&mut self, key: &TernVal) -> Result<Option<TernVal>> {
        let hash = key.hash()?;
        let Some(index) = self.find(key, hash)? else {
            return Ok(None);
        };
        let removed = std::mem::replace(&mut self.slots[index], Slot::Tombstone);
        self.len -= 1;
        self.tombstones += 1;
        if self.len == 0 {
            self.slots.fill(Slot::Empty);
            self.tombstones = 0;
        }
        match removed {
            Slot::Occupied { value, .. } => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Remove every binding, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.slots.fill(Slot::Empty);
        self.len = 0;
        self.tombstones = 0;
    }

    /// Live bindings in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&TernVal, &TernVal)> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied { key, value, .. } => Some((key, value)),
            _ => None,
        })
    }
}

impl fmt::Debug for HashTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
