//! Mutable hash maps and sets backed by flat slot arrays.
//!
//! These are the in-place counterparts to the persistent structures: no
//! per-entry heap allocation, index arrays sized 8, 16, or 32 bits by
//! expected capacity, and in-place growth by rehashing into a larger table.
//! They are single-owner structures; the persistent maps are the tool for
//! anything shared.

use std::fmt;
use std::hash::Hash;

use crate::key;

use self::table::{Repr, ReprIter};

mod table;


/// A map whose entries live in flat arrays, insertion-ordered when
/// `ORDERED`. Use [`CompactLinkedHashMap`] for the ordered variant.
#[derive(Clone)]
pub struct CompactHashMap<K, V, const ORDERED: bool = false> {
    repr: Repr<(K, V), ORDERED>,
    /// Bumped on every structural change; iterators refuse to continue
    /// past a change.
    mutations: u32,
}

/// A compact map iterated in insertion order. Re-inserting a present key
/// updates its value and moves it to the back of the order.
pub type CompactLinkedHashMap<K, V> = CompactHashMap<K, V, true>;

impl<K: Hash + Eq, V, const ORDERED: bool> CompactHashMap<K, V, ORDERED> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// A table pre-sized for `capacity` entries. The index width is chosen
    /// here, so an accurate estimate avoids both rehashing and oversized
    /// indices.
    pub fn with_capacity(capacity: usize) -> Self {
        CompactHashMap {
            repr: Repr::with_capacity(capacity),
            mutations: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.repr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repr.len() == 0
    }

    /// Slots available before the next growth.
    pub fn capacity(&self) -> usize {
        self.repr.capacity()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = key::hash_value(key);
        let slot = self.repr.find_slot(hash, key)?;
        Some(&self.repr.item_at(slot).1)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = key::hash_value(key);
        let slot = self.repr.find_slot(hash, key)?;
        Some(&mut self.repr.item_at_mut(slot).1)
    }

    /// Insert in place, returning the value displaced by `key`.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = key::hash_value(&key);
        if let Some(slot) = self.repr.find_slot(hash, &key) {
            let (_, old) = self.repr.replace_at(slot, (key, value));
            if ORDERED {
                self.mutations = self.mutations.wrapping_add(1);
            }
            return Some(old);
        }
        if self.repr.len() == self.repr.capacity() {
            self.repr.grow();
        }
        self.repr.insert_new(hash, (key, value));
        self.mutations = self.mutations.wrapping_add(1);
        None
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let hash = key::hash_value(key);
        let removed = self.repr.remove(hash, key)?;
        self.mutations = self.mutations.wrapping_add(1);
        Some(removed.1)
    }

    /// Entries in insertion order for ordered tables, slot order otherwise.
    pub fn iter(&self) -> Iter<'_, K, V, ORDERED> {
        Iter {
            inner: self.repr.iter(),
            mutations: &self.mutations,
            snapshot: self.mutations,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }
}

impl<K: Hash + Eq, V, const ORDERED: bool> Default for CompactHashMap<K, V, ORDERED> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V: PartialEq, const ORDERED: bool> PartialEq for CompactHashMap<K, V, ORDERED> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Hash + Eq, V: Eq, const ORDERED: bool> Eq for CompactHashMap<K, V, ORDERED> {}

impl<K, V, const ORDERED: bool> fmt::Debug for CompactHashMap<K, V, ORDERED>
where
    K: Hash + Eq + fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Hash + Eq, V, const ORDERED: bool> Extend<(K, V)> for CompactHashMap<K, V, ORDERED> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Hash + Eq, V, const ORDERED: bool> FromIterator<(K, V)> for CompactHashMap<K, V, ORDERED> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map = Self::with_capacity(iter.size_hint().0);
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<'a, K: Hash + Eq, V, const ORDERED: bool> IntoIterator for &'a CompactHashMap<K, V, ORDERED> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, ORDERED>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Iter<'a, K, V, const ORDERED: bool> {
    inner: ReprIter<'a, (K, V), ORDERED>,
    mutations: &'a u32,
    snapshot: u32,
}

impl<'a, K, V, const ORDERED: bool> Iterator for Iter<'a, K, V, ORDERED> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        assert_eq!(
            *self.mutations, self.snapshot,
            "table modified during iteration"
        );
        self.inner.next().map(|(k, v)| (k, v))
    }
}

/// A set whose elements live in flat arrays, insertion-ordered when
/// `ORDERED`. Use [`CompactLinkedHashSet`] for the ordered variant.
#[derive(Clone)]
pub struct CompactHashSet<T, const ORDERED: bool = false> {
    map: CompactHashMap<T, (), ORDERED>,
}

/// A compact set iterated in insertion order. Re-inserting a present
/// element moves it to the back of the order.
pub type CompactLinkedHashSet<T> = CompactHashSet<T, true>;

impl<T: Hash + Eq, const ORDERED: bool> CompactHashSet<T, ORDERED> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        CompactHashSet {
            map: CompactHashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.map.capacity()
    }

    pub fn contains(&self, t: &T) -> bool {
        self.map.contains_key(t)
    }

    /// Insert in place; `true` when `t` was absent.
    pub fn insert(&mut self, t: T) -> bool {
        self.map.insert(t, ()).is_none()
    }

    /// Remove in place; `true` when `t` was present.
    pub fn remove(&mut self, t: &T) -> bool {
        self.map.remove(t).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.map.keys()
    }
}

impl<T: Hash + Eq, const ORDERED: bool> Default for CompactHashSet<T, ORDERED> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq, const ORDERED: bool> PartialEq for CompactHashSet<T, ORDERED> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<T: Hash + Eq, const ORDERED: bool> Eq for CompactHashSet<T, ORDERED> {}

impl<T: Hash + Eq + fmt::Debug, const ORDERED: bool> fmt::Debug for CompactHashSet<T, ORDERED> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Hash + Eq, const ORDERED: bool> Extend<T> for CompactHashSet<T, ORDERED> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for t in iter {
            self.insert(t);
        }
    }
}

impl<T: Hash + Eq, const ORDERED: bool> FromIterator<T> for CompactHashSet<T, ORDERED> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut set = Self::with_capacity(iter.size_hint().0);
        for t in iter {
            set.insert(t);
        }
        set
    }
}

#[cfg(test)]
pub(crate) fn validate_map<K: Hash + Eq, V, const ORDERED: bool>(
    map: &CompactHashMap<K, V, ORDERED>,
) {
    table::validate(&map.repr);
}

#[cfg(test)]
pub(crate) fn validate_set<T: Hash + Eq, const ORDERED: bool>(set: &CompactHashSet<T, ORDERED>) {
    table::validate(&set.map.repr);
}
