//! Persistent ordered sets, backed by the sorted map machinery.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::sorted_map::{self, Keys, SortedMap};

#[cfg(test)]
mod tests;

/// A persistent set iterated in ascending element order.
pub struct SortedSet<T> {
    map: SortedMap<T, ()>,
}

impl<T: Ord + Hash + Clone> SortedSet<T> {
    pub fn new() -> Self {
        SortedSet {
            map: SortedMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Whether `self` and `other` are the same snapshot, by root identity.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.map.ptr_eq(&other.map)
    }

    pub fn contains(&self, t: &T) -> bool {
        self.map.contains_key(t)
    }

    /// A set containing `t`. Inserting a present element hands back the
    /// original snapshot.
    pub fn insert(&self, t: T) -> Self {
        if self.contains(&t) {
            return self.clone();
        }
        SortedSet {
            map: self.map.insert(t, ()),
        }
    }

    pub fn remove(&self, t: &T) -> Self {
        SortedSet {
            map: self.map.remove(t),
        }
    }

    pub fn remove_all<'a>(&self, elts: impl IntoIterator<Item = &'a T>) -> Self
    where
        T: 'a,
    {
        SortedSet {
            map: self.map.remove_all(elts),
        }
    }

    /// Union; when `other` adds nothing the result is `self`'s snapshot.
    pub fn union(&self, other: &Self) -> Self {
        SortedSet {
            map: self.map.union(&other.map),
        }
    }

    pub fn intersection(&self, other: &Self) -> Self {
        SortedSet {
            map: self.map.intersect_with(&other.map),
        }
    }

    pub fn difference(&self, other: &Self) -> Self {
        SortedSet {
            map: self.map.difference_with(&other.map),
        }
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|t| other.contains(t))
    }

    pub fn first(&self) -> Option<&T> {
        self.map.first_key_value().map(|(k, _)| k)
    }

    pub fn last(&self) -> Option<&T> {
        self.map.last_key_value().map(|(k, _)| k)
    }

    /// Elements in ascending order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.map.keys(),
        }
    }

    /// A mutable staging wrapper around this snapshot.
    pub fn builder(&self) -> SortedSetBuilder<T> {
        SortedSetBuilder { set: self.clone() }
    }
}

impl<T> Clone for SortedSet<T> {
    fn clone(&self) -> Self {
        SortedSet {
            map: self.map.clone(),
        }
    }
}

impl<T> Default for SortedSet<T> {
    fn default() -> Self {
        SortedSet {
            map: SortedMap::default(),
        }
    }
}

impl<T: Ord + Hash + Clone> PartialEq for SortedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<T: Ord + Hash + Clone> Eq for SortedSet<T> {}

impl<T: Ord + Hash + Clone> Hash for SortedSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.map.hash(state)
    }
}

impl<T: Ord + Hash + Clone + fmt::Debug> fmt::Debug for SortedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Ord + Hash + Clone> FromIterator<T> for SortedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut builder = SortedSetBuilder::new();
        for t in iter {
            builder.insert(t);
        }
        builder.build()
    }
}

impl<T: Ord + Hash + Clone> Extend<T> for SortedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for t in iter {
            *self = self.insert(t);
        }
    }
}

impl<'a, T: Ord + Hash + Clone> IntoIterator for &'a SortedSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Iter<'a, T> {
    inner: Keys<'a, T, ()>,
}

impl<'a, T: Ord + Hash + Clone> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Mutable staging over a single immutable snapshot.
pub struct SortedSetBuilder<T> {
    set: SortedSet<T>,
}

impl<T: Ord + Hash + Clone> SortedSetBuilder<T> {
    pub fn new() -> Self {
        SortedSetBuilder {
            set: SortedSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn contains(&self, t: &T) -> bool {
        self.set.contains(t)
    }

    pub fn insert(&mut self, t: T) -> bool {
        let next = self.set.insert(t);
        let changed = !next.ptr_eq(&self.set);
        self.set = next;
        changed
    }

    pub fn remove(&mut self, t: &T) -> bool {
        let next = self.set.remove(t);
        let changed = !next.ptr_eq(&self.set);
        self.set = next;
        changed
    }

    pub fn build(self) -> SortedSet<T> {
        self.set
    }
}

impl<T: Ord + Hash + Clone> Default for SortedSetBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn validate<T: Ord + Hash + Clone>(set: &SortedSet<T>) {
    sorted_map::validate(&set.map);
}
