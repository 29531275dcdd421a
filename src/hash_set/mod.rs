//! Persistent hash sets, backed by the hash map machinery with unit values.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::hash_map::{self, HashMap, Keys};

#[cfg(test)]
mod tests;

/// A persistent set keyed the same way as [`HashMap`].
pub struct HashSet<T> {
    map: HashMap<T, ()>,
}

impl<T: Hash + Eq + Clone> HashSet<T> {
    pub fn new() -> Self {
        HashSet {
            map: HashMap::new(),
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
        HashSet {
            map: self.map.insert(t, ()),
        }
    }

    /// A set without `t`.
    pub fn remove(&self, t: &T) -> Self {
        HashSet {
            map: self.map.remove(t),
        }
    }

    pub fn remove_all<'a>(&self, elts: impl IntoIterator<Item = &'a T>) -> Self
    where
        T: 'a,
    {
        HashSet {
            map: self.map.remove_all(elts),
        }
    }

    /// Union; when `other` adds nothing the result is `self`'s snapshot.
    pub fn union(&self, other: &Self) -> Self {
        HashSet {
            map: self.map.union(&other.map),
        }
    }

    /// Elements of `self` also present in `other`.
    pub fn intersection(&self, other: &Self) -> Self {
        HashSet {
            map: self.map.intersect_with(&other.map),
        }
    }

    /// Elements of `self` absent from `other`.
    pub fn difference(&self, other: &Self) -> Self {
        HashSet {
            map: self.map.difference_with(&other.map),
        }
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|t| other.contains(t))
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.map.keys(),
        }
    }

    /// A mutable staging wrapper around this snapshot.
    pub fn builder(&self) -> HashSetBuilder<T> {
        HashSetBuilder { set: self.clone() }
    }
}

impl<T> Clone for HashSet<T> {
    fn clone(&self) -> Self {
        HashSet {
            map: self.map.clone(),
        }
    }
}

impl<T> Default for HashSet<T> {
    fn default() -> Self {
        HashSet {
            map: HashMap::default(),
        }
    }
}

impl<T: Hash + Eq + Clone> PartialEq for HashSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<T: Hash + Eq + Clone> Eq for HashSet<T> {}

impl<T: Hash + Eq + Clone> Hash for HashSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.map.hash(state)
    }
}

impl<T: Hash + Eq + Clone + fmt::Debug> fmt::Debug for HashSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Hash + Eq + Clone> FromIterator<T> for HashSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut builder = HashSetBuilder::new();
        for t in iter {
            builder.insert(t);
        }
        builder.build()
    }
}

impl<T: Hash + Eq + Clone> Extend<T> for HashSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for t in iter {
            *self = self.insert(t);
        }
    }
}

impl<'a, T: Hash + Eq + Clone> IntoIterator for &'a HashSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Iter<'a, T> {
    inner: Keys<'a, T, ()>,
}

impl<'a, T: Hash + Eq + Clone> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Mutable staging over a single immutable snapshot; see the map builder.
pub struct HashSetBuilder<T> {
    set: HashSet<T>,
}

impl<T: Hash + Eq + Clone> HashSetBuilder<T> {
    pub fn new() -> Self {
        HashSetBuilder {
            set: HashSet::new(),
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

    pub fn build(self) -> HashSet<T> {
        self.set
    }
}

impl<T: Hash + Eq + Clone> Default for HashSetBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn validate<T: Hash + Eq + Clone>(set: &HashSet<T>) {
    hash_map::validate(&set.map);
}
