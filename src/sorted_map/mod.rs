//! Persistent ordered maps over `Ord` keys.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::Peekable;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::sync::Arc;

use crate::engine::{self, Link, NodeIter, TreapNode};
use crate::fork;
use crate::key;


fn priority_of(k: &impl Hash) -> u32 {
    key::mix(key::hash_value(k))
}

/// A persistent map in key order. The key itself is the tree's sort key, so
/// every node holds exactly one entry.
pub struct SortedMap<K, V> {
    len: usize,
    root: Link<SortedNode<K, V>>,
}

pub(crate) struct SortedNode<K, V> {
    priority: u32,
    key: K,
    value: V,
    left: Link<Self>,
    right: Link<Self>,
}

impl<K: Ord + Hash + Clone, V: Clone> TreapNode for SortedNode<K, V> {
    type Rank = K;

    fn priority(&self) -> u32 {
        self.priority
    }

    fn left(&self) -> &Link<Self> {
        &self.left
    }

    fn right(&self) -> &Link<Self> {
        &self.right
    }

    fn cmp_rank(&self, rank: &K) -> Ordering {
        self.key.cmp(rank)
    }

    fn cmp_node(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }

    fn with_children(&self, left: Link<Self>, right: Link<Self>) -> Arc<Self> {
        Arc::new(SortedNode {
            priority: self.priority,
            key: self.key.clone(),
            value: self.value.clone(),
            left,
            right,
        })
    }
}

impl<K: Ord + Hash + Clone, V: Clone> SortedNode<K, V> {
    fn leaf(key: K, value: V) -> Arc<Self> {
        Arc::new(SortedNode {
            priority: priority_of(&key),
            key,
            value,
            left: None,
            right: None,
        })
    }

    fn replacing(&self, value: V) -> Arc<Self> {
        Arc::new(SortedNode {
            priority: self.priority,
            key: self.key.clone(),
            value,
            left: None,
            right: None,
        })
    }

    fn merged(
        a: Option<&Arc<Self>>,
        b: Option<&Arc<Self>>,
        f: &mut impl FnMut(&K, Option<&V>, Option<&V>) -> Option<V>,
        out_len: &mut usize,
    ) -> Link<Self>
    where
        V: PartialEq,
    {
        let node = a.or(b).expect("merge visits at least one side");
        let merged = f(
            &node.key,
            a.map(|n| &n.value),
            b.map(|n| &n.value),
        )?;
        *out_len += 1;
        if let Some(a) = a {
            if a.value == merged {
                return Some(a.clone());
            }
        }
        Some(node.replacing(merged))
    }

    fn transformed(
        a: &Arc<Self>,
        f: &mut impl FnMut(&K, &V) -> Option<V>,
        out_len: &mut usize,
    ) -> Link<Self>
    where
        V: PartialEq,
    {
        let next = f(&a.key, &a.value)?;
        *out_len += 1;
        if a.value == next {
            return Some(a.clone());
        }
        Some(a.replacing(next))
    }
}

impl<K: Ord + Hash + Clone, V: Clone> SortedMap<K, V> {
    pub fn new() -> Self {
        SortedMap { len: 0, root: None }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `self` and `other` are the same snapshot, by root identity.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        engine::same(&self.root, &other.root)
    }

    pub fn get(&self, k: &K) -> Option<&V> {
        engine::find(&self.root, priority_of(k), k).map(|node| &node.value)
    }

    pub fn contains_key(&self, k: &K) -> bool {
        self.get(k).is_some()
    }

    /// A map with `k` bound to `v`. The original is untouched.
    pub fn insert(&self, k: K, v: V) -> Self {
        let node = SortedNode::leaf(k, v);
        let mut replaced = false;
        let root = engine::add(&self.root, &node, &mut |_, incoming| {
            replaced = true;
            incoming.clone()
        });
        SortedMap {
            len: self.len + usize::from(!replaced),
            root,
        }
    }

    /// A map without `k`. Removing an absent key hands back the original
    /// snapshot.
    pub fn remove(&self, k: &K) -> Self {
        let mut removed = false;
        let root = engine::remove(&self.root, priority_of(k), k, &mut |_| {
            removed = true;
            Some(None)
        });
        SortedMap {
            len: self.len - usize::from(removed),
            root,
        }
    }

    pub fn remove_all<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Self
    where
        K: 'a,
    {
        keys.into_iter().fold(self.clone(), |m, k| m.remove(k))
    }

    /// Insert, replace, or delete the entry for `k` in a single pass.
    pub fn update_entry(&self, k: K, f: impl FnOnce(Option<&V>) -> Option<V>) -> Self {
        let priority = priority_of(&k);
        let probe = k.clone();
        let mut delta = 0isize;
        let mut slot = Some((k, f));
        let root = engine::update(&self.root, priority, &probe, &mut |existing| {
            let (k, f) = slot.take().expect("update visits exactly one node");
            match existing {
                None => f(None).map(|v| {
                    delta += 1;
                    SortedNode::leaf(k, v)
                }),
                Some(node) => match f(Some(&node.value)) {
                    Some(v) => Some(node.replacing(v)),
                    None => {
                        delta -= 1;
                        None
                    }
                },
            }
        });
        SortedMap {
            len: (self.len as isize + delta) as usize,
            root,
        }
    }

    /// Left-biased union; `self.union(sub)` for `sub` already contained in
    /// `self` returns the original snapshot.
    pub fn union(&self, other: &Self) -> Self {
        let mut common = 0usize;
        let root = engine::union(&self.root, &other.root, &mut |a, _| {
            common += 1;
            a.clone()
        });
        SortedMap {
            len: self.len + other.len - common,
            root,
        }
    }

    pub(crate) fn intersect_with(&self, other: &Self) -> Self {
        let mut kept = 0usize;
        let root = engine::intersect(&self.root, &other.root, &mut |a, _| {
            kept += 1;
            Some(a.clone())
        });
        SortedMap { len: kept, root }
    }

    pub(crate) fn difference_with(&self, other: &Self) -> Self {
        let mut removed = 0usize;
        let root = engine::difference(&self.root, &other.root, &mut |_, _| {
            removed += 1;
            None
        });
        SortedMap {
            len: self.len - removed,
            root,
        }
    }

    /// Full outer merge in key order; returning `None` drops the key.
    pub fn merge(
        &self,
        other: &Self,
        mut f: impl FnMut(&K, Option<&V>, Option<&V>) -> Option<V>,
    ) -> Self
    where
        V: PartialEq,
    {
        let mut len = 0usize;
        let root = engine::merge_with(&self.root, &other.root, &mut |a, b| {
            SortedNode::merged(a, b, &mut f, &mut len)
        });
        SortedMap { len, root }
    }

    /// `merge` with forked subtree recursion; `f` must be pure.
    pub fn parallel_merge(
        &self,
        other: &Self,
        threshold_log2: u32,
        f: impl Fn(&K, Option<&V>, Option<&V>) -> Option<V> + Sync,
    ) -> Self
    where
        K: Send + Sync,
        V: Send + Sync + PartialEq,
    {
        let len = AtomicUsize::new(0);
        let root = engine::merge_with_using(
            &fork::Parallel,
            threshold_log2,
            &self.root,
            &other.root,
            &|a, b| {
                let mut local = 0usize;
                let res = SortedNode::merged(a, b, &mut |k, va, vb| f(k, va, vb), &mut local);
                len.fetch_add(local, Relaxed);
                res
            },
        );
        SortedMap {
            len: len.load(Relaxed),
            root,
        }
    }

    /// Transform every value in key order; returning `None` drops the entry.
    pub fn update_values(&self, mut f: impl FnMut(&K, &V) -> Option<V>) -> Self
    where
        V: PartialEq,
    {
        let mut len = 0usize;
        let root = engine::map_nodes(&self.root, &mut |node| {
            SortedNode::transformed(node, &mut f, &mut len)
        });
        SortedMap { len, root }
    }

    /// `update_values` with forked subtree recursion; `f` must be pure.
    pub fn parallel_update_values(
        &self,
        threshold_log2: u32,
        f: impl Fn(&K, &V) -> Option<V> + Sync,
    ) -> Self
    where
        K: Send + Sync,
        V: Send + Sync + PartialEq,
    {
        let len = AtomicUsize::new(0);
        let root = engine::map_nodes_using(&fork::Parallel, threshold_log2, &self.root, &|node| {
            let mut local = 0usize;
            let res = SortedNode::transformed(node, &mut |k, v| f(k, v), &mut local);
            len.fetch_add(local, Relaxed);
            res
        });
        SortedMap {
            len: len.load(Relaxed),
            root,
        }
    }

    /// Key-aligned pairing of two maps, produced lazily in key order.
    pub fn zip<'a, V2: Clone>(&'a self, other: &'a SortedMap<K, V2>) -> Zip<'a, K, V, V2> {
        Zip {
            left: self.iter().peekable(),
            right: other.iter().peekable(),
        }
    }

    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        engine::leftmost(&self.root).map(|n| (&n.key, &n.value))
    }

    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        engine::rightmost(&self.root).map(|n| (&n.key, &n.value))
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: NodeIter::new(&self.root),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// The key set as an owned set sharing no structure with the map.
    pub fn key_set(&self) -> crate::SortedSet<K> {
        self.keys().cloned().collect()
    }

    /// A mutable staging wrapper around this snapshot.
    pub fn builder(&self) -> SortedMapBuilder<K, V> {
        SortedMapBuilder { map: self.clone() }
    }
}

impl<K, V> Clone for SortedMap<K, V> {
    fn clone(&self) -> Self {
        SortedMap {
            len: self.len,
            root: self.root.clone(),
        }
    }
}

impl<K, V> Default for SortedMap<K, V> {
    fn default() -> Self {
        SortedMap { len: 0, root: None }
    }
}

impl<K: Ord + Hash + Clone, V: Clone + PartialEq> PartialEq for SortedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && engine::deep_eq(&self.root, &other.root, &mut |a, b| {
                a.key == b.key && a.value == b.value
            })
    }
}

impl<K: Ord + Hash + Clone, V: Clone + Eq> Eq for SortedMap<K, V> {}

impl<K: Ord + Hash + Clone, V: Clone + Hash> Hash for SortedMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len.hash(state);
        for (k, v) in self.iter() {
            k.hash(state);
            v.hash(state);
        }
    }
}

impl<K: Ord + Hash + Clone + fmt::Debug, V: Clone + fmt::Debug> fmt::Debug for SortedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord + Hash + Clone, V: Clone> FromIterator<(K, V)> for SortedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut builder = SortedMapBuilder::new();
        for (k, v) in iter {
            builder.insert(k, v);
        }
        builder.build()
    }
}

impl<K: Ord + Hash + Clone, V: Clone> Extend<(K, V)> for SortedMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            *self = self.insert(k, v);
        }
    }
}

impl<'a, K: Ord + Hash + Clone, V: Clone> IntoIterator for &'a SortedMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Iter<'a, K, V> {
    nodes: NodeIter<'a, SortedNode<K, V>>,
}

impl<'a, K: Ord + Hash + Clone, V: Clone> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.nodes.next().map(|n| (&n.key, &n.value))
    }
}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K: Ord + Hash + Clone, V: Clone> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K: Ord + Hash + Clone, V: Clone> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}

/// Merge-join of two maps' in-order entry streams; see [`SortedMap::zip`].
pub struct Zip<'a, K: Ord + Hash + Clone, V: Clone, V2: Clone> {
    left: Peekable<Iter<'a, K, V>>,
    right: Peekable<Iter<'a, K, V2>>,
}

impl<'a, K: Ord + Hash + Clone, V: Clone, V2: Clone> Iterator for Zip<'a, K, V, V2> {
    type Item = (&'a K, (Option<&'a V>, Option<&'a V2>));

    fn next(&mut self) -> Option<Self::Item> {
        let ord = match (self.left.peek(), self.right.peek()) {
            (None, None) => return None,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((ka, _)), Some((kb, _))) => ka.cmp(kb),
        };
        match ord {
            Ordering::Less => self.left.next().map(|(k, v)| (k, (Some(v), None))),
            Ordering::Greater => self.right.next().map(|(k, v2)| (k, (None, Some(v2)))),
            Ordering::Equal => {
                let (k, v) = self.left.next()?;
                let (_, v2) = self.right.next()?;
                Some((k, (Some(v), Some(v2))))
            }
        }
    }
}

/// Mutable staging over a single immutable snapshot; see the hash map
/// builder for the contract.
pub struct SortedMapBuilder<K, V> {
    map: SortedMap<K, V>,
}

impl<K: Ord + Hash + Clone, V: Clone> SortedMapBuilder<K, V> {
    pub fn new() -> Self {
        SortedMapBuilder {
            map: SortedMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, k: &K) -> Option<&V> {
        self.map.get(k)
    }

    pub fn insert(&mut self, k: K, v: V) -> bool {
        let next = self.map.insert(k, v);
        let changed = !next.ptr_eq(&self.map);
        self.map = next;
        changed
    }

    pub fn remove(&mut self, k: &K) -> bool {
        let next = self.map.remove(k);
        let changed = !next.ptr_eq(&self.map);
        self.map = next;
        changed
    }

    pub fn build(self) -> SortedMap<K, V> {
        self.map
    }
}

impl<K: Ord + Hash + Clone, V: Clone> Default for SortedMapBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn validate<K: Ord + Hash + Clone, V: Clone>(map: &SortedMap<K, V>) {
    engine::validate(&map.root);
    let mut count = 0;
    for node in NodeIter::new(&map.root) {
        assert_eq!(node.priority, priority_of(&node.key));
        count += 1;
    }
    assert_eq!(count, map.len);
}
