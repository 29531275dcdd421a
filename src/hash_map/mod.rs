//! Persistent hash maps keyed by hash code, with chained collisions.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::sync::Arc;

use rustc_hash::FxHasher;

use crate::engine::{self, Link, NodeIter, TreapNode};
use crate::fork;
use crate::key;


/// A persistent map. Tree position is decided by the key's hash code; keys
/// whose hashes collide share one node and live on a short chain there.
pub struct HashMap<K, V> {
    len: usize,
    root: Link<HashedNode<K, V>>,
}

/// One tree node: the head entry plus any same-hash spill entries.
pub(crate) struct HashedNode<K, V> {
    hash: u32,
    key: K,
    value: V,
    collisions: Vec<(K, V)>,
    left: Link<Self>,
    right: Link<Self>,
}

impl<K: Hash + Eq + Clone, V: Clone> TreapNode for HashedNode<K, V> {
    type Rank = u32;

    fn priority(&self) -> u32 {
        key::mix(self.hash)
    }

    fn left(&self) -> &Link<Self> {
        &self.left
    }

    fn right(&self) -> &Link<Self> {
        &self.right
    }

    fn cmp_rank(&self, rank: &u32) -> Ordering {
        self.hash.cmp(rank)
    }

    fn cmp_node(&self, other: &Self) -> Ordering {
        self.hash.cmp(&other.hash)
    }

    fn with_children(&self, left: Link<Self>, right: Link<Self>) -> Arc<Self> {
        Arc::new(HashedNode {
            hash: self.hash,
            key: self.key.clone(),
            value: self.value.clone(),
            collisions: self.collisions.clone(),
            left,
            right,
        })
    }
}

impl<K: Hash + Eq + Clone, V: Clone> HashedNode<K, V> {
    fn leaf(hash: u32, key: K, value: V) -> Arc<Self> {
        Arc::new(HashedNode {
            hash,
            key,
            value,
            collisions: Vec::new(),
            left: None,
            right: None,
        })
    }

    fn from_entries(hash: u32, entries: Vec<(K, V)>) -> Link<Self> {
        let mut it = entries.into_iter();
        let (key, value) = it.next()?;
        Some(Arc::new(HashedNode {
            hash,
            key,
            value,
            collisions: it.collect(),
            left: None,
            right: None,
        }))
    }

    fn entries(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        std::iter::once((&self.key, &self.value))
            .chain(self.collisions.iter().map(|(k, v)| (k, v)))
    }

    fn chain_len(&self) -> usize {
        1 + self.collisions.len()
    }

    fn chain_get(&self, k: &K) -> Option<&V> {
        if self.key == *k {
            return Some(&self.value);
        }
        self.collisions
            .iter()
            .find(|(ck, _)| ck == k)
            .map(|(_, v)| v)
    }

    /// Payload with `key` bound to `value`; children are left empty.
    fn chain_with(&self, k: K, v: V, replaced: &mut bool) -> Arc<Self> {
        debug_assert_eq!(self.hash, key::hash_value(&k));
        if self.key == k {
            *replaced = true;
            return Arc::new(HashedNode {
                hash: self.hash,
                key: k,
                value: v,
                collisions: self.collisions.clone(),
                left: None,
                right: None,
            });
        }
        let mut collisions = self.collisions.clone();
        if let Some(i) = collisions.iter().position(|(ck, _)| *ck == k) {
            *replaced = true;
            collisions[i] = (k, v);
        } else {
            collisions.push((k, v));
        }
        Arc::new(HashedNode {
            hash: self.hash,
            key: self.key.clone(),
            value: self.value.clone(),
            collisions,
            left: None,
            right: None,
        })
    }

    /// `None` when `k` is not on the chain; `Some(None)` when removing it
    /// empties the node; otherwise the reduced payload.
    fn chain_without(&self, k: &K) -> Option<Link<Self>> {
        if self.key == *k {
            if self.collisions.is_empty() {
                return Some(None);
            }
            let mut collisions = self.collisions.clone();
            let (key, value) = collisions.remove(0);
            return Some(Some(Arc::new(HashedNode {
                hash: self.hash,
                key,
                value,
                collisions,
                left: None,
                right: None,
            })));
        }
        let i = self.collisions.iter().position(|(ck, _)| ck == k)?;
        let mut collisions = self.collisions.clone();
        collisions.remove(i);
        Some(Some(Arc::new(HashedNode {
            hash: self.hash,
            key: self.key.clone(),
            value: self.value.clone(),
            collisions,
            left: None,
            right: None,
        })))
    }

    /// Left-biased chain union; `common` counts keys present on both sides.
    fn chain_union(a: &Arc<Self>, b: &Self, common: &mut usize) -> Arc<Self> {
        let mut extra: Vec<(K, V)> = Vec::new();
        for (k, v) in b.entries() {
            if a.chain_get(k).is_some() {
                *common += 1;
            } else {
                extra.push((k.clone(), v.clone()));
            }
        }
        if extra.is_empty() {
            return a.clone();
        }
        let mut collisions = a.collisions.clone();
        collisions.extend(extra);
        Arc::new(HashedNode {
            hash: a.hash,
            key: a.key.clone(),
            value: a.value.clone(),
            collisions,
            left: None,
            right: None,
        })
    }

    /// Entries of `a` whose keys also appear on `b`'s chain.
    fn chain_intersect(a: &Arc<Self>, b: &Self, kept_total: &mut usize) -> Link<Self> {
        let kept: Vec<(K, V)> = a
            .entries()
            .filter(|(k, _)| b.chain_get(k).is_some())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        *kept_total += kept.len();
        if kept.len() == a.chain_len() {
            return Some(a.clone());
        }
        Self::from_entries(a.hash, kept)
    }

    /// Entries of `a` whose keys are absent from `b`'s chain.
    fn chain_difference(a: &Arc<Self>, b: &Self, removed: &mut usize) -> Link<Self> {
        let kept: Vec<(K, V)> = a
            .entries()
            .filter(|(k, _)| b.chain_get(k).is_none())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        *removed += a.chain_len() - kept.len();
        if kept.len() == a.chain_len() {
            return Some(a.clone());
        }
        Self::from_entries(a.hash, kept)
    }

    fn chain_merge(
        a: Option<&Arc<Self>>,
        b: Option<&Arc<Self>>,
        f: &mut impl FnMut(&K, Option<&V>, Option<&V>) -> Option<V>,
        out_len: &mut usize,
    ) -> Link<Self>
    where
        V: PartialEq,
    {
        let hash = a.or(b).expect("merge visits at least one side").hash;
        let mut entries: Vec<(K, V)> = Vec::new();
        if let Some(a) = a {
            for (k, va) in a.entries() {
                let vb = b.and_then(|b| b.chain_get(k));
                if let Some(v) = f(k, Some(va), vb) {
                    entries.push((k.clone(), v));
                }
            }
        }
        if let Some(b) = b {
            for (k, vb) in b.entries() {
                if a.map_or(true, |a| a.chain_get(k).is_none()) {
                    if let Some(v) = f(k, None, Some(vb)) {
                        entries.push((k.clone(), v));
                    }
                }
            }
        }
        *out_len += entries.len();
        if let Some(a) = a {
            if entries.len() == a.chain_len()
                && entries.iter().all(|(k, v)| a.chain_get(k) == Some(v))
            {
                return Some(a.clone());
            }
        }
        Self::from_entries(hash, entries)
    }

    fn chain_transform(
        a: &Arc<Self>,
        f: &mut impl FnMut(&K, &V) -> Option<V>,
        out_len: &mut usize,
    ) -> Link<Self>
    where
        V: PartialEq,
    {
        let entries: Vec<(K, V)> = a
            .entries()
            .filter_map(|(k, v)| f(k, v).map(|nv| (k.clone(), nv)))
            .collect();
        *out_len += entries.len();
        if entries.len() == a.chain_len() && entries.iter().all(|(k, v)| a.chain_get(k) == Some(v))
        {
            return Some(a.clone());
        }
        Self::from_entries(a.hash, entries)
    }

    /// Chain equality is order-insensitive; chain order depends on insertion
    /// history while logical content does not.
    fn chain_eq(&self, other: &Self) -> bool
    where
        V: PartialEq,
    {
        self.hash == other.hash
            && self.chain_len() == other.chain_len()
            && self.entries().all(|(k, v)| other.chain_get(k) == Some(v))
    }
}

impl<K: Hash + Eq + Clone, V: Clone> HashMap<K, V> {
    pub fn new() -> Self {
        HashMap { len: 0, root: None }
    }

    /// The number of entries in the map.
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
        let hash = key::hash_value(k);
        engine::find(&self.root, key::mix(hash), &hash)?.chain_get(k)
    }

    pub fn contains_key(&self, k: &K) -> bool {
        self.get(k).is_some()
    }

    /// A map with `k` bound to `v`. The original is untouched.
    pub fn insert(&self, k: K, v: V) -> Self {
        let hash = key::hash_value(&k);
        let node = HashedNode::leaf(hash, k, v);
        let mut replaced = false;
        let root = engine::add(&self.root, &node, &mut |existing, incoming| {
            existing.chain_with(incoming.key.clone(), incoming.value.clone(), &mut replaced)
        });
        HashMap {
            len: self.len + usize::from(!replaced),
            root,
        }
    }

    /// A map without `k`. Removing an absent key hands back the original
    /// snapshot, root and all.
    pub fn remove(&self, k: &K) -> Self {
        let hash = key::hash_value(k);
        let mut removed = false;
        let root = engine::remove(&self.root, key::mix(hash), &hash, &mut |node| {
            let res = node.chain_without(k);
            removed |= res.is_some();
            res
        });
        HashMap {
            len: self.len - usize::from(removed),
            root,
        }
    }

    /// Remove every key in `keys`. When none are present the result shares
    /// the original root.
    pub fn remove_all<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Self
    where
        K: 'a,
    {
        keys.into_iter().fold(self.clone(), |m, k| m.remove(k))
    }

    /// Insert, replace, or delete the entry for `k` in a single pass.
    /// `f` sees the current value (or absence) and returns the value to keep.
    pub fn update_entry(&self, k: K, f: impl FnOnce(Option<&V>) -> Option<V>) -> Self {
        let hash = key::hash_value(&k);
        let mut delta = 0isize;
        let mut slot = Some((k, f));
        let root = engine::update(&self.root, key::mix(hash), &hash, &mut |existing| {
            let (k, f) = slot.take().expect("update visits exactly one node");
            match existing {
                None => f(None).map(|v| {
                    delta += 1;
                    HashedNode::leaf(hash, k, v)
                }),
                Some(node) => match node.chain_get(&k) {
                    Some(v) => match f(Some(v)) {
                        Some(nv) => {
                            let mut replaced = false;
                            Some(node.chain_with(k, nv, &mut replaced))
                        }
                        None => {
                            delta -= 1;
                            node.chain_without(&k).expect("entry is on this chain")
                        }
                    },
                    None => match f(None) {
                        Some(nv) => {
                            delta += 1;
                            let mut replaced = false;
                            Some(node.chain_with(k, nv, &mut replaced))
                        }
                        None => Some(node.clone()),
                    },
                },
            }
        });
        HashMap {
            len: (self.len as isize + delta) as usize,
            root,
        }
    }

    /// Left-biased union: keys present on both sides keep `self`'s value.
    /// `self.union(sub)` for `sub` already contained in `self` returns the
    /// original snapshot.
    pub fn union(&self, other: &Self) -> Self {
        let mut common = 0usize;
        let root = engine::union(&self.root, &other.root, &mut |a, b| {
            HashedNode::chain_union(a, b, &mut common)
        });
        HashMap {
            len: self.len + other.len - common,
            root,
        }
    }

    pub(crate) fn intersect_with(&self, other: &Self) -> Self {
        let mut kept = 0usize;
        let root = engine::intersect(&self.root, &other.root, &mut |a, b| {
            HashedNode::chain_intersect(a, b, &mut kept)
        });
        HashMap { len: kept, root }
    }

    pub(crate) fn difference_with(&self, other: &Self) -> Self {
        let mut removed = 0usize;
        let root = engine::difference(&self.root, &other.root, &mut |a, b| {
            HashedNode::chain_difference(a, b, &mut removed)
        });
        HashMap {
            len: self.len - removed,
            root,
        }
    }

    /// Full outer merge. `f` is called once per key present in either map;
    /// returning `None` drops the key.
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
            HashedNode::chain_merge(a, b, &mut f, &mut len)
        });
        HashMap { len, root }
    }

    /// `merge` with subtree recursion forked once estimated subtree sizes
    /// reach `2^threshold_log2`. `f` must be pure; it runs concurrently.
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
                let res = HashedNode::chain_merge(a, b, &mut |k, va, vb| f(k, va, vb), &mut local);
                len.fetch_add(local, Relaxed);
                res
            },
        );
        HashMap {
            len: len.load(Relaxed),
            root,
        }
    }

    /// Transform every value in place; returning `None` drops the entry.
    pub fn update_values(&self, mut f: impl FnMut(&K, &V) -> Option<V>) -> Self
    where
        V: PartialEq,
    {
        let mut len = 0usize;
        let root = engine::map_nodes(&self.root, &mut |node| {
            HashedNode::chain_transform(node, &mut f, &mut len)
        });
        HashMap { len, root }
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
            let res = HashedNode::chain_transform(node, &mut |k, v| f(k, v), &mut local);
            len.fetch_add(local, Relaxed);
            res
        });
        HashMap {
            len: len.load(Relaxed),
            root,
        }
    }

    /// Pair up values by key across two maps. Keys present in either map
    /// appear exactly once, with absences surfaced as `None`.
    pub fn zip<'a, V2: Clone>(&'a self, other: &'a HashMap<K, V2>) -> Zip<'a, K, V, V2> {
        Zip {
            left: self.iter(),
            right: other.iter(),
            this: self,
            that: other,
        }
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: NodeIter::new(&self.root),
            node: None,
            chain_pos: 0,
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// The key set as an owned set sharing no structure with the map.
    pub fn key_set(&self) -> crate::HashSet<K> {
        self.keys().cloned().collect()
    }

    /// A mutable staging wrapper around this snapshot.
    pub fn builder(&self) -> HashMapBuilder<K, V> {
        HashMapBuilder { map: self.clone() }
    }
}

impl<K, V> Clone for HashMap<K, V> {
    fn clone(&self) -> Self {
        HashMap {
            len: self.len,
            root: self.root.clone(),
        }
    }
}

impl<K, V> Default for HashMap<K, V> {
    fn default() -> Self {
        HashMap { len: 0, root: None }
    }
}

impl<K: Hash + Eq + Clone, V: Clone + PartialEq> PartialEq for HashMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && engine::deep_eq(&self.root, &other.root, &mut |a, b| a.chain_eq(b))
    }
}

impl<K: Hash + Eq + Clone, V: Clone + Eq> Eq for HashMap<K, V> {}

impl<K: Hash + Eq + Clone, V: Clone + Hash> Hash for HashMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len.hash(state);
        for node in NodeIter::new(&self.root) {
            state.write_u32(node.hash);
            // Chain order is insertion-dependent; fold entries commutatively.
            let mut acc = 0u64;
            for (k, v) in node.entries() {
                let mut h = FxHasher::default();
                k.hash(&mut h);
                v.hash(&mut h);
                acc ^= h.finish();
            }
            state.write_u64(acc);
        }
    }
}

impl<K: Hash + Eq + Clone + fmt::Debug, V: Clone + fmt::Debug> fmt::Debug for HashMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> FromIterator<(K, V)> for HashMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut builder = HashMapBuilder::new();
        for (k, v) in iter {
            builder.insert(k, v);
        }
        builder.build()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Extend<(K, V)> for HashMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            *self = self.insert(k, v);
        }
    }
}

impl<'a, K: Hash + Eq + Clone, V: Clone> IntoIterator for &'a HashMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Entry iterator: hash order across nodes, chain order within a node.
pub struct Iter<'a, K, V> {
    nodes: NodeIter<'a, HashedNode<K, V>>,
    node: Option<&'a HashedNode<K, V>>,
    chain_pos: usize,
}

impl<'a, K: Hash + Eq + Clone, V: Clone> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.node {
                if self.chain_pos == 0 {
                    self.chain_pos = 1;
                    return Some((&node.key, &node.value));
                }
                if let Some((k, v)) = node.collisions.get(self.chain_pos - 1) {
                    self.chain_pos += 1;
                    return Some((k, v));
                }
                self.node = None;
            }
            self.node = Some(self.nodes.next()?.as_ref());
            self.chain_pos = 0;
        }
    }
}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K: Hash + Eq + Clone, V: Clone> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K: Hash + Eq + Clone, V: Clone> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}

/// Lazy key-aligned pairing of two maps; see [`HashMap::zip`].
pub struct Zip<'a, K, V, V2> {
    left: Iter<'a, K, V>,
    right: Iter<'a, K, V2>,
    this: &'a HashMap<K, V>,
    that: &'a HashMap<K, V2>,
}

impl<'a, K: Hash + Eq + Clone, V: Clone, V2: Clone> Iterator for Zip<'a, K, V, V2> {
    type Item = (&'a K, (Option<&'a V>, Option<&'a V2>));

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((k, v)) = self.left.next() {
            return Some((k, (Some(v), self.that.get(k))));
        }
        loop {
            let (k, v2) = self.right.next()?;
            if self.this.get(k).is_none() {
                return Some((k, (None, Some(v2))));
            }
        }
    }
}

/// Mutable staging over a single immutable snapshot. Each call swaps the
/// snapshot for a new one and reports whether anything changed; `build`
/// hands the final snapshot back without copying.
pub struct HashMapBuilder<K, V> {
    map: HashMap<K, V>,
}

impl<K: Hash + Eq + Clone, V: Clone> HashMapBuilder<K, V> {
    pub fn new() -> Self {
        HashMapBuilder {
            map: HashMap::new(),
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

    pub fn build(self) -> HashMap<K, V> {
        self.map
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Default for HashMapBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn validate<K: Hash + Eq + Clone, V: Clone>(map: &HashMap<K, V>) {
    engine::validate(&map.root);
    let mut count = 0;
    for node in NodeIter::new(&map.root) {
        for (k, _) in node.entries() {
            assert_eq!(key::hash_value(k), node.hash);
            count += 1;
        }
    }
    assert_eq!(count, map.len);
}
