//! Shared oracle-driven workloads for the persistent map and set tests.
//!
//! Each driver replays a script of operations against one of our structures
//! and a `std` ordered collection side by side, checking agreement after
//! every step and full content agreement at every `Dump`.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::mem;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{hash_map, hash_set, sorted_map, sorted_set};
use crate::{HashMap, HashSet, SortedMap, SortedSet};

#[derive(Debug)]
pub(crate) enum Operation {
    Insert(u64),
    Remove(u64),
    /// Snapshot the current state for later bulk operations.
    Save,
    /// Union with the numbered snapshot.
    Union(usize),
    /// Intersect with the numbered snapshot (set drivers only).
    Intersect(usize),
    /// Subtract the numbered snapshot (set drivers only).
    Difference(usize),
    /// Merge with the numbered snapshot, summing values (map drivers only).
    Merge(usize),
    /// Full content comparison against the oracle.
    Dump,
}

use Operation::*;

/// A key whose hash covers only part of its content, so distinct keys
/// collide in groups of sixteen.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub(crate) struct Collider(pub(crate) u64);

impl Hash for Collider {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.0 / 16).hash(state);
    }
}

/// Route `log` output to the test harness; `RUST_LOG` controls verbosity.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn content_hash<T: Hash>(t: &T) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    t.hash(&mut hasher);
    hasher.finish()
}

fn merge_sum(a: Option<&u64>, b: Option<&u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x + y),
        (Some(x), None) => Some(*x),
        (None, Some(y)) => Some(*y),
        (None, None) => unreachable!("merge callback sees at least one side"),
    }
}

pub(crate) fn test_hash_map(ops: impl IntoIterator<Item = Operation>) {
    drive_hash_map(ops, |i| i);
}

pub(crate) fn test_hash_map_collision(ops: impl IntoIterator<Item = Operation>) {
    drive_hash_map(ops, Collider);
}

fn drive_hash_map<K: Hash + Eq + Ord + Clone + Debug + Send + Sync>(
    ops: impl IntoIterator<Item = Operation>,
    make_key: impl Fn(u64) -> K,
) {
    init_logging();
    let mut oracle = BTreeMap::<K, u64>::new();
    let mut map = HashMap::<K, u64>::new();
    let mut builder = map.builder();
    let mut saved = Vec::<(HashMap<K, u64>, BTreeMap<K, u64>)>::new();
    for op in ops {
        match op {
            Insert(i) => {
                let k = make_key(i);
                let v = i + 1;
                assert_eq!(map.get(&k), oracle.get(&k));
                map = map.insert(k.clone(), v);
                assert!(builder.insert(k.clone(), v));
                oracle.insert(k.clone(), v);
                assert_eq!(map.get(&k), Some(&v));
                assert_eq!(map.len(), oracle.len());
            }
            Remove(i) => {
                let k = make_key(i);
                let present = oracle.remove(&k).is_some();
                assert_eq!(map.contains_key(&k), present);
                let next = map.remove(&k);
                if !present {
                    assert!(next.ptr_eq(&map));
                }
                assert_eq!(builder.remove(&k), present);
                map = next;
                assert!(!map.contains_key(&k));
                assert_eq!(map.len(), oracle.len());
            }
            Save => saved.push((map.clone(), oracle.clone())),
            Union(idx) => {
                let (other, other_oracle) = &saved[idx];
                map = map.union(other);
                for (k, v) in other_oracle {
                    oracle.entry(k.clone()).or_insert(*v);
                }
                assert_eq!(map.len(), oracle.len());
                builder = map.builder();
            }
            Merge(idx) => {
                let (other, other_oracle) = &saved[idx];
                let merged = map.merge(other, |_, a, b| merge_sum(a, b));
                for threshold_log2 in [0, 6] {
                    let parallel =
                        map.parallel_merge(other, threshold_log2, |_, a, b| merge_sum(a, b));
                    assert_eq!(parallel, merged);
                }
                map = merged;
                for (k, v) in other_oracle {
                    match oracle.entry(k.clone()) {
                        Entry::Occupied(mut e) => *e.get_mut() += *v,
                        Entry::Vacant(e) => {
                            e.insert(*v);
                        }
                    }
                }
                assert_eq!(map.len(), oracle.len());
                builder = map.builder();
            }
            Intersect(_) | Difference(_) => unreachable!("set-only operation in map workload"),
            Dump => {
                hash_map::validate(&map);
                assert_eq!(map.len(), oracle.len());
                let expected: Vec<(K, u64)> = oracle.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let mut actual: Vec<(K, u64)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
                actual.sort();
                assert_eq!(actual, expected);
                for (k, v) in &expected {
                    assert_eq!(map.get(k), Some(v));
                }

                // A map rebuilt from scratch holds equal content and an
                // equal content hash.
                let rebuilt: HashMap<K, u64> = expected.iter().cloned().collect();
                assert_eq!(rebuilt, map);
                assert_eq!(content_hash(&rebuilt), content_hash(&map));

                let staged = mem::take(&mut builder).build();
                assert_eq!(staged, map);
                builder = staged.builder();
            }
        }
    }
}

pub(crate) fn test_sorted_map(ops: impl IntoIterator<Item = Operation>) {
    drive_sorted_map(ops, |i| i);
}

pub(crate) fn test_sorted_map_collision(ops: impl IntoIterator<Item = Operation>) {
    drive_sorted_map(ops, Collider);
}

fn drive_sorted_map<K: Ord + Hash + Clone + Debug + Send + Sync>(
    ops: impl IntoIterator<Item = Operation>,
    make_key: impl Fn(u64) -> K,
) {
    init_logging();
    let mut oracle = BTreeMap::<K, u64>::new();
    let mut map = SortedMap::<K, u64>::new();
    let mut builder = map.builder();
    let mut saved = Vec::<(SortedMap<K, u64>, BTreeMap<K, u64>)>::new();
    for op in ops {
        match op {
            Insert(i) => {
                let k = make_key(i);
                let v = i + 1;
                assert_eq!(map.get(&k), oracle.get(&k));
                map = map.insert(k.clone(), v);
                assert!(builder.insert(k.clone(), v));
                oracle.insert(k.clone(), v);
                assert_eq!(map.get(&k), Some(&v));
                assert_eq!(map.len(), oracle.len());
            }
            Remove(i) => {
                let k = make_key(i);
                let present = oracle.remove(&k).is_some();
                assert_eq!(map.contains_key(&k), present);
                let next = map.remove(&k);
                if !present {
                    assert!(next.ptr_eq(&map));
                }
                assert_eq!(builder.remove(&k), present);
                map = next;
                assert_eq!(map.len(), oracle.len());
            }
            Save => saved.push((map.clone(), oracle.clone())),
            Union(idx) => {
                let (other, other_oracle) = &saved[idx];
                map = map.union(other);
                for (k, v) in other_oracle {
                    oracle.entry(k.clone()).or_insert(*v);
                }
                assert_eq!(map.len(), oracle.len());
                builder = map.builder();
            }
            Merge(idx) => {
                let (other, other_oracle) = &saved[idx];
                let merged = map.merge(other, |_, a, b| merge_sum(a, b));
                for threshold_log2 in [0, 6] {
                    let parallel =
                        map.parallel_merge(other, threshold_log2, |_, a, b| merge_sum(a, b));
                    assert_eq!(parallel, merged);
                }
                map = merged;
                for (k, v) in other_oracle {
                    match oracle.entry(k.clone()) {
                        Entry::Occupied(mut e) => *e.get_mut() += *v,
                        Entry::Vacant(e) => {
                            e.insert(*v);
                        }
                    }
                }
                assert_eq!(map.len(), oracle.len());
                builder = map.builder();
            }
            Intersect(_) | Difference(_) => unreachable!("set-only operation in map workload"),
            Dump => {
                sorted_map::validate(&map);
                assert_eq!(map.len(), oracle.len());
                // Iteration order must match the ordered oracle exactly.
                let expected: Vec<(K, u64)> = oracle.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let actual: Vec<(K, u64)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
                assert_eq!(actual, expected);
                assert_eq!(
                    map.first_key_value(),
                    oracle.first_key_value().map(|(k, v)| (k, v))
                );
                assert_eq!(
                    map.last_key_value(),
                    oracle.last_key_value().map(|(k, v)| (k, v))
                );

                let rebuilt: SortedMap<K, u64> = expected.iter().cloned().collect();
                assert_eq!(rebuilt, map);
                assert_eq!(content_hash(&rebuilt), content_hash(&map));

                let staged = mem::take(&mut builder).build();
                assert_eq!(staged, map);
                builder = staged.builder();
            }
        }
    }
}

pub(crate) fn test_hash_set(ops: impl IntoIterator<Item = Operation>) {
    init_logging();
    let mut oracle = BTreeSet::<u64>::new();
    let mut set = HashSet::<u64>::new();
    let mut saved = Vec::<(HashSet<u64>, BTreeSet<u64>)>::new();
    for op in ops {
        match op {
            Insert(i) => {
                let next = set.insert(i);
                if !oracle.insert(i) {
                    assert!(next.ptr_eq(&set));
                }
                set = next;
                assert!(set.contains(&i));
                assert_eq!(set.len(), oracle.len());
            }
            Remove(i) => {
                let present = oracle.remove(&i);
                let next = set.remove(&i);
                if !present {
                    assert!(next.ptr_eq(&set));
                }
                set = next;
                assert!(!set.contains(&i));
                assert_eq!(set.len(), oracle.len());
            }
            Save => saved.push((set.clone(), oracle.clone())),
            Union(idx) => {
                let (other, other_oracle) = &saved[idx];
                set = set.union(other);
                oracle.extend(other_oracle.iter().copied());
                assert!(other.is_subset(&set));
                assert_eq!(set.len(), oracle.len());
            }
            Intersect(idx) => {
                let (other, other_oracle) = &saved[idx];
                set = set.intersection(other);
                oracle = oracle.intersection(other_oracle).copied().collect();
                assert!(set.is_subset(other));
                assert_eq!(set.len(), oracle.len());
            }
            Difference(idx) => {
                let (other, other_oracle) = &saved[idx];
                set = set.difference(other);
                oracle = oracle.difference(other_oracle).copied().collect();
                assert!(set.iter().all(|t| !other.contains(t)));
                assert_eq!(set.len(), oracle.len());
            }
            Merge(_) => unreachable!("map-only operation in set workload"),
            Dump => {
                hash_set::validate(&set);
                let mut actual: Vec<u64> = set.iter().copied().collect();
                actual.sort_unstable();
                let expected: Vec<u64> = oracle.iter().copied().collect();
                assert_eq!(actual, expected);
                let rebuilt: HashSet<u64> = expected.iter().copied().collect();
                assert_eq!(rebuilt, set);
                assert_eq!(content_hash(&rebuilt), content_hash(&set));
            }
        }
    }
}

pub(crate) fn test_sorted_set(ops: impl IntoIterator<Item = Operation>) {
    init_logging();
    let mut oracle = BTreeSet::<u64>::new();
    let mut set = SortedSet::<u64>::new();
    let mut saved = Vec::<(SortedSet<u64>, BTreeSet<u64>)>::new();
    for op in ops {
        match op {
            Insert(i) => {
                let next = set.insert(i);
                if !oracle.insert(i) {
                    assert!(next.ptr_eq(&set));
                }
                set = next;
                assert!(set.contains(&i));
                assert_eq!(set.len(), oracle.len());
            }
            Remove(i) => {
                let present = oracle.remove(&i);
                let next = set.remove(&i);
                if !present {
                    assert!(next.ptr_eq(&set));
                }
                set = next;
                assert_eq!(set.len(), oracle.len());
            }
            Save => saved.push((set.clone(), oracle.clone())),
            Union(idx) => {
                let (other, other_oracle) = &saved[idx];
                set = set.union(other);
                oracle.extend(other_oracle.iter().copied());
                assert!(other.is_subset(&set));
                assert_eq!(set.len(), oracle.len());
            }
            Intersect(idx) => {
                let (other, other_oracle) = &saved[idx];
                set = set.intersection(other);
                oracle = oracle.intersection(other_oracle).copied().collect();
                assert!(set.is_subset(other));
                assert_eq!(set.len(), oracle.len());
            }
            Difference(idx) => {
                let (other, other_oracle) = &saved[idx];
                set = set.difference(other);
                oracle = oracle.difference(other_oracle).copied().collect();
                assert_eq!(set.len(), oracle.len());
            }
            Merge(_) => unreachable!("map-only operation in set workload"),
            Dump => {
                sorted_set::validate(&set);
                // Iteration order must match the ordered oracle exactly.
                let actual: Vec<u64> = set.iter().copied().collect();
                let expected: Vec<u64> = oracle.iter().copied().collect();
                assert_eq!(actual, expected);
                assert_eq!(set.first(), oracle.first());
                assert_eq!(set.last(), oracle.last());
                let rebuilt: SortedSet<u64> = expected.iter().copied().collect();
                assert_eq!(rebuilt, set);
                assert_eq!(content_hash(&rebuilt), content_hash(&set));
            }
        }
    }
}

pub(crate) fn insert_remove_dense() -> Vec<Operation> {
    let mut rng = StdRng::seed_from_u64(0x5eed_0001);
    let mut ops = Vec::new();
    for step in 0..2000 {
        let key = rng.gen_range(0..512);
        if rng.gen_bool(0.6) {
            ops.push(Insert(key));
        } else {
            ops.push(Remove(key));
        }
        if step % 128 == 127 {
            ops.push(Dump);
        }
    }
    ops.push(Dump);
    ops
}

pub(crate) fn insert_remove_sparse() -> Vec<Operation> {
    let mut rng = StdRng::seed_from_u64(0x5eed_0002);
    let mut ops = Vec::new();
    for step in 0..2000 {
        let key = rng.gen_range(0..1 << 48);
        if rng.gen_bool(0.7) {
            ops.push(Insert(key));
        } else {
            ops.push(Remove(key));
        }
        if step % 256 == 255 {
            ops.push(Dump);
        }
    }
    ops.push(Dump);
    ops
}

pub(crate) fn union_no_overlap() -> Vec<Operation> {
    let mut ops: Vec<Operation> = (0..300).map(Insert).collect();
    ops.push(Save);
    ops.extend((0..300).map(Remove));
    ops.extend((1000..1300).map(Insert));
    ops.push(Union(0));
    ops.push(Dump);
    ops
}

pub(crate) fn union_all_overlap() -> Vec<Operation> {
    let mut ops: Vec<Operation> = (0..300).map(Insert).collect();
    ops.push(Save);
    ops.push(Union(0));
    ops.push(Dump);
    ops
}

pub(crate) fn union_partial_overlap() -> Vec<Operation> {
    let mut ops: Vec<Operation> = (0..200).map(Insert).collect();
    ops.push(Save);
    ops.extend((100..200).map(Remove));
    ops.extend((150..350).map(Insert));
    ops.push(Union(0));
    ops.push(Dump);
    ops
}

pub(crate) fn merge_partial_overlap() -> Vec<Operation> {
    let mut ops: Vec<Operation> = (0..400).map(Insert).collect();
    ops.push(Save);
    ops.extend((0..400).filter(|i| i % 2 == 0).map(Remove));
    ops.extend((300..500).map(Insert));
    ops.push(Merge(0));
    ops.push(Dump);
    ops
}

pub(crate) fn set_algebra_mixed() -> Vec<Operation> {
    let mut rng = StdRng::seed_from_u64(0x5eed_0003);
    let mut ops: Vec<Operation> = (0..256).map(Insert).collect();
    ops.push(Save);
    for _ in 0..200 {
        ops.push(Insert(rng.gen_range(0..1024)));
    }
    ops.push(Save);
    ops.push(Union(0));
    ops.push(Dump);
    ops.push(Difference(1));
    ops.push(Dump);
    for _ in 0..200 {
        ops.push(Insert(rng.gen_range(0..1024)));
    }
    ops.push(Intersect(1));
    ops.push(Dump);
    ops
}
