//! Persistent treap-backed maps, sets, and sequences, plus compact mutable
//! hash tables for the cases where persistence is not wanted.
//!
//! The persistent structures never mutate a node after construction: every
//! "mutating" operation allocates fresh nodes along one root-to-change path
//! and shares every untouched subtree with the input by reference. Snapshots
//! are therefore cheap to keep, cheap to compare against their origin
//! (`ptr_eq`), and safe to read from any number of threads while a writer
//! builds the next version.
//!
//! # Tree shape
//! The keyed structures are treaps: a binary search tree over the key order
//! combined with a max-heap over per-node priorities. Priorities are derived
//! by avalanche-mixing the key's hash, so a given key set always produces
//! the same tree regardless of insertion order. That canonical shape is what
//! makes the bulk operations (`union`, `merge`, set algebra) able to skip
//! entire shared subtrees by pointer comparison. [`List`] uses the same idea
//! with randomly drawn priorities and subtree sizes instead of keys.
//!
//! # Hashing
//! Keys are hashed with a fixed, crate-global hash function rather than a
//! caller-supplied one. Giving up pluggable hashing is what allows hashes to
//! double as tree positions and priorities.
//!
//! # Parallel bulk operations
//! `parallel_merge` and friends recurse over already-disjoint subtrees, so
//! the two halves of each level can run on the rayon pool. A threshold stops
//! forking once a subtree's estimated size drops below `2^threshold_log2`.
//!
//! # Compact tables
//! The [`compact`] module holds the opposite trade-off: mutable-in-place
//! hash maps and sets with flat-array storage, one allocation per table
//! rather than per entry, for single-owner workloads.

pub mod compact;
pub(crate) mod engine;
pub(crate) mod fork;
pub(crate) mod hash_map;
pub(crate) mod hash_set;
pub(crate) mod key;
pub(crate) mod list;
pub(crate) mod sorted_map;
pub(crate) mod sorted_set;
#[cfg(test)]
pub(crate) mod test_workloads;

pub use compact::{CompactHashMap, CompactHashSet, CompactLinkedHashMap, CompactLinkedHashSet};
pub use hash_map::{HashMap, HashMapBuilder};
pub use hash_set::{HashSet, HashSetBuilder};
pub use list::{List, ListBuilder};
pub use sorted_map::{SortedMap, SortedMapBuilder};
pub use sorted_set::{SortedSet, SortedSetBuilder};
