use super::{validate, HashSet};
use crate::test_workloads::{self, test_hash_set};

#[test]
fn insert_remove_dense() {
    test_hash_set(test_workloads::insert_remove_dense())
}

#[test]
fn insert_remove_sparse() {
    test_hash_set(test_workloads::insert_remove_sparse())
}

#[test]
fn union_no_overlap() {
    test_hash_set(test_workloads::union_no_overlap())
}

#[test]
fn union_all_overlap() {
    test_hash_set(test_workloads::union_all_overlap())
}

#[test]
fn union_partial_overlap() {
    test_hash_set(test_workloads::union_partial_overlap())
}

#[test]
fn set_algebra_mixed() {
    test_hash_set(test_workloads::set_algebra_mixed())
}

#[test]
fn union_with_subset_returns_same_snapshot() {
    let set: HashSet<u64> = [1, 2, 3].into_iter().collect();
    let sub: HashSet<u64> = [2].into_iter().collect();
    assert!(set.union(&sub).ptr_eq(&set));
    assert!(set.union(&set).ptr_eq(&set));
    assert!(set.union(&HashSet::new()).ptr_eq(&set));
}

#[test]
fn insert_present_returns_same_snapshot() {
    let set: HashSet<u64> = (0..100).collect();
    assert!(set.insert(42).ptr_eq(&set));
    assert!(!set.insert(100).ptr_eq(&set));
}

#[test]
fn remove_all_and_subset() {
    let set: HashSet<u64> = (0..100).collect();
    let evens: Vec<u64> = (0..100).filter(|i| i % 2 == 0).collect();
    let odds = set.remove_all(evens.iter());
    validate(&odds);
    assert_eq!(odds.len(), 50);
    assert!(odds.is_subset(&set));
    assert!(!set.is_subset(&odds));
    assert!(evens.iter().all(|t| !odds.contains(t)));
}

#[test]
fn extend_adds_elements() {
    let mut set: HashSet<u64> = (0..10).collect();
    set.extend(5..20);
    validate(&set);
    assert_eq!(set.len(), 20);
    assert!((0..20).all(|t| set.contains(&t)));
}
