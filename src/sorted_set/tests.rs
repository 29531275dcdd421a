use super::{validate, SortedSet};
use crate::test_workloads::{self, test_sorted_set};

#[test]
fn insert_remove_dense() {
    test_sorted_set(test_workloads::insert_remove_dense())
}

#[test]
fn insert_remove_sparse() {
    test_sorted_set(test_workloads::insert_remove_sparse())
}

#[test]
fn union_no_overlap() {
    test_sorted_set(test_workloads::union_no_overlap())
}

#[test]
fn union_all_overlap() {
    test_sorted_set(test_workloads::union_all_overlap())
}

#[test]
fn union_partial_overlap() {
    test_sorted_set(test_workloads::union_partial_overlap())
}

#[test]
fn set_algebra_mixed() {
    test_sorted_set(test_workloads::set_algebra_mixed())
}

#[test]
fn union_with_subset_returns_same_snapshot() {
    let set: SortedSet<u64> = [1, 2, 3].into_iter().collect();
    let sub: SortedSet<u64> = [2].into_iter().collect();
    assert!(set.union(&sub).ptr_eq(&set));
    assert!(set.union(&set).ptr_eq(&set));
    assert!(set.union(&SortedSet::new()).ptr_eq(&set));
}

#[test]
fn iterates_in_ascending_order() {
    let set: SortedSet<u64> = [9u64, 1, 7, 3, 5].into_iter().collect();
    validate(&set);
    assert!(set.iter().copied().eq([1, 3, 5, 7, 9]));
    assert_eq!(set.first(), Some(&1));
    assert_eq!(set.last(), Some(&9));
}

#[test]
fn insert_present_returns_same_snapshot() {
    let set: SortedSet<u64> = (0..100).collect();
    assert!(set.insert(42).ptr_eq(&set));
    assert!(!set.insert(100).ptr_eq(&set));
}

#[test]
fn algebra_keeps_order() {
    let a: SortedSet<u64> = (0..50).collect();
    let b: SortedSet<u64> = (25..75).collect();
    let union = a.union(&b);
    validate(&union);
    assert!(union.iter().copied().eq(0..75));
    let inter = a.intersection(&b);
    assert!(inter.iter().copied().eq(25..50));
    let diff = a.difference(&b);
    assert!(diff.iter().copied().eq(0..25));
    assert!(inter.is_subset(&a) && inter.is_subset(&b));
}
