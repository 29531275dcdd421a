//! The generic treap engine: split/join and everything layered on top.
//!
//! Nodes are immutable and shared through `Arc`; every operation returns a
//! new root and reuses untouched subtrees by reference. Operations whose
//! result is logically unchanged from their primary operand return that
//! operand's exact root, which callers detect with pointer equality.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::fork::{self, ForkJoin};

pub(crate) type Link<N> = Option<Arc<N>>;

/// A treap node. BST position is the node's *rank*; tree shape is decided by
/// the *effective priority*, the pair `(priority(), rank)` compared
/// lexicographically. Two nodes of one treap have equal effective priority
/// iff they have equal rank, so the effective order is strictly total and
/// the resulting shape is a pure function of content.
pub(crate) trait TreapNode: Sized {
    /// The probe type ranks are compared against in lookups.
    type Rank: ?Sized;

    fn priority(&self) -> u32;
    fn left(&self) -> &Link<Self>;
    fn right(&self) -> &Link<Self>;

    /// This node's rank relative to a probe rank.
    fn cmp_rank(&self, rank: &Self::Rank) -> Ordering;

    /// This node's rank relative to another node's.
    fn cmp_node(&self, other: &Self) -> Ordering;

    /// A copy of this node's payload with the given children.
    fn with_children(&self, left: Link<Self>, right: Link<Self>) -> Arc<Self>;
}

/// Pointer equality on links.
pub(crate) fn same<N>(a: &Link<N>, b: &Link<N>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

fn heap_cmp<N: TreapNode>(a: &N, b: &N) -> Ordering {
    a.priority().cmp(&b.priority()).then_with(|| a.cmp_node(b))
}

/// Probe `(priority, rank)` relative to `node`'s effective priority, where
/// `rank_cmp` is `node.cmp_rank(rank)`.
fn probe_cmp<N: TreapNode>(priority: u32, rank_cmp: Ordering, node: &N) -> Ordering {
    priority.cmp(&node.priority()).then_with(|| rank_cmp.reverse())
}

/// The result of decomposing a treap around a pivot rank. A node matching
/// the pivot exactly lands in `duplicate`, never in either side.
pub(crate) struct Split<N> {
    pub(crate) left: Link<N>,
    pub(crate) right: Link<N>,
    pub(crate) duplicate: Link<N>,
}

/// Split by an arbitrary comparison of each node against the pivot
/// (`Less` = node sorts before the pivot). Sides that come back unchanged
/// are the original subtree references.
fn split_with<N: TreapNode>(t: &Link<N>, cmp: &impl Fn(&N) -> Ordering) -> Split<N> {
    let Some(node) = t else {
        return Split {
            left: None,
            right: None,
            duplicate: None,
        };
    };
    match cmp(node) {
        Ordering::Less => {
            let sub = split_with(node.right(), cmp);
            let left = if same(&sub.left, node.right()) {
                t.clone()
            } else {
                Some(node.with_children(node.left().clone(), sub.left))
            };
            Split {
                left,
                right: sub.right,
                duplicate: sub.duplicate,
            }
        }
        Ordering::Greater => {
            let sub = split_with(node.left(), cmp);
            let right = if same(&sub.right, node.left()) {
                t.clone()
            } else {
                Some(node.with_children(sub.right, node.right().clone()))
            };
            Split {
                left: sub.left,
                right,
                duplicate: sub.duplicate,
            }
        }
        Ordering::Equal => Split {
            left: node.left().clone(),
            right: node.right().clone(),
            duplicate: Some(node.clone()),
        },
    }
}

pub(crate) fn split<N: TreapNode>(t: &Link<N>, rank: &N::Rank) -> Split<N> {
    split_with(t, &|node| node.cmp_rank(rank))
}

fn split_at_node<N: TreapNode>(t: &Link<N>, pivot: &N) -> Split<N> {
    split_with(t, &|node| node.cmp_node(pivot))
}

/// Join two treaps where every rank in `left` sorts before every rank in
/// `right`. The higher-priority root wins and the other side is attached
/// recursively.
pub(crate) fn join<N: TreapNode>(left: &Link<N>, right: &Link<N>) -> Link<N> {
    let (Some(l), Some(r)) = (left, right) else {
        return if left.is_some() {
            left.clone()
        } else {
            right.clone()
        };
    };
    if heap_cmp(l.as_ref(), r.as_ref()) == Ordering::Greater {
        let new_right = join(l.right(), right);
        if same(&new_right, l.right()) {
            left.clone()
        } else {
            Some(l.with_children(l.left().clone(), new_right))
        }
    } else {
        let new_left = join(left, r.left());
        if same(&new_left, r.left()) {
            right.clone()
        } else {
            Some(r.with_children(new_left, r.right().clone()))
        }
    }
}

/// Insert a single childless node. When a node of equal rank already exists,
/// `shallow_add` merges the two payloads; returning the existing node
/// unchanged makes the whole insert a no-op.
pub(crate) fn add<N: TreapNode>(
    t: &Link<N>,
    node: &Arc<N>,
    shallow_add: &mut impl FnMut(&Arc<N>, &Arc<N>) -> Arc<N>,
) -> Link<N> {
    assert!(
        node.left().is_none() && node.right().is_none(),
        "add requires a childless node"
    );
    add_rec(t, node, shallow_add)
}

fn add_rec<N: TreapNode>(
    t: &Link<N>,
    node: &Arc<N>,
    shallow_add: &mut impl FnMut(&Arc<N>, &Arc<N>) -> Arc<N>,
) -> Link<N> {
    let Some(root) = t else {
        return Some(node.clone());
    };
    match heap_cmp(node.as_ref(), root.as_ref()) {
        Ordering::Greater => {
            let sub = split_at_node(t, node.as_ref());
            debug_assert!(sub.duplicate.is_none());
            Some(node.with_children(sub.left, sub.right))
        }
        Ordering::Equal => {
            let merged = shallow_add(root, node);
            if Arc::ptr_eq(&merged, root) {
                t.clone()
            } else {
                Some(merged.with_children(root.left().clone(), root.right().clone()))
            }
        }
        Ordering::Less => match node.cmp_node(root) {
            Ordering::Less => {
                let new_left = add_rec(root.left(), node, shallow_add);
                if same(&new_left, root.left()) {
                    t.clone()
                } else {
                    Some(root.with_children(new_left, root.right().clone()))
                }
            }
            Ordering::Greater => {
                let new_right = add_rec(root.right(), node, shallow_add);
                if same(&new_right, root.right()) {
                    t.clone()
                } else {
                    Some(root.with_children(root.left().clone(), new_right))
                }
            }
            Ordering::Equal => unreachable!("equal rank implies equal effective priority"),
        },
    }
}

/// Remove at the node owning `rank`. `shallow_remove` reports `None` when
/// the element is not in the payload (the treap is returned untouched),
/// `Some(None)` when the payload empties (the node is replaced by the join
/// of its children), and `Some(Some(n))` for a reduced payload.
pub(crate) fn remove<N: TreapNode>(
    t: &Link<N>,
    priority: u32,
    rank: &N::Rank,
    shallow_remove: &mut impl FnMut(&Arc<N>) -> Option<Link<N>>,
) -> Link<N> {
    let Some(root) = t else {
        return None;
    };
    let c = root.cmp_rank(rank);
    if c == Ordering::Equal {
        return match shallow_remove(root) {
            None => t.clone(),
            Some(None) => join(root.left(), root.right()),
            Some(Some(n)) => Some(n.with_children(root.left().clone(), root.right().clone())),
        };
    }
    // A probe that outranks the root cannot be anywhere below it.
    if probe_cmp(priority, c, root.as_ref()) == Ordering::Greater {
        return t.clone();
    }
    match c {
        Ordering::Greater => {
            let new_left = remove(root.left(), priority, rank, shallow_remove);
            if same(&new_left, root.left()) {
                t.clone()
            } else {
                Some(root.with_children(new_left, root.right().clone()))
            }
        }
        Ordering::Less => {
            let new_right = remove(root.right(), priority, rank, shallow_remove);
            if same(&new_right, root.right()) {
                t.clone()
            } else {
                Some(root.with_children(root.left().clone(), new_right))
            }
        }
        Ordering::Equal => unreachable!(),
    }
}

/// Find the node owning `rank`, descending by priority then rank.
pub(crate) fn find<'a, N: TreapNode>(
    t: &'a Link<N>,
    priority: u32,
    rank: &N::Rank,
) -> Option<&'a Arc<N>> {
    let mut cur = t;
    while let Some(node) = cur {
        let c = node.cmp_rank(rank);
        if c == Ordering::Equal {
            return Some(node);
        }
        if probe_cmp(priority, c, node.as_ref()) == Ordering::Greater {
            return None;
        }
        cur = if c == Ordering::Greater {
            node.left()
        } else {
            node.right()
        };
    }
    None
}

/// Insert, replace, or delete the payload owning `rank` in one pass.
/// `f` sees the existing node (or absence) and returns the payload to keep.
pub(crate) fn update<N: TreapNode>(
    t: &Link<N>,
    priority: u32,
    rank: &N::Rank,
    f: &mut impl FnMut(Option<&Arc<N>>) -> Link<N>,
) -> Link<N> {
    let Some(root) = t else {
        return f(None);
    };
    let c = root.cmp_rank(rank);
    if c == Ordering::Equal {
        let kept = f(Some(root));
        return rebuild(t, root, kept, root.left().clone(), root.right().clone());
    }
    if probe_cmp(priority, c, root.as_ref()) == Ordering::Greater {
        // The rank is absent; a new node with this priority belongs here.
        return match f(None) {
            Some(n) => {
                let sub = split(t, rank);
                debug_assert!(sub.duplicate.is_none());
                Some(n.with_children(sub.left, sub.right))
            }
            None => t.clone(),
        };
    }
    match c {
        Ordering::Greater => {
            let new_left = update(root.left(), priority, rank, f);
            if same(&new_left, root.left()) {
                t.clone()
            } else {
                Some(root.with_children(new_left, root.right().clone()))
            }
        }
        Ordering::Less => {
            let new_right = update(root.right(), priority, rank, f);
            if same(&new_right, root.right()) {
                t.clone()
            } else {
                Some(root.with_children(root.left().clone(), new_right))
            }
        }
        Ordering::Equal => unreachable!(),
    }
}

/// Attach freshly merged children under `kept`, preferring to hand back the
/// original link when nothing changed.
fn rebuild<N: TreapNode>(
    original: &Link<N>,
    root: &Arc<N>,
    kept: Link<N>,
    new_left: Link<N>,
    new_right: Link<N>,
) -> Link<N> {
    match kept {
        Some(n) => {
            if Arc::ptr_eq(&n, root) && same(&new_left, root.left()) && same(&new_right, root.right())
            {
                original.clone()
            } else {
                Some(n.with_children(new_left, new_right))
            }
        }
        None => join(&new_left, &new_right),
    }
}

/// Union, recursing on whichever root has the higher effective priority.
/// Equal-rank payloads are combined by `shallow_union`, which keeps `a`'s
/// payload on conflicts it resolves in `a`'s favor.
pub(crate) fn union<N: TreapNode>(
    a: &Link<N>,
    b: &Link<N>,
    shallow_union: &mut impl FnMut(&Arc<N>, &Arc<N>) -> Arc<N>,
) -> Link<N> {
    if same(a, b) {
        return a.clone();
    }
    let (Some(ra), Some(rb)) = (a, b) else {
        return if a.is_some() { a.clone() } else { b.clone() };
    };
    match heap_cmp(ra.as_ref(), rb.as_ref()) {
        Ordering::Equal => {
            let new_left = union(ra.left(), rb.left(), shallow_union);
            let new_right = union(ra.right(), rb.right(), shallow_union);
            let merged = shallow_union(ra, rb);
            rebuild(a, ra, Some(merged), new_left, new_right)
        }
        Ordering::Greater => {
            let sub = split_at_node(b, ra.as_ref());
            debug_assert!(sub.duplicate.is_none());
            let new_left = union(ra.left(), &sub.left, shallow_union);
            let new_right = union(ra.right(), &sub.right, shallow_union);
            if same(&new_left, ra.left()) && same(&new_right, ra.right()) {
                a.clone()
            } else {
                Some(ra.with_children(new_left, new_right))
            }
        }
        Ordering::Less => {
            let sub = split_at_node(a, rb.as_ref());
            debug_assert!(sub.duplicate.is_none());
            let new_left = union(&sub.left, rb.left(), shallow_union);
            let new_right = union(&sub.right, rb.right(), shallow_union);
            if same(&new_left, rb.left()) && same(&new_right, rb.right()) {
                b.clone()
            } else {
                Some(rb.with_children(new_left, new_right))
            }
        }
    }
}

/// Intersection. Recursion is driven by `a`'s root so that a result equal to
/// `a` falls out as `a`'s own references level by level. `shallow_intersect`
/// keeps the part of `a`'s payload also present in `b`'s.
pub(crate) fn intersect<N: TreapNode>(
    a: &Link<N>,
    b: &Link<N>,
    shallow_intersect: &mut impl FnMut(&Arc<N>, &Arc<N>) -> Link<N>,
) -> Link<N> {
    if same(a, b) {
        return a.clone();
    }
    let (Some(ra), Some(_)) = (a, b) else {
        return None;
    };
    let sub = split_at_node(b, ra.as_ref());
    let new_left = intersect(ra.left(), &sub.left, shallow_intersect);
    let new_right = intersect(ra.right(), &sub.right, shallow_intersect);
    let kept = match &sub.duplicate {
        Some(d) => shallow_intersect(ra, d),
        None => None,
    };
    rebuild(a, ra, kept, new_left, new_right)
}

/// Difference. Like intersection, recursion follows `a`'s root.
/// `shallow_difference` keeps the part of `a`'s payload absent from `b`'s.
pub(crate) fn difference<N: TreapNode>(
    a: &Link<N>,
    b: &Link<N>,
    shallow_difference: &mut impl FnMut(&Arc<N>, &Arc<N>) -> Link<N>,
) -> Link<N> {
    if same(a, b) {
        return None;
    }
    let Some(ra) = a else {
        return None;
    };
    if b.is_none() {
        return a.clone();
    }
    let sub = split_at_node(b, ra.as_ref());
    let new_left = difference(ra.left(), &sub.left, shallow_difference);
    let new_right = difference(ra.right(), &sub.right, shallow_difference);
    let kept = match &sub.duplicate {
        Some(d) => shallow_difference(ra, d),
        None => Some(ra.clone()),
    };
    rebuild(a, ra, kept, new_left, new_right)
}

/// Transform every payload in order, dropping those mapped to `None`.
pub(crate) fn map_nodes<N: TreapNode>(
    t: &Link<N>,
    f: &mut impl FnMut(&Arc<N>) -> Link<N>,
) -> Link<N> {
    let Some(node) = t else {
        return None;
    };
    let new_left = map_nodes(node.left(), f);
    let kept = f(node);
    let new_right = map_nodes(node.right(), f);
    rebuild(t, node, kept, new_left, new_right)
}

/// Full outer merge: `f` is invoked for every rank present in either side,
/// with the matching payloads (one of them absent for one-sided ranks), and
/// returns the payload to keep.
pub(crate) fn merge_with<N: TreapNode>(
    t_a: &Link<N>,
    t_b: &Link<N>,
    f: &mut impl FnMut(Option<&Arc<N>>, Option<&Arc<N>>) -> Link<N>,
) -> Link<N> {
    match (t_a, t_b) {
        (None, None) => None,
        (Some(_), None) => map_nodes(t_a, &mut |n| f(Some(n), None)),
        (None, Some(_)) => map_nodes(t_b, &mut |n| f(None, Some(n))),
        (Some(ra), Some(rb)) => match heap_cmp(ra.as_ref(), rb.as_ref()) {
            Ordering::Equal => {
                let new_left = merge_with(ra.left(), rb.left(), f);
                let kept = f(Some(ra), Some(rb));
                let new_right = merge_with(ra.right(), rb.right(), f);
                rebuild(t_a, ra, kept, new_left, new_right)
            }
            Ordering::Greater => {
                let sub = split_at_node(t_b, ra.as_ref());
                debug_assert!(sub.duplicate.is_none());
                let new_left = merge_with(ra.left(), &sub.left, f);
                let kept = f(Some(ra), None);
                let new_right = merge_with(ra.right(), &sub.right, f);
                rebuild(t_a, ra, kept, new_left, new_right)
            }
            Ordering::Less => {
                let sub = split_at_node(t_a, rb.as_ref());
                debug_assert!(sub.duplicate.is_none());
                let new_left = merge_with(&sub.left, rb.left(), f);
                let kept = f(None, Some(rb));
                let new_right = merge_with(&sub.right, rb.right(), f);
                rebuild(t_b, rb, kept, new_left, new_right)
            }
        },
    }
}

/// `merge_with` under an execution strategy: subtree recursion may fork
/// while the estimated subtree size stays at or above `2^threshold_log2`.
pub(crate) fn merge_with_using<N, S, F>(
    strategy: &S,
    threshold_log2: u32,
    t_a: &Link<N>,
    t_b: &Link<N>,
    f: &F,
) -> Link<N>
where
    N: TreapNode + Send + Sync,
    S: ForkJoin + Sync,
    F: Fn(Option<&Arc<N>>, Option<&Arc<N>>) -> Link<N> + Sync,
{
    match (t_a, t_b) {
        (None, None) => None,
        (Some(_), None) => map_nodes_using(strategy, threshold_log2, t_a, &|n| f(Some(n), None)),
        (None, Some(_)) => map_nodes_using(strategy, threshold_log2, t_b, &|n| f(None, Some(n))),
        (Some(ra), Some(rb)) => {
            let big = !approx_smaller_than_log2(t_a, threshold_log2)
                || !approx_smaller_than_log2(t_b, threshold_log2);
            match heap_cmp(ra.as_ref(), rb.as_ref()) {
                Ordering::Equal => {
                    let (new_left, new_right) = fork::maybe_fork(
                        strategy,
                        || big,
                        || merge_with_using(strategy, threshold_log2, ra.left(), rb.left(), f),
                        || merge_with_using(strategy, threshold_log2, ra.right(), rb.right(), f),
                    );
                    rebuild(t_a, ra, f(Some(ra), Some(rb)), new_left, new_right)
                }
                Ordering::Greater => {
                    let sub = split_at_node(t_b, ra.as_ref());
                    debug_assert!(sub.duplicate.is_none());
                    let (new_left, new_right) = fork::maybe_fork(
                        strategy,
                        || big,
                        || merge_with_using(strategy, threshold_log2, ra.left(), &sub.left, f),
                        || merge_with_using(strategy, threshold_log2, ra.right(), &sub.right, f),
                    );
                    rebuild(t_a, ra, f(Some(ra), None), new_left, new_right)
                }
                Ordering::Less => {
                    let sub = split_at_node(t_a, rb.as_ref());
                    debug_assert!(sub.duplicate.is_none());
                    let (new_left, new_right) = fork::maybe_fork(
                        strategy,
                        || big,
                        || merge_with_using(strategy, threshold_log2, &sub.left, rb.left(), f),
                        || merge_with_using(strategy, threshold_log2, &sub.right, rb.right(), f),
                    );
                    rebuild(t_b, rb, f(None, Some(rb)), new_left, new_right)
                }
            }
        }
    }
}

/// `map_nodes` under an execution strategy.
pub(crate) fn map_nodes_using<N, S, F>(
    strategy: &S,
    threshold_log2: u32,
    t: &Link<N>,
    f: &F,
) -> Link<N>
where
    N: TreapNode + Send + Sync,
    S: ForkJoin + Sync,
    F: Fn(&Arc<N>) -> Link<N> + Sync,
{
    let Some(node) = t else {
        return None;
    };
    let big = !approx_smaller_than_log2(t, threshold_log2);
    let (new_left, new_right) = fork::maybe_fork(
        strategy,
        || big,
        || map_nodes_using(strategy, threshold_log2, node.left(), f),
        || map_nodes_using(strategy, threshold_log2, node.right(), f),
    );
    rebuild(t, node, f(node), new_left, new_right)
}

/// Structural equality with payloads compared by `eq`. Shared subtrees
/// short-circuit on pointer identity; positional recursion is sound because
/// equal content forces an identical shape.
pub(crate) fn deep_eq<N: TreapNode>(
    a: &Link<N>,
    b: &Link<N>,
    eq: &mut impl FnMut(&N, &N) -> bool,
) -> bool {
    if same(a, b) {
        return true;
    }
    match (a, b) {
        (Some(x), Some(y)) => {
            eq(x, y) && deep_eq(x.left(), y.left(), eq) && deep_eq(x.right(), y.right(), eq)
        }
        _ => false,
    }
}

/// Estimate whether the treap holds fewer than `2^n` nodes by probing the
/// leftmost path, avoiding an exact count.
pub(crate) fn approx_smaller_than_log2<N: TreapNode>(t: &Link<N>, n: u32) -> bool {
    let mut remaining = n;
    let mut cur = t;
    while let Some(node) = cur {
        if remaining == 0 {
            return false;
        }
        remaining -= 1;
        cur = node.left();
    }
    true
}

pub(crate) fn leftmost<N: TreapNode>(t: &Link<N>) -> Option<&Arc<N>> {
    let mut cur = t.as_ref()?;
    while let Some(next) = cur.left() {
        cur = next;
    }
    Some(cur)
}

pub(crate) fn rightmost<N: TreapNode>(t: &Link<N>) -> Option<&Arc<N>> {
    let mut cur = t.as_ref()?;
    while let Some(next) = cur.right() {
        cur = next;
    }
    Some(cur)
}

/// In-order node traversal backed by an explicit ancestor stack.
pub(crate) struct NodeIter<'a, N> {
    stack: Vec<&'a Arc<N>>,
}

impl<'a, N: TreapNode> NodeIter<'a, N> {
    pub(crate) fn new(t: &'a Link<N>) -> Self {
        let mut iter = NodeIter { stack: Vec::new() };
        iter.push_left(t);
        iter
    }

    fn push_left(&mut self, mut t: &'a Link<N>) {
        while let Some(node) = t {
            self.stack.push(node);
            t = node.left();
        }
    }
}

impl<'a, N: TreapNode> Iterator for NodeIter<'a, N> {
    type Item = &'a Arc<N>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right());
        Some(node)
    }
}

#[cfg(test)]
pub(crate) fn validate<N: TreapNode>(t: &Link<N>) {
    fn heap<N: TreapNode>(t: &Link<N>) {
        if let Some(node) = t {
            for child in [node.left(), node.right()] {
                if let Some(c) = child {
                    assert_eq!(
                        heap_cmp(node.as_ref(), c.as_ref()),
                        Ordering::Greater,
                        "heap order violated"
                    );
                }
            }
            heap(node.left());
            heap(node.right());
        }
    }
    heap(t);
    let mut prev: Option<&Arc<N>> = None;
    for node in NodeIter::new(t) {
        if let Some(p) = prev {
            assert_eq!(p.cmp_node(node), Ordering::Less, "sort order violated");
        }
        prev = Some(node);
    }
}
