//! Execution strategies for bulk operations over disjoint subtrees.
//!
//! Closures handed to a strategy must be pure with respect to shared state:
//! in parallel mode they run concurrently on worker threads.

use log::trace;

pub(crate) trait ForkJoin {
    /// Evaluate two independent computations and return both results.
    fn fork2<RA, RB>(
        &self,
        a: impl FnOnce() -> RA + Send,
        b: impl FnOnce() -> RB + Send,
    ) -> (RA, RB)
    where
        RA: Send,
        RB: Send;

    /// Evaluate three independent computations.
    fn fork3<RA, RB, RC>(
        &self,
        a: impl FnOnce() -> RA + Send,
        b: impl FnOnce() -> RB + Send,
        c: impl FnOnce() -> RC + Send,
    ) -> (RA, RB, RC)
    where
        Self: Sync,
        RA: Send,
        RB: Send,
        RC: Send,
    {
        let ((ra, rb), rc) = self.fork2(move || self.fork2(a, b), c);
        (ra, rb, rc)
    }
}

/// Evaluates closures inline, in order.
pub(crate) struct Sequential;

impl ForkJoin for Sequential {
    fn fork2<RA, RB>(
        &self,
        a: impl FnOnce() -> RA + Send,
        b: impl FnOnce() -> RB + Send,
    ) -> (RA, RB)
    where
        RA: Send,
        RB: Send,
    {
        (a(), b())
    }
}

/// Runs both closures on the rayon pool and joins. A panic in either side
/// propagates after the join completes.
pub(crate) struct Parallel;

impl ForkJoin for Parallel {
    fn fork2<RA, RB>(
        &self,
        a: impl FnOnce() -> RA + Send,
        b: impl FnOnce() -> RB + Send,
    ) -> (RA, RB)
    where
        RA: Send,
        RB: Send,
    {
        rayon::join(a, b)
    }
}

/// Fork when `should_fork` says the work at this level is big enough,
/// otherwise evaluate inline. The predicate is consulted once per call.
pub(crate) fn maybe_fork<S, RA, RB>(
    strategy: &S,
    should_fork: impl FnOnce() -> bool,
    a: impl FnOnce() -> RA + Send,
    b: impl FnOnce() -> RB + Send,
) -> (RA, RB)
where
    S: ForkJoin,
    RA: Send,
    RB: Send,
{
    if should_fork() {
        trace!("forking subtree computations");
        strategy.fork2(a, b)
    } else {
        (a(), b())
    }
}
