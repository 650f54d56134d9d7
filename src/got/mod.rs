//! The GOT control algorithm.
//!
//! Operational transformation keeps a linear log of executed operations. A
//! new operation was generated against some causal past. Before it can be
//! executed it must be transformed against every log entry it did not
//! observe. Those entries may be interleaved with entries it did observe, so
//! the log is first reordered by back-transposition: each observed entry
//! that sits after a concurrent one is swapped backwards until every
//! observed entry precedes every concurrent one. The new operation is then
//! included against the concurrent suffix in log order.
//!
//! Complexity: O(n^2) transpositions in the worst case for a log of length n.

pub mod rga_ot;

use std::hash::Hash;

use tracing::trace;

use crate::sequence::MergableOpRequest;

/// A transformable operation.
pub trait Operation: Sized {
    /// Transform this operation so it applies after `other` has been applied.
    fn inclusion_transform_against(&self, other: &Self) -> Self;

    /// Transform this operation so it applies as if `other` had never been
    /// applied.
    fn exclusion_transform_against(&self, other: &Self) -> Self;

    /// Swap this operation with `other`, which currently sits immediately
    /// before it in the log.
    ///
    /// Returns `(self', other')` where `self'` can precede `other'`.
    fn back_transpose_with(&self, other: &Self) -> (Self, Self) {
        let op1 = self.exclusion_transform_against(other);
        let op2 = other.inclusion_transform_against(&op1);
        return (op1, op2);
    }
}

/// A log entry: an operation plus its causal relation to other entries.
pub trait OpRequest: Sized {
    /// The operation type.
    type Op: Operation + Clone;

    /// The wrapped operation.
    fn operation(&self) -> &Self::Op;

    /// Whether this entry was observed by the author of `other`.
    fn causally_precedes(&self, other: &Self) -> bool;

    /// The same entry carrying a different operation.
    fn with_operation(&self, op: Self::Op) -> Self;
}

impl<Op, O> OpRequest for MergableOpRequest<Op, O>
where
    Op: Operation + Clone,
    O: Clone + Eq + Hash,
{
    type Op = Op;

    fn operation(&self) -> &Op {
        return &self.op;
    }

    fn causally_precedes(&self, other: &Self) -> bool {
        return MergableOpRequest::causally_precedes(self, other);
    }

    fn with_operation(&self, op: Op) -> Self {
        return MergableOpRequest::with_operation(self, op);
    }
}

/// First index at or after `start` whose entry satisfies `pred`, or
/// `log.len()`.
fn scan<R>(log: &[R], start: usize, pred: impl Fn(&R) -> bool) -> usize {
    return (start..log.len()).find(|&i| pred(&log[i])).unwrap_or(log.len());
}

/// Transform `new_request` for execution after `log`.
///
/// Reorders `log` in place so that every entry the new request observed
/// comes before every entry it did not, then returns the new operation
/// included against that concurrent suffix. Entries that are concurrent
/// with each other keep their relative log order.
pub fn merge<R: OpRequest>(log: &mut [R], new_request: &R) -> R::Op {
    let mut first_concurrent = scan(log, 0, |entry| !entry.causally_precedes(new_request));
    if first_concurrent == log.len() {
        return new_request.operation().clone();
    }

    let mut first_succeeding = scan(log, first_concurrent + 1, |entry| {
        entry.causally_precedes(new_request)
    });

    while first_succeeding != log.len() {
        // Bubble the observed entry back to `first_concurrent`.
        for i in (first_concurrent..first_succeeding).rev() {
            let (op1, op2) = log[i + 1].operation().back_transpose_with(log[i].operation());
            let moved_back = log[i + 1].with_operation(op1);
            let moved_forward = log[i].with_operation(op2);
            log[i] = moved_back;
            log[i + 1] = moved_forward;
        }
        trace!(from = first_succeeding, to = first_concurrent, "back transposed log entry");

        first_concurrent += 1;
        first_succeeding = scan(log, first_succeeding + 1, |entry| {
            entry.causally_precedes(new_request)
        });
    }

    let mut op = new_request.operation().clone();
    for entry in &log[first_concurrent..] {
        op = op.inclusion_transform_against(entry.operation());
    }
    return op;
}
