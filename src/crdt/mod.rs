//! CRDT primitives for replicated sequences.

pub mod effect;
pub mod rga;

use crate::error::Result;

/// A CRDT is a data type with a merge operator that is commutative,
/// associative, and idempotent.
pub trait Crdt {
    /// Merge another instance into this one.
    ///
    /// Fails only when the two replicas violate an invariant no consistent
    /// history can produce.
    fn merge_in_place(&mut self, other: &Self) -> Result<()>;
}
