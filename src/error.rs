//! Errors raised when an internal invariant of the merge core is violated.
//!
//! None of these are retried. An oracle mismatch is not an error: it is
//! reported as a [`Verification`](crate::oracle::Verification) value.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An invariant violation detected by the merge core or the test harness.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An edge endpoint was never added to the graph.
    #[error("can't use edge, {end} node not in graph")]
    MissingNode {
        /// Which endpoint is missing (`"src"` or `"dest"`).
        end: &'static str,
    },

    /// Forward and reverse adjacency disagree about an edge.
    #[error("digraph invariant violated: edge tracked in {tracked} direction only")]
    AdjacencyMismatch {
        /// The direction that does record the edge.
        tracked: &'static str,
    },

    /// An operation order key was used twice in one log.
    #[error("invalid order {order}, already present")]
    DuplicateOrder {
        /// The reused order, rendered with `Debug`.
        order: String,
    },

    /// Two distinct elements carry the same causal order, or one identity
    /// was inserted twice.
    #[error("duplicate sequence element: {left} and {right} share an order or an identity")]
    DuplicateElement {
        /// First element.
        left: String,
        /// Second element.
        right: String,
    },

    /// An index or range fell outside the visible document.
    #[error("index {index} out of range for document of length {len}")]
    IndexOutOfRange {
        /// Offending index.
        index: usize,
        /// Visible length at the time.
        len: usize,
    },

    /// A remote insertion arrived before the element it was placed next to.
    #[error("remote insertion anchored on unknown element {element}, operations must arrive in causal order")]
    MissingAnchor {
        /// The missing neighbour.
        element: String,
    },

    /// A fuzz slot was read before an operation was assigned to it.
    #[error("no operation info on slot {slot}")]
    MissingOperation {
        /// Slot number.
        slot: usize,
    },

    /// Two replicas disagree after exchanging every operation.
    #[error("convergence failure detected, documents at different sites are not equal")]
    ConvergenceFailure,

    /// An element generator ran out of fresh elements.
    #[error("element generator cannot create more unique elements (produced {produced})")]
    GeneratorExhausted {
        /// How many elements were produced before running out.
        produced: usize,
    },

    /// A seed string could not be parsed.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),
}
