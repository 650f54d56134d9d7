//! The contract shared by every sequence implementation.
//!
//! A [`SequenceType`] turns user edits (insert or delete by visible index)
//! into replicable operations, and applies replicated operations to a
//! document. The fuzz harness, the convergence checker and the host channel
//! are all written once against this trait.

mod element;
mod generator;

use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::error::Result;

pub use element::{Labeled, SequenceElement, describe_all};
pub use generator::{CHAR_ALPHABET, CharGenerator, ElementGenerator, LabeledGenerator};

/// An edit as the user expressed it, against the visible sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserOperation<E> {
    /// Insert `content` so that its first element lands at `index`.
    Insert {
        /// The new elements, in order.
        content: Vec<E>,
        /// Visible index, `0..=len`.
        index: usize,
    },
    /// Delete the visible range `start..end`.
    Delete {
        /// First deleted index.
        start: usize,
        /// One past the last deleted index.
        end: usize,
    },
}

impl<E> UserOperation<E> {
    /// Build an insertion.
    pub fn insert(content: Vec<E>, index: usize) -> UserOperation<E> {
        return UserOperation::Insert { content, index };
    }

    /// Build a deletion.
    pub fn delete(start: usize, end: usize) -> UserOperation<E> {
        return UserOperation::Delete { start, end };
    }
}

/// An operation paired with its order and the set of orders that causally
/// precede it.
///
/// The causal past is supplied by whoever delivers the operation (an explicit
/// graph in tests, sequence numbers in a host) and is not part of the
/// operation itself. It is shared, so cloning a request or replacing its
/// operation is cheap.
#[derive(Clone, Debug)]
pub struct MergableOpRequest<Op, O> {
    /// The operation.
    pub op: Op,
    /// The causal order token of the operation.
    pub order: O,
    causal_past: Rc<FxHashSet<O>>,
}

impl<Op, O: Clone + Eq + Hash> MergableOpRequest<Op, O> {
    /// Create a request whose causal past is the given orders.
    pub fn new(op: Op, order: O, causal_past: impl IntoIterator<Item = O>) -> MergableOpRequest<Op, O> {
        return MergableOpRequest {
            op,
            order,
            causal_past: Rc::new(causal_past.into_iter().collect()),
        };
    }

    /// Create a request that shares an existing causal past.
    pub fn with_shared_past(op: Op, order: O, causal_past: Rc<FxHashSet<O>>) -> MergableOpRequest<Op, O> {
        return MergableOpRequest { op, order, causal_past };
    }

    /// Whether this request's operation had been observed by the author of
    /// `other`.
    pub fn causally_precedes(&self, other: &MergableOpRequest<Op, O>) -> bool {
        return other.causal_past.contains(&self.order);
    }

    /// The orders that causally precede this request.
    pub fn causal_past(&self) -> &Rc<FxHashSet<O>> {
        return &self.causal_past;
    }

    /// The same request carrying a different operation.
    pub fn with_operation<Op2>(&self, op: Op2) -> MergableOpRequest<Op2, O> {
        return MergableOpRequest {
            op,
            order: self.order.clone(),
            causal_past: Rc::clone(&self.causal_past),
        };
    }
}

/// A replicated sequence implementation.
///
/// Documents are plain values: cloning one gives an independent replica.
/// [`SequenceType::apply_op_with_order`] mutates a document in place; for
/// every implementation it must have the same observable result as merging
/// the operation's effect into a fresh copy.
pub trait SequenceType {
    /// Element type.
    type Element: SequenceElement;
    /// Causal order token. Causally later operations carry greater tokens.
    type Order: Clone + Ord + Hash + Debug;
    /// Replicable operation.
    type Op: Clone + Debug;
    /// Replica state.
    type Document: Clone + Debug;

    /// A document with no content.
    fn empty_document(&self) -> Self::Document;

    /// Convert a user edit against `document` into an operation stamped with
    /// `order`. The document is not modified.
    fn operation_from_user_op(
        &self,
        user_op: &UserOperation<Self::Element>,
        document: &Self::Document,
        order: Self::Order,
    ) -> Result<Self::Op>;

    /// The visible sequence.
    fn read(&self, document: &Self::Document) -> Vec<Self::Element>;

    /// Apply a replicated operation in place.
    fn apply_op_with_order(
        &self,
        document: &mut Self::Document,
        request: &MergableOpRequest<Self::Op, Self::Order>,
    ) -> Result<()>;

    /// Structural equality of replica state, including tombstones.
    fn equals(&self, a: &Self::Document, b: &Self::Document) -> bool;
}
