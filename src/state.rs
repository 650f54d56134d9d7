//! Replica state with its operation history, for convergence checking.
//!
//! A [`TestDocumentState`] is one site's view: a document plus every request
//! the document has absorbed, keyed by order. Two states merge by replaying
//! each side's missing requests into a copy of the other and demanding that
//! both copies end up equal. A mismatch is a convergence failure: the
//! implementation produced different documents from the same operation set.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::sequence::{MergableOpRequest, SequenceType, UserOperation};

type Request<S> = MergableOpRequest<<S as SequenceType>::Op, <S as SequenceType>::Order>;

/// A document plus the requests it was built from.
pub struct TestDocumentState<S: SequenceType> {
    document: S::Document,
    operations: BTreeMap<S::Order, Request<S>>,
    implementation: Rc<S>,
}

impl<S: SequenceType> Clone for TestDocumentState<S> {
    fn clone(&self) -> Self {
        return TestDocumentState {
            document: self.document.clone(),
            operations: self.operations.clone(),
            implementation: Rc::clone(&self.implementation),
        };
    }
}

impl<S: SequenceType> std::fmt::Debug for TestDocumentState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("TestDocumentState")
            .field("document", &self.document)
            .field("orders", &self.operations.keys().collect::<Vec<_>>())
            .finish();
    }
}

impl<S: SequenceType> TestDocumentState<S> {
    /// The current document.
    pub fn document(&self) -> &S::Document {
        return &self.document;
    }

    /// The visible sequence.
    pub fn read(&self) -> Vec<S::Element> {
        return self.implementation.read(&self.document);
    }

    /// A new state with `user_op` applied as the operation `order`.
    ///
    /// The new request's causal past is every request already in this
    /// state.
    pub fn with_user_operation(
        &self,
        user_op: &UserOperation<S::Element>,
        order: S::Order,
    ) -> Result<TestDocumentState<S>> {
        if self.operations.contains_key(&order) {
            return Err(Error::DuplicateOrder {
                order: format!("{:?}", order),
            });
        }
        let op = self
            .implementation
            .operation_from_user_op(user_op, &self.document, order.clone())?;
        let request = MergableOpRequest::new(op, order.clone(), self.operations.keys().cloned());

        let mut document = self.document.clone();
        self.implementation.apply_op_with_order(&mut document, &request)?;
        let mut operations = self.operations.clone();
        operations.insert(order, request);
        return Ok(TestDocumentState {
            document,
            operations,
            implementation: Rc::clone(&self.implementation),
        });
    }

    /// Merge two states.
    ///
    /// Each side replays the requests it is missing, in ascending order.
    /// Fails with [`Error::ConvergenceFailure`] when the two resulting
    /// documents differ, and with [`Error::DuplicateOrder`] when the same
    /// order names different requests on the two sides.
    pub fn merge_with(&self, other: &TestDocumentState<S>) -> Result<TestDocumentState<S>> {
        let mut this_document = self.document.clone();
        let mut other_document = other.document.clone();
        self.apply_missing(&mut this_document, &other.operations, &self.operations)?;
        self.apply_missing(&mut other_document, &self.operations, &other.operations)?;
        if !self.implementation.equals(&this_document, &other_document) {
            return Err(Error::ConvergenceFailure);
        }

        let mut operations = self.operations.clone();
        for (order, request) in &other.operations {
            operations
                .entry(order.clone())
                .or_insert_with(|| request.clone());
        }
        trace!(operations = operations.len(), "merged document states");
        return Ok(TestDocumentState {
            document: this_document,
            operations,
            implementation: Rc::clone(&self.implementation),
        });
    }

    fn apply_missing(
        &self,
        document: &mut S::Document,
        operations: &BTreeMap<S::Order, Request<S>>,
        already_applied: &BTreeMap<S::Order, Request<S>>,
    ) -> Result<()> {
        for (order, request) in operations {
            match already_applied.get(order) {
                // Requests are shared between states derived from the same
                // edit, so sharing the causal past identifies the request.
                Some(existing) if Rc::ptr_eq(existing.causal_past(), request.causal_past()) => {}
                Some(_) => {
                    return Err(Error::DuplicateOrder {
                        order: format!("{:?}", order),
                    });
                }
                None => self.implementation.apply_op_with_order(document, request)?,
            }
        }
        return Ok(());
    }

    /// Orders of every request in this state, ascending.
    pub fn sequence_numbers(&self) -> Vec<S::Order> {
        return self.operations.keys().cloned().collect();
    }
}

/// Creates empty states for one implementation.
pub struct TestDocumentStateFactory<S: SequenceType> {
    implementation: Rc<S>,
}

impl<S: SequenceType> TestDocumentStateFactory<S> {
    /// A factory for `implementation`.
    pub fn new(implementation: Rc<S>) -> TestDocumentStateFactory<S> {
        return TestDocumentStateFactory { implementation };
    }

    /// A state with an empty document and no requests.
    pub fn empty_state(&self) -> TestDocumentState<S> {
        return TestDocumentState {
            document: self.implementation.empty_document(),
            operations: BTreeMap::new(),
            implementation: Rc::clone(&self.implementation),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::rga::Rga;

    fn factory() -> TestDocumentStateFactory<Rga<char, u64>> {
        return TestDocumentStateFactory::new(Rc::new(Rga::new()));
    }

    fn text(state: &TestDocumentState<Rga<char, u64>>) -> String {
        return state.read().into_iter().collect();
    }

    #[test]
    fn user_operations_accumulate() {
        let state = factory()
            .empty_state()
            .with_user_operation(&UserOperation::insert(vec!['a', 'c'], 0), 0)
            .unwrap()
            .with_user_operation(&UserOperation::insert(vec!['b'], 1), 1)
            .unwrap();
        assert_eq!(text(&state), "abc");
        assert_eq!(state.sequence_numbers(), vec![0, 1]);
    }

    #[test]
    fn reusing_an_order_is_rejected() {
        let state = factory()
            .empty_state()
            .with_user_operation(&UserOperation::insert(vec!['a'], 0), 0)
            .unwrap();
        let result = state.with_user_operation(&UserOperation::insert(vec!['b'], 0), 0);
        assert!(matches!(result, Err(Error::DuplicateOrder { .. })));
    }

    #[test]
    fn merge_unions_histories() {
        let empty = factory().empty_state();
        let a = empty.with_user_operation(&UserOperation::insert(vec!['a'], 0), 0).unwrap();
        let b = empty.with_user_operation(&UserOperation::insert(vec!['b'], 0), 1).unwrap();
        let merged = a.merge_with(&b).unwrap();
        assert_eq!(text(&merged), "ba");
        assert_eq!(merged.sequence_numbers(), vec![0, 1]);
        assert_eq!(text(&b.merge_with(&a).unwrap()), "ba");
    }

    #[test]
    fn merging_shared_history_is_idempotent() {
        let state = factory()
            .empty_state()
            .with_user_operation(&UserOperation::insert(vec!['a', 'b'], 0), 0)
            .unwrap();
        let merged = state.merge_with(&state).unwrap();
        assert_eq!(text(&merged), "ab");
        assert_eq!(merged.sequence_numbers(), vec![0]);
    }

    #[test]
    fn same_order_different_edits_is_rejected() {
        let empty = factory().empty_state();
        let a = empty.with_user_operation(&UserOperation::insert(vec!['a'], 0), 0).unwrap();
        let b = empty.with_user_operation(&UserOperation::insert(vec!['b'], 0), 0).unwrap();
        assert!(matches!(a.merge_with(&b), Err(Error::DuplicateOrder { .. })));
    }
}
