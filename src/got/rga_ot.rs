//! RGA operations executed under the GOT control algorithm.
//!
//! Each document keeps the log of requests it has executed. An incoming
//! request is run through [`merge`](super::merge) against that log before it
//! is applied, so the log ends up in an order consistent with causality for
//! every executed request.
//!
//! RGA operations address elements by identity rather than position, so
//! they are valid in any context and both transforms leave the operation
//! unchanged. The wrapper still counts how many concurrent entries an
//! operation was transformed against.

use std::fmt::Debug;
use std::hash::Hash;

use tracing::debug;

use super::{Operation, merge};
use crate::crdt::rga::{self, RgaDoc, RgaOp};
use crate::error::Result;
use crate::sequence::{MergableOpRequest, SequenceElement, SequenceType, UserOperation};

/// An RGA operation plus the number of transforms applied to it.
#[derive(Clone, Debug)]
pub struct RgaOtOp<E: SequenceElement, O> {
    /// The underlying operation.
    pub op: RgaOp<E, O>,
    /// Inclusion and exclusion transforms applied so far.
    pub transforms: usize,
}

impl<E: SequenceElement, O: Clone> Operation for RgaOtOp<E, O> {
    fn inclusion_transform_against(&self, _other: &Self) -> Self {
        return RgaOtOp {
            op: self.op.clone(),
            transforms: self.transforms + 1,
        };
    }

    fn exclusion_transform_against(&self, _other: &Self) -> Self {
        return RgaOtOp {
            op: self.op.clone(),
            transforms: self.transforms + 1,
        };
    }
}

/// A replica: the RGA state plus its execution log.
#[derive(Clone, Debug)]
pub struct RgaOtDoc<E: SequenceElement, O> {
    document: RgaDoc<E, O>,
    log: Vec<MergableOpRequest<RgaOtOp<E, O>, O>>,
    transforms: usize,
}

impl<E: SequenceElement, O: Clone + Ord + Hash + Debug> RgaOtDoc<E, O> {
    /// An empty replica.
    pub fn new() -> RgaOtDoc<E, O> {
        return RgaOtDoc {
            document: RgaDoc::new(),
            log: Vec::new(),
            transforms: 0,
        };
    }

    /// The RGA state.
    pub fn document(&self) -> &RgaDoc<E, O> {
        return &self.document;
    }

    /// Orders of executed requests, in log order.
    pub fn log_orders(&self) -> Vec<O> {
        return self.log.iter().map(|request| request.order.clone()).collect();
    }

    /// Total transforms applied to incoming operations.
    pub fn transforms(&self) -> usize {
        return self.transforms;
    }
}

impl<E: SequenceElement, O: Clone + Ord + Hash + Debug> Default for RgaOtDoc<E, O> {
    fn default() -> Self {
        return RgaOtDoc::new();
    }
}

/// The RGA-under-GOT sequence type.
#[derive(Debug)]
pub struct RgaOt<E, O> {
    rga: rga::Rga<E, O>,
}

impl<E, O> RgaOt<E, O> {
    /// Create the sequence type.
    pub fn new() -> RgaOt<E, O> {
        return RgaOt { rga: rga::Rga::new() };
    }
}

impl<E, O> Default for RgaOt<E, O> {
    fn default() -> Self {
        return RgaOt::new();
    }
}

impl<E, O> SequenceType for RgaOt<E, O>
where
    E: SequenceElement,
    O: Clone + Ord + Hash + Debug,
{
    type Element = E;
    type Order = O;
    type Op = RgaOtOp<E, O>;
    type Document = RgaOtDoc<E, O>;

    fn empty_document(&self) -> RgaOtDoc<E, O> {
        return RgaOtDoc::new();
    }

    fn operation_from_user_op(
        &self,
        user_op: &UserOperation<E>,
        document: &RgaOtDoc<E, O>,
        order: O,
    ) -> Result<RgaOtOp<E, O>> {
        let op = self.rga.operation_from_user_op(user_op, &document.document, order)?;
        return Ok(RgaOtOp { op, transforms: 0 });
    }

    fn read(&self, document: &RgaOtDoc<E, O>) -> Vec<E> {
        return document.document.read();
    }

    fn apply_op_with_order(
        &self,
        document: &mut RgaOtDoc<E, O>,
        request: &MergableOpRequest<RgaOtOp<E, O>, O>,
    ) -> Result<()> {
        let transformed = merge(&mut document.log, request);
        rga::apply_op(&mut document.document, &transformed.op)?;
        document.transforms += transformed.transforms;
        debug!(
            order = ?request.order,
            transforms = transformed.transforms,
            log_len = document.log.len() + 1,
            "executed request"
        );
        document.log.push(request.with_operation(transformed));
        return Ok(());
    }

    /// Replicas are equal when their RGA state is. Logs of equal replicas
    /// may list concurrent requests in different orders.
    fn equals(&self, a: &RgaOtDoc<E, O>, b: &RgaOtDoc<E, O>) -> bool {
        return a.document == b.document;
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::state::TestDocumentStateFactory;

    type Seq = RgaOt<char, u64>;

    fn request(op: RgaOtOp<char, u64>, order: u64, past: &[u64]) -> MergableOpRequest<RgaOtOp<char, u64>, u64> {
        return MergableOpRequest::new(op, order, past.iter().copied());
    }

    #[test]
    fn concurrent_requests_are_counted_and_converge() {
        let seq = Seq::new();
        let empty = seq.empty_document();
        let a = seq.operation_from_user_op(&UserOperation::insert(vec!['a'], 0), &empty, 0).unwrap();
        let b = seq.operation_from_user_op(&UserOperation::insert(vec!['b'], 0), &empty, 1).unwrap();
        let a = request(a, 0, &[]);
        let b = request(b, 1, &[]);

        let mut left = seq.empty_document();
        seq.apply_op_with_order(&mut left, &a).unwrap();
        seq.apply_op_with_order(&mut left, &b).unwrap();
        let mut right = seq.empty_document();
        seq.apply_op_with_order(&mut right, &b).unwrap();
        seq.apply_op_with_order(&mut right, &a).unwrap();

        assert_eq!(seq.read(&left).into_iter().collect::<String>(), "ba");
        assert!(seq.equals(&left, &right));
        assert_eq!(left.transforms(), 1);
        assert_eq!(right.transforms(), 1);
        assert_eq!(left.log_orders(), vec![0, 1]);
        assert_eq!(right.log_orders(), vec![1, 0]);
    }

    #[test]
    fn observed_requests_are_moved_ahead_of_concurrent_ones() {
        let seq = Seq::new();
        let empty = seq.empty_document();
        let x = seq.operation_from_user_op(&UserOperation::insert(vec!['x'], 0), &empty, 0).unwrap();
        let y = seq.operation_from_user_op(&UserOperation::insert(vec!['y'], 0), &empty, 1).unwrap();
        let x = request(x, 0, &[]);
        let y = request(y, 1, &[]);

        // A site that saw only `y` deletes it.
        let mut site = seq.empty_document();
        seq.apply_op_with_order(&mut site, &y).unwrap();
        let delete = seq.operation_from_user_op(&UserOperation::delete(0, 1), &site, 2).unwrap();
        let delete = request(delete, 2, &[1]);

        let mut document = seq.empty_document();
        seq.apply_op_with_order(&mut document, &x).unwrap();
        seq.apply_op_with_order(&mut document, &y).unwrap();
        seq.apply_op_with_order(&mut document, &delete).unwrap();

        assert_eq!(document.log_orders(), vec![1, 0, 2]);
        assert_eq!(seq.read(&document).into_iter().collect::<String>(), "x");
    }

    #[test]
    fn merged_states_keep_observed_entries_ahead() {
        let empty = TestDocumentStateFactory::new(Rc::new(Seq::new())).empty_state();
        let x = empty.with_user_operation(&UserOperation::insert(vec!['x'], 0), 0).unwrap();
        let y = empty.with_user_operation(&UserOperation::insert(vec!['y'], 0), 1).unwrap();
        let z = x.with_user_operation(&UserOperation::insert(vec!['z'], 1), 2).unwrap();
        let without_y = y.with_user_operation(&UserOperation::delete(0, 1), 3).unwrap();

        // 3 observed only 1, so 1 moves ahead of the concurrent 0 and 2.
        let left = z.merge_with(&without_y).unwrap();
        assert_eq!(left.document().log_orders(), vec![1, 0, 2, 3]);
        assert_eq!(left.document().transforms(), 4);

        // 2 observed only 0, so 0 moves ahead of the concurrent 1 and 3.
        let right = without_y.merge_with(&z).unwrap();
        assert_eq!(right.document().log_orders(), vec![0, 1, 3, 2]);
        assert_eq!(right.document().transforms(), 4);

        assert_eq!(left.read(), vec!['x', 'z']);
        assert_eq!(left.read(), right.read());
    }
}
