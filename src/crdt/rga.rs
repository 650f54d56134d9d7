//! Replicated Growable Array (RGA) document and merge.
//!
//! The document is an effect sequence (every element ever inserted, in
//! document order, each tagged with the order of the operation that inserted
//! it) plus a tombstone set. The visible sequence is the effect sequence with
//! tombstoned identities filtered out.
//!
//! Merge is the only way content gets into a document. A local insertion
//! becomes a tiny document holding the new elements and their immediate
//! visible neighbours, and that document is merged in exactly like a remote
//! replica would be. Concurrent runs that land in the same gap are ordered
//! by descending causal order, so causally later content sorts earlier.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

use rustc_hash::FxHashSet;
use tracing::trace;

use super::Crdt;
use super::effect::{EffectElement, merge_effect_sequence};
use crate::error::{Error, Result};
use crate::sequence::{MergableOpRequest, SequenceElement, SequenceType, UserOperation};

/// An RGA replica.
#[derive(Clone, Debug)]
pub struct RgaDoc<E: SequenceElement, O> {
    effect_sequence: Vec<EffectElement<E, O>>,
    deleted: FxHashSet<E::Identity>,
}

impl<E: SequenceElement, O: Clone + Ord + Debug> RgaDoc<E, O> {
    /// An empty document.
    pub fn new() -> RgaDoc<E, O> {
        return RgaDoc {
            effect_sequence: Vec::new(),
            deleted: FxHashSet::default(),
        };
    }

    /// Build a document from an effect sequence and a tombstone set.
    pub fn from_parts(
        effect_sequence: Vec<EffectElement<E, O>>,
        deleted: impl IntoIterator<Item = E::Identity>,
    ) -> RgaDoc<E, O> {
        return RgaDoc {
            effect_sequence,
            deleted: deleted.into_iter().collect(),
        };
    }

    /// Every element ever inserted, tombstones included.
    pub fn effect_sequence(&self) -> &[EffectElement<E, O>] {
        return &self.effect_sequence;
    }

    /// Tombstoned identities.
    pub fn deleted(&self) -> &FxHashSet<E::Identity> {
        return &self.deleted;
    }

    /// Whether the identity is tombstoned.
    pub fn is_deleted(&self, identity: &E::Identity) -> bool {
        return self.deleted.contains(identity);
    }

    /// The effect sequence without tombstoned elements.
    pub fn non_tombstone_effect_sequence(&self) -> Vec<&EffectElement<E, O>> {
        return self
            .effect_sequence
            .iter()
            .filter(|e| !self.deleted.contains(&e.element.identity()))
            .collect();
    }

    /// The visible sequence.
    pub fn read(&self) -> Vec<E> {
        return self
            .non_tombstone_effect_sequence()
            .into_iter()
            .map(|e| e.element.clone())
            .collect();
    }

    /// Number of visible elements.
    pub fn len(&self) -> usize {
        return self
            .effect_sequence
            .iter()
            .filter(|e| !self.deleted.contains(&e.element.identity()))
            .count();
    }

    /// Whether nothing is visible.
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// Tombstone the given identities.
    pub fn delete(&mut self, identities: impl IntoIterator<Item = E::Identity>) {
        self.deleted.extend(identities);
    }

    /// Merge two documents into a new one.
    ///
    /// Effect sequences are interleaved with [`merge_effect_sequence`],
    /// tombstones are unioned. Neither input is modified.
    pub fn merge(&self, other: &RgaDoc<E, O>) -> Result<RgaDoc<E, O>> {
        let mut merged = self.clone();
        merged.merge_in_place(other)?;
        return Ok(merged);
    }
}

/// Identity equality of two effect elements.
fn same_element<E: SequenceElement, O>(a: &EffectElement<E, O>, b: &EffectElement<E, O>) -> bool {
    return a.element.identity() == b.element.identity();
}

/// Descending causal order: the later insertion goes first.
///
/// Two distinct elements never share an order unless they came from the
/// same insertion, and those are never compared head to head.
fn causally_later_first<E: SequenceElement, O: Ord + Debug>(
    a: &EffectElement<E, O>,
    b: &EffectElement<E, O>,
) -> Result<Ordering> {
    return match b.order.cmp(&a.order) {
        Ordering::Equal => Err(Error::DuplicateElement {
            left: a.element.describe(),
            right: b.element.describe(),
        }),
        ordering => Ok(ordering),
    };
}

impl<E: SequenceElement, O: Clone + Ord + Debug> Crdt for RgaDoc<E, O> {
    fn merge_in_place(&mut self, other: &Self) -> Result<()> {
        if !other.effect_sequence.is_empty() {
            self.effect_sequence = merge_effect_sequence(
                &self.effect_sequence,
                &other.effect_sequence,
                same_element,
                causally_later_first,
            )?;
        }
        self.deleted.extend(other.deleted.iter().cloned());
        trace!(
            effect_len = self.effect_sequence.len(),
            deleted = self.deleted.len(),
            "merged rga documents"
        );
        return Ok(());
    }
}

impl<E: SequenceElement, O: Clone + Ord + Debug> Default for RgaDoc<E, O> {
    fn default() -> Self {
        return RgaDoc::new();
    }
}

/// Structural equality: same effect sequence (by identity and order) and the
/// same tombstones.
impl<E: SequenceElement, O: Ord> PartialEq for RgaDoc<E, O> {
    fn eq(&self, other: &Self) -> bool {
        if self.effect_sequence.len() != other.effect_sequence.len() {
            return false;
        }
        let sequences_match = self
            .effect_sequence
            .iter()
            .zip(&other.effect_sequence)
            .all(|(a, b)| a.order.cmp(&b.order) == Ordering::Equal && a.element.identity() == b.element.identity());
        return sequences_match && self.deleted == other.deleted;
    }
}

impl<E: SequenceElement, O: Ord> Eq for RgaDoc<E, O> {}

/// A replicable RGA operation.
#[derive(Clone, Debug)]
pub enum RgaOp<E: SequenceElement, O> {
    /// New content with its visible neighbours at the time of the edit.
    Insertion {
        /// `[left neighbour?, new content..., right neighbour?]`, no
        /// tombstones.
        document: RgaDoc<E, O>,
        /// Identities of the new content.
        inserted: Vec<E::Identity>,
    },
    /// Identities to tombstone.
    Deletion {
        /// The removed identities.
        deleted: Vec<E::Identity>,
    },
}

/// The RGA sequence type.
#[derive(Debug)]
pub struct Rga<E, O> {
    _marker: PhantomData<fn() -> (E, O)>,
}

impl<E, O> Rga<E, O> {
    /// Create the sequence type.
    pub fn new() -> Rga<E, O> {
        return Rga { _marker: PhantomData };
    }
}

impl<E, O> Default for Rga<E, O> {
    fn default() -> Self {
        return Rga::new();
    }
}

impl<E, O> Clone for Rga<E, O> {
    fn clone(&self) -> Self {
        return Rga::new();
    }
}

impl<E, O> Copy for Rga<E, O> {}

/// Fails if `content` repeats an identity, or reuses one that `document`
/// has ever held. Tombstoned identities count as used.
fn check_fresh<E: SequenceElement, O>(content: &[E], document: &RgaDoc<E, O>) -> Result<()> {
    let mut used: FxHashSet<E::Identity> = document
        .effect_sequence
        .iter()
        .map(|e| e.element.identity())
        .collect();
    for element in content {
        if !used.insert(element.identity()) {
            let existing = document
                .effect_sequence
                .iter()
                .map(|e| &e.element)
                .chain(content)
                .find(|e| e.identity() == element.identity())
                .unwrap_or(element);
            return Err(Error::DuplicateElement {
                left: existing.describe(),
                right: element.describe(),
            });
        }
    }
    return Ok(());
}

/// Build the operation for a user edit against `document`.
///
/// Inserted elements must carry identities the document has never seen.
pub fn operation_from_user_op<E: SequenceElement, O: Clone + Ord + Debug>(
    user_op: &UserOperation<E>,
    document: &RgaDoc<E, O>,
    order: O,
) -> Result<RgaOp<E, O>> {
    let visible = document.non_tombstone_effect_sequence();
    let len = visible.len();
    return match user_op {
        UserOperation::Insert { content, index } => {
            let index = *index;
            if index > len {
                return Err(Error::IndexOutOfRange { index, len });
            }
            check_fresh(content, document)?;
            let mut sequence = Vec::with_capacity(content.len() + 2);
            if index != 0 {
                sequence.push(visible[index - 1].clone());
            }
            for element in content {
                sequence.push(EffectElement::new(element.clone(), order.clone()));
            }
            if index != len {
                sequence.push(visible[index].clone());
            }
            Ok(RgaOp::Insertion {
                document: RgaDoc::from_parts(sequence, []),
                inserted: content.iter().map(|e| e.identity()).collect(),
            })
        }
        UserOperation::Delete { start, end } => {
            if *end > len {
                return Err(Error::IndexOutOfRange { index: *end, len });
            }
            if start > end {
                return Err(Error::IndexOutOfRange { index: *start, len: *end });
            }
            Ok(RgaOp::Deletion {
                deleted: visible[*start..*end]
                    .iter()
                    .map(|e| e.element.identity())
                    .collect(),
            })
        }
    };
}

/// Apply an operation in place.
pub fn apply_op<E: SequenceElement, O: Clone + Ord + Debug>(
    document: &mut RgaDoc<E, O>,
    op: &RgaOp<E, O>,
) -> Result<()> {
    match op {
        RgaOp::Insertion { document: inserted, .. } => document.merge_in_place(inserted)?,
        RgaOp::Deletion { deleted } => document.delete(deleted.iter().cloned()),
    }
    return Ok(());
}

/// Replay operations by folding merges over an empty document.
///
/// A deletion folds as a merge with an empty document carrying only those
/// tombstones. The result does not depend on the order of `ops`.
pub fn merge_ops<'a, E, O>(ops: impl IntoIterator<Item = &'a RgaOp<E, O>>) -> Result<RgaDoc<E, O>>
where
    E: SequenceElement + 'a,
    O: Clone + Ord + Debug + 'a,
{
    let mut document = RgaDoc::new();
    for op in ops {
        document = match op {
            RgaOp::Insertion { document: inserted, .. } => document.merge(inserted)?,
            RgaOp::Deletion { deleted } => {
                document.merge(&RgaDoc::from_parts(Vec::new(), deleted.iter().cloned()))?
            }
        };
    }
    return Ok(document);
}

impl<E, O> SequenceType for Rga<E, O>
where
    E: SequenceElement,
    O: Clone + Ord + Hash + Debug,
{
    type Element = E;
    type Order = O;
    type Op = RgaOp<E, O>;
    type Document = RgaDoc<E, O>;

    fn empty_document(&self) -> RgaDoc<E, O> {
        return RgaDoc::new();
    }

    fn operation_from_user_op(
        &self,
        user_op: &UserOperation<E>,
        document: &RgaDoc<E, O>,
        order: O,
    ) -> Result<RgaOp<E, O>> {
        return operation_from_user_op(user_op, document, order);
    }

    fn read(&self, document: &RgaDoc<E, O>) -> Vec<E> {
        return document.read();
    }

    fn apply_op_with_order(
        &self,
        document: &mut RgaDoc<E, O>,
        request: &MergableOpRequest<RgaOp<E, O>, O>,
    ) -> Result<()> {
        return apply_op(document, &request.op);
    }

    fn equals(&self, a: &RgaDoc<E, O>, b: &RgaDoc<E, O>) -> bool {
        return a == b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str, order: u64, deleted: &str) -> RgaDoc<char, u64> {
        return RgaDoc::from_parts(
            content.chars().map(|c| EffectElement::new(c, order)).collect(),
            deleted.chars(),
        );
    }

    fn effect(document: &RgaDoc<char, u64>) -> String {
        return document.effect_sequence().iter().map(|e| e.element).collect();
    }

    fn read(document: &RgaDoc<char, u64>) -> String {
        return document.read().into_iter().collect();
    }

    #[test]
    fn read_skips_tombstones() {
        let document = doc("abcde", 0, "bd");
        assert_eq!(read(&document), "ace");
        assert_eq!(document.len(), 3);
        assert_eq!(effect(&document), "abcde");
    }

    #[test]
    fn merge_disjoint_puts_later_order_first() {
        let abc = doc("abc", 1, "b");
        let xyz = doc("xyz", 0, "xz");
        let merged = abc.merge(&xyz).unwrap();
        assert_eq!(effect(&merged), "abcxyz");
        assert_eq!(read(&merged), "acy");
        assert_eq!(merged, xyz.merge(&abc).unwrap());
    }

    #[test]
    fn merge_is_idempotent() {
        let abc = doc("abc", 1, "b");
        assert_eq!(abc.merge(&abc).unwrap(), abc);
    }

    #[test]
    fn false_tie_documents_converge() {
        let base = doc("abc", 0, "b");
        let x = RgaDoc::from_parts(
            vec![
                EffectElement::new('a', 0),
                EffectElement::new('x', 1),
                EffectElement::new('b', 0),
                EffectElement::new('c', 0),
            ],
            [],
        );
        let y = RgaDoc::from_parts(
            vec![
                EffectElement::new('a', 0),
                EffectElement::new('b', 0),
                EffectElement::new('y', 2),
                EffectElement::new('c', 0),
            ],
            [],
        );
        let left = base.merge(&x).unwrap().merge(&y).unwrap();
        let right = y.merge(&base).unwrap().merge(&x).unwrap();
        assert_eq!(read(&left), "axyc");
        assert_eq!(left, right);
    }

    #[test]
    fn equality_compares_orders_and_tombstones() {
        assert_eq!(doc("abc", 0, "b"), doc("abc", 0, "b"));
        assert_ne!(doc("abc", 0, "b"), doc("abc", 1, "b"));
        assert_ne!(doc("abc", 0, "b"), doc("abc", 0, "c"));
        assert_ne!(doc("abc", 0, ""), doc("ab", 0, ""));
        assert_ne!(doc("abc", 0, ""), doc("acb", 0, ""));
    }

    #[test]
    fn same_order_distinct_elements_is_an_error() {
        let left = doc("a", 0, "");
        let right = doc("b", 0, "");
        assert!(matches!(left.merge(&right), Err(Error::DuplicateElement { .. })));
    }

    #[test]
    fn insertion_carries_visible_neighbours() {
        let document = doc("abc", 0, "b");
        let op = operation_from_user_op(&UserOperation::insert(vec!['x'], 1), &document, 1).unwrap();
        match op {
            RgaOp::Insertion { document, inserted } => {
                assert_eq!(effect(&document), "axc");
                assert_eq!(inserted, vec!['x']);
                assert!(document.deleted().is_empty());
            }
            RgaOp::Deletion { .. } => panic!("expected insertion"),
        }
    }

    #[test]
    fn insertion_at_the_edges_omits_anchors() {
        let document = doc("ab", 0, "");
        let front = operation_from_user_op(&UserOperation::insert(vec!['x'], 0), &document, 1).unwrap();
        let back = operation_from_user_op(&UserOperation::insert(vec!['y'], 2), &document, 1).unwrap();
        let empty = operation_from_user_op(&UserOperation::insert(vec!['z'], 0), &RgaDoc::new(), 1).unwrap();
        for (op, expected) in [(front, "xa"), (back, "by"), (empty, "z")] {
            match op {
                RgaOp::Insertion { document, .. } => assert_eq!(effect(&document), expected),
                RgaOp::Deletion { .. } => panic!("expected insertion"),
            }
        }
    }

    #[test]
    fn reused_identities_are_rejected() {
        let document = doc("abc", 0, "b");
        let repeated = operation_from_user_op(&UserOperation::insert(vec!['x', 'y', 'x'], 1), &document, 1);
        assert_eq!(
            repeated.unwrap_err(),
            Error::DuplicateElement {
                left: "x".to_string(),
                right: "x".to_string(),
            }
        );
        // Tombstoned identities stay taken.
        let tombstoned = operation_from_user_op(&UserOperation::insert(vec!['b'], 0), &document, 1);
        assert!(matches!(tombstoned, Err(Error::DuplicateElement { .. })));
        let visible = operation_from_user_op(&UserOperation::insert(vec!['z', 'c'], 0), &document, 1);
        assert!(matches!(visible, Err(Error::DuplicateElement { .. })));
    }

    #[test]
    fn deletion_uses_visible_indices() {
        let document = doc("abcd", 0, "b");
        let op = operation_from_user_op(&UserOperation::delete(1, 3), &document, 1).unwrap();
        match op {
            RgaOp::Deletion { deleted } => assert_eq!(deleted, vec!['c', 'd']),
            RgaOp::Insertion { .. } => panic!("expected deletion"),
        }
    }

    #[test]
    fn out_of_range_edits_are_rejected() {
        let document = doc("ab", 0, "");
        assert!(operation_from_user_op(&UserOperation::insert(vec!['x'], 3), &document, 1).is_err());
        assert!(operation_from_user_op(&UserOperation::<char>::delete(1, 3), &document, 1).is_err());
        assert!(operation_from_user_op(&UserOperation::<char>::delete(2, 1), &document, 1).is_err());
    }

    #[test]
    fn merge_ops_ignores_replay_order() {
        let base = doc("abcd", 0, "");
        let delete = operation_from_user_op(&UserOperation::delete(1, 3), &base, 1).unwrap();
        let insert = operation_from_user_op(&UserOperation::insert(vec!['e'], 2), &base, 2).unwrap();
        let base_op = RgaOp::Insertion {
            document: base.clone(),
            inserted: "abcd".chars().collect(),
        };
        let forward = merge_ops([&base_op, &delete, &insert]).unwrap();
        let backward = merge_ops([&insert, &delete, &base_op]).unwrap();
        assert_eq!(read(&forward), "aed");
        assert_eq!(forward, backward);
    }
}
