//! The partial effect relation: an independent model of every legal outcome
//! of a set of concurrent sequence edits.
//!
//! Each insertion records "this run of new elements sits between these two
//! existing elements". Each deletion records tombstones. The relation is the
//! transitively reduced precedence graph of all such facts, and a candidate
//! merged sequence is legal when it can be read off the graph in order,
//! visiting every live element exactly once.
//!
//! The relation never commits to a single sequence: two runs inserted
//! between the same anchors may interleave in any way that keeps each run's
//! internal order.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::digraph::Digraph;
use crate::error::Result;
use crate::sequence::SequenceElement;

/// A position in the relation: one of the two limits, or an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Anchor<T> {
    /// Before every element.
    Begin,
    /// A specific element.
    Element(T),
    /// After every element.
    End,
}

impl<T> Anchor<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Anchor<U> {
        return match self {
            Anchor::Begin => Anchor::Begin,
            Anchor::Element(t) => Anchor::Element(f(t)),
            Anchor::End => Anchor::End,
        };
    }
}

/// Outcome of [`PartialEffectRelation::verify_sequence`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    /// The candidate is one of the legal outcomes.
    Success,
    /// The candidate is not legal.
    Failure {
        /// Names the offending element and what was legal instead.
        reason: String,
    },
}

impl Verification {
    /// Whether verification succeeded.
    pub fn is_success(&self) -> bool {
        return matches!(self, Verification::Success);
    }

    /// The failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        return match self {
            Verification::Success => None,
            Verification::Failure { reason } => Some(reason),
        };
    }
}

/// Precedence relation over sequence elements plus a tombstone set.
#[derive(Clone, Debug)]
pub struct PartialEffectRelation<E: SequenceElement> {
    digraph: Digraph<Anchor<E::Identity>>,
    elements: FxHashMap<E::Identity, E>,
    deleted: FxHashSet<E::Identity>,
}

impl<E: SequenceElement> PartialEffectRelation<E> {
    /// An empty relation: `Begin -> End`.
    pub fn new() -> PartialEffectRelation<E> {
        return PartialEffectRelation {
            digraph: Digraph::from_edge(Anchor::Begin, Anchor::End),
            elements: FxHashMap::default(),
            deleted: FxHashSet::default(),
        };
    }

    /// Record that `content` was inserted, in order, between `before` and
    /// `after`.
    ///
    /// The anchors must already be in the relation. The content elements must
    /// be new.
    pub fn insert_subsequence(
        &mut self,
        content: &[E],
        before: Anchor<&E>,
        after: Anchor<&E>,
    ) -> Result<()> {
        if content.is_empty() {
            return Ok(());
        }
        let before = before.map(|e| e.identity());
        let after = after.map(|e| e.identity());

        let mut prev = before;
        for element in content {
            let id = element.identity();
            self.elements.insert(id.clone(), element.clone());
            let node = Anchor::Element(id);
            self.digraph.add_node(node.clone());
            self.digraph.add_edge(prev, node.clone())?;
            prev = node;
        }
        self.digraph.add_edge(prev, after)?;
        self.digraph.transitive_reduce();
        return Ok(());
    }

    /// Tombstone the elements with the given identities.
    pub fn delete_sequence_elements_by_identity(
        &mut self,
        identities: impl IntoIterator<Item = E::Identity>,
    ) {
        self.deleted.extend(identities);
    }

    /// Tombstone the given elements.
    pub fn delete_sequence_elements<'a>(&mut self, elements: impl IntoIterator<Item = &'a E>)
    where
        E: 'a,
    {
        self.delete_sequence_elements_by_identity(elements.into_iter().map(|e| e.identity()));
    }

    /// Whether the identity has been tombstoned.
    pub fn is_deleted(&self, identity: &E::Identity) -> bool {
        return self.deleted.contains(identity);
    }

    /// Immediate successors of `node`, looking through tombstoned elements.
    fn non_deleted_successors(&self, node: &Anchor<E::Identity>) -> Vec<E::Identity> {
        let mut result = Vec::new();
        let mut seen: FxHashSet<&Anchor<E::Identity>> = FxHashSet::default();
        let mut stack: Vec<&Anchor<E::Identity>> = self.digraph.immediate_successors(node).collect();
        while let Some(successor) = stack.pop() {
            if !seen.insert(successor) {
                continue;
            }
            match successor {
                // Begin has no predecessors, so it only matches End here.
                Anchor::Begin | Anchor::End => {}
                Anchor::Element(id) if self.deleted.contains(id) => {
                    stack.extend(self.digraph.immediate_successors(successor));
                }
                Anchor::Element(id) => result.push(id.clone()),
            }
        }
        return result;
    }

    /// Check a candidate sequence against the relation.
    ///
    /// Walks the candidate while keeping the set of elements that may legally
    /// come next, starting from the live successors of `Begin`. Each element
    /// must be in that set; consuming it adds its own live successors. The
    /// set must be empty once the candidate is exhausted.
    pub fn verify_sequence(&self, candidate: &[E]) -> Verification {
        let mut possible_next: FxHashSet<E::Identity> = FxHashSet::default();
        possible_next.extend(self.non_deleted_successors(&Anchor::Begin));

        for element in candidate {
            let id = element.identity();
            if !possible_next.remove(&id) {
                return Verification::Failure {
                    reason: format!(
                        "found '{}' in sequence where expected one of {}",
                        element.describe(),
                        self.describe_set(&possible_next),
                    ),
                };
            }
            possible_next.extend(self.non_deleted_successors(&Anchor::Element(id)));
        }

        if possible_next.is_empty() {
            return Verification::Success;
        }
        return Verification::Failure {
            reason: format!(
                "premature end of input sequence, expected to find one of {}",
                self.describe_set(&possible_next),
            ),
        };
    }

    fn describe_set(&self, ids: &FxHashSet<E::Identity>) -> String {
        let mut names: Vec<String> = ids
            .iter()
            .map(|id| match self.elements.get(id) {
                Some(element) => element.describe(),
                None => format!("{:?}", id),
            })
            .collect();
        names.sort();
        return format!("{{{}}}", names.join(", "));
    }
}

impl<E: SequenceElement> Default for PartialEffectRelation<E> {
    fn default() -> Self {
        return PartialEffectRelation::new();
    }
}
