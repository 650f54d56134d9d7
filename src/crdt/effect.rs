//! Merging two effect sequences into one.
//!
//! An effect sequence is every element a replica has ever seen, tombstones
//! included, in document order. Two replicas that share a causal history
//! agree on the relative order of every element they both contain, so
//! merging is a two-pointer walk that only has to decide how to interleave
//! the elements each side has and the other lacks.

use std::cmp::Ordering;

use crate::error::Result;

/// An element tagged with the causal order of the operation that inserted it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectElement<E, O> {
    /// The element.
    pub element: E,
    /// Causal order token of its insertion.
    pub order: O,
}

impl<E, O> EffectElement<E, O> {
    /// Pair an element with its order.
    pub fn new(element: E, order: O) -> EffectElement<E, O> {
        return EffectElement { element, order };
    }
}

/// Merge two sequences that derive from a consistent causal history.
///
/// At each step:
/// 1. equal heads are emitted once and both sides advance;
/// 2. if the head of `sequence1` appears later in `sequence2`, the head of
///    `sequence2` is content `sequence1` has not seen yet, so it goes first;
/// 3. symmetrically for the head of `sequence2`;
/// 4. otherwise both heads are new to the other side and `comp` decides,
///    `Ordering::Less` meaning the head of `sequence1` goes first.
///
/// Whatever remains of either side once the other is exhausted is appended.
/// For inputs from a consistent history the result does not depend on
/// argument order.
pub fn merge_effect_sequence<T: Clone>(
    sequence1: &[T],
    sequence2: &[T],
    equal: impl Fn(&T, &T) -> bool,
    comp: impl Fn(&T, &T) -> Result<Ordering>,
) -> Result<Vec<T>> {
    if sequence1.is_empty() {
        return Ok(sequence2.to_vec());
    }
    if sequence2.is_empty() {
        return Ok(sequence1.to_vec());
    }

    let mut result = Vec::with_capacity(sequence1.len().max(sequence2.len()));
    let mut i1 = 0;
    let mut i2 = 0;
    while i1 < sequence1.len() && i2 < sequence2.len() {
        let el1 = &sequence1[i1];
        let el2 = &sequence2[i2];
        if equal(el1, el2) {
            result.push(el1.clone());
            i1 += 1;
            i2 += 1;
        } else if sequence2[i2 + 1..].iter().any(|el| equal(el, el1)) {
            result.push(el2.clone());
            i2 += 1;
        } else if sequence1[i1 + 1..].iter().any(|el| equal(el, el2)) {
            result.push(el1.clone());
            i1 += 1;
        } else if comp(el1, el2)? == Ordering::Less {
            result.push(el1.clone());
            i1 += 1;
        } else {
            result.push(el2.clone());
            i2 += 1;
        }
    }
    result.extend_from_slice(&sequence1[i1..]);
    result.extend_from_slice(&sequence2[i2..]);
    return Ok(result);
}
