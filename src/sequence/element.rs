//! Sequence elements and their identities.

use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// A value stored in a replicated sequence.
///
/// Every element has an identity that distinguishes it from every other
/// element ever inserted. The identity may be the element itself (a
/// character in a test alphabet that never repeats) or a separate stable id.
/// It is never derived from position.
pub trait SequenceElement: Clone + Debug {
    /// The identity type.
    type Identity: Clone + Eq + Hash + Debug;

    /// The identity of this element.
    fn identity(&self) -> Self::Identity;

    /// A short human readable rendering, used in oracle failure messages.
    fn describe(&self) -> String;
}

impl SequenceElement for char {
    type Identity = char;

    fn identity(&self) -> char {
        return *self;
    }

    fn describe(&self) -> String {
        return self.to_string();
    }
}

/// An element whose identity is a separate id rather than its value.
///
/// Two `Labeled` elements with the same `value` are still distinct elements
/// as long as their ids differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Labeled {
    /// Stable identity.
    pub id: u64,
    /// Visible value.
    pub value: char,
}

impl SequenceElement for Labeled {
    type Identity = u64;

    fn identity(&self) -> u64 {
        return self.id;
    }

    fn describe(&self) -> String {
        return format!("{}#{}", self.value, self.id);
    }
}

/// Render a slice of elements as a string, for diagnostics and tests.
pub fn describe_all<E: SequenceElement>(elements: &[E]) -> String {
    return elements.iter().map(|e| e.describe()).collect();
}
