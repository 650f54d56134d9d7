//! Sources of fresh, never-repeating elements for the fuzz harness.

use crate::error::{Error, Result};
use crate::sequence::element::Labeled;

/// The character alphabet: `a-z`, `A-Z`, `0-9`.
pub const CHAR_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Produces elements that are distinct from every element it produced
/// before.
pub trait ElementGenerator<E> {
    /// The next fresh element.
    fn next_element(&mut self) -> Result<E>;
}

/// Hands out each character of [`CHAR_ALPHABET`] once.
///
/// Since a character is its own identity, the generator is exhausted after
/// 62 elements.
#[derive(Clone, Debug, Default)]
pub struct CharGenerator {
    count: usize,
}

impl CharGenerator {
    /// A generator positioned at the start of the alphabet.
    pub fn new() -> CharGenerator {
        return CharGenerator { count: 0 };
    }

    /// How many elements can still be produced.
    pub fn remaining(&self) -> usize {
        return CHAR_ALPHABET.len() - self.count;
    }
}

impl ElementGenerator<char> for CharGenerator {
    fn next_element(&mut self) -> Result<char> {
        let c = CHAR_ALPHABET
            .chars()
            .nth(self.count)
            .ok_or(Error::GeneratorExhausted { produced: self.count })?;
        self.count += 1;
        return Ok(c);
    }
}

/// Hands out [`Labeled`] elements with increasing ids.
///
/// Values cycle through [`CHAR_ALPHABET`], so values repeat while identities
/// never do.
#[derive(Clone, Debug, Default)]
pub struct LabeledGenerator {
    next_id: u64,
}

impl LabeledGenerator {
    /// A generator starting at id 0.
    pub fn new() -> LabeledGenerator {
        return LabeledGenerator { next_id: 0 };
    }
}

impl ElementGenerator<Labeled> for LabeledGenerator {
    fn next_element(&mut self) -> Result<Labeled> {
        let alphabet = CHAR_ALPHABET.as_bytes();
        let value = alphabet[(self.next_id % alphabet.len() as u64) as usize] as char;
        let element = Labeled {
            id: self.next_id,
            value,
        };
        self.next_id += 1;
        return Ok(element);
    }
}
