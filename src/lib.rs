//! Interleave - merge algorithms for replicated sequences, checked against an
//! independent model of every legal outcome.
//!
//! The crate has three parts:
//!
//! - [`crdt::rga`]: the Replicated Growable Array, a sequence CRDT whose only
//!   mutation is a deterministic merge of effect sequences.
//! - [`got`]: the GOT control algorithm, which reorders an operation log by
//!   back-transposition and includes a new operation against the concurrent
//!   suffix.
//! - [`fuzz`]: a harness that drives any [`sequence::SequenceType`] through
//!   random causal histories and checks each merged document against the
//!   [`oracle::PartialEffectRelation`].
//!
//! # Quick Start
//!
//! ```
//! use interleave::sequence::UserOperation;
//! use interleave::state::TestDocumentStateFactory;
//! use interleave::crdt::rga::Rga;
//! use std::rc::Rc;
//!
//! let factory = TestDocumentStateFactory::new(Rc::new(Rga::<char, u64>::new()));
//! let empty = factory.empty_state();
//!
//! // Two sites insert concurrently into the same empty document.
//! let a = empty.with_user_operation(&UserOperation::insert(vec!['a'], 0), 0).unwrap();
//! let b = empty.with_user_operation(&UserOperation::insert(vec!['b'], 0), 1).unwrap();
//!
//! // The causally later insert sorts first, on both sides.
//! let merged = a.merge_with(&b).unwrap();
//! assert_eq!(merged.read(), vec!['b', 'a']);
//! ```

pub mod channel;
pub mod crdt;
pub mod digraph;
pub mod error;
pub mod fuzz;
pub mod got;
pub mod oracle;
pub mod random;
pub mod sequence;
pub mod state;

pub use error::{Error, Result};
