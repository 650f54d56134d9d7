//! Model-based fuzzing of sequence implementations.
//!
//! A scenario is a random causal DAG over a fixed number of operation
//! slots. Slots are filled in index order. For each slot the harness merges
//! the states of its immediate causal predecessors, checks the merged
//! sequence against a [`PartialEffectRelation`] built from every causally
//! preceding edit, then makes a random edit against that sequence. After the
//! last slot the states of all DAG heads are merged and checked once more.
//!
//! The oracle only ever sees user-level edits (index and content against a
//! visible sequence), never the implementation's operations, so it is an
//! independent model of what the merged document may look like.

mod config;

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::crdt::rga::Rga;
use crate::digraph::{Digraph, random_minimum_digraph_from_sequence};
use crate::error::{Error, Result};
use crate::got::rga_ot::RgaOt;
use crate::oracle::{Anchor, PartialEffectRelation, Verification};
use crate::random::Random;
use crate::sequence::{
    CharGenerator, ElementGenerator, LabeledGenerator, SequenceElement, SequenceType, UserOperation,
};
use crate::state::{TestDocumentState, TestDocumentStateFactory};

pub use config::{FuzzConfig, Implementation};

/// One failed scenario.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzFailure {
    /// Index of the scenario within the run.
    pub run: usize,
    /// Seed string that replays the scenario as the first of a run.
    pub seed: String,
    /// Oracle failure reason or invariant violation.
    pub reason: String,
}

/// Outcome of [`run_iterated`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzReport {
    /// Scenarios executed.
    pub runs: usize,
    /// Scenarios that failed.
    pub failures: Vec<FuzzFailure>,
}

impl FuzzReport {
    /// Whether every scenario passed.
    pub fn is_success(&self) -> bool {
        return self.failures.is_empty();
    }
}

/// What the harness remembers about a filled slot.
struct OpInfo<S: SequenceType> {
    user_op: UserOperation<S::Element>,
    sequence_applied_to: Vec<S::Element>,
    state: TestDocumentState<S>,
}

/// The merged state of a set of heads and its verdict against the oracle.
struct Checked<S: SequenceType> {
    state: TestDocumentState<S>,
    sequence: Vec<S::Element>,
    verification: Verification,
}

/// Record a user edit, made against `document`, in the oracle.
pub fn apply_user_op_to_relation<E: SequenceElement>(
    user_op: &UserOperation<E>,
    document: &[E],
    relation: &mut PartialEffectRelation<E>,
) -> Result<()> {
    let len = document.len();
    match user_op {
        UserOperation::Insert { content, index } => {
            let index = *index;
            if index > len {
                return Err(Error::IndexOutOfRange { index, len });
            }
            let before = if index == 0 {
                Anchor::Begin
            } else {
                Anchor::Element(&document[index - 1])
            };
            let after = if index == len {
                Anchor::End
            } else {
                Anchor::Element(&document[index])
            };
            relation.insert_subsequence(content, before, after)?;
        }
        UserOperation::Delete { start, end } => {
            if *end > len || start > end {
                return Err(Error::IndexOutOfRange { index: *end, len });
            }
            relation.delete_sequence_elements(&document[*start..*end]);
        }
    }
    return Ok(());
}

/// A random edit against `document`.
///
/// On a non-empty document, deletes a random non-empty range with
/// probability `config.delete_probability`. Otherwise inserts
/// `config.insert_len` fresh elements at a random index.
pub fn create_random_user_operation<E>(
    document: &[E],
    generator: &mut impl ElementGenerator<E>,
    random: &mut Random,
    config: &FuzzConfig,
) -> Result<UserOperation<E>> {
    if !document.is_empty() && random.double() < config.delete_probability {
        let i1 = random.integer(document.len() + 1);
        let mut i2 = random.integer(document.len() + 1);
        while i1 == i2 {
            i2 = random.integer(document.len() + 1);
        }
        return Ok(UserOperation::delete(i1.min(i2), i1.max(i2)));
    }
    let content = (0..config.insert_len)
        .map(|_| generator.next_element())
        .collect::<Result<Vec<E>>>()?;
    return Ok(UserOperation::insert(content, random.integer(document.len() + 1)));
}

/// Merge the states of `heads` and check the result against an oracle fed
/// with the edits of `slots`.
fn verify_slots<S: SequenceType>(
    factory: &TestDocumentStateFactory<S>,
    infos: &[Option<OpInfo<S>>],
    slots: &[usize],
    heads: &[usize],
) -> Result<Checked<S>> {
    let mut state = factory.empty_state();
    for &head in heads {
        let info = infos[head].as_ref().ok_or(Error::MissingOperation { slot: head })?;
        state = state.merge_with(&info.state)?;
    }

    let mut relation = PartialEffectRelation::new();
    for &slot in slots {
        let info = infos[slot].as_ref().ok_or(Error::MissingOperation { slot })?;
        apply_user_op_to_relation(&info.user_op, &info.sequence_applied_to, &mut relation)?;
    }

    let sequence = state.read();
    let verification = relation.verify_sequence(&sequence);
    return Ok(Checked {
        state,
        sequence,
        verification,
    });
}

/// Slots `j < slot` that causally precede `slot`.
fn causal_past(causality: &Digraph<usize>, slot: usize) -> Vec<usize> {
    return (0..slot)
        .filter(|j| causality.successors(j).any(|&n| n == slot))
        .collect();
}

/// Run one scenario.
///
/// Returns the first oracle failure, or success once the final merge of
/// every head passes. Invariant violations, including convergence failures,
/// are returned as errors.
pub fn generate_ops_and_test<S, G>(
    implementation: &Rc<S>,
    generator: &mut G,
    random: &mut Random,
    config: &FuzzConfig,
) -> Result<Verification>
where
    S: SequenceType<Order = u64>,
    G: ElementGenerator<S::Element>,
{
    let slots: Vec<usize> = (0..config.slots).collect();
    let causality = random_minimum_digraph_from_sequence(&slots, random)?;
    let factory = TestDocumentStateFactory::new(Rc::clone(implementation));
    let mut infos: Vec<Option<OpInfo<S>>> = slots.iter().map(|_| None).collect();

    for &slot in &slots {
        let preceding = causal_past(&causality, slot);
        let mut heads: Vec<usize> = causality.immediate_predecessors(&slot).copied().collect();
        heads.sort_unstable();

        let checked = verify_slots(&factory, &infos, &preceding, &heads)?;
        if !checked.verification.is_success() {
            return Ok(checked.verification);
        }

        let user_op = create_random_user_operation(&checked.sequence, generator, random, config)?;
        debug!(slot, preceding = preceding.len(), ?user_op, "filled slot");
        let state = checked.state.with_user_operation(&user_op, slot as u64)?;
        infos[slot] = Some(OpInfo {
            user_op,
            sequence_applied_to: checked.sequence,
            state,
        });
    }

    let heads = causality.nodes_with_outdegree_zero();
    let checked = verify_slots(&factory, &infos, &slots, &heads)?;
    return Ok(checked.verification);
}

/// Run `config.iterations` scenarios from one random stream.
///
/// A fresh generator is created per scenario. Each failure records the
/// seed captured just before its scenario started, so passing that seed
/// back in replays the failing scenario first.
pub fn run_iterated<S, G>(
    implementation: Rc<S>,
    new_generator: impl Fn() -> G,
    config: &FuzzConfig,
) -> Result<FuzzReport>
where
    S: SequenceType<Order = u64>,
    G: ElementGenerator<S::Element>,
{
    let mut random = match &config.seed {
        Some(seed) => Random::from_seed_str(seed)?,
        None => Random::new(),
    };

    let mut report = FuzzReport::default();
    for run in 0..config.iterations {
        let seed = random.seed();
        let mut generator = new_generator();
        let reason = match generate_ops_and_test(&implementation, &mut generator, &mut random, config) {
            Ok(Verification::Success) => None,
            Ok(Verification::Failure { reason }) => Some(reason),
            Err(error) => Some(format!("uncaught error: {error}")),
        };
        report.runs += 1;
        match reason {
            Some(reason) => {
                warn!(run, %seed, %reason, "fuzz run failed");
                report.failures.push(FuzzFailure { run, seed, reason });
            }
            None => trace!(run, "fuzz run passed"),
        }
    }

    info!(
        runs = report.runs,
        failures = report.failures.len(),
        "fuzz runs completed"
    );
    return Ok(report);
}

/// Run the implementation named by `config.implementation`.
pub fn run_configured(config: &FuzzConfig) -> Result<FuzzReport> {
    return match config.implementation {
        Implementation::Rga => run_iterated(Rc::new(Rga::<char, u64>::new()), CharGenerator::new, config),
        Implementation::RgaOt => run_iterated(Rc::new(RgaOt::<char, u64>::new()), CharGenerator::new, config),
        Implementation::Labeled => {
            run_iterated(Rc::new(Rga::<_, u64>::new()), LabeledGenerator::new, config)
        }
    };
}
