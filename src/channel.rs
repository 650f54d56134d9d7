//! A replicated sequence as an editor host sees it.
//!
//! Each [`SequenceChannel`] is one site. Local edits are applied immediately
//! and returned as a [`WireOp`] for the host to broadcast. The host delivers
//! every operation, including the site's own, to every site in one total
//! order identified by sequence numbers. That order must be causal: an
//! operation is sequenced only after every operation its author had applied.
//! Ordering within the RGA comes from a Lamport [`Stamp`]. An insertion whose
//! neighbours have not arrived yet is rejected with
//! [`Error::MissingAnchor`], without consuming its sequence number.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crdt::Crdt;
use crate::crdt::effect::EffectElement;
use crate::crdt::rga::{self, RgaDoc, RgaOp};
use crate::error::{Error, Result};
use crate::sequence::{SequenceElement, UserOperation};

/// Causal order of an edit: a Lamport counter, ties broken by site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    /// Lamport counter.
    pub counter: u64,
    /// Originating site.
    pub site: u32,
}

/// An edit as it travels between sites.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireOp<E, I> {
    /// New content with its visible neighbours at the originating site.
    Insert {
        /// Stamp of the edit.
        stamp: Stamp,
        /// Effect elements, neighbours included.
        effect: Vec<(E, Stamp)>,
    },
    /// Identities to tombstone.
    Delete {
        /// Stamp of the edit.
        stamp: Stamp,
        /// The removed identities.
        deleted: Vec<I>,
    },
}

impl<E, I> WireOp<E, I> {
    /// Stamp of the edit.
    pub fn stamp(&self) -> Stamp {
        return match self {
            WireOp::Insert { stamp, .. } | WireOp::Delete { stamp, .. } => *stamp,
        };
    }
}

/// The wire operation type of a channel over `E`.
pub type ChannelOp<E> = WireOp<E, <E as SequenceElement>::Identity>;

/// Serializable state of a channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<E, I> {
    /// Every element ever inserted, with its stamp.
    pub effect_sequence: Vec<(E, Stamp)>,
    /// Tombstoned identities.
    pub deleted: Vec<I>,
    /// Lamport clock.
    pub clock: u64,
    /// Last applied sequence number.
    pub last_sequence_number: Option<u64>,
}

/// One site of a replicated sequence.
#[derive(Clone, Debug)]
pub struct SequenceChannel<E: SequenceElement> {
    site: u32,
    clock: u64,
    last_sequence_number: Option<u64>,
    document: RgaDoc<E, Stamp>,
}

impl<E: SequenceElement> SequenceChannel<E> {
    /// An empty channel for `site`. Sites sharing a document must have
    /// distinct ids.
    pub fn new(site: u32) -> SequenceChannel<E> {
        return SequenceChannel {
            site,
            clock: 0,
            last_sequence_number: None,
            document: RgaDoc::new(),
        };
    }

    /// This channel's site id.
    pub fn site(&self) -> u32 {
        return self.site;
    }

    /// The highest sequence number applied so far.
    pub fn last_sequence_number(&self) -> Option<u64> {
        return self.last_sequence_number;
    }

    /// The underlying document.
    pub fn document(&self) -> &RgaDoc<E, Stamp> {
        return &self.document;
    }

    /// The visible sequence.
    pub fn read(&self) -> Vec<E> {
        return self.document.read();
    }

    fn next_stamp(&mut self) -> Stamp {
        self.clock += 1;
        return Stamp {
            counter: self.clock,
            site: self.site,
        };
    }

    fn local(&mut self, user_op: &UserOperation<E>) -> Result<ChannelOp<E>> {
        let stamp = self.next_stamp();
        let op = rga::operation_from_user_op(user_op, &self.document, stamp)?;
        rga::apply_op(&mut self.document, &op)?;
        return Ok(match op {
            RgaOp::Insertion { document, .. } => WireOp::Insert {
                stamp,
                effect: document
                    .effect_sequence()
                    .iter()
                    .map(|e| (e.element.clone(), e.order))
                    .collect(),
            },
            RgaOp::Deletion { deleted } => WireOp::Delete { stamp, deleted },
        });
    }

    /// Insert `content` at visible `index`.
    pub fn insert(&mut self, index: usize, content: Vec<E>) -> Result<ChannelOp<E>> {
        return self.local(&UserOperation::insert(content, index));
    }

    /// Delete the visible range `start..end`.
    pub fn delete(&mut self, start: usize, end: usize) -> Result<ChannelOp<E>> {
        return self.local(&UserOperation::delete(start, end));
    }

    /// Apply an operation delivered by the host at `sequence_number`.
    ///
    /// Redelivered operations (sequence number not above the last applied
    /// one) are ignored. This site's own operations were applied when they
    /// were made and only advance the sequence number. A remote insertion
    /// whose neighbours are unknown here fails with
    /// [`Error::MissingAnchor`] and leaves the channel untouched. Returns
    /// whether the document changed.
    pub fn apply_remote(&mut self, op: &ChannelOp<E>, sequence_number: u64) -> Result<bool> {
        if self.last_sequence_number.is_some_and(|last| sequence_number <= last) {
            debug!(site = self.site, sequence_number, "ignoring redelivered op");
            return Ok(false);
        }
        let stamp = op.stamp();
        if stamp.site != self.site {
            if let WireOp::Insert { effect, .. } = op {
                self.check_anchors(stamp, effect)?;
            }
        }
        self.last_sequence_number = Some(sequence_number);
        self.clock = self.clock.max(stamp.counter);
        if stamp.site == self.site {
            return Ok(false);
        }

        match op {
            WireOp::Insert { effect, .. } => {
                let incoming = RgaDoc::from_parts(
                    effect
                        .iter()
                        .map(|(element, order)| EffectElement::new(element.clone(), *order))
                        .collect(),
                    [],
                );
                self.document.merge_in_place(&incoming)?;
            }
            WireOp::Delete { deleted, .. } => self.document.delete(deleted.iter().cloned()),
        }
        return Ok(true);
    }

    /// Every element of `effect` not inserted by this operation must already
    /// be in the document.
    fn check_anchors(&self, stamp: Stamp, effect: &[(E, Stamp)]) -> Result<()> {
        for (anchor, _) in effect.iter().filter(|(_, order)| *order != stamp) {
            let identity = anchor.identity();
            let known = self
                .document
                .effect_sequence()
                .iter()
                .any(|e| e.element.identity() == identity);
            if !known {
                return Err(Error::MissingAnchor {
                    element: anchor.describe(),
                });
            }
        }
        return Ok(());
    }

    /// Capture the channel state.
    pub fn snapshot(&self) -> Snapshot<E, E::Identity> {
        return Snapshot {
            effect_sequence: self
                .document
                .effect_sequence()
                .iter()
                .map(|e| (e.element.clone(), e.order))
                .collect(),
            deleted: self.document.deleted().iter().cloned().collect(),
            clock: self.clock,
            last_sequence_number: self.last_sequence_number,
        };
    }

    /// Rebuild a channel for `site` from a snapshot.
    pub fn restore(site: u32, snapshot: Snapshot<E, E::Identity>) -> SequenceChannel<E> {
        let effect_sequence = snapshot
            .effect_sequence
            .into_iter()
            .map(|(element, order)| EffectElement::new(element, order))
            .collect();
        return SequenceChannel {
            site,
            clock: snapshot.clock,
            last_sequence_number: snapshot.last_sequence_number,
            document: RgaDoc::from_parts(effect_sequence, snapshot.deleted),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(channel: &SequenceChannel<char>) -> String {
        return channel.read().into_iter().collect();
    }

    #[test]
    fn concurrent_edits_converge_after_delivery() {
        let mut a = SequenceChannel::new(1);
        let mut b = SequenceChannel::new(2);
        let op1 = a.insert(0, vec!['h', 'i']).unwrap();
        let op2 = b.insert(0, vec!['y', 'o']).unwrap();

        // The host sequences op1 then op2 and delivers both everywhere.
        for channel in [&mut a, &mut b] {
            channel.apply_remote(&op1, 1).unwrap();
            channel.apply_remote(&op2, 2).unwrap();
        }
        assert_eq!(text(&a), text(&b));
        assert_eq!(a.document(), b.document());

        let op3 = a.delete(0, 2).unwrap();
        for channel in [&mut a, &mut b] {
            channel.apply_remote(&op3, 3).unwrap();
        }
        assert_eq!(text(&a).len(), 2);
        assert_eq!(text(&a), text(&b));
    }

    #[test]
    fn clock_follows_remote_stamps() {
        let mut a = SequenceChannel::new(1);
        let mut b = SequenceChannel::new(2);
        let op1 = a.insert(0, vec!['a']).unwrap();
        b.apply_remote(&op1, 1).unwrap();
        let op2 = b.insert(1, vec!['b']).unwrap();
        assert!(op2.stamp() > op1.stamp());
    }

    #[test]
    fn redelivery_is_ignored() {
        let mut a = SequenceChannel::new(1);
        let mut b = SequenceChannel::new(2);
        let op = a.insert(0, vec!['x']).unwrap();
        assert!(b.apply_remote(&op, 4).unwrap());
        assert!(!b.apply_remote(&op, 4).unwrap());
        assert!(!b.apply_remote(&op, 3).unwrap());
        assert_eq!(text(&b), "x");
        assert_eq!(b.last_sequence_number(), Some(4));
    }

    #[test]
    fn causal_deliveries_converge_in_any_interleaving() {
        let mut a = SequenceChannel::new(1);
        let mut b = SequenceChannel::new(2);
        let mut c = SequenceChannel::new(3);
        let a1 = a.insert(0, vec!['a', 'b', 'c']).unwrap();
        b.apply_remote(&a1, 1).unwrap();
        c.apply_remote(&a1, 1).unwrap();
        let b1 = b.insert(1, vec!['x']).unwrap();
        let c1 = c.insert(1, vec!['y']).unwrap();
        let c2 = c.delete(2, 3).unwrap();
        a.apply_remote(&b1, 2).unwrap();
        let a2 = a.insert(2, vec!['z']).unwrap();

        // a2 observed b1, and c2 observed c1. Each host order below is causal.
        let orders = [
            vec![&b1, &c1, &c2, &a2],
            vec![&c1, &b1, &a2, &c2],
            vec![&c1, &c2, &b1, &a2],
        ];
        let mut reads = Vec::new();
        for order in orders {
            let mut observer = SequenceChannel::new(9);
            observer.apply_remote(&a1, 1).unwrap();
            for (i, op) in order.into_iter().enumerate() {
                observer.apply_remote(op, i as u64 + 2).unwrap();
            }
            reads.push(text(&observer));
        }
        assert_eq!(reads[0], reads[1]);
        assert_eq!(reads[0], reads[2]);
        assert_eq!(reads[0].len(), 5);
    }

    #[test]
    fn insertion_before_its_anchor_is_rejected() {
        let mut a = SequenceChannel::new(1);
        let mut b = SequenceChannel::new(2);
        let first = a.insert(0, vec!['a']).unwrap();
        let second = a.insert(1, vec!['b']).unwrap();

        assert_eq!(
            b.apply_remote(&second, 2),
            Err(Error::MissingAnchor {
                element: "a".to_string(),
            })
        );
        assert_eq!(text(&b), "");
        assert_eq!(b.last_sequence_number(), None);

        assert!(b.apply_remote(&first, 1).unwrap());
        assert!(b.apply_remote(&second, 2).unwrap());
        assert_eq!(text(&b), "ab");
        assert_eq!(b.document(), a.document());
    }

    #[test]
    fn snapshot_restores_document_and_clock() {
        let mut a = SequenceChannel::new(1);
        a.insert(0, vec!['a', 'b', 'c']).unwrap();
        a.delete(1, 2).unwrap();
        let json = serde_json::to_string(&a.snapshot()).unwrap();
        let snapshot: Snapshot<char, char> = serde_json::from_str(&json).unwrap();
        let mut restored = SequenceChannel::restore(1, snapshot);
        assert_eq!(text(&restored), "ac");
        assert_eq!(restored.document(), a.document());
        let op = restored.insert(0, vec!['z']).unwrap();
        assert_eq!(op.stamp().counter, 3);
    }
}
