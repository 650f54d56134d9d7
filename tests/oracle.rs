//! Partial effect relation acceptance and rejection.

use interleave::oracle::{Anchor, PartialEffectRelation, Verification};
use interleave::sequence::Labeled;

// =============================================================================
// Test helpers
// =============================================================================

fn chars(s: &str) -> Vec<char> {
    return s.chars().collect();
}

fn accepts(relation: &PartialEffectRelation<char>, s: &str) -> bool {
    return relation.verify_sequence(&chars(s)).is_success();
}

// =============================================================================
// Insertion
// =============================================================================

#[test]
fn two_elements() {
    let mut relation = PartialEffectRelation::new();
    relation.insert_subsequence(&chars("a"), Anchor::Begin, Anchor::End).unwrap();
    relation.insert_subsequence(&chars("b"), Anchor::Element(&'a'), Anchor::End).unwrap();

    assert!(accepts(&relation, "ab"));
    for rejected in ["ba", "a", "b", ""] {
        assert!(!accepts(&relation, rejected), "accepted {rejected:?}");
    }
}

#[test]
fn three_elements_with_insertion_between() {
    let mut relation = PartialEffectRelation::new();
    relation.insert_subsequence(&chars("ac"), Anchor::Begin, Anchor::End).unwrap();
    relation
        .insert_subsequence(&chars("b"), Anchor::Element(&'a'), Anchor::Element(&'c'))
        .unwrap();

    assert!(accepts(&relation, "abc"));
    for rejected in ["acb", "bac", "bca", "cab", "cba"] {
        assert!(!accepts(&relation, rejected), "accepted {rejected:?}");
    }
}

#[test]
fn diamond_allows_either_interleaving() {
    let mut relation = PartialEffectRelation::new();
    relation.insert_subsequence(&chars("ad"), Anchor::Begin, Anchor::End).unwrap();
    relation
        .insert_subsequence(&chars("b"), Anchor::Element(&'a'), Anchor::Element(&'d'))
        .unwrap();
    relation
        .insert_subsequence(&chars("c"), Anchor::Element(&'a'), Anchor::Element(&'d'))
        .unwrap();

    assert!(accepts(&relation, "abcd"));
    assert!(accepts(&relation, "acbd"));
    for rejected in ["acd", "abd", "ad", "bacd", "abdc", "abc", "cbd"] {
        assert!(!accepts(&relation, rejected), "accepted {rejected:?}");
    }
}

// =============================================================================
// Deletion
// =============================================================================

#[test]
fn deleted_element_must_be_absent() {
    let mut relation = PartialEffectRelation::new();
    relation.insert_subsequence(&chars("abc"), Anchor::Begin, Anchor::End).unwrap();
    relation.delete_sequence_elements(&['b']);

    assert!(accepts(&relation, "ac"));
    assert!(!accepts(&relation, "abc"));
}

#[test]
fn deletions_inside_concurrent_runs() {
    let mut relation = PartialEffectRelation::new();
    relation.insert_subsequence(&chars("abcd"), Anchor::Begin, Anchor::End).unwrap();
    relation
        .insert_subsequence(&chars("stuv"), Anchor::Element(&'b'), Anchor::Element(&'c'))
        .unwrap();
    relation
        .insert_subsequence(&chars("wxyz"), Anchor::Element(&'b'), Anchor::Element(&'c'))
        .unwrap();
    relation.delete_sequence_elements(&chars("stu"));
    relation.delete_sequence_elements(&chars("z"));

    for accepted in ["abvwxycd", "abwvxycd", "abwxvycd", "abwxyvcd"] {
        assert!(accepts(&relation, accepted), "rejected {accepted:?}");
    }
    for rejected in ["abvwxyc", "abwxycd", "avbwxycd", "abwxycvd"] {
        assert!(!accepts(&relation, rejected), "accepted {rejected:?}");
    }
}

#[test]
fn deletion_by_identity() {
    let mut relation = PartialEffectRelation::new();
    relation.insert_subsequence(&chars("xyz"), Anchor::Begin, Anchor::End).unwrap();
    relation.delete_sequence_elements_by_identity(['x', 'z']);
    assert!(accepts(&relation, "y"));
    assert!(relation.is_deleted(&'x'));
    assert!(!relation.is_deleted(&'y'));
}

// =============================================================================
// Failure reasons
// =============================================================================

#[test]
fn premature_end_lists_every_candidate() {
    let mut relation = PartialEffectRelation::new();
    relation.insert_subsequence(&chars("ad"), Anchor::Begin, Anchor::End).unwrap();
    relation
        .insert_subsequence(&chars("b"), Anchor::Element(&'a'), Anchor::Element(&'d'))
        .unwrap();
    relation
        .insert_subsequence(&chars("c"), Anchor::Element(&'a'), Anchor::Element(&'d'))
        .unwrap();

    assert_eq!(
        relation.verify_sequence(&chars("a")),
        Verification::Failure {
            reason: "premature end of input sequence, expected to find one of {b, c}".to_string(),
        }
    );
    assert_eq!(
        relation.verify_sequence(&chars("ad")).reason(),
        Some("found 'd' in sequence where expected one of {b, c}")
    );
}

#[test]
fn labeled_elements_with_equal_values_are_distinct() {
    let first = Labeled { id: 1, value: 'a' };
    let second = Labeled { id: 2, value: 'a' };
    let mut relation = PartialEffectRelation::new();
    relation.insert_subsequence(&[first, second], Anchor::Begin, Anchor::End).unwrap();

    assert!(relation.verify_sequence(&[first, second]).is_success());
    assert_eq!(
        relation.verify_sequence(&[second, first]).reason(),
        Some("found 'a#2' in sequence where expected one of {a#1}")
    );
}
