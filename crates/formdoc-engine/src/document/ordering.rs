use std::cmp::Ordering;
use std::collections::HashMap;

use crate::host::{Document, Position, TextId, TextRange};

/// Result of comparing two anchors in the text flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorOrdering {
    Less,
    Equal,
    Greater,
    /// The anchors live in different texts (or one of them is gone).
    Indeterminate,
}

impl From<Option<Ordering>> for AnchorOrdering {
    fn from(ord: Option<Ordering>) -> Self {
        match ord {
            Some(Ordering::Less) => AnchorOrdering::Less,
            Some(Ordering::Equal) => AnchorOrdering::Equal,
            Some(Ordering::Greater) => AnchorOrdering::Greater,
            None => AnchorOrdering::Indeterminate,
        }
    }
}

pub fn compare_positions(a: &Position, b: &Position) -> AnchorOrdering {
    a.partial_cmp(b).into()
}

/// Relation between two ranges A and B, named after the layout of the flow:
/// `A` is covered by a only, `B` by b only, `8` by both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRelation {
    /// `BBAA`: b lies completely before a.
    BBeforeA,
    /// `BB88`: a is a tail of b.
    ATailOfB,
    /// `B88B`: a lies strictly inside b.
    AInsideB,
    /// `88AA`: b is a head of a.
    BHeadOfA,
    /// `8888`: identical ranges.
    Identical,
    /// `88BB`: a is a head of b.
    AHeadOfB,
    /// `A88A`: b lies strictly inside a.
    BInsideA,
    /// `AA88`: b is a tail of a.
    BTailOfA,
    /// `AABB`: a lies completely before b.
    ABeforeB,
    Incomparable,
}

impl RangeRelation {
    pub fn of(a: &TextRange, b: &TextRange) -> Self {
        let (Some(start), Some(end)) = (
            a.start.partial_cmp(&b.start),
            a.end.partial_cmp(&b.end),
        ) else {
            return RangeRelation::Incomparable;
        };
        match (start, end) {
            (Ordering::Greater, Ordering::Greater) => RangeRelation::BBeforeA,
            (Ordering::Greater, Ordering::Equal) => RangeRelation::ATailOfB,
            (Ordering::Greater, Ordering::Less) => RangeRelation::AInsideB,
            (Ordering::Equal, Ordering::Greater) => RangeRelation::BHeadOfA,
            (Ordering::Equal, Ordering::Equal) => RangeRelation::Identical,
            (Ordering::Equal, Ordering::Less) => RangeRelation::AHeadOfB,
            (Ordering::Less, Ordering::Greater) => RangeRelation::BInsideA,
            (Ordering::Less, Ordering::Equal) => RangeRelation::BTailOfA,
            (Ordering::Less, Ordering::Less) => RangeRelation::ABeforeB,
        }
    }

    pub fn is_b_child_of_a(self) -> bool {
        matches!(
            self,
            RangeRelation::BHeadOfA | RangeRelation::BInsideA | RangeRelation::BTailOfA
        )
    }

    pub fn is_a_child_of_b(self) -> bool {
        matches!(
            self,
            RangeRelation::AHeadOfB | RangeRelation::AInsideB | RangeRelation::ATailOfB
        )
    }

    /// Tree order: siblings by position, a parent before its children.
    pub fn tree_ordering(self) -> AnchorOrdering {
        match self {
            RangeRelation::Identical => AnchorOrdering::Equal,
            RangeRelation::ABeforeB => AnchorOrdering::Less,
            RangeRelation::BBeforeA => AnchorOrdering::Greater,
            r if r.is_b_child_of_a() => AnchorOrdering::Less,
            r if r.is_a_child_of_b() => AnchorOrdering::Greater,
            _ => AnchorOrdering::Indeterminate,
        }
    }
}

/// Stable sort by anchor position in the flow of `doc`.
///
/// Paragraphs are ranked as [`Document::paragraphs_in_flow_order`] visits
/// them, so a table cell sorts between the paragraphs around its table.
/// Items without an anchor, or anchored outside the flow, go last.
pub fn sort_in_document_order<T, F>(doc: &Document, items: &mut Vec<T>, anchor: F)
where
    F: Fn(&T) -> Option<Position>,
{
    let ranks: HashMap<(TextId, usize), usize> = doc
        .paragraphs_in_flow_order()
        .into_iter()
        .enumerate()
        .map(|(rank, paragraph)| (paragraph, rank))
        .collect();
    let mut keyed: Vec<((bool, usize, usize), T)> = items
        .drain(..)
        .map(|item| {
            let key = anchor(&item)
                .and_then(|pos| Some((false, *ranks.get(&(pos.text, pos.block))?, pos.offset)))
                .unwrap_or((true, 0, 0));
            (key, item)
        })
        .collect();
    keyed.sort_by_key(|(key, _)| *key);
    items.extend(keyed.into_iter().map(|(_, item)| item));
}
