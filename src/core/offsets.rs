//! Byte-offset ranges and offset tracking across sequential edits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open byte range `[a, b)` identifying a candidate extraction in the
/// original source text. Ordering is lexicographic on `(a, b)`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OffsetPair {
    pub a: u32,
    pub b: u32,
}

/// How two distinct ranges relate. For any two distinct pairs exactly one of
/// `Contains`, `ContainedBy`, `Overlaps`, `Disjoint` holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeRelation {
    Equal,
    Contains,
    ContainedBy,
    Overlaps,
    Disjoint,
}

impl OffsetPair {
    pub fn new(a: u32, b: u32) -> Self {
        debug_assert!(a < b, "offset pair must be non-empty");
        Self { a, b }
    }

    pub fn len(&self) -> u32 {
        self.b - self.a
    }

    pub fn is_empty(&self) -> bool {
        self.a >= self.b
    }

    /// True when `self` fully encloses `other` and the two are not equal.
    pub fn contains(&self, other: &OffsetPair) -> bool {
        *self != *other && self.a <= other.a && other.b <= self.b
    }

    pub fn contains_offset(&self, offset: u32) -> bool {
        self.a <= offset && offset < self.b
    }

    /// True when the ranges intersect but neither contains the other.
    pub fn overlaps(&self, other: &OffsetPair) -> bool {
        self.intersects(other) && !self.contains(other) && !other.contains(self) && self != other
    }

    pub fn intersects(&self, other: &OffsetPair) -> bool {
        self.a < other.b && other.a < self.b
    }

    pub fn relate(&self, other: &OffsetPair) -> RangeRelation {
        if self == other {
            RangeRelation::Equal
        } else if self.contains(other) {
            RangeRelation::Contains
        } else if other.contains(self) {
            RangeRelation::ContainedBy
        } else if self.intersects(other) {
            RangeRelation::Overlaps
        } else {
            RangeRelation::Disjoint
        }
    }
}

impl fmt::Display for OffsetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.a, self.b)
    }
}

/// Re-derives pending extraction ranges as edits land on the text.
///
/// Each applied edit replaces `removed` bytes at `at` with `inserted` bytes.
/// A pending range entirely after the edit shifts by the length delta, a
/// range straddling the edit grows or shrinks at its end, and a range
/// entirely before the edit is untouched.
#[derive(Debug, Clone)]
pub struct OffsetTracker {
    pending: Vec<OffsetPair>,
}

impl OffsetTracker {
    pub fn new(pairs: Vec<OffsetPair>) -> Self {
        Self { pending: pairs }
    }

    /// Current coordinates of the `index`-th tracked range.
    pub fn resolve(&self, index: usize) -> OffsetPair {
        self.pending[index]
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Record an edit that replaced `removed` bytes at `at` with `inserted`
    /// bytes, shifting every tracked range accordingly.
    pub fn shift_for_edit(&mut self, at: u32, removed: u32, inserted: u32) {
        let delta = inserted as i64 - removed as i64;
        if delta == 0 {
            return;
        }
        let edit_end = at + removed;
        for pair in &mut self.pending {
            if edit_end <= pair.a {
                pair.a = apply_delta(pair.a, delta);
                pair.b = apply_delta(pair.b, delta);
            } else if at >= pair.a && edit_end <= pair.b {
                pair.b = apply_delta(pair.b, delta);
            } else if at >= pair.b {
                // edit after the range, nothing moves
            } else {
                // straddling edits cannot come out of well nested extractions
                log::warn!(
                    "edit at {} (+{} -{}) straddles tracked range {}",
                    at,
                    inserted,
                    removed,
                    pair
                );
                pair.b = apply_delta(pair.b, delta);
            }
        }
    }
}

fn apply_delta(offset: u32, delta: i64) -> u32 {
    let shifted = offset as i64 + delta;
    debug_assert!(shifted >= 0, "edit shifted offset below zero");
    shifted.max(0) as u32
}
