//! Consecutive-run enumeration within one candidate block.
//!
//! For a block of `n` sibling statements there are `n(n+1)/2` contiguous
//! runs. The iterator walks them in one of two orders and skips any run
//! whose accumulated complexity is zero, using a precomputed "next index
//! with nonzero complexity" table. It is a plain pull iterator over explicit
//! indices; the backtracking driver composes one per block.

use crate::candidates::Sequence;
use crate::complexity::Annotations;
use serde::{Deserialize, Serialize};

/// Traversal order over run lengths. Longest-first finds big merged
/// extractions early; shortest-first finds minimal ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOrder {
    #[default]
    LongestFirst,
    ShortestFirst,
}

/// Yields `(from, to)` inclusive member-index pairs of one block.
#[derive(Clone, Debug)]
pub struct ConsecutiveRuns {
    /// next_nonzero[i] = first index >= i whose member has nonzero CC
    next_nonzero: Vec<usize>,
    len: usize,
    order: RunOrder,
    span: usize,
    from: usize,
    exhausted: bool,
}

impl ConsecutiveRuns {
    pub fn new(block: &Sequence, notes: &Annotations, order: RunOrder) -> Self {
        let len = block.len();
        let mut next_nonzero = vec![len; len + 1];
        for i in (0..len).rev() {
            next_nonzero[i] = if notes.get(block.nodes()[i]).accumulated_complexity > 0 {
                i
            } else {
                next_nonzero[i + 1]
            };
        }
        let span = match order {
            RunOrder::LongestFirst => len,
            RunOrder::ShortestFirst => 1,
        };
        Self {
            next_nonzero,
            len,
            order,
            span,
            from: 0,
            exhausted: len == 0,
        }
    }

    fn has_complexity(&self, from: usize, to: usize) -> bool {
        self.next_nonzero[from] <= to
    }

    fn advance(&mut self) {
        self.from += 1;
        if self.from + self.span > self.len {
            self.from = 0;
            match self.order {
                RunOrder::LongestFirst => {
                    if self.span == 1 {
                        self.exhausted = true;
                    } else {
                        self.span -= 1;
                    }
                }
                RunOrder::ShortestFirst => {
                    if self.span == self.len {
                        self.exhausted = true;
                    } else {
                        self.span += 1;
                    }
                }
            }
        }
    }
}

impl Iterator for ConsecutiveRuns {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        while !self.exhausted {
            let (from, to) = (self.from, self.from + self.span - 1);
            self.advance();
            if self.has_complexity(from, to) {
                return Some((from, to));
            }
        }
        None
    }
}
