//! Applying a solution to source text as reversible edits.
//!
//! Extractions are performed rightmost-first so that the text to the left of
//! every pending range is still untouched when its turn comes; an
//! [`OffsetTracker`] re-bases the remaining ranges as each splice lands. The
//! range is re-validated against the current text before every step, since
//! an inner extraction replaces part of an outer range with a call. Failure
//! at any step rolls the text all the way back before the error surfaces.

use crate::core::metrics::{Edit, ExtractionMetrics};
use crate::core::offsets::{OffsetPair, OffsetTracker};
use crate::core::tree::MethodTree;
use crate::errors::{Error, Result};
use crate::solution::Solution;
use crate::source_model::SourceModel;

/// One extraction as it landed in the text.
#[derive(Clone, Debug)]
pub struct AppliedExtraction {
    pub name: String,
    /// coordinates in the original text
    pub range: OffsetPair,
    pub metrics: ExtractionMetrics,
}

/// A fully applied solution: the rewritten text plus everything needed to
/// reverse it.
#[derive(Clone, Debug)]
pub struct AppliedSolution {
    pub text: String,
    pub extractions: Vec<AppliedExtraction>,
    /// per extraction, in application order
    undo_stacks: Vec<Vec<Edit>>,
}

impl AppliedSolution {
    /// Reconstruct the pre-application text by replaying the undo edits,
    /// last extraction first.
    pub fn undo(&self) -> Result<String> {
        let mut text = self.text.clone();
        for (step, stack) in self.undo_stacks.iter().enumerate().rev() {
            for edit in stack {
                edit.apply_to(&mut text).map_err(|message| Error::Apply {
                    index: step,
                    message,
                })?;
            }
        }
        Ok(text)
    }

    pub fn len(&self) -> usize {
        self.extractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractions.is_empty()
    }
}

/// Perform every extraction of `solution` on the method's source text.
///
/// Extracted methods are named after the enclosing method with an
/// `Extracted<k>` suffix, numbered by ascending position in the original
/// text regardless of application order.
pub fn apply_solution<M: SourceModel>(
    model: &mut M,
    tree: &MethodTree,
    solution: &Solution,
) -> Result<AppliedSolution> {
    if !solution.feasible {
        return Err(Error::Apply {
            index: 0,
            message: format!("solution is infeasible: {}", solution.metrics.reason),
        });
    }
    let ascending = solution.offset_pairs();
    let names: Vec<String> = (0..ascending.len())
        .map(|k| format!("{}Extracted{}", tree.method_name(), k))
        .collect();

    // rightmost range first; for a shared start the inner one goes first
    let mut order: Vec<usize> = (0..ascending.len()).collect();
    order.sort_by_key(|&i| (std::cmp::Reverse(ascending[i].a), ascending[i].b));

    let mut tracker = OffsetTracker::new(ascending.clone());
    let mut text = tree.source().to_string();
    let mut undo_stacks: Vec<Vec<Edit>> = Vec::new();
    let mut extractions: Vec<AppliedExtraction> = Vec::new();

    for (step, &i) in order.iter().enumerate() {
        let range = tracker.resolve(i);
        match apply_one(model, &mut text, &mut tracker, range, &names[i]) {
            Ok(metrics) => {
                undo_stacks.push(metrics.undo_changes.clone());
                extractions.push(AppliedExtraction {
                    name: names[i].clone(),
                    range: ascending[i],
                    metrics,
                });
            }
            Err(message) => {
                roll_back(&mut text, &mut undo_stacks, step)?;
                return Err(Error::Apply {
                    index: step,
                    message,
                });
            }
        }
    }

    if model.has_compile_errors(&text) {
        let step = order.len();
        roll_back(&mut text, &mut undo_stacks, step)?;
        return Err(Error::Apply {
            index: step,
            message: "applied text no longer parses".to_string(),
        });
    }

    extractions.sort_by_key(|e| e.range);
    Ok(AppliedSolution {
        text,
        extractions,
        undo_stacks,
    })
}

/// One extraction: rebuild the edits against the current text, splice them
/// in, and shift every tracked range. A failure mid-splice reverts the edits
/// of this step before reporting, so the caller only rolls back whole steps.
fn apply_one<M: SourceModel>(
    model: &mut M,
    text: &mut String,
    tracker: &mut OffsetTracker,
    range: OffsetPair,
    name: &str,
) -> std::result::Result<ExtractionMetrics, String> {
    let mut metrics = model
        .apply_extract(text, range, name)
        .map_err(|e| e.to_string())?;

    let mut landed: Vec<Edit> = Vec::new();
    for edit in &metrics.changes {
        if let Err(message) = edit.apply_to(text) {
            for done in landed.iter().rev() {
                if let Err(revert) = done.invert().apply_to(text) {
                    return Err(format!(
                        "{}; partial revert also failed: {}",
                        message, revert
                    ));
                }
            }
            return Err(message);
        }
        tracker.shift_for_edit(
            edit.offset,
            edit.removed.len() as u32,
            edit.inserted.len() as u32,
        );
        landed.push(edit.clone());
    }
    metrics.applied = true;
    Ok(metrics)
}

/// Undo every completed step, newest first.
fn roll_back(
    text: &mut String,
    undo_stacks: &mut Vec<Vec<Edit>>,
    failed_step: usize,
) -> Result<()> {
    while let Some(stack) = undo_stacks.pop() {
        for edit in &stack {
            edit.apply_to(text).map_err(|message| Error::Apply {
                index: failed_step,
                message: format!("rollback failed: {}", message),
            })?;
        }
    }
    Ok(())
}
