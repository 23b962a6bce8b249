//! Extraction metrics and reversible text edits.

use serde::{Deserialize, Serialize};

/// A reversible text splice: `removed` bytes at `offset` are replaced by
/// `inserted`. Within an edit list, each offset is expressed in the
/// coordinates of the text after all preceding edits in that list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub offset: u32,
    pub removed: String,
    pub inserted: String,
}

impl Edit {
    pub fn replace(offset: u32, removed: impl Into<String>, inserted: impl Into<String>) -> Self {
        Self {
            offset,
            removed: removed.into(),
            inserted: inserted.into(),
        }
    }

    pub fn insert(offset: u32, inserted: impl Into<String>) -> Self {
        Self::replace(offset, "", inserted)
    }

    /// The edit that undoes this one, in post-application coordinates.
    pub fn invert(&self) -> Edit {
        Edit {
            offset: self.offset,
            removed: self.inserted.clone(),
            inserted: self.removed.clone(),
        }
    }

    /// Splice the edit into `text`, verifying that the bytes being removed
    /// are the ones this edit was built against.
    pub fn apply_to(&self, text: &mut String) -> std::result::Result<(), String> {
        let start = self.offset as usize;
        let end = start + self.removed.len();
        if end > text.len() {
            return Err(format!(
                "edit range [{}, {}) exceeds text length {}",
                start,
                end,
                text.len()
            ));
        }
        if &text[start..end] != self.removed {
            return Err(format!(
                "text at offset {} does not match the bytes this edit removes",
                self.offset
            ));
        }
        text.replace_range(start..end, &self.inserted);
        Ok(())
    }
}

/// Everything the planner knows about extracting one byte range, as cached
/// by the oracle. Complexity fields use the accumulated values of the range;
/// the evaluator re-derives adjusted copies when extractions nest.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetrics {
    pub feasible: bool,
    /// Non-empty whenever `feasible` is false
    #[serde(default)]
    pub reason: String,
    /// True once the extraction has been performed on a text buffer
    #[serde(default)]
    pub applied: bool,
    pub extracted_loc: u32,
    pub param_count: u32,
    /// Accumulated cognitive complexity of the range, which is exactly what
    /// the enclosing method loses when the range is extracted
    pub reduction_of_cc: i64,
    /// Accumulated complexity minus accumulated nesting contributions
    pub inherent_component: i64,
    /// Nesting contributions re-based to the range's own depth
    pub nesting_component: i64,
    /// Number of contributors in the range with a nonzero nesting increment
    pub contributor_count: i64,
    /// Nesting depth of the range in the original method
    pub nesting: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<Edit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub undo_changes: Vec<Edit>,
}

impl ExtractionMetrics {
    pub fn infeasible(reason: impl Into<String>) -> Self {
        Self {
            feasible: false,
            reason: reason.into(),
            ..Self::default()
        }
    }

    /// Cognitive complexity the extracted method would have once the range
    /// sits at nesting depth zero.
    pub fn extracted_method_cc(&self) -> i64 {
        self.inherent_component + self.nesting_component
    }

    /// Merge two metrics: numeric fields sum, feasibility ANDs, edit lists
    /// concatenate. Used to aggregate a whole solution.
    pub fn join(&self, other: &ExtractionMetrics) -> ExtractionMetrics {
        let reason = match (self.reason.is_empty(), other.reason.is_empty()) {
            (true, _) => other.reason.clone(),
            (_, true) => self.reason.clone(),
            (false, false) => format!("{}; {}", self.reason, other.reason),
        };
        let mut changes = self.changes.clone();
        changes.extend(other.changes.iter().cloned());
        let mut undo_changes = self.undo_changes.clone();
        undo_changes.extend(other.undo_changes.iter().cloned());
        ExtractionMetrics {
            feasible: self.feasible && other.feasible,
            reason,
            applied: self.applied && other.applied,
            extracted_loc: self.extracted_loc + other.extracted_loc,
            param_count: self.param_count + other.param_count,
            reduction_of_cc: self.reduction_of_cc + other.reduction_of_cc,
            inherent_component: self.inherent_component + other.inherent_component,
            nesting_component: self.nesting_component + other.nesting_component,
            contributor_count: self.contributor_count + other.contributor_count,
            nesting: self.nesting + other.nesting,
            changes,
            undo_changes,
        }
    }
}

/// min/max/mean/total over one numeric metric.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub total: i64,
}

impl MetricSummary {
    pub fn from_values(values: &[i64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let total: i64 = values.iter().sum();
        Self {
            min: values.iter().copied().min().unwrap_or(0),
            max: values.iter().copied().max().unwrap_or(0),
            mean: total as f64 / values.len() as f64,
            total,
        }
    }
}

/// Distribution statistics over the per-extraction metrics of a solution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetricsStats {
    pub extracted_loc: MetricSummary,
    pub param_count: MetricSummary,
    pub reduction_of_cc: MetricSummary,
    pub extracted_method_cc: MetricSummary,
}

impl ExtractionMetricsStats {
    pub fn from_metrics(metrics: &[ExtractionMetrics]) -> Self {
        let collect = |f: &dyn Fn(&ExtractionMetrics) -> i64| -> Vec<i64> {
            metrics.iter().map(f).collect()
        };
        Self {
            extracted_loc: MetricSummary::from_values(&collect(&|m| m.extracted_loc as i64)),
            param_count: MetricSummary::from_values(&collect(&|m| m.param_count as i64)),
            reduction_of_cc: MetricSummary::from_values(&collect(&|m| m.reduction_of_cc)),
            extracted_method_cc: MetricSummary::from_values(
                &collect(&|m| m.extracted_method_cc()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_apply_and_invert_roundtrip() {
        let mut text = "int x = compute();".to_string();
        let edit = Edit::replace(8, "compute()", "42");
        edit.apply_to(&mut text).unwrap();
        assert_eq!(text, "int x = 42;");
        edit.invert().apply_to(&mut text).unwrap();
        assert_eq!(text, "int x = compute();");
    }

    #[test]
    fn test_edit_rejects_mismatched_removed_bytes() {
        let mut text = "abcdef".to_string();
        let edit = Edit::replace(1, "xyz", "q");
        assert!(edit.apply_to(&mut text).is_err());
        assert_eq!(text, "abcdef");
    }

    #[test]
    fn test_edit_rejects_out_of_bounds() {
        let mut text = "ab".to_string();
        let edit = Edit::replace(1, "bcd", "");
        assert!(edit.apply_to(&mut text).is_err());
    }

    #[test]
    fn test_join_sums_and_ands() {
        let a = ExtractionMetrics {
            feasible: true,
            extracted_loc: 4,
            param_count: 1,
            reduction_of_cc: 6,
            inherent_component: 3,
            nesting_component: 3,
            contributor_count: 2,
            nesting: 1,
            ..Default::default()
        };
        let b = ExtractionMetrics {
            feasible: true,
            extracted_loc: 2,
            param_count: 2,
            reduction_of_cc: 3,
            inherent_component: 2,
            nesting_component: 1,
            contributor_count: 1,
            nesting: 2,
            ..Default::default()
        };
        let joined = a.join(&b);
        assert!(joined.feasible);
        assert_eq!(joined.extracted_loc, 6);
        assert_eq!(joined.reduction_of_cc, 9);
        assert_eq!(joined.extracted_method_cc(), 9);
    }

    #[test]
    fn test_join_keeps_infeasible_reason() {
        let ok = ExtractionMetrics {
            feasible: true,
            ..Default::default()
        };
        let bad = ExtractionMetrics::infeasible("contains a return statement");
        let joined = ok.join(&bad);
        assert!(!joined.feasible);
        assert_eq!(joined.reason, "contains a return statement");
    }

    #[test]
    fn test_summary_from_values() {
        let s = MetricSummary::from_values(&[3, 1, 8]);
        assert_eq!(s.min, 1);
        assert_eq!(s.max, 8);
        assert_eq!(s.total, 12);
        assert!((s.mean - 4.0).abs() < f64::EPSILON);
    }
}
