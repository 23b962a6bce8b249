//! The source model boundary: parsing, feasibility probes, and the
//! extract-method text engine.
//!
//! The planner itself never touches concrete syntax. Everything it needs from
//! a language lives behind [`SourceModel`]; the bundled Java implementation
//! is in [`java`]. Another language plugs in by implementing the same trait.

pub mod java;

use crate::core::metrics::ExtractionMetrics;
use crate::core::offsets::OffsetPair;
use crate::core::tree::MethodTree;
use crate::errors::Result;

pub use java::JavaSourceModel;

/// Capability contract the planner requires from a language front end.
pub trait SourceModel {
    /// Parse every method in `source` into an arena tree, in document order.
    fn parse_all(&mut self, source: &str) -> Result<Vec<MethodTree>>;

    /// Would extracting `[range.a, range.b)` of `source` into a new method be
    /// legal, and what would it cost? Purely simulated: the source is never
    /// modified. An illegal range comes back as an infeasible metrics record
    /// with a non-empty reason, never as an error.
    fn check_extract(&mut self, source: &str, range: OffsetPair) -> ExtractionMetrics;

    /// Build the edits that extract `range` into a method called `new_name`:
    /// a call replacing the range plus the new method after the enclosing
    /// one. Returns forward and undo edit lists; the text itself is left to
    /// the caller to splice. Fails when the range is no longer extractable
    /// in the given text.
    fn apply_extract(
        &mut self,
        source: &str,
        range: OffsetPair,
        new_name: &str,
    ) -> Result<ExtractionMetrics>;

    /// Whether `source` parses with syntax errors.
    fn has_compile_errors(&mut self, source: &str) -> bool;
}
