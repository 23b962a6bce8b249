//! cogsaw — cognitive-complexity extraction planner.
//!
//! Annotates a method's syntax tree with SonarQube-style cognitive
//! complexity, enumerates extractable statement runs, and searches for a
//! minimal set of extract-method refactorings that brings every resulting
//! method under a threshold. Chosen extractions materialize as reversible
//! text edits.

pub mod apply;
pub mod candidates;
pub mod cli;
pub mod complexity;
pub mod config;
pub mod core;
pub mod errors;
pub mod graph;
pub mod io;
pub mod oracle;
pub mod planner;
pub mod search;
pub mod solution;
pub mod source_model;

pub use crate::core::{Edit, ExtractionMetrics, MethodTree, OffsetPair};
pub use crate::errors::{Error, Result};
pub use crate::planner::{EngineKind, MethodReport, Planner};
pub use crate::search::SearchOutcome;
pub use crate::solution::Solution;
