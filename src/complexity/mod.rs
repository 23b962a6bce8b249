pub mod cognitive;

pub use cognitive::{annotate, Annotations, ComplexityAnnotation};
