pub mod metrics;
pub mod offsets;
pub mod tree;

pub use metrics::{Edit, ExtractionMetrics, ExtractionMetricsStats, MetricSummary};
pub use offsets::{OffsetPair, OffsetTracker, RangeRelation};
pub use tree::{MethodTree, NodeData, NodeId, NodeKind, NodeRole, TreeBuilder};
