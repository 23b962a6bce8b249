//! Containment and conflict graphs over feasible extractions.
//!
//! Vertices are the oracle's feasible offset pairs. A directed edge runs
//! from a contained range to the range enclosing it (the inner extraction
//! collapses into a call inside the outer one); overlapping ranges that
//! neither contains the other go into a separate undirected conflict graph,
//! since at most one of them can be extracted. After attaching the method
//! body as the root, the containment DAG is transitively reduced, and
//! vertices whose complexity reduction equals a contained child's are
//! dropped: the larger region buys nothing the smaller one doesn't.

use crate::core::metrics::ExtractionMetrics;
use crate::core::offsets::{OffsetPair, RangeRelation};
use crate::errors::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::cmp::Ordering;
use std::collections::HashSet;

/// One feasible extraction as the search engines see it. Identity is the
/// offset pair alone; the complexity fields are payload.
#[derive(Clone, Copy, Debug)]
pub struct ExtractionVertex {
    pub offsets: OffsetPair,
    pub reduction_of_cc: i64,
    pub inherent_component: i64,
    pub nesting_component: i64,
    pub contributor_count: i64,
    pub nesting: i64,
}

impl ExtractionVertex {
    pub fn from_metrics(offsets: OffsetPair, m: &ExtractionMetrics) -> Self {
        Self {
            offsets,
            reduction_of_cc: m.reduction_of_cc,
            inherent_component: m.inherent_component,
            nesting_component: m.nesting_component,
            contributor_count: m.contributor_count,
            nesting: m.nesting,
        }
    }

    /// CC of the method this vertex would become at nesting depth zero.
    pub fn extracted_method_cc(&self) -> i64 {
        self.inherent_component + self.nesting_component
    }
}

impl PartialEq for ExtractionVertex {
    fn eq(&self, other: &Self) -> bool {
        self.offsets == other.offsets
    }
}

impl Eq for ExtractionVertex {}

impl std::hash::Hash for ExtractionVertex {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.offsets.hash(state);
    }
}

impl PartialOrd for ExtractionVertex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExtractionVertex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.offsets.cmp(&other.offsets)
    }
}

/// Reduced containment DAG plus the conflict graph over the same vertices.
#[derive(Debug)]
pub struct ExtractionGraph {
    dag: DiGraph<ExtractionVertex, ()>,
    conflicts: UnGraph<OffsetPair, ()>,
    root: NodeIndex,
}

impl ExtractionGraph {
    /// Build from the oracle's feasible entries. `root` is the method-body
    /// run; it joins the vertex set if no entry already covers it.
    pub fn build(
        entries: &[(OffsetPair, ExtractionMetrics)],
        root: ExtractionVertex,
    ) -> Result<ExtractionGraph> {
        let mut vertices: Vec<ExtractionVertex> = entries
            .iter()
            .map(|(p, m)| ExtractionVertex::from_metrics(*p, m))
            .collect();
        if !vertices.contains(&root) {
            vertices.push(root);
        }
        vertices.sort();
        vertices.dedup();

        // removal invalidates indices, so reduction passes rebuild from the
        // vertex list until no vertex is removable
        loop {
            let graph = assemble(&vertices, root.offsets)?;
            match graph.removable_equal_reduction() {
                Some(victim) => {
                    log::debug!(
                        "graph reduction drops {} (same reduction as a contained child)",
                        victim
                    );
                    vertices.retain(|v| v.offsets != victim);
                }
                None => return Ok(graph),
            }
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn dag(&self) -> &DiGraph<ExtractionVertex, ()> {
        &self.dag
    }

    pub fn vertex(&self, index: NodeIndex) -> &ExtractionVertex {
        &self.dag[index]
    }

    /// All vertices in offset order, paired with their indices.
    pub fn vertices(&self) -> Vec<(NodeIndex, ExtractionVertex)> {
        let mut all: Vec<_> = self
            .dag
            .node_indices()
            .map(|i| (i, self.dag[i]))
            .collect();
        all.sort_by_key(|(_, v)| v.offsets);
        all
    }

    pub fn len(&self) -> usize {
        self.dag.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.dag.node_count() == 0
    }

    /// Mutually exclusive vertex pairs, by offsets.
    pub fn conflicting_pairs(&self) -> Vec<(OffsetPair, OffsetPair)> {
        self.conflicts
            .edge_references()
            .map(|e| (self.conflicts[e.source()], self.conflicts[e.target()]))
            .collect()
    }

    /// Whether `inner` can reach `outer` through containment edges.
    pub fn reaches(&self, inner: NodeIndex, outer: NodeIndex) -> bool {
        reachable(&self.dag, inner, outer, None)
    }

    /// A non-root vertex whose reduction equals one of its immediate
    /// contained children's. Extracting the child yields the same benefit
    /// with a smaller extracted method, so the larger vertex goes.
    fn removable_equal_reduction(&self) -> Option<OffsetPair> {
        for v in self.dag.node_indices() {
            if v == self.root {
                continue;
            }
            let matched = self
                .dag
                .neighbors_directed(v, Direction::Incoming)
                .any(|child| self.dag[child].reduction_of_cc == self.dag[v].reduction_of_cc);
            if matched {
                return Some(self.dag[v].offsets);
            }
        }
        None
    }
}

/// One construction pass: all containment edges, root attachment, sink
/// validation, transitive reduction, and the conflict graph.
fn assemble(vertices: &[ExtractionVertex], root_offsets: OffsetPair) -> Result<ExtractionGraph> {
    let mut dag: DiGraph<ExtractionVertex, ()> = DiGraph::new();
    let mut conflicts: UnGraph<OffsetPair, ()> = UnGraph::new_undirected();
    let indices: Vec<NodeIndex> = vertices.iter().map(|v| dag.add_node(*v)).collect();
    for v in vertices {
        conflicts.add_node(v.offsets);
    }

    for (i, p) in vertices.iter().enumerate() {
        for (j, q) in vertices.iter().enumerate().skip(i + 1) {
            match p.offsets.relate(&q.offsets) {
                RangeRelation::ContainedBy => {
                    dag.add_edge(indices[i], indices[j], ());
                }
                RangeRelation::Contains => {
                    dag.add_edge(indices[j], indices[i], ());
                }
                RangeRelation::Overlaps => {
                    conflicts.add_edge(NodeIndex::new(i), NodeIndex::new(j), ());
                }
                RangeRelation::Disjoint | RangeRelation::Equal => {}
            }
        }
    }

    let root = vertices
        .iter()
        .position(|v| v.offsets == root_offsets)
        .map(|i| indices[i])
        .ok_or_else(|| Error::model("method body vertex missing from the extraction graph"))?;

    // every orphaned sink collapses into the method body
    for &idx in &indices {
        if idx != root && dag.neighbors_directed(idx, Direction::Outgoing).count() == 0 {
            dag.add_edge(idx, root, ());
        }
    }
    let sinks: Vec<NodeIndex> = dag
        .node_indices()
        .filter(|&i| dag.neighbors_directed(i, Direction::Outgoing).count() == 0)
        .collect();
    if sinks != vec![root] {
        return Err(Error::model(format!(
            "containment graph has {} sink vertices, expected the method body alone",
            sinks.len()
        )));
    }

    transitive_reduction(&mut dag);
    Ok(ExtractionGraph {
        dag,
        conflicts,
        root,
    })
}

/// Remove every edge implied by a longer path.
fn transitive_reduction(dag: &mut DiGraph<ExtractionVertex, ()>) {
    let edges: Vec<(NodeIndex, NodeIndex)> = dag
        .edge_references()
        .map(|e| (e.source(), e.target()))
        .collect();
    for (u, v) in edges {
        if let Some(edge) = dag.find_edge(u, v) {
            if reachable(dag, u, v, Some(edge)) {
                dag.remove_edge(edge);
            }
        }
    }
}

/// DFS reachability from `from` to `to`, optionally ignoring one edge.
fn reachable(
    dag: &DiGraph<ExtractionVertex, ()>,
    from: NodeIndex,
    to: NodeIndex,
    skip_edge: Option<petgraph::graph::EdgeIndex>,
) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(n) = stack.pop() {
        for e in dag.edges_directed(n, Direction::Outgoing) {
            if Some(e.id()) == skip_edge && e.source() == from {
                continue;
            }
            let next = e.target();
            if next == to {
                return true;
            }
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }
    false
}
