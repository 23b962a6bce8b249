//! Candidate statement sequences for extraction.
//!
//! A [`Sequence`] is a non-empty run of consecutive sibling statements. The
//! selector walks the method tree and yields one sequence per statement
//! block, per extractable single-statement body, and per switch case group.
//! Search engines later iterate the consecutive sub-runs of each of these.

use crate::complexity::Annotations;
use crate::core::offsets::OffsetPair;
use crate::core::tree::{MethodTree, NodeId, NodeKind};

/// A non-empty run of consecutive sibling statements, in document order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Sequence {
    nodes: Vec<NodeId>,
}

impl Sequence {
    pub fn new(nodes: Vec<NodeId>) -> Self {
        debug_assert!(!nodes.is_empty(), "sequence must be non-empty");
        Self { nodes }
    }

    pub fn single(node: NodeId) -> Self {
        Self { nodes: vec![node] }
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The run from member `from` through member `to`, inclusive.
    pub fn subrun(&self, from: usize, to: usize) -> Sequence {
        Sequence::new(self.nodes[from..=to].to_vec())
    }

    /// Byte range spanned by the run in the original source.
    pub fn offsets(&self, tree: &MethodTree) -> OffsetPair {
        let first = tree.node(self.nodes[0]);
        let last = tree.node(*self.nodes.last().unwrap_or(&self.nodes[0]));
        OffsetPair::new(first.start, last.end())
    }

    /// Sum the members' accumulated complexity annotations. The run's
    /// nesting is the depth of its first member.
    pub fn aggregate(&self, notes: &Annotations) -> SequenceAggregate {
        let mut agg = SequenceAggregate {
            nesting: notes.get(self.nodes[0]).nesting,
            ..SequenceAggregate::default()
        };
        for &id in &self.nodes {
            let n = notes.get(id);
            agg.accumulated_complexity += n.accumulated_complexity;
            agg.nesting_contribution += n.accumulated_nesting_contribution;
            agg.contributor_count += n.accumulated_contributor_count;
        }
        agg
    }
}

/// Accumulated complexity of a run, before any re-accounting for nested
/// extractions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceAggregate {
    pub accumulated_complexity: u32,
    pub nesting_contribution: u32,
    pub contributor_count: u32,
    pub nesting: u32,
}

impl SequenceAggregate {
    /// What the enclosing method loses when the run is extracted.
    pub fn reduction_of_cc(&self) -> u32 {
        self.accumulated_complexity
    }

    pub fn inherent_component(&self) -> u32 {
        self.accumulated_complexity - self.nesting_contribution
    }

    pub fn nesting_component(&self) -> u32 {
        self.nesting_contribution - self.contributor_count * self.nesting
    }

    pub fn extracted_method_cc(&self) -> u32 {
        self.inherent_component() + self.nesting_component()
    }
}

/// Walk the tree and yield every candidate statement run, in document
/// order. Selection is structural; feasibility and zero-complexity pruning
/// happen later.
pub fn select_candidates(tree: &MethodTree, notes: &Annotations) -> Vec<Sequence> {
    let mut out = Vec::new();
    for id in tree.ids() {
        match tree.node(id).kind {
            NodeKind::Block => {
                if !tree.children(id).is_empty() {
                    out.push(Sequence::new(tree.children(id).to_vec()));
                }
            }
            NodeKind::If
            | NodeKind::For
            | NodeKind::ForEach
            | NodeKind::While
            | NodeKind::DoWhile => {
                for &child in tree.children(id) {
                    if single_statement_body(tree, child)
                        && notes.get(child).accumulated_complexity > 0
                    {
                        out.push(Sequence::single(child));
                    }
                }
            }
            NodeKind::Switch => {
                out.extend(case_group_runs(tree, id));
            }
            _ => {}
        }
    }
    out
}

/// A branch or body child that is a bare statement rather than a block.
fn single_statement_body(tree: &MethodTree, id: NodeId) -> bool {
    let node = tree.node(id);
    let in_body_position = node.role.increases_nesting()
        || node.role == crate::core::tree::NodeRole::ElseIf;
    in_body_position && node.kind != NodeKind::Block && node.kind != NodeKind::SwitchCase
}

/// Maximal runs of consecutive statements between the case labels of a
/// switch.
fn case_group_runs(tree: &MethodTree, switch: NodeId) -> Vec<Sequence> {
    let mut runs = Vec::new();
    let mut current: Vec<NodeId> = Vec::new();
    for &child in tree.children(switch) {
        match tree.node(child).kind {
            NodeKind::SwitchCase => {
                if !current.is_empty() {
                    runs.push(Sequence::new(std::mem::take(&mut current)));
                }
            }
            NodeKind::LogicalOp | NodeKind::Ternary | NodeKind::Lambda => {
                // scrutinee expression nodes, not case body statements
            }
            _ => current.push(child),
        }
    }
    if !current.is_empty() {
        runs.push(Sequence::new(current));
    }
    runs
}
