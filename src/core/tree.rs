//! Arena representation of a single method's syntax tree.
//!
//! Nodes live in a flat vector indexed by [`NodeId`]; parent and child links
//! are explicit indices. Per-node analysis results (complexity annotations)
//! live in parallel side tables rather than on the nodes themselves, so the
//! tree stays immutable once built.

use super::offsets::OffsetPair;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// Index of a node in a [`MethodTree`] arena.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Structural kind of a node, reduced to what complexity accounting and
/// candidate selection need to know.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Root of the tree: the method declaration itself
    Method,
    /// A `{ ... }` statement list
    Block,
    If,
    For,
    ForEach,
    While,
    DoWhile,
    Switch,
    /// One `case`/`default` label group inside a switch
    SwitchCase,
    Try,
    Catch,
    Lambda,
    Ternary,
    /// A `&&` or `||` operator
    LogicalOp,
    /// Any other statement
    Statement,
}

impl NodeKind {
    /// Kinds that contribute one inherent increment plus a nesting increment
    /// equal to their depth.
    pub fn is_nesting_contributor(self) -> bool {
        matches!(
            self,
            NodeKind::If
                | NodeKind::For
                | NodeKind::ForEach
                | NodeKind::While
                | NodeKind::DoWhile
                | NodeKind::Switch
                | NodeKind::Try
                | NodeKind::Ternary
        )
    }
}

/// Position a node occupies within its parent construct. The annotator keys
/// nesting-depth increments off this, not off the parent kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    #[default]
    None,
    /// Condition or header expression of a control construct
    Condition,
    /// Body of a loop, switch, try, catch, lambda, or ternary branch
    Body,
    ThenBranch,
    ElseBranch,
    /// An `if` chained directly behind an `else`
    ElseIf,
}

impl NodeRole {
    /// Whether descending into a node with this role increases nesting depth.
    pub fn increases_nesting(self) -> bool {
        matches!(
            self,
            NodeRole::Body | NodeRole::ThenBranch | NodeRole::ElseBranch
        )
    }
}

/// One arena entry.
#[derive(Clone, Debug)]
pub struct NodeData {
    pub kind: NodeKind,
    pub role: NodeRole,
    pub start: u32,
    pub len: u32,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Set on a logical operator that is itself a direct operand of another
    /// logical operator. Such operators fold into the chain root's single
    /// contribution instead of counting on their own.
    pub chained_operand: bool,
}

impl NodeData {
    pub fn offsets(&self) -> OffsetPair {
        OffsetPair::new(self.start, self.start + self.len)
    }

    pub fn end(&self) -> u32 {
        self.start + self.len
    }
}

/// Immutable arena tree for one method, carrying the full file text it was
/// parsed out of. Node offsets index into that text.
#[derive(Clone, Debug)]
pub struct MethodTree {
    nodes: Vec<NodeData>,
    source: String,
    name: String,
}

impl MethodTree {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn method_name(&self) -> &str {
        &self.name
    }

    pub fn offsets(&self, id: NodeId) -> OffsetPair {
        self.node(id).offsets()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn text(&self, id: NodeId) -> &str {
        let node = self.node(id);
        &self.source[node.start as usize..node.end() as usize]
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// The outermost statement block of the method, when it has one.
    pub fn body_block(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&c| self.node(c).kind == NodeKind::Block)
    }

    /// Walk from `id` towards the root, including `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = Some(id);
        std::iter::from_fn(move || {
            let id = current?;
            current = self.node(id).parent;
            Some(id)
        })
    }

    /// Nearest ancestor (excluding `id`) matching the predicate.
    pub fn enclosing(&self, id: NodeId, pred: impl Fn(&NodeData) -> bool) -> Option<NodeId> {
        self.ancestors(id).skip(1).find(|&a| pred(self.node(a)))
    }

    /// Node ids in post order: children before parents.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root(), false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
            } else {
                stack.push((id, true));
                for &child in self.children(id).iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        out
    }
}

/// Incremental builder used by source models while walking a parse tree.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<NodeData>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. The first added node becomes the root and must be the
    /// method itself.
    pub fn add(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
        role: NodeRole,
        start: u32,
        len: u32,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            role,
            start,
            len,
            parent,
            children: Vec::new(),
            chained_operand: false,
        });
        if let Some(p) = parent {
            self.nodes[p.index()].children.push(id);
        }
        id
    }

    pub fn mark_chained_operand(&mut self, id: NodeId) {
        self.nodes[id.index()].chained_operand = true;
    }

    pub fn build(self, source: String, name: String) -> Result<MethodTree> {
        let root = self
            .nodes
            .first()
            .ok_or_else(|| Error::model("method tree has no nodes"))?;
        if root.kind != NodeKind::Method {
            return Err(Error::model("method tree root is not a method node"));
        }
        if root.end() as usize > source.len() {
            return Err(Error::model("method node extends past source end"));
        }
        Ok(MethodTree {
            nodes: self.nodes,
            source,
            name,
        })
    }
}
