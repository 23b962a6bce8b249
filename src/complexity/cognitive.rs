//! Cognitive complexity annotation over a method tree.
//!
//! Follows SonarSource's cognitive complexity model. Each `if`, loop,
//! `switch`, `try`, or ternary contributes one inherent increment plus a
//! nesting increment equal to its depth. Every `case` after the first in a
//! switch contributes one increment with no nesting term. A run of `&&`/`||`
//! operators contributes once at its outermost operator.
//!
//! Annotation is two passes over the arena. The first walks top down
//! assigning each node its depth and its own contribution. The second folds
//! bottom up, so every node ends up carrying the totals of its whole
//! subtree. Those accumulated values are what extraction planning reads:
//! the accumulated complexity of a statement range is exactly the amount
//! the enclosing method loses when the range is extracted.

use crate::core::tree::{MethodTree, NodeId, NodeKind};
use serde::{Deserialize, Serialize};

/// Per-node complexity annotation kept in a side table parallel to the
/// arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityAnnotation {
    /// The node's own inherent increment (0 or 1, or the chain size for the
    /// root of a logical operator chain)
    pub base_contribution: u32,
    /// The node's own nesting increment, equal to its depth when the node
    /// is a nesting contributor
    pub base_nesting_delta: u32,
    /// Nesting depth at the node itself
    pub nesting: u32,
    /// Total complexity of the subtree: inherent plus nesting increments
    pub accumulated_complexity: u32,
    /// Sum of nesting increments within the subtree
    pub accumulated_nesting_contribution: u32,
    /// How many subtree nodes carry a nonzero nesting increment
    pub accumulated_contributor_count: u32,
}

impl ComplexityAnnotation {
    /// Complexity that survives any re-nesting: contributions minus every
    /// nesting increment.
    pub fn accumulated_inherent_component(&self) -> u32 {
        self.accumulated_complexity - self.accumulated_nesting_contribution
    }

    /// Nesting contributions re-based to this node's own depth. For a range
    /// extracted to depth zero, each contributor keeps `depth - nesting`
    /// of its original increment.
    pub fn accumulated_nesting_component(&self) -> u32 {
        self.accumulated_nesting_contribution - self.accumulated_contributor_count * self.nesting
    }

    /// Cognitive complexity of a method whose body is this subtree placed
    /// at depth zero.
    pub fn extracted_method_cc(&self) -> u32 {
        self.accumulated_inherent_component() + self.accumulated_nesting_component()
    }
}

/// Side table of annotations, indexed by [`NodeId`].
#[derive(Clone, Debug)]
pub struct Annotations {
    notes: Vec<ComplexityAnnotation>,
    root: NodeId,
}

impl Annotations {
    pub fn get(&self, id: NodeId) -> &ComplexityAnnotation {
        &self.notes[id.index()]
    }

    /// Cognitive complexity of the whole method.
    pub fn method_complexity(&self) -> u32 {
        self.notes[self.root.index()].accumulated_complexity
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Annotate every node of `tree` with cognitive complexity data.
pub fn annotate(tree: &MethodTree) -> Annotations {
    let mut notes = vec![ComplexityAnnotation::default(); tree.len()];

    assign_base_contributions(tree, &mut notes);
    accumulate_subtrees(tree, &mut notes);

    Annotations {
        notes,
        root: tree.root(),
    }
}

/// Pass 1: assign depth and per-node contributions, walking top down.
fn assign_base_contributions(tree: &MethodTree, notes: &mut [ComplexityAnnotation]) {
    let mut stack = vec![(tree.root(), 0u32)];
    while let Some((id, depth)) = stack.pop() {
        let node = tree.node(id);
        let note = &mut notes[id.index()];
        note.nesting = depth;

        if node.kind.is_nesting_contributor() {
            note.base_contribution = 1;
            note.base_nesting_delta = depth;
        } else if node.kind == NodeKind::SwitchCase && !is_first_case(tree, id) {
            note.base_contribution = 1;
        } else if node.kind == NodeKind::LogicalOp && !node.chained_operand {
            note.base_contribution = logical_chain_size(tree, id);
        }

        for &child in tree.children(id) {
            let step = u32::from(tree.node(child).role.increases_nesting());
            stack.push((child, depth + step));
        }
    }
}

/// Pass 2: fold contributions bottom up so each node carries subtree totals.
fn accumulate_subtrees(tree: &MethodTree, notes: &mut [ComplexityAnnotation]) {
    for id in tree.post_order() {
        let mut acc = 0u32;
        let mut acc_nesting = 0u32;
        let mut acc_count = 0u32;
        for &child in tree.children(id) {
            let c = &notes[child.index()];
            acc += c.accumulated_complexity;
            acc_nesting += c.accumulated_nesting_contribution;
            acc_count += c.accumulated_contributor_count;
        }
        let note = &mut notes[id.index()];
        note.accumulated_complexity = acc + note.base_contribution + note.base_nesting_delta;
        note.accumulated_nesting_contribution = acc_nesting + note.base_nesting_delta;
        note.accumulated_contributor_count = acc_count + u32::from(note.base_nesting_delta > 0);
    }
}

/// Number of logical operators folded into a chain rooted at `id`: the
/// operator itself plus every immediate chained operand below it.
fn logical_chain_size(tree: &MethodTree, id: NodeId) -> u32 {
    let mut size = 1;
    let mut stack: Vec<NodeId> = tree.children(id).to_vec();
    while let Some(child) = stack.pop() {
        let node = tree.node(child);
        if node.kind == NodeKind::LogicalOp && node.chained_operand {
            size += 1;
            stack.extend_from_slice(&node.children);
        }
    }
    size
}

/// Whether `id` is the first case label of its nearest enclosing switch.
/// Only cases after the first add an increment.
fn is_first_case(tree: &MethodTree, id: NodeId) -> bool {
    let Some(switch) = tree.enclosing(id, |n| n.kind == NodeKind::Switch) else {
        return true;
    };
    let my_start = tree.node(id).start;
    for &child in tree.children(switch) {
        let node = tree.node(child);
        if node.kind == NodeKind::SwitchCase && node.start < my_start {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tree::{NodeRole, TreeBuilder};

    // Builds trees by hand so expectations stay hand checkable. Offsets are
    // schematic; only the structure matters to the annotator.
    struct Shape {
        builder: TreeBuilder,
        next: u32,
    }

    impl Shape {
        fn new() -> (Self, NodeId) {
            let mut builder = TreeBuilder::new();
            let root = builder.add(None, NodeKind::Method, NodeRole::None, 0, 1000);
            (Self { builder, next: 10 }, root)
        }

        fn add(&mut self, parent: NodeId, kind: NodeKind, role: NodeRole) -> NodeId {
            let start = self.next;
            self.next += 10;
            self.builder.add(Some(parent), kind, role, start, 5)
        }

        fn finish(self) -> MethodTree {
            let len = self.next as usize + 100;
            self.builder
                .build(" ".repeat(len.max(1000)), "m".to_string())
                .unwrap()
        }
    }

    #[test]
    fn test_if_nested_in_loop() {
        // for (..) { if (..) { s; } }  =>  for +1, if +1 and +1 nesting
        let (mut t, root) = Shape::new();
        let body = t.add(root, NodeKind::Block, NodeRole::None);
        let for_node = t.add(body, NodeKind::For, NodeRole::None);
        let for_body = t.add(for_node, NodeKind::Block, NodeRole::Body);
        let if_node = t.add(for_body, NodeKind::If, NodeRole::None);
        let then = t.add(if_node, NodeKind::Block, NodeRole::ThenBranch);
        t.add(then, NodeKind::Statement, NodeRole::None);
        let tree = t.finish();

        let notes = annotate(&tree);
        assert_eq!(notes.method_complexity(), 3);
        assert_eq!(notes.get(for_node).base_nesting_delta, 0);
        assert_eq!(notes.get(if_node).base_nesting_delta, 1);
        assert_eq!(notes.get(if_node).nesting, 1);
    }

    #[test]
    fn test_three_levels_of_nesting() {
        // if { for { if { s; } } }  =>  1 + (1+1) + (1+2) = 6
        let (mut t, root) = Shape::new();
        let body = t.add(root, NodeKind::Block, NodeRole::None);
        let if1 = t.add(body, NodeKind::If, NodeRole::None);
        let then1 = t.add(if1, NodeKind::Block, NodeRole::ThenBranch);
        let for2 = t.add(then1, NodeKind::For, NodeRole::None);
        let body2 = t.add(for2, NodeKind::Block, NodeRole::Body);
        let if3 = t.add(body2, NodeKind::If, NodeRole::None);
        let then3 = t.add(if3, NodeKind::Block, NodeRole::ThenBranch);
        t.add(then3, NodeKind::Statement, NodeRole::None);
        let tree = t.finish();

        let notes = annotate(&tree);
        assert_eq!(notes.method_complexity(), 6);
        // inner if: inherent 1, nesting delta 2
        assert_eq!(notes.get(if3).base_nesting_delta, 2);
        // subtree rooted at the outer for: 2 contributions, 3 nesting total
        let for_note = notes.get(for2);
        assert_eq!(for_note.accumulated_complexity, 5);
        assert_eq!(for_note.accumulated_nesting_contribution, 3);
        assert_eq!(for_note.accumulated_contributor_count, 2);
    }

    #[test]
    fn test_else_if_adds_no_nesting_but_else_body_does() {
        // if { } else if { if { } }
        let (mut t, root) = Shape::new();
        let body = t.add(root, NodeKind::Block, NodeRole::None);
        let if1 = t.add(body, NodeKind::If, NodeRole::None);
        let then1 = t.add(if1, NodeKind::Block, NodeRole::ThenBranch);
        t.add(then1, NodeKind::Statement, NodeRole::None);
        // else-if hangs off if1 without a nesting step
        let if2 = t.add(if1, NodeKind::If, NodeRole::ElseIf);
        let then2 = t.add(if2, NodeKind::Block, NodeRole::ThenBranch);
        let if3 = t.add(then2, NodeKind::If, NodeRole::None);
        t.add(if3, NodeKind::Block, NodeRole::ThenBranch);
        let tree = t.finish();

        let notes = annotate(&tree);
        // if1 = 1, if2 = 1 (same depth as if1), if3 = 1 + 1
        assert_eq!(notes.method_complexity(), 4);
        assert_eq!(notes.get(if2).nesting, 0);
        assert_eq!(notes.get(if2).base_nesting_delta, 0);
        assert_eq!(notes.get(if3).base_nesting_delta, 1);
    }

    #[test]
    fn test_switch_counts_cases_after_first() {
        // switch { case a: s; case b: s; default: s; }
        let (mut t, root) = Shape::new();
        let body = t.add(root, NodeKind::Block, NodeRole::None);
        let sw = t.add(body, NodeKind::Switch, NodeRole::None);
        for _ in 0..3 {
            t.add(sw, NodeKind::SwitchCase, NodeRole::Body);
            t.add(sw, NodeKind::Statement, NodeRole::Body);
        }
        let tree = t.finish();

        let notes = annotate(&tree);
        // switch 1 + two later cases
        assert_eq!(notes.method_complexity(), 3);
    }

    #[test]
    fn test_logical_chain_counts_once_at_root() {
        // if (a && b && c) { }  =>  if 1, chain 2 operators counted as 2
        let (mut t, root) = Shape::new();
        let body = t.add(root, NodeKind::Block, NodeRole::None);
        let if1 = t.add(body, NodeKind::If, NodeRole::None);
        let and_outer = t.add(if1, NodeKind::LogicalOp, NodeRole::Condition);
        let and_inner = t.add(and_outer, NodeKind::LogicalOp, NodeRole::None);
        t.builder.mark_chained_operand(and_inner);
        t.add(if1, NodeKind::Block, NodeRole::ThenBranch);
        let tree = t.finish();

        let notes = annotate(&tree);
        assert_eq!(notes.get(and_outer).base_contribution, 2);
        assert_eq!(notes.get(and_inner).base_contribution, 0);
        assert_eq!(notes.method_complexity(), 3);
    }

    #[test]
    fn test_lambda_body_increases_nesting_without_contributing() {
        // run(() -> { if (..) {} });
        let (mut t, root) = Shape::new();
        let body = t.add(root, NodeKind::Block, NodeRole::None);
        let stmt = t.add(body, NodeKind::Statement, NodeRole::None);
        let lambda = t.add(stmt, NodeKind::Lambda, NodeRole::None);
        let lbody = t.add(lambda, NodeKind::Block, NodeRole::Body);
        let if1 = t.add(lbody, NodeKind::If, NodeRole::None);
        t.add(if1, NodeKind::Block, NodeRole::ThenBranch);
        let tree = t.finish();

        let notes = annotate(&tree);
        // lambda itself free, if pays 1 inherent + 1 nesting
        assert_eq!(notes.method_complexity(), 2);
        assert_eq!(notes.get(if1).nesting, 1);
    }

    #[test]
    fn test_catch_body_nests_and_try_contributes() {
        let (mut t, root) = Shape::new();
        let body = t.add(root, NodeKind::Block, NodeRole::None);
        let tryn = t.add(body, NodeKind::Try, NodeRole::None);
        let tbody = t.add(tryn, NodeKind::Block, NodeRole::Body);
        t.add(tbody, NodeKind::Statement, NodeRole::None);
        let catch = t.add(tryn, NodeKind::Catch, NodeRole::None);
        let cbody = t.add(catch, NodeKind::Block, NodeRole::Body);
        let if1 = t.add(cbody, NodeKind::If, NodeRole::None);
        t.add(if1, NodeKind::Block, NodeRole::ThenBranch);
        let tree = t.finish();

        let notes = annotate(&tree);
        // try 1, if inside catch 1 + 1
        assert_eq!(notes.method_complexity(), 3);
    }

    #[test]
    fn test_inherent_and_nesting_components_split() {
        // depth-1 block containing an if at depth 1
        let (mut t, root) = Shape::new();
        let body = t.add(root, NodeKind::Block, NodeRole::None);
        let wh = t.add(body, NodeKind::While, NodeRole::None);
        let wbody = t.add(wh, NodeKind::Block, NodeRole::Body);
        let if1 = t.add(wbody, NodeKind::If, NodeRole::None);
        let then1 = t.add(if1, NodeKind::Block, NodeRole::ThenBranch);
        let if2 = t.add(then1, NodeKind::If, NodeRole::None);
        t.add(if2, NodeKind::Block, NodeRole::ThenBranch);
        let tree = t.finish();

        let notes = annotate(&tree);
        // method total: while 1, if1 2, if2 3
        assert_eq!(notes.method_complexity(), 6);

        // the while body subtree seen from depth 1
        let b = notes.get(wbody);
        assert_eq!(b.accumulated_complexity, 5);
        assert_eq!(b.accumulated_nesting_contribution, 3);
        assert_eq!(b.accumulated_contributor_count, 2);
        assert_eq!(b.nesting, 1);
        assert_eq!(b.accumulated_inherent_component(), 2);
        // re-based to depth 1: (1-1) + (2-1) = 1
        assert_eq!(b.accumulated_nesting_component(), 1);
        // extracted as its own method: 2 inherent + 1 residual nesting
        assert_eq!(b.extracted_method_cc(), 3);
    }
}
