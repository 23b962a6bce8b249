//! Java source model built on tree-sitter.
//!
//! Three jobs: turn `method_declaration` subtrees into arena [`MethodTree`]s,
//! judge whether a byte range can be extracted into a new method, and build
//! the forward/undo edits that perform the extraction. Feasibility is the
//! conservative subset of the usual IDE rules: no `return` in the range, no
//! `break`/`continue` escaping it, and at most one local variable that the
//! code after the range still needs.

use crate::core::metrics::{Edit, ExtractionMetrics};
use crate::core::offsets::OffsetPair;
use crate::core::tree::{MethodTree, NodeId, NodeKind, NodeRole, TreeBuilder};
use crate::errors::{Error, Result};
use crate::source_model::SourceModel;
use anyhow::Context;
use tree_sitter::{Node, Parser, Tree};

pub struct JavaSourceModel {
    parser: Parser,
    // last parsed text and its tree, so repeated probes of one file reparse once
    cached: Option<(String, Tree)>,
}

impl JavaSourceModel {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .context("Failed to set Java language")
            .map_err(|e| Error::source_model(e.to_string()))?;
        Ok(Self {
            parser,
            cached: None,
        })
    }

    fn ts_tree(&mut self, source: &str) -> Result<Tree> {
        if let Some((text, tree)) = &self.cached {
            if text == source {
                return Ok(tree.clone());
            }
        }
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| Error::parse("tree-sitter failed to parse source"))?;
        self.cached = Some((source.to_string(), tree.clone()));
        Ok(tree)
    }

    // ---- arena construction -------------------------------------------------

    fn build_method_tree(&self, source: &str, method: Node) -> Result<MethodTree> {
        let name = method
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(source.as_bytes()).ok())
            .unwrap_or("<anonymous>")
            .to_string();
        let mut b = TreeBuilder::new();
        let root = b.add(
            None,
            NodeKind::Method,
            NodeRole::None,
            method.start_byte() as u32,
            (method.end_byte() - method.start_byte()) as u32,
        );
        if let Some(body) = method.child_by_field_name("body") {
            walk_statement(&mut b, source, body, root, NodeRole::None);
        }
        b.build(source.to_string(), name)
    }
}

impl SourceModel for JavaSourceModel {
    fn parse_all(&mut self, source: &str) -> Result<Vec<MethodTree>> {
        let tree = self.ts_tree(source)?;
        let mut methods = Vec::new();
        for node in descendants(tree.root_node()) {
            if matches!(node.kind(), "method_declaration" | "constructor_declaration") {
                methods.push(self.build_method_tree(source, node)?);
            }
        }
        log::debug!("parsed {} method(s)", methods.len());
        Ok(methods)
    }

    fn check_extract(&mut self, source: &str, range: OffsetPair) -> ExtractionMetrics {
        let tree = match self.ts_tree(source) {
            Ok(t) => t,
            Err(e) => return ExtractionMetrics::infeasible(e.to_string()),
        };
        match analyze_range(tree.root_node(), source, range) {
            Ok(analysis) => ExtractionMetrics {
                feasible: true,
                extracted_loc: analysis.loc,
                param_count: analysis.params.len() as u32,
                ..ExtractionMetrics::default()
            },
            Err(reason) => ExtractionMetrics::infeasible(reason),
        }
    }

    fn apply_extract(
        &mut self,
        source: &str,
        range: OffsetPair,
        new_name: &str,
    ) -> Result<ExtractionMetrics> {
        let tree = self.ts_tree(source)?;
        let analysis =
            analyze_range(tree.root_node(), source, range).map_err(|reason| Error::Infeasible {
                start: range.a,
                end: range.b,
                reason,
            })?;
        Ok(build_edits(source, range, new_name, &analysis))
    }

    fn has_compile_errors(&mut self, source: &str) -> bool {
        match self.ts_tree(source) {
            Ok(tree) => tree.root_node().has_error(),
            Err(_) => true,
        }
    }
}

// ---- arena walk -----------------------------------------------------------

fn arena_span(node: Node) -> (u32, u32) {
    (
        node.start_byte() as u32,
        (node.end_byte() - node.start_byte()) as u32,
    )
}

fn add_node(b: &mut TreeBuilder, parent: NodeId, kind: NodeKind, role: NodeRole, n: Node) -> NodeId {
    let (start, len) = arena_span(n);
    b.add(Some(parent), kind, role, start, len)
}

/// Map one statement-level tree-sitter node into the arena.
fn walk_statement(b: &mut TreeBuilder, src: &str, n: Node, parent: NodeId, role: NodeRole) {
    match n.kind() {
        "block" | "constructor_body" => {
            let block = add_node(b, parent, NodeKind::Block, role, n);
            for child in named_children(&n) {
                if !is_comment(child) {
                    walk_statement(b, src, child, block, NodeRole::None);
                }
            }
        }
        "if_statement" => {
            let iff = add_node(b, parent, NodeKind::If, role, n);
            if let Some(cond) = n.child_by_field_name("condition") {
                walk_expression(b, src, cond, iff, NodeRole::Condition);
            }
            if let Some(then) = n.child_by_field_name("consequence") {
                walk_statement(b, src, then, iff, NodeRole::ThenBranch);
            }
            if let Some(alt) = n.child_by_field_name("alternative") {
                let alt_role = if alt.kind() == "if_statement" {
                    NodeRole::ElseIf
                } else {
                    NodeRole::ElseBranch
                };
                walk_statement(b, src, alt, iff, alt_role);
            }
        }
        "for_statement" => {
            let forn = add_node(b, parent, NodeKind::For, role, n);
            for field in ["init", "condition", "update"] {
                if let Some(part) = n.child_by_field_name(field) {
                    walk_expression(b, src, part, forn, NodeRole::Condition);
                }
            }
            if let Some(body) = n.child_by_field_name("body") {
                walk_statement(b, src, body, forn, NodeRole::Body);
            }
        }
        "enhanced_for_statement" => {
            let forn = add_node(b, parent, NodeKind::ForEach, role, n);
            if let Some(value) = n.child_by_field_name("value") {
                walk_expression(b, src, value, forn, NodeRole::Condition);
            }
            if let Some(body) = n.child_by_field_name("body") {
                walk_statement(b, src, body, forn, NodeRole::Body);
            }
        }
        "while_statement" => {
            let wh = add_node(b, parent, NodeKind::While, role, n);
            if let Some(cond) = n.child_by_field_name("condition") {
                walk_expression(b, src, cond, wh, NodeRole::Condition);
            }
            if let Some(body) = n.child_by_field_name("body") {
                walk_statement(b, src, body, wh, NodeRole::Body);
            }
        }
        "do_statement" => {
            let dw = add_node(b, parent, NodeKind::DoWhile, role, n);
            if let Some(body) = n.child_by_field_name("body") {
                walk_statement(b, src, body, dw, NodeRole::Body);
            }
            if let Some(cond) = n.child_by_field_name("condition") {
                walk_expression(b, src, cond, dw, NodeRole::Condition);
            }
        }
        "switch_expression" | "switch_statement" => {
            walk_switch(b, src, n, parent, role);
        }
        "try_statement" | "try_with_resources_statement" => {
            let tr = add_node(b, parent, NodeKind::Try, role, n);
            if let Some(body) = n.child_by_field_name("body") {
                walk_statement(b, src, body, tr, NodeRole::Body);
            }
            for child in named_children(&n) {
                match child.kind() {
                    "catch_clause" => {
                        let catch = add_node(b, tr, NodeKind::Catch, NodeRole::None, child);
                        if let Some(cbody) = child.child_by_field_name("body") {
                            walk_statement(b, src, cbody, catch, NodeRole::Body);
                        }
                    }
                    // finally adds neither contribution nor nesting
                    "finally_clause" => {
                        for fc in named_children(&child) {
                            if fc.kind() == "block" {
                                walk_statement(b, src, fc, tr, NodeRole::None);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        // labels are transparent to complexity accounting
        "labeled_statement" => {
            for child in named_children(&n) {
                if child.kind() != "identifier" && !is_comment(child) {
                    walk_statement(b, src, child, parent, role);
                }
            }
        }
        kind if is_comment_kind(kind) => {}
        // bare `;` carries nothing and must never bound a candidate run
        ";" | "empty_statement" => {}
        _ => {
            let stmt = add_node(b, parent, NodeKind::Statement, role, n);
            for child in named_children(&n) {
                walk_expression(b, src, child, stmt, NodeRole::None);
            }
        }
    }
}

/// Flatten a switch body: case labels and their statements become direct
/// children of the Switch node, so a case group is a sibling run.
fn walk_switch(b: &mut TreeBuilder, src: &str, n: Node, parent: NodeId, role: NodeRole) {
    let sw = add_node(b, parent, NodeKind::Switch, role, n);
    if let Some(cond) = n.child_by_field_name("condition") {
        walk_expression(b, src, cond, sw, NodeRole::Condition);
    }
    let Some(body) = n.child_by_field_name("body") else {
        return;
    };
    for group in named_children(&body) {
        match group.kind() {
            "switch_block_statement_group" | "switch_rule" => {
                for child in named_children(&group) {
                    if child.kind() == "switch_label" {
                        add_node(b, sw, NodeKind::SwitchCase, NodeRole::Body, child);
                    } else if !is_comment(child) {
                        walk_statement(b, src, child, sw, NodeRole::Body);
                    }
                }
            }
            "switch_label" => {
                add_node(b, sw, NodeKind::SwitchCase, NodeRole::Body, group);
            }
            _ => {
                if !is_comment(group) {
                    walk_statement(b, src, group, sw, NodeRole::Body);
                }
            }
        }
    }
}

/// Scan an expression subtree for constructs that matter to complexity:
/// logical operator chains, ternaries, lambdas, and switch expressions.
fn walk_expression(b: &mut TreeBuilder, src: &str, n: Node, parent: NodeId, role: NodeRole) {
    let u = unwrap_parens(n);
    match u.kind() {
        "binary_expression" if is_logical(u) => {
            walk_logical(b, src, u, parent, role, false);
        }
        "ternary_expression" => {
            let tern = add_node(b, parent, NodeKind::Ternary, role, u);
            if let Some(cond) = u.child_by_field_name("condition") {
                walk_expression(b, src, cond, tern, NodeRole::Condition);
            }
            for field in ["consequence", "alternative"] {
                if let Some(branch) = u.child_by_field_name(field) {
                    walk_expression(b, src, branch, tern, NodeRole::Body);
                }
            }
        }
        "lambda_expression" => {
            let lambda = add_node(b, parent, NodeKind::Lambda, role, u);
            if let Some(body) = u.child_by_field_name("body") {
                if body.kind() == "block" {
                    walk_statement(b, src, body, lambda, NodeRole::Body);
                } else {
                    walk_expression(b, src, body, lambda, NodeRole::Body);
                }
            }
        }
        "switch_expression" => {
            walk_switch(b, src, u, parent, role);
        }
        _ => {
            for child in named_children(&u) {
                walk_expression(b, src, child, parent, role);
            }
        }
    }
}

/// Build a logical operator chain. Every operator below the chain root is
/// marked as a chained operand so the annotator charges the whole chain once,
/// at the root, with the operator count.
fn walk_logical(
    b: &mut TreeBuilder,
    src: &str,
    n: Node,
    parent: NodeId,
    role: NodeRole,
    chained: bool,
) {
    let op = add_node(b, parent, NodeKind::LogicalOp, role, n);
    if chained {
        b.mark_chained_operand(op);
    }
    for field in ["left", "right"] {
        if let Some(operand) = n.child_by_field_name(field) {
            let u = unwrap_parens(operand);
            if u.kind() == "binary_expression" && is_logical(u) {
                walk_logical(b, src, u, op, NodeRole::None, true);
            } else {
                walk_expression(b, src, u, op, NodeRole::None);
            }
        }
    }
}

fn is_logical(n: Node) -> bool {
    n.child_by_field_name("operator")
        .map(|op| matches!(op.kind(), "&&" | "||"))
        .unwrap_or(false)
}

fn unwrap_parens(mut n: Node) -> Node {
    while n.kind() == "parenthesized_expression" {
        match n.named_child(0) {
            Some(inner) => n = inner,
            None => break,
        }
    }
    n
}

fn named_children<'t>(n: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = n.walk();
    n.named_children(&mut cursor).collect()
}

fn descendants(root: Node) -> Vec<Node> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        out.push(n);
        for child in named_children(&n).into_iter().rev() {
            stack.push(child);
        }
    }
    out
}

fn is_comment(n: Node) -> bool {
    is_comment_kind(n.kind())
}

fn is_comment_kind(kind: &str) -> bool {
    matches!(kind, "line_comment" | "block_comment")
}

// ---- range analysis -------------------------------------------------------

/// A declaration visible somewhere in the method.
#[derive(Clone, Debug)]
struct Declaration {
    name: String,
    ty: String,
    offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum UsageKind {
    Read,
    Write,
    ReadWrite,
}

#[derive(Clone, Debug)]
struct Usage {
    name: String,
    offset: u32,
    kind: UsageKind,
}

/// The local variable the extracted method must hand back, if any.
#[derive(Clone, Debug)]
struct ReturnValue {
    name: String,
    ty: String,
    declared_inside: bool,
}

struct RangeAnalysis {
    /// (name, type) in order of first use inside the range
    params: Vec<(String, String)>,
    ret: Option<ReturnValue>,
    loc: u32,
    is_static: bool,
    throws: Option<String>,
    method_end: u32,
    method_indent: String,
    range_indent: String,
}

/// Decide whether `[range.a, range.b)` can leave its method, and gather
/// everything the edit builder needs. Errors are human-readable reasons.
fn analyze_range(
    root: Node,
    source: &str,
    range: OffsetPair,
) -> std::result::Result<RangeAnalysis, String> {
    let method = enclosing_method(root, range)
        .ok_or_else(|| format!("range {} is not inside a method", range))?;
    let run = locate_statement_run(method, range)
        .ok_or_else(|| format!("range {} does not align with statement boundaries", range))?;

    check_control_flow(&run, source, range)?;

    let decls = collect_declarations(method, source);
    let usages = collect_usages(method, source);
    let params = parameter_list(&decls, &usages, range);
    let ret = return_value(&decls, &usages, range)?;

    let text = &source[range.a as usize..range.b as usize];
    let loc = text.lines().filter(|l| !l.trim().is_empty()).count() as u32;

    Ok(RangeAnalysis {
        params,
        ret,
        loc,
        is_static: has_static_modifier(method, source),
        throws: throws_clause(method, source),
        method_end: method.end_byte() as u32,
        method_indent: line_indent(source, method.start_byte()),
        range_indent: line_indent(source, range.a as usize),
    })
}

fn enclosing_method(root: Node, range: OffsetPair) -> Option<Node> {
    descendants(root)
        .into_iter()
        .filter(|n| matches!(n.kind(), "method_declaration" | "constructor_declaration"))
        .filter(|n| n.start_byte() as u32 <= range.a && range.b <= n.end_byte() as u32)
        // innermost enclosing method (anonymous classes nest them)
        .max_by_key(|n| n.start_byte())
}

/// The sibling statement run whose first node starts at `range.a` and whose
/// last node ends at `range.b`, if one exists.
fn locate_statement_run(method: Node, range: OffsetPair) -> Option<Vec<Node>> {
    for parent in descendants(method) {
        let children: Vec<Node> = named_children(&parent)
            .into_iter()
            .filter(|c| !is_comment(*c))
            .collect();
        let Some(first) = children
            .iter()
            .position(|c| c.start_byte() as u32 == range.a)
        else {
            continue;
        };
        for last in first..children.len() {
            let end = children[last].end_byte() as u32;
            if end == range.b {
                return Some(children[first..=last].to_vec());
            }
            if end > range.b {
                break;
            }
        }
    }
    None
}

/// `return` and escaping `break`/`continue` pin the range to its method.
/// Lambda and anonymous-class bodies have their own control flow and are
/// skipped.
fn check_control_flow(
    run: &[Node],
    source: &str,
    range: OffsetPair,
) -> std::result::Result<(), String> {
    let mut stack: Vec<Node> = run.to_vec();
    while let Some(n) = stack.pop() {
        match n.kind() {
            "lambda_expression" | "class_body" => continue,
            "return_statement" | "yield_statement" => {
                return Err("selection contains a return statement".to_string());
            }
            "break_statement" | "continue_statement" => {
                let escapes = match jump_target(n, source) {
                    Some(t) => (t.start_byte() as u32) < range.a || (t.end_byte() as u32) > range.b,
                    None => true,
                };
                if escapes {
                    return Err(format!(
                        "{} targets a statement outside the selection",
                        n.kind().replace("_statement", "")
                    ));
                }
            }
            _ => {}
        }
        stack.extend(named_children(&n));
    }
    Ok(())
}

/// The loop, switch, or labeled statement a `break`/`continue` jumps out of.
fn jump_target<'t>(jump: Node<'t>, source: &str) -> Option<Node<'t>> {
    let label = named_children(&jump)
        .into_iter()
        .find(|c| c.kind() == "identifier")
        .and_then(|c| c.utf8_text(source.as_bytes()).ok());
    let mut current = jump.parent();
    while let Some(n) = current {
        match n.kind() {
            "labeled_statement" if label.is_some() => {
                let name = named_children(&n)
                    .into_iter()
                    .find(|c| c.kind() == "identifier")
                    .and_then(|c| c.utf8_text(source.as_bytes()).ok());
                if name == label {
                    return Some(n);
                }
            }
            "for_statement" | "enhanced_for_statement" | "while_statement" | "do_statement"
                if label.is_none() =>
            {
                return Some(n);
            }
            "switch_expression" | "switch_statement"
                if label.is_none() && jump.kind() == "break_statement" =>
            {
                return Some(n);
            }
            "method_declaration" | "constructor_declaration" | "lambda_expression" => return None,
            _ => {}
        }
        current = n.parent();
    }
    None
}

fn collect_declarations(method: Node, source: &str) -> Vec<Declaration> {
    let mut decls = Vec::new();
    let mut push = |name: Option<Node>, ty: Option<Node>| {
        if let Some(name) = name {
            if let Ok(text) = name.utf8_text(source.as_bytes()) {
                decls.push(Declaration {
                    name: text.to_string(),
                    ty: ty
                        .and_then(|t| t.utf8_text(source.as_bytes()).ok())
                        .unwrap_or("var")
                        .to_string(),
                    offset: name.start_byte() as u32,
                });
            }
        }
    };
    for n in descendants(method) {
        match n.kind() {
            "local_variable_declaration" => {
                let ty = n.child_by_field_name("type");
                for d in named_children(&n) {
                    if d.kind() == "variable_declarator" {
                        push(d.child_by_field_name("name"), ty);
                    }
                }
            }
            "formal_parameter" | "catch_formal_parameter" | "enhanced_for_statement" => {
                push(n.child_by_field_name("name"), n.child_by_field_name("type"));
            }
            "lambda_expression" => {
                if let Some(params) = n.child_by_field_name("parameters") {
                    if params.kind() == "identifier" {
                        push(Some(params), None);
                    } else {
                        for p in named_children(&params) {
                            if p.kind() == "identifier" {
                                push(Some(p), None);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    decls
}

fn collect_usages(method: Node, source: &str) -> Vec<Usage> {
    let mut usages = Vec::new();
    for n in descendants(method) {
        if n.kind() != "identifier" {
            continue;
        }
        let Some(parent) = n.parent() else { continue };
        let is_field = |field: &str| {
            parent
                .child_by_field_name(field)
                .map(|c| c.id() == n.id())
                .unwrap_or(false)
        };
        let kind = match parent.kind() {
            // declarations and non-variable identifiers are not usages
            "variable_declarator" | "formal_parameter" | "catch_formal_parameter"
                if is_field("name") =>
            {
                continue;
            }
            "enhanced_for_statement" if is_field("name") => continue,
            "method_invocation" if is_field("name") => continue,
            "field_access" if is_field("field") => continue,
            "method_reference" | "labeled_statement" | "break_statement" | "continue_statement" => {
                continue;
            }
            "assignment_expression" if is_field("left") => {
                let compound = parent
                    .child_by_field_name("operator")
                    .map(|op| op.kind() != "=")
                    .unwrap_or(false);
                if compound {
                    UsageKind::ReadWrite
                } else {
                    UsageKind::Write
                }
            }
            "update_expression" => UsageKind::ReadWrite,
            _ => UsageKind::Read,
        };
        if let Ok(text) = n.utf8_text(source.as_bytes()) {
            usages.push(Usage {
                name: text.to_string(),
                offset: n.start_byte() as u32,
                kind,
            });
        }
    }
    usages
}

/// Latest declaration of `name` before `offset`, if any.
fn governing_decl<'d>(decls: &'d [Declaration], name: &str, offset: u32) -> Option<&'d Declaration> {
    decls
        .iter()
        .filter(|d| d.name == name && d.offset < offset)
        .max_by_key(|d| d.offset)
}

/// Names read inside the range whose governing declaration sits before it.
/// Anything without a method-local declaration is a field or static and
/// passes for free.
fn parameter_list(
    decls: &[Declaration],
    usages: &[Usage],
    range: OffsetPair,
) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = Vec::new();
    for u in usages {
        if !range.contains_offset(u.offset) || u.kind == UsageKind::Write {
            continue;
        }
        if let Some(d) = governing_decl(decls, &u.name, u.offset) {
            if d.offset < range.a && !params.iter().any(|(n, _)| n == &u.name) {
                params.push((d.name.clone(), d.ty.clone()));
            }
        }
    }
    params
}

/// At most one local may outlive the range: either a variable declared inside
/// it and read after, or one declared before it, written inside, and read
/// after. More than one cannot be returned from a single new method.
fn return_value(
    decls: &[Declaration],
    usages: &[Usage],
    range: OffsetPair,
) -> std::result::Result<Option<ReturnValue>, String> {
    let mut escapes: Vec<ReturnValue> = Vec::new();
    let mut note = |name: &str, ty: &str, declared_inside: bool| {
        if !escapes.iter().any(|e| e.name == name) {
            escapes.push(ReturnValue {
                name: name.to_string(),
                ty: ty.to_string(),
                declared_inside,
            });
        }
    };
    for u in usages {
        if u.offset < range.b || u.kind == UsageKind::Write {
            continue;
        }
        // a read after the range; does the range own its value?
        if let Some(d) = governing_decl(decls, &u.name, u.offset) {
            if range.contains_offset(d.offset) {
                note(&d.name, &d.ty, true);
            } else if d.offset < range.a {
                let written_inside = usages.iter().any(|w| {
                    w.name == u.name
                        && range.contains_offset(w.offset)
                        && w.kind != UsageKind::Read
                });
                if written_inside {
                    note(&d.name, &d.ty, false);
                }
            }
        }
    }
    match escapes.len() {
        0 | 1 => Ok(escapes.pop()),
        n => Err(format!("{} local variables escape the selection", n)),
    }
}

fn has_static_modifier(method: Node, source: &str) -> bool {
    named_children(&method)
        .into_iter()
        .filter(|c| c.kind() == "modifiers")
        .any(|m| {
            m.utf8_text(source.as_bytes())
                .map(|t| t.split_whitespace().any(|w| w == "static"))
                .unwrap_or(false)
        })
}

fn throws_clause(method: Node, source: &str) -> Option<String> {
    named_children(&method)
        .into_iter()
        .find(|c| c.kind() == "throws")
        .and_then(|t| t.utf8_text(source.as_bytes()).ok())
        .map(|t| t.to_string())
}

fn line_indent(source: &str, offset: usize) -> String {
    let line_start = source[..offset].rfind('\n').map(|p| p + 1).unwrap_or(0);
    source[line_start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

// ---- edit construction ----------------------------------------------------

/// Two forward edits: replace the range with a call, then insert the new
/// method after the enclosing one. Offsets in the list are expressed in the
/// coordinates left by the preceding edit.
fn build_edits(
    source: &str,
    range: OffsetPair,
    new_name: &str,
    analysis: &RangeAnalysis,
) -> ExtractionMetrics {
    let range_text = &source[range.a as usize..range.b as usize];
    let args: Vec<&str> = analysis.params.iter().map(|(n, _)| n.as_str()).collect();
    let params: Vec<String> = analysis
        .params
        .iter()
        .map(|(n, t)| format!("{} {}", t, n))
        .collect();

    let (call, ret_type, trailer) = match &analysis.ret {
        Some(r) if r.declared_inside => (
            format!("{} {} = {}({});", r.ty, r.name, new_name, args.join(", ")),
            r.ty.clone(),
            format!("\n{}return {};", analysis.range_indent, r.name),
        ),
        Some(r) => (
            format!("{} = {}({});", r.name, new_name, args.join(", ")),
            r.ty.clone(),
            format!("\n{}return {};", analysis.range_indent, r.name),
        ),
        None => (
            format!("{}({});", new_name, args.join(", ")),
            "void".to_string(),
            String::new(),
        ),
    };

    let statik = if analysis.is_static { "static " } else { "" };
    let throws = analysis
        .throws
        .as_deref()
        .map(|t| format!(" {}", t))
        .unwrap_or_default();
    let method_text = format!(
        "\n\n{indent}private {statik}{ret} {name}({params}){throws} {{\n{body_indent}{body}{trailer}\n{indent}}}",
        indent = analysis.method_indent,
        statik = statik,
        ret = ret_type,
        name = new_name,
        params = params.join(", "),
        throws = throws,
        body_indent = analysis.range_indent,
        body = range_text,
        trailer = trailer,
    );

    let replace = Edit::replace(range.a, range_text, call);
    // the insertion point trails the replaced range, so it shifts by its delta
    let delta = replace.inserted.len() as i64 - replace.removed.len() as i64;
    let insert_at = (analysis.method_end as i64 + delta) as u32;
    let insert = Edit::insert(insert_at, method_text);
    let undo_changes = vec![insert.invert(), replace.invert()];

    ExtractionMetrics {
        feasible: true,
        applied: true,
        extracted_loc: analysis.loc,
        param_count: analysis.params.len() as u32,
        changes: vec![replace, insert],
        undo_changes,
        ..ExtractionMetrics::default()
    }
}
