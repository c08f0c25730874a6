//! Loop-unroll markup for sampler arrays indexed by a loop index.
//!
//! Many drivers only accept constant sampler array indices, so a `for`
//! loop whose index selects a sampler is marked for full unrolling by the
//! emitter.

use glslt_ast::{
    Ast, BasicType, Diagnostics, Handle, LoopKind, Node, NodeKind, Operator, Visit, Visitor, Walk,
    traverse, traverse_with,
};

use crate::{Pass, PassContext};

/// Marks `for` loops whose index is used to index a sampler array.
#[derive(Debug)]
pub struct MarkSamplerArrayLoops;

impl Pass for MarkSamplerArrayLoops {
    fn name(&self) -> &str {
        "mark-sampler-array-loops"
    }

    fn run(&self, cx: &mut PassContext<'_>, diags: &mut Diagnostics) -> bool {
        let mut marker = Marker::default();
        traverse(cx.ast, cx.root, &mut marker);

        for &node in &marker.marked {
            if let NodeKind::Loop { unroll, .. } = &mut cx.ast.node_mut(node).kind {
                *unroll = true;
            }
        }
        log::debug!("marked {} loop(s) for unrolling", marker.marked.len());

        if marker.float_index {
            diags.global_error("sampler array index is float loop index");
            return false;
        }
        true
    }
}

/// Unique id of the index declared by a `for` loop's init statement.
pub(crate) fn loop_index(ast: &Ast, init: Option<Handle<Node>>) -> Option<u32> {
    let declaration = init?;
    let NodeKind::Aggregate {
        op: Operator::Declaration,
        children,
        ..
    } = &ast.node(declaration).kind
    else {
        return None;
    };
    let &[declarator] = children.as_slice() else {
        return None;
    };
    let symbol = match &ast.node(declarator).kind {
        NodeKind::Binary {
            op: Operator::Initialize,
            left,
            ..
        } => *left,
        NodeKind::Symbol { .. } => declarator,
        _ => return None,
    };
    ast.node(symbol).as_symbol().map(|(id, _)| id)
}

#[derive(Default)]
struct Marker {
    /// Enclosing `for` loops with their index ids, innermost last.
    loops: Vec<(Handle<Node>, u32)>,
    in_sampler_index: bool,
    marked: Vec<Handle<Node>>,
    float_index: bool,
}

impl Visitor for Marker {
    fn post_visit(&self) -> bool {
        true
    }

    fn visit_loop(&mut self, ast: &Ast, _: &Walk, visit: Visit, node: Handle<Node>) -> bool {
        let NodeKind::Loop { kind, init, .. } = &ast.node(node).kind else {
            return true;
        };
        if *kind != LoopKind::For {
            return true;
        }
        match visit {
            Visit::Pre => {
                if let Some(index) = loop_index(ast, *init) {
                    self.loops.push((node, index));
                }
            }
            Visit::Post => {
                if self.loops.last().is_some_and(|&(l, _)| l == node) {
                    self.loops.pop();
                }
            }
            Visit::In => {}
        }
        true
    }

    fn visit_binary(&mut self, ast: &Ast, walk: &Walk, visit: Visit, node: Handle<Node>) -> bool {
        if visit != Visit::Pre || self.loops.is_empty() {
            return true;
        }
        let NodeKind::Binary {
            op: Operator::IndexIndirect,
            left,
            right,
            ..
        } = &ast.node(node).kind
        else {
            return true;
        };
        let base = ast.ty(*left);
        if ast.node(*left).as_symbol().is_none() || !base.is_sampler() || !base.is_array() {
            return true;
        }
        self.in_sampler_index = true;
        traverse_with(ast, *right, self, &mut walk.clone());
        self.in_sampler_index = false;
        false
    }

    fn visit_symbol(&mut self, ast: &Ast, _: &Walk, node: Handle<Node>) {
        if !self.in_sampler_index {
            return;
        }
        let Some((id, _)) = ast.node(node).as_symbol() else {
            return;
        };
        let Some(&(target, _)) = self.loops.iter().rev().find(|&&(_, index)| index == id) else {
            return;
        };
        if ast.ty(node).basic == BasicType::Float {
            self.float_index = true;
        } else if !self.marked.contains(&target) {
            self.marked.push(target);
        }
    }
}
