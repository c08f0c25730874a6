//! Indirect index clamping.

use glslt_ast::{
    ArrayIndexClampingStrategy, Ast, Diagnostics, Handle, Node, NodeKind, Operator, Visit,
    Visitor, Walk, traverse,
};

use crate::{Pass, PassContext};

/// Marks every indirect index into an array, vector or matrix so the
/// emitter clamps it to the indexed object's bounds.
#[derive(Debug)]
pub struct ClampIndirectArrayBounds;

impl Pass for ClampIndirectArrayBounds {
    fn name(&self) -> &str {
        "clamp-indirect-array-bounds"
    }

    fn run(&self, cx: &mut PassContext<'_>, _: &mut Diagnostics) -> bool {
        let mut finder = IndirectIndices::default();
        traverse(cx.ast, cx.root, &mut finder);
        if finder.nodes.is_empty() {
            return true;
        }

        for &node in &finder.nodes {
            if let NodeKind::Binary {
                add_index_clamp, ..
            } = &mut cx.ast.node_mut(node).kind
            {
                *add_index_clamp = true;
            }
        }
        cx.needs_int_clamp |= cx.resources.array_index_clamping_strategy
            == ArrayIndexClampingStrategy::UserDefinedIntFunction;
        log::debug!("clamping {} indirect index(es)", finder.nodes.len());
        true
    }
}

#[derive(Default)]
struct IndirectIndices {
    nodes: Vec<Handle<Node>>,
}

impl Visitor for IndirectIndices {
    fn visit_binary(&mut self, ast: &Ast, _: &Walk, _: Visit, node: Handle<Node>) -> bool {
        if let NodeKind::Binary {
            op: Operator::IndexIndirect,
            left,
            ..
        } = &ast.node(node).kind
        {
            let base = ast.ty(*left);
            if base.is_array() || base.is_vector() || base.is_matrix() {
                self.nodes.push(node);
            }
        }
        true
    }
}
