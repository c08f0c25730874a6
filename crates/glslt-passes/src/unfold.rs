//! Short-circuit unfolding: `a && b` becomes `a ? b : false` and `a || b`
//! becomes `a ? true : b`, for drivers that evaluate both operands.

use glslt_ast::{
    Ast, ConstantUnion, Diagnostics, Handle, Node, NodeKind, NodeUpdate, Operator, Type, Visit,
    Visitor, Walk, traverse,
};

use crate::{Pass, PassContext};

#[derive(Debug)]
pub struct UnfoldShortCircuit;

impl Pass for UnfoldShortCircuit {
    fn name(&self) -> &str {
        "unfold-short-circuit"
    }

    fn run(&self, cx: &mut PassContext<'_>, _: &mut Diagnostics) -> bool {
        let mut finder = LogicalOps::default();
        traverse(cx.ast, cx.root, &mut finder);

        let mut updates = Vec::with_capacity(finder.found.len());
        for found in finder.found {
            let loc = cx.ast.loc(found.node);
            let ty = cx.ast.ty(found.node);
            let (true_block, false_block) = match found.op {
                Operator::LogicalAnd => {
                    let no = cx.ast.add_constant(vec![ConstantUnion::Bool(false)], Type::BOOL, loc);
                    (found.right, no)
                }
                _ => {
                    let yes = cx.ast.add_constant(vec![ConstantUnion::Bool(true)], Type::BOOL, loc);
                    (yes, found.right)
                }
            };
            let replacement = cx.ast.append(
                NodeKind::Selection {
                    condition: found.left,
                    true_block: Some(true_block),
                    false_block: Some(false_block),
                    ty,
                },
                loc,
            );
            updates.push(NodeUpdate {
                parent: found.parent,
                original: found.node,
                replacement,
                original_becomes_child_of_replacement: false,
            });
        }
        let applied = cx.ast.apply_updates(updates);
        log::debug!("unfolded {applied} logical operator(s)");
        true
    }
}

struct Found {
    parent: Handle<Node>,
    node: Handle<Node>,
    op: Operator,
    left: Handle<Node>,
    right: Handle<Node>,
}

#[derive(Default)]
struct LogicalOps {
    found: Vec<Found>,
}

impl Visitor for LogicalOps {
    fn visit_binary(&mut self, ast: &Ast, walk: &Walk, _: Visit, node: Handle<Node>) -> bool {
        if let NodeKind::Binary {
            op: op @ (Operator::LogicalAnd | Operator::LogicalOr),
            left,
            right,
            ..
        } = &ast.node(node).kind
        {
            if let Some(parent) = walk.parent() {
                self.found.push(Found {
                    parent,
                    node,
                    op: *op,
                    left: *left,
                    right: *right,
                });
            }
        }
        true
    }
}
