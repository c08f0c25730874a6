//! Timing side-channel restrictions.
//!
//! Fragment shaders may sample textures, but no sampler-derived value may
//! steer control flow or feed the coordinate or bias of another lookup.
//! Vertex shaders may not touch samplers at all.

use std::collections::VecDeque;

use glslt_ast::{Ast, Diagnostics, Handle, Node, Visitor, Walk, traverse};

use crate::dependency_graph::{DependencyGraph, GraphNodeKind};

/// Built-in lookups whose argument 1 is a coordinate and argument 2 a bias.
const SAMPLING_OPS: &[&str] = &[
    "texture2D(s21;vf2;",
    "texture2D(s21;vf2;f1;",
    "texture2DProj(s21;vf3;",
    "texture2DProj(s21;vf4;",
    "texture2DProj(s21;vf3;f1;",
    "texture2DProj(s21;vf4;f1;",
    "textureCube(sC1;vf3;",
    "textureCube(sC1;vf3;f1;",
];

fn is_sampling_op(name: &str, user_defined: bool) -> bool {
    !user_defined && SAMPLING_OPS.contains(&name)
}

/// Reports every place a sampler-dependent value reaches a restricted use.
/// Returns the number of violations.
pub fn restrict_fragment_shader_timing(
    ast: &Ast,
    graph: &DependencyGraph,
    diags: &mut Diagnostics,
) -> usize {
    let mut errors = 0;

    for &call in graph.user_defined_calls() {
        let loc = ast.loc(graph.node(call).kind.ast_node());
        diags.error_at(loc, "A call to a user defined function is not permitted.");
        errors += 1;
    }

    for &sampler in graph.sampler_symbols() {
        let mut visited = vec![false; graph.len()];
        let mut queue = VecDeque::from([sampler]);
        visited[sampler.index()] = true;

        while let Some(id) = queue.pop_front() {
            let node = graph.node(id);
            let loc = ast.loc(node.kind.ast_node());
            let message = match &node.kind {
                GraphNodeKind::Argument {
                    name,
                    user_defined,
                    index,
                    ..
                } if is_sampling_op(name, *user_defined) => match index {
                    1 => Some(
                        "An expression dependent on a sampler is not permitted to be the coordinate argument of a sampling operation."
                            .to_string(),
                    ),
                    2 => Some(
                        "An expression dependent on a sampler is not permitted to be the bias argument of a sampling operation."
                            .to_string(),
                    ),
                    _ => None,
                },
                GraphNodeKind::Selection { .. } => Some(
                    "An expression dependent on a sampler is not permitted in a conditional statement."
                        .to_string(),
                ),
                GraphNodeKind::Loop { .. } => Some(
                    "An expression dependent on a sampler is not permitted in a loop condition."
                        .to_string(),
                ),
                GraphNodeKind::LogicalOp { op, .. } => Some(format!(
                    "An expression dependent on a sampler is not permitted on the left hand side of a logical {} operator.",
                    op.as_str()
                )),
                _ => None,
            };
            if let Some(message) = message {
                diags.error_at(loc, message);
                errors += 1;
            }

            for &dependent in &node.dependents {
                if !visited[dependent.index()] {
                    visited[dependent.index()] = true;
                    queue.push_back(dependent);
                }
            }
        }
    }

    log::debug!("fragment timing restrictions: {errors} violation(s)");
    errors
}

/// Rejects every sampler reference below `root`. Returns the number of
/// violations.
pub fn restrict_vertex_shader_timing(ast: &Ast, root: Handle<Node>, diags: &mut Diagnostics) -> usize {
    struct SamplerUses<'d> {
        diags: &'d mut Diagnostics,
        errors: usize,
    }

    impl Visitor for SamplerUses<'_> {
        fn visit_symbol(&mut self, ast: &Ast, _: &Walk, node: Handle<Node>) {
            if ast.ty(node).is_sampler() {
                self.errors += 1;
                self.diags
                    .error_at(ast.loc(node), "Samplers are not permitted in vertex shaders.");
            }
        }
    }

    let mut uses = SamplerUses { diags, errors: 0 };
    traverse(ast, root, &mut uses);
    log::debug!("vertex timing restrictions: {} violation(s)", uses.errors);
    uses.errors
}
