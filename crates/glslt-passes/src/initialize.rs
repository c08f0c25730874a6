//! Vertex output initialization.

use std::collections::HashMap;

use glslt_ast::{
    Ast, BasicType, ConstantUnion, Diagnostics, Handle, Node, NodeKind, Operator, ShaderStage,
    SourceLoc, Type, Visit, Visitor, Walk, traverse,
};

use crate::{Pass, PassContext, global_variable, main_body, prepend_statements, zero_constant};

/// What [`InitializeVariables`] zero-fills at the top of `main`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitTarget {
    /// `gl_Position = vec4(0.0);`
    GlPosition,
    /// Every varying output the shader declares but never uses,
    /// `gl_Position` included.
    UnusedVaryings,
}

/// Prepends zero-initialization of vertex outputs to `main`. Does nothing
/// for fragment shaders.
#[derive(Debug)]
pub struct InitializeVariables {
    pub target: InitTarget,
}

impl Pass for InitializeVariables {
    fn name(&self) -> &str {
        match self.target {
            InitTarget::GlPosition => "initialize-gl-position",
            InitTarget::UnusedVaryings => "initialize-unused-varyings",
        }
    }

    fn run(&self, cx: &mut PassContext<'_>, _: &mut Diagnostics) -> bool {
        if cx.stage != ShaderStage::Vertex {
            return true;
        }

        let mut targets = Vec::new();
        match self.target {
            InitTarget::GlPosition => {
                if let Some((id, ty)) = global_variable(cx, "gl_Position") {
                    targets.push((id, "gl_Position".to_string(), ty));
                }
            }
            InitTarget::UnusedVaryings => {
                let mut usage = VaryingUsage::default();
                traverse(cx.ast, cx.root, &mut usage);
                for (id, name, ty) in usage.declared {
                    if usage.used.get(&id).copied().unwrap_or(0) == 0 {
                        targets.push((id, name, ty));
                    }
                }
                if let Some((id, ty)) = global_variable(cx, "gl_Position") {
                    if !usage.used.contains_key(&id) {
                        targets.push((id, "gl_Position".to_string(), ty));
                    }
                }
            }
        }
        if targets.is_empty() {
            return true;
        }

        let Some(body) = main_body(cx.ast, cx.root) else {
            // Missing main() was already reported by the parser.
            return true;
        };
        let loc = cx.ast.loc(body);
        let mut statements = Vec::new();
        for (id, name, ty) in &targets {
            log::debug!("zero-initializing {name}");
            initialize(cx.ast, *id, name, *ty, loc, &mut statements);
        }
        prepend_statements(cx.ast, body, statements);
        true
    }
}

/// Appends `name = 0` to `out`, element by element for arrays.
fn initialize(
    ast: &mut Ast,
    id: u32,
    name: &str,
    ty: Type,
    loc: SourceLoc,
    out: &mut Vec<Handle<Node>>,
) {
    let Some(size) = ty.array_size else {
        let target = ast.add_symbol(id, name, ty, loc);
        if let Some(statement) = zero_assignment(ast, target, &ty, loc) {
            out.push(statement);
        }
        return;
    };
    let element = ty.element_type();
    for i in 0..size {
        let base = ast.add_symbol(id, name, ty, loc);
        let index = ast.add_constant(
            vec![ConstantUnion::Int(i as i32)],
            Type::scalar(BasicType::Int),
            loc,
        );
        let target = ast.add_index(base, index, loc);
        if let Some(statement) = zero_assignment(ast, target, &element, loc) {
            out.push(statement);
        }
    }
}

fn zero_assignment(
    ast: &mut Ast,
    target: Handle<Node>,
    ty: &Type,
    loc: SourceLoc,
) -> Option<Handle<Node>> {
    let zero = zero_constant(ast, ty, loc)?;
    ast.add_assign(Operator::Assign, target, zero, loc).ok()
}

/// Global varying-out declarations and the number of uses of every symbol
/// outside global declarations.
#[derive(Default)]
struct VaryingUsage {
    declared: Vec<(u32, String, Type)>,
    used: HashMap<u32, usize>,
}

impl Visitor for VaryingUsage {
    fn visit_aggregate(&mut self, ast: &Ast, walk: &Walk, visit: Visit, node: Handle<Node>) -> bool {
        if visit != Visit::Pre || walk.depth() != 1 {
            return true;
        }
        match &ast.node(node).kind {
            NodeKind::Aggregate {
                op: Operator::Declaration,
                children,
                ..
            } => {
                for &child in children {
                    let Some((id, name)) = ast.node(child).as_symbol() else {
                        continue;
                    };
                    let ty = ast.ty(child);
                    if ty.qualifier.is_varying_out() {
                        self.declared.push((id, name.to_string(), ty));
                    }
                }
                false
            }
            NodeKind::Aggregate {
                op: Operator::InvariantDeclaration,
                ..
            } => false,
            _ => true,
        }
    }

    fn visit_symbol(&mut self, ast: &Ast, _: &Walk, node: Handle<Node>) {
        if let Some((id, _)) = ast.node(node).as_symbol() {
            *self.used.entry(id).or_default() += 1;
        }
    }
}
