//! Passes run by the glslt compiler driver.
//!
//! Provides a [`Pass`] trait, the [`PassContext`] every pass works on, a
//! [`PassManager`] that stops at the first failing pass, and the passes
//! themselves: validators wrapping the analyses of `glslt-analysis` and
//! the in-place rewriters (entry-point rename, loop-unroll markup,
//! built-in emulation, index clamping, variable initialization,
//! short-circuit unfolding and struct-name regeneration).

mod clamp;
pub mod emulation;
mod initialize;
mod rename;
mod struct_names;
mod unfold;
mod unroll;
mod validate;

pub use clamp::ClampIndirectArrayBounds;
pub use emulation::EmulateBuiltInFunctions;
pub use initialize::{InitTarget, InitializeVariables};
pub use rename::RewriteCssShader;
pub use struct_names::{REGENERATED_STRUCT_PREFIX, RegenerateStructNames};
pub use unfold::UnfoldShortCircuit;
pub use unroll::MarkSamplerArrayLoops;
pub use validate::{
    CollectVariables, DetectCallDepth, LimitExpressionComplexity, RestrictTiming,
    ValidateLimitations, ValidateOutputs,
};

use std::collections::BTreeSet;
use std::fmt::Debug;

use glslt_analysis::{NameHasher, ShaderVariables};
use glslt_ast::{
    Ast, ConstantUnion, Diagnostics, Handle, Node, NodeKind, Operator, Resources, ShaderStage,
    SourceLoc, SymbolTable, Type,
};

/// A validation or rewriting step over one parsed shader.
pub trait Pass: Debug {
    /// Human-readable name of the pass.
    fn name(&self) -> &str;

    /// Run the pass. Returns `false` if the shader must be rejected; the
    /// reasons are in `diags`.
    fn run(&self, cx: &mut PassContext<'_>, diags: &mut Diagnostics) -> bool;
}

/// Everything a pass may read or rewrite during one compile.
pub struct PassContext<'a> {
    pub ast: &'a mut Ast,
    /// The translation unit's top-level aggregate.
    pub root: Handle<Node>,
    /// Built-in levels plus the compile's global scope.
    pub symbols: &'a mut SymbolTable,
    pub stage: ShaderStage,
    /// `#version` of the shader.
    pub version: u32,
    pub resources: &'a Resources,
    pub hasher: NameHasher,
    /// Filled by [`CollectVariables`].
    pub variables: ShaderVariables,
    /// Mangled names of the built-in calls marked for emulation.
    pub emulated_functions: BTreeSet<String>,
    /// Some clamped index uses the `webgl_int_clamp` helper.
    pub needs_int_clamp: bool,
}

impl<'a> PassContext<'a> {
    pub fn new(
        ast: &'a mut Ast,
        root: Handle<Node>,
        symbols: &'a mut SymbolTable,
        stage: ShaderStage,
        version: u32,
        resources: &'a Resources,
    ) -> Self {
        Self {
            ast,
            root,
            symbols,
            stage,
            version,
            resources,
            hasher: NameHasher::new(resources.hash_function),
            variables: ShaderVariables::default(),
            emulated_functions: BTreeSet::new(),
            needs_int_clamp: false,
        }
    }
}

/// Runs passes in sequence until one fails.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PassManager {
    /// Creates an empty pass manager with no passes.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Adds a pass to the pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Pass names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Runs every pass in order. Stops at, and reports, the first failure.
    pub fn run(&self, cx: &mut PassContext<'_>, diags: &mut Diagnostics) -> bool {
        for pass in &self.passes {
            log::debug!("running pass {}", pass.name());
            if !pass.run(cx, diags) {
                log::debug!("pass {} failed", pass.name());
                return false;
            }
        }
        true
    }
}

/// The statement list of `main`, created empty when `main` has no body.
pub(crate) fn main_body(ast: &mut Ast, root: Handle<Node>) -> Option<Handle<Node>> {
    let main = ast.find_function(root, "main(")?;
    let existing = ast.children(main).get(1).copied();
    if let Some(body) = existing {
        return Some(body);
    }
    let body = ast.aggregate(Operator::Sequence, Vec::new(), ast.loc(main));
    if let NodeKind::Aggregate { children, .. } = &mut ast.node_mut(main).kind {
        children.push(body);
    }
    Some(body)
}

/// Inserts `statements` in front of the children of `block`.
pub(crate) fn prepend_statements(ast: &mut Ast, block: Handle<Node>, statements: Vec<Handle<Node>>) {
    if let NodeKind::Aggregate { children, .. } = &mut ast.node_mut(block).kind {
        children.splice(0..0, statements);
    }
}

/// Unique id and type of a variable visible at global scope.
pub(crate) fn global_variable(cx: &PassContext<'_>, name: &str) -> Option<(u32, Type)> {
    let lookup = cx.symbols.find(name, cx.version)?;
    let variable = lookup.symbol.as_variable()?;
    Some((variable.id, variable.ty))
}

/// An all-zero constant of `ty`, or `None` for opaque and struct types.
pub(crate) fn zero_constant(ast: &mut Ast, ty: &Type, loc: SourceLoc) -> Option<Handle<Node>> {
    if ty.is_struct() {
        return None;
    }
    let zero = ConstantUnion::zero(ty.basic)?;
    let size = ast.object_size(ty);
    Some(ast.add_constant(vec![zero; size], *ty, loc))
}
