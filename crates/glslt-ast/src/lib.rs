//! glslt abstract syntax tree.
//!
//! An arena-backed, handle-linked tree for GLSL ES shaders together with
//! the type model, type promotion, constant folding, the scoped symbol
//! table and the built-in symbols every compile starts from.

pub mod arena;
mod builtins;
pub mod constant;
pub mod diagnostics;
mod display;
mod error;
pub mod fold;
mod intermediate;
pub mod node;
pub mod operator;
pub mod promote;
pub mod resources;
pub mod symbol_table;
pub mod traverse;
pub mod types;

pub use arena::{Arena, Handle};
pub use builtins::insert_builtins;
pub use constant::ConstantUnion;
pub use diagnostics::{Diagnostic, Diagnostics, Severity, SourceLoc};
pub use display::dump_tree;
pub use error::{ArenaError, PromoteError, SymbolError};
pub use fold::DIVIDE_BY_ZERO_WARNING;
pub use node::{Ast, BranchKind, LoopKind, Node, NodeKind, NodeUpdate};
pub use operator::Operator;
pub use resources::{ArrayIndexClampingStrategy, HashFunction, Resources, ShaderStage};
pub use symbol_table::{Function, Lookup, Parameter, Symbol, SymbolTable, Variable};
pub use traverse::{Visit, Visitor, Walk, max_depth, traverse, traverse_with};
pub use types::{
    BasicType, Field, InterfaceBlock, LayoutQualifier, Precision, Qualifier, StructType, Type,
};
