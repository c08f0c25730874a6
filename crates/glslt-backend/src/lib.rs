#![warn(missing_docs)]
//! Backend trait and emitters for glslt.
//!
//! Defines the [`Backend`] trait that every output format implements,
//! along with supporting types ([`BackendInput`], [`BackendOutput`],
//! [`BackendError`]) and a [`BackendRegistry`] used by the compiler and
//! the CLI to dispatch on a target name.

mod essl;

pub use essl::EsslBackend;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug};

use glslt_analysis::NameHasher;
use glslt_ast::{ArrayIndexClampingStrategy, Ast, Diagnostics, Handle, Node, ShaderStage};
use glslt_parser::{Behavior, Pragma};

/// A backend that turns a validated, rewritten tree into output text.
pub trait Backend: Debug + Send + Sync {
    /// Human-readable name (e.g. "ESSL").
    fn name(&self) -> &str;

    /// Target identifiers this backend handles (for `--target` dispatch).
    fn targets(&self) -> &[&str];

    /// Emit the tree. Identifiers go through `names`, which records every
    /// mapping it hands out.
    fn compile(
        &self,
        input: &BackendInput<'_>,
        names: &mut NameHasher,
    ) -> Result<BackendOutput, BackendError>;
}

/// Everything the passes left for the emitter.
#[derive(Clone, Copy, Debug)]
pub struct BackendInput<'a> {
    /// The rewritten tree.
    pub ast: &'a Ast,
    /// The translation unit's top-level sequence.
    pub root: Handle<Node>,
    /// Stage being compiled.
    pub stage: ShaderStage,
    /// `#version` of the shader.
    pub version: u32,
    /// Extension behaviors requested by the shader.
    pub extensions: &'a BTreeMap<String, Behavior>,
    /// `#pragma` state.
    pub pragma: Pragma,
    /// Mangled names of the built-in calls marked for emulation.
    pub emulated_functions: &'a BTreeSet<String>,
    /// How clamped indices are written.
    pub clamping: ArrayIndexClampingStrategy,
    /// Some clamped index uses the `webgl_int_clamp` helper.
    pub needs_int_clamp: bool,
}

/// The output produced by a backend.
#[derive(Clone, Debug, Default)]
pub struct BackendOutput {
    /// One or more output files.
    pub files: Vec<OutputFile>,
    /// Non-fatal diagnostics.
    pub diagnostics: Diagnostics,
}

impl BackendOutput {
    /// The whole output as one string, files in order.
    pub fn text(&self) -> String {
        self.files.iter().map(|f| f.content.as_str()).collect()
    }
}

impl fmt::Display for BackendOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s), {} diagnostic(s)",
            self.files.len(),
            self.diagnostics.len()
        )
    }
}

/// A single output file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFile {
    /// Suggested filename (e.g. "shader.frag", "shader.ast").
    pub name: String,
    /// The file content.
    pub content: String,
}

impl fmt::Display for OutputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} chars)", self.name, self.content.len())
    }
}

/// Errors that can occur during emission.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The tree uses a construct this backend cannot express.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// No backend handles the requested target.
    #[error("unknown target '{0}'")]
    UnknownTarget(String),
    /// A general backend error.
    #[error("{0}")]
    Other(String),
}

/// Registry of available backends, used for `--target` dispatch.
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Creates a registry pre-populated with built-in backends.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(EsslBackend));
        reg.register(Box::new(AstDumpBackend));
        reg
    }

    /// Registers a backend.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.push(backend);
    }

    /// Finds a backend that handles the given target identifier.
    pub fn find(&self, target: &str) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.targets().contains(&target))
            .map(|b| &**b)
    }

    /// Like [`find`](Self::find), failing with [`BackendError::UnknownTarget`].
    pub fn require(&self, target: &str) -> Result<&dyn Backend, BackendError> {
        self.find(target)
            .ok_or_else(|| BackendError::UnknownTarget(target.to_string()))
    }

    /// Lists all supported target identifiers.
    pub fn list_targets(&self) -> Vec<&str> {
        self.backends
            .iter()
            .flat_map(|b| b.targets().iter().copied())
            .collect()
    }
}

/// Built-in backend that dumps the tree as text using [`glslt_ast::dump_tree`].
#[derive(Debug)]
pub struct AstDumpBackend;

impl Backend for AstDumpBackend {
    fn name(&self) -> &str {
        "AST Dump"
    }

    fn targets(&self) -> &[&str] {
        &["ast-dump", "ast"]
    }

    fn compile(
        &self,
        input: &BackendInput<'_>,
        _names: &mut NameHasher,
    ) -> Result<BackendOutput, BackendError> {
        let text = glslt_ast::dump_tree(input.ast, input.root);
        Ok(BackendOutput {
            files: vec![OutputFile {
                name: "shader.ast".into(),
                content: text,
            }],
            diagnostics: Diagnostics::new(),
        })
    }
}
