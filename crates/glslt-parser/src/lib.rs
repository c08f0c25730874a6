//! GLSL ES front end for glslt.
//!
//! Turns shader source fragments into a typed [`glslt_ast::Ast`]. Text goes
//! through directive handling ([`directives`]), tokenization ([`lexer`])
//! and a recursive-descent parser whose semantic actions type-check and
//! fold expressions through the AST builder as nodes are created.

mod context;
pub mod directives;
pub mod lexer;
mod parser;

use std::collections::BTreeMap;

use glslt_ast::{Ast, Diagnostics, Handle, Node, Resources, ShaderStage, SymbolTable};

pub use directives::{Behavior, Pragma, Preprocessed};

/// Front-end settings derived from the compile target.
#[derive(Clone, Debug)]
pub struct ParseOptions {
    pub stage: ShaderStage,
    /// WebGL rules: `webgl_` names are reserved.
    pub webgl: bool,
    /// CSS shader rules: `css_` names are reserved as well.
    pub css: bool,
    /// Highest `#version` the target accepts.
    pub max_version: u32,
    pub max_token_length: usize,
    pub resources: Resources,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            stage: ShaderStage::Fragment,
            webgl: false,
            css: false,
            max_version: 300,
            max_token_length: 1024,
            resources: Resources::default(),
        }
    }
}

/// Result of a successful parse.
#[derive(Clone, Debug)]
pub struct ParsedShader {
    /// Operator-less aggregate of the external declarations.
    pub root: Handle<Node>,
    pub version: u32,
    pub extensions: BTreeMap<String, Behavior>,
    pub pragma: Pragma,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{errors} compilation errors.  No code generated.")]
    Failed { errors: usize },
    #[error("no source to compile")]
    NoSource,
}

/// Parse `sources` into `ast`, declaring globals in `symbols`.
///
/// The caller opens the global scope on `symbols` and the arena scope on
/// `ast` beforehand and closes both afterwards. Every problem found is
/// appended to `diags`; the parse fails if any of them is an error.
pub fn parse(
    sources: &[&str],
    ast: &mut Ast,
    symbols: &mut SymbolTable,
    options: &ParseOptions,
    diags: &mut Diagnostics,
) -> Result<ParsedShader, ParseError> {
    if sources.is_empty() {
        return Err(ParseError::NoSource);
    }
    let pre = directives::preprocess(sources, options, diags);
    if pre.version > options.max_version {
        diags.global_error(format!("unsupported shader version {}", pre.version));
    }
    let lexemes = lexer::tokenize(&pre, options.max_token_length, diags)?;
    let failed = |diags: &Diagnostics| ParseError::Failed {
        errors: diags.error_count(),
    };
    if diags.has_errors() {
        return Err(failed(diags));
    }

    let root = {
        let cx = context::ParseContext::new(
            ast,
            symbols,
            diags,
            options,
            pre.version,
            pre.extensions.clone(),
        );
        parser::Parser::new(cx, &pre.text, &lexemes).translation_unit()
    };
    match root {
        Some(root) if !diags.has_errors() => {
            log::debug!(
                "parsed {} source fragment(s), version {}",
                sources.len(),
                pre.version
            );
            Ok(ParsedShader {
                root,
                version: pre.version,
                extensions: pre.extensions,
                pragma: pre.pragma,
            })
        }
        _ => Err(failed(diags)),
    }
}
