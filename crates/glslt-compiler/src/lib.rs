//! Compiler driver for glslt.
//!
//! A [`Compiler`] is bound to one stage, one [`ShaderSpec`] and one set of
//! [`Resources`]. Each call to [`Compiler::compile`] parses the sources,
//! runs the passes selected by [`CompileOptions`] in a fixed order, and
//! optionally runs a backend. The built-in symbol table is populated once
//! and survives between compiles; everything a compile allocates is
//! released before it returns.

mod options;

pub use options::{CompileOptions, ShaderSpec};

pub use glslt_analysis::{NameMap, ShaderVariable, ShaderVariables};
pub use glslt_ast::{
    ArrayIndexClampingStrategy, Diagnostic, Diagnostics, HashFunction, Resources, Severity,
    ShaderStage,
};
pub use glslt_backend::{Backend, BackendError, BackendRegistry};

use glslt_ast::{Ast, Handle, Node, Operator, SymbolTable, insert_builtins};
use glslt_backend::BackendInput;
use glslt_parser::{ParseOptions, ParsedShader, parse};
use glslt_passes::{
    ClampIndirectArrayBounds, CollectVariables, DetectCallDepth, EmulateBuiltInFunctions,
    InitTarget, InitializeVariables, LimitExpressionComplexity, MarkSamplerArrayLoops,
    PassContext, PassManager, RegenerateStructNames, RestrictTiming, RewriteCssShader,
    UnfoldShortCircuit, ValidateLimitations, ValidateOutputs,
};

/// Target used when none is chosen with [`Compiler::with_backend`].
pub const DEFAULT_TARGET: &str = "essl";

/// Everything one compile produced.
#[derive(Clone, Debug, Default)]
pub struct CompileOutput {
    /// Whether the compile finished without errors.
    pub success: bool,
    /// Rendered diagnostics, one per line.
    pub info_log: String,
    pub diagnostics: Diagnostics,
    /// Backend output, with [`CompileOptions::OBJECT_CODE`].
    pub object_code: Option<String>,
    /// Tree dump, with [`CompileOptions::INTERMEDIATE_TREE`].
    pub ast_dump: Option<String>,
    /// The leading path fragment, with [`CompileOptions::SOURCE_PATH`].
    pub source_path: Option<String>,
    /// Reflection data, with [`CompileOptions::VARIABLES`].
    pub variables: ShaderVariables,
    /// Every identifier hashed during the compile.
    pub name_map: NameMap,
    /// `#version` of the shader, 100 when it has none.
    pub version: u32,
}

/// Translates shaders of one stage for one profile.
pub struct Compiler {
    stage: ShaderStage,
    spec: ShaderSpec,
    resources: Resources,
    registry: BackendRegistry,
    target: String,
    ast: Ast,
    symbols: SymbolTable,
    builtins_ready: bool,
}

impl Compiler {
    /// A compiler using the ESSL backend. Built-ins are inserted on the
    /// first compile.
    pub fn new(stage: ShaderStage, spec: ShaderSpec, resources: Resources) -> Self {
        Self {
            stage,
            spec,
            resources,
            registry: BackendRegistry::with_builtins(),
            target: DEFAULT_TARGET.to_string(),
            ast: Ast::new(),
            symbols: SymbolTable::new(),
            builtins_ready: false,
        }
    }

    /// Selects the backend run for [`CompileOptions::OBJECT_CODE`].
    pub fn with_backend(mut self, target: &str) -> Result<Self, BackendError> {
        self.registry.require(target)?;
        self.target = target.to_string();
        Ok(self)
    }

    /// Makes another backend available to [`with_backend`](Self::with_backend).
    pub fn register_backend(&mut self, backend: Box<dyn Backend>) {
        self.registry.register(backend);
    }

    /// The shader stage every compile is checked against.
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// The API profile.
    pub fn spec(&self) -> ShaderSpec {
        self.spec
    }

    /// Limits and extensions the built-ins were created from.
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Name of the selected backend.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Compiles `sources`, concatenated in order.
    pub fn compile(&mut self, sources: &[&str], options: CompileOptions) -> CompileOutput {
        let mut options = options;
        if self.spec.is_webgl() {
            options |= CompileOptions::VALIDATE_LOOP_INDEXING;
        }
        log::debug!("compiling {} shader for {} ({options})", self.stage, self.spec);

        let mut output = CompileOutput {
            version: 100,
            ..CompileOutput::default()
        };
        let mut sources = sources;
        if options.contains(CompileOptions::SOURCE_PATH) {
            if let Some((path, rest)) = sources.split_first() {
                output.source_path = Some((*path).to_string());
                sources = rest;
            }
        }

        let mut diags = Diagnostics::new();
        let success = self.ensure_builtins(&mut diags) && {
            self.symbols.push();
            self.ast.push();
            let success = self.run(sources, options, &mut diags, &mut output);
            let released = self.ast.pop();
            self.symbols.pop_to_global_boundary();
            log::debug!("released {released} node(s)");
            success
        };

        output.success = success && !diags.has_errors();
        if !output.success {
            output.object_code = None;
            output.ast_dump = None;
            output.variables = ShaderVariables::default();
            output.name_map = NameMap::new();
        }
        output.info_log = diags.info_log();
        output.diagnostics = diags;
        log::debug!(
            "{} shader compile {}",
            self.stage,
            if output.success { "succeeded" } else { "failed" }
        );
        output
    }

    fn ensure_builtins(&mut self, diags: &mut Diagnostics) -> bool {
        if self.builtins_ready {
            return true;
        }
        match insert_builtins(
            &mut self.symbols,
            &mut self.ast.structs,
            self.stage,
            &self.resources,
        ) {
            Ok(()) => {
                self.builtins_ready = true;
                true
            }
            Err(err) => {
                diags.global_error(format!("built-in symbols could not be declared: {err}"));
                false
            }
        }
    }

    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            stage: self.stage,
            webgl: self.spec.is_webgl(),
            css: self.spec == ShaderSpec::Css,
            max_version: self.spec.max_version(),
            max_token_length: self.spec.max_token_length(),
            resources: self.resources,
        }
    }

    /// Parse, passes and backend. Runs inside the per-compile scopes.
    fn run(
        &mut self,
        sources: &[&str],
        options: CompileOptions,
        diags: &mut Diagnostics,
        output: &mut CompileOutput,
    ) -> bool {
        let parse_options = self.parse_options();
        let parsed = match parse(sources, &mut self.ast, &mut self.symbols, &parse_options, diags)
        {
            Ok(parsed) => parsed,
            Err(err) => {
                log::debug!("parse failed: {err}");
                if diags.has_errors() {
                    diags.note(err.to_string());
                } else {
                    diags.global_error(err.to_string());
                }
                return false;
            }
        };
        output.version = parsed.version;
        let root = post_process(&mut self.ast, parsed.root);

        let passes = self.pipeline(options, parsed.version);
        log::debug!("pipeline: {}", passes.names().join(", "));
        let mut cx = PassContext::new(
            &mut self.ast,
            root,
            &mut self.symbols,
            self.stage,
            parsed.version,
            &self.resources,
        );
        if !passes.run(&mut cx, diags) {
            return false;
        }

        if options.contains(CompileOptions::INTERMEDIATE_TREE) {
            output.ast_dump = Some(glslt_ast::dump_tree(cx.ast, root));
        }
        if options.contains(CompileOptions::OBJECT_CODE) {
            let backend = match self.registry.require(&self.target) {
                Ok(backend) => backend,
                Err(err) => {
                    diags.global_error(err.to_string());
                    return false;
                }
            };
            let input = BackendInput {
                ast: cx.ast,
                root,
                stage: self.stage,
                version: parsed.version,
                extensions: &parsed.extensions,
                pragma: parsed.pragma,
                emulated_functions: &cx.emulated_functions,
                clamping: self.resources.array_index_clamping_strategy,
                needs_int_clamp: cx.needs_int_clamp,
            };
            match backend.compile(&input, &mut cx.hasher) {
                Ok(emitted) => {
                    output.object_code = Some(emitted.text());
                    for diagnostic in emitted.diagnostics.into_vec() {
                        diags.push(diagnostic);
                    }
                }
                Err(err) => {
                    diags.global_error(format!("{} backend: {err}", backend.name()));
                    return false;
                }
            }
        }

        let PassContext {
            hasher, variables, ..
        } = cx;
        output.variables = variables;
        output.name_map = hasher.into_map();
        true
    }

    /// The passes selected by `options`, in execution order.
    fn pipeline(&self, options: CompileOptions, version: u32) -> PassManager {
        let mut pm = PassManager::new();
        if options.contains(CompileOptions::LIMIT_EXPRESSION_COMPLEXITY) {
            pm.add_pass(Box::new(LimitExpressionComplexity));
        }
        pm.add_pass(Box::new(DetectCallDepth {
            limit_depth: options.contains(CompileOptions::LIMIT_CALL_STACK_DEPTH),
        }));
        if version >= 300 && self.stage == ShaderStage::Fragment {
            pm.add_pass(Box::new(ValidateOutputs));
        }
        if options.contains(CompileOptions::VALIDATE_LOOP_INDEXING) {
            pm.add_pass(Box::new(ValidateLimitations));
        }
        if options.contains(CompileOptions::TIMING_RESTRICTIONS) {
            pm.add_pass(Box::new(RestrictTiming {
                webgl: self.spec == ShaderSpec::WebGl,
                dump_graph: options.contains(CompileOptions::DEPENDENCY_GRAPH),
            }));
        }
        if self.spec == ShaderSpec::Css {
            pm.add_pass(Box::new(RewriteCssShader));
        }
        if options.contains(CompileOptions::UNROLL_FOR_LOOP_WITH_SAMPLER_ARRAY_INDEX) {
            pm.add_pass(Box::new(MarkSamplerArrayLoops));
        }
        if options.contains(CompileOptions::EMULATE_BUILT_IN_FUNCTIONS) {
            pm.add_pass(Box::new(EmulateBuiltInFunctions));
        }
        if options.contains(CompileOptions::CLAMP_INDIRECT_ARRAY_BOUNDS) {
            pm.add_pass(Box::new(ClampIndirectArrayBounds));
        }
        if self.stage == ShaderStage::Vertex {
            if options.contains(CompileOptions::INIT_VARYINGS_WITHOUT_STATIC_USE) {
                pm.add_pass(Box::new(InitializeVariables {
                    target: InitTarget::UnusedVaryings,
                }));
            } else if options.contains(CompileOptions::INIT_GL_POSITION) {
                pm.add_pass(Box::new(InitializeVariables {
                    target: InitTarget::GlPosition,
                }));
            }
        }
        if options.contains(CompileOptions::UNFOLD_SHORT_CIRCUIT) {
            pm.add_pass(Box::new(UnfoldShortCircuit));
        }
        if options.contains(CompileOptions::VARIABLES) {
            pm.add_pass(Box::new(CollectVariables {
                enforce_packing: options.contains(CompileOptions::ENFORCE_PACKING_RESTRICTIONS),
            }));
        }
        if options.contains(CompileOptions::REGENERATE_STRUCT_NAMES) {
            pm.add_pass(Box::new(RegenerateStructNames));
        }
        pm
    }
}

/// Gives the parser's operator-less root its `Sequence` operator.
fn post_process(ast: &mut Ast, root: Handle<Node>) -> Handle<Node> {
    let loc = ast.loc(root);
    ast.set_aggregate_operator(Some(root), Operator::Sequence, loc)
}

/// Parses `sources` just far enough to report the `#version` they
/// declare. Used by front ends that pick a spec from the shader.
pub fn detect_version(sources: &[&str], stage: ShaderStage) -> Option<u32> {
    let mut ast = Ast::new();
    let mut symbols = SymbolTable::new();
    let resources = Resources::default();
    insert_builtins(&mut symbols, &mut ast.structs, stage, &resources).ok()?;
    symbols.push();
    let options = ParseOptions {
        stage,
        ..ParseOptions::default()
    };
    let mut diags = Diagnostics::new();
    let parsed: ParsedShader = parse(sources, &mut ast, &mut symbols, &options, &mut diags).ok()?;
    Some(parsed.version)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = "precision mediump float;\nvoid main() { gl_FragColor = vec4(1.0); }\n";

    #[test]
    fn successful_compile_fills_output() {
        let mut compiler =
            Compiler::new(ShaderStage::Fragment, ShaderSpec::Gles2, Resources::default());
        let output = compiler.compile(
            &[FRAGMENT],
            CompileOptions::OBJECT_CODE | CompileOptions::INTERMEDIATE_TREE,
        );
        assert!(output.success, "{}", output.info_log);
        assert_eq!(output.version, 100);
        assert!(output.object_code.unwrap().contains("void main()"));
        assert!(output.ast_dump.unwrap().contains("Sequence"));
    }

    #[test]
    fn outputs_are_gated_by_options() {
        let mut compiler =
            Compiler::new(ShaderStage::Fragment, ShaderSpec::Gles2, Resources::default());
        let output = compiler.compile(&[FRAGMENT], CompileOptions::NONE);
        assert!(output.success);
        assert!(output.object_code.is_none());
        assert!(output.ast_dump.is_none());
        assert!(output.variables.is_empty());
    }

    #[test]
    fn failure_discards_partial_output() {
        let mut compiler =
            Compiler::new(ShaderStage::Fragment, ShaderSpec::Gles2, Resources::default());
        let output = compiler.compile(
            &["void main() { undeclared = 1.0; }\n"],
            CompileOptions::OBJECT_CODE | CompileOptions::INTERMEDIATE_TREE,
        );
        assert!(!output.success);
        assert!(output.object_code.is_none());
        assert!(output.ast_dump.is_none());
        assert!(output.info_log.contains("ERROR:"), "{}", output.info_log);
    }

    #[test]
    fn source_path_is_split_off() {
        let mut compiler =
            Compiler::new(ShaderStage::Fragment, ShaderSpec::Gles2, Resources::default());
        let output = compiler.compile(
            &["shaders/plain.frag", FRAGMENT],
            CompileOptions::SOURCE_PATH,
        );
        assert!(output.success, "{}", output.info_log);
        assert_eq!(output.source_path.as_deref(), Some("shaders/plain.frag"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let compiler =
            Compiler::new(ShaderStage::Fragment, ShaderSpec::Gles2, Resources::default());
        assert!(matches!(
            compiler.with_backend("hlsl"),
            Err(BackendError::UnknownTarget(_))
        ));
    }

    #[test]
    fn accessors_report_the_configuration() {
        let resources = Resources {
            max_draw_buffers: 4,
            ..Resources::default()
        };
        let compiler = Compiler::new(ShaderStage::Vertex, ShaderSpec::WebGl, resources);
        assert_eq!(compiler.stage(), ShaderStage::Vertex);
        assert_eq!(compiler.spec(), ShaderSpec::WebGl);
        assert_eq!(compiler.resources(), &resources);
        assert_eq!(compiler.target(), DEFAULT_TARGET);
    }

    #[test]
    fn ast_backend_is_selectable() {
        let mut compiler =
            Compiler::new(ShaderStage::Fragment, ShaderSpec::Gles2, Resources::default())
                .with_backend("ast")
                .unwrap();
        assert_eq!(compiler.target(), "ast");
        let output = compiler.compile(&[FRAGMENT], CompileOptions::OBJECT_CODE);
        assert!(output.object_code.unwrap().contains(": Sequence\n"));
    }

    #[test]
    fn webgl_forces_loop_index_validation() {
        let source = r#"
precision mediump float;
void main() {
    for (int i = 0; i < 4; i++) {
        i = 2;
    }
}
"#;
        let mut gles =
            Compiler::new(ShaderStage::Fragment, ShaderSpec::Gles2, Resources::default());
        assert!(gles.compile(&[source], CompileOptions::NONE).success);

        let mut webgl =
            Compiler::new(ShaderStage::Fragment, ShaderSpec::WebGl, Resources::default());
        assert!(!webgl.compile(&[source], CompileOptions::NONE).success);
    }

    #[test]
    fn version_is_detected() {
        assert_eq!(
            detect_version(&["#version 300 es\nvoid main() {}\n"], ShaderStage::Fragment),
            Some(300)
        );
        assert_eq!(detect_version(&["void main() {}\n"], ShaderStage::Vertex), Some(100));
    }
}
