use glslt_compiler::{CompileOptions, CompileOutput, Compiler, Resources, ShaderSpec, ShaderStage};

/// Options a WebGL implementation typically passes.
#[allow(dead_code)]
pub const WEBGL_OPTIONS: CompileOptions = CompileOptions::from_bits(
    CompileOptions::OBJECT_CODE.bits()
        | CompileOptions::VARIABLES.bits()
        | CompileOptions::TIMING_RESTRICTIONS.bits()
        | CompileOptions::LIMIT_EXPRESSION_COMPLEXITY.bits()
        | CompileOptions::LIMIT_CALL_STACK_DEPTH.bits()
        | CompileOptions::ENFORCE_PACKING_RESTRICTIONS.bits()
        | CompileOptions::EMULATE_BUILT_IN_FUNCTIONS.bits()
        | CompileOptions::INIT_GL_POSITION.bits(),
);

/// Compile one source with default resources.
#[allow(dead_code)]
pub fn compile(
    stage: ShaderStage,
    spec: ShaderSpec,
    source: &str,
    options: CompileOptions,
) -> CompileOutput {
    compile_with(stage, spec, Resources::default(), source, options)
}

#[allow(dead_code)]
pub fn compile_with(
    stage: ShaderStage,
    spec: ShaderSpec,
    resources: Resources,
    source: &str,
    options: CompileOptions,
) -> CompileOutput {
    Compiler::new(stage, spec, resources).compile(&[source], options)
}

/// Like [`compile`], panicking with the info log on failure.
#[allow(dead_code)]
pub fn compile_ok(
    stage: ShaderStage,
    spec: ShaderSpec,
    source: &str,
    options: CompileOptions,
) -> CompileOutput {
    let output = compile(stage, spec, source, options);
    assert!(output.success, "compile failed:\n{}", output.info_log);
    output
}

/// Load a demo shader by file name.
#[allow(dead_code)]
pub fn load_demo(name: &str) -> String {
    let path = format!("{}/../../demos/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to load {path}: {e}"))
}

/// The object code of a successful compile.
#[allow(dead_code)]
pub fn object_code(output: &CompileOutput) -> &str {
    output
        .object_code
        .as_deref()
        .expect("compile produced no object code")
}
