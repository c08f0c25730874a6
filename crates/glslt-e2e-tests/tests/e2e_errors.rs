mod common;

use glslt_compiler::{CompileOptions, Compiler, Resources, ShaderSpec, ShaderStage};

#[test]
fn syntax_error_reports_a_location() {
    let output = common::compile(
        ShaderStage::Fragment,
        ShaderSpec::Gles2,
        "precision mediump float;\nvoid main() {\n    gl_FragColor = vec4(1.0;\n}\n",
        CompileOptions::OBJECT_CODE,
    );
    assert!(!output.success);
    assert!(output.info_log.contains("ERROR: 0:3:"), "{}", output.info_log);
    assert!(output.diagnostics.error_count() >= 1);
    assert!(output.object_code.is_none());
}

#[test]
fn missing_main_is_rejected() {
    let output = common::compile(
        ShaderStage::Vertex,
        ShaderSpec::Gles2,
        "float helper() { return 1.0; }\n",
        CompileOptions::OBJECT_CODE,
    );
    assert!(!output.success);
    assert!(output.info_log.contains("Missing main()"), "{}", output.info_log);
}

#[test]
fn empty_source_list_is_rejected() {
    let mut compiler = Compiler::new(ShaderStage::Vertex, ShaderSpec::Gles2, Resources::default());
    let output = compiler.compile(&[], CompileOptions::OBJECT_CODE);
    assert!(!output.success);
    assert!(output.info_log.starts_with("ERROR: "), "{}", output.info_log);
}

fn nested_sum(leaf: &str, levels: usize) -> String {
    let mut expression = leaf.to_string();
    for _ in 0..levels {
        expression = format!("({expression} + {leaf})");
    }
    format!("attribute float a;\nvoid main() {{ gl_Position = vec4({expression}); }}\n")
}

#[test]
fn overly_deep_expression_is_rejected() {
    let resources = Resources {
        max_expression_complexity: 8,
        ..Resources::default()
    };
    let source = nested_sum("a", 16);

    let relaxed = common::compile_with(
        ShaderStage::Vertex,
        ShaderSpec::Gles2,
        resources,
        &source,
        CompileOptions::NONE,
    );
    assert!(relaxed.success, "{}", relaxed.info_log);

    let limited = common::compile_with(
        ShaderStage::Vertex,
        ShaderSpec::Gles2,
        resources,
        &source,
        CompileOptions::LIMIT_EXPRESSION_COMPLEXITY,
    );
    assert!(!limited.success);
    assert!(
        limited.info_log.contains("Expression too complex."),
        "{}",
        limited.info_log
    );
}

#[test]
fn folded_constant_expression_is_not_counted() {
    let resources = Resources {
        max_expression_complexity: 8,
        ..Resources::default()
    };
    let output = common::compile_with(
        ShaderStage::Vertex,
        ShaderSpec::Gles2,
        resources,
        &nested_sum("1.0", 16),
        CompileOptions::LIMIT_EXPRESSION_COMPLEXITY,
    );
    assert!(output.success, "{}", output.info_log);
}

#[test]
fn undeclared_identifier_is_named_in_the_log() {
    let output = common::compile(
        ShaderStage::Fragment,
        ShaderSpec::Gles2,
        "precision mediump float;\nvoid main() { gl_FragColor = missing; }\n",
        CompileOptions::OBJECT_CODE,
    );
    assert!(!output.success);
    assert!(output.info_log.contains("'missing'"), "{}", output.info_log);
}

#[test]
fn unknown_backend_is_an_error() {
    let result = Compiler::new(ShaderStage::Vertex, ShaderSpec::Gles2, Resources::default())
        .with_backend("spirv");
    assert!(result.is_err());
}
