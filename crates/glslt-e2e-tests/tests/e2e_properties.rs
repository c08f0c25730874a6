mod common;

use glslt_compiler::{CompileOptions, Compiler, Resources, Severity, ShaderSpec, ShaderStage};

#[test]
fn divide_by_zero_is_only_a_warning() {
    let output = common::compile_ok(
        ShaderStage::Vertex,
        ShaderSpec::Gles2,
        "void main(){ float x = 1.0/0.0; }",
        CompileOptions::OBJECT_CODE,
    );
    assert_eq!(output.diagnostics.error_count(), 0);
    assert_eq!(output.diagnostics.warning_count(), 1);
    assert!(
        output
            .info_log
            .contains("Divide by zero error during constant folding"),
        "{}",
        output.info_log
    );
    assert!(common::object_code(&output).contains("3.4028235e38"));
}

#[test]
fn mutual_recursion_is_rejected() {
    let output = common::compile(
        ShaderStage::Vertex,
        ShaderSpec::Gles2,
        "void b();\nvoid a(){ b(); }\nvoid b(){ a(); }\nvoid main(){ a(); }\n",
        CompileOptions::OBJECT_CODE,
    );
    assert!(!output.success);
    assert!(
        output.info_log.contains("Function recursion detected"),
        "{}",
        output.info_log
    );
    assert!(output.object_code.is_none());
}

#[test]
fn acyclic_calls_within_the_limit_are_accepted() {
    let output = common::compile(
        ShaderStage::Vertex,
        ShaderSpec::Gles2,
        "float c(){ return 1.0; }\nfloat b(){ return c(); }\nfloat a(){ return b() + c(); }\nvoid main(){ gl_Position = vec4(a()); }\n",
        CompileOptions::LIMIT_CALL_STACK_DEPTH,
    );
    assert!(output.success, "{}", output.info_log);
}

#[test]
fn deep_call_chain_is_rejected_with_limit() {
    let resources = Resources {
        max_call_stack_depth: 2,
        ..Resources::default()
    };
    let source =
        "float c(){ return 1.0; }\nfloat b(){ return c(); }\nfloat a(){ return b(); }\nvoid main(){ gl_Position = vec4(a()); }\n";

    let unlimited = common::compile_with(
        ShaderStage::Vertex,
        ShaderSpec::Gles2,
        resources,
        source,
        CompileOptions::NONE,
    );
    assert!(unlimited.success, "{}", unlimited.info_log);

    let limited = common::compile_with(
        ShaderStage::Vertex,
        ShaderSpec::Gles2,
        resources,
        source,
        CompileOptions::LIMIT_CALL_STACK_DEPTH,
    );
    assert!(!limited.success);
    assert!(
        limited.info_log.contains("Function call stack too deep"),
        "{}",
        limited.info_log
    );
}

#[test]
fn call_chain_as_deep_as_the_limit_is_rejected() {
    // `main` calling `a` is two levels deep.
    let source = "float a(){ return 1.0; }\nvoid main(){ gl_Position = vec4(a()); }\n";
    let compile_with_limit = |limit| {
        let resources = Resources {
            max_call_stack_depth: limit,
            ..Resources::default()
        };
        common::compile_with(
            ShaderStage::Vertex,
            ShaderSpec::Gles2,
            resources,
            source,
            CompileOptions::LIMIT_CALL_STACK_DEPTH,
        )
    };

    let at_limit = compile_with_limit(2);
    assert!(!at_limit.success);
    assert!(
        at_limit.info_log.contains("Function call stack too deep"),
        "{}",
        at_limit.info_log
    );
    let below_limit = compile_with_limit(3);
    assert!(below_limit.success, "{}", below_limit.info_log);
}

#[test]
fn sampler_in_branch_condition_is_rejected() {
    let output = common::compile(
        ShaderStage::Fragment,
        ShaderSpec::WebGl,
        "precision mediump float;\nuniform sampler2D s; void main(){ if (texture2D(s, vec2(0.0)).x > 0.0) {} }\n",
        CompileOptions::TIMING_RESTRICTIONS,
    );
    assert!(!output.success);
    assert!(
        output
            .info_log
            .contains("An expression dependent on a sampler is not permitted in a conditional statement."),
        "{}",
        output.info_log
    );
}

#[test]
fn sampler_in_sampler_position_is_accepted() {
    common::compile_ok(
        ShaderStage::Fragment,
        ShaderSpec::WebGl,
        "precision mediump float;\nuniform sampler2D s;\nvarying vec2 uv;\nvoid main(){ gl_FragColor = texture2D(s, uv); }\n",
        CompileOptions::TIMING_RESTRICTIONS,
    );
}

#[test]
fn sampler_in_coordinate_is_rejected() {
    let output = common::compile(
        ShaderStage::Fragment,
        ShaderSpec::WebGl,
        "precision mediump float;\nuniform sampler2D s;\nvoid main(){ gl_FragColor = texture2D(s, texture2D(s, vec2(0.0)).xy); }\n",
        CompileOptions::TIMING_RESTRICTIONS,
    );
    assert!(!output.success);
    assert!(
        output
            .info_log
            .contains("not permitted to be the coordinate argument of a sampling operation"),
        "{}",
        output.info_log
    );
}

#[test]
fn sampler_dependence_survives_assignments() {
    let output = common::compile(
        ShaderStage::Fragment,
        ShaderSpec::WebGl,
        r#"
precision mediump float;
uniform sampler2D s;
varying vec2 uv;
void main() {
    vec4 c = texture2D(s, uv);
    float f = c.x;
    float g;
    g = f;
    if (g > 0.5) {
        gl_FragColor = c;
    }
}
"#,
        CompileOptions::TIMING_RESTRICTIONS,
    );
    assert!(!output.success);
    assert_eq!(output.diagnostics.error_count(), 1, "{}", output.info_log);
}

#[test]
fn sampler_on_left_of_logical_operator_is_rejected() {
    let output = common::compile(
        ShaderStage::Fragment,
        ShaderSpec::WebGl,
        r#"
precision mediump float;
uniform sampler2D s;
uniform bool b;
varying vec2 uv;
void main() {
    bool hit = texture2D(s, uv).x > 0.5 && b;
    gl_FragColor = vec4(float(hit));
}
"#,
        CompileOptions::TIMING_RESTRICTIONS,
    );
    assert!(!output.success);
    assert!(
        output.info_log.contains("left hand side of a logical"),
        "{}",
        output.info_log
    );
}

#[test]
fn dependency_graph_is_dumped_on_request() {
    let source =
        "precision mediump float;\nuniform sampler2D s;\nvarying vec2 uv;\nvoid main(){ gl_FragColor = texture2D(s, uv); }\n";
    let plain = common::compile_ok(
        ShaderStage::Fragment,
        ShaderSpec::WebGl,
        source,
        CompileOptions::TIMING_RESTRICTIONS,
    );
    let dumped = common::compile_ok(
        ShaderStage::Fragment,
        ShaderSpec::WebGl,
        source,
        CompileOptions::TIMING_RESTRICTIONS | CompileOptions::DEPENDENCY_GRAPH,
    );
    assert!(dumped.info_log.len() > plain.info_log.len());
    assert!(
        dumped
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Info)
    );
}

#[test]
fn vertex_samplers_are_rejected_under_timing_restrictions() {
    let resources = Resources {
        max_vertex_texture_image_units: 4,
        ..Resources::default()
    };
    let output = common::compile_with(
        ShaderStage::Vertex,
        ShaderSpec::WebGl,
        resources,
        "uniform sampler2D s;\nvoid main(){ gl_Position = texture2D(s, vec2(0.0)); }\n",
        CompileOptions::TIMING_RESTRICTIONS,
    );
    assert!(!output.success);
    assert!(
        output
            .info_log
            .contains("Samplers are not permitted in vertex shaders."),
        "{}",
        output.info_log
    );
}

#[test]
fn struct_regeneration_never_stacks_prefixes() {
    let source = r#"
precision mediump float;
void main() {
    struct Light { vec3 color; };
    Light l;
    l.color = vec3(1.0);
    gl_FragColor = vec4(l.color, 1.0);
}
"#;
    let mut compiler = Compiler::new(ShaderStage::Fragment, ShaderSpec::WebGl, Resources::default());
    for _ in 0..2 {
        let output = compiler.compile(
            &[source],
            CompileOptions::OBJECT_CODE | CompileOptions::REGENERATE_STRUCT_NAMES,
        );
        assert!(output.success, "{}", output.info_log);
        let code = common::object_code(&output);
        assert!(code.contains("struct _webgl_struct_"), "{code}");
        assert!(code.contains("_Light"), "{code}");
        assert!(!code.contains("__webgl_struct_"), "{code}");
    }
}

#[test]
fn failed_compile_leaves_the_compiler_usable() {
    let mut compiler = Compiler::new(ShaderStage::Vertex, ShaderSpec::Gles2, Resources::default());
    let broken = compiler.compile(&["void main() { gl_Position = ; }"], CompileOptions::OBJECT_CODE);
    assert!(!broken.success);
    assert!(broken.info_log.starts_with("ERROR: "), "{}", broken.info_log);

    let fixed = compiler.compile(
        &["void main() { gl_Position = vec4(1.0); }"],
        CompileOptions::OBJECT_CODE,
    );
    assert!(fixed.success, "{}", fixed.info_log);
    assert!(common::object_code(&fixed).contains("gl_Position"));
}
