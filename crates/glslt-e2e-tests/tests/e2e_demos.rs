mod common;

use glslt_compiler::{CompileOptions, ShaderSpec, ShaderStage};

#[test]
fn textured_fragment_passes_webgl_validation() {
    let source = common::load_demo("textured.frag");
    let output = common::compile_ok(
        ShaderStage::Fragment,
        ShaderSpec::WebGl,
        &source,
        common::WEBGL_OPTIONS,
    );
    let code = common::object_code(&output);
    assert!(code.contains("texture2D(u_texture, v_uv)"), "{code}");

    let uniforms: Vec<&str> = output
        .variables
        .uniforms
        .iter()
        .map(|u| u.name.as_str())
        .collect();
    assert!(uniforms.contains(&"u_texture"));
    assert!(uniforms.contains(&"u_tint"));
    assert_eq!(output.variables.varyings.len(), 1);
    assert_eq!(output.variables.varyings[0].name, "v_uv");
}

#[test]
fn transform_vertex_initializes_unused_varyings() {
    let source = common::load_demo("transform.vert");
    let output = common::compile_ok(
        ShaderStage::Vertex,
        ShaderSpec::Gles2,
        &source,
        CompileOptions::OBJECT_CODE | CompileOptions::INIT_VARYINGS_WITHOUT_STATIC_USE,
    );
    let code = common::object_code(&output);
    let init = code.find("(v_unused = 0.0);").expect("v_unused is not initialized");
    let assign = code.find("(v_uv = a_uv);").expect("v_uv assignment is missing");
    assert!(init < assign, "{code}");
    assert!(!code.contains("(v_uv = vec2("), "{code}");
}

#[test]
fn transform_vertex_reflects_attributes() {
    let source = common::load_demo("transform.vert");
    let output = common::compile_ok(
        ShaderStage::Vertex,
        ShaderSpec::WebGl,
        &source,
        common::WEBGL_OPTIONS,
    );
    let attributes: Vec<&str> = output
        .variables
        .attributes
        .iter()
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(attributes.len(), 2, "{attributes:?}");
    assert!(attributes.contains(&"a_position"));
    assert!(attributes.contains(&"a_uv"));
}

#[test]
fn palette_sampler_loop_is_unrolled() {
    let source = common::load_demo("palette.frag");
    let output = common::compile_ok(
        ShaderStage::Fragment,
        ShaderSpec::Gles2,
        &source,
        CompileOptions::OBJECT_CODE | CompileOptions::UNROLL_FOR_LOOP_WITH_SAMPLER_ARRAY_INDEX,
    );
    let code = common::object_code(&output);
    assert!(!code.contains("for ("), "{code}");
    for layer in 0..3 {
        assert!(
            code.contains(&format!("texture2D(u_layers[{layer}], v_uv)")),
            "{code}"
        );
        assert!(code.contains(&format!("u_weights[{layer}]")), "{code}");
    }
}

#[test]
fn palette_loop_without_unrolling_stays_a_loop() {
    let source = common::load_demo("palette.frag");
    let output = common::compile_ok(
        ShaderStage::Fragment,
        ShaderSpec::Gles2,
        &source,
        CompileOptions::OBJECT_CODE,
    );
    let code = common::object_code(&output);
    assert!(code.contains("for ("), "{code}");
    assert!(code.contains("texture2D(u_layers[i], v_uv)"), "{code}");
}

#[test]
fn skinning_bone_index_is_clamped() {
    let source = common::load_demo("skinning.vert");
    let output = common::compile_ok(
        ShaderStage::Vertex,
        ShaderSpec::Gles2,
        &source,
        CompileOptions::OBJECT_CODE | CompileOptions::CLAMP_INDIRECT_ARRAY_BOUNDS,
    );
    let code = common::object_code(&output);
    assert!(
        code.contains("u_bones[int(clamp(float(bone), 0.0, float(3)))]"),
        "{code}"
    );
}

#[test]
fn outputs_fragment_keeps_its_location() {
    let source = common::load_demo("outputs.frag");
    let output = common::compile_ok(
        ShaderStage::Fragment,
        ShaderSpec::Gles3,
        &source,
        CompileOptions::OBJECT_CODE | CompileOptions::VARIABLES,
    );
    assert_eq!(output.version, 300);
    let code = common::object_code(&output);
    assert!(code.starts_with("#version 300 es\n"), "{code}");
    assert!(code.contains("layout(location = 0) out "), "{code}");

    assert_eq!(output.variables.outputs.len(), 1);
    assert_eq!(output.variables.outputs[0].name, "o_color");
    assert_eq!(output.variables.outputs[0].location, Some(0));
}

#[test]
fn outputs_fragment_is_rejected_for_es2() {
    let source = common::load_demo("outputs.frag");
    let output = common::compile(
        ShaderStage::Fragment,
        ShaderSpec::WebGl,
        &source,
        CompileOptions::OBJECT_CODE,
    );
    assert!(!output.success);
    assert!(output.object_code.is_none());
}

#[test]
fn css_fragment_gets_a_generated_entry_point() {
    let source = common::load_demo("css_tint.frag");
    let output = common::compile_ok(
        ShaderStage::Fragment,
        ShaderSpec::Css,
        &source,
        CompileOptions::OBJECT_CODE,
    );
    let code = common::object_code(&output);
    assert!(code.contains("void css_main()"), "{code}");
    assert!(code.contains("css_main();"), "{code}");
    assert!(code.contains("css_u_texture"), "{code}");
    assert!(code.contains("void main()"), "{code}");
}
