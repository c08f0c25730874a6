#![no_main]

use glslt_compiler::{CompileOptions, Compiler, Resources, ShaderSpec, ShaderStage};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&flags, rest)) = data.split_first() else {
        return;
    };
    let Ok(source) = std::str::from_utf8(rest) else {
        return;
    };
    let stage = if flags & 1 == 0 {
        ShaderStage::Vertex
    } else {
        ShaderStage::Fragment
    };
    let spec = match (flags >> 1) & 3 {
        0 => ShaderSpec::Gles2,
        1 => ShaderSpec::WebGl,
        2 => ShaderSpec::Gles3,
        _ => ShaderSpec::Css,
    };
    let options = CompileOptions::OBJECT_CODE
        | CompileOptions::VARIABLES
        | CompileOptions::UNROLL_FOR_LOOP_WITH_SAMPLER_ARRAY_INDEX
        | CompileOptions::EMULATE_BUILT_IN_FUNCTIONS
        | CompileOptions::CLAMP_INDIRECT_ARRAY_BOUNDS
        | CompileOptions::UNFOLD_SHORT_CIRCUIT
        | CompileOptions::INIT_VARYINGS_WITHOUT_STATIC_USE;
    let mut compiler = Compiler::new(stage, spec, Resources::default());
    let _ = compiler.compile(&[source], options);
});
