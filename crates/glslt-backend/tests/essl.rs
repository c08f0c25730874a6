//! ESSL emission of parsed and rewritten shaders.

use std::collections::{BTreeMap, BTreeSet};

use glslt_analysis::NameHasher;
use glslt_ast::{
    ArrayIndexClampingStrategy, Ast, Diagnostics, Handle, Node, Operator, Resources, ShaderStage,
    SourceLoc, SymbolTable, insert_builtins,
};
use glslt_backend::{Backend, BackendError, BackendInput, BackendOutput, EsslBackend};
use glslt_parser::{Behavior, ParseOptions, Pragma, parse};
use glslt_passes::{
    ClampIndirectArrayBounds, EmulateBuiltInFunctions, MarkSamplerArrayLoops, Pass, PassContext,
};

struct Shader {
    ast: Ast,
    symbols: SymbolTable,
    root: Handle<Node>,
    version: u32,
    stage: ShaderStage,
    resources: Resources,
    extensions: BTreeMap<String, Behavior>,
    pragma: Pragma,
    emulated: BTreeSet<String>,
    needs_int_clamp: bool,
}

impl Shader {
    fn parse(stage: ShaderStage, source: &str) -> Self {
        Self::parse_with(stage, source, Resources::default())
    }

    fn parse_with(stage: ShaderStage, source: &str, resources: Resources) -> Self {
        let mut ast = Ast::new();
        let mut symbols = SymbolTable::new();
        insert_builtins(&mut symbols, &mut ast.structs, stage, &resources).unwrap();
        symbols.push();
        ast.push();
        let options = ParseOptions {
            stage,
            resources,
            ..ParseOptions::default()
        };
        let mut diags = Diagnostics::new();
        let parsed = parse(&[source], &mut ast, &mut symbols, &options, &mut diags)
            .unwrap_or_else(|err| panic!("{err}: {}", diags.info_log()));
        Self {
            ast,
            symbols,
            root: parsed.root,
            version: parsed.version,
            stage,
            resources,
            extensions: parsed.extensions,
            pragma: parsed.pragma,
            emulated: BTreeSet::new(),
            needs_int_clamp: false,
        }
    }

    fn run(&mut self, pass: &dyn Pass) {
        let mut cx = PassContext::new(
            &mut self.ast,
            self.root,
            &mut self.symbols,
            self.stage,
            self.version,
            &self.resources,
        );
        let mut diags = Diagnostics::new();
        assert!(pass.run(&mut cx, &mut diags), "{}", diags.info_log());
        self.emulated.extend(cx.emulated_functions.iter().cloned());
        self.needs_int_clamp |= cx.needs_int_clamp;
    }

    fn emit_with(&self, names: &mut NameHasher) -> Result<BackendOutput, BackendError> {
        let input = BackendInput {
            ast: &self.ast,
            root: self.root,
            stage: self.stage,
            version: self.version,
            extensions: &self.extensions,
            pragma: self.pragma,
            emulated_functions: &self.emulated,
            clamping: self.resources.array_index_clamping_strategy,
            needs_int_clamp: self.needs_int_clamp,
        };
        EsslBackend.compile(&input, names)
    }

    fn emit(&self) -> String {
        self.emit_with(&mut NameHasher::new(None))
            .unwrap_or_else(|err| panic!("{err}"))
            .text()
    }
}

fn fixed_hash(name: &str) -> u64 {
    name.bytes().map(u64::from).sum()
}

#[test]
fn fragment_shader_round_trips() {
    let shader = Shader::parse(
        ShaderStage::Fragment,
        "precision mediump float;\nuniform vec4 color;\nvoid main() { gl_FragColor = color; }\n",
    );
    let text = shader.emit();
    assert!(text.contains("uniform "), "{text}");
    assert!(text.contains("vec4 color;"), "{text}");
    assert!(text.contains("void main() {\n"), "{text}");
    assert!(text.contains("    (gl_FragColor = color);\n"), "{text}");
    assert!(!text.contains("#version"), "{text}");
}

#[test]
fn output_file_is_named_after_the_stage() {
    let shader = Shader::parse(ShaderStage::Vertex, "void main() { gl_Position = vec4(0.0); }\n");
    let output = shader.emit_with(&mut NameHasher::new(None)).unwrap();
    assert_eq!(output.files.len(), 1);
    assert_eq!(output.files[0].name, "shader.vert");
    assert!(output.text().contains("vec4(0.0, 0.0, 0.0, 0.0)"));
}

#[test]
fn version_300_is_declared() {
    let shader = Shader::parse(
        ShaderStage::Fragment,
        "#version 300 es\nprecision mediump float;\nout vec4 color;\nvoid main() { color = vec4(1.0); }\n",
    );
    let text = shader.emit();
    assert!(text.starts_with("#version 300 es\n"), "{text}");
    assert!(text.contains("out "), "{text}");
}

#[test]
fn enabled_extensions_are_written() {
    let resources = Resources {
        oes_standard_derivatives: true,
        ..Resources::default()
    };
    let shader = Shader::parse_with(
        ShaderStage::Fragment,
        "#extension GL_OES_standard_derivatives : enable\nprecision mediump float;\nvoid main() { gl_FragColor = vec4(1.0); }\n",
        resources,
    );
    let text = shader.emit();
    assert!(
        text.contains("#extension GL_OES_standard_derivatives : enable\n"),
        "{text}"
    );
}

#[test]
fn hashed_names_keep_main_and_built_ins() {
    let resources = Resources {
        hash_function: Some(fixed_hash),
        ..Resources::default()
    };
    let shader = Shader::parse_with(
        ShaderStage::Fragment,
        "precision mediump float;\nuniform vec4 color;\nvoid main() { gl_FragColor = color; }\n",
        resources,
    );
    let mut names = NameHasher::new(resources.hash_function);
    let text = shader.emit_with(&mut names).unwrap().text();
    let hashed = format!("webgl_{:016x}", fixed_hash("color"));
    assert!(text.contains(&hashed), "{text}");
    assert!(!text.contains(" color"), "{text}");
    assert!(text.contains("void main()"), "{text}");
    assert!(text.contains("gl_FragColor"), "{text}");
    assert_eq!(names.map().get("color"), Some(hashed.as_str()));
}

#[test]
fn sampler_array_loop_is_unrolled() {
    let mut shader = Shader::parse(
        ShaderStage::Fragment,
        r#"
precision mediump float;
uniform sampler2D s[2];
varying vec2 uv;
void main() {
    vec4 c = vec4(0.0);
    for (int i = 0; i < 2; i++) {
        c += texture2D(s[i], uv);
    }
    gl_FragColor = c;
}
"#,
    );
    shader.run(&MarkSamplerArrayLoops);
    let output = shader.emit_with(&mut NameHasher::new(None)).unwrap();
    let text = output.text();
    assert!(!text.contains("for ("), "{text}");
    assert!(text.contains("texture2D(s[0], uv)"), "{text}");
    assert!(text.contains("texture2D(s[1], uv)"), "{text}");
    assert_eq!(output.diagnostics.warning_count(), 0);
}

#[test]
fn loop_with_break_stays_a_loop() {
    let mut shader = Shader::parse(
        ShaderStage::Fragment,
        r#"
precision mediump float;
uniform sampler2D s[2];
varying vec2 uv;
void main() {
    vec4 c = vec4(0.0);
    for (int i = 0; i < 2; i++) {
        c += texture2D(s[i], uv);
        if (c.x > 0.5) break;
    }
    gl_FragColor = c;
}
"#,
    );
    shader.run(&MarkSamplerArrayLoops);
    let output = shader.emit_with(&mut NameHasher::new(None)).unwrap();
    let text = output.text();
    assert!(text.contains("for ("), "{text}");
    assert!(text.contains("int i = 0; (i < 2); (i++)) {"), "{text}");
    assert!(text.contains("break;"), "{text}");
    assert_eq!(output.diagnostics.warning_count(), 1);
}

const INDIRECT_INDEX: &str = r#"
precision mediump float;
uniform int i;
uniform vec4 v;
uniform float a[3];
void main() {
    gl_FragColor = vec4(v[i] + a[i] + a[1]);
}
"#;

#[test]
fn clamped_indices_use_the_clamp_intrinsic() {
    let mut shader = Shader::parse(ShaderStage::Fragment, INDIRECT_INDEX);
    shader.run(&ClampIndirectArrayBounds);
    let text = shader.emit();
    assert!(text.contains("v[int(clamp(float(i), 0.0, float(3)))]"), "{text}");
    assert!(text.contains("a[int(clamp(float(i), 0.0, float(2)))]"), "{text}");
    assert!(text.contains("a[1]"), "{text}");
    assert!(!text.contains("webgl_int_clamp"), "{text}");
}

#[test]
fn clamped_indices_use_the_int_helper() {
    let resources = Resources {
        array_index_clamping_strategy: ArrayIndexClampingStrategy::UserDefinedIntFunction,
        ..Resources::default()
    };
    let mut shader = Shader::parse_with(ShaderStage::Fragment, INDIRECT_INDEX, resources);
    shader.run(&ClampIndirectArrayBounds);
    let text = shader.emit();
    assert!(
        text.contains("int webgl_int_clamp(int value, int minValue, int maxValue)"),
        "{text}"
    );
    assert!(text.contains("a[webgl_int_clamp(i, 0, 2)]"), "{text}");
}

#[test]
fn emulated_calls_use_helpers() {
    let mut shader = Shader::parse(
        ShaderStage::Fragment,
        "precision mediump float;\nuniform float x;\nvoid main() { gl_FragColor = vec4(cos(x)); }\n",
    );
    shader.run(&EmulateBuiltInFunctions);
    let text = shader.emit();
    assert!(text.contains("#define webgl_emu_precision"), "{text}");
    assert!(text.contains("vec4(webgl_cos_emu(x))"), "{text}");
}

#[test]
fn local_struct_is_defined_once() {
    let shader = Shader::parse(
        ShaderStage::Fragment,
        r#"
precision mediump float;
void main() {
    struct S { float x; };
    S s;
    s.x = 1.0;
    gl_FragColor = vec4(s.x);
}
"#,
    );
    let text = shader.emit();
    assert_eq!(text.matches("struct S {").count(), 1, "{text}");
    assert!(text.contains("(s.x = 1.0);"), "{text}");
}

#[test]
fn ternary_is_parenthesized() {
    let shader = Shader::parse(
        ShaderStage::Fragment,
        "precision mediump float;\nuniform bool b;\nvoid main() { float f = b ? 1.0 : 2.0; gl_FragColor = vec4(f); }\n",
    );
    let text = shader.emit();
    assert!(text.contains("((b) ? (1.0) : (2.0))"), "{text}");
}

#[test]
fn operatorless_aggregate_is_rejected() {
    let mut ast = Ast::new();
    let loc = SourceLoc::new(0, 1);
    let stray = ast.aggregate(Operator::Null, Vec::new(), loc);
    let root = ast.aggregate(Operator::Sequence, vec![stray], loc);
    let extensions = BTreeMap::new();
    let emulated = BTreeSet::new();
    let input = BackendInput {
        ast: &ast,
        root,
        stage: ShaderStage::Fragment,
        version: 100,
        extensions: &extensions,
        pragma: Pragma::default(),
        emulated_functions: &emulated,
        clamping: ArrayIndexClampingStrategy::ClampIntrinsic,
        needs_int_clamp: false,
    };
    let err = EsslBackend
        .compile(&input, &mut NameHasher::new(None))
        .unwrap_err();
    assert!(matches!(err, BackendError::Unsupported(_)));
}
