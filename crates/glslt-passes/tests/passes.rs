//! Passes run over parsed shaders.

use glslt_ast::{
    ArrayIndexClampingStrategy, Ast, Diagnostics, Handle, Node, NodeKind, Operator, Resources,
    ShaderStage, SymbolTable, Visit, Visitor, Walk, insert_builtins, traverse,
};
use glslt_parser::{ParseOptions, parse};
use glslt_passes::{
    ClampIndirectArrayBounds, EmulateBuiltInFunctions, InitTarget, InitializeVariables,
    MarkSamplerArrayLoops, Pass, PassContext, REGENERATED_STRUCT_PREFIX, RegenerateStructNames,
    RewriteCssShader, UnfoldShortCircuit,
};

struct Shader {
    ast: Ast,
    symbols: SymbolTable,
    root: Handle<Node>,
    version: u32,
    stage: ShaderStage,
    resources: Resources,
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
        }
    }

    /// Runs `pass` and returns its verdict, the diagnostics, and whether
    /// the int clamp helper was requested.
    fn run(&mut self, pass: &dyn Pass) -> (bool, Diagnostics, PassState) {
        let mut cx = PassContext::new(
            &mut self.ast,
            self.root,
            &mut self.symbols,
            self.stage,
            self.version,
            &self.resources,
        );
        let mut diags = Diagnostics::new();
        let ok = pass.run(&mut cx, &mut diags);
        let state = PassState {
            emulated: cx.emulated_functions.iter().cloned().collect(),
            needs_int_clamp: cx.needs_int_clamp,
        };
        (ok, diags, state)
    }

    fn count(&self, pred: impl Fn(&NodeKind) -> bool) -> usize {
        let mut counter = Counter {
            pred,
            matched: Vec::new(),
        };
        traverse(&self.ast, self.root, &mut counter);
        counter.matched.len()
    }
}

struct PassState {
    emulated: Vec<String>,
    needs_int_clamp: bool,
}

struct Counter<F> {
    pred: F,
    matched: Vec<Handle<Node>>,
}

impl<F: Fn(&NodeKind) -> bool> Counter<F> {
    fn check(&mut self, ast: &Ast, node: Handle<Node>) {
        if (self.pred)(&ast.node(node).kind) {
            self.matched.push(node);
        }
    }
}

impl<F: Fn(&NodeKind) -> bool> Visitor for Counter<F> {
    fn visit_symbol(&mut self, ast: &Ast, _: &Walk, node: Handle<Node>) {
        self.check(ast, node);
    }

    fn visit_constant(&mut self, ast: &Ast, _: &Walk, node: Handle<Node>) {
        self.check(ast, node);
    }

    fn visit_unary(&mut self, ast: &Ast, _: &Walk, _: Visit, node: Handle<Node>) -> bool {
        self.check(ast, node);
        true
    }

    fn visit_binary(&mut self, ast: &Ast, _: &Walk, _: Visit, node: Handle<Node>) -> bool {
        self.check(ast, node);
        true
    }

    fn visit_aggregate(&mut self, ast: &Ast, _: &Walk, _: Visit, node: Handle<Node>) -> bool {
        self.check(ast, node);
        true
    }

    fn visit_selection(&mut self, ast: &Ast, _: &Walk, _: Visit, node: Handle<Node>) -> bool {
        self.check(ast, node);
        true
    }

    fn visit_loop(&mut self, ast: &Ast, _: &Walk, _: Visit, node: Handle<Node>) -> bool {
        self.check(ast, node);
        true
    }

    fn visit_branch(&mut self, ast: &Ast, _: &Walk, _: Visit, node: Handle<Node>) -> bool {
        self.check(ast, node);
        true
    }
}

const SAMPLER_LOOP: &str = r#"
precision mediump float;
uniform sampler2D s[2];
varying vec2 uv;
void main() {
    for (int i = 0; i < 2; i++) {
        gl_FragColor += texture2D(s[i], uv);
    }
    for (int j = 0; j < 2; j++) {
        gl_FragColor *= 0.5;
    }
}
"#;

#[test]
fn sampler_indexed_loops_are_marked() {
    let mut shader = Shader::parse(ShaderStage::Fragment, SAMPLER_LOOP);
    let (ok, diags, _) = shader.run(&MarkSamplerArrayLoops);
    assert!(ok, "{}", diags.info_log());
    assert_eq!(shader.count(|k| matches!(k, NodeKind::Loop { .. })), 2);
    assert_eq!(
        shader.count(|k| matches!(k, NodeKind::Loop { unroll: true, .. })),
        1
    );
}

#[test]
fn float_sampler_loop_index_is_rejected() {
    let mut shader = Shader::parse(
        ShaderStage::Fragment,
        r#"
precision mediump float;
uniform sampler2D s[2];
varying vec2 uv;
void main() {
    for (float f = 0.0; f < 2.0; f += 1.0) {
        gl_FragColor += texture2D(s[int(f)], uv);
    }
}
"#,
    );
    let (ok, diags, _) = shader.run(&MarkSamplerArrayLoops);
    assert!(!ok);
    assert!(diags.info_log().contains("sampler array index is float loop index"));
}

#[test]
fn css_fragment_shader_gets_generated_main() {
    let mut shader = Shader::parse(
        ShaderStage::Fragment,
        "precision mediump float;\nvoid main() { gl_FragColor = vec4(1.0); }\n",
    );
    let before = shader.ast.children(shader.root).len();
    let (ok, diags, _) = shader.run(&RewriteCssShader);
    assert!(ok, "{}", diags.info_log());

    let children = shader.ast.children(shader.root);
    // Two declarations in front, the generated main at the end.
    assert_eq!(children.len(), before + 3);
    assert!(shader.ast.find_function(shader.root, "css_main(").is_some());
    let main = shader.ast.find_function(shader.root, "main(").unwrap();
    assert_eq!(children.last(), Some(&main));
    assert!(shader.symbols.find("css_u_texture", shader.version).is_some());
    assert_eq!(
        shader.count(|k| matches!(k, NodeKind::Aggregate { op: Operator::FunctionCall, name, .. } if name == "css_main(")),
        1
    );
}

#[test]
fn css_vertex_shader_forwards_texture_coordinate() {
    let mut shader = Shader::parse(
        ShaderStage::Vertex,
        "attribute vec4 p;\nvoid main() { gl_Position = p; }\n",
    );
    let (ok, diags, _) = shader.run(&RewriteCssShader);
    assert!(ok, "{}", diags.info_log());
    assert!(shader.symbols.find("css_a_texCoord", shader.version).is_some());
    assert!(shader.symbols.find("css_v_texCoord", shader.version).is_some());
}

#[test]
fn cos_is_marked_for_emulation_in_fragment_shaders() {
    let mut shader = Shader::parse(
        ShaderStage::Fragment,
        "precision mediump float;\nuniform float x;\nvoid main() { gl_FragColor = vec4(cos(x)); }\n",
    );
    let (ok, _, state) = shader.run(&EmulateBuiltInFunctions);
    assert!(ok);
    assert_eq!(state.emulated, vec!["cos(f1;".to_string()]);
    assert_eq!(
        shader.count(|k| matches!(k, NodeKind::Aggregate { use_emulated_function: true, .. })),
        1
    );
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
fn indirect_indices_are_clamped() {
    let mut shader = Shader::parse(ShaderStage::Fragment, INDIRECT_INDEX);
    let (ok, _, state) = shader.run(&ClampIndirectArrayBounds);
    assert!(ok);
    assert!(!state.needs_int_clamp);
    assert_eq!(
        shader.count(|k| matches!(k, NodeKind::Binary { add_index_clamp: true, .. })),
        2
    );
    assert_eq!(
        shader.count(|k| matches!(k, NodeKind::Binary { op: Operator::IndexDirect, add_index_clamp: false, .. })),
        1
    );
}

#[test]
fn user_defined_clamp_requests_helper() {
    let resources = Resources {
        array_index_clamping_strategy: ArrayIndexClampingStrategy::UserDefinedIntFunction,
        ..Resources::default()
    };
    let mut shader = Shader::parse_with(ShaderStage::Fragment, INDIRECT_INDEX, resources);
    let (ok, _, state) = shader.run(&ClampIndirectArrayBounds);
    assert!(ok);
    assert!(state.needs_int_clamp);
}

const VERTEX_VARYINGS: &str = r#"
attribute vec4 p;
varying vec4 used;
varying vec4 unused;
varying float pair[2];
void main() {
    used = p;
}
"#;

fn main_statements(shader: &Shader) -> usize {
    let main = shader.ast.find_function(shader.root, "main(").unwrap();
    let body = shader.ast.children(main)[1];
    shader.ast.children(body).len()
}

#[test]
fn gl_position_is_initialized() {
    let mut shader = Shader::parse(ShaderStage::Vertex, VERTEX_VARYINGS);
    let (ok, _, _) = shader.run(&InitializeVariables {
        target: InitTarget::GlPosition,
    });
    assert!(ok);
    assert_eq!(main_statements(&shader), 2);
}

#[test]
fn unused_varyings_are_initialized() {
    let mut shader = Shader::parse(ShaderStage::Vertex, VERTEX_VARYINGS);
    let (ok, _, _) = shader.run(&InitializeVariables {
        target: InitTarget::UnusedVaryings,
    });
    assert!(ok);
    // unused, pair[0], pair[1] and gl_Position, then the original store.
    assert_eq!(main_statements(&shader), 5);
}

#[test]
fn initialization_skips_fragment_shaders() {
    let mut shader = Shader::parse(
        ShaderStage::Fragment,
        "precision mediump float;\nvoid main() { gl_FragColor = vec4(0.5); }\n",
    );
    let (ok, _, _) = shader.run(&InitializeVariables {
        target: InitTarget::UnusedVaryings,
    });
    assert!(ok);
    assert_eq!(main_statements(&shader), 1);
}

#[test]
fn logical_operators_become_selections() {
    let mut shader = Shader::parse(
        ShaderStage::Fragment,
        r#"
precision mediump float;
uniform bool a;
uniform bool b;
uniform bool c;
void main() {
    if (a && (b || c)) {
        gl_FragColor = vec4(1.0);
    }
}
"#,
    );
    let logical = |k: &NodeKind| {
        matches!(
            k,
            NodeKind::Binary {
                op: Operator::LogicalAnd | Operator::LogicalOr,
                ..
            }
        )
    };
    assert_eq!(shader.count(logical), 2);

    let (ok, _, _) = shader.run(&UnfoldShortCircuit);
    assert!(ok);
    assert_eq!(shader.count(logical), 0);
    // The if statement plus two ternaries.
    assert_eq!(shader.count(|k| matches!(k, NodeKind::Selection { .. })), 3);
}

#[test]
fn local_struct_names_are_regenerated_once() {
    let mut shader = Shader::parse(
        ShaderStage::Fragment,
        r#"
precision mediump float;
struct G { float x; };
uniform G g;
void main() {
    struct S { float x; };
    S s;
    s.x = g.x;
    gl_FragColor = vec4(s.x);
}
"#,
    );
    let names = |shader: &Shader| {
        let mut names: Vec<String> = shader.ast.structs.iter().map(|(_, s)| s.name.clone()).collect();
        names.sort();
        names
    };

    let (ok, _, _) = shader.run(&RegenerateStructNames);
    assert!(ok);
    let first = names(&shader);
    assert!(first.contains(&"G".to_string()));
    let local = first
        .iter()
        .find(|n| n.starts_with(REGENERATED_STRUCT_PREFIX))
        .expect("local struct should be renamed");
    assert!(local.ends_with("_S"));

    let (ok, _, _) = shader.run(&RegenerateStructNames);
    assert!(ok);
    assert_eq!(names(&shader), first);
}
