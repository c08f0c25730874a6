//! Built-in function emulation.
//!
//! Some drivers miscompile a handful of built-ins. Calls to them are
//! marked so the emitter routes them through `webgl_<name>_emu` helpers,
//! whose definitions [`helper_source`] provides.

use std::collections::BTreeSet;

use glslt_ast::{
    Ast, Diagnostics, Handle, Node, NodeKind, Operator, ShaderStage, Visit, Visitor, Walk,
    traverse,
};

use crate::{Pass, PassContext};

/// A built-in overload that has an emulation helper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmulatedFunction {
    pub mangled_name: &'static str,
    pub source: &'static str,
}

const VERTEX: &[EmulatedFunction] = &[
    EmulatedFunction {
        mangled_name: "distance(f1;f1;",
        source: "#define webgl_distance_emu(x, y) ((x) >= (y) ? (x) - (y) : (y) - (x))",
    },
    EmulatedFunction {
        mangled_name: "dot(f1;f1;",
        source: "#define webgl_dot_emu(x, y) ((x) * (y))",
    },
    EmulatedFunction {
        mangled_name: "length(f1;",
        source: "#define webgl_length_emu(x) ((x) >= 0.0 ? (x) : -(x))",
    },
    EmulatedFunction {
        mangled_name: "normalize(f1;",
        source: "#define webgl_normalize_emu(x) ((x) == 0.0 ? 0.0 : ((x) > 0.0 ? 1.0 : -1.0))",
    },
    EmulatedFunction {
        mangled_name: "reflect(f1;f1;",
        source: "#define webgl_reflect_emu(I, N) ((I) - 2.0 * (N) * (I) * (N))",
    },
];

const FRAGMENT: &[EmulatedFunction] = &[
    EmulatedFunction {
        mangled_name: "cos(f1;",
        source: "webgl_emu_precision float webgl_cos_emu(webgl_emu_precision float a) { return cos(a); }",
    },
    EmulatedFunction {
        mangled_name: "cos(vf2;",
        source: "webgl_emu_precision vec2 webgl_cos_emu(webgl_emu_precision vec2 a) { return cos(a); }",
    },
    EmulatedFunction {
        mangled_name: "cos(vf3;",
        source: "webgl_emu_precision vec3 webgl_cos_emu(webgl_emu_precision vec3 a) { return cos(a); }",
    },
    EmulatedFunction {
        mangled_name: "cos(vf4;",
        source: "webgl_emu_precision vec4 webgl_cos_emu(webgl_emu_precision vec4 a) { return cos(a); }",
    },
];

const PRECISION_HEADER: &str = "#if defined(GL_FRAGMENT_PRECISION_HIGH)\n\
#define webgl_emu_precision highp\n\
#else\n\
#define webgl_emu_precision mediump\n\
#endif\n\n";

/// Overloads emulated in `stage`.
pub fn emulated_functions(stage: ShaderStage) -> &'static [EmulatedFunction] {
    match stage {
        ShaderStage::Vertex => VERTEX,
        ShaderStage::Fragment => FRAGMENT,
    }
}

/// Name of the helper replacing calls to `mangled_name`.
pub fn emulated_name(mangled_name: &str) -> String {
    let base = mangled_name.split('(').next().unwrap_or(mangled_name);
    format!("webgl_{base}_emu")
}

/// Helper definitions for the marked overloads, in table order. Empty
/// when nothing is marked.
pub fn helper_source(stage: ShaderStage, used: &BTreeSet<String>) -> String {
    let table = emulated_functions(stage);
    let mut out = String::new();
    for function in table.iter().filter(|f| used.contains(f.mangled_name)) {
        out.push_str(function.source);
        out.push('\n');
    }
    if out.is_empty() {
        return out;
    }
    if stage == ShaderStage::Fragment {
        out.insert_str(0, PRECISION_HEADER);
    }
    out.push('\n');
    out
}

/// Marks calls to emulated built-ins.
#[derive(Debug)]
pub struct EmulateBuiltInFunctions;

impl Pass for EmulateBuiltInFunctions {
    fn name(&self) -> &str {
        "emulate-built-in-functions"
    }

    fn run(&self, cx: &mut PassContext<'_>, _: &mut Diagnostics) -> bool {
        let mut finder = Finder {
            table: emulated_functions(cx.stage),
            calls: Vec::new(),
        };
        traverse(cx.ast, cx.root, &mut finder);

        for (node, mangled_name) in finder.calls {
            if let NodeKind::Aggregate {
                use_emulated_function,
                ..
            } = &mut cx.ast.node_mut(node).kind
            {
                *use_emulated_function = true;
            }
            cx.emulated_functions.insert(mangled_name.to_string());
        }
        true
    }
}

struct Finder {
    table: &'static [EmulatedFunction],
    calls: Vec<(Handle<Node>, &'static str)>,
}

impl Visitor for Finder {
    fn visit_aggregate(&mut self, ast: &Ast, _: &Walk, _: Visit, node: Handle<Node>) -> bool {
        if let NodeKind::Aggregate {
            op: Operator::FunctionCall,
            name,
            user_defined: false,
            ..
        } = &ast.node(node).kind
        {
            if let Some(function) = self.table.iter().find(|f| f.mangled_name == name.as_str()) {
                self.calls.push((node, function.mangled_name));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helper_names() {
        assert_eq!(emulated_name("cos(vf3;"), "webgl_cos_emu");
        assert_eq!(emulated_name("normalize(f1;"), "webgl_normalize_emu");
    }

    #[test]
    fn helper_source_only_for_used_overloads() {
        let none = BTreeSet::new();
        assert!(helper_source(ShaderStage::Fragment, &none).is_empty());

        let used: BTreeSet<String> = ["cos(vf2;".to_string()].into();
        let text = helper_source(ShaderStage::Fragment, &used);
        assert!(text.starts_with("#if defined(GL_FRAGMENT_PRECISION_HIGH)"));
        assert!(text.contains("vec2 webgl_cos_emu"));
        assert!(!text.contains("vec3 webgl_cos_emu"));

        let used: BTreeSet<String> = ["dot(f1;f1;".to_string()].into();
        let text = helper_source(ShaderStage::Vertex, &used);
        assert_eq!(text, "#define webgl_dot_emu(x, y) ((x) * (y))\n\n");
    }
}
