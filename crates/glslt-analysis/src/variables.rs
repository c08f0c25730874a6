//! Reflection: the attributes, outputs, uniforms, varyings and interface
//! blocks a shader declares or uses.

use std::collections::HashSet;

use glslt_ast::{
    Ast, BasicType, Field, Handle, Node, NodeKind, Operator, Precision, Qualifier, ShaderStage,
    Type, Visitor, Walk, traverse,
};

use crate::hashing::NameHasher;

/// One reflected variable. Struct-typed variables carry their members in
/// `fields`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderVariable {
    pub name: String,
    /// Name in emitted code; the hashed name when hashing is enabled.
    pub mapped_name: String,
    pub basic: BasicType,
    /// Columns of a matrix, components of a vector, 1 otherwise.
    pub cols: u8,
    /// Rows of a matrix, 1 otherwise.
    pub rows: u8,
    pub precision: Precision,
    pub array_size: Option<u32>,
    pub static_use: bool,
    pub location: Option<u32>,
    pub struct_name: Option<String>,
    pub fields: Vec<ShaderVariable>,
}

impl ShaderVariable {
    /// A plain variable of the given shape, mainly for packing checks.
    pub fn new(name: impl Into<String>, basic: BasicType, cols: u8, rows: u8) -> Self {
        let name = name.into();
        Self {
            mapped_name: name.clone(),
            name,
            basic,
            cols,
            rows,
            precision: Precision::Undefined,
            array_size: None,
            static_use: false,
            location: None,
            struct_name: None,
            fields: Vec::new(),
        }
    }

    pub fn with_array(mut self, size: u32) -> Self {
        self.array_size = Some(size);
        self
    }

    pub fn is_struct(&self) -> bool {
        self.struct_name.is_some()
    }

    pub fn is_matrix(&self) -> bool {
        self.cols > 1 && self.rows > 1
    }

    /// Array length, or 1 for non-arrays.
    pub fn element_count(&self) -> u32 {
        self.array_size.unwrap_or(1)
    }

    /// GLSL spelling of the type, e.g. `vec3`, `mat2x4`, `sampler2D`.
    pub fn type_name(&self) -> String {
        if let Some(name) = &self.struct_name {
            return name.clone();
        }
        if self.is_matrix() {
            return if self.cols == self.rows {
                format!("mat{}", self.cols)
            } else {
                format!("mat{}x{}", self.cols, self.rows)
            };
        }
        if self.cols > 1 {
            let prefix = match self.basic {
                BasicType::Int => "ivec",
                BasicType::UInt => "uvec",
                BasicType::Bool => "bvec",
                _ => "vec",
            };
            return format!("{prefix}{}", self.cols);
        }
        self.basic.keyword().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceBlockInfo {
    pub name: String,
    pub mapped_name: String,
    pub instance_name: Option<String>,
    pub array_size: Option<u32>,
    pub static_use: bool,
    pub fields: Vec<ShaderVariable>,
}

/// Everything reflection collects for one shader.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShaderVariables {
    pub attributes: Vec<ShaderVariable>,
    pub outputs: Vec<ShaderVariable>,
    pub uniforms: Vec<ShaderVariable>,
    pub varyings: Vec<ShaderVariable>,
    pub interface_blocks: Vec<InterfaceBlockInfo>,
}

impl ShaderVariables {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
            && self.outputs.is_empty()
            && self.uniforms.is_empty()
            && self.varyings.is_empty()
            && self.interface_blocks.is_empty()
    }
}

/// Built-ins reported as varyings or outputs once the shader touches them.
fn builtin_kind(name: &str, stage: ShaderStage) -> Option<BuiltinKind> {
    match (stage, name) {
        (ShaderStage::Vertex, "gl_Position" | "gl_PointSize") => Some(BuiltinKind::Varying),
        (ShaderStage::Fragment, "gl_FragCoord" | "gl_FrontFacing" | "gl_PointCoord") => {
            Some(BuiltinKind::Varying)
        }
        (ShaderStage::Fragment, "gl_FragColor" | "gl_FragData" | "gl_FragDepthEXT") => {
            Some(BuiltinKind::Output)
        }
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BuiltinKind {
    Varying,
    Output,
}

/// Collects reflection data for the tree under `root`, hashing names
/// through `hasher`.
pub fn collect_variables(
    ast: &Ast,
    root: Handle<Node>,
    stage: ShaderStage,
    hasher: &mut NameHasher,
) -> ShaderVariables {
    let mut collect = Collect {
        stage,
        hasher,
        used: HashSet::new(),
        used_names: HashSet::new(),
        declared: Vec::new(),
        builtins: Vec::new(),
    };
    traverse(ast, root, &mut collect);

    let Collect {
        hasher,
        used,
        used_names,
        declared,
        builtins,
        ..
    } = collect;
    let mut out = ShaderVariables::default();

    for (id, name, ty) in declared {
        let static_use = used.contains(&id) || used_as_block_member(ast, &ty, &used_names);
        if ty.basic == BasicType::InterfaceBlock {
            if let Some(block) = ty.block.and_then(|h| ast.blocks.try_get(h)) {
                out.interface_blocks.push(InterfaceBlockInfo {
                    name: block.name.clone(),
                    mapped_name: hasher.hash(&block.name),
                    instance_name: block.instance_name.clone(),
                    array_size: block.array_size,
                    static_use,
                    fields: reflect_fields(ast, &block.fields, hasher),
                });
            }
            continue;
        }
        let mut variable = reflect_variable(ast, &name, &ty, hasher);
        variable.static_use = static_use;
        let q = ty.qualifier;
        if q.is_attribute() {
            out.attributes.push(variable);
        } else if q == Qualifier::Uniform {
            out.uniforms.push(variable);
        } else if q.is_varying() {
            out.varyings.push(variable);
        } else if q == Qualifier::FragmentOut {
            out.outputs.push(variable);
        }
    }

    for (name, ty, kind) in builtins {
        let mut variable = reflect_variable(ast, &name, &ty, hasher);
        variable.static_use = true;
        match kind {
            BuiltinKind::Varying => out.varyings.push(variable),
            BuiltinKind::Output => out.outputs.push(variable),
        }
    }

    log::debug!(
        "reflection: {} attributes, {} outputs, {} uniforms, {} varyings, {} blocks",
        out.attributes.len(),
        out.outputs.len(),
        out.uniforms.len(),
        out.varyings.len(),
        out.interface_blocks.len()
    );
    out
}

/// Members of a block without an instance name are separate symbols, so a
/// use of any of them counts for the block.
fn used_as_block_member(ast: &Ast, ty: &Type, used_names: &HashSet<String>) -> bool {
    ty.block
        .and_then(|h| ast.blocks.try_get(h))
        .is_some_and(|block| {
            block.instance_name.is_none()
                && block.fields.iter().any(|f| used_names.contains(&f.name))
        })
}

fn reflect_variable(ast: &Ast, name: &str, ty: &Type, hasher: &mut NameHasher) -> ShaderVariable {
    let mut variable = ShaderVariable {
        name: name.to_string(),
        mapped_name: hasher.hash(name),
        basic: ty.basic,
        cols: ty.cols(),
        rows: ty.rows(),
        precision: ty.precision,
        array_size: ty.array_size,
        static_use: false,
        location: ty.layout.location,
        struct_name: None,
        fields: Vec::new(),
    };
    if let Some(st) = ast.struct_type(ty) {
        variable.struct_name = Some(st.name.clone());
        variable.fields = reflect_fields(ast, &st.fields, hasher);
    }
    variable
}

fn reflect_fields(ast: &Ast, fields: &[Field], hasher: &mut NameHasher) -> Vec<ShaderVariable> {
    fields
        .iter()
        .map(|field| reflect_variable(ast, &field.name, &field.ty, hasher))
        .collect()
}

struct Collect<'h> {
    stage: ShaderStage,
    hasher: &'h mut NameHasher,
    /// Symbol ids referenced outside their declaration.
    used: HashSet<u32>,
    used_names: HashSet<String>,
    /// Global declarations in source order.
    declared: Vec<(u32, String, Type)>,
    builtins: Vec<(String, Type, BuiltinKind)>,
}

impl Collect<'_> {
    fn is_declaration(ast: &Ast, walk: &Walk, node: Handle<Node>) -> bool {
        let ancestors = walk.ancestors();
        let is_decl = |h: &Handle<Node>| {
            matches!(
                ast.node(*h).kind,
                NodeKind::Aggregate {
                    op: Operator::Declaration,
                    ..
                }
            )
        };
        match ancestors {
            [.., parent] if is_decl(parent) => true,
            [.., grand, parent] if is_decl(grand) => matches!(
                &ast.node(*parent).kind,
                NodeKind::Binary { op: Operator::Initialize, left, .. } if *left == node
            ),
            _ => false,
        }
    }

    /// Whether the declaration is outside every function body.
    fn at_global_scope(ast: &Ast, walk: &Walk) -> bool {
        !walk.ancestors().iter().any(|h| {
            matches!(
                ast.node(*h).kind,
                NodeKind::Aggregate {
                    op: Operator::Function,
                    ..
                }
            )
        })
    }
}

impl Visitor for Collect<'_> {
    fn visit_symbol(&mut self, ast: &Ast, walk: &Walk, node: Handle<Node>) {
        let NodeKind::Symbol { id, name, ty } = &ast.node(node).kind else {
            return;
        };
        if Self::is_declaration(ast, walk, node) {
            if Self::at_global_scope(ast, walk) && (!name.is_empty() || ty.block.is_some()) {
                self.declared.push((*id, name.clone(), *ty));
            }
            return;
        }
        self.used_names.insert(name.clone());
        if self.used.insert(*id) {
            if let Some(kind) = builtin_kind(name, self.stage) {
                self.builtins.push((name.clone(), *ty, kind));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glslt_ast::{Diagnostics, Resources, SymbolTable, insert_builtins};
    use glslt_parser::{ParseOptions, parse};

    fn collect(stage: ShaderStage, source: &str, hasher: &mut NameHasher) -> ShaderVariables {
        let mut ast = Ast::new();
        let mut symbols = SymbolTable::new();
        insert_builtins(&mut symbols, &mut ast.structs, stage, &Resources::default()).unwrap();
        symbols.push();
        ast.push();
        let options = ParseOptions {
            stage,
            ..ParseOptions::default()
        };
        let mut diags = Diagnostics::new();
        let parsed = parse(&[source], &mut ast, &mut symbols, &options, &mut diags)
            .expect("shader should parse");
        collect_variables(&ast, parsed.root, stage, hasher)
    }

    #[test]
    fn vertex_shader_variables() {
        let mut hasher = NameHasher::new(None);
        let vars = collect(
            ShaderStage::Vertex,
            "attribute vec4 a_position;\nattribute vec2 a_unused;\nuniform mat4 u_mvp;\nvarying vec2 v_uv;\nvoid main() { v_uv = a_position.xy; gl_Position = u_mvp * a_position; }\n",
            &mut hasher,
        );
        assert_eq!(vars.attributes.len(), 2);
        assert_eq!(vars.attributes[0].name, "a_position");
        assert!(vars.attributes[0].static_use);
        assert!(!vars.attributes[1].static_use);
        assert_eq!(vars.uniforms[0].type_name(), "mat4");
        let names: Vec<_> = vars.varyings.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["v_uv", "gl_Position"]);
    }

    #[test]
    fn struct_uniform_fields_and_hashing() {
        let mut hasher = NameHasher::new(Some(|name| name.len() as u64));
        let vars = collect(
            ShaderStage::Fragment,
            "precision mediump float;\nstruct Light { vec3 color; float power; };\nuniform Light u_light[2];\nvoid main() { gl_FragColor = vec4(u_light[0].color, 1.0); }\n",
            &mut hasher,
        );
        let light = &vars.uniforms[0];
        assert_eq!(light.type_name(), "Light");
        assert_eq!(light.array_size, Some(2));
        assert_eq!(light.fields.len(), 2);
        assert_eq!(light.mapped_name, "webgl_0000000000000007");
        assert_eq!(light.fields[1].name, "power");
        assert_eq!(vars.outputs[0].name, "gl_FragColor");
        assert_eq!(hasher.map().get("u_light"), Some("webgl_0000000000000007"));
    }

    #[test]
    fn es3_outputs_and_blocks() {
        let mut hasher = NameHasher::new(None);
        let vars = collect(
            ShaderStage::Fragment,
            "#version 300 es\nprecision mediump float;\nuniform Params { vec4 tint; } params;\nlayout(location = 0) out vec4 color;\nvoid main() { color = params.tint; }\n",
            &mut hasher,
        );
        assert_eq!(vars.outputs.len(), 1);
        assert_eq!(vars.outputs[0].location, Some(0));
        assert_eq!(vars.interface_blocks.len(), 1);
        let block = &vars.interface_blocks[0];
        assert_eq!(block.name, "Params");
        assert_eq!(block.instance_name.as_deref(), Some("params"));
        assert!(block.static_use);
        assert_eq!(block.fields[0].name, "tint");
    }
}
