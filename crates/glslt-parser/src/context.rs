//! Semantic actions of the parser.
//!
//! [`ParseContext`] holds everything the grammar rules need while building
//! the tree: the node builder, the symbol table, the diagnostics sink and
//! the per-function state used to validate `return`, `break` and friends.
//! Checks report through `diags` and return `true` when the construct is
//! acceptable, so the parser can keep going after an error.

use std::collections::{BTreeMap, HashSet};

use glslt_ast::promote::higher_precision;
use glslt_ast::resources::EXT_DRAW_BUFFERS;
use glslt_ast::{
    Ast, BasicType, ConstantUnion, Diagnostics, Field, Function, Handle, InterfaceBlock,
    LayoutQualifier, Node, NodeKind, Operator, Parameter, Precision, Qualifier, ShaderStage,
    SourceLoc, StructType, Symbol, SymbolTable, Type, Variable,
};

use crate::ParseOptions;
use crate::directives::Behavior;

/// Largest array size accepted in a declaration.
const MAX_ARRAY_SIZE: u32 = 65536;

/// Deepest struct nesting WebGL shaders may declare.
const WEBGL_MAX_STRUCT_NESTING: usize = 4;

/// Storage qualifier word as written in the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Storage {
    Const,
    Attribute,
    Varying,
    Uniform,
    In,
    Out,
    CentroidIn,
    CentroidOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Interpolation {
    Smooth,
    Flat,
}

impl Interpolation {
    fn keyword(self) -> &'static str {
        match self {
            Self::Smooth => "smooth",
            Self::Flat => "flat",
        }
    }
}

/// Contents of a `layout(...)` list.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Layout {
    pub location: Option<u32>,
    /// Storage or packing identifier that only interface blocks accept.
    pub block_only: Option<&'static str>,
}

/// Qualifier words collected in front of a type.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Qualifiers {
    pub invariant: Option<SourceLoc>,
    pub interpolation: Option<(Interpolation, SourceLoc)>,
    pub storage: Option<(Storage, SourceLoc)>,
    pub layout: Option<(Layout, SourceLoc)>,
}

impl Qualifiers {
    pub fn is_empty(&self) -> bool {
        self.invariant.is_none()
            && self.interpolation.is_none()
            && self.storage.is_none()
            && self.layout.is_none()
    }
}

/// A type as spelled in a declaration, before it is attached to a name.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PublicType {
    pub ty: Type,
    pub loc: SourceLoc,
    pub block_only: Option<&'static str>,
}

impl PublicType {
    pub fn new(ty: Type, loc: SourceLoc) -> Self {
        Self {
            ty,
            loc,
            block_only: None,
        }
    }
}

/// One member declarator inside a struct or block body.
#[derive(Clone, Debug)]
pub(crate) struct MemberDeclarator {
    pub name: String,
    pub loc: SourceLoc,
    pub array_size: Option<u32>,
}

/// A parsed function header, before it is entered into the symbol table.
#[derive(Clone, Debug)]
pub(crate) struct FunctionHeader {
    pub name: String,
    pub loc: SourceLoc,
    pub return_type: Type,
    pub params: Vec<Parameter>,
}

impl FunctionHeader {
    pub fn mangled_name(&self, ast: &Ast) -> String {
        let codes: Vec<String> = self.params.iter().map(|p| ast.mangled_name(&p.ty)).collect();
        Function::mangle(&self.name, &codes)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct FunctionState {
    pub return_type: Type,
    pub returns_value: bool,
}

pub(crate) struct ParseContext<'a> {
    pub ast: &'a mut Ast,
    pub symbols: &'a mut SymbolTable,
    pub diags: &'a mut Diagnostics,
    pub options: &'a ParseOptions,
    pub version: u32,
    pub extensions: BTreeMap<String, Behavior>,
    pub loop_nesting: u32,
    pub struct_nesting: u32,
    pub function: Option<FunctionState>,
    block_names: HashSet<String>,
}

impl<'a> ParseContext<'a> {
    pub fn new(
        ast: &'a mut Ast,
        symbols: &'a mut SymbolTable,
        diags: &'a mut Diagnostics,
        options: &'a ParseOptions,
        version: u32,
        extensions: BTreeMap<String, Behavior>,
    ) -> Self {
        Self {
            ast,
            symbols,
            diags,
            options,
            version,
            extensions,
            loop_nesting: 0,
            struct_nesting: 0,
            function: None,
            block_names: HashSet::new(),
        }
    }

    pub fn error(&mut self, loc: SourceLoc, reason: &str, token: &str, extra: &str) {
        self.diags.error(loc, reason, token, extra);
    }

    pub fn warning(&mut self, loc: SourceLoc, reason: &str, token: &str, extra: &str) {
        self.diags.warning(loc, reason, token, extra);
    }

    fn is_webgl(&self) -> bool {
        self.options.webgl || self.options.css
    }

    pub fn is_extension_enabled(&self, name: &str) -> bool {
        matches!(
            self.extensions.get(name),
            Some(Behavior::Enable | Behavior::Require)
        )
    }

    /// Reports `what` as an ESSL 3.00 feature when compiling ESSL 1.00.
    pub fn es3_only(&mut self, loc: SourceLoc, token: &str, what: &str) {
        if self.version < 300 {
            self.error(loc, &format!("{what} supported in GLSL ES 3.00 only "), token, "");
        }
    }

    /// A typed placeholder used after an error so parsing can continue.
    pub fn error_constant(&mut self, loc: SourceLoc) -> Handle<Node> {
        self.ast.add_constant(
            vec![ConstantUnion::Float(0.0)],
            Type::scalar(BasicType::Float),
            loc,
        )
    }

    pub fn bool_constant(&mut self, value: bool, loc: SourceLoc) -> Handle<Node> {
        self.ast
            .add_constant(vec![ConstantUnion::Bool(value)], Type::BOOL, loc)
    }

    // ---- checks -------------------------------------------------------

    /// Names starting with `gl_` (and `webgl_`/`css_` for WebGL) are
    /// reserved, as is any name containing `__`.
    pub fn check_reserved_name(&mut self, loc: SourceLoc, name: &str) -> bool {
        if self.symbols.at_builtin_level() {
            return true;
        }
        let prefix = if name.starts_with("gl_") {
            Some("gl_")
        } else if self.is_webgl() && name.starts_with("webgl_") {
            Some("webgl_")
        } else if self.is_webgl() && name.starts_with("_webgl_") {
            Some("_webgl_")
        } else if self.options.css && name.starts_with("css_") {
            Some("css_")
        } else {
            None
        };
        if let Some(prefix) = prefix {
            self.error(loc, "reserved built-in name", prefix, "");
            return false;
        }
        if name.contains("__") {
            self.error(
                loc,
                "identifiers containing two consecutive underscores (__) are reserved as possible future keywords",
                name,
                "",
            );
            return false;
        }
        true
    }

    /// Whether `node` may be written through.
    pub fn check_lvalue(&mut self, loc: SourceLoc, op: &str, node: Handle<Node>) -> bool {
        let (binary, symbol) = match &self.ast.node(node).kind {
            NodeKind::Binary { op, left, .. } => (Some((*op, *left)), None),
            NodeKind::Symbol { name, .. } => (None, Some(name.clone())),
            _ => (None, None),
        };

        if let Some((binary_op, left)) = binary {
            return match binary_op {
                Operator::IndexDirect
                | Operator::IndexIndirect
                | Operator::IndexDirectStruct
                | Operator::IndexDirectInterfaceBlock => self.check_lvalue(loc, op, left),
                Operator::VectorSwizzle => {
                    if !self.check_lvalue(loc, op, left) {
                        return false;
                    }
                    let mut seen = [false; 4];
                    for offset in self.ast.swizzle_offsets(node) {
                        let slot = &mut seen[usize::from(offset & 3)];
                        if *slot {
                            self.error(
                                loc,
                                " l-value of swizzle cannot have duplicate components",
                                op,
                                "",
                            );
                            return false;
                        }
                        *slot = true;
                    }
                    true
                }
                _ => {
                    self.error(loc, " l-value required", op, "");
                    false
                }
            };
        }

        let ty = self.ast.ty(node);
        let message = match ty.qualifier {
            Qualifier::Const | Qualifier::ConstReadOnly => Some("can't modify a const"),
            Qualifier::Attribute => Some("can't modify an attribute"),
            Qualifier::FragmentIn
            | Qualifier::VertexIn
            | Qualifier::FlatIn
            | Qualifier::SmoothIn
            | Qualifier::CentroidIn => Some("can't modify an input"),
            Qualifier::Uniform => Some("can't modify a uniform"),
            Qualifier::VaryingIn | Qualifier::InvariantVaryingIn => Some("can't modify a varying"),
            Qualifier::FragCoord => Some("can't modify gl_FragCoord"),
            Qualifier::FrontFacing => Some("can't modify gl_FrontFacing"),
            Qualifier::PointCoord => Some("can't modify gl_PointCoord"),
            _ if ty.basic.is_sampler() => Some("can't modify a sampler"),
            _ if ty.basic == BasicType::Void => Some("can't modify void"),
            _ => None,
        };

        match (message, symbol) {
            (None, None) => {
                self.error(loc, " l-value required", op, "");
                false
            }
            (None, Some(_)) => true,
            (Some(message), Some(name)) => {
                self.error(loc, " l-value required", op, &format!("\"{name}\" ({message})"));
                false
            }
            (Some(message), None) => {
                self.error(loc, " l-value required", op, &format!("({message})"));
                false
            }
        }
    }

    pub fn check_integer(&mut self, node: Handle<Node>, token: &str) -> bool {
        if self.ast.ty(node).is_scalar_int() {
            return true;
        }
        let loc = self.ast.loc(node);
        self.error(loc, "integer expression required", token, "");
        false
    }

    pub fn check_global(&mut self, loc: SourceLoc, token: &str) -> bool {
        if self.symbols.at_global_level() {
            return true;
        }
        self.error(loc, "only allowed at global scope", token, "");
        false
    }

    /// Conditions must be a scalar `bool`.
    pub fn check_bool(&mut self, loc: SourceLoc, node: Handle<Node>) -> bool {
        let ty = self.ast.ty(node);
        if ty.basic == BasicType::Bool && ty.is_scalar() {
            return true;
        }
        self.error(loc, "boolean expression expected", "", "");
        false
    }

    pub fn check_void(&mut self, loc: SourceLoc, name: &str, ty: &Type) -> bool {
        if ty.basic != BasicType::Void {
            return true;
        }
        self.error(loc, "illegal use of type 'void'", name, "");
        false
    }

    pub fn contains_sampler(&self, ty: &Type) -> bool {
        if ty.is_sampler() {
            return true;
        }
        if let Some(st) = self.ast.struct_type(ty) {
            return st.fields.iter().any(|f| self.contains_sampler(&f.ty));
        }
        if let Some(block) = ty.block {
            return self.ast.blocks[block]
                .fields
                .iter()
                .any(|f| self.contains_sampler(&f.ty));
        }
        false
    }

    fn check_sampler(&mut self, loc: SourceLoc, ty: &Type, reason: &str) -> bool {
        if ty.is_struct() {
            if self.contains_sampler(ty) {
                self.error(loc, reason, ty.basic.keyword(), "(structure contains a sampler)");
                return false;
            }
            return true;
        }
        if ty.is_sampler() {
            self.error(loc, reason, ty.basic.keyword(), "");
            return false;
        }
        true
    }

    /// Structs cannot be attributes, varyings or shader inputs/outputs, and
    /// samplers can only be uniforms.
    pub fn check_struct_qualifier(&mut self, loc: SourceLoc, ty: &Type) -> bool {
        let interface = matches!(
            ty.qualifier,
            Qualifier::VaryingIn
                | Qualifier::VaryingOut
                | Qualifier::InvariantVaryingIn
                | Qualifier::InvariantVaryingOut
                | Qualifier::Attribute
                | Qualifier::VertexIn
                | Qualifier::FragmentOut
        );
        if interface && ty.is_struct() {
            self.error(loc, "cannot be used with a structure", ty.qualifier.as_str(), "");
            return false;
        }
        if ty.qualifier != Qualifier::Uniform && !self.check_sampler(loc, ty, "samplers must be uniform") {
            return false;
        }
        true
    }

    pub fn check_location_list(&mut self, loc: SourceLoc, ty: &Type) -> bool {
        if ty.layout.location.is_none() {
            return true;
        }
        self.error(
            loc,
            "location must only be specified for a single input or output variable",
            "location",
            "",
        );
        false
    }

    fn check_layout_location(&mut self, loc: SourceLoc, layout: &LayoutQualifier) -> bool {
        if layout.location.is_none() {
            return true;
        }
        self.error(
            loc,
            "invalid layout qualifier:",
            "location",
            "only valid on program inputs and outputs",
        );
        false
    }

    pub fn check_parameter_sampler(&mut self, loc: SourceLoc, qualifier: Qualifier, ty: &Type) -> bool {
        if matches!(qualifier, Qualifier::Out | Qualifier::InOut) && ty.is_sampler() {
            self.error(loc, "samplers cannot be output parameters", ty.basic.keyword(), "");
            return false;
        }
        true
    }

    /// Applies a parameter's `const`/`in`/`out`/`inout` to its type.
    pub fn check_param(
        &mut self,
        loc: SourceLoc,
        is_const: bool,
        param_qualifier: Qualifier,
        ty: &mut Type,
    ) -> bool {
        if is_const && param_qualifier != Qualifier::In {
            self.error(loc, "qualifier not allowed with ", "const", param_qualifier.as_str());
            ty.qualifier = param_qualifier;
            return false;
        }
        ty.qualifier = if is_const {
            Qualifier::ConstReadOnly
        } else {
            param_qualifier
        };
        true
    }

    /// Evaluates a constant array size, substituting 1 on error.
    pub fn array_size(&mut self, loc: SourceLoc, node: Handle<Node>) -> u32 {
        let ty = self.ast.ty(node);
        let value = match self.ast.constant_values(node).and_then(|v| v.first()) {
            Some(value) if ty.is_scalar_int() => *value,
            _ => {
                self.error(loc, "array size must be a constant integer expression", "", "");
                return 1;
            }
        };
        let size = match value {
            ConstantUnion::UInt(v) => v,
            other => {
                let signed = other.as_i32();
                if signed < 0 {
                    self.error(loc, "array size must be non-negative", "", "");
                    return 1;
                }
                signed.unsigned_abs()
            }
        };
        if size == 0 {
            self.error(loc, "array size must be greater than zero", "", "");
            return 1;
        }
        if size > MAX_ARRAY_SIZE {
            self.error(loc, "array size too large", "", "");
            return 1;
        }
        size
    }

    pub fn check_array_qualifier(&mut self, loc: SourceLoc, ty: &Type) -> bool {
        if matches!(
            ty.qualifier,
            Qualifier::Attribute | Qualifier::VertexIn | Qualifier::Const
        ) {
            self.error(loc, "cannot declare arrays of this qualifier", &ty.to_string(), "");
            return false;
        }
        true
    }

    pub fn check_array_type(&mut self, loc: SourceLoc, ty: &Type) -> bool {
        if ty.is_array() {
            self.error(loc, "cannot declare arrays of arrays", &ty.to_string(), "");
            return false;
        }
        true
    }

    fn struct_contains_arrays(&self, ty: &Type) -> bool {
        self.ast.struct_type(ty).is_some_and(|st| {
            st.fields
                .iter()
                .any(|f| f.ty.is_array() || self.struct_contains_arrays(&f.ty))
        })
    }

    /// A `const` without initializer is an error; the variable is demoted to
    /// a temporary so later uses don't cascade.
    pub fn check_non_init_const(&mut self, loc: SourceLoc, name: &str, ty: &mut Type, array: bool) -> bool {
        if ty.qualifier != Qualifier::Const {
            return true;
        }
        ty.qualifier = Qualifier::Temporary;
        let reason = if array {
            "arrays may not be declared constant since they cannot be initialized"
        } else if self.struct_contains_arrays(ty) {
            "structures containing arrays may not be declared constant since they cannot be initialized"
        } else {
            "variables with qualifier 'const' must be initialized"
        };
        self.error(loc, reason, name, "");
        false
    }

    pub fn check_extension(&mut self, loc: SourceLoc, extension: &str) -> bool {
        match self.extensions.get(extension).copied() {
            None => {
                self.error(loc, "extension", extension, "is not supported");
                false
            }
            Some(Behavior::Disable | Behavior::Undefined) => {
                self.error(loc, "extension", extension, "is disabled");
                false
            }
            Some(Behavior::Warn) => {
                self.warning(loc, "extension", extension, "is being used");
                true
            }
            Some(Behavior::Enable | Behavior::Require) => true,
        }
    }

    /// Fragment shaders have no default float precision.
    pub fn check_precision(&mut self, loc: SourceLoc, precision: Precision, basic: BasicType) -> bool {
        if precision != Precision::Undefined {
            return true;
        }
        match basic {
            BasicType::Float => {
                self.error(loc, "No precision specified for (float)", "", "");
                false
            }
            BasicType::Int | BasicType::UInt => {
                self.error(loc, "No precision specified (int)", "", "");
                false
            }
            _ => true,
        }
    }

    fn check_single_declaration(&mut self, loc: SourceLoc, pt: &PublicType) -> bool {
        if !self.check_struct_qualifier(loc, &pt.ty) {
            return false;
        }
        if let Some(name) = pt.block_only {
            self.error(loc, "layout qualifier", name, "only valid for interface blocks");
            return false;
        }
        if !matches!(pt.ty.qualifier, Qualifier::VertexIn | Qualifier::FragmentOut)
            && !self.check_layout_location(loc, &pt.ty.layout)
        {
            return false;
        }
        true
    }

    // ---- qualifiers and types -----------------------------------------

    /// Turns the qualifier words in front of a declaration into a type
    /// qualifier for the current stage.
    pub fn resolve_qualifiers(&mut self, quals: &Qualifiers, loc: SourceLoc) -> (Qualifier, bool, Layout) {
        let stage = self.options.stage;
        let vertex = stage == ShaderStage::Vertex;
        let mut qualifier = match quals.storage {
            None => {
                if self.symbols.at_global_level() {
                    Qualifier::Global
                } else {
                    Qualifier::Temporary
                }
            }
            Some((storage, storage_loc)) => self.storage_qualifier(storage, storage_loc, quals.invariant.is_some()),
        };

        if let Some((interp, interp_loc)) = quals.interpolation {
            self.es3_only(interp_loc, interp.keyword(), "interpolation qualifier");
            qualifier = match (qualifier, interp) {
                (Qualifier::FragmentIn, Interpolation::Smooth) => Qualifier::SmoothIn,
                (Qualifier::FragmentIn | Qualifier::CentroidIn, Interpolation::Flat) => Qualifier::FlatIn,
                (Qualifier::CentroidIn, Interpolation::Smooth) => Qualifier::CentroidIn,
                (Qualifier::VertexOut, Interpolation::Smooth) => Qualifier::SmoothOut,
                (Qualifier::VertexOut | Qualifier::CentroidOut, Interpolation::Flat) => Qualifier::FlatOut,
                (Qualifier::CentroidOut, Interpolation::Smooth) => Qualifier::CentroidOut,
                (other, interp) => {
                    self.error(
                        interp_loc,
                        "interpolation qualifier requires a fragment 'in' or vertex 'out' storage qualifier",
                        interp.keyword(),
                        "",
                    );
                    other
                }
            };
        }

        let mut invariant = false;
        if let Some(invariant_loc) = quals.invariant {
            let allowed = qualifier.is_varying()
                || matches!(
                    qualifier,
                    Qualifier::VertexOut
                        | Qualifier::SmoothOut
                        | Qualifier::FlatOut
                        | Qualifier::CentroidOut
                        | Qualifier::FragmentOut
                )
                || (!vertex && qualifier.is_varying_in());
            if allowed {
                invariant = !matches!(
                    qualifier,
                    Qualifier::InvariantVaryingIn | Qualifier::InvariantVaryingOut
                );
            } else {
                self.error(
                    invariant_loc,
                    "can only be applied to shader outputs or varyings",
                    "invariant",
                    "",
                );
            }
        }

        let layout = match quals.layout {
            Some((layout, layout_loc)) => {
                self.es3_only(layout_loc, "layout", "layout qualifier");
                layout
            }
            None => Layout::default(),
        };
        log::trace!("qualifiers at {loc} resolve to {qualifier}");
        (qualifier, invariant, layout)
    }

    fn storage_qualifier(&mut self, storage: Storage, loc: SourceLoc, invariant: bool) -> Qualifier {
        let vertex = self.options.stage == ShaderStage::Vertex;
        match storage {
            Storage::Const => Qualifier::Const,
            Storage::Attribute => {
                if !vertex {
                    self.error(loc, " supported in vertex shaders only ", "attribute", "");
                }
                self.check_global(loc, "attribute");
                Qualifier::Attribute
            }
            Storage::Varying => {
                if invariant {
                    self.check_global(loc, "invariant varying");
                    if vertex {
                        Qualifier::InvariantVaryingOut
                    } else {
                        Qualifier::InvariantVaryingIn
                    }
                } else {
                    self.check_global(loc, "varying");
                    if vertex {
                        Qualifier::VaryingOut
                    } else {
                        Qualifier::VaryingIn
                    }
                }
            }
            Storage::Uniform => {
                self.check_global(loc, "uniform");
                Qualifier::Uniform
            }
            Storage::In | Storage::Out | Storage::CentroidIn | Storage::CentroidOut => {
                let qualifier = match (storage, vertex) {
                    (Storage::In, true) => Qualifier::VertexIn,
                    (Storage::In, false) => Qualifier::FragmentIn,
                    (Storage::Out, true) => Qualifier::VertexOut,
                    (Storage::Out, false) => Qualifier::FragmentOut,
                    (Storage::CentroidIn, false) => Qualifier::CentroidIn,
                    (Storage::CentroidIn, true) => Qualifier::VertexIn,
                    (Storage::CentroidOut, true) => Qualifier::CentroidOut,
                    _ => Qualifier::FragmentOut,
                };
                self.es3_only(loc, qualifier.as_str(), "storage qualifier");
                if !self.symbols.at_global_level() {
                    self.error(
                        loc,
                        "Local variables can only use the const storage qualifier.",
                        qualifier.as_str(),
                        "",
                    );
                }
                qualifier
            }
        }
    }

    /// Fills in the default precision and validates it.
    pub fn finish_type_specifier(&mut self, mut pt: PublicType, precision: Option<(Precision, SourceLoc)>) -> PublicType {
        match precision {
            Some((precision, loc)) => {
                if !pt.ty.basic.supports_precision() {
                    self.error(loc, "illegal type for precision qualifier", pt.ty.basic.keyword(), "");
                }
                pt.ty.precision = precision;
            }
            None => {
                pt.ty.precision = self.symbols.default_precision(pt.ty.basic);
                self.check_precision(pt.loc, pt.ty.precision, pt.ty.basic);
            }
        }
        pt
    }

    /// Merges resolved qualifiers with a type specifier and applies the
    /// per-version restrictions on interface types.
    pub fn fully_specified_type(
        &mut self,
        qualifier: Qualifier,
        invariant: bool,
        layout: Layout,
        spec: PublicType,
    ) -> PublicType {
        let mut pt = spec;
        pt.ty.qualifier = qualifier;
        pt.ty.invariant = invariant;
        pt.ty.layout = LayoutQualifier {
            location: layout.location,
        };
        pt.block_only = layout.block_only;

        if pt.ty.is_array() {
            self.error(pt.loc, "not supported", "first-class array", "");
            pt.ty.array_size = None;
        }

        let basic = pt.ty.basic;
        if self.version < 300 {
            let interface = matches!(
                qualifier,
                Qualifier::Attribute
                    | Qualifier::VaryingIn
                    | Qualifier::VaryingOut
                    | Qualifier::InvariantVaryingIn
                    | Qualifier::InvariantVaryingOut
            );
            if interface && matches!(basic, BasicType::Bool | BasicType::Int) {
                self.error(pt.loc, "cannot be bool or int", qualifier.as_str(), "");
            }
        } else {
            match qualifier {
                Qualifier::SmoothIn
                | Qualifier::SmoothOut
                | Qualifier::VertexOut
                | Qualifier::FragmentIn
                | Qualifier::CentroidIn
                | Qualifier::CentroidOut => {
                    if basic == BasicType::Bool {
                        self.error(pt.loc, "cannot be bool", qualifier.as_str(), "");
                    }
                    if basic.is_integer() {
                        self.error(pt.loc, "must use 'flat' interpolation here", qualifier.as_str(), "");
                    }
                }
                Qualifier::VertexIn | Qualifier::FragmentOut | Qualifier::FlatIn | Qualifier::FlatOut => {
                    if basic == BasicType::Bool {
                        self.error(pt.loc, "cannot be bool", qualifier.as_str(), "");
                    }
                }
                _ => {}
            }
        }
        pt
    }

    /// `precision <p> <type>;`
    pub fn default_precision(&mut self, loc: SourceLoc, precision: Precision, ty: &Type) {
        if precision == Precision::High
            && self.options.stage == ShaderStage::Fragment
            && !self.options.resources.fragment_precision_high
        {
            self.error(loc, "precision is not supported in fragment shader", "highp", "");
        }
        let aggregate = ty.is_array() || ty.is_vector() || ty.is_matrix() || ty.is_struct();
        if aggregate || !self.symbols.set_default_precision(ty.basic, precision) {
            self.error(
                loc,
                "illegal type argument for default precision qualifier",
                ty.basic.keyword(),
                "",
            );
        }
    }

    pub fn layout_id(&mut self, loc: SourceLoc, name: &str) -> Layout {
        let mut layout = Layout::default();
        match name {
            "shared" => layout.block_only = Some("shared"),
            "packed" => layout.block_only = Some("packed"),
            "std140" => layout.block_only = Some("std140"),
            "row_major" => layout.block_only = Some("row_major"),
            "column_major" => layout.block_only = Some("column_major"),
            "location" => self.error(loc, "invalid layout qualifier", name, "location requires an argument"),
            _ => self.error(loc, "invalid layout qualifier", name, ""),
        }
        layout
    }

    pub fn layout_id_value(&mut self, loc: SourceLoc, name: &str, text: &str, value: i64) -> Layout {
        let mut layout = Layout::default();
        if name != "location" {
            self.error(loc, "invalid layout qualifier", name, "only location may have arguments");
        } else {
            match u32::try_from(value) {
                Ok(location) => layout.location = Some(location),
                Err(_) => self.error(loc, "out of range:", text, "location must be non-negative"),
            }
        }
        layout
    }

    pub fn join_layouts(left: Layout, right: Layout) -> Layout {
        Layout {
            location: right.location.or(left.location),
            block_only: right.block_only.or(left.block_only),
        }
    }

    // ---- declarations -------------------------------------------------

    /// Inserts a variable into the innermost scope, reporting redefinitions.
    fn declare(&mut self, loc: SourceLoc, variable: Variable) -> Option<u32> {
        let name = variable.name.clone();
        let clashes_with_function = self.symbols.at_global_level()
            && self.symbols.has_function_named(&name, self.version)
            && !self.symbols.is_builtin_function_name(&name, self.version);
        if clashes_with_function {
            self.error(loc, "redefinition", &name, "");
            return None;
        }
        match self.symbols.insert(Symbol::Variable(variable)) {
            Ok(id) => Some(id),
            Err(_) => {
                self.error(loc, "redefinition", &name, "");
                None
            }
        }
    }

    fn declare_uninitialized(&mut self, loc: SourceLoc, name: &str, ty: Type) -> u32 {
        self.check_reserved_name(loc, name);
        let id = self.declare(loc, Variable::new(name, ty)).unwrap_or(0);
        self.check_void(loc, name, &ty);
        id
    }

    /// `T name;` or a bare `T;` (struct definitions).
    pub fn single_declaration(&mut self, pt: &mut PublicType, loc: SourceLoc, name: &str) -> Handle<Node> {
        let mut id = 0;
        if !name.is_empty() {
            self.check_single_declaration(loc, pt);
            self.check_non_init_const(loc, name, &mut pt.ty, false);
            id = self.declare_uninitialized(loc, name, pt.ty);
        }
        let symbol = self.ast.add_symbol(id, name, pt.ty, loc);
        self.ast.make_aggregate(Some(symbol), loc)
    }

    /// `T name[N];`
    pub fn single_array_declaration(
        &mut self,
        pt: &mut PublicType,
        loc: SourceLoc,
        name: &str,
        size_loc: SourceLoc,
        size: Handle<Node>,
    ) -> Handle<Node> {
        self.check_single_declaration(loc, pt);
        self.check_non_init_const(loc, name, &mut pt.ty, true);
        let ty = self.array_declarator_type(pt, size_loc, size);
        let id = self.declare_uninitialized(loc, name, ty);
        let symbol = self.ast.add_symbol(id, name, ty, loc);
        self.ast.make_aggregate(Some(symbol), loc)
    }

    fn array_declarator_type(&mut self, pt: &PublicType, size_loc: SourceLoc, size: Handle<Node>) -> Type {
        self.check_array_type(size_loc, &pt.ty);
        self.check_array_qualifier(size_loc, &pt.ty);
        let size = self.array_size(size_loc, size);
        pt.ty.with_array(size)
    }

    /// `T name = init;`
    pub fn single_init_declaration(
        &mut self,
        pt: &mut PublicType,
        loc: SourceLoc,
        name: &str,
        init_loc: SourceLoc,
        init: Handle<Node>,
    ) -> Option<Handle<Node>> {
        self.check_single_declaration(loc, pt);
        let node = self.execute_initializer(init_loc, loc, name, pt.ty, init)?;
        Some(self.ast.make_aggregate(Some(node), init_loc))
    }

    /// A further `, name` in a declarator list.
    pub fn declarator(
        &mut self,
        pt: &mut PublicType,
        list: Option<Handle<Node>>,
        loc: SourceLoc,
        name: &str,
    ) -> Option<Handle<Node>> {
        self.check_struct_qualifier(loc, &pt.ty);
        self.check_location_list(loc, &pt.ty);
        let mut ty = pt.ty;
        self.check_non_init_const(loc, name, &mut ty, false);
        let id = self.declare_uninitialized(loc, name, ty);
        let symbol = self.ast.add_symbol(id, name, ty, loc);
        self.ast.grow_aggregate(list, Some(symbol), loc)
    }

    /// A further `, name[N]` in a declarator list.
    pub fn array_declarator(
        &mut self,
        pt: &mut PublicType,
        list: Option<Handle<Node>>,
        loc: SourceLoc,
        name: &str,
        size_loc: SourceLoc,
        size: Handle<Node>,
    ) -> Option<Handle<Node>> {
        self.check_struct_qualifier(loc, &pt.ty);
        self.check_location_list(loc, &pt.ty);
        let mut base = *pt;
        self.check_non_init_const(loc, name, &mut base.ty, true);
        let ty = self.array_declarator_type(&base, size_loc, size);
        let id = self.declare_uninitialized(loc, name, ty);
        let symbol = self.ast.add_symbol(id, name, ty, loc);
        self.ast.grow_aggregate(list, Some(symbol), loc)
    }

    /// A further `, name = init` in a declarator list.
    pub fn init_declarator(
        &mut self,
        pt: &mut PublicType,
        list: Option<Handle<Node>>,
        loc: SourceLoc,
        name: &str,
        init_loc: SourceLoc,
        init: Handle<Node>,
    ) -> Option<Handle<Node>> {
        self.check_struct_qualifier(loc, &pt.ty);
        self.check_location_list(loc, &pt.ty);
        match self.execute_initializer(init_loc, loc, name, pt.ty, init) {
            Some(node) => self.ast.grow_aggregate(list, Some(node), init_loc),
            None => list,
        }
    }

    /// Declares `name` and builds its initialization. Constants are
    /// recorded in the symbol table instead and produce no node.
    fn execute_initializer(
        &mut self,
        loc: SourceLoc,
        name_loc: SourceLoc,
        name: &str,
        mut ty: Type,
        init: Handle<Node>,
    ) -> Option<Handle<Node>> {
        self.check_reserved_name(name_loc, name);
        if !self.check_void(name_loc, name, &ty) {
            return None;
        }
        let same_scope = self
            .symbols
            .find(name, self.version)
            .is_some_and(|lookup| lookup.same_scope);
        if same_scope {
            self.error(name_loc, "redefinition", name, "");
            return None;
        }

        let qualifier = ty.qualifier;
        if !matches!(
            qualifier,
            Qualifier::Temporary | Qualifier::Global | Qualifier::Const
        ) {
            self.error(loc, " cannot initialize this type of qualifier ", qualifier.as_str(), "");
            self.declare(name_loc, Variable::new(name, ty));
            return None;
        }

        if qualifier == Qualifier::Const {
            let init_ty = self.ast.ty(init);
            let failure = if init_ty.qualifier != Qualifier::Const {
                Some((" assigning non-constant to", "=".to_string(), format!("'{ty}'")))
            } else if !ty.same_shape(&init_ty) {
                Some((
                    " non-matching types for const initializer ",
                    init_ty.qualifier.as_str().to_string(),
                    String::new(),
                ))
            } else if self.ast.constant_values(init).is_none() {
                Some((" cannot assign to", "=".to_string(), format!("'{ty}'")))
            } else {
                None
            };
            if let Some((reason, token, extra)) = failure {
                self.error(loc, reason, &token, &extra);
                ty.qualifier = Qualifier::Temporary;
                self.declare(name_loc, Variable::new(name, ty));
                return None;
            }
            let mut variable = Variable::new(name, ty);
            variable.const_value = self.ast.constant_values(init).map(<[ConstantUnion]>::to_vec);
            self.declare(name_loc, variable);
            return None;
        }

        let id = self.declare(name_loc, Variable::new(name, ty))?;
        let symbol = self.ast.add_symbol(id, name, ty, name_loc);
        match self.ast.add_assign(Operator::Initialize, symbol, init, loc) {
            Ok(node) => Some(node),
            Err(_) => {
                let init_ty = self.ast.ty(init);
                self.error(
                    loc,
                    "",
                    "=",
                    &format!("cannot convert from '{init_ty}' to '{ty}'"),
                );
                None
            }
        }
    }

    /// `invariant name` (first entry of an invariant list, or a later one
    /// when `list` is given).
    pub fn invariant_declaration(
        &mut self,
        list: Option<Handle<Node>>,
        invariant_loc: SourceLoc,
        loc: SourceLoc,
        name: &str,
    ) -> Option<Handle<Node>> {
        if list.is_none() {
            self.check_global(invariant_loc, "invariant varying");
        }
        let found = self
            .symbols
            .find(name, self.version)
            .and_then(|lookup| lookup.symbol.as_variable().cloned());
        let Some(variable) = found else {
            self.error(loc, "undeclared identifier declared as invariant", name, "");
            return list;
        };
        if variable.ty.qualifier == Qualifier::FrontFacing {
            self.error(loc, "identifier should not be declared as invariant", name, "");
            return list;
        }
        let symbol = self.ast.add_symbol(variable.id, name, variable.ty, loc);
        match list {
            Some(list) => self.ast.grow_aggregate(Some(list), Some(symbol), loc),
            None => Some(
                self.ast
                    .aggregate(Operator::InvariantDeclaration, vec![symbol], invariant_loc),
            ),
        }
    }

    /// `layout(...) uniform;`
    pub fn global_layout(&mut self, loc: SourceLoc, qualifier: Qualifier, layout: Layout) {
        self.es3_only(loc, "layout", "layout qualifier");
        if qualifier != Qualifier::Uniform {
            self.error(loc, "invalid qualifier:", qualifier.as_str(), "global layout must be uniform");
            return;
        }
        self.check_layout_location(
            loc,
            &LayoutQualifier {
                location: layout.location,
            },
        );
    }

    // ---- structs and blocks -------------------------------------------

    pub fn enter_struct(&mut self, loc: SourceLoc) {
        self.struct_nesting += 1;
        if self.struct_nesting > 1 {
            self.error(loc, "", "Embedded struct definitions are not allowed", "");
        }
    }

    fn struct_depth(&self, ty: &Type) -> usize {
        match self.ast.struct_type(ty) {
            Some(st) => 1 + st.fields.iter().map(|f| self.struct_depth(&f.ty)).max().unwrap_or(0),
            None => 0,
        }
    }

    /// Builds the fields of one `T a, b[2];` line of a struct body.
    pub fn struct_member_list(&mut self, spec: &PublicType, declarators: Vec<MemberDeclarator>) -> Vec<Field> {
        if let Some(first) = declarators.first() {
            self.check_void(spec.loc, &first.name, &spec.ty);
        }
        let mut fields = Vec::with_capacity(declarators.len());
        for declarator in declarators {
            let mut ty = spec.ty;
            ty.layout = LayoutQualifier::default();
            if let Some(size) = declarator.array_size {
                self.check_array_type(spec.loc, &spec.ty);
                ty.array_size = Some(size);
            }
            if self.is_webgl()
                && ty.is_struct()
                && 1 + self.struct_depth(&ty) > WEBGL_MAX_STRUCT_NESTING
            {
                let st_name = self
                    .ast
                    .struct_type(&ty)
                    .map(|st| st.name.clone())
                    .unwrap_or_default();
                self.error(
                    declarator.loc,
                    &format!(
                        "Reference of struct type {st_name} exceeds maximum allowed nesting level of {WEBGL_MAX_STRUCT_NESTING}"
                    ),
                    &declarator.name,
                    "",
                );
            }
            fields.push(Field {
                name: declarator.name,
                ty,
                loc: declarator.loc,
            });
        }
        fields
    }

    /// Closes a struct body and registers the type (and its name).
    pub fn add_structure(
        &mut self,
        loc: SourceLoc,
        name_loc: SourceLoc,
        name: &str,
        fields: Vec<Field>,
    ) -> PublicType {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                self.error(field.loc, "duplicate field name in structure:", "struct", &field.name);
            }
        }
        let handle = self.ast.structs.append(StructType {
            name: name.to_string(),
            fields,
            unique_id: self.symbols.next_unique_id(),
            at_global_scope: self.symbols.at_global_level(),
        });
        let ty = Type::structure(handle);
        if !name.is_empty() {
            self.check_reserved_name(name_loc, name);
            let mut variable = Variable::new(name, ty);
            variable.user_type = true;
            if self.symbols.insert(Symbol::Variable(variable)).is_err() {
                self.error(name_loc, "redefinition", name, "struct");
            }
        }
        self.struct_nesting = self.struct_nesting.saturating_sub(1);
        PublicType::new(ty, loc)
    }

    /// `uniform Name { ... } [instance[N]];`
    #[allow(clippy::too_many_arguments)]
    pub fn add_interface_block(
        &mut self,
        qualifier: Qualifier,
        layout: Layout,
        qualifier_loc: SourceLoc,
        name_loc: SourceLoc,
        name: &str,
        mut fields: Vec<Field>,
        instance: Option<(String, SourceLoc)>,
        array: Option<(SourceLoc, Handle<Node>)>,
    ) -> Handle<Node> {
        self.es3_only(qualifier_loc, qualifier.as_str(), "interface blocks");
        self.check_reserved_name(name_loc, name);
        if qualifier != Qualifier::Uniform {
            self.error(
                qualifier_loc,
                "invalid qualifier:",
                qualifier.as_str(),
                "interface blocks must be uniform",
            );
        }
        self.check_layout_location(
            qualifier_loc,
            &LayoutQualifier {
                location: layout.location,
            },
        );
        if !self.block_names.insert(name.to_string()) {
            self.error(name_loc, "redefinition", name, "interface block name");
        }

        for field in &mut fields {
            if field.ty.is_sampler() {
                let keyword = field.ty.basic.keyword();
                self.error(
                    field.loc,
                    "unsupported type",
                    keyword,
                    "sampler types are not allowed in interface blocks",
                );
            }
            field.ty.qualifier = Qualifier::Uniform;
        }

        let array_size = array.map(|(loc, size)| self.array_size(loc, size));
        let block = InterfaceBlock {
            name: name.to_string(),
            instance_name: instance.as_ref().map(|(n, _)| n.clone()),
            fields: fields.clone(),
            unique_id: self.symbols.next_unique_id(),
            array_size,
        };
        let handle = self.ast.blocks.append(block);
        let mut block_ty = Type::interface_block(handle);
        block_ty.array_size = array_size;

        let (id, symbol_name) = match instance {
            None => {
                for field in fields {
                    let variable = Variable::new(field.name.clone(), field.ty);
                    if self.symbols.insert(Symbol::Variable(variable)).is_err() {
                        self.error(field.loc, "redefinition", &field.name, "interface block member name");
                    }
                }
                (0, String::new())
            }
            Some((instance_name, instance_loc)) => {
                let variable = Variable::new(instance_name.clone(), block_ty);
                match self.symbols.insert(Symbol::Variable(variable)) {
                    Ok(id) => (id, instance_name),
                    Err(_) => {
                        self.error(
                            instance_loc,
                            "redefinition",
                            &instance_name,
                            "interface block instance name",
                        );
                        (0, instance_name)
                    }
                }
            }
        };
        let symbol = self.ast.add_symbol(id, &symbol_name, block_ty, qualifier_loc);
        self.ast.aggregate(Operator::Declaration, vec![symbol], name_loc)
    }

    // ---- expressions --------------------------------------------------

    /// Resolves an identifier in expression position. Constants with a
    /// known value are substituted by their value.
    pub fn variable_reference(&mut self, loc: SourceLoc, name: &str) -> Handle<Node> {
        let found = self
            .symbols
            .find(name, self.version)
            .map(|lookup| (lookup.symbol.clone(), lookup.builtin));

        let variable = match found {
            Some((Symbol::Variable(variable), builtin)) if !variable.user_type => {
                if builtin {
                    if let Some(extension) = &variable.extension {
                        self.check_extension(loc, extension);
                    }
                }
                variable
            }
            Some(_) => {
                self.error(loc, "variable expected", name, "");
                return self.error_constant(loc);
            }
            None => {
                self.error(loc, "undeclared identifier", name, "");
                let fake = Variable::new(name, Type::scalar(BasicType::Float));
                let id = self.symbols.insert(Symbol::Variable(fake)).unwrap_or(0);
                return self
                    .ast
                    .add_symbol(id, name, Type::scalar(BasicType::Float), loc);
            }
        };

        match variable.const_value {
            Some(values) if variable.ty.qualifier == Qualifier::Const => {
                self.ast.add_constant(values, variable.ty, loc)
            }
            _ => self.ast.add_symbol(variable.id, name, variable.ty, loc),
        }
    }

    /// Whether `name` names a user struct type in scope.
    pub fn struct_type_named(&self, name: &str) -> Option<Type> {
        let lookup = self.symbols.find(name, self.version)?;
        let variable = lookup.symbol.as_variable()?;
        variable.user_type.then_some(variable.ty)
    }

    /// Overload resolution by mangled name.
    fn find_function(&mut self, loc: SourceLoc, name: &str, arg_types: &[Type]) -> Option<(Function, bool)> {
        let codes: Vec<String> = arg_types.iter().map(|t| self.ast.mangled_name(t)).collect();
        let mangled = Function::mangle(name, &codes);

        let plain = self
            .symbols
            .find(name, self.version)
            .map(|lookup| (lookup.symbol.clone(), lookup.builtin));
        let found = match plain {
            Some((Symbol::Variable(_), builtin)) => Some((None, builtin)),
            _ => self
                .symbols
                .find(&mangled, self.version)
                .map(|lookup| (lookup.symbol.as_function().cloned(), lookup.builtin)),
        };
        match found {
            None => {
                self.error(loc, "no matching overloaded function found", name, "");
                None
            }
            Some((None, _)) => {
                self.error(loc, "function name expected", name, "");
                None
            }
            Some((Some(function), builtin)) => Some((function, builtin)),
        }
    }

    /// `name(args)` for a user or built-in function.
    pub fn function_call(&mut self, loc: SourceLoc, name: &str, args: Vec<Handle<Node>>) -> Handle<Node> {
        let arg_types: Vec<Type> = args.iter().map(|&arg| self.ast.ty(arg)).collect();
        let Some((function, builtin)) = self.find_function(loc, name, &arg_types) else {
            return self.error_constant(loc);
        };
        if builtin {
            if let Some(extension) = &function.extension {
                self.check_extension(loc, extension);
            }
        }

        let mut ret = function.return_type;
        if builtin && ret.basic != BasicType::Bool {
            ret.precision = builtin_call_precision(name, &arg_types);
        }
        let call = self
            .ast
            .add_function_call(&function.mangled_name, args.clone(), ret, !builtin, loc);

        for (param, &arg) in function.params.iter().zip(&args) {
            if matches!(param.ty.qualifier, Qualifier::Out | Qualifier::InOut)
                && !self.check_lvalue(loc, "assign", arg)
            {
                self.error(
                    loc,
                    "Constant value cannot be passed for 'out' or 'inout' parameters.",
                    "Error",
                    "",
                );
            }
        }
        call
    }

    /// `array.length()`
    pub fn array_length(&mut self, loc: SourceLoc, base: Handle<Node>) -> Handle<Node> {
        self.es3_only(loc, "length", "array length method");
        let ty = self.ast.ty(base);
        let length = match ty.array_size {
            Some(size) => i32::try_from(size).unwrap_or(i32::MAX),
            None => {
                self.error(loc, "", "length", "array expected");
                0
            }
        };
        self.ast.add_constant(
            vec![ConstantUnion::Int(length)],
            Type::scalar(BasicType::Int),
            loc,
        )
    }

    /// `T(args)` for a built-in type, a struct or (ES3) an array type.
    pub fn constructor(&mut self, loc: SourceLoc, ty: Type, args: Vec<Handle<Node>>) -> Handle<Node> {
        let Some(op) = constructor_operator(&ty) else {
            self.error(loc, "cannot construct this type", ty.basic.keyword(), "");
            return self.error_constant(loc);
        };
        let mut ty = ty.with_qualifier(Qualifier::Temporary);
        ty.layout = LayoutQualifier::default();

        if !self.check_constructor(loc, op, &ty, &args) {
            let node = self.ast.aggregate(op, Vec::new(), loc);
            self.ast.set_aggregate_signature(node, "", ty, false);
            return node;
        }

        let arg_types: Vec<Type> = args.iter().map(|&arg| self.ast.ty(arg)).collect();
        if ty.is_array() {
            let element = ty.element_type();
            if arg_types.iter().any(|t| !t.same_shape(&element)) {
                self.error(loc, "Array constructor argument has an incorrect type", "Error", "");
                return self.error_constant(loc);
            }
        } else if op == Operator::ConstructStruct {
            let fields_match = self.ast.struct_type(&ty).is_some_and(|st| {
                st.fields.len() == arg_types.len()
                    && st.fields.iter().zip(&arg_types).all(|(f, t)| f.ty.same_shape(t))
            });
            if !fields_match {
                self.error(
                    loc,
                    "Structure constructor arguments do not match structure fields",
                    "Error",
                    "",
                );
                return self.error_constant(loc);
            }
        }

        if ty.basic.supports_precision() && ty.precision == Precision::Undefined {
            ty.precision = higher_precision(arg_types.iter().copied());
        }
        if arg_types.iter().all(|t| t.qualifier == Qualifier::Const) {
            ty.qualifier = Qualifier::Const;
        }
        self.ast.add_constructor(op, args, ty, loc)
    }

    fn check_constructor(&mut self, loc: SourceLoc, op: Operator, ty: &Type, args: &[Handle<Node>]) -> bool {
        let arg_types: Vec<Type> = args.iter().map(|&arg| self.ast.ty(arg)).collect();
        let target_size = self.ast.object_size(ty);
        let mut size = 0;
        let mut full = false;
        let mut over_full = false;
        let mut matrix_in_matrix = false;
        let mut array_arg = false;
        for arg_ty in &arg_types {
            size += self.ast.object_size(arg_ty);
            if ty.is_matrix() && arg_ty.is_matrix() {
                matrix_in_matrix = true;
            }
            if full {
                over_full = true;
            }
            if op != Operator::ConstructStruct && !ty.is_array() && size >= target_size {
                full = true;
            }
            if arg_ty.is_array() {
                array_arg = true;
            }
        }

        let fail = |cx: &mut Self, reason: &str| {
            cx.error(loc, reason, "constructor", "");
            false
        };
        if let Some(count) = ty.array_size {
            if count as usize != args.len() {
                return fail(self, "array constructor needs one argument per array element");
            }
        }
        if array_arg && op != Operator::ConstructStruct {
            return fail(self, "constructing from a non-dereferenced array");
        }
        if matrix_in_matrix && !ty.is_array() && args.len() != 1 {
            return fail(self, "constructing matrix from matrix can only take one argument");
        }
        if over_full {
            return fail(self, "too many arguments");
        }
        if op == Operator::ConstructStruct && !ty.is_array() {
            let field_count = self.ast.struct_type(ty).map_or(0, |st| st.fields.len());
            if field_count != args.len() {
                return fail(
                    self,
                    "Number of constructor parameters does not match the number of structure fields",
                );
            }
        }
        if !ty.is_matrix() || !matrix_in_matrix {
            let short = if op == Operator::ConstructStruct {
                size < target_size
            } else {
                size != 1 && size < target_size
            };
            if short {
                return fail(self, "not enough data provided for construction");
            }
        }
        if args.is_empty() {
            return fail(self, "constructor argument does not have a type");
        }
        if op != Operator::ConstructStruct && arg_types.iter().any(|t| t.is_sampler()) {
            return fail(self, "cannot convert a sampler");
        }
        if arg_types.iter().any(|t| t.basic == BasicType::Void) {
            return fail(self, "cannot convert a void");
        }
        true
    }

    /// `base[index]`
    pub fn index(&mut self, loc: SourceLoc, base: Handle<Node>, index: Handle<Node>) -> Handle<Node> {
        let base_ty = self.ast.ty(base);
        if !base_ty.is_array() && !base_ty.is_matrix() && !base_ty.is_vector() {
            let token = self
                .ast
                .node(base)
                .as_symbol()
                .map_or_else(|| "expression".to_string(), |(_, name)| name.to_string());
            self.error(
                loc,
                " left of '[' is not of type array, matrix, or vector ",
                &token,
                "",
            );
            return base;
        }
        self.check_integer(index, "[]");

        let index_ty = self.ast.ty(index);
        let constant = if index_ty.qualifier == Qualifier::Const {
            self.ast
                .constant_values(index)
                .and_then(|v| v.first())
                .map(|v| v.as_i32())
        } else {
            None
        };

        let Some(mut i) = constant else {
            if base_ty.basic == BasicType::InterfaceBlock {
                self.error(
                    loc,
                    "",
                    "[",
                    "array indexes for interface blocks arrays must be constant integral expressions",
                );
            } else if base_ty.qualifier == Qualifier::FragmentOut {
                self.error(
                    loc,
                    "",
                    "[",
                    "array indexes for fragment outputs must be constant integral expressions",
                );
            }
            return self.ast.add_index(base, index, loc);
        };

        if i < 0 {
            self.error(loc, "negative index", &i.to_string(), "");
            i = 0;
        }
        if let Some(size) = base_ty.array_size {
            let size = i32::try_from(size).unwrap_or(i32::MAX);
            if i >= size {
                self.error(loc, "", "[", &format!("array index out of range '{i}'"));
                i = size - 1;
            } else if base_ty.qualifier == Qualifier::FragData
                && i > 0
                && !self.is_extension_enabled(EXT_DRAW_BUFFERS)
            {
                self.error(
                    loc,
                    "",
                    "[",
                    "array indexes for gl_FragData must be zero when GL_EXT_draw_buffers is disabled",
                );
                i = 0;
            }
        } else {
            let nominal = i32::from(base_ty.nominal_size());
            if i >= nominal {
                self.error(loc, "", "[", &format!("field selection out of range '{i}'"));
                i = nominal - 1;
            }
        }
        let index_loc = self.ast.loc(index);
        let clamped = self.ast.add_constant(
            vec![ConstantUnion::Int(i)],
            Type::scalar(BasicType::Int),
            index_loc,
        );
        self.ast.add_index(base, clamped, loc)
    }

    /// `base.field`: swizzles, struct fields and block members.
    pub fn field_selection(
        &mut self,
        dot_loc: SourceLoc,
        base: Handle<Node>,
        field: &str,
        field_loc: SourceLoc,
    ) -> Handle<Node> {
        let base_ty = self.ast.ty(base);
        if base_ty.is_array() {
            self.error(field_loc, "cannot apply dot operator to an array", ".", "");
        }

        if base_ty.is_vector() {
            let offsets = self
                .vector_fields(field, base_ty.nominal_size(), field_loc)
                .unwrap_or_else(|| vec![0]);
            return self.ast.add_swizzle(base, &offsets, dot_loc);
        }

        let members = if let Some(st) = self.ast.struct_type(&base_ty) {
            Some((st.fields.clone(), " no such field in structure"))
        } else {
            base_ty.block.map(|block| {
                (
                    self.ast.blocks[block].fields.clone(),
                    " no such field in interface block",
                )
            })
        };

        match members {
            Some((fields, missing)) if !base_ty.is_array() => {
                match fields.iter().position(|f| f.name == field) {
                    Some(index) => self.ast.add_field(base, index, fields[index].ty, dot_loc),
                    None => {
                        self.error(dot_loc, missing, field, "");
                        base
                    }
                }
            }
            Some(_) => base,
            None => {
                let reason = if self.version < 300 {
                    " field selection requires structure, vector, or matrix on left hand side"
                } else {
                    " field selection requires structure, vector, matrix, or interface block on left hand side"
                };
                self.error(dot_loc, reason, field, "");
                base
            }
        }
    }

    /// Parses swizzle letters into component offsets.
    fn vector_fields(&mut self, text: &str, size: u8, loc: SourceLoc) -> Option<Vec<u8>> {
        if text.len() > 4 {
            self.error(loc, "illegal vector field selection", text, "");
            return None;
        }
        let mut offsets = Vec::with_capacity(text.len());
        let mut set = None;
        for c in text.chars() {
            let (offset, this_set) = match c {
                'x' => (0, 0),
                'y' => (1, 0),
                'z' => (2, 0),
                'w' => (3, 0),
                'r' => (0, 1),
                'g' => (1, 1),
                'b' => (2, 1),
                'a' => (3, 1),
                's' => (0, 2),
                't' => (1, 2),
                'p' => (2, 2),
                'q' => (3, 2),
                _ => {
                    self.error(loc, "illegal vector field selection", text, "");
                    return None;
                }
            };
            if offset >= size {
                self.error(loc, "vector field selection out of range", text, "");
                return None;
            }
            if set.is_some_and(|s| s != this_set) {
                self.error(
                    loc,
                    "illegal - vector component fields not from the same set",
                    text,
                    "",
                );
                return None;
            }
            set = Some(this_set);
            offsets.push(offset);
        }
        Some(offsets)
    }

    // ---- functions ----------------------------------------------------

    /// Validates a prototype against earlier declarations and enters it into
    /// the global scope.
    pub fn function_prototype(&mut self, header: &FunctionHeader) {
        let mangled = header.mangled_name(self.ast);
        let previous = self
            .symbols
            .find(&mangled, self.version)
            .and_then(|lookup| lookup.symbol.as_function().cloned());
        if let Some(previous) = previous {
            if !previous.return_type.same_shape(&header.return_type) {
                self.error(
                    header.loc,
                    "overloaded functions must have the same return type",
                    header.return_type.basic.keyword(),
                    "",
                );
            }
            for (old, new) in previous.params.iter().zip(&header.params) {
                if old.ty.qualifier != new.ty.qualifier {
                    self.error(
                        header.loc,
                        "overloaded functions must have the same parameter qualifiers",
                        new.ty.qualifier.as_str(),
                        "",
                    );
                }
            }
        }

        let shadows_variable = self
            .symbols
            .find(&header.name, self.version)
            .is_some_and(|lookup| lookup.symbol.as_variable().is_some());
        if shadows_variable {
            self.error(header.loc, "redefinition", &header.name, "function");
        }

        let function = Function {
            id: 0,
            name: header.name.clone(),
            mangled_name: mangled,
            params: header.params.clone(),
            return_type: header.return_type,
            defined: false,
            extension: None,
        };
        // Redeclaring a prototype is fine; the first entry stays.
        let _ = self.symbols.insert(Symbol::Function(function));
    }

    /// `ret name(params);`
    pub fn prototype_declaration(&mut self, header: &FunctionHeader) -> Handle<Node> {
        let mut symbols = Vec::with_capacity(header.params.len());
        for param in &header.params {
            let name = param.name.as_deref().unwrap_or("");
            symbols.push(self.ast.add_symbol(0, name, param.ty, header.loc));
        }
        let node = self.ast.aggregate(Operator::Prototype, symbols, header.loc);
        let mangled = header.mangled_name(self.ast);
        self.ast
            .set_aggregate_signature(node, &mangled, header.return_type, true);
        node
    }

    /// Opens a function body: marks the function defined, validates `main`,
    /// opens the parameter scope and returns the `Parameters` node.
    pub fn begin_function_definition(&mut self, header: &FunctionHeader) -> Handle<Node> {
        let mangled = header.mangled_name(self.ast);
        if self.symbols.find_builtin(&mangled, self.version).is_some() {
            self.error(header.loc, "built-in functions cannot be redefined", &header.name, "");
        }
        let already_defined = match self.symbols.find_global_mut(&mangled) {
            Some(Symbol::Function(function)) => std::mem::replace(&mut function.defined, true),
            _ => false,
        };
        if already_defined {
            self.error(header.loc, "function already has a body", &header.name, "");
        }

        if header.name == "main" {
            if !header.params.is_empty() {
                self.error(header.loc, "function cannot take any parameter(s)", &header.name, "");
            }
            if header.return_type.basic != BasicType::Void {
                self.error(
                    header.loc,
                    "",
                    header.return_type.basic.keyword(),
                    "main function cannot return a value",
                );
            }
        }

        self.function = Some(FunctionState {
            return_type: header.return_type,
            returns_value: false,
        });
        self.symbols.push();

        let mut params = Vec::with_capacity(header.params.len());
        for param in &header.params {
            let node = match &param.name {
                Some(name) => {
                    let id = match self.symbols.insert(Symbol::Variable(Variable::new(name.clone(), param.ty))) {
                        Ok(id) => id,
                        Err(_) => {
                            self.error(header.loc, "redefinition", name, "");
                            0
                        }
                    };
                    self.ast.add_symbol(id, name, param.ty, header.loc)
                }
                None => self.ast.add_symbol(0, "", param.ty, header.loc),
            };
            params.push(node);
        }
        self.loop_nesting = 0;
        self.ast.aggregate(Operator::Parameters, params, header.loc)
    }

    /// Closes a function body and builds the `Function` node.
    pub fn end_function_definition(
        &mut self,
        header: &FunctionHeader,
        params: Handle<Node>,
        body: Option<Handle<Node>>,
    ) -> Handle<Node> {
        let state = self.function.take();
        let returns = state.as_ref().is_some_and(|s| s.returns_value);
        if header.return_type.basic != BasicType::Void && !returns {
            self.error(header.loc, "function does not return a value:", "", &header.name);
        }
        self.symbols.pop();

        let children = std::iter::once(params).chain(body).collect();
        let node = self.ast.aggregate(Operator::Function, children, header.loc);
        let mangled = header.mangled_name(self.ast);
        self.ast
            .set_aggregate_signature(node, &mangled, header.return_type, true);
        node
    }

    /// `return;` / `return expr;`
    pub fn return_statement(&mut self, loc: SourceLoc, value: Option<Handle<Node>>) -> Handle<Node> {
        let expected = self.function.as_ref().map(|f| f.return_type);
        match (value, expected) {
            (None, Some(ret)) if ret.basic != BasicType::Void => {
                self.error(loc, "non-void function must return a value", "return", "");
            }
            (Some(value), Some(ret)) => {
                if let Some(state) = &mut self.function {
                    state.returns_value = true;
                }
                if ret.basic == BasicType::Void {
                    self.error(loc, "void function cannot return a value", "return", "");
                } else if !ret.same_shape(&self.ast.ty(value)) {
                    self.error(loc, "function return is not matching type:", "return", "");
                }
            }
            _ => {}
        }
        self.ast
            .add_branch(glslt_ast::BranchKind::Return, value, loc)
    }
}

/// Result precision of a built-in call: texture lookups follow the sampler,
/// `textureSize` is always highp and everything else takes the highest
/// argument precision.
fn builtin_call_precision(name: &str, arg_types: &[Type]) -> Precision {
    if name.starts_with("textureSize") {
        return Precision::High;
    }
    match arg_types.iter().find(|t| t.is_sampler()) {
        Some(sampler) => sampler.precision,
        None => higher_precision(arg_types.iter().copied()),
    }
}

/// Constructor operator for a constructible type.
pub(crate) fn constructor_operator(ty: &Type) -> Option<Operator> {
    if ty.is_struct() {
        return Some(Operator::ConstructStruct);
    }
    let op = match (ty.basic, ty.primary_size, ty.secondary_size) {
        (BasicType::Float, 1, 1) => Operator::ConstructFloat,
        (BasicType::Float, 2, 1) => Operator::ConstructVec2,
        (BasicType::Float, 3, 1) => Operator::ConstructVec3,
        (BasicType::Float, 4, 1) => Operator::ConstructVec4,
        (BasicType::Float, 2, 2) => Operator::ConstructMat2,
        (BasicType::Float, 2, 3) => Operator::ConstructMat2x3,
        (BasicType::Float, 2, 4) => Operator::ConstructMat2x4,
        (BasicType::Float, 3, 2) => Operator::ConstructMat3x2,
        (BasicType::Float, 3, 3) => Operator::ConstructMat3,
        (BasicType::Float, 3, 4) => Operator::ConstructMat3x4,
        (BasicType::Float, 4, 2) => Operator::ConstructMat4x2,
        (BasicType::Float, 4, 3) => Operator::ConstructMat4x3,
        (BasicType::Float, 4, 4) => Operator::ConstructMat4,
        (BasicType::Int, 1, 1) => Operator::ConstructInt,
        (BasicType::Int, 2, 1) => Operator::ConstructIVec2,
        (BasicType::Int, 3, 1) => Operator::ConstructIVec3,
        (BasicType::Int, 4, 1) => Operator::ConstructIVec4,
        (BasicType::UInt, 1, 1) => Operator::ConstructUInt,
        (BasicType::UInt, 2, 1) => Operator::ConstructUVec2,
        (BasicType::UInt, 3, 1) => Operator::ConstructUVec3,
        (BasicType::UInt, 4, 1) => Operator::ConstructUVec4,
        (BasicType::Bool, 1, 1) => Operator::ConstructBool,
        (BasicType::Bool, 2, 1) => Operator::ConstructBVec2,
        (BasicType::Bool, 3, 1) => Operator::ConstructBVec3,
        (BasicType::Bool, 4, 1) => Operator::ConstructBVec4,
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_operators_cover_matrices() {
        assert_eq!(
            constructor_operator(&Type::matrix(3, 2)),
            Some(Operator::ConstructMat3x2)
        );
        assert_eq!(
            constructor_operator(&Type::vector(BasicType::Bool, 3)),
            Some(Operator::ConstructBVec3)
        );
        assert_eq!(constructor_operator(&Type::scalar(BasicType::Sampler2D)), None);
    }

    #[test]
    fn texture_calls_take_sampler_precision() {
        let sampler = Type::scalar(BasicType::Sampler2D).with_precision(Precision::Low);
        let coord = Type::vector(BasicType::Float, 2).with_precision(Precision::High);
        assert_eq!(
            builtin_call_precision("texture2D", &[sampler, coord]),
            Precision::Low
        );
        assert_eq!(builtin_call_precision("textureSize", &[sampler]), Precision::High);
        let a = Type::scalar(BasicType::Float).with_precision(Precision::Medium);
        assert_eq!(builtin_call_precision("max", &[a, coord]), Precision::High);
    }
}
