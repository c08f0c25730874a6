//! Type system for shader programs.

use std::fmt;

use crate::arena::{Arena, Handle};
use crate::diagnostics::SourceLoc;

/// The scalar or opaque kind underlying a type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum BasicType {
    Void,
    Float,
    Int,
    UInt,
    Bool,
    Sampler2D,
    Sampler3D,
    SamplerCube,
    Sampler2DArray,
    SamplerExternalOes,
    Sampler2DRect,
    ISampler2D,
    ISampler3D,
    ISamplerCube,
    ISampler2DArray,
    USampler2D,
    USampler3D,
    USamplerCube,
    USampler2DArray,
    Sampler2DShadow,
    SamplerCubeShadow,
    Sampler2DArrayShadow,
    Struct,
    InterfaceBlock,
}

impl BasicType {
    pub fn is_sampler(self) -> bool {
        matches!(
            self,
            Self::Sampler2D
                | Self::Sampler3D
                | Self::SamplerCube
                | Self::Sampler2DArray
                | Self::SamplerExternalOes
                | Self::Sampler2DRect
                | Self::ISampler2D
                | Self::ISampler3D
                | Self::ISamplerCube
                | Self::ISampler2DArray
                | Self::USampler2D
                | Self::USampler3D
                | Self::USamplerCube
                | Self::USampler2DArray
                | Self::Sampler2DShadow
                | Self::SamplerCubeShadow
                | Self::Sampler2DArrayShadow
        )
    }

    /// Float, int, uint or bool.
    pub fn is_scalar_kind(self) -> bool {
        matches!(self, Self::Float | Self::Int | Self::UInt | Self::Bool)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::UInt)
    }

    /// Whether a precision qualifier may be attached to this kind.
    pub fn supports_precision(self) -> bool {
        matches!(self, Self::Float | Self::Int | Self::UInt) || self.is_sampler()
    }

    /// Short code used in mangled function names.
    pub fn mangled_code(self) -> &'static str {
        match self {
            Self::Void => "v",
            Self::Float => "f",
            Self::Int => "i",
            Self::UInt => "u",
            Self::Bool => "b",
            Self::Sampler2D => "s2",
            Self::Sampler3D => "s3",
            Self::SamplerCube => "sC",
            Self::Sampler2DArray => "s2a",
            Self::SamplerExternalOes => "sext",
            Self::Sampler2DRect => "s2r",
            Self::ISampler2D => "is2",
            Self::ISampler3D => "is3",
            Self::ISamplerCube => "isC",
            Self::ISampler2DArray => "is2a",
            Self::USampler2D => "us2",
            Self::USampler3D => "us3",
            Self::USamplerCube => "usC",
            Self::USampler2DArray => "us2a",
            Self::Sampler2DShadow => "s2s",
            Self::SamplerCubeShadow => "sCs",
            Self::Sampler2DArrayShadow => "s2as",
            Self::Struct => "struct-",
            Self::InterfaceBlock => "iblock-",
        }
    }

    /// The GLSL keyword for scalar and opaque kinds.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Float => "float",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Bool => "bool",
            Self::Sampler2D => "sampler2D",
            Self::Sampler3D => "sampler3D",
            Self::SamplerCube => "samplerCube",
            Self::Sampler2DArray => "sampler2DArray",
            Self::SamplerExternalOes => "samplerExternalOES",
            Self::Sampler2DRect => "sampler2DRect",
            Self::ISampler2D => "isampler2D",
            Self::ISampler3D => "isampler3D",
            Self::ISamplerCube => "isamplerCube",
            Self::ISampler2DArray => "isampler2DArray",
            Self::USampler2D => "usampler2D",
            Self::USampler3D => "usampler3D",
            Self::USamplerCube => "usamplerCube",
            Self::USampler2DArray => "usampler2DArray",
            Self::Sampler2DShadow => "sampler2DShadow",
            Self::SamplerCubeShadow => "samplerCubeShadow",
            Self::Sampler2DArrayShadow => "sampler2DArrayShadow",
            Self::Struct => "structure",
            Self::InterfaceBlock => "interface block",
        }
    }
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Precision qualifier. Ordered from least to most precise.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Precision {
    #[default]
    Undefined,
    Low,
    Medium,
    High,
}

impl Precision {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Undefined => "",
            Self::Low => "lowp",
            Self::Medium => "mediump",
            Self::High => "highp",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Storage and binding class of a value.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum Qualifier {
    #[default]
    Temporary,
    Global,
    Const,
    Attribute,
    VaryingIn,
    VaryingOut,
    InvariantVaryingIn,
    InvariantVaryingOut,
    Uniform,
    /// ES3 vertex input (`in` at global scope of a vertex shader).
    VertexIn,
    /// ES3 vertex output.
    VertexOut,
    /// ES3 fragment input.
    FragmentIn,
    /// ES3 fragment output.
    FragmentOut,
    FlatIn,
    FlatOut,
    SmoothIn,
    SmoothOut,
    CentroidIn,
    CentroidOut,
    // function parameters
    In,
    Out,
    InOut,
    ConstReadOnly,
    // built-in variables
    Position,
    PointSize,
    FragCoord,
    FrontFacing,
    PointCoord,
    FragColor,
    FragData,
    FragDepth,
}

impl Qualifier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temporary => "Temporary",
            Self::Global => "Global",
            Self::Const => "const",
            Self::Attribute => "attribute",
            Self::VaryingIn | Self::VaryingOut => "varying",
            Self::InvariantVaryingIn | Self::InvariantVaryingOut => "invariant varying",
            Self::Uniform => "uniform",
            Self::VertexIn | Self::FragmentIn | Self::In => "in",
            Self::VertexOut | Self::FragmentOut | Self::Out => "out",
            Self::FlatIn => "flat in",
            Self::FlatOut => "flat out",
            Self::SmoothIn => "smooth in",
            Self::SmoothOut => "smooth out",
            Self::CentroidIn => "centroid in",
            Self::CentroidOut => "centroid out",
            Self::InOut => "inout",
            Self::ConstReadOnly => "const",
            Self::Position => "Position",
            Self::PointSize => "PointSize",
            Self::FragCoord => "FragCoord",
            Self::FrontFacing => "FrontFacing",
            Self::PointCoord => "PointCoord",
            Self::FragColor => "FragColor",
            Self::FragData => "FragData",
            Self::FragDepth => "FragDepth",
        }
    }

    /// Values passed from the vertex stage to the fragment stage.
    pub fn is_varying(self) -> bool {
        self.is_varying_in() || self.is_varying_out()
    }

    pub fn is_varying_in(self) -> bool {
        matches!(
            self,
            Self::VaryingIn
                | Self::InvariantVaryingIn
                | Self::FragmentIn
                | Self::FlatIn
                | Self::SmoothIn
                | Self::CentroidIn
        )
    }

    pub fn is_varying_out(self) -> bool {
        matches!(
            self,
            Self::VaryingOut
                | Self::InvariantVaryingOut
                | Self::VertexOut
                | Self::FlatOut
                | Self::SmoothOut
                | Self::CentroidOut
        )
    }

    pub fn is_attribute(self) -> bool {
        matches!(self, Self::Attribute | Self::VertexIn)
    }

    /// Built-in and user values that may never be written.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::Const
                | Self::ConstReadOnly
                | Self::Attribute
                | Self::VertexIn
                | Self::Uniform
                | Self::VaryingIn
                | Self::InvariantVaryingIn
                | Self::FragmentIn
                | Self::FlatIn
                | Self::SmoothIn
                | Self::CentroidIn
                | Self::FragCoord
                | Self::FrontFacing
                | Self::PointCoord
        )
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `layout(...)` contents. Only `location` is supported.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct LayoutQualifier {
    pub location: Option<u32>,
}

impl LayoutQualifier {
    pub fn is_empty(&self) -> bool {
        self.location.is_none()
    }
}

/// A member of a struct or interface block.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub loc: SourceLoc,
}

/// A user or built-in struct declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<Field>,
    pub unique_id: u32,
    /// Declared outside every function body.
    pub at_global_scope: bool,
}

/// A uniform interface block.
#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceBlock {
    pub name: String,
    pub instance_name: Option<String>,
    pub fields: Vec<Field>,
    pub unique_id: u32,
    pub array_size: Option<u32>,
}

/// A complete value type.
///
/// Matrices have `primary_size` columns and `secondary_size` rows;
/// vectors have `secondary_size == 1`.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Type {
    pub basic: BasicType,
    pub precision: Precision,
    pub qualifier: Qualifier,
    pub invariant: bool,
    pub layout: LayoutQualifier,
    pub primary_size: u8,
    pub secondary_size: u8,
    pub array_size: Option<u32>,
    pub structure: Option<Handle<StructType>>,
    pub block: Option<Handle<InterfaceBlock>>,
}

impl Default for Type {
    fn default() -> Self {
        Self::VOID
    }
}

impl Type {
    pub const VOID: Self = Self::new(BasicType::Void, Precision::Undefined, Qualifier::Temporary, 1, 1);
    pub const BOOL: Self = Self::new(BasicType::Bool, Precision::Undefined, Qualifier::Temporary, 1, 1);

    pub const fn new(
        basic: BasicType,
        precision: Precision,
        qualifier: Qualifier,
        primary_size: u8,
        secondary_size: u8,
    ) -> Self {
        Self {
            basic,
            precision,
            qualifier,
            invariant: false,
            layout: LayoutQualifier { location: None },
            primary_size,
            secondary_size,
            array_size: None,
            structure: None,
            block: None,
        }
    }

    /// A temporary scalar with undefined precision.
    pub const fn scalar(basic: BasicType) -> Self {
        Self::new(basic, Precision::Undefined, Qualifier::Temporary, 1, 1)
    }

    pub const fn vector(basic: BasicType, size: u8) -> Self {
        Self::new(basic, Precision::Undefined, Qualifier::Temporary, size, 1)
    }

    pub const fn matrix(cols: u8, rows: u8) -> Self {
        Self::new(BasicType::Float, Precision::Undefined, Qualifier::Temporary, cols, rows)
    }

    pub fn structure(handle: Handle<StructType>) -> Self {
        Self {
            structure: Some(handle),
            ..Self::scalar(BasicType::Struct)
        }
    }

    pub fn interface_block(handle: Handle<InterfaceBlock>) -> Self {
        Self {
            block: Some(handle),
            qualifier: Qualifier::Uniform,
            ..Self::scalar(BasicType::InterfaceBlock)
        }
    }

    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = qualifier;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_array(mut self, size: u32) -> Self {
        self.array_size = Some(size);
        self
    }

    /// The type of one element of an array.
    pub fn element_type(mut self) -> Self {
        self.array_size = None;
        self
    }

    pub fn cols(&self) -> u8 {
        self.primary_size
    }

    pub fn rows(&self) -> u8 {
        self.secondary_size
    }

    pub fn nominal_size(&self) -> u8 {
        self.primary_size
    }

    pub fn is_array(&self) -> bool {
        self.array_size.is_some()
    }

    pub fn is_matrix(&self) -> bool {
        self.primary_size > 1 && self.secondary_size > 1
    }

    pub fn is_vector(&self) -> bool {
        self.primary_size > 1 && self.secondary_size == 1
    }

    pub fn is_scalar(&self) -> bool {
        self.primary_size == 1
            && self.secondary_size == 1
            && self.structure.is_none()
            && self.block.is_none()
            && !self.is_array()
    }

    pub fn is_scalar_int(&self) -> bool {
        self.is_scalar() && self.basic.is_integer()
    }

    pub fn is_sampler(&self) -> bool {
        self.basic.is_sampler()
    }

    pub fn is_struct(&self) -> bool {
        self.structure.is_some()
    }

    /// Shape equality: kind, dimensions, array size and struct identity.
    /// Precision, qualifier and layout are ignored.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.basic == other.basic
            && self.primary_size == other.primary_size
            && self.secondary_size == other.secondary_size
            && self.array_size == other.array_size
            && self.structure == other.structure
            && self.block == other.block
    }

    /// Number of scalar components, including array elements and struct members.
    pub fn object_size(&self, structs: &Arena<StructType>) -> usize {
        let element = match self.structure.and_then(|h| structs.try_get(h)) {
            Some(st) => st
                .fields
                .iter()
                .map(|field| field.ty.object_size(structs))
                .sum(),
            None => usize::from(self.primary_size) * usize::from(self.secondary_size),
        };
        element * self.array_size.map_or(1, |n| n as usize)
    }

    /// Overload-safe encoding used in mangled function names, terminated by `;`.
    pub fn mangled_name(&self, structs: &Arena<StructType>) -> String {
        let mut out = String::new();
        if self.is_matrix() {
            out.push('m');
        } else if self.is_vector() {
            out.push('v');
        }
        out.push_str(self.basic.mangled_code());
        match self.structure.and_then(|h| structs.try_get(h)) {
            Some(st) => {
                out.push_str(&st.name);
                out.push('-');
                for field in &st.fields {
                    out.push_str(&field.ty.mangled_name(structs));
                }
            }
            None if self.is_matrix() => {
                out.push(char::from(b'0' + self.primary_size));
                out.push('x');
                out.push(char::from(b'0' + self.secondary_size));
            }
            None => out.push(char::from(b'0' + self.primary_size)),
        }
        if let Some(size) = self.array_size {
            out.push_str(&format!("[{size}]"));
        }
        out.push(';');
        out
    }
}

/// The complete human-readable description used in diagnostics,
/// e.g. `uniform highp 4-component vector of float`.
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invariant {
            write!(f, "invariant ")?;
        }
        if !matches!(self.qualifier, Qualifier::Temporary | Qualifier::Global) {
            write!(f, "{} ", self.qualifier)?;
        }
        if self.precision != Precision::Undefined {
            write!(f, "{} ", self.precision)?;
        }
        if let Some(size) = self.array_size {
            write!(f, "array[{size}] of ")?;
        }
        if self.is_matrix() {
            write!(f, "{}X{} matrix of ", self.cols(), self.rows())?;
        } else if self.is_vector() {
            write!(f, "{}-component vector of ", self.nominal_size())?;
        }
        write!(f, "{}", self.basic)
    }
}
