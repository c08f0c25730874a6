//! Populates the built-in levels of a [`SymbolTable`].

use crate::arena::Arena;
use crate::constant::ConstantUnion;
use crate::diagnostics::SourceLoc;
use crate::error::SymbolError;
use crate::resources::{self, Resources, ShaderStage};
use crate::symbol_table::{
    COMMON_BUILTINS, ESSL1_BUILTINS, ESSL3_BUILTINS, Function, Parameter, Symbol, SymbolTable,
    Variable,
};
use crate::types::{BasicType, Field, Precision, Qualifier, StructType, Type};

const FLOAT: BasicType = BasicType::Float;
const INT: BasicType = BasicType::Int;
const UINT: BasicType = BasicType::UInt;
const BOOL: BasicType = BasicType::Bool;

fn vec_of(basic: BasicType, size: u8) -> Type {
    if size == 1 {
        Type::scalar(basic)
    } else {
        Type::vector(basic, size)
    }
}

fn float(size: u8) -> Type {
    vec_of(FLOAT, size)
}

fn sampler(basic: BasicType) -> Type {
    Type::scalar(basic)
}

struct Builder<'a> {
    table: &'a mut SymbolTable,
    structs: &'a Arena<StructType>,
}

impl Builder<'_> {
    fn function(
        &mut self,
        level: usize,
        ret: Type,
        name: &str,
        params: &[Type],
        extension: Option<&str>,
    ) -> Result<(), SymbolError> {
        let codes: Vec<String> = params.iter().map(|ty| ty.mangled_name(self.structs)).collect();
        let function = Function {
            id: 0,
            name: name.to_string(),
            mangled_name: Function::mangle(name, &codes),
            params: params
                .iter()
                .map(|ty| Parameter {
                    name: None,
                    ty: ty.with_qualifier(Qualifier::In),
                })
                .collect(),
            return_type: ret,
            defined: true,
            extension: extension.map(str::to_string),
        };
        self.table.insert_builtin(level, Symbol::Function(function))?;
        Ok(())
    }

    fn common(&mut self, ret: Type, name: &str, params: &[Type]) -> Result<(), SymbolError> {
        self.function(COMMON_BUILTINS, ret, name, params, None)
    }

    fn essl1(&mut self, ret: Type, name: &str, params: &[Type]) -> Result<(), SymbolError> {
        self.function(ESSL1_BUILTINS, ret, name, params, None)
    }

    fn essl3(&mut self, ret: Type, name: &str, params: &[Type]) -> Result<(), SymbolError> {
        self.function(ESSL3_BUILTINS, ret, name, params, None)
    }

    fn variable(&mut self, level: usize, variable: Variable) -> Result<(), SymbolError> {
        self.table.insert_builtin(level, Symbol::Variable(variable))?;
        Ok(())
    }

    fn constant(&mut self, level: usize, name: &str, value: i32) -> Result<(), SymbolError> {
        let mut variable = Variable::new(
            name,
            Type::scalar(INT)
                .with_precision(Precision::Medium)
                .with_qualifier(Qualifier::Const),
        );
        variable.const_value = Some(vec![ConstantUnion::Int(value)]);
        self.variable(level, variable)
    }
}

/// Inserts every built-in function, variable, constant and default
/// precision for `stage` into the built-in levels of `table`.
///
/// The `gl_DepthRangeParameters` struct is appended to `structs`, which
/// must outlive every compile that uses the table.
pub fn insert_builtins(
    table: &mut SymbolTable,
    structs: &mut Arena<StructType>,
    stage: ShaderStage,
    resources: &Resources,
) -> Result<(), SymbolError> {
    let depth_range = depth_range_struct(table, structs);
    let mut b = Builder {
        table,
        structs: &*structs,
    };

    insert_common_math(&mut b)?;
    insert_essl3_math(&mut b)?;
    insert_essl1_textures(&mut b, stage, resources)?;
    insert_essl3_textures(&mut b, stage)?;
    insert_variables(&mut b, stage, resources)?;
    insert_constants(&mut b, resources)?;

    let params = Variable {
        user_type: true,
        ..Variable::new("gl_DepthRangeParameters", depth_range)
    };
    b.variable(COMMON_BUILTINS, params)?;
    b.variable(
        COMMON_BUILTINS,
        Variable::new("gl_DepthRange", depth_range.with_qualifier(Qualifier::Uniform)),
    )?;

    insert_default_precisions(b.table, stage);
    log::debug!(
        "built-in symbols for {stage} stage: {} common, {} essl1, {} essl3",
        b.table.level_len(COMMON_BUILTINS),
        b.table.level_len(ESSL1_BUILTINS),
        b.table.level_len(ESSL3_BUILTINS),
    );
    Ok(())
}

fn depth_range_struct(table: &mut SymbolTable, structs: &mut Arena<StructType>) -> Type {
    let highp = Type::scalar(FLOAT).with_precision(Precision::High);
    let fields = ["near", "far", "diff"]
        .into_iter()
        .map(|name| Field {
            name: name.to_string(),
            ty: highp,
            loc: SourceLoc::default(),
        })
        .collect();
    let handle = structs.append(StructType {
        name: "gl_DepthRangeParameters".to_string(),
        fields,
        unique_id: table.next_unique_id(),
        at_global_scope: true,
    });
    Type::structure(handle)
}

fn insert_common_math(b: &mut Builder<'_>) -> Result<(), SymbolError> {
    let f1 = float(1);
    for n in 1..=4u8 {
        let gen_ty = float(n);

        for name in [
            "radians", "degrees", "sin", "cos", "tan", "asin", "acos", "atan", "exp", "log",
            "exp2", "log2", "sqrt", "inversesqrt", "abs", "sign", "floor", "ceil", "fract",
            "normalize",
        ] {
            b.common(gen_ty, name, &[gen_ty])?;
        }
        for name in ["atan", "pow", "mod", "min", "max", "step", "reflect"] {
            b.common(gen_ty, name, &[gen_ty, gen_ty])?;
        }
        b.common(gen_ty, "clamp", &[gen_ty, gen_ty, gen_ty])?;
        b.common(gen_ty, "mix", &[gen_ty, gen_ty, gen_ty])?;
        b.common(gen_ty, "smoothstep", &[gen_ty, gen_ty, gen_ty])?;
        b.common(gen_ty, "faceforward", &[gen_ty, gen_ty, gen_ty])?;
        b.common(gen_ty, "refract", &[gen_ty, gen_ty, f1])?;
        b.common(f1, "length", &[gen_ty])?;
        b.common(f1, "distance", &[gen_ty, gen_ty])?;
        b.common(f1, "dot", &[gen_ty, gen_ty])?;

        if n > 1 {
            for name in ["mod", "min", "max"] {
                b.common(gen_ty, name, &[gen_ty, f1])?;
            }
            b.common(gen_ty, "clamp", &[gen_ty, f1, f1])?;
            b.common(gen_ty, "mix", &[gen_ty, gen_ty, f1])?;
            b.common(gen_ty, "step", &[f1, gen_ty])?;
            b.common(gen_ty, "smoothstep", &[f1, f1, gen_ty])?;

            let bvec = Type::vector(BOOL, n);
            for basic in [FLOAT, INT] {
                let v = Type::vector(basic, n);
                for name in [
                    "lessThan",
                    "lessThanEqual",
                    "greaterThan",
                    "greaterThanEqual",
                    "equal",
                    "notEqual",
                ] {
                    b.common(bvec, name, &[v, v])?;
                }
            }
            b.common(bvec, "equal", &[bvec, bvec])?;
            b.common(bvec, "notEqual", &[bvec, bvec])?;
            b.common(Type::scalar(BOOL), "any", &[bvec])?;
            b.common(Type::scalar(BOOL), "all", &[bvec])?;
            b.common(bvec, "not", &[bvec])?;

            let mat = Type::matrix(n, n);
            b.common(mat, "matrixCompMult", &[mat, mat])?;
        }
    }
    b.common(float(3), "cross", &[float(3), float(3)])?;
    Ok(())
}

fn insert_essl3_math(b: &mut Builder<'_>) -> Result<(), SymbolError> {
    for n in 1..=4u8 {
        let gen_ty = float(n);
        let igen = vec_of(INT, n);
        let ugen = vec_of(UINT, n);
        let bgen = vec_of(BOOL, n);

        for name in [
            "sinh", "cosh", "tanh", "asinh", "acosh", "atanh", "trunc", "round", "roundEven",
        ] {
            b.essl3(gen_ty, name, &[gen_ty])?;
        }
        b.essl3(bgen, "isnan", &[gen_ty])?;
        b.essl3(bgen, "isinf", &[gen_ty])?;
        b.essl3(igen, "floatBitsToInt", &[gen_ty])?;
        b.essl3(ugen, "floatBitsToUint", &[gen_ty])?;
        b.essl3(gen_ty, "intBitsToFloat", &[igen])?;
        b.essl3(gen_ty, "uintBitsToFloat", &[ugen])?;
        b.essl3(gen_ty, "mix", &[gen_ty, gen_ty, bgen])?;

        b.essl3(igen, "abs", &[igen])?;
        b.essl3(igen, "sign", &[igen])?;
        for (gen_ty, scalar) in [(igen, Type::scalar(INT)), (ugen, Type::scalar(UINT))] {
            b.essl3(gen_ty, "min", &[gen_ty, gen_ty])?;
            b.essl3(gen_ty, "max", &[gen_ty, gen_ty])?;
            b.essl3(gen_ty, "clamp", &[gen_ty, gen_ty, gen_ty])?;
            if n > 1 {
                b.essl3(gen_ty, "min", &[gen_ty, scalar])?;
                b.essl3(gen_ty, "max", &[gen_ty, scalar])?;
                b.essl3(gen_ty, "clamp", &[gen_ty, scalar, scalar])?;
            }
        }

        if n > 1 {
            let bvec = Type::vector(BOOL, n);
            let uvec = Type::vector(UINT, n);
            for name in [
                "lessThan",
                "lessThanEqual",
                "greaterThan",
                "greaterThanEqual",
                "equal",
                "notEqual",
            ] {
                b.essl3(bvec, name, &[uvec, uvec])?;
            }
        }
    }

    for cols in 2..=4u8 {
        for rows in 2..=4u8 {
            let mat = Type::matrix(cols, rows);
            if cols != rows {
                b.essl3(mat, "matrixCompMult", &[mat, mat])?;
            }
            b.essl3(Type::matrix(rows, cols), "transpose", &[mat])?;
            b.essl3(mat, "outerProduct", &[float(rows), float(cols)])?;
        }
        let square = Type::matrix(cols, cols);
        b.essl3(float(1), "determinant", &[square])?;
        b.essl3(square, "inverse", &[square])?;
    }
    Ok(())
}

fn insert_essl1_textures(
    b: &mut Builder<'_>,
    stage: ShaderStage,
    resources: &Resources,
) -> Result<(), SymbolError> {
    let vec4 = float(4);
    let f1 = float(1);
    let s2d = sampler(BasicType::Sampler2D);
    let cube = sampler(BasicType::SamplerCube);

    b.essl1(vec4, "texture2D", &[s2d, float(2)])?;
    b.essl1(vec4, "texture2DProj", &[s2d, float(3)])?;
    b.essl1(vec4, "texture2DProj", &[s2d, vec4])?;
    b.essl1(vec4, "textureCube", &[cube, float(3)])?;

    if resources.oes_egl_image_external {
        let ext = sampler(BasicType::SamplerExternalOes);
        b.essl1(vec4, "texture2D", &[ext, float(2)])?;
        b.essl1(vec4, "texture2DProj", &[ext, float(3)])?;
        b.essl1(vec4, "texture2DProj", &[ext, vec4])?;
    }
    if resources.arb_texture_rectangle {
        let rect = sampler(BasicType::Sampler2DRect);
        b.essl1(vec4, "texture2DRect", &[rect, float(2)])?;
        b.essl1(vec4, "texture2DRectProj", &[rect, float(3)])?;
        b.essl1(vec4, "texture2DRectProj", &[rect, vec4])?;
    }

    match stage {
        ShaderStage::Fragment => {
            b.essl1(vec4, "texture2D", &[s2d, float(2), f1])?;
            b.essl1(vec4, "texture2DProj", &[s2d, float(3), f1])?;
            b.essl1(vec4, "texture2DProj", &[s2d, vec4, f1])?;
            b.essl1(vec4, "textureCube", &[cube, float(3), f1])?;

            if resources.oes_standard_derivatives {
                let ext = Some(resources::OES_STANDARD_DERIVATIVES);
                for n in 1..=4u8 {
                    let gen_ty = float(n);
                    for name in ["dFdx", "dFdy", "fwidth"] {
                        b.function(ESSL1_BUILTINS, gen_ty, name, &[gen_ty], ext)?;
                    }
                }
            }
            if resources.ext_shader_texture_lod {
                let ext = Some(resources::EXT_SHADER_TEXTURE_LOD);
                let v2 = float(2);
                let v3 = float(3);
                b.function(ESSL1_BUILTINS, vec4, "texture2DGradEXT", &[s2d, v2, v2, v2], ext)?;
                b.function(ESSL1_BUILTINS, vec4, "texture2DProjGradEXT", &[s2d, v3, v2, v2], ext)?;
                b.function(ESSL1_BUILTINS, vec4, "texture2DProjGradEXT", &[s2d, vec4, v2, v2], ext)?;
                b.function(ESSL1_BUILTINS, vec4, "textureCubeGradEXT", &[cube, v3, v3, v3], ext)?;
                b.function(ESSL1_BUILTINS, vec4, "texture2DLodEXT", &[s2d, v2, f1], ext)?;
                b.function(ESSL1_BUILTINS, vec4, "texture2DProjLodEXT", &[s2d, v3, f1], ext)?;
                b.function(ESSL1_BUILTINS, vec4, "texture2DProjLodEXT", &[s2d, vec4, f1], ext)?;
                b.function(ESSL1_BUILTINS, vec4, "textureCubeLodEXT", &[cube, v3, f1], ext)?;
            }
        }
        ShaderStage::Vertex => {
            b.essl1(vec4, "texture2DLod", &[s2d, float(2), f1])?;
            b.essl1(vec4, "texture2DProjLod", &[s2d, float(3), f1])?;
            b.essl1(vec4, "texture2DProjLod", &[s2d, vec4, f1])?;
            b.essl1(vec4, "textureCubeLod", &[cube, float(3), f1])?;
        }
    }
    Ok(())
}

fn insert_essl3_textures(b: &mut Builder<'_>, stage: ShaderStage) -> Result<(), SymbolError> {
    use BasicType::*;

    let f1 = float(1);
    let families = [
        (FLOAT, Sampler2D, Sampler3D, SamplerCube, Sampler2DArray),
        (INT, ISampler2D, ISampler3D, ISamplerCube, ISampler2DArray),
        (UINT, USampler2D, USampler3D, USamplerCube, USampler2DArray),
    ];
    for (result, s2d, s3d, cube, array) in families {
        let gvec4 = Type::vector(result, 4);
        let (s2d, s3d, cube, array) = (sampler(s2d), sampler(s3d), sampler(cube), sampler(array));
        let lookups = [(s2d, float(2)), (s3d, float(3)), (cube, float(3)), (array, float(3))];

        for (s, coord) in lookups {
            b.essl3(gvec4, "texture", &[s, coord])?;
            b.essl3(gvec4, "textureLod", &[s, coord, f1])?;
            if stage == ShaderStage::Fragment {
                b.essl3(gvec4, "texture", &[s, coord, f1])?;
            }
        }
        b.essl3(gvec4, "textureProj", &[s2d, float(3)])?;
        b.essl3(gvec4, "textureProj", &[s2d, float(4)])?;
        b.essl3(gvec4, "textureProj", &[s3d, float(4)])?;
        b.essl3(gvec4, "textureProjLod", &[s2d, float(3), f1])?;
        b.essl3(gvec4, "textureProjLod", &[s2d, float(4), f1])?;
        b.essl3(gvec4, "textureProjLod", &[s3d, float(4), f1])?;

        let lod = Type::scalar(INT);
        b.essl3(Type::vector(INT, 2), "textureSize", &[s2d, lod])?;
        b.essl3(Type::vector(INT, 3), "textureSize", &[s3d, lod])?;
        b.essl3(Type::vector(INT, 2), "textureSize", &[cube, lod])?;
        b.essl3(Type::vector(INT, 3), "textureSize", &[array, lod])?;

        b.essl3(gvec4, "texelFetch", &[s2d, Type::vector(INT, 2), lod])?;
        b.essl3(gvec4, "texelFetch", &[s3d, Type::vector(INT, 3), lod])?;
        b.essl3(gvec4, "texelFetch", &[array, Type::vector(INT, 3), lod])?;

        b.essl3(gvec4, "textureOffset", &[s2d, float(2), Type::vector(INT, 2)])?;
        b.essl3(gvec4, "textureOffset", &[s3d, float(3), Type::vector(INT, 3)])?;
        b.essl3(gvec4, "textureOffset", &[array, float(3), Type::vector(INT, 2)])?;
        b.essl3(gvec4, "textureGrad", &[s2d, float(2), float(2), float(2)])?;
        b.essl3(gvec4, "textureGrad", &[cube, float(3), float(3), float(3)])?;
    }

    b.essl3(f1, "texture", &[sampler(Sampler2DShadow), float(3)])?;
    b.essl3(f1, "texture", &[sampler(SamplerCubeShadow), float(4)])?;
    b.essl3(f1, "texture", &[sampler(Sampler2DArrayShadow), float(4)])?;
    b.essl3(f1, "textureProj", &[sampler(Sampler2DShadow), float(4)])?;
    b.essl3(f1, "textureLod", &[sampler(Sampler2DShadow), float(3), f1])?;
    if stage == ShaderStage::Fragment {
        b.essl3(f1, "texture", &[sampler(Sampler2DShadow), float(3), f1])?;
        b.essl3(f1, "texture", &[sampler(SamplerCubeShadow), float(4), f1])?;
        for n in 1..=4u8 {
            let gen_ty = float(n);
            for name in ["dFdx", "dFdy", "fwidth"] {
                b.essl3(gen_ty, name, &[gen_ty])?;
            }
        }
    }
    Ok(())
}

fn insert_variables(
    b: &mut Builder<'_>,
    stage: ShaderStage,
    resources: &Resources,
) -> Result<(), SymbolError> {
    let var = |name: &str, basic: BasicType, size: u8, precision: Precision, qualifier| {
        Variable::new(
            name,
            vec_of(basic, size)
                .with_precision(precision)
                .with_qualifier(qualifier),
        )
    };

    match stage {
        ShaderStage::Vertex => {
            b.variable(
                COMMON_BUILTINS,
                var("gl_Position", FLOAT, 4, Precision::High, Qualifier::Position),
            )?;
            b.variable(
                COMMON_BUILTINS,
                var("gl_PointSize", FLOAT, 1, Precision::High, Qualifier::PointSize),
            )?;
        }
        ShaderStage::Fragment => {
            b.variable(
                COMMON_BUILTINS,
                var("gl_FragCoord", FLOAT, 4, Precision::Medium, Qualifier::FragCoord),
            )?;
            b.variable(
                COMMON_BUILTINS,
                var("gl_FrontFacing", BOOL, 1, Precision::Undefined, Qualifier::FrontFacing),
            )?;
            b.variable(
                COMMON_BUILTINS,
                var("gl_PointCoord", FLOAT, 2, Precision::Medium, Qualifier::PointCoord),
            )?;
            b.variable(
                ESSL1_BUILTINS,
                var("gl_FragColor", FLOAT, 4, Precision::Medium, Qualifier::FragColor),
            )?;

            let mut frag_data = var("gl_FragData", FLOAT, 4, Precision::Medium, Qualifier::FragData);
            frag_data.ty = frag_data.ty.with_array(resources.max_draw_buffers.max(1));
            b.variable(ESSL1_BUILTINS, frag_data)?;

            if resources.ext_frag_depth {
                let precision = if resources.fragment_precision_high {
                    Precision::High
                } else {
                    Precision::Medium
                };
                let mut depth = var("gl_FragDepthEXT", FLOAT, 1, precision, Qualifier::FragDepth);
                depth.extension = Some(resources::EXT_FRAG_DEPTH.to_string());
                b.variable(ESSL1_BUILTINS, depth)?;
            }
            b.variable(
                ESSL3_BUILTINS,
                var("gl_FragDepth", FLOAT, 1, Precision::High, Qualifier::FragDepth),
            )?;
        }
    }
    Ok(())
}

fn insert_constants(b: &mut Builder<'_>, res: &Resources) -> Result<(), SymbolError> {
    let clamp = |n: u32| i32::try_from(n).unwrap_or(i32::MAX);
    b.constant(COMMON_BUILTINS, "gl_MaxVertexAttribs", clamp(res.max_vertex_attribs))?;
    b.constant(
        COMMON_BUILTINS,
        "gl_MaxVertexUniformVectors",
        clamp(res.max_vertex_uniform_vectors),
    )?;
    b.constant(COMMON_BUILTINS, "gl_MaxVaryingVectors", clamp(res.max_varying_vectors))?;
    b.constant(
        COMMON_BUILTINS,
        "gl_MaxVertexTextureImageUnits",
        clamp(res.max_vertex_texture_image_units),
    )?;
    b.constant(
        COMMON_BUILTINS,
        "gl_MaxCombinedTextureImageUnits",
        clamp(res.max_combined_texture_image_units),
    )?;
    b.constant(
        COMMON_BUILTINS,
        "gl_MaxTextureImageUnits",
        clamp(res.max_texture_image_units),
    )?;
    b.constant(
        COMMON_BUILTINS,
        "gl_MaxFragmentUniformVectors",
        clamp(res.max_fragment_uniform_vectors),
    )?;
    b.constant(COMMON_BUILTINS, "gl_MaxDrawBuffers", clamp(res.max_draw_buffers))?;

    b.constant(
        ESSL3_BUILTINS,
        "gl_MaxVertexOutputVectors",
        clamp(res.max_vertex_output_vectors),
    )?;
    b.constant(
        ESSL3_BUILTINS,
        "gl_MaxFragmentInputVectors",
        clamp(res.max_fragment_input_vectors),
    )?;
    b.constant(ESSL3_BUILTINS, "gl_MinProgramTexelOffset", res.min_program_texel_offset)?;
    b.constant(ESSL3_BUILTINS, "gl_MaxProgramTexelOffset", res.max_program_texel_offset)?;
    Ok(())
}

fn insert_default_precisions(table: &mut SymbolTable, stage: ShaderStage) {
    match stage {
        ShaderStage::Vertex => {
            table.set_builtin_default_precision(COMMON_BUILTINS, FLOAT, Precision::High);
            table.set_builtin_default_precision(COMMON_BUILTINS, INT, Precision::High);
        }
        ShaderStage::Fragment => {
            table.set_builtin_default_precision(COMMON_BUILTINS, INT, Precision::Medium);
        }
    }
    for basic in [
        BasicType::Sampler2D,
        BasicType::SamplerCube,
        BasicType::SamplerExternalOes,
        BasicType::Sampler2DRect,
    ] {
        table.set_builtin_default_precision(COMMON_BUILTINS, basic, Precision::Low);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_for(stage: ShaderStage, resources: &Resources) -> (SymbolTable, Arena<StructType>) {
        let mut table = SymbolTable::new();
        let mut structs = Arena::new();
        insert_builtins(&mut table, &mut structs, stage, resources).unwrap();
        table.push();
        (table, structs)
    }

    #[test]
    fn texture2d_is_essl1_only() {
        let (table, _) = table_for(ShaderStage::Fragment, &Resources::default());
        assert!(table.find("texture2D(s21;vf2;", 100).is_some());
        assert!(table.find("texture2D(s21;vf2;f1;", 100).is_some());
        assert!(table.find("texture2D(s21;vf2;", 300).is_none());
        assert!(table.find("texture(s21;vf2;", 300).is_some());
        assert!(table.find("texture(is21;vf2;", 300).is_some());
    }

    #[test]
    fn stage_specific_variables() {
        let (vertex, _) = table_for(ShaderStage::Vertex, &Resources::default());
        assert!(vertex.find("gl_Position", 100).is_some());
        assert!(vertex.find("gl_FragColor", 100).is_none());
        assert!(vertex.find("texture2DLod(s21;vf2;f1;", 100).is_some());

        let (fragment, _) = table_for(ShaderStage::Fragment, &Resources::default());
        let hit = fragment.find("gl_FragColor", 100).unwrap();
        assert!(hit.builtin);
        assert!(fragment.find("gl_FragColor", 300).is_none());
        let frag_data = fragment.find("gl_FragData", 100).unwrap().symbol;
        assert_eq!(frag_data.as_variable().unwrap().ty.array_size, Some(1));
    }

    #[test]
    fn extensions_gate_functions() {
        let (plain, _) = table_for(ShaderStage::Fragment, &Resources::default());
        assert!(plain.find("dFdx(f1;", 100).is_none());
        assert!(plain.find("gl_FragDepthEXT", 100).is_none());

        let resources = Resources {
            oes_standard_derivatives: true,
            ext_frag_depth: true,
            ..Resources::default()
        };
        let (table, _) = table_for(ShaderStage::Fragment, &resources);
        let dfdx = table.find("dFdx(vf2;", 100).unwrap().symbol.as_function().unwrap();
        assert_eq!(dfdx.extension.as_deref(), Some(resources::OES_STANDARD_DERIVATIVES));
        assert!(table.find("gl_FragDepthEXT", 100).is_some());
    }

    #[test]
    fn constants_follow_resources() {
        let resources = Resources {
            max_draw_buffers: 4,
            ..Resources::default()
        };
        let (table, _) = table_for(ShaderStage::Fragment, &resources);
        let max = table.find("gl_MaxDrawBuffers", 100).unwrap().symbol;
        let var = max.as_variable().unwrap();
        assert_eq!(var.const_value, Some(vec![ConstantUnion::Int(4)]));
        assert_eq!(var.ty.qualifier, Qualifier::Const);
        assert!(table.find("gl_MaxVertexOutputVectors", 100).is_none());
        assert!(table.find("gl_MaxVertexOutputVectors", 300).is_some());
    }

    #[test]
    fn depth_range_struct_is_builtin() {
        let (table, structs) = table_for(ShaderStage::Vertex, &Resources::default());
        let range = table.find("gl_DepthRange", 100).unwrap().symbol.as_variable().unwrap();
        assert_eq!(range.ty.qualifier, Qualifier::Uniform);
        let st = &structs[range.ty.structure.unwrap()];
        assert_eq!(st.name, "gl_DepthRangeParameters");
        assert_eq!(st.fields.len(), 3);
        assert!(table.find("gl_DepthRangeParameters", 100).unwrap().symbol.as_variable().unwrap().user_type);
    }

    #[test]
    fn default_precisions_per_stage() {
        let (vertex, _) = table_for(ShaderStage::Vertex, &Resources::default());
        assert_eq!(vertex.default_precision(FLOAT), Precision::High);
        let (fragment, _) = table_for(ShaderStage::Fragment, &Resources::default());
        assert_eq!(fragment.default_precision(FLOAT), Precision::Undefined);
        assert_eq!(fragment.default_precision(INT), Precision::Medium);
        assert_eq!(fragment.default_precision(BasicType::Sampler2D), Precision::Low);
    }

    #[test]
    fn overloads_are_distinct() {
        let (table, _) = table_for(ShaderStage::Fragment, &Resources::default());
        assert!(table.find("mod(vf3;f1;", 100).is_some());
        assert!(table.find("mod(vf3;vf3;", 100).is_some());
        assert!(table.find("mod(f1;f1;", 100).is_some());
        assert!(table.find("matrixCompMult(mf3x3;mf3x3;", 100).is_some());
        assert!(table.is_builtin_function_name("texture2D", 100));
    }
}
