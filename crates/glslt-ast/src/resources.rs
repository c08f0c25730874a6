//! Resource limits and stage selection shared by the front end and the passes.

use std::fmt;

/// Pipeline stage a shader is compiled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        })
    }
}

/// How indirect array indices are clamped when clamping is requested.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArrayIndexClampingStrategy {
    /// `int(clamp(float(i), 0.0, float(N - 1)))`
    #[default]
    ClampIntrinsic,
    /// `webgl_int_clamp(i, 0, N - 1)` with an emitted helper.
    UserDefinedIntFunction,
}

/// 64-bit hash applied to user identifiers when name hashing is enabled.
pub type HashFunction = fn(&str) -> u64;

pub const OES_STANDARD_DERIVATIVES: &str = "GL_OES_standard_derivatives";
pub const OES_EGL_IMAGE_EXTERNAL: &str = "GL_OES_EGL_image_external";
pub const ARB_TEXTURE_RECTANGLE: &str = "GL_ARB_texture_rectangle";
pub const EXT_DRAW_BUFFERS: &str = "GL_EXT_draw_buffers";
pub const EXT_FRAG_DEPTH: &str = "GL_EXT_frag_depth";
pub const EXT_SHADER_TEXTURE_LOD: &str = "GL_EXT_shader_texture_lod";

/// Implementation limits and extension availability.
#[derive(Clone, Copy, Debug)]
pub struct Resources {
    pub max_vertex_attribs: u32,
    pub max_vertex_uniform_vectors: u32,
    pub max_varying_vectors: u32,
    pub max_vertex_texture_image_units: u32,
    pub max_combined_texture_image_units: u32,
    pub max_texture_image_units: u32,
    pub max_fragment_uniform_vectors: u32,
    pub max_draw_buffers: u32,

    pub oes_standard_derivatives: bool,
    pub oes_egl_image_external: bool,
    pub arb_texture_rectangle: bool,
    pub ext_draw_buffers: bool,
    pub ext_frag_depth: bool,
    pub ext_shader_texture_lod: bool,

    /// Whether `highp` is available in fragment shaders.
    pub fragment_precision_high: bool,

    pub max_vertex_output_vectors: u32,
    pub max_fragment_input_vectors: u32,
    pub min_program_texel_offset: i32,
    pub max_program_texel_offset: i32,

    pub max_expression_complexity: u32,
    pub max_call_stack_depth: u32,

    pub array_index_clamping_strategy: ArrayIndexClampingStrategy,
    pub hash_function: Option<HashFunction>,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            max_vertex_attribs: 8,
            max_vertex_uniform_vectors: 128,
            max_varying_vectors: 8,
            max_vertex_texture_image_units: 0,
            max_combined_texture_image_units: 8,
            max_texture_image_units: 8,
            max_fragment_uniform_vectors: 16,
            max_draw_buffers: 1,
            oes_standard_derivatives: false,
            oes_egl_image_external: false,
            arb_texture_rectangle: false,
            ext_draw_buffers: false,
            ext_frag_depth: false,
            ext_shader_texture_lod: false,
            fragment_precision_high: false,
            max_vertex_output_vectors: 16,
            max_fragment_input_vectors: 15,
            min_program_texel_offset: -8,
            max_program_texel_offset: 7,
            max_expression_complexity: 256,
            max_call_stack_depth: 256,
            array_index_clamping_strategy: ArrayIndexClampingStrategy::ClampIntrinsic,
            hash_function: None,
        }
    }
}

/// Hash functions compare by address.
impl PartialEq for Resources {
    fn eq(&self, other: &Self) -> bool {
        let same_hash = match (self.hash_function, other.hash_function) {
            (Some(a), Some(b)) => std::ptr::fn_addr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_hash
            && self.max_vertex_attribs == other.max_vertex_attribs
            && self.max_vertex_uniform_vectors == other.max_vertex_uniform_vectors
            && self.max_varying_vectors == other.max_varying_vectors
            && self.max_vertex_texture_image_units == other.max_vertex_texture_image_units
            && self.max_combined_texture_image_units == other.max_combined_texture_image_units
            && self.max_texture_image_units == other.max_texture_image_units
            && self.max_fragment_uniform_vectors == other.max_fragment_uniform_vectors
            && self.max_draw_buffers == other.max_draw_buffers
            && self.extensions() == other.extensions()
            && self.fragment_precision_high == other.fragment_precision_high
            && self.max_vertex_output_vectors == other.max_vertex_output_vectors
            && self.max_fragment_input_vectors == other.max_fragment_input_vectors
            && self.min_program_texel_offset == other.min_program_texel_offset
            && self.max_program_texel_offset == other.max_program_texel_offset
            && self.max_expression_complexity == other.max_expression_complexity
            && self.max_call_stack_depth == other.max_call_stack_depth
            && self.array_index_clamping_strategy == other.array_index_clamping_strategy
    }
}

impl Resources {
    /// Extensions this implementation exposes, with availability.
    pub fn extensions(&self) -> [(&'static str, bool); 6] {
        [
            (OES_STANDARD_DERIVATIVES, self.oes_standard_derivatives),
            (OES_EGL_IMAGE_EXTERNAL, self.oes_egl_image_external),
            (ARB_TEXTURE_RECTANGLE, self.arb_texture_rectangle),
            (EXT_DRAW_BUFFERS, self.ext_draw_buffers),
            (EXT_FRAG_DEPTH, self.ext_frag_depth),
            (EXT_SHADER_TEXTURE_LOD, self.ext_shader_texture_lod),
        ]
    }

    /// Uniform register budget for `stage`.
    pub fn max_uniform_vectors(&self, stage: ShaderStage) -> u32 {
        match stage {
            ShaderStage::Vertex => self.max_vertex_uniform_vectors,
            ShaderStage::Fragment => self.max_fragment_uniform_vectors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_gles2_minimums() {
        let res = Resources::default();
        assert_eq!(res.max_vertex_attribs, 8);
        assert_eq!(res.max_fragment_uniform_vectors, 16);
        assert_eq!(res.max_draw_buffers, 1);
        assert_eq!(res.max_expression_complexity, 256);
        assert!(res.extensions().iter().all(|(_, enabled)| !enabled));
        assert!(res.hash_function.is_none());
    }

    #[test]
    fn uniform_budget_per_stage() {
        let res = Resources::default();
        assert_eq!(res.max_uniform_vectors(ShaderStage::Vertex), 128);
        assert_eq!(res.max_uniform_vectors(ShaderStage::Fragment), 16);
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }

    fn zero_hash(_: &str) -> u64 {
        0
    }

    fn one_hash(_: &str) -> u64 {
        1
    }

    #[test]
    fn equality_includes_the_hash_function() {
        let hashed = Resources {
            hash_function: Some(zero_hash),
            ..Resources::default()
        };
        assert_eq!(Resources::default(), Resources::default());
        assert_eq!(hashed, hashed);
        assert_ne!(hashed, Resources::default());
        assert_ne!(
            hashed,
            Resources {
                hash_function: Some(one_hash),
                ..Resources::default()
            }
        );
        assert_ne!(
            Resources::default(),
            Resources {
                max_draw_buffers: 4,
                ..Resources::default()
            }
        );
        assert_eq!(Resources::default().extensions().len(), 6);
    }
}
