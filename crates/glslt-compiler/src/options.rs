//! Compile options and target profiles.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit set of optional compile steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CompileOptions(u64);

impl CompileOptions {
    pub const NONE: Self = Self(0);
    /// Put a text dump of the rewritten tree in [`CompileOutput::ast_dump`](crate::CompileOutput::ast_dump).
    pub const INTERMEDIATE_TREE: Self = Self(1 << 0);
    /// Run the backend and keep its output.
    pub const OBJECT_CODE: Self = Self(1 << 1);
    /// Collect reflection data.
    pub const VARIABLES: Self = Self(1 << 2);
    /// The first source fragment is a path, not code.
    pub const SOURCE_PATH: Self = Self(1 << 3);
    pub const UNROLL_FOR_LOOP_WITH_SAMPLER_ARRAY_INDEX: Self = Self(1 << 4);
    pub const EMULATE_BUILT_IN_FUNCTIONS: Self = Self(1 << 5);
    /// Reject sampler-dependent control flow (WebGL only).
    pub const TIMING_RESTRICTIONS: Self = Self(1 << 6);
    /// Append the fragment dependency graph to the info log. Needs
    /// [`TIMING_RESTRICTIONS`](Self::TIMING_RESTRICTIONS).
    pub const DEPENDENCY_GRAPH: Self = Self(1 << 7);
    /// GLSL ES 1.00 Appendix A rules. Always on for WebGL profiles.
    pub const VALIDATE_LOOP_INDEXING: Self = Self(1 << 8);
    pub const LIMIT_EXPRESSION_COMPLEXITY: Self = Self(1 << 9);
    /// Reject call chains reaching `max_call_stack_depth` levels. Recursion is
    /// rejected regardless.
    pub const LIMIT_CALL_STACK_DEPTH: Self = Self(1 << 10);
    pub const INIT_GL_POSITION: Self = Self(1 << 11);
    pub const INIT_VARYINGS_WITHOUT_STATIC_USE: Self = Self(1 << 12);
    pub const UNFOLD_SHORT_CIRCUIT: Self = Self(1 << 13);
    /// Check uniforms and varyings against the register budget. Needs
    /// [`VARIABLES`](Self::VARIABLES).
    pub const ENFORCE_PACKING_RESTRICTIONS: Self = Self(1 << 14);
    pub const CLAMP_INDIRECT_ARRAY_BOUNDS: Self = Self(1 << 15);
    pub const REGENERATE_STRUCT_NAMES: Self = Self(1 << 16);

    const NAMED: [(Self, &'static str); 17] = [
        (Self::INTERMEDIATE_TREE, "intermediate-tree"),
        (Self::OBJECT_CODE, "object-code"),
        (Self::VARIABLES, "variables"),
        (Self::SOURCE_PATH, "source-path"),
        (
            Self::UNROLL_FOR_LOOP_WITH_SAMPLER_ARRAY_INDEX,
            "unroll-for-loop-with-sampler-array-index",
        ),
        (Self::EMULATE_BUILT_IN_FUNCTIONS, "emulate-built-in-functions"),
        (Self::TIMING_RESTRICTIONS, "timing-restrictions"),
        (Self::DEPENDENCY_GRAPH, "dependency-graph"),
        (Self::VALIDATE_LOOP_INDEXING, "validate-loop-indexing"),
        (Self::LIMIT_EXPRESSION_COMPLEXITY, "limit-expression-complexity"),
        (Self::LIMIT_CALL_STACK_DEPTH, "limit-call-stack-depth"),
        (Self::INIT_GL_POSITION, "init-gl-position"),
        (
            Self::INIT_VARYINGS_WITHOUT_STATIC_USE,
            "init-varyings-without-static-use",
        ),
        (Self::UNFOLD_SHORT_CIRCUIT, "unfold-short-circuit"),
        (
            Self::ENFORCE_PACKING_RESTRICTIONS,
            "enforce-packing-restrictions",
        ),
        (Self::CLAMP_INDIRECT_ARRAY_BOUNDS, "clamp-indirect-array-bounds"),
        (Self::REGENERATE_STRUCT_NAMES, "regenerate-struct-names"),
    ];

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Looks up an option by its kebab-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(option, _)| *option)
    }

    /// Kebab-case names of every known option.
    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::NAMED.iter().map(|(_, name)| *name)
    }
}

impl BitOr for CompileOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CompileOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (option, name) in Self::NAMED {
            if self.contains(option) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// The API profile a shader is compiled for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShaderSpec {
    #[default]
    Gles2,
    WebGl,
    /// WebGL with the CSS shader entry-point rewrite.
    Css,
    Gles3,
    WebGl2,
}

impl ShaderSpec {
    /// Highest `#version` accepted.
    pub fn max_version(self) -> u32 {
        match self {
            Self::Gles2 | Self::WebGl | Self::Css => 100,
            Self::Gles3 | Self::WebGl2 => 300,
        }
    }

    pub fn is_webgl(self) -> bool {
        matches!(self, Self::WebGl | Self::Css | Self::WebGl2)
    }

    pub fn max_token_length(self) -> usize {
        if self.is_webgl() { 256 } else { 1024 }
    }
}

impl fmt::Display for ShaderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gles2 => "GLES2",
            Self::WebGl => "WebGL",
            Self::Css => "CSS shaders",
            Self::Gles3 => "GLES3",
            Self::WebGl2 => "WebGL2",
        })
    }
}
