//! Read-only validation passes wrapping the analyses.

use glslt_analysis::{
    CallDag, CallDepthError, DependencyGraph, check_variables_within_packing_limits,
    check_varyings_within_packing_limits, collect_variables, expand_variables,
    limit_expression_complexity, restrict_fragment_shader_timing, restrict_vertex_shader_timing,
    validate_limitations, validate_outputs,
};
use glslt_ast::{Diagnostics, ShaderStage};

use crate::{Pass, PassContext};

/// Rejects trees nested deeper than `max_expression_complexity`.
#[derive(Debug)]
pub struct LimitExpressionComplexity;

impl Pass for LimitExpressionComplexity {
    fn name(&self) -> &str {
        "limit-expression-complexity"
    }

    fn run(&self, cx: &mut PassContext<'_>, diags: &mut Diagnostics) -> bool {
        limit_expression_complexity(
            cx.ast,
            cx.root,
            cx.resources.max_expression_complexity,
            diags,
        )
    }
}

/// Rejects recursion, and with `limit_depth` call chains as deep as
/// `max_call_stack_depth`.
#[derive(Debug)]
pub struct DetectCallDepth {
    pub limit_depth: bool,
}

impl Pass for DetectCallDepth {
    fn name(&self) -> &str {
        "detect-call-depth"
    }

    fn run(&self, cx: &mut PassContext<'_>, diags: &mut Diagnostics) -> bool {
        let dag = CallDag::build(cx.ast, cx.root);
        let limit = self
            .limit_depth
            .then_some(cx.resources.max_call_stack_depth);
        let Err(err) = dag.detect_call_depth(limit) else {
            return true;
        };
        diags.global_error(err.to_string());
        match &err {
            CallDepthError::Recursion { function } => {
                diags.note(format!("    while calling '{function}'"));
            }
            CallDepthError::TooDeep { path } => {
                diags.note(format!("    call path: {}", path.join(" <- ")));
            }
            CallDepthError::MissingMain => {}
        }
        false
    }
}

/// ES3 fragment output locations.
#[derive(Debug)]
pub struct ValidateOutputs;

impl Pass for ValidateOutputs {
    fn name(&self) -> &str {
        "validate-outputs"
    }

    fn run(&self, cx: &mut PassContext<'_>, diags: &mut Diagnostics) -> bool {
        validate_outputs(cx.ast, cx.root, cx.resources.max_draw_buffers, diags)
    }
}

/// GLSL ES 1.00 Appendix A loop and indexing rules.
#[derive(Debug)]
pub struct ValidateLimitations;

impl Pass for ValidateLimitations {
    fn name(&self) -> &str {
        "validate-limitations"
    }

    fn run(&self, cx: &mut PassContext<'_>, diags: &mut Diagnostics) -> bool {
        validate_limitations(cx.ast, cx.root, cx.symbols, cx.stage, diags)
    }
}

/// Sampler timing restrictions. Only defined for WebGL targets.
#[derive(Debug)]
pub struct RestrictTiming {
    /// The target is plain WebGL.
    pub webgl: bool,
    /// Append the fragment dependency graph to the info log.
    pub dump_graph: bool,
}

impl Pass for RestrictTiming {
    fn name(&self) -> &str {
        "restrict-timing"
    }

    fn run(&self, cx: &mut PassContext<'_>, diags: &mut Diagnostics) -> bool {
        if !self.webgl {
            diags.global_error("Timing restrictions must be enforced under the WebGL spec.");
            return false;
        }
        let violations = match cx.stage {
            ShaderStage::Fragment => {
                let graph = DependencyGraph::build(cx.ast, cx.root);
                let violations = restrict_fragment_shader_timing(cx.ast, &graph, diags);
                if self.dump_graph {
                    diags.note(graph.dump_spanning_trees());
                }
                violations
            }
            ShaderStage::Vertex => restrict_vertex_shader_timing(cx.ast, cx.root, diags),
        };
        log::debug!("timing restrictions: {violations} violation(s)");
        violations == 0
    }
}

/// Reflection, optionally followed by the register packing checks.
#[derive(Debug)]
pub struct CollectVariables {
    pub enforce_packing: bool,
}

impl Pass for CollectVariables {
    fn name(&self) -> &str {
        "collect-variables"
    }

    fn run(&self, cx: &mut PassContext<'_>, diags: &mut Diagnostics) -> bool {
        cx.variables = collect_variables(cx.ast, cx.root, cx.stage, &mut cx.hasher);
        if !self.enforce_packing {
            return true;
        }

        let uniforms = expand_variables(&cx.variables.uniforms);
        let max_uniforms = cx.resources.max_uniform_vectors(cx.stage);
        if !check_variables_within_packing_limits(max_uniforms, &uniforms) {
            diags.global_error("too many uniforms");
            return false;
        }
        if cx.stage == ShaderStage::Vertex
            && !check_varyings_within_packing_limits(
                cx.resources.max_varying_vectors,
                &cx.variables.varyings,
            )
        {
            diags.global_error("too many varyings");
            return false;
        }
        true
    }
}
