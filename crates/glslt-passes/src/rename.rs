//! Entry-point rewrite for CSS shaders.
//!
//! The author's `main` becomes `css_main` and a generated `main` calls it.
//! In fragment shaders the generated code then blends the author's color
//! with the element texture; in vertex shaders it forwards the texture
//! coordinate attribute to the fragment stage.

use glslt_ast::{
    BasicType, Diagnostics, Function, Handle, Node, NodeKind, Operator, Precision, Qualifier,
    ShaderStage, SourceLoc, Symbol, Type, Variable,
};

use crate::{Pass, PassContext, global_variable};

const CSS_MAIN: &str = "css_main";
const TEXTURE: &str = "css_u_texture";
const TEX_COORD_VARYING: &str = "css_v_texCoord";
const TEX_COORD_ATTRIBUTE: &str = "css_a_texCoord";

/// Renames the user entry point and appends the generated one.
#[derive(Debug)]
pub struct RewriteCssShader;

impl Pass for RewriteCssShader {
    fn name(&self) -> &str {
        "rewrite-css-shader"
    }

    fn run(&self, cx: &mut PassContext<'_>, diags: &mut Diagnostics) -> bool {
        let Some(user_main) = cx.ast.find_function(cx.root, "main(") else {
            diags.global_error("Missing main()");
            return false;
        };
        let loc = cx.ast.loc(user_main);
        let renamed = Function::mangle(CSS_MAIN, &[]);
        if let NodeKind::Aggregate { name, .. } = &mut cx.ast.node_mut(user_main).kind {
            *name = renamed.clone();
        }

        let generated = match cx.stage {
            ShaderStage::Fragment => fragment_epilogue(cx, loc),
            ShaderStage::Vertex => vertex_epilogue(cx, loc),
        };
        let (declarations, statements) = match generated {
            Ok(parts) => parts,
            Err(message) => {
                diags.global_error(message);
                return false;
            }
        };

        let call = cx
            .ast
            .add_function_call(&renamed, Vec::new(), Type::VOID, true, loc);
        let body = cx.ast.aggregate(
            Operator::Sequence,
            std::iter::once(call).chain(statements).collect(),
            loc,
        );
        let params = cx.ast.aggregate(Operator::Parameters, Vec::new(), loc);
        let main = cx.ast.aggregate(Operator::Function, vec![params, body], loc);
        cx.ast
            .set_aggregate_signature(main, "main(", Type::VOID, true);

        if let NodeKind::Aggregate { children, .. } = &mut cx.ast.node_mut(cx.root).kind {
            children.splice(0..0, declarations);
            children.push(main);
        }
        true
    }
}

type Generated = Result<(Vec<Handle<Node>>, Vec<Handle<Node>>), String>;

/// `uniform sampler2D css_u_texture; varying vec2 css_v_texCoord;` and
/// `gl_FragColor = gl_FragColor * texture2D(css_u_texture, css_v_texCoord);`
fn fragment_epilogue(cx: &mut PassContext<'_>, loc: SourceLoc) -> Generated {
    let sampler_ty = Type::scalar(BasicType::Sampler2D)
        .with_qualifier(Qualifier::Uniform)
        .with_precision(Precision::Low);
    let coord_ty = Type::vector(BasicType::Float, 2)
        .with_qualifier(Qualifier::VaryingIn)
        .with_precision(Precision::Medium);
    let (sampler, sampler_decl) = declare(cx, TEXTURE, sampler_ty, loc)?;
    let (coord, coord_decl) = declare(cx, TEX_COORD_VARYING, coord_ty, loc)?;

    let (color_id, color_ty) = global_variable(cx, "gl_FragColor")
        .ok_or_else(|| "gl_FragColor is not available in this shader version".to_string())?;

    let mangled = Function::mangle(
        "texture2D",
        &[
            cx.ast.mangled_name(&sampler_ty),
            cx.ast.mangled_name(&coord_ty),
        ],
    );
    let sample_ty = cx
        .symbols
        .find_builtin(&mangled, cx.version)
        .and_then(Symbol::as_function)
        .map(|f| f.return_type)
        .unwrap_or(Type::vector(BasicType::Float, 4).with_precision(Precision::Low));
    let sample = cx
        .ast
        .add_function_call(&mangled, vec![sampler, coord], sample_ty, false, loc);

    let color = cx.ast.add_symbol(color_id, "gl_FragColor", color_ty, loc);
    let mut ignored = Diagnostics::new();
    let blended = cx
        .ast
        .add_binary_math(Operator::Mul, color, sample, loc, &mut ignored)
        .map_err(|e| e.to_string())?;
    let target = cx.ast.add_symbol(color_id, "gl_FragColor", color_ty, loc);
    let store = cx
        .ast
        .add_assign(Operator::Assign, target, blended, loc)
        .map_err(|e| e.to_string())?;

    Ok((vec![sampler_decl, coord_decl], vec![store]))
}

/// `attribute vec2 css_a_texCoord; varying vec2 css_v_texCoord;` and
/// `css_v_texCoord = css_a_texCoord;`
fn vertex_epilogue(cx: &mut PassContext<'_>, loc: SourceLoc) -> Generated {
    let attribute_ty = Type::vector(BasicType::Float, 2)
        .with_qualifier(Qualifier::Attribute)
        .with_precision(Precision::High);
    let varying_ty = attribute_ty.with_qualifier(Qualifier::VaryingOut);
    let (attribute, attribute_decl) = declare(cx, TEX_COORD_ATTRIBUTE, attribute_ty, loc)?;
    let (varying, varying_decl) = declare(cx, TEX_COORD_VARYING, varying_ty, loc)?;

    let store = cx
        .ast
        .add_assign(Operator::Assign, varying, attribute, loc)
        .map_err(|e| e.to_string())?;

    Ok((vec![attribute_decl, varying_decl], vec![store]))
}

/// Declares a global and returns a use of it along with its declaration.
fn declare(
    cx: &mut PassContext<'_>,
    name: &str,
    ty: Type,
    loc: SourceLoc,
) -> Result<(Handle<Node>, Handle<Node>), String> {
    let id = cx
        .symbols
        .insert(Symbol::Variable(Variable::new(name, ty)))
        .map_err(|_| format!("'{name}' : redefinition"))?;
    let declared = cx.ast.add_symbol(id, name, ty, loc);
    let declaration = cx.ast.aggregate(Operator::Declaration, vec![declared], loc);
    let used = cx.ast.add_symbol(id, name, ty, loc);
    Ok((used, declaration))
}
