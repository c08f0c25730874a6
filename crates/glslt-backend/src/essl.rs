//! GLSL ES source writer.
//!
//! Writes the rewritten tree back as GLSL ES. Every binary and unary
//! expression is fully parenthesized. The marks left by the passes are
//! honoured here: loops flagged for unrolling are expanded with the index
//! replaced by its value, emulated built-ins call their `webgl_*_emu`
//! helper, clamped indices are wrapped in a clamp, and user identifiers go
//! through the name hasher.

use std::collections::HashSet;

use glslt_analysis::NameHasher;
use glslt_ast::{
    ArrayIndexClampingStrategy, Ast, BasicType, BranchKind, ConstantUnion, Diagnostics, Handle,
    Node, NodeKind, Operator, Precision, Qualifier, ShaderStage, StructType, Type, Visit, Visitor,
    Walk, traverse,
};
use glslt_parser::Behavior;
use glslt_passes::emulation::{emulated_name, helper_source};

use crate::{Backend, BackendError, BackendInput, BackendOutput, OutputFile};

const INT_CLAMP_HELPER: &str = "int webgl_int_clamp(int value, int minValue, int maxValue) \
{ return ((value < minValue) ? minValue : ((value > maxValue) ? maxValue : value)); }\n\n";

/// Upper bound on the iterations of a loop expanded in place.
const MAX_UNROLLED_ITERATIONS: usize = 1024;

const SWIZZLE: [char; 4] = ['x', 'y', 'z', 'w'];

/// Writes GLSL ES source.
#[derive(Debug)]
pub struct EsslBackend;

impl Backend for EsslBackend {
    fn name(&self) -> &str {
        "ESSL"
    }

    fn targets(&self) -> &[&str] {
        &["essl", "glsl-es"]
    }

    fn compile(
        &self,
        input: &BackendInput<'_>,
        names: &mut NameHasher,
    ) -> Result<BackendOutput, BackendError> {
        let mut writer = EsslWriter::new(input, names);
        writer.write_header();
        writer.write_root()?;
        let extension = match input.stage {
            ShaderStage::Vertex => "vert",
            ShaderStage::Fragment => "frag",
        };
        log::debug!("emitted {} bytes of ESSL", writer.out.len());
        Ok(BackendOutput {
            files: vec![OutputFile {
                name: format!("shader.{extension}"),
                content: writer.out,
            }],
            diagnostics: writer.diagnostics,
        })
    }
}

type Emit = Result<(), BackendError>;

struct EsslWriter<'a, 'n> {
    input: &'a BackendInput<'a>,
    ast: &'a Ast,
    names: &'n mut NameHasher,
    out: String,
    depth: usize,
    declared_structs: HashSet<Handle<StructType>>,
    /// Indices of the loops being unrolled and their current values.
    loop_values: Vec<(u32, i32)>,
    diagnostics: Diagnostics,
}

impl<'a, 'n> EsslWriter<'a, 'n> {
    fn new(input: &'a BackendInput<'a>, names: &'n mut NameHasher) -> Self {
        Self {
            input,
            ast: input.ast,
            names,
            out: String::new(),
            depth: 0,
            declared_structs: HashSet::new(),
            loop_values: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    fn write_header(&mut self) {
        if self.input.version >= 300 {
            self.out
                .push_str(&format!("#version {} es\n", self.input.version));
        }
        for (name, behavior) in self.input.extensions {
            if *behavior != Behavior::Undefined {
                self.out
                    .push_str(&format!("#extension {name} : {behavior}\n"));
            }
        }
        if self.input.pragma.invariant_all {
            self.out.push_str("#pragma STDGL invariant(all)\n");
        }
        self.out
            .push_str(&helper_source(self.input.stage, self.input.emulated_functions));
        if self.input.needs_int_clamp
            && self.input.clamping == ArrayIndexClampingStrategy::UserDefinedIntFunction
        {
            self.out.push_str(INT_CLAMP_HELPER);
        }
    }

    fn write_root(&mut self) -> Emit {
        for child in self.ast.children(self.input.root) {
            self.write_statement(child)?;
        }
        Ok(())
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
    }

    // ---- statements ---------------------------------------------------

    fn write_statement(&mut self, node: Handle<Node>) -> Emit {
        let ast = self.ast;
        match &ast.node(node).kind {
            NodeKind::Aggregate {
                op,
                children,
                name,
                user_defined,
                ty,
                ..
            } => match op {
                Operator::Sequence => {
                    self.indent();
                    self.write_block(Some(node))?;
                    self.out.push('\n');
                }
                Operator::Function => self.write_function(children, name, *user_defined, ty)?,
                Operator::Prototype => {
                    self.indent();
                    self.write_signature(name, *user_defined, ty, children)?;
                    self.out.push_str(";\n");
                }
                Operator::Declaration => {
                    self.indent();
                    self.write_declaration(children)?;
                    self.out.push_str(";\n");
                }
                Operator::InvariantDeclaration => {
                    for &child in children {
                        self.indent();
                        self.out.push_str("invariant ");
                        self.write_expr(child)?;
                        self.out.push_str(";\n");
                    }
                }
                Operator::Null => {
                    return Err(BackendError::Unsupported(
                        "aggregate without an operator".into(),
                    ));
                }
                _ => self.write_expression_statement(node)?,
            },
            NodeKind::Selection {
                condition,
                true_block,
                false_block,
                ty,
            } if ty.basic == BasicType::Void => {
                self.indent();
                self.out.push_str("if (");
                self.write_expr(*condition)?;
                self.out.push_str(") ");
                self.write_block(*true_block)?;
                if false_block.is_some() {
                    self.out.push_str(" else ");
                    self.write_block(*false_block)?;
                }
                self.out.push('\n');
            }
            NodeKind::Loop { .. } => self.write_loop(node)?,
            NodeKind::Branch { kind, expression } => {
                self.indent();
                self.out.push_str(kind.keyword());
                if let Some(expression) = expression {
                    self.out.push(' ');
                    self.write_expr(*expression)?;
                }
                self.out.push_str(";\n");
            }
            _ => self.write_expression_statement(node)?,
        }
        Ok(())
    }

    fn write_expression_statement(&mut self, node: Handle<Node>) -> Emit {
        self.indent();
        self.write_expr(node)?;
        self.out.push_str(";\n");
        Ok(())
    }

    /// `{ ... }` around a statement list or a single statement. Leaves the
    /// cursor after the closing brace.
    fn write_block(&mut self, node: Option<Handle<Node>>) -> Emit {
        let ast = self.ast;
        self.out.push_str("{\n");
        self.depth += 1;
        match node {
            Some(node) => match &ast.node(node).kind {
                NodeKind::Aggregate {
                    op: Operator::Sequence,
                    children,
                    ..
                } => {
                    for &child in children {
                        self.write_statement(child)?;
                    }
                }
                _ => self.write_statement(node)?,
            },
            None => {}
        }
        self.depth -= 1;
        self.indent();
        self.out.push('}');
        Ok(())
    }

    fn write_function(
        &mut self,
        children: &[Handle<Node>],
        name: &str,
        user_defined: bool,
        ty: &Type,
    ) -> Emit {
        let ast = self.ast;
        let params = children
            .first()
            .map(|&p| ast.children(p))
            .unwrap_or_default();
        self.indent();
        self.write_signature(name, user_defined, ty, &params)?;
        self.out.push(' ');
        self.write_block(children.get(1).copied())?;
        self.out.push('\n');
        Ok(())
    }

    fn write_signature(
        &mut self,
        mangled_name: &str,
        user_defined: bool,
        ty: &Type,
        params: &[Handle<Node>],
    ) -> Emit {
        let ast = self.ast;
        self.write_precision(ty);
        self.write_type_specifier(ty)?;
        let name = self.function_name(mangled_name, user_defined, false);
        self.out.push(' ');
        self.out.push_str(&name);
        self.out.push('(');
        for (i, &param) in params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            let ty = ast.ty(param);
            match ty.qualifier {
                Qualifier::Out => self.out.push_str("out "),
                Qualifier::InOut => self.out.push_str("inout "),
                Qualifier::ConstReadOnly => self.out.push_str("const "),
                _ => {}
            }
            self.write_precision(&ty);
            self.write_type_specifier(&ty.element_type())?;
            if let Some((_, name)) = ast.node(param).as_symbol() {
                if !name.is_empty() {
                    let hashed = self.names.hash(name);
                    self.out.push(' ');
                    self.out.push_str(&hashed);
                }
            }
            self.write_array_suffix(&ty);
        }
        self.out.push(')');
        Ok(())
    }

    fn write_declaration(&mut self, children: &[Handle<Node>]) -> Emit {
        let ast = self.ast;
        let Some(&first) = children.first() else {
            return Ok(());
        };
        let ty = ast.ty(self.declared_symbol(first));
        if ty.basic == BasicType::InterfaceBlock {
            return self.write_interface_block(first, &ty);
        }

        self.write_qualifiers(&ty);
        self.write_precision(&ty);
        self.write_type_specifier(&ty.element_type())?;
        for (i, &child) in children.iter().enumerate() {
            let symbol = self.declared_symbol(child);
            let Some((_, name)) = ast.node(symbol).as_symbol() else {
                continue;
            };
            if name.is_empty() {
                // Bare `struct S { ... };`.
                continue;
            }
            self.out.push_str(if i == 0 { " " } else { ", " });
            let hashed = self.names.hash(name);
            self.out.push_str(&hashed);
            self.write_array_suffix(&ast.ty(symbol));
            if let NodeKind::Binary {
                op: Operator::Initialize,
                right,
                ..
            } = &ast.node(child).kind
            {
                self.out.push_str(" = ");
                self.write_expr(*right)?;
            }
        }
        Ok(())
    }

    /// The symbol a declarator declares.
    fn declared_symbol(&self, declarator: Handle<Node>) -> Handle<Node> {
        match &self.ast.node(declarator).kind {
            NodeKind::Binary {
                op: Operator::Initialize,
                left,
                ..
            } => *left,
            _ => declarator,
        }
    }

    fn write_interface_block(&mut self, symbol: Handle<Node>, ty: &Type) -> Emit {
        let ast = self.ast;
        let Some(block) = ty.block.and_then(|h| ast.blocks.try_get(h)) else {
            return Err(BackendError::Other("dangling interface block".into()));
        };
        self.write_qualifiers(ty);
        let block_name = self.names.hash(&block.name);
        self.out.push_str(&block_name);
        self.out.push_str(" {\n");
        self.depth += 1;
        for field in &block.fields {
            self.indent();
            self.write_precision(&field.ty);
            self.write_type_specifier(&field.ty.element_type())?;
            let hashed = self.names.hash(&field.name);
            self.out.push(' ');
            self.out.push_str(&hashed);
            self.write_array_suffix(&field.ty);
            self.out.push_str(";\n");
        }
        self.depth -= 1;
        self.indent();
        self.out.push('}');
        if let Some((_, instance)) = ast.node(symbol).as_symbol() {
            if !instance.is_empty() {
                let hashed = self.names.hash(instance);
                self.out.push(' ');
                self.out.push_str(&hashed);
                self.write_array_suffix(ty);
            }
        }
        Ok(())
    }

    fn write_loop(&mut self, node: Handle<Node>) -> Emit {
        let ast = self.ast;
        let NodeKind::Loop {
            kind,
            init,
            condition,
            expression,
            body,
            unroll,
        } = &ast.node(node).kind
        else {
            return Ok(());
        };

        if *unroll {
            match self.unroll_values(*init, *condition, *expression, *body) {
                Some((index, values)) => return self.write_unrolled(index, &values, *body),
                None => self.diagnostics.warning_at(
                    ast.loc(node),
                    "loop marked for unrolling is not countable; emitted as a loop",
                ),
            }
        }

        self.indent();
        match kind {
            glslt_ast::LoopKind::For => {
                self.out.push_str("for (");
                if let Some(init) = init {
                    self.write_for_init(*init)?;
                }
                self.out.push_str("; ");
                if let Some(condition) = condition {
                    self.write_expr(*condition)?;
                }
                self.out.push_str("; ");
                if let Some(expression) = expression {
                    self.write_expr(*expression)?;
                }
                self.out.push_str(") ");
                self.write_block(*body)?;
            }
            glslt_ast::LoopKind::While => {
                self.out.push_str("while (");
                if let Some(condition) = condition {
                    self.write_expr(*condition)?;
                }
                self.out.push_str(") ");
                self.write_block(*body)?;
            }
            glslt_ast::LoopKind::DoWhile => {
                self.out.push_str("do ");
                self.write_block(*body)?;
                self.out.push_str(" while (");
                if let Some(condition) = condition {
                    self.write_expr(*condition)?;
                }
                self.out.push_str(");");
            }
        }
        self.out.push('\n');
        Ok(())
    }

    fn write_for_init(&mut self, init: Handle<Node>) -> Emit {
        let ast = self.ast;
        match &ast.node(init).kind {
            NodeKind::Aggregate {
                op: Operator::Declaration,
                children,
                ..
            } => self.write_declaration(children),
            _ => self.write_expr(init),
        }
    }

    fn write_unrolled(&mut self, index: u32, values: &[i32], body: Option<Handle<Node>>) -> Emit {
        self.indent();
        self.out.push_str("{\n");
        self.depth += 1;
        for &value in values {
            self.loop_values.push((index, value));
            self.indent();
            let written = self.write_block(body);
            self.loop_values.pop();
            written?;
            self.out.push('\n');
        }
        self.depth -= 1;
        self.indent();
        self.out.push_str("}\n");
        Ok(())
    }

    /// Index id and successive index values of a `for` loop whose header
    /// is `int i = C; i <op> C; i++ | i-- | i += C | i -= C` and whose body
    /// does not jump out of the loop.
    fn unroll_values(
        &self,
        init: Option<Handle<Node>>,
        condition: Option<Handle<Node>>,
        expression: Option<Handle<Node>>,
        body: Option<Handle<Node>>,
    ) -> Option<(u32, Vec<i32>)> {
        let ast = self.ast;
        let NodeKind::Aggregate {
            op: Operator::Declaration,
            children,
            ..
        } = &ast.node(init?).kind
        else {
            return None;
        };
        let &[declarator] = children.as_slice() else {
            return None;
        };
        let NodeKind::Binary {
            op: Operator::Initialize,
            left,
            right,
            ..
        } = &ast.node(declarator).kind
        else {
            return None;
        };
        let (index, _) = ast.node(*left).as_symbol()?;
        let start = self.constant_int(*right)?;

        let NodeKind::Binary {
            op: comparison,
            left,
            right,
            ..
        } = &ast.node(condition?).kind
        else {
            return None;
        };
        if ast.node(*left).as_symbol()?.0 != index {
            return None;
        }
        let limit = self.constant_int(*right)?;

        let step = match &ast.node(expression?).kind {
            NodeKind::Unary { op, operand, .. } if ast.node(*operand).as_symbol()?.0 == index => {
                match op {
                    Operator::PostIncrement | Operator::PreIncrement => 1,
                    Operator::PostDecrement | Operator::PreDecrement => -1,
                    _ => return None,
                }
            }
            NodeKind::Binary {
                op, left, right, ..
            } if ast.node(*left).as_symbol()?.0 == index => match op {
                Operator::AddAssign => self.constant_int(*right)?,
                Operator::SubAssign => self.constant_int(*right)?.checked_neg()?,
                _ => return None,
            },
            _ => return None,
        };
        if step == 0 {
            return None;
        }

        if let Some(body) = body {
            let mut jumps = LoopJumps::default();
            traverse(ast, body, &mut jumps);
            if jumps.found {
                return None;
            }
        }

        let mut values = Vec::new();
        let mut value = start;
        while holds(*comparison, value, limit)? {
            if values.len() == MAX_UNROLLED_ITERATIONS {
                return None;
            }
            values.push(value);
            value = value.checked_add(step)?;
        }
        Some((index, values))
    }

    fn constant_int(&self, node: Handle<Node>) -> Option<i32> {
        match self.ast.node(node).as_constant()? {
            [ConstantUnion::Int(v)] => Some(*v),
            _ => None,
        }
    }

    // ---- types --------------------------------------------------------

    fn write_qualifiers(&mut self, ty: &Type) {
        let invariant_varying = matches!(
            ty.qualifier,
            Qualifier::InvariantVaryingIn | Qualifier::InvariantVaryingOut
        );
        if ty.invariant && !invariant_varying {
            self.out.push_str("invariant ");
        }
        if let Some(location) = ty.layout.location {
            self.out
                .push_str(&format!("layout(location = {location}) "));
        }
        match ty.qualifier {
            Qualifier::Temporary | Qualifier::Global => {}
            Qualifier::Const
            | Qualifier::Attribute
            | Qualifier::VaryingIn
            | Qualifier::VaryingOut
            | Qualifier::InvariantVaryingIn
            | Qualifier::InvariantVaryingOut
            | Qualifier::Uniform
            | Qualifier::VertexIn
            | Qualifier::VertexOut
            | Qualifier::FragmentIn
            | Qualifier::FragmentOut
            | Qualifier::FlatIn
            | Qualifier::FlatOut
            | Qualifier::SmoothIn
            | Qualifier::SmoothOut
            | Qualifier::CentroidIn
            | Qualifier::CentroidOut => {
                self.out.push_str(ty.qualifier.as_str());
                self.out.push(' ');
            }
            _ => {}
        }
    }

    fn write_precision(&mut self, ty: &Type) {
        if ty.precision != Precision::Undefined && ty.basic.supports_precision() {
            self.out.push_str(ty.precision.keyword());
            self.out.push(' ');
        }
    }

    /// The type name, or the full struct definition the first time a
    /// struct is written.
    fn write_type_specifier(&mut self, ty: &Type) -> Emit {
        if let Some(handle) = ty.structure {
            if self.declared_structs.insert(handle) {
                return self.write_struct_definition(handle);
            }
        }
        let name = self.type_name(ty);
        self.out.push_str(&name);
        Ok(())
    }

    fn write_struct_definition(&mut self, handle: Handle<StructType>) -> Emit {
        let ast = self.ast;
        let Some(st) = ast.structs.try_get(handle) else {
            return Err(BackendError::Other("dangling struct type".into()));
        };
        let name = self.names.hash(&st.name);
        self.out.push_str("struct ");
        self.out.push_str(&name);
        self.out.push_str(" {\n");
        self.depth += 1;
        for field in &st.fields {
            self.indent();
            self.write_precision(&field.ty);
            self.write_type_specifier(&field.ty.element_type())?;
            let hashed = self.names.hash(&field.name);
            self.out.push(' ');
            self.out.push_str(&hashed);
            self.write_array_suffix(&field.ty);
            self.out.push_str(";\n");
        }
        self.depth -= 1;
        self.indent();
        self.out.push('}');
        Ok(())
    }

    fn write_array_suffix(&mut self, ty: &Type) {
        if let Some(size) = ty.array_size {
            self.out.push_str(&format!("[{size}]"));
        }
    }

    /// Type name without array size or qualifiers.
    fn type_name(&mut self, ty: &Type) -> String {
        let ast = self.ast;
        if let Some(st) = ty.structure.and_then(|h| ast.structs.try_get(h)) {
            return self.names.hash(&st.name);
        }
        if let Some(block) = ty.block.and_then(|h| ast.blocks.try_get(h)) {
            return self.names.hash(&block.name);
        }
        if ty.is_matrix() {
            return if ty.cols() == ty.rows() {
                format!("mat{}", ty.cols())
            } else {
                format!("mat{}x{}", ty.cols(), ty.rows())
            };
        }
        if ty.is_vector() {
            let prefix = match ty.basic {
                BasicType::Int => "i",
                BasicType::UInt => "u",
                BasicType::Bool => "b",
                _ => "",
            };
            return format!("{prefix}vec{}", ty.nominal_size());
        }
        ty.basic.keyword().to_string()
    }

    // ---- expressions --------------------------------------------------

    fn write_expr(&mut self, node: Handle<Node>) -> Emit {
        let ast = self.ast;
        match &ast.node(node).kind {
            NodeKind::Symbol { id, name, .. } => {
                match self.loop_values.iter().rev().find(|(i, _)| i == id) {
                    Some((_, value)) => self.out.push_str(&value.to_string()),
                    None => {
                        let hashed = self.names.hash(name);
                        self.out.push_str(&hashed);
                    }
                }
            }
            NodeKind::Constant { values, ty } => {
                let mut rest = values.as_slice();
                self.write_constant(ty, &mut rest)?;
            }
            NodeKind::Unary { op, operand, .. } => {
                self.out.push('(');
                let postfix = matches!(op, Operator::PostIncrement | Operator::PostDecrement);
                if !postfix {
                    self.out.push_str(op.as_str());
                }
                self.write_expr(*operand)?;
                if postfix {
                    self.out.push_str(op.as_str());
                }
                self.out.push(')');
            }
            NodeKind::Binary {
                op,
                left,
                right,
                add_index_clamp,
                ..
            } => match op {
                Operator::IndexDirect | Operator::IndexIndirect => {
                    self.write_expr(*left)?;
                    self.out.push('[');
                    if *add_index_clamp {
                        self.write_clamped_index(*left, *right)?;
                    } else {
                        self.write_expr(*right)?;
                    }
                    self.out.push(']');
                }
                Operator::IndexDirectStruct | Operator::IndexDirectInterfaceBlock => {
                    self.write_expr(*left)?;
                    let field = self.field_name(*left, *right)?;
                    self.out.push('.');
                    self.out.push_str(&field);
                }
                Operator::VectorSwizzle => {
                    self.write_expr(*left)?;
                    self.out.push('.');
                    for offset in ast.swizzle_offsets(node) {
                        let component = SWIZZLE.get(usize::from(offset)).copied().ok_or_else(|| {
                            BackendError::Other(format!("swizzle offset {offset} out of range"))
                        })?;
                        self.out.push(component);
                    }
                }
                Operator::Comma => {
                    self.out.push('(');
                    self.write_expr(*left)?;
                    self.out.push_str(", ");
                    self.write_expr(*right)?;
                    self.out.push(')');
                }
                _ => {
                    self.out.push('(');
                    self.write_expr(*left)?;
                    self.out.push(' ');
                    self.out.push_str(op.as_str());
                    self.out.push(' ');
                    self.write_expr(*right)?;
                    self.out.push(')');
                }
            },
            NodeKind::Aggregate {
                op,
                children,
                name,
                user_defined,
                ty,
                use_emulated_function,
            } => {
                match op {
                    Operator::FunctionCall => {
                        let name =
                            self.function_name(name, *user_defined, *use_emulated_function);
                        self.out.push_str(&name);
                    }
                    op if op.is_constructor() => {
                        let name = self.type_name(ty);
                        self.out.push_str(&name);
                        self.write_array_suffix(ty);
                    }
                    other => {
                        return Err(BackendError::Unsupported(format!(
                            "'{other}' in an expression"
                        )));
                    }
                }
                self.write_arguments(children)?;
            }
            NodeKind::Selection {
                condition,
                true_block: Some(true_expr),
                false_block: Some(false_expr),
                ..
            } => {
                self.out.push_str("((");
                self.write_expr(*condition)?;
                self.out.push_str(") ? (");
                self.write_expr(*true_expr)?;
                self.out.push_str(") : (");
                self.write_expr(*false_expr)?;
                self.out.push_str("))");
            }
            NodeKind::Selection { .. } | NodeKind::Loop { .. } | NodeKind::Branch { .. } => {
                return Err(BackendError::Unsupported(
                    "statement in an expression".into(),
                ));
            }
        }
        Ok(())
    }

    fn write_arguments(&mut self, args: &[Handle<Node>]) -> Emit {
        self.out.push('(');
        for (i, &arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.write_expr(arg)?;
        }
        self.out.push(')');
        Ok(())
    }

    fn write_clamped_index(&mut self, base: Handle<Node>, index: Handle<Node>) -> Emit {
        let ast = self.ast;
        let base_ty = ast.ty(base);
        let size = match base_ty.array_size {
            Some(size) => size,
            None if base_ty.is_matrix() => u32::from(base_ty.cols()),
            None => u32::from(base_ty.nominal_size()),
        };
        let max = size.saturating_sub(1);
        match self.input.clamping {
            ArrayIndexClampingStrategy::ClampIntrinsic => {
                self.out.push_str("int(clamp(float(");
                self.write_expr(index)?;
                self.out.push_str(&format!("), 0.0, float({max})))"));
            }
            ArrayIndexClampingStrategy::UserDefinedIntFunction => {
                self.out.push_str("webgl_int_clamp(");
                self.write_expr(index)?;
                self.out.push_str(&format!(", 0, {max})"));
            }
        }
        Ok(())
    }

    fn field_name(
        &mut self,
        base: Handle<Node>,
        index: Handle<Node>,
    ) -> Result<String, BackendError> {
        let ast = self.ast;
        let missing = || BackendError::Other("field selection without a field".into());
        let index = self
            .constant_int(index)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(missing)?;
        let ty = ast.ty(base);
        let fields = match (ty.structure, ty.block) {
            (Some(h), _) => ast.structs.try_get(h).map(|s| &s.fields),
            (None, Some(h)) => ast.blocks.try_get(h).map(|b| &b.fields),
            (None, None) => None,
        };
        let field = fields.and_then(|f| f.get(index)).ok_or_else(missing)?;
        Ok(self.names.hash(&field.name))
    }

    fn function_name(&mut self, mangled_name: &str, user_defined: bool, emulated: bool) -> String {
        if emulated {
            return emulated_name(mangled_name);
        }
        let base = mangled_name.split('(').next().unwrap_or(mangled_name);
        if user_defined && base != "main" {
            self.names.hash(base)
        } else {
            base.to_string()
        }
    }

    /// Writes one value of type `ty` taken from the front of `values`.
    fn write_constant(&mut self, ty: &Type, values: &mut &[ConstantUnion]) -> Emit {
        let ast = self.ast;
        if let Some(size) = ty.array_size {
            let element = ty.element_type();
            let name = self.type_name(&element);
            self.out.push_str(&format!("{name}[{size}]("));
            for i in 0..size {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.write_constant(&element, values)?;
            }
            self.out.push(')');
            return Ok(());
        }

        if let Some(st) = ty.structure.and_then(|h| ast.structs.try_get(h)) {
            let name = self.names.hash(&st.name);
            self.out.push_str(&name);
            self.out.push('(');
            for (i, field) in st.fields.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.write_constant(&field.ty, values)?;
            }
            self.out.push(')');
            return Ok(());
        }

        let count = usize::from(ty.primary_size) * usize::from(ty.secondary_size);
        if values.len() < count {
            return Err(BackendError::Other(format!(
                "constant has {} component(s), its type needs {count}",
                values.len()
            )));
        }
        let (head, tail) = values.split_at(count);
        *values = tail;
        if count == 1 {
            return write_scalar(&mut self.out, head[0]);
        }
        let name = self.type_name(ty);
        self.out.push_str(&name);
        self.out.push('(');
        for (i, &value) in head.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            write_scalar(&mut self.out, value)?;
        }
        self.out.push(')');
        Ok(())
    }
}

fn write_scalar(out: &mut String, value: ConstantUnion) -> Emit {
    match value {
        ConstantUnion::Float(v) if !v.is_finite() => {
            return Err(BackendError::Unsupported(format!(
                "non-finite float constant {v}"
            )));
        }
        ConstantUnion::Float(v) => out.push_str(&format!("{v:?}")),
        ConstantUnion::Int(v) => out.push_str(&v.to_string()),
        ConstantUnion::UInt(v) => out.push_str(&format!("{v}u")),
        ConstantUnion::Bool(v) => out.push_str(if v { "true" } else { "false" }),
    }
    Ok(())
}

fn holds(comparison: Operator, value: i32, limit: i32) -> Option<bool> {
    Some(match comparison {
        Operator::LessThan => value < limit,
        Operator::LessThanEqual => value <= limit,
        Operator::GreaterThan => value > limit,
        Operator::GreaterThanEqual => value >= limit,
        Operator::NotEqual => value != limit,
        Operator::Equal => value == limit,
        _ => return None,
    })
}

/// Finds `break` and `continue` statements.
#[derive(Default)]
struct LoopJumps {
    found: bool,
}

impl Visitor for LoopJumps {
    fn visit_branch(&mut self, ast: &Ast, _: &Walk, _: Visit, node: Handle<Node>) -> bool {
        if let NodeKind::Branch {
            kind: BranchKind::Break | BranchKind::Continue,
            ..
        } = ast.node(node).kind
        {
            self.found = true;
        }
        true
    }
}
