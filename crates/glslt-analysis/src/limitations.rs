//! Loop and indexing limitations of GLSL ES 1.00 (Appendix A).
//!
//! Only `for` loops of the form `for (T i = const; i op const; i++)` are
//! accepted, the loop index may not be written inside the body nor passed
//! to an `out`/`inout` parameter, and array indices must be built from
//! constants and loop indices (vertex-shader uniforms excepted).

use glslt_ast::{
    Ast, BasicType, Diagnostics, Handle, LoopKind, Node, NodeKind, Operator, Qualifier,
    ShaderStage, SymbolTable, Visit, Visitor, Walk, traverse, traverse_with,
};

/// Returns `true` when the tree obeys every limitation.
pub fn validate_limitations(
    ast: &Ast,
    root: Handle<Node>,
    symbols: &SymbolTable,
    stage: ShaderStage,
    diags: &mut Diagnostics,
) -> bool {
    let mut validator = Limitations {
        symbols,
        stage,
        diags,
        loop_indices: Vec::new(),
        errors: 0,
    };
    traverse(ast, root, &mut validator);
    log::debug!("limitations: {} error(s)", validator.errors);
    validator.errors == 0
}

struct Limitations<'a> {
    symbols: &'a SymbolTable,
    stage: ShaderStage,
    diags: &'a mut Diagnostics,
    /// Symbol ids of the indices of the loops enclosing the current node.
    loop_indices: Vec<u32>,
    errors: usize,
}

impl Limitations<'_> {
    fn error(&mut self, ast: &Ast, node: Handle<Node>, reason: &str, token: &str) {
        self.diags.error(ast.loc(node), reason, token, "");
        self.errors += 1;
    }

    fn is_loop_index(&self, ast: &Ast, node: Handle<Node>) -> bool {
        ast.node(node)
            .as_symbol()
            .is_some_and(|(id, _)| self.loop_indices.contains(&id))
    }

    fn is_const(ast: &Ast, node: Handle<Node>) -> bool {
        ast.node(node).as_constant().is_some()
    }

    /// Only constants and loop indices may appear.
    fn is_const_index_expr(&self, ast: &Ast, node: Handle<Node>) -> bool {
        struct ConstIndex<'l> {
            loop_indices: &'l [u32],
            valid: bool,
        }

        impl Visitor for ConstIndex<'_> {
            fn visit_symbol(&mut self, ast: &Ast, _: &Walk, node: Handle<Node>) {
                let Some((id, _)) = ast.node(node).as_symbol() else {
                    return;
                };
                self.valid &= ast.ty(node).qualifier == Qualifier::Const
                    || self.loop_indices.contains(&id);
            }
        }

        let mut check = ConstIndex {
            loop_indices: &self.loop_indices,
            valid: true,
        };
        traverse(ast, node, &mut check);
        check.valid
    }

    /// Checks the header of a loop and returns the index symbol id.
    fn validate_loop_header(&mut self, ast: &Ast, lp: Handle<Node>) -> Option<u32> {
        let NodeKind::Loop {
            kind,
            init,
            condition,
            expression,
            ..
        } = &ast.node(lp).kind
        else {
            return None;
        };
        match kind {
            LoopKind::For => {}
            LoopKind::While => {
                self.error(ast, lp, "This type of loop is not allowed", "while");
                return None;
            }
            LoopKind::DoWhile => {
                self.error(ast, lp, "This type of loop is not allowed", "do");
                return None;
            }
        }

        let index = self.validate_loop_init(ast, lp, *init)?;
        if !self.validate_loop_condition(ast, lp, *condition, index) {
            return None;
        }
        if !self.validate_loop_expression(ast, lp, *expression, index) {
            return None;
        }
        Some(index)
    }

    fn validate_loop_init(&mut self, ast: &Ast, lp: Handle<Node>, init: Option<Handle<Node>>) -> Option<u32> {
        let Some(init) = init else {
            self.error(ast, lp, "Missing init declaration", "for");
            return None;
        };
        let declared = match &ast.node(init).kind {
            NodeKind::Aggregate {
                op: Operator::Declaration,
                children,
                ..
            } if children.len() == 1 => children[0],
            _ => {
                self.error(ast, init, "Invalid init declaration", "for");
                return None;
            }
        };
        let NodeKind::Binary {
            op: Operator::Initialize,
            left,
            right,
            ..
        } = &ast.node(declared).kind
        else {
            self.error(ast, declared, "Invalid init declaration", "for");
            return None;
        };
        let Some((id, name)) = ast.node(*left).as_symbol() else {
            self.error(ast, declared, "Invalid init declaration", "for");
            return None;
        };
        let basic = ast.ty(*left).basic;
        if !matches!(basic, BasicType::Int | BasicType::UInt | BasicType::Float) {
            self.error(ast, *left, "Invalid type for loop index", basic.keyword());
            return None;
        }
        if !Self::is_const(ast, *right) {
            self.error(
                ast,
                declared,
                "Loop index cannot be initialized with non-constant expression",
                name,
            );
            return None;
        }
        Some(id)
    }

    fn validate_loop_condition(
        &mut self,
        ast: &Ast,
        lp: Handle<Node>,
        condition: Option<Handle<Node>>,
        index: u32,
    ) -> bool {
        let Some(condition) = condition else {
            self.error(ast, lp, "Missing condition", "for");
            return false;
        };
        let NodeKind::Binary {
            op, left, right, ..
        } = &ast.node(condition).kind
        else {
            self.error(ast, lp, "Invalid condition", "for");
            return false;
        };
        let Some((id, name)) = ast.node(*left).as_symbol() else {
            self.error(ast, condition, "Invalid condition", "for");
            return false;
        };
        if id != index {
            self.error(ast, *left, "Expected loop index", name);
            return false;
        }
        if !op.is_comparison() {
            self.error(ast, condition, "Invalid relational operator", op.as_str());
        }
        if !Self::is_const(ast, *right) {
            self.error(
                ast,
                condition,
                "Loop index cannot be compared with non-constant expression",
                name,
            );
            return false;
        }
        true
    }

    fn validate_loop_expression(
        &mut self,
        ast: &Ast,
        lp: Handle<Node>,
        expression: Option<Handle<Node>>,
        index: u32,
    ) -> bool {
        let Some(expression) = expression else {
            self.error(ast, lp, "Missing expression", "for");
            return false;
        };
        let (op, target, step) = match &ast.node(expression).kind {
            NodeKind::Unary { op, operand, .. } => (*op, *operand, None),
            NodeKind::Binary {
                op, left, right, ..
            } => (*op, *left, Some(*right)),
            _ => {
                self.error(ast, expression, "Invalid expression", "for");
                return false;
            }
        };
        let Some((id, name)) = ast.node(target).as_symbol() else {
            self.error(ast, expression, "Invalid expression", "for");
            return false;
        };
        if id != index {
            self.error(ast, target, "Expected loop index", name);
            return false;
        }
        if !(op.is_increment() || matches!(op, Operator::AddAssign | Operator::SubAssign)) {
            self.error(ast, expression, "Invalid operator", op.as_str());
            return false;
        }
        if let Some(step) = step {
            if !Self::is_const(ast, step) {
                self.error(
                    ast,
                    expression,
                    "Loop index cannot be modified by non-constant expression",
                    name,
                );
                return false;
            }
        }
        true
    }

    /// Writes to the loop index inside the body.
    fn validate_operation(&mut self, ast: &Ast, node: Handle<Node>, op: Operator, operand: Handle<Node>) {
        if self.loop_indices.is_empty() || !(op.is_assignment() || op.is_increment()) {
            return;
        }
        if self.is_loop_index(ast, operand) {
            let name = ast.node(operand).as_symbol().map(|(_, n)| n).unwrap_or("");
            self.error(
                ast,
                node,
                "Loop index cannot be statically assigned to within the body of the loop",
                name,
            );
        }
    }

    fn validate_indexing(&mut self, ast: &Ast, base: Handle<Node>, index: Handle<Node>) {
        if !ast.ty(index).is_scalar_int() {
            let ty = ast.ty(index).to_string();
            self.error(ast, index, "Index expression must have integral type", &ty);
        }
        let skip = self.stage == ShaderStage::Vertex && ast.ty(base).qualifier == Qualifier::Uniform;
        if !skip && !self.is_const_index_expr(ast, index) {
            self.error(ast, index, "Index expression must be constant", "[]");
        }
    }

    /// Loop indices passed to `out`/`inout` parameters.
    fn validate_function_call(&mut self, ast: &Ast, name: &str, args: &[Handle<Node>]) {
        if self.loop_indices.is_empty() {
            return;
        }
        let indexed: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|&(_, &arg)| self.is_loop_index(ast, arg))
            .map(|(i, _)| i)
            .collect();
        if indexed.is_empty() {
            return;
        }
        let Some(function) = self
            .symbols
            .find_global(name)
            .and_then(|symbol| symbol.as_function())
        else {
            return;
        };
        for i in indexed {
            let writes = function
                .params
                .get(i)
                .is_some_and(|p| matches!(p.ty.qualifier, Qualifier::Out | Qualifier::InOut));
            if writes {
                let arg_name = ast.node(args[i]).as_symbol().map(|(_, n)| n).unwrap_or("");
                self.error(
                    ast,
                    args[i],
                    "Loop index cannot be used as argument to a function out or inout parameter",
                    arg_name,
                );
            }
        }
    }
}

impl Visitor for Limitations<'_> {
    fn visit_unary(&mut self, ast: &Ast, _: &Walk, _: Visit, node: Handle<Node>) -> bool {
        if let NodeKind::Unary { op, operand, .. } = &ast.node(node).kind {
            self.validate_operation(ast, node, *op, *operand);
        }
        true
    }

    fn visit_binary(&mut self, ast: &Ast, _: &Walk, _: Visit, node: Handle<Node>) -> bool {
        if let NodeKind::Binary {
            op, left, right, ..
        } = &ast.node(node).kind
        {
            self.validate_operation(ast, node, *op, *left);
            if matches!(op, Operator::IndexDirect | Operator::IndexIndirect) {
                self.validate_indexing(ast, *left, *right);
            }
        }
        true
    }

    fn visit_aggregate(&mut self, ast: &Ast, _: &Walk, _: Visit, node: Handle<Node>) -> bool {
        if let NodeKind::Aggregate {
            op: Operator::FunctionCall,
            name,
            children,
            ..
        } = &ast.node(node).kind
        {
            self.validate_function_call(ast, name, children);
        }
        true
    }

    fn visit_loop(&mut self, ast: &Ast, walk: &Walk, _: Visit, node: Handle<Node>) -> bool {
        let Some(index) = self.validate_loop_header(ast, node) else {
            return false;
        };
        if let NodeKind::Loop { body: Some(body), .. } = &ast.node(node).kind {
            self.loop_indices.push(index);
            let mut walk = walk.clone();
            traverse_with(ast, *body, self, &mut walk);
            self.loop_indices.pop();
        }
        // The header was checked above and the body walked by hand.
        false
    }
}
