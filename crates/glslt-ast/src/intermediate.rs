//! Node construction with type promotion and constant folding applied as
//! each node is built.

use crate::arena::Handle;
use crate::constant::ConstantUnion;
use crate::diagnostics::{Diagnostics, SourceLoc};
use crate::error::PromoteError;
use crate::fold::{ConstOperand, fold_binary, fold_unary};
use crate::node::{Ast, BranchKind, LoopKind, Node, NodeKind};
use crate::operator::Operator;
use crate::promote::{promote_binary, promote_unary};
use crate::types::{BasicType, Qualifier, Type};

impl Ast {
    pub fn add_symbol(&mut self, id: u32, name: &str, ty: Type, loc: SourceLoc) -> Handle<Node> {
        self.append(
            NodeKind::Symbol {
                id,
                name: name.to_string(),
                ty,
            },
            loc,
        )
    }

    pub fn add_constant(
        &mut self,
        values: Vec<ConstantUnion>,
        ty: Type,
        loc: SourceLoc,
    ) -> Handle<Node> {
        self.append(
            NodeKind::Constant {
                values,
                ty: ty.with_qualifier(Qualifier::Const),
            },
            loc,
        )
    }

    /// Constant components of a node, if it is a constant.
    pub fn constant_values(&self, node: Handle<Node>) -> Option<&[ConstantUnion]> {
        self.node(node).as_constant()
    }

    pub fn add_unary_math(
        &mut self,
        op: Operator,
        operand: Handle<Node>,
        loc: SourceLoc,
    ) -> Result<Handle<Node>, PromoteError> {
        let operand_ty = self.ty(operand);
        let ty = promote_unary(op, &operand_ty)?;
        if !op.is_increment() {
            if let Some(values) = self.constant_values(operand) {
                let folded = fold_unary(
                    op,
                    ConstOperand {
                        values,
                        ty: &operand_ty,
                    },
                    &ty,
                );
                if let Some(folded) = folded {
                    return Ok(self.add_constant(folded.values, folded.ty, loc));
                }
            }
        }
        Ok(self.append(NodeKind::Unary { op, operand, ty }, loc))
    }

    /// Builds a binary arithmetic, comparison or logical node, folding it
    /// when both operands are constants. Fold warnings go to `diags`.
    pub fn add_binary_math(
        &mut self,
        op: Operator,
        left: Handle<Node>,
        right: Handle<Node>,
        loc: SourceLoc,
        diags: &mut Diagnostics,
    ) -> Result<Handle<Node>, PromoteError> {
        let left_ty = self.ty(left);
        let right_ty = self.ty(right);
        let (op, ty) = promote_binary(op, &left_ty, &right_ty)?;

        if let (Some(lv), Some(rv)) = (self.constant_values(left), self.constant_values(right)) {
            let folded = fold_binary(
                op,
                ConstOperand {
                    values: lv,
                    ty: &left_ty,
                },
                ConstOperand {
                    values: rv,
                    ty: &right_ty,
                },
                &ty,
            );
            if let Some(folded) = folded {
                for warning in folded.warnings {
                    diags.warning_at(loc, warning);
                }
                return Ok(self.add_constant(folded.values, folded.ty, loc));
            }
        }
        Ok(self.binary(op, left, right, ty, loc))
    }

    /// Builds an assignment or initialization. Never folded.
    pub fn add_assign(
        &mut self,
        op: Operator,
        left: Handle<Node>,
        right: Handle<Node>,
        loc: SourceLoc,
    ) -> Result<Handle<Node>, PromoteError> {
        let (op, ty) = promote_binary(op, &self.ty(left), &self.ty(right))?;
        Ok(self.binary(op, left, right, ty, loc))
    }

    fn binary(
        &mut self,
        op: Operator,
        left: Handle<Node>,
        right: Handle<Node>,
        ty: Type,
        loc: SourceLoc,
    ) -> Handle<Node> {
        self.append(
            NodeKind::Binary {
                op,
                left,
                right,
                ty,
                add_index_clamp: false,
            },
            loc,
        )
    }

    /// Result type of `base[index]`: the element of an array, the column of
    /// a matrix, or the component of a vector.
    pub fn indexed_type(&self, base: &Type) -> Type {
        let mut ty = if base.is_array() {
            base.element_type()
        } else if base.is_matrix() {
            Type::new(base.basic, base.precision, base.qualifier, base.rows(), 1)
        } else {
            Type::new(base.basic, base.precision, base.qualifier, 1, 1)
        };
        ty.layout = Default::default();
        ty.invariant = false;
        ty
    }

    /// Builds `base[index]`, folding when both sides are constants. The
    /// caller has already range-checked constant indices.
    pub fn add_index(
        &mut self,
        base: Handle<Node>,
        index: Handle<Node>,
        loc: SourceLoc,
    ) -> Handle<Node> {
        let base_ty = self.ty(base);
        let mut ty = self.indexed_type(&base_ty);
        let constant_index = self
            .constant_values(index)
            .and_then(|v| v.first())
            .map(|v| v.as_i32());

        if let (Some(i), Some(values)) = (constant_index, self.constant_values(base)) {
            let size = self.object_size(&ty);
            let start = usize::try_from(i).unwrap_or(0) * size;
            if let Some(slice) = values.get(start..start + size) {
                let slice = slice.to_vec();
                return self.add_constant(slice, ty, loc);
            }
        }

        let base_const = base_ty.qualifier == Qualifier::Const;
        ty.qualifier = match (base_const, constant_index.is_some()) {
            (true, true) => Qualifier::Const,
            (true, false) => Qualifier::Temporary,
            (false, _) => base_ty.qualifier,
        };
        let op = if constant_index.is_some() {
            Operator::IndexDirect
        } else {
            Operator::IndexIndirect
        };
        self.binary(op, base, index, ty, loc)
    }

    /// Builds a struct field selection (`s.field`) or an interface block
    /// member selection through an instance name.
    pub fn add_field(
        &mut self,
        base: Handle<Node>,
        field_index: usize,
        field_ty: Type,
        loc: SourceLoc,
    ) -> Handle<Node> {
        let base_ty = self.ty(base);
        let mut ty = field_ty.with_qualifier(base_ty.qualifier);

        if let Some(values) = self.constant_values(base) {
            let offset: usize = match self.struct_type(&base_ty) {
                Some(st) => st.fields[..field_index.min(st.fields.len())]
                    .iter()
                    .map(|f| f.ty.object_size(&self.structs))
                    .sum(),
                None => 0,
            };
            let size = self.object_size(&field_ty);
            if let Some(slice) = values.get(offset..offset + size) {
                let slice = slice.to_vec();
                return self.add_constant(slice, field_ty, loc);
            }
        }

        if base_ty.qualifier == Qualifier::Const {
            ty.qualifier = Qualifier::Const;
        }
        let op = if base_ty.block.is_some() {
            Operator::IndexDirectInterfaceBlock
        } else {
            Operator::IndexDirectStruct
        };
        let index = self.add_constant(
            vec![ConstantUnion::Int(field_index as i32)],
            Type::scalar(BasicType::Int),
            loc,
        );
        self.binary(op, base, index, ty, loc)
    }

    /// Builds a swizzle; `offsets` are component indices.
    pub fn add_swizzle(&mut self, base: Handle<Node>, offsets: &[u8], loc: SourceLoc) -> Handle<Node> {
        let base_ty = self.ty(base);
        let qualifier = if base_ty.qualifier == Qualifier::Const {
            Qualifier::Const
        } else {
            Qualifier::Temporary
        };
        let ty = Type::new(
            base_ty.basic,
            base_ty.precision,
            qualifier,
            offsets.len() as u8,
            1,
        );

        if let Some(values) = self.constant_values(base) {
            let picked: Option<Vec<_>> = offsets
                .iter()
                .map(|&o| values.get(usize::from(o)).copied())
                .collect();
            if let Some(picked) = picked {
                return self.add_constant(picked, ty, loc);
            }
        }

        let selector = self.add_constant(
            offsets.iter().map(|&o| ConstantUnion::Int(i32::from(o))).collect(),
            Type::vector(BasicType::Int, offsets.len() as u8),
            loc,
        );
        self.binary(Operator::VectorSwizzle, base, selector, ty, loc)
    }

    /// Swizzle component offsets of a `VectorSwizzle` node.
    pub fn swizzle_offsets(&self, node: Handle<Node>) -> Vec<u8> {
        match &self.node(node).kind {
            NodeKind::Binary {
                op: Operator::VectorSwizzle,
                right,
                ..
            } => self
                .constant_values(*right)
                .unwrap_or(&[])
                .iter()
                .map(|v| v.as_i32() as u8)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Builds an `if` statement.
    pub fn add_selection(
        &mut self,
        condition: Handle<Node>,
        true_block: Option<Handle<Node>>,
        false_block: Option<Handle<Node>>,
        loc: SourceLoc,
    ) -> Handle<Node> {
        self.append(
            NodeKind::Selection {
                condition,
                true_block,
                false_block,
                ty: Type::VOID,
            },
            loc,
        )
    }

    /// Builds `condition ? a : b`. Both arms must have the same type.
    pub fn add_ternary(
        &mut self,
        condition: Handle<Node>,
        true_expr: Handle<Node>,
        false_expr: Handle<Node>,
        loc: SourceLoc,
    ) -> Result<Handle<Node>, PromoteError> {
        let true_ty = self.ty(true_expr);
        let false_ty = self.ty(false_expr);
        if !true_ty.same_shape(&false_ty) {
            return Err(PromoteError::TernaryMismatch {
                true_ty: true_ty.to_string(),
                false_ty: false_ty.to_string(),
            });
        }

        let cond = self
            .constant_values(condition)
            .and_then(|v| v.first())
            .map(|v| v.as_bool());
        if let Some(cond) = cond {
            if self.constant_values(true_expr).is_some()
                && self.constant_values(false_expr).is_some()
            {
                return Ok(if cond { true_expr } else { false_expr });
            }
        }

        let mut ty = true_ty;
        ty.precision = true_ty.precision.max(false_ty.precision);
        ty.qualifier = Qualifier::Temporary;
        Ok(self.append(
            NodeKind::Selection {
                condition,
                true_block: Some(true_expr),
                false_block: Some(false_expr),
                ty,
            },
            loc,
        ))
    }

    pub fn add_loop(
        &mut self,
        kind: LoopKind,
        init: Option<Handle<Node>>,
        condition: Option<Handle<Node>>,
        expression: Option<Handle<Node>>,
        body: Option<Handle<Node>>,
        loc: SourceLoc,
    ) -> Handle<Node> {
        self.append(
            NodeKind::Loop {
                kind,
                init,
                condition,
                expression,
                body,
                unroll: false,
            },
            loc,
        )
    }

    pub fn add_branch(
        &mut self,
        kind: BranchKind,
        expression: Option<Handle<Node>>,
        loc: SourceLoc,
    ) -> Handle<Node> {
        self.append(NodeKind::Branch { kind, expression }, loc)
    }

    /// A fresh operator-less aggregate, optionally holding one child.
    pub fn make_aggregate(&mut self, node: Option<Handle<Node>>, loc: SourceLoc) -> Handle<Node> {
        self.aggregate(Operator::Null, node.into_iter().collect(), loc)
    }

    pub fn aggregate(
        &mut self,
        op: Operator,
        children: Vec<Handle<Node>>,
        loc: SourceLoc,
    ) -> Handle<Node> {
        self.append(
            NodeKind::Aggregate {
                op,
                children,
                name: String::new(),
                user_defined: false,
                ty: Type::VOID,
                use_emulated_function: false,
            },
            loc,
        )
    }

    /// Appends `node` to `aggregate`.
    ///
    /// An operator-less aggregate is grown in place; anything else is
    /// wrapped in a new aggregate first.
    pub fn grow_aggregate(
        &mut self,
        aggregate: Option<Handle<Node>>,
        node: Option<Handle<Node>>,
        loc: SourceLoc,
    ) -> Option<Handle<Node>> {
        let target = match aggregate {
            None => {
                let node = node?;
                return Some(self.make_aggregate(Some(node), loc));
            }
            Some(handle) => match &self.node(handle).kind {
                NodeKind::Aggregate {
                    op: Operator::Null, ..
                } => handle,
                _ => self.make_aggregate(Some(handle), loc),
            },
        };
        if let (Some(node), NodeKind::Aggregate { children, .. }) =
            (node, &mut self.node_mut(target).kind)
        {
            children.push(node);
        }
        Some(target)
    }

    /// Gives an aggregate its operator, wrapping non-aggregates first.
    pub fn set_aggregate_operator(
        &mut self,
        node: Option<Handle<Node>>,
        op: Operator,
        loc: SourceLoc,
    ) -> Handle<Node> {
        let target = match node {
            Some(handle)
                if matches!(
                    self.node(handle).kind,
                    NodeKind::Aggregate {
                        op: Operator::Null,
                        ..
                    }
                ) =>
            {
                handle
            }
            other => self.make_aggregate(other, loc),
        };
        if let NodeKind::Aggregate { op: slot, .. } = &mut self.node_mut(target).kind {
            *slot = op;
        }
        self.node_mut(target).loc = loc;
        target
    }

    /// Sets name, result type and user-defined flag of an aggregate.
    pub fn set_aggregate_signature(
        &mut self,
        node: Handle<Node>,
        name: &str,
        ty: Type,
        user_defined: bool,
    ) {
        if let NodeKind::Aggregate {
            name: n,
            ty: t,
            user_defined: u,
            ..
        } = &mut self.node_mut(node).kind
        {
            *n = name.to_string();
            *t = ty;
            *u = user_defined;
        }
    }

    /// Builds `left, right`. Two constants collapse to the right one.
    pub fn add_comma(&mut self, left: Handle<Node>, right: Handle<Node>, loc: SourceLoc) -> Handle<Node> {
        if self.constant_values(left).is_some() && self.constant_values(right).is_some() {
            return right;
        }
        let ty = self.ty(right).with_qualifier(Qualifier::Temporary);
        self.binary(Operator::Comma, left, right, ty, loc)
    }

    pub fn add_function_call(
        &mut self,
        mangled_name: &str,
        args: Vec<Handle<Node>>,
        ret: Type,
        user_defined: bool,
        loc: SourceLoc,
    ) -> Handle<Node> {
        self.append(
            NodeKind::Aggregate {
                op: Operator::FunctionCall,
                children: args,
                name: mangled_name.to_string(),
                user_defined,
                ty: ret.with_qualifier(Qualifier::Temporary),
                use_emulated_function: false,
            },
            loc,
        )
    }

    /// Builds a constructor call, folding it when every argument is constant.
    pub fn add_constructor(
        &mut self,
        op: Operator,
        args: Vec<Handle<Node>>,
        ty: Type,
        loc: SourceLoc,
    ) -> Handle<Node> {
        if let Some(values) = self.fold_constructor(&args, &ty) {
            return self.add_constant(values, ty, loc);
        }
        self.append(
            NodeKind::Aggregate {
                op,
                children: args,
                name: String::new(),
                user_defined: false,
                ty: ty.with_qualifier(Qualifier::Temporary),
                use_emulated_function: false,
            },
            loc,
        )
    }

    fn fold_constructor(&self, args: &[Handle<Node>], ty: &Type) -> Option<Vec<ConstantUnion>> {
        let mut flat = Vec::new();
        let mut arg_types = Vec::with_capacity(args.len());
        for &arg in args {
            flat.extend_from_slice(self.constant_values(arg)?);
            arg_types.push(self.ty(arg));
        }
        let size = self.object_size(ty);

        if ty.is_struct() || ty.is_array() {
            return (flat.len() == size).then_some(flat);
        }
        let cast = |v: ConstantUnion| v.cast(ty.basic);

        // A lone scalar fills a vector or the diagonal of a matrix.
        if args.len() == 1 && arg_types[0].is_scalar() {
            let value = cast(*flat.first()?)?;
            if ty.is_matrix() {
                let zero = ConstantUnion::zero(ty.basic)?;
                let rows = usize::from(ty.rows());
                return Some(
                    (0..size)
                        .map(|i| if i / rows == i % rows { value } else { zero })
                        .collect(),
                );
            }
            return Some(vec![value; size]);
        }

        // A matrix built from a matrix keeps the overlap, identity elsewhere.
        if args.len() == 1 && ty.is_matrix() && arg_types[0].is_matrix() {
            let src = &arg_types[0];
            let (src_cols, src_rows) = (usize::from(src.cols()), usize::from(src.rows()));
            let rows = usize::from(ty.rows());
            let mut out = Vec::with_capacity(size);
            for col in 0..usize::from(ty.cols()) {
                for row in 0..rows {
                    let value = if col < src_cols && row < src_rows {
                        cast(flat[col * src_rows + row])?
                    } else if col == row {
                        ConstantUnion::Float(1.0)
                    } else {
                        ConstantUnion::Float(0.0)
                    };
                    out.push(value);
                }
            }
            return Some(out);
        }

        if flat.len() < size {
            return None;
        }
        flat.into_iter().take(size).map(cast).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Precision;

    fn float_const(ast: &mut Ast, v: f32) -> Handle<Node> {
        ast.add_constant(
            vec![ConstantUnion::Float(v)],
            Type::scalar(BasicType::Float),
            SourceLoc::default(),
        )
    }

    #[test]
    fn one_over_zero_folds_with_warning() {
        let mut ast = Ast::new();
        let mut diags = Diagnostics::new();
        let one = float_const(&mut ast, 1.0);
        let zero = float_const(&mut ast, 0.0);
        let div = ast
            .add_binary_math(Operator::Div, one, zero, SourceLoc::new(0, 1), &mut diags)
            .unwrap();
        assert_eq!(
            ast.constant_values(div),
            Some(&[ConstantUnion::Float(f32::MAX)][..])
        );
        assert_eq!(diags.warning_count(), 1);
        assert_eq!(diags.error_count(), 0);
        assert_eq!(
            diags.info_log(),
            "WARNING: 0:1: Divide by zero error during constant folding\n"
        );
    }

    #[test]
    fn non_constant_operands_build_binary_node() {
        let mut ast = Ast::new();
        let mut diags = Diagnostics::new();
        let x = ast.add_symbol(
            1,
            "x",
            Type::vector(BasicType::Float, 3).with_precision(Precision::Medium),
            SourceLoc::default(),
        );
        let two = float_const(&mut ast, 2.0);
        let mul = ast
            .add_binary_math(Operator::Mul, x, two, SourceLoc::default(), &mut diags)
            .unwrap();
        assert_eq!(ast.node(mul).op(), Some(Operator::VectorTimesScalar));
        assert_eq!(ast.ty(mul).precision, Precision::Medium);
    }

    #[test]
    fn constant_swizzle_and_index_fold() {
        let mut ast = Ast::new();
        let v = ast.add_constant(
            vec![
                ConstantUnion::Float(1.0),
                ConstantUnion::Float(2.0),
                ConstantUnion::Float(3.0),
            ],
            Type::vector(BasicType::Float, 3),
            SourceLoc::default(),
        );
        let zx = ast.add_swizzle(v, &[2, 0], SourceLoc::default());
        assert_eq!(
            ast.constant_values(zx),
            Some(&[ConstantUnion::Float(3.0), ConstantUnion::Float(1.0)][..])
        );
        let one = ast.add_constant(
            vec![ConstantUnion::Int(1)],
            Type::scalar(BasicType::Int),
            SourceLoc::default(),
        );
        let elem = ast.add_index(v, one, SourceLoc::default());
        assert_eq!(
            ast.constant_values(elem),
            Some(&[ConstantUnion::Float(2.0)][..])
        );
    }

    #[test]
    fn indirect_index_on_uniform_keeps_qualifier() {
        let mut ast = Ast::new();
        let arr = ast.add_symbol(
            1,
            "u",
            Type::vector(BasicType::Float, 4)
                .with_array(4)
                .with_qualifier(Qualifier::Uniform),
            SourceLoc::default(),
        );
        let i = ast.add_symbol(2, "i", Type::scalar(BasicType::Int), SourceLoc::default());
        let idx = ast.add_index(arr, i, SourceLoc::default());
        assert_eq!(ast.node(idx).op(), Some(Operator::IndexIndirect));
        let ty = ast.ty(idx);
        assert_eq!(ty.qualifier, Qualifier::Uniform);
        assert!(ty.is_vector());
        assert!(!ty.is_array());
    }

    #[test]
    fn constructor_folding() {
        let mut ast = Ast::new();
        let two = float_const(&mut ast, 2.0);
        let m = ast.add_constructor(
            Operator::ConstructMat2,
            vec![two],
            Type::matrix(2, 2),
            SourceLoc::default(),
        );
        let f = |v| ConstantUnion::Float(v);
        assert_eq!(
            ast.constant_values(m),
            Some(&[f(2.0), f(0.0), f(0.0), f(2.0)][..])
        );

        let v = ast.add_constructor(
            Operator::ConstructVec3,
            vec![two],
            Type::vector(BasicType::Float, 3),
            SourceLoc::default(),
        );
        assert_eq!(ast.constant_values(v), Some(&[f(2.0), f(2.0), f(2.0)][..]));

        let i = ast.add_constructor(
            Operator::ConstructInt,
            vec![v],
            Type::scalar(BasicType::Int),
            SourceLoc::default(),
        );
        assert_eq!(ast.constant_values(i), Some(&[ConstantUnion::Int(2)][..]));
    }

    #[test]
    fn grow_and_set_operator() {
        let mut ast = Ast::new();
        let a = float_const(&mut ast, 1.0);
        let b = float_const(&mut ast, 2.0);
        let seq = ast.grow_aggregate(None, Some(a), SourceLoc::default());
        let seq = ast.grow_aggregate(seq, Some(b), SourceLoc::default());
        let seq = ast.set_aggregate_operator(seq, Operator::Sequence, SourceLoc::default());
        assert_eq!(ast.node(seq).op(), Some(Operator::Sequence));
        assert_eq!(ast.children(seq), vec![a, b]);

        // A named aggregate is wrapped rather than grown.
        let outer = ast.grow_aggregate(Some(seq), Some(a), SourceLoc::default());
        assert_eq!(outer.map(|h| ast.children(h)), Some(vec![seq, a]));
    }

    #[test]
    fn ternary_with_constant_arms_folds() {
        let mut ast = Ast::new();
        let t = ast.add_constant(
            vec![ConstantUnion::Bool(false)],
            Type::BOOL,
            SourceLoc::default(),
        );
        let a = float_const(&mut ast, 1.0);
        let b = float_const(&mut ast, 2.0);
        assert_eq!(ast.add_ternary(t, a, b, SourceLoc::default()), Ok(b));
    }
}
