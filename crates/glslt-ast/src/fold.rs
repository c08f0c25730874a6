//! Constant folding of operator nodes whose operands are all constants.
//!
//! Matrices are stored column-major: component `(col, row)` of a matrix
//! with `rows` rows lives at `col * rows + row`.

use crate::constant::ConstantUnion;
use crate::operator::Operator;
use crate::types::{BasicType, Qualifier, Type};

pub const DIVIDE_BY_ZERO_WARNING: &str = "Divide by zero error during constant folding";

/// A constant operand: its flattened components and its type.
#[derive(Clone, Copy, Debug)]
pub struct ConstOperand<'a> {
    pub values: &'a [ConstantUnion],
    pub ty: &'a Type,
}

/// The result of a successful fold.
#[derive(Clone, Debug, PartialEq)]
pub struct Folded {
    pub values: Vec<ConstantUnion>,
    pub ty: Type,
    /// Non-fatal problems found while folding.
    pub warnings: Vec<String>,
}

/// Folds a unary operator. Increments are never folded.
pub fn fold_unary(op: Operator, operand: ConstOperand<'_>, result_ty: &Type) -> Option<Folded> {
    let values = operand
        .values
        .iter()
        .map(|&v| match (op, v) {
            (Operator::Negative, ConstantUnion::Float(f)) => Some(ConstantUnion::Float(-f)),
            (Operator::Negative, ConstantUnion::Int(i)) => Some(ConstantUnion::Int(i.wrapping_neg())),
            (Operator::Negative, ConstantUnion::UInt(u)) => {
                Some(ConstantUnion::UInt(u.wrapping_neg()))
            }
            (Operator::Positive, v) if v.basic_type() != BasicType::Bool => Some(v),
            (Operator::LogicalNot, ConstantUnion::Bool(b)) => Some(ConstantUnion::Bool(!b)),
            (Operator::BitwiseNot, ConstantUnion::Int(i)) => Some(ConstantUnion::Int(!i)),
            (Operator::BitwiseNot, ConstantUnion::UInt(u)) => Some(ConstantUnion::UInt(!u)),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(Folded {
        values,
        ty: result_ty.with_qualifier(Qualifier::Const),
        warnings: Vec::new(),
    })
}

/// Folds a binary operator after promotion has refined `op` and typed the
/// result as `result_ty`.
pub fn fold_binary(
    op: Operator,
    left: ConstOperand<'_>,
    right: ConstOperand<'_>,
    result_ty: &Type,
) -> Option<Folded> {
    let mut warnings = Vec::new();
    let result_ty = result_ty.with_qualifier(Qualifier::Const);

    let values = match op {
        Operator::MatrixTimesMatrix => {
            let (left_cols, left_rows) = (left.ty.cols() as usize, left.ty.rows() as usize);
            let (right_cols, right_rows) = (right.ty.cols() as usize, right.ty.rows() as usize);
            let mut out = vec![ConstantUnion::Float(0.0); right_cols * left_rows];
            for row in 0..left_rows {
                for col in 0..right_cols {
                    let mut sum = 0.0f32;
                    for i in 0..left_cols {
                        sum += floats(left.values, i * left_rows + row)?
                            * floats(right.values, col * right_rows + i)?;
                    }
                    out[left_rows * col + row] = ConstantUnion::Float(sum);
                }
            }
            out
        }
        Operator::MatrixTimesVector => {
            let (cols, rows) = (left.ty.cols() as usize, left.ty.rows() as usize);
            let mut out = Vec::with_capacity(rows);
            for row in 0..rows {
                let mut sum = 0.0f32;
                for col in 0..cols {
                    sum += floats(left.values, col * rows + row)? * floats(right.values, col)?;
                }
                out.push(ConstantUnion::Float(sum));
            }
            out
        }
        Operator::VectorTimesMatrix => {
            let (cols, rows) = (right.ty.cols() as usize, right.ty.rows() as usize);
            let mut out = Vec::with_capacity(cols);
            for col in 0..cols {
                let mut sum = 0.0f32;
                for row in 0..rows {
                    sum += floats(left.values, row)? * floats(right.values, col * rows + row)?;
                }
                out.push(ConstantUnion::Float(sum));
            }
            out
        }
        Operator::Equal | Operator::NotEqual => {
            let equal = left.values.len() == right.values.len()
                && left.values.iter().zip(right.values).all(|(a, b)| a == b);
            vec![ConstantUnion::Bool(equal == (op == Operator::Equal))]
        }
        Operator::LessThan
        | Operator::GreaterThan
        | Operator::LessThanEqual
        | Operator::GreaterThanEqual => {
            let (&a, &b) = (left.values.first()?, right.values.first()?);
            let ordering = a.compare(b);
            let result = match op {
                Operator::LessThan => ordering == Some(std::cmp::Ordering::Less),
                Operator::GreaterThan => ordering == Some(std::cmp::Ordering::Greater),
                Operator::LessThanEqual => {
                    matches!(ordering, Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal))
                }
                _ => matches!(
                    ordering,
                    Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
                ),
            };
            vec![ConstantUnion::Bool(result)]
        }
        _ => {
            let (lhs, rhs) = broadcast(left.values, right.values)?;
            let mut out = Vec::with_capacity(lhs.len());
            for (&a, &b) in lhs.iter().zip(&rhs) {
                out.push(componentwise(op, a, b, &mut warnings)?);
            }
            out
        }
    };

    if !warnings.is_empty() {
        log::warn!("{DIVIDE_BY_ZERO_WARNING}");
    }
    Some(Folded {
        values,
        ty: result_ty,
        warnings,
    })
}

fn floats(values: &[ConstantUnion], index: usize) -> Option<f32> {
    match values.get(index)? {
        ConstantUnion::Float(f) => Some(*f),
        _ => None,
    }
}

/// Expands a single-component side to the other side's length.
fn broadcast(
    left: &[ConstantUnion],
    right: &[ConstantUnion],
) -> Option<(Vec<ConstantUnion>, Vec<ConstantUnion>)> {
    match (left.len(), right.len()) {
        (l, r) if l == r => Some((left.to_vec(), right.to_vec())),
        (1, r) => Some((vec![left[0]; r], right.to_vec())),
        (l, 1) => Some((left.to_vec(), vec![right[0]; l])),
        _ => None,
    }
}

fn componentwise(
    op: Operator,
    a: ConstantUnion,
    b: ConstantUnion,
    warnings: &mut Vec<String>,
) -> Option<ConstantUnion> {
    match op {
        Operator::Add => a.add(b),
        Operator::Sub => a.sub(b),
        Operator::Mul | Operator::VectorTimesScalar | Operator::MatrixTimesScalar => a.mul(b),
        Operator::Div | Operator::IMod => divide(op, a, b, warnings),
        Operator::LogicalAnd => Some(ConstantUnion::Bool(bools(a)? && bools(b)?)),
        Operator::LogicalOr => Some(ConstantUnion::Bool(bools(a)? || bools(b)?)),
        Operator::LogicalXor => Some(ConstantUnion::Bool(bools(a)? != bools(b)?)),
        Operator::BitwiseAnd => a.bit_and(b),
        Operator::BitwiseOr => a.bit_or(b),
        Operator::BitwiseXor => a.bit_xor(b),
        Operator::BitShiftLeft => a.shl(b),
        Operator::BitShiftRight => a.shr(b),
        _ => None,
    }
}

fn bools(value: ConstantUnion) -> Option<bool> {
    match value {
        ConstantUnion::Bool(b) => Some(b),
        _ => None,
    }
}

/// Division and modulo. A zero divisor yields the type's extreme value
/// (float: ±max by the dividend's sign; int and uint: max) and a warning.
fn divide(
    op: Operator,
    a: ConstantUnion,
    b: ConstantUnion,
    warnings: &mut Vec<String>,
) -> Option<ConstantUnion> {
    if b.is_zero() {
        let substitute = match a {
            ConstantUnion::Float(f) => {
                ConstantUnion::Float(if f < 0.0 { -f32::MAX } else { f32::MAX })
            }
            ConstantUnion::Int(_) => ConstantUnion::Int(i32::MAX),
            ConstantUnion::UInt(_) => ConstantUnion::UInt(u32::MAX),
            ConstantUnion::Bool(_) => return None,
        };
        if a.basic_type() != b.basic_type() {
            return None;
        }
        warnings.push(DIVIDE_BY_ZERO_WARNING.to_string());
        return Some(substitute);
    }
    match (op, a, b) {
        (Operator::Div, ConstantUnion::Float(x), ConstantUnion::Float(y)) => {
            Some(ConstantUnion::Float(x / y))
        }
        (Operator::Div, ConstantUnion::Int(x), ConstantUnion::Int(y)) => {
            Some(ConstantUnion::Int(x.wrapping_div(y)))
        }
        (Operator::Div, ConstantUnion::UInt(x), ConstantUnion::UInt(y)) => {
            Some(ConstantUnion::UInt(x / y))
        }
        (Operator::IMod, ConstantUnion::Int(x), ConstantUnion::Int(y)) => {
            Some(ConstantUnion::Int(x.wrapping_rem(y)))
        }
        (Operator::IMod, ConstantUnion::UInt(x), ConstantUnion::UInt(y)) => {
            Some(ConstantUnion::UInt(x % y))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promote::promote_binary;
    use proptest::prelude::*;

    fn floats_of(values: &[f32]) -> Vec<ConstantUnion> {
        values.iter().map(|&f| ConstantUnion::Float(f)).collect()
    }

    fn fold(
        op: Operator,
        lv: &[ConstantUnion],
        lt: Type,
        rv: &[ConstantUnion],
        rt: Type,
    ) -> Folded {
        let lt = lt.with_qualifier(Qualifier::Const);
        let rt = rt.with_qualifier(Qualifier::Const);
        let (op, ty) = promote_binary(op, &lt, &rt).unwrap();
        fold_binary(
            op,
            ConstOperand { values: lv, ty: &lt },
            ConstOperand { values: rv, ty: &rt },
            &ty,
        )
        .unwrap()
    }

    #[test]
    fn float_divide_by_zero_substitutes_max() {
        let one = floats_of(&[1.0]);
        let zero = floats_of(&[0.0]);
        let f = Type::scalar(BasicType::Float);
        let folded = fold(Operator::Div, &one, f, &zero, f);
        assert_eq!(folded.values, vec![ConstantUnion::Float(f32::MAX)]);
        assert_eq!(folded.warnings, vec![DIVIDE_BY_ZERO_WARNING.to_string()]);

        let minus = floats_of(&[-2.0]);
        let folded = fold(Operator::Div, &minus, f, &zero, f);
        assert_eq!(folded.values, vec![ConstantUnion::Float(-f32::MAX)]);
    }

    #[test]
    fn integer_divide_by_zero_sentinels() {
        let i = Type::scalar(BasicType::Int);
        let folded = fold(
            Operator::Div,
            &[ConstantUnion::Int(-7)],
            i,
            &[ConstantUnion::Int(0)],
            i,
        );
        assert_eq!(folded.values, vec![ConstantUnion::Int(i32::MAX)]);

        let u = Type::scalar(BasicType::UInt);
        let folded = fold(
            Operator::IMod,
            &[ConstantUnion::UInt(7)],
            u,
            &[ConstantUnion::UInt(0)],
            u,
        );
        assert_eq!(folded.values, vec![ConstantUnion::UInt(u32::MAX)]);
        assert_eq!(folded.warnings.len(), 1);
    }

    #[test]
    fn scalar_broadcast_on_either_side() {
        let f = Type::scalar(BasicType::Float);
        let v3 = Type::vector(BasicType::Float, 3);
        let folded = fold(
            Operator::Sub,
            &floats_of(&[10.0]),
            f,
            &floats_of(&[1.0, 2.0, 3.0]),
            v3,
        );
        assert_eq!(folded.values, floats_of(&[9.0, 8.0, 7.0]));
        assert!(folded.ty.same_shape(&v3));
    }

    #[test]
    fn matrix_times_vector_contracts_columns() {
        // mat2 columns (1,2) and (3,4): [[1,3],[2,4]] * (5,6) = (23, 34)
        let folded = fold(
            Operator::Mul,
            &floats_of(&[1.0, 2.0, 3.0, 4.0]),
            Type::matrix(2, 2),
            &floats_of(&[5.0, 6.0]),
            Type::vector(BasicType::Float, 2),
        );
        assert_eq!(folded.values, floats_of(&[23.0, 34.0]));
    }

    #[test]
    fn vector_times_matrix_dots_each_column() {
        // (5,6) * [[1,3],[2,4]] = (5*1+6*2, 5*3+6*4) = (17, 39)
        let folded = fold(
            Operator::Mul,
            &floats_of(&[5.0, 6.0]),
            Type::vector(BasicType::Float, 2),
            &floats_of(&[1.0, 2.0, 3.0, 4.0]),
            Type::matrix(2, 2),
        );
        assert_eq!(folded.values, floats_of(&[17.0, 39.0]));
    }

    #[test]
    fn equality_over_all_components() {
        let v2 = Type::vector(BasicType::Float, 2);
        let folded = fold(
            Operator::NotEqual,
            &floats_of(&[1.0, 2.0]),
            v2,
            &floats_of(&[1.0, 3.0]),
            v2,
        );
        assert_eq!(folded.values, vec![ConstantUnion::Bool(true)]);
        assert_eq!(folded.ty.basic, BasicType::Bool);
    }

    fn small() -> impl Strategy<Value = f32> {
        (-64i32..64).prop_map(|v| v as f32 * 0.5)
    }

    /// Direct evaluation of `m * n` for column-major matrices.
    fn reference_matmul(m: &[f32], m_cols: usize, m_rows: usize, n: &[f32], n_cols: usize) -> Vec<f32> {
        let mut out = vec![0.0; n_cols * m_rows];
        for c in 0..n_cols {
            for r in 0..m_rows {
                out[c * m_rows + r] = (0..m_cols).map(|k| m[k * m_rows + r] * n[c * m_cols + k]).sum();
            }
        }
        out
    }

    proptest! {
        #[test]
        fn prop_matrix_product_matches_reference(
            cols in 2u8..=4,
            rows in 2u8..=4,
            inner in 2u8..=4,
            seed in proptest::collection::vec(small(), 32),
        ) {
            let (c, r, k) = (cols as usize, rows as usize, inner as usize);
            let left = &seed[..k * r];
            let right = &seed[16..16 + c * k];
            let folded = fold(
                Operator::Mul,
                &floats_of(left),
                Type::matrix(inner, rows),
                &floats_of(right),
                Type::matrix(cols, inner),
            );
            prop_assert_eq!(folded.values, floats_of(&reference_matmul(left, k, r, right, c)));
            prop_assert!(folded.ty.same_shape(&Type::matrix(cols, rows)));
        }

        #[test]
        fn prop_vector_scalar_broadcast(
            v in proptest::collection::vec(small(), 2..=4),
            s in small(),
        ) {
            let n = v.len() as u8;
            let folded = fold(
                Operator::Mul,
                &floats_of(&v),
                Type::vector(BasicType::Float, n),
                &floats_of(&[s]),
                Type::scalar(BasicType::Float),
            );
            let expected: Vec<f32> = v.iter().map(|x| x * s).collect();
            prop_assert_eq!(folded.values, floats_of(&expected));
        }

        #[test]
        fn prop_int_add_matches_wrapping(a in any::<i32>(), b in any::<i32>()) {
            let i = Type::scalar(BasicType::Int);
            let folded = fold(Operator::Add, &[ConstantUnion::Int(a)], i, &[ConstantUnion::Int(b)], i);
            prop_assert_eq!(folded.values, vec![ConstantUnion::Int(a.wrapping_add(b))]);
        }
    }
}
