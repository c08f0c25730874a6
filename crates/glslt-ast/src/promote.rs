//! Result-type derivation for operator nodes.
//!
//! Shading-language operators never convert implicitly: both operands of a
//! binary operator share one basic type, and the operator itself is refined
//! (`*` becomes matrix-times-vector and friends) from the operand shapes.

use crate::error::PromoteError;
use crate::operator::Operator;
use crate::types::{BasicType, Precision, Qualifier, Type};

/// Derives the result type of a unary operator.
pub fn promote_unary(op: Operator, operand: &Type) -> Result<Type, PromoteError> {
    let reject = || PromoteError::NoUnaryOperation {
        op,
        operand: operand.to_string(),
    };
    if operand.is_array() || operand.is_struct() || !operand.basic.is_scalar_kind() {
        return Err(reject());
    }
    match op {
        Operator::LogicalNot => {
            if operand.basic != BasicType::Bool || !operand.is_scalar() {
                return Err(reject());
            }
        }
        Operator::BitwiseNot => {
            if !operand.basic.is_integer() {
                return Err(reject());
            }
        }
        Operator::Negative
        | Operator::Positive
        | Operator::PostIncrement
        | Operator::PostDecrement
        | Operator::PreIncrement
        | Operator::PreDecrement => {
            if operand.basic == BasicType::Bool {
                return Err(reject());
            }
        }
        _ => return Err(reject()),
    }

    let mut ty = *operand;
    ty.layout = Default::default();
    ty.invariant = false;
    ty.qualifier = if operand.qualifier == Qualifier::Const && !op.is_increment() {
        Qualifier::Const
    } else {
        Qualifier::Temporary
    };
    Ok(ty)
}

/// Derives the result type of a binary operator and refines the operator.
///
/// Indexing, swizzles and the comma operator are typed by the builder, not
/// here.
pub fn promote_binary(
    op: Operator,
    left: &Type,
    right: &Type,
) -> Result<(Operator, Type), PromoteError> {
    let no_operation = || PromoteError::NoOperation {
        op,
        left: left.to_string(),
        right: right.to_string(),
    };

    if left.is_array() || right.is_array() {
        // Whole-array assignment and comparison are ES3 features.
        let whole_array_ok = matches!(
            op,
            Operator::Assign | Operator::Initialize | Operator::Equal | Operator::NotEqual
        ) && left.same_shape(right);
        if !whole_array_ok {
            return Err(PromoteError::ArrayOperand { op });
        }
    }
    if left.basic != right.basic && !op.is_shift() {
        return Err(PromoteError::BasicTypeMismatch {
            op,
            left: left.to_string(),
            right: right.to_string(),
        });
    }

    let basic = left.basic;
    let precision = left.precision.max(right.precision);
    let both_const = left.qualifier == Qualifier::Const && right.qualifier == Qualifier::Const;
    let temp = |primary: u8, secondary: u8| {
        Type::new(basic, precision, Qualifier::Temporary, primary, secondary)
    };

    // Structs and opaque kinds only support assignment and equality.
    let plain = basic.is_scalar_kind();
    let structured = matches!(basic, BasicType::Struct);
    if !plain {
        let allowed = structured
            && matches!(
                op,
                Operator::Assign | Operator::Initialize | Operator::Equal | Operator::NotEqual
            )
            && left.structure == right.structure;
        if !allowed {
            return Err(no_operation());
        }
        let ty = if op.is_comparison() {
            Type::BOOL
        } else {
            let mut ty = *left;
            ty.qualifier = Qualifier::Temporary;
            ty
        };
        return Ok((op, ty));
    }

    let arithmetic = matches!(
        op,
        Operator::Add
            | Operator::Sub
            | Operator::Mul
            | Operator::Div
            | Operator::AddAssign
            | Operator::SubAssign
            | Operator::MulAssign
            | Operator::DivAssign
    );
    if arithmetic && basic == BasicType::Bool {
        return Err(no_operation());
    }
    if op.is_logical() && (basic != BasicType::Bool || !left.is_scalar() || !right.is_scalar()) {
        return Err(no_operation());
    }
    if op.is_relational() && (!left.is_scalar() || !right.is_scalar() || basic == BasicType::Bool)
    {
        return Err(no_operation());
    }
    let integer_only = op.is_bitwise() || matches!(op, Operator::IMod | Operator::IModAssign);
    if integer_only && (!left.basic.is_integer() || !right.basic.is_integer()) {
        return Err(no_operation());
    }
    if (left.is_matrix() || right.is_matrix()) && integer_only {
        return Err(no_operation());
    }

    let nominal = left.nominal_size().max(right.nominal_size());
    let mut result = *left;
    result.layout = Default::default();
    result.invariant = false;
    result.precision = precision;
    if !both_const {
        result.qualifier = Qualifier::Temporary;
    }

    // All scalars.
    if nominal == 1 && !left.is_array() {
        if op.is_comparison() || op.is_logical() {
            let mut ty = Type::BOOL;
            if both_const {
                ty.qualifier = Qualifier::Const;
            }
            return Ok((op, ty));
        }
        return Ok((op, result));
    }

    let mut refined = op;
    match op {
        Operator::Mul => {
            if !left.is_matrix() && right.is_matrix() {
                if left.is_vector() {
                    refined = Operator::VectorTimesMatrix;
                    result = temp(right.cols(), 1);
                } else {
                    refined = Operator::MatrixTimesScalar;
                    result = temp(right.cols(), right.rows());
                }
            } else if left.is_matrix() && !right.is_matrix() {
                if right.is_vector() {
                    refined = Operator::MatrixTimesVector;
                    result = temp(left.rows(), 1);
                } else {
                    refined = Operator::MatrixTimesScalar;
                }
            } else if left.is_matrix() && right.is_matrix() {
                refined = Operator::MatrixTimesMatrix;
                result = temp(right.cols(), left.rows());
            } else if left.is_vector() != right.is_vector() {
                refined = Operator::VectorTimesScalar;
                result = temp(nominal, 1);
            }
            if !valid_multiplication(refined, left, right) {
                return Err(PromoteError::DimensionMismatch { op });
            }
        }
        Operator::MulAssign => {
            if !left.is_matrix() && right.is_matrix() {
                if !left.is_vector() {
                    return Err(no_operation());
                }
                refined = Operator::VectorTimesMatrixAssign;
            } else if left.is_matrix() && !right.is_matrix() {
                if right.is_vector() {
                    return Err(no_operation());
                }
                refined = Operator::MatrixTimesScalarAssign;
            } else if left.is_matrix() && right.is_matrix() {
                refined = Operator::MatrixTimesMatrixAssign;
                result = temp(right.cols(), left.rows());
            } else if left.is_vector() != right.is_vector() {
                if !left.is_vector() {
                    return Err(no_operation());
                }
                refined = Operator::VectorTimesScalarAssign;
                result = temp(left.nominal_size(), 1);
            }
            if !valid_multiplication(refined, left, right) {
                return Err(PromoteError::DimensionMismatch { op });
            }
        }
        Operator::Assign
        | Operator::Initialize
        | Operator::Add
        | Operator::Sub
        | Operator::Div
        | Operator::IMod
        | Operator::AddAssign
        | Operator::SubAssign
        | Operator::DivAssign
        | Operator::IModAssign
        | Operator::BitwiseAnd
        | Operator::BitwiseXor
        | Operator::BitwiseOr
        | Operator::BitwiseAndAssign
        | Operator::BitwiseXorAssign
        | Operator::BitwiseOrAssign => {
            if (left.is_matrix() && right.is_vector()) || (left.is_vector() && right.is_matrix()) {
                return Err(no_operation());
            }
            let same_size = left.primary_size == right.primary_size
                && left.secondary_size == right.secondary_size;
            if !same_size {
                let scalar_side_ok = if op.is_assignment() {
                    // The written value keeps the left shape.
                    op != Operator::Assign && op != Operator::Initialize && right.is_scalar()
                } else {
                    left.is_scalar() || right.is_scalar()
                };
                if !scalar_side_ok {
                    return Err(PromoteError::DimensionMismatch { op });
                }
            }
            let secondary = left.secondary_size.max(right.secondary_size);
            result = temp(nominal, secondary);
            result.array_size = left.array_size;
            result.structure = left.structure;
        }
        Operator::BitShiftLeft
        | Operator::BitShiftRight
        | Operator::BitShiftLeftAssign
        | Operator::BitShiftRightAssign => {
            // The shift amount is a scalar or matches the value's size.
            if !(right.is_scalar() || right.primary_size == left.primary_size) {
                return Err(PromoteError::DimensionMismatch { op });
            }
            result = temp(left.nominal_size(), 1);
            result.basic = left.basic;
        }
        Operator::Equal | Operator::NotEqual => {
            if left.primary_size != right.primary_size
                || left.secondary_size != right.secondary_size
            {
                return Err(PromoteError::DimensionMismatch { op });
            }
            result = Type::BOOL;
        }
        _ => return Err(no_operation()),
    }

    if both_const && !refined.is_assignment() {
        result.qualifier = Qualifier::Const;
    }
    Ok((refined, result))
}

fn valid_multiplication(op: Operator, left: &Type, right: &Type) -> bool {
    match op {
        Operator::Mul | Operator::MulAssign => {
            left.primary_size == right.primary_size && left.secondary_size == right.secondary_size
        }
        Operator::VectorTimesScalar
        | Operator::VectorTimesScalarAssign
        | Operator::MatrixTimesScalar
        | Operator::MatrixTimesScalarAssign => true,
        Operator::VectorTimesMatrix => left.nominal_size() == right.rows(),
        Operator::VectorTimesMatrixAssign => {
            left.nominal_size() == right.rows() && left.nominal_size() == right.cols()
        }
        Operator::MatrixTimesVector => left.cols() == right.nominal_size(),
        Operator::MatrixTimesMatrix => left.cols() == right.rows(),
        Operator::MatrixTimesMatrixAssign => {
            left.cols() == right.cols() && left.rows() == right.rows()
        }
        _ => false,
    }
}

/// Precision of a built-in call result: the highest argument precision.
pub fn higher_precision(types: impl IntoIterator<Item = Type>) -> Precision {
    types
        .into_iter()
        .map(|ty| ty.precision)
        .max()
        .unwrap_or(Precision::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec(n: u8) -> Type {
        Type::vector(BasicType::Float, n)
    }

    fn float() -> Type {
        Type::scalar(BasicType::Float)
    }

    #[test]
    fn vector_times_scalar_either_side() {
        let (op, ty) = promote_binary(Operator::Mul, &vec(3), &float()).unwrap();
        assert_eq!(op, Operator::VectorTimesScalar);
        assert!(ty.same_shape(&vec(3)));

        let (op, ty) = promote_binary(Operator::Mul, &float(), &vec(4)).unwrap();
        assert_eq!(op, Operator::VectorTimesScalar);
        assert!(ty.same_shape(&vec(4)));
    }

    #[test]
    fn matrix_products_conjugate_shapes() {
        // mat3x2 (3 columns, 2 rows) * vec3 -> vec2
        let (op, ty) = promote_binary(Operator::Mul, &Type::matrix(3, 2), &vec(3)).unwrap();
        assert_eq!(op, Operator::MatrixTimesVector);
        assert!(ty.same_shape(&vec(2)));

        // vec2 * mat3x2 -> vec3
        let (op, ty) = promote_binary(Operator::Mul, &vec(2), &Type::matrix(3, 2)).unwrap();
        assert_eq!(op, Operator::VectorTimesMatrix);
        assert!(ty.same_shape(&vec(3)));

        // mat2x3 * mat3x2 -> mat3x3
        let (op, ty) =
            promote_binary(Operator::Mul, &Type::matrix(2, 3), &Type::matrix(3, 2)).unwrap();
        assert_eq!(op, Operator::MatrixTimesMatrix);
        assert!(ty.same_shape(&Type::matrix(3, 3)));

        assert!(promote_binary(Operator::Mul, &Type::matrix(2, 2), &vec(3)).is_err());
    }

    #[test]
    fn comparisons_narrow_to_bool() {
        let (_, ty) = promote_binary(Operator::LessThan, &float(), &float()).unwrap();
        assert_eq!(ty.basic, BasicType::Bool);
        let (_, ty) = promote_binary(Operator::Equal, &vec(2), &vec(2)).unwrap();
        assert!(ty.is_scalar());
        assert_eq!(ty.basic, BasicType::Bool);
        assert!(promote_binary(Operator::LessThan, &vec(2), &vec(2)).is_err());
    }

    #[test]
    fn assignment_requires_matching_dimensions() {
        assert!(promote_binary(Operator::Assign, &vec(3), &vec(3)).is_ok());
        assert!(promote_binary(Operator::Assign, &vec(3), &float()).is_err());
        assert!(promote_binary(Operator::AddAssign, &vec(3), &float()).is_ok());
        assert!(promote_binary(Operator::AddAssign, &float(), &vec(3)).is_err());
        assert!(promote_binary(Operator::Add, &float(), &vec(3)).is_ok());
        assert!(promote_binary(Operator::Add, &vec(2), &vec(3)).is_err());
    }

    #[test]
    fn no_implicit_conversion() {
        let int = Type::scalar(BasicType::Int);
        assert!(matches!(
            promote_binary(Operator::Add, &float(), &int),
            Err(PromoteError::BasicTypeMismatch { .. })
        ));
    }

    #[test]
    fn precision_and_constness() {
        let a = float().with_precision(Precision::Low).with_qualifier(Qualifier::Const);
        let b = float().with_precision(Precision::High).with_qualifier(Qualifier::Const);
        let (_, ty) = promote_binary(Operator::Add, &a, &b).unwrap();
        assert_eq!(ty.precision, Precision::High);
        assert_eq!(ty.qualifier, Qualifier::Const);

        let c = float().with_qualifier(Qualifier::Uniform);
        let (_, ty) = promote_binary(Operator::Add, &a, &c).unwrap();
        assert_eq!(ty.qualifier, Qualifier::Temporary);
    }

    #[test]
    fn logical_ops_need_bool_scalars() {
        let b = Type::BOOL;
        assert!(promote_binary(Operator::LogicalAnd, &b, &b).is_ok());
        assert!(promote_binary(Operator::LogicalAnd, &float(), &float()).is_err());
        assert!(promote_unary(Operator::LogicalNot, &float()).is_err());
        assert!(promote_unary(Operator::Negative, &b).is_err());
        assert!(promote_unary(Operator::Negative, &vec(2)).is_ok());
    }

    #[test]
    fn arrays_rejected_for_arithmetic() {
        let arr = float().with_array(3);
        assert!(matches!(
            promote_binary(Operator::Add, &arr, &arr),
            Err(PromoteError::ArrayOperand { .. })
        ));
    }
}
