//! Operators carried by unary, binary and aggregate nodes.

use std::fmt;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Operator {
    /// Aggregate under construction, not yet given an operator.
    Null,
    /// Statement list or scope.
    Sequence,
    FunctionCall,
    /// Function definition: children are the parameter list and the body.
    Function,
    Parameters,
    Prototype,
    Declaration,
    InvariantDeclaration,

    // unary
    Negative,
    Positive,
    LogicalNot,
    BitwiseNot,
    PostIncrement,
    PostDecrement,
    PreIncrement,
    PreDecrement,

    // binary arithmetic
    Add,
    Sub,
    Mul,
    Div,
    IMod,
    VectorTimesScalar,
    VectorTimesMatrix,
    MatrixTimesVector,
    MatrixTimesScalar,
    MatrixTimesMatrix,

    // comparison and logic
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    LogicalAnd,
    LogicalOr,
    LogicalXor,

    // bitwise
    BitShiftLeft,
    BitShiftRight,
    BitwiseAnd,
    BitwiseXor,
    BitwiseOr,

    // indexing
    IndexDirect,
    IndexIndirect,
    IndexDirectStruct,
    IndexDirectInterfaceBlock,
    VectorSwizzle,

    Comma,

    // assignment
    Assign,
    Initialize,
    AddAssign,
    SubAssign,
    MulAssign,
    VectorTimesMatrixAssign,
    VectorTimesScalarAssign,
    MatrixTimesScalarAssign,
    MatrixTimesMatrixAssign,
    DivAssign,
    IModAssign,
    BitShiftLeftAssign,
    BitShiftRightAssign,
    BitwiseAndAssign,
    BitwiseXorAssign,
    BitwiseOrAssign,

    // constructors
    ConstructFloat,
    ConstructInt,
    ConstructUInt,
    ConstructBool,
    ConstructVec2,
    ConstructVec3,
    ConstructVec4,
    ConstructBVec2,
    ConstructBVec3,
    ConstructBVec4,
    ConstructIVec2,
    ConstructIVec3,
    ConstructIVec4,
    ConstructUVec2,
    ConstructUVec3,
    ConstructUVec4,
    ConstructMat2,
    ConstructMat2x3,
    ConstructMat2x4,
    ConstructMat3x2,
    ConstructMat3,
    ConstructMat3x4,
    ConstructMat4x2,
    ConstructMat4x3,
    ConstructMat4,
    ConstructStruct,
}

impl Operator {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::Initialize
                | Self::AddAssign
                | Self::SubAssign
                | Self::MulAssign
                | Self::VectorTimesMatrixAssign
                | Self::VectorTimesScalarAssign
                | Self::MatrixTimesScalarAssign
                | Self::MatrixTimesMatrixAssign
                | Self::DivAssign
                | Self::IModAssign
                | Self::BitShiftLeftAssign
                | Self::BitShiftRightAssign
                | Self::BitwiseAndAssign
                | Self::BitwiseXorAssign
                | Self::BitwiseOrAssign
        )
    }

    /// Increments and decrements, which write their operand.
    pub fn is_increment(self) -> bool {
        matches!(
            self,
            Self::PostIncrement | Self::PostDecrement | Self::PreIncrement | Self::PreDecrement
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::LessThan
                | Self::GreaterThan
                | Self::LessThanEqual
                | Self::GreaterThanEqual
        )
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Self::LessThan | Self::GreaterThan | Self::LessThanEqual | Self::GreaterThanEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::LogicalAnd | Self::LogicalOr | Self::LogicalXor)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            Self::BitShiftLeft
                | Self::BitShiftRight
                | Self::BitwiseAnd
                | Self::BitwiseXor
                | Self::BitwiseOr
                | Self::BitShiftLeftAssign
                | Self::BitShiftRightAssign
                | Self::BitwiseAndAssign
                | Self::BitwiseXorAssign
                | Self::BitwiseOrAssign
                | Self::BitwiseNot
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(
            self,
            Self::BitShiftLeft
                | Self::BitShiftRight
                | Self::BitShiftLeftAssign
                | Self::BitShiftRightAssign
        )
    }

    pub fn is_index(self) -> bool {
        matches!(
            self,
            Self::IndexDirect
                | Self::IndexIndirect
                | Self::IndexDirectStruct
                | Self::IndexDirectInterfaceBlock
                | Self::VectorSwizzle
        )
    }

    pub fn is_constructor(self) -> bool {
        matches!(
            self,
            Self::ConstructFloat
                | Self::ConstructInt
                | Self::ConstructUInt
                | Self::ConstructBool
                | Self::ConstructVec2
                | Self::ConstructVec3
                | Self::ConstructVec4
                | Self::ConstructBVec2
                | Self::ConstructBVec3
                | Self::ConstructBVec4
                | Self::ConstructIVec2
                | Self::ConstructIVec3
                | Self::ConstructIVec4
                | Self::ConstructUVec2
                | Self::ConstructUVec3
                | Self::ConstructUVec4
                | Self::ConstructMat2
                | Self::ConstructMat2x3
                | Self::ConstructMat2x4
                | Self::ConstructMat3x2
                | Self::ConstructMat3
                | Self::ConstructMat3x4
                | Self::ConstructMat4x2
                | Self::ConstructMat4x3
                | Self::ConstructMat4
                | Self::ConstructStruct
        )
    }

    /// The plain binary operator behind a compound assignment.
    pub fn assignment_base(self) -> Option<Self> {
        Some(match self {
            Self::AddAssign => Self::Add,
            Self::SubAssign => Self::Sub,
            Self::MulAssign => Self::Mul,
            Self::VectorTimesMatrixAssign => Self::VectorTimesMatrix,
            Self::VectorTimesScalarAssign => Self::VectorTimesScalar,
            Self::MatrixTimesScalarAssign => Self::MatrixTimesScalar,
            Self::MatrixTimesMatrixAssign => Self::MatrixTimesMatrix,
            Self::DivAssign => Self::Div,
            Self::IModAssign => Self::IMod,
            Self::BitShiftLeftAssign => Self::BitShiftLeft,
            Self::BitShiftRightAssign => Self::BitShiftRight,
            Self::BitwiseAndAssign => Self::BitwiseAnd,
            Self::BitwiseXorAssign => Self::BitwiseXor,
            Self::BitwiseOrAssign => Self::BitwiseOr,
            _ => return None,
        })
    }

    /// Source spelling used in diagnostics and emitted code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Negative | Self::Sub => "-",
            Self::Positive | Self::Add => "+",
            Self::LogicalNot => "!",
            Self::BitwiseNot => "~",
            Self::PostIncrement | Self::PreIncrement => "++",
            Self::PostDecrement | Self::PreDecrement => "--",
            Self::Mul
            | Self::VectorTimesScalar
            | Self::VectorTimesMatrix
            | Self::MatrixTimesVector
            | Self::MatrixTimesScalar
            | Self::MatrixTimesMatrix => "*",
            Self::Div => "/",
            Self::IMod => "%",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessThanEqual => "<=",
            Self::GreaterThanEqual => ">=",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
            Self::LogicalXor => "^^",
            Self::BitShiftLeft => "<<",
            Self::BitShiftRight => ">>",
            Self::BitwiseAnd => "&",
            Self::BitwiseXor => "^",
            Self::BitwiseOr => "|",
            Self::IndexDirect | Self::IndexIndirect => "[]",
            Self::IndexDirectStruct | Self::IndexDirectInterfaceBlock | Self::VectorSwizzle => ".",
            Self::Comma => ",",
            Self::Assign | Self::Initialize => "=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::MulAssign
            | Self::VectorTimesMatrixAssign
            | Self::VectorTimesScalarAssign
            | Self::MatrixTimesScalarAssign
            | Self::MatrixTimesMatrixAssign => "*=",
            Self::DivAssign => "/=",
            Self::IModAssign => "%=",
            Self::BitShiftLeftAssign => "<<=",
            Self::BitShiftRightAssign => ">>=",
            Self::BitwiseAndAssign => "&=",
            Self::BitwiseXorAssign => "^=",
            Self::BitwiseOrAssign => "|=",
            Self::ConstructFloat => "float",
            Self::ConstructInt => "int",
            Self::ConstructUInt => "uint",
            Self::ConstructBool => "bool",
            Self::ConstructVec2 => "vec2",
            Self::ConstructVec3 => "vec3",
            Self::ConstructVec4 => "vec4",
            Self::ConstructBVec2 => "bvec2",
            Self::ConstructBVec3 => "bvec3",
            Self::ConstructBVec4 => "bvec4",
            Self::ConstructIVec2 => "ivec2",
            Self::ConstructIVec3 => "ivec3",
            Self::ConstructIVec4 => "ivec4",
            Self::ConstructUVec2 => "uvec2",
            Self::ConstructUVec3 => "uvec3",
            Self::ConstructUVec4 => "uvec4",
            Self::ConstructMat2 => "mat2",
            Self::ConstructMat2x3 => "mat2x3",
            Self::ConstructMat2x4 => "mat2x4",
            Self::ConstructMat3x2 => "mat3x2",
            Self::ConstructMat3 => "mat3",
            Self::ConstructMat3x4 => "mat3x4",
            Self::ConstructMat4x2 => "mat4x2",
            Self::ConstructMat4x3 => "mat4x3",
            Self::ConstructMat4 => "mat4",
            Self::ConstructStruct => "structure",
            Self::Null => "null",
            Self::Sequence => "sequence",
            Self::FunctionCall => "function call",
            Self::Function => "function",
            Self::Parameters => "parameters",
            Self::Prototype => "prototype",
            Self::Declaration => "declaration",
            Self::InvariantDeclaration => "invariant declaration",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(Operator::MulAssign.is_assignment());
        assert!(!Operator::Mul.is_assignment());
        assert!(Operator::LessThan.is_relational());
        assert!(!Operator::Equal.is_relational());
        assert!(Operator::ConstructMat3x2.is_constructor());
        assert_eq!(Operator::DivAssign.assignment_base(), Some(Operator::Div));
        assert_eq!(Operator::Add.assignment_base(), None);
    }

    #[test]
    fn spelling() {
        assert_eq!(Operator::MatrixTimesVector.to_string(), "*");
        assert_eq!(Operator::LogicalOr.as_str(), "||");
        assert_eq!(Operator::BitShiftRightAssign.as_str(), ">>=");
    }
}
