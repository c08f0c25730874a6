//! Error types for the shader AST.

use crate::operator::Operator;

/// Errors raised by checked arena access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    /// A handle index is out of bounds for its arena.
    #[error("handle index {index} out of bounds (arena size: {size})")]
    OutOfBounds { index: usize, size: usize },

    /// The slot was released by a pop and possibly reused since.
    #[error("stale handle {index}: issued in epoch {issued}, slot now in epoch {current}")]
    Stale {
        index: usize,
        issued: u32,
        current: u32,
    },
}

/// Reasons an operator cannot be applied to its operand types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromoteError {
    #[error("'{op}' : invalid operation for arrays")]
    ArrayOperand { op: Operator },

    #[error("'{op}' : operand basic types do not match ({left} and {right})")]
    BasicTypeMismatch {
        op: Operator,
        left: String,
        right: String,
    },

    #[error(
        "'{op}' : wrong operand types  no operation '{op}' exists that takes a left-hand operand of type '{left}' and a right operand of type '{right}' (or there is no acceptable conversion)"
    )]
    NoOperation {
        op: Operator,
        left: String,
        right: String,
    },

    #[error(
        "'{op}' : wrong operand type  no operation '{op}' exists that takes an operand of type {operand} (or there is no acceptable conversion)"
    )]
    NoUnaryOperation { op: Operator, operand: String },

    #[error("'{op}' : dimension mismatch")]
    DimensionMismatch { op: Operator },

    #[error("'?:' : true and false expressions have different types ('{true_ty}' and '{false_ty}')")]
    TernaryMismatch { true_ty: String, false_ty: String },
}

/// Symbol table insertion failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    #[error("'{name}' : redefinition")]
    Redefinition { name: String },

    #[error("no scope is open")]
    NoScope,
}
