//! Scalar constant values carried by constant nodes.

use std::cmp::Ordering;
use std::fmt;

use crate::types::BasicType;

/// One scalar component of a constant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstantUnion {
    Float(f32),
    Int(i32),
    UInt(u32),
    Bool(bool),
}

impl Default for ConstantUnion {
    fn default() -> Self {
        Self::Float(0.0)
    }
}

impl ConstantUnion {
    pub fn basic_type(self) -> BasicType {
        match self {
            Self::Float(_) => BasicType::Float,
            Self::Int(_) => BasicType::Int,
            Self::UInt(_) => BasicType::UInt,
            Self::Bool(_) => BasicType::Bool,
        }
    }

    /// The zero value of a scalar kind.
    pub fn zero(basic: BasicType) -> Option<Self> {
        match basic {
            BasicType::Float => Some(Self::Float(0.0)),
            BasicType::Int => Some(Self::Int(0)),
            BasicType::UInt => Some(Self::UInt(0)),
            BasicType::Bool => Some(Self::Bool(false)),
            _ => None,
        }
    }

    pub fn as_f32(self) -> f32 {
        match self {
            Self::Float(v) => v,
            Self::Int(v) => v as f32,
            Self::UInt(v) => v as f32,
            Self::Bool(v) => f32::from(u8::from(v)),
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::Float(v) => v as i32,
            Self::Int(v) => v,
            Self::UInt(v) => v as i32,
            Self::Bool(v) => i32::from(v),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::Float(v) => v as u32,
            Self::Int(v) => v as u32,
            Self::UInt(v) => v,
            Self::Bool(v) => u32::from(v),
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            Self::Float(v) => v != 0.0,
            Self::Int(v) => v != 0,
            Self::UInt(v) => v != 0,
            Self::Bool(v) => v,
        }
    }

    /// Constructor-style conversion (`float(1)`, `bool(2.0)`, ...).
    pub fn cast(self, to: BasicType) -> Option<Self> {
        match to {
            BasicType::Float => Some(Self::Float(self.as_f32())),
            BasicType::Int => Some(Self::Int(self.as_i32())),
            BasicType::UInt => Some(Self::UInt(self.as_u32())),
            BasicType::Bool => Some(Self::Bool(self.as_bool())),
            _ => None,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Self::Float(v) => v == 0.0,
            Self::Int(v) => v == 0,
            Self::UInt(v) => v == 0,
            Self::Bool(v) => !v,
        }
    }

    pub fn add(self, rhs: Self) -> Option<Self> {
        match (self, rhs) {
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a + b)),
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(a.wrapping_add(b))),
            (Self::UInt(a), Self::UInt(b)) => Some(Self::UInt(a.wrapping_add(b))),
            _ => None,
        }
    }

    pub fn sub(self, rhs: Self) -> Option<Self> {
        match (self, rhs) {
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a - b)),
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(a.wrapping_sub(b))),
            (Self::UInt(a), Self::UInt(b)) => Some(Self::UInt(a.wrapping_sub(b))),
            _ => None,
        }
    }

    pub fn mul(self, rhs: Self) -> Option<Self> {
        match (self, rhs) {
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a * b)),
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(a.wrapping_mul(b))),
            (Self::UInt(a), Self::UInt(b)) => Some(Self::UInt(a.wrapping_mul(b))),
            _ => None,
        }
    }

    pub fn bit_and(self, rhs: Self) -> Option<Self> {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(a & b)),
            (Self::UInt(a), Self::UInt(b)) => Some(Self::UInt(a & b)),
            _ => None,
        }
    }

    pub fn bit_or(self, rhs: Self) -> Option<Self> {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(a | b)),
            (Self::UInt(a), Self::UInt(b)) => Some(Self::UInt(a | b)),
            _ => None,
        }
    }

    pub fn bit_xor(self, rhs: Self) -> Option<Self> {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => Some(Self::Int(a ^ b)),
            (Self::UInt(a), Self::UInt(b)) => Some(Self::UInt(a ^ b)),
            _ => None,
        }
    }

    /// Shift amount may be signed or unsigned independently of the value.
    pub fn shl(self, rhs: Self) -> Option<Self> {
        let amount = shift_amount(rhs)?;
        match self {
            Self::Int(a) => Some(Self::Int(a.wrapping_shl(amount))),
            Self::UInt(a) => Some(Self::UInt(a.wrapping_shl(amount))),
            _ => None,
        }
    }

    pub fn shr(self, rhs: Self) -> Option<Self> {
        let amount = shift_amount(rhs)?;
        match self {
            Self::Int(a) => Some(Self::Int(a.wrapping_shr(amount))),
            Self::UInt(a) => Some(Self::UInt(a.wrapping_shr(amount))),
            _ => None,
        }
    }

    /// Ordering between two values of the same kind.
    pub fn compare(self, rhs: Self) -> Option<Ordering> {
        match (self, rhs) {
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(&b),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            (Self::UInt(a), Self::UInt(b)) => Some(a.cmp(&b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(&b)),
            _ => None,
        }
    }
}

fn shift_amount(value: ConstantUnion) -> Option<u32> {
    match value {
        ConstantUnion::Int(v) => Some(v as u32),
        ConstantUnion::UInt(v) => Some(v),
        _ => None,
    }
}

impl fmt::Display for ConstantUnion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}u"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}
