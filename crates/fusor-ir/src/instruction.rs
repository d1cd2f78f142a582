//! Opcodes and intrinsic operations.

use std::fmt;

/// Intrinsic operations callable through [`Opcode::Call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Intrinsic {
    /// Absolute value of a signed integer.
    Abs,
    /// Fused sum of absolute differences over the four little-endian bytes
    /// of two 32-bit words, plus an accumulator:
    /// `acc + |b0(a)-b0(b)| + |b1(a)-b1(b)| + |b2(a)-b2(b)| + |b3(a)-b3(b)|`.
    ///
    /// Each per-byte difference, absolute value, and sum is computed
    /// without truncation before the final 32-bit result.
    Sad,
}

impl Intrinsic {
    /// Returns the name of this intrinsic.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Sad => "sad",
        }
    }

    /// Number of arguments the intrinsic takes.
    pub fn arg_count(&self) -> usize {
        match self {
            Self::Abs => 1,
            Self::Sad => 3,
        }
    }
}

/// Instruction opcodes.
///
/// One variant per instruction shape the engine distinguishes, so matchers
/// dispatch over this sum type directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Opcode {
    // Integer arithmetic
    Add,
    Sub,

    // Shifts
    Shl,
    LShr,
    AShr,

    // Bitwise
    And,
    Or,

    // Width casts
    ZExt,
    SExt,
    Trunc,

    // Memory
    Load,
    /// Address computation: `operands[0]` is the base pointer,
    /// `operands[1]` the byte offset.
    PtrAdd,

    // Two-way selection on a nonzero condition
    Select,

    /// Call to an intrinsic operation.
    Call(Intrinsic),
}

impl Opcode {
    /// Returns true for the width casts, which are transparent to the
    /// structural matchers.
    pub fn is_cast(&self) -> bool {
        matches!(self, Self::ZExt | Self::SExt | Self::Trunc)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Sub => write!(f, "sub"),
            Self::Shl => write!(f, "shl"),
            Self::LShr => write!(f, "lshr"),
            Self::AShr => write!(f, "ashr"),
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
            Self::ZExt => write!(f, "zext"),
            Self::SExt => write!(f, "sext"),
            Self::Trunc => write!(f, "trunc"),
            Self::Load => write!(f, "load"),
            Self::PtrAdd => write!(f, "ptradd"),
            Self::Select => write!(f, "select"),
            Self::Call(i) => write!(f, "call {}", i.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsic_arg_counts() {
        assert_eq!(Intrinsic::Abs.arg_count(), 1);
        assert_eq!(Intrinsic::Sad.arg_count(), 3);
    }

    #[test]
    fn test_cast_classification() {
        assert!(Opcode::ZExt.is_cast());
        assert!(Opcode::SExt.is_cast());
        assert!(Opcode::Trunc.is_cast());
        assert!(!Opcode::Add.is_cast());
        assert!(!Opcode::Load.is_cast());
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(format!("{}", Opcode::LShr), "lshr");
        assert_eq!(format!("{}", Opcode::Call(Intrinsic::Sad)), "call sad");
    }
}
