//! Error types for fusor-ir.

use thiserror::Error;

/// Core IR error type.
///
/// Construction-time failures (type mismatches, dangling handles) are
/// reported through this enum rather than panicking, so a pass can surface
/// them on the host's fatal-error channel.
#[derive(Error, Debug)]
pub enum Error {
    /// A value handle that does not refer to a live value.
    #[error("invalid value id: {0:?}")]
    InvalidValueId(crate::ValueId),

    /// A block handle that does not refer to a block of this function.
    #[error("invalid block id: {0:?}")]
    InvalidBlockId(crate::BlockId),

    /// The named value is not an instruction.
    #[error("value {0:?} is not an instruction")]
    NotAnInstruction(crate::ValueId),

    /// An instruction was constructed with an operand of the wrong type.
    #[error("type mismatch building {op}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Opcode being constructed.
        op: &'static str,
        /// What the builder required.
        expected: &'static str,
        /// What it was given.
        found: String,
    },

    /// Attempted to erase a value that still has users.
    #[error("value {0:?} still has uses")]
    ValueInUse(crate::ValueId),
}
