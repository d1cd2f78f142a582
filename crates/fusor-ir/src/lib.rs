//! # fusor-ir
//!
//! The intermediate representation the fusor engine operates on. This
//! crate defines values, typed instructions, basic blocks, and functions,
//! with use/def edges maintained through every mutation.
//!
//! A [`Function`] owns all of its values in an arena; [`ValueId`] handles
//! compare by identity, which is the comparison every structural matcher
//! relies on. The [`InstBuilder`] constructs type-checked instructions at
//! a chosen insertion point, and [`eval::Evaluator`] executes
//! straight-line functions so tests can prove rewrites semantics-preserving.

pub mod builder;
pub mod error;
pub mod eval;
pub mod function;
pub mod instruction;
pub mod value;

pub use builder::InstBuilder;
pub use error::Error;
pub use eval::{EvalError, Evaluator};
pub use function::{BlockId, Function};
pub use instruction::{Intrinsic, Opcode};
pub use value::{Inst, Type, ValueData, ValueId, ValueKind};
