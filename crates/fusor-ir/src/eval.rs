//! Straight-line evaluation of functions.
//!
//! Executes a single-block, branch-free function over concrete argument
//! values and an optional byte-addressed memory image. Rewrite tests use
//! this to prove that a transformed function computes the same result as
//! the original; it is not part of any compilation pipeline.

use crate::function::Function;
use crate::instruction::{Intrinsic, Opcode};
use crate::value::{Inst, Type, ValueId, ValueKind};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from straight-line evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Evaluation only handles single-block functions.
    #[error("function has more than one block")]
    MultipleBlocks,

    /// The entry block holds no instructions to produce a result from.
    #[error("function has no instructions")]
    EmptyFunction,

    /// No value was supplied for an argument.
    #[error("missing value for argument {0}")]
    MissingArg(usize),

    /// A load touched an address outside the memory image.
    #[error("no memory mapped at address {0:#x}")]
    UnmappedAddress(u64),

    /// An operand referred to an erased value or one defined later.
    #[error("use of unknown value {0:?}")]
    UnknownValue(ValueId),

    /// An instruction had fewer operands than its opcode requires.
    #[error("malformed operand list")]
    Malformed,
}

/// Evaluates straight-line functions over concrete inputs.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    args: Vec<u64>,
    memory: HashMap<u64, u8>,
}

/// Masks a raw result to the width of `ty`. Pointers carry 64 bits.
fn truncate(ty: Type, value: u64) -> u64 {
    match ty.bits() {
        Some(bits) if bits < 64 => value & ((1u64 << bits) - 1),
        _ => value,
    }
}

/// Sign-extends the low `bits` of `value` to 64 bits.
fn sign_extend(value: u64, bits: u32) -> i64 {
    if bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

impl Evaluator {
    /// Creates an evaluator with no arguments and an empty memory image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the value of argument `index`. Pointer arguments take the
    /// address their memory image was mapped at.
    pub fn with_arg(mut self, index: usize, value: u64) -> Self {
        if self.args.len() <= index {
            self.args.resize(index + 1, 0);
        }
        self.args[index] = value;
        self
    }

    /// Maps `bytes` into the memory image starting at `addr`.
    pub fn with_bytes(mut self, addr: u64, bytes: &[u8]) -> Self {
        for (i, &b) in bytes.iter().enumerate() {
            self.memory.insert(addr.wrapping_add(i as u64), b);
        }
        self
    }

    /// Runs the function and returns the value of the last instruction in
    /// the entry block.
    pub fn run(&self, func: &Function) -> Result<u64, EvalError> {
        let env = self.exec(func)?;
        let last = func
            .block_insts(func.entry())
            .last()
            .copied()
            .ok_or(EvalError::EmptyFunction)?;
        env.get(&last).copied().ok_or(EvalError::UnknownValue(last))
    }

    /// Runs the function and returns the value of `target`.
    pub fn eval(&self, func: &Function, target: ValueId) -> Result<u64, EvalError> {
        let env = self.exec(func)?;
        self.operand(func, &env, target)
    }

    fn exec(&self, func: &Function) -> Result<HashMap<ValueId, u64>, EvalError> {
        if func.block_ids().count() > 1 {
            return Err(EvalError::MultipleBlocks);
        }
        let mut env = HashMap::new();
        for &id in func.block_insts(func.entry()) {
            let data = func.value(id).ok_or(EvalError::UnknownValue(id))?;
            let Some(inst) = data.as_inst() else { continue };
            let value = self.eval_inst(func, &env, data.ty, inst)?;
            env.insert(id, value);
        }
        Ok(env)
    }

    fn operand(
        &self,
        func: &Function,
        env: &HashMap<ValueId, u64>,
        v: ValueId,
    ) -> Result<u64, EvalError> {
        if let Some(&cached) = env.get(&v) {
            return Ok(cached);
        }
        let data = func.value(v).ok_or(EvalError::UnknownValue(v))?;
        match &data.kind {
            ValueKind::Arg { index } => self
                .args
                .get(*index as usize)
                .copied()
                .map(|raw| truncate(data.ty, raw))
                .ok_or(EvalError::MissingArg(*index as usize)),
            ValueKind::Const { value } => Ok(truncate(data.ty, *value)),
            ValueKind::Inst(_) => Err(EvalError::UnknownValue(v)),
        }
    }

    fn eval_inst(
        &self,
        func: &Function,
        env: &HashMap<ValueId, u64>,
        ty: Type,
        inst: &Inst,
    ) -> Result<u64, EvalError> {
        let nth = |i: usize| -> Result<u64, EvalError> {
            let id = inst.operands.get(i).copied().ok_or(EvalError::Malformed)?;
            self.operand(func, env, id)
        };
        let bits = ty.bits().unwrap_or(64);

        let raw = match inst.opcode {
            Opcode::Add => nth(0)?.wrapping_add(nth(1)?),
            Opcode::Sub => nth(0)?.wrapping_sub(nth(1)?),
            // Shift amounts wrap to the operand width.
            Opcode::Shl => nth(0)? << (nth(1)? % u64::from(bits)),
            Opcode::LShr => nth(0)? >> (nth(1)? % u64::from(bits)),
            Opcode::AShr => {
                let shift = nth(1)? % u64::from(bits);
                (sign_extend(nth(0)?, bits) >> shift) as u64
            }
            Opcode::And => nth(0)? & nth(1)?,
            Opcode::Or => nth(0)? | nth(1)?,
            Opcode::ZExt | Opcode::Trunc => nth(0)?,
            Opcode::SExt => {
                let src = inst.operands.first().copied().ok_or(EvalError::Malformed)?;
                let src_bits = func.ty(src).and_then(|t| t.bits()).unwrap_or(64);
                sign_extend(nth(0)?, src_bits) as u64
            }
            Opcode::Load => {
                let addr = nth(0)?;
                let mut value = 0u64;
                for i in 0..u64::from(bits / 8) {
                    let byte = self
                        .memory
                        .get(&addr.wrapping_add(i))
                        .copied()
                        .ok_or(EvalError::UnmappedAddress(addr.wrapping_add(i)))?;
                    value |= u64::from(byte) << (8 * i);
                }
                value
            }
            Opcode::PtrAdd => nth(0)?.wrapping_add(nth(1)?),
            Opcode::Select => {
                if nth(0)? != 0 {
                    nth(1)?
                } else {
                    nth(2)?
                }
            }
            Opcode::Call(Intrinsic::Abs) => {
                let src = inst.operands.first().copied().ok_or(EvalError::Malformed)?;
                let src_bits = func.ty(src).and_then(|t| t.bits()).unwrap_or(64);
                sign_extend(nth(0)?, src_bits).unsigned_abs()
            }
            Opcode::Call(Intrinsic::Sad) => {
                let a = nth(0)?;
                let b = nth(1)?;
                let acc = nth(2)?;
                let mut sum = acc;
                for i in 0..4 {
                    let ba = (a >> (8 * i)) & 0xFF;
                    let bb = (b >> (8 * i)) & 0xFF;
                    sum = sum.wrapping_add(ba.abs_diff(bb));
                }
                sum
            }
        };
        Ok(truncate(ty, raw))
    }
}
