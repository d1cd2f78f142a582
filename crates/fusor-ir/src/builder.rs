//! Positioned instruction construction.

use crate::error::Error;
use crate::function::{BlockId, Function};
use crate::instruction::{Intrinsic, Opcode};
use crate::value::{Type, ValueId};

/// Builds instructions at a chosen insertion point.
///
/// Every method type-checks its operands; a mismatch surfaces as
/// [`Error::TypeMismatch`] instead of corrupting the function. Each
/// successfully built instruction advances the insertion point, so a
/// sequence of calls lays instructions out in program order.
pub struct InstBuilder<'f> {
    func: &'f mut Function,
    block: BlockId,
    index: usize,
}

impl<'f> InstBuilder<'f> {
    /// Positions the builder at the end of `block`.
    pub fn at_end(func: &'f mut Function, block: BlockId) -> Self {
        let index = func.block_insts(block).len();
        Self { func, block, index }
    }

    /// Positions the builder immediately before an existing instruction.
    pub fn before(func: &'f mut Function, inst: ValueId) -> Result<Self, Error> {
        let data = func.value(inst).ok_or(Error::InvalidValueId(inst))?;
        let block = data
            .as_inst()
            .map(|i| i.block)
            .ok_or(Error::NotAnInstruction(inst))?;
        let index = func
            .block_insts(block)
            .iter()
            .position(|&v| v == inst)
            .ok_or(Error::InvalidValueId(inst))?;
        Ok(Self { func, block, index })
    }

    /// Read access to the function being built.
    pub fn func(&self) -> &Function {
        self.func
    }

    /// Materializes an integer constant in the function.
    pub fn constant(&mut self, ty: Type, value: u64) -> ValueId {
        self.func.new_const(ty, value)
    }

    fn push(&mut self, ty: Type, opcode: Opcode, operands: Vec<ValueId>) -> Result<ValueId, Error> {
        let id = self
            .func
            .insert_inst(self.block, self.index, ty, opcode, operands)?;
        self.index += 1;
        Ok(id)
    }

    fn ty_of(&self, v: ValueId) -> Result<Type, Error> {
        self.func.ty(v).ok_or(Error::InvalidValueId(v))
    }

    fn require_int(&self, v: ValueId, op: &'static str) -> Result<Type, Error> {
        let ty = self.ty_of(v)?;
        if ty.is_int() {
            Ok(ty)
        } else {
            Err(Error::TypeMismatch {
                op,
                expected: "integer",
                found: ty.to_string(),
            })
        }
    }

    fn binop(&mut self, opcode: Opcode, op: &'static str, a: ValueId, b: ValueId) -> Result<ValueId, Error> {
        let ta = self.require_int(a, op)?;
        let tb = self.require_int(b, op)?;
        if ta != tb {
            return Err(Error::TypeMismatch {
                op,
                expected: "matching operand widths",
                found: format!("{} and {}", ta, tb),
            });
        }
        self.push(ta, opcode, vec![a, b])
    }

    /// Integer addition.
    pub fn add(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, Error> {
        self.binop(Opcode::Add, "add", a, b)
    }

    /// Integer subtraction.
    pub fn sub(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, Error> {
        self.binop(Opcode::Sub, "sub", a, b)
    }

    /// Logical left shift.
    pub fn shl(&mut self, a: ValueId, amount: ValueId) -> Result<ValueId, Error> {
        self.binop(Opcode::Shl, "shl", a, amount)
    }

    /// Logical right shift.
    pub fn lshr(&mut self, a: ValueId, amount: ValueId) -> Result<ValueId, Error> {
        self.binop(Opcode::LShr, "lshr", a, amount)
    }

    /// Arithmetic right shift.
    pub fn ashr(&mut self, a: ValueId, amount: ValueId) -> Result<ValueId, Error> {
        self.binop(Opcode::AShr, "ashr", a, amount)
    }

    /// Bitwise AND.
    pub fn and(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, Error> {
        self.binop(Opcode::And, "and", a, b)
    }

    /// Bitwise OR.
    pub fn or(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, Error> {
        self.binop(Opcode::Or, "or", a, b)
    }

    fn cast(
        &mut self,
        opcode: Opcode,
        op: &'static str,
        v: ValueId,
        to: Type,
        widening: bool,
    ) -> Result<ValueId, Error> {
        let from = self.require_int(v, op)?;
        let (Some(from_bits), Some(to_bits)) = (from.bits(), to.bits()) else {
            return Err(Error::TypeMismatch {
                op,
                expected: "integer result type",
                found: to.to_string(),
            });
        };
        let valid = if widening {
            to_bits > from_bits
        } else {
            to_bits < from_bits
        };
        if !valid {
            return Err(Error::TypeMismatch {
                op,
                expected: if widening {
                    "a wider result type"
                } else {
                    "a narrower result type"
                },
                found: format!("{} -> {}", from, to),
            });
        }
        self.push(to, opcode, vec![v])
    }

    /// Zero-extending widen.
    pub fn zext(&mut self, v: ValueId, to: Type) -> Result<ValueId, Error> {
        self.cast(Opcode::ZExt, "zext", v, to, true)
    }

    /// Sign-extending widen.
    pub fn sext(&mut self, v: ValueId, to: Type) -> Result<ValueId, Error> {
        self.cast(Opcode::SExt, "sext", v, to, true)
    }

    /// Truncating narrow.
    pub fn trunc(&mut self, v: ValueId, to: Type) -> Result<ValueId, Error> {
        self.cast(Opcode::Trunc, "trunc", v, to, false)
    }

    /// Load of an integer from memory.
    pub fn load(&mut self, ty: Type, addr: ValueId) -> Result<ValueId, Error> {
        let addr_ty = self.ty_of(addr)?;
        if !addr_ty.is_ptr() {
            return Err(Error::TypeMismatch {
                op: "load",
                expected: "pointer address",
                found: addr_ty.to_string(),
            });
        }
        if !ty.is_int() {
            return Err(Error::TypeMismatch {
                op: "load",
                expected: "integer result type",
                found: ty.to_string(),
            });
        }
        self.push(ty, Opcode::Load, vec![addr])
    }

    /// Address computation: base pointer plus a byte offset.
    pub fn ptr_add(&mut self, base: ValueId, offset: ValueId) -> Result<ValueId, Error> {
        let base_ty = self.ty_of(base)?;
        if !base_ty.is_ptr() {
            return Err(Error::TypeMismatch {
                op: "ptradd",
                expected: "pointer base",
                found: base_ty.to_string(),
            });
        }
        self.require_int(offset, "ptradd")?;
        self.push(Type::Ptr, Opcode::PtrAdd, vec![base, offset])
    }

    /// Two-way select on a nonzero condition.
    pub fn select(&mut self, cond: ValueId, t: ValueId, f: ValueId) -> Result<ValueId, Error> {
        self.require_int(cond, "select")?;
        let tt = self.ty_of(t)?;
        let tf = self.ty_of(f)?;
        if tt != tf {
            return Err(Error::TypeMismatch {
                op: "select",
                expected: "matching branch types",
                found: format!("{} and {}", tt, tf),
            });
        }
        self.push(tt, Opcode::Select, vec![cond, t, f])
    }

    /// Call to an intrinsic. All intrinsics take and return 32-bit words.
    pub fn call(&mut self, intrinsic: Intrinsic, args: &[ValueId]) -> Result<ValueId, Error> {
        if args.len() != intrinsic.arg_count() {
            return Err(Error::TypeMismatch {
                op: "call",
                expected: "matching argument count",
                found: format!("{} args for {}", args.len(), intrinsic.name()),
            });
        }
        for &arg in args {
            let ty = self.ty_of(arg)?;
            if ty != Type::I32 {
                return Err(Error::TypeMismatch {
                    op: "call",
                    expected: "i32 argument",
                    found: ty.to_string(),
                });
            }
        }
        self.push(Type::I32, Opcode::Call(intrinsic), args.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binop_requires_matching_widths() {
        let mut func = Function::new("f");
        let a = func.new_arg(Type::I32);
        let b = func.new_arg(Type::I8);
        let entry = func.entry();

        let mut builder = InstBuilder::at_end(&mut func, entry);
        assert!(matches!(
            builder.add(a, b),
            Err(Error::TypeMismatch { op: "add", .. })
        ));
    }

    #[test]
    fn test_zext_must_widen() {
        let mut func = Function::new("f");
        let a = func.new_arg(Type::I32);
        let entry = func.entry();

        let mut builder = InstBuilder::at_end(&mut func, entry);
        assert!(builder.zext(a, Type::I8).is_err());
        assert!(builder.zext(a, Type::Int(64)).is_ok());
    }

    #[test]
    fn test_load_requires_pointer() {
        let mut func = Function::new("f");
        let w = func.new_arg(Type::I32);
        let p = func.new_arg(Type::Ptr);
        let entry = func.entry();

        let mut builder = InstBuilder::at_end(&mut func, entry);
        assert!(builder.load(Type::I8, w).is_err());
        assert!(builder.load(Type::I8, p).is_ok());
    }

    #[test]
    fn test_call_checks_arity() {
        let mut func = Function::new("f");
        let a = func.new_arg(Type::I32);
        let entry = func.entry();

        let mut builder = InstBuilder::at_end(&mut func, entry);
        assert!(builder.call(Intrinsic::Sad, &[a]).is_err());
        assert!(builder.call(Intrinsic::Abs, &[a]).is_ok());
    }

    #[test]
    fn test_before_inserts_in_program_order() {
        let mut func = Function::new("f");
        let a = func.new_arg(Type::I32);
        let entry = func.entry();

        let mut builder = InstBuilder::at_end(&mut func, entry);
        let last = builder.add(a, a).unwrap();

        let mut builder = InstBuilder::before(&mut func, last).unwrap();
        let first = builder.sub(a, a).unwrap();
        let second = builder.add(first, a).unwrap();

        assert_eq!(func.block_insts(entry), &[first, second, last]);
    }
}
