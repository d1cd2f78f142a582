//! Structural recognition of |A − B|.

use super::inst_with;
use fusor_ir::{Function, Intrinsic, Opcode, ValueId};

/// The two operands whose unsigned magnitude-of-difference an addend
/// computes, in their original order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AbsDiff {
    pub lhs: ValueId,
    pub rhs: ValueId,
}

/// Matches `v` as an absolute difference in either encoding: a call to
/// the generic abs intrinsic over a subtraction, or a two-way select
/// whose branches are the two opposite subtractions.
pub(crate) fn match_abs_diff(func: &Function, v: ValueId) -> Option<AbsDiff> {
    let inst = func.value(v)?.as_inst()?;
    match inst.opcode {
        Opcode::Call(Intrinsic::Abs) => {
            let &[arg] = &inst.operands[..] else {
                return None;
            };
            let sub = inst_with(func, arg, Opcode::Sub)?;
            let &[lhs, rhs] = &sub.operands[..] else {
                return None;
            };
            Some(AbsDiff { lhs, rhs })
        }

        Opcode::Select => {
            let &[_cond, on_true, on_false] = &inst.operands[..] else {
                return None;
            };
            // Only the cross-matched subtraction shape is required; the
            // guarding condition is not inspected.
            let t = inst_with(func, on_true, Opcode::Sub)?;
            let f = inst_with(func, on_false, Opcode::Sub)?;
            let &[a, b] = &t.operands[..] else {
                return None;
            };
            let &[c, d] = &f.operands[..] else {
                return None;
            };
            if a == d && b == c {
                Some(AbsDiff { lhs: a, rhs: b })
            } else {
                None
            }
        }

        _ => None,
    }
}
