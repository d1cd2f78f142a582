//! Flattening of addition expressions into their leaf addends.

use fusor_ir::{Function, Opcode, Type, ValueId};
use std::collections::HashSet;

/// Width of the accumulator word the fused operation works over.
pub(crate) const WORD_BITS: u32 = 32;

/// An addition expression flattened into its multiset of leaves.
#[derive(Debug)]
pub(crate) struct AddTree {
    /// Leaf addends. Order carries no meaning; a leaf reachable through
    /// two paths appears twice.
    pub leaves: Vec<ValueId>,
    /// The addition instructions forming the chain, root included,
    /// deduplicated. Candidates for deletion after a rewrite.
    pub chain: Vec<ValueId>,
}

/// Returns true when `v` is an addition of the accumulator width.
pub(crate) fn is_word_add(func: &Function, v: ValueId) -> bool {
    func.value(v).is_some_and(|data| {
        data.ty == Type::Int(WORD_BITS)
            && data.as_inst().is_some_and(|inst| inst.opcode == Opcode::Add)
    })
}

/// Flattens the addition tree rooted at `root`.
///
/// The traversal is an explicit worklist, never recursion, so arbitrarily
/// long chains cannot overflow the stack. Returns `None` when fewer than
/// four leaves result; four is the minimum for the four byte-difference
/// terms.
pub(crate) fn flatten(func: &Function, root: ValueId) -> Option<AddTree> {
    let mut leaves = Vec::new();
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut worklist = vec![root];

    while let Some(v) = worklist.pop() {
        match func.value(v).and_then(|data| data.as_inst()) {
            Some(inst)
                if inst.opcode == Opcode::Add && func.ty(v) == Some(Type::Int(WORD_BITS)) =>
            {
                if seen.insert(v) {
                    chain.push(v);
                }
                let &[a, b] = &inst.operands[..] else {
                    return None;
                };
                worklist.push(a);
                worklist.push(b);
            }
            _ => leaves.push(v),
        }
    }

    if leaves.len() < 4 {
        return None;
    }
    Some(AddTree { leaves, chain })
}
