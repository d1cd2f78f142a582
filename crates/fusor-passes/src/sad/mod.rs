//! Recognition and rewrite of the four-byte sum-of-absolute-differences
//! idiom.
//!
//! The engine scans a function for additions of the accumulator width,
//! flattens each into its leaf addends, classifies every leaf as a
//! per-byte absolute difference of two common words (or as the single
//! accumulator), and replaces a fully verified pattern with one call to
//! the fused primitive. Matching is read-only; construction and cleanup
//! happen only after a complete match, so a candidate is either rewritten
//! whole or left untouched.

mod abs_diff;
mod add_tree;
mod byte_extract;

use crate::config::TargetConfig;
use abs_diff::match_abs_diff;
use add_tree::{flatten, is_word_add, WORD_BITS};
use byte_extract::match_byte_extract;
use fusor_ir::{Error, Function, Inst, InstBuilder, Intrinsic, Opcode, Type, ValueId};

/// Returns the instruction data of `v` when it carries `opcode`.
pub(crate) fn inst_with(func: &Function, v: ValueId, opcode: Opcode) -> Option<&Inst> {
    let inst = func.value(v)?.as_inst()?;
    (inst.opcode == opcode).then_some(inst)
}

/// One leaf classified as |byte_index(base_a) − byte_index(base_b)|.
#[derive(Debug, Clone, Copy)]
struct FoundAbsDiff {
    base_a: ValueId,
    base_b: ValueId,
    index: u8,
}

/// A fully verified candidate, ready to rewrite.
struct SadMatch {
    base_a: ValueId,
    base_b: ValueId,
    /// The accumulator leaf, when the tree carries one.
    accumulator: Option<ValueId>,
    /// Addition instructions to prune after the rewrite, root included.
    chain: Vec<ValueId>,
}

/// Runs SAD fusion over `func` and reports whether anything changed.
///
/// When the target does not provide the fused primitive the function is
/// not inspected at all. Structural mismatches are silent; only a failure
/// while synthesizing replacement instructions surfaces as an error.
pub fn fuse_sad(func: &mut Function, config: &TargetConfig) -> Result<bool, Error> {
    if !config.has_sad_fusion() {
        return Ok(false);
    }
    let mut changed = false;
    let blocks: Vec<_> = func.block_ids().collect();
    for block in blocks {
        // Rewrites erase instructions, so iterate over a snapshot.
        let snapshot = func.block_insts(block).to_vec();
        for root in snapshot {
            if func.is_erased(root) || !is_word_add(func, root) {
                continue;
            }
            if let Some(m) = match_sad(func, root) {
                rewrite(func, root, m)?;
                changed = true;
            }
        }
    }
    Ok(changed)
}

/// The read-only half: flatten, classify, and verify one candidate root.
fn match_sad(func: &Function, root: ValueId) -> Option<SadMatch> {
    let tree = flatten(func, root)?;

    let mut found: Vec<FoundAbsDiff> = Vec::new();
    let mut accumulator: Option<ValueId> = None;
    for &leaf in &tree.leaves {
        if let Some(diff) = match_abs_diff(func, leaf) {
            if let (Some(lhs), Some(rhs)) = (
                match_byte_extract(func, diff.lhs),
                match_byte_extract(func, diff.rhs),
            ) {
                if lhs.index == rhs.index {
                    found.push(FoundAbsDiff {
                        base_a: lhs.base,
                        base_b: rhs.base,
                        index: lhs.index,
                    });
                    continue;
                }
            }
        }
        // Not a byte difference. At most one leaf may play accumulator; a
        // second unmatched leaf kills the candidate.
        if accumulator.replace(leaf).is_some() {
            return None;
        }
    }

    if found.len() != 4 {
        return None;
    }
    // The four terms must cover byte indices 0..=3 exactly once each.
    let mut seen = [false; 4];
    for d in &found {
        let slot = &mut seen[usize::from(d.index)];
        if *slot {
            return None;
        }
        *slot = true;
    }
    if seen != [true; 4] {
        return None;
    }
    // All four terms must read the same two bases, compared by identity.
    let base_a = found[0].base_a;
    let base_b = found[0].base_b;
    if found.iter().any(|d| d.base_a != base_a || d.base_b != base_b) {
        return None;
    }

    Some(SadMatch {
        base_a,
        base_b,
        accumulator,
        chain: tree.chain,
    })
}

/// The commit half: synthesize the fused call before the root, reroute
/// every use of the root, then prune the now-dead idiom instructions.
fn rewrite(func: &mut Function, root: ValueId, m: SadMatch) -> Result<(), Error> {
    let acc = match m.accumulator {
        Some(v) => v,
        None => func.new_const(Type::Int(WORD_BITS), 0),
    };

    let mut builder = InstBuilder::before(func, root)?;
    let packed_a = pack_if_pointer(&mut builder, m.base_a)?;
    let packed_b = pack_if_pointer(&mut builder, m.base_b)?;
    let fused = builder.call(Intrinsic::Sad, &[packed_a, packed_b, acc])?;

    func.replace_all_uses(root, fused)?;
    prune_dead(func, &m.chain);
    Ok(())
}

/// Loads and repacks four bytes into a 32-bit word when `base` is a
/// pointer; word bases pass through untouched.
///
/// The reconstruction is little-endian: byte 0 lands unshifted and byte i
/// is shifted left by 8*i before the OR.
fn pack_if_pointer(builder: &mut InstBuilder<'_>, base: ValueId) -> Result<ValueId, Error> {
    if builder.func().ty(base) != Some(Type::Ptr) {
        return Ok(base);
    }
    let word = Type::Int(WORD_BITS);
    let mut packed: Option<ValueId> = None;
    for i in 0..4u64 {
        let offset = builder.constant(word, i);
        let addr = builder.ptr_add(base, offset)?;
        let byte = builder.load(Type::I8, addr)?;
        let wide = builder.zext(byte, word)?;
        packed = Some(match packed {
            None => wide,
            Some(acc) => {
                let amount = builder.constant(word, 8 * i);
                let shifted = builder.shl(wide, amount)?;
                builder.or(acc, shifted)?
            }
        });
    }
    Ok(packed.unwrap_or(base))
}

/// Erases the recorded chain and, transitively, idiom instructions that
/// lose their last use in the process. A value still referenced anywhere
/// is never touched, so definitions cannot be removed before their
/// remaining users.
fn prune_dead(func: &mut Function, roots: &[ValueId]) {
    let mut worklist: Vec<ValueId> = roots.to_vec();
    while let Some(v) = worklist.pop() {
        if func.is_erased(v) || func.use_count(v) != 0 {
            continue;
        }
        let Some(operands) = func
            .value(v)
            .and_then(|data| data.as_inst())
            .map(|inst| inst.operands.clone())
        else {
            continue;
        };
        if func.erase_inst(v).is_ok() {
            worklist.extend(operands);
        }
    }
}
