//! Structural recognition of "byte i of word W".
//!
//! A frontend can spell the extraction of one little-endian byte of a
//! 32-bit word several equivalent ways: a sign-extending shift pair, a
//! masked logical shift, a bare logical shift whose upper bits are known
//! zero, or a byte load from memory. All of them resolve to the same
//! `(base, index)` pair here.

use super::inst_with;
use fusor_ir::{Function, Opcode, ValueId, ValueKind};

/// A successfully recognized byte extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ByteExtract {
    /// The un-decomposed value the byte is read from: a 32-bit word or a
    /// base pointer.
    pub base: ValueId,
    /// Little-endian byte index, 0..=3.
    pub index: u8,
}

/// Returns the constant bits of `v`, if it is a constant.
fn const_of(func: &Function, v: ValueId) -> Option<u64> {
    func.value(v)?.const_value()
}

/// Matches `v` as "byte `index` of `base`".
///
/// Purely structural: no numeric evaluation beyond reading shift and mask
/// constants, so identical subgraphs always match identically. Width
/// casts are looked through at every level, since they do not change
/// which physical byte is read.
pub(crate) fn match_byte_extract(func: &Function, v: ValueId) -> Option<ByteExtract> {
    let mut v = v;
    loop {
        let inst = func.value(v)?.as_inst();
        match inst {
            Some(inst) if inst.opcode.is_cast() => {
                v = inst.operands.first().copied()?;
            }
            _ => break,
        }
    }
    let inst = func.value(v)?.as_inst()?;

    match inst.opcode {
        // Sign-extending pair: ashr(shl(x, 24 - 8*i), 24), with a direct
        // ashr-by-24 claiming the top byte when the inner shift does not
        // line up.
        Opcode::AShr => {
            let &[x, amount] = &inst.operands[..] else {
                return None;
            };
            if const_of(func, amount)? != 24 {
                return None;
            }
            if let Some(shl) = inst_with(func, x, Opcode::Shl) {
                let inner_base = shl.operands.first().copied();
                let inner_amount = shl.operands.get(1).and_then(|&a| const_of(func, a));
                let index = match inner_amount {
                    Some(24) => Some(0),
                    Some(16) => Some(1),
                    Some(8) => Some(2),
                    Some(0) => Some(3),
                    _ => None,
                };
                if let (Some(base), Some(index)) = (inner_base, index) {
                    return Some(ByteExtract { base, index });
                }
            }
            Some(ByteExtract { base: x, index: 3 })
        }

        // Zero-extending masked form: and(lshr(x, 8*i), 0xFF), with the
        // unshifted mask claiming byte 0.
        Opcode::And => {
            let &[a, mask] = &inst.operands[..] else {
                return None;
            };
            if const_of(func, mask)? != 0xFF {
                return None;
            }
            if let Some(shr) = inst_with(func, a, Opcode::LShr) {
                let shifted = shr.operands.first().copied();
                let amount = shr.operands.get(1).and_then(|&amt| const_of(func, amt));
                let index = match amount {
                    Some(0) => Some(0),
                    Some(8) => Some(1),
                    Some(16) => Some(2),
                    Some(24) => Some(3),
                    _ => None,
                };
                if let (Some(base), Some(index)) = (shifted, index) {
                    return Some(ByteExtract { base, index });
                }
            }
            Some(ByteExtract { base: a, index: 0 })
        }

        // Implicit-zero-upper form: a bare lshr with no mask. Shift 0 is
        // ambiguous without a mask, so only the masked rule above may
        // claim byte 0.
        Opcode::LShr => {
            let &[x, amount] = &inst.operands[..] else {
                return None;
            };
            let index = match const_of(func, amount)? {
                8 => 1,
                16 => 2,
                24 => 3,
                _ => return None,
            };
            Some(ByteExtract { base: x, index })
        }

        // Memory form: a byte load from the unadorned base pointer, or
        // from the base plus a constant offset in 0..=3. The base is the
        // pointer, never the address expression.
        Opcode::Load => {
            let &[addr] = &inst.operands[..] else {
                return None;
            };
            let addr_data = func.value(addr)?;
            match &addr_data.kind {
                ValueKind::Inst(address) if address.opcode == Opcode::PtrAdd => {
                    let &[base, offset] = &address.operands[..] else {
                        return None;
                    };
                    let offset = const_of(func, offset)?;
                    if offset <= 3 {
                        Some(ByteExtract {
                            base,
                            index: offset as u8,
                        })
                    } else {
                        None
                    }
                }
                ValueKind::Arg { .. } => Some(ByteExtract {
                    base: addr,
                    index: 0,
                }),
                _ => None,
            }
        }

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusor_ir::{InstBuilder, Type};

    fn setup() -> (Function, ValueId) {
        let mut func = Function::new("f");
        let word = func.new_arg(Type::I32);
        (func, word)
    }

    #[test]
    fn test_sign_extending_pair() {
        let (mut func, word) = setup();
        let entry = func.entry();
        let mut b = InstBuilder::at_end(&mut func, entry);
        let c16 = b.constant(Type::I32, 16);
        let c24 = b.constant(Type::I32, 24);
        let shl = b.shl(word, c16).unwrap();
        let v = b.ashr(shl, c24).unwrap();

        assert_eq!(
            match_byte_extract(&func, v),
            Some(ByteExtract {
                base: word,
                index: 1
            })
        );
    }

    #[test]
    fn test_top_byte_shortcut() {
        let (mut func, word) = setup();
        let entry = func.entry();
        let mut b = InstBuilder::at_end(&mut func, entry);
        let c24 = b.constant(Type::I32, 24);
        let v = b.ashr(word, c24).unwrap();

        assert_eq!(
            match_byte_extract(&func, v),
            Some(ByteExtract {
                base: word,
                index: 3
            })
        );
    }

    #[test]
    fn test_unaligned_inner_shift_falls_back_to_top_byte() {
        let (mut func, word) = setup();
        let entry = func.entry();
        let mut b = InstBuilder::at_end(&mut func, entry);
        let c4 = b.constant(Type::I32, 4);
        let c24 = b.constant(Type::I32, 24);
        let shl = b.shl(word, c4).unwrap();
        let v = b.ashr(shl, c24).unwrap();

        // The pair rule rejects shift 4; the direct rule then claims the
        // whole shifted expression as the base.
        assert_eq!(
            match_byte_extract(&func, v),
            Some(ByteExtract {
                base: shl,
                index: 3
            })
        );
    }

    #[test]
    fn test_masked_shift_form() {
        for (shift, index) in [(0u64, 0u8), (8, 1), (16, 2), (24, 3)] {
            let (mut func, word) = setup();
            let entry = func.entry();
            let mut b = InstBuilder::at_end(&mut func, entry);
            let amt = b.constant(Type::I32, shift);
            let mask = b.constant(Type::I32, 0xFF);
            let shr = b.lshr(word, amt).unwrap();
            let v = b.and(shr, mask).unwrap();

            assert_eq!(
                match_byte_extract(&func, v),
                Some(ByteExtract { base: word, index }),
                "shift {}",
                shift
            );
        }
    }

    #[test]
    fn test_bare_mask_claims_byte_zero() {
        let (mut func, word) = setup();
        let entry = func.entry();
        let mut b = InstBuilder::at_end(&mut func, entry);
        let mask = b.constant(Type::I32, 0xFF);
        let v = b.and(word, mask).unwrap();

        assert_eq!(
            match_byte_extract(&func, v),
            Some(ByteExtract {
                base: word,
                index: 0
            })
        );
    }

    #[test]
    fn test_wrong_mask_fails() {
        let (mut func, word) = setup();
        let entry = func.entry();
        let mut b = InstBuilder::at_end(&mut func, entry);
        let mask = b.constant(Type::I32, 0xFF00);
        let v = b.and(word, mask).unwrap();

        assert_eq!(match_byte_extract(&func, v), None);
    }

    #[test]
    fn test_bare_shift_form() {
        for (shift, index) in [(8u64, 1u8), (16, 2), (24, 3)] {
            let (mut func, word) = setup();
            let entry = func.entry();
            let mut b = InstBuilder::at_end(&mut func, entry);
            let amt = b.constant(Type::I32, shift);
            let v = b.lshr(word, amt).unwrap();

            assert_eq!(
                match_byte_extract(&func, v),
                Some(ByteExtract { base: word, index })
            );
        }
    }

    #[test]
    fn test_bare_shift_zero_is_ambiguous() {
        let (mut func, word) = setup();
        let entry = func.entry();
        let mut b = InstBuilder::at_end(&mut func, entry);
        let amt = b.constant(Type::I32, 0);
        let v = b.lshr(word, amt).unwrap();

        assert_eq!(match_byte_extract(&func, v), None);
    }

    #[test]
    fn test_casts_are_transparent() {
        let (mut func, word) = setup();
        let entry = func.entry();
        let mut b = InstBuilder::at_end(&mut func, entry);
        let amt = b.constant(Type::I32, 8);
        let mask = b.constant(Type::I32, 0xFF);
        let shr = b.lshr(word, amt).unwrap();
        let and = b.and(shr, mask).unwrap();
        let narrow = b.trunc(and, Type::I8).unwrap();
        let v = b.sext(narrow, Type::I32).unwrap();

        assert_eq!(
            match_byte_extract(&func, v),
            Some(ByteExtract {
                base: word,
                index: 1
            })
        );
    }

    #[test]
    fn test_direct_pointer_load() {
        let mut func = Function::new("f");
        let p = func.new_arg(Type::Ptr);
        let entry = func.entry();
        let mut b = InstBuilder::at_end(&mut func, entry);
        let v = b.load(Type::I8, p).unwrap();

        assert_eq!(
            match_byte_extract(&func, v),
            Some(ByteExtract { base: p, index: 0 })
        );
    }

    #[test]
    fn test_offset_load() {
        let mut func = Function::new("f");
        let p = func.new_arg(Type::Ptr);
        let entry = func.entry();
        let mut b = InstBuilder::at_end(&mut func, entry);
        let off = b.constant(Type::I32, 3);
        let addr = b.ptr_add(p, off).unwrap();
        let v = b.load(Type::I8, addr).unwrap();

        // The base is the pointer, not the address computation.
        assert_eq!(
            match_byte_extract(&func, v),
            Some(ByteExtract { base: p, index: 3 })
        );
    }

    #[test]
    fn test_out_of_range_offset_load_fails() {
        let mut func = Function::new("f");
        let p = func.new_arg(Type::Ptr);
        let entry = func.entry();
        let mut b = InstBuilder::at_end(&mut func, entry);
        let off = b.constant(Type::I32, 4);
        let addr = b.ptr_add(p, off).unwrap();
        let v = b.load(Type::I8, addr).unwrap();

        assert_eq!(match_byte_extract(&func, v), None);
    }

    #[test]
    fn test_terminal_is_not_an_extraction() {
        let (func, word) = setup();
        assert_eq!(match_byte_extract(&func, word), None);
    }
}
