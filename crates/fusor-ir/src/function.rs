//! Functions, basic blocks, and the value arena.

use crate::error::Error;
use crate::instruction::Opcode;
use crate::value::{Inst, Type, ValueData, ValueId, ValueKind};
use std::fmt;

/// A handle to a basic block within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Creates a handle from a raw index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the block index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A basic block: an ordered sequence of instruction values.
#[derive(Debug, Clone, Default)]
struct Block {
    insts: Vec<ValueId>,
}

/// A function: the owner of every value and block the engine touches.
///
/// Values live in an arena indexed by [`ValueId`]; erased slots are
/// tombstoned so surviving handles stay stable. Instructions keep
/// non-owning back-references to their users, maintained by every
/// mutation on this type.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    values: Vec<Option<ValueData>>,
    blocks: Vec<Block>,
    args: Vec<ValueId>,
}

impl Function {
    /// Creates an empty function with a single entry block.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            blocks: vec![Block::default()],
            args: Vec::new(),
        }
    }

    /// The function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entry block.
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    /// Appends a new, empty block.
    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::default());
        id
    }

    /// All block handles, in creation order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    /// The instruction sequence of a block.
    pub fn block_insts(&self, block: BlockId) -> &[ValueId] {
        self.blocks
            .get(block.index())
            .map(|b| b.insts.as_slice())
            .unwrap_or(&[])
    }

    /// Declares a new function argument of the given type.
    pub fn new_arg(&mut self, ty: Type) -> ValueId {
        let index = self.args.len() as u32;
        let id = self.alloc(ValueData::new(ty, ValueKind::Arg { index }));
        self.args.push(id);
        id
    }

    /// The argument list, in declaration order.
    pub fn args(&self) -> &[ValueId] {
        &self.args
    }

    /// Materializes an integer constant. Constants are not interned; each
    /// call yields a fresh value.
    pub fn new_const(&mut self, ty: Type, value: u64) -> ValueId {
        self.alloc(ValueData::new(ty, ValueKind::Const { value }))
    }

    fn alloc(&mut self, data: ValueData) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Some(data));
        id
    }

    /// Looks up a live value.
    pub fn value(&self, id: ValueId) -> Option<&ValueData> {
        self.values.get(id.index()).and_then(|slot| slot.as_ref())
    }

    /// The type of a live value.
    pub fn ty(&self, id: ValueId) -> Option<Type> {
        self.value(id).map(|data| data.ty)
    }

    /// Returns true when the handle refers to no live value.
    pub fn is_erased(&self, id: ValueId) -> bool {
        self.value(id).is_none()
    }

    /// The users of a value, one entry per referencing operand slot.
    pub fn users(&self, id: ValueId) -> &[ValueId] {
        self.value(id).map(|data| data.users()).unwrap_or(&[])
    }

    /// Number of operand slots referencing a value.
    pub fn use_count(&self, id: ValueId) -> usize {
        self.users(id).len()
    }

    /// Inserts a new instruction at `index` within `block`. Operand
    /// handles are validated; type checking is the builder's job.
    pub(crate) fn insert_inst(
        &mut self,
        block: BlockId,
        index: usize,
        ty: Type,
        opcode: Opcode,
        operands: Vec<ValueId>,
    ) -> Result<ValueId, Error> {
        if block.index() >= self.blocks.len() {
            return Err(Error::InvalidBlockId(block));
        }
        for &op in &operands {
            if self.is_erased(op) {
                return Err(Error::InvalidValueId(op));
            }
        }
        let id = self.alloc(ValueData::new(
            ty,
            ValueKind::Inst(Inst {
                opcode,
                operands: operands.clone(),
                block,
            }),
        ));
        for &op in &operands {
            if let Some(data) = self.values[op.index()].as_mut() {
                data.users.push(id);
            }
        }
        let insts = &mut self.blocks[block.index()].insts;
        let at = index.min(insts.len());
        insts.insert(at, id);
        Ok(id)
    }

    /// Rewrites every use of `old` to refer to `new`.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) -> Result<(), Error> {
        if self.is_erased(old) {
            return Err(Error::InvalidValueId(old));
        }
        if self.is_erased(new) {
            return Err(Error::InvalidValueId(new));
        }
        if old == new {
            return Ok(());
        }
        let users = match self.values[old.index()].as_mut() {
            Some(data) => std::mem::take(&mut data.users),
            None => return Err(Error::InvalidValueId(old)),
        };
        for &user in &users {
            if let Some(ValueKind::Inst(inst)) =
                self.values[user.index()].as_mut().map(|d| &mut d.kind)
            {
                for op in &mut inst.operands {
                    if *op == old {
                        *op = new;
                    }
                }
            }
        }
        if let Some(data) = self.values[new.index()].as_mut() {
            data.users.extend(users);
        }
        Ok(())
    }

    /// Erases an instruction that no longer has users, removing it from
    /// its block and releasing its operand back-references.
    pub fn erase_inst(&mut self, id: ValueId) -> Result<(), Error> {
        let data = self.value(id).ok_or(Error::InvalidValueId(id))?;
        if !data.users.is_empty() {
            return Err(Error::ValueInUse(id));
        }
        let inst = match data.as_inst() {
            Some(inst) => inst.clone(),
            None => return Err(Error::NotAnInstruction(id)),
        };
        if let Some(block) = self.blocks.get_mut(inst.block.index()) {
            if let Some(pos) = block.insts.iter().position(|&v| v == id) {
                block.insts.remove(pos);
            }
        }
        // Release one back-reference per operand slot.
        for op in inst.operands {
            if let Some(data) = self.values[op.index()].as_mut() {
                if let Some(pos) = data.users.iter().position(|&u| u == id) {
                    data.users.swap_remove(pos);
                }
            }
        }
        self.values[id.index()] = None;
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function {}:", self.name)?;
        for &arg in &self.args {
            if let Some(data) = self.value(arg) {
                writeln!(f, "  {}: {} = arg", arg, data.ty)?;
            }
        }
        for (i, slot) in self.values.iter().enumerate() {
            if let Some(data) = slot {
                if let Some(value) = data.const_value() {
                    writeln!(
                        f,
                        "  {}: {} = const {:#x}",
                        ValueId(i as u32),
                        data.ty,
                        value
                    )?;
                }
            }
        }
        for block_id in self.block_ids() {
            writeln!(f, "  {}:", block_id)?;
            for &inst_id in self.block_insts(block_id) {
                let Some(data) = self.value(inst_id) else {
                    continue;
                };
                let Some(inst) = data.as_inst() else { continue };
                write!(f, "    {} = {}", inst_id, inst.opcode)?;
                for (n, op) in inst.operands.iter().enumerate() {
                    if n > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}", op)?;
                }
                writeln!(f, " : {}", data.ty)?;
            }
        }
        Ok(())
    }
}
