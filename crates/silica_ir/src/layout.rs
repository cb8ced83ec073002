//! Placement of blocks and instructions within a unit.
//!
//! Functions and processes order their instructions inside basic blocks
//! through a [`CfgLayout`]; entities hold a single flat list through a
//! [`FlatLayout`] whose order carries no meaning beyond printing. The
//! layout is the owning side of instruction placement: an instruction is
//! attached to at most one position, and attaching it a second time is a
//! bug in the caller.

use crate::ids::{Block, Inst};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Block and instruction placement for a function or process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CfgLayout {
    order: Vec<Block>,
    insts: BTreeMap<Block, Vec<Inst>>,
    inst_block: BTreeMap<Inst, Block>,
    names: BTreeMap<Block, String>,
    next_block: u32,
}

impl CfgLayout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    fn new_block(&mut self) -> Block {
        let bb = Block::from_raw(self.next_block);
        self.next_block += 1;
        self.insts.insert(bb, Vec::new());
        bb
    }

    /// Creates a new block at the end of the unit.
    pub fn append_block(&mut self) -> Block {
        let bb = self.new_block();
        self.order.push(bb);
        bb
    }

    /// Creates a new block at the beginning of the unit.
    pub fn prepend_block(&mut self) -> Block {
        let bb = self.new_block();
        self.order.insert(0, bb);
        bb
    }

    /// Creates a new block immediately before `next`.
    ///
    /// # Panics
    ///
    /// Panics if `next` is not in this layout.
    pub fn insert_block_before(&mut self, next: Block) -> Block {
        let pos = self.block_position(next);
        let bb = self.new_block();
        self.order.insert(pos, bb);
        bb
    }

    /// Creates a new block immediately after `prev`.
    ///
    /// # Panics
    ///
    /// Panics if `prev` is not in this layout.
    pub fn insert_block_after(&mut self, prev: Block) -> Block {
        let pos = self.block_position(prev);
        let bb = self.new_block();
        self.order.insert(pos + 1, bb);
        bb
    }

    /// Removes an empty block from the unit.
    ///
    /// # Panics
    ///
    /// Panics if the block still contains instructions or is not in this
    /// layout.
    pub fn remove_block(&mut self, bb: Block) {
        assert!(
            self.insts.get(&bb).is_some_and(|insts| insts.is_empty()),
            "removal of a non-empty block"
        );
        let pos = self.block_position(bb);
        self.order.remove(pos);
        self.insts.remove(&bb);
        self.names.remove(&bb);
    }

    /// Moves a block to immediately before `next`, within the same unit.
    pub fn move_block_before(&mut self, bb: Block, next: Block) {
        let from = self.block_position(bb);
        self.order.remove(from);
        let to = self.block_position(next);
        self.order.insert(to, bb);
    }

    /// Moves a block to immediately after `prev`, within the same unit.
    pub fn move_block_after(&mut self, bb: Block, prev: Block) {
        let from = self.block_position(bb);
        self.order.remove(from);
        let to = self.block_position(prev);
        self.order.insert(to + 1, bb);
    }

    fn block_position(&self, bb: Block) -> usize {
        self.order
            .iter()
            .position(|&b| b == bb)
            .expect("block not in layout")
    }

    /// The entry block: the first block of the unit.
    pub fn entry(&self) -> Option<Block> {
        self.order.first().copied()
    }

    /// Returns `true` if the block is in this layout.
    pub fn contains_block(&self, bb: Block) -> bool {
        self.insts.contains_key(&bb)
    }

    /// Iterates over the blocks in layout order.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.order.iter().copied()
    }

    /// Iterates over the blocks in reverse layout order.
    pub fn blocks_rev(&self) -> impl Iterator<Item = Block> + '_ {
        self.order.iter().rev().copied()
    }

    /// The name of a block, if it has one.
    pub fn block_name(&self, bb: Block) -> Option<&str> {
        self.names.get(&bb).map(|s| s.as_str())
    }

    /// Sets the name of a block.
    pub fn set_block_name(&mut self, bb: Block, name: impl Into<String>) {
        self.names.insert(bb, name.into());
    }

    /// Appends an instruction to the end of a block.
    ///
    /// # Panics
    ///
    /// Panics if the instruction is already attached somewhere.
    pub fn append_inst(&mut self, inst: Inst, bb: Block) {
        self.attach(inst, bb);
        self.insts.get_mut(&bb).expect("block not in layout").push(inst);
    }

    /// Prepends an instruction to the beginning of a block.
    ///
    /// # Panics
    ///
    /// Panics if the instruction is already attached somewhere.
    pub fn prepend_inst(&mut self, inst: Inst, bb: Block) {
        self.attach(inst, bb);
        self.insts
            .get_mut(&bb)
            .expect("block not in layout")
            .insert(0, inst);
    }

    /// Inserts an instruction immediately before another.
    ///
    /// # Panics
    ///
    /// Panics if `inst` is already attached or `before` is not.
    pub fn insert_inst_before(&mut self, inst: Inst, before: Inst) {
        let (bb, pos) = self.inst_position(before).expect("instruction not in layout");
        self.attach(inst, bb);
        self.insts.get_mut(&bb).unwrap().insert(pos, inst);
    }

    /// Inserts an instruction immediately after another.
    ///
    /// # Panics
    ///
    /// Panics if `inst` is already attached or `after` is not.
    pub fn insert_inst_after(&mut self, inst: Inst, after: Inst) {
        let (bb, pos) = self.inst_position(after).expect("instruction not in layout");
        self.attach(inst, bb);
        self.insts.get_mut(&bb).unwrap().insert(pos + 1, inst);
    }

    fn attach(&mut self, inst: Inst, bb: Block) {
        let prev = self.inst_block.insert(inst, bb);
        assert!(prev.is_none(), "instruction already attached to a block");
    }

    /// Unlinks an instruction from its block, clearing its parent.
    ///
    /// # Panics
    ///
    /// Panics if the instruction is not attached.
    pub fn remove_inst(&mut self, inst: Inst) {
        let bb = self
            .inst_block
            .remove(&inst)
            .expect("instruction not in layout");
        let insts = self.insts.get_mut(&bb).unwrap();
        let pos = insts.iter().position(|&i| i == inst).unwrap();
        insts.remove(pos);
    }

    /// The block an instruction is attached to, if any.
    pub fn inst_block(&self, inst: Inst) -> Option<Block> {
        self.inst_block.get(&inst).copied()
    }

    /// The block and position an instruction is attached at, if any.
    pub fn inst_position(&self, inst: Inst) -> Option<(Block, usize)> {
        let bb = self.inst_block(inst)?;
        let pos = self.insts[&bb].iter().position(|&i| i == inst)?;
        Some((bb, pos))
    }

    /// The instructions of a block, in order.
    pub fn insts(&self, bb: Block) -> &[Inst] {
        &self.insts[&bb]
    }

    /// The last instruction of a block, if any.
    pub fn last_inst(&self, bb: Block) -> Option<Inst> {
        self.insts[&bb].last().copied()
    }

    /// Iterates over all instructions of the unit in block order.
    pub fn all_insts(&self) -> impl Iterator<Item = Inst> + '_ {
        self.order.iter().flat_map(|bb| self.insts[bb].iter().copied())
    }
}

/// Instruction placement for an entity.
///
/// The order is preserved for printing but is not semantically
/// meaningful; entity instructions execute conceptually in parallel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlatLayout {
    order: Vec<Inst>,
}

impl FlatLayout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instruction to the end of the unit.
    ///
    /// # Panics
    ///
    /// Panics if the instruction is already attached.
    pub fn append_inst(&mut self, inst: Inst) {
        assert!(!self.contains(inst), "instruction already attached");
        self.order.push(inst);
    }

    /// Prepends an instruction to the beginning of the unit.
    ///
    /// # Panics
    ///
    /// Panics if the instruction is already attached.
    pub fn prepend_inst(&mut self, inst: Inst) {
        assert!(!self.contains(inst), "instruction already attached");
        self.order.insert(0, inst);
    }

    /// Inserts an instruction immediately before another.
    pub fn insert_inst_before(&mut self, inst: Inst, before: Inst) {
        assert!(!self.contains(inst), "instruction already attached");
        let pos = self.position(before);
        self.order.insert(pos, inst);
    }

    /// Inserts an instruction immediately after another.
    pub fn insert_inst_after(&mut self, inst: Inst, after: Inst) {
        assert!(!self.contains(inst), "instruction already attached");
        let pos = self.position(after);
        self.order.insert(pos + 1, inst);
    }

    /// Unlinks an instruction from the unit.
    ///
    /// # Panics
    ///
    /// Panics if the instruction is not attached.
    pub fn remove_inst(&mut self, inst: Inst) {
        let pos = self.position(inst);
        self.order.remove(pos);
    }

    /// Returns `true` if the instruction is attached.
    pub fn contains(&self, inst: Inst) -> bool {
        self.order.contains(&inst)
    }

    /// Iterates over the instructions in layout order.
    pub fn insts(&self) -> impl Iterator<Item = Inst> + '_ {
        self.order.iter().copied()
    }

    /// Replaces the layout order with the given permutation of the same
    /// instructions.
    ///
    /// # Panics
    ///
    /// Panics if `order` is not a permutation of the current contents.
    pub fn reorder(&mut self, order: Vec<Inst>) {
        let mut a = self.order.clone();
        let mut b = order.clone();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b, "reorder must permute the existing instructions");
        self.order = order;
    }

    fn position(&self, inst: Inst) -> usize {
        self.order
            .iter()
            .position(|&i| i == inst)
            .expect("instruction not in layout")
    }
}

/// The layout of a unit: blocks for functions and processes, a flat
/// list for entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UnitLayout {
    /// Block-structured layout.
    Cfg(CfgLayout),
    /// Flat entity layout.
    Flat(FlatLayout),
}

impl UnitLayout {
    /// The CFG layout of a function or process.
    ///
    /// # Panics
    ///
    /// Panics if this is an entity layout.
    pub fn cfg(&self) -> &CfgLayout {
        match self {
            UnitLayout::Cfg(layout) => layout,
            UnitLayout::Flat(_) => panic!("cfg layout requested on an entity"),
        }
    }

    /// Mutable access to the CFG layout of a function or process.
    ///
    /// # Panics
    ///
    /// Panics if this is an entity layout.
    pub fn cfg_mut(&mut self) -> &mut CfgLayout {
        match self {
            UnitLayout::Cfg(layout) => layout,
            UnitLayout::Flat(_) => panic!("cfg layout requested on an entity"),
        }
    }

    /// The flat layout of an entity.
    ///
    /// # Panics
    ///
    /// Panics if this is a CFG layout.
    pub fn flat(&self) -> &FlatLayout {
        match self {
            UnitLayout::Flat(layout) => layout,
            UnitLayout::Cfg(_) => panic!("flat layout requested on a CFG unit"),
        }
    }

    /// Mutable access to the flat layout of an entity.
    ///
    /// # Panics
    ///
    /// Panics if this is a CFG layout.
    pub fn flat_mut(&mut self) -> &mut FlatLayout {
        match self {
            UnitLayout::Flat(layout) => layout,
            UnitLayout::Cfg(_) => panic!("flat layout requested on a CFG unit"),
        }
    }

    /// Iterates over all instructions of the unit in layout order.
    pub fn all_insts(&self) -> Box<dyn Iterator<Item = Inst> + '_> {
        match self {
            UnitLayout::Cfg(layout) => Box::new(layout.all_insts()),
            UnitLayout::Flat(layout) => Box::new(layout.insts()),
        }
    }

    /// Unlinks an instruction from wherever it is placed.
    pub fn remove_inst(&mut self, inst: Inst) {
        match self {
            UnitLayout::Cfg(layout) => layout.remove_inst(inst),
            UnitLayout::Flat(layout) => layout.remove_inst(inst),
        }
    }

    /// Returns `true` if the instruction is placed in this layout.
    pub fn contains_inst(&self, inst: Inst) -> bool {
        match self {
            UnitLayout::Cfg(layout) => layout.inst_block(inst).is_some(),
            UnitLayout::Flat(layout) => layout.contains(inst),
        }
    }
}
