//! Dominance analysis over the block CFG of a function or process.
//!
//! The [`DominatorTree`] is computed by iterative dataflow over the
//! reverse post-order, then extended to instructions: a definition
//! dominates a use iff they share a block and the definition comes
//! first, or the definition's block strictly dominates the use's block.
//! Blocks unreachable from the entry are vacuously dominated by
//! everything.

use crate::ids::{Block, Inst};
use crate::unit::UnitData;
use std::collections::{BTreeMap, BTreeSet};

/// The predecessor and successor sets of every block in a unit.
#[derive(Debug, Clone)]
pub struct PredecessorTable {
    preds: BTreeMap<Block, Vec<Block>>,
    succs: BTreeMap<Block, Vec<Block>>,
}

impl PredecessorTable {
    /// Computes the table for a function or process.
    ///
    /// # Panics
    ///
    /// Panics on an entity, which has no CFG.
    pub fn new(unit: &UnitData) -> Self {
        let layout = unit.layout.cfg();
        let mut preds: BTreeMap<Block, Vec<Block>> =
            layout.blocks().map(|bb| (bb, Vec::new())).collect();
        let mut succs: BTreeMap<Block, Vec<Block>> =
            layout.blocks().map(|bb| (bb, Vec::new())).collect();
        for bb in layout.blocks() {
            if let Some(term) = layout.last_inst(bb) {
                // Targets outside the unit are a verifier diagnostic,
                // not an edge.
                for &target in unit.dfg[term].blocks() {
                    if preds.contains_key(&target) {
                        succs.get_mut(&bb).unwrap().push(target);
                        preds.get_mut(&target).unwrap().push(bb);
                    }
                }
            }
        }
        Self { preds, succs }
    }

    /// The predecessors of a block.
    pub fn preds(&self, bb: Block) -> &[Block] {
        &self.preds[&bb]
    }

    /// The successors of a block.
    pub fn succs(&self, bb: Block) -> &[Block] {
        &self.succs[&bb]
    }
}

/// The dominator tree of a unit's block CFG.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// Immediate dominators; the entry maps to itself.
    idom: BTreeMap<Block, Block>,
    /// Position of each reachable block in reverse post-order.
    rpo_index: BTreeMap<Block, usize>,
}

impl DominatorTree {
    /// Computes the dominator tree for a function or process.
    pub fn new(unit: &UnitData, pt: &PredecessorTable) -> Self {
        let layout = unit.layout.cfg();
        let entry = match layout.entry() {
            Some(entry) => entry,
            None => {
                return Self {
                    idom: BTreeMap::new(),
                    rpo_index: BTreeMap::new(),
                }
            }
        };

        // Reverse post-order over the successor graph.
        let mut visited = BTreeSet::new();
        let mut post_order = Vec::new();
        let mut stack = vec![(entry, 0usize)];
        visited.insert(entry);
        while let Some(&(bb, next)) = stack.last() {
            let succs = pt.succs(bb);
            if next < succs.len() {
                stack.last_mut().unwrap().1 += 1;
                let succ = succs[next];
                if visited.insert(succ) {
                    stack.push((succ, 0));
                }
            } else {
                post_order.push(bb);
                stack.pop();
            }
        }
        let rpo: Vec<Block> = post_order.into_iter().rev().collect();
        let rpo_index: BTreeMap<Block, usize> =
            rpo.iter().enumerate().map(|(i, &bb)| (bb, i)).collect();

        // Iterative dataflow (Cooper/Harvey/Kennedy).
        let mut idom: BTreeMap<Block, Block> = BTreeMap::new();
        idom.insert(entry, entry);
        let intersect = |idom: &BTreeMap<Block, Block>, mut a: Block, mut b: Block| {
            while a != b {
                while rpo_index[&a] > rpo_index[&b] {
                    a = idom[&a];
                }
                while rpo_index[&b] > rpo_index[&a] {
                    b = idom[&b];
                }
            }
            a
        };
        let mut changed = true;
        while changed {
            changed = false;
            for &bb in rpo.iter().skip(1) {
                let mut new_idom = None;
                for &pred in pt.preds(bb) {
                    if !idom.contains_key(&pred) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(cur) => intersect(&idom, pred, cur),
                    });
                }
                if let Some(new_idom) = new_idom {
                    if idom.get(&bb) != Some(&new_idom) {
                        idom.insert(bb, new_idom);
                        changed = true;
                    }
                }
            }
        }

        Self { idom, rpo_index }
    }

    /// Returns `true` if the block is reachable from the entry.
    pub fn is_reachable(&self, bb: Block) -> bool {
        self.rpo_index.contains_key(&bb)
    }

    /// Returns `true` if `a` dominates `b`. Unreachable blocks are
    /// vacuously dominated by everything.
    pub fn block_dominates(&self, a: Block, b: Block) -> bool {
        if !self.is_reachable(b) {
            return true;
        }
        if !self.is_reachable(a) {
            return false;
        }
        let mut x = b;
        loop {
            if x == a {
                return true;
            }
            let up = self.idom[&x];
            if up == x {
                return false;
            }
            x = up;
        }
    }

    /// Returns `true` if `a` strictly dominates `b`.
    pub fn block_strictly_dominates(&self, a: Block, b: Block) -> bool {
        a != b && self.block_dominates(a, b)
    }

    /// Returns `true` if the definition `def` dominates the instruction
    /// `user`: either both lie in the same block with `def` first, or
    /// `def`'s block strictly dominates `user`'s block.
    pub fn inst_dominates(&self, unit: &UnitData, def: Inst, user: Inst) -> bool {
        let layout = unit.layout.cfg();
        let (def_bb, def_pos) = match layout.inst_position(def) {
            Some(p) => p,
            None => return false,
        };
        let (user_bb, user_pos) = match layout.inst_position(user) {
            Some(p) => p,
            None => return false,
        };
        if def_bb == user_bb {
            def_pos < user_pos
        } else {
            self.block_strictly_dominates(def_bb, user_bb)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::UnitBuilder;
    use crate::ty::Type;
    use crate::unit::{Signature, UnitKind, UnitName};

    fn function() -> UnitData {
        UnitData::new(
            UnitKind::Function,
            UnitName::new("f"),
            Signature::new_function(vec![Type::Int(1)], Type::Int(32)),
        )
        .unwrap()
    }

    /// entry -> (then | else) -> merge, the classic diamond.
    fn diamond() -> (UnitData, [Block; 4]) {
        let mut unit = function();
        let cond = unit.input_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        let entry = ub.named_block("entry");
        let then_bb = ub.named_block("then");
        let else_bb = ub.named_block("else");
        let merge = ub.named_block("merge");
        ub.append_to(entry);
        ub.ins().br_cond(cond, then_bb, else_bb).unwrap();
        ub.append_to(then_bb);
        ub.ins().br(merge).unwrap();
        ub.append_to(else_bb);
        ub.ins().br(merge).unwrap();
        ub.append_to(merge);
        let k = ub.ins().const_int(32, 0).unwrap();
        ub.ins().ret_value(k).unwrap();
        (unit, [entry, then_bb, else_bb, merge])
    }

    #[test]
    fn preds_and_succs() {
        let (unit, [entry, then_bb, else_bb, merge]) = diamond();
        let pt = PredecessorTable::new(&unit);
        assert_eq!(pt.succs(entry), &[then_bb, else_bb]);
        assert_eq!(pt.preds(merge), &[then_bb, else_bb]);
        assert_eq!(pt.preds(entry), &[] as &[Block]);
    }

    #[test]
    fn diamond_dominance() {
        let (unit, [entry, then_bb, else_bb, merge]) = diamond();
        let pt = PredecessorTable::new(&unit);
        let dt = DominatorTree::new(&unit, &pt);
        assert!(dt.block_dominates(entry, merge));
        assert!(dt.block_dominates(entry, then_bb));
        assert!(!dt.block_dominates(then_bb, merge));
        assert!(!dt.block_dominates(else_bb, merge));
        assert!(dt.block_dominates(merge, merge));
        assert!(!dt.block_strictly_dominates(merge, merge));
        assert!(dt.block_strictly_dominates(entry, merge));
    }

    #[test]
    fn loop_dominance() {
        let mut unit = function();
        let cond = unit.input_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        let entry = ub.named_block("entry");
        let body = ub.named_block("body");
        let exit = ub.named_block("exit");
        ub.append_to(entry);
        ub.ins().br(body).unwrap();
        ub.append_to(body);
        ub.ins().br_cond(cond, body, exit).unwrap();
        ub.append_to(exit);
        let k = ub.ins().const_int(32, 0).unwrap();
        ub.ins().ret_value(k).unwrap();

        let pt = PredecessorTable::new(&unit);
        let dt = DominatorTree::new(&unit, &pt);
        assert!(dt.block_dominates(entry, body));
        assert!(dt.block_dominates(body, exit));
        assert!(!dt.block_dominates(exit, body));
    }

    #[test]
    fn inst_dominance_within_block() {
        let mut unit = function();
        let mut ub = UnitBuilder::new(&mut unit);
        ub.named_block("entry");
        let a = ub.ins().const_int(32, 1).unwrap();
        let b = ub.ins().add(a, a).unwrap();
        ub.ins().ret_value(b).unwrap();
        let a_inst = unit.dfg.get_value_inst(a).unwrap();
        let b_inst = unit.dfg.get_value_inst(b).unwrap();
        let pt = PredecessorTable::new(&unit);
        let dt = DominatorTree::new(&unit, &pt);
        assert!(dt.inst_dominates(&unit, a_inst, b_inst));
        assert!(!dt.inst_dominates(&unit, b_inst, a_inst));
        assert!(!dt.inst_dominates(&unit, a_inst, a_inst));
    }

    #[test]
    fn unreachable_blocks_are_vacuously_dominated() {
        let mut unit = function();
        let mut ub = UnitBuilder::new(&mut unit);
        let entry = ub.named_block("entry");
        let orphan = ub.named_block("orphan");
        ub.append_to(entry);
        let k = ub.ins().const_int(32, 0).unwrap();
        ub.ins().ret_value(k).unwrap();
        ub.append_to(orphan);
        let k2 = ub.ins().const_int(32, 1).unwrap();
        ub.ins().ret_value(k2).unwrap();

        let pt = PredecessorTable::new(&unit);
        let dt = DominatorTree::new(&unit, &pt);
        assert!(!dt.is_reachable(orphan));
        assert!(dt.block_dominates(entry, orphan));
        assert!(!dt.block_dominates(orphan, entry));
    }
}
