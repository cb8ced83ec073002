//! Dead code elimination.

use crate::pass::{Pass, PassContext};
use log::debug;
use silica_ir::{
    Block, DominatorTree, Inst, PredecessorTable, UnitBuilder, UnitData, UnitKind,
};

/// Dead code elimination (`dce`).
///
/// Erases side-effect-free instructions whose results are unused,
/// cascading through chains that become dead, and removes blocks that
/// are unreachable from the entry.
pub struct DeadCodeElim;

impl Pass for DeadCodeElim {
    const NAME: &'static str = "dce";

    fn run_on_unit(_ctx: &PassContext, unit: &mut UnitData) -> bool {
        let mut modified = prune_insts(unit);
        if unit.kind() != UnitKind::Entity {
            modified |= prune_unreachable_blocks(unit);
        }
        modified
    }
}

/// Sweeps all instructions in reverse layout order so that whole dead
/// chains disappear in a single pass.
fn prune_insts(unit: &mut UnitData) -> bool {
    let insts: Vec<Inst> = unit.layout.all_insts().collect();
    let mut builder = UnitBuilder::new(unit);
    let mut modified = false;
    for inst in insts.into_iter().rev() {
        if builder.dfg().contains_inst(inst) && builder.prune_if_unused(inst) {
            modified = true;
        }
    }
    modified
}

/// Removes blocks that no path from the entry reaches, including their
/// instructions (side effects in unreachable code never happen).
fn prune_unreachable_blocks(unit: &mut UnitData) -> bool {
    let pt = PredecessorTable::new(unit);
    let dt = DominatorTree::new(unit, &pt);
    let unreachable: Vec<Block> = unit
        .layout
        .cfg()
        .blocks()
        .filter(|&bb| !dt.is_reachable(bb))
        .collect();
    if unreachable.is_empty() {
        return false;
    }

    // Values defined in unreachable blocks may feed other unreachable
    // instructions; iterate until nothing more can be removed.
    let mut modified = false;
    loop {
        let mut removed = false;
        for &bb in &unreachable {
            for inst in unit.layout.cfg().insts(bb).to_vec().into_iter().rev() {
                let unused = unit
                    .dfg
                    .get_inst_result(inst)
                    .map_or(true, |result| !unit.dfg.has_uses(result));
                if unused {
                    unit.layout.cfg_mut().remove_inst(inst);
                    unit.dfg.remove_inst(inst);
                    removed = true;
                    modified = true;
                }
            }
        }
        if !removed {
            break;
        }
    }
    for bb in unreachable {
        if unit.layout.cfg().insts(bb).is_empty() {
            debug!("removing unreachable block bb{}", bb.as_raw());
            unit.layout.cfg_mut().remove_block(bb);
            modified = true;
        }
    }
    modified
}

#[cfg(test)]
mod tests {
    use super::*;
    use silica_common::TimeValue;
    use silica_ir::{Signature, Type, UnitName};

    fn ctx() -> PassContext {
        PassContext::default()
    }

    #[test]
    fn removes_dead_chain() {
        let mut unit = UnitData::new(
            UnitKind::Function,
            UnitName::new("f"),
            Signature::new_function(vec![Type::Int(32)], Type::Int(32)),
        )
        .unwrap();
        let arg = unit.input_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        ub.named_block("entry");
        let a = ub.ins().const_int(32, 1).unwrap();
        let dead = ub.ins().add(a, a).unwrap();
        let deader = ub.ins().not(dead).unwrap();
        ub.ins().ret_value(arg).unwrap();
        assert!(DeadCodeElim::run_on_unit(&ctx(), &mut unit));
        assert_eq!(unit.layout.all_insts().count(), 1);
        let _ = deader;
    }

    #[test]
    fn keeps_live_and_effectful_code() {
        let mut unit = UnitData::new(
            UnitKind::Entity,
            UnitName::new("e"),
            Signature::new_ports(
                vec![Type::signal(Type::Int(8))],
                vec![Type::signal(Type::Int(8))],
            ),
        )
        .unwrap();
        let inp = unit.input_arg(0);
        let out = unit.output_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        let v = ub.ins().prb(inp).unwrap();
        let inv = ub.ins().not(v).unwrap();
        let t = ub.ins().const_time(TimeValue::delta_cycle()).unwrap();
        ub.ins().drv(out, inv, t).unwrap();
        // Everything feeds the drive; nothing to remove.
        assert!(!DeadCodeElim::run_on_unit(&ctx(), &mut unit));
        assert_eq!(unit.layout.all_insts().count(), 4);
    }

    #[test]
    fn removes_unreachable_block() {
        let mut unit = UnitData::new(
            UnitKind::Function,
            UnitName::new("f"),
            Signature::new_function(vec![], Type::Int(32)),
        )
        .unwrap();
        let mut ub = UnitBuilder::new(&mut unit);
        let entry = ub.named_block("entry");
        let orphan = ub.named_block("orphan");
        ub.append_to(entry);
        let k = ub.ins().const_int(32, 0).unwrap();
        ub.ins().ret_value(k).unwrap();
        ub.append_to(orphan);
        let a = ub.ins().const_int(32, 1).unwrap();
        let b = ub.ins().not(a).unwrap();
        ub.ins().ret_value(b).unwrap();

        assert!(DeadCodeElim::run_on_unit(&ctx(), &mut unit));
        let blocks: Vec<Block> = unit.layout.cfg().blocks().collect();
        assert_eq!(blocks, vec![entry]);
        assert_eq!(unit.layout.all_insts().count(), 2);
    }
}
