//! Process lowering.

use crate::pass::{Pass, PassContext};
use log::debug;
use silica_ir::{
    Block, Inst, Module, Opcode, UnitBuilder, UnitData, UnitKind, Value,
};
use std::collections::{BTreeMap, BTreeSet};

/// Process lowering (`proclower`).
///
/// Rewrites a process as a behaviorally equivalent entity when its body
/// is a single wait loop whose explicit sensitivity lists cover every
/// probed signal, and no value other than a constant crosses the wait
/// boundary. The entity keeps the process's name and port signature;
/// the wait and the loop back-edge disappear. Processes that do not fit
/// are left untouched.
pub struct ProcessLowering;

impl Pass for ProcessLowering {
    const NAME: &'static str = "proclower";

    fn run_on_module(_ctx: &PassContext, module: &mut Module) -> bool {
        let mut modified = false;
        for id in module.unit_ids() {
            let lowered = {
                let unit = match module.get(id).get_data() {
                    Some(unit) if unit.kind() == UnitKind::Process => unit,
                    _ => continue,
                };
                match lower_process(unit) {
                    Ok(entity) => {
                        debug!("lowered {}", unit.headline());
                        Some(entity)
                    }
                    Err(reason) => {
                        debug!("proclower declined {}: {}", unit.headline(), reason);
                        None
                    }
                }
            };
            if let Some(entity) = lowered {
                module
                    .replace_unit(id, entity)
                    .expect("replacement keeps the unit name");
                modified = true;
            }
        }
        modified
    }
}

/// Attempts to lower one process; errors are decline reasons.
fn lower_process(unit: &UnitData) -> Result<UnitData, String> {
    let layout = unit.layout.cfg();
    let blocks: Vec<Block> = layout.blocks().collect();
    let entry = *blocks.first().ok_or("process has no blocks")?;
    if blocks.len() > 2 {
        return Err("body is not a single wait loop".into());
    }

    // Terminators: waits resuming inside the loop, and branches back to
    // the entry.
    let mut saw_wait = false;
    for &bb in &blocks {
        let term = layout.last_inst(bb).ok_or("unterminated block")?;
        match unit.dfg[term].opcode() {
            Opcode::Wait => {
                saw_wait = true;
                let target = unit.dfg[term].blocks()[0];
                if !blocks.contains(&target) {
                    return Err("wait resumes outside the loop".into());
                }
            }
            Opcode::Br => {
                if unit.dfg[term].blocks()[0] != entry {
                    return Err("branch does not return to the entry block".into());
                }
            }
            Opcode::Halt => return Err("process halts".into()),
            Opcode::WaitTime => return Err("timed wait cannot be lowered".into()),
            Opcode::BrCond => return Err("conditional control flow cannot be collapsed".into()),
            _ => return Err("unsupported terminator".into()),
        }
    }
    if !saw_wait {
        return Err("process never suspends".into());
    }

    // The computed sensitivity set: every signal the body probes. Only
    // port probes are meaningful here; a process cannot declare signals.
    let mut sensed: BTreeSet<Value> = BTreeSet::new();
    for inst in layout.all_insts() {
        if unit.dfg[inst].opcode() == Opcode::Prb {
            let sig = unit.dfg[inst].args()[0];
            if unit.dfg.get_value_inst(sig).is_some() {
                return Err("probe of a non-port signal".into());
            }
            sensed.insert(sig);
        }
    }

    // Every explicit list must cover the computed set; extra entries are
    // permitted.
    for &bb in &blocks {
        let term = layout.last_inst(bb).unwrap();
        if unit.dfg[term].opcode() == Opcode::Wait {
            let listed: BTreeSet<Value> =
                unit.dfg[term].wait_signals().iter().copied().collect();
            if !sensed.is_subset(&listed) {
                return Err("sensitivity list is missing probed signals".into());
            }
        }
    }

    // Nothing but constants may cross the wait boundary; persistent
    // state must already have been lifted to registers or signals.
    if let [init, check] = blocks[..] {
        for &inst in layout.insts(check) {
            for &arg in unit.dfg[inst].args() {
                if let Some(def) = unit.dfg.get_value_inst(arg) {
                    if layout.inst_block(def) == Some(init)
                        && !unit.dfg[def].opcode().is_const()
                    {
                        return Err("value crosses the wait boundary".into());
                    }
                }
            }
        }
    }

    // Collapse the loop body into a flat entity.
    let mut entity = UnitData::new(
        UnitKind::Entity,
        unit.name().clone(),
        unit.sig().clone(),
    )
    .map_err(|err| err.to_string())?;
    let mut map: BTreeMap<Value, Value> = BTreeMap::new();
    for (index, &old) in unit.dfg.args().iter().enumerate() {
        let new = entity.dfg.arg_value(index);
        map.insert(old, new);
        if let Some(name) = unit.dfg.value_name(old) {
            let name = name.to_string();
            entity.dfg.set_value_name(new, name);
        }
    }

    let mut ub = UnitBuilder::new(&mut entity);
    for &bb in &blocks {
        for &inst in layout.insts(bb) {
            let data = &unit.dfg[inst];
            if data.opcode().is_terminator() {
                continue;
            }
            if data.opcode() == Opcode::Call {
                return Err("call cannot appear in an entity".into());
            }
            let mut cloned = data.clone();
            for arg in cloned.args_mut() {
                *arg = *map
                    .get(arg)
                    .ok_or("operand is not available after lowering")?;
            }
            let new_inst = ub.build_data(cloned).map_err(|err| err.to_string())?;
            if let Some(old) = unit.dfg.get_inst_result(inst) {
                let new = ub.dfg().inst_result(new_inst);
                map.insert(old, new);
                if let Some(name) = unit.dfg.value_name(old) {
                    let name = name.to_string();
                    ub.dfg_mut().set_value_name(new, name);
                }
            }
        }
    }

    // Cloned constants or probes that only fed the wait loop are dead in
    // the entity.
    let cloned: Vec<Inst> = ub.unit().layout.all_insts().collect();
    for inst in cloned.into_iter().rev() {
        if ub.dfg().contains_inst(inst) {
            ub.prune_if_unused(inst);
        }
    }

    Ok(entity)
}
