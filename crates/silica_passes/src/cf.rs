//! Constant folding.

use crate::pass::{Pass, PassContext};
use log::debug;
use silica_common::{IntValue, Logic, LogicVec};
use silica_ir::{DataFlowGraph, Inst, InstData, Opcode, Type, UnitBuilder, Value};
use std::cmp::Ordering;

/// Constant folding (`cf`).
///
/// Evaluates instructions whose operands are constants, replaces their
/// uses with the folded constant, and erases the instructions that
/// thereby become dead. Conditional branches and gated drives with
/// constant conditions are rewritten to their unconditional forms.
pub struct ConstFolding;

impl Pass for ConstFolding {
    const NAME: &'static str = "cf";

    fn run_on_inst(_ctx: &PassContext, inst: Inst, ub: &mut UnitBuilder) -> bool {
        match ub.dfg()[inst].opcode() {
            Opcode::DrvCond => fold_gated_drive(inst, ub),
            Opcode::BrCond => fold_branch(inst, ub),
            _ => fold_value(inst, ub),
        }
    }
}

fn const_int_of(dfg: &DataFlowGraph, value: Value) -> Option<IntValue> {
    dfg.get_value_inst(value)
        .and_then(|inst| dfg[inst].get_const_int())
        .cloned()
}

fn const_logic_of(dfg: &DataFlowGraph, value: Value) -> Option<LogicVec> {
    dfg.get_value_inst(value)
        .and_then(|inst| dfg[inst].get_const_logic())
        .cloned()
}

/// `drv ... if 0` is removed, `drv ... if 1` becomes an ungated drive.
fn fold_gated_drive(inst: Inst, ub: &mut UnitBuilder) -> bool {
    let dfg = ub.dfg();
    let args = dfg[inst].args().to_vec();
    let gate = match const_int_of(dfg, args[3]) {
        Some(gate) => gate,
        None => return false,
    };
    debug!(
        "folding gate of {}",
        inst.dump(ub.dfg(), cfg_of(ub))
    );
    ub.insert_before(inst);
    if gate.is_one() {
        ub.ins()
            .drv(args[0], args[1], args[2])
            .expect("ungated form of a valid drive must build");
    }
    ub.remove_inst(inst);
    for value in args {
        if let Some(def) = ub.dfg().get_value_inst(value) {
            ub.prune_if_unused(def);
        }
    }
    true
}

/// `br` on a constant condition becomes an unconditional branch.
fn fold_branch(inst: Inst, ub: &mut UnitBuilder) -> bool {
    let dfg = ub.dfg();
    let cond_value = dfg[inst].args()[0];
    let cond = match const_int_of(dfg, cond_value) {
        Some(cond) => cond,
        None => return false,
    };
    let bbs = dfg[inst].blocks().to_vec();
    let target = if cond.is_one() { bbs[0] } else { bbs[1] };
    debug!("folding {}", inst.dump(ub.dfg(), cfg_of(ub)));
    ub.insert_before(inst);
    ub.ins()
        .br(target)
        .expect("unconditional branch must build");
    ub.remove_inst(inst);
    if let Some(def) = ub.dfg().get_value_inst(cond_value) {
        ub.prune_if_unused(def);
    }
    true
}

/// Folds result-producing instructions over constant operands.
fn fold_value(inst: Inst, ub: &mut UnitBuilder) -> bool {
    let dfg = ub.dfg();
    let result = match dfg.get_inst_result(inst) {
        Some(result) => result,
        None => return false,
    };
    let opcode = dfg[inst].opcode();
    let args = dfg[inst].args().to_vec();
    match opcode {
        Opcode::Not => {
            if let Some(a) = const_int_of(dfg, args[0]) {
                return replace_with_int(inst, result, a.not(), ub);
            }
            if let Some(a) = const_logic_of(dfg, args[0]) {
                return replace_with_logic(inst, result, !&a, ub);
            }
            false
        }
        Opcode::Add
        | Opcode::Sub
        | Opcode::Mul
        | Opcode::Udiv
        | Opcode::Sdiv
        | Opcode::Urem
        | Opcode::Srem => {
            let (a, b) = match (const_int_of(dfg, args[0]), const_int_of(dfg, args[1])) {
                (Some(a), Some(b)) => (a, b),
                _ => return false,
            };
            let folded = match opcode {
                Opcode::Add => Some(a.add(&b)),
                Opcode::Sub => Some(a.sub(&b)),
                Opcode::Mul => Some(a.mul(&b)),
                Opcode::Udiv => a.udiv(&b),
                Opcode::Sdiv => a.sdiv(&b),
                Opcode::Urem => a.urem(&b),
                Opcode::Srem => a.srem(&b),
                _ => unreachable!(),
            };
            match folded {
                // Division by zero stays dynamic.
                Some(folded) => replace_with_int(inst, result, folded, ub),
                None => false,
            }
        }
        Opcode::And | Opcode::Or | Opcode::Xor => {
            if let (Some(a), Some(b)) = (const_int_of(dfg, args[0]), const_int_of(dfg, args[1])) {
                let folded = match opcode {
                    Opcode::And => a.and(&b),
                    Opcode::Or => a.or(&b),
                    _ => a.xor(&b),
                };
                return replace_with_int(inst, result, folded, ub);
            }
            if let (Some(a), Some(b)) =
                (const_logic_of(dfg, args[0]), const_logic_of(dfg, args[1]))
            {
                let folded = match opcode {
                    Opcode::And => &a & &b,
                    Opcode::Or => &a | &b,
                    _ => &a ^ &b,
                };
                return replace_with_logic(inst, result, folded, ub);
            }
            false
        }
        Opcode::Shl | Opcode::Lshr | Opcode::Ashr => {
            let (a, amount) = match (const_int_of(dfg, args[0]), const_int_of(dfg, args[1])) {
                (Some(a), Some(b)) => match b.to_u64() {
                    Some(amount) => (a, amount),
                    None => return false,
                },
                _ => return false,
            };
            let folded = match opcode {
                Opcode::Shl => a.shl(amount),
                Opcode::Lshr => a.lshr(amount),
                _ => a.ashr(amount),
            };
            replace_with_int(inst, result, folded, ub)
        }
        Opcode::Eq
        | Opcode::Ne
        | Opcode::Ult
        | Opcode::Ugt
        | Opcode::Ule
        | Opcode::Uge
        | Opcode::Slt
        | Opcode::Sgt
        | Opcode::Sle
        | Opcode::Sge => {
            let (a, b) = match (const_int_of(dfg, args[0]), const_int_of(dfg, args[1])) {
                (Some(a), Some(b)) => (a, b),
                _ => return false,
            };
            let holds = match opcode {
                Opcode::Eq => a == b,
                Opcode::Ne => a != b,
                Opcode::Ult => a.ucmp(&b) == Ordering::Less,
                Opcode::Ugt => a.ucmp(&b) == Ordering::Greater,
                Opcode::Ule => a.ucmp(&b) != Ordering::Greater,
                Opcode::Uge => a.ucmp(&b) != Ordering::Less,
                Opcode::Slt => a.scmp(&b) == Ordering::Less,
                Opcode::Sgt => a.scmp(&b) == Ordering::Greater,
                Opcode::Sle => a.scmp(&b) != Ordering::Greater,
                _ => a.scmp(&b) != Ordering::Less,
            };
            replace_with_int(inst, result, IntValue::from_i64(1, holds as i64), ub)
        }
        Opcode::Mux => fold_mux(inst, result, &args, ub),
        _ => false,
    }
}

/// A mux over a literal array with a constant selector picks the chosen
/// element; an out-of-range constant selector yields zero for integer
/// elements and all-`X` for logic elements.
fn fold_mux(inst: Inst, result: Value, args: &[Value], ub: &mut UnitBuilder) -> bool {
    let dfg = ub.dfg();
    let sel = match const_int_of(dfg, args[0]) {
        Some(sel) => sel,
        None => return false,
    };
    let elements = match dfg.get_value_inst(args[1]).map(|def| &dfg[def]) {
        Some(InstData::Aggregate {
            opcode: Opcode::Array,
            args,
        }) => args.clone(),
        _ => return false,
    };
    match sel.to_u64() {
        Some(index) if (index as usize) < elements.len() => {
            let chosen = elements[index as usize];
            debug!("folding {}", inst.dump(ub.dfg(), cfg_of(ub)));
            ub.dfg_mut().replace_all_uses(result, chosen);
            ub.prune_if_unused(inst);
            true
        }
        _ => match ub.dfg().value_type(result).clone() {
            Type::Int(w) => replace_with_int(inst, result, IntValue::zero(w), ub),
            Type::Logic(w) => {
                replace_with_logic(inst, result, LogicVec::filled(w, Logic::X), ub)
            }
            _ => false,
        },
    }
}

fn replace_with_int(inst: Inst, result: Value, folded: IntValue, ub: &mut UnitBuilder) -> bool {
    debug!("folding {}", inst.dump(ub.dfg(), cfg_of(ub)));
    ub.insert_before(inst);
    let konst = ub
        .ins()
        .const_int_value(folded)
        .expect("folded constant must build");
    ub.dfg_mut().replace_all_uses(result, konst);
    ub.prune_if_unused(inst);
    true
}

fn replace_with_logic(inst: Inst, result: Value, folded: LogicVec, ub: &mut UnitBuilder) -> bool {
    debug!("folding {}", inst.dump(ub.dfg(), cfg_of(ub)));
    ub.insert_before(inst);
    let konst = ub
        .ins()
        .const_logic(folded)
        .expect("folded constant must build");
    ub.dfg_mut().replace_all_uses(result, konst);
    ub.prune_if_unused(inst);
    true
}

fn cfg_of<'a>(ub: &'a UnitBuilder) -> Option<&'a silica_ir::CfgLayout> {
    match &ub.unit().layout {
        silica_ir::UnitLayout::Cfg(layout) => Some(layout),
        silica_ir::UnitLayout::Flat(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silica_ir::{Signature, UnitData, UnitKind, UnitName};

    fn function() -> UnitData {
        UnitData::new(
            UnitKind::Function,
            UnitName::new("f"),
            Signature::new_function(vec![Type::Int(32)], Type::Int(32)),
        )
        .unwrap()
    }

    fn ctx() -> PassContext {
        PassContext::default()
    }

    #[test]
    fn folds_arithmetic_chain() {
        let mut unit = function();
        let mut ub = UnitBuilder::new(&mut unit);
        ub.named_block("entry");
        let a = ub.ins().const_int(32, 20).unwrap();
        let b = ub.ins().const_int(32, 22).unwrap();
        let sum = ub.ins().add(a, b).unwrap();
        ub.ins().ret_value(sum).unwrap();
        assert!(ConstFolding::run_on_unit(&ctx(), &mut unit));
        // Only the folded constant and the return remain.
        let insts: Vec<Inst> = unit.layout.all_insts().collect();
        assert_eq!(insts.len(), 2);
        let folded = unit.dfg[insts[0]].get_const_int().unwrap();
        assert_eq!(folded.to_u64(), Some(42));
    }

    #[test]
    fn folds_comparison_and_branch() {
        let mut unit = function();
        let mut ub = UnitBuilder::new(&mut unit);
        let entry = ub.named_block("entry");
        let then_bb = ub.named_block("then");
        let else_bb = ub.named_block("else");
        ub.append_to(then_bb);
        let k1 = ub.ins().const_int(32, 1).unwrap();
        ub.ins().ret_value(k1).unwrap();
        ub.append_to(else_bb);
        let k2 = ub.ins().const_int(32, 2).unwrap();
        ub.ins().ret_value(k2).unwrap();
        ub.append_to(entry);
        let a = ub.ins().const_int(8, 3).unwrap();
        let b = ub.ins().const_int(8, 4).unwrap();
        let lt = ub.ins().ult(a, b).unwrap();
        ub.ins().br_cond(lt, then_bb, else_bb).unwrap();

        assert!(ConstFolding::run_on_unit(&ctx(), &mut unit));
        // The comparison folded to 1 and the branch became unconditional.
        let entry_insts = unit.layout.cfg().insts(entry).to_vec();
        assert_eq!(entry_insts.len(), 1);
        assert_eq!(unit.dfg[entry_insts[0]].opcode(), Opcode::Br);
        assert_eq!(unit.dfg[entry_insts[0]].blocks(), &[then_bb]);
    }

    #[test]
    fn folds_logic_ops() {
        let mut unit = function();
        let mut ub = UnitBuilder::new(&mut unit);
        ub.named_block("entry");
        let a = ub
            .ins()
            .const_logic(LogicVec::from_symbols("1X0").unwrap())
            .unwrap();
        let b = ub
            .ins()
            .const_logic(LogicVec::from_symbols("110").unwrap())
            .unwrap();
        let and = ub.ins().and(a, b).unwrap();
        let k = ub.ins().const_int(32, 0).unwrap();
        ub.ins().ret_value(k).unwrap();
        assert!(ConstFolding::run_on_unit(&ctx(), &mut unit));
        // `and` became a constant; the dead inputs were pruned with it.
        let logic_consts: Vec<&LogicVec> = unit
            .layout
            .all_insts()
            .filter_map(|i| unit.dfg[i].get_const_logic())
            .collect();
        assert_eq!(logic_consts.len(), 1);
        assert_eq!(logic_consts[0].to_symbols(), "1X0");
        let _ = and;
    }

    #[test]
    fn folds_mux_with_constant_selector() {
        let mut unit = function();
        let arg = unit.input_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        ub.named_block("entry");
        let k = ub.ins().const_int(32, 7).unwrap();
        let arr = ub.ins().array(vec![k, arg]).unwrap();
        let sel = ub.ins().const_int(1, 1).unwrap();
        let picked = ub.ins().mux(sel, arr).unwrap();
        ub.ins().ret_value(picked).unwrap();
        assert!(ConstFolding::run_on_unit(&ctx(), &mut unit));
        // Selector 1 picks the argument.
        let ret = unit.layout.all_insts().last().unwrap();
        assert_eq!(unit.dfg[ret].args(), &[arg]);
    }

    #[test]
    fn out_of_range_mux_selector_folds_to_zero() {
        let mut unit = function();
        let arg = unit.input_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        ub.named_block("entry");
        let arr = ub.ins().array(vec![arg, arg]).unwrap();
        let sel = ub.ins().const_int(2, 3).unwrap();
        let picked = ub.ins().mux(sel, arr).unwrap();
        ub.ins().ret_value(picked).unwrap();
        assert!(ConstFolding::run_on_unit(&ctx(), &mut unit));
        let ret = unit.layout.all_insts().last().unwrap();
        let ret_arg = unit.dfg[ret].args()[0];
        let def = unit.dfg.get_value_inst(ret_arg).unwrap();
        assert!(unit.dfg[def].get_const_int().unwrap().is_zero());
    }

    #[test]
    fn dynamic_operands_stay() {
        let mut unit = function();
        let arg = unit.input_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        ub.named_block("entry");
        let k = ub.ins().const_int(32, 1).unwrap();
        let sum = ub.ins().add(arg, k).unwrap();
        ub.ins().ret_value(sum).unwrap();
        assert!(!ConstFolding::run_on_unit(&ctx(), &mut unit));
        assert_eq!(unit.layout.all_insts().count(), 3);
    }
}
