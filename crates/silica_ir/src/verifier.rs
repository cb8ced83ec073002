//! The accumulating well-formedness checker.
//!
//! The verifier re-checks every invariant the constructors enforce, plus
//! the placement invariants only a whole unit exhibits: terminator
//! totality, in-unit branch targets, dominance of definitions over uses,
//! entity acyclicity, use-list consistency, and module-level linkage of
//! `call`/`inst` references. It never stops at the first violation; all
//! diagnostics are accumulated and returned in batch.

use crate::dominance::{DominatorTree, PredecessorTable};
use crate::ids::Inst;
use crate::inst::{validate, Opcode};
use crate::module::Module;
use crate::ty::Type;
use crate::unit::{UnitData, UnitKind};
use std::collections::BTreeMap;
use std::fmt;

/// The severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A breach of a well-formedness invariant.
    Error,
    /// A suspicious construction that remains well-formed.
    Warning,
}

/// A single verifier diagnostic.
///
/// Renders as `<unit-kind> @<name>: <object>: <message>`, the stable
/// format downstream tools match on.
#[derive(Debug, Clone)]
pub struct VerifierError {
    /// The severity of the diagnostic.
    pub severity: Severity,
    /// The containing unit, e.g. `proc @shift`.
    pub unit: String,
    /// A printout of the offending object, usually an instruction.
    pub object: String,
    /// What is wrong with it.
    pub message: String,
}

impl fmt::Display for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.unit, self.object, self.message)
    }
}

/// The batch of diagnostics produced by a verifier run.
#[derive(Debug, Clone, Default)]
pub struct VerifierErrors(pub Vec<VerifierError>);

impl VerifierErrors {
    /// Returns `true` if any diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    /// The number of diagnostics.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no diagnostics were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VerifierErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "- {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for VerifierErrors {}

/// An accumulating verifier for units and modules.
#[derive(Debug, Default)]
pub struct Verifier {
    diags: Vec<VerifierError>,
}

impl Verifier {
    /// Creates a new verifier with no recorded diagnostics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies all units of a module, including cross-unit references.
    pub fn verify_module(&mut self, module: &Module) {
        for (_, slot) in module.units() {
            if let Some(unit) = slot.get_data() {
                self.verify_unit_linked(unit, Some(module));
            }
        }
    }

    /// Verifies a single unit without module context; `call` and `inst`
    /// references are only checked against their recorded signatures.
    pub fn verify_unit(&mut self, unit: &UnitData) {
        self.verify_unit_linked(unit, None);
    }

    /// Consumes the verifier, returning all accumulated diagnostics.
    pub fn finish(self) -> Result<(), VerifierErrors> {
        if self.diags.is_empty() {
            Ok(())
        } else {
            Err(VerifierErrors(self.diags))
        }
    }

    fn diag(&mut self, severity: Severity, unit: &UnitData, object: String, message: String) {
        self.diags.push(VerifierError {
            severity,
            unit: unit.headline(),
            object,
            message,
        });
    }

    fn error(&mut self, unit: &UnitData, object: String, message: impl Into<String>) {
        self.diag(Severity::Error, unit, object, message.into());
    }

    fn warning(&mut self, unit: &UnitData, object: String, message: impl Into<String>) {
        self.diag(Severity::Warning, unit, object, message.into());
    }

    fn dump_inst(&self, unit: &UnitData, inst: Inst) -> String {
        let layout = match &unit.layout {
            crate::layout::UnitLayout::Cfg(layout) => Some(layout),
            crate::layout::UnitLayout::Flat(_) => None,
        };
        format!("{}", inst.dump(&unit.dfg, layout))
    }

    fn verify_unit_linked(&mut self, unit: &UnitData, module: Option<&Module>) {
        self.check_signature(unit);
        self.check_insts(unit);
        self.check_use_lists(unit);
        match unit.kind() {
            UnitKind::Entity => self.check_entity(unit),
            _ => self.check_cfg(unit),
        }
        if let Some(module) = module {
            self.check_linkage(unit, module);
        }
    }

    fn check_signature(&mut self, unit: &UnitData) {
        let sig = unit.sig();
        match unit.kind() {
            UnitKind::Function => {
                if !sig.has_return_type() || sig.num_outputs() != 0 {
                    self.error(
                        unit,
                        "signature".into(),
                        "a function must have a return type and no output ports",
                    );
                }
                if let Some(ty) = sig.input_types().iter().find(|ty| ty.is_signal()) {
                    self.error(
                        unit,
                        "signature".into(),
                        format!("function parameters must be value types, got `{ty}`"),
                    );
                }
            }
            UnitKind::Process | UnitKind::Entity => {
                if sig.has_return_type() {
                    self.error(unit, "signature".into(), "ports cannot have a return type");
                }
                if let Some(ty) = sig.arg_types().find(|ty| !ty.is_signal()) {
                    self.error(
                        unit,
                        "signature".into(),
                        format!("ports must be of signal type, got `{ty}`"),
                    );
                }
            }
        }
    }

    /// Re-checks every placed instruction's operand contract, result
    /// type, and unit-kind admissibility.
    fn check_insts(&mut self, unit: &UnitData) {
        let placed: Vec<Inst> = unit.layout.all_insts().collect();
        for inst in placed {
            let data = &unit.dfg[inst];
            let opcode = data.opcode();
            let object = self.dump_inst(unit, inst);
            if !opcode.valid_in(unit.kind()) {
                self.error(
                    unit,
                    object.clone(),
                    format!("`{opcode}` is not valid in a {} unit", unit.kind()),
                );
            }
            match validate(&unit.dfg, data) {
                Err(err) => self.error(unit, object.clone(), err.to_string()),
                Ok(expected) => {
                    let actual = unit
                        .dfg
                        .get_inst_result(inst)
                        .map(|v| unit.dfg.value_type(v).clone())
                        .unwrap_or(Type::Void);
                    if actual != expected {
                        self.error(
                            unit,
                            object.clone(),
                            format!("result type is `{actual}`, expected `{expected}`"),
                        );
                    }
                }
            }
            if opcode == Opcode::RetValue {
                let found = unit.dfg.value_type(data.args()[0]);
                match unit.sig().return_type() {
                    Some(expected) if expected == found => {}
                    Some(expected) => self.error(
                        unit,
                        object.clone(),
                        format!("returns `{found}`, expected `{expected}`"),
                    ),
                    None => {}
                }
            }
            self.check_mux_bounds(unit, inst, &object);
        }
    }

    /// Flags constant mux selectors that provably exceed the array.
    fn check_mux_bounds(&mut self, unit: &UnitData, inst: Inst, object: &str) {
        let data = &unit.dfg[inst];
        if data.opcode() != Opcode::Mux {
            return;
        }
        let args = data.args();
        let size = match unit.dfg.value_type(args[1]) {
            Type::Array(n, _) => u64::from(*n),
            _ => return,
        };
        let sel_inst = match unit.dfg.get_value_inst(args[0]) {
            Some(inst) => inst,
            None => return,
        };
        if let Some(sel) = unit.dfg[sel_inst].get_const_int() {
            if sel.to_u64().is_none_or(|v| v >= size) {
                self.warning(
                    unit,
                    object.to_string(),
                    format!("constant selector {sel} is out of range for {size} choices"),
                );
            }
        }
    }

    /// Checks the two-sided consistency of the use lists.
    fn check_use_lists(&mut self, unit: &UnitData) {
        let dfg = &unit.dfg;
        for (value, _) in dfg.values() {
            for u in dfg.uses(value) {
                if !dfg.contains_inst(u.user)
                    || dfg[u.user].args().get(u.index as usize) != Some(&value)
                {
                    self.error(
                        unit,
                        format!("%{}", value.as_raw()),
                        format!(
                            "use list names operand {} of instruction i{}, which does not hold it",
                            u.index,
                            u.user.as_raw()
                        ),
                    );
                }
            }
        }
        let insts: Vec<Inst> = dfg.insts().map(|(inst, _)| inst).collect();
        for inst in insts {
            for (index, &arg) in dfg[inst].args().iter().enumerate() {
                if !dfg.uses(arg).any(|u| u.user == inst && u.index == index as u16) {
                    let object = self.dump_inst(unit, inst);
                    self.error(
                        unit,
                        object,
                        format!("operand {index} is not recorded in the use list"),
                    );
                }
            }
        }
    }

    fn check_cfg(&mut self, unit: &UnitData) {
        let layout = unit.layout.cfg();
        if layout.entry().is_none() {
            self.error(unit, "body".into(), "unit has no blocks");
            return;
        }

        // Terminator totality and in-unit branch targets.
        for bb in layout.blocks() {
            let block_object = || match layout.block_name(bb) {
                Some(name) => format!("%{name}"),
                None => format!("%bb{}", bb.as_raw()),
            };
            let insts = layout.insts(bb);
            match insts.last() {
                None => {
                    self.error(unit, block_object(), "block is empty and has no terminator");
                    continue;
                }
                Some(&last) => {
                    if !unit.dfg[last].opcode().is_terminator() {
                        self.error(unit, block_object(), "block must end with a terminator");
                    }
                }
            }
            for &inst in &insts[..insts.len() - 1] {
                if unit.dfg[inst].opcode().is_terminator() {
                    let object = self.dump_inst(unit, inst);
                    self.error(unit, object, "terminator in the middle of a block");
                }
            }
            for &inst in insts {
                for &target in unit.dfg[inst].blocks() {
                    if !layout.contains_block(target) {
                        let object = self.dump_inst(unit, inst);
                        self.error(unit, object, "branch target is not a block of this unit");
                    }
                }
            }
        }

        // Dominance of definitions over uses.
        let pt = PredecessorTable::new(unit);
        let dt = DominatorTree::new(unit, &pt);
        let placed: Vec<Inst> = layout.all_insts().collect();
        for inst in placed {
            for &arg in unit.dfg[inst].args() {
                let def = match unit.dfg.get_value_inst(arg) {
                    Some(def) => def,
                    None => continue,
                };
                if !dt.inst_dominates(unit, def, inst) {
                    let object = self.dump_inst(unit, def);
                    let user = self.dump_inst(unit, inst);
                    self.error(unit, object, format!("does not dominate use in `{user}`"));
                }
            }
        }
    }

    fn check_entity(&mut self, unit: &UnitData) {
        let layout = unit.layout.flat();

        // Every operand must be defined by an argument or a placed
        // instruction of this entity.
        for inst in layout.insts() {
            for &arg in unit.dfg[inst].args() {
                if let Some(def) = unit.dfg.get_value_inst(arg) {
                    if !layout.contains(def) {
                        let object = self.dump_inst(unit, inst);
                        self.error(
                            unit,
                            object,
                            format!("operand %{} is not defined in this unit", arg.as_raw()),
                        );
                    }
                }
            }
        }

        // The use graph must be acyclic, except through instructions
        // that introduce implicit state.
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut colors: BTreeMap<Inst, Color> =
            layout.insts().map(|inst| (inst, Color::White)).collect();
        let insts: Vec<Inst> = layout.insts().collect();
        for root in insts {
            if colors[&root] != Color::White {
                continue;
            }
            // Iterative DFS over combinational dependency edges.
            let mut stack = vec![(root, false)];
            while let Some((inst, expanded)) = stack.pop() {
                if expanded {
                    colors.insert(inst, Color::Black);
                    continue;
                }
                if colors[&inst] == Color::Black {
                    continue;
                }
                colors.insert(inst, Color::Gray);
                stack.push((inst, true));
                if unit.dfg[inst].opcode().is_stateful() {
                    continue;
                }
                for &arg in unit.dfg[inst].args() {
                    let def = match unit.dfg.get_value_inst(arg) {
                        Some(def) => def,
                        None => continue,
                    };
                    if !colors.contains_key(&def) {
                        continue;
                    }
                    match colors[&def] {
                        Color::White => stack.push((def, false)),
                        Color::Gray => {
                            let object = self.dump_inst(unit, def);
                            self.error(unit, object, "combinational loop in entity");
                        }
                        Color::Black => {}
                    }
                }
            }
        }
    }

    /// Checks that `call`/`inst` references resolve in the module with
    /// matching signatures.
    fn check_linkage(&mut self, unit: &UnitData, module: &Module) {
        for (_, ext) in unit.dfg.ext_units() {
            match module.lookup(&ext.name) {
                None => self.error(
                    unit,
                    format!("@{}", ext.name),
                    "references a unit not present in the module",
                ),
                Some(id) => {
                    let target = module.get(id);
                    if target.sig() != &ext.sig {
                        self.error(
                            unit,
                            format!("@{}", ext.name),
                            "signature does not match the referenced unit",
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::UnitBuilder;
    use crate::inst::RegMode;
    use crate::unit::{Signature, UnitName};
    use silica_common::TimeValue;

    fn verify(unit: &UnitData) -> Result<(), VerifierErrors> {
        let mut verifier = Verifier::new();
        verifier.verify_unit(unit);
        verifier.finish()
    }

    /// The S1 scenario: a value defined in one branch of a diamond and
    /// used after the merge.
    fn broken_diamond(kind: UnitKind) -> UnitData {
        let (sig, name) = match kind {
            UnitKind::Function => (
                Signature::new_function(vec![Type::Int(1)], Type::Int(32)),
                "unit1",
            ),
            _ => (
                Signature::new_ports(vec![Type::signal(Type::Int(1))], vec![]),
                "unit2",
            ),
        };
        let mut unit = UnitData::new(kind, UnitName::new(name), sig).unwrap();
        let arg = unit.input_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        let entry = ub.named_block("entry");
        let then_bb = ub.named_block("then");
        let else_bb = ub.named_block("else");
        let merge = ub.named_block("merge");
        ub.append_to(entry);
        let cond = match kind {
            UnitKind::Function => arg,
            _ => ub.ins().prb(arg).unwrap(),
        };
        ub.ins().br_cond(cond, then_bb, else_bb).unwrap();
        ub.append_to(then_bb);
        let y = ub.ins().const_int(32, 42).unwrap();
        ub.dfg_mut().set_value_name(y, "y");
        ub.ins().br(merge).unwrap();
        ub.append_to(else_bb);
        ub.ins().br(merge).unwrap();
        ub.append_to(merge);
        let z = ub.ins().not(y).unwrap();
        ub.dfg_mut().set_value_name(z, "z");
        match kind {
            UnitKind::Function => ub.ins().ret_value(z).map(|_| ()).unwrap(),
            _ => ub.ins().halt().map(|_| ()).unwrap(),
        }
        unit
    }

    #[test]
    fn s1_dominance_violation_in_function() {
        let unit = broken_diamond(UnitKind::Function);
        let errs = verify(&unit).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(
            format!("{errs}"),
            "- func @unit1: %y = const i32 42: does not dominate use in `%z = not i32 %y`"
        );
    }

    #[test]
    fn s2_dominance_violation_in_process() {
        let unit = broken_diamond(UnitKind::Process);
        let errs = verify(&unit).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(
            format!("{}", errs.0[0]),
            "proc @unit2: %y = const i32 42: does not dominate use in `%z = not i32 %y`"
        );
    }

    #[test]
    fn s3_entity_order_is_not_semantic() {
        // A use that textually precedes its definition, but forms a DAG.
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
        let drv = ub.ins().drv(out, inv, t).unwrap();
        let not_inst = ub.dfg().get_value_inst(inv).unwrap();
        // Move the drive in front of the instruction computing its value.
        let mut order: Vec<Inst> = unit.layout.flat().insts().collect();
        order.retain(|&i| i != drv);
        order.insert(0, drv);
        unit.layout.flat_mut().reorder(order);
        assert!(unit.layout.flat().insts().next() == Some(drv));
        verify(&unit).unwrap();
        let _ = not_inst;
    }

    #[test]
    fn straight_line_function_verifies() {
        let mut unit = UnitData::new(
            UnitKind::Function,
            UnitName::new("f"),
            Signature::new_function(vec![Type::Int(32)], Type::Int(32)),
        )
        .unwrap();
        let arg = unit.input_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        ub.named_block("entry");
        let k = ub.ins().const_int(32, 1).unwrap();
        let sum = ub.ins().add(arg, k).unwrap();
        ub.ins().ret_value(sum).unwrap();
        verify(&unit).unwrap();
    }

    #[test]
    fn missing_terminator_is_reported() {
        let mut unit = UnitData::new(
            UnitKind::Function,
            UnitName::new("f"),
            Signature::new_function(vec![], Type::Int(32)),
        )
        .unwrap();
        let mut ub = UnitBuilder::new(&mut unit);
        ub.named_block("entry");
        ub.ins().const_int(32, 1).unwrap();
        let errs = verify(&unit).unwrap_err();
        assert!(format!("{errs}").contains("block must end with a terminator"));
    }

    #[test]
    fn terminator_in_middle_is_reported() {
        let mut unit = UnitData::new(
            UnitKind::Function,
            UnitName::new("f"),
            Signature::new_function(vec![], Type::Int(32)),
        )
        .unwrap();
        let mut ub = UnitBuilder::new(&mut unit);
        let entry = ub.named_block("entry");
        let k = ub.ins().const_int(32, 1).unwrap();
        ub.ins().ret_value(k).unwrap();
        // Force a second terminator into the middle by appending after.
        ub.append_to(entry);
        ub.ins().ret_value(k).unwrap();
        let k2_inst = {
            let mut ub2 = UnitBuilder::new(&mut unit);
            ub2.append_to(entry);
            ub2.ins().const_int(32, 2).unwrap()
        };
        let errs = verify(&unit).unwrap_err();
        assert!(format!("{errs}").contains("terminator in the middle of a block"));
        let _ = k2_inst;
    }

    #[test]
    fn entity_combinational_loop_is_reported() {
        let mut unit = UnitData::new(
            UnitKind::Entity,
            UnitName::new("e"),
            Signature::new_ports(vec![], vec![Type::signal(Type::Int(8))]),
        )
        .unwrap();
        let mut ub = UnitBuilder::new(&mut unit);
        let k = ub.ins().const_int(8, 0).unwrap();
        let a = ub.ins().add(k, k).unwrap();
        let b = ub.ins().not(a).unwrap();
        // Manually re-route `a`'s operand onto `b`, forming a cycle.
        let b_def = ub.dfg().get_value_inst(b).unwrap();
        ub.dfg_mut().replace_all_uses(k, b);
        let errs = verify(&unit).unwrap_err();
        assert!(
            format!("{errs}").contains("combinational loop"),
            "got: {errs}"
        );
        let _ = b_def;
    }

    #[test]
    fn entity_loop_through_reg_is_allowed() {
        let mut unit = UnitData::new(
            UnitKind::Entity,
            UnitName::new("e"),
            Signature::new_ports(vec![Type::signal(Type::Int(1))], vec![]),
        )
        .unwrap();
        let clk = unit.input_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        let clkv = ub.ins().prb(clk).unwrap();
        let q = {
            // Feedback: toggle flip-flop q := not q.
            let seed = ub.ins().const_int(1, 0).unwrap();
            let q = ub.ins().reg(seed, RegMode::Rise, clkv).unwrap();
            let next = ub.ins().not(q).unwrap();
            ub.dfg_mut().replace_all_uses(seed, next);
            let seed_inst = ub.dfg().get_value_inst(seed).unwrap();
            ub.prune_if_unused(seed_inst);
            q
        };
        verify(&unit).unwrap();
        let _ = q;
    }

    #[test]
    fn mux_constant_out_of_range_warns() {
        let mut unit = UnitData::new(
            UnitKind::Function,
            UnitName::new("f"),
            Signature::new_function(vec![Type::Int(8)], Type::Int(8)),
        )
        .unwrap();
        let arg = unit.input_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        ub.named_block("entry");
        let arr = ub.ins().array(vec![arg, arg]).unwrap();
        let sel = ub.ins().const_int(2, 3).unwrap();
        let picked = ub.ins().mux(sel, arr).unwrap();
        ub.ins().ret_value(picked).unwrap();
        let errs = verify(&unit).unwrap_err();
        assert!(!errs.has_errors());
        assert_eq!(errs.len(), 1);
        assert!(format!("{errs}").contains("out of range"));
    }

    #[test]
    fn cross_unit_replacement_does_not_leak() {
        // Replacing a value in unit A leaves unit B untouched.
        let build = || {
            let mut unit = UnitData::new(
                UnitKind::Function,
                UnitName::new("f"),
                Signature::new_function(vec![], Type::Int(32)),
            )
            .unwrap();
            let mut ub = UnitBuilder::new(&mut unit);
            ub.named_block("entry");
            let a = ub.ins().const_int(32, 1).unwrap();
            let b = ub.ins().const_int(32, 2).unwrap();
            let sum = ub.ins().add(a, b).unwrap();
            ub.ins().ret_value(sum).unwrap();
            (unit, a, b)
        };
        let (mut unit_a, a1, b1) = build();
        let (unit_b, a2, _) = build();
        let before = format!("{:?}", unit_b.dfg[unit_b.dfg.get_value_inst(a2).unwrap()]);
        unit_a.dfg.replace_all_uses(a1, b1);
        let after = format!("{:?}", unit_b.dfg[unit_b.dfg.get_value_inst(a2).unwrap()]);
        assert_eq!(before, after);
        verify(&unit_b).unwrap();
    }
}
