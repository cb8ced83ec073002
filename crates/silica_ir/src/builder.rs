//! Builders for populating units.
//!
//! A [`UnitBuilder`] wraps a unit and carries the position where new
//! instructions are inserted; [`InstBuilder`], obtained through
//! [`UnitBuilder::ins`], provides one constructor per instruction. Every
//! constructor validates its operand contract and returns a
//! [`BuildError`](crate::error::BuildError) on violation, leaving the
//! unit unchanged.

use crate::dfg::DataFlowGraph;
use crate::error::{BuildError, BuildResult};
use crate::ids::{Block, ExtUnit, Inst, Value};
use crate::inst::{validate, InstData, Opcode, RegMode};
use crate::ty::Type;
use crate::unit::{UnitData, UnitKind};
use num_bigint::BigInt;
use silica_common::{IntValue, LogicVec, TimeValue};
use std::collections::BTreeSet;

/// The position where new instructions are inserted.
#[derive(Clone, Copy)]
enum InsertPos {
    /// No position selected yet (CFG units start here).
    None,
    /// Append to the given block.
    Append(Block),
    /// Prepend to the given block.
    Prepend(Block),
    /// Insert after the given instruction, advancing with each insert.
    After(Inst),
    /// Insert before the given instruction.
    Before(Inst),
    /// Append to the entity's flat list.
    FlatAppend,
    /// Prepend to the entity's flat list.
    FlatPrepend,
}

/// Temporary object used to populate a unit.
pub struct UnitBuilder<'u> {
    unit: &'u mut UnitData,
    pos: InsertPos,
}

impl<'u> UnitBuilder<'u> {
    /// Creates a builder for the given unit. Entities start appending at
    /// the end; CFG units require a block to be selected first.
    pub fn new(unit: &'u mut UnitData) -> Self {
        let pos = match unit.kind() {
            UnitKind::Entity => InsertPos::FlatAppend,
            _ => InsertPos::None,
        };
        Self { unit, pos }
    }

    /// The unit being built.
    pub fn unit(&self) -> &UnitData {
        self.unit
    }

    /// Mutable access to the unit being built.
    pub fn unit_mut(&mut self) -> &mut UnitData {
        self.unit
    }

    /// The unit's value/use graph.
    pub fn dfg(&self) -> &DataFlowGraph {
        &self.unit.dfg
    }

    /// Mutable access to the unit's value/use graph.
    pub fn dfg_mut(&mut self) -> &mut DataFlowGraph {
        &mut self.unit.dfg
    }

    /// Creates a new block at the end of the unit and selects it for
    /// appending.
    ///
    /// # Panics
    ///
    /// Panics on an entity, which has no blocks.
    pub fn block(&mut self) -> Block {
        let bb = self.unit.layout.cfg_mut().append_block();
        self.pos = InsertPos::Append(bb);
        bb
    }

    /// Creates a new named block at the end of the unit and selects it
    /// for appending.
    ///
    /// # Panics
    ///
    /// Panics on an entity, which has no blocks.
    pub fn named_block(&mut self, name: impl Into<String>) -> Block {
        let bb = self.block();
        self.unit.layout.cfg_mut().set_block_name(bb, name);
        bb
    }

    /// Selects the end of the given block for insertion.
    pub fn append_to(&mut self, bb: Block) {
        self.pos = InsertPos::Append(bb);
    }

    /// Selects the beginning of the given block for insertion.
    pub fn prepend_to(&mut self, bb: Block) {
        self.pos = InsertPos::Prepend(bb);
    }

    /// Selects the position after the given instruction for insertion.
    pub fn insert_after(&mut self, inst: Inst) {
        self.pos = InsertPos::After(inst);
    }

    /// Selects the position before the given instruction for insertion.
    pub fn insert_before(&mut self, inst: Inst) {
        self.pos = InsertPos::Before(inst);
    }

    /// Selects the end of an entity's flat list for insertion.
    pub fn insert_at_end(&mut self) {
        self.pos = InsertPos::FlatAppend;
    }

    /// Selects the beginning of an entity's flat list for insertion.
    pub fn insert_at_beginning(&mut self) {
        self.pos = InsertPos::FlatPrepend;
    }

    /// Returns the instruction builder, inserting at the current
    /// position.
    pub fn ins(&mut self) -> InstBuilder<'_, 'u> {
        InstBuilder { builder: self }
    }

    /// Validates and inserts a raw instruction at the current position.
    ///
    /// This is the generic path behind every [`InstBuilder`] method; it
    /// is also the tool passes use to migrate instructions between units
    /// with remapped operands.
    pub fn build_data(&mut self, data: InstData) -> BuildResult<Inst> {
        let opcode = data.opcode();
        let kind = self.unit.kind();
        if !opcode.valid_in(kind) {
            return Err(BuildError::InvalidInUnit { opcode, kind });
        }
        if opcode == Opcode::RetValue {
            let found = self.unit.dfg.value_type(data.args()[0]).clone();
            let expected = self
                .unit
                .sig()
                .return_type()
                .cloned()
                .unwrap_or(Type::Void);
            if found != expected {
                return Err(BuildError::ReturnTypeMismatch { expected, found });
            }
        }
        let result_ty = validate(&self.unit.dfg, &data)?;
        let inst = self.unit.dfg.add_inst(data, result_ty);
        use crate::layout::UnitLayout;
        match self.pos {
            InsertPos::None => panic!("no block selected to insert instruction"),
            InsertPos::Append(bb) => self.unit.layout.cfg_mut().append_inst(inst, bb),
            InsertPos::Prepend(bb) => self.unit.layout.cfg_mut().prepend_inst(inst, bb),
            InsertPos::After(other) => {
                match &mut self.unit.layout {
                    UnitLayout::Cfg(layout) => layout.insert_inst_after(inst, other),
                    UnitLayout::Flat(layout) => layout.insert_inst_after(inst, other),
                }
                self.pos = InsertPos::After(inst);
            }
            InsertPos::Before(other) => match &mut self.unit.layout {
                UnitLayout::Cfg(layout) => layout.insert_inst_before(inst, other),
                UnitLayout::Flat(layout) => layout.insert_inst_before(inst, other),
            },
            InsertPos::FlatAppend => self.unit.layout.flat_mut().append_inst(inst),
            InsertPos::FlatPrepend => self.unit.layout.flat_mut().prepend_inst(inst),
        }
        Ok(inst)
    }

    /// Unlinks and destroys an instruction.
    ///
    /// # Panics
    ///
    /// Panics if the instruction's result still has uses.
    pub fn remove_inst(&mut self, inst: Inst) {
        self.unit.layout.remove_inst(inst);
        self.unit.dfg.remove_inst(inst);
    }

    /// Erases the instruction if it is side-effect free and its result
    /// is unused, then transitively erases any instructions that thereby
    /// become unused. Returns `true` if anything was erased.
    pub fn prune_if_unused(&mut self, inst: Inst) -> bool {
        if !self.unit.dfg.contains_inst(inst) {
            return false;
        }
        let data = &self.unit.dfg[inst];
        if data.opcode().has_side_effects() {
            return false;
        }
        if let Some(result) = self.unit.dfg.get_inst_result(inst) {
            if self.unit.dfg.has_uses(result) {
                return false;
            }
        }
        let operands: BTreeSet<Value> = data.args().iter().copied().collect();
        self.remove_inst(inst);
        for value in operands {
            if !self.unit.dfg.contains_value(value) {
                continue;
            }
            if let Some(def) = self.unit.dfg.get_value_inst(value) {
                self.prune_if_unused(def);
            }
        }
        true
    }
}

/// Temporary object used to construct a single instruction.
pub struct InstBuilder<'a, 'u> {
    builder: &'a mut UnitBuilder<'u>,
}

impl InstBuilder<'_, '_> {
    fn build_value(&mut self, data: InstData) -> BuildResult<Value> {
        let inst = self.builder.build_data(data)?;
        Ok(self.builder.unit.dfg.inst_result(inst))
    }

    fn binary(&mut self, opcode: Opcode, x: Value, y: Value) -> BuildResult<Value> {
        self.build_value(InstData::Binary {
            opcode,
            args: [x, y],
        })
    }

    /// `%a = const iN value`
    pub fn const_int(&mut self, width: u32, value: impl Into<BigInt>) -> BuildResult<Value> {
        self.build_value(InstData::ConstInt {
            imm: IntValue::from_bigint(width, value.into()),
        })
    }

    /// `%a = const iN value` from a prebuilt [`IntValue`].
    pub fn const_int_value(&mut self, imm: IntValue) -> BuildResult<Value> {
        self.build_value(InstData::ConstInt { imm })
    }

    /// `%a = const nN "symbols"`
    pub fn const_logic(&mut self, imm: LogicVec) -> BuildResult<Value> {
        self.build_value(InstData::ConstLogic { imm })
    }

    /// `%a = const time t`
    pub fn const_time(&mut self, imm: TimeValue) -> BuildResult<Value> {
        self.build_value(InstData::ConstTime { imm })
    }

    /// `%a = array %x, %y, …` — all elements of one type.
    pub fn array(&mut self, elements: Vec<Value>) -> BuildResult<Value> {
        self.build_value(InstData::Aggregate {
            opcode: Opcode::Array,
            args: elements,
        })
    }

    /// `%a = struct %x, %y, …`
    pub fn strukt(&mut self, fields: Vec<Value>) -> BuildResult<Value> {
        self.build_value(InstData::Aggregate {
            opcode: Opcode::Struct,
            args: fields,
        })
    }

    /// `%a = not T %x`
    pub fn not(&mut self, x: Value) -> BuildResult<Value> {
        self.build_value(InstData::Unary {
            opcode: Opcode::Not,
            args: [x],
        })
    }

    /// `%a = add T %x, %y`
    pub fn add(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Add, x, y)
    }

    /// `%a = sub T %x, %y`
    pub fn sub(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Sub, x, y)
    }

    /// `%a = mul T %x, %y`
    pub fn mul(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Mul, x, y)
    }

    /// `%a = udiv T %x, %y`
    pub fn udiv(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Udiv, x, y)
    }

    /// `%a = sdiv T %x, %y`
    pub fn sdiv(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Sdiv, x, y)
    }

    /// `%a = urem T %x, %y`
    pub fn urem(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Urem, x, y)
    }

    /// `%a = srem T %x, %y`
    pub fn srem(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Srem, x, y)
    }

    /// `%a = and T %x, %y`
    pub fn and(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::And, x, y)
    }

    /// `%a = or T %x, %y`
    pub fn or(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Or, x, y)
    }

    /// `%a = xor T %x, %y`
    pub fn xor(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Xor, x, y)
    }

    /// `%a = shl T %x, %amount`
    pub fn shl(&mut self, x: Value, amount: Value) -> BuildResult<Value> {
        self.binary(Opcode::Shl, x, amount)
    }

    /// `%a = lshr T %x, %amount`
    pub fn lshr(&mut self, x: Value, amount: Value) -> BuildResult<Value> {
        self.binary(Opcode::Lshr, x, amount)
    }

    /// `%a = ashr T %x, %amount`
    pub fn ashr(&mut self, x: Value, amount: Value) -> BuildResult<Value> {
        self.binary(Opcode::Ashr, x, amount)
    }

    /// `%a = eq T %x, %y`
    pub fn eq(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Eq, x, y)
    }

    /// `%a = ne T %x, %y`
    pub fn ne(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Ne, x, y)
    }

    /// `%a = ult T %x, %y`
    pub fn ult(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Ult, x, y)
    }

    /// `%a = ugt T %x, %y`
    pub fn ugt(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Ugt, x, y)
    }

    /// `%a = ule T %x, %y`
    pub fn ule(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Ule, x, y)
    }

    /// `%a = uge T %x, %y`
    pub fn uge(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Uge, x, y)
    }

    /// `%a = slt T %x, %y`
    pub fn slt(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Slt, x, y)
    }

    /// `%a = sgt T %x, %y`
    pub fn sgt(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Sgt, x, y)
    }

    /// `%a = sle T %x, %y`
    pub fn sle(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Sle, x, y)
    }

    /// `%a = sge T %x, %y`
    pub fn sge(&mut self, x: Value, y: Value) -> BuildResult<Value> {
        self.binary(Opcode::Sge, x, y)
    }

    /// `%a = mux [N x T] %sel, %choices`
    pub fn mux(&mut self, sel: Value, choices: Value) -> BuildResult<Value> {
        self.binary(Opcode::Mux, sel, choices)
    }

    /// `%a = extract T %target, index` — a struct field or array
    /// element.
    pub fn extract_field(&mut self, target: Value, index: u32) -> BuildResult<Value> {
        self.build_value(InstData::InsExt {
            opcode: Opcode::ExtractField,
            args: [target, Value::invalid()],
            imms: [index, 0],
        })
    }

    /// `%a = extract T %target, offset, length` — a bit or element
    /// slice.
    pub fn extract_slice(&mut self, target: Value, offset: u32, length: u32) -> BuildResult<Value> {
        self.build_value(InstData::InsExt {
            opcode: Opcode::ExtractSlice,
            args: [target, Value::invalid()],
            imms: [offset, length],
        })
    }

    /// `%a = insert T %target, index, %value`
    pub fn insert_field(&mut self, target: Value, index: u32, value: Value) -> BuildResult<Value> {
        self.build_value(InstData::InsExt {
            opcode: Opcode::InsertField,
            args: [target, value],
            imms: [index, 0],
        })
    }

    /// `%a = insert T %target, offset, length, %value`
    pub fn insert_slice(
        &mut self,
        target: Value,
        offset: u32,
        length: u32,
        value: Value,
    ) -> BuildResult<Value> {
        self.build_value(InstData::InsExt {
            opcode: Opcode::InsertSlice,
            args: [target, value],
            imms: [offset, length],
        })
    }

    /// `%q = reg T %data, mode %trigger`
    pub fn reg(&mut self, data: Value, mode: RegMode, trigger: Value) -> BuildResult<Value> {
        self.build_value(InstData::Reg {
            args: vec![data, trigger],
            modes: vec![mode],
        })
    }

    /// `%q = reg T %data, mode %trigger, %avalue, amode %atrigger` — a
    /// register with an asynchronous level-sensitive override.
    pub fn reg_async(
        &mut self,
        data: Value,
        mode: RegMode,
        trigger: Value,
        avalue: Value,
        amode: RegMode,
        atrigger: Value,
    ) -> BuildResult<Value> {
        self.build_value(InstData::Reg {
            args: vec![data, trigger, avalue, atrigger],
            modes: vec![mode, amode],
        })
    }

    /// `%s = sig T` — declares a signal carrying values of type `ty`.
    pub fn sig(&mut self, ty: Type) -> BuildResult<Value> {
        self.build_value(InstData::Sig { ty })
    }

    /// `%a = prb T$ %signal`
    pub fn prb(&mut self, signal: Value) -> BuildResult<Value> {
        self.build_value(InstData::Unary {
            opcode: Opcode::Prb,
            args: [signal],
        })
    }

    /// `drv T$ %signal, %value, %delay`
    pub fn drv(&mut self, signal: Value, value: Value, delay: Value) -> BuildResult<Inst> {
        self.builder.build_data(InstData::Ternary {
            opcode: Opcode::Drv,
            args: [signal, value, delay],
        })
    }

    /// `drv T$ %signal if %gate, %value, %delay`
    pub fn drv_cond(
        &mut self,
        signal: Value,
        value: Value,
        delay: Value,
        gate: Value,
    ) -> BuildResult<Inst> {
        self.builder.build_data(InstData::Quaternary {
            opcode: Opcode::DrvCond,
            args: [signal, value, delay, gate],
        })
    }

    /// `%a = call T @unit (%args…)`
    pub fn call(&mut self, unit: ExtUnit, args: Vec<Value>) -> BuildResult<Value> {
        let ins = args.len() as u16;
        self.build_value(InstData::Call {
            opcode: Opcode::Call,
            unit,
            ins,
            args,
        })
    }

    /// `inst @unit (%ins…) -> (%outs…)`
    pub fn inst(
        &mut self,
        unit: ExtUnit,
        mut inputs: Vec<Value>,
        outputs: Vec<Value>,
    ) -> BuildResult<Inst> {
        let ins = inputs.len() as u16;
        inputs.extend(outputs);
        self.builder.build_data(InstData::Call {
            opcode: Opcode::Inst,
            unit,
            ins,
            args: inputs,
        })
    }

    /// `br %target`
    pub fn br(&mut self, target: Block) -> BuildResult<Inst> {
        self.builder.build_data(InstData::Jump { bb: target })
    }

    /// `br %cond, %taken1, %taken0` — branches to `taken1` when the
    /// condition is 1.
    pub fn br_cond(&mut self, cond: Value, taken1: Block, taken0: Block) -> BuildResult<Inst> {
        self.builder.build_data(InstData::Branch {
            args: [cond],
            bbs: [taken1, taken0],
        })
    }

    /// `ret`
    pub fn ret(&mut self) -> BuildResult<Inst> {
        self.builder.build_data(InstData::Nullary {
            opcode: Opcode::Ret,
        })
    }

    /// `ret T %value`
    pub fn ret_value(&mut self, value: Value) -> BuildResult<Inst> {
        self.builder.build_data(InstData::Unary {
            opcode: Opcode::RetValue,
            args: [value],
        })
    }

    /// `wait %resume, %signals…`
    pub fn wait(&mut self, resume: Block, signals: Vec<Value>) -> BuildResult<Inst> {
        self.builder.build_data(InstData::Wait {
            opcode: Opcode::Wait,
            bb: resume,
            args: signals,
        })
    }

    /// `wait %resume for %time, %signals…`
    pub fn wait_time(
        &mut self,
        resume: Block,
        time: Value,
        mut signals: Vec<Value>,
    ) -> BuildResult<Inst> {
        signals.insert(0, time);
        self.builder.build_data(InstData::Wait {
            opcode: Opcode::WaitTime,
            bb: resume,
            args: signals,
        })
    }

    /// `halt`
    pub fn halt(&mut self) -> BuildResult<Inst> {
        self.builder.build_data(InstData::Nullary {
            opcode: Opcode::Halt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{Signature, UnitName};

    fn function() -> UnitData {
        UnitData::new(
            UnitKind::Function,
            UnitName::new("f"),
            Signature::new_function(vec![Type::Int(32)], Type::Int(32)),
        )
        .unwrap()
    }

    fn entity(ins: Vec<Type>, outs: Vec<Type>) -> UnitData {
        UnitData::new(
            UnitKind::Entity,
            UnitName::new("e"),
            Signature::new_ports(ins, outs),
        )
        .unwrap()
    }

    #[test]
    fn build_simple_function() {
        let mut unit = function();
        let arg = unit.input_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        ub.named_block("entry");
        let k = ub.ins().const_int(32, 1).unwrap();
        let sum = ub.ins().add(arg, k).unwrap();
        ub.ins().ret_value(sum).unwrap();
        assert_eq!(unit.dfg.value_type(sum), &Type::Int(32));
        let insts: Vec<Inst> = unit.layout.all_insts().collect();
        assert_eq!(insts.len(), 3);
    }

    #[test]
    fn operand_type_violation_fails_construction() {
        let mut unit = function();
        let mut ub = UnitBuilder::new(&mut unit);
        ub.block();
        let k8 = ub.ins().const_int(8, 1).unwrap();
        let k32 = ub.ins().const_int(32, 1).unwrap();
        let err = ub.ins().add(k8, k32).unwrap_err();
        assert!(matches!(err, BuildError::TypeMismatch { .. }));
        let t = ub.ins().const_time(TimeValue::zero()).unwrap();
        let err = ub.ins().not(t).unwrap_err();
        assert!(matches!(err, BuildError::OperandType { .. }));
        // Failed construction left no instruction behind.
        assert_eq!(ub.unit().layout.all_insts().count(), 3);
    }

    #[test]
    fn unit_kind_violation_fails_construction() {
        let mut unit = function();
        let mut ub = UnitBuilder::new(&mut unit);
        ub.block();
        let err = ub.ins().halt().unwrap_err();
        assert!(matches!(
            err,
            BuildError::InvalidInUnit {
                opcode: Opcode::Halt,
                kind: UnitKind::Function
            }
        ));
    }

    #[test]
    fn ret_value_must_match_signature() {
        let mut unit = function();
        let mut ub = UnitBuilder::new(&mut unit);
        ub.block();
        let k8 = ub.ins().const_int(8, 0).unwrap();
        let err = ub.ins().ret_value(k8).unwrap_err();
        assert!(matches!(err, BuildError::ReturnTypeMismatch { .. }));
    }

    #[test]
    fn entity_builder_appends_flat() {
        let mut unit = entity(
            vec![Type::signal(Type::Int(8))],
            vec![Type::signal(Type::Int(8))],
        );
        let inp = unit.input_arg(0);
        let out = unit.output_arg(0);
        let mut ub = UnitBuilder::new(&mut unit);
        let v = ub.ins().prb(inp).unwrap();
        let inv = ub.ins().not(v).unwrap();
        let t = ub.ins().const_time(TimeValue::delta_cycle()).unwrap();
        ub.ins().drv(out, inv, t).unwrap();
        assert_eq!(unit.layout.flat().insts().count(), 4);
    }

    #[test]
    fn reg_contract() {
        let mut unit = entity(
            vec![
                Type::signal(Type::Int(8)),
                Type::signal(Type::Int(1)),
            ],
            vec![Type::signal(Type::Int(8))],
        );
        let d = unit.input_arg(0);
        let clk = unit.input_arg(1);
        let mut ub = UnitBuilder::new(&mut unit);
        let dv = ub.ins().prb(d).unwrap();
        let clkv = ub.ins().prb(clk).unwrap();
        let q = ub.ins().reg(dv, RegMode::Rise, clkv).unwrap();
        assert_eq!(ub.dfg().value_type(q), &Type::Int(8));

        // An async override must be level sensitive.
        let rv = ub.ins().const_int(8, 0).unwrap();
        let err = ub
            .ins()
            .reg_async(dv, RegMode::Rise, clkv, rv, RegMode::Fall, clkv)
            .unwrap_err();
        assert!(matches!(err, BuildError::BadAsyncMode(RegMode::Fall)));
        let ok = ub
            .ins()
            .reg_async(dv, RegMode::Rise, clkv, rv, RegMode::Low, clkv);
        assert!(ok.is_ok());
    }

    #[test]
    fn reg_is_entity_only() {
        let mut unit = function();
        let mut ub = UnitBuilder::new(&mut unit);
        ub.block();
        let d = ub.ins().const_int(8, 0).unwrap();
        let c = ub.ins().const_int(1, 0).unwrap();
        let err = ub.ins().reg(d, RegMode::Rise, c).unwrap_err();
        assert!(matches!(err, BuildError::InvalidInUnit { .. }));
    }

    #[test]
    fn insert_positions() {
        let mut unit = function();
        let mut ub = UnitBuilder::new(&mut unit);
        let bb = ub.block();
        let a = ub.ins().const_int(8, 0).unwrap();
        let c = ub.ins().const_int(8, 2).unwrap();
        let first = ub.dfg().get_value_inst(a).unwrap();
        ub.insert_after(first);
        let b = ub.ins().const_int(8, 1).unwrap();
        // After-insertion advances, preserving build order.
        let b2 = ub.ins().const_int(8, 10).unwrap();
        let order: Vec<Value> = unit
            .layout
            .cfg()
            .insts(bb)
            .iter()
            .map(|&i| unit.dfg.inst_result(i))
            .collect();
        assert_eq!(order, vec![a, b, b2, c]);
    }

    #[test]
    fn prune_if_unused_cascades() {
        let mut unit = function();
        let mut ub = UnitBuilder::new(&mut unit);
        ub.block();
        let a = ub.ins().const_int(32, 1).unwrap();
        let b = ub.ins().const_int(32, 2).unwrap();
        let sum = ub.ins().add(a, b).unwrap();
        let not = ub.ins().not(sum).unwrap();
        let not_inst = ub.dfg().get_value_inst(not).unwrap();
        assert!(ub.prune_if_unused(not_inst));
        // The whole chain became unused and was erased.
        assert_eq!(ub.unit().layout.all_insts().count(), 0);
        let _ = (a, b, sum);
    }

    #[test]
    fn prune_respects_uses_and_effects() {
        let mut unit = function();
        let mut ub = UnitBuilder::new(&mut unit);
        ub.block();
        let a = ub.ins().const_int(32, 1).unwrap();
        let _sum = ub.ins().add(a, a).unwrap();
        let a_inst = ub.dfg().get_value_inst(a).unwrap();
        // `a` is used by the add, so it must not be erased.
        assert!(!ub.prune_if_unused(a_inst));
        assert_eq!(ub.unit().layout.all_insts().count(), 2);
    }
}
