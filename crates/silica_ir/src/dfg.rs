//! The value/use graph of a unit.
//!
//! The [`DataFlowGraph`] owns every value and instruction of one unit
//! and keeps the two-sided use edges consistent: the user side stores
//! operands in order inside [`InstData`], the used side stores a set of
//! [`Use`] back-references. Both sides are updated together by
//! instruction insertion, removal, and [`replace_all_uses`]
//! (DataFlowGraph::replace_all_uses) — the primitive constant folding,
//! DCE, and the lowering passes are built on.

use crate::arena::Arena;
use crate::ids::{Block, ExtUnit, Inst, Value};
use crate::inst::InstData;
use crate::ty::Type;
use crate::unit::Signature;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;

/// A single use of a value: the using instruction and the operand
/// position within its argument list.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
pub struct Use {
    /// The instruction using the value.
    pub user: Inst,
    /// The operand position within the user's argument list.
    pub index: u16,
}

/// Table storage for values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ValueData {
    /// The value is the result of an instruction.
    Inst {
        /// The value's type.
        ty: Type,
        /// The defining instruction.
        inst: Inst,
    },
    /// The value is an argument of the unit.
    Arg {
        /// The value's type.
        ty: Type,
        /// The argument position (inputs first, then outputs).
        index: u16,
    },
}

impl ValueData {
    /// The type of the value.
    pub fn ty(&self) -> &Type {
        match self {
            ValueData::Inst { ty, .. } | ValueData::Arg { ty, .. } => ty,
        }
    }
}

/// Another unit referenced from within a unit by `call` or `inst`.
///
/// References are by name; the verifier checks that the module resolves
/// them to a unit with a matching signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtUnitData {
    /// The name of the referenced unit, without the `@` sigil.
    pub name: String,
    /// The expected signature of the referenced unit.
    pub sig: Signature,
}

/// The value/use graph of a single unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataFlowGraph {
    insts: Arena<Inst, InstData>,
    values: Arena<Value, ValueData>,
    results: BTreeMap<Inst, Value>,
    args: Vec<Value>,
    uses: BTreeMap<Value, BTreeSet<Use>>,
    names: BTreeMap<Value, String>,
    ext_units: Arena<ExtUnit, ExtUnitData>,
}

impl DataFlowGraph {
    /// Creates a new, empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates one argument value per input and output of the signature.
    pub(crate) fn make_args_for_signature(&mut self, sig: &Signature) {
        for (index, ty) in sig.arg_types().enumerate() {
            let value = self.values.alloc(ValueData::Arg {
                ty: ty.clone(),
                index: index as u16,
            });
            self.args.push(value);
        }
    }

    /// The argument values of the unit, inputs first, then outputs.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The argument value at the given position.
    ///
    /// # Panics
    ///
    /// Panics if the position is out of range.
    pub fn arg_value(&self, index: usize) -> Value {
        self.args[index]
    }

    /// Adds an instruction to the graph, registering a use for every
    /// operand. A void `result_ty` means the instruction produces no
    /// value.
    ///
    /// Callers must have validated the operand contract first; the
    /// builder does this through [`inst::validate`](crate::inst::validate).
    pub fn add_inst(&mut self, data: InstData, result_ty: Type) -> Inst {
        let inst = self.insts.alloc(data);
        if !result_ty.is_void() {
            let value = self.values.alloc(ValueData::Inst {
                ty: result_ty,
                inst,
            });
            self.results.insert(inst, value);
        }
        self.register_uses(inst);
        inst
    }

    /// Removes an instruction from the graph, unregistering its operand
    /// uses and destroying its result value.
    ///
    /// # Panics
    ///
    /// Panics if the instruction's result still has uses; deletion is
    /// only permitted once the use list is empty.
    pub fn remove_inst(&mut self, inst: Inst) -> InstData {
        if let Some(&result) = self.results.get(&inst) {
            assert!(
                !self.has_uses(result),
                "removal of instruction whose result is still in use"
            );
            self.uses.remove(&result);
            self.names.remove(&result);
            self.values.remove(result);
            self.results.remove(&inst);
        }
        self.unregister_uses(inst);
        self.insts.remove(inst)
    }

    /// Returns `true` if the graph still holds this instruction.
    pub fn contains_inst(&self, inst: Inst) -> bool {
        self.insts.contains(inst)
    }

    /// Returns `true` if the graph still holds this value.
    pub fn contains_value(&self, value: Value) -> bool {
        self.values.contains(value)
    }

    /// The result value of an instruction.
    ///
    /// # Panics
    ///
    /// Panics if the instruction has no result.
    pub fn inst_result(&self, inst: Inst) -> Value {
        self.get_inst_result(inst)
            .expect("instruction has no result")
    }

    /// The result value of an instruction, if it has one.
    pub fn get_inst_result(&self, inst: Inst) -> Option<Value> {
        self.results.get(&inst).copied()
    }

    /// Returns `true` if the instruction produces a result value.
    pub fn has_result(&self, inst: Inst) -> bool {
        self.results.contains_key(&inst)
    }

    /// The type of a value.
    pub fn value_type(&self, value: Value) -> &Type {
        self.values[value].ty()
    }

    /// The instruction defining a value, or `None` for arguments.
    pub fn get_value_inst(&self, value: Value) -> Option<Inst> {
        match self.values[value] {
            ValueData::Inst { inst, .. } => Some(inst),
            ValueData::Arg { .. } => None,
        }
    }

    /// The name of a value, if it has one.
    pub fn value_name(&self, value: Value) -> Option<&str> {
        self.names.get(&value).map(|s| s.as_str())
    }

    /// Sets the name of a value.
    pub fn set_value_name(&mut self, value: Value, name: impl Into<String>) {
        self.names.insert(value, name.into());
    }

    /// Removes the name of a value.
    pub fn clear_value_name(&mut self, value: Value) -> Option<String> {
        self.names.remove(&value)
    }

    /// Iterates over the uses of a value.
    pub fn uses(&self, value: Value) -> impl Iterator<Item = Use> + '_ {
        self.uses.get(&value).into_iter().flatten().copied()
    }

    /// Returns `true` if the value has at least one use.
    pub fn has_uses(&self, value: Value) -> bool {
        self.uses.get(&value).is_some_and(|set| !set.is_empty())
    }

    /// The number of uses of a value.
    pub fn num_uses(&self, value: Value) -> usize {
        self.uses.get(&value).map_or(0, |set| set.len())
    }

    /// Rewrites every use of `from` to refer to `to`, moving the use
    /// entries between the two use lists. Returns the number of operand
    /// slots rewritten. A self-replacement is a no-op.
    ///
    /// The caller must ensure `to`'s type satisfies every rewritten
    /// operand's contract; for same-typed values this always holds.
    pub fn replace_all_uses(&mut self, from: Value, to: Value) -> usize {
        if from == to {
            return 0;
        }
        debug_assert_eq!(
            self.value_type(from),
            self.value_type(to),
            "replacement value type must match"
        );
        let moved = match self.uses.remove(&from) {
            Some(set) => set,
            None => return 0,
        };
        let count = moved.len();
        for u in &moved {
            let args = self.insts[u.user].args_mut();
            args[u.index as usize] = to;
        }
        self.uses.entry(to).or_default().extend(moved);
        count
    }

    /// Rewrites every reference to block `from` into a reference to
    /// block `to`, returning the number of rewritten slots.
    pub fn replace_all_block_uses(&mut self, from: Block, to: Block) -> usize {
        let ids: Vec<Inst> = self.insts.ids().collect();
        ids.into_iter()
            .map(|inst| self.insts[inst].replace_block(from, to))
            .sum()
    }

    /// Adds an external unit reference, reusing an existing entry with
    /// the same name and signature.
    pub fn add_ext_unit(&mut self, name: impl Into<String>, sig: Signature) -> ExtUnit {
        let name = name.into();
        for (ext, data) in self.ext_units.iter() {
            if data.name == name && data.sig == sig {
                return ext;
            }
        }
        self.ext_units.alloc(ExtUnitData { name, sig })
    }

    /// The data of an external unit reference.
    pub fn ext_unit(&self, ext: ExtUnit) -> &ExtUnitData {
        &self.ext_units[ext]
    }

    /// Iterates over all external unit references.
    pub fn ext_units(&self) -> impl Iterator<Item = (ExtUnit, &ExtUnitData)> {
        self.ext_units.iter()
    }

    /// Iterates over all live instructions in the graph, in allocation
    /// order. Use the layout for placement order.
    pub fn insts(&self) -> impl Iterator<Item = (Inst, &InstData)> {
        self.insts.iter()
    }

    /// Iterates over all live values in the graph.
    pub fn values(&self) -> impl Iterator<Item = (Value, &ValueData)> {
        self.values.iter()
    }

    fn register_uses(&mut self, inst: Inst) {
        let operands: Vec<Value> = self.insts[inst].args().to_vec();
        for (index, value) in operands.into_iter().enumerate() {
            self.uses.entry(value).or_default().insert(Use {
                user: inst,
                index: index as u16,
            });
        }
    }

    fn unregister_uses(&mut self, inst: Inst) {
        let operands: Vec<Value> = self.insts[inst].args().to_vec();
        for (index, value) in operands.into_iter().enumerate() {
            if let Some(set) = self.uses.get_mut(&value) {
                set.remove(&Use {
                    user: inst,
                    index: index as u16,
                });
                if set.is_empty() {
                    self.uses.remove(&value);
                }
            }
        }
    }
}

impl Index<Inst> for DataFlowGraph {
    type Output = InstData;

    fn index(&self, inst: Inst) -> &InstData {
        self.insts.get(inst)
    }
}

impl Index<Value> for DataFlowGraph {
    type Output = ValueData;

    fn index(&self, value: Value) -> &ValueData {
        self.values.get(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silica_common::IntValue;

    fn const_i32(dfg: &mut DataFlowGraph, value: i64) -> (Inst, Value) {
        let inst = dfg.add_inst(
            InstData::ConstInt {
                imm: IntValue::from_i64(32, value),
            },
            Type::Int(32),
        );
        (inst, dfg.inst_result(inst))
    }

    fn add(dfg: &mut DataFlowGraph, a: Value, b: Value) -> (Inst, Value) {
        let inst = dfg.add_inst(
            InstData::Binary {
                opcode: crate::inst::Opcode::Add,
                args: [a, b],
            },
            Type::Int(32),
        );
        (inst, dfg.inst_result(inst))
    }

    #[test]
    fn uses_track_operands() {
        let mut dfg = DataFlowGraph::new();
        let (_, a) = const_i32(&mut dfg, 1);
        let (_, b) = const_i32(&mut dfg, 2);
        let (sum, _) = add(&mut dfg, a, b);
        assert_eq!(dfg.num_uses(a), 1);
        assert_eq!(dfg.num_uses(b), 1);
        let u: Vec<Use> = dfg.uses(a).collect();
        assert_eq!(u, vec![Use { user: sum, index: 0 }]);
        let u: Vec<Use> = dfg.uses(b).collect();
        assert_eq!(u, vec![Use { user: sum, index: 1 }]);
    }

    #[test]
    fn use_list_consistency() {
        let mut dfg = DataFlowGraph::new();
        let (_, a) = const_i32(&mut dfg, 1);
        let (_, b) = const_i32(&mut dfg, 2);
        add(&mut dfg, a, a);
        add(&mut dfg, a, b);
        // Every use points at an operand slot holding the value.
        for (value, _) in dfg.values().collect::<Vec<_>>() {
            for u in dfg.uses(value) {
                assert_eq!(dfg[u.user].args()[u.index as usize], value);
            }
        }
        // Every operand slot is backed by a use entry.
        for (inst, data) in dfg.insts() {
            for (index, &arg) in data.args().iter().enumerate() {
                assert!(dfg.uses(arg).any(|u| u.user == inst && u.index == index as u16));
            }
        }
    }

    #[test]
    fn replace_all_uses_moves_edges() {
        let mut dfg = DataFlowGraph::new();
        let (_, a) = const_i32(&mut dfg, 1);
        let (_, b) = const_i32(&mut dfg, 2);
        let (u1, _) = add(&mut dfg, a, a);
        let (u2, _) = add(&mut dfg, a, b);
        let before: usize = dfg.num_uses(a) + dfg.num_uses(b);

        let count = dfg.replace_all_uses(a, b);
        assert_eq!(count, 3);
        assert_eq!(dfg.num_uses(a), 0);
        assert_eq!(dfg.num_uses(b), before);
        assert_eq!(dfg[u1].args(), &[b, b]);
        assert_eq!(dfg[u2].args(), &[b, b]);
        // Positions preserved.
        assert!(dfg.uses(b).any(|u| u.user == u1 && u.index == 0));
        assert!(dfg.uses(b).any(|u| u.user == u1 && u.index == 1));
    }

    #[test]
    fn replace_with_self_is_noop() {
        let mut dfg = DataFlowGraph::new();
        let (_, a) = const_i32(&mut dfg, 1);
        add(&mut dfg, a, a);
        assert_eq!(dfg.replace_all_uses(a, a), 0);
        assert_eq!(dfg.num_uses(a), 2);
    }

    #[test]
    fn remove_inst_unregisters_uses() {
        let mut dfg = DataFlowGraph::new();
        let (_, a) = const_i32(&mut dfg, 1);
        let (_, b) = const_i32(&mut dfg, 2);
        let (sum, _) = add(&mut dfg, a, b);
        dfg.remove_inst(sum);
        assert_eq!(dfg.num_uses(a), 0);
        assert_eq!(dfg.num_uses(b), 0);
        assert!(!dfg.contains_inst(sum));
    }

    #[test]
    #[should_panic(expected = "still in use")]
    fn remove_used_inst_panics() {
        let mut dfg = DataFlowGraph::new();
        let (ca, a) = const_i32(&mut dfg, 1);
        add(&mut dfg, a, a);
        dfg.remove_inst(ca);
    }

    #[test]
    fn names() {
        let mut dfg = DataFlowGraph::new();
        let (_, a) = const_i32(&mut dfg, 1);
        assert_eq!(dfg.value_name(a), None);
        dfg.set_value_name(a, "x");
        assert_eq!(dfg.value_name(a), Some("x"));
        assert_eq!(dfg.clear_value_name(a), Some("x".to_string()));
        assert_eq!(dfg.value_name(a), None);
    }

    #[test]
    fn ext_units_dedup() {
        let mut dfg = DataFlowGraph::new();
        let sig = Signature::new_function(vec![Type::Int(8)], Type::Int(8));
        let a = dfg.add_ext_unit("f", sig.clone());
        let b = dfg.add_ext_unit("f", sig.clone());
        let c = dfg.add_ext_unit("g", sig);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
