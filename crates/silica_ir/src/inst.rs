//! The instruction set.
//!
//! [`Opcode`] names the operation; [`InstData`] carries the operands in a
//! handful of shared formats. Operand contracts are enforced by
//! [`validate`], which both the builder and the verifier call: the
//! builder to reject construction, the verifier to re-check units that
//! arrived by other means (deserialization, hand assembly).

use crate::dfg::DataFlowGraph;
use crate::error::{BuildError, BuildResult};
use crate::ids::{Block, ExtUnit, Inst, Value};
use crate::layout::CfgLayout;
use crate::ty::Type;
use crate::unit::UnitKind;
use serde::{Deserialize, Serialize};
use silica_common::{IntValue, LogicVec, TimeValue};
use std::fmt;

/// An instruction opcode.
///
/// The opcode names the operation; [`InstData`] covers the format and
/// arguments of the instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Opcode {
    ConstInt,
    ConstLogic,
    ConstTime,
    Array,
    Struct,

    Not,
    Add,
    Sub,
    Mul,
    Udiv,
    Sdiv,
    Urem,
    Srem,
    And,
    Or,
    Xor,
    Shl,
    Lshr,
    Ashr,

    Eq,
    Ne,
    Ult,
    Ugt,
    Ule,
    Uge,
    Slt,
    Sgt,
    Sle,
    Sge,

    Mux,
    ExtractField,
    ExtractSlice,
    InsertField,
    InsertSlice,
    Reg,

    Sig,
    Prb,
    Drv,
    DrvCond,

    Call,
    Inst,

    Br,
    BrCond,
    Ret,
    RetValue,
    Wait,
    WaitTime,
    Halt,
}

impl Opcode {
    /// Returns the assembly mnemonic of this opcode.
    ///
    /// Several opcodes share a mnemonic (`const`, `extract`, `insert`,
    /// `br`, `ret`, `wait`, `drv`); the operand shape disambiguates.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::ConstInt | Opcode::ConstLogic | Opcode::ConstTime => "const",
            Opcode::Array => "array",
            Opcode::Struct => "struct",
            Opcode::Not => "not",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Udiv => "udiv",
            Opcode::Sdiv => "sdiv",
            Opcode::Urem => "urem",
            Opcode::Srem => "srem",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Shl => "shl",
            Opcode::Lshr => "lshr",
            Opcode::Ashr => "ashr",
            Opcode::Eq => "eq",
            Opcode::Ne => "ne",
            Opcode::Ult => "ult",
            Opcode::Ugt => "ugt",
            Opcode::Ule => "ule",
            Opcode::Uge => "uge",
            Opcode::Slt => "slt",
            Opcode::Sgt => "sgt",
            Opcode::Sle => "sle",
            Opcode::Sge => "sge",
            Opcode::Mux => "mux",
            Opcode::ExtractField | Opcode::ExtractSlice => "extract",
            Opcode::InsertField | Opcode::InsertSlice => "insert",
            Opcode::Reg => "reg",
            Opcode::Sig => "sig",
            Opcode::Prb => "prb",
            Opcode::Drv | Opcode::DrvCond => "drv",
            Opcode::Call => "call",
            Opcode::Inst => "inst",
            Opcode::Br | Opcode::BrCond => "br",
            Opcode::Ret | Opcode::RetValue => "ret",
            Opcode::Wait | Opcode::WaitTime => "wait",
            Opcode::Halt => "halt",
        }
    }

    /// Check if this opcode is valid in the given unit kind.
    pub fn valid_in(self, kind: UnitKind) -> bool {
        use UnitKind::*;
        match self {
            Opcode::Halt | Opcode::Wait | Opcode::WaitTime => kind == Process,
            Opcode::Ret | Opcode::RetValue => kind == Function,
            Opcode::Br | Opcode::BrCond => matches!(kind, Function | Process),
            Opcode::Prb | Opcode::Drv | Opcode::DrvCond => matches!(kind, Process | Entity),
            Opcode::Sig | Opcode::Inst | Opcode::Reg => kind == Entity,
            Opcode::Call => matches!(kind, Function | Process),
            _ => true,
        }
    }

    /// Check if this opcode constructs a constant.
    pub fn is_const(self) -> bool {
        matches!(
            self,
            Opcode::ConstInt | Opcode::ConstLogic | Opcode::ConstTime
        )
    }

    /// Check if this opcode terminates a basic block.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Br
                | Opcode::BrCond
                | Opcode::Ret
                | Opcode::RetValue
                | Opcode::Wait
                | Opcode::WaitTime
                | Opcode::Halt
        )
    }

    /// Check if this is a return instruction.
    pub fn is_return(self) -> bool {
        matches!(self, Opcode::Ret | Opcode::RetValue)
    }

    /// Check if this instruction has observable effects beyond its
    /// result value. Side-effecting instructions survive dead-code
    /// elimination even when their result is unused.
    pub fn has_side_effects(self) -> bool {
        self.is_terminator() || matches!(self, Opcode::Drv | Opcode::DrvCond | Opcode::Inst)
    }

    /// Check if this opcode introduces implicit state, breaking
    /// combinational dependency chains inside an entity.
    pub fn is_stateful(self) -> bool {
        matches!(self, Opcode::Reg | Opcode::Sig | Opcode::Inst)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// The trigger modes for register data acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegMode {
    /// The register follows the data while the trigger is low.
    Low,
    /// The register follows the data while the trigger is high.
    High,
    /// The register stores the data on the rising edge of the trigger.
    Rise,
    /// The register stores the data on the falling edge of the trigger.
    Fall,
    /// The register stores the data on any edge of the trigger.
    Both,
}

impl RegMode {
    /// Check if this is a level-sensitive mode.
    pub fn is_level(self) -> bool {
        matches!(self, RegMode::Low | RegMode::High)
    }

    /// Parses a mode mnemonic.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RegMode::Low),
            "high" => Some(RegMode::High),
            "rise" => Some(RegMode::Rise),
            "fall" => Some(RegMode::Fall),
            "both" => Some(RegMode::Both),
            _ => None,
        }
    }
}

impl fmt::Display for RegMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegMode::Low => write!(f, "low"),
            RegMode::High => write!(f, "high"),
            RegMode::Rise => write!(f, "rise"),
            RegMode::Fall => write!(f, "fall"),
            RegMode::Both => write!(f, "both"),
        }
    }
}

/// An instruction format.
///
/// Instructions with the same operand shape share a variant; the opcode
/// distinguishes the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstData {
    /// `a = const iN imm`
    ConstInt {
        /// The constant value, carrying its width.
        imm: IntValue,
    },
    /// `a = const nN "symbols"`
    ConstLogic {
        /// The constant value, carrying its width.
        imm: LogicVec,
    },
    /// `a = const time t`
    ConstTime {
        /// The constant time value.
        imm: TimeValue,
    },
    /// `opcode` — `halt`, `ret`
    Nullary {
        /// The operation.
        opcode: Opcode,
    },
    /// `a = opcode type x`
    Unary {
        /// The operation.
        opcode: Opcode,
        /// The operand.
        args: [Value; 1],
    },
    /// `a = opcode type x, y`
    Binary {
        /// The operation.
        opcode: Opcode,
        /// The operands.
        args: [Value; 2],
    },
    /// `drv sig, value, delay`
    Ternary {
        /// The operation.
        opcode: Opcode,
        /// The operands.
        args: [Value; 3],
    },
    /// `drv sig if gate, value, delay` — stored as `[sig, value, delay, gate]`
    Quaternary {
        /// The operation.
        opcode: Opcode,
        /// The operands.
        args: [Value; 4],
    },
    /// `a = array x, y, …` / `a = struct x, y, …`
    Aggregate {
        /// The operation.
        opcode: Opcode,
        /// The element values.
        args: Vec<Value>,
    },
    /// `a = extract type x, imms…` / `a = insert type x, imms…, y`
    ///
    /// For the extract forms the second operand slot is unused.
    InsExt {
        /// The operation.
        opcode: Opcode,
        /// Target and (for inserts) the inserted value.
        args: [Value; 2],
        /// Field index, or slice offset and length.
        imms: [u32; 2],
    },
    /// `a = reg type data, mode trigger [, avalue, amode atrigger]`
    ///
    /// `args` is `[data, trigger]` or `[data, trigger, avalue, atrigger]`;
    /// `modes` holds the synchronous mode and, when present, the level
    /// mode of the asynchronous override.
    Reg {
        /// Data and trigger values as described above.
        args: Vec<Value>,
        /// The trigger modes, aligned with the data/trigger pairs.
        modes: Vec<RegMode>,
    },
    /// `a = sig type` — declares a signal carrying `ty`.
    Sig {
        /// The carried (element) type of the declared signal.
        ty: Type,
    },
    /// `br bb`
    Jump {
        /// The unconditional branch target.
        bb: Block,
    },
    /// `br cond, bb1, bb0` — `bb1` taken when `cond` is 1.
    Branch {
        /// The branch condition.
        args: [Value; 1],
        /// Targets: `[taken-on-1, taken-on-0]`.
        bbs: [Block; 2],
    },
    /// `wait bb, sigs…` / `wait bb for time, sigs…`
    ///
    /// For `WaitTime` the first argument is the time operand.
    Wait {
        /// The operation (`Wait` or `WaitTime`).
        opcode: Opcode,
        /// The resume block.
        bb: Block,
        /// Observed signals, preceded by the time operand for `WaitTime`.
        args: Vec<Value>,
    },
    /// `a = call unit (args…)` / `inst unit (ins…) -> (outs…)`
    Call {
        /// The operation (`Call` or `Inst`).
        opcode: Opcode,
        /// The referenced unit.
        unit: ExtUnit,
        /// The number of leading input arguments.
        ins: u16,
        /// Input arguments followed by output arguments.
        args: Vec<Value>,
    },
}

impl InstData {
    /// Get the opcode of the instruction.
    pub fn opcode(&self) -> Opcode {
        match self {
            InstData::ConstInt { .. } => Opcode::ConstInt,
            InstData::ConstLogic { .. } => Opcode::ConstLogic,
            InstData::ConstTime { .. } => Opcode::ConstTime,
            InstData::Nullary { opcode } => *opcode,
            InstData::Unary { opcode, .. } => *opcode,
            InstData::Binary { opcode, .. } => *opcode,
            InstData::Ternary { opcode, .. } => *opcode,
            InstData::Quaternary { opcode, .. } => *opcode,
            InstData::Aggregate { opcode, .. } => *opcode,
            InstData::InsExt { opcode, .. } => *opcode,
            InstData::Reg { .. } => Opcode::Reg,
            InstData::Sig { .. } => Opcode::Sig,
            InstData::Jump { .. } => Opcode::Br,
            InstData::Branch { .. } => Opcode::BrCond,
            InstData::Wait { opcode, .. } => *opcode,
            InstData::Call { opcode, .. } => *opcode,
        }
    }

    /// Get the value operands of the instruction, in operand-position
    /// order.
    pub fn args(&self) -> &[Value] {
        match self {
            InstData::ConstInt { .. }
            | InstData::ConstLogic { .. }
            | InstData::ConstTime { .. }
            | InstData::Nullary { .. }
            | InstData::Sig { .. }
            | InstData::Jump { .. } => &[],
            InstData::Unary { args, .. } => args,
            InstData::Binary { args, .. } => args,
            InstData::Ternary { args, .. } => args,
            InstData::Quaternary { args, .. } => args,
            InstData::Aggregate { args, .. } => args,
            InstData::InsExt { opcode, args, .. } => match opcode {
                Opcode::ExtractField | Opcode::ExtractSlice => &args[0..1],
                _ => args,
            },
            InstData::Reg { args, .. } => args,
            InstData::Branch { args, .. } => args,
            InstData::Wait { args, .. } => args,
            InstData::Call { args, .. } => args,
        }
    }

    /// Mutable access to the value operands of the instruction.
    pub fn args_mut(&mut self) -> &mut [Value] {
        match self {
            InstData::ConstInt { .. }
            | InstData::ConstLogic { .. }
            | InstData::ConstTime { .. }
            | InstData::Nullary { .. }
            | InstData::Sig { .. }
            | InstData::Jump { .. } => &mut [],
            InstData::Unary { args, .. } => args,
            InstData::Binary { args, .. } => args,
            InstData::Ternary { args, .. } => args,
            InstData::Quaternary { args, .. } => args,
            InstData::Aggregate { args, .. } => args,
            InstData::InsExt { opcode, args, .. } => match opcode {
                Opcode::ExtractField | Opcode::ExtractSlice => &mut args[0..1],
                _ => args,
            },
            InstData::Reg { args, .. } => args,
            InstData::Branch { args, .. } => args,
            InstData::Wait { args, .. } => args,
            InstData::Call { args, .. } => args,
        }
    }

    /// Get the basic blocks referenced by the instruction.
    pub fn blocks(&self) -> &[Block] {
        match self {
            InstData::Jump { bb } => std::slice::from_ref(bb),
            InstData::Branch { bbs, .. } => bbs,
            InstData::Wait { bb, .. } => std::slice::from_ref(bb),
            _ => &[],
        }
    }

    /// Mutable access to the basic blocks referenced by the instruction.
    pub fn blocks_mut(&mut self) -> &mut [Block] {
        match self {
            InstData::Jump { bb } => std::slice::from_mut(bb),
            InstData::Branch { bbs, .. } => bbs,
            InstData::Wait { bb, .. } => std::slice::from_mut(bb),
            _ => &mut [],
        }
    }

    /// Get the immediate indices of an `extract`/`insert` instruction.
    pub fn imms(&self) -> &[u32] {
        match self {
            InstData::InsExt { opcode, imms, .. } => match opcode {
                Opcode::ExtractField | Opcode::InsertField => &imms[0..1],
                _ => imms,
            },
            _ => &[],
        }
    }

    /// Replace all block references to `from` with `to`, returning the
    /// number of replacements.
    pub fn replace_block(&mut self, from: Block, to: Block) -> usize {
        let mut count = 0;
        for bb in self.blocks_mut() {
            if *bb == from {
                *bb = to;
                count += 1;
            }
        }
        count
    }

    /// Return the integer constant constructed by this instruction.
    pub fn get_const_int(&self) -> Option<&IntValue> {
        match self {
            InstData::ConstInt { imm } => Some(imm),
            _ => None,
        }
    }

    /// Return the logic constant constructed by this instruction.
    pub fn get_const_logic(&self) -> Option<&LogicVec> {
        match self {
            InstData::ConstLogic { imm } => Some(imm),
            _ => None,
        }
    }

    /// Return the time constant constructed by this instruction.
    pub fn get_const_time(&self) -> Option<&TimeValue> {
        match self {
            InstData::ConstTime { imm } => Some(imm),
            _ => None,
        }
    }

    /// Return the external unit referenced by this `call` or `inst`.
    pub fn get_ext_unit(&self) -> Option<ExtUnit> {
        match self {
            InstData::Call { unit, .. } => Some(*unit),
            _ => None,
        }
    }

    /// Get the input arguments of a `call` or `inst` instruction.
    pub fn input_args(&self) -> &[Value] {
        match self {
            InstData::Call { args, ins, .. } => &args[0..*ins as usize],
            _ => &[],
        }
    }

    /// Get the output arguments of an `inst` instruction.
    pub fn output_args(&self) -> &[Value] {
        match self {
            InstData::Call { args, ins, .. } => &args[*ins as usize..],
            _ => &[],
        }
    }

    /// Get the data value of a `reg` instruction.
    pub fn reg_data(&self) -> Option<Value> {
        match self {
            InstData::Reg { args, .. } => Some(args[0]),
            _ => None,
        }
    }

    /// Get the synchronous trigger and mode of a `reg` instruction.
    pub fn reg_trigger(&self) -> Option<(Value, RegMode)> {
        match self {
            InstData::Reg { args, modes } => Some((args[1], modes[0])),
            _ => None,
        }
    }

    /// Get the asynchronous override of a `reg` instruction, as
    /// `(value, mode, trigger)`.
    pub fn reg_async(&self) -> Option<(Value, RegMode, Value)> {
        match self {
            InstData::Reg { args, modes } if args.len() == 4 => {
                Some((args[2], modes[1], args[3]))
            }
            _ => None,
        }
    }

    /// Get the signals observed by a `wait` instruction.
    pub fn wait_signals(&self) -> &[Value] {
        match self {
            InstData::Wait {
                opcode: Opcode::Wait,
                args,
                ..
            } => args,
            InstData::Wait {
                opcode: Opcode::WaitTime,
                args,
                ..
            } => &args[1..],
            _ => &[],
        }
    }

    /// Get the time operand of a `wait … for` instruction.
    pub fn wait_time(&self) -> Option<Value> {
        match self {
            InstData::Wait {
                opcode: Opcode::WaitTime,
                args,
                ..
            } => Some(args[0]),
            _ => None,
        }
    }
}

/// Validates an instruction's operand contract and computes its result
/// type. A [`Type::Void`] result means the instruction produces no value.
///
/// This is the single source of truth for operand contracts: the builder
/// calls it before inserting an instruction, and the verifier calls it to
/// re-check units that arrived by other means.
pub fn validate(dfg: &DataFlowGraph, data: &InstData) -> BuildResult<Type> {
    let opcode = data.opcode();
    let ty = |v: Value| dfg.value_type(v).clone();
    match data {
        InstData::ConstInt { imm } => {
            if imm.width() == 0 {
                return Err(BuildError::ZeroWidth(opcode));
            }
            Ok(Type::Int(imm.width()))
        }
        InstData::ConstLogic { imm } => {
            if imm.width() == 0 {
                return Err(BuildError::ZeroWidth(opcode));
            }
            Ok(Type::Logic(imm.width()))
        }
        InstData::ConstTime { .. } => Ok(Type::Time),
        InstData::Nullary { .. } => Ok(Type::Void),
        InstData::Sig { ty } => match ty {
            Type::Void | Type::Label => Err(BuildError::OperandType {
                opcode,
                expected: "a value type",
                found: ty.clone(),
            }),
            _ => Ok(Type::signal(ty.clone())),
        },
        InstData::Aggregate { args, .. } => match opcode {
            Opcode::Array => {
                let first = args
                    .first()
                    .ok_or(BuildError::EmptyAggregate(opcode))
                    .map(|&v| ty(v))?;
                for &arg in &args[1..] {
                    if ty(arg) != first {
                        return Err(BuildError::TypeMismatch {
                            opcode,
                            lhs: first,
                            rhs: ty(arg),
                        });
                    }
                }
                Ok(Type::array(args.len() as u32, first))
            }
            _ => Ok(Type::Struct(args.iter().map(|&v| ty(v)).collect())),
        },
        InstData::Unary { args, .. } => {
            let arg_ty = ty(args[0]);
            match opcode {
                Opcode::Not => match arg_ty {
                    Type::Int(_) | Type::Logic(_) => Ok(arg_ty),
                    _ => Err(BuildError::OperandType {
                        opcode,
                        expected: "an integer or logic type",
                        found: arg_ty,
                    }),
                },
                Opcode::Prb => match arg_ty {
                    Type::Signal(inner) => Ok(*inner),
                    _ => Err(BuildError::OperandType {
                        opcode,
                        expected: "a signal type",
                        found: arg_ty,
                    }),
                },
                // The value/signature match is checked at the unit level.
                Opcode::RetValue => Ok(Type::Void),
                _ => unreachable!("unary format with opcode {opcode}"),
            }
        }
        InstData::Binary { opcode, args } => {
            let (a, b) = (ty(args[0]), ty(args[1]));
            match opcode {
                Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Udiv
                | Opcode::Sdiv
                | Opcode::Urem
                | Opcode::Srem => {
                    if !a.is_int() {
                        return Err(BuildError::OperandType {
                            opcode: *opcode,
                            expected: "an integer type",
                            found: a,
                        });
                    }
                    if a != b {
                        return Err(BuildError::TypeMismatch {
                            opcode: *opcode,
                            lhs: a,
                            rhs: b,
                        });
                    }
                    Ok(a)
                }
                Opcode::And | Opcode::Or | Opcode::Xor => {
                    if !a.is_int() && !a.is_logic() {
                        return Err(BuildError::OperandType {
                            opcode: *opcode,
                            expected: "an integer or logic type",
                            found: a,
                        });
                    }
                    if a != b {
                        return Err(BuildError::TypeMismatch {
                            opcode: *opcode,
                            lhs: a,
                            rhs: b,
                        });
                    }
                    Ok(a)
                }
                Opcode::Shl | Opcode::Lshr | Opcode::Ashr => {
                    if !a.is_int() {
                        return Err(BuildError::OperandType {
                            opcode: *opcode,
                            expected: "an integer type",
                            found: a,
                        });
                    }
                    if !b.is_int() {
                        return Err(BuildError::OperandType {
                            opcode: *opcode,
                            expected: "an integer shift amount",
                            found: b,
                        });
                    }
                    Ok(a)
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
                    if !a.is_int() {
                        return Err(BuildError::OperandType {
                            opcode: *opcode,
                            expected: "an integer type",
                            found: a,
                        });
                    }
                    if a != b {
                        return Err(BuildError::TypeMismatch {
                            opcode: *opcode,
                            lhs: a,
                            rhs: b,
                        });
                    }
                    Ok(Type::Int(1))
                }
                Opcode::Mux => {
                    if !a.is_int() {
                        return Err(BuildError::OperandType {
                            opcode: *opcode,
                            expected: "an integer selector",
                            found: a,
                        });
                    }
                    match b {
                        Type::Array(_, elem) => Ok(*elem),
                        _ => Err(BuildError::OperandType {
                            opcode: *opcode,
                            expected: "an array of choices",
                            found: b,
                        }),
                    }
                }
                _ => unreachable!("binary format with opcode {opcode}"),
            }
        }
        InstData::Ternary { opcode, args } => match opcode {
            Opcode::Drv => validate_drv(*opcode, ty(args[0]), ty(args[1]), ty(args[2]), None),
            _ => unreachable!("ternary format with opcode {opcode}"),
        },
        InstData::Quaternary { opcode, args } => match opcode {
            Opcode::DrvCond => validate_drv(
                *opcode,
                ty(args[0]),
                ty(args[1]),
                ty(args[2]),
                Some(ty(args[3])),
            ),
            _ => unreachable!("quaternary format with opcode {opcode}"),
        },
        InstData::InsExt { opcode, args, imms } => {
            let target = ty(args[0]);
            match opcode {
                Opcode::ExtractField | Opcode::InsertField => {
                    let index = imms[0];
                    let field_ty = match &target {
                        Type::Struct(fields) => fields.get(index as usize).cloned(),
                        Type::Array(n, elem) => (index < *n).then(|| (**elem).clone()),
                        _ => {
                            return Err(BuildError::OperandType {
                                opcode: *opcode,
                                expected: "a struct or array type",
                                found: target,
                            })
                        }
                    }
                    .ok_or(BuildError::IndexOutOfRange { index, ty: target.clone() })?;
                    if *opcode == Opcode::ExtractField {
                        Ok(field_ty)
                    } else {
                        let value_ty = ty(args[1]);
                        if value_ty != field_ty {
                            return Err(BuildError::TypeMismatch {
                                opcode: *opcode,
                                lhs: field_ty,
                                rhs: value_ty,
                            });
                        }
                        Ok(target)
                    }
                }
                Opcode::ExtractSlice | Opcode::InsertSlice => {
                    let [offset, length] = *imms;
                    let (width, slice_ty) = match &target {
                        Type::Int(w) => (*w, Type::Int(length)),
                        Type::Logic(w) => (*w, Type::Logic(length)),
                        Type::Array(n, elem) => (*n, Type::array(length, (**elem).clone())),
                        _ => {
                            return Err(BuildError::OperandType {
                                opcode: *opcode,
                                expected: "an integer, logic, or array type",
                                found: target,
                            })
                        }
                    };
                    if length == 0 || offset.checked_add(length).is_none_or(|end| end > width) {
                        return Err(BuildError::SliceOutOfRange {
                            offset,
                            length,
                            ty: target,
                        });
                    }
                    if *opcode == Opcode::ExtractSlice {
                        Ok(slice_ty)
                    } else {
                        let value_ty = ty(args[1]);
                        if value_ty != slice_ty {
                            return Err(BuildError::TypeMismatch {
                                opcode: *opcode,
                                lhs: slice_ty,
                                rhs: value_ty,
                            });
                        }
                        Ok(target)
                    }
                }
                _ => unreachable!("insext format with opcode {opcode}"),
            }
        }
        InstData::Reg { args, modes } => {
            let data_ty = ty(args[0]);
            if data_ty.is_signal() || data_ty.is_void() || data_ty == Type::Label {
                return Err(BuildError::OperandType {
                    opcode,
                    expected: "a value type",
                    found: data_ty,
                });
            }
            if ty(args[1]) != Type::Int(1) {
                return Err(BuildError::OperandType {
                    opcode,
                    expected: "an `i1` trigger",
                    found: ty(args[1]),
                });
            }
            if args.len() == 4 {
                if !modes[1].is_level() {
                    return Err(BuildError::BadAsyncMode(modes[1]));
                }
                if ty(args[2]) != data_ty {
                    return Err(BuildError::TypeMismatch {
                        opcode,
                        lhs: data_ty,
                        rhs: ty(args[2]),
                    });
                }
                if ty(args[3]) != Type::Int(1) {
                    return Err(BuildError::OperandType {
                        opcode,
                        expected: "an `i1` trigger",
                        found: ty(args[3]),
                    });
                }
            }
            Ok(data_ty)
        }
        InstData::Jump { .. } => Ok(Type::Void),
        InstData::Branch { args, .. } => {
            if ty(args[0]) != Type::Int(1) {
                return Err(BuildError::OperandType {
                    opcode,
                    expected: "an `i1` condition",
                    found: ty(args[0]),
                });
            }
            Ok(Type::Void)
        }
        InstData::Wait { opcode, args, .. } => {
            let signals = match opcode {
                Opcode::WaitTime => {
                    let time_ty = ty(args[0]);
                    if !time_ty.is_time() {
                        return Err(BuildError::OperandType {
                            opcode: *opcode,
                            expected: "a time operand",
                            found: time_ty,
                        });
                    }
                    &args[1..]
                }
                _ => &args[..],
            };
            for &sig in signals {
                if !ty(sig).is_signal() {
                    return Err(BuildError::OperandType {
                        opcode: *opcode,
                        expected: "a signal type",
                        found: ty(sig),
                    });
                }
            }
            Ok(Type::Void)
        }
        InstData::Call {
            opcode,
            unit,
            ins,
            args,
        } => {
            let ext = dfg.ext_unit(*unit);
            let name = ext.name.clone();
            let inputs: Vec<Type> = ext.sig.input_types().to_vec();
            let outputs: Vec<Type> = ext.sig.output_types().to_vec();
            let ret = ext.sig.return_type().cloned();
            let in_args = &args[0..*ins as usize];
            let out_args = &args[*ins as usize..];
            if in_args.len() != inputs.len() {
                return Err(BuildError::SignatureMismatch {
                    unit: name,
                    what: "inputs",
                    expected: inputs.len(),
                    found: in_args.len(),
                });
            }
            for (&arg, expected) in in_args.iter().zip(&inputs) {
                if &ty(arg) != expected {
                    return Err(BuildError::TypeMismatch {
                        opcode: *opcode,
                        lhs: expected.clone(),
                        rhs: ty(arg),
                    });
                }
            }
            match opcode {
                Opcode::Call => {
                    let ret = ret.ok_or(BuildError::OperandType {
                        opcode: *opcode,
                        expected: "a function with a return type",
                        found: Type::Void,
                    })?;
                    Ok(ret)
                }
                _ => {
                    if out_args.len() != outputs.len() {
                        return Err(BuildError::SignatureMismatch {
                            unit: name,
                            what: "outputs",
                            expected: outputs.len(),
                            found: out_args.len(),
                        });
                    }
                    for (&arg, expected) in out_args.iter().zip(&outputs) {
                        if &ty(arg) != expected {
                            return Err(BuildError::TypeMismatch {
                                opcode: *opcode,
                                lhs: expected.clone(),
                                rhs: ty(arg),
                            });
                        }
                    }
                    Ok(Type::Void)
                }
            }
        }
    }
}

fn validate_drv(
    opcode: Opcode,
    sig: Type,
    value: Type,
    delay: Type,
    gate: Option<Type>,
) -> BuildResult<Type> {
    let inner = match &sig {
        Type::Signal(inner) => (**inner).clone(),
        _ => {
            return Err(BuildError::OperandType {
                opcode,
                expected: "a signal type",
                found: sig,
            })
        }
    };
    if value != inner {
        return Err(BuildError::TypeMismatch {
            opcode,
            lhs: inner,
            rhs: value,
        });
    }
    if !delay.is_time() {
        return Err(BuildError::OperandType {
            opcode,
            expected: "a time delay",
            found: delay,
        });
    }
    if let Some(gate) = gate {
        if gate != Type::Int(1) {
            return Err(BuildError::OperandType {
                opcode,
                expected: "an `i1` gate",
                found: gate,
            });
        }
    }
    Ok(Type::Void)
}

impl Inst {
    /// Creates a temporary object to print this instruction in
    /// human-readable form. The layout, when given, supplies block names
    /// for branch targets.
    pub fn dump<'a>(self, dfg: &'a DataFlowGraph, layout: Option<&'a CfgLayout>) -> InstDumper<'a> {
        InstDumper {
            inst: self,
            dfg,
            layout,
        }
    }
}

/// Temporary object to dump an [`Inst`] in human-readable form.
pub struct InstDumper<'a> {
    inst: Inst,
    dfg: &'a DataFlowGraph,
    layout: Option<&'a CfgLayout>,
}

impl InstDumper<'_> {
    fn value(&self, v: Value) -> String {
        match self.dfg.value_name(v) {
            Some(name) => format!("%{name}"),
            None => format!("%{}", v.as_raw()),
        }
    }

    fn block(&self, bb: Block) -> String {
        match self.layout.and_then(|l| l.block_name(bb)) {
            Some(name) => format!("%{name}"),
            None => format!("%bb{}", bb.as_raw()),
        }
    }

    /// The type printed between the mnemonic and the operands: the
    /// operand type for comparisons, probes, drives, and target-shaped
    /// instructions, the result type otherwise.
    fn governing_type(&self) -> Option<Type> {
        let dfg = self.dfg;
        let data = &dfg[self.inst];
        match data {
            InstData::ConstTime { .. } => Some(Type::Time),
            InstData::Sig { ty } => Some(ty.clone()),
            InstData::Binary { opcode, args } => match opcode {
                Opcode::Mux => Some(dfg.value_type(args[1]).clone()),
                Opcode::Eq
                | Opcode::Ne
                | Opcode::Ult
                | Opcode::Ugt
                | Opcode::Ule
                | Opcode::Uge
                | Opcode::Slt
                | Opcode::Sgt
                | Opcode::Sle
                | Opcode::Sge => Some(dfg.value_type(args[0]).clone()),
                _ => dfg.get_inst_result(self.inst).map(|v| dfg.value_type(v).clone()),
            },
            InstData::Unary { opcode, args } => match opcode {
                Opcode::Prb => Some(dfg.value_type(args[0]).clone()),
                Opcode::RetValue => Some(dfg.value_type(args[0]).clone()),
                _ => dfg.get_inst_result(self.inst).map(|v| dfg.value_type(v).clone()),
            },
            InstData::Ternary { args, .. } => Some(dfg.value_type(args[0]).clone()),
            InstData::Quaternary { args, .. } => Some(dfg.value_type(args[0]).clone()),
            InstData::InsExt { args, .. } => Some(dfg.value_type(args[0]).clone()),
            InstData::Nullary { .. }
            | InstData::Jump { .. }
            | InstData::Branch { .. }
            | InstData::Wait { .. } => None,
            InstData::Call { opcode, .. } => match opcode {
                Opcode::Call => dfg.get_inst_result(self.inst).map(|v| dfg.value_type(v).clone()),
                _ => None,
            },
            _ => dfg.get_inst_result(self.inst).map(|v| dfg.value_type(v).clone()),
        }
    }
}

impl fmt::Display for InstDumper<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dfg = self.dfg;
        let data = &dfg[self.inst];
        if let Some(result) = dfg.get_inst_result(self.inst) {
            write!(f, "{} = ", self.value(result))?;
        }
        write!(f, "{}", data.opcode())?;
        if let Some(ty) = self.governing_type() {
            write!(f, " {ty}")?;
        }
        match data {
            InstData::ConstInt { imm } => write!(f, " {imm}")?,
            InstData::ConstLogic { imm } => write!(f, " \"{imm}\"")?,
            InstData::ConstTime { imm } => write!(f, " {imm}")?,
            InstData::Sig { .. } | InstData::Nullary { .. } => {}
            InstData::Jump { bb } => write!(f, " {}", self.block(*bb))?,
            InstData::Branch { args, bbs } => write!(
                f,
                " {}, {}, {}",
                self.value(args[0]),
                self.block(bbs[0]),
                self.block(bbs[1])
            )?,
            InstData::Wait { opcode, bb, args } => {
                write!(f, " {}", self.block(*bb))?;
                let signals = if *opcode == Opcode::WaitTime {
                    write!(f, " for {}", self.value(args[0]))?;
                    &args[1..]
                } else {
                    &args[..]
                };
                for sig in signals {
                    write!(f, ", {}", self.value(*sig))?;
                }
            }
            InstData::Quaternary {
                opcode: Opcode::DrvCond,
                args,
            } => write!(
                f,
                " {} if {}, {}, {}",
                self.value(args[0]),
                self.value(args[3]),
                self.value(args[1]),
                self.value(args[2])
            )?,
            InstData::InsExt { opcode, args, .. } => {
                write!(f, " {}", self.value(args[0]))?;
                for imm in data.imms() {
                    write!(f, ", {imm}")?;
                }
                if matches!(opcode, Opcode::InsertField | Opcode::InsertSlice) {
                    write!(f, ", {}", self.value(args[1]))?;
                }
            }
            InstData::Reg { args, modes } => {
                write!(
                    f,
                    " {}, {} {}",
                    self.value(args[0]),
                    modes[0],
                    self.value(args[1])
                )?;
                if args.len() == 4 {
                    write!(
                        f,
                        ", {}, {} {}",
                        self.value(args[2]),
                        modes[1],
                        self.value(args[3])
                    )?;
                }
            }
            InstData::Call { opcode, unit, .. } => {
                write!(f, " @{}", dfg.ext_unit(*unit).name)?;
                write!(f, " (")?;
                for (i, arg) in data.input_args().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.value(*arg))?;
                }
                write!(f, ")")?;
                if *opcode == Opcode::Inst {
                    write!(f, " -> (")?;
                    for (i, arg) in data.output_args().iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", self.value(*arg))?;
                    }
                    write!(f, ")")?;
                }
            }
            _ => {
                for (i, arg) in data.args().iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}", self.value(*arg))?;
                }
            }
        }
        Ok(())
    }
}
