//! Units: functions, processes, entities, and declarations.
//!
//! A [`UnitData`] bundles a unit's kind, name, signature, value/use
//! graph, and layout. Constructors validate the signature against the
//! kind: functions take value inputs and a return type; processes and
//! entities take signal ports and no return type.

use crate::dfg::DataFlowGraph;
use crate::error::{BuildError, BuildResult};
use crate::ids::Value;
use crate::layout::{CfgLayout, FlatLayout, UnitLayout};
use crate::ty::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a unit with a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// A combinational function: a CFG whose every path ends in `ret`.
    Function,
    /// A behavioral process: a CFG with suspension points.
    Process,
    /// A structural entity: a flat parallel composition.
    Entity,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Function => write!(f, "func"),
            UnitKind::Process => write!(f, "proc"),
            UnitKind::Entity => write!(f, "entity"),
        }
    }
}

/// The name of a unit, unique within its module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitName(String);

impl UnitName {
    /// Creates a unit name. The name is stored without the `@` sigil.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name without the `@` sigil.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// The signature of a unit: input types, output types, and an optional
/// return type.
///
/// Functions have inputs and a return type; processes and entities have
/// input and output ports of signal type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Signature {
    inputs: Vec<Type>,
    outputs: Vec<Type>,
    ret: Option<Type>,
}

impl Signature {
    /// Creates a function signature with the given inputs and return
    /// type.
    pub fn new_function(inputs: Vec<Type>, ret: Type) -> Self {
        Self {
            inputs,
            outputs: Vec::new(),
            ret: Some(ret),
        }
    }

    /// Creates a process or entity signature with the given input and
    /// output ports.
    pub fn new_ports(inputs: Vec<Type>, outputs: Vec<Type>) -> Self {
        Self {
            inputs,
            outputs,
            ret: None,
        }
    }

    /// The input types.
    pub fn input_types(&self) -> &[Type] {
        &self.inputs
    }

    /// The output types.
    pub fn output_types(&self) -> &[Type] {
        &self.outputs
    }

    /// The return type, for function signatures.
    pub fn return_type(&self) -> Option<&Type> {
        self.ret.as_ref()
    }

    /// Returns `true` if this signature carries a return type.
    pub fn has_return_type(&self) -> bool {
        self.ret.is_some()
    }

    /// The number of inputs.
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// The number of outputs.
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Iterates over all argument types, inputs first, then outputs.
    pub fn arg_types(&self) -> impl Iterator<Item = &Type> {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

/// A unit with a body: a function, process, or entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitData {
    kind: UnitKind,
    name: UnitName,
    sig: Signature,
    /// The unit's value/use graph.
    pub dfg: DataFlowGraph,
    /// The unit's block/instruction placement.
    pub layout: UnitLayout,
}

impl UnitData {
    /// Creates a new, empty unit, validating the signature against the
    /// kind.
    pub fn new(kind: UnitKind, name: UnitName, sig: Signature) -> BuildResult<Self> {
        match kind {
            UnitKind::Function => {
                if !sig.has_return_type() || sig.num_outputs() != 0 {
                    return Err(BuildError::BadFunctionSignature);
                }
                if sig.input_types().iter().any(Type::is_signal) {
                    return Err(BuildError::BadFunctionSignature);
                }
            }
            UnitKind::Process | UnitKind::Entity => {
                if sig.has_return_type() {
                    return Err(BuildError::UnexpectedReturnType(kind));
                }
                if let Some(ty) = sig.arg_types().find(|ty| !ty.is_signal()) {
                    return Err(BuildError::NonSignalPort {
                        kind,
                        ty: ty.clone(),
                    });
                }
            }
        }
        let layout = match kind {
            UnitKind::Entity => UnitLayout::Flat(FlatLayout::new()),
            _ => UnitLayout::Cfg(CfgLayout::new()),
        };
        let mut dfg = DataFlowGraph::new();
        dfg.make_args_for_signature(&sig);
        Ok(Self {
            kind,
            name,
            sig,
            dfg,
            layout,
        })
    }

    /// The kind of the unit.
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// The name of the unit.
    pub fn name(&self) -> &UnitName {
        &self.name
    }

    /// Renames the unit. The module's name index is maintained by
    /// [`Module::rename_unit`](crate::module::Module::rename_unit); this
    /// only changes the unit's own record.
    pub(crate) fn set_name(&mut self, name: UnitName) {
        self.name = name;
    }

    /// The signature of the unit.
    pub fn sig(&self) -> &Signature {
        &self.sig
    }

    /// The value of the input argument at the given position.
    pub fn input_arg(&self, index: usize) -> Value {
        assert!(index < self.sig.num_inputs(), "input index out of range");
        self.dfg.arg_value(index)
    }

    /// The value of the output argument at the given position.
    pub fn output_arg(&self, index: usize) -> Value {
        assert!(index < self.sig.num_outputs(), "output index out of range");
        self.dfg.arg_value(self.sig.num_inputs() + index)
    }

    /// A short human-readable identifier, e.g. `proc @shift`.
    pub fn headline(&self) -> String {
        format!("{} {}", self.kind, self.name)
    }
}

/// An external declaration: a name and signature without a body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclData {
    /// The declared name.
    pub name: UnitName,
    /// The declared signature.
    pub sig: Signature,
}
