//! The pass trait and run protocol.

use silica_ir::{Inst, Module, UnitBuilder, UnitData};

/// Additional context and configuration for pass runs.
#[derive(Debug, Clone, Default)]
pub struct PassContext {
    /// Re-verify the module after each pass of a pipeline. Enabled by
    /// the driver in debug builds.
    pub verify_each: bool,
}

/// The outcome of one pass run over a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass mutated the module.
    Applied,
    /// The pass found nothing to do and left the module unchanged.
    Declined(String),
}

/// A transformation over the IR.
///
/// The infrastructure always calls [`run_on_module`](Pass::run_on_module);
/// implementors override whichever granularity suits them. The defaults
/// cascade module → unit → instruction. Units are visited sequentially;
/// one logical actor mutates a module at a time.
pub trait Pass {
    /// The stable name the pass is looked up by.
    const NAME: &'static str;

    /// Runs the pass on an entire module. Returns `true` if anything
    /// changed.
    fn run_on_module(ctx: &PassContext, module: &mut Module) -> bool {
        let mut modified = false;
        for id in module.unit_ids() {
            if let Some(unit) = module.get_mut(id).get_data_mut() {
                modified |= Self::run_on_unit(ctx, unit);
            }
        }
        modified
    }

    /// Runs the pass on a single unit. Returns `true` if anything
    /// changed. The default visits every placed instruction.
    fn run_on_unit(ctx: &PassContext, unit: &mut UnitData) -> bool {
        let insts: Vec<Inst> = unit.layout.all_insts().collect();
        let mut builder = UnitBuilder::new(unit);
        let mut modified = false;
        for inst in insts {
            if builder.dfg().contains_inst(inst) {
                modified |= Self::run_on_inst(ctx, inst, &mut builder);
            }
        }
        modified
    }

    /// Runs the pass on a single instruction. Returns `true` if anything
    /// changed.
    #[allow(unused_variables)]
    fn run_on_inst(ctx: &PassContext, inst: Inst, builder: &mut UnitBuilder) -> bool {
        false
    }
}
