//! Sequential-logic recognition.

use crate::pass::{Pass, PassContext};
use log::debug;
use silica_ir::{
    Block, InstData, Module, Opcode, RegMode, UnitBuilder, UnitData, UnitKind, Value,
};
use std::collections::BTreeMap;

/// Sequential-logic recognition (`deseq`).
///
/// Recovers flip-flop intent from the canonical event-driven idiom: a
/// process that samples its signals, waits, re-samples, combines the
/// samples into edge expressions, and conditionally drives its outputs
/// under the resulting guard. Such a process is replaced by an entity
/// whose drives go through `reg` instructions carrying the identified
/// clock edge, gating, and asynchronous reset. Processes that do not
/// match the idiom are left untouched; a second run over the result is
/// a no-op, since entities are never candidates.
pub struct Desequentialization;

impl Pass for Desequentialization {
    const NAME: &'static str = "deseq";

    fn run_on_module(_ctx: &PassContext, module: &mut Module) -> bool {
        let mut modified = false;
        for id in module.unit_ids() {
            let recovered = {
                let unit = match module.get(id).get_data() {
                    Some(unit) if unit.kind() == UnitKind::Process => unit,
                    _ => continue,
                };
                match desequentialize(unit) {
                    Ok(entity) => {
                        debug!("desequentialized {}", unit.headline());
                        Some(entity)
                    }
                    Err(reason) => {
                        debug!("deseq declined {}: {}", unit.headline(), reason);
                        None
                    }
                }
            };
            if let Some(entity) = recovered {
                module
                    .replace_unit(id, entity)
                    .expect("replacement keeps the unit name");
                modified = true;
            }
        }
        modified
    }
}

/// An atom of the flattened event guard.
enum Leaf {
    /// A pre-wait sample of the signal, possibly negated.
    Pre(Value, bool),
    /// A post-wait sample of the signal, possibly negated.
    Post(Value, bool),
    /// Any other boolean value computed from post-wait samples.
    Gate(Value),
}

/// One conjunction of the guard's disjunctive normal form.
struct Term {
    /// The clock edge, when the term contains one.
    edge: Option<(Value, RegMode)>,
    /// Remaining conjuncts, composed into the strobe by `and`.
    gates: Vec<Value>,
    /// The level atom of a pure level term (asynchronous override).
    level: Option<(Value, bool)>,
}

/// What one gated drive recovers to.
struct RecoveredDrive {
    /// The driven output port.
    target: Value,
    /// The clock signal and edge.
    clock: (Value, RegMode),
    /// Gating values composed into the strobe.
    gates: Vec<Value>,
    /// Asynchronous reset: signal, active-low flag, and the constant
    /// reset value.
    reset: Option<(Value, bool, Value)>,
    /// The synchronous data value.
    data: Value,
    /// The drive delay.
    delay: Value,
}

/// Attempts to recover one process; errors are decline reasons.
fn desequentialize(unit: &UnitData) -> Result<UnitData, String> {
    let layout = unit.layout.cfg();
    let blocks: Vec<Block> = layout.blocks().collect();
    let (init, check) = match blocks[..] {
        [init, check] => (init, check),
        _ => return Err("canonical two-block shape required".into()),
    };
    let init_term = layout.last_inst(init).ok_or("unterminated init block")?;
    let check_term = layout.last_inst(check).ok_or("unterminated check block")?;
    match &unit.dfg[init_term] {
        InstData::Wait {
            opcode: Opcode::Wait,
            bb,
            ..
        } if *bb == check => {}
        _ => return Err("init block must wait into the check block".into()),
    }
    match &unit.dfg[check_term] {
        InstData::Jump { bb } if *bb == init => {}
        _ => return Err("check block must branch back to the init block".into()),
    }

    // Sort the probes into pre-wait and post-wait samples.
    let mut pre_of: BTreeMap<Value, Value> = BTreeMap::new();
    let mut post_of: BTreeMap<Value, Value> = BTreeMap::new();
    for &inst in layout.insts(init) {
        if inst == init_term {
            continue;
        }
        match unit.dfg[inst].opcode() {
            Opcode::Prb => {
                let sig = unit.dfg[inst].args()[0];
                if unit.dfg.get_value_inst(sig).is_some() {
                    return Err("probe of a non-port signal".into());
                }
                pre_of.insert(unit.dfg.inst_result(inst), sig);
            }
            op if op.is_const() => {}
            _ => return Err("init block computes more than samples".into()),
        }
    }
    for &inst in layout.insts(check) {
        if unit.dfg[inst].opcode() == Opcode::Prb {
            let sig = unit.dfg[inst].args()[0];
            if unit.dfg.get_value_inst(sig).is_some() {
                return Err("probe of a non-port signal".into());
            }
            post_of.insert(unit.dfg.inst_result(inst), sig);
        }
    }

    // Analyze every drive of the check block.
    let mut drives = Vec::new();
    for &inst in layout.insts(check) {
        match unit.dfg[inst].opcode() {
            Opcode::Drv => return Err("ungated drive in event-driven process".into()),
            Opcode::DrvCond => {
                let args = unit.dfg[inst].args().to_vec();
                let target = args[0];
                if unit.dfg.get_value_inst(target).is_some() {
                    return Err("drive of a non-port signal".into());
                }
                let delay_def = unit
                    .dfg
                    .get_value_inst(args[2])
                    .ok_or("drive delay is a port")?;
                if unit.dfg[delay_def].get_const_time().is_none() {
                    return Err("drive delay is not a constant".into());
                }
                let (clock, gates, reset_lv) =
                    analyze_guard(unit, &pre_of, &post_of, args[3])?;
                let (data, reset) =
                    analyze_value(unit, &post_of, args[1], reset_lv)?;
                drives.push(RecoveredDrive {
                    target,
                    clock,
                    gates,
                    reset,
                    data,
                    delay: args[2],
                });
            }
            _ => {}
        }
    }
    if drives.is_empty() {
        return Err("no gated drives to recover registers from".into());
    }

    build_entity(unit, &post_of, drives)
}

fn flatten(unit: &UnitData, opcode: Opcode, value: Value, out: &mut Vec<Value>) {
    if let Some(def) = unit.dfg.get_value_inst(value) {
        if let InstData::Binary { opcode: op, args } = &unit.dfg[def] {
            if *op == opcode {
                flatten(unit, opcode, args[0], out);
                flatten(unit, opcode, args[1], out);
                return;
            }
        }
    }
    out.push(value);
}

fn classify_leaf(
    unit: &UnitData,
    pre_of: &BTreeMap<Value, Value>,
    post_of: &BTreeMap<Value, Value>,
    leaf: Value,
) -> Leaf {
    if let Some(&sig) = post_of.get(&leaf) {
        return Leaf::Post(sig, true);
    }
    if let Some(&sig) = pre_of.get(&leaf) {
        return Leaf::Pre(sig, true);
    }
    if let Some(def) = unit.dfg.get_value_inst(leaf) {
        if let InstData::Unary {
            opcode: Opcode::Not,
            args,
        } = &unit.dfg[def]
        {
            if let Some(&sig) = post_of.get(&args[0]) {
                return Leaf::Post(sig, false);
            }
            if let Some(&sig) = pre_of.get(&args[0]) {
                return Leaf::Pre(sig, false);
            }
        }
    }
    Leaf::Gate(leaf)
}

fn analyze_term(
    unit: &UnitData,
    pre_of: &BTreeMap<Value, Value>,
    post_of: &BTreeMap<Value, Value>,
    term: Value,
) -> Result<Term, String> {
    let mut leaves = Vec::new();
    flatten(unit, Opcode::And, term, &mut leaves);

    let mut pres: Vec<(Value, bool)> = Vec::new();
    let mut posts: Vec<(Value, bool, Value)> = Vec::new();
    let mut gates: Vec<Value> = Vec::new();
    for leaf in leaves {
        match classify_leaf(unit, pre_of, post_of, leaf) {
            Leaf::Pre(sig, positive) => pres.push((sig, positive)),
            Leaf::Post(sig, positive) => posts.push((sig, positive, leaf)),
            Leaf::Gate(value) => gates.push(value),
        }
    }

    // Pair each pre-wait sample with the opposite-polarity post-wait
    // sample of the same signal to form an edge.
    let mut edge = None;
    for (sig, pre_positive) in pres {
        let pos = posts
            .iter()
            .position(|&(s, post_positive, _)| s == sig && post_positive != pre_positive)
            .ok_or("pre-wait sample is not part of an edge expression")?;
        if edge.is_some() {
            return Err("more than one edge in a single term".into());
        }
        let mode = if pre_positive {
            RegMode::Fall
        } else {
            RegMode::Rise
        };
        edge = Some((sig, mode));
        posts.remove(pos);
    }

    if edge.is_some() {
        // Remaining samples gate the clock.
        gates.extend(posts.into_iter().map(|(_, _, leaf)| leaf));
        Ok(Term {
            edge,
            gates,
            level: None,
        })
    } else {
        match (posts.len(), gates.len()) {
            (1, 0) => {
                let (sig, positive, _) = posts[0];
                Ok(Term {
                    edge: None,
                    gates: Vec::new(),
                    level: Some((sig, !positive)),
                })
            }
            _ => Err("unrecognized level term in event guard".into()),
        }
    }
}

/// Decomposes the guard into one clock term and at most one level term.
#[allow(clippy::type_complexity)]
fn analyze_guard(
    unit: &UnitData,
    pre_of: &BTreeMap<Value, Value>,
    post_of: &BTreeMap<Value, Value>,
    guard: Value,
) -> Result<((Value, RegMode), Vec<Value>, Option<(Value, bool)>), String> {
    let mut terms = Vec::new();
    flatten(unit, Opcode::Or, guard, &mut terms);

    let mut clock = None;
    let mut reset = None;
    for term in terms {
        let info = analyze_term(unit, pre_of, post_of, term)?;
        if let Some(edge) = info.edge {
            if clock.is_some() {
                return Err("more than one clock edge in the guard".into());
            }
            clock = Some((edge, info.gates));
        } else if let Some(level) = info.level {
            if reset.is_some() {
                return Err("more than one level term in the guard".into());
            }
            reset = Some(level);
        }
    }
    let (clock, gates) = clock.ok_or("no clock edge in the guard")?;
    Ok((clock, gates, reset))
}

/// Splits the driven value into synchronous data and, when a reset term
/// is present, the constant reset value selected by the reset level.
fn analyze_value(
    unit: &UnitData,
    post_of: &BTreeMap<Value, Value>,
    value: Value,
    reset: Option<(Value, bool)>,
) -> Result<(Value, Option<(Value, bool, Value)>), String> {
    let (rsig, active_low) = match reset {
        None => return Ok((value, None)),
        Some(reset) => reset,
    };
    let mux_def = unit
        .dfg
        .get_value_inst(value)
        .ok_or("reset present but drive value is a port")?;
    let (sel, choices) = match &unit.dfg[mux_def] {
        InstData::Binary {
            opcode: Opcode::Mux,
            args,
        } => (args[0], args[1]),
        _ => return Err("reset present but drive value is not selected by it".into()),
    };
    let arms = match unit
        .dfg
        .get_value_inst(choices)
        .map(|def| &unit.dfg[def])
    {
        Some(InstData::Aggregate {
            opcode: Opcode::Array,
            args,
        }) if args.len() == 2 => [args[0], args[1]],
        _ => return Err("reset selection is not a two-way choice".into()),
    };
    // Which arm is selected while the reset is active?
    let reset_index = match classify_leaf(unit, &BTreeMap::new(), post_of, sel) {
        Leaf::Post(sig, positive) if sig == rsig => {
            let active_level = !active_low;
            if positive == active_level {
                1
            } else {
                0
            }
        }
        _ => return Err("reset selection does not test the reset signal".into()),
    };
    let rstval = arms[reset_index];
    let data = arms[1 - reset_index];
    let rst_def = unit
        .dfg
        .get_value_inst(rstval)
        .ok_or("reset value is a port")?;
    if !unit.dfg[rst_def].opcode().is_const() {
        return Err("reset value is not a constant".into());
    }
    Ok((data, Some((rsig, active_low, rstval))))
}

/// Builds the replacement entity from the analyzed drives.
fn build_entity(
    unit: &UnitData,
    post_of: &BTreeMap<Value, Value>,
    drives: Vec<RecoveredDrive>,
) -> Result<UnitData, String> {
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
    let mut probes: BTreeMap<Value, Value> = BTreeMap::new();
    for drive in drives {
        let strobe_base = probe(unit, &mut ub, &map, &mut probes, drive.clock.0)?;
        let mut strobe = strobe_base;
        for gate in &drive.gates {
            let gate = clone_value(unit, &mut ub, &mut map, post_of, &mut probes, *gate)?;
            strobe = ub
                .ins()
                .and(strobe, gate)
                .map_err(|err| err.to_string())?;
        }
        let data = clone_value(unit, &mut ub, &mut map, post_of, &mut probes, drive.data)?;
        let q = match drive.reset {
            None => ub
                .ins()
                .reg(data, drive.clock.1, strobe)
                .map_err(|err| err.to_string())?,
            Some((rsig, active_low, rstval)) => {
                let rstval =
                    clone_value(unit, &mut ub, &mut map, post_of, &mut probes, rstval)?;
                let rst = probe(unit, &mut ub, &map, &mut probes, rsig)?;
                let amode = if active_low {
                    RegMode::Low
                } else {
                    RegMode::High
                };
                ub.ins()
                    .reg_async(data, drive.clock.1, strobe, rstval, amode, rst)
                    .map_err(|err| err.to_string())?
            }
        };
        let delay = clone_value(unit, &mut ub, &mut map, post_of, &mut probes, drive.delay)?;
        let target = map[&drive.target];
        ub.ins()
            .drv(target, q, delay)
            .map_err(|err| err.to_string())?;
    }
    Ok(entity)
}

/// Probes a port in the entity, reusing an existing probe of the same
/// signal.
fn probe(
    unit: &UnitData,
    ub: &mut UnitBuilder,
    map: &BTreeMap<Value, Value>,
    probes: &mut BTreeMap<Value, Value>,
    sig: Value,
) -> Result<Value, String> {
    if let Some(&value) = probes.get(&sig) {
        return Ok(value);
    }
    let mapped = *map.get(&sig).ok_or("signal is not a port")?;
    let value = ub.ins().prb(mapped).map_err(|err| err.to_string())?;
    if let Some(name) = unit.dfg.value_name(sig) {
        let name = format!("{name}_val");
        ub.dfg_mut().set_value_name(value, name);
    }
    probes.insert(sig, value);
    Ok(value)
}

/// Clones the pure expression defining `old` into the entity, rewriting
/// post-wait samples into entity-level probes.
fn clone_value(
    unit: &UnitData,
    ub: &mut UnitBuilder,
    map: &mut BTreeMap<Value, Value>,
    post_of: &BTreeMap<Value, Value>,
    probes: &mut BTreeMap<Value, Value>,
    old: Value,
) -> Result<Value, String> {
    if let Some(&new) = map.get(&old) {
        return Ok(new);
    }
    if let Some(&sig) = post_of.get(&old) {
        let new = probe(unit, ub, map, probes, sig)?;
        map.insert(old, new);
        return Ok(new);
    }
    let def = unit
        .dfg
        .get_value_inst(old)
        .ok_or("value is not defined by an instruction")?;
    let data = &unit.dfg[def];
    match data.opcode() {
        Opcode::Prb => return Err("pre-wait sample escapes the event expression".into()),
        op if op.has_side_effects() || op.is_terminator() => {
            return Err("effectful value in the recovered expression".into())
        }
        _ => {}
    }
    let mut cloned = data.clone();
    let args = cloned.args().to_vec();
    let mut new_args = Vec::with_capacity(args.len());
    for arg in args {
        new_args.push(clone_value(unit, ub, map, post_of, probes, arg)?);
    }
    for (slot, new_arg) in cloned.args_mut().iter_mut().zip(new_args) {
        *slot = new_arg;
    }
    let new_inst = ub.build_data(cloned).map_err(|err| err.to_string())?;
    let new = ub.dfg().inst_result(new_inst);
    map.insert(old, new);
    Ok(new)
}
