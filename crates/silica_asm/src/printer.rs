//! Renders a module back to assembly text.
//!
//! The printer works on a clone of each unit: anonymous values receive
//! sequential numeric names (`%0`, `%1`, …), anonymous blocks receive
//! `bbN` labels, and duplicate names are uniquified with a numeric
//! suffix. The instruction renderer is the IR's own dumper, so the
//! diagnostic and assembly forms never drift apart.

use silica_ir::{ModUnit, Module, Signature, UnitData, UnitKind, UnitLayout, Value};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Renders a module to assembly text.
pub fn module_to_string(module: &Module) -> String {
    let mut out = String::new();
    write_module(module, &mut out).expect("writing to a string cannot fail");
    out
}

/// Writes a module as assembly text.
pub fn write_module(module: &Module, out: &mut impl Write) -> std::fmt::Result {
    let mut first = true;
    for (_, slot) in module.units() {
        if !first {
            writeln!(out)?;
        }
        first = false;
        match slot {
            ModUnit::Decl(decl) => write_decl(&decl.name.to_string(), &decl.sig, out)?,
            ModUnit::Data(unit) => {
                let mut named = unit.clone();
                assign_names(&mut named);
                write_unit(&named, out)?;
            }
        }
    }
    Ok(())
}

fn write_decl(name: &str, sig: &Signature, out: &mut impl Write) -> std::fmt::Result {
    write!(out, "decl {name} (")?;
    for (i, ty) in sig.input_types().iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "{ty}")?;
    }
    write!(out, ")")?;
    match sig.return_type() {
        Some(ret) => write!(out, " {ret}")?,
        None => {
            write!(out, " -> (")?;
            for (i, ty) in sig.output_types().iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                write!(out, "{ty}")?;
            }
            write!(out, ")")?;
        }
    }
    writeln!(out)
}

fn write_unit(unit: &UnitData, out: &mut impl Write) -> std::fmt::Result {
    let sig = unit.sig();
    write!(out, "{} {} (", unit.kind(), unit.name())?;
    for (i, ty) in sig.input_types().iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        let arg = unit.dfg.arg_value(i);
        write!(out, "{ty} %{}", unit.dfg.value_name(arg).unwrap_or(""))?;
    }
    write!(out, ")")?;
    match unit.kind() {
        UnitKind::Function => {
            let ret = sig.return_type().expect("functions have a return type");
            write!(out, " {ret}")?;
        }
        _ => {
            write!(out, " -> (")?;
            for (i, ty) in sig.output_types().iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                let arg = unit.dfg.arg_value(sig.num_inputs() + i);
                write!(out, "{ty} %{}", unit.dfg.value_name(arg).unwrap_or(""))?;
            }
            write!(out, ")")?;
        }
    }
    writeln!(out, " {{")?;
    match &unit.layout {
        UnitLayout::Flat(layout) => {
            for inst in layout.insts() {
                writeln!(out, "    {}", inst.dump(&unit.dfg, None))?;
            }
        }
        UnitLayout::Cfg(layout) => {
            for bb in layout.blocks() {
                writeln!(out, "{}:", layout.block_name(bb).unwrap_or(""))?;
                for &inst in layout.insts(bb) {
                    writeln!(out, "    {}", inst.dump(&unit.dfg, Some(layout)))?;
                }
            }
        }
    }
    writeln!(out, "}}")
}

/// Gives every value and block a unique printable name.
fn assign_names(unit: &mut UnitData) {
    let mut used: BTreeSet<String> = BTreeSet::new();

    // Arguments first, then results in layout order — the same order the
    // parser encounters definitions in.
    let mut order: Vec<Value> = unit.dfg.args().to_vec();
    for inst in unit.layout.all_insts().collect::<Vec<_>>() {
        if let Some(result) = unit.dfg.get_inst_result(inst) {
            order.push(result);
        }
    }

    let mut counter = 0u32;
    for value in order {
        match unit.dfg.value_name(value).map(|s| s.to_string()) {
            Some(name) if !used.contains(&name) => {
                used.insert(name);
            }
            Some(name) => {
                // Uniquify a duplicate with a numeric suffix.
                let mut n = 1u32;
                let fresh = loop {
                    let candidate = format!("{name}{n}");
                    if !used.contains(&candidate) {
                        break candidate;
                    }
                    n += 1;
                };
                unit.dfg.set_value_name(value, fresh.clone());
                used.insert(fresh);
            }
            None => {
                let fresh = loop {
                    let candidate = counter.to_string();
                    counter += 1;
                    if !used.contains(&candidate) {
                        break candidate;
                    }
                };
                unit.dfg.set_value_name(value, fresh.clone());
                used.insert(fresh);
            }
        }
    }

    if let UnitLayout::Cfg(layout) = &mut unit.layout {
        let mut used: BTreeSet<String> = BTreeSet::new();
        let mut counter = 0u32;
        for bb in layout.blocks().collect::<Vec<_>>() {
            match layout.block_name(bb).map(|s| s.to_string()) {
                Some(name) if !used.contains(&name) => {
                    used.insert(name);
                }
                _ => {
                    let fresh = loop {
                        let candidate = format!("bb{counter}");
                        counter += 1;
                        if !used.contains(&candidate) {
                            break candidate;
                        }
                    };
                    layout.set_block_name(bb, fresh.clone());
                    used.insert(fresh);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    #[test]
    fn prints_function_in_surface_syntax() {
        let text = "func @inc (i32 %x) i32 {\n\
                    entry:\n    \
                    %one = const i32 1\n    \
                    %y = add i32 %x, %one\n    \
                    ret i32 %y\n\
                    }\n";
        let module = parse_module(text).unwrap();
        let printed = module_to_string(&module);
        assert_eq!(printed, text);
    }

    #[test]
    fn numbers_anonymous_values() {
        let text = "func @f () i32 {\n\
                    entry:\n    \
                    %0 = const i32 1\n    \
                    %1 = add i32 %0, %0\n    \
                    ret i32 %1\n\
                    }\n";
        let module = parse_module(text).unwrap();
        assert_eq!(module_to_string(&module), text);
    }

    #[test]
    fn prints_proc_and_entity_headers() {
        let text = "proc @p (i1$ %clk) -> (i8$ %q) {\n\
                    entry:\n    \
                    halt\n\
                    }\n\
                    \n\
                    entity @e (i8$ %a) -> (i8$ %b) {\n    \
                    %v = prb i8$ %a\n    \
                    %t = const time 0s 1d\n    \
                    drv i8$ %b, %v, %t\n\
                    }\n";
        let module = parse_module(text).unwrap();
        assert_eq!(module_to_string(&module), text);
    }

    #[test]
    fn prints_declarations() {
        let text = "decl @ext (i32) i32\n\
                    \n\
                    decl @ports (i1$) -> (i8$)\n";
        let module = parse_module(text).unwrap();
        assert_eq!(module_to_string(&module), text);
    }
}
