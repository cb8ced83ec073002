//! Round-trip tests: parsing a module and printing it must produce text
//! that parses back to a structurally equal module. Printed text is
//! canonical, so equality of the second and third printouts is the
//! equality witness.

use silica_asm::{module_to_string, parse_module};
use silica_ir::Verifier;

fn roundtrip(text: &str) {
    let module = parse_module(text).unwrap_or_else(|err| panic!("parse failed: {err}"));
    let mut verifier = Verifier::new();
    verifier.verify_module(&module);
    verifier
        .finish()
        .unwrap_or_else(|errs| panic!("verify failed:\n{errs}"));

    let printed = module_to_string(&module);
    let reparsed =
        parse_module(&printed).unwrap_or_else(|err| panic!("reparse failed: {err}\n{printed}"));
    let reprinted = module_to_string(&reparsed);
    assert_eq!(printed, reprinted);
}

#[test]
fn function_roundtrip() {
    roundtrip(
        "func @mac (i16 %a, i16 %b, i16 %acc) i16 {\n\
         entry:\n\
         %p = mul i16 %a, %b\n\
         %s = add i16 %p, %acc\n\
         ret i16 %s\n\
         }\n",
    );
}

#[test]
fn branching_function_roundtrip() {
    roundtrip(
        "func @abs (i1 %neg, i8 %x) i8 {\n\
         entry:\n\
         br %neg, %flip, %keep\n\
         flip:\n\
         %zero = const i8 0\n\
         %n = sub i8 %zero, %x\n\
         ret i8 %n\n\
         keep:\n\
         ret i8 %x\n\
         }\n",
    );
}

#[test]
fn s6_time_drive_wait_roundtrip() {
    // S6: a module containing `const time 0s 1d`, `drv`, and `wait`.
    roundtrip(
        "proc @follow (i8$ %a) -> (i8$ %q) {\n\
         entry:\n\
         %v = prb i8$ %a\n\
         %t = const time 0s 1d\n\
         drv i8$ %q, %v, %t\n\
         wait %entry, %a\n\
         }\n",
    );
}

#[test]
fn entity_roundtrip_preserves_textual_order() {
    roundtrip(
        "entity @inv (i8$ %a) -> (i8$ %q) {\n\
         drv i8$ %q, %n, %t\n\
         %n = not i8 %v\n\
         %v = prb i8$ %a\n\
         %t = const time 0s 1d\n\
         }\n",
    );
    // The use-before-def order survives printing verbatim.
    let text = "entity @inv (i8$ %a) -> (i8$ %q) {\n    \
                drv i8$ %q, %n, %t\n    \
                %n = not i8 %v\n    \
                %v = prb i8$ %a\n    \
                %t = const time 0s 1d\n\
                }\n";
    let module = parse_module(text).unwrap();
    assert_eq!(module_to_string(&module), text);
}

#[test]
fn aggregate_and_extract_roundtrip() {
    roundtrip(
        "func @fields (i8 %a, i32 %b) i32 {\n\
         entry:\n\
         %s = struct {i8, i32} %a, %b\n\
         %f = extract {i8, i32} %s, 1\n\
         %lo = extract i32 %f, 0, 8\n\
         %w = insert i32 %f, 0, 8, %lo\n\
         ret i32 %w\n\
         }\n",
    );
}

#[test]
fn mux_roundtrip() {
    roundtrip(
        "func @pick (i1 %sel, i8 %a, i8 %b) i8 {\n\
         entry:\n\
         %arr = array [2 x i8] %a, %b\n\
         %r = mux [2 x i8] %sel, %arr\n\
         ret i8 %r\n\
         }\n",
    );
}

#[test]
fn register_entity_roundtrip() {
    roundtrip(
        "entity @dff (i1$ %clk, i1$ %rst_n, i8$ %d) -> (i8$ %q) {\n\
         %clkv = prb i1$ %clk\n\
         %rstv = prb i1$ %rst_n\n\
         %dv = prb i8$ %d\n\
         %rv = const i8 0\n\
         %r = reg i8 %dv, rise %clkv, %rv, low %rstv\n\
         %t = const time 0s 1d\n\
         drv i8$ %q, %r, %t\n\
         }\n",
    );
}

#[test]
fn hierarchy_roundtrip() {
    roundtrip(
        "decl @ext (i8$) -> (i8$)\n\
         \n\
         entity @leaf (i8$ %a) -> (i8$ %b) {\n\
         %v = prb i8$ %a\n\
         %t = const time 0s 1d\n\
         drv i8$ %b, %v, %t\n\
         }\n\
         \n\
         entity @top (i8$ %x) -> (i8$ %y) {\n\
         %mid = sig i8\n\
         inst @leaf (%x) -> (%mid)\n\
         inst @ext (%mid) -> (%y)\n\
         }\n",
    );
}

#[test]
fn call_roundtrip() {
    roundtrip(
        "func @double (i32 %x) i32 {\n\
         entry:\n\
         %two = const i32 2\n\
         %y = mul i32 %x, %two\n\
         ret i32 %y\n\
         }\n\
         \n\
         func @quad (i32 %x) i32 {\n\
         entry:\n\
         %a = call i32 @double (%x)\n\
         %b = call i32 @double (%a)\n\
         ret i32 %b\n\
         }\n",
    );
}

#[test]
fn logic_constant_roundtrip() {
    roundtrip(
        "func @logic () n9 {\n\
         entry:\n\
         %v = const n9 \"UX01ZWLH-\"\n\
         %w = not n9 %v\n\
         ret n9 %w\n\
         }\n",
    );
}

#[test]
fn wait_with_timeout_roundtrip() {
    roundtrip(
        "proc @tick (i1$ %clk) -> (i1$ %q) {\n\
         entry:\n\
         %v = prb i1$ %clk\n\
         %t0 = const time 0s 1d\n\
         drv i1$ %q, %v, %t0\n\
         %t = const time 10ns\n\
         wait %entry for %t, %clk\n\
         }\n",
    );
}

#[test]
fn anonymous_names_are_stable() {
    let module = parse_module(
        "func @f () i32 {\n\
         entry:\n\
         %0 = const i32 7\n\
         %1 = add i32 %0, %0\n\
         ret i32 %1\n\
         }\n",
    )
    .unwrap();
    let first = module_to_string(&module);
    let second = module_to_string(&parse_module(&first).unwrap());
    assert_eq!(first, second);
}
