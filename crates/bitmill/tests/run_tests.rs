//! End-to-end tests: compile a source, run a function, check the bits.

use bitmill::{Input, RunError, RunParams, Workbench};
use num_bigint::BigUint;

fn bench(source: &str) -> Workbench {
    match Workbench::compile_source(source) {
        Ok(bench) => bench,
        Err(e) => panic!("expected `{source}` to compile, got: {e}"),
    }
}

fn run_list(bench: &mut Workbench, descriptor: &str, inputs: &[u64]) -> u64 {
    let params = RunParams::list(inputs.to_vec()).quiet();
    let out = bench.run(descriptor, params).unwrap();
    u64::try_from(out.value).unwrap()
}

fn run_single(bench: &mut Workbench, descriptor: &str, input: u64) -> u64 {
    let out = bench
        .run(descriptor, RunParams::single(input).quiet())
        .unwrap();
    u64::try_from(out.value).unwrap()
}

// ---------------------------------------------------------------------------
// Whole-program scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_nand_via_natives() {
    let mut bench = bench("func nand:2:1 #1b+1b:1b { >and:2:1> >not:1:1> }");
    assert_eq!(run_list(&mut bench, "nand:2:1", &[1, 1]), 0);
    assert_eq!(run_list(&mut bench, "nand:2:1", &[1, 0]), 1);
    assert_eq!(run_list(&mut bench, "nand:2:1", &[0, 1]), 1);
    assert_eq!(run_list(&mut bench, "nand:2:1", &[0, 0]), 1);
}

#[test]
fn test_constant_push() {
    let mut bench = bench("func k:0:4 #0d:4b { 10#d:4> }");
    let out = bench.run("k:0:4", RunParams::empty().quiet()).unwrap();
    assert_eq!(out.value, BigUint::from(10u32));
    assert_eq!(out.bits.to_string(), "1010");
}

#[test]
fn test_variable_round_trip() {
    let mut bench = bench("func id:4:4 #4b:4b { def { v:4 } >v:4 v:4> }");
    assert_eq!(run_single(&mut bench, "id:4:4", 0b1011), 11);
}

#[test]
fn test_loop_accumulator_xor4() {
    let mut bench = bench(
        "func xor4:4:1 #4b:1b { def { a:1 } >a:1 loop 3 { a:1> >xor:2:1> >a:1 } a:1> }",
    );
    assert_eq!(run_single(&mut bench, "xor4:4:1", 0b1110), 1);
    assert_eq!(run_single(&mut bench, "xor4:4:1", 0b1100), 0);
    // Parity of every 4-bit pattern.
    for v in 0u64..16 {
        assert_eq!(
            run_single(&mut bench, "xor4:4:1", v),
            u64::from(v.count_ones() % 2),
            "parity of {v:04b}"
        );
    }
}

#[test]
fn test_mux_selects_by_condition() {
    let mut bench = bench(
        "func mux:3:1 #1b+1b+1b:1b { def{s:1 a:1 b:1} >b:1 >a:1 >s:1 s:1> \
         if { b:1> } else { a:1> } }",
    );
    assert_eq!(run_list(&mut bench, "mux:3:1", &[1, 0, 1]), 1);
    assert_eq!(run_list(&mut bench, "mux:3:1", &[0, 0, 1]), 0);
    assert_eq!(run_list(&mut bench, "mux:3:1", &[1, 1, 0]), 0);
}

#[test]
fn test_or_from_nand() {
    // De Morgan: a or b == nand(not a, not b).
    let mut bench = bench(
        "func nand:2:1 #1b+1b:1b { >and:2:1> >not:1:1> } \
         func either:2:1 #1b+1b:1b { def { x:1 y:1 } >y:1 >x:1 \
             x:1> >not:1:1> y:1> >not:1:1> >nand:2:1> }",
    );
    for (a, b) in [(0u64, 0u64), (0, 1), (1, 0), (1, 1)] {
        assert_eq!(run_list(&mut bench, "either:2:1", &[a, b]), a | b);
    }
}

// ---------------------------------------------------------------------------
// Boundary behaviors
// ---------------------------------------------------------------------------

#[test]
fn test_builtin_runs_directly() {
    let mut bench = bench("func f:1:1 { }");
    assert_eq!(run_single(&mut bench, "xor:2:1", 0b11), 0);
    assert_eq!(run_single(&mut bench, "xor:2:1", 0b10), 1);
    assert_eq!(run_single(&mut bench, "im:2:1", 0b10), 0);
    assert_eq!(run_single(&mut bench, "im:2:1", 0b01), 1);
}

#[test]
fn test_loop_zero_has_no_effect() {
    let mut bench = bench("func f:1:1 { loop 0 { >_:1 } }");
    assert_eq!(run_single(&mut bench, "f:1:1", 1), 1);
    assert_eq!(bench.warnings().len(), 1);
}

#[test]
fn test_depth_check_in_neutral_loop_runs() {
    let mut bench = bench("func f:1:1 { >_:1 loop 2 { . 1:1> >_:1 } 1:1> }");
    assert_eq!(run_single(&mut bench, "f:1:1", 0), 1);
}

#[test]
fn test_snapshot_keeps_stack() {
    // Both arrows read the top bits without consuming them.
    let mut bench = bench("func dup:1:2 #1b:2b { def { v:1 } >v:1> v:1> }");
    assert_eq!(run_single(&mut bench, "dup:1:2", 1), 0b11);
    assert_eq!(run_single(&mut bench, "dup:1:2", 0), 0);
}

#[test]
fn test_variables_start_zeroed() {
    let mut bench = bench("func z:0:4 #0d:4b { def { v:4 } v:4> }");
    assert_eq!(
        bench.run("z:0:4", RunParams::empty().quiet()).unwrap().value,
        BigUint::from(0u32)
    );
}

#[test]
fn test_variables_reset_per_activation() {
    // The callee stores into its own variable; a fresh frame per call
    // means the second call starts from zero again, not from 1.
    let mut bench = bench(
        "func store:1:1 #1b:1b { def { v:1 } >v:1> } \
         func twice:1:1 #1b:1b { >store:1:1> >store:1:1> }",
    );
    assert_eq!(run_single(&mut bench, "twice:1:1", 1), 1);
}

#[test]
fn test_reduce_discards_top() {
    let mut bench = bench("func low:4:2 #4b:2b { def { v:2 } >v:2 >>_ v:2> }");
    // Pops the low two bits into v, clears the rest, pushes v back.
    assert_eq!(run_single(&mut bench, "low:4:2", 0b1101), 0b01);
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

#[test]
fn test_input_too_wide() {
    let mut bench = bench("func f:2:2 #2b:2b { }");
    let err = bench
        .run("f:2:2", RunParams::single(4u64).quiet())
        .unwrap_err();
    assert!(matches!(
        err,
        bitmill::Error::Run(RunError::InputLengthMismatch { width: 2, .. })
    ));
}

#[test]
fn test_input_count_mismatch() {
    let mut bench = bench("func f:2:1 #1b+1b:1b { >and:2:1> }");
    let err = bench
        .run("f:2:1", RunParams::list([1u64]).quiet())
        .unwrap_err();
    assert!(matches!(
        err,
        bitmill::Error::Run(RunError::InputCountMismatch {
            expected: 2,
            given: 1
        })
    ));
}

#[test]
fn test_bytes_input() {
    let mut bench = bench("func id:8:8 #8b:8b { }");
    let out = bench
        .run("id:8:8", RunParams::single(vec![0xA5u8]).quiet())
        .unwrap();
    assert_eq!(out.value, BigUint::from(0xA5u32));
}

#[test]
fn test_unknown_function_at_run_time() {
    let mut bench = bench("func f:1:1 { }");
    let err = bench
        .run("g:1:1", RunParams::single(1u64).quiet())
        .unwrap_err();
    assert!(matches!(
        err,
        bitmill::Error::Run(RunError::UnknownFunction { .. })
    ));
}

#[test]
fn test_declared_native_is_not_runnable() {
    let mut bench = bench("func magic:1:1 native");
    let err = bench
        .run("magic:1:1", RunParams::single(1u64).quiet())
        .unwrap_err();
    assert!(matches!(
        err,
        bitmill::Error::Run(RunError::UnknownNative { .. })
    ));
}

#[test]
fn test_rendered_result_line() {
    let mut bench = bench("func nand:2:1 #1b+1b:1b { >and:2:1> >not:1:1> }");
    let out = bench
        .run("nand:2:1", RunParams::list([1u64, 1]))
        .unwrap();
    assert_eq!(out.rendered.as_deref(), Some("nand(0b1, 0b1) = 0b0"));
    assert_eq!(bench.take_output(), vec!["nand(0b1, 0b1) = 0b0".to_string()]);
    assert!(bench.take_output().is_empty());
}

#[test]
fn test_quiet_run_renders_nothing() {
    let mut bench = bench("func f:1:1 #1d:1d { }");
    let out = bench.run("f:1:1", RunParams::single(1u64).quiet()).unwrap();
    assert!(out.rendered.is_none());
    assert!(bench.take_output().is_empty());
}

#[test]
fn test_hex_rendering_pads_nibbles() {
    let mut bench = bench("func id:8:8 { }");
    let out = bench.run("id:8:8", RunParams::single(10u64)).unwrap();
    // The default format is a single hex field per side.
    assert_eq!(out.rendered.as_deref(), Some("id(0x0a) = 0x0a"));
}

#[test]
fn test_runs_are_deterministic() {
    let mut bench = bench(
        "func xor4:4:1 #4b:1b { def { a:1 } >a:1 loop 3 { a:1> >xor:2:1> >a:1 } a:1> }",
    );
    for v in 0u64..16 {
        let first = run_single(&mut bench, "xor4:4:1", v);
        let second = run_single(&mut bench, "xor4:4:1", v);
        assert_eq!(first, second);
    }
}

#[test]
fn test_output_width_matches_declaration() {
    let mut bench = bench(
        "func wide:2:6 #2b:6b { def { v:2 } >v:2 v:2> v:2> v:2> }",
    );
    let out = bench.run("wide:2:6", RunParams::single(0b10u64).quiet()).unwrap();
    assert_eq!(out.bits.len(), 6);
    assert_eq!(out.value, BigUint::from(0b101010u32));
}

#[test]
fn test_include_then_run() {
    use bitmill::MemSource;
    let mut provider = MemSource::new();
    provider.insert("main", "#include gates\nfunc top:2:1 #1b+1b:1b { >nand:2:1> }");
    provider.insert("gates", "func nand:2:1 #1b+1b:1b { >and:2:1> >not:1:1> }");
    let mut bench = Workbench::compile(&provider, "main").unwrap();
    assert_eq!(run_list(&mut bench, "top:2:1", &[1, 1]), 0);
}

#[test]
fn test_input_conversions() {
    let mut bench = bench("func id:8:8 #8b:8b { }");
    let from_int = bench
        .run("id:8:8", RunParams::single(0x5Au64).quiet())
        .unwrap();
    let from_bytes = bench
        .run("id:8:8", RunParams::single(Input::Bytes(vec![0x5A])).quiet())
        .unwrap();
    assert_eq!(from_int.bits, from_bytes.bits);
}
