//! Property tests for the universal invariants: rendering round-trips,
//! determinism, and agreement between compile-time and run-time depths.

use bitmill::{
    Bits, FormatPiece, Radix, RunParams, Workbench, parse_literal, render_piece,
};
use num_bigint::BigUint;
use proptest::prelude::*;

const XOR8: &str =
    "func xor8:8:1 #8b:1b { def { a:1 } >a:1 loop 7 { a:1> >xor:2:1> >a:1 } a:1> }";

proptest! {
    #[test]
    fn prop_render_parse_round_trip(value in any::<u64>(), width in 1u32..=64, radix in 0usize..3) {
        let radix = [Radix::Dec, Radix::Hex, Radix::Bin][radix];
        let mask = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
        let value = BigUint::from(value & mask);
        let bits = Bits::from_uint(&value, width).unwrap();
        let rendered = render_piece(&bits, &FormatPiece { width, radix });
        prop_assert_eq!(parse_literal(&rendered).unwrap(), value);
    }

    #[test]
    fn prop_bits_uint_round_trip(value in any::<u128>(), pad in 0u32..32) {
        let value = BigUint::from(value);
        let width = value.bits() as u32 + pad;
        let bits = Bits::from_uint(&value, width).unwrap();
        prop_assert_eq!(bits.len(), width);
        prop_assert_eq!(bits.to_uint(), value);
    }

    #[test]
    fn prop_parity_matches_count_ones(value in 0u64..256) {
        let mut bench = Workbench::compile_source(XOR8).unwrap();
        let out = bench.run("xor8:8:1", RunParams::single(value).quiet()).unwrap();
        let parity = u64::from(value.count_ones() % 2);
        prop_assert_eq!(out.value, BigUint::from(parity));
    }

    #[test]
    fn prop_runs_are_deterministic(value in 0u64..256) {
        let mut bench = Workbench::compile_source(XOR8).unwrap();
        let first = bench.run("xor8:8:1", RunParams::single(value).quiet()).unwrap();
        let second = bench.run("xor8:8:1", RunParams::single(value).quiet()).unwrap();
        prop_assert_eq!(first.bits, second.bits);
    }

    #[test]
    fn prop_final_depth_equals_declared_output(value in 0u64..256) {
        // The interpreter trusts the compiler's depth proof; the final
        // stack must hold exactly the declared number of output bits.
        let mut bench = Workbench::compile_source(
            "func low:8:2 #8b:2b { def { v:2 } >v:2 >>_ v:2> } \
             func pad:8:11 #8b:11b { 5:3> } \
             func drain:8:1 #8b:1b { loop 7 { >_:1 } }",
        ).unwrap();
        for descriptor in ["low:8:2", "pad:8:11", "drain:8:1"] {
            let out = bench.run(descriptor, RunParams::single(value).quiet()).unwrap();
            let declared: u32 = descriptor.rsplit(':').next().unwrap().parse().unwrap();
            prop_assert_eq!(out.bits.len(), declared);
        }
    }
}

#[test]
fn test_compile_time_depths_recorded_on_blocks() {
    let bench = Workbench::compile_source(XOR8).unwrap();
    let func = bench.program().funcs().next().unwrap();
    let body = func.body.as_ref().unwrap();
    assert_eq!(body.stack_len_in, func.len_in);
    assert_eq!(body.stack_len_out, func.len_out);
}

#[test]
fn test_loop_body_depth_window() {
    let bench = Workbench::compile_source(XOR8).unwrap();
    let func = bench.program().funcs().next().unwrap();
    let body = func.body.as_ref().unwrap();
    let (count, block) = body
        .code
        .iter()
        .find_map(|node| match node {
            bitmill::Node::Loop { block, count, .. } => Some((*count, block)),
            _ => None,
        })
        .unwrap();
    assert_eq!(count, 7);
    // Each iteration folds one input bit into the accumulator.
    assert_eq!(
        i64::from(block.stack_len_out) - i64::from(block.stack_len_in),
        -1
    );
}
