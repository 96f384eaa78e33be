//! Benchmarks for the analysis pipeline.
//!
//! Measures the three stages separately and combined:
//! - Control flow graph construction
//! - Frame and register inference
//! - Structure recovery
//! - The bundled single-method driver

extern crate classflow;

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use classflow::cfg::build_graph;
use classflow::frame::infer_frames;
use classflow::structure::build_structure;
use classflow::{
    analyze_method, BranchKind, CondOp, ConstValue, MethodBody, Op, Operation, SlotKind,
};

const STEPS: usize = 1 << 20;

fn body(ops: Vec<Op>, max_locals: usize) -> MethodBody {
    MethodBody::new(
        ops.into_iter().map(Operation::new).collect(),
        vec![],
        max_locals,
        8,
        vec![],
    )
}

fn iconst(value: i32) -> Op {
    Op::Const(ConstValue::Int(value))
}

fn ifeq(target: usize) -> Op {
    Op::Branch {
        kind: BranchKind::IntZero(CondOp::Eq),
        target,
    }
}

fn if_icmplt(target: usize) -> Op {
    Op::Branch {
        kind: BranchKind::IntCmp(CondOp::Lt),
        target,
    }
}

/// A bottom-tested counting loop, seven operations.
fn counting_loop() -> MethodBody {
    body(
        vec![
            iconst(0),
            Op::Store {
                slot: 0,
                kind: SlotKind::Int,
            },
            Op::Iinc { slot: 0, delta: 1 },
            Op::Load {
                slot: 0,
                kind: SlotKind::Int,
            },
            iconst(1000),
            if_icmplt(2),
            Op::Return { kind: None },
        ],
        1,
    )
}

/// A loop wrapping a conditional, the smallest two-level nest.
fn nested_loop() -> MethodBody {
    body(
        vec![
            iconst(0),
            Op::Store {
                slot: 0,
                kind: SlotKind::Int,
            },
            iconst(1),
            ifeq(9),
            iconst(1),
            ifeq(8),
            Op::Iinc { slot: 0, delta: 1 },
            Op::Nop,
            Op::Goto { target: 2 },
            Op::Return { kind: None },
        ],
        1,
    )
}

/// A chain of `count` compiled ifs, each guarding a two-operation body.
fn if_chain(count: usize) -> MethodBody {
    let mut ops = Vec::with_capacity(count * 4 + 3);
    ops.push(iconst(0));
    ops.push(Op::Store {
        slot: 0,
        kind: SlotKind::Int,
    });
    for unit in 0..count {
        let base = 2 + unit * 4;
        ops.push(iconst(1));
        ops.push(ifeq(base + 4));
        ops.push(Op::Iinc { slot: 0, delta: 1 });
        ops.push(Op::Nop);
    }
    ops.push(Op::Return { kind: None });
    body(ops, 1)
}

/// A three-way dispatch whose arms reconverge on a shared store.
fn dispatch() -> MethodBody {
    body(
        vec![
            iconst(2),
            Op::Switch {
                cases: vec![(0, 2), (1, 4)],
                default: Some(6),
            },
            iconst(10),
            Op::Goto { target: 8 },
            iconst(20),
            Op::Goto { target: 8 },
            iconst(30),
            Op::Goto { target: 8 },
            Op::Store {
                slot: 0,
                kind: SlotKind::Int,
            },
            Op::Return { kind: None },
        ],
        1,
    )
}

/// Benchmark graph construction alone on a two-level nest.
fn bench_graph_nested_loop(c: &mut Criterion) {
    let method = nested_loop();

    c.bench_function("graph_nested_loop", |b| {
        b.iter(|| {
            let graph = build_graph("Bench.nested", black_box(&method)).unwrap();
            black_box(graph)
        });
    });
}

/// Benchmark graph construction on a long chain of conditionals.
fn bench_graph_if_chain(c: &mut Criterion) {
    let method = if_chain(64);

    c.bench_function("graph_if_chain_64", |b| {
        b.iter(|| {
            let graph = build_graph("Bench.chain", black_box(&method)).unwrap();
            black_box(graph)
        });
    });
}

/// Benchmark frame inference on a loop-carried counter.
fn bench_frames_counting_loop(c: &mut Criterion) {
    let method = counting_loop();

    c.bench_function("frames_counting_loop", |b| {
        b.iter(|| {
            let frames = infer_frames("Bench.count", black_box(&method), STEPS).unwrap();
            black_box(frames)
        });
    });
}

/// Benchmark frame inference across many merge points.
fn bench_frames_if_chain(c: &mut Criterion) {
    let method = if_chain(64);

    c.bench_function("frames_if_chain_64", |b| {
        b.iter(|| {
            let frames = infer_frames("Bench.chain", black_box(&method), STEPS).unwrap();
            black_box(frames)
        });
    });
}

/// Benchmark structuring together with the graph pass that feeds it.
fn bench_structure_if_chain(c: &mut Criterion) {
    let method = if_chain(64);

    c.bench_function("structure_if_chain_64", |b| {
        b.iter(|| {
            let mut graph = build_graph("Bench.chain", black_box(&method)).unwrap();
            let tree = build_structure("Bench.chain", &mut graph);
            black_box(tree)
        });
    });
}

/// Benchmark the full driver on a multi-way dispatch.
fn bench_pipeline_dispatch(c: &mut Criterion) {
    let method = dispatch();

    c.bench_function("pipeline_dispatch", |b| {
        b.iter(|| {
            let analysis = analyze_method("Bench.dispatch", black_box(&method)).unwrap();
            black_box(analysis)
        });
    });
}

/// Benchmark the full driver on the two-level nest.
fn bench_pipeline_nested_loop(c: &mut Criterion) {
    let method = nested_loop();

    c.bench_function("pipeline_nested_loop", |b| {
        b.iter(|| {
            let analysis = analyze_method("Bench.nested", black_box(&method)).unwrap();
            black_box(analysis)
        });
    });
}

criterion_group!(
    benches,
    // Graph construction
    bench_graph_nested_loop,
    bench_graph_if_chain,
    // Frame inference
    bench_frames_counting_loop,
    bench_frames_if_chain,
    // Structure recovery
    bench_structure_if_chain,
    // Full pipeline
    bench_pipeline_dispatch,
    bench_pipeline_nested_loop,
);
criterion_main!(benches);
