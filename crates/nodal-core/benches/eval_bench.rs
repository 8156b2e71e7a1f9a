//! # Evaluation Benchmarks
//!
//! Throughput of whole evaluation runs on deep and wide graphs.
//!
//! Run with: `cargo bench -p nodal-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use nodal_core::builtin::{BuiltinTypes, Value, builtin_registry};
use nodal_core::{EvaluationRequest, Evaluator, EvaluatorConfig, GraphBuilder, InputRef, NodeGraph};
use std::hint::black_box;

/// `size` chained `int.add` nodes, each adding one.
fn create_chain_graph(size: usize) -> (NodeGraph<BuiltinTypes>, InputRef) {
    let registry = builtin_registry();
    let add = registry.get("int.add").expect("int.add");
    let mut builder = GraphBuilder::new();
    let mut prev = None;

    for i in 0..size {
        let node = builder.add_node(format!("add{i}"), add.clone()).expect("add");
        builder
            .set_input_value(node.input(1), Value::Int(1))
            .expect("value");
        if let Some(prev) = prev {
            builder.link(prev, node.input(0)).expect("link");
        }
        prev = Some(node.output(0));
    }

    let sink = builder
        .add_node("sink", registry.get("output.int").expect("output.int"))
        .expect("sink");
    if let Some(prev) = prev {
        builder.link(prev, sink.input(0)).expect("link");
    }
    (builder.build().expect("build"), sink.input(0))
}

/// `size` independent multiply nodes summed through one multi-input.
fn create_fan_in_graph(size: usize) -> (NodeGraph<BuiltinTypes>, InputRef) {
    let registry = builtin_registry();
    let multiply = registry.get("math.multiply").expect("math.multiply");
    let mut builder = GraphBuilder::new();
    let sum = builder
        .add_node("sum", registry.get("math.sum").expect("math.sum"))
        .expect("sum");

    for i in 0..size {
        let node = builder.add_node(format!("mul{i}"), multiply.clone()).expect("add");
        builder
            .set_input_value(node.input(0), Value::Float(i as f64))
            .expect("value");
        builder
            .set_input_value(node.input(1), Value::Float(0.5))
            .expect("value");
        builder.link(node.output(0), sum.input(0)).expect("link");
    }

    let sink = builder
        .add_node("sink", registry.get("output.float").expect("output.float"))
        .expect("sink");
    builder.link(sum.output(0), sink.input(0)).expect("link");
    (builder.build().expect("build"), sink.input(0))
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_evaluation");
    let evaluator = Evaluator::new(EvaluatorConfig::with_threads(4)).expect("evaluator");

    for size in [10, 100, 1000].iter() {
        let (graph, sink) = create_chain_graph(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let result = evaluator
                    .evaluate(&graph, &BuiltinTypes, EvaluationRequest::new().output(sink))
                    .expect("evaluate");
                black_box(result)
            });
        });
    }

    group.finish();
}

fn bench_fan_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_in_evaluation");

    for threads in [1, 4, 8].iter() {
        let evaluator = Evaluator::new(EvaluatorConfig::with_threads(*threads)).expect("evaluator");
        let (graph, sink) = create_fan_in_graph(1000);
        group.bench_with_input(BenchmarkId::from_parameter(threads), threads, |b, _| {
            b.iter(|| {
                let result = evaluator
                    .evaluate(&graph, &BuiltinTypes, EvaluationRequest::new().output(sink))
                    .expect("evaluate");
                black_box(result)
            });
        });
    }

    group.finish();
}

fn bench_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(create_chain_graph(size)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chain, bench_fan_in, bench_graph_build);
criterion_main!(benches);
