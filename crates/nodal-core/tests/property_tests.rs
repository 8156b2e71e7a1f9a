//! # Property-Based Tests
//!
//! Randomised graphs checked against a direct reference computation.
//!
//! These tests ensure the result of a run depends only on the graph and the
//! request: never on the worker count or on scheduling order.

use nodal_core::builtin::{BuiltinTypes, Value, builtin_registry};
use nodal_core::{
    EvaluationRequest, Evaluator, EvaluatorConfig, GraphBuilder, InputRef, NodeGraph,
    SocketObserver, ValueLog,
};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::sample::Index;
use std::sync::Arc;

/// One `int.add` node: each operand is either a link from an earlier node or
/// a constant.
type Adder = (Option<Index>, i16, Option<Index>, i16);

/// Build a DAG of `int.add` nodes with a sink on every node, and the values
/// each sink should receive.
fn adder_dag(adders: &[Adder]) -> (NodeGraph<BuiltinTypes>, Vec<InputRef>, Vec<i64>) {
    let registry = builtin_registry();
    let add = registry.get("int.add").expect("int.add");
    let output = registry.get("output.int").expect("output.int");
    let mut builder = GraphBuilder::new();
    let mut nodes = Vec::new();
    let mut expected: Vec<i64> = Vec::new();
    let mut sinks = Vec::new();

    for (i, (left, left_const, right, right_const)) in adders.iter().enumerate() {
        let node = builder.add_node(format!("add{i}"), add.clone()).expect("add");
        let mut operand = |socket: usize, link: &Option<Index>, constant: i16| -> i64 {
            match link {
                Some(index) if i > 0 => {
                    let from = index.index(i);
                    builder
                        .link(nodes[from], node.input(socket))
                        .expect("link");
                    expected[from]
                }
                _ => {
                    builder
                        .set_input_value(node.input(socket), Value::Int(i64::from(constant)))
                        .expect("value");
                    i64::from(constant)
                }
            }
        };
        let a = operand(0, left, *left_const);
        let b = operand(1, right, *right_const);
        expected.push(a.wrapping_add(b));
        nodes.push(node.output(0));

        let sink = builder
            .add_node(format!("sink{i}"), output.clone())
            .expect("sink");
        builder.link(node.output(0), sink.input(0)).expect("link");
        sinks.push(sink.input(0));
    }

    (builder.build().expect("build"), sinks, expected)
}

fn run(graph: &NodeGraph<BuiltinTypes>, outputs: &[InputRef], threads: usize) -> Vec<Value> {
    Evaluator::new(EvaluatorConfig::with_threads(threads))
        .expect("evaluator")
        .evaluate(
            graph,
            &BuiltinTypes,
            EvaluationRequest::new().outputs(outputs.iter().copied()),
        )
        .expect("evaluate")
        .values
}

fn adder_strategy() -> impl Strategy<Value = Vec<Adder>> {
    vec(
        (
            proptest::option::of(any::<Index>()),
            any::<i16>(),
            proptest::option::of(any::<Index>()),
            any::<i16>(),
        ),
        1..40,
    )
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every requested socket receives the reference value.
    #[test]
    fn random_dag_matches_reference(adders in adder_strategy()) {
        let (graph, sinks, expected) = adder_dag(&adders);
        let values = run(&graph, &sinks, 4);
        let expected: Vec<Value> = expected.into_iter().map(Value::Int).collect();
        prop_assert_eq!(values, expected);
    }

    /// One worker and many workers agree.
    #[test]
    fn thread_count_independence(adders in adder_strategy(), threads in 2usize..9) {
        let (graph, sinks, _) = adder_dag(&adders);
        prop_assert_eq!(run(&graph, &sinks, 1), run(&graph, &sinks, threads));
    }

    /// Requesting a single sink executes each upstream node at most once.
    #[test]
    fn nodes_execute_at_most_once(adders in adder_strategy(), pick in any::<Index>()) {
        let (graph, sinks, expected) = adder_dag(&adders);
        let target = pick.index(sinks.len());
        let log = Arc::new(ValueLog::<BuiltinTypes>::new());
        let observer: Arc<dyn SocketObserver<BuiltinTypes>> = log.clone();

        let result = Evaluator::new(EvaluatorConfig::with_threads(4))
            .expect("evaluator")
            .evaluate(
                &graph,
                &BuiltinTypes,
                EvaluationRequest::new().output(sinks[target]).observer(observer),
            )
            .expect("evaluate");

        prop_assert_eq!(&result.values, &vec![Value::Int(expected[target])]);
        for node in graph.nodes() {
            prop_assert!(log.execution_count(node.id()) <= 1);
        }
        prop_assert_eq!(result.stats.executions, result.stats.executed_nodes);
    }

    /// Multi-input values are delivered in link order, whatever the timing.
    #[test]
    fn multi_input_preserves_link_order(
        values in vec(-1000i32..1000, 1..24),
        threads in 1usize..9,
    ) {
        let registry = builtin_registry();
        let mut builder = GraphBuilder::new();
        let sum = builder.add_node("sum", registry.get("math.sum").expect("sum")).expect("add");
        let sink = builder
            .add_node("sink", registry.get("output.float").expect("output"))
            .expect("add");
        for (i, value) in values.iter().enumerate() {
            let constant = builder
                .add_node(format!("v{i}"), registry.get("value.float").expect("value"))
                .expect("add");
            builder
                .set_input_value(constant.input(0), Value::Float(f64::from(*value)))
                .expect("value");
            builder.link(constant.output(0), sum.input(0)).expect("link");
        }
        builder.link(sum.output(0), sink.input(0)).expect("link");
        let graph = builder.build().expect("build");

        let log = Arc::new(ValueLog::<BuiltinTypes>::new());
        let observer: Arc<dyn SocketObserver<BuiltinTypes>> = log.clone();
        let result = Evaluator::new(EvaluatorConfig::with_threads(threads))
            .expect("evaluator")
            .evaluate(
                &graph,
                &BuiltinTypes,
                EvaluationRequest::new().output(sink.input(0)).observer(observer),
            )
            .expect("evaluate");

        let delivered: Vec<Value> = values.iter().map(|v| Value::Float(f64::from(*v))).collect();
        let total: i32 = values.iter().sum();
        prop_assert_eq!(log.multi_inputs(), vec![(sum.input(0), delivered)]);
        prop_assert_eq!(result.values, vec![Value::Float(f64::from(total))]);
    }
}
