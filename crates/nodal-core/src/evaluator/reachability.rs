//! Reachability and construction of the state table.
//!
//! Nodes are visited by walking links backward from the requested and
//! forced sockets. Only visited nodes get state; everything else is
//! invisible to the run. State records are built in parallel on the
//! evaluator's pool.

use super::state::{InputSlot, InputState, MultiEntry, NodeState, OutputState, ScheduleState, ValueUsage};
use crate::graph::{Node, NodeGraph, Origin};
use crate::types::{InputRef, NodeId, OutputRef};
use crate::value::TypeSystem;
use parking_lot::Mutex;
use rayon::prelude::*;

/// Which nodes the roots transitively depend on, indexed by `NodeId`.
pub(crate) fn reachable_nodes<T: TypeSystem>(
    graph: &NodeGraph<T>,
    roots: impl IntoIterator<Item = NodeId>,
) -> Vec<bool> {
    let mut reachable = vec![false; graph.node_count()];
    let mut stack: Vec<NodeId> = roots.into_iter().collect();
    while let Some(id) = stack.pop() {
        let Some(node) = graph.node(id) else {
            continue;
        };
        if reachable[id.index()] || node.is_pass_through() {
            continue;
        }
        reachable[id.index()] = true;
        for index in 0..node.input_count() {
            for origin in graph.origins(id.input(index)) {
                if let Origin::Output(output) = origin {
                    if !reachable[output.node.index()] {
                        stack.push(output.node);
                    }
                }
            }
        }
    }
    reachable
}

/// Sockets whose initial state depends on the request.
pub(crate) struct Seeds<'a> {
    pub roots: Vec<NodeId>,
    pub boundary: &'a [OutputRef],
    pub pinned: &'a [InputRef],
}

/// Allocate the state of every reachable node.
pub(crate) fn build_state_table<T: TypeSystem>(
    graph: &NodeGraph<T>,
    types: &T,
    seeds: &Seeds<'_>,
    pool: &rayon::ThreadPool,
) -> Vec<Option<Mutex<NodeState<T>>>> {
    let reachable = reachable_nodes(graph, seeds.roots.iter().copied());
    pool.install(|| {
        graph
            .nodes()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|node| {
                reachable[node.id().index()]
                    .then(|| Mutex::new(initial_state(graph, types, node, &reachable, seeds)))
            })
            .collect()
    })
}

fn initial_state<T: TypeSystem>(
    graph: &NodeGraph<T>,
    types: &T,
    node: &Node<T>,
    reachable: &[bool],
    seeds: &Seeds<'_>,
) -> NodeState<T> {
    let id = node.id();
    let inputs = node
        .node_type()
        .inputs
        .iter()
        .enumerate()
        .map(|(index, decl)| {
            let input = id.input(index);
            let data_type = types.is_supported(&decl.data_type).then(|| decl.data_type.clone());
            let slot = if decl.multi_input {
                InputSlot::Multi(
                    graph
                        .origins(input)
                        .iter()
                        .map(|&origin| MultiEntry { origin, value: None })
                        .collect(),
                )
            } else {
                InputSlot::Single(None)
            };
            InputState {
                usage: if data_type.is_some() { ValueUsage::Maybe } else { ValueUsage::Unused },
                data_type,
                was_ready_for_execution: false,
                pinned: seeds.pinned.contains(&input),
                slot,
            }
        })
        .collect();

    let outputs = node
        .node_type()
        .outputs
        .iter()
        .enumerate()
        .map(|(index, decl)| {
            let output = id.output(index);
            let data_type = types.is_supported(&decl.data_type).then(|| decl.data_type.clone());
            let potential_users = graph
                .targets(output)
                .iter()
                .filter(|target| {
                    reachable[target.node.index()]
                        && graph
                            .input_decl(**target)
                            .is_some_and(|decl| types.is_supported(&decl.data_type))
                })
                .count();
            let usage = if data_type.is_none() || potential_users == 0 {
                ValueUsage::Unused
            } else {
                ValueUsage::Maybe
            };
            OutputState {
                data_type,
                has_been_computed: seeds.boundary.contains(&output),
                usage,
                usage_for_execution: usage,
                potential_users,
            }
        })
        .collect();

    NodeState {
        inputs,
        outputs,
        missing_required_inputs: 0,
        schedule_state: ScheduleState::NotScheduled,
        non_lazy_initialized: false,
        has_been_executed: false,
        node_has_finished: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{BuiltinTypes, builtin_registry};
    use crate::graph::GraphBuilder;
    use crate::types::NodalError;

    #[test]
    fn unreachable_branch_is_not_visited() -> Result<(), NodalError> {
        let registry = builtin_registry();
        let mut builder = GraphBuilder::<BuiltinTypes>::new();
        let a = builder.add_node("a", registry.get("value.int")?)?;
        let b = builder.add_node("b", registry.get("value.int")?)?;
        let sink = builder.add_node("sink", registry.get("output.int")?)?;
        let other = builder.add_node("other", registry.get("output.int")?)?;
        builder.link(a.output(0), sink.input(0))?;
        builder.link(b.output(0), other.input(0))?;
        let graph = builder.build()?;

        let reachable = reachable_nodes(&graph, [sink]);
        assert!(reachable[a.index()]);
        assert!(reachable[sink.index()]);
        assert!(!reachable[b.index()]);
        assert!(!reachable[other.index()]);
        Ok(())
    }

    #[test]
    fn unreachable_consumers_do_not_count_as_users() -> Result<(), NodalError> {
        let registry = builtin_registry();
        let mut builder = GraphBuilder::<BuiltinTypes>::new();
        let a = builder.add_node("a", registry.get("value.int")?)?;
        let sink = builder.add_node("sink", registry.get("output.int")?)?;
        let other = builder.add_node("other", registry.get("output.int")?)?;
        builder.link(a.output(0), sink.input(0))?;
        builder.link(a.output(0), other.input(0))?;
        let graph = builder.build()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .map_err(|e| NodalError::ThreadPool(e.to_string()))?;
        let seeds = Seeds {
            roots: vec![sink],
            boundary: &[],
            pinned: &[sink.input(0)],
        };
        let table = build_state_table(&graph, &BuiltinTypes, &seeds, &pool);

        let state = table[a.index()].as_ref().map(|cell| cell.lock().outputs[0].potential_users);
        assert_eq!(state, Some(1));
        assert!(table[other.index()].is_none());
        let pinned = table[sink.index()].as_ref().map(|cell| cell.lock().inputs[0].pinned);
        assert_eq!(pinned, Some(true));
        Ok(())
    }
}
