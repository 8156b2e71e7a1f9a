//! One evaluation run: the state table and the operations that lock it.

use super::locked::{Deferred, LockedNode, RunContext, TaskContext};
use super::state::{InputSlot, NodeState, ValueUsage};
use crate::request::EvalStats;
use crate::types::{InputRef, NodeId, OutputRef, SocketRef};
use crate::value::TypeSystem;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// The state of every reachable node, alive for exactly one evaluation.
pub(crate) struct EvalRun<'g, T: TypeSystem> {
    pub ctx: RunContext<'g, T>,
    states: Vec<Option<Mutex<NodeState<T>>>>,
    executions: AtomicUsize,
}

impl<'g, T: TypeSystem> EvalRun<'g, T> {
    pub fn new(ctx: RunContext<'g, T>, states: Vec<Option<Mutex<NodeState<T>>>>) -> Self {
        Self {
            ctx,
            states,
            executions: AtomicUsize::new(0),
        }
    }

    /// Lock `node`, run `f` on it, unlock, then carry out deferred work.
    ///
    /// Returns `None` when the node is not reachable in this run.
    pub fn with_locked_node<R>(
        &self,
        node: NodeId,
        tasks: &mut TaskContext<'_>,
        f: impl FnOnce(&mut LockedNode<'_, T>) -> R,
    ) -> Option<R> {
        let cell = self.states.get(node.index())?.as_ref()?;
        let mut locked = LockedNode::new(node, &self.ctx, cell.lock());
        let result = f(&mut locked);
        let deferred = locked.unlock();
        self.dispatch(deferred, tasks);
        Some(result)
    }

    fn dispatch(&self, deferred: Deferred, tasks: &mut TaskContext<'_>) {
        for output in deferred.required_outputs {
            self.send_output_required(output, tasks);
        }
        for output in deferred.unused_outputs {
            self.send_output_unused(output, tasks);
        }
        for node in deferred.scheduled_nodes {
            tasks.enqueue(node);
        }
    }

    /// The declared type of an input if it still wants a value.
    pub fn wanted_input_type(&self, input: InputRef) -> Option<T::DataType> {
        let cell = self.states.get(input.node.index())?.as_ref()?;
        let state = cell.lock();
        let input = state.inputs.get(input.index)?;
        if input.usage == ValueUsage::Unused {
            return None;
        }
        input.data_type.clone()
    }

    pub fn count_execution(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    // =========================================================================
    // SEEDING
    // =========================================================================

    /// Forward boundary values and mark the requested sockets as required.
    pub fn seed(
        &self,
        boundary: Vec<(OutputRef, T::Value)>,
        outputs: &[InputRef],
        force: &[SocketRef],
        tasks: &mut TaskContext<'_>,
    ) {
        for (output, value) in boundary {
            if self.has_state(output.node) {
                self.forward_output(output, value, tasks);
            } else {
                self.ctx.observe_value(output.into(), &value);
            }
        }
        for input in outputs {
            self.with_locked_node(input.node, tasks, |locked| locked.require_input(input.index));
        }
        for socket in force {
            match *socket {
                SocketRef::Input(input) => {
                    self.with_locked_node(input.node, tasks, |locked| {
                        locked.require_input(input.index);
                    });
                }
                SocketRef::Output(output) => {
                    self.with_locked_node(output.node, tasks, |locked| {
                        locked.force_output(output.index);
                    });
                }
            }
        }
    }

    fn has_state(&self, node: NodeId) -> bool {
        self.states.get(node.index()).is_some_and(Option::is_some)
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    /// Move the requested values out of the state table and drop the rest.
    pub fn finish(self, outputs: &[InputRef]) -> (Vec<T::Value>, EvalStats) {
        let mut states: Vec<Option<NodeState<T>>> = self
            .states
            .into_iter()
            .map(|cell| cell.map(Mutex::into_inner))
            .collect();

        let stats = EvalStats {
            reachable_nodes: states.iter().flatten().count(),
            executions: self.executions.into_inner(),
            executed_nodes: states.iter().flatten().filter(|s| s.has_been_executed).count(),
        };

        let mut values: Vec<T::Value> = Vec::with_capacity(outputs.len());
        for (position, input) in outputs.iter().enumerate() {
            if let Some(earlier) = outputs[..position].iter().position(|other| other == input) {
                values.push(values[earlier].clone());
                continue;
            }
            let taken = states
                .get_mut(input.node.index())
                .and_then(Option::as_mut)
                .and_then(|state| state.inputs.get_mut(input.index))
                .and_then(|state| match &mut state.slot {
                    InputSlot::Single(slot) => slot.take(),
                    InputSlot::Multi(_) => None,
                });
            let value = taken.or_else(|| {
                warn!(socket = %input, "requested socket has no value, using default");
                self.ctx
                    .graph
                    .input_decl(*input)
                    .map(|decl| self.ctx.types.default_value(&decl.data_type))
            });
            if let Some(value) = value {
                values.push(value);
            }
        }
        (values, stats)
    }
}
