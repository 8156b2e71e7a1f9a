//! Running scheduled nodes on the worker pool.
//!
//! A node task moves the node from `Scheduled` to `Running`, decides under
//! the lock whether the node has to execute, runs the logic without any lock,
//! then under the lock again stores the results, tries to finish the node and
//! either re-enqueues it (when it was rescheduled meanwhile) or returns it to
//! `NotScheduled`. Produced values are forwarded last, outside the lock.

use super::locked::{LockedNode, TaskContext, TaskSink};
use super::params::{Prepared, TakenInput};
use super::run::EvalRun;
use super::state::{InputSlot, ScheduleState, ValueUsage};
use crate::types::NodeId;
use crate::value::TypeSystem;

// =============================================================================
// NODE TASKS
// =============================================================================

impl<T: TypeSystem> EvalRun<'_, T> {
    /// Run `node`, then whatever it scheduled first, on this worker.
    pub(super) fn run_task(&self, node: NodeId, sink: &dyn TaskSink) {
        let mut tasks = TaskContext::new(sink);
        self.run_node(node, &mut tasks);
        self.drain(&mut tasks);
    }

    /// Run nodes kept for inline execution until none is left.
    pub(super) fn drain(&self, tasks: &mut TaskContext<'_>) {
        while let Some(node) = tasks.take_next() {
            self.run_node(node, tasks);
        }
    }

    pub(super) fn run_node(&self, node: NodeId, tasks: &mut TaskContext<'_>) {
        let Some(graph_node) = self.ctx.graph.node(node) else {
            return;
        };
        let is_lazy = graph_node.node_type().behavior.is_lazy();

        let prepared = self
            .with_locked_node(node, tasks, |locked| {
                debug_assert_eq!(locked.state.schedule_state, ScheduleState::Scheduled);
                locked.state.schedule_state = ScheduleState::Running;
                if locked.state.node_has_finished {
                    return None;
                }
                if !locked.prepare_outputs_for_execution() {
                    return None;
                }
                if !is_lazy && !locked.state.non_lazy_initialized {
                    locked.state.non_lazy_initialized = true;
                    for index in 0..locked.state.inputs.len() {
                        locked.require_input(index);
                    }
                    // Inputs already present are consumed by this run; later
                    // arrivals schedule the node themselves.
                    locked.state.schedule_state = ScheduleState::Running;
                }
                if locked.state.missing_required_inputs > 0 {
                    return None;
                }
                debug_assert!(
                    is_lazy || !locked.state.has_been_executed,
                    "node {node} executed twice"
                );
                locked.state.has_been_executed = true;
                Some(locked.take_inputs_for_execution())
            })
            .flatten();

        let outcome = prepared.map(|prepared| self.execute_node(graph_node, prepared, tasks));

        let produced = self
            .with_locked_node(node, tasks, |locked| {
                let mut produced = Vec::new();
                if let Some(outcome) = outcome {
                    locked.restore_inputs(outcome.inputs);
                    for (index, value) in outcome.outputs {
                        let output = &mut locked.state.outputs[index];
                        if output.has_been_computed {
                            debug_assert!(false, "output {} computed twice", node.output(index));
                            continue;
                        }
                        output.has_been_computed = true;
                        produced.push((index, value));
                    }
                }
                locked.finish_if_possible();
                let rescheduled =
                    locked.state.schedule_state == ScheduleState::RunningAndRescheduled;
                locked.state.schedule_state = ScheduleState::NotScheduled;
                if rescheduled {
                    locked.schedule();
                }
                produced
            })
            .unwrap_or_default();

        for (index, value) in produced {
            self.forward_output(node.output(index), value, tasks);
        }
    }
}

// =============================================================================
// EXECUTION SNAPSHOTS
// =============================================================================

impl<T: TypeSystem> LockedNode<'_, T> {
    /// Snapshot output usage for this run. Returns whether any required output
    /// is still missing.
    fn prepare_outputs_for_execution(&mut self) -> bool {
        let mut necessary = false;
        for output in &mut self.state.outputs {
            output.usage_for_execution = output.usage;
            if output.usage == ValueUsage::Required && !output.has_been_computed {
                necessary = true;
            }
        }
        necessary
    }

    /// Move every ready input into an execution-local snapshot.
    ///
    /// Inputs handed to an earlier run of a lazy node and not extracted there
    /// were put back and are handed over again.
    fn take_inputs_for_execution(&mut self) -> Prepared<T::Value> {
        let mut inputs = Vec::with_capacity(self.state.inputs.len());
        let mut settled = Vec::with_capacity(self.state.inputs.len());
        for input in &mut self.state.inputs {
            if input.data_type.is_none() {
                inputs.push(None);
                settled.push(true);
                continue;
            }
            if !input.was_ready_for_execution && !input.slot.is_complete() {
                inputs.push(None);
                settled.push(false);
                continue;
            }
            input.was_ready_for_execution = true;
            let taken = match &mut input.slot {
                InputSlot::Single(value) if input.pinned => value.clone().map(TakenInput::Single),
                InputSlot::Single(value) => value.take().map(TakenInput::Single),
                InputSlot::Multi(entries) if entries.is_empty() => None,
                InputSlot::Multi(entries) => Some(TakenInput::Multi(std::mem::take(entries))),
            };
            inputs.push(taken);
            settled.push(true);
        }

        Prepared {
            inputs,
            settled,
            output_usage: self.state.outputs.iter().map(|o| o.usage_for_execution).collect(),
            output_computed: self.state.outputs.iter().map(|o| o.has_been_computed).collect(),
        }
    }

    /// Put back input values the logic did not extract.
    fn restore_inputs(&mut self, leftovers: Vec<Option<TakenInput<T::Value>>>) {
        for (input, leftover) in self.state.inputs.iter_mut().zip(leftovers) {
            match (leftover, &mut input.slot) {
                (Some(TakenInput::Single(value)), InputSlot::Single(slot)) => {
                    if slot.is_none() {
                        *slot = Some(value);
                    }
                }
                (Some(TakenInput::Multi(entries)), InputSlot::Multi(slot)) => *slot = entries,
                _ => {}
            }
        }
    }
}

// =============================================================================
// RAYON INTEGRATION
// =============================================================================

/// Spawns node tasks into a `rayon::Scope`.
///
/// The evaluation is complete when the scope returns, which happens once no
/// spawned task is outstanding.
pub(super) struct ScopeSink<'r, 'scope, 'g, T: TypeSystem> {
    pub run: &'scope EvalRun<'g, T>,
    pub scope: &'r rayon::Scope<'scope>,
}

impl<T: TypeSystem> TaskSink for ScopeSink<'_, '_, '_, T> {
    fn spawn(&self, node: NodeId) {
        let run = self.run;
        self.scope.spawn(move |scope| {
            let sink = ScopeSink { run, scope };
            run.run_task(node, &sink);
        });
    }
}
