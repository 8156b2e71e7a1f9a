//! Demand propagation: the pull phase.
//!
//! Methods on [`LockedNode`] run with the node's lock held and may only touch
//! that node; anything aimed at an upstream node is deferred. The
//! `send_output_*` functions on [`EvalRun`] receive those deferred
//! notifications after the sender has unlocked.

use super::locked::{LockedNode, TaskContext};
use super::run::EvalRun;
use super::state::{InputSlot, ValueUsage};
use crate::graph::Origin;
use crate::types::{OutputRef, SocketRef};
use crate::value::TypeSystem;

impl<T: TypeSystem> LockedNode<'_, T> {
    /// Mark an input as required and fetch whatever is still missing.
    pub fn require_input(&mut self, index: usize) {
        let input_ref = self.node.input(index);
        let input = &mut self.state.inputs[index];
        if input.data_type.is_none() {
            return;
        }
        match input.usage {
            ValueUsage::Required => {
                self.schedule();
                return;
            }
            ValueUsage::Unused => {
                debug_assert!(false, "unused input {input_ref} cannot become required");
                return;
            }
            ValueUsage::Maybe => input.usage = ValueUsage::Required,
        }

        let missing = if input.was_ready_for_execution {
            0
        } else {
            input.slot.missing_values()
        };
        if missing == 0 {
            self.schedule();
            return;
        }

        let pending: Vec<Origin> = match &input.slot {
            InputSlot::Single(_) => self.ctx.graph.origins(input_ref).iter().take(1).copied().collect(),
            InputSlot::Multi(entries) => entries
                .iter()
                .filter(|entry| entry.value.is_none())
                .map(|entry| entry.origin)
                .collect(),
        };
        self.state.missing_required_inputs += missing;

        let mut notified = false;
        for origin in pending {
            match origin {
                Origin::Output(output) if self.output_carries_data(output) => {
                    self.deferred.required_outputs.push(output);
                    notified = true;
                }
                other => self.load_default(index, other),
            }
        }
        if !notified {
            self.schedule();
        }
    }

    /// Declare that an input that was never required will not be read.
    pub fn mark_input_unused(&mut self, index: usize) {
        let input_ref = self.node.input(index);
        let input = &mut self.state.inputs[index];
        debug_assert_ne!(input.usage, ValueUsage::Required, "required input {input_ref} marked unused");
        if input.usage != ValueUsage::Maybe {
            return;
        }
        input.usage = ValueUsage::Unused;

        if !input.was_ready_for_execution {
            match &input.slot {
                InputSlot::Single(None) => {
                    self.deferred
                        .unused_outputs
                        .extend(self.ctx.graph.origins(input_ref).iter().filter_map(origin_output));
                }
                InputSlot::Single(Some(_)) => {}
                InputSlot::Multi(entries) => {
                    self.deferred.unused_outputs.extend(
                        entries
                            .iter()
                            .filter(|entry| entry.value.is_none())
                            .filter_map(|entry| origin_output(&entry.origin)),
                    );
                }
            }
        }
        input.slot.clear();
    }

    /// Finish the node once nothing more can be asked of it.
    pub fn finish_if_possible(&mut self) {
        if self.state.node_has_finished {
            return;
        }
        let outputs_done = self
            .state
            .outputs
            .iter()
            .all(|output| output.has_been_computed || output.usage == ValueUsage::Unused);
        if !outputs_done {
            return;
        }
        let inputs_consumed = self
            .state
            .inputs
            .iter()
            .all(|input| input.usage != ValueUsage::Required || input.was_ready_for_execution);
        if !inputs_consumed {
            return;
        }

        for index in 0..self.state.inputs.len() {
            let input = &mut self.state.inputs[index];
            match input.usage {
                ValueUsage::Maybe => self.mark_input_unused(index),
                ValueUsage::Required if !input.pinned => input.slot.clear(),
                ValueUsage::Required | ValueUsage::Unused => {}
            }
        }
        self.state.node_has_finished = true;
    }

    /// Promote an output to required on behalf of the caller.
    pub fn force_output(&mut self, index: usize) {
        let output = &mut self.state.outputs[index];
        if output.data_type.is_none() || output.has_been_computed {
            return;
        }
        output.usage = ValueUsage::Required;
        self.schedule();
    }

    /// Synthesize the default value an origin stands for and deliver it.
    fn load_default(&mut self, index: usize, origin: Origin) {
        let input_ref = self.node.input(index);
        let Some(data_type) = self.state.inputs[index].data_type.clone() else {
            return;
        };
        let types = self.ctx.types;
        let value = match self.ctx.graph.origin_default(origin, types) {
            Some(value) => types.convert_or_default(&value, &data_type).0,
            None => types.default_value(&data_type),
        };

        let source: SocketRef = match origin {
            Origin::Unlinked(input) => input.into(),
            Origin::Output(output) | Origin::MutedOutput(output) => output.into(),
        };
        self.ctx.observe_value(source, &value);
        let is_multi = matches!(self.state.inputs[index].slot, InputSlot::Multi(_));
        if source != SocketRef::Input(input_ref) && !is_multi {
            self.ctx.observe_value(input_ref.into(), &value);
        }
        self.deliver(index, origin, value);
    }

    /// Store a value arriving at an input.
    pub fn deliver(&mut self, index: usize, origin: Origin, value: T::Value) {
        let input_ref = self.node.input(index);
        let input = &mut self.state.inputs[index];
        if input.usage == ValueUsage::Unused {
            return;
        }
        match &mut input.slot {
            InputSlot::Single(slot) => {
                debug_assert!(slot.is_none(), "input {input_ref} received a second value");
                *slot = Some(value);
            }
            InputSlot::Multi(entries) => {
                let Some(entry) = entries
                    .iter_mut()
                    .find(|entry| entry.origin == origin && entry.value.is_none())
                else {
                    debug_assert!(false, "multi-input {input_ref} has no free entry for {origin:?}");
                    return;
                };
                entry.value = Some(value);
                if let Some(observer) = self.ctx.observer {
                    if entries.iter().all(|entry| entry.value.is_some()) {
                        let values: Vec<&T::Value> =
                            entries.iter().filter_map(|entry| entry.value.as_ref()).collect();
                        observer.multi_input_values(input_ref, &values);
                    }
                }
            }
        }

        if input.usage == ValueUsage::Required {
            debug_assert!(self.state.missing_required_inputs > 0);
            self.state.missing_required_inputs = self.state.missing_required_inputs.saturating_sub(1);
            if self.state.missing_required_inputs == 0 {
                self.schedule();
            }
        }
    }

    /// Whether an upstream output can produce a value at all.
    fn output_carries_data(&self, output: OutputRef) -> bool {
        self.ctx
            .graph
            .output_decl(output)
            .is_some_and(|decl| self.ctx.types.is_supported(&decl.data_type))
    }
}

fn origin_output(origin: &Origin) -> Option<OutputRef> {
    match origin {
        Origin::Output(output) => Some(*output),
        Origin::Unlinked(_) | Origin::MutedOutput(_) => None,
    }
}

impl<T: TypeSystem> EvalRun<'_, T> {
    /// A consumer needs `output`: make sure its node computes it.
    pub(super) fn send_output_required(&self, output: OutputRef, tasks: &mut TaskContext<'_>) {
        self.with_locked_node(output.node, tasks, |locked| {
            let state = &mut locked.state.outputs[output.index];
            if state.usage == ValueUsage::Required {
                return;
            }
            state.usage = ValueUsage::Required;
            if !state.has_been_computed {
                locked.schedule();
            }
        });
    }

    /// One consumer of `output` will never read it.
    pub(super) fn send_output_unused(&self, output: OutputRef, tasks: &mut TaskContext<'_>) {
        self.with_locked_node(output.node, tasks, |locked| {
            let state = &mut locked.state.outputs[output.index];
            debug_assert!(state.potential_users > 0, "output {output} has no users left");
            state.potential_users = state.potential_users.saturating_sub(1);
            if state.potential_users == 0 && state.usage != ValueUsage::Required {
                state.usage = ValueUsage::Unused;
                locked.schedule();
            }
        });
    }
}
