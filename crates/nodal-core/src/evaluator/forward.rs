//! Value forwarding: the push phase.

use super::locked::TaskContext;
use super::run::EvalRun;
use crate::graph::Origin;
use crate::types::{InputRef, OutputRef};
use crate::value::TypeSystem;
use tracing::warn;

impl<T: TypeSystem> EvalRun<'_, T> {
    /// Hand a computed value to every consumer that still wants it.
    ///
    /// Targets of another type get their own converted value. The original
    /// is cloned for all same-type targets but the last, which receives it by
    /// move; with no such target it is dropped.
    pub(super) fn forward_output(&self, from: OutputRef, value: T::Value, tasks: &mut TaskContext<'_>) {
        let graph = self.ctx.graph;
        let types = self.ctx.types;
        let value_type = types.type_of(&value);

        let mut same_type: Vec<InputRef> = Vec::new();
        let mut converted: Vec<(InputRef, T::Value)> = Vec::new();
        for &target in graph.targets(from) {
            let Some(target_type) = self.wanted_input_type(target) else {
                continue;
            };
            if target_type == value_type {
                same_type.push(target);
                continue;
            }
            let (target_value, fell_back) = types.convert_or_default(&value, &target_type);
            if fell_back {
                warn!(
                    from = %from,
                    to = %target,
                    "no conversion from {:?} to {:?}, using default",
                    value_type,
                    target_type
                );
            }
            converted.push((target, target_value));
        }

        self.ctx.observe_value(from.into(), &value);
        for target in &same_type {
            if !self.is_multi_input(*target) {
                self.ctx.observe_value((*target).into(), &value);
            }
        }

        for (target, target_value) in converted {
            if !self.is_multi_input(target) {
                self.ctx.observe_value(target.into(), &target_value);
            }
            self.add_value_to_input(target, from, target_value, tasks);
        }

        if let Some((last, rest)) = same_type.split_last() {
            for target in rest {
                self.add_value_to_input(*target, from, value.clone(), tasks);
            }
            self.add_value_to_input(*last, from, value, tasks);
        }
    }

    fn add_value_to_input(&self, target: InputRef, from: OutputRef, value: T::Value, tasks: &mut TaskContext<'_>) {
        self.with_locked_node(target.node, tasks, |locked| {
            locked.deliver(target.index, Origin::Output(from), value);
        });
    }

    fn is_multi_input(&self, input: InputRef) -> bool {
        self.ctx
            .graph
            .input_decl(input)
            .is_some_and(|decl| decl.multi_input)
    }
}
