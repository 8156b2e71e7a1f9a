//! The execution adapter: runs node logic of every behaviour variant.

use super::locked::TaskContext;
use super::params::{ExecParams, InputRequester, LazyParams, Outcome, Prepared};
use super::run::EvalRun;
use crate::graph::Node;
use crate::registry::NodeBehavior;
use crate::types::NodeId;
use crate::value::TypeSystem;
use std::time::Instant;
use tracing::{trace, warn};

impl<T: TypeSystem> EvalRun<'_, T> {
    /// Run the logic of `node` on a prepared snapshot. No lock is held.
    pub(super) fn execute_node(
        &self,
        node: &Node<T>,
        prepared: Prepared<T::Value>,
        tasks: &mut TaskContext<'_>,
    ) -> Outcome<T::Value> {
        let behavior = &node.node_type().behavior;
        trace!(node = %node.id(), name = node.name(), kind = behavior.kind(), "executing node");
        let started = Instant::now();
        let mut params = ExecParams::new(node, self.ctx.types, prepared);

        let outcome = match behavior {
            NodeBehavior::Eager(logic) => {
                logic.execute(&mut params);
                params.fill_unset_outputs();
                params.into_outcome()
            }
            NodeBehavior::Lazy(logic) => {
                let mut requester = OwnNodeRequester {
                    run: self,
                    node: node.id(),
                    tasks,
                };
                let mut lazy = LazyParams::new(params, &mut requester);
                logic.execute(&mut lazy);
                lazy.into_inner().into_outcome()
            }
            NodeBehavior::Expression(builder) => {
                let inputs = params.extract_all_inputs();
                params.set_required_outputs(builder.build(inputs));
                params.fill_unset_outputs();
                params.into_outcome()
            }
            NodeBehavior::Unknown => {
                warn!(
                    node = %node.id(),
                    name = node.name(),
                    node_type = %node.node_type().name,
                    "node has no executable behavior, outputs get defaults"
                );
                params.set_all_usable_outputs_default();
                params.into_outcome()
            }
        };

        self.count_execution();
        if let Some(observer) = self.ctx.observer {
            observer.node_executed(node.id(), started.elapsed());
        }
        outcome
    }
}

/// Routes `LazyParams::require_input` back to the node's own state.
struct OwnNodeRequester<'r, 's, 'g, T: TypeSystem> {
    run: &'r EvalRun<'g, T>,
    node: NodeId,
    tasks: &'r mut TaskContext<'s>,
}

impl<T: TypeSystem> InputRequester for OwnNodeRequester<'_, '_, '_, T> {
    fn require(&mut self, index: usize) {
        self.run
            .with_locked_node(self.node, self.tasks, |locked| locked.require_input(index));
    }
}
