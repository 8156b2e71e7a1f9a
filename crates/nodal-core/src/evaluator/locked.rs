//! The locking discipline.
//!
//! Node state is only reachable through a [`LockedNode`], which is handed to a
//! closure by `EvalRun::with_locked_node`. A `LockedNode` holds the guard of
//! exactly one node and read access to the graph, but not the state table, so
//! code running under a lock has no way to lock a second node. Work aimed at
//! other nodes is recorded in [`Deferred`] and carried out after the guard is
//! dropped.

use super::state::{NodeState, ScheduleState};
use crate::graph::NodeGraph;
use crate::request::SocketObserver;
use crate::types::{NodeId, OutputRef, SocketRef};
use crate::value::TypeSystem;
use parking_lot::MutexGuard;

// =============================================================================
// SHARED READ-ONLY CONTEXT
// =============================================================================

/// Everything a run reads but never mutates.
pub(crate) struct RunContext<'g, T: TypeSystem> {
    pub graph: &'g NodeGraph<T>,
    pub types: &'g T,
    pub observer: Option<&'g dyn SocketObserver<T>>,
}

impl<T: TypeSystem> RunContext<'_, T> {
    pub fn observe_value(&self, socket: SocketRef, value: &T::Value) {
        if let Some(observer) = self.observer {
            observer.socket_value(socket, value);
        }
    }
}

// =============================================================================
// TASKS
// =============================================================================

/// Where newly scheduled nodes go.
pub(crate) trait TaskSink {
    fn spawn(&self, node: NodeId);
}

/// Per-task scheduling context.
///
/// The first node scheduled from a task is kept in `next_node` and run by the
/// same worker once the current node is done; the rest are spawned.
pub(crate) struct TaskContext<'s> {
    sink: &'s dyn TaskSink,
    inline: bool,
    next_node: Option<NodeId>,
}

impl<'s> TaskContext<'s> {
    pub fn new(sink: &'s dyn TaskSink) -> Self {
        Self {
            sink,
            inline: true,
            next_node: None,
        }
    }

    /// A context that spawns every scheduled node.
    #[cfg(test)]
    pub fn spawning(sink: &'s dyn TaskSink) -> Self {
        Self {
            sink,
            inline: false,
            next_node: None,
        }
    }

    pub fn enqueue(&mut self, node: NodeId) {
        if self.inline && self.next_node.is_none() {
            self.next_node = Some(node);
        } else {
            self.sink.spawn(node);
        }
    }

    pub fn take_next(&mut self) -> Option<NodeId> {
        self.next_node.take()
    }
}

// =============================================================================
// LOCKED NODE
// =============================================================================

/// Work for other nodes collected while a lock was held.
#[derive(Debug, Default)]
pub(crate) struct Deferred {
    pub required_outputs: Vec<OutputRef>,
    pub unused_outputs: Vec<OutputRef>,
    pub scheduled_nodes: Vec<NodeId>,
}

/// A node whose mutex is held by the current thread.
pub(crate) struct LockedNode<'a, T: TypeSystem> {
    pub node: NodeId,
    pub ctx: &'a RunContext<'a, T>,
    pub state: MutexGuard<'a, NodeState<T>>,
    pub deferred: Deferred,
}

impl<'a, T: TypeSystem> LockedNode<'a, T> {
    pub fn new(node: NodeId, ctx: &'a RunContext<'a, T>, state: MutexGuard<'a, NodeState<T>>) -> Self {
        Self {
            node,
            ctx,
            state,
            deferred: Deferred::default(),
        }
    }

    /// Release the lock and hand back the work that has to happen next.
    pub fn unlock(self) -> Deferred {
        let Self { state, deferred, .. } = self;
        drop(state);
        deferred
    }

    /// Make sure the node runs (again) soon. Idempotent.
    pub fn schedule(&mut self) {
        if self.state.node_has_finished {
            return;
        }
        match self.state.schedule_state {
            ScheduleState::NotScheduled => {
                self.state.schedule_state = ScheduleState::Scheduled;
                self.deferred.scheduled_nodes.push(self.node);
            }
            ScheduleState::Running => {
                self.state.schedule_state = ScheduleState::RunningAndRescheduled;
            }
            ScheduleState::Scheduled | ScheduleState::RunningAndRescheduled => {}
        }
    }
}
