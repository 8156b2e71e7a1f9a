//! Per-node mutable state for one evaluation run.
//!
//! Every field here is only touched while the owning node's mutex is held.

use crate::graph::Origin;
use crate::value::TypeSystem;

/// How much a socket's value is wanted.
///
/// Moves from `Maybe` to `Required` or `Unused` and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueUsage {
    Required,
    Maybe,
    Unused,
}

/// Where a node is in the scheduling cycle.
///
/// ```text
/// NotScheduled -> Scheduled -> Running -> NotScheduled
///                     ^            |
///                     |            v
///                     +--- RunningAndRescheduled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScheduleState {
    NotScheduled,
    Scheduled,
    Running,
    RunningAndRescheduled,
}

/// One link's contribution to a multi-input.
#[derive(Debug)]
pub(crate) struct MultiEntry<V> {
    pub origin: Origin,
    pub value: Option<V>,
}

/// Storage for the value(s) of an input.
#[derive(Debug)]
pub(crate) enum InputSlot<V> {
    Single(Option<V>),
    /// One entry per resolved origin, in link order.
    Multi(Vec<MultiEntry<V>>),
}

impl<V> InputSlot<V> {
    /// How many values still have to arrive before the slot is complete.
    pub fn missing_values(&self) -> usize {
        match self {
            Self::Single(value) => usize::from(value.is_none()),
            Self::Multi(entries) => entries.iter().filter(|e| e.value.is_none()).count(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing_values() == 0
    }

    /// Drop every value held in the slot.
    pub fn clear(&mut self) {
        match self {
            Self::Single(value) => *value = None,
            Self::Multi(entries) => entries.iter_mut().for_each(|e| e.value = None),
        }
    }
}

#[derive(Debug)]
pub(crate) struct InputState<T: TypeSystem> {
    /// `None` when the declared type carries no usable data.
    pub data_type: Option<T::DataType>,
    pub usage: ValueUsage,
    /// Set once the value has been handed to an execution.
    pub was_ready_for_execution: bool,
    /// Requested by the caller: executions get a copy and the value stays
    /// until it is moved into the result.
    pub pinned: bool,
    pub slot: InputSlot<T::Value>,
}

#[derive(Debug)]
pub(crate) struct OutputState<T: TypeSystem> {
    pub data_type: Option<T::DataType>,
    pub has_been_computed: bool,
    pub usage: ValueUsage,
    /// Copy of `usage` taken when the current execution started.
    pub usage_for_execution: ValueUsage,
    /// Reachable consumers that have not declared the value unused.
    pub potential_users: usize,
}

#[derive(Debug)]
pub(crate) struct NodeState<T: TypeSystem> {
    pub inputs: Vec<InputState<T>>,
    pub outputs: Vec<OutputState<T>>,
    pub missing_required_inputs: usize,
    pub schedule_state: ScheduleState,
    pub non_lazy_initialized: bool,
    pub has_been_executed: bool,
    pub node_has_finished: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeId;

    #[test]
    fn single_slot_counts_one_missing_value() {
        let mut slot: InputSlot<i32> = InputSlot::Single(None);
        assert_eq!(slot.missing_values(), 1);
        slot = InputSlot::Single(Some(3));
        assert!(slot.is_complete());
        slot.clear();
        assert_eq!(slot.missing_values(), 1);
    }

    #[test]
    fn multi_slot_counts_each_missing_entry() {
        let origin = Origin::Output(NodeId(0).output(0));
        let mut slot = InputSlot::Multi(vec![
            MultiEntry { origin, value: Some(1) },
            MultiEntry { origin, value: None },
            MultiEntry { origin, value: None },
        ]);
        assert_eq!(slot.missing_values(), 2);
        slot.clear();
        assert_eq!(slot.missing_values(), 3);
    }

    #[test]
    fn empty_multi_slot_is_complete() {
        let slot: InputSlot<i32> = InputSlot::Multi(Vec::new());
        assert!(slot.is_complete());
    }
}
