//! What node logic sees during one execution.
//!
//! Inputs that were ready when the run started are moved out of the node
//! state into [`ExecParams`]; whatever the logic does not extract goes back
//! afterwards. Outputs are buffered and forwarded once the logic returns.

use super::state::{MultiEntry, ValueUsage};
use crate::graph::Node;
use crate::types::NodeId;
use crate::value::TypeSystem;
use std::ops::{Deref, DerefMut};
use tracing::warn;

/// An input value moved out of the node state for one execution.
#[derive(Debug)]
pub(crate) enum TakenInput<V> {
    Single(V),
    Multi(Vec<MultiEntry<V>>),
}

/// Snapshot of a node's sockets taken under its lock before execution.
pub(crate) struct Prepared<V> {
    pub inputs: Vec<Option<TakenInput<V>>>,
    /// Inputs that need not be requested again in this run.
    pub settled: Vec<bool>,
    pub output_usage: Vec<ValueUsage>,
    pub output_computed: Vec<bool>,
}

/// What an execution leaves behind.
pub(crate) struct Outcome<V> {
    pub inputs: Vec<Option<TakenInput<V>>>,
    pub outputs: Vec<(usize, V)>,
}

/// Lets lazy node logic ask for inputs of its own node.
pub(crate) trait InputRequester {
    fn require(&mut self, index: usize);
}

// =============================================================================
// EXEC PARAMS
// =============================================================================

/// Inputs and outputs of one node execution.
pub struct ExecParams<'a, T: TypeSystem> {
    node: &'a Node<T>,
    types: &'a T,
    inputs: Vec<Option<TakenInput<T::Value>>>,
    settled: Vec<bool>,
    output_usage: Vec<ValueUsage>,
    output_computed: Vec<bool>,
    outputs: Vec<Option<T::Value>>,
}

impl<'a, T: TypeSystem> ExecParams<'a, T> {
    pub(crate) fn new(node: &'a Node<T>, types: &'a T, prepared: Prepared<T::Value>) -> Self {
        let outputs = std::iter::repeat_with(|| None)
            .take(prepared.output_usage.len())
            .collect();
        Self {
            node,
            types,
            inputs: prepared.inputs,
            settled: prepared.settled,
            output_usage: prepared.output_usage,
            output_computed: prepared.output_computed,
            outputs,
        }
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node.id()
    }

    #[must_use]
    pub fn node_name(&self) -> &str {
        self.node.name()
    }

    /// Take the value of a single input. `None` if it is not available in
    /// this run or was already extracted.
    pub fn extract_input(&mut self, index: usize) -> Option<T::Value> {
        let slot = self.inputs.get_mut(index)?;
        match slot.take()? {
            TakenInput::Single(value) => Some(value),
            multi @ TakenInput::Multi(_) => {
                *slot = Some(multi);
                None
            }
        }
    }

    /// Take all values of a multi-input, in link order.
    pub fn extract_multi_input(&mut self, index: usize) -> Vec<T::Value> {
        let Some(slot) = self.inputs.get_mut(index) else {
            return Vec::new();
        };
        match slot.take() {
            Some(TakenInput::Multi(entries)) => entries.into_iter().filter_map(|e| e.value).collect(),
            Some(single @ TakenInput::Single(_)) => {
                *slot = Some(single);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Borrow the value of a single input without taking it.
    #[must_use]
    pub fn get_input(&self, index: usize) -> Option<&T::Value> {
        match self.inputs.get(index)?.as_ref()? {
            TakenInput::Single(value) => Some(value),
            TakenInput::Multi(_) => None,
        }
    }

    /// Whether the output may still be consumed and has not been produced.
    #[must_use]
    pub fn output_is_required(&self, index: usize) -> bool {
        self.output_usage
            .get(index)
            .is_some_and(|usage| *usage != ValueUsage::Unused)
            && self.output_is_open(index)
    }

    /// Store the value of an output.
    ///
    /// Writes to an output that already had a value when the run started
    /// (a boundary value or an earlier lazy run) are dropped.
    pub fn set_output(&mut self, index: usize, value: T::Value) {
        if self.output_computed.get(index).copied().unwrap_or(true) {
            return;
        }
        let Some(slot) = self.outputs.get_mut(index) else {
            return;
        };
        if slot.is_some() {
            debug_assert!(false, "output {index} of {} set twice", self.node.name());
            return;
        }
        *slot = Some(value);
    }

    /// Give every output that may be consumed its type's default.
    pub fn set_default_remaining_outputs(&mut self) {
        for index in 0..self.outputs.len() {
            if self.output_is_required(index) {
                self.set_output_default(index);
            }
        }
    }

    fn output_is_open(&self, index: usize) -> bool {
        !self.output_computed.get(index).copied().unwrap_or(true)
            && self.outputs.get(index).is_some_and(Option::is_none)
    }

    fn set_output_default(&mut self, index: usize) {
        if let Some(decl) = self.node.output_decl(index) {
            let value = self.types.default_value(&decl.data_type);
            self.set_output(index, value);
        }
    }

    // =========================================================================
    // ADAPTER SUPPORT
    // =========================================================================

    /// Every input as a plain list; anything unavailable is its type default.
    pub(crate) fn extract_all_inputs(&mut self) -> Vec<T::Value> {
        let node = self.node;
        let types = self.types;
        node.node_type()
            .inputs
            .iter()
            .enumerate()
            .map(|(index, decl)| {
                self.extract_input(index)
                    .unwrap_or_else(|| types.default_value(&decl.data_type))
            })
            .collect()
    }

    /// Store builder results for the outputs that are still wanted.
    pub(crate) fn set_required_outputs(&mut self, values: Vec<T::Value>) {
        for (index, value) in values.into_iter().enumerate() {
            if self.output_is_required(index) {
                self.set_output(index, value);
            }
        }
    }

    /// Default every wanted output the logic left unset.
    pub(crate) fn fill_unset_outputs(&mut self) {
        for index in 0..self.outputs.len() {
            if !self.output_is_required(index) {
                continue;
            }
            if self.output_usage[index] == ValueUsage::Required {
                warn!(
                    node = %self.node.id(),
                    name = self.node.name(),
                    output = index,
                    "required output left unset, using default"
                );
            }
            self.set_output_default(index);
        }
    }

    /// Default every output with a usable type, wanted or not.
    pub(crate) fn set_all_usable_outputs_default(&mut self) {
        for index in 0..self.outputs.len() {
            let usable = self
                .node
                .output_decl(index)
                .is_some_and(|decl| self.types.is_supported(&decl.data_type));
            if usable && self.output_is_open(index) {
                self.set_output_default(index);
            }
        }
    }

    pub(crate) fn into_outcome(self) -> Outcome<T::Value> {
        Outcome {
            inputs: self.inputs,
            outputs: self
                .outputs
                .into_iter()
                .enumerate()
                .filter_map(|(index, value)| value.map(|value| (index, value)))
                .collect(),
        }
    }
}

// =============================================================================
// LAZY PARAMS
// =============================================================================

/// Parameters of a lazy node: everything in [`ExecParams`] plus on-demand
/// input requests.
pub struct LazyParams<'a, T: TypeSystem> {
    params: ExecParams<'a, T>,
    requester: &'a mut dyn InputRequester,
}

impl<'a, T: TypeSystem> LazyParams<'a, T> {
    pub(crate) fn new(params: ExecParams<'a, T>, requester: &'a mut dyn InputRequester) -> Self {
        Self { params, requester }
    }

    /// Ask for an input that is not available in this run.
    ///
    /// Returns `true` when the input is still missing: the logic should return
    /// and will be invoked again once the value has arrived. Returns `false`
    /// when the input was already part of this run (extracted or not) or
    /// carries no data.
    pub fn require_input(&mut self, index: usize) -> bool {
        if self.params.settled.get(index).copied().unwrap_or(true) {
            return false;
        }
        self.requester.require(index);
        true
    }

    /// Whether a consumer has declared the output required, as opposed to
    /// merely not unused.
    #[must_use]
    pub fn output_is_required_now(&self, index: usize) -> bool {
        self.params.output_usage.get(index) == Some(&ValueUsage::Required)
            && self.params.output_is_open(index)
    }

    pub(crate) fn into_inner(self) -> ExecParams<'a, T> {
        self.params
    }
}

impl<'a, T: TypeSystem> Deref for LazyParams<'a, T> {
    type Target = ExecParams<'a, T>;

    fn deref(&self) -> &Self::Target {
        &self.params
    }
}

impl<T: TypeSystem> DerefMut for LazyParams<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.params
    }
}
