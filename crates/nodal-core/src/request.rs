//! # Evaluation Requests and Results
//!
//! An [`EvaluationRequest`] names what the caller wants from one run:
//! - boundary values injected at output sockets
//! - the input sockets whose values are returned, in order
//! - sockets computed for their side channel only (force-compute)
//! - an optional [`SocketObserver`] that sees values as they become available
//!
//! Requests are validated against the graph before any state is allocated.

use crate::graph::NodeGraph;
use crate::types::{InputRef, NodalError, NodeId, OutputRef, SocketRef};
use crate::value::TypeSystem;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// OBSERVER
// =============================================================================

/// Diagnostics hook called from worker threads during a run.
///
/// Implementations must not block for long; they run while the evaluator may
/// hold the lock of the node being observed.
pub trait SocketObserver<T: TypeSystem>: Send + Sync {
    /// A value became available at a socket.
    fn socket_value(&self, socket: SocketRef, value: &T::Value) {
        let _ = (socket, value);
    }

    /// Every link of a multi-input has delivered.
    fn multi_input_values(&self, input: InputRef, values: &[&T::Value]) {
        let _ = (input, values);
    }

    /// A node's logic returned.
    fn node_executed(&self, node: NodeId, elapsed: Duration) {
        let _ = (node, elapsed);
    }
}

/// Observer that records everything it sees, in arrival order.
pub struct ValueLog<T: TypeSystem> {
    values: Mutex<Vec<(SocketRef, T::Value)>>,
    multi_inputs: Mutex<Vec<(InputRef, Vec<T::Value>)>>,
    executions: Mutex<Vec<NodeId>>,
}

impl<T: TypeSystem> ValueLog<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Mutex::new(Vec::new()),
            multi_inputs: Mutex::new(Vec::new()),
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Every observed socket value, sorted by socket for stable output.
    #[must_use]
    pub fn values(&self) -> Vec<(SocketRef, T::Value)> {
        let mut values = self.values.lock().clone();
        values.sort_by_key(|(socket, _)| *socket);
        values
    }

    /// Values observed at one socket.
    #[must_use]
    pub fn values_at(&self, socket: impl Into<SocketRef>) -> Vec<T::Value> {
        let socket = socket.into();
        self.values
            .lock()
            .iter()
            .filter(|(observed, _)| *observed == socket)
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// Completed multi-inputs with their values in link order.
    #[must_use]
    pub fn multi_inputs(&self) -> Vec<(InputRef, Vec<T::Value>)> {
        self.multi_inputs.lock().clone()
    }

    /// How often a node's logic ran.
    #[must_use]
    pub fn execution_count(&self, node: NodeId) -> usize {
        self.executions.lock().iter().filter(|id| **id == node).count()
    }
}

impl<T: TypeSystem> Default for ValueLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TypeSystem> SocketObserver<T> for ValueLog<T> {
    fn socket_value(&self, socket: SocketRef, value: &T::Value) {
        self.values.lock().push((socket, value.clone()));
    }

    fn multi_input_values(&self, input: InputRef, values: &[&T::Value]) {
        let values = values.iter().map(|value| (*value).clone()).collect();
        self.multi_inputs.lock().push((input, values));
    }

    fn node_executed(&self, node: NodeId, _elapsed: Duration) {
        self.executions.lock().push(node);
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// What one evaluation should compute.
pub struct EvaluationRequest<T: TypeSystem> {
    pub(crate) boundary: Vec<(OutputRef, T::Value)>,
    pub(crate) outputs: Vec<InputRef>,
    pub(crate) force: Vec<SocketRef>,
    pub(crate) observer: Option<Arc<dyn SocketObserver<T>>>,
}

impl<T: TypeSystem> EvaluationRequest<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            boundary: Vec::new(),
            outputs: Vec::new(),
            force: Vec::new(),
            observer: None,
        }
    }

    /// Request the value arriving at `input`.
    #[must_use]
    pub fn output(mut self, input: InputRef) -> Self {
        self.outputs.push(input);
        self
    }

    /// Request several inputs, in order.
    #[must_use]
    pub fn outputs(mut self, inputs: impl IntoIterator<Item = InputRef>) -> Self {
        self.outputs.extend(inputs);
        self
    }

    /// Provide the value of `output` instead of computing it.
    #[must_use]
    pub fn boundary(mut self, output: OutputRef, value: T::Value) -> Self {
        self.boundary.push((output, value));
        self
    }

    /// Compute `socket` even though no requested output needs it.
    #[must_use]
    pub fn force(mut self, socket: impl Into<SocketRef>) -> Self {
        self.force.push(socket.into());
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn SocketObserver<T>>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The requested inputs, in result order.
    #[must_use]
    pub fn requested(&self) -> &[InputRef] {
        &self.outputs
    }

    /// Check every socket of the request against the graph.
    pub fn validate(&self, graph: &NodeGraph<T>, types: &T) -> Result<(), NodalError> {
        for input in &self.outputs {
            let decl = executable_node(graph, input.node)?
                .input_decl(input.index)
                .ok_or(NodalError::InputNotFound(*input))?;
            if decl.multi_input {
                return Err(NodalError::InvalidRequest(format!(
                    "requested socket {input} is a multi-input"
                )));
            }
            if !types.is_supported(&decl.data_type) {
                return Err(NodalError::InvalidRequest(format!(
                    "requested socket {input} carries no data"
                )));
            }
        }
        for socket in &self.force {
            let node = executable_node(graph, socket.node())?;
            let exists = match socket {
                SocketRef::Input(input) => node.input_decl(input.index).is_some(),
                SocketRef::Output(output) => node.output_decl(output.index).is_some(),
            };
            if !exists {
                return Err(NodalError::InvalidRequest(format!(
                    "force-compute socket {socket} does not exist"
                )));
            }
        }
        let mut seen = BTreeSet::new();
        for (output, _) in &self.boundary {
            executable_node(graph, output.node)?
                .output_decl(output.index)
                .ok_or(NodalError::OutputNotFound(*output))?;
            if !seen.insert(*output) {
                return Err(NodalError::InvalidRequest(format!(
                    "boundary socket {output} has more than one value"
                )));
            }
        }
        Ok(())
    }
}

fn executable_node<T: TypeSystem>(
    graph: &NodeGraph<T>,
    id: NodeId,
) -> Result<&crate::graph::Node<T>, NodalError> {
    let node = graph.node(id).ok_or(NodalError::NodeNotFound(id))?;
    if node.is_pass_through() {
        return Err(NodalError::InvalidRequest(format!(
            "node {:?} is a reroute or muted and is never evaluated",
            node.name()
        )));
    }
    Ok(node)
}

impl<T: TypeSystem> Default for EvaluationRequest<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TypeSystem> fmt::Debug for EvaluationRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationRequest")
            .field("boundary", &self.boundary)
            .field("outputs", &self.outputs)
            .field("force", &self.force)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// Counters collected during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalStats {
    /// Nodes that received state.
    pub reachable_nodes: usize,
    /// Calls into node logic (lazy nodes may be counted several times).
    pub executions: usize,
    /// Distinct nodes whose logic ran at least once.
    pub executed_nodes: usize,
}

/// The values of the requested sockets, in request order.
#[derive(Debug)]
pub struct EvaluationResult<V> {
    pub values: Vec<V>,
    pub stats: EvalStats,
}

impl<V> EvaluationResult<V> {
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&V> {
        self.values.get(index)
    }

    #[must_use]
    pub fn into_values(self) -> Vec<V> {
        self.values
    }
}
