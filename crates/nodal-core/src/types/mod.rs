//! # Core Type Definitions
//!
//! This module contains the identifiers and the error type shared by every
//! other module of the engine:
//! - Graph identifiers (`NodeId`, `InputRef`, `OutputRef`, `SocketRef`)
//! - Error types (`NodalError`)
//!
//! ## Identifier Guarantees
//!
//! All identifiers in this module:
//! - Are plain indices (`Copy`, no allocation)
//! - Implement `Ord` so they can key `BTreeMap`/`BTreeSet`
//! - Are only meaningful for the `NodeGraph` that issued them

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Identifier of a node inside a `NodeGraph`.
///
/// Node ids are dense: the n-th node added to a `GraphBuilder` gets `NodeId(n)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Position of the node in the graph's node table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Reference to the input socket at `index` on this node.
    #[must_use]
    pub const fn input(self, index: usize) -> InputRef {
        InputRef { node: self, index }
    }

    /// Reference to the output socket at `index` on this node.
    #[must_use]
    pub const fn output(self, index: usize) -> OutputRef {
        OutputRef { node: self, index }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An input socket: the node it belongs to and its position among the inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InputRef {
    /// The owning node.
    pub node: NodeId,
    /// Position among the node's inputs.
    pub index: usize,
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:in{}", self.node, self.index)
    }
}

/// An output socket: the node it belongs to and its position among the outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    /// The owning node.
    pub node: NodeId,
    /// Position among the node's outputs.
    pub index: usize,
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:out{}", self.node, self.index)
    }
}

/// Either kind of socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SocketRef {
    /// An input socket.
    Input(InputRef),
    /// An output socket.
    Output(OutputRef),
}

impl SocketRef {
    /// The node owning the socket.
    #[must_use]
    pub const fn node(self) -> NodeId {
        match self {
            Self::Input(input) => input.node,
            Self::Output(output) => output.node,
        }
    }
}

impl From<InputRef> for SocketRef {
    fn from(input: InputRef) -> Self {
        Self::Input(input)
    }
}

impl From<OutputRef> for SocketRef {
    fn from(output: OutputRef) -> Self {
        Self::Output(output)
    }
}

impl fmt::Display for SocketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(input) => input.fmt(f),
            Self::Output(output) => output.fmt(f),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur outside of node execution.
///
/// Node logic itself has no error path: unknown behaviour and failed
/// conversions degrade to default values. Everything that can be rejected
/// before an evaluation starts (graph construction, requests, configuration)
/// is reported through this type.
#[derive(Debug, Error)]
pub enum NodalError {
    /// The node does not exist in the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// No node with the given name exists in the graph.
    #[error("Node not found: {0:?}")]
    NodeNameNotFound(String),

    /// Two nodes were given the same name.
    #[error("Duplicate node name: {0:?}")]
    DuplicateNodeName(String),

    /// The input socket does not exist on its node.
    #[error("Input socket not found: {0}")]
    InputNotFound(InputRef),

    /// The output socket does not exist on its node.
    #[error("Output socket not found: {0}")]
    OutputNotFound(OutputRef),

    /// A socket name could not be resolved on the named node.
    #[error("Socket not found: {node}.{socket}")]
    SocketNameNotFound { node: String, socket: String },

    /// A second link was made into an input that is not a multi-input.
    #[error("Input {0} is already linked and does not accept multiple links")]
    InputAlreadyLinked(InputRef),

    /// The links form a cycle through the given node.
    #[error("Graph contains a cycle through node {0}")]
    CycleDetected(NodeId),

    /// The registry has no node type with this name.
    #[error("Unknown node type: {0:?}")]
    UnknownNodeType(String),

    /// The evaluation request is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The evaluator configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The worker pool could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// A graph or configuration file could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
