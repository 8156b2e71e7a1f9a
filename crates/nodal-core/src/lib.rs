//! # nodal-core
//!
//! The lazy, concurrent node-graph evaluator for Nodal - THE ENGINE.
//!
//! Given a directed acyclic graph of typed nodes and a set of requested input
//! sockets, the evaluator computes exactly the values those sockets need:
//! - Demand flows backward from the requested sockets ("this value is needed")
//! - Values flow forward from the nodes that computed them, converting types
//!   where a link joins different socket types
//! - Independent nodes run in parallel on a rayon pool, each guarded by its
//!   own lock
//!
//! ## Collaborator Seams
//!
//! The engine interprets nothing on its own. Callers provide:
//! - a [`TypeSystem`] (defaults, conversions, which types carry data)
//! - a [`NodeRegistry`] of node types with their sockets and behaviour
//!
//! The [`builtin`] module ships one of each for tests and the CLI.
//!
//! ## Architectural Constraints
//!
//! - No state survives an evaluation run
//! - No cycles: graphs are validated when built
//! - No async: a run blocks the caller until the pool is idle

// =============================================================================
// MODULES
// =============================================================================

pub mod builtin;
pub mod config;
pub mod evaluator;
pub mod graph;
pub mod primitives;
pub mod registry;
pub mod request;
pub mod types;
pub mod value;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{InputRef, NodalError, NodeId, OutputRef, SocketRef};

// =============================================================================
// RE-EXPORTS: Graph and Registry
// =============================================================================

pub use graph::{GraphBuilder, Node, NodeGraph, Origin};
pub use registry::{
    EagerNode, ExpressionNode, LazyNode, NodeBehavior, NodeRegistry, NodeRole, NodeType,
    SocketDecl,
};
pub use value::TypeSystem;

// =============================================================================
// RE-EXPORTS: Evaluation
// =============================================================================

pub use config::EvaluatorConfig;
pub use evaluator::{Evaluator, ExecParams, LazyParams};
pub use request::{EvalStats, EvaluationRequest, EvaluationResult, SocketObserver, ValueLog};
