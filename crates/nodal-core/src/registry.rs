//! # Node-Type Registry
//!
//! A node type declares its sockets and how it executes. The execution shape
//! is a closed set of variants dispatched by `match` in the evaluator:
//!
//! | Variant      | Reads inputs             | May run more than once |
//! |--------------|--------------------------|------------------------|
//! | `Eager`      | all usable inputs        | no                     |
//! | `Lazy`       | only what it requests    | yes                    |
//! | `Expression` | all inputs, as a list    | no                     |
//! | `Unknown`    | none (outputs defaulted) | no                     |
//!
//! Pass-through nodes (reroutes) have no behaviour at all: the graph resolves
//! links through them and they never get evaluator state.

use crate::evaluator::{ExecParams, LazyParams};
use crate::types::NodalError;
use crate::value::TypeSystem;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// SOCKET DECLARATIONS
// =============================================================================

/// Declaration of one input or output socket of a node type.
pub struct SocketDecl<T: TypeSystem> {
    /// Name used to address the socket from graph files.
    pub name: String,
    /// Declared payload type.
    pub data_type: T::DataType,
    /// Default for an unlinked input. `None` uses the type's default.
    pub default: Option<T::Value>,
    /// Whether the input accepts any number of links.
    pub multi_input: bool,
}

impl<T: TypeSystem> SocketDecl<T> {
    /// A single-link socket without a custom default.
    pub fn new(name: impl Into<String>, data_type: T::DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            default: None,
            multi_input: false,
        }
    }

    /// Set the default used when the input is unlinked.
    #[must_use]
    pub fn with_default(mut self, value: T::Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Accept any number of links.
    #[must_use]
    pub fn multi(mut self) -> Self {
        self.multi_input = true;
        self
    }
}

impl<T: TypeSystem> Clone for SocketDecl<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            default: self.default.clone(),
            multi_input: self.multi_input,
        }
    }
}

impl<T: TypeSystem> fmt::Debug for SocketDecl<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketDecl")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("multi_input", &self.multi_input)
            .finish()
    }
}

// =============================================================================
// NODE LOGIC
// =============================================================================

/// Logic that reads all of its inputs and writes its outputs in one go.
pub trait EagerNode<T: TypeSystem>: Send + Sync {
    fn execute(&self, params: &mut ExecParams<'_, T>);
}

/// Logic that requests inputs on demand and may run several times.
///
/// A run that finds an input missing calls `require_input` and returns; it is
/// invoked again once the input arrives.
pub trait LazyNode<T: TypeSystem>: Send + Sync {
    fn execute(&self, params: &mut LazyParams<'_, T>);
}

/// A pure mapping from all input values to all output values.
///
/// The returned list is indexed like the node's outputs. The values may be
/// composed expressions; the evaluator only moves them.
pub trait ExpressionNode<T: TypeSystem>: Send + Sync {
    fn build(&self, inputs: Vec<T::Value>) -> Vec<T::Value>;
}

impl<T, F> EagerNode<T> for F
where
    T: TypeSystem,
    F: for<'a> Fn(&mut ExecParams<'a, T>) + Send + Sync,
{
    fn execute(&self, params: &mut ExecParams<'_, T>) {
        self(params);
    }
}

impl<T, F> LazyNode<T> for F
where
    T: TypeSystem,
    F: for<'a> Fn(&mut LazyParams<'a, T>) + Send + Sync,
{
    fn execute(&self, params: &mut LazyParams<'_, T>) {
        self(params);
    }
}

impl<T, F> ExpressionNode<T> for F
where
    T: TypeSystem,
    F: Fn(Vec<T::Value>) -> Vec<T::Value> + Send + Sync,
{
    fn build(&self, inputs: Vec<T::Value>) -> Vec<T::Value> {
        self(inputs)
    }
}

/// How a node executes.
pub enum NodeBehavior<T: TypeSystem> {
    Eager(Arc<dyn EagerNode<T>>),
    Lazy(Arc<dyn LazyNode<T>>),
    Expression(Arc<dyn ExpressionNode<T>>),
    /// No executable behaviour: usable outputs receive defaults.
    Unknown,
}

impl<T: TypeSystem> NodeBehavior<T> {
    pub fn eager<F>(logic: F) -> Self
    where
        F: for<'a> Fn(&mut ExecParams<'a, T>) + Send + Sync + 'static,
    {
        Self::Eager(Arc::new(logic))
    }

    pub fn lazy<F>(logic: F) -> Self
    where
        F: for<'a> Fn(&mut LazyParams<'a, T>) + Send + Sync + 'static,
    {
        Self::Lazy(Arc::new(logic))
    }

    pub fn expression<F>(builder: F) -> Self
    where
        F: Fn(Vec<T::Value>) -> Vec<T::Value> + Send + Sync + 'static,
    {
        Self::Expression(Arc::new(builder))
    }

    /// Lazy nodes decide themselves which inputs they need.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    /// Short name of the variant, for listings and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Eager(_) => "eager",
            Self::Lazy(_) => "lazy",
            Self::Expression(_) => "expression",
            Self::Unknown => "unknown",
        }
    }
}

impl<T: TypeSystem> Clone for NodeBehavior<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Eager(logic) => Self::Eager(Arc::clone(logic)),
            Self::Lazy(logic) => Self::Lazy(Arc::clone(logic)),
            Self::Expression(builder) => Self::Expression(Arc::clone(builder)),
            Self::Unknown => Self::Unknown,
        }
    }
}

impl<T: TypeSystem> fmt::Debug for NodeBehavior<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

// =============================================================================
// NODE TYPES
// =============================================================================

/// Whether a node type does work or just passes its input along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Executes its behaviour.
    Regular,
    /// Forwards input 0 to output 0; resolved away when links are built.
    Reroute,
}

/// A node type: its sockets and its behaviour.
pub struct NodeType<T: TypeSystem> {
    pub name: String,
    pub inputs: Vec<SocketDecl<T>>,
    pub outputs: Vec<SocketDecl<T>>,
    pub behavior: NodeBehavior<T>,
    pub role: NodeRole,
}

impl<T: TypeSystem> NodeType<T> {
    /// A regular node type.
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<SocketDecl<T>>,
        outputs: Vec<SocketDecl<T>>,
        behavior: NodeBehavior<T>,
    ) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
            behavior,
            role: NodeRole::Regular,
        }
    }

    /// A reroute node for values of `data_type`.
    pub fn reroute(name: impl Into<String>, data_type: T::DataType) -> Self {
        Self {
            name: name.into(),
            inputs: vec![SocketDecl::new("input", data_type.clone())],
            outputs: vec![SocketDecl::new("output", data_type)],
            behavior: NodeBehavior::Unknown,
            role: NodeRole::Reroute,
        }
    }

    #[must_use]
    pub fn is_reroute(&self) -> bool {
        self.role == NodeRole::Reroute
    }

    /// Position of the input named `name`.
    #[must_use]
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|decl| decl.name == name)
    }

    /// Position of the output named `name`.
    #[must_use]
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|decl| decl.name == name)
    }
}

impl<T: TypeSystem> fmt::Debug for NodeType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("behavior", &self.behavior)
            .field("role", &self.role)
            .finish()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Name-keyed collection of node types.
///
/// Uses a `BTreeMap` so listings come out sorted.
pub struct NodeRegistry<T: TypeSystem> {
    types: BTreeMap<String, Arc<NodeType<T>>>,
}

impl<T: TypeSystem> NodeRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    /// Register a node type, replacing any previous type with the same name.
    pub fn register(&mut self, node_type: NodeType<T>) -> Arc<NodeType<T>> {
        let node_type = Arc::new(node_type);
        self.types
            .insert(node_type.name.clone(), Arc::clone(&node_type));
        node_type
    }

    /// Look up a node type by name.
    pub fn get(&self, name: &str) -> Result<Arc<NodeType<T>>, NodalError> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| NodalError::UnknownNodeType(name.to_string()))
    }

    /// All registered types in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<NodeType<T>>> {
        self.types.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl<T: TypeSystem> Default for NodeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{BuiltinTypes, DataType};

    fn constant(name: &str) -> NodeType<BuiltinTypes> {
        NodeType::new(
            name,
            vec![],
            vec![SocketDecl::new("value", DataType::Int)],
            NodeBehavior::Unknown,
        )
    }

    #[test]
    fn registry_lookup_by_name() {
        let mut registry = NodeRegistry::<BuiltinTypes>::new();
        registry.register(constant("b"));
        registry.register(constant("a"));

        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_ok());
        assert!(matches!(
            registry.get("missing"),
            Err(NodalError::UnknownNodeType(name)) if name == "missing"
        ));
    }

    #[test]
    fn registry_lists_in_name_order() {
        let mut registry = NodeRegistry::<BuiltinTypes>::new();
        registry.register(constant("zeta"));
        registry.register(constant("alpha"));

        let names: Vec<&str> = registry.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn reroute_type_has_one_socket_each_side() {
        let reroute = NodeType::<BuiltinTypes>::reroute("reroute.float", DataType::Float);
        assert!(reroute.is_reroute());
        assert_eq!(reroute.input_index("input"), Some(0));
        assert_eq!(reroute.output_index("output"), Some(0));
        assert!(!reroute.behavior.is_lazy());
    }
}
