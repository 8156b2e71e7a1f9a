//! # Graph Model
//!
//! An immutable node graph with typed sockets, built and validated by
//! [`GraphBuilder`]. The evaluator only ever reads a [`NodeGraph`].
//!
//! ## Link Resolution
//!
//! Reroute nodes and muted nodes are transparent. When the graph is built,
//! every input gets its list of resolved [`Origin`]s and every output its list
//! of resolved target inputs, both computed by walking through such nodes:
//!
//! - A reroute passes input 0 to output 0.
//! - A muted node passes each output from the first input of the same type.
//!   An output with no such input resolves to its type's default.
//! - An unlinked input resolves to its own default value.
//!
//! A pass-through input with several links only passes its first link along.
//!
//! ## Validation
//!
//! `GraphBuilder::build` rejects cycles (including cycles through pass-through
//! nodes). `link` rejects unknown sockets and a second link into an input that
//! is not a multi-input.

use crate::registry::{NodeType, SocketDecl};
use crate::types::{InputRef, NodalError, NodeId, OutputRef};
use crate::value::TypeSystem;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// ORIGINS
// =============================================================================

/// Where the value of an input comes from after resolving pass-through nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Computed by another node.
    Output(OutputRef),
    /// The default value of this unlinked input.
    Unlinked(InputRef),
    /// The default value of a muted node's output with no pass-through.
    MutedOutput(OutputRef),
}

// =============================================================================
// NODES
// =============================================================================

/// A node instance in a graph.
pub struct Node<T: TypeSystem> {
    id: NodeId,
    name: String,
    node_type: Arc<NodeType<T>>,
    input_values: Vec<Option<T::Value>>,
    muted: bool,
}

impl<T: TypeSystem> Node<T> {
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn node_type(&self) -> &NodeType<T> {
        &self.node_type
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Reroutes and muted nodes are resolved away and never executed.
    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        self.muted || self.node_type.is_reroute()
    }

    #[must_use]
    pub fn input_count(&self) -> usize {
        self.node_type.inputs.len()
    }

    #[must_use]
    pub fn output_count(&self) -> usize {
        self.node_type.outputs.len()
    }

    #[must_use]
    pub fn input_decl(&self, index: usize) -> Option<&SocketDecl<T>> {
        self.node_type.inputs.get(index)
    }

    #[must_use]
    pub fn output_decl(&self, index: usize) -> Option<&SocketDecl<T>> {
        self.node_type.outputs.get(index)
    }

    /// The value an unlinked input at `index` receives.
    ///
    /// Instance value, then the declared default, then the type default. The
    /// result always has the declared type of the socket.
    pub fn input_default(&self, index: usize, types: &T) -> Option<T::Value> {
        let decl = self.input_decl(index)?;
        let configured = self
            .input_values
            .get(index)
            .and_then(Option::as_ref)
            .or(decl.default.as_ref());
        Some(match configured {
            Some(value) => types.convert_or_default(value, &decl.data_type).0,
            None => types.default_value(&decl.data_type),
        })
    }

    /// Which input a pass-through node forwards to output `index`.
    fn pass_through_input(&self, index: usize) -> Option<usize> {
        if self.node_type.is_reroute() {
            return (index == 0 && self.input_count() > 0).then_some(0);
        }
        let output_type = &self.output_decl(index)?.data_type;
        self.node_type
            .inputs
            .iter()
            .position(|decl| decl.data_type == *output_type)
    }
}

impl<T: TypeSystem> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.node_type.name)
            .field("muted", &self.muted)
            .finish()
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Incrementally assembles a [`NodeGraph`].
pub struct GraphBuilder<T: TypeSystem> {
    nodes: Vec<Node<T>>,
    names: BTreeMap<String, NodeId>,
    links: Vec<(OutputRef, InputRef)>,
}

impl<T: TypeSystem> GraphBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            names: BTreeMap::new(),
            links: Vec::new(),
        }
    }

    /// Add a node. Names must be unique within the graph.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        node_type: Arc<NodeType<T>>,
    ) -> Result<NodeId, NodalError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(NodalError::DuplicateNodeName(name));
        }
        let id = NodeId(self.nodes.len());
        let input_values = vec![None; node_type.inputs.len()];
        self.names.insert(name.clone(), id);
        self.nodes.push(Node {
            id,
            name,
            node_type,
            input_values,
            muted: false,
        });
        Ok(id)
    }

    /// Override the default of an input; used while it stays unlinked.
    pub fn set_input_value(&mut self, input: InputRef, value: T::Value) -> Result<(), NodalError> {
        let slot = self
            .nodes
            .get_mut(input.node.index())
            .ok_or(NodalError::NodeNotFound(input.node))?
            .input_values
            .get_mut(input.index)
            .ok_or(NodalError::InputNotFound(input))?;
        *slot = Some(value);
        Ok(())
    }

    /// Mute or unmute a node.
    pub fn set_muted(&mut self, node: NodeId, muted: bool) -> Result<(), NodalError> {
        self.nodes
            .get_mut(node.index())
            .ok_or(NodalError::NodeNotFound(node))?
            .muted = muted;
        Ok(())
    }

    /// Link an output to an input.
    pub fn link(&mut self, from: OutputRef, to: InputRef) -> Result<(), NodalError> {
        let source = self
            .nodes
            .get(from.node.index())
            .ok_or(NodalError::NodeNotFound(from.node))?;
        if from.index >= source.output_count() {
            return Err(NodalError::OutputNotFound(from));
        }
        let target = self
            .nodes
            .get(to.node.index())
            .ok_or(NodalError::NodeNotFound(to.node))?;
        let decl = target.input_decl(to.index).ok_or(NodalError::InputNotFound(to))?;
        if from.node == to.node {
            return Err(NodalError::CycleDetected(to.node));
        }
        if !decl.multi_input && self.links.iter().any(|(_, existing)| *existing == to) {
            return Err(NodalError::InputAlreadyLinked(to));
        }
        self.links.push((from, to));
        Ok(())
    }

    /// Look up a node added earlier.
    #[must_use]
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Validate and freeze the graph.
    pub fn build(self) -> Result<NodeGraph<T>, NodalError> {
        check_acyclic(self.nodes.len(), &self.links)?;

        let mut input_links: Vec<Vec<Vec<OutputRef>>> = self
            .nodes
            .iter()
            .map(|node| vec![Vec::new(); node.input_count()])
            .collect();
        let mut output_links: Vec<Vec<Vec<InputRef>>> = self
            .nodes
            .iter()
            .map(|node| vec![Vec::new(); node.output_count()])
            .collect();
        for (from, to) in &self.links {
            input_links[to.node.index()][to.index].push(*from);
            output_links[from.node.index()][from.index].push(*to);
        }

        let resolver = Resolver {
            nodes: &self.nodes,
            input_links: &input_links,
            output_links: &output_links,
        };
        let origins = self
            .nodes
            .iter()
            .map(|node| {
                (0..node.input_count())
                    .map(|index| resolver.input_origins(node.id.input(index)))
                    .collect()
            })
            .collect();
        let targets = self
            .nodes
            .iter()
            .map(|node| {
                (0..node.output_count())
                    .map(|index| {
                        let mut targets = Vec::new();
                        resolver.collect_targets(node.id.output(index), &mut targets);
                        targets
                    })
                    .collect()
            })
            .collect();

        Ok(NodeGraph {
            nodes: self.nodes,
            names: self.names,
            link_count: self.links.len(),
            origins,
            targets,
        })
    }
}

impl<T: TypeSystem> Default for GraphBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Kahn's algorithm over node-level edges.
fn check_acyclic(node_count: usize, links: &[(OutputRef, InputRef)]) -> Result<(), NodalError> {
    let mut in_degree = vec![0usize; node_count];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for (from, to) in links {
        successors[from.node.index()].push(to.node.index());
        in_degree[to.node.index()] += 1;
    }

    let mut queue: VecDeque<usize> = (0..node_count).filter(|&n| in_degree[n] == 0).collect();
    let mut visited = 0;
    while let Some(node) = queue.pop_front() {
        visited += 1;
        for &next in &successors[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if visited == node_count {
        return Ok(());
    }
    let stuck = in_degree.iter().position(|&d| d > 0).unwrap_or(0);
    Err(NodalError::CycleDetected(NodeId(stuck)))
}

struct Resolver<'a, T: TypeSystem> {
    nodes: &'a [Node<T>],
    input_links: &'a [Vec<Vec<OutputRef>>],
    output_links: &'a [Vec<Vec<InputRef>>],
}

impl<T: TypeSystem> Resolver<'_, T> {
    fn input_origins(&self, input: InputRef) -> Vec<Origin> {
        let links = &self.input_links[input.node.index()][input.index];
        if links.is_empty() {
            return vec![Origin::Unlinked(input)];
        }
        links.iter().map(|&from| self.output_origin(from)).collect()
    }

    fn output_origin(&self, output: OutputRef) -> Origin {
        let node = &self.nodes[output.node.index()];
        if !node.is_pass_through() {
            return Origin::Output(output);
        }
        let Some(input_index) = node.pass_through_input(output.index) else {
            return Origin::MutedOutput(output);
        };
        let input = node.id.input(input_index);
        match self.input_links[input.node.index()][input.index].first() {
            Some(&upstream) => self.output_origin(upstream),
            None => Origin::Unlinked(input),
        }
    }

    fn collect_targets(&self, output: OutputRef, targets: &mut Vec<InputRef>) {
        for &to in &self.output_links[output.node.index()][output.index] {
            let node = &self.nodes[to.node.index()];
            if !node.is_pass_through() {
                targets.push(to);
                continue;
            }
            if self.input_links[to.node.index()][to.index].first() != Some(&output) {
                continue;
            }
            for index in 0..node.output_count() {
                if node.pass_through_input(index) == Some(to.index) {
                    self.collect_targets(node.id.output(index), targets);
                }
            }
        }
    }
}

// =============================================================================
// NODE GRAPH
// =============================================================================

/// A validated, immutable node graph with resolved links.
pub struct NodeGraph<T: TypeSystem> {
    nodes: Vec<Node<T>>,
    names: BTreeMap<String, NodeId>,
    link_count: usize,
    origins: Vec<Vec<Vec<Origin>>>,
    targets: Vec<Vec<Vec<InputRef>>>,
}

impl<T: TypeSystem> NodeGraph<T> {
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node<T>> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of links as written, before resolution.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.link_count
    }

    #[must_use]
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Resolve `node.socket` to an input.
    pub fn input_by_name(&self, node: &str, socket: &str) -> Result<InputRef, NodalError> {
        let id = self
            .find_node(node)
            .ok_or_else(|| NodalError::NodeNameNotFound(node.to_string()))?;
        self.nodes[id.index()]
            .node_type
            .input_index(socket)
            .map(|index| id.input(index))
            .ok_or_else(|| NodalError::SocketNameNotFound {
                node: node.to_string(),
                socket: socket.to_string(),
            })
    }

    /// Resolve `node.socket` to an output.
    pub fn output_by_name(&self, node: &str, socket: &str) -> Result<OutputRef, NodalError> {
        let id = self
            .find_node(node)
            .ok_or_else(|| NodalError::NodeNameNotFound(node.to_string()))?;
        self.nodes[id.index()]
            .node_type
            .output_index(socket)
            .map(|index| id.output(index))
            .ok_or_else(|| NodalError::SocketNameNotFound {
                node: node.to_string(),
                socket: socket.to_string(),
            })
    }

    #[must_use]
    pub fn input_decl(&self, input: InputRef) -> Option<&SocketDecl<T>> {
        self.node(input.node)?.input_decl(input.index)
    }

    #[must_use]
    pub fn output_decl(&self, output: OutputRef) -> Option<&SocketDecl<T>> {
        self.node(output.node)?.output_decl(output.index)
    }

    /// Resolved origins of an input, in link order.
    #[must_use]
    pub fn origins(&self, input: InputRef) -> &[Origin] {
        self.origins
            .get(input.node.index())
            .and_then(|sockets| sockets.get(input.index))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Resolved target inputs of an output, in link order.
    #[must_use]
    pub fn targets(&self, output: OutputRef) -> &[InputRef] {
        self.targets
            .get(output.node.index())
            .and_then(|sockets| sockets.get(output.index))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The default value an origin that is not a computed output stands for.
    ///
    /// Returns `None` for `Origin::Output` and for sockets that do not exist.
    pub fn origin_default(&self, origin: Origin, types: &T) -> Option<T::Value> {
        match origin {
            Origin::Output(_) => None,
            Origin::Unlinked(input) => self.node(input.node)?.input_default(input.index, types),
            Origin::MutedOutput(output) => self
                .output_decl(output)
                .map(|decl| types.default_value(&decl.data_type)),
        }
    }
}

impl<T: TypeSystem> fmt::Debug for NodeGraph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGraph")
            .field("nodes", &self.nodes)
            .field("link_count", &self.link_count)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{BuiltinTypes, DataType, Value, builtin_registry};
    use crate::registry::NodeRegistry;

    fn registry() -> NodeRegistry<BuiltinTypes> {
        builtin_registry()
    }

    fn add(
        builder: &mut GraphBuilder<BuiltinTypes>,
        registry: &NodeRegistry<BuiltinTypes>,
        name: &str,
        type_name: &str,
    ) -> Result<NodeId, NodalError> {
        builder.add_node(name, registry.get(type_name)?)
    }

    #[test]
    fn unlinked_input_is_its_own_origin() -> Result<(), NodalError> {
        let registry = registry();
        let mut builder = GraphBuilder::new();
        let sink = add(&mut builder, &registry, "sink", "output.int")?;
        let graph = builder.build()?;

        assert_eq!(
            graph.origins(sink.input(0)),
            &[Origin::Unlinked(sink.input(0))]
        );
        Ok(())
    }

    #[test]
    fn duplicate_link_into_single_input_rejected() -> Result<(), NodalError> {
        let registry = registry();
        let mut builder = GraphBuilder::new();
        let a = add(&mut builder, &registry, "a", "value.int")?;
        let b = add(&mut builder, &registry, "b", "value.int")?;
        let sink = add(&mut builder, &registry, "sink", "output.int")?;

        builder.link(a.output(0), sink.input(0))?;
        let result = builder.link(b.output(0), sink.input(0));
        assert!(matches!(result, Err(NodalError::InputAlreadyLinked(_))));
        Ok(())
    }

    #[test]
    fn cycle_rejected_at_build() -> Result<(), NodalError> {
        let registry = registry();
        let mut builder = GraphBuilder::new();
        let a = add(&mut builder, &registry, "a", "int.add")?;
        let b = add(&mut builder, &registry, "b", "int.add")?;

        builder.link(a.output(0), b.input(0))?;
        builder.link(b.output(0), a.input(0))?;
        assert!(matches!(builder.build(), Err(NodalError::CycleDetected(_))));
        Ok(())
    }

    #[test]
    fn self_link_rejected() -> Result<(), NodalError> {
        let registry = registry();
        let mut builder = GraphBuilder::new();
        let a = add(&mut builder, &registry, "a", "int.add")?;

        let result = builder.link(a.output(0), a.input(1));
        assert!(matches!(result, Err(NodalError::CycleDetected(id)) if id == a));
        Ok(())
    }

    #[test]
    fn duplicate_node_name_rejected() -> Result<(), NodalError> {
        let registry = registry();
        let mut builder = GraphBuilder::new();
        add(&mut builder, &registry, "a", "value.int")?;
        let result = add(&mut builder, &registry, "a", "value.int");
        assert!(matches!(result, Err(NodalError::DuplicateNodeName(_))));
        Ok(())
    }

    #[test]
    fn reroute_chain_is_transparent() -> Result<(), NodalError> {
        let registry = registry();
        let mut builder = GraphBuilder::new();
        let a = add(&mut builder, &registry, "a", "value.float")?;
        let r1 = add(&mut builder, &registry, "r1", "reroute.float")?;
        let r2 = add(&mut builder, &registry, "r2", "reroute.float")?;
        let sink = add(&mut builder, &registry, "sink", "output.float")?;

        builder.link(a.output(0), r1.input(0))?;
        builder.link(r1.output(0), r2.input(0))?;
        builder.link(r2.output(0), sink.input(0))?;
        let graph = builder.build()?;

        assert_eq!(graph.origins(sink.input(0)), &[Origin::Output(a.output(0))]);
        assert_eq!(graph.targets(a.output(0)), &[sink.input(0)]);
        Ok(())
    }

    #[test]
    fn unlinked_reroute_resolves_to_its_input() -> Result<(), NodalError> {
        let registry = registry();
        let mut builder = GraphBuilder::new();
        let r = add(&mut builder, &registry, "r", "reroute.int")?;
        let sink = add(&mut builder, &registry, "sink", "output.int")?;
        builder.link(r.output(0), sink.input(0))?;
        builder.set_input_value(r.input(0), Value::Int(9))?;
        let graph = builder.build()?;

        assert_eq!(graph.origins(sink.input(0)), &[Origin::Unlinked(r.input(0))]);
        let default = graph.origin_default(Origin::Unlinked(r.input(0)), &BuiltinTypes);
        assert_eq!(default, Some(Value::Int(9)));
        Ok(())
    }

    #[test]
    fn muted_node_passes_matching_type() -> Result<(), NodalError> {
        let registry = registry();
        let mut builder = GraphBuilder::new();
        let a = add(&mut builder, &registry, "a", "value.float")?;
        let add_node = add(&mut builder, &registry, "add", "math.add")?;
        let sink = add(&mut builder, &registry, "sink", "output.float")?;
        builder.link(a.output(0), add_node.input(0))?;
        builder.link(add_node.output(0), sink.input(0))?;
        builder.set_muted(add_node, true)?;
        let graph = builder.build()?;

        assert_eq!(graph.origins(sink.input(0)), &[Origin::Output(a.output(0))]);
        assert_eq!(graph.targets(a.output(0)), &[sink.input(0)]);
        Ok(())
    }

    #[test]
    fn muted_node_without_matching_input_yields_default() -> Result<(), NodalError> {
        let registry = registry();
        let mut builder = GraphBuilder::new();
        let cmp = add(&mut builder, &registry, "cmp", "logic.compare")?;
        let sink = add(&mut builder, &registry, "sink", "output.bool")?;
        builder.link(cmp.output(0), sink.input(0))?;
        builder.set_muted(cmp, true)?;
        let graph = builder.build()?;

        assert_eq!(
            graph.origins(sink.input(0)),
            &[Origin::MutedOutput(cmp.output(0))]
        );
        let default = graph.origin_default(Origin::MutedOutput(cmp.output(0)), &BuiltinTypes);
        assert_eq!(default, Some(Value::Bool(false)));
        Ok(())
    }

    #[test]
    fn multi_input_origins_follow_link_order() -> Result<(), NodalError> {
        let registry = registry();
        let mut builder = GraphBuilder::new();
        let a = add(&mut builder, &registry, "a", "value.float")?;
        let b = add(&mut builder, &registry, "b", "value.float")?;
        let sum = add(&mut builder, &registry, "sum", "math.sum")?;
        builder.link(b.output(0), sum.input(0))?;
        builder.link(a.output(0), sum.input(0))?;
        builder.link(b.output(0), sum.input(0))?;
        let graph = builder.build()?;

        assert_eq!(
            graph.origins(sum.input(0)),
            &[
                Origin::Output(b.output(0)),
                Origin::Output(a.output(0)),
                Origin::Output(b.output(0)),
            ]
        );
        assert_eq!(graph.targets(b.output(0)), &[sum.input(0), sum.input(0)]);
        Ok(())
    }

    #[test]
    fn input_default_converts_instance_value() -> Result<(), NodalError> {
        let registry = registry();
        let mut builder = GraphBuilder::new();
        let sink = add(&mut builder, &registry, "sink", "output.float")?;
        builder.set_input_value(sink.input(0), Value::Int(4))?;
        let graph = builder.build()?;

        let node = graph.node(sink).ok_or(NodalError::NodeNotFound(sink))?;
        assert_eq!(node.input_default(0, &BuiltinTypes), Some(Value::Float(4.0)));
        assert_eq!(
            graph.input_decl(sink.input(0)).map(|d| d.data_type.clone()),
            Some(DataType::Float)
        );
        Ok(())
    }

    #[test]
    fn socket_names_resolve() -> Result<(), NodalError> {
        let registry = registry();
        let mut builder = GraphBuilder::new();
        let split = add(&mut builder, &registry, "split", "int.divmod")?;
        let graph = builder.build()?;

        assert_eq!(graph.output_by_name("split", "remainder")?, split.output(1));
        assert!(matches!(
            graph.input_by_name("split", "nope"),
            Err(NodalError::SocketNameNotFound { .. })
        ));
        assert!(matches!(
            graph.input_by_name("ghost", "a"),
            Err(NodalError::NodeNameNotFound(_))
        ));
        Ok(())
    }
}
