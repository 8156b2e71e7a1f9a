//! # Graph Files
//!
//! TOML description of a graph and the request to evaluate on it.
//!
//! ```toml
//! outputs = ["sink.value"]
//! force = ["a.value"]
//!
//! [[nodes]]
//! name = "a"
//! type = "value.int"
//! [nodes.defaults]
//! value = 3
//!
//! [[nodes]]
//! name = "sink"
//! type = "output.int"
//!
//! [[links]]
//! from = "a.value"
//! to = "sink.value"
//!
//! [[boundary]]
//! socket = "a.value"
//! value = 7
//! ```
//!
//! Sockets are addressed as `node.socket`. `outputs` and link targets name
//! input sockets; link sources and boundary sockets name output sockets.
//! A `force` entry names an output when the node has one of that name and an
//! input otherwise.

use nodal_core::builtin::{BuiltinTypes, Value};
use nodal_core::{
    EvaluationRequest, EvaluatorConfig, GraphBuilder, InputRef, NodalError, NodeGraph, NodeId,
    NodeRegistry, NodeType, OutputRef, SocketRef,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// FILE LIMITS
// =============================================================================

/// Maximum size of a graph or configuration file (16 MB).
const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Read a text file after checking its size.
fn read_text(path: &Path) -> Result<String, NodalError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        NodalError::IoError(format!("Cannot read '{}': {}", path.display(), e))
    })?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(NodalError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_FILE_SIZE
        )));
    }
    std::fs::read_to_string(path)
        .map_err(|e| NodalError::IoError(format!("Cannot read '{}': {}", path.display(), e)))
}

// =============================================================================
// FILE FORMAT
// =============================================================================

/// A graph file as written on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphFile {
    /// Requested input sockets, in result order.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Sockets computed only to be observed.
    #[serde(default)]
    pub force: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
    #[serde(default)]
    pub links: Vec<LinkEntry>,
    #[serde(default)]
    pub boundary: Vec<BoundaryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Values of unlinked inputs, keyed by input name.
    #[serde(default)]
    pub defaults: BTreeMap<String, Value>,
    #[serde(default)]
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkEntry {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundaryEntry {
    pub socket: String,
    pub value: Value,
}

impl GraphFile {
    pub fn parse(text: &str) -> Result<Self, NodalError> {
        toml::from_str(text).map_err(|e| NodalError::ParseError(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, NodalError> {
        Self::parse(&read_text(path)?)
    }

    /// Build the graph and resolve every socket name of the request.
    pub fn build(&self, registry: &NodeRegistry<BuiltinTypes>) -> Result<LoadedGraph, NodalError> {
        let mut builder = GraphBuilder::new();
        let mut declared = Declared::new();
        for entry in &self.nodes {
            let node_type = registry.get(&entry.node_type)?;
            let id = builder.add_node(entry.name.as_str(), Arc::clone(&node_type))?;
            for (socket, value) in &entry.defaults {
                let index = node_type
                    .input_index(socket)
                    .ok_or_else(|| socket_not_found(&entry.name, socket))?;
                builder.set_input_value(id.input(index), value.clone())?;
            }
            if entry.muted {
                builder.set_muted(id, true)?;
            }
            declared.insert(entry.name.as_str(), (id, node_type));
        }
        for link in &self.links {
            builder.link(
                link_output(&declared, &link.from)?,
                link_input(&declared, &link.to)?,
            )?;
        }
        let graph = builder.build()?;

        let outputs = self
            .outputs
            .iter()
            .map(|path| resolve_input(&graph, path))
            .collect::<Result<Vec<_>, _>>()?;
        let force = self
            .force
            .iter()
            .map(|path| resolve_force(&graph, path))
            .collect::<Result<Vec<_>, _>>()?;
        let mut boundary: Vec<(OutputRef, Value)> = Vec::with_capacity(self.boundary.len());
        for entry in &self.boundary {
            let output = resolve_output(&graph, &entry.socket)?;
            if boundary.iter().any(|(seen, _)| *seen == output) {
                return Err(NodalError::InvalidRequest(format!(
                    "boundary socket {} is listed more than once",
                    entry.socket
                )));
            }
            boundary.push((output, entry.value.clone()));
        }

        Ok(LoadedGraph {
            graph,
            outputs,
            force,
            boundary,
        })
    }
}

// =============================================================================
// SOCKET NAMES
// =============================================================================

/// Split `node.socket` at the last dot.
fn split_socket(path: &str) -> Result<(&str, &str), NodalError> {
    path.rsplit_once('.')
        .filter(|(node, socket)| !node.is_empty() && !socket.is_empty())
        .ok_or_else(|| NodalError::ParseError(format!("expected 'node.socket', got '{path}'")))
}

fn resolve_input(graph: &NodeGraph<BuiltinTypes>, path: &str) -> Result<InputRef, NodalError> {
    let (node, socket) = split_socket(path)?;
    graph.input_by_name(node, socket)
}

fn resolve_output(graph: &NodeGraph<BuiltinTypes>, path: &str) -> Result<OutputRef, NodalError> {
    let (node, socket) = split_socket(path)?;
    graph.output_by_name(node, socket)
}

fn resolve_force(graph: &NodeGraph<BuiltinTypes>, path: &str) -> Result<SocketRef, NodalError> {
    let (node, socket) = split_socket(path)?;
    match graph.output_by_name(node, socket) {
        Ok(output) => Ok(output.into()),
        Err(NodalError::SocketNameNotFound { .. }) => Ok(graph.input_by_name(node, socket)?.into()),
        Err(other) => Err(other),
    }
}

/// Node types by name, for resolving links before the graph is frozen.
type Declared<'f> = BTreeMap<&'f str, (NodeId, Arc<NodeType<BuiltinTypes>>)>;

fn declared_node<'d>(
    declared: &'d Declared<'_>,
    node: &str,
) -> Result<&'d (NodeId, Arc<NodeType<BuiltinTypes>>), NodalError> {
    declared
        .get(node)
        .ok_or_else(|| NodalError::NodeNameNotFound(node.to_string()))
}

fn link_output(declared: &Declared<'_>, path: &str) -> Result<OutputRef, NodalError> {
    let (node, socket) = split_socket(path)?;
    let (id, node_type) = declared_node(declared, node)?;
    node_type
        .output_index(socket)
        .map(|index| id.output(index))
        .ok_or_else(|| socket_not_found(node, socket))
}

fn link_input(declared: &Declared<'_>, path: &str) -> Result<InputRef, NodalError> {
    let (node, socket) = split_socket(path)?;
    let (id, node_type) = declared_node(declared, node)?;
    node_type
        .input_index(socket)
        .map(|index| id.input(index))
        .ok_or_else(|| socket_not_found(node, socket))
}

fn socket_not_found(node: &str, socket: &str) -> NodalError {
    NodalError::SocketNameNotFound {
        node: node.to_string(),
        socket: socket.to_string(),
    }
}

// =============================================================================
// LOADED GRAPH
// =============================================================================

/// A built graph with its request resolved to socket references.
#[derive(Debug)]
pub struct LoadedGraph {
    pub graph: NodeGraph<BuiltinTypes>,
    pub outputs: Vec<InputRef>,
    pub force: Vec<SocketRef>,
    pub boundary: Vec<(OutputRef, Value)>,
}

impl LoadedGraph {
    /// The evaluation request described by the file.
    #[must_use]
    pub fn request(&self) -> EvaluationRequest<BuiltinTypes> {
        let mut request = EvaluationRequest::new().outputs(self.outputs.iter().copied());
        for socket in &self.force {
            request = request.force(*socket);
        }
        for (output, value) in &self.boundary {
            request = request.boundary(*output, value.clone());
        }
        request
    }

    /// `node.socket` label of a socket, as written in graph files.
    #[must_use]
    pub fn label(&self, socket: impl Into<SocketRef>) -> String {
        let socket = socket.into();
        let Some(node) = self.graph.node(socket.node()) else {
            return socket.to_string();
        };
        let decl = match socket {
            SocketRef::Input(input) => node.input_decl(input.index),
            SocketRef::Output(output) => node.output_decl(output.index),
        };
        match decl {
            Some(decl) => format!("{}.{}", node.name(), decl.name),
            None => socket.to_string(),
        }
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Load the evaluator configuration, or the default when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<EvaluatorConfig, NodalError> {
    let Some(path) = path else {
        return Ok(EvaluatorConfig::default());
    };
    let config: EvaluatorConfig =
        toml::from_str(&read_text(path)?).map_err(|e| NodalError::InvalidConfig(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_uses_last_dot() -> Result<(), NodalError> {
        assert_eq!(split_socket("math.add.result")?, ("math.add", "result"));
        assert!(split_socket("nodot").is_err());
        assert!(split_socket("trailing.").is_err());
        Ok(())
    }

    #[test]
    fn missing_sections_default_to_empty() -> Result<(), NodalError> {
        let file = GraphFile::parse("outputs = []")?;
        assert!(file.nodes.is_empty());
        assert!(file.links.is_empty());
        assert!(file.boundary.is_empty());
        Ok(())
    }
}
