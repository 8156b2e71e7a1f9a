//! # CLI Command Implementations
//!
//! Each command returns a serializable report; printing is separate so the
//! reports can be checked by tests.

use crate::graph_file::GraphFile;
use nodal_core::builtin::{BuiltinTypes, DataType, Value, builtin_registry};
use nodal_core::{
    EvalStats, Evaluator, EvaluatorConfig, NodalError, SocketDecl, SocketObserver, ValueLog,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

// =============================================================================
// REPORTS
// =============================================================================

/// A value at a named socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocketValue {
    pub socket: String,
    pub value: Value,
}

/// Result of `nodal run`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub values: Vec<SocketValue>,
    /// Every observed value, when `--trace-values` is set.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<SocketValue>,
    pub stats: EvalStats,
    pub threads: usize,
}

/// Result of `nodal check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub nodes: usize,
    pub links: usize,
    pub outputs: usize,
    pub force: usize,
    pub boundary: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocketInfo {
    pub name: String,
    pub data_type: DataType,
    pub multi_input: bool,
}

impl From<&SocketDecl<BuiltinTypes>> for SocketInfo {
    fn from(decl: &SocketDecl<BuiltinTypes>) -> Self {
        Self {
            name: decl.name.clone(),
            data_type: decl.data_type,
            multi_input: decl.multi_input,
        }
    }
}

/// One entry of `nodal nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeTypeInfo {
    pub name: String,
    pub kind: String,
    pub inputs: Vec<SocketInfo>,
    pub outputs: Vec<SocketInfo>,
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Evaluate the request described by a graph file.
pub fn cmd_run(
    path: &Path,
    config: EvaluatorConfig,
    trace_values: bool,
) -> Result<RunReport, NodalError> {
    let loaded = GraphFile::load(path)?.build(&builtin_registry())?;
    let evaluator = Evaluator::new(config)?;

    let log = Arc::new(ValueLog::<BuiltinTypes>::new());
    let mut request = loaded.request();
    if trace_values {
        let observer: Arc<dyn SocketObserver<BuiltinTypes>> = log.clone();
        request = request.observer(observer);
    }

    let result = evaluator.evaluate(&loaded.graph, &BuiltinTypes, request)?;
    info!(
        graph = %path.display(),
        executions = result.stats.executions,
        reachable = result.stats.reachable_nodes,
        "evaluation complete"
    );

    let values = loaded
        .outputs
        .iter()
        .zip(&result.values)
        .map(|(input, value)| SocketValue {
            socket: loaded.label(*input),
            value: value.clone(),
        })
        .collect();
    let trace = log
        .values()
        .into_iter()
        .map(|(socket, value)| SocketValue {
            socket: loaded.label(socket),
            value,
        })
        .collect();

    Ok(RunReport {
        values,
        trace,
        stats: result.stats,
        threads: evaluator.threads(),
    })
}

pub fn print_run(report: &RunReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
        return;
    }

    for entry in &report.values {
        println!("{} = {}", entry.socket, entry.value);
    }
    if !report.trace.is_empty() {
        println!();
        println!("Observed values:");
        for entry in &report.trace {
            println!("  {} = {}", entry.socket, entry.value);
        }
    }
    println!();
    println!(
        "{} executions on {} of {} reachable nodes ({} threads)",
        report.stats.executions,
        report.stats.executed_nodes,
        report.stats.reachable_nodes,
        report.threads
    );
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Build a graph file and resolve its request without evaluating it.
pub fn cmd_check(path: &Path) -> Result<CheckReport, NodalError> {
    let loaded = GraphFile::load(path)?.build(&builtin_registry())?;
    loaded.request().validate(&loaded.graph, &BuiltinTypes)?;
    Ok(CheckReport {
        nodes: loaded.graph.node_count(),
        links: loaded.graph.link_count(),
        outputs: loaded.outputs.len(),
        force: loaded.force.len(),
        boundary: loaded.boundary.len(),
    })
}

pub fn print_check(report: &CheckReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
        return;
    }

    println!("Graph OK");
    println!("Nodes:    {}", report.nodes);
    println!("Links:    {}", report.links);
    println!("Outputs:  {}", report.outputs);
    println!("Force:    {}", report.force);
    println!("Boundary: {}", report.boundary);
}

// =============================================================================
// NODES COMMAND
// =============================================================================

/// Describe every builtin node type, sorted by name.
pub fn cmd_nodes() -> Vec<NodeTypeInfo> {
    builtin_registry()
        .iter()
        .map(|node_type| NodeTypeInfo {
            name: node_type.name.clone(),
            kind: if node_type.is_reroute() {
                "reroute".to_string()
            } else {
                node_type.behavior.kind().to_string()
            },
            inputs: node_type.inputs.iter().map(SocketInfo::from).collect(),
            outputs: node_type.outputs.iter().map(SocketInfo::from).collect(),
        })
        .collect()
}

pub fn print_nodes(nodes: &[NodeTypeInfo], json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(nodes).unwrap_or_default());
        return;
    }

    for node in nodes {
        println!(
            "{:<16} {:<10} ({}) -> ({})",
            node.name,
            node.kind,
            format_sockets(&node.inputs),
            format_sockets(&node.outputs)
        );
    }
}

fn format_sockets(sockets: &[SocketInfo]) -> String {
    sockets
        .iter()
        .map(|socket| {
            let multi = if socket.multi_input { "*" } else { "" };
            format!("{}: {}{}", socket.name, socket.data_type, multi)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
