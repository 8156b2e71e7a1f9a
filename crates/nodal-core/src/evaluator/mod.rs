//! # Lazy Concurrent Evaluator
//!
//! Executes a [`NodeGraph`] to produce the values arriving at a requested set
//! of input sockets, doing no more work than those values need.
//!
//! ## Phases of a Run
//!
//! 1. **Reachability**: walk links backward from the requested and forced
//!    sockets and allocate state for every node found.
//! 2. **Seeding**: forward boundary values, then mark the requested sockets
//!    required. Demand travels upstream as "output required" notifications.
//! 3. **Scheduling**: a node whose required inputs are all present is queued
//!    on the worker pool. Its logic runs without any lock held; the values
//!    it produces are pushed downstream, which may queue consumers.
//! 4. **Teardown**: once the pool is idle the requested values are moved out
//!    and all remaining state is dropped.
//!
//! ## Locking
//!
//! Every node has its own mutex. A thread holds at most one of them at a
//! time; requests aimed at other nodes are deferred until it lets go (see
//! `locked`). No operation waits for another node, so the pool cannot
//! deadlock.

mod demand;
mod execute;
mod forward;
mod locked;
mod params;
mod reachability;
mod run;
mod schedule;
mod state;

pub use params::{ExecParams, LazyParams};

use crate::config::EvaluatorConfig;
use crate::graph::NodeGraph;
use crate::request::{EvaluationRequest, EvaluationResult};
use crate::types::{NodalError, SocketRef};
use crate::value::TypeSystem;
use locked::{RunContext, TaskContext};
use reachability::{Seeds, build_state_table};
use run::EvalRun;
use schedule::ScopeSink;
use std::fmt;
use std::time::Instant;
use tracing::{debug, debug_span};

/// Owns the worker pool and evaluates graphs on it.
///
/// An evaluator holds no per-run state and can be shared between callers;
/// concurrent `evaluate` calls share the pool.
pub struct Evaluator {
    config: EvaluatorConfig,
    pool: rayon::ThreadPool,
}

impl Evaluator {
    /// Create an evaluator with its own worker pool.
    pub fn new(config: EvaluatorConfig) -> Result<Self, NodalError> {
        let pool = config.build_pool()?;
        debug!(threads = pool.current_num_threads(), "evaluator pool ready");
        Ok(Self { config, pool })
    }

    #[must_use]
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Number of worker threads in the pool.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Evaluate `graph` for `request`.
    ///
    /// The result holds one value per requested socket, in request order.
    /// Every value has the socket's declared type.
    pub fn evaluate<T: TypeSystem>(
        &self,
        graph: &NodeGraph<T>,
        types: &T,
        request: EvaluationRequest<T>,
    ) -> Result<EvaluationResult<T::Value>, NodalError> {
        request.validate(graph, types)?;
        let span = debug_span!(
            "evaluate",
            nodes = graph.node_count(),
            requested = request.outputs.len()
        );
        let _enter = span.enter();
        let started = Instant::now();

        let EvaluationRequest {
            boundary,
            outputs,
            force,
            observer,
        } = request;

        let boundary_sockets: Vec<_> = boundary.iter().map(|(output, _)| *output).collect();
        let seeds = Seeds {
            roots: outputs
                .iter()
                .map(|input| input.node)
                .chain(force.iter().map(|socket: &SocketRef| socket.node()))
                .collect(),
            boundary: &boundary_sockets,
            pinned: &outputs,
        };
        let states = build_state_table(graph, types, &seeds, &self.pool);

        let run = EvalRun::new(
            RunContext {
                graph,
                types,
                observer: observer.as_deref(),
            },
            states,
        );

        self.pool.scope(|scope| {
            let sink = ScopeSink { run: &run, scope };
            let mut tasks = TaskContext::new(&sink);
            run.seed(boundary, &outputs, &force, &mut tasks);
            run.drain(&mut tasks);
        });

        let (values, stats) = run.finish(&outputs);
        debug!(
            reachable = stats.reachable_nodes,
            executions = stats.executions,
            elapsed_us = started.elapsed().as_micros() as u64,
            "evaluation finished"
        );
        Ok(EvaluationResult { values, stats })
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("config", &self.config)
            .field("threads", &self.threads())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
