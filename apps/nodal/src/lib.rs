//! # Nodal Application Library
//!
//! Graph-file loading and CLI commands, shared by the `nodal` binary and its
//! integration tests.

pub mod cli;
pub mod graph_file;

pub use graph_file::{GraphFile, LoadedGraph, load_config};
