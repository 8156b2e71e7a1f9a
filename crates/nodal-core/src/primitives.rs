//! # Engine Primitives
//!
//! Fixed runtime constants for the evaluator.
//!
//! These values are compiled into the binary. Anything a caller may want to
//! tune lives in `EvaluatorConfig` instead; the constants here are the
//! defaults and the hard limits that configuration is validated against.

/// Prefix for worker thread names when the configuration does not set one.
///
/// Worker `i` is named `"{prefix}-{i}"`.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "nodal-worker";

/// Upper bound on the number of worker threads a configuration may request.
///
/// A request above this is almost certainly a typo and is rejected by
/// `EvaluatorConfig::validate`.
pub const MAX_WORKER_THREADS: usize = 1024;

/// Smallest stack size (in bytes) accepted for worker threads.
///
/// Node logic runs on worker stacks; anything below this leaves too little
/// room for the scheduler's own frames.
pub const MIN_STACK_SIZE: usize = 64 * 1024;
