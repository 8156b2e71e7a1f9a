//! # Evaluator Configuration
//!
//! Settings for the worker pool backing an [`Evaluator`](crate::Evaluator).
//! Serializable so applications can keep them in a TOML file:
//!
//! ```toml
//! threads = 4
//! thread_name_prefix = "nodal-worker"
//! stack_size = 8388608
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use crate::primitives::{DEFAULT_THREAD_NAME_PREFIX, MAX_WORKER_THREADS, MIN_STACK_SIZE};
use crate::types::NodalError;
use serde::{Deserialize, Serialize};

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluatorConfig {
    /// Number of worker threads. `0` lets rayon pick (one per CPU).
    pub threads: usize,
    /// Worker `i` is named `"{thread_name_prefix}-{i}"`.
    pub thread_name_prefix: String,
    /// Stack size of each worker in bytes. `None` keeps rayon's default.
    pub stack_size: Option<usize>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            stack_size: None,
        }
    }
}

impl EvaluatorConfig {
    /// Default configuration with a fixed number of workers.
    #[must_use]
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }

    /// Reject settings the pool cannot honour.
    pub fn validate(&self) -> Result<(), NodalError> {
        if self.threads > MAX_WORKER_THREADS {
            return Err(NodalError::InvalidConfig(format!(
                "threads = {} exceeds the maximum of {}",
                self.threads, MAX_WORKER_THREADS
            )));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(NodalError::InvalidConfig(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        if let Some(stack_size) = self.stack_size {
            if stack_size < MIN_STACK_SIZE {
                return Err(NodalError::InvalidConfig(format!(
                    "stack_size = {stack_size} is below the minimum of {MIN_STACK_SIZE}"
                )));
            }
        }
        Ok(())
    }

    /// Build the rayon pool described by this configuration.
    pub(crate) fn build_pool(&self) -> Result<rayon::ThreadPool, NodalError> {
        self.validate()?;
        let prefix = self.thread_name_prefix.clone();
        let mut builder = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(move |index| format!("{prefix}-{index}"));
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        builder
            .build()
            .map_err(|e| NodalError::ThreadPool(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EvaluatorConfig::default().validate().is_ok());
    }

    #[test]
    fn too_many_threads_rejected() {
        let config = EvaluatorConfig::with_threads(MAX_WORKER_THREADS + 1);
        assert!(matches!(config.validate(), Err(NodalError::InvalidConfig(_))));
    }

    #[test]
    fn tiny_stack_rejected() {
        let config = EvaluatorConfig {
            stack_size: Some(1024),
            ..EvaluatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(NodalError::InvalidConfig(_))));
    }

    #[test]
    fn empty_prefix_rejected() {
        let config = EvaluatorConfig {
            thread_name_prefix: "  ".to_string(),
            ..EvaluatorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn pool_uses_configured_thread_count() -> Result<(), NodalError> {
        let pool = EvaluatorConfig::with_threads(3).build_pool()?;
        assert_eq!(pool.current_num_threads(), 3);
        Ok(())
    }
}
