//! Collector configuration
//!
//! All settings are fixed when the [`Vm`](crate::Vm) is built.

use thiserror::Error;

/// Default root stack capacity
pub const DEFAULT_STACK_CAPACITY: usize = 256;

/// Default live count that triggers the first collection
pub const DEFAULT_THRESHOLD: usize = 256;

/// Invalid configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("stack capacity must be at least 1")]
    ZeroStackCapacity,
    #[error("heap limit must be at least 1")]
    ZeroHeapLimit,
}

/// VM configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum root stack depth
    pub stack_capacity: usize,
    /// Live count at which the first automatic collection runs
    pub initial_threshold: usize,
    /// Maximum number of live cells, `None` for unbounded
    pub heap_limit: Option<usize>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            stack_capacity: DEFAULT_STACK_CAPACITY,
            initial_threshold: DEFAULT_THRESHOLD,
            heap_limit: None,
        }
    }
}

impl VmConfig {
    pub fn with_stack_capacity(mut self, capacity: usize) -> Self {
        self.stack_capacity = capacity;
        self
    }

    pub fn with_initial_threshold(mut self, threshold: usize) -> Self {
        self.initial_threshold = threshold;
        self
    }

    pub fn with_heap_limit(mut self, limit: Option<usize>) -> Self {
        self.heap_limit = limit;
        self
    }

    /// Check the configuration for values the VM cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_capacity == 0 {
            return Err(ConfigError::ZeroStackCapacity);
        }
        if self.heap_limit == Some(0) {
            return Err(ConfigError::ZeroHeapLimit);
        }
        Ok(())
    }
}
