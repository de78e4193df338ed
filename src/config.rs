use crate::core::{Result, ScopeError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scope store configuration
///
/// Every subsystem can be switched off: a zero `ttl` disables purging and a
/// zero `capacity` disables eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Inactivity after which a scope is retired by the purge sweep
    pub ttl: Duration,

    /// Minimum spacing between two purge sweeps
    pub purge_interval: Duration,

    /// Maximum number of live scopes
    pub capacity: usize,
}

impl ScopeConfig {
    /// Create a configuration with the defaults
    pub fn new() -> Self {
        Self {
            ttl: Duration::from_secs(600), // 10 minutes
            purge_interval: Duration::from_secs(300), // 5 minutes
            capacity: 10_000,
        }
    }

    /// Set the inactivity TTL
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the purge interval
    pub fn purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = interval;
        self
    }

    /// Set the live scope bound
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Disable TTL purging
    pub fn without_purge(mut self) -> Self {
        self.ttl = Duration::ZERO;
        self
    }

    /// Disable capacity eviction
    pub fn unbounded(mut self) -> Self {
        self.capacity = 0;
        self
    }

    pub fn purge_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn eviction_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.purge_enabled() && self.purge_interval.is_zero() {
            return Err(ScopeError::InvalidConfig(
                "purge_interval must be > 0 while ttl is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self::new()
    }
}
