use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a tracked execution scope.
///
/// Ids are handed out by the lifecycle adapter and are never reused while the
/// scope they name is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub u64);

impl ScopeId {
    /// The scope reported by adapters when no unit of work is active.
    pub const ROOT: ScopeId = ScopeId(0);

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ScopeId {
    fn from(raw: u64) -> Self {
        ScopeId(raw)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope_{}", self.0)
    }
}

/// Live node count against the configured bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeProfile {
    pub live_count: usize,
    /// `0` means eviction is disabled.
    pub capacity: usize,
}

/// Cumulative counters kept by a [`crate::ScopeStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeStats {
    pub created: u64,
    pub destroyed: u64,
    pub evicted: u64,
    pub orphaned: u64,
    pub purged: u64,
    pub sweeps: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_id_display() {
        assert_eq!(ScopeId(42).to_string(), "scope_42");
        assert_eq!(ScopeId::from(7).as_u64(), 7);
    }

    #[test]
    fn test_scope_id_serializes_as_number() {
        let json = serde_json::to_string(&ScopeId(9)).unwrap();
        assert_eq!(json, "9");
        let back: ScopeId = serde_json::from_str("12").unwrap();
        assert_eq!(back, ScopeId(12));
    }
}
