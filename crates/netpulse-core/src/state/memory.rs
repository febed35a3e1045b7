// # Memory ISP State Store
//
// In-memory implementation of IspStateStore.
//
// ## Crash Behavior
//
// - State is lost on restart
// - The first cycle after a restart is a cold start and cannot report a change
//
// ## When to Use
//
// - Testing
// - Daemon-mode deployments that accept missing one change across restarts

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::{IspStateStore, PersistedIspState};

/// In-memory ISP state store
///
/// Clones share the same state, so a test can keep a handle and inspect what
/// the detector saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryIspStateStore {
    inner: Arc<RwLock<PersistedIspState>>,
}

impl MemoryIspStateStore {
    /// Create an empty (cold-start) store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with a prior observation
    pub fn with_state(state: PersistedIspState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Current state
    pub async fn snapshot(&self) -> PersistedIspState {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl IspStateStore for MemoryIspStateStore {
    async fn load(&self) -> Result<PersistedIspState, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, state: &PersistedIspState) -> Result<(), Error> {
        *self.inner.write().await = state.clone();
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_cold() {
        let store = MemoryIspStateStore::new();
        assert!(!store.load().await.unwrap().has_baseline());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryIspStateStore::new();
        let handle = store.clone();

        let state = PersistedIspState {
            ip: Some("1.2.3.4".to_string()),
            ..Default::default()
        };
        store.save(&state).await.unwrap();

        assert_eq!(handle.snapshot().await, state);
    }
}
