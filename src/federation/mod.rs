//! Federated search across cooperating index shards
//!
//! A node holds a registry of peer shard addresses. Queries fan out to
//! the full shard set through the local index engine's distributed
//! request support; when that fails the search degrades to the probed
//! healthy subset and finally to the local index alone.

pub mod federator;
pub mod prober;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::index::IndexError;
use crate::models::Shard;
pub use federator::SearchService;
pub use prober::ShardProber;

/// Errors from federated query execution
#[derive(Error, Debug)]
pub enum FederationError {
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Federated query failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: usize,
        #[source]
        source: IndexError,
    },
}

impl FederationError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Index(e) => e.is_recoverable(),
            Self::Exhausted { source, .. } => source.is_recoverable(),
        }
    }
}

/// Shared registry of peer shards.
///
/// Probing rewrites the whole set in one exclusive pass; readers take a
/// point-in-time snapshot and never observe a half-updated set.
pub struct ShardRegistry {
    shards: RwLock<Vec<Shard>>,
}

impl ShardRegistry {
    /// Registry seeded from configured shard addresses, all unprobed
    pub fn new(addresses: &[String]) -> Self {
        let shards = addresses
            .iter()
            .map(|addr| Shard::new(addr.as_str()))
            .collect();
        Self {
            shards: RwLock::new(shards),
        }
    }

    /// Snapshot of every registered shard
    pub async fn snapshot(&self) -> Vec<Shard> {
        self.shards.read().await.clone()
    }

    /// Addresses of every registered shard
    pub async fn all_addresses(&self) -> Vec<String> {
        self.shards
            .read()
            .await
            .iter()
            .map(|s| s.host_address.clone())
            .collect()
    }

    /// Addresses of shards marked healthy by the last probe
    pub async fn healthy_addresses(&self) -> Vec<String> {
        self.shards
            .read()
            .await
            .iter()
            .filter(|s| s.is_healthy)
            .map(|s| s.host_address.clone())
            .collect()
    }

    /// Replace the registered set with probe results
    pub async fn update(&self, probed: Vec<Shard>) {
        *self.shards.write().await = probed;
    }

    pub async fn len(&self) -> usize {
        self.shards.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shards.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_snapshot_isolation() {
        let registry = ShardRegistry::new(&[
            "esgf-a.example.org:8983/solr".to_string(),
            "esgf-b.example.org:8983/solr".to_string(),
        ]);

        let before = registry.snapshot().await;
        assert_eq!(before.len(), 2);
        assert!(before.iter().all(|s| !s.is_healthy));
        assert_eq!(registry.all_addresses().await.len(), 2);

        let mut probed = before.clone();
        probed[0].is_healthy = true;
        registry.update(probed).await;

        // earlier snapshot is unaffected
        assert!(!before[0].is_healthy);
        assert_eq!(registry.healthy_addresses().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let registry = ShardRegistry::new(&[]);
        assert!(registry.is_empty().await);
        assert!(registry.healthy_addresses().await.is_empty());
    }
}
