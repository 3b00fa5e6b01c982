//! Degrading federated query execution
//!
//! A federated query is one distributed request through the local index
//! engine carrying the shard set as a parameter. Failure triggers a
//! three-step degradation: retry against the probed healthy subset, then
//! fall back to the local index alone. Each step runs at most once; when
//! every step fails the last error is surfaced.

use std::sync::Arc;
use tracing::{info, warn};

use super::{FederationError, ShardProber, ShardRegistry};
use crate::index::query::{QueryInput, QueryResult};
use crate::index::IndexClient;
use crate::models::RecordType;

/// Federated search front door
pub struct SearchService {
    index: IndexClient,
    registry: Arc<ShardRegistry>,
    prober: ShardProber,
}

impl SearchService {
    pub fn new(index: IndexClient, registry: Arc<ShardRegistry>, prober: ShardProber) -> Self {
        Self {
            index,
            registry,
            prober,
        }
    }

    pub fn registry(&self) -> &Arc<ShardRegistry> {
        &self.registry
    }

    /// Execute a query across the federation, degrading on failure.
    ///
    /// Step 1 queries the full registered shard set. Step 2 probes the
    /// shards and retries against the healthy subset. Step 3 queries the
    /// local index alone. The first success wins; when every step fails
    /// the last error is returned.
    pub async fn search(
        &self,
        record_type: RecordType,
        input: QueryInput,
    ) -> Result<QueryResult, FederationError> {
        let all = self.registry.all_addresses().await;
        if all.is_empty() {
            return Ok(self.index.search(record_type, &input).await?);
        }

        let mut attempts = 1;
        let full = input.clone().with_shards(all.clone());
        match self.index.search(record_type, &full).await {
            Ok(result) => return Ok(result),
            Err(e) => warn!(
                shards = all.len(),
                error = %e,
                "Distributed query failed, probing shards"
            ),
        }

        let probed = self.prober.probe_all(self.registry.snapshot().await).await;
        self.registry.update(probed).await;
        let healthy = self.registry.healthy_addresses().await;

        if !healthy.is_empty() && healthy.len() < all.len() {
            info!(
                healthy = healthy.len(),
                total = all.len(),
                "Retrying against healthy shard subset"
            );
            attempts += 1;
            let pruned = input.clone().with_shards(healthy);
            match self.index.search(record_type, &pruned).await {
                Ok(result) => return Ok(result),
                Err(e) => warn!(error = %e, "Pruned distributed query failed"),
            }
        } else {
            warn!(
                healthy = healthy.len(),
                total = all.len(),
                "No usable shard subset, falling back to local index"
            );
        }

        attempts += 1;
        match self.index.search(record_type, &input).await {
            Ok(result) => Ok(result),
            Err(e) => Err(FederationError::Exhausted {
                attempts,
                source: e,
            }),
        }
    }
}
