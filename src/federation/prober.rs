//! Concurrent shard health probing
//!
//! Each probe issues a zero-row query against a shard's select handler
//! and considers the shard healthy when a result count comes back within
//! the probe timeout. All shards are probed concurrently and every probe
//! runs to completion; a dead shard never delays the verdict on the rest
//! beyond the timeout.

use futures::future::join_all;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::FederationConfig;
use crate::index::wire;
use crate::index::IndexError;
use crate::models::Shard;

/// Probes shard select handlers for liveness
#[derive(Clone)]
pub struct ShardProber {
    client: Client,
    probe_timeout: Duration,
}

impl ShardProber {
    pub fn new(config: &FederationConfig) -> Result<Self, IndexError> {
        let probe_timeout = config.probe_timeout();
        let client = Client::builder()
            .connect_timeout(probe_timeout)
            .timeout(probe_timeout)
            .build()?;
        Ok(Self {
            client,
            probe_timeout,
        })
    }

    #[cfg(test)]
    pub fn with_timeout(probe_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            probe_timeout,
        }
    }

    /// Probe every shard concurrently and return the updated set.
    ///
    /// Input order is preserved. An empty input yields an empty result.
    pub async fn probe_all(&self, shards: Vec<Shard>) -> Vec<Shard> {
        join_all(shards.into_iter().map(|shard| self.probe_one(shard))).await
    }

    async fn probe_one(&self, mut shard: Shard) -> Shard {
        let started = Instant::now();

        match timeout(self.probe_timeout, self.query_count(&shard.host_address)).await {
            Ok(Ok(count)) => {
                shard.is_healthy = true;
                shard.last_known_result_count = Some(count);
                shard.last_probe_latency = Some(started.elapsed());
                debug!(shard = %shard.host_address, count, "Shard probe succeeded");
            }
            Ok(Err(e)) => {
                shard.is_healthy = false;
                warn!(shard = %shard.host_address, error = %e, "Shard probe failed");
            }
            Err(_) => {
                shard.is_healthy = false;
                warn!(
                    shard = %shard.host_address,
                    timeout_secs = self.probe_timeout.as_secs(),
                    "Shard probe timed out"
                );
            }
        }

        shard
    }

    /// Total result count reported by a shard for the match-all query
    async fn query_count(&self, host_address: &str) -> Result<u64, IndexError> {
        let url = format!("http://{host_address}/select");
        let response = self
            .client
            .get(&url)
            .query(&[("q", "*:*"), ("rows", "0")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexError::Engine {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        let result = wire::parse_response(&body)?;
        Ok(result.num_found)
    }
}
