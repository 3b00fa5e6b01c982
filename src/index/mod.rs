//! Search-index engine client
//!
//! The engine exposes one HTTP core per record type. Batches are pushed
//! as XML update commands followed by a commit; queries are plain GET
//! requests against a core's `select` handler.

pub mod query;
pub mod wire;

use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::models::{Record, RecordType};
use query::{QueryInput, QueryResult};

/// Errors from the index engine
#[derive(Error, Debug)]
pub enum IndexError {
    /// HTTP transport error
    #[error("Index request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Engine rejected the request
    #[error("Index engine error (status {status}): {body}")]
    Engine { status: u16, body: String },

    /// Response could not be parsed
    #[error("Malformed index response: {0}")]
    MalformedResponse(String),

    /// No core is mapped for a record type
    #[error("No index core mapped for record type: {0}")]
    UnmappedCore(String),
}

impl IndexError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Engine { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::MalformedResponse(_) | Self::UnmappedCore(_) => false,
        }
    }
}

/// HTTP client for one index engine endpoint
#[derive(Clone)]
pub struct IndexClient {
    client: Client,

    /// Engine base URL, e.g. `http://localhost:8983/solr`
    base_url: String,

    /// Record type → core name
    cores: HashMap<String, String>,
}

impl IndexClient {
    /// Create a client from index configuration
    pub fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            cores: config.cores.clone(),
        })
    }

    /// Client against an explicit base URL (mock servers in tests)
    pub fn with_base_url(config: &IndexConfig, base_url: &str) -> Result<Self, IndexError> {
        let mut client = Self::new(config)?;
        client.base_url = base_url.trim_end_matches('/').to_string();
        Ok(client)
    }

    /// Core name for a record type; unmapped types are a configuration
    /// error for the operation, never a silent no-op
    fn core_for(&self, record_type: RecordType) -> Result<&str, IndexError> {
        self.cores
            .get(record_type.as_str())
            .map(String::as_str)
            .ok_or_else(|| IndexError::UnmappedCore(record_type.to_string()))
    }

    /// Send one update command to a core, without committing
    async fn update(&self, core: &str, body: String) -> Result<(), IndexError> {
        let url = format!("{}/{core}/update", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "text/xml")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexError::Engine {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }

    /// Push a record batch and commit.
    ///
    /// The batch is grouped by record type (one core each) and each core
    /// receives its records as a single `<add>` command, so the engine
    /// never observes a partial batch for one core.
    pub async fn push_batch(&self, records: &[Record]) -> Result<(), IndexError> {
        let mut by_core: HashMap<&str, Vec<Record>> = HashMap::new();
        for record in records {
            let core = self.core_for(record.record_type)?;
            by_core.entry(core).or_default().push(record.clone());
        }

        for (core, group) in by_core {
            debug!(core, records = group.len(), "Pushing record batch");
            self.update(core, wire::serialize_add(&group)).await?;
            self.update(core, wire::COMMIT.to_string()).await?;
        }

        info!(records = records.len(), "Record batch indexed");
        Ok(())
    }

    /// Delete records by id (with cascade to children) and commit
    pub async fn delete(&self, record_type: RecordType, ids: &[String]) -> Result<(), IndexError> {
        if ids.is_empty() {
            return Ok(());
        }

        let core = self.core_for(record_type)?.to_string();
        self.update(&core, wire::serialize_delete(ids)).await?;
        self.update(&core, wire::COMMIT.to_string()).await?;

        info!(core, ids = ids.len(), "Records deleted");
        Ok(())
    }

    /// Ask the engine to optimize a core's storage
    pub async fn optimize(&self, record_type: RecordType) -> Result<(), IndexError> {
        let core = self.core_for(record_type)?.to_string();
        self.update(&core, wire::OPTIMIZE.to_string()).await
    }

    /// Execute a query against a core
    pub async fn search(
        &self,
        record_type: RecordType,
        input: &QueryInput,
    ) -> Result<QueryResult, IndexError> {
        let core = self.core_for(record_type)?;
        let url = format!("{}/{core}/select", self.base_url);

        let response = self.client.get(&url).query(&input.to_params()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexError::Engine {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        let mut result = wire::parse_response(&body)?;
        result.synthesize_constrained_facets(input);
        Ok(result)
    }

    /// Already-indexed records sharing a master id and flagged latest.
    ///
    /// This is the transient `DatasetVersionSet` the reconciliation step
    /// works from.
    pub async fn latest_editions(&self, master_id: &str) -> Result<Vec<Record>, IndexError> {
        let input = QueryInput::default()
            .constrain("master_id", master_id)
            .constrain("latest", "true")
            .paginate(0, 100);

        let result = self.search(RecordType::Dataset, &input).await?;
        Ok(result.records)
    }

    /// Fetch records by exact id
    pub async fn records_by_ids(
        &self,
        record_type: RecordType,
        ids: &[String],
    ) -> Result<Vec<Record>, IndexError> {
        let mut records = Vec::new();
        for id in ids {
            let input = QueryInput::default().constrain("id", id).paginate(0, 1);
            let result = self.search(record_type, &input).await?;
            records.extend(result.records);
        }
        Ok(records)
    }
}
