// Core data structures for the stratus harvester

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Controlled set of record kinds known to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Dataset,
    File,
    Aggregation,
}

impl RecordType {
    /// Stable string form used in wire fields and core mapping keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dataset => "Dataset",
            Self::File => "File",
            Self::Aggregation => "Aggregation",
        }
    }

    /// Parse from a field value (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dataset" => Some(Self::Dataset),
            "file" => Some(Self::File),
            "aggregation" => Some(Self::Aggregation),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical, schema-less search record.
///
/// One `Record` describes a single published instance of a dataset, file or
/// aggregation. Multi-valued metadata lives in `fields`, an ordered map from
/// field name to an ordered list of string values.
///
/// `master_id` + `version` identify one edition of a logical dataset; `id`
/// identifies one published instance of that edition. `id` is assigned once
/// and never changes after the record leaves the crawler (the crawler may
/// swap in a catalog-declared identifier before handing the record off).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub record_type: RecordType,

    /// Version-independent identifier grouping all editions of one dataset
    pub master_id: String,

    /// Non-negative edition number; `0` means unversioned
    pub version: u64,

    /// Exactly one edition per `master_id` should carry this at steady state
    pub latest: bool,

    /// True when published from a non-authoritative (replica) source
    pub replica: bool,

    /// Ordered multi-valued field map, insertion order preserved
    pub fields: IndexMap<String, Vec<String>>,
}

impl Record {
    /// Create a record with an empty field map
    pub fn new(id: impl Into<String>, record_type: RecordType) -> Self {
        let id = id.into();
        Self {
            master_id: id.clone(),
            id,
            record_type,
            version: 0,
            latest: true,
            replica: false,
            fields: IndexMap::new(),
        }
    }

    /// Append one value to a field, creating the field if absent
    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(name.into()).or_default().push(value.into());
    }

    /// Replace all values of a field with a single value
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), vec![value.into()]);
    }

    /// First value of a field, if present
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// All values of a field (empty slice when absent)
    pub fn values(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of values stored for a field
    pub fn occurrences(&self, name: &str) -> usize {
        self.fields.get(name).map(Vec::len).unwrap_or(0)
    }

    /// Builder-style version setter
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Builder-style master id setter
    pub fn with_master_id(mut self, master_id: impl Into<String>) -> Self {
        self.master_id = master_id.into();
        self
    }

    /// Copy of this record demoted to a non-latest edition
    pub fn demoted(&self) -> Self {
        let mut copy = self.clone();
        copy.latest = false;
        copy
    }
}

/// One federated search-index endpoint among several cooperating sites.
///
/// Health state is refreshed by the prober and treated as a hint by the
/// query path; a shard can fail mid-query even if its last probe succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    /// Host address, e.g. `esg-node.example.org:8983/solr`
    pub host_address: String,

    pub is_healthy: bool,

    /// Wall-clock duration of the last probe round trip
    #[serde(skip)]
    pub last_probe_latency: Option<Duration>,

    /// Result count reported by the last successful probe, `None` if the
    /// shard has never answered
    pub last_known_result_count: Option<u64>,
}

impl Shard {
    /// New shard in unknown (unhealthy until probed) state
    pub fn new(host_address: impl Into<String>) -> Self {
        Self {
            host_address: host_address.into(),
            is_healthy: false,
            last_probe_latency: None,
            last_known_result_count: None,
        }
    }
}

impl std::fmt::Display for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.host_address)
    }
}

/// Counters accumulated over one publish/unpublish operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    pub catalogs_visited: u32,
    pub records_published: u32,
    pub records_removed: u32,
    pub subtrees_skipped: u32,
    pub errors: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlStats {
    pub fn begin() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Elapsed seconds between start and finish, when both are known
    pub fn elapsed_secs(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(s), Some(f)) => Some((f - s).num_seconds()),
            _ => None,
        }
    }
}
