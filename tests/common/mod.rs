//! Common test utilities

use std::collections::HashMap;

use stratus::config::{FederationConfig, HarvesterConfig, IndexConfig};
use stratus::index::IndexClient;

/// Harvester config tuned for tests: generous rate limit, no retries
pub fn harvester_config() -> HarvesterConfig {
    HarvesterConfig {
        rate_limit: 1000.0,
        connect_timeout_secs: 5,
        read_timeout_secs: 5,
        max_retries: 0,
        user_agent: "stratus-test".to_string(),
    }
}

/// Index config with the standard three-core mapping
pub fn index_config() -> IndexConfig {
    let mut cores = HashMap::new();
    cores.insert("Dataset".to_string(), "datasets".to_string());
    cores.insert("File".to_string(), "files".to_string());
    cores.insert("Aggregation".to_string(), "aggregations".to_string());

    IndexConfig {
        url: "http://localhost:8983/solr".to_string(),
        cores,
        publishing_host: "esgf-test.example.org".to_string(),
        connect_timeout_secs: 5,
        read_timeout_secs: 5,
    }
}

/// Federation config with a short probe timeout
#[allow(dead_code)]
pub fn federation_config(shards: Vec<String>) -> FederationConfig {
    FederationConfig {
        shards,
        probe_timeout_secs: 2,
        default_rows: 10,
    }
}

/// Index client pointed at a mock server
pub fn index_client(base_url: &str) -> IndexClient {
    IndexClient::with_base_url(&index_config(), base_url).unwrap()
}

/// Engine response with no matching documents
#[allow(dead_code)]
pub fn empty_engine_response() -> String {
    r#"<?xml version="1.0"?>
<response>
  <result numFound="0" start="0"/>
</response>"#
        .to_string()
}

/// Engine response wrapping the given `<doc>` elements
#[allow(dead_code)]
pub fn engine_response(docs: &[String]) -> String {
    format!(
        r#"<?xml version="1.0"?>
<response>
  <result numFound="{}" start="0">{}</result>
</response>"#,
        docs.len(),
        docs.join("")
    )
}

/// One indexed dataset `<doc>` element
#[allow(dead_code)]
pub fn dataset_doc(id: &str, master_id: &str, version: u64, latest: bool) -> String {
    format!(
        r#"<doc>
      <str name="id">{id}</str>
      <str name="type">Dataset</str>
      <str name="master_id">{master_id}</str>
      <long name="version">{version}</long>
      <bool name="latest">{latest}</bool>
      <bool name="replica">false</bool>
    </doc>"#
    )
}

/// Catalog document with one harvestable dataset
#[allow(dead_code)]
pub fn catalog_with_dataset(dataset_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns:xlink="http://www.w3.org/1999/xlink" name="Test Catalog">
  <dataset name="Surface Temperature" ID="{dataset_id}">
    <property name="project" value="CMIP5"/>
    <access urlPath="/data/tas.nc" serviceName="HTTPServer"/>
  </dataset>
</catalog>"#
    )
}

/// Catalog document holding only a reference to a sub-catalog
#[allow(dead_code)]
pub fn catalog_with_reference(href: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns:xlink="http://www.w3.org/1999/xlink" name="Parent Catalog">
  <catalogRef xlink:href="{href}" xlink:title="Subcatalog"/>
</catalog>"#
    )
}
