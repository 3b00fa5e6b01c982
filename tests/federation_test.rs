//! Federated search degradation tests
//!
//! The local index engine and the peer shards are all wiremock servers.
//! Distributed queries reach the local engine with a `shards` parameter;
//! peers only ever see probe requests.

mod common;

use std::sync::Arc;

use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stratus::federation::{FederationError, SearchService, ShardProber, ShardRegistry};
use stratus::index::query::QueryInput;
use stratus::models::RecordType;

/// Shard address (no scheme) for a mock server
fn shard_address(server: &MockServer) -> String {
    format!("{}/solr/datasets", server.address())
}

fn search_service(index_uri: &str, shards: Vec<String>) -> SearchService {
    let index = common::index_client(index_uri);
    let registry = Arc::new(ShardRegistry::new(&shards));
    let prober = ShardProber::new(&common::federation_config(shards)).unwrap();
    SearchService::new(index, registry, prober)
}

/// Answer probe requests on a peer shard
async fn mount_probe(server: &MockServer, num_found: u64) {
    let body = format!(
        r#"<?xml version="1.0"?><response><result numFound="{num_found}" start="0"/></response>"#
    );
    Mock::given(method("GET"))
        .and(path("/solr/datasets/select"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// One dead shard degrades the query to the probed healthy subset; the
/// local-only fallback is never reached
#[tokio::test]
async fn test_degrades_to_healthy_subset() {
    let index = MockServer::start().await;
    let peer = MockServer::start().await;
    mount_probe(&peer, 42).await;

    let healthy = shard_address(&peer);
    let dead = "127.0.0.1:1/solr/datasets".to_string();
    let full_set = format!("{healthy},{dead}");

    Mock::given(method("GET"))
        .and(path("/datasets/select"))
        .and(query_param("shards", full_set.as_str()))
        .respond_with(ResponseTemplate::new(503).set_body_string("shard down"))
        .expect(1)
        .mount(&index)
        .await;
    Mock::given(method("GET"))
        .and(path("/datasets/select"))
        .and(query_param("shards", healthy.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(common::engine_response(&[
                common::dataset_doc("cmip5.tas.v1|host", "cmip5.tas", 1, true),
            ])),
        )
        .expect(1)
        .mount(&index)
        .await;
    Mock::given(method("GET"))
        .and(path("/datasets/select"))
        .and(query_param_is_missing("shards"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::empty_engine_response()))
        .expect(0)
        .mount(&index)
        .await;

    let service = search_service(&index.uri(), vec![healthy.clone(), dead]);
    let result = service
        .search(RecordType::Dataset, QueryInput::default())
        .await
        .unwrap();

    assert_eq!(result.num_found, 1);
    assert_eq!(service.registry().healthy_addresses().await, [healthy]);
}

/// With no healthy peers the query falls back to the local index alone
#[tokio::test]
async fn test_falls_back_to_local_index() {
    let index = MockServer::start().await;

    let dead_a = "127.0.0.1:1/solr/datasets".to_string();
    let dead_b = "127.0.0.1:2/solr/datasets".to_string();

    Mock::given(method("GET"))
        .and(path("/datasets/select"))
        .and(query_param("shards", format!("{dead_a},{dead_b}")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&index)
        .await;
    Mock::given(method("GET"))
        .and(path("/datasets/select"))
        .and(query_param_is_missing("shards"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::empty_engine_response()))
        .expect(1)
        .mount(&index)
        .await;

    let service = search_service(&index.uri(), vec![dead_a, dead_b]);
    let result = service
        .search(RecordType::Dataset, QueryInput::default())
        .await
        .unwrap();

    assert_eq!(result.num_found, 0);
    assert!(service.registry().healthy_addresses().await.is_empty());
}

/// When every degradation step fails the last error is surfaced
#[tokio::test]
async fn test_exhausted_surfaces_last_error() {
    let index = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/datasets/select"))
        .respond_with(ResponseTemplate::new(500).set_body_string("engine down"))
        .mount(&index)
        .await;

    let service = search_service(&index.uri(), vec!["127.0.0.1:1/solr/datasets".to_string()]);
    let err = service
        .search(RecordType::Dataset, QueryInput::default())
        .await
        .unwrap_err();

    match err {
        FederationError::Exhausted { attempts, source } => {
            assert_eq!(attempts, 2);
            assert!(source.is_recoverable());
        }
        other => panic!("expected Exhausted, got {other}"),
    }
}

/// An empty shard set queries the local index directly, with no shards
/// parameter and no probing
#[tokio::test]
async fn test_empty_shard_set_is_local_only() {
    let index = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/datasets/select"))
        .and(query_param_is_missing("shards"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::empty_engine_response()))
        .expect(1)
        .mount(&index)
        .await;

    let service = search_service(&index.uri(), Vec::new());
    let result = service
        .search(RecordType::Dataset, QueryInput::default())
        .await
        .unwrap();

    assert_eq!(result.num_found, 0);
}

/// Probing an empty set completes immediately with an empty result
#[tokio::test]
async fn test_probe_preserves_order_and_marks_health() {
    let peer = MockServer::start().await;
    mount_probe(&peer, 9).await;

    let prober = ShardProber::new(&common::federation_config(Vec::new())).unwrap();
    let registry = ShardRegistry::new(&[
        "127.0.0.1:1/solr/datasets".to_string(),
        shard_address(&peer),
    ]);

    let probed = prober.probe_all(registry.snapshot().await).await;

    assert_eq!(probed.len(), 2);
    assert!(!probed[0].is_healthy);
    assert!(probed[1].is_healthy);
    assert_eq!(probed[1].last_known_result_count, Some(9));
    assert!(probed[1].last_probe_latency.is_some());
}
