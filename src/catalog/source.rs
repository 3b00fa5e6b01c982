//! Catalog sources: turning a remote location into a dataset tree
//!
//! The wire format of catalog documents is an external concern; the
//! pipeline only depends on the [`CatalogSource`] trait. The bundled
//! [`HttpCatalogSource`] fetches THREDDS-style catalog XML with rate
//! limiting and retry, and recognizes exactly the vocabulary the crawler
//! consumes (dataset, catalogRef, property, access, documentation,
//! geospatial and temporal coverage).

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::Client;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

use super::{
    AccessEndpoint, Catalog, CatalogRef, DatasetNode, Documentation, GeospatialCoverage, Property,
    TemporalCoverage,
};
use crate::config::HarvesterConfig;
use crate::utils::error::{CrawlError, FetchError};
use crate::utils::retry::{with_retry, Backoff};

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Source of dataset trees, keyed by catalog location
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch and parse the catalog at an absolute location
    async fn fetch(&self, location: &str) -> Result<Catalog, CrawlError>;
}

/// HTTP-backed catalog source with rate limiting and retry
pub struct HttpCatalogSource {
    /// HTTP client with distinct connect and read timeouts
    client: Client,

    /// Rate limiter to keep the harvester polite
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Backoff schedule for transient fetch failures
    backoff: Backoff,

    /// Optional base URL override for testing with mock servers
    base_url: Option<String>,
}

impl HttpCatalogSource {
    /// Create a source from harvester configuration
    pub fn new(config: &HarvesterConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .gzip(true)
            .build()?;

        let rate =
            NonZeroU32::new(config.rate_limit.max(1.0) as u32).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            backoff: Backoff::new(
                config.max_retries,
                Duration::from_secs(1),
                Duration::from_secs(30),
            ),
            base_url: None,
        })
    }

    /// Create a source with a custom base URL for testing
    pub fn with_base_url(config: &HarvesterConfig, base_url: &str) -> Result<Self, FetchError> {
        let mut source = Self::new(config)?;
        source.base_url = Some(base_url.to_string());
        Ok(source)
    }

    /// Fetch a catalog document, retrying transient failures per the
    /// backoff schedule. Non-recoverable failures (4xx other than 429,
    /// invalid locations) return immediately.
    async fn fetch_document(&self, location: &str) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;

        let full_url = match &self.base_url {
            Some(base) => format!("{base}{location}"),
            None => location.to_string(),
        };
        let url = reqwest::Url::parse(&full_url)
            .map_err(|_| FetchError::InvalidLocation(full_url.clone()))?;

        debug!(location = %full_url, "Fetching catalog");
        with_retry(&self.backoff, FetchError::is_recoverable, || {
            self.attempt(url.clone())
        })
        .await
    }

    async fn attempt(&self, url: reqwest::Url) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self, location: &str) -> Result<Catalog, CrawlError> {
        let document = self.fetch_document(location).await?;
        parse_catalog(&document, location)
    }
}

/// Parse a THREDDS-style catalog document into the abstract dataset tree
pub fn parse_catalog(document: &str, location: &str) -> Result<Catalog, CrawlError> {
    let doc = roxmltree::Document::parse(document).map_err(|e| CrawlError::MalformedCatalog {
        location: location.to_string(),
        reason: e.to_string(),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "catalog" {
        return Err(CrawlError::MalformedCatalog {
            location: location.to_string(),
            reason: format!("root element is <{}>, expected <catalog>", root.tag_name().name()),
        });
    }

    let mut catalog = Catalog {
        location: location.to_string(),
        name: root.attribute("name").map(String::from),
        ..Default::default()
    };

    for child in root.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "dataset" => catalog.datasets.push(parse_dataset(child)),
            "catalogRef" => {
                if let Some(r) = parse_catalog_ref(child) {
                    catalog.references.push(r);
                }
            }
            _ => {}
        }
    }

    Ok(catalog)
}

fn parse_dataset(node: roxmltree::Node<'_, '_>) -> DatasetNode {
    let mut dataset = DatasetNode {
        id: node.attribute("ID").or(node.attribute("id")).map(String::from),
        name: node.attribute("name").unwrap_or_default().to_string(),
        ..Default::default()
    };

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "dataset" => dataset.children.push(parse_dataset(child)),
            "catalogRef" => {
                if let Some(r) = parse_catalog_ref(child) {
                    dataset.references.push(r);
                }
            }
            "property" => {
                if let (Some(name), Some(value)) =
                    (child.attribute("name"), child.attribute("value"))
                {
                    dataset.properties.push(Property {
                        name: name.to_string(),
                        value: value.to_string(),
                    });
                }
            }
            "access" => {
                if let Some(url) = child.attribute("urlPath") {
                    dataset.access.push(AccessEndpoint {
                        url: url.to_string(),
                        service_type: child
                            .attribute("serviceName")
                            .unwrap_or("HTTPServer")
                            .to_string(),
                    });
                }
            }
            "documentation" => {
                if let Some(text) = child.text() {
                    dataset.documentation.push(Documentation {
                        doc_type: child.attribute("type").map(String::from),
                        content: text.trim().to_string(),
                    });
                }
            }
            "geospatialCoverage" => {
                dataset.geospatial = parse_geospatial(child);
            }
            "timeCoverage" => {
                dataset.temporal = Some(parse_temporal(child));
            }
            _ => {}
        }
    }

    dataset
}

fn parse_catalog_ref(node: roxmltree::Node<'_, '_>) -> Option<CatalogRef> {
    let href = node
        .attribute((XLINK_NS, "href"))
        .or_else(|| node.attribute("href"))?;

    Some(CatalogRef {
        href: href.to_string(),
        title: node
            .attribute((XLINK_NS, "title"))
            .or_else(|| node.attribute("title"))
            .map(String::from),
    })
}

fn parse_geospatial(node: roxmltree::Node<'_, '_>) -> Option<GeospatialCoverage> {
    let attr = |name: &str| node.attribute(name).and_then(|v| v.parse::<f64>().ok());

    Some(GeospatialCoverage {
        north: attr("north")?,
        south: attr("south")?,
        east: attr("east")?,
        west: attr("west")?,
    })
}

fn parse_temporal(node: roxmltree::Node<'_, '_>) -> TemporalCoverage {
    let child_text = |name: &str| {
        node.children()
            .filter(|n| n.is_element())
            .find(|n| n.tag_name().name() == name)
            .and_then(|n| n.text())
            .map(|t| t.trim().to_string())
    };

    TemporalCoverage {
        start: child_text("start"),
        end: child_text("end"),
    }
}
