//! Error types for the harvesting pipeline
//!
//! This module defines the domain error types used by the catalog fetcher
//! and the crawl/publish path.

use thiserror::Error;

/// Errors that can occur while fetching remote catalog documents
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server error with status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Connect or read timeout
    #[error("Request timeout")]
    Timeout,

    /// Invalid catalog location
    #[error("Invalid location: {0}")]
    InvalidLocation(String),
}

impl FetchError {
    /// Whether the failure is transient and worth retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ServerError(429 | 500 | 502 | 503 | 504) | Self::Http(_)
        )
    }
}

/// Errors raised while crawling a catalog tree
#[derive(Error, Debug)]
pub enum CrawlError {
    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Catalog document could not be parsed into a dataset tree
    #[error("Malformed catalog at {location}: {reason}")]
    MalformedCatalog { location: String, reason: String },

    /// A catalog reference could not be resolved to an absolute location
    #[error("Unresolvable catalog reference {reference} from {base}")]
    UnresolvableReference { base: String, reference: String },

    /// Dataset node is missing a mandatory identifier
    #[error("Dataset node without identifier in {location}")]
    MissingIdentifier { location: String },

    /// Crawl was cancelled at a cooperative checkpoint
    #[error("Crawl cancelled")]
    Cancelled,

    /// Record rejected by schema or access-control validation
    #[error("Validation failed: {0}")]
    Validation(#[from] crate::validation::ValidationError),

    /// A downstream consumer rejected the record batch
    #[error("Consumer failed: {0}")]
    Consumer(#[source] anyhow::Error),

    /// Reconciliation query against the index failed
    #[error("Index lookup failed: {0}")]
    Index(#[source] anyhow::Error),
}

impl CrawlError {
    /// Structural errors skip the subtree; transient ones may be retried
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Index(_) => true,
            _ => false,
        }
    }
}
