//! Catalog crawling: the crawler capability and repository-type dispatch
//!
//! Each repository type maps to one [`Crawler`] implementation through an
//! explicit lookup table; there is no crawler class hierarchy. Asking for
//! an unregistered repository type is a configuration error, never a
//! silent no-op.

pub mod thredds;

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::CrawlStats;
use crate::utils::error::CrawlError;

/// Supported repository types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryType {
    /// THREDDS-style tree of nested catalog documents
    Thredds,
}

impl RepositoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thredds => "THREDDS",
        }
    }

    /// Parse from user input (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "thredds" => Some(Self::Thredds),
            _ => None,
        }
    }
}

impl std::fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options for one crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Pattern restricting which sub-catalogs are traversed, applied at
    /// crawl time against the resolved reference location
    pub filter: Option<Regex>,

    /// Recurse into catalog references
    pub recursive: bool,

    /// Publish (true) or unpublish (false) branch
    pub publish: bool,

    /// Validation schema to apply, when the project declares one
    pub schema: Option<String>,

    /// Mark produced records as replicas of a non-authoritative source
    pub replica: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            filter: None,
            recursive: true,
            publish: true,
            schema: None,
            replica: false,
        }
    }
}

/// Repository-type-specific crawl strategy.
///
/// One call turns one remote catalog location into zero or more records
/// delivered through the configured consumer chain.
#[async_trait]
pub trait Crawler: Send + Sync {
    async fn crawl(&self, location: &str, options: &CrawlOptions)
        -> Result<CrawlStats, CrawlError>;
}

/// Callback boundary for external crawl auditing
pub trait CrawlListener: Send + Sync {
    fn before_crawling(&self, location: &str);
    fn after_crawling_success(&self, location: &str);
    fn after_crawling_error(&self, location: &str);
}

/// Listener that mirrors crawl progress into the tracing log
#[derive(Default)]
pub struct TracingListener;

impl CrawlListener for TracingListener {
    fn before_crawling(&self, location: &str) {
        tracing::debug!(location, "Crawling catalog");
    }

    fn after_crawling_success(&self, location: &str) {
        tracing::debug!(location, "Catalog crawled");
    }

    fn after_crawling_error(&self, location: &str) {
        tracing::warn!(location, "Catalog crawl failed");
    }
}

/// Repository type → crawler lookup table
#[derive(Default)]
pub struct CrawlerRegistry {
    crawlers: HashMap<RepositoryType, Arc<dyn Crawler>>,
}

impl CrawlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, repository_type: RepositoryType, crawler: Arc<dyn Crawler>) {
        self.crawlers.insert(repository_type, crawler);
    }

    /// Crawler for a repository type; `None` means unsupported and the
    /// caller must surface a configuration error
    pub fn get(&self, repository_type: RepositoryType) -> Option<Arc<dyn Crawler>> {
        self.crawlers.get(&repository_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_type_parse() {
        assert_eq!(RepositoryType::parse("thredds"), Some(RepositoryType::Thredds));
        assert_eq!(RepositoryType::parse("THREDDS"), Some(RepositoryType::Thredds));
        assert_eq!(RepositoryType::parse("oai-pmh"), None);
    }

    #[test]
    fn test_empty_registry_returns_none() {
        let registry = CrawlerRegistry::new();
        assert!(registry.get(RepositoryType::Thredds).is_none());
    }
}
