//! stratus - Federated metadata harvesting and search
//!
//! A publishing and search node for distributed scientific-data
//! catalogs: catalog trees are crawled, their datasets turned into
//! versioned metadata records, validated, and pushed into a local
//! search-index engine; queries fan out across a federation of peer
//! index shards with graceful degradation when peers fail.
//!
//! # Layout
//!
//! - [`catalog`] holds catalog documents, location resolution, and the
//!   HTTP fetch layer
//! - [`crawler`] walks catalog trees and produces records
//! - [`validation`] applies schema and access-control rules
//! - [`pipeline`] carries records to consumers and hosts the
//!   publishing orchestrator
//! - [`index`] talks to the local search-index engine
//! - [`federation`] tracks peer shards and runs federated queries
//! - [`config`], [`models`], [`error`], and [`utils`] are shared
//!   plumbing
//!
//! # Example
//!
//! ```no_run
//! use stratus::config::Config;
//! use stratus::crawler::{CrawlOptions, RepositoryType};
//! use stratus::pipeline::orchestrator::PublishingService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let service = PublishingService::from_config(&config)?;
//!     let stats = service
//!         .publish(
//!             "http://data.example.org/thredds/catalog.xml",
//!             RepositoryType::Thredds,
//!             CrawlOptions::default(),
//!         )
//!         .await?;
//!     println!("published {} records", stats.records_published);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod error;
pub mod federation;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod utils;
pub mod validation;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{CrawlOptions, Crawler, RepositoryType};
    pub use crate::error::{Error, ErrorCategory, Result, StratusErrorTrait};
    pub use crate::federation::{SearchService, ShardProber, ShardRegistry};
    pub use crate::index::query::{QueryInput, QueryResult};
    pub use crate::index::IndexClient;
    pub use crate::models::{CrawlStats, Record, RecordType, Shard};
    pub use crate::pipeline::orchestrator::PublishingService;
    pub use crate::validation::RecordValidator;
}

// Direct re-exports for convenience
pub use models::{CrawlStats, Record, RecordType, Shard};
