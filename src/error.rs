//! Unified error type for the crate surface.
//!
//! Each layer keeps its own `thiserror` enum ([`FetchError`],
//! [`CrawlError`], [`IndexError`], [`FederationError`],
//! [`ValidationError`]); this module folds them into one [`Error`] for
//! callers that drive whole operations, such as the publishing service
//! and the binary.
//!
//! [`ErrorCategory`] encodes the handling policy per failure class:
//! network failures may be retried or degraded around, structural
//! failures skip the affected subtree, validation failures carry the
//! full violation list and are final, and configuration failures abort
//! the operation outright.

use thiserror::Error;

pub use crate::federation::FederationError;
pub use crate::index::IndexError;
pub use crate::utils::error::{CrawlError, FetchError};
pub use crate::validation::ValidationError;

/// Shared classification interface across the crate's error enums.
pub trait StratusErrorTrait: std::error::Error {
    /// Whether retrying the failed operation can plausibly succeed.
    fn is_recoverable(&self) -> bool;

    /// Failure class driving the handling policy.
    fn category(&self) -> ErrorCategory;
}

/// Failure classes, ordered from most to least retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Timeouts, connection failures, engine 5xx, malformed remote payloads
    Network,
    /// Unresolvable references, missing identifiers, broken documents
    Structural,
    /// Schema or access-control rejection; never retried
    Validation,
    /// Unsupported repository type, bad core mapping, invalid settings
    Config,
    /// Anything reaching the top without a domain classification
    Other,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Federation error: {0}")]
    Federation(#[from] FederationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl StratusErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Crawl(e) => e.is_recoverable(),
            Self::Fetch(e) => e.is_recoverable(),
            Self::Index(e) => e.is_recoverable(),
            Self::Federation(e) => e.is_recoverable(),
            Self::Validation(_) | Self::Config(_) | Self::Other(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(_) | Self::Index(_) | Self::Federation(_) => ErrorCategory::Network,
            Self::Crawl(e) => match e {
                CrawlError::Fetch(_) | CrawlError::Index(_) => ErrorCategory::Network,
                CrawlError::Validation(_) => ErrorCategory::Validation,
                _ => ErrorCategory::Structural,
            },
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other(_) => ErrorCategory::Other,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_per_layer() {
        let fetch = Error::Fetch(FetchError::Timeout);
        assert_eq!(fetch.category(), ErrorCategory::Network);
        assert!(fetch.is_recoverable());

        let crawl = Error::Crawl(CrawlError::MissingIdentifier {
            location: "http://example.org/catalog.xml".to_string(),
        });
        assert_eq!(crawl.category(), ErrorCategory::Structural);
        assert!(!crawl.is_recoverable());
    }

    #[test]
    fn test_config_is_final() {
        let err = Error::Config("unsupported repository type: OPeNDAP".to_string());
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_from_domain_error() {
        let unified: Error = CrawlError::Cancelled.into();
        assert!(matches!(unified, Error::Crawl(_)));
    }

    #[test]
    fn test_from_anyhow_keeps_context_chain() {
        use anyhow::Context;

        let source: anyhow::Result<()> =
            Err(anyhow::anyhow!("connection refused")).context("delivering batch");
        let unified: Error = source.unwrap_err().into();
        assert_eq!(
            unified.to_string(),
            "delivering batch: connection refused"
        );
        assert_eq!(unified.category(), ErrorCategory::Other);
    }
}
