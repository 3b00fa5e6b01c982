//! Catalog location resolution and normalization
//!
//! Catalog references are frequently relative (`./sub/catalog.xml`,
//! `../sibling/catalog.xml`). Before recursing, the crawler resolves each
//! reference against the enclosing catalog's absolute location and collapses
//! dot segments, so the same logical catalog reached through different
//! relative paths maps to one visited-set entry.

use url::Url;

use crate::utils::error::CrawlError;

/// Resolve a (possibly relative) catalog reference against a base location.
///
/// Dot segments are removed per RFC 3986 during resolution, so
/// `http://host/a/b/catalog.xml` + `../c/./catalog.xml` yields
/// `http://host/a/c/catalog.xml`.
pub fn resolve_reference(base: &str, reference: &str) -> Result<String, CrawlError> {
    let base_url = Url::parse(base).map_err(|_| CrawlError::UnresolvableReference {
        base: base.to_string(),
        reference: reference.to_string(),
    })?;

    let resolved = base_url
        .join(reference)
        .map_err(|_| CrawlError::UnresolvableReference {
            base: base.to_string(),
            reference: reference.to_string(),
        })?;

    Ok(resolved.to_string())
}

/// Normalize an absolute location for visited-set comparison.
///
/// Parsing and re-serializing collapses dot segments and default ports;
/// a trailing fragment is dropped since it never names a different catalog.
pub fn normalize(location: &str) -> Result<String, CrawlError> {
    let mut url = Url::parse(location).map_err(|_| CrawlError::MalformedCatalog {
        location: location.to_string(),
        reason: "not an absolute URL".to_string(),
    })?;

    url.set_fragment(None);
    Ok(url.to_string())
}
