//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use anyhow::{Context, Result};
use url::Url;

/// Extract host (and port, when explicit) from a location URL
pub fn extract_host(location: &str) -> Result<String> {
    let parsed = Url::parse(location).context("Invalid URL")?;

    let host = parsed.host_str().context("No host in URL")?;
    match parsed.port() {
        Some(port) => Ok(format!("{host}:{port}")),
        None => Ok(host.to_string()),
    }
}

/// Truncate text to a maximum byte length for log output.
///
/// The cut falls on a char boundary, so multi-byte titles never split
/// mid-character.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }

    let budget = max_len.saturating_sub(3);
    let cut = text
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= budget)
        .last()
        .unwrap_or(0);
    format!("{}...", &text[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_host() {
        let host = extract_host("https://esg-node.example.org/thredds/catalog.xml");
        assert_eq!(host.unwrap(), "esg-node.example.org");

        let host = extract_host("http://localhost:8983/solr/datasets/select");
        assert_eq!(host.unwrap(), "localhost:8983");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("very long text here", 10), "very lo...");
    }

    #[test]
    fn test_truncate_multibyte_title() {
        // two-byte chars must not be split mid-character
        let title = "é".repeat(60);
        let truncated = truncate_text(&title, 80);
        assert!(truncated.len() <= 80);
        assert!(truncated.ends_with("..."));
        assert!(truncated.trim_end_matches("...").chars().all(|c| c == 'é'));

        let title = "Température de surface de l'océan, moyenne mensuelle de 1850 à 2005 sur grille régulière";
        let truncated = truncate_text(title, 80);
        assert!(truncated.len() <= 80);
        assert!(truncated.ends_with("..."));
    }
}
