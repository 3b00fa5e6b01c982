//! Abstract dataset-tree model produced by catalog sources
//!
//! A remote site exposes a hierarchical catalog; a [`CatalogSource`]
//! turns one catalog document into this tree. The crawler walks the tree,
//! recursing through [`CatalogRef`] pointers into nested catalogs.
//!
//! [`CatalogSource`]: crate::catalog::source::CatalogSource

pub mod location;
pub mod source;

use serde::{Deserialize, Serialize};

/// One parsed catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Absolute location this catalog was loaded from
    pub location: String,

    /// Display name, when the catalog declares one
    pub name: Option<String>,

    /// Top-level dataset nodes
    pub datasets: Vec<DatasetNode>,

    /// Top-level references to nested catalogs
    pub references: Vec<CatalogRef>,
}

/// Pointer to a nested catalog (URI plus optional traversal filter)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRef {
    /// Reference target, possibly relative to the enclosing catalog
    pub href: String,

    /// Display title
    pub title: Option<String>,
}

/// `(name, value)` metadata property on a dataset node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

/// Access-endpoint descriptor `(url, service type)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEndpoint {
    pub url: String,
    pub service_type: String,
}

/// Free-text documentation block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Documentation {
    pub doc_type: Option<String>,
    pub content: String,
}

/// Bounding box in decimal degrees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeospatialCoverage {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// Temporal extent as declared by the catalog (opaque strings)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalCoverage {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// One node of the dataset tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetNode {
    /// Catalog-declared identifier, when present
    pub id: Option<String>,

    pub name: String,

    pub properties: Vec<Property>,

    pub access: Vec<AccessEndpoint>,

    pub documentation: Vec<Documentation>,

    pub geospatial: Option<GeospatialCoverage>,

    pub temporal: Option<TemporalCoverage>,

    /// Nested dataset nodes
    pub children: Vec<DatasetNode>,

    /// Nested catalog references
    pub references: Vec<CatalogRef>,
}

impl DatasetNode {
    /// First property value with the given name
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// A node is harvestable when it declares an identifier
    pub fn is_harvestable(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Edition number for this dataset.
    ///
    /// Prefers an explicit `dataset_version` property; falls back to a
    /// trailing `.vN` segment of the identifier. `0` means unversioned.
    pub fn version(&self) -> u64 {
        if let Some(v) = self.property("dataset_version").and_then(|v| v.parse().ok()) {
            return v;
        }
        self.id
            .as_deref()
            .and_then(version_from_id)
            .unwrap_or(0)
    }

    /// Version-independent identifier grouping all editions.
    ///
    /// The trailing `.vN` segment, when present, is stripped from the
    /// declared identifier.
    pub fn master_id(&self) -> Option<String> {
        let id = self.id.as_deref()?;
        match id.rfind(".v") {
            Some(pos) if version_from_id(id).is_some() => Some(id[..pos].to_string()),
            _ => Some(id.to_string()),
        }
    }
}

/// Parse a trailing `.vN` edition suffix, e.g. `cmip5.output.tas.v20120101`
fn version_from_id(id: &str) -> Option<u64> {
    let pos = id.rfind(".v")?;
    let digits = &id[pos + 2..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with_id(id: &str) -> DatasetNode {
        DatasetNode {
            id: Some(id.to_string()),
            name: "test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_version_from_id_suffix() {
        let node = node_with_id("cmip5.output1.tas.v20120101");
        assert_eq!(node.version(), 20120101);
        assert_eq!(node.master_id().unwrap(), "cmip5.output1.tas");
    }

    #[test]
    fn test_version_property_wins() {
        let mut node = node_with_id("obs.dataset.v2");
        node.properties.push(Property {
            name: "dataset_version".to_string(),
            value: "7".to_string(),
        });
        assert_eq!(node.version(), 7);
    }

    #[test]
    fn test_unversioned_id() {
        let node = node_with_id("obs.dataset.vocals");
        // ".vocals" is not a numeric suffix
        assert_eq!(node.version(), 0);
        assert_eq!(node.master_id().unwrap(), "obs.dataset.vocals");
    }

    #[test]
    fn test_harvestable() {
        assert!(node_with_id("x").is_harvestable());
        assert!(!DatasetNode::default().is_harvestable());
    }

    #[test]
    fn test_property_lookup() {
        let mut node = node_with_id("x");
        node.properties.push(Property {
            name: "project".to_string(),
            value: "CMIP5".to_string(),
        });
        assert_eq!(node.property("project"), Some("CMIP5"));
        assert_eq!(node.property("missing"), None);
    }
}
