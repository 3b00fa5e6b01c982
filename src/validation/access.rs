//! Access-control gate for restricted projects
//!
//! Some projects restrict which publishing hosts may publish which
//! datasets. The policy is an allow-list of identifier patterns keyed by
//! `(project, publishing host)`; a record whose `project` field names a
//! restricted project is rejected unless its id matches a pattern
//! configured for the local publishing host. Project matching is
//! case-insensitive.

use regex::Regex;
use std::collections::HashMap;

use crate::models::Record;

/// Compiled access-control policy
#[derive(Debug, Default)]
pub struct AccessControl {
    /// project (lowercased) → publishing host → allowed id patterns
    projects: HashMap<String, HashMap<String, Vec<Regex>>>,
}

impl AccessControl {
    /// Parse the JSON policy document:
    /// `{ "project": { "host": ["^pattern$", …] } }`
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let raw: HashMap<String, HashMap<String, Vec<String>>> = serde_json::from_str(json)?;

        let mut projects = HashMap::new();
        for (project, hosts) in raw {
            let mut compiled_hosts = HashMap::new();
            for (host, patterns) in hosts {
                let compiled: Result<Vec<Regex>, _> =
                    patterns.iter().map(|p| Regex::new(p)).collect();
                compiled_hosts.insert(host, compiled?);
            }
            projects.insert(project.to_lowercase(), compiled_hosts);
        }

        Ok(Self { projects })
    }

    /// Violations for one record published from the given host.
    ///
    /// Records without a `project` field, or whose project is not
    /// restricted, always pass.
    pub fn check(&self, record: &Record, publishing_host: &str) -> Vec<String> {
        let Some(project) = record.first_value("project") else {
            return Vec::new();
        };

        let Some(hosts) = self.projects.get(&project.to_lowercase()) else {
            return Vec::new();
        };

        let Some(patterns) = hosts.get(publishing_host) else {
            return vec![format!(
                "host '{publishing_host}' is not authorized to publish records for restricted project '{project}'"
            )];
        };

        if patterns.iter().any(|p| p.is_match(&record.id)) {
            Vec::new()
        } else {
            vec![format!(
                "id '{}' does not match any pattern allowed for project '{project}' on host '{publishing_host}'",
                record.id
            )]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordType;

    const POLICY: &str = r#"{
        "restrictedProject": {
            "esg.example.org": ["^restricted\\.allowed\\..*"]
        }
    }"#;

    fn record(id: &str, project: &str) -> Record {
        let mut record = Record::new(id, RecordType::Dataset);
        record.set_field("project", project);
        record
    }

    #[test]
    fn test_unrestricted_project_passes() {
        let acl = AccessControl::from_json(POLICY).unwrap();
        let r = record("anything.v1", "CMIP5");
        assert!(acl.check(&r, "esg.example.org").is_empty());
    }

    #[test]
    fn test_record_without_project_passes() {
        let acl = AccessControl::from_json(POLICY).unwrap();
        let r = Record::new("anything.v1", RecordType::Dataset);
        assert!(acl.check(&r, "esg.example.org").is_empty());
    }

    #[test]
    fn test_matching_pattern_allows() {
        let acl = AccessControl::from_json(POLICY).unwrap();
        let r = record("restricted.allowed.tas.v1", "restrictedProject");
        assert!(acl.check(&r, "esg.example.org").is_empty());
    }

    #[test]
    fn test_non_matching_id_rejected() {
        let acl = AccessControl::from_json(POLICY).unwrap();
        let r = record("restricted.other.tas.v1", "restrictedProject");

        let violations = acl.check(&r, "esg.example.org");
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("does not match"));
    }

    #[test]
    fn test_unknown_host_rejected() {
        let acl = AccessControl::from_json(POLICY).unwrap();
        let r = record("restricted.allowed.tas.v1", "restrictedProject");

        let violations = acl.check(&r, "rogue.example.org");
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("not authorized"));
    }

    #[test]
    fn test_project_match_case_insensitive() {
        let acl = AccessControl::from_json(POLICY).unwrap();
        let r = record("restricted.other.tas.v1", "RESTRICTEDPROJECT");
        assert_eq!(acl.check(&r, "esg.example.org").len(), 1);
    }
}
