//! Record validation gate
//!
//! Two cooperating checks run before a record reaches the index-writing
//! consumer: field-schema validation and per-project access control. Both
//! rule sets live in external files that may change while the service
//! runs; each validation call first polls the backing file and reloads
//! the rules when the file changed since the last check (modification
//! time, confirmed by a content digest).

pub mod access;
pub mod schema;

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::info;

use crate::config::ValidationConfig;
use crate::models::Record;
pub use access::AccessControl;
pub use schema::{FieldType, SchemaValidator, ValidationSchemaField};

/// Rejection carrying the complete list of violations.
///
/// Validation never short-circuits: a single request surfaces every
/// problem at once.
#[derive(Error, Debug, Clone)]
#[error("record rejected: {}", .violations.join("; "))]
pub struct ValidationError {
    pub violations: Vec<String>,
}

/// File-backed rule set with poll-on-use reload
struct ReloadableRules<T> {
    path: PathBuf,
    parse: fn(&str) -> anyhow::Result<T>,
    cached: Mutex<Option<CachedRules<T>>>,
}

struct CachedRules<T> {
    value: Arc<T>,
    modified: SystemTime,
    digest: [u8; 32],
}

impl<T> ReloadableRules<T> {
    fn new(path: &Path, parse: fn(&str) -> anyhow::Result<T>) -> Self {
        Self {
            path: path.to_path_buf(),
            parse,
            cached: Mutex::new(None),
        }
    }

    /// Current rules, reloading if the backing file changed
    fn get(&self) -> anyhow::Result<Arc<T>> {
        let modified = std::fs::metadata(&self.path)?.modified()?;

        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(state) = cached.as_ref() {
            if state.modified == modified {
                return Ok(Arc::clone(&state.value));
            }
        }

        let content = std::fs::read_to_string(&self.path)?;
        let digest: [u8; 32] = Sha256::digest(content.as_bytes()).into();

        // mtime moved but content did not: keep the parsed rules
        if let Some(state) = cached.as_mut() {
            if state.digest == digest {
                state.modified = modified;
                return Ok(Arc::clone(&state.value));
            }
        }

        let value = Arc::new((self.parse)(&content)?);
        info!(path = %self.path.display(), "Validation rules reloaded");
        *cached = Some(CachedRules {
            value: Arc::clone(&value),
            modified,
            digest,
        });
        Ok(value)
    }
}

/// Source of a rule set: fixed in memory or backed by a reloadable file
enum RuleSource<T> {
    Static(Arc<T>),
    File(ReloadableRules<T>),
}

impl<T> RuleSource<T> {
    fn get(&self) -> anyhow::Result<Arc<T>> {
        match self {
            Self::Static(value) => Ok(Arc::clone(value)),
            Self::File(file) => file.get(),
        }
    }
}

/// Validation front door combining schema and access-control checks
pub struct RecordValidator {
    schema: RuleSource<SchemaValidator>,
    access: Option<RuleSource<AccessControl>>,
    publishing_host: String,
}

impl RecordValidator {
    /// Validator backed by the configured rule files
    pub fn new(config: &ValidationConfig, publishing_host: impl Into<String>) -> Self {
        Self {
            schema: RuleSource::File(ReloadableRules::new(
                &config.schema_path,
                |s| SchemaValidator::from_json(s),
            )),
            access: config.access_control_path.as_deref().map(|path| {
                RuleSource::File(ReloadableRules::new(path, |s| AccessControl::from_json(s)))
            }),
            publishing_host: publishing_host.into(),
        }
    }

    /// Validator with fixed in-memory rules (tests, embedded use)
    pub fn with_rules(
        schema: SchemaValidator,
        access: Option<AccessControl>,
        publishing_host: impl Into<String>,
    ) -> Self {
        Self {
            schema: RuleSource::Static(Arc::new(schema)),
            access: access.map(|a| RuleSource::Static(Arc::new(a))),
            publishing_host: publishing_host.into(),
        }
    }

    /// Validator that accepts every record
    pub fn allow_all() -> Self {
        Self::with_rules(SchemaValidator::default(), None, "localhost")
    }

    /// Run both checks; all violations are returned together.
    ///
    /// Rule sets that cannot be loaded fail closed: the record is
    /// rejected with the load failure as its single violation.
    pub fn validate(&self, record: &Record, schema: Option<&str>) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        match self.schema.get() {
            Ok(rules) => violations.extend(rules.validate(record, schema)),
            Err(e) => violations.push(format!("schema rules unavailable: {e}")),
        }

        if let Some(access) = &self.access {
            match access.get() {
                Ok(rules) => violations.extend(rules.check(record, &self.publishing_host)),
                Err(e) => violations.push(format!("access-control rules unavailable: {e}")),
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}
