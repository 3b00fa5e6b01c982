//! Field-schema validation
//!
//! Schema definitions are loaded from an external JSON document and
//! checked against a record's field map: occurrence bounds, value-type
//! parsing, numeric ranges and controlled-vocabulary membership. All
//! violations for one record are accumulated so a single request surfaces
//! every problem at once.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Record, RecordType};

/// Value type a schema field enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Date,
    Int,
    Long,
    Float,
    Boolean,
    Uuid,
    #[default]
    String,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Uuid => "uuid",
            Self::String => "string",
        }
    }

    /// Parse one value; a numeric result is returned for range checks
    fn parse(&self, value: &str) -> Result<Option<f64>, String> {
        match self {
            Self::Date => {
                let ok = DateTime::parse_from_rfc3339(value).is_ok()
                    || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
                    || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
                if ok {
                    Ok(None)
                } else {
                    Err(format!("'{value}' is not a valid date"))
                }
            }
            Self::Int => value
                .parse::<i32>()
                .map(|v| Some(v as f64))
                .map_err(|_| format!("'{value}' is not a valid int")),
            Self::Long => value
                .parse::<i64>()
                .map(|v| Some(v as f64))
                .map_err(|_| format!("'{value}' is not a valid long")),
            Self::Float => value
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("'{value}' is not a valid float")),
            Self::Boolean => match value {
                "true" | "false" => Ok(None),
                _ => Err(format!("'{value}' is not a valid boolean")),
            },
            Self::Uuid => Uuid::parse_str(value)
                .map(|_| None)
                .map_err(|_| format!("'{value}' is not a valid uuid")),
            Self::String => Ok(None),
        }
    }
}

/// One externally defined field rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSchemaField {
    pub name: String,

    /// Minimum number of values the field must carry
    #[serde(default)]
    pub min_occurs: usize,

    /// Maximum number of values; `None` means unbounded
    #[serde(default)]
    pub max_occurs: Option<usize>,

    #[serde(default, rename = "type")]
    pub field_type: FieldType,

    /// Inclusive numeric bounds, checked for int/long/float fields
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,

    /// Controlled vocabulary; empty means any value
    #[serde(default)]
    pub allowed_values: Vec<String>,

    /// Record types the rule applies to; empty means all
    #[serde(default)]
    pub record_types: Vec<RecordType>,

    /// Restrict the rule to one named validation schema
    #[serde(default)]
    pub schema: Option<String>,
}

impl ValidationSchemaField {
    fn applies_to(&self, record_type: RecordType, schema: Option<&str>) -> bool {
        let type_matches =
            self.record_types.is_empty() || self.record_types.contains(&record_type);
        let schema_matches = match &self.schema {
            None => true,
            Some(s) => schema == Some(s.as_str()),
        };
        type_matches && schema_matches
    }

    /// Append all violations of this rule against one record
    fn check(&self, record: &Record, violations: &mut Vec<String>) {
        let count = record.occurrences(&self.name);

        if count < self.min_occurs {
            violations.push(format!(
                "field '{}' occurs {count} time(s), minimum is {}",
                self.name, self.min_occurs
            ));
        }
        if let Some(max) = self.max_occurs {
            if count > max {
                violations.push(format!(
                    "field '{}' occurs {count} time(s), maximum is {max}",
                    self.name
                ));
            }
        }

        for value in record.values(&self.name) {
            match self.field_type.parse(value) {
                Err(reason) => {
                    violations.push(format!("field '{}': {reason}", self.name));
                }
                Ok(Some(number)) => {
                    if let Some(min) = self.min_value {
                        if number < min {
                            violations.push(format!(
                                "field '{}': value {number} is below minimum {min}",
                                self.name
                            ));
                        }
                    }
                    if let Some(max) = self.max_value {
                        if number > max {
                            violations.push(format!(
                                "field '{}': value {number} is above maximum {max}",
                                self.name
                            ));
                        }
                    }
                }
                Ok(None) => {}
            }

            if !self.allowed_values.is_empty() && !self.allowed_values.iter().any(|v| v == value) {
                violations.push(format!(
                    "field '{}': '{value}' is not in the controlled vocabulary",
                    self.name
                ));
            }
        }
    }
}

/// Full set of loaded field rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaValidator {
    pub fields: Vec<ValidationSchemaField>,
}

impl SchemaValidator {
    /// Parse the JSON schema definition document
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// All violations of all applicable rules; never short-circuits
    pub fn validate(&self, record: &Record, schema: Option<&str>) -> Vec<String> {
        let mut violations = Vec::new();

        for field in &self.fields {
            if field.applies_to(record.record_type, schema) {
                field.check(record, &mut violations);
            }
        }

        violations
    }
}
