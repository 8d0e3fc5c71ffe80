//! Target schema model and provider seam.
//!
//! The target schema is read-only for the wizard: a list of collections,
//! each with a storage-facing name and an ordered list of legal fields.
//! Schemas come from YAML files or the built-in example.

use std::{fmt, path::Path, str::FromStr};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{error::StepError, yaml};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

impl FieldType {
    pub const ALL: [FieldType; 6] = [
        FieldType::String,
        FieldType::Number,
        FieldType::Boolean,
        FieldType::Date,
        FieldType::Array,
        FieldType::Object,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }

    pub fn expected_list() -> String {
        FieldType::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = StepError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str() == lowered)
            .ok_or_else(|| StepError::UnknownFieldType {
                found: value.to_string(),
                expected: FieldType::expected_list(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetField {
    pub name: String,
    #[serde(rename = "type", default = "TargetField::default_type")]
    pub field_type: FieldType,
}

impl TargetField {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
        }
    }

    const fn default_type() -> FieldType {
        FieldType::String
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCollection {
    /// Stable key used in mapping plans.
    pub key: String,
    /// Storage-facing collection name.
    pub name: String,
    #[serde(default)]
    pub label: String,
    pub fields: Vec<TargetField>,
}

impl TargetCollection {
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.key
        } else {
            &self.label
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

/// Source of the fixed target schema. Implementations may be network
/// backed; a failed call must not yield a partial list.
pub trait TargetSchemaProvider {
    fn collections(&self) -> Result<Vec<TargetCollection>, StepError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSchema {
    pub collections: Vec<TargetCollection>,
}

impl TargetSchemaProvider for TargetSchema {
    fn collections(&self) -> Result<Vec<TargetCollection>, StepError> {
        Ok(self.collections.clone())
    }
}

impl TargetSchema {
    pub fn load(path: &Path) -> Result<Self> {
        yaml::load_from_path(path).with_context(|| format!("Loading target schema from {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        yaml::save_to_path(path, self).with_context(|| format!("Writing target schema to {path:?}"))
    }

    pub fn collection(&self, key: &str) -> Option<&TargetCollection> {
        self.collections.iter().find(|c| c.key == key)
    }

    /// The bundled schema for the events platform (DJs, venues, events).
    pub fn example() -> Self {
        let collection = |key: &str, name: &str, label: &str, fields: &[(&str, FieldType)]| {
            TargetCollection {
                key: key.to_string(),
                name: name.to_string(),
                label: label.to_string(),
                fields: fields
                    .iter()
                    .map(|(field, ty)| TargetField::new(field, *ty))
                    .collect(),
            }
        };
        TargetSchema {
            collections: vec![
                collection(
                    "djs",
                    "djs",
                    "DJs",
                    &[
                        ("name", FieldType::String),
                        ("bio", FieldType::String),
                        ("genres", FieldType::Array),
                        ("email", FieldType::String),
                        ("instagram", FieldType::String),
                        ("fee", FieldType::Number),
                        ("active", FieldType::Boolean),
                    ],
                ),
                collection(
                    "venues",
                    "venues",
                    "Venues",
                    &[
                        ("name", FieldType::String),
                        ("address", FieldType::String),
                        ("city", FieldType::String),
                        ("capacity", FieldType::Number),
                        ("website", FieldType::String),
                        ("indoor", FieldType::Boolean),
                    ],
                ),
                collection(
                    "events",
                    "events",
                    "Events",
                    &[
                        ("title", FieldType::String),
                        ("date", FieldType::Date),
                        ("venue", FieldType::String),
                        ("lineup", FieldType::Array),
                        ("ticket_price", FieldType::Number),
                        ("sold_out", FieldType::Boolean),
                        ("notes", FieldType::String),
                    ],
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_parses_case_insensitively() {
        assert_eq!("Number".parse::<FieldType>().unwrap(), FieldType::Number);
        let err = "decimal".parse::<FieldType>().unwrap_err();
        assert!(err.to_string().contains("string, number, boolean"));
    }

    #[test]
    fn example_schema_lists_ordered_fields() {
        let schema = TargetSchema::example();
        let venues = schema.collection("venues").expect("venues");
        assert_eq!(venues.field_names()[..2], ["name", "address"]);
        assert!(venues.has_field("capacity"));
        assert_eq!(venues.display_label(), "Venues");
    }

    #[test]
    fn schema_yaml_defaults_field_type_to_string() {
        let yaml = "collections:\n  - key: widgets\n    name: widget_store\n    fields:\n      - name: name\n      - name: qty\n        type: number\n";
        let schema: TargetSchema = serde_yaml::from_str(yaml).expect("parse");
        let widgets = &schema.collections[0];
        assert_eq!(widgets.fields[0].field_type, FieldType::String);
        assert_eq!(widgets.fields[1].field_type, FieldType::Number);
        assert_eq!(widgets.display_label(), "widgets");
    }
}
