//! Table and column mappings plus the persisted mapping plan.
//!
//! A plan records the operator's choices keyed by source table name:
//! which target collection each table feeds, and for mapped tables which
//! target field (or a synthesized new field) each source column feeds.

use std::{collections::BTreeMap, fmt, path::Path};

use anyhow::{Context, Result};
use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};

use crate::{
    staging::StagedDataset,
    target::{FieldType, TargetCollection},
    yaml,
};

const SKIP_TOKEN: &str = "(skip)";
const SYNTHESIZE_TOKEN: &str = "(new)";
const EMPTY_SLUG: &str = "field";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TableTarget {
    #[default]
    Skip,
    Collection(String),
}

impl TableTarget {
    pub fn collection(&self) -> Option<&str> {
        match self {
            TableTarget::Skip => None,
            TableTarget::Collection(key) => Some(key),
        }
    }
}

impl From<String> for TableTarget {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == SKIP_TOKEN {
            TableTarget::Skip
        } else {
            TableTarget::Collection(trimmed.to_string())
        }
    }
}

impl From<TableTarget> for String {
    fn from(value: TableTarget) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableTarget::Skip => f.write_str(SKIP_TOKEN),
            TableTarget::Collection(key) => f.write_str(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnTarget {
    #[default]
    Skip,
    Field(String),
    Synthesize,
}

impl ColumnTarget {
    pub fn is_skip(&self) -> bool {
        matches!(self, ColumnTarget::Skip)
    }
}

impl From<String> for ColumnTarget {
    fn from(value: String) -> Self {
        match value.trim() {
            "" | SKIP_TOKEN => ColumnTarget::Skip,
            SYNTHESIZE_TOKEN => ColumnTarget::Synthesize,
            other => ColumnTarget::Field(other.to_string()),
        }
    }
}

impl From<ColumnTarget> for String {
    fn from(value: ColumnTarget) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ColumnTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnTarget::Skip => f.write_str(SKIP_TOKEN),
            ColumnTarget::Field(name) => f.write_str(name),
            ColumnTarget::Synthesize => f.write_str(SYNTHESIZE_TOKEN),
        }
    }
}

/// Column targets of one table, keyed by source column.
pub type ColumnMapping = BTreeMap<String, ColumnTarget>;

/// Declared types of synthesized fields of one table, keyed by source column.
pub type NewFieldTypes = BTreeMap<String, FieldType>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingPlan {
    #[serde(default)]
    pub tables: BTreeMap<String, TableTarget>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, ColumnMapping>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub new_field_types: BTreeMap<String, NewFieldTypes>,
}

impl MappingPlan {
    /// The initial wizard state: suggested table targets, every column skipped.
    pub fn starter(dataset: &StagedDataset, collections: &[TargetCollection]) -> Self {
        let mut plan = MappingPlan::default();
        for table in &dataset.tables {
            let target = suggest_table(&table.source_name, collections);
            if target != TableTarget::Skip {
                plan.columns
                    .insert(table.source_name.clone(), skipped_columns(&table.detected_columns));
            }
            plan.tables.insert(table.source_name.clone(), target);
        }
        plan
    }

    pub fn load(path: &Path) -> Result<Self> {
        yaml::load_from_path(path).with_context(|| format!("Loading mapping plan from {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        yaml::save_to_path(path, self).with_context(|| format!("Writing mapping plan to {path:?}"))
    }
}

pub fn skipped_columns(columns: &[String]) -> ColumnMapping {
    columns
        .iter()
        .map(|column| (column.clone(), ColumnTarget::Skip))
        .collect()
}

/// Suggests a collection when the table's slug matches a collection's key
/// or label slug.
pub fn suggest_table(source_name: &str, collections: &[TargetCollection]) -> TableTarget {
    let source = slug(source_name);
    collections
        .iter()
        .find(|collection| {
            slug(&collection.key) == source
                || (!collection.label.is_empty() && slug(&collection.label) == source)
                || collection.display_label().eq_ignore_ascii_case(source_name.trim())
        })
        .map(|collection| TableTarget::Collection(collection.key.clone()))
        .unwrap_or_default()
}

/// Lowercase snake-case identifier; never empty.
pub fn slug(value: &str) -> String {
    let converted = value.to_snake_case();
    if converted.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        converted
    }
}
