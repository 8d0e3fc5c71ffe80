//! The transformation engine.
//!
//! A table's column mapping is compiled once into a [`TablePlan`]: concrete
//! target fields are validated against the collection and synthesized keys
//! are resolved collision-free. Preview and import both transform through
//! the same plan, so a record produces identical output on either path.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    driver::DriverKind,
    error::StepError,
    extract::extractor_for,
    mapping::{ColumnMapping, ColumnTarget, MappingPlan, NewFieldTypes, slug},
    staging::{StagedDataset, StagedTable},
    target::{FieldType, TargetCollection},
};

pub const SYNTHESIZED_SUFFIX: &str = "_new";

/// A flat record keyed by target field names.
pub type TransformedRecord = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResolvedTarget {
    Existing,
    Synthesized(FieldType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnPlan {
    pub column: String,
    pub key: String,
    pub target: ResolvedTarget,
}

impl ColumnPlan {
    pub fn is_synthesized(&self) -> bool {
        matches!(self.target, ResolvedTarget::Synthesized(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePlan {
    pub table: String,
    pub collection: String,
    pub driver_kind: DriverKind,
    pub columns: Vec<ColumnPlan>,
}

impl TablePlan {
    /// Validates a table's column mapping against its collection and
    /// resolves every synthesized key.
    pub fn compile(
        table: &str,
        mapping: &ColumnMapping,
        new_field_types: &NewFieldTypes,
        driver_kind: DriverKind,
        collection: &TargetCollection,
    ) -> Result<Self, StepError> {
        let mut reserved: BTreeSet<String> = collection
            .fields
            .iter()
            .map(|field| field.name.clone())
            .collect();
        let mut concrete: BTreeMap<&str, &str> = BTreeMap::new();
        let mut columns = Vec::new();

        for (column, target) in mapping {
            let ColumnTarget::Field(field) = target else {
                continue;
            };
            if !collection.has_field(field) {
                return Err(StepError::UnknownTargetField {
                    table: table.to_string(),
                    column: column.clone(),
                    field: field.clone(),
                    collection: collection.key.clone(),
                });
            }
            if let Some(previous) = concrete.insert(field.as_str(), column.as_str()) {
                warn!(
                    "Table '{table}': columns '{previous}' and '{column}' both target field '{field}'; the last non-empty value wins"
                );
            }
            reserved.insert(field.clone());
            columns.push(ColumnPlan {
                column: column.clone(),
                key: field.clone(),
                target: ResolvedTarget::Existing,
            });
        }

        for (column, target) in mapping {
            if *target != ColumnTarget::Synthesize {
                continue;
            }
            let field_type =
                *new_field_types
                    .get(column)
                    .ok_or_else(|| StepError::MissingNewFieldType {
                        table: table.to_string(),
                        column: column.clone(),
                        expected: FieldType::expected_list(),
                    })?;
            let key = synthesized_key(column, &reserved);
            debug!("Table '{table}': column '{column}' synthesizes '{key}' ({field_type})");
            reserved.insert(key.clone());
            columns.push(ColumnPlan {
                column: column.clone(),
                key,
                target: ResolvedTarget::Synthesized(field_type),
            });
        }

        Ok(Self {
            table: table.to_string(),
            collection: collection.key.clone(),
            driver_kind,
            columns,
        })
    }

    /// Synthesized keys and their declared types.
    pub fn new_fields(&self) -> BTreeMap<String, FieldType> {
        self.columns
            .iter()
            .filter_map(|plan| match plan.target {
                ResolvedTarget::Synthesized(field_type) => Some((plan.key.clone(), field_type)),
                ResolvedTarget::Existing => None,
            })
            .collect()
    }

    /// Transforms one source record; `None` when nothing non-null survives.
    pub fn transform(&self, record: &Value) -> Option<TransformedRecord> {
        let extractor = extractor_for(self.driver_kind);
        let mut output = TransformedRecord::new();
        let mut kept = false;

        for plan in &self.columns {
            let value = match extractor.extract(record, &plan.column) {
                Some(raw) => coerce(raw),
                None if plan.is_synthesized() => continue,
                None => Value::Null,
            };
            if value.is_null() {
                if plan.is_synthesized() {
                    output.insert(plan.key.clone(), Value::Null);
                }
                continue;
            }
            output.insert(plan.key.clone(), value);
            kept = true;
        }

        kept.then_some(output)
    }

    /// Transforms every record, dropping the ones that contribute nothing.
    pub fn transform_all<'a, I>(&self, records: I) -> Vec<TransformedRecord>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        records
            .into_iter()
            .filter_map(|record| self.transform(record))
            .collect()
    }
}

/// A staged table mapped onto a collection, with its compiled plan.
#[derive(Debug, Clone)]
pub struct MappedTable<'a> {
    pub table: &'a StagedTable,
    pub collection: &'a TargetCollection,
    pub plan: TablePlan,
}

/// Compiles a plan for every non-skipped table, in staging order.
pub fn compile_mapped<'a>(
    dataset: &'a StagedDataset,
    mapping: &MappingPlan,
    collections: &'a [TargetCollection],
) -> Result<Vec<MappedTable<'a>>, StepError> {
    let empty_columns = ColumnMapping::new();
    let empty_types = NewFieldTypes::new();
    let mut mapped = Vec::new();
    for table in &dataset.tables {
        let Some(key) = mapping
            .tables
            .get(&table.source_name)
            .and_then(|target| target.collection())
        else {
            continue;
        };
        let collection = collections
            .iter()
            .find(|collection| collection.key == key)
            .ok_or_else(|| StepError::UnknownCollection(key.to_string()))?;
        let plan = TablePlan::compile(
            &table.source_name,
            mapping.columns.get(&table.source_name).unwrap_or(&empty_columns),
            mapping
                .new_field_types
                .get(&table.source_name)
                .unwrap_or(&empty_types),
            dataset.driver_kind,
            collection,
        )?;
        mapped.push(MappedTable {
            table,
            collection,
            plan,
        });
    }
    Ok(mapped)
}

/// One-shot transformation of a single record through a freshly compiled plan.
pub fn transform_record(
    record: &Value,
    mapping: &ColumnMapping,
    new_field_types: &NewFieldTypes,
    driver_kind: DriverKind,
    collection: &TargetCollection,
) -> Result<Option<TransformedRecord>, StepError> {
    let plan = TablePlan::compile(&collection.key, mapping, new_field_types, driver_kind, collection)?;
    Ok(plan.transform(record))
}

/// Light coercion: yes/no strings become booleans, empty values become null.
pub fn coerce(raw: Value) -> Value {
    match raw {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Value::Null
            } else if trimmed.eq_ignore_ascii_case("yes") {
                Value::Bool(true)
            } else if trimmed.eq_ignore_ascii_case("no") {
                Value::Bool(false)
            } else {
                Value::String(text)
            }
        }
        Value::Array(items) if items.is_empty() => Value::Null,
        other => other,
    }
}

/// `slug(column)_new`, then `_new1`, `_new2`, ... until unused.
pub fn synthesized_key(column: &str, reserved: &BTreeSet<String>) -> String {
    let base = format!("{}{SYNTHESIZED_SUFFIX}", slug(column));
    if !reserved.contains(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !reserved.contains(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetField;
    use serde_json::json;

    fn widgets() -> TargetCollection {
        TargetCollection {
            key: "widgets".into(),
            name: "widget_store".into(),
            label: "Widgets".into(),
            fields: vec![
                TargetField::new("name", FieldType::String),
                TargetField::new("flag", FieldType::Boolean),
                TargetField::new("qty_new", FieldType::Number),
            ],
        }
    }

    fn mapping(pairs: &[(&str, ColumnTarget)]) -> ColumnMapping {
        pairs
            .iter()
            .map(|(column, target)| (column.to_string(), target.clone()))
            .collect()
    }

    #[test]
    fn coercion_handles_yes_no_and_empties() {
        assert_eq!(coerce(json!("YES")), json!(true));
        assert_eq!(coerce(json!(" no ")), json!(false));
        assert_eq!(coerce(json!("")), Value::Null);
        assert_eq!(coerce(json!([])), Value::Null);
        assert_eq!(coerce(json!("maybe")), json!("maybe"));
        assert_eq!(coerce(json!(0)), json!(0));
    }

    #[test]
    fn synthesized_keys_avoid_real_fields() {
        let map = mapping(&[("qty", ColumnTarget::Synthesize)]);
        let types = NewFieldTypes::from([("qty".to_string(), FieldType::Number)]);
        let plan =
            TablePlan::compile("Widgets", &map, &types, DriverKind::GenericFlatObject, &widgets())
                .unwrap();
        assert_eq!(plan.columns[0].key, "qty_new1");
    }

    #[test]
    fn colliding_slugs_get_numbered_suffixes() {
        let map = mapping(&[
            ("Ticket Price", ColumnTarget::Synthesize),
            ("ticketPrice", ColumnTarget::Synthesize),
            ("ticket_price", ColumnTarget::Synthesize),
        ]);
        let types = map
            .keys()
            .map(|column| (column.clone(), FieldType::Number))
            .collect();
        let plan =
            TablePlan::compile("T", &map, &types, DriverKind::GenericFlatObject, &widgets()).unwrap();
        let keys: Vec<_> = plan.columns.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["ticket_price_new", "ticket_price_new1", "ticket_price_new2"]);
    }

    #[test]
    fn missing_new_field_type_blocks_compilation() {
        let map = mapping(&[("qty", ColumnTarget::Synthesize)]);
        let err = TablePlan::compile(
            "Widgets",
            &map,
            &NewFieldTypes::new(),
            DriverKind::GenericFlatObject,
            &widgets(),
        )
        .unwrap_err();
        assert!(matches!(err, StepError::MissingNewFieldType { .. }));
    }

    #[test]
    fn unknown_concrete_field_is_rejected() {
        let map = mapping(&[("title", ColumnTarget::Field("label".into()))]);
        let err = TablePlan::compile(
            "Widgets",
            &map,
            &NewFieldTypes::new(),
            DriverKind::GenericFlatObject,
            &widgets(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'label'"));
    }

    #[test]
    fn explicit_null_is_kept_only_on_synthesized_fields_of_surviving_records() {
        let map = mapping(&[
            ("a", ColumnTarget::Field("name".into())),
            ("b", ColumnTarget::Synthesize),
            ("c", ColumnTarget::Field("flag".into())),
        ]);
        let types = NewFieldTypes::from([("b".to_string(), FieldType::String)]);
        let plan =
            TablePlan::compile("T", &map, &types, DriverKind::GenericFlatObject, &widgets()).unwrap();

        let kept = plan.transform(&json!({"a": "x", "b": null, "c": null})).unwrap();
        assert_eq!(Value::Object(kept), json!({"name": "x", "b_new": null}));

        let partial = plan.transform(&json!({"a": "x"})).unwrap();
        assert_eq!(Value::Object(partial), json!({"name": "x"}));

        assert_eq!(plan.transform(&json!({"a": "", "b": null})), None);
    }

    #[test]
    fn last_non_empty_value_wins_for_shared_targets() {
        let map = mapping(&[
            ("first", ColumnTarget::Field("name".into())),
            ("second", ColumnTarget::Field("name".into())),
        ]);
        let plan = TablePlan::compile(
            "T",
            &map,
            &NewFieldTypes::new(),
            DriverKind::GenericFlatObject,
            &widgets(),
        )
        .unwrap();
        let record = plan.transform(&json!({"first": "a", "second": "b"})).unwrap();
        assert_eq!(record["name"], json!("b"));
        let record = plan.transform(&json!({"first": "a", "second": ""})).unwrap();
        assert_eq!(record["name"], json!("a"));
    }
}
