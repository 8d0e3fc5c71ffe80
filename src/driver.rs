//! Export shape detection.
//!
//! A parsed export is classified into one [`DriverKind`] and split into its
//! raw tables. Typed exports carry an explicit `driver` discriminator next
//! to a `payload` array; anything else must be an object whose values are
//! all arrays, one table per key.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StepError;

const PAGE_DATABASE_DRIVERS: &[&str] = &["notion", "page-database", "pagedb"];
const DOCUMENT_STORE_DRIVERS: &[&str] = &["firestore", "documentstore", "document-store", "docstore"];
pub const TEMPLATE_DRIVER: &str = "template";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverKind {
    PageDatabaseExport,
    DocumentStoreExport,
    GenericFlatObject,
    Unrecognized,
}

impl DriverKind {
    pub fn label(&self) -> &'static str {
        match self {
            DriverKind::PageDatabaseExport => "Page database export (typed properties)",
            DriverKind::DocumentStoreExport => "Document store export (id + properties)",
            DriverKind::GenericFlatObject => "Generic JSON object (one table per key)",
            DriverKind::Unrecognized => "Unrecognized",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverKind::PageDatabaseExport => "page-database",
            DriverKind::DocumentStoreExport => "document-store",
            DriverKind::GenericFlatObject => "flat-object",
            DriverKind::Unrecognized => "unrecognized",
        };
        f.write_str(name)
    }
}

/// One source table as found in the file, before column discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub name: String,
    pub records: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub kind: DriverKind,
    pub label: String,
    pub tables: Vec<RawTable>,
}

/// Maps a `driver` discriminator onto a kind. Template exports hold plain
/// records and decode like flat objects.
pub fn kind_for_driver(driver: &str) -> DriverKind {
    let lowered = driver.trim().to_ascii_lowercase();
    if PAGE_DATABASE_DRIVERS.contains(&lowered.as_str()) {
        DriverKind::PageDatabaseExport
    } else if DOCUMENT_STORE_DRIVERS.contains(&lowered.as_str()) {
        DriverKind::DocumentStoreExport
    } else if lowered == TEMPLATE_DRIVER {
        DriverKind::GenericFlatObject
    } else {
        DriverKind::Unrecognized
    }
}

pub fn detect(file_name: &str, value: Value) -> Result<Detection, StepError> {
    let mut object = match value {
        Value::Object(object) => object,
        other => {
            return Err(StepError::UnrecognizedShape {
                file: file_name.to_string(),
                found: describe_shape(&other),
            });
        }
    };

    if let Some(driver) = typed_driver(&object).map(str::to_string) {
        let kind = kind_for_driver(&driver);
        if kind == DriverKind::Unrecognized {
            return Err(StepError::UnknownDriver {
                file: file_name.to_string(),
                driver,
                expected: known_drivers(),
            });
        }
        let payload = match object.remove("payload") {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        };
        let tables = split_payload(file_name, payload)?;
        let label = if driver.eq_ignore_ascii_case(TEMPLATE_DRIVER) {
            "Template export (plain records)".to_string()
        } else {
            format!("{} [driver: {driver}]", kind.label())
        };
        return Ok(Detection {
            kind,
            label,
            tables,
        });
    }

    if let Some((key, bad)) = object.iter().find(|(_, value)| !value.is_array()) {
        return Err(StepError::UnrecognizedShape {
            file: file_name.to_string(),
            found: format!("key '{key}' holding {}", describe_shape(bad)),
        });
    }

    let tables = object
        .into_iter()
        .map(|(name, records)| RawTable {
            name,
            records: match records {
                Value::Array(items) => items,
                _ => Vec::new(),
            },
        })
        .collect();
    Ok(Detection {
        kind: DriverKind::GenericFlatObject,
        label: DriverKind::GenericFlatObject.label().to_string(),
        tables,
    })
}

fn typed_driver(object: &Map<String, Value>) -> Option<&str> {
    let driver = object.get("driver")?.as_str()?;
    object.get("payload")?.as_array()?;
    Some(driver)
}

fn split_payload(file_name: &str, payload: Vec<Value>) -> Result<Vec<RawTable>, StepError> {
    payload
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            let mut entry = match entry {
                Value::Object(entry) => entry,
                other => {
                    return Err(StepError::UnrecognizedShape {
                        file: file_name.to_string(),
                        found: format!(
                            "payload entry {} holding {}",
                            idx + 1,
                            describe_shape(&other)
                        ),
                    });
                }
            };
            let name = table_name(&entry, idx);
            let records = match entry.remove("records") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            Ok(RawTable { name, records })
        })
        .collect()
}

fn table_name(entry: &Map<String, Value>, idx: usize) -> String {
    ["name", "databaseName", "databaseId"]
        .iter()
        .filter_map(|key| entry.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Table {}", idx + 1))
}

fn known_drivers() -> String {
    PAGE_DATABASE_DRIVERS
        .iter()
        .chain(DOCUMENT_STORE_DRIVERS)
        .chain(std::iter::once(&TEMPLATE_DRIVER))
        .map(|d| format!("'{d}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn describe_shape(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(_) => "a number".to_string(),
        Value::String(_) => "a string".to_string(),
        Value::Array(items) => format!("an array of {} item(s)", items.len()),
        Value::Object(map) => format!("an object with {} key(s)", map.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_payload_uses_name_fallbacks() {
        let value = json!({
            "driver": "notion",
            "payload": [
                {"databaseName": "Gigs", "records": []},
                {"databaseId": "abc", "records": [{}]},
                {"records": []}
            ]
        });
        let detection = detect("export.json", value).unwrap();
        assert_eq!(detection.kind, DriverKind::PageDatabaseExport);
        let names: Vec<_> = detection.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Gigs", "abc", "Table 3"]);
        assert_eq!(detection.tables[1].records.len(), 1);
    }

    #[test]
    fn discriminator_is_case_insensitive() {
        assert_eq!(kind_for_driver("Firestore"), DriverKind::DocumentStoreExport);
        assert_eq!(kind_for_driver("DocumentStore"), DriverKind::DocumentStoreExport);
        assert_eq!(kind_for_driver("TEMPLATE"), DriverKind::GenericFlatObject);
        assert_eq!(kind_for_driver("mongo"), DriverKind::Unrecognized);
    }

    #[test]
    fn flat_object_becomes_one_table_per_key() {
        let detection = detect("flat.json", json!({"Items": [{"a": 1}], "Other": []})).unwrap();
        assert_eq!(detection.kind, DriverKind::GenericFlatObject);
        assert_eq!(detection.tables.len(), 2);
        assert_eq!(detection.tables[0].name, "Items");
    }

    #[test]
    fn scalar_values_are_rejected_with_context() {
        let err = detect("bad.json", json!({"Items": [], "count": 3})).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("key 'count' holding a number"), "{message}");
        assert!(detect("bad.json", json!([1, 2])).is_err());
    }

    #[test]
    fn unknown_driver_lists_expected_values() {
        let err = detect("x.json", json!({"driver": "mongo", "payload": []})).unwrap_err();
        assert!(err.to_string().contains("'firestore'"));
    }

    #[test]
    fn driver_without_payload_array_is_treated_as_flat_candidate() {
        assert!(matches!(
            detect("x.json", json!({"driver": "notion"})),
            Err(StepError::UnrecognizedShape { .. })
        ));
        let detection = detect("x.json", json!({"driver": ["x"], "payload": []})).unwrap();
        assert_eq!(detection.kind, DriverKind::GenericFlatObject);
        let names: Vec<_> = detection.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["driver", "payload"]);
    }

    #[test]
    fn flat_tables_keep_file_order() {
        let raw = r#"{"Zeta": [{"z": 1}], "Alpha": [], "Mid": [{"m": 2}]}"#;
        let detection = detect("flat.json", serde_json::from_str(raw).unwrap()).unwrap();
        let names: Vec<_> = detection.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }
}
