//! Driver-aware field extraction.
//!
//! Column discovery, display rendering, and the transformation engine all
//! read source records through the same [`FieldExtractor`] so that preview
//! and import can never disagree about what a column holds.

use serde_json::Value;

use crate::driver::DriverKind;

/// Page-database property types that never materialize into a value.
pub const NON_MATERIALIZABLE_TYPES: &[&str] = &["button", "rollup", "relation"];

pub trait FieldExtractor: Send + Sync {
    fn kind(&self) -> DriverKind;

    /// Column names contributed by a single record, in record order.
    fn columns(&self, record: &Value) -> Vec<String>;

    /// Raw value of `column`. `None` means the column is absent from the
    /// record; `Some(Value::Null)` is an explicit null.
    fn extract(&self, record: &Value, column: &str) -> Option<Value>;
}

pub struct DocumentStoreExtractor;
pub struct PageDatabaseExtractor;
pub struct FlatExtractor;
pub struct UnrecognizedExtractor;

static DOCUMENT_STORE: DocumentStoreExtractor = DocumentStoreExtractor;
static PAGE_DATABASE: PageDatabaseExtractor = PageDatabaseExtractor;
static FLAT: FlatExtractor = FlatExtractor;
static UNRECOGNIZED: UnrecognizedExtractor = UnrecognizedExtractor;

pub fn extractor_for(kind: DriverKind) -> &'static dyn FieldExtractor {
    match kind {
        DriverKind::DocumentStoreExport => &DOCUMENT_STORE,
        DriverKind::PageDatabaseExport => &PAGE_DATABASE,
        DriverKind::GenericFlatObject => &FLAT,
        DriverKind::Unrecognized => &UNRECOGNIZED,
    }
}

/// Extractor for already-transformed, driver-agnostic records.
pub fn flat_extractor() -> &'static dyn FieldExtractor {
    &FLAT
}

impl FieldExtractor for DocumentStoreExtractor {
    fn kind(&self) -> DriverKind {
        DriverKind::DocumentStoreExport
    }

    fn columns(&self, record: &Value) -> Vec<String> {
        let mut columns = vec!["id".to_string()];
        if let Some(properties) = record.get("properties").and_then(Value::as_object) {
            columns.extend(properties.keys().filter(|k| *k != "id").cloned());
        }
        columns
    }

    fn extract(&self, record: &Value, column: &str) -> Option<Value> {
        let properties = record.get("properties").and_then(Value::as_object);
        if column == "id" {
            return record
                .get("id")
                .or_else(|| properties.and_then(|p| p.get("id")))
                .cloned();
        }
        properties.and_then(|p| p.get(column)).cloned()
    }
}

impl FieldExtractor for PageDatabaseExtractor {
    fn kind(&self) -> DriverKind {
        DriverKind::PageDatabaseExport
    }

    fn columns(&self, record: &Value) -> Vec<String> {
        let Some(properties) = record.get("properties").and_then(Value::as_object) else {
            return Vec::new();
        };
        properties
            .iter()
            .filter(|(_, property)| is_materializable(property))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn extract(&self, record: &Value, column: &str) -> Option<Value> {
        let property = record.get("properties")?.get(column)?;
        if !is_materializable(property) {
            return None;
        }
        decode_property(property)
    }
}

impl FieldExtractor for FlatExtractor {
    fn kind(&self) -> DriverKind {
        DriverKind::GenericFlatObject
    }

    fn columns(&self, record: &Value) -> Vec<String> {
        record
            .as_object()
            .map(|object| object.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn extract(&self, record: &Value, column: &str) -> Option<Value> {
        record.get(column).cloned()
    }
}

impl FieldExtractor for UnrecognizedExtractor {
    fn kind(&self) -> DriverKind {
        DriverKind::Unrecognized
    }

    fn columns(&self, _record: &Value) -> Vec<String> {
        Vec::new()
    }

    fn extract(&self, _record: &Value, _column: &str) -> Option<Value> {
        None
    }
}

fn property_type(property: &Value) -> Option<&str> {
    property.get("type").and_then(Value::as_str)
}

fn is_materializable(property: &Value) -> bool {
    match property_type(property) {
        Some(kind) => !NON_MATERIALIZABLE_TYPES.contains(&kind),
        None => false,
    }
}

/// Decodes a typed page-database property into a plain value.
pub fn decode_property(property: &Value) -> Option<Value> {
    let kind = property_type(property)?;
    let body = property.get(kind)?;
    match kind {
        "title" | "rich_text" => first_text_run(body),
        "number" | "checkbox" | "url" | "email" | "phone_number" | "created_time"
        | "last_edited_time" => Some(body.clone()),
        "select" | "status" => Some(option_name(body)),
        "multi_select" => Some(collect_array(body, |item| {
            item.get("name").and_then(Value::as_str).map(str::to_string)
        })),
        "date" => Some(date_start(body)),
        "people" => Some(collect_array(body, user_id)),
        "created_by" | "last_edited_by" => {
            Some(user_id(body).map(Value::String).unwrap_or(Value::Null))
        }
        "files" => Some(collect_array(body, |item| {
            item.get("name").and_then(Value::as_str).map(str::to_string)
        })),
        "formula" => decode_formula(body),
        "unique_id" => Some(unique_id(body)),
        _ => None,
    }
}

fn first_text_run(body: &Value) -> Option<Value> {
    let run = body.as_array()?.first()?;
    let text = run
        .get("plain_text")
        .and_then(Value::as_str)
        .or_else(|| {
            run.get("text")
                .and_then(|text| text.get("content"))
                .and_then(Value::as_str)
        })?;
    Some(Value::String(text.to_string()))
}

fn option_name(body: &Value) -> Value {
    body.get("name")
        .and_then(Value::as_str)
        .map(|name| Value::String(name.to_string()))
        .unwrap_or(Value::Null)
}

fn date_start(body: &Value) -> Value {
    body.get("start")
        .and_then(Value::as_str)
        .map(|start| Value::String(start.to_string()))
        .unwrap_or(Value::Null)
}

fn user_id(user: &Value) -> Option<String> {
    user.get("id").and_then(Value::as_str).map(str::to_string)
}

fn collect_array<F>(body: &Value, pick: F) -> Value
where
    F: Fn(&Value) -> Option<String>,
{
    let items: Vec<Value> = body
        .as_array()
        .map(|items| items.iter().filter_map(&pick).map(Value::String).collect())
        .unwrap_or_default();
    Value::Array(items)
}

fn decode_formula(body: &Value) -> Option<Value> {
    let subtype = body.get("type").and_then(Value::as_str)?;
    let resolved = body.get(subtype)?;
    if subtype == "date" {
        return Some(date_start(resolved));
    }
    Some(resolved.clone())
}

fn unique_id(body: &Value) -> Value {
    let number = body.get("number").filter(|n| !n.is_null());
    let prefix = body
        .get("prefix")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty());
    match (prefix, number) {
        (Some(prefix), Some(number)) => Value::String(format!("{prefix}-{number}")),
        (None, Some(number)) => Value::String(number.to_string()),
        _ => Value::Null,
    }
}

/// Collects the union of columns over `records`, deduplicated and sorted.
pub fn union_columns<'a, I>(extractor: &dyn FieldExtractor, records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut seen = std::collections::BTreeSet::new();
    for record in records {
        seen.extend(extractor.columns(record));
    }
    seen.into_iter().collect()
}
