//! Starter export files for operators.
//!
//! A template uses the typed export shape with the `template` driver: one
//! payload entry per selected collection, each holding a single record of
//! type-appropriate placeholders.

use chrono::Utc;
use serde_json::{Map, Value, json};

use crate::{
    driver::TEMPLATE_DRIVER,
    error::StepError,
    target::{FieldType, TargetCollection, TargetField},
};

pub fn generate(collections: &[TargetCollection], keys: &[String]) -> Result<Value, StepError> {
    let payload = keys
        .iter()
        .map(|key| {
            let collection = collections
                .iter()
                .find(|c| c.key == *key)
                .ok_or_else(|| StepError::UnknownCollection(key.clone()))?;
            Ok(json!({
                "name": collection.display_label(),
                "records": [sample_record(collection)],
            }))
        })
        .collect::<Result<Vec<_>, StepError>>()?;
    Ok(json!({
        "driver": TEMPLATE_DRIVER,
        "payload": payload,
    }))
}

fn sample_record(collection: &TargetCollection) -> Value {
    let record = collection
        .fields
        .iter()
        .map(|field| (field.name.clone(), placeholder(field)))
        .collect::<Map<_, _>>();
    Value::Object(record)
}

fn placeholder(field: &TargetField) -> Value {
    match field.field_type {
        FieldType::String => Value::String(format!("Example {}", field.name)),
        FieldType::Number => json!(0),
        FieldType::Boolean => Value::Bool(false),
        FieldType::Date => Value::String(Utc::now().date_naive().format("%Y-%m-%d").to_string()),
        FieldType::Array => json!([format!("Example {}", field.name)]),
        FieldType::Object => json!({"key": "value"}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetSchema;

    #[test]
    fn template_has_one_placeholder_record_per_collection() {
        let schema = TargetSchema::example();
        let template = generate(&schema.collections, &["venues".into(), "djs".into()]).unwrap();
        assert_eq!(template["driver"], "template");
        let payload = template["payload"].as_array().unwrap();
        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0]["name"], "Venues");
        let record = &payload[0]["records"][0];
        assert_eq!(record["capacity"], json!(0));
        assert_eq!(record["indoor"], json!(false));
        assert_eq!(record["name"], json!("Example name"));
        assert!(payload[1]["records"][0]["genres"].is_array());
    }

    #[test]
    fn placeholder_fields_follow_schema_order() {
        let schema = TargetSchema::example();
        let template = generate(&schema.collections, &["venues".into()]).unwrap();
        let record = template["payload"][0]["records"][0].as_object().unwrap();
        let fields: Vec<_> = record.keys().map(String::as_str).collect();
        assert_eq!(fields, schema.collection("venues").unwrap().field_names());
    }

    #[test]
    fn unknown_collection_is_rejected() {
        let schema = TargetSchema::example();
        let err = generate(&schema.collections, &["invoices".into()]).unwrap_err();
        assert!(matches!(err, StepError::UnknownCollection(key) if key == "invoices"));
    }
}
