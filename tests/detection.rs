mod common;

use export_migrate::{
    driver::DriverKind,
    error::StepError,
    io_utils::SourceFile,
    options::StagingOptions,
    staging::stage,
};
use proptest::prelude::*;
use serde_json::{Value, json};

use common::{ITEMS_EXPORT, VENUES_EXPORT, WIDGETS_EXPORT};

fn staged(name: &str, contents: &str) -> Result<export_migrate::staging::StagedDataset, StepError> {
    stage(
        &SourceFile::new(name, contents.as_bytes().to_vec()),
        &StagingOptions::default(),
    )
}

#[test]
fn document_store_export_discovers_id_and_properties() {
    let dataset = staged("widgets.json", WIDGETS_EXPORT).unwrap();
    assert_eq!(dataset.driver_kind, DriverKind::DocumentStoreExport);
    assert!(dataset.driver_label.contains("documentstore"));
    let widgets = dataset.table("Widgets").unwrap();
    assert_eq!(widgets.detected_columns, vec!["id", "qty", "title"]);
    assert_eq!(widgets.preview_records.len(), 1);
}

#[test]
fn page_database_export_skips_non_materializable_properties() {
    let dataset = staged("venues.json", VENUES_EXPORT).unwrap();
    assert_eq!(dataset.driver_kind, DriverKind::PageDatabaseExport);
    let names: Vec<_> = dataset.tables.iter().map(|t| t.source_name.as_str()).collect();
    assert_eq!(names, vec!["Venues", "Archive"]);
    let venues = dataset.table("Venues").unwrap();
    assert_eq!(venues.detected_columns, vec!["Capacity", "Indoor", "Name"]);
    assert_eq!(venues.record_count(), 2);
    assert!(dataset.table("Archive").unwrap().preview_records.is_empty());
}

#[test]
fn flat_object_export_yields_one_table_per_key() {
    let dataset = staged("items.json", ITEMS_EXPORT).unwrap();
    assert_eq!(dataset.driver_kind, DriverKind::GenericFlatObject);
    assert_eq!(dataset.tables[0].detected_columns, vec!["a", "b"]);
}

#[test]
fn flat_object_tables_keep_file_order() {
    let contents = r#"{"Zeta": [{"z": 1}], "Alpha": [{"a": 1}], "Mid": [{"m": 1}]}"#;
    let dataset = staged("flat.json", contents).unwrap();
    let names: Vec<_> = dataset.tables.iter().map(|t| t.source_name.as_str()).collect();
    assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
}

#[test]
fn template_driver_records_are_plain_objects() {
    let contents = r#"{"driver": "template", "payload": [{"name": "DJs", "records": [{"name": "Ana", "fee": 100}]}]}"#;
    let dataset = staged("template.json", contents).unwrap();
    assert_eq!(dataset.driver_kind, DriverKind::GenericFlatObject);
    assert_eq!(dataset.tables[0].detected_columns, vec!["fee", "name"]);
}

#[test]
fn unusable_files_fail_with_specific_errors() {
    assert!(matches!(
        staged("broken.json", "{\"Items\": ["),
        Err(StepError::Unparseable { .. })
    ));
    assert!(matches!(
        staged("array.json", "[1, 2, 3]"),
        Err(StepError::UnrecognizedShape { .. })
    ));
    assert!(matches!(staged("empty.json", "{}"), Err(StepError::NoTables { .. })));
    assert!(matches!(
        staged("mongo.json", r#"{"driver": "mongo", "payload": []}"#),
        Err(StepError::UnknownDriver { .. })
    ));
    let err = staged("typed.json", r#"{"driver": "firestore", "payload": []}"#).unwrap_err();
    assert!(err.to_string().contains("expected at least one table"), "{err}");
}

fn flat_record() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map(
        "[a-e]{1,2}",
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            "[a-z ]{0,6}".prop_map(Value::String),
            (0i64..100).prop_map(|n| json!(n)),
        ],
        0..5,
    )
    .prop_map(|map| Value::Object(map.into_iter().collect()))
}

proptest! {
    #[test]
    fn staging_is_idempotent(
        tables in proptest::collection::btree_map("[A-Z][a-z]{0,4}", proptest::collection::vec(flat_record(), 1..15), 1..4)
    ) {
        let document = Value::Object(
            tables.into_iter().map(|(name, records)| (name, Value::Array(records))).collect(),
        );
        let bytes = serde_json::to_vec(&document).unwrap();
        let file = SourceFile::new("flat.json", bytes);
        let first = stage(&file, &StagingOptions::default()).unwrap();
        let second = stage(&file, &StagingOptions::default()).unwrap();
        prop_assert_eq!(&first, &second);
        for table in &first.tables {
            let mut sorted = table.detected_columns.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(&sorted, &table.detected_columns);
            prop_assert!(table.preview_records.len() <= 5);
            prop_assert_eq!(table.preview_records.len(), table.all_records.len().min(5));
        }
    }
}
