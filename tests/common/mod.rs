#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use export_migrate::{
    io_utils::SourceFile,
    target::{FieldType, TargetCollection, TargetField, TargetSchema},
    wizard::{Step, Wizard},
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read temp file")
    }
}

pub const WIDGETS_EXPORT: &str = r#"{
  "driver": "documentstore",
  "payload": [
    {"name": "Widgets", "records": [{"id": "w1", "properties": {"title": "Foo", "qty": 3}}]}
  ]
}"#;

pub const ITEMS_EXPORT: &str = r#"{"Items": [{"a": "yes", "b": ""}]}"#;

pub const VENUES_EXPORT: &str = r#"{
  "driver": "notion",
  "payload": [
    {
      "databaseName": "Venues",
      "records": [
        {"properties": {
          "Name": {"type": "title", "title": [{"plain_text": "Warehouse"}]},
          "Capacity": {"type": "number", "number": 800},
          "Indoor": {"type": "select", "select": {"name": "yes"}},
          "Events": {"type": "relation", "relation": [{"id": "e1"}]}
        }},
        {"properties": {
          "Name": {"type": "title", "title": []},
          "Capacity": {"type": "number", "number": null},
          "Indoor": {"type": "select", "select": null}
        }}
      ]
    },
    {"databaseName": "Archive", "records": []}
  ]
}"#;

/// A schema with a single `widgets` collection.
pub fn widgets_schema() -> TargetSchema {
    TargetSchema {
        collections: vec![TargetCollection {
            key: "widgets".into(),
            name: "widget_store".into(),
            label: "Widgets".into(),
            fields: vec![
                TargetField::new("name", FieldType::String),
                TargetField::new("flagField", FieldType::Boolean),
            ],
        }],
    }
}

pub fn items_schema() -> TargetSchema {
    TargetSchema {
        collections: vec![TargetCollection {
            key: "items".into(),
            name: "items".into(),
            label: String::new(),
            fields: vec![TargetField::new("flagField", FieldType::Boolean)],
        }],
    }
}

/// A wizard with `schema` loaded and `contents` staged, sitting on table mapping.
pub fn staged_wizard(schema: &TargetSchema, name: &str, contents: &str) -> Wizard {
    let mut wizard = Wizard::default();
    wizard.load_target_schema(schema).expect("load schema");
    wizard.advance().expect("leave target info");
    wizard
        .select_file(SourceFile::new(name, contents.as_bytes().to_vec()))
        .expect("select file");
    wizard.go_to(Step::TableMapping).expect("reach table mapping");
    wizard
}
