//! Transformed samples grouped by target collection.
//!
//! Only each table's preview records are transformed here, through the same
//! compiled plans the import uses.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::Serialize;
use serde_json::Value;

use crate::{
    display::RecordView,
    error::StepError,
    extract::{flat_extractor, union_columns},
    mapping::MappingPlan,
    options::DisplayOptions,
    staging::StagedDataset,
    table,
    target::TargetCollection,
    transform::{TransformedRecord, compile_mapped},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewTable {
    pub source_name: String,
    pub collection: String,
    pub sampled: usize,
    pub kept: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Preview {
    /// Transformed samples keyed by collection key; tables sharing a
    /// collection are concatenated in staging order.
    pub collections: BTreeMap<String, Vec<TransformedRecord>>,
    pub tables: Vec<PreviewTable>,
}

impl Preview {
    pub fn records(&self, collection: &str) -> Option<&[TransformedRecord]> {
        self.collections.get(collection).map(Vec::as_slice)
    }

    /// One clamped table per collection.
    pub fn render(&self, display: &DisplayOptions) -> String {
        let mut output = String::new();
        for (collection, records) in &self.collections {
            output.push_str(&format!("== {collection} ({} record(s)) ==\n", records.len()));
            if records.is_empty() {
                output.push_str("(no records survive the current column mapping)\n\n");
                continue;
            }
            let values = records
                .iter()
                .map(|record| Value::Object(record.clone()))
                .collect::<Vec<_>>();
            let columns = union_columns(flat_extractor(), values.iter());
            output.push_str(&table::render_records(
                &columns,
                &values,
                RecordView::Transformed,
                display.clamp,
            ));
            output.push('\n');
        }
        output
    }
}

pub fn generate(
    dataset: &StagedDataset,
    mapping: &MappingPlan,
    collections: &[TargetCollection],
) -> Result<Preview, StepError> {
    let mapped = compile_mapped(dataset, mapping, collections)?;
    let mut preview = Preview::default();
    for entry in &mapped {
        let samples = entry.plan.transform_all(&entry.table.preview_records);
        debug!(
            "Preview of '{}' -> '{}': {} of {} sample(s) kept",
            entry.table.source_name,
            entry.collection.key,
            samples.len(),
            entry.table.preview_records.len()
        );
        preview.tables.push(PreviewTable {
            source_name: entry.table.source_name.clone(),
            collection: entry.collection.key.clone(),
            sampled: entry.table.preview_records.len(),
            kept: samples.len(),
        });
        preview
            .collections
            .entry(entry.collection.key.clone())
            .or_default()
            .extend(samples);
    }
    info!(
        "Generated preview for {} table(s) across {} collection(s)",
        preview.tables.len(),
        preview.collections.len()
    );
    Ok(preview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        io_utils::SourceFile,
        mapping::{ColumnTarget, TableTarget},
        options::StagingOptions,
        staging::stage,
        target::TargetSchema,
    };

    fn dataset() -> StagedDataset {
        let raw = br#"{"DJs": [{"alias": "A"}, {"alias": ""}], "Crew": [{"alias": "B"}], "Notes": [{"x": 1}]}"#;
        stage(&SourceFile::new("flat.json", raw.to_vec()), &StagingOptions::default()).unwrap()
    }

    #[test]
    fn tables_sharing_a_collection_are_concatenated() {
        let schema = TargetSchema::example();
        let mut plan = MappingPlan::default();
        for table in ["DJs", "Crew"] {
            plan.tables
                .insert(table.into(), TableTarget::Collection("djs".into()));
            plan.columns.insert(
                table.into(),
                [("alias".to_string(), ColumnTarget::Field("name".into()))].into(),
            );
        }
        plan.tables.insert("Notes".into(), TableTarget::Skip);

        let preview = generate(&dataset(), &plan, &schema.collections).unwrap();
        let names: Vec<_> = preview.records("djs").unwrap().iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![serde_json::json!("A"), serde_json::json!("B")]);
        assert_eq!(preview.tables.len(), 2);
    }

    #[test]
    fn unproductive_mapping_still_lists_the_collection() {
        let schema = TargetSchema::example();
        let mut plan = MappingPlan::default();
        plan.tables
            .insert("Notes".into(), TableTarget::Collection("venues".into()));
        let preview = generate(&dataset(), &plan, &schema.collections).unwrap();
        assert_eq!(preview.records("venues"), Some(&[][..]));
        assert!(preview.render(&DisplayOptions::default()).contains("no records survive"));
    }
}
