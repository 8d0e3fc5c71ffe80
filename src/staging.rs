//! Detection plus discovery: turns an uploaded export into a
//! [`StagedDataset`].
//!
//! Column discovery only looks at the head of each table, and the preview
//! subset is chosen once here so that every later review step works on a
//! handful of records instead of the full dataset.

use itertools::Itertools;
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;

use crate::{
    display::{self, RecordView},
    driver::{self, DriverKind, RawTable},
    error::StepError,
    extract::{FieldExtractor, extractor_for, union_columns},
    io_utils::SourceFile,
    options::StagingOptions,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedTable {
    pub source_name: String,
    pub all_records: Vec<Value>,
    pub preview_records: Vec<Value>,
    pub detected_columns: Vec<String>,
}

impl StagedTable {
    pub fn record_count(&self) -> usize {
        self.all_records.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedDataset {
    pub file_name: String,
    pub fingerprint: String,
    pub driver_kind: DriverKind,
    pub driver_label: String,
    pub tables: Vec<StagedTable>,
}

impl StagedDataset {
    pub fn table(&self, source_name: &str) -> Option<&StagedTable> {
        self.tables.iter().find(|t| t.source_name == source_name)
    }

    pub fn extractor(&self) -> &'static dyn FieldExtractor {
        extractor_for(self.driver_kind)
    }
}

/// Parses, detects, and discovers. Fails without partial output.
pub fn stage(file: &SourceFile, options: &StagingOptions) -> Result<StagedDataset, StepError> {
    let parsed: Value =
        serde_json::from_slice(&file.bytes).map_err(|source| StepError::Unparseable {
            file: file.name.clone(),
            source,
        })?;
    let detection = driver::detect(&file.name, parsed)?;
    let extractor = extractor_for(detection.kind);
    debug!(
        "Detected {} in '{}' with {} table(s)",
        detection.kind,
        file.name,
        detection.tables.len()
    );

    let tables = detection
        .tables
        .into_iter()
        .map(|raw| stage_table(raw, extractor, detection.kind, options))
        .collect::<Vec<_>>();

    if tables.is_empty() {
        return Err(StepError::NoTables {
            file: file.name.clone(),
        });
    }

    info!(
        "Staged '{}' as {}: {} table(s), {} record(s)",
        file.name,
        detection.kind,
        tables.len(),
        tables.iter().map(StagedTable::record_count).sum::<usize>()
    );

    Ok(StagedDataset {
        file_name: file.name.clone(),
        fingerprint: file.fingerprint(),
        driver_kind: detection.kind,
        driver_label: detection.label,
        tables,
    })
}

fn stage_table(
    raw: RawTable,
    extractor: &dyn FieldExtractor,
    kind: DriverKind,
    options: &StagingOptions,
) -> StagedTable {
    let detected_columns = discover_columns(extractor, &raw.records, options.sample_records);
    let preview_records = select_preview(&raw.records, &detected_columns, kind, options);
    debug!(
        "Table '{}': {} column(s) from {} sampled record(s), {} preview record(s)",
        raw.name,
        detected_columns.len(),
        raw.records.len().min(options.sample_records),
        preview_records.len()
    );
    StagedTable {
        source_name: raw.name,
        all_records: raw.records,
        preview_records,
        detected_columns,
    }
}

/// Sorted, deduplicated columns from the first `sample` records.
pub fn discover_columns(extractor: &dyn FieldExtractor, records: &[Value], sample: usize) -> Vec<String> {
    union_columns(extractor, records.iter().take(sample))
}

/// Fraction of `columns` holding a displayable value in `record`.
pub fn completeness(record: &Value, columns: &[String], kind: DriverKind) -> f64 {
    if columns.is_empty() {
        return 0.0;
    }
    let view = RecordView::Staged(kind);
    let filled = columns
        .iter()
        .filter(|column| display::is_filled(record, column, view))
        .count();
    filled as f64 / columns.len() as f64
}

/// Picks up to `preview_records` records: the most complete ones at or above
/// the threshold first, then the earliest remaining records in file order.
pub fn select_preview(
    records: &[Value],
    columns: &[String],
    kind: DriverKind,
    options: &StagingOptions,
) -> Vec<Value> {
    let limit = options.preview_records;
    if limit == 0 {
        return Vec::new();
    }
    let ranked = records
        .iter()
        .enumerate()
        .map(|(idx, record)| (idx, completeness(record, columns, kind)))
        .filter(|(_, score)| *score >= options.completeness_threshold)
        .sorted_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)))
        .take(limit)
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();

    let backfill = (0..records.len())
        .filter(|idx| !ranked.contains(idx))
        .take(limit - ranked.len());

    ranked
        .iter()
        .copied()
        .chain(backfill)
        .map(|idx| records[idx].clone())
        .collect()
}
