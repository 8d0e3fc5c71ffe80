//! The import executor.
//!
//! Every mapped table is transformed in full and written to its collection
//! in batches. A sink failure ends that table's contribution but never
//! aborts the tables after it; the outcome lists every attempted table.

use std::fmt;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::StepError,
    mapping::MappingPlan,
    options::ImportOptions,
    sink::RecordSink,
    staging::StagedDataset,
    table,
    target::TargetCollection,
    transform::{MappedTable, compile_mapped},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    Success,
    PartialSuccess,
    Failure,
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImportStatus::Success => "success",
            ImportStatus::PartialSuccess => "partial success",
            ImportStatus::Failure => "failure",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    pub source_name: String,
    pub collection: String,
    /// Source records run through the transformation engine.
    pub attempted: usize,
    /// Records that transformed to something.
    pub kept: usize,
    pub written: usize,
    pub rejected: usize,
    pub error: Option<String>,
}

impl TableOutcome {
    fn produced_output(&self) -> bool {
        self.error.is_none() && self.written > 0
    }

    fn summary(&self) -> String {
        let result = match &self.error {
            Some(err) => format!("error: {err}"),
            None if self.attempted == 0 => "no source records".to_string(),
            None if self.written == 0 => "nothing written".to_string(),
            None => "ok".to_string(),
        };
        format!(
            "{} -> {}: {} attempted, {} kept, {} written, {} rejected ({result})",
            self.source_name, self.collection, self.attempted, self.kept, self.written, self.rejected
        )
    }
}

/// Counts summed over every attempted table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportTotals {
    pub attempted: usize,
    pub kept: usize,
    pub written: usize,
    pub rejected: usize,
}

impl ImportTotals {
    pub fn sum(tables: &[TableOutcome]) -> Self {
        tables.iter().fold(Self::default(), |totals, t| Self {
            attempted: totals.attempted + t.attempted,
            kept: totals.kept + t.kept,
            written: totals.written + t.written,
            rejected: totals.rejected + t.rejected,
        })
    }
}

impl fmt::Display for ImportTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted, {} kept, {} written, {} rejected",
            self.attempted, self.kept, self.written, self.rejected
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tables: Vec<TableOutcome>,
    pub totals: ImportTotals,
    pub status: ImportStatus,
    pub log: Vec<String>,
}

impl ImportOutcome {
    pub fn table(&self, source_name: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|t| t.source_name == source_name)
    }

    pub fn render(&self) -> String {
        let headers = ["table", "collection", "attempted", "kept", "written", "rejected", "result"]
            .map(str::to_string);
        let rows = self
            .tables
            .iter()
            .map(|t| {
                vec![
                    t.source_name.clone(),
                    t.collection.clone(),
                    t.attempted.to_string(),
                    t.kept.to_string(),
                    t.written.to_string(),
                    t.rejected.to_string(),
                    t.error.clone().unwrap_or_else(|| "ok".to_string()),
                ]
            })
            .collect::<Vec<_>>();
        let mut output = format!(
            "Import run {}\nStarted:  {}\nFinished: {}\n\n",
            self.run_id,
            self.started_at.to_rfc3339(),
            self.finished_at.to_rfc3339()
        );
        output.push_str(&table::render_table(&headers, &rows));
        output.push('\n');
        for line in &self.log {
            output.push_str(line);
            output.push('\n');
        }
        output.push_str(&format!("\nTotals: {}\n", self.totals));
        output.push_str(&format!("Status: {}\n", self.status));
        output
    }
}

/// Tables without source records neither help nor hurt.
pub fn aggregate_status(tables: &[TableOutcome]) -> ImportStatus {
    let (productive, total) = tables
        .iter()
        .filter(|t| t.attempted > 0)
        .fold((0, 0), |(productive, total), t| {
            (productive + usize::from(t.produced_output()), total + 1)
        });
    match (productive, total) {
        (0, _) => ImportStatus::Failure,
        (p, t) if p == t => ImportStatus::Success,
        _ => ImportStatus::PartialSuccess,
    }
}

/// Compiles every mapped table up front; a mapping error fails the run
/// before anything is written.
pub fn run(
    dataset: &StagedDataset,
    mapping: &MappingPlan,
    collections: &[TargetCollection],
    sink: &mut dyn RecordSink,
    options: &ImportOptions,
) -> Result<ImportOutcome, StepError> {
    let started_at = Utc::now();
    let run_id = Uuid::new_v4();
    let mapped = compile_mapped(dataset, mapping, collections)?;
    info!("Import {run_id}: {} mapped table(s)", mapped.len());

    let tables = mapped
        .iter()
        .map(|entry| import_table(entry, sink, options))
        .collect::<Vec<_>>();
    let log = tables.iter().map(TableOutcome::summary).collect();
    let status = aggregate_status(&tables);
    let totals = ImportTotals::sum(&tables);
    info!("Import {run_id} finished with {status}: {totals}");

    Ok(ImportOutcome {
        run_id,
        started_at,
        finished_at: Utc::now(),
        tables,
        totals,
        status,
        log,
    })
}

fn import_table(entry: &MappedTable<'_>, sink: &mut dyn RecordSink, options: &ImportOptions) -> TableOutcome {
    let records = &entry.table.all_records;
    let transformed = entry.plan.transform_all(records);
    let new_fields = entry.plan.new_fields();
    let mut outcome = TableOutcome {
        source_name: entry.table.source_name.clone(),
        collection: entry.collection.key.clone(),
        attempted: records.len(),
        kept: transformed.len(),
        written: 0,
        rejected: 0,
        error: None,
    };

    for batch in transformed.chunks(options.batch_size.max(1)) {
        match sink.write_batch(entry.collection, &new_fields, batch) {
            Ok(receipt) => {
                outcome.written += receipt.accepted;
                outcome.rejected += receipt.rejected;
            }
            Err(err) => {
                warn!(
                    "Write of '{}' to '{}' failed: {err}",
                    outcome.source_name, outcome.collection
                );
                outcome.error = Some(err.to_string());
                break;
            }
        }
    }
    if outcome.rejected > 0 {
        warn!(
            "'{}': {} record(s) rejected by collection '{}'",
            outcome.source_name, outcome.rejected, outcome.collection
        );
    }
    info!("{}", outcome.summary());
    outcome
}
