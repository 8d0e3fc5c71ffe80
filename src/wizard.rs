//! The migration wizard as an explicit step machine.
//!
//! Each step owns a slice of state. Moving forward requires the current
//! step's gate; moving back, or mutating a step's own input, clears every
//! step after it through [`Wizard::reset_from`] while leaving earlier state
//! intact. Operations take `&mut self`, so a long-running step can never be
//! re-triggered while it is outstanding.

use std::fmt;

use log::{debug, info};
use serde::Serialize;

use crate::{
    error::StepError,
    import::{self, ImportOutcome},
    io_utils::SourceFile,
    mapping::{ColumnMapping, ColumnTarget, MappingPlan, TableTarget, skipped_columns},
    options::{ImportOptions, StagingOptions},
    preview::{self, Preview},
    sink::RecordSink,
    staging::{self, StagedDataset, StagedTable},
    target::{FieldType, TargetCollection, TargetSchemaProvider},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Step {
    #[default]
    TargetInfo,
    Upload,
    StagingReview,
    TableMapping,
    ColumnMapping,
    Preview,
    Report,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::TargetInfo,
        Step::Upload,
        Step::StagingReview,
        Step::TableMapping,
        Step::ColumnMapping,
        Step::Preview,
        Step::Report,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Step> {
        Step::ALL.get(self.index() + 1).copied()
    }

    pub fn prev(self) -> Option<Step> {
        self.index().checked_sub(1).map(|idx| Step::ALL[idx])
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Step::TargetInfo => "target info",
            Step::Upload => "upload",
            Step::StagingReview => "staging review",
            Step::TableMapping => "table mapping",
            Step::ColumnMapping => "column mapping",
            Step::Preview => "preview",
            Step::Report => "report",
        };
        write!(f, "{}. {label}", self.index() + 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Wizard {
    step: Step,
    collections: Vec<TargetCollection>,
    source: Option<SourceFile>,
    dataset: Option<StagedDataset>,
    plan: MappingPlan,
    preview: Option<Preview>,
    outcome: Option<ImportOutcome>,
    staging_options: StagingOptions,
    import_options: ImportOptions,
}

impl Wizard {
    pub fn new(staging_options: StagingOptions, import_options: ImportOptions) -> Self {
        Self {
            staging_options,
            import_options,
            ..Self::default()
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn collections(&self) -> &[TargetCollection] {
        &self.collections
    }

    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    pub fn dataset(&self) -> Option<&StagedDataset> {
        self.dataset.as_ref()
    }

    pub fn plan(&self) -> &MappingPlan {
        &self.plan
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn outcome(&self) -> Option<&ImportOutcome> {
        self.outcome.as_ref()
    }

    pub fn table_target(&self, table: &str) -> &TableTarget {
        static SKIP: TableTarget = TableTarget::Skip;
        self.plan.tables.get(table).unwrap_or(&SKIP)
    }

    pub fn column_mapping(&self, table: &str) -> Option<&ColumnMapping> {
        self.plan.columns.get(table)
    }

    /// Fetches the target schema. A failed or empty fetch leaves the wizard
    /// untouched.
    pub fn load_target_schema(&mut self, provider: &dyn TargetSchemaProvider) -> Result<(), StepError> {
        let collections = provider.collections()?;
        if collections.is_empty() {
            return Err(StepError::EmptyTargetSchema);
        }
        info!("Loaded target schema with {} collection(s)", collections.len());
        self.reset_from(Step::TargetInfo);
        self.collections = collections;
        Ok(())
    }

    /// Selecting a file discards everything staged from a previous one.
    pub fn select_file(&mut self, file: SourceFile) -> Result<(), StepError> {
        self.require_at_least(Step::Upload)?;
        info!("Selected '{}' ({} bytes)", file.name, file.bytes.len());
        self.reset_from(Step::Upload);
        self.source = Some(file);
        self.step = Step::Upload;
        Ok(())
    }

    /// Detects and discovers the selected file, then seeds suggested table
    /// mappings. Nothing is committed unless staging succeeds.
    pub fn stage(&mut self) -> Result<&StagedDataset, StepError> {
        self.require_at_least(Step::Upload)?;
        let file = self.source.as_ref().ok_or_else(|| StepError::Gate {
            step: Step::Upload,
            reason: "no file has been selected".to_string(),
        })?;
        info!("Staging '{}'", file.name);
        let dataset = staging::stage(file, &self.staging_options)?;
        let plan = MappingPlan::starter(&dataset, &self.collections);
        self.reset_from(Step::StagingReview);
        self.plan = plan;
        self.step = Step::StagingReview;
        Ok(&*self.dataset.insert(dataset))
    }

    pub fn set_table_mapping(&mut self, table: &str, target: TableTarget) -> Result<(), StepError> {
        self.require_at_least(Step::TableMapping)?;
        let staged = self.staged_table(table)?;
        let columns = staged.detected_columns.clone();
        if let TableTarget::Collection(key) = &target {
            self.collection(key)?;
        }
        if self.table_target(table) == &target {
            return Ok(());
        }
        debug!("Table '{table}' now maps to {target}");
        self.plan.columns.remove(table);
        self.plan.new_field_types.remove(table);
        if target != TableTarget::Skip {
            self.plan.columns.insert(table.to_string(), skipped_columns(&columns));
        }
        self.plan.tables.insert(table.to_string(), target);
        self.reset_from(Step::Preview);
        Ok(())
    }

    pub fn set_column_mapping(
        &mut self,
        table: &str,
        column: &str,
        target: ColumnTarget,
    ) -> Result<(), StepError> {
        self.require_at_least(Step::ColumnMapping)?;
        self.mapped_column(table, column)?;
        if let ColumnTarget::Field(field) = &target {
            let collection = self.mapped_collection(table)?;
            if !collection.has_field(field) {
                return Err(StepError::UnknownTargetField {
                    table: table.to_string(),
                    column: column.to_string(),
                    field: field.clone(),
                    collection: collection.key.clone(),
                });
            }
        }
        if target != ColumnTarget::Synthesize {
            if let Some(types) = self.plan.new_field_types.get_mut(table) {
                types.remove(column);
            }
        }
        debug!("Column '{table}.{column}' now maps to {target}");
        self.plan
            .columns
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string(), target);
        self.reset_from(Step::Preview);
        Ok(())
    }

    pub fn set_new_field_type(
        &mut self,
        table: &str,
        column: &str,
        field_type: FieldType,
    ) -> Result<(), StepError> {
        self.require_at_least(Step::ColumnMapping)?;
        self.mapped_column(table, column)?;
        self.plan
            .new_field_types
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string(), field_type);
        self.reset_from(Step::Preview);
        Ok(())
    }

    pub fn generate_preview(&mut self) -> Result<&Preview, StepError> {
        self.require_at_least(Step::ColumnMapping)?;
        let dataset = self.require_dataset()?;
        let generated = preview::generate(dataset, &self.plan, &self.collections)?;
        self.reset_from(Step::Report);
        Ok(&*self.preview.insert(generated))
    }

    /// Runs the import against `sink`. Only allowed from the preview step.
    pub fn run_import(&mut self, sink: &mut dyn RecordSink) -> Result<&ImportOutcome, StepError> {
        if self.step != Step::Preview {
            return Err(StepError::WrongStep {
                expected: Step::Preview,
                found: self.step,
            });
        }
        let dataset = self.require_dataset()?;
        let outcome = import::run(
            dataset,
            &self.plan,
            &self.collections,
            sink,
            &self.import_options,
        )?;
        Ok(&*self.outcome.insert(outcome))
    }

    /// Checks the current step's gate and moves forward. Entering staging
    /// review stages the file; entering preview generates the preview.
    pub fn advance(&mut self) -> Result<Step, StepError> {
        let from = self.step;
        let to = from.next().ok_or_else(|| StepError::Gate {
            step: from,
            reason: "the report is the final step".to_string(),
        })?;
        match from {
            Step::TargetInfo => {
                if self.collections.is_empty() {
                    return Err(StepError::EmptyTargetSchema);
                }
            }
            Step::Upload => {
                if self.source.is_none() {
                    return Err(gate(from, "no file has been selected"));
                }
                if self.dataset.is_none() {
                    self.stage()?;
                }
            }
            Step::StagingReview => {
                let discovered = self.dataset.as_ref().map_or(0, |d| d.tables.len());
                if discovered == 0 {
                    return Err(gate(from, "no tables were discovered"));
                }
                if self.plan.tables.is_empty() {
                    if let Some(dataset) = &self.dataset {
                        self.plan = MappingPlan::starter(dataset, &self.collections);
                    }
                }
            }
            Step::TableMapping => {
                if self.plan.tables.values().all(|t| *t == TableTarget::Skip) {
                    return Err(gate(from, "every table is skipped; map at least one table"));
                }
                self.seed_column_mappings();
            }
            Step::ColumnMapping => {
                if self.preview.is_none() {
                    self.generate_preview()?;
                }
            }
            Step::Preview => {
                if self.outcome.is_none() {
                    return Err(gate(from, "the import has not been run"));
                }
            }
            Step::Report => {}
        }
        info!("Wizard: {from} -> {to}");
        self.step = to;
        Ok(to)
    }

    /// Steps back, clearing everything after the step returned to.
    pub fn back(&mut self) -> Option<Step> {
        let to = self.step.prev()?;
        if let Some(cleared) = to.next() {
            self.reset_from(cleared);
        }
        self.step = to;
        info!("Wizard: back to {to}");
        Some(to)
    }

    /// Moves to `target`, backwards unconditionally and forwards through
    /// each gate in turn.
    pub fn go_to(&mut self, target: Step) -> Result<Step, StepError> {
        while self.step > target {
            self.back();
        }
        while self.step < target {
            self.advance()?;
        }
        Ok(self.step)
    }

    /// Clears the state owned by `from` and every later step. The wizard
    /// never stays on a step whose state was cleared.
    pub fn reset_from(&mut self, from: Step) {
        debug!("Resetting wizard state from {from}");
        if from <= Step::TargetInfo {
            self.collections.clear();
        }
        if from <= Step::Upload {
            self.source = None;
        }
        if from <= Step::StagingReview {
            self.dataset = None;
        }
        if from <= Step::TableMapping {
            self.plan = MappingPlan::default();
        }
        if from <= Step::ColumnMapping {
            self.plan.columns.clear();
            self.plan.new_field_types.clear();
        }
        if from <= Step::Preview {
            self.preview = None;
        }
        self.outcome = None;
        let ceiling = from.prev().unwrap_or(Step::TargetInfo);
        self.step = self.step.min(ceiling);
    }

    /// Replays a saved plan through the ordinary mutations and leaves the
    /// wizard on column mapping. Applied to a copy, so a bad plan changes
    /// nothing.
    pub fn apply_plan(&mut self, plan: &MappingPlan) -> Result<(), StepError> {
        let mut next = self.clone();
        next.go_to(Step::TableMapping)?;
        if let Some(unknown) = plan.tables.keys().find(|name| next.staged_table(name).is_err()) {
            return Err(StepError::UnknownTable(unknown.clone()));
        }
        let tables = next
            .require_dataset()?
            .tables
            .iter()
            .map(|t| t.source_name.clone())
            .collect::<Vec<_>>();
        for table in &tables {
            let target = plan.tables.get(table).cloned().unwrap_or_default();
            next.set_table_mapping(table, target)?;
        }
        next.advance()?;
        for (table, columns) in &plan.columns {
            if next.table_target(table).collection().is_none() {
                debug!("Ignoring column mappings of skipped table '{table}'");
                continue;
            }
            for (column, target) in columns {
                next.set_column_mapping(table, column, target.clone())?;
            }
        }
        for (table, types) in &plan.new_field_types {
            if next.table_target(table).collection().is_none() {
                continue;
            }
            for (column, field_type) in types {
                next.set_new_field_type(table, column, *field_type)?;
            }
        }
        info!("Applied mapping plan to {} table(s)", tables.len());
        *self = next;
        Ok(())
    }

    pub fn collection(&self, key: &str) -> Result<&TargetCollection, StepError> {
        self.collections
            .iter()
            .find(|c| c.key == key)
            .ok_or_else(|| StepError::UnknownCollection(key.to_string()))
    }

    fn seed_column_mappings(&mut self) {
        let Some(dataset) = &self.dataset else {
            return;
        };
        for table in &dataset.tables {
            if self.plan.tables.get(&table.source_name).and_then(TableTarget::collection).is_some() {
                self.plan
                    .columns
                    .entry(table.source_name.clone())
                    .or_insert_with(|| skipped_columns(&table.detected_columns));
            }
        }
    }

    fn require_at_least(&self, step: Step) -> Result<(), StepError> {
        if self.step < step {
            return Err(StepError::WrongStep {
                expected: step,
                found: self.step,
            });
        }
        Ok(())
    }

    fn require_dataset(&self) -> Result<&StagedDataset, StepError> {
        self.dataset
            .as_ref()
            .ok_or_else(|| gate(Step::StagingReview, "no file has been staged"))
    }

    fn staged_table(&self, table: &str) -> Result<&StagedTable, StepError> {
        self.require_dataset()?
            .table(table)
            .ok_or_else(|| StepError::UnknownTable(table.to_string()))
    }

    fn mapped_collection(&self, table: &str) -> Result<&TargetCollection, StepError> {
        match self.table_target(table) {
            TableTarget::Collection(key) => self.collection(key),
            TableTarget::Skip => Err(StepError::TableNotMapped {
                table: table.to_string(),
            }),
        }
    }

    fn mapped_column(&self, table: &str, column: &str) -> Result<(), StepError> {
        let staged = self.staged_table(table)?;
        self.mapped_collection(table)?;
        if staged.detected_columns.iter().any(|c| c == column) {
            Ok(())
        } else {
            Err(StepError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
                expected: staged.detected_columns.join(", "),
            })
        }
    }
}

fn gate(step: Step, reason: &str) -> StepError {
    StepError::Gate {
        step,
        reason: reason.to_string(),
    }
}
