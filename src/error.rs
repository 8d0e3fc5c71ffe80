//! Typed failures for the migration pipeline.
//!
//! [`StepError`] covers everything that blocks a wizard step from
//! completing; the operator fixes the input and re-triggers the step.
//! [`SinkError`] is raised by a [`crate::sink::RecordSink`] for a single
//! table's write and never aborts sibling tables.

use thiserror::Error;

use crate::wizard::Step;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("Could not parse '{file}' as JSON: {source}")]
    Unparseable {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "Unrecognized export shape in '{file}': expected {{driver, payload:[...]}} or an object whose values are all arrays, found {found}"
    )]
    UnrecognizedShape { file: String, found: String },

    #[error("Unrecognized driver '{driver}' in '{file}': expected one of {expected}")]
    UnknownDriver {
        file: String,
        driver: String,
        expected: String,
    },

    #[error("No tables were discovered in '{file}': expected at least one table with records")]
    NoTables { file: String },

    #[error("Target schema is empty: expected at least one target collection")]
    EmptyTargetSchema,

    #[error("Unknown target collection '{0}'")]
    UnknownCollection(String),

    #[error("Unknown source table '{0}'")]
    UnknownTable(String),

    #[error("Table '{table}' has no column '{column}' (expected one of {expected})")]
    UnknownColumn {
        table: String,
        column: String,
        expected: String,
    },

    #[error("Table '{table}' is not mapped to a target collection")]
    TableNotMapped { table: String },

    #[error(
        "Column '{column}' of table '{table}' targets '{field}', which is not a field of collection '{collection}'"
    )]
    UnknownTargetField {
        table: String,
        column: String,
        field: String,
        collection: String,
    },

    #[error(
        "Column '{column}' of table '{table}' synthesizes a new field but no field type was chosen (expected one of {expected})"
    )]
    MissingNewFieldType {
        table: String,
        column: String,
        expected: String,
    },

    #[error("Unknown field type '{found}' (expected one of {expected})")]
    UnknownFieldType { found: String, expected: String },

    #[error("Cannot leave step {step}: {reason}")]
    Gate { step: Step, reason: String },

    #[error("Step {expected} is required but the wizard is at {found}")]
    WrongStep { expected: Step, found: Step },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error writing collection '{collection}': {source}")]
    Io {
        collection: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serializing record for collection '{collection}': {source}")]
    Encode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Collection '{0}' rejected the write")]
    Rejected(String),
}
