use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLE_RECORDS: usize = 10;
pub const DEFAULT_PREVIEW_RECORDS: usize = 5;
pub const DEFAULT_COMPLETENESS_THRESHOLD: f64 = 0.75;
pub const DEFAULT_DISPLAY_CLAMP: usize = 70;
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Tunables for column discovery and preview selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingOptions {
    /// Records sampled from the head of each table for column discovery.
    pub sample_records: usize,
    /// Upper bound on preview records kept per table.
    pub preview_records: usize,
    /// Minimum fraction of filled columns for a record to rank as a preview candidate.
    pub completeness_threshold: f64,
}

impl Default for StagingOptions {
    fn default() -> Self {
        Self {
            sample_records: DEFAULT_SAMPLE_RECORDS,
            preview_records: DEFAULT_PREVIEW_RECORDS,
            completeness_threshold: DEFAULT_COMPLETENESS_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    /// Maximum characters rendered per cell before an ellipsis.
    pub clamp: usize,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            clamp: DEFAULT_DISPLAY_CLAMP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub batch_size: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}
