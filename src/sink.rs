//! Write targets for the import executor.
//!
//! A sink receives one batch of transformed records for one collection and
//! reports how many it accepted and rejected. A batch is validated in full
//! before any of it is written.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufWriter, Write},
    path::PathBuf,
};

use log::debug;

use crate::{
    error::SinkError,
    target::{FieldType, TargetCollection},
    transform::TransformedRecord,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReceipt {
    pub accepted: usize,
    pub rejected: usize,
}

pub trait RecordSink {
    fn write_batch(
        &mut self,
        collection: &TargetCollection,
        new_fields: &BTreeMap<String, FieldType>,
        records: &[TransformedRecord],
    ) -> Result<WriteReceipt, SinkError>;
}

/// Captures writes in memory, keyed by collection key.
#[derive(Debug, Default)]
pub struct DryRunSink {
    pub writes: BTreeMap<String, Vec<TransformedRecord>>,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self, collection: &str) -> &[TransformedRecord] {
        self.writes.get(collection).map(Vec::as_slice).unwrap_or_default()
    }
}

impl RecordSink for DryRunSink {
    fn write_batch(
        &mut self,
        collection: &TargetCollection,
        _new_fields: &BTreeMap<String, FieldType>,
        records: &[TransformedRecord],
    ) -> Result<WriteReceipt, SinkError> {
        self.writes
            .entry(collection.key.clone())
            .or_default()
            .extend(records.iter().cloned());
        Ok(WriteReceipt {
            accepted: records.len(),
            rejected: 0,
        })
    }
}

/// Appends records as newline-delimited JSON, one `<name>.ndjson` file per
/// collection storage name.
#[derive(Debug)]
pub struct NdjsonSink {
    dir: PathBuf,
    writers: BTreeMap<String, BufWriter<File>>,
}

impl NdjsonSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writers: BTreeMap::new(),
        }
    }

    pub fn path_for(&self, collection: &TargetCollection) -> PathBuf {
        self.dir.join(format!("{}.ndjson", collection.name))
    }

    fn writer(&mut self, collection: &TargetCollection) -> Result<&mut BufWriter<File>, SinkError> {
        let io_error = |source| SinkError::Io {
            collection: collection.key.clone(),
            source,
        };
        if !self.writers.contains_key(&collection.name) {
            fs::create_dir_all(&self.dir).map_err(io_error)?;
            let path = self.path_for(collection);
            debug!("Opening {path:?} for collection '{}'", collection.key);
            let file = File::create(&path).map_err(io_error)?;
            self.writers
                .insert(collection.name.clone(), BufWriter::new(file));
        }
        self.writers
            .get_mut(&collection.name)
            .ok_or_else(|| SinkError::Rejected(collection.key.clone()))
    }
}

impl RecordSink for NdjsonSink {
    fn write_batch(
        &mut self,
        collection: &TargetCollection,
        new_fields: &BTreeMap<String, FieldType>,
        records: &[TransformedRecord],
    ) -> Result<WriteReceipt, SinkError> {
        let mut lines = Vec::with_capacity(records.len());
        let mut rejected = 0;
        for record in records {
            let legal = record
                .keys()
                .all(|key| collection.has_field(key) || new_fields.contains_key(key));
            if !legal {
                rejected += 1;
                continue;
            }
            let line = serde_json::to_string(record).map_err(|source| SinkError::Encode {
                collection: collection.key.clone(),
                source,
            })?;
            lines.push(line);
        }

        let key = collection.key.clone();
        let writer = self.writer(collection)?;
        for line in &lines {
            writeln!(writer, "{line}").map_err(|source| SinkError::Io {
                collection: key.clone(),
                source,
            })?;
        }
        writer.flush().map_err(|source| SinkError::Io {
            collection: key,
            source,
        })?;

        Ok(WriteReceipt {
            accepted: lines.len(),
            rejected,
        })
    }
}
