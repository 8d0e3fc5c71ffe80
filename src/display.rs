//! Display-only rendering of record values.
//!
//! Works on raw staged records (driver-aware) and on transformed records
//! (flat), selected explicitly through [`RecordView`]. Nothing here feeds
//! back into transformation; completeness scoring is the only non-visual
//! consumer.

use std::fmt;

use serde_json::Value;

use crate::{
    driver::DriverKind,
    extract::{FieldExtractor, extractor_for, flat_extractor},
};

const ELLIPSIS: char = '…';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordView {
    /// A source record as staged, decoded with its driver's rules.
    Staged(DriverKind),
    /// A flat record produced by the transformation engine.
    Transformed,
}

impl RecordView {
    pub fn extractor(self) -> &'static dyn FieldExtractor {
        match self {
            RecordView::Staged(kind) => extractor_for(kind),
            RecordView::Transformed => flat_extractor(),
        }
    }
}

/// A rendered cell. Booleans keep a tri-state: true, false, or absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCell {
    Text(String),
    Flag(bool),
    Empty,
}

impl DisplayCell {
    pub fn is_empty(&self) -> bool {
        matches!(self, DisplayCell::Empty)
    }
}

impl fmt::Display for DisplayCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayCell::Text(text) => f.write_str(text),
            DisplayCell::Flag(true) => f.write_str("✓"),
            DisplayCell::Flag(false) => f.write_str("✗"),
            DisplayCell::Empty => f.write_str("·"),
        }
    }
}

pub fn display_value(record: &Value, column: &str, view: RecordView, clamp: usize) -> DisplayCell {
    match view.extractor().extract(record, column) {
        Some(value) => render(&value, clamp),
        None => DisplayCell::Empty,
    }
}

pub fn is_filled(record: &Value, column: &str, view: RecordView) -> bool {
    !display_value(record, column, view, usize::MAX).is_empty()
}

fn render(value: &Value, clamp: usize) -> DisplayCell {
    match value {
        Value::Null => DisplayCell::Empty,
        Value::Bool(flag) => DisplayCell::Flag(*flag),
        Value::String(text) if text.trim().is_empty() => DisplayCell::Empty,
        Value::String(text) => DisplayCell::Text(clamp_text(text, clamp)),
        Value::Number(number) => DisplayCell::Text(number.to_string()),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>();
            if parts.is_empty() {
                DisplayCell::Empty
            } else {
                DisplayCell::Text(clamp_text(&parts.join(", "), clamp))
            }
        }
        Value::Object(map) if map.is_empty() => DisplayCell::Empty,
        Value::Object(_) => DisplayCell::Text(clamp_text(&value.to_string(), clamp)),
    }
}

/// Truncates to at most `clamp` characters, marking the cut with an ellipsis.
pub fn clamp_text(text: &str, clamp: usize) -> String {
    if clamp == 0 || text.chars().count() <= clamp {
        return text.to_string();
    }
    let mut clamped = text.chars().take(clamp.saturating_sub(1)).collect::<String>();
    clamped.push(ELLIPSIS);
    clamped
}
