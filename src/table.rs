//! Plain-text tables for staged records, transformed previews and reports.

use std::borrow::Cow;
use std::fmt::Write as _;

use serde_json::Value;

use crate::display::{RecordView, display_value};

const COLUMN_GAP: &str = "  ";
const MIN_SEPARATOR: usize = 3;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| cell_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(MIN_SEPARATOR);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// Renders records over `columns`, one row per record, through the display
/// path selected by `view`.
pub fn render_records(columns: &[String], records: &[Value], view: RecordView, clamp: usize) -> String {
    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| display_value(record, column, view, clamp).to_string())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    render_table(columns, &rows)
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(cell_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    line.trim_end().to_string()
}

fn cell_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
