//! Terminal and JSON presentation of diff and tracking results.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde_json::{json, Map};

use crate::diff::{LabeledRecord, Status};
use crate::error::Result;
use crate::storage::JournalStats;
use crate::tracking::TrackingRecord;
use crate::watcher::TickReport;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Column header of the key column in the tracking table.
pub const TRACKING_KEY_HEADER: &str = "flight_id";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_time(at: DateTime<Utc>) -> String {
    at.format(TIME_FORMAT).to_string()
}

/// Name of the label column: `status`, underscore-prefixed until it no
/// longer clashes with the key field or any attribute.
#[must_use]
pub fn status_column(rows: &[LabeledRecord], key_field: &str) -> String {
    let mut name = "status".to_string();
    while name == key_field
        || rows
            .iter()
            .any(|row| row.record.attributes.contains_key(&name))
    {
        name.insert(0, '_');
    }
    name
}

/// Render rows as a table: the status label (see [`status_column`]), the
/// key column, then every attribute name in sorted order. Additions are green and removals red when `color`
/// is set.
#[must_use]
pub fn labeled_table(rows: &[LabeledRecord], key_field: &str, color: bool) -> String {
    let columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.record.attributes.keys().map(String::as_str))
        .collect();

    let mut header = vec![status_column(rows, key_field), key_field.to_string()];
    header.extend(columns.iter().map(ToString::to_string));

    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let mut cells = vec![row.status.to_string(), row.key().to_string()];
            cells.extend(columns.iter().map(|name| {
                row.record
                    .get(name)
                    .map(ToString::to_string)
                    .unwrap_or_default()
            }));
            cells
        })
        .collect();

    let styles: Vec<Option<&str>> = rows
        .iter()
        .map(|row| match (color, row.status) {
            (true, Status::Addition) => Some(GREEN),
            (true, Status::Removal) => Some(RED),
            _ => None,
        })
        .collect();

    format_table(&header, &body, &styles)
}

/// Render tracking records as a `flight_id | entry | exit | updates` table.
/// Exit is blank while the key is present.
#[must_use]
pub fn tracking_table<'a>(records: impl IntoIterator<Item = &'a TrackingRecord>) -> String {
    let header: Vec<String> = [TRACKING_KEY_HEADER, "entry", "exit", "updates"]
        .iter()
        .map(ToString::to_string)
        .collect();

    let body: Vec<Vec<String>> = records
        .into_iter()
        .map(|record| {
            vec![
                record.key.clone(),
                format_time(record.entry),
                record.exit.map(format_time).unwrap_or_default(),
                record.updates.to_string(),
            ]
        })
        .collect();

    format_table(&header, &body, &vec![None; body.len()])
}

/// Labeled rows as JSON objects carrying the status label (see
/// [`status_column`]), the key field and every attribute.
///
/// # Errors
///
/// Returns an error if an attribute value cannot be serialized.
pub fn labeled_json(rows: &[LabeledRecord], key_field: &str) -> Result<serde_json::Value> {
    let label = status_column(rows, key_field);
    let objects = rows
        .iter()
        .map(|row| -> Result<serde_json::Value> {
            let mut object = Map::new();
            for (name, value) in &row.record.attributes {
                object.insert(name.clone(), serde_json::to_value(value)?);
            }
            object.insert(key_field.to_string(), json!(row.key()));
            object.insert(label.clone(), json!(row.status));
            Ok(serde_json::Value::Object(object))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(serde_json::Value::Array(objects))
}

/// Tracking records as JSON objects.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn tracking_json<'a>(
    records: impl IntoIterator<Item = &'a TrackingRecord>,
) -> Result<serde_json::Value> {
    let records: Vec<&TrackingRecord> = records.into_iter().collect();
    Ok(serde_json::to_value(records)?)
}

/// One JSON document per tick: metadata, rows, and optionally tracking.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn tick_json<'a>(
    report: &TickReport,
    key_field: &str,
    tracking: Option<impl IntoIterator<Item = &'a TrackingRecord>>,
) -> Result<serde_json::Value> {
    let mut document = json!({
        "tick": report.tick,
        "observed_at": report.observed_at,
        "digest": report.digest,
        "unchanged": report.unchanged,
        "summary": report.summary,
        "rows": labeled_json(&report.rows, key_field)?,
    });
    if let (Some(records), Some(object)) = (tracking, document.as_object_mut()) {
        object.insert("tracking".to_string(), tracking_json(records)?);
    }
    Ok(document)
}

/// Header line printed above each tick's table.
#[must_use]
pub fn tick_header(report: &TickReport) -> String {
    let mut line = format!(
        "Tick {} at {}: {}",
        report.tick,
        format_time(report.observed_at),
        report.summary
    );
    if report.unchanged {
        line.push_str(" (unchanged)");
    }
    line
}

/// Journal totals, one `label: value` line each.
#[must_use]
pub fn stats_text(stats: &JournalStats) -> String {
    let time = |at: Option<DateTime<Utc>>| at.map_or_else(|| "-".to_string(), format_time);
    let mut out = String::new();
    let _ = writeln!(out, "Runs:         {}", stats.total_runs);
    let _ = writeln!(out, "Ticks:        {}", stats.total_ticks);
    let _ = writeln!(out, "Oldest tick:  {}", time(stats.oldest_tick));
    let _ = writeln!(out, "Newest tick:  {}", time(stats.newest_tick));
    let _ = writeln!(out, "Size (bytes): {}", stats.db_size_bytes);
    out
}

/// The line shown between ticks in watch mode.
#[must_use]
pub fn countdown_line(seconds: u64) -> String {
    format!("Next refresh in: {seconds} seconds")
}

fn format_table(header: &[String], body: &[Vec<String>], styles: &[Option<&str>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in body {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, header, &widths, None);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for (row, style) in body.iter().zip(styles) {
        push_row(&mut out, row, &widths, *style);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize], style: Option<&str>) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    let line = padded.join(" | ");
    let line = line.trim_end();
    let _ = match style {
        Some(code) => writeln!(out, "{code}{line}{RESET}"),
        None => writeln!(out, "{line}"),
    };
}
