//! CSV-backed snapshots.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim, Writer};
use tracing::debug;

use super::{SnapshotSource, SourceKind};
use crate::error::{Error, Result, ValidationError};
use crate::snapshot::{Record, Snapshot, Value};

/// Re-reads a CSV file on every fetch.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    key_column: String,
}

impl CsvSource {
    /// Create a source for the table at `path`, keyed by `key_column`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, key_column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key_column: key_column.into(),
        }
    }

    /// The file being polled.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The column supplying record keys.
    #[must_use]
    pub fn key_column(&self) -> &str {
        &self.key_column
    }
}

impl SnapshotSource for CsvSource {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Csv
    }

    fn fetch(&mut self) -> Result<Snapshot> {
        read_snapshot(&self.path, &self.key_column)
    }
}

/// Read a snapshot from a CSV file with a header row.
///
/// # Errors
///
/// Returns [`Error::CsvRead`] if the file cannot be opened or parsed, and a
/// validation error if the header has no `key_column`.
pub fn read_snapshot(path: &Path, key_column: &str) -> Result<Snapshot> {
    let reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(|source| Error::CsvRead {
            path: path.to_path_buf(),
            source,
        })?;

    let snapshot = collect_records(reader, key_column).map_err(|err| match err {
        Error::Csv(source) => Error::CsvRead {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;

    debug!(
        path = %path.display(),
        records = snapshot.len(),
        "read CSV snapshot"
    );
    Ok(snapshot)
}

/// Read a snapshot from any CSV byte stream with a header row.
///
/// # Errors
///
/// Returns [`Error::Csv`] on malformed input, and a validation error if the
/// header has no `key_column`.
pub fn snapshot_from_reader<R: io::Read>(reader: R, key_column: &str) -> Result<Snapshot> {
    collect_records(
        ReaderBuilder::new().trim(Trim::All).from_reader(reader),
        key_column,
    )
}

fn collect_records<R: io::Read>(mut reader: csv::Reader<R>, key_column: &str) -> Result<Snapshot> {
    let headers = reader.headers()?.clone();
    let key_index = headers
        .iter()
        .position(|name| name == key_column)
        .ok_or_else(|| ValidationError::MissingKey {
            row: 0,
            column: key_column.to_string(),
        })?;

    let mut snapshot = Snapshot::new(key_column);
    for row in reader.records() {
        let row = row?;
        let key = row.get(key_index).unwrap_or_default().to_string();
        let attributes = headers
            .iter()
            .zip(row.iter())
            .enumerate()
            .filter(|(index, _)| *index != key_index)
            .filter_map(|(_, (name, cell))| {
                Value::parse_cell(cell).map(|value| (name.to_string(), value))
            })
            .collect();
        snapshot.push(Record { key, attributes });
    }

    Ok(snapshot)
}

/// Write a snapshot as CSV: the key column first, then every attribute name
/// seen in the snapshot in sorted order. Missing attributes are left blank.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_snapshot<W: io::Write>(snapshot: &Snapshot, writer: W) -> Result<()> {
    let columns: BTreeSet<&str> = snapshot
        .records()
        .iter()
        .flat_map(|record| record.attributes.keys().map(String::as_str))
        .collect();

    let mut out = Writer::from_writer(writer);
    out.write_record(std::iter::once(snapshot.key_field()).chain(columns.iter().copied()))?;

    for record in snapshot.records() {
        let mut row = Vec::with_capacity(columns.len() + 1);
        row.push(record.key.clone());
        row.extend(
            columns
                .iter()
                .map(|name| record.get(name).map(ToString::to_string).unwrap_or_default()),
        );
        out.write_record(&row)?;
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SCHEDULE: &str = "\
flight_num,src_name,src_lat,src_lng,dest_name,departure_date,passengers
BA117,Heathrow,51.47,-0.4543,JFK,2024-05-01 09:30:00,212
AF006,CDG,49.0097,2.5479,JFK,2024-05-01 10:15:00,
";

    #[test]
    fn test_snapshot_from_reader_types_cells() {
        let snapshot = snapshot_from_reader(SCHEDULE.as_bytes(), "flight_num").unwrap();

        assert_eq!(snapshot.key_field(), "flight_num");
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["BA117", "AF006"]);

        let ba = &snapshot.records()[0];
        assert_eq!(ba.get("src_name"), Some(&Value::Text("Heathrow".to_string())));
        assert_eq!(ba.get("src_lat"), Some(&Value::Number(51.47)));
        assert_eq!(ba.get("passengers"), Some(&Value::Number(212.0)));
        assert!(matches!(ba.get("departure_date"), Some(Value::Timestamp(_))));
        assert!(ba.get("flight_num").is_none(), "key is not an attribute");

        let af = &snapshot.records()[1];
        assert!(af.get("passengers").is_none(), "empty cells are omitted");
    }

    #[test]
    fn test_missing_key_column() {
        let err = snapshot_from_reader(SCHEDULE.as_bytes(), "title").unwrap_err();
        assert!(err.is_validation_error());
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn test_blank_key_cell_fails_validation() {
        let data = "title,lat\nAlpha,1\n,2\n";
        let snapshot = snapshot_from_reader(data.as_bytes(), "title").unwrap();
        assert_eq!(
            snapshot.validate(),
            Err(ValidationError::MissingKey {
                row: 1,
                column: "title".to_string(),
            })
        );
    }

    #[test]
    fn test_ragged_row_is_csv_error() {
        let data = "title,lat\nAlpha,1,extra\n";
        let err = snapshot_from_reader(data.as_bytes(), "title").unwrap_err();
        assert!(matches!(err, Error::Csv(_)));
    }

    #[test]
    fn test_csv_source_reads_file_each_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.csv");
        std::fs::write(&path, "title,lat\nAlpha,1\n").unwrap();

        let mut source = CsvSource::new(&path, "title");
        assert_eq!(source.name(), "csv");
        assert_eq!(source.kind(), SourceKind::Csv);
        assert_eq!(source.path(), path);
        assert_eq!(source.key_column(), "title");
        assert_eq!(source.fetch().unwrap().len(), 1);

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "Bravo,2").unwrap();
        drop(file);

        let keys: Vec<String> = source
            .fetch()
            .unwrap()
            .keys()
            .map(str::to_string)
            .collect();
        assert_eq!(keys, vec!["Alpha", "Bravo"]);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_snapshot(Path::new("/nonexistent/schedule.csv"), "title").unwrap_err();
        assert!(matches!(err, Error::CsvRead { .. }));
        assert!(err.to_string().contains("/nonexistent/schedule.csv"));
    }

    #[test]
    fn test_read_malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "title,lat\nAlpha,1,2\n").unwrap();

        let err = read_snapshot(&path, "title").unwrap_err();
        assert!(matches!(err, Error::CsvRead { .. }));
    }

    #[test]
    fn test_write_snapshot_layout() {
        let snapshot = Snapshot::from_records(
            "title",
            vec![
                Record::new("Alpha").with("lon", 2.5).with("lat", 1.0),
                Record::new("Bravo").with("plane_type", "B737"),
            ],
        );

        let mut out = Vec::new();
        write_snapshot(&snapshot, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "title,lat,lon,plane_type\nAlpha,1,2.5,\nBravo,,,B737\n"
        );
    }

    #[test]
    fn test_written_snapshot_reads_back() {
        let snapshot = Snapshot::from_records(
            "title",
            vec![Record::new("Echo").with("lat", -12.25).with("plane_type", "A380")],
        );
        let mut out = Vec::new();
        write_snapshot(&snapshot, &mut out).unwrap();

        let back = snapshot_from_reader(out.as_slice(), "title").unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_cells_write_back_as_read() {
        let input = "title,code,lat,weight\nAlpha,0042,-12.25,1.50\n";
        let snapshot = snapshot_from_reader(input.as_bytes(), "title").unwrap();

        let alpha = &snapshot.records()[0];
        assert_eq!(alpha.get("code"), Some(&Value::Text("0042".to_string())));
        assert_eq!(alpha.get("weight"), Some(&Value::Text("1.50".to_string())));
        assert_eq!(alpha.get("lat"), Some(&Value::Number(-12.25)));

        let mut out = Vec::new();
        write_snapshot(&snapshot, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), input);
    }
}
