//! Core snapshot types for flightwatch.
//!
//! A [`Snapshot`] is the full set of entity records observed at one polling
//! tick. Each [`Record`] is identified by a string key (the `title` column by
//! default) and carries arbitrary typed attributes that the differencer never
//! looks at.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Key column used when none is configured.
pub const DEFAULT_KEY_FIELD: &str = "title";

/// Naive timestamp layouts accepted for attribute cells, interpreted as UTC.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A finite number (coordinates, weights, passenger counts).
    Number(f64),
    /// A point in time.
    Timestamp(DateTime<Utc>),
    /// Anything else.
    Text(String),
}

impl Value {
    /// Infer a typed value from a raw table cell.
    ///
    /// Returns `None` for empty cells. Numbers win over timestamps, and
    /// timestamps win over text. A cell is only a number when it prints
    /// back exactly as written, so `0042` or `1.50` stay text.
    #[must_use]
    pub fn parse_cell(raw: &str) -> Option<Self> {
        let cell = raw.trim();
        if cell.is_empty() {
            return None;
        }

        if let Ok(n) = cell.parse::<f64>() {
            if n.is_finite() && n.to_string() == cell {
                return Some(Self::Number(n));
            }
        }

        if let Some(ts) = parse_timestamp(cell) {
            return Some(Self::Timestamp(ts));
        }

        Some(Self::Text(cell.to_string()))
    }

    /// Short tag used in digests so `"1"` and `1` hash differently.
    fn tag(&self) -> u8 {
        match self {
            Self::Number(_) => b'n',
            Self::Timestamp(_) => b't',
            Self::Text(_) => b's',
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

fn parse_timestamp(cell: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cell, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// One tracked entity: a key plus opaque attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier, unique within a snapshot.
    pub key: String,
    /// Everything else observed about the entity.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl Record {
    /// Create a record with no attributes.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Look up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// The records observed at one tick, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    key_field: String,
    records: Vec<Record>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_FIELD)
    }
}

impl Snapshot {
    /// Create an empty snapshot keyed by `key_field`.
    #[must_use]
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            records: Vec::new(),
        }
    }

    /// Create a snapshot from existing records.
    #[must_use]
    pub fn from_records(key_field: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            key_field: key_field.into(),
            records,
        }
    }

    /// Name of the column that supplies record keys.
    #[must_use]
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Append a record.
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// The records in source order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consume the snapshot, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Iterate over record keys in source order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.key.as_str())
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check whether the snapshot has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check the snapshot's preconditions for diffing and tracking.
    ///
    /// Every record must carry a non-blank key and keys must be unique.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, scanning in row order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(self.records.len());
        for (row, record) in self.records.iter().enumerate() {
            if record.key.trim().is_empty() {
                return Err(ValidationError::MissingKey {
                    row,
                    column: self.key_field.clone(),
                });
            }
            if let Some(&first_row) = seen.get(record.key.as_str()) {
                return Err(ValidationError::DuplicateKey {
                    key: record.key.clone(),
                    first_row,
                    row,
                });
            }
            seen.insert(record.key.as_str(), row);
        }
        Ok(())
    }

    /// BLAKE3 digest of the snapshot's content, independent of row order.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut sorted: Vec<&Record> = self.records.iter().collect();
        sorted.sort_by(|a, b| a.key.cmp(&b.key));

        let mut hasher = blake3::Hasher::new();
        for record in sorted {
            hasher.update(record.key.as_bytes());
            for (name, value) in &record.attributes {
                hasher.update(b"\x1f");
                hasher.update(name.as_bytes());
                hasher.update(&[b'=', value.tag()]);
                hasher.update(value.to_string().as_bytes());
            }
            hasher.update(b"\x1e");
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl FromIterator<Record> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::from_records(DEFAULT_KEY_FIELD, iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_parse_cell_number() {
        assert_eq!(Value::parse_cell("42.5"), Some(Value::Number(42.5)));
        assert_eq!(Value::parse_cell(" -17 "), Some(Value::Number(-17.0)));
    }

    #[test]
    fn test_parse_cell_keeps_non_canonical_numbers_as_text() {
        for cell in ["0042", "1.50", "1e3", "+5"] {
            assert_eq!(
                Value::parse_cell(cell),
                Some(Value::Text(cell.to_string())),
                "{cell}"
            );
        }
        assert_eq!(Value::parse_cell("0"), Some(Value::Number(0.0)));
        assert_eq!(Value::parse_cell("0.1"), Some(Value::Number(0.1)));
    }

    #[test]
    fn test_parse_cell_non_finite_is_text() {
        assert_eq!(Value::parse_cell("NaN"), Some(Value::Text("NaN".to_string())));
        assert_eq!(Value::parse_cell("inf"), Some(Value::Text("inf".to_string())));
    }

    #[test]
    fn test_parse_cell_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
        assert_eq!(
            Value::parse_cell("2024-03-01T14:30:00Z"),
            Some(Value::Timestamp(expected))
        );
        assert_eq!(
            Value::parse_cell("2024-03-01 14:30:00"),
            Some(Value::Timestamp(expected))
        );
        assert_eq!(
            Value::parse_cell("2024-03-01T14:30:00"),
            Some(Value::Timestamp(expected))
        );
        assert_eq!(
            Value::parse_cell("2024-03-01"),
            Some(Value::Timestamp(
                Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
            ))
        );
    }

    #[test]
    fn test_parse_cell_text_and_empty() {
        assert_eq!(
            Value::parse_cell("Heathrow"),
            Some(Value::Text("Heathrow".to_string()))
        );
        assert_eq!(Value::parse_cell(""), None);
        assert_eq!(Value::parse_cell("   "), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(51.47).to_string(), "51.47");
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2024-03-01T14:30:00Z");
        assert_eq!(Value::from("A320").to_string(), "A320");
    }

    #[test]
    fn test_value_json_untagged() {
        let json = serde_json::to_string(&Value::Number(1.5)).unwrap();
        assert_eq!(json, "1.5");
        let back: Value = serde_json::from_str("\"B747\"").unwrap();
        assert_eq!(back, Value::Text("B747".to_string()));
    }

    #[test]
    fn test_record_builder() {
        let record = Record::new("Alpha").with("lat", 10.0).with("plane_type", "A320");
        assert_eq!(record.key, "Alpha");
        assert_eq!(record.get("lat"), Some(&Value::Number(10.0)));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_snapshot_basics() {
        let mut snapshot = Snapshot::new("flight_num");
        assert!(snapshot.is_empty());
        snapshot.push(Record::new("BA100"));
        snapshot.push(Record::new("AF200"));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.key_field(), "flight_num");
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["BA100", "AF200"]);
    }

    #[test]
    fn test_snapshot_default_key_field() {
        let snapshot: Snapshot = vec![Record::new("Alpha")].into_iter().collect();
        assert_eq!(snapshot.key_field(), DEFAULT_KEY_FIELD);
    }

    #[test]
    fn test_validate_ok() {
        let snapshot: Snapshot = ["Alpha", "Bravo"].into_iter().map(Record::new).collect();
        assert!(snapshot.validate().is_ok());
        assert!(Snapshot::default().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_key() {
        let snapshot: Snapshot = ["Alpha", " "].into_iter().map(Record::new).collect();
        assert_eq!(
            snapshot.validate(),
            Err(ValidationError::MissingKey {
                row: 1,
                column: "title".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_duplicate_key() {
        let snapshot: Snapshot = ["Alpha", "Bravo", "Alpha"]
            .into_iter()
            .map(Record::new)
            .collect();
        assert_eq!(
            snapshot.validate(),
            Err(ValidationError::DuplicateKey {
                key: "Alpha".to_string(),
                first_row: 0,
                row: 2,
            })
        );
    }

    #[test]
    fn test_digest_ignores_row_order() {
        let a: Snapshot = vec![
            Record::new("Alpha").with("lat", 1.0),
            Record::new("Bravo").with("lat", 2.0),
        ]
        .into_iter()
        .collect();
        let b: Snapshot = vec![
            Record::new("Bravo").with("lat", 2.0),
            Record::new("Alpha").with("lat", 1.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_digest_sees_attribute_changes() {
        let a: Snapshot = vec![Record::new("Alpha").with("lat", 1.0)].into_iter().collect();
        let b: Snapshot = vec![Record::new("Alpha").with("lat", 1.5)].into_iter().collect();
        let c: Snapshot = vec![Record::new("Alpha").with("lat", "1")].into_iter().collect();
        let d: Snapshot = vec![Record::new("Alpha").with("lat", 1.0)].into_iter().collect();
        assert_ne!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest(), d.digest());
    }
}
