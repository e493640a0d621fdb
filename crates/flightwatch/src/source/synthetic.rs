//! Synthetic plane movements.
//!
//! The first fetch places a random sample of planes around the globe. Every
//! later fetch nudges each plane a little and refreshes its timestamp. Each
//! fetch, the first included, then adds or removes a few planes so the
//! differ has something to report.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use super::{SnapshotSource, SourceKind};
use crate::config::SyntheticConfig;
use crate::error::Result;
use crate::snapshot::{Record, Snapshot, DEFAULT_KEY_FIELD};

/// Call signs the generator draws plane keys from.
pub const PLANE_TITLES: &[&str] = &[
    "Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot", "Golf", "Hotel", "India", "Juliet",
];

/// Aircraft models assigned to generated planes.
pub const PLANE_TYPES: &[&str] = &["A320", "B737", "A380", "B747", "Cessna", "Embraer", "Bombardier"];

/// Largest per-tick position drift, in degrees.
const MAX_DRIFT_DEG: f64 = 0.5;

/// Generated timestamps fall this many minutes before now, at most.
const MAX_AGE_MINUTES: i64 = 120;

/// Random plane-movement generator.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    rng: SmallRng,
    change_rate: f64,
    initial_min: usize,
    planes: Option<Vec<Record>>,
}

impl SyntheticSource {
    /// Create a generator from configuration.
    #[must_use]
    pub fn from_config(config: &SyntheticConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_rng(&mut rand::rng()),
        };
        Self {
            rng,
            change_rate: config.change_rate,
            initial_min: config.initial_min.clamp(1, PLANE_TITLES.len()),
            planes: None,
        }
    }

    /// Create a reproducible generator with default settings.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::from_config(&SyntheticConfig {
            seed: Some(seed),
            ..SyntheticConfig::default()
        })
    }

    /// Produce the next snapshot as of `now`.
    pub fn next_snapshot(&mut self, now: DateTime<Utc>) -> Snapshot {
        let mut planes = match self.planes.take() {
            None => self.initial_planes(now),
            Some(previous) => self.drift_all(previous, now),
        };
        self.apply_changes(&mut planes, now);
        let snapshot = Snapshot::from_records(DEFAULT_KEY_FIELD, planes.clone());
        self.planes = Some(planes);
        snapshot
    }

    fn initial_planes(&mut self, now: DateTime<Utc>) -> Vec<Record> {
        let count = self.rng.random_range(self.initial_min..=PLANE_TITLES.len());
        let titles: Vec<&str> = PLANE_TITLES
            .choose_multiple(&mut self.rng, count)
            .copied()
            .collect();
        debug!(count, "generating initial planes");
        titles
            .into_iter()
            .map(|title| self.new_plane(title, now))
            .collect()
    }

    fn drift_all(&mut self, mut planes: Vec<Record>, now: DateTime<Utc>) -> Vec<Record> {
        for plane in &mut planes {
            let lat = self.drift(plane, "lat");
            let lon = self.drift(plane, "lon");
            let timestamp = self.recent_timestamp(now);
            plane.attributes.insert("lat".to_string(), lat.into());
            plane.attributes.insert("lon".to_string(), lon.into());
            plane
                .attributes
                .insert("timestamp".to_string(), timestamp.into());
        }
        planes
    }

    fn apply_changes(&mut self, planes: &mut Vec<Record>, now: DateTime<Utc>) {
        for _ in 0..self.change_count(planes.len()) {
            let unused: Vec<&str> = PLANE_TITLES
                .iter()
                .copied()
                .filter(|title| planes.iter().all(|p| p.key != *title))
                .collect();

            if self.rng.random_bool(0.5) && !unused.is_empty() {
                if let Some(title) = unused.choose(&mut self.rng).copied() {
                    trace!(title, "plane added");
                    let plane = self.new_plane(title, now);
                    planes.push(plane);
                }
            } else if planes.len() > 1 {
                let index = self.rng.random_range(0..planes.len());
                let removed = planes.remove(index);
                trace!(title = %removed.key, "plane removed");
            }
        }
    }

    /// Number of add/remove attempts for a table of `len` rows.
    fn change_count(&self, len: usize) -> usize {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let scaled = (self.change_rate * len as f64).floor() as usize;
        scaled.max(1)
    }

    fn new_plane(&mut self, title: &str, now: DateTime<Utc>) -> Record {
        let lat: f64 = self.rng.random_range(-90.0..90.0);
        let lon: f64 = self.rng.random_range(-180.0..180.0);
        let timestamp = self.recent_timestamp(now);
        let plane_type = PLANE_TYPES.choose(&mut self.rng).copied().unwrap_or("A320");
        Record::new(title)
            .with("lat", lat)
            .with("lon", lon)
            .with("timestamp", timestamp)
            .with("plane_type", plane_type)
    }

    fn drift(&mut self, plane: &Record, field: &str) -> f64 {
        let base = match plane.get(field) {
            Some(crate::snapshot::Value::Number(n)) => *n,
            _ => 0.0,
        };
        base + self.rng.random_range(-MAX_DRIFT_DEG..MAX_DRIFT_DEG)
    }

    fn recent_timestamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::minutes(self.rng.random_range(0..=MAX_AGE_MINUTES))
    }
}

impl SnapshotSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    fn fetch(&mut self) -> Result<Snapshot> {
        Ok(self.next_snapshot(Utc::now()))
    }
}
