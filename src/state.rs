//! Core data types and constants.
//!
//! This module contains the fundamental data structures shared by the
//! pipeline: raw samples, per-channel series, the aligned channel set,
//! and the persisted Import/Snapshot records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

// ============================================================================
// Constants
// ============================================================================

/// Field separator used by the source devices' log export.
///
/// Semicolon rather than comma: the exporting devices emit comma decimal
/// separators in other formats, so comma-delimited parsing is ambiguous.
pub const LOG_DELIMITER: char = ';';

/// Maximum length of a sanitized channel name used in filesystem artifacts.
pub const MAX_SANITIZED_NAME_LEN: usize = 100;

/// Marker appended to a sanitized name that was truncated.
pub const TRUNCATION_MARKER: &str = "...";

/// Characters rejected in snapshot names (reserved on common filesystems).
pub const RESERVED_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Color palette for per-import display colors in snapshots.
pub const DISPLAY_COLORS: &[[u8; 3]] = &[
    [113, 120, 78],  // Olive green (primary)
    [191, 78, 48],   // Rust orange (accent)
    [71, 108, 155],  // Blue (info)
    [159, 166, 119], // Sage green (success)
    [253, 193, 73],  // Amber (warning)
    [135, 30, 28],   // Dark red (error)
    [100, 149, 237], // Cornflower blue
    [255, 127, 80],  // Coral
    [144, 238, 144], // Light green
    [153, 153, 153], // Gray
];

// ============================================================================
// Series types
// ============================================================================

/// One row lifted out of the flat log before grouping by channel.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSample {
    /// Timestamp in seconds.
    pub timestamp: f64,
    /// Channel identifier as it appears in the log (the PID).
    pub channel_id: String,
    /// Sampled value.
    pub value: f64,
    /// Unit string, when the row carries one.
    pub unit: Option<String>,
}

/// Time series for a single channel.
///
/// Invariant: `samples` is sorted by timestamp and strictly increasing
/// (duplicates removed, first occurrence kept). `unit` is the single unit
/// associated with the channel; conflicting units seen during parsing are
/// reported in the parse summary, not stored here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelSeries {
    /// Channel identifier.
    pub channel_id: String,
    /// Unit string (may be empty when the log carried none).
    pub unit: String,
    /// `[timestamp, value]` pairs, strictly increasing timestamps.
    pub samples: Vec<[f64; 2]>,
}

impl ChannelSeries {
    pub fn new(channel_id: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            unit: unit.into(),
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// First (earliest) timestamp in the series.
    pub fn first_time(&self) -> Option<f64> {
        self.samples.first().map(|s| s[0])
    }

    /// Last (latest) timestamp in the series.
    pub fn last_time(&self) -> Option<f64> {
        self.samples.last().map(|s| s[0])
    }

    /// Value at time `t`: the exact sample when one exists, otherwise the
    /// linear interpolation between the two nearest samples.
    ///
    /// Returns `None` outside the channel's own observed `[min, max]` range —
    /// channels are never extrapolated. A single-sample series only answers
    /// at its one timestamp.
    pub fn value_at(&self, t: f64) -> Option<f64> {
        let idx = self.samples.partition_point(|s| s[0] < t);

        if let Some(s) = self.samples.get(idx) {
            if s[0] == t {
                return Some(s[1]);
            }
        }
        // t falls before the first or after the last sample.
        if idx == 0 || idx == self.samples.len() {
            return None;
        }

        let [t0, v0] = self.samples[idx - 1];
        let [t1, v1] = self.samples[idx];
        // Timestamps are strictly increasing, so t1 > t0 here.
        let frac = (t - t0) / (t1 - t0);
        Some(v0 + frac * (v1 - v0))
    }
}

/// All channels of one import aligned onto a shared time grid.
///
/// The grid is the sorted union of every timestamp observed across the
/// channels. Each channel keeps only its own observed sample points; values
/// at grid timestamps a channel did not sample are produced on demand by
/// [`ChannelSeries::value_at`], and are undefined outside the channel's own
/// time range.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignedChannelSet {
    /// Sorted union of all observed timestamps.
    pub grid: Vec<f64>,
    /// Per-channel series, in insertion order of first appearance.
    pub channels: Vec<ChannelSeries>,
}

impl AlignedChannelSet {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Look up a channel by identifier.
    pub fn channel(&self, channel_id: &str) -> Option<&ChannelSeries> {
        self.channels.iter().find(|c| c.channel_id == channel_id)
    }

    /// Unit string for a channel, if the channel exists.
    pub fn unit(&self, channel_id: &str) -> Option<&str> {
        self.channel(channel_id).map(|c| c.unit.as_str())
    }

    /// Total number of stored data points across all channels.
    pub fn total_points(&self) -> usize {
        self.channels.iter().map(ChannelSeries::len).sum()
    }

    /// Span of the shared grid in seconds (0.0 for empty or single-point grids).
    pub fn duration(&self) -> f64 {
        match (self.grid.first(), self.grid.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Summary consumed by the presentation layer for the pre-import preview.
    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            channel_count: self.channel_count(),
            total_data_points: self.total_points(),
            duration: self.duration(),
        }
    }
}

/// Pre-import preview surface: what a caller sees before committing a create.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub channel_count: usize,
    pub total_data_points: usize,
    /// Max timestamp minus min timestamp across the aligned set, in seconds.
    pub duration: f64,
}

// ============================================================================
// Persisted records
// ============================================================================

/// Processing status of an import.
#[derive(
    AsRefStr, Clone, Copy, Debug, Default, Deserialize, EnumString, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImportStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

/// Persisted import record. Immutable after creation except for deletion.
///
/// The channel data itself is stored alongside this record by the channel
/// store; the import is the sole durable owner of that data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// Unique identifier (UUID).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Processing status.
    pub status: ImportStatus,
    /// Number of channels, recorded at creation time. Authoritative: readers
    /// never recompute it from the stored channel data.
    pub channel_count: usize,
    /// Total stored data points, recorded at creation time.
    pub total_size: usize,
    /// Path of the source log file this import was created from.
    pub original_filename: String,
}

/// Per-import time window within a snapshot, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

/// One import reference inside a snapshot, with its display state.
///
/// The snapshot never owns channel data; only the import identifier plus
/// how that import should be presented.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Identifier of the referenced import (weak reference).
    pub import_id: String,
    /// Visible time window; `None` shows the full range.
    #[serde(default)]
    pub window: Option<TimeWindow>,
    /// Per-channel visibility. Channels absent from the map default to visible.
    #[serde(default)]
    pub visibility: BTreeMap<String, bool>,
    /// Display color for the import's traces.
    #[serde(default)]
    pub color: Option<[u8; 3]>,
}

impl SnapshotEntry {
    pub fn new(import_id: impl Into<String>) -> Self {
        Self {
            import_id: import_id.into(),
            ..Self::default()
        }
    }
}

/// Persisted named view over one or more imports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique identifier (UUID).
    pub id: String,
    /// Display name. Rejects path-reserved characters at creation time.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Ordered import references with display state.
    pub entries: Vec<SnapshotEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(samples: &[[f64; 2]]) -> ChannelSeries {
        ChannelSeries {
            channel_id: "RPM".to_string(),
            unit: "rpm".to_string(),
            samples: samples.to_vec(),
        }
    }

    #[test]
    fn test_value_at_exact_sample() {
        let s = series(&[[0.0, 800.0], [1.0, 1200.0]]);
        assert_eq!(s.value_at(0.0), Some(800.0));
        assert_eq!(s.value_at(1.0), Some(1200.0));
    }

    #[test]
    fn test_value_at_interpolates_between_samples() {
        let s = series(&[[0.0, 10.0], [2.0, 20.0]]);
        assert_eq!(s.value_at(1.0), Some(15.0));
        assert_eq!(s.value_at(0.5), Some(12.5));
    }

    #[test]
    fn test_value_at_outside_range_is_none() {
        let s = series(&[[0.0, 800.0], [1.0, 1200.0]]);
        assert_eq!(s.value_at(-0.5), None);
        assert_eq!(s.value_at(2.0), None);
    }

    #[test]
    fn test_value_at_single_sample_only_answers_its_own_time() {
        let s = series(&[[3.0, 42.0]]);
        assert_eq!(s.value_at(3.0), Some(42.0));
        assert_eq!(s.value_at(2.9), None);
        assert_eq!(s.value_at(3.1), None);
    }

    #[test]
    fn test_value_at_empty_series_is_none() {
        let s = series(&[]);
        assert_eq!(s.value_at(0.0), None);
    }

    #[test]
    fn test_set_duration_and_summary() {
        let set = AlignedChannelSet {
            grid: vec![0.0, 1.0, 2.5],
            channels: vec![
                series(&[[0.0, 800.0], [1.0, 1200.0]]),
                ChannelSeries {
                    channel_id: "SPEED".to_string(),
                    unit: "mph".to_string(),
                    samples: vec![[0.0, 10.0], [2.5, 20.0]],
                },
            ],
        };
        let summary = set.summary();
        assert_eq!(summary.channel_count, 2);
        assert_eq!(summary.total_data_points, 4);
        assert_eq!(summary.duration, 2.5);
    }

    #[test]
    fn test_empty_set_summary_is_zeroed() {
        let summary = AlignedChannelSet::default().summary();
        assert_eq!(summary.channel_count, 0);
        assert_eq!(summary.total_data_points, 0);
        assert_eq!(summary.duration, 0.0);
    }

    #[test]
    fn test_import_status_string_forms() {
        use std::str::FromStr;
        assert_eq!(ImportStatus::Completed.as_ref(), "completed");
        assert_eq!(
            ImportStatus::from_str("failed").unwrap(),
            ImportStatus::Failed
        );
    }
}
