//! Channel Splitter: flat interleaved log → per-channel time series.
//!
//! The source devices export one flat semicolon-delimited log where every
//! row carries a timestamp, a channel identifier (PID) and a value, with an
//! optional unit column. Rows for different channels are interleaved in
//! arbitrary order. This module groups rows by channel and produces one
//! sorted, duplicate-free series per channel plus a summary of everything
//! that had to be skipped or flagged along the way.
//!
//! Parsing is lenient by design: a bad row degrades the result, it never
//! aborts the import.

use std::collections::HashMap;

use crate::error::SplitError;
use crate::state::{ChannelSeries, RawSample, LOG_DELIMITER};

/// Counters and flags accumulated during one parse.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParseSummary {
    /// Non-empty data rows seen (header excluded).
    pub rows_total: usize,
    /// Rows skipped for missing fields or an unusable timestamp/channel.
    pub rows_skipped: usize,
    /// Values dropped because they failed numeric parsing.
    pub values_dropped: usize,
    /// Channels that reported more than one unit string.
    pub unit_conflicts: Vec<UnitConflict>,
}

/// A channel that appeared with two different unit strings.
///
/// The first-seen unit wins; conflicting rows are still accepted for their
/// value. Kept as a soft warning rather than a hard rejection.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitConflict {
    pub channel_id: String,
    /// Unit kept for the series (first seen).
    pub kept: String,
    /// Unit reported by a later row and discarded.
    pub rejected: String,
}

/// Result of splitting one log: channel series in first-appearance order
/// plus the parse summary.
#[derive(Clone, Debug, Default)]
pub struct SplitOutput {
    pub channels: Vec<ChannelSeries>,
    pub summary: ParseSummary,
}

impl SplitOutput {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel(&self, channel_id: &str) -> Option<&ChannelSeries> {
        self.channels.iter().find(|c| c.channel_id == channel_id)
    }
}

/// Column positions resolved from the header row.
struct ColumnLayout {
    timestamp: usize,
    channel: usize,
    value: usize,
    unit: Option<usize>,
    /// Minimum field count a row needs to be usable.
    min_fields: usize,
}

impl ColumnLayout {
    fn detect(header: &str) -> Result<Self, SplitError> {
        let mut timestamp = None;
        let mut channel = None;
        let mut value = None;
        let mut unit = None;

        for (idx, raw) in header.split(LOG_DELIMITER).enumerate() {
            let name = raw.trim().to_lowercase();
            match name.as_str() {
                "timestamp" | "time" => timestamp.get_or_insert(idx),
                // "pid" is the source domain's name for the channel id
                "channel" | "channel_id" | "pid" | "name" => channel.get_or_insert(idx),
                "value" => value.get_or_insert(idx),
                "unit" | "units" => unit.get_or_insert(idx),
                _ => continue,
            };
        }

        let missing = |column| SplitError::MissingColumn {
            column,
            header: header.trim().to_string(),
        };
        let timestamp = timestamp.ok_or_else(|| missing("timestamp"))?;
        let channel = channel.ok_or_else(|| missing("channel"))?;
        let value = value.ok_or_else(|| missing("value"))?;

        // The unit column is optional per row, so it never raises min_fields.
        let min_fields = timestamp.max(channel).max(value) + 1;
        Ok(Self {
            timestamp,
            channel,
            value,
            unit,
            min_fields,
        })
    }
}

/// Split a flat log into per-channel series.
///
/// Only two conditions are fatal: a log with no header row at all, and a
/// header missing one of the required {timestamp, channel, value} columns.
/// Everything else is handled row-locally and reported in the summary.
/// Channels whose series end up empty are dropped from the output.
pub fn split_log(contents: &str) -> Result<SplitOutput, SplitError> {
    let mut lines = contents.lines();
    let header = lines
        .next()
        .filter(|l| !l.trim().is_empty())
        .ok_or(SplitError::EmptyLog)?;
    let layout = ColumnLayout::detect(header)?;

    let mut summary = ParseSummary::default();

    // Stage 1: lift each usable row into a RawSample.
    let mut raw: Vec<RawSample> = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        summary.rows_total += 1;

        let fields: Vec<&str> = line.split(LOG_DELIMITER).map(str::trim).collect();
        if fields.len() < layout.min_fields {
            summary.rows_skipped += 1;
            continue;
        }

        let channel_id = fields[layout.channel];
        let timestamp = fields[layout.timestamp].parse::<f64>();
        let (channel_id, timestamp) = match (channel_id, timestamp) {
            ("", _) | (_, Err(_)) => {
                // No channel to attribute the row to, or no usable time axis.
                summary.rows_skipped += 1;
                continue;
            }
            (id, Ok(t)) => (id, t),
        };

        let value = match fields[layout.value].parse::<f64>() {
            Ok(v) => v,
            // Dropped, not null-padded: the aligner rebuilds the grid later.
            Err(_) => {
                summary.values_dropped += 1;
                continue;
            }
        };

        raw.push(RawSample {
            timestamp,
            channel_id: channel_id.to_string(),
            value,
            unit: layout
                .unit
                .and_then(|idx| fields.get(idx))
                .map(|u| u.to_string())
                .filter(|u| !u.is_empty()),
        });
    }

    // Stage 2: group samples by channel, insertion order of first appearance.
    let mut channels: Vec<ChannelSeries> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for sample in raw {
        let slot = *index.entry(sample.channel_id.clone()).or_insert_with(|| {
            channels.push(ChannelSeries::new(sample.channel_id.clone(), String::new()));
            channels.len() - 1
        });
        let series = &mut channels[slot];

        if let Some(unit) = sample.unit {
            if series.unit.is_empty() {
                series.unit = unit;
            } else if series.unit != unit {
                tracing::warn!(
                    channel = %series.channel_id,
                    kept = %series.unit,
                    rejected = %unit,
                    "Channel reported conflicting units; keeping first-seen"
                );
                summary.unit_conflicts.push(UnitConflict {
                    channel_id: series.channel_id.clone(),
                    kept: series.unit.clone(),
                    rejected: unit,
                });
            }
        }

        series.samples.push([sample.timestamp, sample.value]);
    }

    // Sort each series and drop duplicate timestamps, keeping the first
    // occurrence (stable sort preserves parse order for equal keys).
    for series in &mut channels {
        series.samples.sort_by(|a, b| a[0].total_cmp(&b[0]));
        series.samples.dedup_by(|a, b| a[0] == b[0]);
    }
    channels.retain(|series| !series.is_empty());

    tracing::info!(
        channels = channels.len(),
        rows = summary.rows_total,
        skipped = summary.rows_skipped,
        dropped_values = summary.values_dropped,
        unit_conflicts = summary.unit_conflicts.len(),
        "Split log into channel series"
    );

    Ok(SplitOutput { channels, summary })
}
