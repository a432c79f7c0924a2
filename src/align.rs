//! Time-Base Aligner: put every channel of one import on a shared grid.
//!
//! Channels in the source logs sample at irregular, mutually unrelated
//! times. The aligner does NOT resample onto a fixed-step grid; the common
//! time base is the sorted union of every timestamp actually observed.
//! Each channel keeps its own sample points, and values at grid timestamps
//! a channel never sampled are produced on demand by linear interpolation
//! ([`ChannelSeries::value_at`]) — never outside the channel's own observed
//! range, and never across a zero-length interval.
//!
//! The whole operation is synchronous, CPU-bound and deterministic:
//! identical input yields bit-identical output.

use crate::state::{AlignedChannelSet, ChannelSeries};

/// Align channel series onto the union-of-timestamps grid.
///
/// Input series are expected sorted with strictly increasing timestamps,
/// as produced by the splitter. Empty input yields an empty set.
pub fn align(channels: Vec<ChannelSeries>) -> AlignedChannelSet {
    let mut grid: Vec<f64> = channels
        .iter()
        .flat_map(|c| c.samples.iter().map(|s| s[0]))
        .collect();
    grid.sort_by(f64::total_cmp);
    grid.dedup();

    let set = AlignedChannelSet { grid, channels };
    tracing::info!(
        channels = set.channel_count(),
        grid_points = set.grid.len(),
        duration_secs = set.duration(),
        "Aligned channels onto shared time base"
    );
    set
}

/// Values of the selected channels at one grid timestamp, for combined
/// views that intersect several channels.
///
/// A channel contributes `None` where `t` is outside its own observed
/// range; intersection (all channels defined) is the caller's choice.
pub fn values_at(set: &AlignedChannelSet, channel_ids: &[&str], t: f64) -> Vec<Option<f64>> {
    channel_ids
        .iter()
        .map(|id| set.channel(id).and_then(|c| c.value_at(t)))
        .collect()
}
