use std::collections::BTreeMap;

use serde::Serialize;

/// Why a single placement attempt was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The zone resolved to an empty offset range at that point.
    ZoneEmpty,
    /// The entity generator refused the candidate.
    Generator,
    /// The footprint overlapped an earlier placement.
    Overlap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackMetrics {
    pub requested: u32,
    pub placed: u32,
    pub dropped: u32,
}

/// Counters gathered while building one layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayoutMetrics {
    pub requested_instances: u32,
    pub placed: u32,
    pub dropped: u32,
    pub zone_rejections: u32,
    pub generator_rejections: u32,
    pub overlap_rejections: u32,
    /// Config names (patterns or entities) that did not resolve and were skipped.
    pub unresolved_references: u32,
    pub per_track: BTreeMap<String, TrackMetrics>,
}

impl LayoutMetrics {
    pub fn record_requested(&mut self, track: &str, count: u32) {
        self.requested_instances += count;
        self.track_mut(track).requested += count;
    }

    pub fn record_rejection(&mut self, reason: RejectionReason) {
        match reason {
            RejectionReason::ZoneEmpty => self.zone_rejections += 1,
            RejectionReason::Generator => self.generator_rejections += 1,
            RejectionReason::Overlap => self.overlap_rejections += 1,
        }
    }

    pub fn record_placed(&mut self, track: &str) {
        self.placed += 1;
        self.track_mut(track).placed += 1;
    }

    pub fn record_dropped(&mut self, track: &str) {
        self.dropped += 1;
        self.track_mut(track).dropped += 1;
    }

    pub fn placed_for(&self, track: &str) -> u32 {
        self.per_track.get(track).map(|t| t.placed).unwrap_or(0)
    }

    fn track_mut(&mut self, track: &str) -> &mut TrackMetrics {
        self.per_track.entry(track.to_string()).or_default()
    }

    pub fn log_summary(&self, seed: u64) {
        for (track, counts) in &self.per_track {
            tracing::debug!(
                target: "river_course::layout",
                track = %track,
                requested = counts.requested,
                placed = counts.placed,
                dropped = counts.dropped,
                "layout.track.generated"
            );
        }
        tracing::info!(
            target: "river_course::layout",
            seed,
            requested = self.requested_instances,
            placed = self.placed,
            dropped = self.dropped,
            zone_rejections = self.zone_rejections,
            generator_rejections = self.generator_rejections,
            overlap_rejections = self.overlap_rejections,
            unresolved_references = self.unresolved_references,
            "layout.generated"
        );
    }
}
