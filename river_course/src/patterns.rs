//! Placement patterns.
//!
//! A pattern turns a density target into concrete slots inside a composed
//! scene; each slot is then resolved to a lateral offset through its zone,
//! checked by the entity generator and committed through the spatial grid.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    centerline::RiverCenterlineModel,
    composer::{ComposedScene, ExplicitPlacement},
    course_config::{PlacementConfig, SpatialConfig, ZoneConfig},
    geometry::{arc_length_of, binary_search_path, get_path_point, PathPoint},
    layout::EntityPlacement,
    metrics::{LayoutMetrics, RejectionReason},
    rules::{EntityCatalog, GeneratorContext, Habitat},
    spatial::{SpatialEntry, SpatialGrid},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementZone {
    OnShore,
    Path,
    Slalom,
    NearShore,
    Middle,
}

impl PlacementZone {
    pub const ALL: [PlacementZone; 5] = [
        PlacementZone::OnShore,
        PlacementZone::Slalom,
        PlacementZone::NearShore,
        PlacementZone::Middle,
        PlacementZone::Path,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlacementZone::OnShore => "on_shore",
            PlacementZone::Path => "path",
            PlacementZone::Slalom => "slalom",
            PlacementZone::NearShore => "near_shore",
            PlacementZone::Middle => "middle",
        }
    }
}

/// Bank side relative to the travel direction. `Right` follows the normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn sign(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn random(rng: &mut ChaCha8Rng) -> Self {
        if rng.gen_bool(0.5) {
            Side::Right
        } else {
            Side::Left
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

fn default_cluster_spread() -> f32 {
    12.0
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternAlgorithm {
    /// Independent uniform positions, random side each.
    Scatter,
    /// Evenly spaced along one bank.
    Sequence,
    /// Evenly spaced, alternating banks.
    Staggered,
    /// Evenly spaced pairs, one instance per bank.
    Gate,
    /// Jittered around a single random center per scene.
    Cluster {
        /// Maximum arc-length distance from the cluster center.
        #[serde(default = "default_cluster_spread")]
        spread: f32,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternConfig {
    pub name: String,
    pub entity: String,
    /// Instances per 100 m at course start and end.
    pub density: [f32; 2],
    pub zone: PlacementZone,
    #[serde(default)]
    pub min_count: Option<u32>,
    #[serde(default)]
    pub max_count: Option<u32>,
    pub algorithm: PatternAlgorithm,
}

impl PatternConfig {
    pub fn density_at(&self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);
        (self.density[0] * (1.0 - t) + self.density[1] * t).max(0.0)
    }

    /// Integer part of the expected count plus a Bernoulli draw on the
    /// fraction, clamped to the configured bounds.
    pub fn instance_count(&self, scene_length: f32, progress: f32, rng: &mut ChaCha8Rng) -> u32 {
        let expected = scene_length.max(0.0) / 100.0 * self.density_at(progress);
        let mut count = 0u32;
        if expected.is_finite() {
            let whole = expected.floor();
            let fraction = f64::from(expected - whole).clamp(0.0, 1.0);
            count = whole as u32;
            if fraction > 0.0 && rng.gen_bool(fraction) {
                count += 1;
            }
        }
        if let Some(min) = self.min_count {
            count = count.max(min);
        }
        if let Some(max) = self.max_count {
            count = count.min(max);
        }
        count
    }
}

/// Signed lateral offset range for `zone` on `side`, or `None` when the
/// channel leaves no room for it at this sample.
pub fn zone_offset_range(
    zone: PlacementZone,
    side: Side,
    bank_dist: f32,
    boat_offset: f32,
    zones: &ZoneConfig,
) -> Option<(f32, f32)> {
    if !(bank_dist > 0.0) {
        return None;
    }
    let mirror = |lo: f32, hi: f32| match side {
        Side::Right => (lo, hi),
        Side::Left => (-hi, -lo),
    };
    let mid = zones.mid_channel_fraction * bank_dist;
    let (lo, hi) = match zone {
        PlacementZone::OnShore => mirror(bank_dist, bank_dist + zones.shore_band),
        PlacementZone::NearShore => mirror(mid, bank_dist + zones.shore_band),
        PlacementZone::Middle => mirror(0.0, mid),
        // Keeps a gap around the travel line on whichever side is asked for.
        PlacementZone::Slalom => match side {
            Side::Right => (
                boat_offset + zones.slalom_boat_gap,
                bank_dist - zones.slalom_bank_gap,
            ),
            Side::Left => (
                -(bank_dist - zones.slalom_bank_gap),
                boat_offset - zones.slalom_boat_gap,
            ),
        },
        PlacementZone::Path => (
            boat_offset - zones.path_half_width,
            boat_offset + zones.path_half_width,
        ),
    };
    (lo <= hi).then_some((lo, hi))
}

/// Arc position and bank side for one pattern instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternSlot {
    pub arc: f32,
    pub side: Side,
}

pub fn pattern_slots(
    algorithm: PatternAlgorithm,
    count: u32,
    start_arc: f32,
    end_arc: f32,
    rng: &mut ChaCha8Rng,
) -> Vec<PatternSlot> {
    let length = end_arc - start_arc;
    if count == 0 || !(length >= 0.0) {
        return Vec::new();
    }
    let evenly = |i: u32, n: u32| start_arc + length * (i as f32 + 0.5) / n as f32;
    let uniform = |rng: &mut ChaCha8Rng| rng.gen_range(start_arc..=end_arc);

    match algorithm {
        PatternAlgorithm::Scatter => (0..count)
            .map(|_| {
                let arc = uniform(rng);
                PatternSlot {
                    arc,
                    side: Side::random(rng),
                }
            })
            .collect(),
        PatternAlgorithm::Sequence => {
            let side = Side::random(rng);
            (0..count)
                .map(|i| PatternSlot {
                    arc: evenly(i, count),
                    side,
                })
                .collect()
        }
        PatternAlgorithm::Staggered => {
            let mut side = Side::random(rng);
            (0..count)
                .map(|i| {
                    let slot = PatternSlot {
                        arc: evenly(i, count),
                        side,
                    };
                    side = side.flip();
                    slot
                })
                .collect()
        }
        PatternAlgorithm::Gate => {
            let gates = count.div_ceil(2);
            (0..count)
                .map(|i| PatternSlot {
                    arc: evenly(i / 2, gates),
                    side: if i % 2 == 0 { Side::Right } else { Side::Left },
                })
                .collect()
        }
        PatternAlgorithm::Cluster { spread } => {
            let spread = if spread.is_finite() { spread.abs() } else { 0.0 };
            let center = uniform(rng);
            let side = Side::random(rng);
            (0..count)
                .map(|_| {
                    let jitter = rng.gen_range(-spread..=spread);
                    PatternSlot {
                        arc: (center + jitter).clamp(start_arc, end_arc),
                        side,
                    }
                })
                .collect()
        }
    }
}

/// Commits placements for one layout run.
///
/// The grid and placement list are shared by every track, so each accepted
/// placement constrains everything placed after it.
pub struct PlacementEngine<'a> {
    model: &'a dyn RiverCenterlineModel,
    points: &'a [PathPoint],
    catalog: &'a EntityCatalog,
    config: &'a PlacementConfig,
    biome_z_range: (f32, f32),
    origin: f32,
    total_length: f32,
    grid: SpatialGrid,
    placements: Vec<EntityPlacement>,
    metrics: LayoutMetrics,
}

impl<'a> PlacementEngine<'a> {
    pub fn new(
        model: &'a dyn RiverCenterlineModel,
        points: &'a [PathPoint],
        catalog: &'a EntityCatalog,
        config: &'a PlacementConfig,
        spatial: &SpatialConfig,
        biome_z_range: (f32, f32),
    ) -> Self {
        let origin = points.first().map(arc_length_of).unwrap_or(0.0);
        let total_length = points
            .last()
            .map(|last| (last.arc_length - origin).abs())
            .unwrap_or(0.0);
        Self {
            model,
            points,
            catalog,
            config,
            biome_z_range,
            origin,
            total_length,
            grid: SpatialGrid::new(spatial.cell_size),
            placements: Vec::new(),
            metrics: LayoutMetrics::default(),
        }
    }

    pub fn total_length(&self) -> f32 {
        self.total_length
    }

    pub fn placements(&self) -> &[EntityPlacement] {
        &self.placements
    }

    fn progress_at(&self, arc: f32) -> f32 {
        if self.total_length > 0.0 {
            ((arc - self.origin) / self.total_length).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Run `pattern` over `scene`. Returns how many instances were placed.
    pub fn place_pattern(
        &mut self,
        track: &str,
        pattern: &PatternConfig,
        scene: &ComposedScene,
        rng: &mut ChaCha8Rng,
    ) -> u32 {
        let progress = self.progress_at(self.origin + scene.midpoint());
        let count = pattern.instance_count(scene.length(), progress, rng);
        self.metrics.record_requested(track, count);
        let slots = pattern_slots(
            pattern.algorithm,
            count,
            self.origin + scene.start_arc,
            self.origin + scene.end_arc,
            rng,
        );
        let mut placed = 0;
        for slot in slots {
            if self.place_at(track, &pattern.entity, pattern.zone, slot.side, slot.arc, rng) {
                placed += 1;
            }
        }
        placed
    }

    pub fn place_explicit(
        &mut self,
        track: &str,
        placement: &ExplicitPlacement,
        rng: &mut ChaCha8Rng,
    ) -> bool {
        self.metrics.record_requested(track, 1);
        let side = placement.side.unwrap_or_else(|| Side::random(rng));
        let arc = self.origin + placement.progress.clamp(0.0, 1.0) * self.total_length;
        self.place_at(track, &placement.entity, placement.zone, side, arc, rng)
    }

    /// Try up to `max_attempts` fresh offsets at `arc`; the instance is
    /// dropped when none of them is accepted.
    pub fn place_at(
        &mut self,
        track: &str,
        entity: &str,
        zone: PlacementZone,
        side: Side,
        arc: f32,
        rng: &mut ChaCha8Rng,
    ) -> bool {
        let path_index = binary_search_path(self.points, arc, arc_length_of);
        let (Some(generator), Some(sample)) = (
            self.catalog.get(entity).cloned(),
            get_path_point(self.points, path_index),
        ) else {
            self.metrics.record_dropped(track);
            return false;
        };
        let progress = self.progress_at(arc);

        for _ in 0..self.config.max_attempts.max(1) {
            let Some((lo, hi)) = zone_offset_range(
                zone,
                side,
                sample.bank_dist,
                sample.boat_x_offset,
                &self.config.zones,
            ) else {
                // Same sample, same answer; no point redrawing.
                self.metrics.record_rejection(RejectionReason::ZoneEmpty);
                break;
            };
            let offset = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
            let position = sample.lateral(offset);
            let ctx = GeneratorContext {
                sample: &sample,
                position,
                offset,
                habitat: Habitat::for_offset(offset, sample.bank_dist),
                progress,
                biome_z_range: self.biome_z_range,
                model: self.model,
            };

            let generated = match generator(&ctx, rng) {
                Some(generated) if generated.radius > 0.0 => generated,
                _ => {
                    self.metrics.record_rejection(RejectionReason::Generator);
                    continue;
                }
            };
            if !self
                .grid
                .try_insert(SpatialEntry::new(position, generated.radius))
            {
                self.metrics.record_rejection(RejectionReason::Overlap);
                continue;
            }

            self.placements.push(EntityPlacement {
                track: track.to_string(),
                entity: entity.to_string(),
                spawn_kind: generated.spawn_kind,
                path_index,
                position,
                offset,
                radius: generated.radius,
                habitat: generated.habitat,
            });
            self.metrics.record_placed(track);
            return true;
        }

        trace!(
            target: "river_course::layout",
            track,
            entity,
            zone = zone.as_str(),
            arc,
            "layout.instance_dropped"
        );
        self.metrics.record_dropped(track);
        false
    }

    pub fn finish(self) -> (Vec<EntityPlacement>, LayoutMetrics) {
        (self.placements, self.metrics)
    }
}
