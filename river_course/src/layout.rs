//! One-shot layout construction and the per-biome layout cache.

use std::{collections::HashMap, fmt, sync::Arc};

use bevy::{math::Vec2, prelude::Resource};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    centerline::RiverCenterlineModel,
    composer::{compose_track, TrackConfig, TrackGeneration},
    course_config::CourseConfig,
    geometry::{get_path_point, sample_river, GeometryError, PathPoint},
    hashing::seed_for_label,
    metrics::LayoutMetrics,
    patterns::PlacementEngine,
    rules::{EntityCatalog, Habitat},
    weaving::apply_weaving_path,
};

/// An accepted placement. `position` is world `(x, z)`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPlacement {
    pub track: String,
    pub entity: String,
    pub spawn_kind: String,
    /// Fractional index into [`RiverLayout::points`].
    pub path_index: f32,
    pub position: Vec2,
    pub offset: f32,
    pub radius: f32,
    pub habitat: Habitat,
}

/// Sampled path plus every placement, in generation order.
#[derive(Debug, Clone, Default)]
pub struct RiverLayout {
    pub seed: u64,
    pub biome_z_range: (f32, f32),
    pub points: Vec<PathPoint>,
    pub placements: Vec<EntityPlacement>,
    pub metrics: LayoutMetrics,
}

impl RiverLayout {
    pub fn total_length(&self) -> f32 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (last.arc_length - first.arc_length).abs(),
            _ => 0.0,
        }
    }

    pub fn sample(&self, path_index: f32) -> Option<PathPoint> {
        get_path_point(&self.points, path_index)
    }

    pub fn placements_for<'a>(
        &'a self,
        track: &'a str,
    ) -> impl Iterator<Item = &'a EntityPlacement> + 'a {
        self.placements.iter().filter(move |p| p.track == track)
    }
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Warn once about every name in `track` that does not resolve and return
/// how many were found. Unresolved entries are skipped during placement.
fn report_unresolved(track: &TrackConfig, catalog: &EntityCatalog) -> u32 {
    let mut unresolved = 0;
    match &track.generation {
        TrackGeneration::Staged { patterns, stages } => {
            for pattern in patterns.iter().filter(|p| !catalog.contains(&p.entity)) {
                warn!(
                    target: "river_course::config",
                    track = %track.name,
                    pattern = %pattern.name,
                    entity = %pattern.entity,
                    "course_config.unknown_entity"
                );
                unresolved += 1;
            }
            let mut missing: Vec<&str> = Vec::new();
            for name in stages
                .iter()
                .flat_map(|stage| &stage.scenes)
                .flat_map(|scene| &scene.patterns)
            {
                if track.pattern(name).is_none() && !missing.contains(&name.as_str()) {
                    missing.push(name);
                }
            }
            for name in missing {
                warn!(
                    target: "river_course::config",
                    track = %track.name,
                    pattern = %name,
                    "course_config.unknown_pattern"
                );
                unresolved += 1;
            }
        }
        TrackGeneration::Explicit { placements } => {
            for placement in placements.iter().filter(|p| !catalog.contains(&p.entity)) {
                warn!(
                    target: "river_course::config",
                    track = %track.name,
                    entity = %placement.entity,
                    progress = placement.progress,
                    "course_config.unknown_entity"
                );
                unresolved += 1;
            }
        }
    }
    unresolved
}

/// Build the full layout for `z_range`.
///
/// Tracks run in declaration order, each on its own random stream derived
/// from `seed` and the track name. Every track commits into the same spatial
/// grid, so order matters for the result.
pub fn create_layout(
    model: &dyn RiverCenterlineModel,
    config: &CourseConfig,
    catalog: &EntityCatalog,
    seed: u64,
    z_range: (f32, f32),
) -> Result<RiverLayout, LayoutError> {
    let unresolved: u32 = config
        .tracks
        .iter()
        .map(|track| report_unresolved(track, catalog))
        .sum();

    let mut points = sample_river(
        model,
        z_range.0,
        z_range.1,
        config.sampling.step,
        &config.sampling.bank_solver,
    )?;
    apply_weaving_path(&mut points, &config.weaving);

    let mut layout = RiverLayout {
        seed,
        biome_z_range: z_range,
        ..RiverLayout::default()
    };
    if points.len() < 2 {
        debug!(
            target: "river_course::layout",
            points = points.len(),
            "layout.empty_path"
        );
        layout.points = points;
        layout.metrics.unresolved_references = unresolved;
        return Ok(layout);
    }

    let (placements, mut metrics) = {
        let mut engine = PlacementEngine::new(
            model,
            &points,
            catalog,
            &config.placement,
            &config.spatial,
            z_range,
        );
        let total_length = engine.total_length();

        for track in &config.tracks {
            let mut rng = ChaCha8Rng::seed_from_u64(seed_for_label(seed, &track.name));
            match &track.generation {
                TrackGeneration::Staged { stages, .. } => {
                    let scenes = compose_track(stages, total_length, &mut rng);
                    debug!(
                        target: "river_course::layout",
                        track = %track.name,
                        scenes = scenes.len(),
                        "layout.track.composed"
                    );
                    for scene in &scenes {
                        for name in &scene.patterns {
                            match track.pattern(name) {
                                Some(pattern) if catalog.contains(&pattern.entity) => {
                                    engine.place_pattern(&track.name, pattern, scene, &mut rng);
                                }
                                _ => {}
                            }
                        }
                    }
                }
                TrackGeneration::Explicit { placements } => {
                    for placement in placements.iter().filter(|p| catalog.contains(&p.entity)) {
                        engine.place_explicit(&track.name, placement, &mut rng);
                    }
                }
            }
        }
        engine.finish()
    };
    metrics.unresolved_references = unresolved;

    metrics.log_summary(seed);
    layout.points = points;
    layout.placements = placements;
    layout.metrics = metrics;
    Ok(layout)
}

/// Key for a biome instance along the course.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BiomeId(pub u32);

impl fmt::Display for BiomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Layouts are built once per biome and shared read-only afterward.
#[derive(Resource, Debug, Clone, Default)]
pub struct LayoutCache {
    layouts: HashMap<BiomeId, Arc<RiverLayout>>,
}

impl LayoutCache {
    pub fn get(&self, biome: BiomeId) -> Option<Arc<RiverLayout>> {
        self.layouts.get(&biome).cloned()
    }

    pub fn get_or_build<F>(
        &mut self,
        biome: BiomeId,
        build: F,
    ) -> Result<Arc<RiverLayout>, LayoutError>
    where
        F: FnOnce() -> Result<RiverLayout, LayoutError>,
    {
        if let Some(layout) = self.layouts.get(&biome) {
            return Ok(Arc::clone(layout));
        }
        let layout = Arc::new(build()?);
        debug!(
            target: "river_course::layout",
            biome = %biome,
            placements = layout.placements.len(),
            "layout.cached"
        );
        self.layouts.insert(biome, Arc::clone(&layout));
        Ok(layout)
    }

    pub fn invalidate(&mut self, biome: BiomeId) -> Option<Arc<RiverLayout>> {
        self.layouts.remove(&biome)
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::centerline::{MeanderingRiver, StraightChannel};

    fn builtin_layout(seed: u64) -> RiverLayout {
        let config = CourseConfig::builtin();
        let catalog = EntityCatalog::from_rules(&config.entities);
        let river = MeanderingRiver::new(17);
        create_layout(&river, &config, &catalog, seed, config.extent.range()).unwrap()
    }

    #[test]
    fn builtin_config_produces_placements_for_every_track() {
        let layout = builtin_layout(7);
        let config = CourseConfig::builtin();
        assert!(layout.points.len() > 100);
        for track in &config.tracks {
            assert!(
                layout.placements_for(&track.name).next().is_some(),
                "track {} placed nothing",
                track.name
            );
        }
        assert_eq!(layout.metrics.placed as usize, layout.placements.len());
    }

    #[test]
    fn same_seed_same_layout() {
        let a = builtin_layout(99);
        let b = builtin_layout(99);
        assert_eq!(a.placements, b.placements);
        let c = builtin_layout(100);
        assert_ne!(a.placements, c.placements);
    }

    #[test]
    fn unresolved_references_are_skipped() {
        let config = CourseConfig::from_json_str(
            r#"{
                "entities": [{ "id": "rock", "radius": [0.5, 0.5] }],
                "tracks": [
                    {
                        "name": "obstacles",
                        "generation": {
                            "mode": "staged",
                            "patterns": [
                                { "name": "rocks", "entity": "rock", "density": [5.0, 5.0], "zone": "middle",
                                  "algorithm": { "kind": "scatter" } },
                                { "name": "logs", "entity": "log", "density": [5.0, 5.0], "zone": "middle",
                                  "algorithm": { "kind": "scatter" } }
                            ],
                            "stages": [{ "progress": [0.0, 1.0], "scenes": [
                                { "length": [50.0, 50.0], "patterns": ["rocks", "logs", "missing"] }
                            ] }]
                        }
                    },
                    {
                        "name": "landmarks",
                        "generation": { "mode": "explicit", "placements": [
                            { "progress": 0.5, "entity": "hut", "zone": "on_shore" },
                            { "progress": 0.25, "entity": "rock", "zone": "middle", "side": "left" }
                        ] }
                    }
                ]
            }"#,
        )
        .unwrap();
        let catalog = EntityCatalog::from_rules(&config.entities);
        let channel = StraightChannel::new(0.0, 40.0);
        let layout = create_layout(&channel, &config, &catalog, 1, (0.0, 500.0)).unwrap();

        // `logs` -> `log`, scene -> `missing`, explicit -> `hut`.
        assert_eq!(layout.metrics.unresolved_references, 3);
        assert!(!layout.placements.is_empty());
        assert!(layout.placements.iter().all(|p| p.entity == "rock"));
        assert_eq!(layout.metrics.placed_for("landmarks"), 1);
        assert_eq!(layout.metrics.per_track["landmarks"].requested, 1);
    }

    #[test]
    fn only_unresolved_references_give_an_empty_layout() {
        let config = CourseConfig::from_json_str(
            r#"{
                "tracks": [{
                    "name": "obstacles",
                    "generation": {
                        "mode": "staged",
                        "patterns": [],
                        "stages": [{ "progress": [0.0, 1.0], "scenes": [{ "length": [10.0, 20.0], "patterns": ["missing"] }] }]
                    }
                }]
            }"#,
        )
        .unwrap();
        let channel = StraightChannel::new(0.0, 40.0);
        let layout = create_layout(&channel, &config, &EntityCatalog::new(), 1, (0.0, 100.0)).unwrap();
        assert!(layout.points.len() > 1);
        assert!(layout.placements.is_empty());
        assert_eq!(layout.metrics.unresolved_references, 1);
    }

    #[test]
    fn degenerate_inputs_give_empty_layouts() {
        let channel = StraightChannel::new(0.0, 40.0);
        let config = CourseConfig::builtin();
        let catalog = EntityCatalog::from_rules(&config.entities);
        let layout = create_layout(&channel, &config, &catalog, 3, (50.0, 50.0)).unwrap();
        assert_eq!(layout.points.len(), 1);
        assert!(layout.placements.is_empty());

        let empty = CourseConfig::default();
        let layout = create_layout(&channel, &empty, &EntityCatalog::new(), 3, (0.0, 500.0)).unwrap();
        assert!(layout.points.len() > 1);
        assert!(layout.placements.is_empty());
    }

    #[test]
    fn cache_builds_once_per_biome() {
        let mut cache = LayoutCache::default();
        let mut builds = 0;
        let mut build = || {
            builds += 1;
            Ok::<_, LayoutError>(RiverLayout::default())
        };
        let first = cache.get_or_build(BiomeId(1), &mut build).unwrap();
        let second = cache.get_or_build(BiomeId(1), &mut build).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate(BiomeId(1)).is_some());
        assert!(cache.get(BiomeId(1)).is_none());
        cache.get_or_build(BiomeId(1), &mut build).unwrap();
        assert_eq!(builds, 2);
    }

    #[test]
    fn failed_builds_are_not_cached() {
        let mut cache = LayoutCache::default();
        let result = cache.get_or_build(BiomeId(4), || {
            Err(LayoutError::Geometry(GeometryError::InvalidStep { step: 0.0 }))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
