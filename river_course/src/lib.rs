//! Procedural river course layout.
//!
//! Samples a river centerline into an arc-length path, derives a weaving
//! travel line, and fills the course with non-overlapping entity placements
//! driven by declarative tracks, stages, scenes and patterns. Layouts are
//! built once per biome and spawned into a Bevy [`World`] in small batches.

pub mod centerline;
pub mod composer;
pub mod course_config;
pub mod geometry;
pub mod hashing;
pub mod layout;
pub mod metrics;
pub mod noise;
pub mod patterns;
pub mod rules;
pub mod spatial;
pub mod spawner;
pub mod weaving;

use std::sync::Arc;

use bevy::prelude::*;

pub use centerline::{MeanderingRiver, RiverCenterlineModel, StraightChannel};
pub use composer::{
    compose_stage, compose_track, ComposedScene, ExplicitPlacement, SceneConfig, StageConfig,
    TrackConfig, TrackGeneration,
};
pub use course_config::{
    load_course_config_from_env, BankSolverConfig, CourseConfig, CourseConfigError,
    CourseConfigHandle, CourseConfigMetadata,
};
pub use geometry::{
    arc_length_of, binary_search_path, get_path_point, interpolate_path_point, sample_at,
    sample_river, world_z_of, GeometryError, PathPoint,
};
pub use layout::{create_layout, BiomeId, EntityPlacement, LayoutCache, LayoutError, RiverLayout};
pub use metrics::LayoutMetrics;
pub use patterns::{PatternAlgorithm, PatternConfig, PlacementZone, Side};
pub use rules::{
    EntityCatalog, EntityGeneratorFn, EntityRule, GeneratedEntity, GeneratorContext, Habitat,
    HabitatMask,
};
pub use spatial::{SpatialEntry, SpatialGrid};
pub use spawner::{
    drive_active_spawn, ActiveSpawn, EntitySpawnConfig, LayoutSpawner, MarkerSpawn, PlacedEntity,
    PopulationContext, SpawnRegistry, SpawnStep,
};

/// Collaborators shared by every biome of one course.
#[derive(Resource, Clone)]
pub struct CourseRuntime {
    pub model: Arc<dyn RiverCenterlineModel>,
    pub catalog: Arc<EntityCatalog>,
    pub registry: Arc<SpawnRegistry>,
    pub seed: u64,
}

impl CourseRuntime {
    /// Catalog and marker spawns derived from the config's entity rules.
    pub fn from_config(
        model: Arc<dyn RiverCenterlineModel>,
        config: &CourseConfig,
        seed: u64,
    ) -> Self {
        Self {
            model,
            catalog: Arc::new(EntityCatalog::from_rules(&config.entities)),
            registry: Arc::new(SpawnRegistry::markers_for(&config.entities, 1)),
            seed,
        }
    }
}

/// Construct a Bevy [`App`] that can build and spawn river layouts.
///
/// The course config comes from `COURSE_CONFIG_PATH` when set, otherwise the
/// builtin copy.
pub fn build_course_app(model: Arc<dyn RiverCenterlineModel>, seed: u64) -> App {
    let mut app = App::new();

    let (config, metadata) = load_course_config_from_env();
    let runtime = CourseRuntime::from_config(model, &config, seed);

    app.insert_resource(CourseConfigHandle::new(config))
        .insert_resource(metadata)
        .insert_resource(runtime)
        .insert_resource(LayoutCache::default())
        .add_plugins(MinimalPlugins)
        .add_systems(Update, drive_active_spawn);

    app
}

/// Build (or reuse) the layout for `biome` and queue spawning of the
/// placements inside `spawn_window`. Subsequent `Update`s drive the spawn.
pub fn start_biome_spawn(
    world: &mut World,
    biome: BiomeId,
    biome_z_range: (f32, f32),
    spawn_window: (f32, f32),
) -> Result<(), LayoutError> {
    let config = world.resource::<CourseConfigHandle>().get();
    let runtime = world.resource::<CourseRuntime>().clone();
    let seed = hashing::seed_for_label(runtime.seed, &biome.to_string());

    let layout = world
        .resource_mut::<LayoutCache>()
        .get_or_build(biome, || {
            create_layout(
                runtime.model.as_ref(),
                &config,
                &runtime.catalog,
                seed,
                biome_z_range,
            )
        })?;

    let spawner = LayoutSpawner::new(
        layout,
        Arc::clone(&runtime.registry),
        spawn_window,
        config.spawn.batch_size,
    );
    world.insert_resource(ActiveSpawn::new(biome, spawner));
    Ok(())
}
