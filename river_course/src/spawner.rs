//! Incremental spawning of a cached layout.
//!
//! A [`LayoutSpawner`] walks the placements inside one world-Z window. Each
//! call to [`LayoutSpawner::produce_next_batch`] performs a bounded amount of
//! work and reports whether more remains, so a host loop can spread spawning
//! over several frames. Stopping early leaves whatever was spawned in place.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::Arc,
};

use bevy::prelude::*;
use tracing::{debug, info};

use crate::{
    geometry::{binary_search_path, world_z_of, PathPoint},
    layout::{BiomeId, EntityPlacement, RiverLayout},
    rules::{EntityRule, Habitat},
};

/// Handle given to spawn configs while they create world entities.
pub struct PopulationContext<'w> {
    pub world: &'w mut World,
    pub biome: BiomeId,
    pub biome_z_range: (f32, f32),
}

/// One item per unit of preload work.
pub type PreloadSteps = Box<dyn Iterator<Item = ()> + Send + Sync>;

/// Boundary to whatever builds the actual game entity for a spawn kind.
pub trait EntitySpawnConfig: Send + Sync {
    fn kind(&self) -> &str;

    /// Asset preload, driven one step per batch before any spawn happens.
    fn ensure_loaded(&self) -> PreloadSteps {
        Box::new(std::iter::empty())
    }

    fn spawn(&self, ctx: &mut PopulationContext<'_>, placement: &EntityPlacement, sample: &PathPoint);
}

/// Marker left on every entity spawned from a layout.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct PlacedEntity {
    pub biome: BiomeId,
    pub track: String,
    pub entity: String,
    pub spawn_kind: String,
    pub path_index: f32,
    pub position: Vec2,
    pub radius: f32,
    pub habitat: Habitat,
}

/// Spawns a bare [`PlacedEntity`] with a transform at the placement.
#[derive(Debug, Clone)]
pub struct MarkerSpawn {
    kind: String,
    preload_steps: usize,
}

impl MarkerSpawn {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            preload_steps: 0,
        }
    }

    pub fn with_preload_steps(mut self, steps: usize) -> Self {
        self.preload_steps = steps;
        self
    }
}

impl EntitySpawnConfig for MarkerSpawn {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn ensure_loaded(&self) -> PreloadSteps {
        Box::new(std::iter::repeat(()).take(self.preload_steps))
    }

    fn spawn(&self, ctx: &mut PopulationContext<'_>, placement: &EntityPlacement, sample: &PathPoint) {
        let heading = sample.tangent.x.atan2(sample.tangent.y);
        let translation = Vec3::new(placement.position.x, 0.0, placement.position.y);
        ctx.world.spawn((
            PlacedEntity {
                biome: ctx.biome,
                track: placement.track.clone(),
                entity: placement.entity.clone(),
                spawn_kind: placement.spawn_kind.clone(),
                path_index: placement.path_index,
                position: placement.position,
                radius: placement.radius,
                habitat: placement.habitat,
            },
            Transform::from_translation(translation).with_rotation(Quat::from_rotation_y(heading)),
        ));
    }
}

/// Spawn configs keyed by spawn kind.
#[derive(Clone, Default)]
pub struct SpawnRegistry {
    configs: HashMap<String, Arc<dyn EntitySpawnConfig>>,
}

impl fmt::Debug for SpawnRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.configs.keys().collect();
        kinds.sort();
        f.debug_struct("SpawnRegistry").field("kinds", &kinds).finish()
    }
}

impl SpawnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`MarkerSpawn`] for every spawn kind named by `rules`.
    pub fn markers_for(rules: &[EntityRule], preload_steps: usize) -> Self {
        let mut registry = Self::new();
        for rule in rules {
            if !registry.contains(rule.spawn_kind()) {
                registry.register(Arc::new(
                    MarkerSpawn::new(rule.spawn_kind()).with_preload_steps(preload_steps),
                ));
            }
        }
        registry
    }

    /// Replaces any config already registered for the same kind.
    pub fn register(&mut self, config: Arc<dyn EntitySpawnConfig>) {
        self.configs.insert(config.kind().to_string(), config);
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn EntitySpawnConfig>> {
        self.configs.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.configs.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnStep {
    More,
    Done,
}

/// Single-pass spawn sequence over one world-Z window of a layout.
pub struct LayoutSpawner {
    layout: Arc<RiverLayout>,
    registry: Arc<SpawnRegistry>,
    z_range: (f32, f32),
    index_range: Option<(f32, f32)>,
    pending: Vec<usize>,
    cursor: usize,
    preload: VecDeque<PreloadSteps>,
    batch_size: usize,
    skipped: usize,
    finished: bool,
}

impl fmt::Debug for LayoutSpawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutSpawner")
            .field("z_range", &self.z_range)
            .field("index_range", &self.index_range)
            .field("pending", &self.pending.len())
            .field("cursor", &self.cursor)
            .field("preload_remaining", &self.preload.len())
            .field("finished", &self.finished)
            .finish()
    }
}

/// Fractional index window covered by `z_range`, or `None` when the range
/// misses the sampled path entirely.
fn index_range_for(points: &[PathPoint], z_range: (f32, f32)) -> Option<(f32, f32)> {
    let first = points.first()?;
    let last = points.last()?;
    let (path_lo, path_hi) = (first.z().min(last.z()), first.z().max(last.z()));
    let (lo, hi) = (z_range.0.min(z_range.1), z_range.0.max(z_range.1));
    if hi < path_lo || lo > path_hi {
        return None;
    }
    let a = binary_search_path(points, lo, world_z_of);
    let b = binary_search_path(points, hi, world_z_of);
    Some((a.min(b), a.max(b)))
}

impl LayoutSpawner {
    pub fn new(
        layout: Arc<RiverLayout>,
        registry: Arc<SpawnRegistry>,
        z_range: (f32, f32),
        batch_size: usize,
    ) -> Self {
        let index_range = index_range_for(&layout.points, z_range);
        let mut pending = Vec::new();
        let mut kinds: Vec<&str> = Vec::new();
        let mut skipped = 0;

        if let Some((lo, hi)) = index_range {
            for (idx, placement) in layout.placements.iter().enumerate() {
                if placement.path_index < lo || placement.path_index > hi {
                    continue;
                }
                if !registry.contains(&placement.spawn_kind) {
                    debug!(
                        target: "river_course::spawn",
                        spawn_kind = %placement.spawn_kind,
                        entity = %placement.entity,
                        "spawn.unregistered_kind"
                    );
                    skipped += 1;
                    continue;
                }
                if !kinds.contains(&placement.spawn_kind.as_str()) {
                    kinds.push(&placement.spawn_kind);
                }
                pending.push(idx);
            }
        }

        let preload = kinds
            .iter()
            .filter_map(|kind| registry.get(kind))
            .map(|config| config.ensure_loaded())
            .collect();

        Self {
            layout,
            registry,
            z_range,
            index_range,
            pending,
            cursor: 0,
            preload,
            batch_size: batch_size.max(1),
            skipped,
            finished: false,
        }
    }

    pub fn layout(&self) -> &Arc<RiverLayout> {
        &self.layout
    }

    /// The spawn window; the layout itself may cover more.
    pub fn z_range(&self) -> (f32, f32) {
        self.z_range
    }

    pub fn index_range(&self) -> Option<(f32, f32)> {
        self.index_range
    }

    /// Placements this spawner will hand to spawn configs in total.
    pub fn total(&self) -> usize {
        self.pending.len()
    }

    pub fn spawned(&self) -> usize {
        self.cursor
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Run one preload step, or spawn up to one batch. Once `Done` has been
    /// returned every further call is a no-op returning `Done`.
    pub fn produce_next_batch(&mut self, ctx: &mut PopulationContext<'_>) -> SpawnStep {
        if self.finished {
            return SpawnStep::Done;
        }

        while let Some(steps) = self.preload.front_mut() {
            if steps.next().is_some() {
                return SpawnStep::More;
            }
            self.preload.pop_front();
        }

        let end = (self.cursor + self.batch_size).min(self.pending.len());
        for &idx in &self.pending[self.cursor..end] {
            let placement = &self.layout.placements[idx];
            let (Some(config), Some(sample)) = (
                self.registry.get(&placement.spawn_kind),
                self.layout.sample(placement.path_index),
            ) else {
                continue;
            };
            config.spawn(ctx, placement, &sample);
        }
        self.cursor = end;

        if self.cursor < self.pending.len() {
            return SpawnStep::More;
        }
        self.finished = true;
        info!(
            target: "river_course::spawn",
            biome = %ctx.biome,
            spawned = self.cursor,
            skipped = self.skipped,
            "spawn.completed"
        );
        SpawnStep::Done
    }
}

/// The spawn sequence currently being driven by [`drive_active_spawn`].
#[derive(Resource, Debug)]
pub struct ActiveSpawn {
    pub biome: BiomeId,
    pub spawner: LayoutSpawner,
}

impl ActiveSpawn {
    pub fn new(biome: BiomeId, spawner: LayoutSpawner) -> Self {
        Self { biome, spawner }
    }
}

/// Advance the active spawn by one batch; removes it once finished.
pub fn drive_active_spawn(world: &mut World) {
    let Some(mut active) = world.remove_resource::<ActiveSpawn>() else {
        return;
    };
    let step = {
        let mut ctx = PopulationContext {
            world: &mut *world,
            biome: active.biome,
            biome_z_range: active.spawner.layout().biome_z_range,
        };
        active.spawner.produce_next_batch(&mut ctx)
    };
    if step == SpawnStep::More {
        world.insert_resource(active);
    }
}
