//! Entity rules: the constraint checks that decide whether an entity may be
//! generated at a candidate spot, and the catalog that maps entity ids to
//! their generator closures.

use std::{collections::BTreeMap, fmt, sync::Arc};

use bevy::math::Vec2;
use bitflags::bitflags;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{centerline::RiverCenterlineModel, geometry::PathPoint};

/// Where a placement lives relative to the water line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Habitat {
    Water,
    Land,
}

impl Habitat {
    /// Offsets within the banks are water, anything beyond is land.
    pub fn for_offset(offset: f32, bank_dist: f32) -> Self {
        if offset.abs() <= bank_dist {
            Habitat::Water
        } else {
            Habitat::Land
        }
    }

    pub fn mask(self) -> HabitatMask {
        match self {
            Habitat::Water => HabitatMask::WATER,
            Habitat::Land => HabitatMask::LAND,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Habitat::Water => "water",
            Habitat::Land => "land",
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct HabitatMask: u8 {
        const WATER = 0b01;
        const LAND = 0b10;
    }
}

impl Default for HabitatMask {
    fn default() -> Self {
        HabitatMask::all()
    }
}

/// Everything a generator may inspect when deciding on a candidate.
pub struct GeneratorContext<'a> {
    pub sample: &'a PathPoint,
    pub position: Vec2,
    pub offset: f32,
    pub habitat: Habitat,
    /// Overall course progress in `[0, 1]`.
    pub progress: f32,
    pub biome_z_range: (f32, f32),
    pub model: &'a dyn RiverCenterlineModel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEntity {
    pub radius: f32,
    pub habitat: Habitat,
    pub spawn_kind: String,
}

/// Returns `None` when the candidate violates a constraint.
pub type EntityGeneratorFn =
    Arc<dyn Fn(&GeneratorContext<'_>, &mut ChaCha8Rng) -> Option<GeneratedEntity> + Send + Sync>;

/// Declarative entity constraints as they appear in the course config.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityRule {
    pub id: String,
    /// Spawn config used for this entity; defaults to `id`.
    #[serde(default)]
    pub spawn_kind: Option<String>,
    pub radius: [f32; 2],
    #[serde(default)]
    pub habitats: HabitatMask,
    #[serde(default)]
    pub max_terrain_slope_deg: Option<f32>,
    /// Minimum distance to the water line, measured on the entity's own side.
    #[serde(default)]
    pub min_bank_clearance: Option<f32>,
}

impl EntityRule {
    pub fn new(id: impl Into<String>, radius: f32) -> Self {
        Self {
            id: id.into(),
            spawn_kind: None,
            radius: [radius, radius],
            habitats: HabitatMask::all(),
            max_terrain_slope_deg: None,
            min_bank_clearance: None,
        }
    }

    pub fn with_habitats(mut self, habitats: HabitatMask) -> Self {
        self.habitats = habitats;
        self
    }

    pub fn with_max_slope(mut self, degrees: f32) -> Self {
        self.max_terrain_slope_deg = Some(degrees);
        self
    }

    pub fn with_bank_clearance(mut self, clearance: f32) -> Self {
        self.min_bank_clearance = Some(clearance);
        self
    }

    pub fn spawn_kind(&self) -> &str {
        self.spawn_kind.as_deref().unwrap_or(&self.id)
    }

    pub fn evaluate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut ChaCha8Rng,
    ) -> Option<GeneratedEntity> {
        if !self.habitats.contains(ctx.habitat.mask()) {
            return None;
        }

        let [lo, hi] = self.radius;
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        if !(hi > 0.0) {
            return None;
        }
        let lo = lo.max(f32::EPSILON);
        let radius = if hi > lo { rng.gen_range(lo..=hi) } else { hi };

        if let Some(clearance) = self.min_bank_clearance {
            let to_water_line = match ctx.habitat {
                Habitat::Water => ctx.sample.bank_dist - ctx.offset.abs(),
                Habitat::Land => ctx.offset.abs() - ctx.sample.bank_dist,
            };
            if to_water_line < clearance {
                return None;
            }
        }

        if let (Some(max_slope), Habitat::Land) = (self.max_terrain_slope_deg, ctx.habitat) {
            let normal = ctx.model.terrain_normal(ctx.position.x, ctx.position.y);
            let slope_deg = normal.y.clamp(-1.0, 1.0).acos().to_degrees();
            // Non-finite terrain never passes.
            if !(slope_deg <= max_slope) {
                return None;
            }
        }

        Some(GeneratedEntity {
            radius,
            habitat: ctx.habitat,
            spawn_kind: self.spawn_kind().to_string(),
        })
    }

    pub fn generator(&self) -> EntityGeneratorFn {
        let rule = self.clone();
        Arc::new(move |ctx: &GeneratorContext<'_>, rng: &mut ChaCha8Rng| {
            rule.evaluate(ctx, rng)
        })
    }
}

/// A rule that borrows another rule's id as its spawn kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlaggedRule {
    pub rule: String,
    pub borrowed_kind: String,
}

/// Generator closures keyed by entity id.
#[derive(Clone, Default)]
pub struct EntityCatalog {
    generators: BTreeMap<String, EntityGeneratorFn>,
    flagged: Vec<FlaggedRule>,
}

impl fmt::Debug for EntityCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCatalog")
            .field("entities", &self.generators.keys().collect::<Vec<_>>())
            .field("flagged", &self.flagged)
            .finish()
    }
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build generators from config rules. A rule whose spawn kind names a
    /// different rule is kept as written and reported.
    pub fn from_rules(rules: &[EntityRule]) -> Self {
        let mut catalog = Self::new();
        for rule in rules {
            let kind = rule.spawn_kind();
            if kind != rule.id && rules.iter().any(|other| other.id == kind) {
                warn!(
                    target: "river_course::config",
                    rule = %rule.id,
                    spawn_kind = %kind,
                    "entity_rule.borrowed_spawn_kind"
                );
                catalog.flagged.push(FlaggedRule {
                    rule: rule.id.clone(),
                    borrowed_kind: kind.to_string(),
                });
            }
            catalog.register(rule.id.clone(), rule.generator());
        }
        catalog
    }

    pub fn register(&mut self, id: impl Into<String>, generator: EntityGeneratorFn) {
        self.generators.insert(id.into(), generator);
    }

    pub fn get(&self, id: &str) -> Option<&EntityGeneratorFn> {
        self.generators.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.generators.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    pub fn flagged_inconsistencies(&self) -> &[FlaggedRule] {
        &self.flagged
    }
}
