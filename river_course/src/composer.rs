//! Track, stage and scene composition.
//!
//! A track is an independent generation lane. Staged tracks split the course
//! into progress windows and tile each window with randomly drawn scene
//! templates; explicit tracks name one-off placements instead. Scenes from
//! different tracks routinely overlap in arc length; collisions between the
//! resulting placements are settled by the spatial index.

use rand::{seq::SliceRandom, Rng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::debug;

use crate::patterns::{PatternConfig, PlacementZone, Side};

#[derive(Debug, Clone, Deserialize)]
pub struct TrackConfig {
    pub name: String,
    pub generation: TrackGeneration,
}

/// The two mutually exclusive ways a track produces placements.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TrackGeneration {
    Staged {
        #[serde(default)]
        patterns: Vec<PatternConfig>,
        #[serde(default)]
        stages: Vec<StageConfig>,
    },
    Explicit {
        #[serde(default)]
        placements: Vec<ExplicitPlacement>,
    },
}

impl TrackConfig {
    pub fn pattern(&self, name: &str) -> Option<&PatternConfig> {
        match &self.generation {
            TrackGeneration::Staged { patterns, .. } => {
                patterns.iter().find(|pattern| pattern.name == name)
            }
            TrackGeneration::Explicit { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    /// `[start, end]` as fractions of total course length.
    pub progress: [f32; 2],
    #[serde(default)]
    pub scenes: Vec<SceneConfig>,
}

impl StageConfig {
    fn bounds(&self) -> (f32, f32) {
        let a = self.progress[0].clamp(0.0, 1.0);
        let b = self.progress[1].clamp(0.0, 1.0);
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub name: String,
    /// `[min, max]` generated length in meters, before rescaling.
    pub length: [f32; 2],
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl SceneConfig {
    fn max_length(&self) -> f32 {
        self.length[0].max(self.length[1])
    }

    fn sample_length(&self, rng: &mut ChaCha8Rng) -> f32 {
        let lo = self.length[0].min(self.length[1]).max(0.0);
        let hi = self.max_length();
        if hi > lo {
            rng.gen_range(lo..=hi)
        } else {
            hi
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplicitPlacement {
    pub progress: f32,
    pub entity: String,
    pub zone: PlacementZone,
    /// Random side when omitted.
    #[serde(default)]
    pub side: Option<Side>,
}

/// A concrete scene interval in course arc length.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedScene {
    pub name: String,
    pub start_arc: f32,
    pub end_arc: f32,
    pub patterns: Vec<String>,
}

impl ComposedScene {
    pub fn length(&self) -> f32 {
        self.end_arc - self.start_arc
    }

    pub fn midpoint(&self) -> f32 {
        0.5 * (self.start_arc + self.end_arc)
    }
}

/// Upper bound on scenes drawn for a single stage.
pub const MAX_SCENE_DRAWS: usize = 4096;

/// Tile one stage with scene templates drawn with replacement, then rescale
/// the drawn lengths so they exactly cover the stage.
pub fn compose_stage(
    stage: &StageConfig,
    total_length: f32,
    rng: &mut ChaCha8Rng,
) -> Vec<ComposedScene> {
    let (p0, p1) = stage.bounds();
    let start = p0 * total_length;
    let allotted = (p1 - p0) * total_length;
    if !(allotted > 0.0) || stage.scenes.iter().all(|scene| !(scene.max_length() > 0.0)) {
        return Vec::new();
    }

    let mut deck: Vec<&SceneConfig> = stage.scenes.iter().collect();
    deck.shuffle(rng);

    let mut drawn: Vec<(&SceneConfig, f32)> = Vec::new();
    let mut covered = 0.0f64;
    for _ in 0..MAX_SCENE_DRAWS {
        if covered >= f64::from(allotted) {
            break;
        }
        let Some(&scene) = deck.choose(rng) else {
            break;
        };
        let length = scene.sample_length(rng);
        if length > 0.0 {
            drawn.push((scene, length));
            covered += f64::from(length);
        }
    }
    if drawn.is_empty() {
        return Vec::new();
    }
    if covered < f64::from(allotted) {
        debug!(
            target: "river_course::layout",
            draws = drawn.len(),
            covered,
            allotted,
            "layout.stage.draw_budget_exhausted"
        );
    }

    // Stretches short draws when the budget ran out before coverage.
    let scale = (f64::from(allotted) / covered) as f32;
    let end = start + allotted;
    let mut cursor = start;
    let count = drawn.len();
    drawn
        .into_iter()
        .enumerate()
        .map(|(i, (scene, length))| {
            let scene_end = if i + 1 == count {
                end
            } else {
                cursor + length * scale
            };
            let composed = ComposedScene {
                name: scene.name.clone(),
                start_arc: cursor,
                end_arc: scene_end,
                patterns: scene.patterns.clone(),
            };
            cursor = scene_end;
            composed
        })
        .collect()
}

/// Scenes for every stage of a staged track, in declaration order.
pub fn compose_track(
    stages: &[StageConfig],
    total_length: f32,
    rng: &mut ChaCha8Rng,
) -> Vec<ComposedScene> {
    stages
        .iter()
        .flat_map(|stage| compose_stage(stage, total_length, rng))
        .collect()
}
