//! Declarative course configuration.
//!
//! Loaded from `course_config.json` with support for an environment variable
//! override. The builtin copy is compiled into the crate so a course can
//! always be generated.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::prelude::Resource;
use serde::Deserialize;
use thiserror::Error;

use crate::{composer::TrackConfig, rules::EntityRule};

pub const BUILTIN_COURSE_CONFIG: &str = include_str!("data/course_config.json");

pub const COURSE_CONFIG_ENV: &str = "COURSE_CONFIG_PATH";

/// Root configuration for a river course.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CourseConfig {
    pub extent: CourseExtent,
    pub sampling: SamplingConfig,
    pub weaving: WeavingConfig,
    pub spatial: SpatialConfig,
    pub placement: PlacementConfig,
    pub spawn: SpawnPacingConfig,
    pub entities: Vec<EntityRule>,
    pub tracks: Vec<TrackConfig>,
}

impl CourseConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_COURSE_CONFIG)
                .expect("builtin course config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, CourseConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| CourseConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = CourseConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn track(&self, name: &str) -> Option<&TrackConfig> {
        self.tracks.iter().find(|track| track.name == name)
    }

    pub fn entity(&self, id: &str) -> Option<&EntityRule> {
        self.entities.iter().find(|rule| rule.id == id)
    }
}

#[derive(Debug, Error)]
pub enum CourseConfigError {
    #[error("failed to parse course config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read course config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// World-Z span covered by one biome instance.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CourseExtent {
    pub z_start: f32,
    pub z_end: f32,
}

impl Default for CourseExtent {
    fn default() -> Self {
        Self {
            z_start: 0.0,
            z_end: 2_000.0,
        }
    }
}

impl CourseExtent {
    pub fn range(&self) -> (f32, f32) {
        (self.z_start, self.z_end)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Arc-length spacing between emitted path points.
    pub step: f32,
    pub bank_solver: BankSolverConfig,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            step: 2.0,
            bank_solver: BankSolverConfig::default(),
        }
    }
}

/// Tunables for the fixed-point bank distance refinement.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BankSolverConfig {
    pub iterations: u32,
    /// Residual (world units along x) under which refinement stops early.
    pub tolerance: f32,
}

impl Default for BankSolverConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            tolerance: 1.0e-3,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WeavingConfig {
    pub start_segment_length: f32,
    pub end_segment_length: f32,
    pub amplitude: f32,
    pub margin: f32,
}

impl Default for WeavingConfig {
    fn default() -> Self {
        Self {
            start_segment_length: 160.0,
            end_segment_length: 70.0,
            amplitude: 0.7,
            margin: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub cell_size: f32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self { cell_size: 8.0 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Offsets drawn per instance before it is dropped.
    pub max_attempts: u32,
    pub zones: ZoneConfig,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            zones: ZoneConfig::default(),
        }
    }
}

/// Lateral bands used to resolve placement zones into offset ranges.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub shore_band: f32,
    pub slalom_boat_gap: f32,
    pub slalom_bank_gap: f32,
    pub path_half_width: f32,
    pub mid_channel_fraction: f32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            shore_band: 15.0,
            slalom_boat_gap: 5.0,
            slalom_bank_gap: 2.0,
            path_half_width: 2.0,
            mid_channel_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SpawnPacingConfig {
    /// Placements spawned between yields.
    pub batch_size: usize,
}

impl Default for SpawnPacingConfig {
    fn default() -> Self {
        Self { batch_size: 10 }
    }
}

#[derive(Resource, Debug, Clone)]
pub struct CourseConfigHandle(pub Arc<CourseConfig>);

impl CourseConfigHandle {
    pub fn new(config: Arc<CourseConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<CourseConfig> {
        Arc::clone(&self.0)
    }

    pub fn replace(&mut self, config: Arc<CourseConfig>) {
        self.0 = config;
    }
}

#[derive(Resource, Debug, Clone)]
pub struct CourseConfigMetadata {
    path: Option<PathBuf>,
}

impl CourseConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

pub fn load_course_config_from_env() -> (Arc<CourseConfig>, CourseConfigMetadata) {
    if let Ok(raw) = env::var(COURSE_CONFIG_ENV) {
        let path = PathBuf::from(raw);
        match CourseConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "river_course::config",
                    path = %path.display(),
                    tracks = config.tracks.len(),
                    "course_config.loaded=file"
                );
                return (Arc::new(config), CourseConfigMetadata::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "river_course::config",
                    path = %path.display(),
                    error = %err,
                    "course_config.load_failed"
                );
            }
        }
    }

    let config = CourseConfig::builtin();
    tracing::info!(
        target: "river_course::config",
        tracks = config.tracks.len(),
        "course_config.loaded=builtin"
    );
    (config, CourseConfigMetadata::new(None))
}
