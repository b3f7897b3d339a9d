//! Parametric river centerline models.
//!
//! A model answers geometric queries as functions of the world Z coordinate
//! along the course. Layout generation only talks to the
//! [`RiverCenterlineModel`] trait so hosts can plug in their own terrain.

use std::f32::consts::TAU;

use bevy::math::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::noise::{lerp, smooth_step, NoiseChannel, NoiseField};

/// Geometry of a river channel and the terrain around it.
pub trait RiverCenterlineModel: Send + Sync {
    /// World X of the channel center at `z`.
    fn center_x(&self, z: f32) -> f32;

    /// Full bank-to-bank width measured along X at `z`.
    fn width(&self, z: f32) -> f32;

    /// Derivative of [`center_x`](Self::center_x) with respect to `z`.
    fn slope(&self, z: f32) -> f32;

    fn terrain_height(&self, x: f32, z: f32) -> f32;

    /// Upward terrain normal, estimated by central differences unless
    /// overridden.
    fn terrain_normal(&self, x: f32, z: f32) -> Vec3 {
        const H: f32 = 0.5;
        let dhdx = (self.terrain_height(x + H, z) - self.terrain_height(x - H, z)) / (2.0 * H);
        let dhdz = (self.terrain_height(x, z + H) - self.terrain_height(x, z - H)) / (2.0 * H);
        Vec3::new(-dhdx, 1.0, -dhdz).normalize_or_zero()
    }
}

/// Constant-width channel running straight along +Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StraightChannel {
    pub center_x: f32,
    pub width: f32,
}

impl StraightChannel {
    pub fn new(center_x: f32, width: f32) -> Self {
        Self { center_x, width }
    }
}

impl RiverCenterlineModel for StraightChannel {
    fn center_x(&self, _z: f32) -> f32 {
        self.center_x
    }

    fn width(&self, _z: f32) -> f32 {
        self.width
    }

    fn slope(&self, _z: f32) -> f32 {
        0.0
    }

    fn terrain_height(&self, _x: f32, _z: f32) -> f32 {
        0.0
    }

    fn terrain_normal(&self, _x: f32, _z: f32) -> Vec3 {
        Vec3::Y
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Meander {
    amplitude: f32,
    wavelength: f32,
    phase: f32,
}

impl Meander {
    fn angle(&self, z: f32) -> f32 {
        TAU * z / self.wavelength + self.phase
    }
}

/// Seeded winding river: summed sine meanders, noise-driven width and a bank
/// profile that climbs away from the water.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanderingRiver {
    seed: u64,
    meanders: Vec<Meander>,
    min_width: f32,
    max_width: f32,
    width_wavelength: f32,
    bank_rise: f32,
    relief: f32,
}

impl MeanderingRiver {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x5EED_0F_12B5);
        let meanders = [(32.0, 720.0), (10.0, 300.0), (2.5, 120.0)]
            .into_iter()
            .map(|(amplitude, wavelength): (f32, f32)| Meander {
                amplitude: amplitude * rng.gen_range(0.85..1.15),
                wavelength: wavelength * rng.gen_range(0.9..1.1),
                phase: rng.gen_range(0.0..TAU),
            })
            .collect();
        Self {
            seed,
            meanders,
            min_width: 28.0,
            max_width: 54.0,
            width_wavelength: 180.0,
            bank_rise: 0.35,
            relief: 6.0,
        }
    }

    pub fn with_width(mut self, min_width: f32, max_width: f32) -> Self {
        let (lo, hi) = if min_width <= max_width {
            (min_width, max_width)
        } else {
            (max_width, min_width)
        };
        self.min_width = lo;
        self.max_width = hi;
        self
    }

    pub fn with_relief(mut self, relief: f32) -> Self {
        self.relief = relief.max(0.0);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RiverCenterlineModel for MeanderingRiver {
    fn center_x(&self, z: f32) -> f32 {
        self.meanders
            .iter()
            .map(|m| m.amplitude * m.angle(z).sin())
            .sum()
    }

    fn width(&self, z: f32) -> f32 {
        let t = NoiseField::new(self.seed, NoiseChannel::Width).along(z, self.width_wavelength);
        lerp(self.min_width, self.max_width, t)
    }

    fn slope(&self, z: f32) -> f32 {
        self.meanders
            .iter()
            .map(|m| m.amplitude * TAU / m.wavelength * m.angle(z).cos())
            .sum()
    }

    fn terrain_height(&self, x: f32, z: f32) -> f32 {
        let outside = (x - self.center_x(z)).abs() - 0.5 * self.width(z);
        if outside <= 0.0 {
            return -1.0;
        }
        let roughness =
            NoiseField::new(self.seed, NoiseChannel::BankRelief).ground(x, z, 40.0, 4);
        let fade = smooth_step(outside / 20.0);
        (outside * self.bank_rise).min(12.0) + roughness * self.relief * fade
    }
}
