//! Uniform grid used to keep placements from overlapping.

use bevy::math::Vec2;
use bevy::utils::HashMap;

/// Circular footprint stored in the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    pub position: Vec2,
    pub radius: f32,
}

impl SpatialEntry {
    pub fn new(position: Vec2, radius: f32) -> Self {
        Self { position, radius }
    }

    pub fn overlaps(&self, position: Vec2, radius: f32) -> bool {
        let reach = self.radius + radius;
        self.position.distance_squared(position) < reach * reach
    }
}

/// Entries are bucketed by the cell containing their center; queries widen
/// the searched window by the largest radius seen so far.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<(i32, i32), Vec<usize>>,
    entries: Vec<SpatialEntry>,
    max_radius: f32,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(8.0)
    }
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            8.0
        };
        Self {
            cell_size,
            cells: HashMap::default(),
            entries: Vec::new(),
            max_radius: 0.0,
        }
    }

    #[inline]
    fn cell_of(&self, x: f32, z: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (z / self.cell_size).floor() as i32,
        )
    }

    /// True when a circle at `(x, z)` would overlap any stored entry.
    /// Touching footprints do not count as overlapping.
    pub fn check_collision(&self, x: f32, z: f32, radius: f32) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let reach = radius.max(0.0) + self.max_radius;
        let (min_x, min_z) = self.cell_of(x - reach, z - reach);
        let (max_x, max_z) = self.cell_of(x + reach, z + reach);
        let position = Vec2::new(x, z);
        for cx in min_x..=max_x {
            for cz in min_z..=max_z {
                let Some(bucket) = self.cells.get(&(cx, cz)) else {
                    continue;
                };
                if bucket
                    .iter()
                    .any(|&idx| self.entries[idx].overlaps(position, radius))
                {
                    return true;
                }
            }
        }
        false
    }

    pub fn insert(&mut self, entry: SpatialEntry) {
        let cell = self.cell_of(entry.position.x, entry.position.y);
        let idx = self.entries.len();
        self.entries.push(entry);
        self.max_radius = self.max_radius.max(entry.radius);
        self.cells.entry(cell).or_default().push(idx);
    }

    /// Insert only when the footprint is free. Returns whether it was stored.
    pub fn try_insert(&mut self, entry: SpatialEntry) -> bool {
        if self.check_collision(entry.position.x, entry.position.y, entry.radius) {
            return false;
        }
        self.insert(entry);
        true
    }

    pub fn entries(&self) -> &[SpatialEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.entries.clear();
        self.max_radius = 0.0;
    }
}
