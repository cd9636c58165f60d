//! Uniform broad-phase grid over the arena
//!
//! Cleared and rebuilt from live enemy positions every tick. Each cell
//! holds a fixed number of ids in a flat array; inserts past that are
//! dropped. Points outside the covered area clamp into the border cells.

use crate::game::constants::{grid, sim};
use crate::util::vec2::Vec2;

/// Uniform grid storing `u32` entity indices
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    inv_cell_size: f32,
    /// World position of the top-left corner of cell (0, 0)
    origin: Vec2,
    cols: usize,
    rows: usize,
    cell_capacity: usize,
    /// `cols * rows * cell_capacity` ids, cell-major
    ids: Vec<u32>,
    counts: Vec<u16>,
    len: usize,
    dropped: usize,
}

impl SpatialGrid {
    /// Build a grid covering `width x height` plus `margin` on every side
    pub fn new(width: f32, height: f32, margin: f32, cell_size: f32, cell_capacity: usize) -> Self {
        let cols = (((width + 2.0 * margin) / cell_size).ceil() as usize).max(1);
        let rows = (((height + 2.0 * margin) / cell_size).ceil() as usize).max(1);
        let cell_capacity = cell_capacity.clamp(1, u16::MAX as usize);
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            origin: Vec2::new(-margin, -margin),
            cols,
            rows,
            cell_capacity,
            ids: vec![0; cols * rows * cell_capacity],
            counts: vec![0; cols * rows],
            len: 0,
            dropped: 0,
        }
    }

    /// Grid sized for the default arena
    pub fn for_arena(width: f32, height: f32) -> Self {
        Self::new(width, height, grid::MARGIN, grid::CELL_SIZE, grid::CELL_CAPACITY)
    }

    #[inline]
    pub fn clear(&mut self) {
        self.counts.fill(0);
        self.len = 0;
        self.dropped = 0;
    }

    #[inline]
    fn column(&self, x: f32) -> usize {
        let c = ((x - self.origin.x) * self.inv_cell_size).floor();
        if c.is_nan() || c < 0.0 {
            0
        } else {
            (c as usize).min(self.cols - 1)
        }
    }

    #[inline]
    fn row(&self, y: f32) -> usize {
        let r = ((y - self.origin.y) * self.inv_cell_size).floor();
        if r.is_nan() || r < 0.0 {
            0
        } else {
            (r as usize).min(self.rows - 1)
        }
    }

    /// Clamped cell coordinates for a world position
    #[inline]
    pub fn cell_of(&self, position: Vec2) -> (usize, usize) {
        (self.column(position.x), self.row(position.y))
    }

    /// Bucket-append an id; returns false if the cell was already full
    pub fn insert(&mut self, id: u32, position: Vec2) -> bool {
        let (cx, cy) = self.cell_of(position);
        let cell = cy * self.cols + cx;
        let count = self.counts[cell] as usize;
        if count >= self.cell_capacity {
            self.dropped += 1;
            return false;
        }
        self.ids[cell * self.cell_capacity + count] = id;
        self.counts[cell] += 1;
        self.len += 1;
        true
    }

    /// Clear and re-insert from `(id, position)` pairs
    pub fn rebuild(&mut self, entries: impl Iterator<Item = (u32, Vec2)>) {
        self.clear();
        for (id, position) in entries {
            self.insert(id, position);
        }
    }

    #[inline]
    fn visit_range<F: FnMut(u32)>(&self, x0: usize, x1: usize, y0: usize, y1: usize, visit: &mut F) {
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                let cell = cy * self.cols + cx;
                let start = cell * self.cell_capacity;
                let count = self.counts[cell] as usize;
                for &id in &self.ids[start..start + count] {
                    visit(id);
                }
            }
        }
    }

    /// Visit every id in the 3x3 block of cells around `position`
    ///
    /// Cells are visited row-major, ids within a cell in insertion order.
    pub fn query<F: FnMut(u32)>(&self, position: Vec2, mut visit: F) {
        let (cx, cy) = self.cell_of(position);
        let x0 = cx.saturating_sub(1);
        let y0 = cy.saturating_sub(1);
        let x1 = (cx + 1).min(self.cols - 1);
        let y1 = (cy + 1).min(self.rows - 1);
        self.visit_range(x0, x1, y0, y1, &mut visit);
    }

    /// Visit every id in cells overlapping the square of half-size `radius`
    ///
    /// A superset of ids within `radius`; no id is visited twice.
    pub fn query_radius<F: FnMut(u32)>(&self, position: Vec2, radius: f32, mut visit: F) {
        let r = radius.max(0.0);
        let x0 = self.column(position.x - r);
        let x1 = self.column(position.x + r);
        let y0 = self.row(position.y - r);
        let y1 = self.row(position.y + r);
        self.visit_range(x0, x1, y0, y1, &mut visit);
    }

    /// Number of ids currently indexed
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Get statistics about the grid
    pub fn stats(&self) -> SpatialGridStats {
        SpatialGridStats {
            non_empty_cells: self.counts.iter().filter(|&&c| c > 0).count(),
            total_entities: self.len,
            max_per_cell: self.counts.iter().copied().max().unwrap_or(0) as usize,
            dropped: self.dropped,
        }
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::for_arena(sim::ARENA_WIDTH, sim::ARENA_HEIGHT)
    }
}

/// Statistics about the spatial grid
#[derive(Debug, Clone)]
pub struct SpatialGridStats {
    pub non_empty_cells: usize,
    pub total_entities: usize,
    pub max_per_cell: usize,
    pub dropped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_insert_and_query() {
        let mut grid = SpatialGrid::default();
        grid.insert(1, Vec2::new(100.0, 100.0));
        grid.insert(2, Vec2::new(150.0, 100.0));
        grid.insert(3, Vec2::new(900.0, 900.0));

        let mut found = Vec::new();
        grid.query(Vec2::new(110.0, 110.0), |id| found.push(id));
        found.sort_unstable();
        assert_eq!(found, vec![1, 2]);
        assert_eq!(grid.len(), 3);
    }

    #[test]
    fn test_clear() {
        let mut grid = SpatialGrid::default();
        grid.insert(1, Vec2::new(10.0, 10.0));
        grid.clear();
        let mut count = 0;
        grid.query(Vec2::new(10.0, 10.0), |_| count += 1);
        assert_eq!(count, 0);
        assert!(grid.is_empty());
    }

    #[test]
    fn test_cell_capacity_drops_overflow() {
        let mut grid = SpatialGrid::new(400.0, 400.0, 0.0, 80.0, 4);
        for i in 0..6 {
            grid.insert(i, Vec2::new(10.0, 10.0));
        }
        let stats = grid.stats();
        assert_eq!(stats.total_entities, 4);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.max_per_cell, 4);
    }

    #[test]
    fn test_out_of_bounds_points_clamp_to_border() {
        let mut grid = SpatialGrid::new(400.0, 400.0, 0.0, 80.0, 8);
        grid.insert(1, Vec2::new(-5000.0, -5000.0));
        grid.insert(2, Vec2::new(f32::NAN, 10.0));
        let mut found = Vec::new();
        grid.query(Vec2::new(0.0, 0.0), |id| found.push(id));
        found.sort_unstable();
        assert_eq!(found, vec![1, 2]);
    }

    #[test]
    fn test_query_order_is_row_major() {
        let mut grid = SpatialGrid::new(800.0, 800.0, 0.0, 80.0, 8);
        grid.insert(10, Vec2::new(170.0, 170.0));
        grid.insert(11, Vec2::new(90.0, 90.0));
        grid.insert(12, Vec2::new(95.0, 95.0));
        grid.insert(13, Vec2::new(170.0, 90.0));
        let mut found = Vec::new();
        grid.query(Vec2::new(130.0, 130.0), |id| found.push(id));
        assert_eq!(found, vec![11, 12, 13, 10]);
    }

    #[test]
    fn test_query_radius_has_no_false_negatives_or_duplicates() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..40 {
            let mut grid = SpatialGrid::new(1600.0, 1000.0, 200.0, 80.0, 512);
            let points: Vec<Vec2> = (0..300)
                .map(|_| Vec2::new(rng.gen_range(-300.0..1900.0), rng.gen_range(-300.0..1300.0)))
                .collect();
            for (i, p) in points.iter().enumerate() {
                grid.insert(i as u32, *p);
            }
            let center = Vec2::new(rng.gen_range(0.0..1600.0), rng.gen_range(0.0..1000.0));
            let radius = rng.gen_range(0.0..400.0);

            let mut seen = vec![0u32; points.len()];
            grid.query_radius(center, radius, |id| seen[id as usize] += 1);

            for (i, p) in points.iter().enumerate() {
                assert!(seen[i] <= 1, "id {} visited twice", i);
                if p.distance_to(center) <= radius {
                    assert_eq!(seen[i], 1, "missed point {} at {:?}", i, p);
                }
            }
        }
    }

    #[test]
    fn test_query_covers_cell_size_neighbourhood() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut grid = SpatialGrid::default();
        let points: Vec<Vec2> = (0..200)
            .map(|_| Vec2::new(rng.gen_range(0.0..1600.0), rng.gen_range(0.0..1000.0)))
            .collect();
        for (i, p) in points.iter().enumerate() {
            grid.insert(i as u32, *p);
        }
        let center = Vec2::new(800.0, 500.0);
        let mut seen = vec![false; points.len()];
        grid.query(center, |id| seen[id as usize] = true);
        for (i, p) in points.iter().enumerate() {
            if p.distance_to(center) < grid.cell_size() {
                assert!(seen[i]);
            }
        }
    }
}
