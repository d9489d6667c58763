//! Spatial hashing on a uniform grid with bucket chains.
//!
//! Every cell stores the index of the first particle in it; a parallel
//! `next` array links each particle to the following one in the same cell.
//! The grid is rebuilt from scratch every tick in three stages:
//!
//! 1. clear cells: every bucket head becomes [`EMPTY`]
//! 2. clear chain: every `next` link becomes [`EMPTY`]
//! 3. insert: each particle is prepended to its cell's list with an atomic
//!    swap on the bucket head (`next[i] = head.swap(i)`), so concurrent
//!    inserts into one bucket never lose an entry
//!
//! Neighbor queries scan the `(2 * reach + 1)²` block of cells around a
//! particle's own cell. `reach` is `ceil(interact_radius / cell_size)`, which
//! is 1 (the 3×3 block) whenever the cell is at least as wide as the
//! interaction radius.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::{IVec2, UVec2, Vec2};
use rayon::prelude::*;

use crate::config::{SimulationConfig, WorldBounds};

/// Marker for "no particle" in bucket heads and chain links.
pub const EMPTY: u32 = u32::MAX;

/// Smallest cell size accepted, to keep the resolution finite.
const MIN_CELL_SIZE: f32 = 1e-4;

/// Geometry of the grid: everything needed to map a position to a cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    /// World-space position of cell (0, 0)'s lower corner.
    pub origin: Vec2,
    /// Edge length of one cell in world units.
    pub cell_size: f32,
    inv_cell_size: f32,
    /// Number of cells per axis.
    pub resolution: UVec2,
    /// Neighborhood half-width in cells.
    pub reach: u32,
}

impl GridLayout {
    pub fn new(world: WorldBounds, cell_size: f32, interact_radius: f32) -> Self {
        let cell_size = cell_size.max(MIN_CELL_SIZE);
        let reach = (interact_radius / cell_size).ceil().max(1.0) as u32;
        Self {
            origin: world.min,
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            resolution: Self::resolution_for(world, cell_size),
            reach,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.world, config.cell_size(), config.interact_radius)
    }

    /// `max(1, floor(extent / cell_size))` cells per axis.
    pub fn resolution_for(world: WorldBounds, cell_size: f32) -> UVec2 {
        let cells = (world.extent() / cell_size.max(MIN_CELL_SIZE)).floor();
        UVec2::new(cells.x.max(1.0) as u32, cells.y.max(1.0) as u32)
    }

    pub fn cell_count(&self) -> usize {
        self.resolution.x as usize * self.resolution.y as usize
    }

    /// Cell containing `position`, clamped into the grid.
    ///
    /// Points on or beyond the upper boundary land in the last cell.
    #[inline]
    pub fn cell_of(&self, position: Vec2) -> UVec2 {
        let cell = ((position - self.origin) * self.inv_cell_size).floor();
        let last = (self.resolution - UVec2::ONE).as_vec2();
        // NaN components end up in cell 0.
        cell.clamp(Vec2::ZERO, last).as_uvec2()
    }

    #[inline]
    pub fn flat_index(&self, cell: UVec2) -> usize {
        cell.y as usize * self.resolution.x as usize + cell.x as usize
    }

    #[inline]
    pub fn index_of(&self, position: Vec2) -> usize {
        self.flat_index(self.cell_of(position))
    }

    /// Inclusive range of cells scanned around `cell`, cut at the grid edge.
    #[inline]
    pub fn neighborhood(&self, cell: UVec2) -> (UVec2, UVec2) {
        let reach = IVec2::splat(self.reach as i32);
        let last = self.resolution.as_ivec2() - IVec2::ONE;
        let c = cell.as_ivec2();
        let lo = (c - reach).max(IVec2::ZERO);
        let hi = (c + reach).min(last);
        (lo.as_uvec2(), hi.as_uvec2())
    }
}

/// Uniform bucket-chained partition of the world.
#[derive(Debug)]
pub struct SpatialGrid {
    layout: GridLayout,
    heads: Vec<AtomicU32>,
    next: Vec<u32>,
}

impl SpatialGrid {
    /// Allocate a grid for `particle_count` particles.
    pub fn new(layout: GridLayout, particle_count: usize) -> Self {
        Self {
            heads: (0..layout.cell_count()).map(|_| AtomicU32::new(EMPTY)).collect(),
            next: vec![EMPTY; particle_count],
            layout,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(GridLayout::from_config(config), config.particle_count)
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn resolution(&self) -> UVec2 {
        self.layout.resolution
    }

    pub fn cell_count(&self) -> usize {
        self.heads.len()
    }

    /// Number of particles the chain array was sized for.
    pub fn capacity(&self) -> usize {
        self.next.len()
    }

    /// Stage 1: reset every bucket head.
    pub fn clear_cells(&mut self) {
        self.heads
            .par_iter_mut()
            .for_each(|head| *head.get_mut() = EMPTY);
    }

    /// Stage 2: reset every chain link.
    pub fn clear_chain(&mut self) {
        self.next.par_iter_mut().for_each(|link| *link = EMPTY);
    }

    /// Stage 3: prepend every particle to its cell's list.
    ///
    /// `positions` must not be longer than [`capacity`](Self::capacity).
    pub fn insert_all(&mut self, positions: &[Vec2]) {
        let layout = self.layout;
        let heads = &self.heads;
        self.next[..positions.len()]
            .par_iter_mut()
            .zip(positions.par_iter())
            .enumerate()
            .for_each(|(i, (link, &position))| {
                let cell = layout.index_of(position);
                *link = heads[cell].swap(i as u32, Ordering::AcqRel);
            });
    }

    /// Run the three build stages in order.
    pub fn rebuild(&mut self, positions: &[Vec2]) {
        self.clear_cells();
        self.clear_chain();
        self.insert_all(positions);
    }

    /// First particle in a cell, if any.
    #[inline]
    pub fn head(&self, cell: usize) -> Option<usize> {
        match self.heads[cell].load(Ordering::Acquire) {
            EMPTY => None,
            i => Some(i as usize),
        }
    }

    /// Particles linked into `cell`.
    pub fn cell_members(&self, cell: usize) -> CellIter<'_> {
        CellIter {
            next: &self.next,
            current: self.heads[cell].load(Ordering::Acquire),
        }
    }

    /// Call `f` with every particle in the neighborhood of `position`'s cell,
    /// the particle itself included.
    #[inline]
    pub fn for_each_neighbor(&self, position: Vec2, mut f: impl FnMut(usize)) {
        let (lo, hi) = self.layout.neighborhood(self.layout.cell_of(position));
        for y in lo.y..=hi.y {
            for x in lo.x..=hi.x {
                for j in self.cell_members(self.layout.flat_index(UVec2::new(x, y))) {
                    f(j);
                }
            }
        }
    }

    /// Indices of all particles found around `position`.
    pub fn neighbors(&self, position: Vec2) -> Vec<usize> {
        let mut found = Vec::new();
        self.for_each_neighbor(position, |j| found.push(j));
        found
    }
}

/// Walks one cell's chain.
pub struct CellIter<'a> {
    next: &'a [u32],
    current: u32,
}

impl Iterator for CellIter<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.current == EMPTY {
            return None;
        }
        let i = self.current as usize;
        self.current = self.next[i];
        Some(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn world() -> WorldBounds {
        WorldBounds::new(Vec2::new(-2.0, -1.0), Vec2::new(2.0, 1.0))
    }

    fn random_positions(n: usize, seed: u64) -> Vec<Vec2> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| world().lerp(Vec2::new(rng.gen(), rng.gen())))
            .collect()
    }

    #[test]
    fn test_resolution_floor_with_minimum_one() {
        assert_eq!(GridLayout::resolution_for(world(), 0.6), UVec2::new(6, 3));
        assert_eq!(GridLayout::resolution_for(world(), 10.0), UVec2::new(1, 1));
    }

    #[test]
    fn test_reach_follows_cell_ratio() {
        assert_eq!(GridLayout::new(world(), 0.6, 0.6).reach, 1);
        assert_eq!(GridLayout::new(world(), 0.9, 0.6).reach, 1);
        assert_eq!(GridLayout::new(world(), 0.4, 0.6).reach, 2);
    }

    #[test]
    fn test_boundary_points_are_clamped() {
        let layout = GridLayout::new(world(), 0.6, 0.6);
        assert_eq!(layout.cell_of(world().max), UVec2::new(5, 2));
        assert_eq!(layout.cell_of(world().min), UVec2::ZERO);
        assert_eq!(layout.cell_of(Vec2::new(100.0, -100.0)), UVec2::new(5, 0));
        assert_eq!(layout.cell_of(Vec2::NAN), UVec2::ZERO);
    }

    #[test]
    fn test_neighborhood_cut_at_edges() {
        let layout = GridLayout::new(world(), 0.6, 0.6);
        assert_eq!(layout.neighborhood(UVec2::ZERO), (UVec2::ZERO, UVec2::new(1, 1)));
        assert_eq!(
            layout.neighborhood(UVec2::new(3, 1)),
            (UVec2::new(2, 0), UVec2::new(4, 2))
        );
    }

    #[test]
    fn test_every_particle_in_exactly_one_cell() {
        let positions = random_positions(2_000, 1);
        let layout = GridLayout::new(world(), 0.3, 0.3);
        let mut grid = SpatialGrid::new(layout, positions.len());
        grid.rebuild(&positions);

        let mut seen = vec![0u32; positions.len()];
        for cell in 0..grid.cell_count() {
            for i in grid.cell_members(cell) {
                seen[i] += 1;
                assert_eq!(layout.index_of(positions[i]), cell);
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_rebuild_discards_previous_tick() {
        let mut positions = random_positions(300, 2);
        let mut grid = SpatialGrid::new(GridLayout::new(world(), 0.5, 0.5), positions.len());
        grid.rebuild(&positions);
        positions.iter_mut().for_each(|p| *p = Vec2::new(1.99, 0.99));
        grid.rebuild(&positions);

        let last = grid.layout().index_of(Vec2::new(1.99, 0.99));
        assert_eq!(grid.cell_members(last).count(), positions.len());
        for cell in (0..grid.cell_count()).filter(|&c| c != last) {
            assert!(grid.head(cell).is_none());
        }
    }

    #[test]
    fn test_neighbor_completeness() {
        let radius = 0.35;
        let positions = random_positions(1_500, 3);
        for ratio in [1.0, 0.7, 1.6] {
            let mut grid =
                SpatialGrid::new(GridLayout::new(world(), radius * ratio, radius), positions.len());
            grid.rebuild(&positions);

            for (i, &pi) in positions.iter().enumerate() {
                let found = grid.neighbors(pi);
                assert!(found.contains(&i));
                for (j, &pj) in positions.iter().enumerate() {
                    if pi.distance(pj) <= radius {
                        assert!(found.contains(&j), "ratio {ratio}: {j} missing around {i}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_empty_population() {
        let mut grid = SpatialGrid::new(GridLayout::new(world(), 0.5, 0.5), 0);
        grid.rebuild(&[]);
        assert!((0..grid.cell_count()).all(|c| grid.head(c).is_none()));
    }
}
