//! Pairwise force accumulation.
//!
//! For particle `i` every particle `j` found in the grid neighborhood
//! contributes along the unit direction `u = (pos[j] - pos[i]) / r`:
//!
//! | distance                        | magnitude (positive = toward `j`)                     |
//! |---------------------------------|-------------------------------------------------------|
//! | `r < EPSILON`, `r > radius`     | none                                                  |
//! | `r < min_distance`              | `-repulsion * (1 - r / min_distance)`                 |
//! | `min_distance <= r <= radius`   | `a * (1 - (r - min_distance) / (radius - min_distance))` |
//!
//! `a` is the attraction matrix entry for `(species[i], species[j])` or the
//! single uniform coefficient, depending on the [`InteractionModel`]. The sum
//! is scaled by the global force multiplier.
//!
//! Each particle's force is computed independently, so the stage runs as a
//! parallel map over the force buffer. Only the summation order differs run
//! to run.

use glam::Vec2;
use rayon::prelude::*;

use crate::config::{InteractionModel, SimulationConfig};
use crate::interactions::AttractionMatrix;
use crate::particles::ParticleStore;
use crate::spatial::SpatialGrid;

/// Distances below this are treated as coincident and skipped.
pub const EPSILON: f32 = 1e-6;

/// Scalar force magnitude between two particles `r` apart.
///
/// Positive values attract, negative values repel.
#[inline]
pub fn kernel(r: f32, coefficient: f32, min_distance: f32, interact_radius: f32, repulsion: f32) -> f32 {
    if r < EPSILON || r > interact_radius {
        0.0
    } else if r < min_distance {
        -repulsion * (1.0 - r / min_distance)
    } else {
        let span = (interact_radius - min_distance).max(EPSILON);
        coefficient * (1.0 - (r - min_distance) / span)
    }
}

/// Computes the net force on every particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceEvaluator {
    pub min_distance: f32,
    pub interact_radius: f32,
    pub repulsion: f32,
    pub multiplier: f32,
    pub uniform_attraction: f32,
    pub model: InteractionModel,
}

impl ForceEvaluator {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            min_distance: config.min_distance,
            interact_radius: config.interact_radius,
            repulsion: config.repulsion,
            multiplier: config.force_multiplier,
            uniform_attraction: config.uniform_attraction,
            model: config.model,
        }
    }

    #[inline]
    fn coefficient(&self, matrix: &AttractionMatrix, self_species: u32, other_species: u32) -> f32 {
        match self.model {
            InteractionModel::Species => matrix.get(self_species as usize, other_species as usize),
            InteractionModel::Uniform => self.uniform_attraction,
            InteractionModel::Drift => 0.0,
        }
    }

    /// Net force on particle `i`.
    ///
    /// `grid` must have been rebuilt from `store.positions()`.
    pub fn force_on(
        &self,
        i: usize,
        store: &ParticleStore,
        grid: &SpatialGrid,
        matrix: &AttractionMatrix,
    ) -> Vec2 {
        if !self.model.has_forces() {
            return Vec2::ZERO;
        }

        let positions = store.positions();
        let species_ids = store.species();
        let position = positions[i];
        let species = species_ids[i];
        let radius_sq = self.interact_radius * self.interact_radius;
        let mut total = Vec2::ZERO;

        grid.for_each_neighbor(position, |j| {
            if j == i {
                return;
            }
            let d = positions[j] - position;
            let r_sq = d.length_squared();
            if r_sq > radius_sq {
                return;
            }
            let r = r_sq.sqrt();
            if r < EPSILON {
                return;
            }
            let a = self.coefficient(matrix, species, species_ids[j]);
            let f = kernel(r, a, self.min_distance, self.interact_radius, self.repulsion);
            total += d * (f / r);
        });

        total * self.multiplier
    }

    /// Fill `forces` with the net force on every particle.
    pub fn evaluate(
        &self,
        forces: &mut [Vec2],
        store: &ParticleStore,
        grid: &SpatialGrid,
        matrix: &AttractionMatrix,
    ) {
        if !self.model.has_forces() {
            forces.par_iter_mut().for_each(|f| *f = Vec2::ZERO);
            return;
        }

        forces
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, force)| *force = self.force_on(i, store, grid, matrix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldBounds;
    use crate::spatial::GridLayout;

    const MIN: f32 = 0.05;
    const RADIUS: f32 = 0.6;

    fn setup(positions: &[Vec2], species: &[u32], model: InteractionModel) -> (ParticleStore, SpatialGrid, ForceEvaluator) {
        let config = SimulationConfig::default()
            .with_particle_count(positions.len())
            .with_species_count(2)
            .with_min_distance(MIN)
            .with_interact_radius(RADIUS)
            .with_world(WorldBounds::centered(4.0, 4.0))
            .with_model(model);
        let store = ParticleStore::from_parts(positions.to_vec(), species.to_vec(), 2);
        let mut grid = SpatialGrid::new(GridLayout::from_config(&config), positions.len());
        grid.rebuild(store.positions());
        (store, grid, ForceEvaluator::from_config(&config))
    }

    #[test]
    fn test_kernel_regions() {
        assert_eq!(kernel(0.0, 1.0, MIN, RADIUS, 1.0), 0.0);
        assert_eq!(kernel(0.7, 1.0, MIN, RADIUS, 1.0), 0.0);
        assert!(kernel(0.01, 1.0, MIN, RADIUS, 1.0) < 0.0);
        assert!(kernel(0.01, -5.0, MIN, RADIUS, 1.0) < 0.0);
        assert_eq!(kernel(MIN, 2.0, MIN, RADIUS, 1.0), 2.0);
        assert!(kernel(RADIUS, 2.0, MIN, RADIUS, 1.0).abs() < 1e-6);
        assert!(kernel(0.3, -1.0, MIN, RADIUS, 1.0) < 0.0);
    }

    #[test]
    fn test_attraction_decays_with_distance() {
        let near = kernel(0.1, 1.0, MIN, RADIUS, 1.0);
        let far = kernel(0.4, 1.0, MIN, RADIUS, 1.0);
        assert!(near > far && far > 0.0);
    }

    #[test]
    fn test_repulsion_strongest_when_closest() {
        let closer = kernel(0.01, 0.0, MIN, RADIUS, 1.0);
        let further = kernel(0.04, 0.0, MIN, RADIUS, 1.0);
        assert!(closer < further && further < 0.0);
    }

    #[test]
    fn test_zero_matrix_gives_zero_beyond_min_distance() {
        let positions = [Vec2::ZERO, Vec2::new(0.2, 0.0), Vec2::new(0.0, 0.45)];
        let (store, grid, eval) = setup(&positions, &[0, 1, 0], InteractionModel::Species);
        let matrix = AttractionMatrix::new(2);
        let mut forces = vec![Vec2::ONE; 3];
        eval.evaluate(&mut forces, &store, &grid, &matrix);
        assert!(forces.iter().all(|&f| f == Vec2::ZERO));
    }

    #[test]
    fn test_zero_matrix_still_repels_close_pairs() {
        let positions = [Vec2::ZERO, Vec2::new(0.02, 0.0)];
        let (store, grid, eval) = setup(&positions, &[0, 1], InteractionModel::Species);
        let matrix = AttractionMatrix::new(2);
        let f0 = eval.force_on(0, &store, &grid, &matrix);
        let f1 = eval.force_on(1, &store, &grid, &matrix);
        assert!(f0.x < 0.0);
        assert!(f1.x > 0.0);
        assert!((f0 + f1).length() < 1e-6);
    }

    #[test]
    fn test_matrix_row_selects_direction() {
        // species 0 chases species 1, species 1 flees species 0
        let positions = [Vec2::ZERO, Vec2::new(0.3, 0.0)];
        let (store, grid, eval) = setup(&positions, &[0, 1], InteractionModel::Species);
        let matrix = AttractionMatrix::from_rows(&[[0.0, 1.0], [-1.0, 0.0]]).unwrap();
        let f0 = eval.force_on(0, &store, &grid, &matrix);
        let f1 = eval.force_on(1, &store, &grid, &matrix);
        assert!(f0.x > 0.0);
        assert!(f1.x > 0.0);
    }

    #[test]
    fn test_out_of_radius_ignored() {
        let positions = [Vec2::ZERO, Vec2::new(0.61, 0.0)];
        let (store, grid, eval) = setup(&positions, &[0, 0], InteractionModel::Uniform);
        assert_eq!(eval.force_on(0, &store, &grid, &AttractionMatrix::new(2)), Vec2::ZERO);
    }

    #[test]
    fn test_coincident_particles_skipped() {
        let positions = [Vec2::new(0.5, 0.5), Vec2::new(0.5, 0.5)];
        let (store, grid, eval) = setup(&positions, &[0, 0], InteractionModel::Uniform);
        let f = eval.force_on(0, &store, &grid, &AttractionMatrix::new(2));
        assert_eq!(f, Vec2::ZERO);
    }

    #[test]
    fn test_uniform_model_ignores_species() {
        let positions = [Vec2::ZERO, Vec2::new(0.3, 0.0)];
        let (store, grid, mut eval) = setup(&positions, &[0, 1], InteractionModel::Uniform);
        eval.uniform_attraction = 1.0;
        let f = eval.force_on(0, &store, &grid, &AttractionMatrix::new(2));
        assert!(f.x > 0.0);
    }

    #[test]
    fn test_drift_model_has_no_forces() {
        let positions = [Vec2::ZERO, Vec2::new(0.01, 0.0)];
        let (store, grid, eval) = setup(&positions, &[0, 1], InteractionModel::Drift);
        let mut forces = vec![Vec2::ONE; 2];
        eval.evaluate(&mut forces, &store, &grid, &AttractionMatrix::new(2));
        assert!(forces.iter().all(|&f| f == Vec2::ZERO));
    }

    #[test]
    fn test_multiplier_scales_linearly() {
        let positions = [Vec2::ZERO, Vec2::new(0.2, 0.1)];
        let (store, grid, mut eval) = setup(&positions, &[0, 1], InteractionModel::Species);
        let matrix = AttractionMatrix::from_rows(&[[0.0, 0.8], [0.8, 0.0]]).unwrap();
        let base = eval.force_on(0, &store, &grid, &matrix);
        eval.multiplier *= 3.0;
        let scaled = eval.force_on(0, &store, &grid, &matrix);
        assert!((scaled - base * 3.0).length() < 1e-5);
    }
}
