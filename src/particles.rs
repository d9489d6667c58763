//! Particle buffers.
//!
//! Particles are stored as parallel arrays (structure of arrays); the index
//! is the particle's identity. The population is fixed for the lifetime of a
//! store: changing the count or the species count builds a new store. Callers
//! get slices, never the vectors, so the arrays cannot be resized in place.

use glam::Vec2;
use rand::rngs::StdRng;
use rayon::prelude::*;
use rand::{Rng, SeedableRng};

use crate::config::{SimulationConfig, WorldBounds};

/// Per-particle position, velocity, species and render size.
#[derive(Clone, Debug, Default)]
pub struct ParticleStore {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    species: Vec<u32>,
    sizes: Vec<f32>,
    species_count: usize,
}

impl ParticleStore {
    /// Allocate and seed a population from a (sanitized) config.
    pub fn from_config(config: &SimulationConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        Self::seed(
            config.particle_count,
            config.species_count,
            config.world,
            config.particle_size,
            &mut rng,
        )
    }

    /// Place `count` particles uniformly at random inside `world`, at rest,
    /// with species assigned round-robin (`species[i] = i mod K`).
    pub fn seed<R: Rng + ?Sized>(
        count: usize,
        species_count: usize,
        world: WorldBounds,
        size: f32,
        rng: &mut R,
    ) -> Self {
        let species_count = species_count.max(1);
        let positions = (0..count)
            .map(|_| world.lerp(Vec2::new(rng.gen::<f32>(), rng.gen::<f32>())))
            .collect();

        Self {
            positions,
            velocities: vec![Vec2::ZERO; count],
            species: (0..count).map(|i| (i % species_count) as u32).collect(),
            sizes: vec![size; count],
            species_count,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of species the population was seeded with.
    pub fn species_count(&self) -> usize {
        self.species_count
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Vec2] {
        &mut self.positions
    }

    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities
    }

    pub fn velocities_mut(&mut self) -> &mut [Vec2] {
        &mut self.velocities
    }

    /// Species ids. Read-only: they only change through a reseed.
    pub fn species(&self) -> &[u32] {
        &self.species
    }

    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    /// Positions and velocities borrowed together for integration.
    pub(crate) fn motion_mut(&mut self) -> (&mut [Vec2], &mut [Vec2]) {
        (&mut self.positions, &mut self.velocities)
    }

    /// Move one particle. Out-of-range indices are ignored.
    pub fn set_position(&mut self, index: usize, position: Vec2) {
        if let Some(p) = self.positions.get_mut(index) {
            *p = position;
        }
    }

    pub fn set_velocity(&mut self, index: usize, velocity: Vec2) {
        if let Some(v) = self.velocities.get_mut(index) {
            *v = velocity;
        }
    }

    /// Write the same render size into every particle.
    pub fn set_size(&mut self, size: f32) {
        self.sizes.fill(size);
    }

    /// Total kinetic energy (unit mass).
    pub fn kinetic_energy(&self) -> f32 {
        self.velocities.par_iter().map(|v| 0.5 * v.length_squared()).sum()
    }

    /// Store with hand-placed particles and species.
    #[cfg(test)]
    pub(crate) fn from_parts(positions: Vec<Vec2>, species: Vec<u32>, species_count: usize) -> Self {
        let count = positions.len();
        Self {
            positions,
            velocities: vec![Vec2::ZERO; count],
            species,
            sizes: vec![0.0; count],
            species_count: species_count.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(count: usize, species: usize) -> ParticleStore {
        let config = SimulationConfig::default()
            .with_particle_count(count)
            .with_species_count(species);
        ParticleStore::from_config(&config)
    }

    #[test]
    fn test_species_assigned_round_robin() {
        for (n, k) in [(0, 1), (1, 3), (10, 3), (97, 7), (16, 16)] {
            let s = store(n, k);
            assert_eq!(s.len(), n);
            for (i, &species) in s.species.iter().enumerate() {
                assert_eq!(species as usize, i % k, "N={n} K={k}");
            }
        }
    }

    #[test]
    fn test_seeded_inside_world_at_rest() {
        let s = store(5_000, 4);
        let world = WorldBounds::default();
        assert!(s.positions.iter().all(|&p| world.contains(p)));
        assert!(s.velocities.iter().all(|&v| v == Vec2::ZERO));
        assert!(s.sizes.iter().all(|&z| z == SimulationConfig::default().particle_size));
    }

    #[test]
    fn test_same_seed_same_layout() {
        assert_eq!(store(100, 3).positions, store(100, 3).positions);
    }

    #[test]
    fn test_setters_ignore_out_of_range() {
        let mut s = store(2, 1);
        s.set_position(0, Vec2::new(1.0, 2.0));
        s.set_position(9, Vec2::new(5.0, 5.0));
        s.set_velocity(1, Vec2::X);
        assert_eq!(s.positions[0], Vec2::new(1.0, 2.0));
        assert_eq!(s.kinetic_energy(), 0.5);
    }
}
