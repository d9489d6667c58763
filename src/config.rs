//! Simulation configuration.
//!
//! [`SimulationConfig`] holds every tunable scalar of the pipeline. It is a
//! plain value: the tuning surface edits a staged copy and the orchestrator
//! swaps it in at the next tick boundary.
//!
//! ```ignore
//! let config = SimulationConfig::default()
//!     .with_particle_count(20_000)
//!     .with_species_count(5)
//!     .with_interact_radius(0.5)
//!     .with_world(WorldBounds::centered(16.0, 9.0));
//! ```

use std::path::Path;

use glam::Vec2;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Stability interval for the damping factor (strictly inside `(0, 1)`).
pub const DAMPING_RANGE: (f32, f32) = (0.01, 0.999);
/// Smallest interaction radius accepted.
pub const MIN_INTERACT_RADIUS: f32 = 0.01;
/// Accepted range for `cell_size / interact_radius`.
pub const CELL_SIZE_RATIO_RANGE: (f32, f32) = (0.25, 4.0);
/// Smallest world extent along either axis.
pub const MIN_WORLD_EXTENT: f32 = 0.1;

/// Axis-aligned rectangle the particles live in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    /// Lower-left corner.
    pub min: Vec2,
    /// Upper-right corner.
    pub max: Vec2,
}

impl WorldBounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Bounds of the given size centred on the origin.
    pub fn centered(width: f32, height: f32) -> Self {
        let half = Vec2::new(width, height) * 0.5;
        Self::new(-half, half)
    }

    /// Bounds `height` tall whose width follows the viewport aspect ratio.
    pub fn from_height(height: f32, aspect: f32) -> Self {
        Self::centered(height * aspect, height)
    }

    pub fn extent(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Hard-clamp a point into the bounds.
    pub fn clamp(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min, self.max)
    }

    /// Map `t` in `[0, 1]²` onto the bounds.
    pub fn lerp(&self, t: Vec2) -> Vec2 {
        self.min + self.extent() * t
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::new(Vec2::new(-10.0, -6.0), Vec2::new(10.0, 6.0))
    }
}

/// Which pairwise force law the evaluator applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionModel {
    /// Coefficient taken from the attraction matrix for each species pair.
    #[default]
    Species,
    /// One coefficient (`uniform_attraction`) for every pair, species ignored.
    Uniform,
    /// No pairwise forces; particles only drift and damp.
    Drift,
}

impl InteractionModel {
    /// Whether the force stage runs at all.
    pub fn has_forces(self) -> bool {
        !matches!(self, InteractionModel::Drift)
    }
}

/// Tunable parameters of the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of particles. Changing it reseeds the population.
    pub particle_count: usize,
    /// Number of species (K). Changing it reseeds and reallocates the matrix.
    pub species_count: usize,
    /// Below this distance particles repel regardless of species.
    pub min_distance: f32,
    /// Pairs further apart than this do not interact.
    pub interact_radius: f32,
    /// Velocity multiplier applied every tick, inside `(0, 1)`.
    pub damping: f32,
    /// Global scale of the accumulated force.
    pub force_multiplier: f32,
    /// Peak strength of the short-range repulsion.
    pub repulsion: f32,
    /// Coefficient used for every pair by [`InteractionModel::Uniform`].
    pub uniform_attraction: f32,
    /// Render size written into every particle.
    pub particle_size: f32,
    /// Simulation domain.
    pub world: WorldBounds,
    /// Grid cell size as a multiple of `interact_radius`.
    pub cell_size_ratio: f32,
    /// Force law.
    pub model: InteractionModel,
    /// Seed for particle placement.
    pub seed: u64,
    /// Largest time step a single tick will integrate, in seconds.
    pub max_tick_delta: f32,
    /// Size of a dedicated worker pool; `None` uses the global rayon pool.
    pub worker_threads: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            particle_count: 100_000,
            species_count: 3,
            min_distance: 0.05,
            interact_radius: 0.6,
            damping: 0.99,
            force_multiplier: 1.0,
            repulsion: 1.0,
            uniform_attraction: 0.5,
            particle_size: 0.02,
            world: WorldBounds::default(),
            cell_size_ratio: 1.0,
            model: InteractionModel::Species,
            seed: 123,
            max_tick_delta: 0.1,
            worker_threads: None,
        }
    }
}

impl SimulationConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_particle_count(mut self, count: usize) -> Self {
        self.particle_count = count;
        self
    }

    pub fn with_species_count(mut self, species: usize) -> Self {
        self.species_count = species;
        self
    }

    pub fn with_min_distance(mut self, distance: f32) -> Self {
        self.min_distance = distance;
        self
    }

    pub fn with_interact_radius(mut self, radius: f32) -> Self {
        self.interact_radius = radius;
        self
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_force_multiplier(mut self, multiplier: f32) -> Self {
        self.force_multiplier = multiplier;
        self
    }

    pub fn with_repulsion(mut self, repulsion: f32) -> Self {
        self.repulsion = repulsion;
        self
    }

    pub fn with_uniform_attraction(mut self, attraction: f32) -> Self {
        self.uniform_attraction = attraction;
        self
    }

    pub fn with_particle_size(mut self, size: f32) -> Self {
        self.particle_size = size;
        self
    }

    pub fn with_world(mut self, world: WorldBounds) -> Self {
        self.world = world;
        self
    }

    pub fn with_cell_size_ratio(mut self, ratio: f32) -> Self {
        self.cell_size_ratio = ratio;
        self
    }

    pub fn with_model(mut self, model: InteractionModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_tick_delta(mut self, max_delta: f32) -> Self {
        self.max_tick_delta = max_delta;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Edge length of one spatial grid cell.
    pub fn cell_size(&self) -> f32 {
        self.interact_radius * self.cell_size_ratio
    }

    /// Return a copy with every field clamped into its valid range.
    ///
    /// Invalid input is corrected, never rejected; each correction is logged.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let mut c = self.clone();

        if c.species_count < 1 {
            warn!("species_count {} raised to 1", c.species_count);
            c.species_count = 1;
        }

        c.interact_radius = finite_or(c.interact_radius, defaults.interact_radius, "interact_radius");
        if c.interact_radius < MIN_INTERACT_RADIUS {
            warn!("interact_radius {} raised to {}", c.interact_radius, MIN_INTERACT_RADIUS);
            c.interact_radius = MIN_INTERACT_RADIUS;
        }

        c.min_distance = finite_or(c.min_distance, defaults.min_distance, "min_distance");
        if c.min_distance < 0.0 || c.min_distance >= c.interact_radius {
            let fixed = c.min_distance.clamp(0.0, c.interact_radius * 0.5);
            warn!("min_distance {} outside [0, interact_radius), using {}", c.min_distance, fixed);
            c.min_distance = fixed;
        }

        c.damping = finite_or(c.damping, defaults.damping, "damping");
        let (lo, hi) = DAMPING_RANGE;
        if !(lo..=hi).contains(&c.damping) {
            warn!("damping {} clamped into [{}, {}]", c.damping, lo, hi);
            c.damping = c.damping.clamp(lo, hi);
        }

        c.force_multiplier = finite_or(c.force_multiplier, defaults.force_multiplier, "force_multiplier");
        c.uniform_attraction =
            finite_or(c.uniform_attraction, defaults.uniform_attraction, "uniform_attraction");

        c.repulsion = finite_or(c.repulsion, defaults.repulsion, "repulsion");
        if c.repulsion < 0.0 {
            warn!("repulsion {} raised to 0", c.repulsion);
            c.repulsion = 0.0;
        }

        c.particle_size = finite_or(c.particle_size, defaults.particle_size, "particle_size");
        if c.particle_size < 0.0 {
            warn!("particle_size {} raised to 0", c.particle_size);
            c.particle_size = 0.0;
        }

        c.cell_size_ratio = finite_or(c.cell_size_ratio, defaults.cell_size_ratio, "cell_size_ratio");
        let (lo, hi) = CELL_SIZE_RATIO_RANGE;
        if !(lo..=hi).contains(&c.cell_size_ratio) {
            warn!("cell_size_ratio {} clamped into [{}, {}]", c.cell_size_ratio, lo, hi);
            c.cell_size_ratio = c.cell_size_ratio.clamp(lo, hi);
        }

        c.max_tick_delta = finite_or(c.max_tick_delta, defaults.max_tick_delta, "max_tick_delta");
        if c.max_tick_delta <= 0.0 {
            warn!("max_tick_delta {} replaced by {}", c.max_tick_delta, defaults.max_tick_delta);
            c.max_tick_delta = defaults.max_tick_delta;
        }

        if c.worker_threads == Some(0) {
            c.worker_threads = None;
        }

        c.world = sanitize_world(c.world);
        c
    }
}

fn finite_or(value: f32, fallback: f32, name: &str) -> f32 {
    if value.is_finite() {
        value
    } else {
        warn!("{} is not finite ({}), using {}", name, value, fallback);
        fallback
    }
}

fn sanitize_world(world: WorldBounds) -> WorldBounds {
    if !world.min.is_finite() || !world.max.is_finite() {
        warn!("world bounds {:?} are not finite, using defaults", world);
        return WorldBounds::default();
    }

    let min = world.min.min(world.max);
    let max = world.min.max(world.max);
    let center = (min + max) * 0.5;
    let half = ((max - min) * 0.5).max(Vec2::splat(MIN_WORLD_EXTENT * 0.5));
    let fixed = WorldBounds::new(center - half, center + half);
    if fixed != world {
        warn!("world bounds {:?} adjusted to {:?}", world, fixed);
    }
    fixed
}
