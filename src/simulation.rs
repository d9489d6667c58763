//! Simulation lifecycle and per-tick pipeline.
//!
//! [`ParticleLife`] owns every buffer and walks an explicit state machine:
//!
//! ```text
//! Unconfigured --init--> Ready --step--> Running --teardown--> Disposed
//! ```
//!
//! A tick runs six stages, each finishing for every particle before the
//! next starts:
//!
//! 1. clear grid cells
//! 2. clear grid chain
//! 3. insert particles into the grid
//! 4. evaluate forces
//! 5. integrate
//! 6. publish the render frame
//!
//! Parameter and matrix edits go through a [`TuningHandle`]. They are staged
//! and copied into the working state at the start of the next tick, so a
//! tick never sees a half-written matrix.
//!
//! ```ignore
//! let mut sim = ParticleLife::new();
//! sim.init(SimulationConfig::default().with_particle_count(20_000))?;
//! let tuning = sim.tuning();
//! tuning.randomize_matrix(-1.0, 1.0, true);
//! loop {
//!     let frame = sim.step(1.0 / 60.0)?;
//!     renderer.upload(frame);
//! }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use glam::Vec2;
use log::{debug, info, trace, warn};

use crate::config::{InteractionModel, SimulationConfig, WorldBounds};
use crate::error::SimulationError;
use crate::forces::ForceEvaluator;
use crate::frame::RenderFrame;
use crate::integrate::Integrator;
use crate::interactions::{AttractionMatrix, MatrixController};
use crate::particles::ParticleStore;
use crate::spatial::SpatialGrid;

/// Lifecycle state of a [`ParticleLife`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimState {
    /// Created, no buffers allocated.
    Unconfigured,
    /// Buffers allocated and seeded, no tick run yet.
    Ready,
    /// At least one tick has run.
    Running,
    /// Torn down. Terminal.
    Disposed,
}

/// Timing of the last tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickStats {
    /// Ticks run since the last (re)seed.
    pub tick: u64,
    /// Step size actually integrated.
    pub dt: f32,
    pub grid: Duration,
    pub forces: Duration,
    pub integrate: Duration,
    pub publish: Duration,
    pub total: Duration,
    /// Kinetic energy after integration (unit mass).
    pub kinetic_energy: f32,
}

/// Edits waiting for the next tick boundary.
#[derive(Debug)]
struct Staging {
    config: SimulationConfig,
    config_dirty: bool,
    matrix: MatrixController,
    matrix_dirty: bool,
}

impl Staging {
    fn new(config: SimulationConfig) -> Self {
        let matrix = MatrixController::new(config.species_count);
        Self {
            config,
            config_dirty: false,
            matrix,
            matrix_dirty: false,
        }
    }
}

fn lock(staging: &Mutex<Staging>) -> MutexGuard<'_, Staging> {
    // A panic while holding the lock leaves plain values behind; keep going.
    staging.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable, thread-safe tuning surface.
///
/// Every setter edits the staged configuration or matrix. Nothing reaches the
/// simulation until its next [`step`](ParticleLife::step).
#[derive(Clone, Debug)]
pub struct TuningHandle {
    staging: Arc<Mutex<Staging>>,
}

impl TuningHandle {
    fn edit_config(&self, f: impl FnOnce(&mut SimulationConfig)) {
        let mut staging = lock(&self.staging);
        f(&mut staging.config);
        staging.config_dirty = true;
    }

    /// Edit the staged matrix through its controller.
    pub fn edit_matrix<T>(&self, f: impl FnOnce(&mut MatrixController) -> T) -> T {
        let mut staging = lock(&self.staging);
        let out = f(&mut staging.matrix);
        staging.matrix_dirty = true;
        out
    }

    /// Snapshot of the staged configuration.
    pub fn config(&self) -> SimulationConfig {
        lock(&self.staging).config.clone()
    }

    /// Snapshot of the staged matrix.
    pub fn matrix(&self) -> AttractionMatrix {
        lock(&self.staging).matrix.matrix().clone()
    }

    pub fn set_config(&self, config: SimulationConfig) {
        self.edit_config(|c| *c = config);
    }

    /// Reseeds the population.
    pub fn set_particle_count(&self, count: usize) {
        self.edit_config(|c| c.particle_count = count);
    }

    /// Reseeds the population and resets the matrix to zeros.
    pub fn set_species_count(&self, species: usize) {
        self.edit_config(|c| c.species_count = species);
    }

    pub fn set_min_distance(&self, distance: f32) {
        self.edit_config(|c| c.min_distance = distance);
    }

    /// Rebuilds the grid without reseeding.
    pub fn set_interact_radius(&self, radius: f32) {
        self.edit_config(|c| c.interact_radius = radius);
    }

    pub fn set_damping(&self, damping: f32) {
        self.edit_config(|c| c.damping = damping);
    }

    pub fn set_force_multiplier(&self, multiplier: f32) {
        self.edit_config(|c| c.force_multiplier = multiplier);
    }

    /// Reseeds the population.
    pub fn set_world(&self, world: WorldBounds) {
        self.edit_config(|c| c.world = world);
    }

    pub fn set_particle_size(&self, size: f32) {
        self.edit_config(|c| c.particle_size = size);
    }

    pub fn set_model(&self, model: InteractionModel) {
        self.edit_config(|c| c.model = model);
    }

    /// Replace the whole matrix. A matrix sized for a different species
    /// count than the staged one is dropped with a warning.
    pub fn set_matrix(&self, matrix: AttractionMatrix) {
        let mut staging = lock(&self.staging);
        let species = staging.config.species_count.max(1);
        if matrix.species() != species {
            warn!(
                "Rejecting {}x{} matrix for {} species",
                matrix.species(),
                matrix.species(),
                species
            );
            return;
        }
        staging.matrix.replace(matrix);
        staging.matrix_dirty = true;
    }

    /// Set one entry; clamped into the controller range and mirrored when
    /// symmetry is on.
    pub fn set_matrix_entry(&self, self_species: usize, other_species: usize, value: f32) {
        self.edit_matrix(|m| m.set(self_species, other_species, value));
    }

    /// Fill with uniform random values in `[min, max]`.
    pub fn randomize_matrix(&self, min: f32, max: f32, symmetric: bool) {
        self.edit_matrix(|m| {
            m.set_range(min, max);
            m.set_symmetric(symmetric);
            m.randomize();
        });
    }

    /// Fill every entry with `value`.
    pub fn reset_matrix(&self, value: f32) {
        self.edit_matrix(|m| m.reset_all(value));
    }
}

/// Everything allocated by `init` and released by `teardown`.
struct Resources {
    config: SimulationConfig,
    store: ParticleStore,
    grid: SpatialGrid,
    forces: Vec<Vec2>,
    matrix: AttractionMatrix,
    evaluator: ForceEvaluator,
    integrator: Integrator,
    frame: RenderFrame,
    pool: Option<rayon::ThreadPool>,
}

impl Resources {
    fn allocate(config: SimulationConfig) -> Result<Self, SimulationError> {
        let pool = build_pool(config.worker_threads)?;
        let store = ParticleStore::from_config(&config);
        let grid = SpatialGrid::from_config(&config);
        let res = grid.resolution();
        info!(
            "Allocated {} particles, {} species, grid {}x{} (cell {:.3}, reach {})",
            store.len(),
            config.species_count,
            res.x,
            res.y,
            grid.layout().cell_size,
            grid.layout().reach,
        );

        Ok(Self {
            forces: vec![Vec2::ZERO; store.len()],
            matrix: AttractionMatrix::new(config.species_count),
            evaluator: ForceEvaluator::from_config(&config),
            integrator: Integrator::from_config(&config),
            frame: RenderFrame::from_store(&store),
            grid,
            store,
            config,
            pool,
        })
    }

    /// Swap in a sanitized config, reallocating what it invalidates.
    ///
    /// Returns `(reseeded, species_changed)`.
    fn apply_config(&mut self, next: SimulationConfig) -> (bool, bool) {
        let prev = std::mem::replace(&mut self.config, next);
        let next = &self.config;

        let species_changed = prev.species_count != next.species_count;
        let reseed = species_changed
            || prev.particle_count != next.particle_count
            || prev.world != next.world
            || prev.seed != next.seed;
        let regrid = reseed
            || prev.interact_radius != next.interact_radius
            || prev.cell_size_ratio != next.cell_size_ratio;

        if reseed {
            info!(
                "Reseeding: {} particles, {} species, world {:?}..{:?}",
                next.particle_count, next.species_count, next.world.min, next.world.max
            );
            self.store = ParticleStore::from_config(next);
            self.forces = vec![Vec2::ZERO; self.store.len()];
            self.frame = RenderFrame::from_store(&self.store);
        } else if prev.particle_size != next.particle_size {
            self.store.set_size(next.particle_size);
        }

        if species_changed {
            info!("Species count {} -> {}, matrix reset", prev.species_count, next.species_count);
            self.matrix = AttractionMatrix::new(next.species_count);
        }

        if regrid {
            self.grid = SpatialGrid::from_config(next);
            let res = self.grid.resolution();
            debug!("Grid rebuilt: {}x{}, reach {}", res.x, res.y, self.grid.layout().reach);
        }

        if prev.worker_threads != next.worker_threads {
            match build_pool(next.worker_threads) {
                Ok(pool) => self.pool = pool,
                Err(e) => warn!("Keeping previous worker pool: {}", e),
            }
        }

        self.evaluator = ForceEvaluator::from_config(next);
        self.integrator = Integrator::from_config(next);
        (reseed, species_changed)
    }

    fn run_tick(&mut self, dt: f32, tick: u64) -> TickStats {
        let start = Instant::now();

        self.grid.clear_cells();
        self.grid.clear_chain();
        self.grid.insert_all(self.store.positions());
        let grid = start.elapsed();

        let t = Instant::now();
        self.evaluator
            .evaluate(&mut self.forces, &self.store, &self.grid, &self.matrix);
        let forces = t.elapsed();

        let t = Instant::now();
        let (positions, velocities) = self.store.motion_mut();
        self.integrator.integrate(dt, positions, velocities, &self.forces);
        let integrate = t.elapsed();
        let kinetic_energy = self.store.kinetic_energy();

        let t = Instant::now();
        self.frame.publish(&self.store, tick);
        let publish = t.elapsed();

        TickStats {
            tick,
            dt,
            grid,
            forces,
            integrate,
            publish,
            total: start.elapsed(),
            kinetic_energy,
        }
    }
}

fn build_pool(threads: Option<usize>) -> Result<Option<rayon::ThreadPool>, SimulationError> {
    let Some(threads) = threads else {
        return Ok(None);
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("plife-worker-{i}"))
        .build()?;
    debug!("Built worker pool with {} threads", threads);
    Ok(Some(pool))
}

/// Particle-life simulation.
pub struct ParticleLife {
    state: SimState,
    resources: Option<Resources>,
    staging: Arc<Mutex<Staging>>,
    stats: TickStats,
}

impl ParticleLife {
    pub fn new() -> Self {
        Self {
            state: SimState::Unconfigured,
            resources: None,
            staging: Arc::new(Mutex::new(Staging::new(SimulationConfig::default()))),
            stats: TickStats::default(),
        }
    }

    /// Allocate and seed every buffer. The matrix starts at zero.
    ///
    /// Any edits staged before `init` are discarded.
    pub fn init(&mut self, config: SimulationConfig) -> Result<(), SimulationError> {
        match self.state {
            SimState::Unconfigured => {}
            SimState::Disposed => return Err(SimulationError::Disposed),
            state => return Err(SimulationError::AlreadyInitialized(state)),
        }

        let config = config.sanitized();
        let resources = Resources::allocate(config.clone())?;
        *lock(&self.staging) = Staging::new(config);

        self.resources = Some(resources);
        self.stats = TickStats::default();
        self.state = SimState::Ready;
        info!("Simulation ready");
        Ok(())
    }

    /// Run one tick and return the published frame.
    ///
    /// Negative or non-finite `dt` is treated as 0; larger steps are capped
    /// at `max_tick_delta`.
    pub fn step(&mut self, dt: f32) -> Result<&RenderFrame, SimulationError> {
        match self.state {
            SimState::Unconfigured => return Err(SimulationError::NotConfigured),
            SimState::Disposed => return Err(SimulationError::Disposed),
            SimState::Ready | SimState::Running => {}
        }

        let Some(res) = self.resources.as_mut() else {
            return Err(SimulationError::NotConfigured);
        };

        let reseeded = sync_staged(&self.staging, res);
        if reseeded {
            self.stats.tick = 0;
        }

        let dt = if dt.is_finite() { dt.clamp(0.0, res.config.max_tick_delta) } else { 0.0 };
        let tick = self.stats.tick + 1;

        let stats = match res.pool.take() {
            Some(pool) => {
                let stats = pool.install(|| res.run_tick(dt, tick));
                res.pool = Some(pool);
                stats
            }
            None => res.run_tick(dt, tick),
        };

        trace!(
            "tick {}: grid {:?}, forces {:?}, integrate {:?}, publish {:?}, energy {:.4}",
            stats.tick,
            stats.grid,
            stats.forces,
            stats.integrate,
            stats.publish,
            stats.kinetic_energy
        );

        if self.state == SimState::Ready {
            debug!("Simulation running");
        }
        self.stats = stats;
        self.state = SimState::Running;
        Ok(&res.frame)
    }

    /// Release every buffer. The simulation cannot be restarted.
    pub fn teardown(&mut self) {
        if self.state != SimState::Disposed {
            self.resources = None;
            self.state = SimState::Disposed;
            info!("Simulation disposed");
        }
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn tuning(&self) -> TuningHandle {
        TuningHandle {
            staging: Arc::clone(&self.staging),
        }
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Working configuration (the one the last tick used).
    pub fn config(&self) -> Option<&SimulationConfig> {
        self.resources.as_ref().map(|r| &r.config)
    }

    /// Working matrix.
    pub fn matrix(&self) -> Option<&AttractionMatrix> {
        self.resources.as_ref().map(|r| &r.matrix)
    }

    pub fn particles(&self) -> Option<&ParticleStore> {
        self.resources.as_ref().map(|r| &r.store)
    }

    /// Direct buffer access between ticks. The store hands out slices, so
    /// the population size can only change through a reseed.
    pub fn particles_mut(&mut self) -> Option<&mut ParticleStore> {
        self.resources.as_mut().map(|r| &mut r.store)
    }

    pub fn frame(&self) -> Option<&RenderFrame> {
        self.resources.as_ref().map(|r| &r.frame)
    }
}

impl Default for ParticleLife {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy staged edits into the working state. Returns whether the population
/// was reseeded.
fn sync_staged(staging: &Mutex<Staging>, res: &mut Resources) -> bool {
    let mut staging = lock(staging);
    let mut reseeded = false;

    if staging.config_dirty {
        staging.config_dirty = false;
        let next = staging.config.sanitized();
        staging.config = next.clone();
        let species_changed;
        (reseeded, species_changed) = res.apply_config(next);

        let k = res.config.species_count;
        if species_changed && staging.matrix.matrix().species() != k {
            staging.matrix.resize(k);
            staging.matrix_dirty = false;
        }
    }

    if staging.matrix_dirty {
        staging.matrix_dirty = false;
        let staged = staging.matrix.matrix();
        if staged.species() == res.config.species_count {
            res.matrix = staged.clone();
            debug!("Matrix updated");
        } else {
            warn!(
                "Ignoring staged {}x{} matrix for {} species",
                staged.species(),
                staged.species(),
                res.config.species_count
            );
            // Later edits start from the working matrix again.
            staging.matrix.replace(res.matrix.clone());
        }
    }

    reseeded
}
