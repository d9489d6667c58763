//! # plife - parallel particle life
//!
//! A 2D "particle life" simulation: particles of K species attract or repel
//! each other according to a K×K attraction matrix, and complex moving
//! structures emerge from that small table.
//!
//! The core runs on the CPU with rayon and hands a ready-to-upload instance
//! buffer to whatever draws it. The optional `viewer` feature adds a winit +
//! wgpu window that renders the particles as instanced point sprites.
//!
//! ## Quick Start
//!
//! ```ignore
//! use plife::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     let mut sim = ParticleLife::new();
//!     sim.init(
//!         SimulationConfig::default()
//!             .with_particle_count(20_000)
//!             .with_species_count(4),
//!     )?;
//!
//!     sim.tuning().randomize_matrix(-1.0, 1.0, true);
//!     for _ in 0..600 {
//!         let frame = sim.step(1.0 / 60.0)?;
//!         // frame.instance_bytes(), frame.species_bytes(), frame.palette_bytes()
//!     }
//!     sim.teardown();
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! Every tick runs these stages, each one finishing for every particle before
//! the next begins:
//!
//! 1. **Grid build** - the [`SpatialGrid`] is cleared and every particle is
//!    prepended to its cell's chain with an atomic swap.
//! 2. **Forces** - the [`ForceEvaluator`] scans each particle's cell
//!    neighborhood and sums the pairwise kernel.
//! 3. **Integrate** - the [`Integrator`] applies the force, damps the
//!    velocity and clamps the position into the world.
//! 4. **Publish** - positions and sizes are copied into the [`RenderFrame`].
//!
//! ## Tuning
//!
//! Parameters and the attraction matrix are edited through a
//! [`TuningHandle`]. Edits are staged and applied at the next tick boundary.
//! Changing the particle count, species count or world reseeds the
//! population; changing the interaction radius only rebuilds the grid.
//!
//! ## Logging
//!
//! The library logs through the [`log`] facade. The viewer binary installs
//! `env_logger`; set `RUST_LOG=plife=debug` to see reallocations and
//! `RUST_LOG=plife=trace` for per-tick stage timings.

pub mod clock;
pub mod config;
pub mod error;
pub mod forces;
pub mod frame;
pub mod integrate;
pub mod interactions;
pub mod particles;
pub mod shader;
pub mod simulation;
pub mod spatial;

#[cfg(feature = "viewer")]
pub mod gpu;
#[cfg(feature = "viewer")]
pub mod window;

pub use bytemuck;
pub use clock::TickClock;
pub use config::{InteractionModel, SimulationConfig, WorldBounds};
pub use error::{ConfigError, MatrixShapeError, SimulationError};
pub use forces::ForceEvaluator;
pub use frame::{Instance, RenderFrame};
pub use glam::Vec2;
pub use integrate::Integrator;
pub use interactions::{AttractionMatrix, MatrixController};
pub use particles::ParticleStore;
pub use simulation::{ParticleLife, SimState, TickStats, TuningHandle};
pub use spatial::{GridLayout, SpatialGrid};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use plife::prelude::*;
/// ```
pub mod prelude {
    pub use crate::clock::TickClock;
    pub use crate::config::{InteractionModel, SimulationConfig, WorldBounds};
    pub use crate::error::SimulationError;
    pub use crate::frame::RenderFrame;
    pub use crate::interactions::{AttractionMatrix, MatrixController};
    pub use crate::simulation::{ParticleLife, SimState, TuningHandle};
    pub use crate::Vec2;
}
