//! Error types for plife.
//!
//! Startup failures (no worker pool, no GPU adapter) are fatal: the
//! simulation refuses to leave the `Unconfigured` state rather than run on
//! half-built buffers. Runtime parameter problems are never errors; they are
//! clamped by [`SimulationConfig::sanitized`](crate::SimulationConfig::sanitized).

use thiserror::Error;

use crate::simulation::SimState;

/// Errors raised by the simulation lifecycle.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// An operation needed buffers that have not been allocated yet.
    #[error("simulation is not configured; call init() first")]
    NotConfigured,
    /// `init` was called on a simulation that already left `Unconfigured`.
    #[error("simulation already initialized (state: {0:?})")]
    AlreadyInitialized(SimState),
    /// The simulation was torn down and can no longer be used.
    #[error("simulation has been disposed")]
    Disposed,
    /// The dedicated worker pool could not be created.
    #[error("failed to build worker thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// Loading a configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors that can occur while loading a [`SimulationConfig`](crate::SimulationConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration text is not valid JSON for the config schema.
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// A deserialized attraction matrix whose values do not form a K×K table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("matrix has {len} values, expected {species}x{species}")]
pub struct MatrixShapeError {
    pub species: usize,
    pub len: usize,
}

/// Errors that can occur during GPU initialization of the viewer.
#[cfg(feature = "viewer")]
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found; a Vulkan/Metal/DX12/WebGPU capable device is required")]
    NoAdapter,
    /// Failed to create GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
    /// The surface reports no usable texture format.
    #[error("surface has no supported texture formats")]
    NoSurfaceFormat,
}

/// Errors that can stop the viewer application.
#[cfg(feature = "viewer")]
#[derive(Debug, Error)]
pub enum ViewerError {
    /// Failed to create event loop.
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    /// The window could not be created.
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    /// The config file given on the command line could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// GPU initialization failed.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    /// Simulation setup failed.
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_wraps_into_simulation_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: SimulationError = ConfigError::from(json_err).into();
        assert!(matches!(err, SimulationError::Config(ConfigError::Json(_))));
        assert!(err.to_string().contains("invalid config JSON"));
    }

    #[test]
    fn test_state_named_in_message() {
        let err = SimulationError::AlreadyInitialized(SimState::Running);
        assert!(err.to_string().contains("Running"));
    }
}
