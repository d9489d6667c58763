//! winit front end: owns the simulation, drives one tick per redraw and maps
//! keys onto the tuning surface.
//!
//! | key       | action                         |
//! |-----------|--------------------------------|
//! | `R`       | randomize matrix               |
//! | `Z`       | reset matrix to zero           |
//! | `S`       | toggle matrix symmetry         |
//! | `Space`   | pause                          |
//! | `+` / `-` | more / fewer species           |
//! | `]` / `[` | double / halve particle count  |
//! | `Esc`     | quit                           |

use std::sync::Arc;

use log::{error, info};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::clock::TickClock;
use crate::config::SimulationConfig;
use crate::error::ViewerError;
use crate::gpu::GpuState;
use crate::simulation::{ParticleLife, SimState};

const MAX_SPECIES: usize = 16;
const MAX_PARTICLES: usize = 2_000_000;

pub struct App {
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    sim: ParticleLife,
    clock: TickClock,
    config: SimulationConfig,
    error: Option<ViewerError>,
}

impl App {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            window: None,
            gpu_state: None,
            sim: ParticleLife::new(),
            clock: TickClock::new(config.max_tick_delta),
            config,
            error: None,
        }
    }

    /// First fatal error hit inside the event loop, if any.
    pub fn take_error(&mut self) -> Option<ViewerError> {
        self.error.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: ViewerError) {
        error!("{}", err);
        self.error = Some(err);
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), ViewerError> {
        let window_attrs = Window::default_attributes()
            .with_title("plife")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let gpu_state = pollster::block_on(GpuState::new(window.clone(), self.config.world))?;

        self.sim.init(self.config.clone())?;
        self.sim.tuning().edit_matrix(|m| m.randomize());

        window.request_redraw();
        self.window = Some(window);
        self.gpu_state = Some(gpu_state);
        Ok(())
    }

    fn handle_key(&mut self, key: &Key) {
        let tuning = self.sim.tuning();
        match key.as_ref() {
            Key::Named(NamedKey::Space) => {
                self.clock.toggle_pause();
                info!("{}", if self.clock.is_paused() { "Paused" } else { "Resumed" });
            }
            Key::Character("r") | Key::Character("R") => {
                tuning.edit_matrix(|m| m.randomize());
            }
            Key::Character("z") | Key::Character("Z") => {
                tuning.reset_matrix(0.0);
            }
            Key::Character("s") | Key::Character("S") => {
                let on = tuning.edit_matrix(|m| {
                    m.set_symmetric(!m.symmetric());
                    m.symmetric()
                });
                info!("Matrix symmetry {}", if on { "on" } else { "off" });
            }
            Key::Character("+") | Key::Character("=") => {
                let k = tuning.config().species_count;
                tuning.set_species_count((k + 1).min(MAX_SPECIES));
            }
            Key::Character("-") => {
                let k = tuning.config().species_count;
                tuning.set_species_count(k.saturating_sub(1).max(1));
            }
            Key::Character("]") => {
                let n = tuning.config().particle_count;
                tuning.set_particle_count((n.max(1) * 2).min(MAX_PARTICLES));
            }
            Key::Character("[") => {
                let n = tuning.config().particle_count;
                tuning.set_particle_count((n / 2).max(1));
            }
            _ => {}
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if self.sim.state() == SimState::Disposed {
            return;
        }
        let dt = self.clock.tick();
        if let Err(e) = self.sim.step(dt) {
            return self.fail(event_loop, e.into());
        }
        let Some(frame) = self.sim.frame() else {
            return;
        };

        if let Some(gpu_state) = &mut self.gpu_state {
            gpu_state.upload(frame);
            if let Some(config) = self.sim.config() {
                gpu_state.set_world(config.world);
            }
            match gpu_state.render() {
                Ok(_) => {}
                Err(wgpu::SurfaceError::Lost) => gpu_state.resize(winit::dpi::PhysicalSize {
                    width: gpu_state.config.width,
                    height: gpu_state.config.height,
                }),
                Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                Err(e) => error!("Render error: {:?}", e),
            }
        }

        if let Some(window) = &self.window {
            window.set_title(&format!(
                "plife - {} particles, {} species - {:.0} fps",
                frame.len(),
                self.sim.config().map_or(0, |c| c.species_count),
                self.clock.fps()
            ));
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.start(event_loop) {
                self.fail(event_loop, e);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.sim.teardown();
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if logical_key == Key::Named(NamedKey::Escape) {
                    self.sim.teardown();
                    event_loop.exit();
                } else {
                    self.handle_key(&logical_key);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}
