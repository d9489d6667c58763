//! Render-facing snapshot of the particle state.
//!
//! After every tick the orchestrator copies positions and sizes into a
//! GPU-ready instance buffer. The species buffer and palette only change when
//! the population is reseeded.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rayon::prelude::*;

use crate::particles::ParticleStore;

/// Saturation of the species palette.
pub const PALETTE_SATURATION: f32 = 0.7;
/// Value (brightness) of the species palette.
pub const PALETTE_VALUE: f32 = 1.0;

/// One particle as the point-sprite pass reads it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Instance {
    pub position: [f32; 2],
    pub depth: f32,
    pub size: f32,
}

/// Buffers handed to the renderer once per tick.
#[derive(Clone, Debug, Default)]
pub struct RenderFrame {
    pub instances: Vec<Instance>,
    pub species: Vec<u32>,
    /// RGBA per species.
    pub palette: Vec<[f32; 4]>,
    /// Tick the snapshot was taken after.
    pub tick: u64,
}

impl RenderFrame {
    /// Build a frame for a freshly seeded population.
    pub fn from_store(store: &ParticleStore) -> Self {
        let mut frame = Self {
            instances: vec![Instance::default(); store.len()],
            species: store.species().to_vec(),
            palette: species_palette(store.species_count()),
            tick: 0,
        };
        frame.publish(store, 0);
        frame
    }

    /// Copy current positions and sizes into the instance buffer.
    pub fn publish(&mut self, store: &ParticleStore, tick: u64) {
        self.instances.resize(store.len(), Instance::default());
        self.instances
            .par_iter_mut()
            .zip(store.positions().par_iter())
            .zip(store.sizes().par_iter())
            .for_each(|((instance, p), &size)| {
                instance.position = p.to_array();
                instance.size = size;
            });
        self.tick = tick;
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }

    pub fn species_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.species)
    }

    pub fn palette_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.palette)
    }
}

/// Evenly spaced hues, one colour per species.
pub fn species_palette(species_count: usize) -> Vec<[f32; 4]> {
    let k = species_count.max(1);
    (0..k)
        .map(|i| {
            let rgb = hsv_to_rgb(i as f32 / k as f32, PALETTE_SATURATION, PALETTE_VALUE);
            [rgb.x, rgb.y, rgb.z, 1.0]
        })
        .collect()
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let c = v * s;
    let x = c * (1.0 - ((h * 6.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match (h * 6.0) as u32 % 6 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Vec3::new(r + m, g + m, b + m)
}
