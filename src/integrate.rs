//! Semi-implicit Euler step with damping and a hard boundary clamp.

use glam::Vec2;
use rayon::prelude::*;

use crate::config::{SimulationConfig, WorldBounds};

/// Advances velocities and positions from accumulated forces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Integrator {
    pub damping: f32,
    pub bounds: WorldBounds,
}

impl Integrator {
    pub fn new(damping: f32, bounds: WorldBounds) -> Self {
        Self { damping, bounds }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.damping, config.world)
    }

    /// Step one particle: `v = (v + f * dt) * damping`, `p = clamp(p + v * dt)`.
    #[inline]
    pub fn step_one(&self, dt: f32, position: &mut Vec2, velocity: &mut Vec2, force: Vec2) {
        *velocity = (*velocity + force * dt) * self.damping;
        *position = self.bounds.clamp(*position + *velocity * dt);
    }

    /// Step every particle. All three slices must be the same length.
    pub fn integrate(&self, dt: f32, positions: &mut [Vec2], velocities: &mut [Vec2], forces: &[Vec2]) {
        positions
            .par_iter_mut()
            .zip(velocities.par_iter_mut())
            .zip(forces.par_iter())
            .for_each(|((p, v), &f)| self.step_one(dt, p, v, f));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integrator() -> Integrator {
        Integrator::new(0.9, WorldBounds::centered(2.0, 2.0))
    }

    #[test]
    fn test_damping_only_slows_down() {
        let mut p = [Vec2::ZERO; 3];
        let mut v = [Vec2::new(0.5, 0.0), Vec2::new(-0.2, 0.3), Vec2::ZERO];
        let f = [Vec2::ZERO; 3];
        let before: Vec<f32> = v.iter().map(|v| v.length()).collect();
        integrator().integrate(0.016, &mut p, &mut v, &f);
        for (after, before) in v.iter().map(|v| v.length()).zip(before) {
            assert!(after <= before);
        }
    }

    #[test]
    fn test_velocity_applied_after_update() {
        let mut p = [Vec2::ZERO];
        let mut v = [Vec2::ZERO];
        integrator().integrate(0.5, &mut p, &mut v, &[Vec2::new(2.0, 0.0)]);
        assert!((v[0].x - 0.9).abs() < 1e-6);
        assert!((p[0].x - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_positions_clamped_to_bounds() {
        let mut p = [Vec2::new(0.99, -0.99), Vec2::ZERO];
        let mut v = [Vec2::new(100.0, -100.0), Vec2::new(-50.0, 0.0)];
        integrator().integrate(0.1, &mut p, &mut v, &[Vec2::ZERO; 2]);
        assert_eq!(p[0], Vec2::new(1.0, -1.0));
        assert_eq!(p[1].x, -1.0);
        // the clamp touches positions only
        assert!(v[0].x > 0.0);
    }

    #[test]
    fn test_zero_dt_is_a_no_op_on_position() {
        let mut p = [Vec2::new(0.3, 0.3)];
        let mut v = [Vec2::new(1.0, 1.0)];
        integrator().integrate(0.0, &mut p, &mut v, &[Vec2::ONE]);
        assert_eq!(p[0], Vec2::new(0.3, 0.3));
    }
}
