//! Orthographic camera for the 2D world.

use glam::{Mat4, Vec2};

use crate::config::WorldBounds;

/// Fits the world rectangle into the viewport, letterboxing the shorter axis.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    /// World point at the centre of the screen.
    pub center: Vec2,
    /// World-space half extents visible on screen.
    pub half_extent: Vec2,
}

impl Camera {
    /// Camera showing `world` with a small margin.
    pub fn fit(world: WorldBounds, aspect: f32) -> Self {
        let half = world.extent() * 0.5 * 1.05;
        let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
        let half_extent = if half.x / half.y > aspect {
            Vec2::new(half.x, half.x / aspect)
        } else {
            Vec2::new(half.y * aspect, half.y)
        };
        Self {
            center: world.center(),
            half_extent,
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        let lo = self.center - self.half_extent;
        let hi = self.center + self.half_extent;
        Mat4::orthographic_rh(lo.x, hi.x, lo.y, hi.y, -1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_world_in_square_viewport() {
        let cam = Camera::fit(WorldBounds::centered(4.0, 2.0), 1.0);
        assert!((cam.half_extent.x - cam.half_extent.y).abs() < 1e-6);
        assert!(cam.half_extent.x >= 2.0);
    }

    #[test]
    fn test_world_corner_inside_clip_space() {
        let world = WorldBounds::default();
        let cam = Camera::fit(world, 16.0 / 9.0);
        let clip = cam.view_proj() * world.max.extend(0.0).extend(1.0);
        assert!(clip.x <= 1.0 && clip.y <= 1.0);
        assert!(clip.x > 0.5 || clip.y > 0.5);
    }
}
