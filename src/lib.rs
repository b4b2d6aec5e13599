//! Ballpit - bouncing-sphere hero animation for the web
//!
//! Core modules:
//! - `sim`: Sphere physics (integration, collisions, wall containment)
//! - `renderer`: Camera, instanced sphere batch, WebGPU pipeline
//! - `platform`: Render loop lifecycle, frame clock, shared pointer input
//! - `scene`: Wires physics, renderer, lifecycle and input together
//! - `settings`: Page-supplied configuration

pub mod error;
pub mod platform;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod sim;

pub use error::BallpitError;
pub use scene::Ballpit;
pub use settings::{BallpitConfig, QualityPreset};

use glam::Vec3;
use rand::Rng;

/// Engine constants
pub mod consts {
    /// Fraction of the remaining distance the controlled sphere covers per update
    pub const FOLLOW_FACTOR: f32 = 0.1;
    /// Velocity floor for sphere-sphere impulses
    pub const PAIR_IMPULSE_FLOOR: f32 = 1.0;
    /// Velocity floor for impulses from the controlled sphere (cursor shoves harder)
    pub const CURSOR_IMPULSE_FLOOR: f32 = 2.0;

    /// Quiet period before a burst of resize signals is handled (ms)
    pub const RESIZE_DEBOUNCE_MS: i32 = 100;
    /// Largest frame delta fed to the simulation (seconds)
    pub const MAX_FRAME_DELTA: f32 = 0.1;
    /// Default device pixel ratio cap
    pub const DEFAULT_MAX_PIXEL_RATIO: f64 = 2.0;
}

/// Read body `index` from a flat xyz buffer
#[inline]
pub fn load_vec3(buf: &[f32], index: usize) -> Vec3 {
    Vec3::from_slice(&buf[3 * index..3 * index + 3])
}

/// Write body `index` into a flat xyz buffer
#[inline]
pub fn store_vec3(buf: &mut [f32], index: usize, v: Vec3) {
    v.write_to_slice(&mut buf[3 * index..3 * index + 3]);
}

/// Component-wise linear interpolation between two equally sized arrays
pub fn lerp_slice(a: &[f32], b: &[f32], t: f32, out: &mut [f32]) {
    debug_assert!(a.len() == b.len() && a.len() == out.len());
    for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
        *o = x + (y - x) * t;
    }
}

/// Uniform sample in `[-bound, bound]`
#[inline]
pub fn random_spread<R: Rng + ?Sized>(rng: &mut R, bound: f32) -> f32 {
    if bound <= 0.0 {
        return 0.0;
    }
    rng.random_range(-bound..=bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_vec3_buffer_roundtrip() {
        let mut buf = vec![0.0; 9];
        store_vec3(&mut buf, 1, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(&buf[3..6], &[1.0, 2.0, 3.0]);
        assert_eq!(load_vec3(&buf, 1), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(load_vec3(&buf, 0), Vec3::ZERO);
    }

    #[test]
    fn test_lerp_slice() {
        let mut out = [0.0; 3];
        lerp_slice(&[0.0, 1.0, 2.0], &[2.0, 3.0, 4.0], 0.25, &mut out);
        assert_eq!(out, [0.5, 1.5, 2.5]);
    }

    #[test]
    fn test_random_spread_stays_in_bounds() {
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..1000 {
            let v = random_spread(&mut rng, 3.0);
            assert!((-3.0..=3.0).contains(&v));
        }
        assert_eq!(random_spread(&mut rng, 0.0), 0.0);
    }
}
