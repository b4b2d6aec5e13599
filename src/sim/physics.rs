//! Ballpit physics engine
//!
//! Bodies are stored column-wise in flat buffers (`3*i` for position and
//! velocity, `i` for radius) so the renderer can copy them straight into an
//! instance batch.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::collision::{BodyState, contain, resolve_against_controlled, resolve_pair, sphere_contact};
use super::config::SimConfig;
use crate::consts::FOLLOW_FACTOR;
use crate::platform::FrameTime;
use crate::{lerp_slice, load_vec3, random_spread, store_vec3};

/// Sphere simulation
#[derive(Debug, Clone)]
pub struct Physics {
    config: SimConfig,
    positions: Vec<f32>,
    velocities: Vec<f32>,
    sizes: Vec<f32>,
    /// Target for the controlled sphere (pointer position in world space)
    center: Vec3,
}

impl Physics {
    /// Create a pit with randomized positions and radii
    pub fn new(config: SimConfig, seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        Self::with_rng(config, &mut rng)
    }

    pub fn with_rng<R: Rng + ?Sized>(config: SimConfig, rng: &mut R) -> Self {
        config.debug_check();
        let count = config.count;
        let mut physics = Self {
            positions: vec![0.0; 3 * count],
            velocities: vec![0.0; 3 * count],
            sizes: vec![1.0; count],
            center: Vec3::ZERO,
            config,
        };
        physics.init_positions(rng);
        physics.init_sizes(rng);
        physics
    }

    fn init_positions<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.config.count > 0 {
            store_vec3(&mut self.positions, 0, self.center);
        }
        for i in 1..self.config.count {
            let p = Vec3::new(
                random_spread(rng, self.config.max_x),
                random_spread(rng, self.config.max_y),
                random_spread(rng, self.config.max_z),
            );
            store_vec3(&mut self.positions, i, p);
        }
    }

    fn init_sizes<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.config.count > 0 {
            self.sizes[0] = self.config.size0;
        }
        let (min, max) = (self.config.min_size, self.config.max_size);
        for size in self.sizes.iter_mut().skip(1) {
            *size = if max > min { rng.random_range(min..=max) } else { min };
        }
    }

    /// Advance the simulation by one frame
    pub fn update(&mut self, time: FrameTime) {
        let count = self.config.count;
        let controlled = self.config.control_sphere0 && count > 0;
        let start = if controlled { 1 } else { 0 };

        // Controlled sphere eases toward the pointer (per call, not per second)
        let controlled_pos = if controlled {
            let mut p0 = [0.0; 3];
            lerp_slice(&self.positions[0..3], &self.center.to_array(), FOLLOW_FACTOR, &mut p0);
            self.positions[0..3].copy_from_slice(&p0);
            store_vec3(&mut self.velocities, 0, Vec3::ZERO);
            Some(Vec3::from_array(p0))
        } else {
            None
        };

        // Gravity, friction, speed cap, integrate
        for i in start..count {
            let mut pos = load_vec3(&self.positions, i);
            let mut vel = load_vec3(&self.velocities, i);

            vel.y -= time.delta * self.config.gravity * self.sizes[i];
            vel *= self.config.friction;
            if let Some(max) = self.config.max_velocity {
                vel = vel.clamp_length_max(max);
            }
            pos += vel;

            store_vec3(&mut self.positions, i, pos);
            store_vec3(&mut self.velocities, i, vel);
        }

        // Collisions and walls, body by body so each one is clamped last
        for i in start..count {
            let radius = self.sizes[i];
            let mut a = self.body(i);

            for j in (i + 1)..count {
                let mut b = self.body(j);
                if let Some(contact) = sphere_contact(a.pos, radius, b.pos, self.sizes[j]) {
                    resolve_pair(self.config.collision_model, &mut a, &mut b, &contact);
                    self.set_body(j, b);
                }
            }

            if let Some(p0) = controlled_pos {
                resolve_against_controlled(&mut a, radius, p0, self.sizes[0]);
            }

            contain(&mut a, radius, &self.config);
            self.set_body(i, a);
        }
    }

    #[inline]
    fn body(&self, i: usize) -> BodyState {
        BodyState {
            pos: load_vec3(&self.positions, i),
            vel: load_vec3(&self.velocities, i),
        }
    }

    #[inline]
    fn set_body(&mut self, i: usize, body: BodyState) {
        store_vec3(&mut self.positions, i, body.pos);
        store_vec3(&mut self.velocities, i, body.vel);
    }

    // === Accessors ===

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn count(&self) -> usize {
        self.config.count
    }

    pub fn position(&self, i: usize) -> Vec3 {
        load_vec3(&self.positions, i)
    }

    pub fn set_position(&mut self, i: usize, pos: Vec3) {
        store_vec3(&mut self.positions, i, pos);
    }

    pub fn velocity(&self, i: usize) -> Vec3 {
        load_vec3(&self.velocities, i)
    }

    pub fn set_velocity(&mut self, i: usize, vel: Vec3) {
        store_vec3(&mut self.velocities, i, vel);
    }

    pub fn radius(&self, i: usize) -> f32 {
        self.sizes[i]
    }

    /// Flat xyz position buffer
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    /// Radius buffer
    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Set the point the controlled sphere chases
    pub fn set_center(&mut self, center: Vec3) {
        self.center = center;
    }

    /// Enable or release pointer control of body 0
    pub fn set_control(&mut self, enabled: bool) {
        self.config.control_sphere0 = enabled;
    }

    pub fn is_controlled(&self) -> bool {
        self.config.control_sphere0
    }

    /// Update the horizontal/vertical world bounds (after a viewport resize)
    pub fn set_bounds(&mut self, max_x: f32, max_y: f32) {
        self.config.max_x = max_x;
        self.config.max_y = max_y;
    }
}
