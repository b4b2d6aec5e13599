//! Simulation configuration
//!
//! Everything here is fixed for the lifetime of a [`Physics`](super::Physics)
//! instance except `control_sphere0` and the x/y bounds, which the scene
//! updates live (pointer hover and viewport resize).

use serde::{Deserialize, Serialize};

/// How overlapping sphere pairs exchange velocity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionModel {
    /// Separation push is also subtracted from the first body's velocity only
    SimpleDampen,
    /// Both bodies get an impulse along the normal scaled by `max(speed, 1)`
    #[default]
    VelocityWeightedImpulse,
}

impl CollisionModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollisionModel::SimpleDampen => "simple-dampen",
            CollisionModel::VelocityWeightedImpulse => "velocity-weighted-impulse",
        }
    }
}

/// Physics parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimConfig {
    /// Number of bodies (body 0 is the controlled sphere)
    pub count: usize,
    /// Downward acceleration per unit radius
    pub gravity: f32,
    /// Per-tick velocity multiplier
    pub friction: f32,
    /// Fraction of velocity reflected by a wall
    pub wall_bounce: f32,
    /// Optional speed cap applied after friction
    pub max_velocity: Option<f32>,
    pub min_size: f32,
    pub max_size: f32,
    /// Radius of the controlled sphere
    pub size0: f32,
    pub max_x: f32,
    pub max_y: f32,
    pub max_z: f32,
    /// Body 0 follows `center` instead of free physics
    #[serde(skip)]
    pub control_sphere0: bool,
    pub collision_model: CollisionModel,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            count: 200,
            gravity: 0.7,
            friction: 0.9,
            wall_bounce: 0.8,
            max_velocity: Some(0.5),
            min_size: 0.5,
            max_size: 1.2,
            size0: 1.5,
            max_x: 12.0,
            max_y: 8.0,
            max_z: 5.0,
            control_sphere0: false,
            collision_model: CollisionModel::VelocityWeightedImpulse,
        }
    }
}

impl SimConfig {
    /// Depth bound actually enforced (never clips the largest spheres)
    #[inline]
    pub fn depth_bound(&self) -> f32 {
        self.max_z.max(self.max_size)
    }

    /// Positive sizes and bounds, at least one body
    pub fn validate(&self) -> Result<(), String> {
        if self.count < 1 {
            return Err("count must be at least 1".into());
        }
        if !(self.min_size > 0.0 && self.max_size >= self.min_size) {
            return Err(format!(
                "size range {}..{} is invalid",
                self.min_size, self.max_size
            ));
        }
        if self.size0 <= 0.0 {
            return Err(format!("size0 must be positive, got {}", self.size0));
        }
        if !(self.max_x > 0.0 && self.max_y > 0.0 && self.max_z > 0.0) {
            return Err(format!(
                "bounds ({}, {}, {}) must be positive",
                self.max_x, self.max_y, self.max_z
            ));
        }
        Ok(())
    }

    /// Caller contract for direct construction
    pub(crate) fn debug_check(&self) {
        #[cfg(debug_assertions)]
        if let Err(e) = self.validate() {
            panic!("invalid sim config: {e}");
        }
    }
}
