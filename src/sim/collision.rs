//! Collision detection and response for spheres
//!
//! Soft, non-conservative resolution: overlapping spheres are pushed apart
//! along the separation normal and given a velocity kick that scales with
//! their speed, so the pit looks lively rather than energy-exact.

use glam::Vec3;

use super::config::{CollisionModel, SimConfig};
use crate::consts::{CURSOR_IMPULSE_FLOOR, PAIR_IMPULSE_FLOOR};

/// Overlap between two spheres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Unit vector from the first sphere toward the second (zero if coincident)
    pub normal: Vec3,
    /// `r_a + r_b - distance`, always positive
    pub penetration: f32,
}

/// Check whether two spheres overlap
///
/// Touching spheres (`distance == r_a + r_b`) do not count as a contact.
pub fn sphere_contact(pos_a: Vec3, radius_a: f32, pos_b: Vec3, radius_b: f32) -> Option<Contact> {
    let delta = pos_b - pos_a;
    let dist = delta.length();
    let sum = radius_a + radius_b;
    if dist < sum {
        Some(Contact {
            normal: delta.normalize_or_zero(),
            penetration: sum - dist,
        })
    } else {
        None
    }
}

/// Mutable view of one body during resolution
#[derive(Debug, Clone, Copy)]
pub struct BodyState {
    pub pos: Vec3,
    pub vel: Vec3,
}

/// Separate two overlapping free bodies, each moving half the penetration
pub fn resolve_pair(model: CollisionModel, a: &mut BodyState, b: &mut BodyState, contact: &Contact) {
    let push = contact.normal * (0.5 * contact.penetration);

    a.pos -= push;
    b.pos += push;

    match model {
        CollisionModel::SimpleDampen => {
            a.vel -= push;
        }
        CollisionModel::VelocityWeightedImpulse => {
            let impulse_a = push * a.vel.length().max(PAIR_IMPULSE_FLOOR);
            let impulse_b = push * b.vel.length().max(PAIR_IMPULSE_FLOOR);
            a.vel -= impulse_a;
            b.vel += impulse_b;
        }
    }
}

/// Shove a free body out of the controlled sphere
///
/// The controlled sphere is immovable here: the free body takes the whole
/// penetration and a kick floored at [`CURSOR_IMPULSE_FLOOR`].
pub fn resolve_against_controlled(
    body: &mut BodyState,
    radius: f32,
    controlled_pos: Vec3,
    controlled_radius: f32,
) -> bool {
    // Normal points from the body toward the cursor sphere
    let Some(contact) = sphere_contact(body.pos, radius, controlled_pos, controlled_radius) else {
        return false;
    };
    let push = contact.normal * contact.penetration;
    body.pos -= push;
    body.vel -= push * body.vel.length().max(CURSOR_IMPULSE_FLOOR);
    true
}

/// Clamp a body inside the world box, reflecting velocity off any wall hit
///
/// Returns true if any wall was touched.
pub fn contain(body: &mut BodyState, radius: f32, config: &SimConfig) -> bool {
    let bounce = config.wall_bounce;
    let mut hit = false;

    // X
    if body.pos.x.abs() + radius > config.max_x {
        body.pos.x = signum(body.pos.x) * (config.max_x - radius);
        body.vel.x = -body.vel.x * bounce;
        hit = true;
    }

    // Y: ceiling only without gravity, otherwise bodies may fly arbitrarily high
    if config.gravity == 0.0 {
        if body.pos.y.abs() + radius > config.max_y {
            body.pos.y = signum(body.pos.y) * (config.max_y - radius);
            body.vel.y = -body.vel.y * bounce;
            hit = true;
        }
    } else if body.pos.y - radius < -config.max_y {
        body.pos.y = -config.max_y + radius;
        body.vel.y = -body.vel.y * bounce;
        hit = true;
    }

    // Z
    let depth = config.depth_bound();
    if body.pos.z.abs() + radius > depth {
        body.pos.z = signum(body.pos.z) * (depth - radius);
        body.vel.z = -body.vel.z * bounce;
        hit = true;
    }

    hit
}

/// Sign with zero mapped to zero (f32::signum maps +0.0 to 1.0)
#[inline]
fn signum(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}
