//! Sphere simulation module
//!
//! Pure computation, no rendering or platform dependencies:
//! - Seeded RNG only (initial layout)
//! - Stable iteration order (by body index)
//! - Column-wise body storage shared with the renderer

pub mod collision;
pub mod config;
pub mod physics;

pub use collision::{BodyState, Contact, contain, resolve_against_controlled, resolve_pair, sphere_contact};
pub use config::{CollisionModel, SimConfig};
pub use physics::Physics;
