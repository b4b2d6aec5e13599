//! Rendering module
//!
//! Camera math and the instance batch are platform-neutral; the WebGPU
//! pipeline consumes the batch through [`InstanceTarget`].

pub mod camera;
pub mod instances;
pub mod shapes;
pub mod sphere_pipeline;
pub mod vertex;

pub use camera::{PerspectiveCamera, Ray, View, ViewSize};
pub use instances::{AccentLight, BodyInstances, InstanceTarget, SphereInstance};
pub use sphere_pipeline::{SphereRenderState, SphereStyle};
