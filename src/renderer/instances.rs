//! Instanced body batch
//!
//! Mirrors the physics columns into per-instance transforms and colours, and
//! keeps the accent light parked on body 0.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::renderer::camera::View;
use crate::sim::Physics;

/// Per-instance GPU data: uniform scale + translation, plus linear RGBA colour
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SphereInstance {
    pub center: [f32; 3],
    pub scale: f32,
    pub color: [f32; 4],
}

impl SphereInstance {
    pub fn transform(&self) -> Mat4 {
        Mat4::from_translation(Vec3::from_array(self.center)) * Mat4::from_scale(Vec3::splat(self.scale))
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SphereInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Point light that follows the controlled sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccentLight {
    pub position: Vec3,
    /// Linear RGB
    pub color: Vec3,
    pub intensity: f32,
}

/// Receiver of the per-frame instance batch (the GPU side in the browser)
pub trait InstanceTarget {
    fn upload(&mut self, instances: &[SphereInstance]);
    fn set_accent_light(&mut self, _light: &AccentLight) {}
    fn render(&mut self, view: &View);
    fn resize(&mut self, view: &View);
    fn release(&mut self) {}
}

/// Colour used when no ramp is configured
pub const DEFAULT_COLOR: Vec3 = Vec3::ONE;

/// Piecewise-linear colour ramp lookup, `ratio` clamped to [0, 1]
pub fn color_at(ramp: &[Vec3], ratio: f32) -> Vec3 {
    let Some(&last) = ramp.last() else {
        return DEFAULT_COLOR;
    };
    let scaled = ratio.clamp(0.0, 1.0) * (ramp.len() - 1) as f32;
    let idx = scaled.floor() as usize;
    if idx >= ramp.len() - 1 {
        return last;
    }
    ramp[idx].lerp(ramp[idx + 1], scaled - idx as f32)
}

pub struct BodyInstances {
    instances: Vec<SphereInstance>,
    follow_cursor: bool,
    light: AccentLight,
    dirty: bool,
}

impl BodyInstances {
    pub fn new(count: usize, follow_cursor: bool, light_intensity: f32) -> Self {
        let color = DEFAULT_COLOR.extend(1.0).to_array();
        Self {
            instances: vec![
                SphereInstance {
                    color,
                    ..Default::default()
                };
                count
            ],
            follow_cursor,
            light: AccentLight {
                position: Vec3::ZERO,
                color: DEFAULT_COLOR,
                intensity: light_intensity,
            },
            dirty: true,
        }
    }

    /// Spread the ramp over the bodies by index; an empty ramp keeps the current colours
    pub fn set_colors(&mut self, ramp: &[Vec3]) {
        if ramp.is_empty() {
            return;
        }
        let count = self.instances.len();
        for (i, instance) in self.instances.iter_mut().enumerate() {
            let color = color_at(ramp, i as f32 / count as f32);
            instance.color = color.extend(1.0).to_array();
            if i == 0 {
                self.light.color = color;
            }
        }
        self.dirty = true;
    }

    /// Copy positions and radii from physics
    pub fn update(&mut self, physics: &Physics) {
        for (i, instance) in self.instances.iter_mut().enumerate().take(physics.count()) {
            instance.center = physics.position(i).to_array();
            instance.scale = if i == 0 && !self.follow_cursor {
                0.0
            } else {
                physics.radius(i)
            };
        }
        if physics.count() > 0 {
            self.light.position = physics.position(0);
        }
        self.dirty = true;
    }

    /// Push the batch to the target if anything changed since the last commit
    pub fn commit<T: InstanceTarget + ?Sized>(&mut self, target: &mut T) {
        if !self.dirty {
            return;
        }
        target.upload(&self.instances);
        target.set_accent_light(&self.light);
        self.dirty = false;
    }

    pub fn instances(&self) -> &[SphereInstance] {
        &self.instances
    }

    pub fn accent_light(&self) -> &AccentLight {
        &self.light
    }

    pub fn follow_cursor(&self) -> bool {
        self.follow_cursor
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
