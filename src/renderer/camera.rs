//! Perspective camera and viewport sizing

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Perspective camera looking at `target`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 25.0),
            target: Vec3::ZERO,
            fov: 50.0,
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl PerspectiveCamera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// Projection with a [0, 1] depth range (WebGPU convention)
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Ray from the camera through a normalized device coordinate (Y up)
    pub fn unproject_ray(&self, ndc: Vec2) -> Ray {
        let inv = self.view_projection().inverse();
        let point = inv * Vec4::new(ndc.x, ndc.y, 0.5, 1.0);
        let point = point.truncate() / point.w;
        Ray {
            origin: self.position,
            direction: (point - self.position).normalize_or_zero(),
        }
    }

    /// Visible world width/height on a plane `|position|` away from the camera
    pub fn world_size(&self) -> Vec2 {
        let height = 2.0 * (self.fov.to_radians() / 2.0).tan() * self.position.length();
        Vec2::new(height * self.aspect, height)
    }
}

/// Field of view that keeps the horizontal extent of `limit_aspect` when the
/// viewport aspect falls outside the allowed range
pub fn fov_for_aspect(base_fov: f32, aspect: f32, limit_aspect: f32) -> f32 {
    let tan = (base_fov.to_radians() / 2.0).tan();
    let adjusted = tan / (aspect / limit_aspect);
    2.0 * adjusted.atan().to_degrees()
}

/// Half-line in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Intersect with the plane `normal . p + constant = 0`
    ///
    /// Returns `None` when the plane is behind the ray or parallel to it
    /// (unless the origin lies on the plane).
    pub fn intersect_plane(&self, normal: Vec3, constant: f32) -> Option<Vec3> {
        let denom = normal.dot(self.direction);
        let origin_dist = normal.dot(self.origin) + constant;
        if denom == 0.0 {
            return (origin_dist == 0.0).then_some(self.origin);
        }
        let t = -origin_dist / denom;
        (t >= 0.0).then(|| self.origin + self.direction * t)
    }
}

/// Current surface size in CSS pixels plus the derived world size
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewSize {
    pub width: f32,
    pub height: f32,
    /// width / height
    pub ratio: f32,
    /// Clamped device pixel ratio applied to the backing buffer
    pub pixel_ratio: f32,
    pub world_width: f32,
    pub world_height: f32,
}

impl ViewSize {
    /// Backing buffer size in physical pixels (never zero)
    pub fn backing_size(&self) -> (u32, u32) {
        let w = (self.width * self.pixel_ratio).round().max(1.0) as u32;
        let h = (self.height * self.pixel_ratio).round().max(1.0) as u32;
        (w, h)
    }
}

/// Camera and size as seen by render hooks
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct View {
    pub camera: PerspectiveCamera,
    pub size: ViewSize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_size_formula() {
        let camera = PerspectiveCamera {
            position: Vec3::new(0.0, 0.0, 10.0),
            fov: 90.0,
            aspect: 2.0,
            ..Default::default()
        };
        let size = camera.world_size();
        // tan(45deg) = 1 -> height = 2 * 10
        assert!((size.y - 20.0).abs() < 1e-4);
        assert!((size.x - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_center_ray_hits_origin() {
        let camera = PerspectiveCamera::default();
        let hit = camera
            .unproject_ray(Vec2::ZERO)
            .intersect_plane(Vec3::Z, 0.0)
            .unwrap();
        assert!(hit.length() < 1e-3);
    }

    #[test]
    fn test_corner_ray_hits_world_edge() {
        let camera = PerspectiveCamera {
            aspect: 1.5,
            ..Default::default()
        };
        let world = camera.world_size();
        let hit = camera
            .unproject_ray(Vec2::new(1.0, 1.0))
            .intersect_plane(Vec3::Z, 0.0)
            .unwrap();
        assert!((hit.x - world.x / 2.0).abs() < 1e-2);
        assert!((hit.y - world.y / 2.0).abs() < 1e-2);
        assert!(hit.z.abs() < 1e-4);
    }

    #[test]
    fn test_ray_misses_plane_behind() {
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 5.0),
            direction: Vec3::Z,
        };
        assert!(ray.intersect_plane(Vec3::Z, 0.0).is_none());

        let parallel = Ray {
            origin: Vec3::new(0.0, 0.0, 5.0),
            direction: Vec3::X,
        };
        assert!(parallel.intersect_plane(Vec3::Z, 0.0).is_none());
    }

    #[test]
    fn test_fov_for_aspect_widens_narrow_viewports() {
        // Narrower than the limit -> larger fov to keep horizontal extent
        let fov = fov_for_aspect(50.0, 0.5, 1.0);
        assert!(fov > 50.0);
        // At the limit the fov is unchanged
        assert!((fov_for_aspect(50.0, 1.0, 1.0) - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_backing_size_applies_pixel_ratio() {
        let size = ViewSize {
            width: 300.0,
            height: 150.0,
            pixel_ratio: 2.0,
            ..Default::default()
        };
        assert_eq!(size.backing_size(), (600, 300));
    }
}
