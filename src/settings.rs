//! Page-supplied configuration
//!
//! Parsed from the `data-ballpit` attribute (or a JS string) as camelCase JSON.
//! Every field is optional; missing fields take the marketing-site defaults.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::BallpitError;
use crate::platform::LifecycleOptions;
use crate::sim::SimConfig;

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    #[serde(alias = "Low")]
    Low,
    #[serde(alias = "Medium", alias = "med")]
    Medium,
    #[default]
    #[serde(alias = "High")]
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Upper bound on the body count
    pub fn max_bodies(&self) -> usize {
        match self {
            QualityPreset::Low => 60,
            QualityPreset::Medium => 120,
            QualityPreset::High => usize::MAX,
        }
    }

    /// Upper bound on the device pixel ratio
    pub fn max_pixel_ratio(&self) -> f64 {
        match self {
            QualityPreset::Low => 1.0,
            QualityPreset::Medium => 1.5,
            QualityPreset::High => 2.0,
        }
    }

    /// Sphere tessellation (width, height segments)
    pub fn sphere_segments(&self) -> (u32, u32) {
        match self {
            QualityPreset::Low => (12, 8),
            QualityPreset::Medium => (20, 14),
            QualityPreset::High => (32, 32),
        }
    }
}

/// sRGB colour given as `"#rrggbb"` / `"#rgb"` or a `0xRRGGBB` number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr", into = "String")]
pub struct Color(pub u32);

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Hex(String),
    Packed(u32),
}

impl TryFrom<ColorRepr> for Color {
    type Error = String;

    fn try_from(value: ColorRepr) -> Result<Self, Self::Error> {
        match value {
            ColorRepr::Hex(s) => Color::parse_hex(&s).ok_or_else(|| format!("invalid colour {:?}", s)),
            ColorRepr::Packed(v) if v <= 0xff_ffff => Ok(Color(v)),
            ColorRepr::Packed(v) => Err(format!("colour {:#x} out of range", v)),
        }
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        format!("#{:06x}", color.0)
    }
}

impl Color {
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            6 => u32::from_str_radix(hex, 16).ok().map(Color),
            3 => {
                let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
                u32::from_str_radix(&expanded, 16).ok().map(Color)
            }
            _ => None,
        }
    }

    /// Components in [0, 1], still sRGB encoded
    pub fn to_srgb(self) -> Vec3 {
        let r = ((self.0 >> 16) & 0xff) as f32 / 255.0;
        let g = ((self.0 >> 8) & 0xff) as f32 / 255.0;
        let b = (self.0 & 0xff) as f32 / 255.0;
        Vec3::new(r, g, b)
    }

    /// Linear RGB for lighting math
    pub fn to_linear(self) -> Vec3 {
        let s = self.to_srgb();
        Vec3::new(srgb_to_linear(s.x), srgb_to_linear(s.y), srgb_to_linear(s.z))
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraConfig {
    /// Vertical field of view (degrees)
    pub fov: f32,
    pub camera_z: f32,
    pub min_aspect: Option<f32>,
    pub max_aspect: Option<f32>,
    pub max_fov: Option<f32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 50.0,
            camera_z: 25.0,
            min_aspect: None,
            max_aspect: None,
            max_fov: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SurfaceConfig {
    pub min_pixel_ratio: f64,
    pub max_pixel_ratio: f64,
    /// Resize with the parent element, not just the window
    pub track_parent: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            min_pixel_ratio: 1.0,
            max_pixel_ratio: crate::consts::DEFAULT_MAX_PIXEL_RATIO,
            track_parent: true,
        }
    }
}

/// Physically-based material knobs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaterialParams {
    pub metalness: f32,
    pub roughness: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            metalness: 0.6,
            roughness: 0.2,
            clearcoat: 1.0,
            clearcoat_roughness: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LightingConfig {
    pub ambient_color: Color,
    pub ambient_intensity: f32,
    /// Accent point light riding on body 0
    pub light_intensity: f32,
    pub material_params: MaterialParams,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient_color: Color(0xffffff),
            ambient_intensity: 1.0,
            light_intensity: 200.0,
            material_params: MaterialParams::default(),
        }
    }
}

/// Full ballpit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BallpitConfig {
    #[serde(flatten)]
    pub sim: SimConfig,
    /// Colour ramp spread over the bodies by index
    pub colors: Vec<Color>,
    /// Draw the cursor sphere (it still collides when hidden)
    pub follow_cursor: bool,
    pub quality: QualityPreset,
    #[serde(flatten)]
    pub camera: CameraConfig,
    #[serde(flatten)]
    pub surface: SurfaceConfig,
    #[serde(flatten)]
    pub lighting: LightingConfig,
}

impl Default for BallpitConfig {
    fn default() -> Self {
        Self {
            sim: SimConfig::default(),
            colors: vec![Color(0x38bdf8), Color(0x818cf8), Color(0x1e293b)],
            follow_cursor: true,
            quality: QualityPreset::High,
            camera: CameraConfig::default(),
            surface: SurfaceConfig::default(),
            lighting: LightingConfig::default(),
        }
    }
}

impl BallpitConfig {
    /// Parse JSON; an empty or whitespace-only string yields the defaults
    pub fn from_json(json: &str) -> Result<Self, BallpitError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation and camera are not defined for
    pub fn validate(&self) -> Result<(), BallpitError> {
        self.sim.validate().map_err(BallpitError::InvalidConfig)?;
        let camera = &self.camera;
        if !(camera.fov > 0.0 && camera.fov < 180.0) {
            return Err(BallpitError::InvalidConfig(format!("fov must be in (0, 180), got {}", camera.fov)));
        }
        if camera.camera_z <= 0.0 {
            return Err(BallpitError::InvalidConfig(format!(
                "cameraZ must be positive, got {}",
                camera.camera_z
            )));
        }
        let surface = &self.surface;
        if surface.min_pixel_ratio <= 0.0 || surface.max_pixel_ratio < surface.min_pixel_ratio {
            return Err(BallpitError::InvalidConfig(format!(
                "pixel ratio range {}..{} is empty",
                surface.min_pixel_ratio, surface.max_pixel_ratio
            )));
        }
        Ok(())
    }

    /// Simulation parameters with the quality cap applied
    pub fn effective_sim(&self) -> SimConfig {
        let mut sim = self.sim.clone();
        sim.count = sim.count.min(self.quality.max_bodies());
        sim
    }

    /// Linear-RGB colour ramp
    pub fn color_ramp(&self) -> Vec<Vec3> {
        self.colors.iter().map(|c| c.to_linear()).collect()
    }

    pub fn lifecycle_options(&self) -> LifecycleOptions {
        let max_pixel_ratio = self.surface.max_pixel_ratio.min(self.quality.max_pixel_ratio());
        LifecycleOptions {
            fov: self.camera.fov,
            camera_position: Vec3::new(0.0, 0.0, self.camera.camera_z),
            min_aspect: self.camera.min_aspect,
            max_aspect: self.camera.max_aspect,
            max_fov: self.camera.max_fov,
            min_pixel_ratio: self.surface.min_pixel_ratio.min(max_pixel_ratio),
            max_pixel_ratio,
            track_parent: self.surface.track_parent,
        }
    }
}
