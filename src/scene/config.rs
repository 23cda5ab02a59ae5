//! Fixed scene configuration: lights, ground, camera and the model catalog

use glam::{Vec3, Vec4};

use crate::selection::ModelEntry;

/// Directional (sun-like) light with an orthographic shadow frustum
#[derive(Debug, Clone)]
pub struct DirectionalLightConfig {
    pub position: Vec3,
    pub target: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub cast_shadow: bool,
    /// Shadow map resolution (width, height)
    pub shadow_map_size: (u32, u32),
    pub shadow_near: f32,
    pub shadow_far: f32,
    /// Orthographic bounds: left, right, bottom, top
    pub shadow_bounds: (f32, f32, f32, f32),
}

impl Default for DirectionalLightConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(10.0, 15.0, 10.0),
            target: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.5,
            cast_shadow: true,
            shadow_map_size: (2048, 2048),
            shadow_near: 0.5,
            shadow_far: 50.0,
            shadow_bounds: (-20.0, 20.0, -20.0, 20.0),
        }
    }
}

/// Point light with a hard cutoff distance
#[derive(Debug, Clone)]
pub struct PointLightConfig {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Light reaches zero at this distance (0 = unlimited)
    pub distance: f32,
    /// Falloff exponent
    pub decay: f32,
}

impl Default for PointLightConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 5.0, 0.0),
            color: Vec3::ONE,
            intensity: 50.0,
            distance: 5.0,
            decay: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroundConfig {
    /// Edge length of the square plane
    pub size: f32,
    pub height: f32,
    /// Linear RGBA
    pub color: Vec4,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            size: 200.0,
            height: -0.5,
            // sRGB gray (128, 128, 128) in linear space
            color: Vec4::new(0.2158, 0.2158, 0.2158, 1.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Everything the viewer scene is built from
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// Ambient light intensity (white)
    pub ambient_intensity: f32,
    pub directional: DirectionalLightConfig,
    pub point: PointLightConfig,
    pub ground: GroundConfig,
    pub camera: CameraConfig,
    /// Selectable models, in UI order
    pub models: Vec<ModelEntry>,
    /// Identifier of the model shown at startup
    pub default_model: String,
    /// Clear color (linear RGB)
    pub background: Vec3,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            ambient_intensity: 0.5,
            directional: DirectionalLightConfig::default(),
            point: PointLightConfig::default(),
            ground: GroundConfig::default(),
            camera: CameraConfig::default(),
            models: vec![
                ModelEntry::new("model-1", "Model 1", "models/trial -1.glb", Vec3::new(-2.0, 0.0, 0.0)),
                ModelEntry::new("model-2", "Model 2", "models/trial -3.glb", Vec3::new(2.0, 0.0, 0.0)),
            ],
            default_model: "model-1".to_string(),
            background: Vec3::new(0.05, 0.05, 0.06),
        }
    }
}
