//! Light setup and the per-frame uniform block shared with the shaders

use glam::{Mat4, Vec3, Vec4};

use super::camera::OrbitCamera;
use super::config::{DirectionalLightConfig, SceneConfig};

/// Depth bias applied when comparing against the shadow map
const SHADOW_BIAS: f32 = 0.0015;

/// Per-frame data for the shadow and main passes. Layout matches `FrameUniforms` in the WGSL.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    /// rgb = color * intensity
    pub ambient: [f32; 4],
    /// xyz = unit vector towards the light, w = 1 when shadows are enabled
    pub sun_direction: [f32; 4],
    pub sun_color: [f32; 4],
    /// xyz = position, w = cutoff distance
    pub point_position: [f32; 4],
    /// rgb = color * intensity, w = decay
    pub point_color: [f32; 4],
    /// x = depth bias, y = shadow texel size
    pub shadow_params: [f32; 4],
}

impl FrameUniforms {
    pub fn new(config: &SceneConfig, camera: &OrbitCamera) -> Self {
        let sun = &config.directional;
        let point = &config.point;
        let to_light = (sun.position - sun.target).normalize_or_zero();
        let shadows = if sun.cast_shadow { 1.0 } else { 0.0 };

        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            light_view_proj: directional_shadow_matrix(sun).to_cols_array_2d(),
            camera_position: camera.eye().extend(1.0).to_array(),
            ambient: Vec3::splat(config.ambient_intensity).extend(1.0).to_array(),
            sun_direction: to_light.extend(shadows).to_array(),
            sun_color: (sun.color * sun.intensity).extend(1.0).to_array(),
            point_position: point.position.extend(point.distance).to_array(),
            point_color: (point.color * point.intensity).extend(point.decay).to_array(),
            shadow_params: Vec4::new(SHADOW_BIAS, 1.0 / sun.shadow_map_size.0.max(1) as f32, 0.0, 0.0)
                .to_array(),
        }
    }
}

/// View-projection of the directional light's orthographic shadow camera
pub fn directional_shadow_matrix(light: &DirectionalLightConfig) -> Mat4 {
    let (left, right, bottom, top) = light.shadow_bounds;
    let direction = (light.target - light.position).normalize_or_zero();
    // look_at degenerates when looking straight along +/-Y
    let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    };

    let view = Mat4::look_at_rh(light.position, light.target, up);
    let projection = Mat4::orthographic_rh(left, right, bottom, top, light.shadow_near, light.shadow_far);
    projection * view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::config::CameraConfig;

    fn in_clip_volume(p: Vec3) -> bool {
        (-1.0..=1.0).contains(&p.x) && (-1.0..=1.0).contains(&p.y) && (0.0..=1.0).contains(&p.z)
    }

    #[test]
    fn test_shadow_frustum_covers_models_and_ground() {
        let light = DirectionalLightConfig::default();
        let matrix = directional_shadow_matrix(&light);

        for p in [
            Vec3::ZERO,
            Vec3::new(-2.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(5.0, -0.5, 5.0),
        ] {
            let projected = matrix.project_point3(p);
            assert!(in_clip_volume(projected), "{p:?} projected to {projected:?}");
        }

        // Far outside the 40x40 footprint
        assert!(!in_clip_volume(matrix.project_point3(Vec3::new(80.0, -0.5, -80.0))));
    }

    #[test]
    fn test_shadow_matrix_straight_down() {
        let light = DirectionalLightConfig {
            position: Vec3::new(0.0, 20.0, 0.0),
            ..Default::default()
        };
        let matrix = directional_shadow_matrix(&light);
        assert!(matrix.is_finite());
        assert!(in_clip_volume(matrix.project_point3(Vec3::ZERO)));
    }

    #[test]
    fn test_frame_uniforms_pack_lights() {
        let config = SceneConfig::default();
        let camera = OrbitCamera::from_config(&CameraConfig::default(), 1.0);

        let uniforms = FrameUniforms::new(&config, &camera);

        assert_eq!(uniforms.ambient[..3], [0.5, 0.5, 0.5]);
        assert_eq!(uniforms.sun_color[..3], [1.5, 1.5, 1.5]);
        assert_eq!(uniforms.sun_direction[3], 1.0);
        let to_light = Vec3::from_slice(&uniforms.sun_direction[..3]);
        assert!((to_light - Vec3::new(10.0, 15.0, 10.0).normalize()).length() < 1e-5);
        assert_eq!(uniforms.point_position, [0.0, 5.0, 0.0, 5.0]);
        assert_eq!(uniforms.point_color, [50.0, 50.0, 50.0, 0.5]);
        assert_eq!(uniforms.shadow_params[1], 1.0 / 2048.0);
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 240);
    }
}
