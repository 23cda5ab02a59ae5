//! GPU-side meshes, materials and per-draw uniforms

use glam::{Mat4, Vec2, Vec3, Vec4};
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use crate::assets::{ImageData, Material, ModelAsset, Primitive};
use crate::scene::GroundConfig;

/// Interleaved vertex as consumed by both render pipelines
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub joints: [u32; 4],
    /// All zero for unskinned geometry
    pub weights: [f32; 4],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Uint32x4,
        4 => Float32x4
    ];
    /// Attributes the depth-only shadow pass reads
    pub const SHADOW_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 3 => Uint32x4, 4 => Float32x4];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    pub fn shadow_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::SHADOW_ATTRIBUTES,
        }
    }
}

/// Per-draw data, bound with a dynamic offset
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    /// x = first joint in the joint buffer, y = joint count (0 = unskinned)
    pub skin: [u32; 4],
}

impl ObjectUniforms {
    pub fn new(model: Mat4, base_color: Vec4) -> Self {
        let normal = if model.determinant().abs() > f32::EPSILON {
            model.inverse().transpose()
        } else {
            model
        };
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: normal.to_cols_array_2d(),
            base_color: base_color.to_array(),
            skin: [0; 4],
        }
    }

    /// Deform by `count` joint matrices starting at `offset` in the joint buffer
    pub fn skinned(mut self, offset: u32, count: u32) -> Self {
        self.skin = [offset, count, 0, 0];
        self
    }
}

/// Interleave a primitive's attribute arrays
pub fn interleave(primitive: &Primitive) -> Vec<Vertex> {
    let skinned = primitive.is_skinned();
    primitive
        .positions
        .iter()
        .enumerate()
        .map(|(i, position)| {
            let (joints, weights) = match (primitive.joints.get(i), primitive.weights.get(i)) {
                (Some(joints), Some(weights)) if skinned => (joints.map(u32::from), weights.to_array()),
                _ => ([0; 4], [0.0; 4]),
            };
            Vertex {
                position: position.to_array(),
                normal: primitive.normals.get(i).copied().unwrap_or(Vec3::Y).to_array(),
                uv: primitive.uvs.get(i).copied().unwrap_or(Vec2::ZERO).to_array(),
                joints,
                weights,
            }
        })
        .collect()
}

/// Square, upward-facing plane centered under the origin
pub fn ground_plane(config: &GroundConfig) -> Primitive {
    let h = config.size * 0.5;
    let y = config.height;
    Primitive {
        positions: vec![
            Vec3::new(-h, y, -h),
            Vec3::new(-h, y, h),
            Vec3::new(h, y, h),
            Vec3::new(h, y, -h),
        ],
        normals: vec![Vec3::Y; 4],
        uvs: vec![Vec2::new(0.0, 0.0), Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), Vec2::new(1.0, 0.0)],
        indices: vec![0, 1, 2, 0, 2, 3],
        ..Default::default()
    }
}

pub struct GpuPrimitive {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    /// Index into the owning model's materials
    pub material: usize,
    /// Carries joint indices and weights
    pub skinned: bool,
}

impl GpuPrimitive {
    pub fn upload(ctx: &GpuContext, primitive: &Primitive, material: usize, label: &str) -> Self {
        let vertices = interleave(primitive);
        let vertex_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertices")),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Indices")),
            contents: bytemuck::cast_slice(&primitive.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: primitive.indices.len() as u32,
            material,
            skinned: primitive.is_skinned(),
        }
    }
}

pub struct GpuMaterial {
    pub bind_group: wgpu::BindGroup,
    pub base_color: Vec4,
    /// Back faces are drawn (and lit with a flipped normal)
    pub double_sided: bool,
}

/// Uploads base color textures and builds material bind groups
pub struct MaterialFactory<'a> {
    pub ctx: &'a GpuContext,
    pub layout: &'a wgpu::BindGroupLayout,
    pub sampler: &'a wgpu::Sampler,
}

impl MaterialFactory<'_> {
    pub fn texture_view(&self, image: &ImageData, label: &str) -> wgpu::TextureView {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(image.width * 4),
                rows_per_image: Some(image.height),
            },
            size,
        );

        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    pub fn material(&self, view: &wgpu::TextureView, material: &Material, label: &str) -> GpuMaterial {
        let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(self.sampler),
                },
            ],
        });
        GpuMaterial {
            bind_group,
            base_color: material.base_color,
            double_sided: material.double_sided,
        }
    }
}

/// A model asset uploaded to the GPU: `meshes[mesh][primitive]`
pub struct GpuModel {
    pub meshes: Vec<Vec<GpuPrimitive>>,
    pub materials: Vec<GpuMaterial>,
}

impl GpuModel {
    pub fn upload(factory: &MaterialFactory, asset: &ModelAsset, white: &wgpu::TextureView, name: &str) -> Self {
        let views: Vec<wgpu::TextureView> = asset
            .images
            .iter()
            .enumerate()
            .map(|(i, image)| factory.texture_view(image, &format!("{name} Image {i}")))
            .collect();

        // The asset's materials, then a default one for primitives without a material
        let default_material = Material::default();
        let materials: Vec<GpuMaterial> = asset
            .materials
            .iter()
            .chain(std::iter::once(&default_material))
            .enumerate()
            .map(|(i, material)| {
                let view = material
                    .base_color_image
                    .and_then(|image| views.get(image))
                    .unwrap_or(white);
                factory.material(view, material, &format!("{name} Material {i}"))
            })
            .collect();
        let default_index = materials.len() - 1;

        let meshes = asset
            .meshes
            .iter()
            .enumerate()
            .map(|(m, mesh)| {
                mesh.primitives
                    .iter()
                    .enumerate()
                    .map(|(p, primitive)| {
                        let material = primitive
                            .material
                            .filter(|&i| i < default_index)
                            .unwrap_or(default_index);
                        GpuPrimitive::upload(factory.ctx, primitive, material, &format!("{name} Mesh {m}.{p}"))
                    })
                    .collect()
            })
            .collect();

        Self { meshes, materials }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_fills_missing_attributes() {
        let primitive = Primitive {
            positions: vec![Vec3::ZERO, Vec3::X],
            normals: vec![Vec3::Z],
            indices: vec![0, 1, 0],
            ..Default::default()
        };

        let vertices = interleave(&primitive);

        assert_eq!(vertices.len(), 2);
        assert_eq!(vertices[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(vertices[1].normal, [0.0, 1.0, 0.0]);
        assert_eq!(vertices[1].uv, [0.0, 0.0]);
        assert_eq!(vertices[0].weights, [0.0; 4]);
        assert_eq!(std::mem::size_of::<Vertex>(), 64);
    }

    #[test]
    fn test_interleave_carries_skin_attributes() {
        let primitive = Primitive {
            positions: vec![Vec3::ZERO, Vec3::X],
            joints: vec![[0, 1, 0, 0], [2, 0, 0, 0]],
            weights: vec![Vec4::new(0.25, 0.75, 0.0, 0.0), Vec4::X],
            indices: vec![0, 1, 0],
            ..Default::default()
        };

        let vertices = interleave(&primitive);

        assert_eq!(vertices[0].joints, [0, 1, 0, 0]);
        assert_eq!(vertices[0].weights, [0.25, 0.75, 0.0, 0.0]);
        assert_eq!(vertices[1].joints, [2, 0, 0, 0]);

        // Partial skin data is treated as unskinned
        let partial = Primitive {
            joints: vec![[1, 0, 0, 0]],
            ..primitive
        };
        assert!(interleave(&partial).iter().all(|v| v.weights == [0.0; 4]));
    }

    #[test]
    fn test_ground_plane_faces_up() {
        let ground = ground_plane(&GroundConfig::default());

        assert_eq!(ground.positions.len(), 4);
        assert!(ground.positions.iter().all(|p| p.y == -0.5));
        assert!(ground.positions.iter().all(|p| p.x.abs() == 100.0 && p.z.abs() == 100.0));

        // Counter-clockwise seen from above
        for tri in ground.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| ground.positions[i as usize]);
            assert!((b - a).cross(c - a).y > 0.0);
        }
    }

    #[test]
    fn test_normal_matrix_handles_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let uniforms = ObjectUniforms::new(model, Vec4::ONE);

        let normal = Mat4::from_cols_array_2d(&uniforms.normal_matrix);
        assert!((normal.x_axis.x - 0.5).abs() < 1e-6);

        let degenerate = ObjectUniforms::new(Mat4::from_scale(Vec3::ZERO), Vec4::ONE);
        assert!(Mat4::from_cols_array_2d(&degenerate.normal_matrix).is_finite());
        assert_eq!(uniforms.skin, [0; 4]);
        assert_eq!(uniforms.skinned(12, 3).skin, [12, 3, 0, 0]);
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), 160);
    }
}
