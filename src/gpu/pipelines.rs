//! Render pipelines: directional shadow depth pass and the lit scene pass

use glam::Mat4;

use super::context::{DEPTH_FORMAT, GpuContext};
use super::mesh::{ObjectUniforms, Vertex};

pub const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

fn joint_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages, dynamic: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Bind group layouts shared by both pipelines
pub struct Layouts {
    /// Frame uniforms + shadow map + comparison sampler + joints (scene pass)
    pub frame: wgpu::BindGroupLayout,
    /// Frame uniforms + joints (shadow pass)
    pub shadow_frame: wgpu::BindGroupLayout,
    /// Per-draw uniforms with dynamic offset
    pub object: wgpu::BindGroupLayout,
    /// Base color texture + sampler
    pub material: wgpu::BindGroupLayout,
}

impl Layouts {
    pub fn new(ctx: &GpuContext) -> Self {
        let device = &ctx.device;
        let stages = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;

        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                uniform_entry(0, stages, false),
                // Shadow map
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Comparison sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
                joint_entry(3),
            ],
        });

        let shadow_frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Frame Bind Group Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX, false), joint_entry(1)],
        });

        let object = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Object Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: stages,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<ObjectUniforms>() as u64),
                },
                count: None,
            }],
        });

        let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        Self {
            frame,
            shadow_frame,
            object,
            material,
        }
    }
}

/// Depth-only pipeline rendering shadow casters from the directional light
pub struct ShadowPipeline {
    pub render_pipeline: wgpu::RenderPipeline,
}

impl ShadowPipeline {
    pub fn new(ctx: &GpuContext, layouts: &Layouts) -> Self {
        let device = &ctx.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shadow.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&layouts.shadow_frame, &layouts.object],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_shadow"),
                buffers: &[Vertex::shadow_layout()],
                compilation_options: Default::default(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: SHADOW_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self { render_pipeline }
    }
}

/// Which faces a draw keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Culling {
    /// Single-sided, counter-clockwise front faces
    Back,
    /// Single-sided under a mirroring transform (negative determinant)
    BackMirrored,
    /// Double-sided material
    None,
}

impl Culling {
    pub fn for_draw(double_sided: bool, world: Mat4) -> Self {
        if double_sided {
            Culling::None
        } else if world.determinant() < 0.0 {
            Culling::BackMirrored
        } else {
            Culling::Back
        }
    }
}

/// Lit forward pipelines for the ground and the models, one per culling mode
pub struct ScenePipeline {
    single_sided: wgpu::RenderPipeline,
    mirrored: wgpu::RenderPipeline,
    double_sided: wgpu::RenderPipeline,
}

impl ScenePipeline {
    pub fn new(ctx: &GpuContext, layouts: &Layouts) -> Self {
        let device = &ctx.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&layouts.frame, &layouts.object, &layouts.material],
            push_constant_ranges: &[],
        });

        let build = |label: &str, front_face: wgpu::FrontFace, cull_mode: Option<wgpu::Face>| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[Vertex::layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: ctx.format(),
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face,
                    cull_mode,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        Self {
            single_sided: build("Scene Pipeline (single-sided)", wgpu::FrontFace::Ccw, Some(wgpu::Face::Back)),
            mirrored: build("Scene Pipeline (mirrored)", wgpu::FrontFace::Cw, Some(wgpu::Face::Back)),
            double_sided: build("Scene Pipeline (double-sided)", wgpu::FrontFace::Ccw, None),
        }
    }

    pub fn pipeline(&self, culling: Culling) -> &wgpu::RenderPipeline {
        match culling {
            Culling::Back => &self.single_sided,
            Culling::BackMirrored => &self.mirrored,
            Culling::None => &self.double_sided,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_culling_for_draw() {
        assert_eq!(Culling::for_draw(false, Mat4::IDENTITY), Culling::Back);
        assert_eq!(Culling::for_draw(true, Mat4::IDENTITY), Culling::None);

        let mirror = Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0));
        assert_eq!(Culling::for_draw(false, mirror), Culling::BackMirrored);
        assert_eq!(Culling::for_draw(true, mirror), Culling::None);
    }
}
