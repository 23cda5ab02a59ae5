//! Frame rendering: shadow pass followed by the lit scene pass

use glam::{Mat4, Vec4};

use super::context::GpuContext;
use super::mesh::{GpuMaterial, GpuModel, GpuPrimitive, MaterialFactory, ObjectUniforms, ground_plane};
use super::pipelines::{Culling, Layouts, SHADOW_FORMAT, ScenePipeline, ShadowPipeline};
use crate::assets::{ImageData, Material};
use crate::scene::{FrameUniforms, OrbitCamera, SceneState};

/// What a draw call renders
#[derive(Debug, Clone, Copy)]
enum DrawSource {
    Ground,
    Model { model: usize, mesh: usize, primitive: usize },
}

#[derive(Debug, Clone, Copy)]
struct Draw {
    source: DrawSource,
    casts_shadow: bool,
    culling: Culling,
}

/// Everything one frame draws, plus the data to upload before drawing
#[derive(Default)]
struct FrameDraws {
    draws: Vec<Draw>,
    objects: Vec<ObjectUniforms>,
    /// Joint matrices of every visible skin, back to back
    joints: Vec<[[f32; 4]; 4]>,
}

pub struct Renderer {
    layouts: Layouts,
    shadow_pipeline: ShadowPipeline,
    scene_pipeline: ScenePipeline,

    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    shadow_frame_bind_group: wgpu::BindGroup,
    shadow_view: wgpu::TextureView,
    shadow_sampler: wgpu::Sampler,

    // Joint matrices, grown on demand; bound through the frame bind groups
    joint_buffer: wgpu::Buffer,
    joint_capacity: usize,

    // Per-draw uniforms, grown on demand
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    object_stride: u64,
    object_capacity: usize,

    ground: GpuPrimitive,
    ground_material: GpuMaterial,
    /// One slot per catalog entry; `None` when the model failed to load
    models: Vec<Option<GpuModel>>,
}

impl Renderer {
    /// Create pipelines and upload the ground and every loaded model
    pub fn new(ctx: &GpuContext, scene: &SceneState) -> Self {
        let device = &ctx.device;
        let layouts = Layouts::new(ctx);
        let shadow_pipeline = ShadowPipeline::new(ctx, &layouts);
        let scene_pipeline = ScenePipeline::new(ctx, &layouts);

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Buffer"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let (shadow_w, shadow_h) = scene.config.directional.shadow_map_size;
        let shadow_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Map"),
            size: wgpu::Extent3d {
                width: shadow_w.max(1),
                height: shadow_h.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SHADOW_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let shadow_view = shadow_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let joint_capacity = 64;
        let joint_buffer = create_joint_buffer(device, joint_capacity);
        let (frame_bind_group, shadow_frame_bind_group) =
            create_frame_bind_groups(device, &layouts, &frame_buffer, &shadow_view, &shadow_sampler, &joint_buffer);

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let object_stride = (std::mem::size_of::<ObjectUniforms>() as u64).div_ceil(alignment) * alignment;
        let object_capacity = 64;
        let (object_buffer, object_bind_group) =
            create_object_buffer(device, &layouts.object, object_stride, object_capacity);

        // Linear filtering with repeat for base color textures
        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let factory = MaterialFactory {
            ctx,
            layout: &layouts.material,
            sampler: &material_sampler,
        };
        let white = factory.texture_view(&ImageData::white(), "White Texture");

        let ground_config = &scene.config.ground;
        let ground = GpuPrimitive::upload(ctx, &ground_plane(ground_config), 0, "Ground");
        let ground_material = factory.material(
            &white,
            &Material {
                base_color: ground_config.color,
                ..Default::default()
            },
            "Ground Material",
        );

        let models = scene
            .instances()
            .iter()
            .map(|instance| {
                instance
                    .asset
                    .as_ref()
                    .map(|asset| GpuModel::upload(&factory, asset, &white, &instance.entry.id))
            })
            .collect();

        Self {
            layouts,
            shadow_pipeline,
            scene_pipeline,
            frame_buffer,
            frame_bind_group,
            shadow_frame_bind_group,
            shadow_view,
            shadow_sampler,
            joint_buffer,
            joint_capacity,
            object_buffer,
            object_bind_group,
            object_stride,
            object_capacity,
            ground,
            ground_material,
            models,
        }
    }

    /// Collect the draw list, the matching per-draw uniforms and the joint palette
    fn collect_draws(&self, scene: &SceneState) -> FrameDraws {
        let mut frame = FrameDraws::default();
        frame.draws.push(Draw {
            source: DrawSource::Ground,
            casts_shadow: false,
            culling: Culling::Back,
        });
        frame
            .objects
            .push(ObjectUniforms::new(Mat4::IDENTITY, self.ground_material.base_color));

        for (index, instance) in scene.visible_instances() {
            let model = index.get();
            let (Some(asset), Some(Some(gpu))) = (instance.asset.as_ref(), self.models.get(model)) else {
                continue;
            };

            // Offset of each skin's matrices in the joint palette
            let mut skin_ranges = Vec::with_capacity(asset.skins.len());
            for matrices in asset.joint_matrices() {
                skin_ranges.push((frame.joints.len() as u32, matrices.len() as u32));
                frame.joints.extend(matrices.iter().map(Mat4::to_cols_array_2d));
            }

            for placed in asset.mesh_instances(instance.placement()) {
                let Some(primitives) = gpu.meshes.get(placed.mesh) else {
                    continue;
                };
                let skin = placed.skin.and_then(|s| skin_ranges.get(s).copied());
                for (primitive, gpu_primitive) in primitives.iter().enumerate() {
                    let (base_color, double_sided) = gpu
                        .materials
                        .get(gpu_primitive.material)
                        .map_or((Vec4::ONE, false), |m| (m.base_color, m.double_sided));

                    let mut object = ObjectUniforms::new(placed.world, base_color);
                    if let (true, Some((offset, count))) = (gpu_primitive.skinned, skin) {
                        object = object.skinned(offset, count);
                    }

                    frame.draws.push(Draw {
                        source: DrawSource::Model {
                            model,
                            mesh: placed.mesh,
                            primitive,
                        },
                        casts_shadow: true,
                        culling: Culling::for_draw(double_sided, placed.world),
                    });
                    frame.objects.push(object);
                }
            }
        }

        frame
    }

    fn resolve(&self, source: DrawSource) -> Option<(&GpuPrimitive, &GpuMaterial)> {
        match source {
            DrawSource::Ground => Some((&self.ground, &self.ground_material)),
            DrawSource::Model { model, mesh, primitive } => {
                let gpu = self.models.get(model)?.as_ref()?;
                let primitive = gpu.meshes.get(mesh)?.get(primitive)?;
                let material = gpu.materials.get(primitive.material)?;
                Some((primitive, material))
            }
        }
    }

    fn ensure_object_capacity(&mut self, ctx: &GpuContext, count: usize) {
        if count <= self.object_capacity {
            return;
        }
        let capacity = count.next_power_of_two();
        log::debug!("Growing object buffer to {} draws", capacity);
        let (buffer, bind_group) = create_object_buffer(&ctx.device, &self.layouts.object, self.object_stride, capacity);
        self.object_buffer = buffer;
        self.object_bind_group = bind_group;
        self.object_capacity = capacity;
    }

    fn ensure_joint_capacity(&mut self, ctx: &GpuContext, count: usize) {
        if count <= self.joint_capacity {
            return;
        }
        let capacity = count.next_power_of_two();
        log::debug!("Growing joint buffer to {} matrices", capacity);
        self.joint_buffer = create_joint_buffer(&ctx.device, capacity);
        self.joint_capacity = capacity;
        let (frame, shadow_frame) = create_frame_bind_groups(
            &ctx.device,
            &self.layouts,
            &self.frame_buffer,
            &self.shadow_view,
            &self.shadow_sampler,
            &self.joint_buffer,
        );
        self.frame_bind_group = frame;
        self.shadow_frame_bind_group = shadow_frame;
    }

    /// Render one frame of `scene` seen through `camera`
    pub fn render(&mut self, ctx: &GpuContext, scene: &SceneState, camera: &OrbitCamera) -> Result<(), wgpu::SurfaceError> {
        let FrameDraws { draws, objects, joints } = self.collect_draws(scene);
        self.ensure_object_capacity(ctx, objects.len());
        self.ensure_joint_capacity(ctx, joints.len());

        // Upload uniforms
        let stride = self.object_stride as usize;
        let mut object_bytes = vec![0u8; objects.len() * stride];
        for (i, object) in objects.iter().enumerate() {
            let bytes = bytemuck::bytes_of(object);
            object_bytes[i * stride..i * stride + bytes.len()].copy_from_slice(bytes);
        }
        ctx.queue.write_buffer(&self.object_buffer, 0, &object_bytes);
        if !joints.is_empty() {
            ctx.queue.write_buffer(&self.joint_buffer, 0, bytemuck::cast_slice(&joints));
        }

        let frame = FrameUniforms::new(&scene.config, camera);
        ctx.queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame));

        let output = ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if scene.config.directional.cast_shadow {
                shadow_pass.set_pipeline(&self.shadow_pipeline.render_pipeline);
                shadow_pass.set_bind_group(0, &self.shadow_frame_bind_group, &[]);
                for (i, draw) in draws.iter().enumerate().filter(|(_, d)| d.casts_shadow) {
                    let Some((primitive, _)) = self.resolve(draw.source) else {
                        continue;
                    };
                    shadow_pass.set_bind_group(1, &self.object_bind_group, &[(i as u64 * self.object_stride) as u32]);
                    shadow_pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
                    shadow_pass.set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    shadow_pass.draw_indexed(0..primitive.index_count, 0, 0..1);
                }
            }
        }

        {
            let background = scene.config.background;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: background.x as f64,
                            g: background.y as f64,
                            b: background.z as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &ctx.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
            let mut bound: Option<Culling> = None;
            for (i, draw) in draws.iter().enumerate() {
                let Some((primitive, material)) = self.resolve(draw.source) else {
                    continue;
                };
                if bound != Some(draw.culling) {
                    render_pass.set_pipeline(self.scene_pipeline.pipeline(draw.culling));
                    bound = Some(draw.culling);
                }
                render_pass.set_bind_group(1, &self.object_bind_group, &[(i as u64 * self.object_stride) as u32]);
                render_pass.set_bind_group(2, &material.bind_group, &[]);
                render_pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
                render_pass.set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..primitive.index_count, 0, 0..1);
            }
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

fn create_object_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    capacity: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Object Uniform Buffer"),
        size: stride * capacity as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Object Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<ObjectUniforms>() as u64),
            }),
        }],
    });

    (buffer, bind_group)
}

fn create_joint_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Joint Storage Buffer"),
        size: (std::mem::size_of::<[[f32; 4]; 4]>() * capacity.max(1)) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Bind groups for the scene pass and the shadow pass
fn create_frame_bind_groups(
    device: &wgpu::Device,
    layouts: &Layouts,
    frame_buffer: &wgpu::Buffer,
    shadow_view: &wgpu::TextureView,
    shadow_sampler: &wgpu::Sampler,
    joint_buffer: &wgpu::Buffer,
) -> (wgpu::BindGroup, wgpu::BindGroup) {
    let frame = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Frame Bind Group"),
        layout: &layouts.frame,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(shadow_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(shadow_sampler),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: joint_buffer.as_entire_binding(),
            },
        ],
    });

    let shadow_frame = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Shadow Frame Bind Group"),
        layout: &layouts.shadow_frame,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: joint_buffer.as_entire_binding(),
            },
        ],
    });

    (frame, shadow_frame)
}
