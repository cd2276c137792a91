mod light;
mod light_map;
mod texture;

use chain_light::{LightHandler, LightVertex};
use glam::*;
use wgpu::util::DeviceExt;

use light::vertex_layout;
use light_map::LightMapRenderer;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Zeroable, bytemuck::Pod)]
struct Uniforms {
    pub translate: [f32; 2],
    pub view_size: [f32; 2],
    pub ambient: [f32; 4],
    pub background: [f32; 4],
}

impl Default for Uniforms {
    fn default() -> Uniforms {
        Uniforms {
            translate: [0.0, 0.0],
            view_size: [1.0, 1.0],
            ambient: [0.0, 0.0, 0.0, 1.0],
            background: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

pub struct Renderer {
    uniforms: Uniforms,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    light_map_renderer: LightMapRenderer,
    lightmap_sampler: wgpu::Sampler,
    lightmap_bind_group_layout: wgpu::BindGroupLayout,
    lightmap_bind_group: wgpu::BindGroup,
    composite_pipeline: wgpu::RenderPipeline,
    occluder_pipeline: wgpu::RenderPipeline,
    pub position: Vec2,
    pub view_size: Vec2,
    pub background: [f32; 4],
    pub occluder_color: [f32; 4],
}

impl Renderer {
    pub fn new(resolution: UVec2, view_size: Vec2, device: &wgpu::Device, surface_format: &wgpu::TextureFormat) -> Self {
        let uniforms = Uniforms::default();

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    count: None,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                }
            ]
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }
            ],
            label: Some("uniform_bind_group"),
        });

        let light_map_renderer = LightMapRenderer::new(resolution, device, &uniform_bind_group_layout);

        let lightmap_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Light map"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let lightmap_bind_group_layout = device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
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
                label: Some("lightmap_bind_group_layout"),
            }
        );

        let lightmap_bind_group = Self::create_lightmap_bind_group(
            device,
            &lightmap_bind_group_layout,
            &light_map_renderer.lightmap.view,
            &lightmap_sampler,
        );

        let composite_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Composite shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("composite.wgsl").into()),
        });

        let composite_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Composite Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout, &lightmap_bind_group_layout],
                push_constant_ranges: &[],
            });

        let composite_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Composite Pipeline"),
            layout: Some(&composite_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &composite_shader,
                entry_point: "main_vert",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &composite_shader,
                entry_point: "main_frag",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: *surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let occluder_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Occluder shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("light.wgsl").into()),
        });

        let occluder_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Occluder Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout],
                push_constant_ranges: &[],
            });

        let occluder_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Occluder Pipeline"),
            layout: Some(&occluder_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &occluder_shader,
                entry_point: "vs_light",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[vertex_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &occluder_shader,
                entry_point: "fs_line",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: *surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        log::info!("renderer ready at {}x{}, surface {:?}", resolution.x, resolution.y, surface_format);

        Self {
            uniforms,
            uniform_buffer,
            uniform_bind_group,
            light_map_renderer,
            lightmap_sampler,
            lightmap_bind_group_layout,
            lightmap_bind_group,
            composite_pipeline,
            occluder_pipeline,
            position: Vec2::ZERO,
            view_size,
            background: [0.85, 0.8, 0.7, 1.0],
            occluder_color: [0.9, 0.3, 0.2, 1.0],
        }
    }

    fn create_lightmap_bind_group(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, view: &wgpu::TextureView, sampler: &wgpu::Sampler) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some("lightmap_bind_group"),
        })
    }

    pub fn resize(&mut self, resolution: UVec2, device: &wgpu::Device) {
        self.light_map_renderer.resize(resolution, device);
        self.lightmap_bind_group = Self::create_lightmap_bind_group(
            device,
            &self.lightmap_bind_group_layout,
            &self.light_map_renderer.lightmap.view,
            &self.lightmap_sampler,
        );
    }

    fn update_uniforms(&mut self, queue: &wgpu::Queue, ambient: [f32; 4]) {
        self.uniforms.translate = self.position.into();
        self.uniforms.view_size = self.view_size.into();
        self.uniforms.ambient = ambient;
        self.uniforms.background = self.background;
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniforms]));
    }

    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        handler: &LightHandler,
        outlines: &[(Vec2, Vec2)],
    ) {
        self.update_uniforms(queue, handler.config.ambient);
        self.light_map_renderer.render(device, queue, encoder, &self.uniform_bind_group, handler);

        let color = chain_light::light::pack_color(self.occluder_color);
        let lines: Vec<LightVertex> = outlines
            .iter()
            .flat_map(|(a, b)| [LightVertex::new(*a, color, 1.0), LightVertex::new(*b, color, 1.0)])
            .collect();
        let line_buffer = (!lines.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Occluder outlines"),
                contents: bytemuck::cast_slice(&lines),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Composite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&self.composite_pipeline);
        render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        render_pass.set_bind_group(1, &self.lightmap_bind_group, &[]);
        render_pass.draw(0..3, 0..1);

        if let Some(line_buffer) = &line_buffer {
            render_pass.set_pipeline(&self.occluder_pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, line_buffer.slice(..));
            render_pass.draw(0..lines.len() as u32, 0..1);
        }
    }
}
