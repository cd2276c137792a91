use std::collections::HashMap;

use chain_light::{LightHandler, LightId};
use glam::UVec2;

use super::light::{vertex_layout, LightBuffers};
use super::texture;

/// Accumulates every light's strips into an HDR light map.
pub struct LightMapRenderer {
    pub lightmap: texture::Texture,
    light_buffers: HashMap<LightId, LightBuffers>,
    light_pipeline: wgpu::RenderPipeline,
}

pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

impl LightMapRenderer {
    pub fn new(resolution: UVec2, device: &wgpu::Device, uniform_bind_group_layout: &wgpu::BindGroupLayout) -> Self {
        let lightmap = texture::Texture::new_intermediate(device, resolution, TEXTURE_FORMAT, Some("Light map"));

        let light_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Light shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("light.wgsl").into()),
        });

        let light_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Light Render Pipeline Layout"),
                bind_group_layouts: &[uniform_bind_group_layout],
                push_constant_ranges: &[],
            });

        let light_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Light Render Pipeline"),
            layout: Some(&light_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &light_shader,
                entry_point: "vs_light",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[vertex_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &light_shader,
                entry_point: "fs_light",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TEXTURE_FORMAT,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::SrcAlpha,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Strip winding flips with the chain direction.
                cull_mode: None,
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

        Self {
            lightmap,
            light_buffers: HashMap::new(),
            light_pipeline,
        }
    }

    pub fn resize(&mut self, resolution: UVec2, device: &wgpu::Device) {
        if self.lightmap.size.width == resolution.x && self.lightmap.size.height == resolution.y {
            return;
        }
        self.lightmap = texture::Texture::new_intermediate(device, resolution, TEXTURE_FORMAT, Some("Light map"));
    }

    /// Uploads the current strips of every visible light and draws them.
    /// Buffers of lights that went away or changed size are dropped.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        uniform_bind_group: &wgpu::BindGroup,
        handler: &LightHandler,
    ) {
        self.light_buffers.retain(|id, buffers| {
            handler
                .get(*id)
                .map_or(false, |light| light.vertex_capacity() == buffers.capacity())
        });

        let mut visible = Vec::new();
        for (id, data) in handler.render_data() {
            let capacity = handler.get(id).map_or(0, |light| light.vertex_capacity());
            let buffers = self
                .light_buffers
                .entry(id)
                .or_insert_with(|| LightBuffers::new(device, capacity));
            buffers.write(queue, &data);
            visible.push(id);
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Light map pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.lightmap.view,
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
        render_pass.set_pipeline(&self.light_pipeline);
        render_pass.set_bind_group(0, uniform_bind_group, &[]);
        for id in &visible {
            if let Some(buffers) = self.light_buffers.get(id) {
                buffers.draw(&mut render_pass);
            }
        }
    }
}
