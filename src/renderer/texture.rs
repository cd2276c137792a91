use glam::UVec2;

pub struct Texture {
    pub view: wgpu::TextureView,
    pub size: wgpu::Extent3d,
}

impl Texture {
    /// Off-screen target that is rendered into and sampled later.
    pub fn new_intermediate(
        device: &wgpu::Device,
        resolution: UVec2,
        format: wgpu::TextureFormat,
        label: Option<&str>,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: resolution.x.max(1),
            height: resolution.y.max(1),
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            label,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            view,
            size,
        }
    }
}
