use chain_light::{LightRenderData, LightVertex};

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x2,
    1 => Uint32,
    2 => Float32,
];

/// `[x, y, packed color, alpha]`, one vertex per 16 bytes.
pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<LightVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

/// GPU side of one light: both strips, sized once from the light's ray count.
pub struct LightBuffers {
    capacity: usize,
    lit: wgpu::Buffer,
    penumbra: wgpu::Buffer,
    lit_count: u32,
    penumbra_count: u32,
}

impl LightBuffers {
    pub fn new(device: &wgpu::Device, capacity: usize) -> Self {
        let size = (capacity * std::mem::size_of::<LightVertex>()) as wgpu::BufferAddress;
        let create = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        Self {
            capacity,
            lit: create("Light strip"),
            penumbra: create("Penumbra strip"),
            lit_count: 0,
            penumbra_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn write(&mut self, queue: &wgpu::Queue, data: &LightRenderData) {
        let lit = &data.lit[..data.lit.len().min(self.capacity)];
        let penumbra = &data.penumbra[..data.penumbra.len().min(self.capacity)];
        if !lit.is_empty() {
            queue.write_buffer(&self.lit, 0, bytemuck::cast_slice(lit));
        }
        if !penumbra.is_empty() {
            queue.write_buffer(&self.penumbra, 0, bytemuck::cast_slice(penumbra));
        }
        self.lit_count = lit.len() as u32;
        self.penumbra_count = penumbra.len() as u32;
    }

    pub fn draw<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>) {
        if self.lit_count > 0 {
            render_pass.set_vertex_buffer(0, self.lit.slice(..));
            render_pass.draw(0..self.lit_count, 0..1);
        }
        if self.penumbra_count > 0 {
            render_pass.set_vertex_buffer(0, self.penumbra.slice(..));
            render_pass.draw(0..self.penumbra_count, 0..1);
        }
    }
}
