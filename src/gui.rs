use std::string::String;

use egui_wgpu::ScreenDescriptor;
use winit::window::Window;

pub struct GUI {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    pub ray_num: usize,
    pub distance: f32,
    pub soft_shadow_length: f32,
    light_hue: f32,
    light_saturation: f32,
    light_intensity: f32,
    light_alpha: f32,
    pub soft: bool,
    pub xray: bool,
    pub static_light: bool,
    pub culling: bool,
    v_sync: bool,
    fps_str: String,
    lights_str: String,
    cursor_str: String,
}

impl GUI {
    pub fn new(window: &Window, device: &wgpu::Device, surface_format: &wgpu::TextureFormat) -> Self {
        let ctx = egui::Context::default();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
        );
        let renderer = egui_wgpu::Renderer::new(device, *surface_format, None, 1);

        Self {
            ctx,
            state,
            renderer,
            ray_num: 128,
            distance: 15.0,
            soft_shadow_length: 2.5,
            light_hue: 0.12,
            light_saturation: 0.35,
            light_intensity: 0.9,
            light_alpha: 0.75,
            soft: true,
            xray: false,
            static_light: false,
            culling: true,
            v_sync: true,
            fps_str: "FPS: -".to_string(),
            lights_str: "LIGHTS: -".to_string(),
            cursor_str: "CURSOR: -".to_string(),
        }
    }

    /// Feeds a window event to egui. Returns true when egui consumed it.
    pub fn input(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn wants_pointer(&self) -> bool {
        self.ctx.wants_pointer_input()
    }

    pub fn update_fps(&mut self, fps: f32) {
        self.fps_str = format!("FPS: {:.1}", fps);
    }

    pub fn update_lights(&mut self, rendered: usize, total: usize) {
        self.lights_str = format!("LIGHTS: {}/{}", rendered, total);
    }

    pub fn update_cursor(&mut self, lit: bool) {
        self.cursor_str = if lit { "CURSOR: lit" } else { "CURSOR: shadow" }.to_string();
    }

    fn ui(&mut self, ctx: &egui::Context) {
        egui::Window::new("Stats")
            .resizable(false)
            .title_bar(false)
            .anchor(egui::Align2::LEFT_BOTTOM, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.add(egui::Checkbox::new(&mut self.v_sync, "VSync"));
                    ui.label(self.fps_str.as_str());
                    ui.label(self.lights_str.as_str());
                    ui.label(self.cursor_str.as_str());
                });
            });

        egui::Window::new("Chain light")
            .resizable(false)
            .show(ctx, |ui| {
                ui.add(egui::Slider::new(&mut self.ray_num, 2..=512).logarithmic(true).text("rays"));
                ui.add(egui::Slider::new(&mut self.distance, 0.5..=40.0).text("distance"));
                ui.add(egui::Slider::new(&mut self.soft_shadow_length, 0.0..=10.0).text("soft shadow length"));
                ui.add(egui::Slider::new(&mut self.light_hue, 0.0..=1.0).text("light hue"));
                ui.add(egui::Slider::new(&mut self.light_saturation, 0.0..=1.0).text("light saturation"));
                ui.add(egui::Slider::new(&mut self.light_intensity, 0.0..=1.0).text("light intensity"));
                ui.add(egui::Slider::new(&mut self.light_alpha, 0.0..=1.0).text("light alpha"));
                ui.separator();
                ui.add(egui::Checkbox::new(&mut self.soft, "soft shadows"));
                ui.add(egui::Checkbox::new(&mut self.xray, "x-ray"));
                ui.add(egui::Checkbox::new(&mut self.static_light, "static"));
                ui.add(egui::Checkbox::new(&mut self.culling, "culling"));
            });
    }

    /// Draws the panels on top of `view`. Returns the command buffers egui
    /// needs submitted ahead of `encoder`.
    pub fn render(
        &mut self,
        window: &Window,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) -> Vec<wgpu::CommandBuffer> {
        let raw_input = self.state.take_egui_input(window);
        let ctx = self.ctx.clone();
        let output = ctx.run(raw_input, |ctx| self.ui(ctx));
        self.state.handle_platform_output(window, output.platform_output);

        let paint_jobs = ctx.tessellate(output.shapes, output.pixels_per_point);
        let size = window.inner_size();
        let screen_descriptor = ScreenDescriptor {
            size_in_pixels: [size.width, size.height],
            pixels_per_point: output.pixels_per_point,
        };

        for (id, delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }
        let user_buffers = self.renderer.update_buffers(device, queue, encoder, &paint_jobs, &screen_descriptor);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("GUI pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.renderer.render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
        user_buffers
    }

    /// Linear RGBA light color picked in the panel.
    pub fn light_color(&self) -> [f32; 4] {
        let [r, g, b] = ecolor::rgb_from_hsv((self.light_hue, self.light_saturation, self.light_intensity));
        [r, g, b, self.light_alpha]
    }

    pub fn present_mode(&self) -> wgpu::PresentMode {
        if self.v_sync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::Immediate
        }
    }
}
