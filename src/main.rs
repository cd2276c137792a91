mod gui;
mod renderer;

use std::f32::consts::PI;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use chain_light::occluders::{OccluderWorld, RigidBody, Shape};
use chain_light::world::BodyPose;
use chain_light::{ChainLight, ChainLightDef, HandlerConfig, LightHandler, LightId};
use glam::*;
use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowBuilder},
};

const WINDOW_SIZE: winit::dpi::LogicalSize<u32> = winit::dpi::LogicalSize::new(1280, 720);
const VIEW_WIDTH: f32 = 48.0;
const LAMP_RADIUS: f32 = 3.0;
const LAMP_POINTS: usize = 9;
/// Grab distance around the lamp for mouse dragging.
const GRAB_RADIUS: f32 = 4.0;

struct State {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    gui: gui::GUI,
    renderer: renderer::Renderer,
    world: OccluderWorld,
    spinners: Vec<(Rc<RigidBody>, f32)>,
    lamp: Rc<RigidBody>,
    handler: LightHandler,
    lamp_light: LightId,
    outlines: Vec<(Vec2, Vec2)>,
    mouse_pos: Vec2,
    dragging: bool,
    up_pressed: bool,
    left_pressed: bool,
    right_pressed: bool,
    down_pressed: bool,
    zoom_in_pressed: bool,
    zoom_out_pressed: bool,
}

/// Half circle above `center`, traversed left to right so every ray
/// leaves radially outward.
fn arch(center: Vec2, radius: f32, points: usize) -> Vec<f32> {
    (0..points)
        .flat_map(|i| {
            let angle = PI * (1.0 - i as f32 / (points - 1) as f32);
            let p = center + Vec2::from_angle(angle) * radius;
            [p.x, p.y]
        })
        .collect()
}

fn build_world() -> (OccluderWorld, Vec<(Rc<RigidBody>, f32)>, Rc<RigidBody>) {
    let mut world = OccluderWorld::new();

    let ground = world.create_body(Vec2::ZERO, 0.0);
    world.add_fixture(&ground, Shape::segment(Vec2::new(-30.0, -8.0), Vec2::new(30.0, -8.0)));
    world.add_fixture(&ground, Shape::circle(Vec2::new(-12.0, 6.0), 1.5));
    world.add_fixture(&ground, Shape::circle(Vec2::new(14.0, 9.0), 2.0));
    world.add_fixture(&ground, Shape::polygon(vec![
        Vec2::new(8.0, -4.0),
        Vec2::new(11.0, -4.0),
        Vec2::new(9.5, -1.0),
    ]));

    let mut spinners = Vec::new();
    for (i, x) in [-16.0, -6.0, 6.0, 18.0].into_iter().enumerate() {
        let body = world.create_body(Vec2::new(x, 4.0 + 2.0 * (i % 2) as f32), 0.0);
        world.add_fixture(&body, Shape::rect(Vec2::new(1.5, 0.4)));
        let speed = if i % 2 == 0 { 0.6 } else { -0.9 };
        spinners.push((body, speed));
    }

    let lamp = world.create_body(Vec2::new(0.0, -5.0), 0.0);
    world.add_fixture(&lamp, Shape::rect(Vec2::new(LAMP_RADIUS + 0.5, 0.3)));

    (world, spinners, lamp)
}

impl State {
    async fn new(window: Arc<Window>) -> Result<Self, String> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone()).map_err(|e| e.to_string())?;
        let adapter = instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            },
        ).await.ok_or("No suitable GPU adapters found on the system!")?;

        let (device, queue) = adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ).await.map_err(|e| e.to_string())?;

        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps.formats.iter().copied().find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or("Surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let gui = gui::GUI::new(&window, &device, &surface_format);

        let view_size = Vec2::new(VIEW_WIDTH, VIEW_WIDTH * config.height as f32 / config.width as f32);
        let renderer = renderer::Renderer::new(
            UVec2::new(config.width, config.height),
            view_size,
            &device,
            &surface_format,
        );

        let (world, spinners, lamp) = build_world();
        let mut handler = LightHandler::new(HandlerConfig::default());

        let def = ChainLightDef {
            ray_num: gui.ray_num,
            distance: gui.distance,
            color: gui.light_color(),
            soft: gui.soft,
            soft_shadow_length: gui.soft_shadow_length,
            ignore_attached_body: true,
            ..ChainLightDef::default()
        };
        let mut light = ChainLight::new(&def, lamp.position(), &arch(lamp.position(), LAMP_RADIUS, LAMP_POINTS))
            .map_err(|e| e.to_string())?;
        light.attach_to_body(lamp.clone(), Vec2::ZERO);
        let lamp_light = handler.add(Box::new(light));

        // A fixed strip along the ceiling, shining down.
        let ceiling = ChainLightDef {
            ray_num: 96,
            distance: 12.0,
            color: [0.3, 0.5, 0.9, 0.6],
            static_light: true,
            ..ChainLightDef::default()
        };
        let strip = ChainLight::new(&ceiling, Vec2::new(0.0, 14.0), &[10.0, 14.0, 0.0, 15.0, -10.0, 14.0])
            .map_err(|e| e.to_string())?;
        handler.add(Box::new(strip));

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            gui,
            renderer,
            world,
            spinners,
            lamp,
            handler,
            lamp_light,
            outlines: Vec::new(),
            mouse_pos: Vec2::ZERO,
            dragging: false,
            up_pressed: false,
            left_pressed: false,
            right_pressed: false,
            down_pressed: false,
            zoom_in_pressed: false,
            zoom_out_pressed: false,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.renderer.view_size.y = self.renderer.view_size.x * new_size.height as f32 / new_size.width as f32;
            self.renderer.resize(UVec2::new(new_size.width, new_size.height), &self.device);
        }
    }

    fn cursor_world(&self) -> Vec2 {
        self.renderer.position + self.mouse_pos * self.renderer.view_size
    }

    fn drag_lamp(&mut self, delta: Vec2) {
        self.lamp.set_transform(self.lamp.position() + delta, self.lamp.angle());
        if let Some(light) = self.handler.get_as_mut::<ChainLight>(self.lamp_light) {
            light.translate_chain(delta);
        }
    }

    fn input(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let before = self.cursor_world();
                self.mouse_pos = Vec2::new(
                    position.x as f32 / self.size.width as f32 - 0.5,
                    0.5 - position.y as f32 / self.size.height as f32,
                );
                if self.dragging {
                    let delta = self.cursor_world() - before;
                    self.drag_lamp(delta);
                }
            }
            WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => {
                let pressed = *state == ElementState::Pressed;
                self.dragging = pressed
                    && !self.gui.wants_pointer()
                    && self.cursor_world().distance(self.lamp.position()) < GRAB_RADIUS;
            }
            WindowEvent::KeyboardInput { event: KeyEvent { physical_key: PhysicalKey::Code(code), state, .. }, .. } => {
                let pressed = *state == ElementState::Pressed;
                match code {
                    KeyCode::KeyW => self.up_pressed = pressed,
                    KeyCode::KeyA => self.left_pressed = pressed,
                    KeyCode::KeyD => self.right_pressed = pressed,
                    KeyCode::KeyS => self.down_pressed = pressed,
                    KeyCode::KeyZ => self.zoom_in_pressed = pressed,
                    KeyCode::KeyX => self.zoom_out_pressed = pressed,
                    _ => (),
                }
            }
            _ => (),
        }
    }

    /// Pushes panel values into the lamp light. A new ray count needs fresh
    /// buffers, so the light is rebuilt under the same id.
    fn apply_settings(&mut self) {
        let Some(light) = self.handler.get_as_mut::<ChainLight>(self.lamp_light) else {
            return;
        };

        if light.ray_num() != self.gui.ray_num {
            let coords: Vec<f32> = light.chain().points().iter().flat_map(|p| [p.x, p.y]).collect();
            let def = ChainLightDef {
                ray_num: self.gui.ray_num,
                distance: self.gui.distance,
                color: self.gui.light_color(),
                soft: self.gui.soft,
                soft_shadow_length: self.gui.soft_shadow_length,
                xray: self.gui.xray,
                static_light: self.gui.static_light,
                ignore_attached_body: true,
                ..ChainLightDef::default()
            };
            match ChainLight::new(&def, self.lamp.position(), &coords) {
                Ok(mut rebuilt) => {
                    rebuilt.attach_to_body(self.lamp.clone(), Vec2::ZERO);
                    self.handler.replace(self.lamp_light, Box::new(rebuilt));
                }
                Err(e) => log::warn!("could not rebuild lamp light: {}", e),
            }
            return;
        }

        if light.distance() != self.gui.distance {
            if let Err(e) = light.set_distance(self.gui.distance) {
                log::warn!("{}", e);
            }
        }
        if light.soft_shadow_length() != self.gui.soft_shadow_length {
            if let Err(e) = light.set_soft_shadow_length(self.gui.soft_shadow_length) {
                log::warn!("{}", e);
            }
        }
        let color = self.gui.light_color();
        if light.color() != color {
            light.set_color(color);
        }
        if light.is_soft() != self.gui.soft {
            light.set_soft(self.gui.soft);
        }
        if light.is_xray() != self.gui.xray {
            light.set_xray(self.gui.xray);
        }
        if light.is_static() != self.gui.static_light {
            light.set_static(self.gui.static_light);
        }
    }

    fn update(&mut self, frame_time: f32) {
        let mut d = Vec2::ZERO;
        if self.up_pressed { d += Vec2::Y; }
        if self.left_pressed { d -= Vec2::X; }
        if self.right_pressed { d += Vec2::X; }
        if self.down_pressed { d -= Vec2::Y; }
        d *= 0.5 * self.renderer.view_size.x * frame_time;
        let mut z = 1.0;
        if self.zoom_in_pressed { z *= 0.5f32.powf(frame_time); }
        if self.zoom_out_pressed { z /= 0.5f32.powf(frame_time); }
        self.renderer.position += d;
        self.renderer.view_size *= z;

        for (body, speed) in &self.spinners {
            body.set_transform(body.position(), body.angle() + speed * frame_time);
        }

        self.apply_settings();
        self.handler.config.culling = self.gui.culling;
        self.handler.set_view(self.renderer.position, self.renderer.view_size);
        self.handler.update(Some(&self.world));

        let lit = self.handler.point_at_light(self.cursor_world());
        self.gui.update_cursor(lit);
        self.gui.update_lights(self.handler.lights_rendered_last_frame(), self.handler.len());
    }

    fn render(&mut self) -> Result<(), String> {
        let present_mode = self.gui.present_mode();
        if present_mode != self.config.present_mode {
            self.config.present_mode = present_mode;
            self.surface.configure(&self.device, &self.config);
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(e) => return Err(format!("Failed to acquire next swap chain texture: {}", e)),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        self.outlines.clear();
        self.world.outlines(&mut self.outlines);
        self.renderer.render(&self.device, &self.queue, &mut encoder, &view, &self.handler, &self.outlines);

        let gui_buffers = self.gui.render(&self.window, &self.device, &self.queue, &mut encoder, &view);

        self.queue.submit(gui_buffers.into_iter().chain(std::iter::once(encoder.finish())));
        frame.present();

        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let event_loop = EventLoop::new()?;
    let window = Arc::new(WindowBuilder::new()
        .with_title("Chain light")
        .with_inner_size(WINDOW_SIZE)
        .build(&event_loop)?);

    let mut state = pollster::block_on(State::new(window.clone()))?;
    let mut last_frame_inst = Instant::now();
    let (mut frame_count, mut accum_time) = (0, 0.0);

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, ref event } if window_id == state.window.id() => {
            let gui_captured = state.gui.input(&state.window, event);
            match event {
                WindowEvent::CloseRequested
                | WindowEvent::KeyboardInput {
                    event: KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                    ..
                } => elwt.exit(),
                WindowEvent::Resized(physical_size) => state.resize(*physical_size),
                WindowEvent::RedrawRequested => {
                    let frame_time = last_frame_inst.elapsed().as_secs_f32();
                    accum_time += frame_time;
                    last_frame_inst = Instant::now();
                    frame_count += 1;
                    if frame_count == 60 {
                        state.gui.update_fps(frame_count as f32 / accum_time);
                        accum_time = 0.0;
                        frame_count = 0;
                    }

                    state.update(frame_time);
                    if let Err(e) = state.render() {
                        log::error!("{}", e);
                    }
                }
                _ => if !gui_captured {
                    state.input(event);
                }
            }
        }
        Event::AboutToWait => state.window.request_redraw(),
        _ => {}
    })?;
    Ok(())
}
