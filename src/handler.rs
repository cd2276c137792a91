use glam::Vec2;

use crate::light::{FrameContext, Light, LightRenderData};
use crate::world::{RayCastWorld, ViewBounds};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(u32);

#[derive(Clone, Debug, PartialEq)]
pub struct HandlerConfig {
    pub culling: bool,
    /// Linear RGBA light reaching every point regardless of occluders.
    pub ambient: [f32; 4],
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            culling: true,
            ambient: [0.1, 0.1, 0.15, 1.0],
        }
    }
}

/// Axis-aligned camera bound.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub center: Vec2,
    pub size: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: Vec2::ZERO,
            size: Vec2::ONE,
        }
    }
}

impl ViewBounds for Viewport {
    fn intersects(&self, x: f32, y: f32, radius: f32) -> bool {
        let half = 0.5 * self.size;
        let point = Vec2::new(x, y);
        let closest = point.clamp(self.center - half, self.center + half);
        closest.distance_squared(point) <= radius * radius
    }
}

/// Owns the lights of a scene and steps them once per frame.
pub struct LightHandler {
    pub config: HandlerConfig,
    viewport: Viewport,
    lights: Vec<(LightId, Box<dyn Light>)>,
    next_id: u32,
    lights_rendered_last_frame: usize,
}

impl LightHandler {
    pub fn new(config: HandlerConfig) -> Self {
        Self {
            config,
            viewport: Viewport::default(),
            lights: Vec::new(),
            next_id: 0,
            lights_rendered_last_frame: 0,
        }
    }

    pub fn add(&mut self, light: Box<dyn Light>) -> LightId {
        let id = LightId(self.next_id);
        self.next_id += 1;
        self.lights.push((id, light));
        id
    }

    pub fn remove(&mut self, id: LightId) -> Option<Box<dyn Light>> {
        let index = self.lights.iter().position(|(i, _)| *i == id)?;
        Some(self.lights.remove(index).1)
    }

    /// Swaps the light behind `id`, keeping the id.
    pub fn replace(&mut self, id: LightId, light: Box<dyn Light>) -> Option<Box<dyn Light>> {
        let slot = self.lights.iter_mut().find(|(i, _)| *i == id)?;
        Some(std::mem::replace(&mut slot.1, light))
    }

    pub fn get(&self, id: LightId) -> Option<&dyn Light> {
        self.lights.iter().find(|(i, _)| *i == id).map(|(_, l)| l.as_ref())
    }

    pub fn get_mut(&mut self, id: LightId) -> Option<&mut dyn Light> {
        match self.lights.iter_mut().find(|(i, _)| *i == id) {
            Some((_, light)) => Some(light.as_mut()),
            None => None,
        }
    }

    /// Typed access to a light, for properties outside the `Light` contract.
    pub fn get_as<T: Light>(&self, id: LightId) -> Option<&T> {
        self.get(id)?.as_any().downcast_ref()
    }

    pub fn get_as_mut<T: Light>(&mut self, id: LightId) -> Option<&mut T> {
        self.get_mut(id)?.as_any_mut().downcast_mut()
    }

    pub fn lights(&self) -> impl Iterator<Item = (LightId, &dyn Light)> {
        self.lights.iter().map(|(id, l)| (*id, l.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn set_view(&mut self, center: Vec2, size: Vec2) {
        self.viewport = Viewport { center, size };
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Steps every active light against `world`. The world stays borrowed
    /// for the whole call, so every light sees the same snapshot.
    pub fn update(&mut self, world: Option<&dyn RayCastWorld>) {
        let frame = FrameContext {
            world,
            view: if self.config.culling {
                Some(&self.viewport as &dyn ViewBounds)
            } else {
                None
            },
        };
        let mut rendered = 0;
        for (_, light) in self.lights.iter_mut() {
            if !light.is_active() {
                continue;
            }
            light.update(&frame);
            if !light.is_culled() {
                rendered += 1;
            }
        }
        self.lights_rendered_last_frame = rendered;
    }

    pub fn render_data(&self) -> impl Iterator<Item = (LightId, LightRenderData<'_>)> {
        self.lights
            .iter()
            .filter_map(|(id, l)| l.render_data().map(|data| (*id, data)))
    }

    pub fn lights_rendered_last_frame(&self) -> usize {
        self.lights_rendered_last_frame
    }

    pub fn point_at_light(&self, point: Vec2) -> bool {
        self.lights
            .iter()
            .any(|(_, l)| l.is_active() && l.contains(point))
    }

    pub fn point_at_shadow(&self, point: Vec2) -> bool {
        !self.point_at_light(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{ChainLight, ChainLightDef};
    use crate::occluders::{OccluderWorld, Shape};

    fn light_at(x: f32) -> Box<dyn Light> {
        let def = ChainLightDef {
            ray_num: 8,
            distance: 5.0,
            ..ChainLightDef::default()
        };
        Box::new(ChainLight::new(&def, Vec2::new(x + 5.0, 0.0), &[x, 0.0, x + 10.0, 0.0]).unwrap())
    }

    #[test]
    fn viewport_circle_test() {
        let view = Viewport {
            center: Vec2::ZERO,
            size: Vec2::new(10.0, 4.0),
        };
        assert!(view.intersects(0.0, 0.0, 0.1));
        assert!(view.intersects(6.0, 0.0, 1.5));
        assert!(!view.intersects(6.0, 3.0, 1.0));
        assert!(view.intersects(6.0, 3.0, 1.5));
    }

    #[test]
    fn culls_lights_outside_the_view() {
        let mut handler = LightHandler::new(HandlerConfig::default());
        let near = handler.add(light_at(0.0));
        let far = handler.add(light_at(100.0));
        handler.set_view(Vec2::new(5.0, 0.0), Vec2::new(20.0, 20.0));
        handler.update(None);

        assert_eq!(handler.lights_rendered_last_frame(), 1);
        let drawn: Vec<LightId> = handler.render_data().map(|(id, _)| id).collect();
        assert_eq!(drawn, vec![near]);
        assert!(handler.get(far).unwrap().is_culled());

        handler.config.culling = false;
        handler.update(None);
        assert_eq!(handler.lights_rendered_last_frame(), 2);
    }

    #[test]
    fn point_queries_cover_all_lights() {
        let mut handler = LightHandler::new(HandlerConfig {
            culling: false,
            ..HandlerConfig::default()
        });
        handler.add(light_at(0.0));
        handler.add(light_at(20.0));
        handler.update(None);

        assert!(handler.point_at_light(Vec2::new(5.0, 1.0)));
        assert!(handler.point_at_light(Vec2::new(25.0, 1.0)));
        assert!(handler.point_at_shadow(Vec2::new(15.0, 1.0)));
    }

    #[test]
    fn update_uses_the_given_world() {
        let mut world = OccluderWorld::new();
        let body = world.create_body(Vec2::ZERO, 0.0);
        world.add_fixture(&body, Shape::segment(Vec2::new(-1.0, 1.0), Vec2::new(11.0, 1.0)));

        let mut handler = LightHandler::new(HandlerConfig::default());
        let id = handler.add(light_at(0.0));
        handler.set_view(Vec2::ZERO, Vec2::splat(50.0));
        handler.update(Some(&world));

        let light = handler.get_as::<ChainLight>(id).unwrap();
        assert!(light.rays().rays().iter().all(|r| (r.fraction - 0.2).abs() < 1e-5));
    }

    #[test]
    fn remove_and_replace_by_id() {
        let mut handler = LightHandler::new(HandlerConfig::default());
        let a = handler.add(light_at(0.0));
        let b = handler.add(light_at(10.0));
        assert!(handler.replace(a, light_at(30.0)).is_some());
        assert_eq!(handler.get(a).unwrap().position(), Vec2::new(35.0, 0.0));
        assert!(handler.remove(b).is_some());
        assert!(handler.remove(b).is_none());
        assert_eq!(handler.len(), 1);
        assert!(handler.get_as_mut::<ChainLight>(a).is_some());
    }

    #[test]
    fn inactive_lights_are_skipped() {
        let mut handler = LightHandler::new(HandlerConfig {
            culling: false,
            ..HandlerConfig::default()
        });
        let id = handler.add(light_at(0.0));
        handler.get_mut(id).unwrap().set_active(false);
        handler.update(None);
        assert_eq!(handler.lights_rendered_last_frame(), 0);
        assert!(handler.point_at_shadow(Vec2::new(5.0, 1.0)));
        assert_eq!(handler.render_data().count(), 0);
    }
}
