use std::any::Any;
use std::rc::Rc;

use glam::Vec2;

use crate::world::{BodyPose, Filter};

use super::cast::{cast_rays, OccluderFilter};
use super::mesh::LightMesh;
use super::rays::{Chain, RaySet};
use super::{
    pack_color, validate_distance, validate_soft_shadow_length, ChainLightDef, FrameContext, Light,
    LightError, LightRenderData,
};

struct Attachment {
    body: Rc<dyn BodyPose>,
    offset: Vec2,
}

impl Attachment {
    fn world_position(&self) -> Vec2 {
        self.body.position() + Vec2::from_angle(self.body.angle()).rotate(self.offset)
    }
}

/// A light emitted from every point of an open polyline, each ray leaving
/// perpendicular to the segment it starts on.
///
/// The chain lives in world coordinates. The reference position, either
/// set directly or following an attached body, closes the containment
/// polygon and centers the culling circle.
pub struct ChainLight {
    chain: Chain,
    rays: RaySet,
    mesh: LightMesh,
    ray_num: usize,
    distance: f32,
    color: [f32; 4],
    packed_color: u32,
    position: Vec2,
    attachment: Option<Attachment>,
    soft: bool,
    soft_shadow_length: f32,
    xray: bool,
    static_light: bool,
    active: bool,
    culled: bool,
    /// A static light recomputes on its next update while this is set.
    dirty: bool,
    contact_filter: Option<Filter>,
    ignore_attached_body: bool,
    warned_clamped: bool,
}

impl ChainLight {
    /// `coords` are the chain's flattened `x, y` pairs in world space.
    pub fn new(def: &ChainLightDef, position: Vec2, coords: &[f32]) -> Result<Self, LightError> {
        let chain = Chain::new(coords)?;
        let distance = validate_distance(def.distance)?;
        let soft_shadow_length = validate_soft_shadow_length(def.soft_shadow_length)?;
        let rays = RaySet::distribute(&chain, def.ray_num, distance)?;

        let mut light = Self {
            chain,
            rays,
            mesh: LightMesh::new(def.ray_num),
            ray_num: def.ray_num,
            distance,
            color: def.color,
            packed_color: pack_color(def.color),
            position,
            attachment: None,
            soft: def.soft,
            soft_shadow_length,
            xray: def.xray,
            static_light: def.static_light,
            active: def.active,
            culled: false,
            dirty: true,
            contact_filter: def.contact_filter,
            ignore_attached_body: def.ignore_attached_body,
            warned_clamped: false,
        };
        light.assemble();
        log::debug!(
            "chain light with {} rays over {} segments, distance {}",
            light.ray_num,
            light.chain.segment_count(),
            light.distance
        );
        Ok(light)
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Replaces the chain and redistributes the rays along it.
    pub fn set_chain(&mut self, coords: &[f32]) -> Result<(), LightError> {
        let chain = Chain::new(coords)?;
        self.rays = RaySet::distribute(&chain, self.ray_num, self.distance)?;
        self.chain = chain;
        self.dirty = true;
        Ok(())
    }

    /// Shifts the whole chain, keeping its shape.
    pub fn translate_chain(&mut self, offset: Vec2) {
        let chain = self.chain.translated(offset);
        if let Ok(rays) = RaySet::distribute(&chain, self.ray_num, self.distance) {
            self.rays = rays;
            self.chain = chain;
            self.dirty = true;
        }
    }

    pub fn rays(&self) -> &RaySet {
        &self.rays
    }

    pub fn mesh(&self) -> &LightMesh {
        &self.mesh
    }

    pub fn ray_num(&self) -> usize {
        self.ray_num
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Changes the reach of every ray; the rays are redistributed.
    pub fn set_distance(&mut self, distance: f32) -> Result<(), LightError> {
        let distance = validate_distance(distance)?;
        if distance == self.distance {
            return Ok(());
        }
        self.rays = RaySet::distribute(&self.chain, self.ray_num, distance)?;
        self.distance = distance;
        self.dirty = true;
        Ok(())
    }

    pub fn color(&self) -> [f32; 4] {
        self.color
    }

    pub fn set_color(&mut self, color: [f32; 4]) {
        self.color = color;
        self.packed_color = pack_color(color);
        self.dirty = true;
    }

    pub fn is_soft(&self) -> bool {
        self.soft
    }

    pub fn set_soft(&mut self, soft: bool) {
        self.soft = soft;
        self.dirty = true;
    }

    pub fn soft_shadow_length(&self) -> f32 {
        self.soft_shadow_length
    }

    pub fn set_soft_shadow_length(&mut self, length: f32) -> Result<(), LightError> {
        self.soft_shadow_length = validate_soft_shadow_length(length)?;
        self.dirty = true;
        Ok(())
    }

    pub fn is_xray(&self) -> bool {
        self.xray
    }

    pub fn set_xray(&mut self, xray: bool) {
        self.xray = xray;
        self.dirty = true;
    }

    pub fn is_static(&self) -> bool {
        self.static_light
    }

    pub fn set_static(&mut self, static_light: bool) {
        self.static_light = static_light;
        self.dirty = true;
    }

    pub fn set_contact_filter(&mut self, filter: Option<Filter>) {
        self.contact_filter = filter;
        self.dirty = true;
    }

    pub fn set_ignore_attached_body(&mut self, ignore: bool) {
        self.ignore_attached_body = ignore;
        self.dirty = true;
    }

    /// Makes the reference position follow `body`, at `offset` in the
    /// body's frame.
    pub fn attach_to_body(&mut self, body: Rc<dyn BodyPose>, offset: Vec2) {
        let attachment = Attachment { body, offset };
        self.position = attachment.world_position();
        self.attachment = Some(attachment);
        self.dirty = true;
    }

    pub fn detach(&mut self) {
        self.attachment = None;
    }

    pub fn body(&self) -> Option<&Rc<dyn BodyPose>> {
        self.attachment.as_ref().map(|a| &a.body)
    }

    fn occluder_filter(&self) -> OccluderFilter {
        OccluderFilter {
            contact_filter: self.contact_filter,
            ignored_body: match &self.attachment {
                Some(a) if self.ignore_attached_body => Some(a.body.id()),
                _ => None,
            },
        }
    }

    fn penumbra_length(&self) -> Option<f32> {
        (self.soft && !self.xray).then_some(self.soft_shadow_length)
    }

    fn assemble(&mut self) {
        let penumbra = self.penumbra_length();
        self.mesh.assemble(&self.rays, self.packed_color, penumbra);
    }

    fn cast_and_assemble(&mut self, frame: &FrameContext<'_>) {
        let world = if self.xray { None } else { frame.world };
        let filter = self.occluder_filter();
        let stats = cast_rays(&mut self.rays, world, &filter);
        if stats.clamped > 0 && !self.warned_clamped {
            log::warn!("ray cast reported {} fractions outside [0, 1], clamped", stats.clamped);
            self.warned_clamped = true;
        }
        log::trace!("{} of {} rays occluded", stats.occluded, self.ray_num);
        self.assemble();
    }
}

impl Light for ChainLight {
    fn update(&mut self, frame: &FrameContext<'_>) {
        if !self.active {
            return;
        }
        let recompute = !self.static_light || self.dirty;
        if recompute {
            if let Some(attachment) = &self.attachment {
                self.position = attachment.world_position();
            }
        }

        let was_culled = self.culled;
        self.culled = match frame.view {
            Some(view) => !view.intersects(self.position.x, self.position.y, self.culling_radius()),
            None => false,
        };
        if self.culled != was_culled {
            log::trace!("chain light at {} culled: {}", self.position, self.culled);
        }

        if self.static_light {
            // Static lights ignore culling for their one recomputation.
            if self.dirty {
                log::debug!("recomputing static chain light at {}", self.position);
                self.cast_and_assemble(frame);
                self.dirty = false;
            }
            return;
        }
        if self.culled {
            return;
        }
        self.cast_and_assemble(frame);
        self.dirty = false;
    }

    fn render_data(&self) -> Option<LightRenderData<'_>> {
        if !self.active || self.culled {
            return None;
        }
        let penumbra = if self.penumbra_length().is_some() {
            self.mesh.penumbra()
        } else {
            &[]
        };
        Some(LightRenderData {
            lit: self.mesh.lit(),
            penumbra,
        })
    }

    /// Even-odd test against the last computed hits, closed by the
    /// reference position.
    fn contains(&self, point: Vec2) -> bool {
        if self.distance * self.distance <= self.position.distance_squared(point) {
            return false;
        }
        if point == self.position {
            return true;
        }

        let mut inside = false;
        let mut previous = self.position;
        for current in self.rays.hits().chain(std::iter::once(self.position)) {
            let (a, b) = (current, previous);
            if (a.y < point.y && b.y >= point.y) || (a.y >= point.y && b.y < point.y) {
                if (point.y - a.y) / (b.y - a.y) * (b.x - a.x) < point.x - a.x {
                    inside = !inside;
                }
            }
            previous = current;
        }
        inside
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.dirty = true;
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
        self.dirty = true;
    }

    fn is_culled(&self) -> bool {
        self.culled
    }

    fn culling_radius(&self) -> f32 {
        self.distance + self.soft_shadow_length
    }

    fn vertex_capacity(&self) -> usize {
        self.mesh.capacity()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::occluders::{OccluderWorld, Shape};
    use crate::world::{BodyId, ViewBounds};

    struct Pose {
        position: Cell<Vec2>,
        angle: Cell<f32>,
    }

    impl BodyPose for Pose {
        fn id(&self) -> BodyId {
            BodyId(99)
        }

        fn position(&self) -> Vec2 {
            self.position.get()
        }

        fn angle(&self) -> f32 {
            self.angle.get()
        }
    }

    struct Nowhere;

    impl ViewBounds for Nowhere {
        fn intersects(&self, _x: f32, _y: f32, _radius: f32) -> bool {
            false
        }
    }

    fn def(ray_num: usize) -> ChainLightDef {
        ChainLightDef {
            ray_num,
            distance: 5.0,
            ..ChainLightDef::default()
        }
    }

    fn segment_light(ray_num: usize) -> ChainLight {
        ChainLight::new(&def(ray_num), Vec2::new(5.0, 0.0), &[0.0, 0.0, 10.0, 0.0]).unwrap()
    }

    /// A wall across the first ray only, 2 units above the chain.
    fn wall_over_first_ray() -> OccluderWorld {
        let mut world = OccluderWorld::new();
        let body = world.create_body(Vec2::ZERO, 0.0);
        world.add_fixture(&body, Shape::segment(Vec2::new(1.0, 2.0), Vec2::new(4.0, 2.0)));
        world
    }

    #[test]
    fn rejects_invalid_construction() {
        let position = Vec2::ZERO;
        assert_eq!(
            ChainLight::new(&def(0), position, &[0.0, 0.0, 1.0, 0.0]).err(),
            Some(LightError::ZeroRays)
        );
        assert_eq!(
            ChainLight::new(&def(4), position, &[0.0, 0.0]).err(),
            Some(LightError::TooFewPoints(1))
        );
        let negative = ChainLightDef {
            distance: -2.0,
            ..def(4)
        };
        assert!(ChainLight::new(&negative, position, &[0.0, 0.0, 1.0, 0.0]).is_err());
    }

    #[test]
    fn unoccluded_scenario() {
        let mut light = segment_light(2);
        light.update(&FrameContext::default());

        let rays = light.rays().rays();
        assert!(rays[0].start.abs_diff_eq(Vec2::new(2.5, 0.0), 1e-5));
        assert!(rays[1].start.abs_diff_eq(Vec2::new(7.5, 0.0), 1e-5));
        for ray in rays {
            assert!(ray.perp.abs_diff_eq(Vec2::new(0.0, 5.0), 1e-5));
            assert_eq!(ray.hit, ray.end);
            assert_eq!(ray.fraction, 1.0);
        }
    }

    #[test]
    fn occluded_ray_dims_mesh() {
        let world = wall_over_first_ray();
        let mut light = segment_light(2);
        light.update(&FrameContext {
            world: Some(&world),
            view: None,
        });

        assert!((light.rays().rays()[0].fraction - 0.4).abs() < 1e-5);
        assert_eq!(light.rays().rays()[1].fraction, 1.0);

        let data = light.render_data().unwrap();
        assert!((data.lit[1].alpha - 0.6).abs() < 1e-5);
        assert!((data.penumbra[0].alpha - 0.6).abs() < 1e-5);
        assert_eq!(data.penumbra[1].alpha, 0.0);
    }

    #[test]
    fn xray_ignores_occluders() {
        let world = wall_over_first_ray();
        let mut light = segment_light(2);
        light.set_xray(true);
        light.update(&FrameContext {
            world: Some(&world),
            view: None,
        });
        assert!(light.rays().rays().iter().all(|r| r.fraction == 1.0));
        assert!(light.render_data().unwrap().penumbra.is_empty());
    }

    #[test]
    fn reference_position_is_inside() {
        let mut light = segment_light(8);
        light.update(&FrameContext::default());
        assert!(light.contains(light.position()));
        assert!(light.contains(Vec2::new(5.0, 2.0)));
    }

    #[test]
    fn far_points_are_outside() {
        let mut light = segment_light(8);
        light.update(&FrameContext::default());
        assert!(!light.contains(Vec2::new(5.0, 5.0)));
        assert!(!light.contains(Vec2::new(20.0, 1.0)));
        assert!(!light.contains(Vec2::new(5.0, -1.0)));
    }

    #[test]
    fn containment_is_idempotent() {
        let world = wall_over_first_ray();
        let mut light = segment_light(16);
        light.update(&FrameContext {
            world: Some(&world),
            view: None,
        });
        for point in [Vec2::new(2.0, 3.0), Vec2::new(6.0, 1.0), Vec2::new(3.0, 1.0)] {
            assert_eq!(light.contains(point), light.contains(point));
        }
        assert!(light.contains(Vec2::new(5.0, 1.0)));
    }

    #[test]
    fn culled_light_skips_work() {
        let world = wall_over_first_ray();
        let mut light = segment_light(2);
        light.update(&FrameContext {
            world: Some(&world),
            view: Some(&Nowhere),
        });
        assert!(light.is_culled());
        assert!(light.render_data().is_none());
        assert_eq!(light.rays().rays()[0].fraction, 1.0);
        assert_eq!(light.culling_radius(), 5.0 + 2.5);
    }

    #[test]
    fn static_light_freezes_until_moved() {
        let mut world = wall_over_first_ray();
        let mut light = segment_light(2);
        light.set_static(true);
        light.update(&FrameContext {
            world: Some(&world),
            view: None,
        });
        assert!(light.rays().rays()[0].fraction < 1.0);

        world.clear();
        light.update(&FrameContext {
            world: Some(&world),
            view: None,
        });
        assert!(light.rays().rays()[0].fraction < 1.0);

        light.set_position(Vec2::new(5.0, -1.0));
        light.update(&FrameContext {
            world: Some(&world),
            view: None,
        });
        assert_eq!(light.rays().rays()[0].fraction, 1.0);
    }

    #[test]
    fn static_light_recomputes_even_when_culled() {
        let world = wall_over_first_ray();
        let mut light = segment_light(2);
        light.set_static(true);
        light.update(&FrameContext {
            world: Some(&world),
            view: Some(&Nowhere),
        });
        assert!(light.is_culled());
        assert!(light.rays().rays()[0].fraction < 1.0);
    }

    #[test]
    fn attached_light_follows_body() {
        let pose = Rc::new(Pose {
            position: Cell::new(Vec2::new(1.0, 1.0)),
            angle: Cell::new(0.0),
        });
        let mut light = segment_light(2);
        light.attach_to_body(pose.clone(), Vec2::new(2.0, 0.0));
        assert!(light.position().abs_diff_eq(Vec2::new(3.0, 1.0), 1e-5));

        pose.angle.set(std::f32::consts::FRAC_PI_2);
        light.update(&FrameContext::default());
        assert!(light.position().abs_diff_eq(Vec2::new(1.0, 3.0), 1e-5));

        light.detach();
        pose.position.set(Vec2::new(50.0, 50.0));
        light.update(&FrameContext::default());
        assert!(light.position().abs_diff_eq(Vec2::new(1.0, 3.0), 1e-5));
    }

    #[test]
    fn ignores_its_own_body() {
        let mut world = OccluderWorld::new();
        let body = world.create_body(Vec2::ZERO, 0.0);
        world.add_fixture(&body, Shape::segment(Vec2::new(0.0, 2.0), Vec2::new(10.0, 2.0)));

        let mut light = segment_light(2);
        light.attach_to_body(body.clone(), Vec2::new(5.0, 0.0));
        light.update(&FrameContext {
            world: Some(&world),
            view: None,
        });
        assert!(light.rays().rays().iter().all(|r| r.fraction < 1.0));

        light.set_ignore_attached_body(true);
        light.update(&FrameContext {
            world: Some(&world),
            view: None,
        });
        assert!(light.rays().rays().iter().all(|r| r.fraction == 1.0));
    }

    #[test]
    fn redistributes_on_chain_and_distance_change() {
        let mut light = segment_light(2);
        light.set_chain(&[0.0, 0.0, 0.0, 4.0]).unwrap();
        assert!(light.rays().rays()[0].start.abs_diff_eq(Vec2::new(0.0, 1.0), 1e-5));
        assert!(light.rays().rays()[0].perp.abs_diff_eq(Vec2::new(-5.0, 0.0), 1e-5));

        light.set_distance(2.0).unwrap();
        assert!(light.rays().rays()[0].perp.abs_diff_eq(Vec2::new(-2.0, 0.0), 1e-5));

        assert!(light.set_chain(&[1.0]).is_err());
        assert_eq!(light.chain().points().len(), 2);
        assert_eq!(light.rays().len(), 2);
    }

    #[test]
    fn inactive_light_renders_nothing() {
        let mut light = segment_light(2);
        light.set_active(false);
        light.update(&FrameContext::default());
        assert!(light.render_data().is_none());
    }
}
