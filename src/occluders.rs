//! A small rigid-body occluder world: bodies with a pose and a list of
//! segment, circle and polygon fixtures, answering ray casts by brute force.

use std::cell::Cell;
use std::rc::Rc;

use glam::Vec2;

use crate::world::{BodyId, BodyPose, Filter, FixtureData, RayCastControl, RayCastWorld, RayHit};

const CIRCLE_OUTLINE_SEGMENTS: usize = 24;

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Segment { a: Vec2, b: Vec2 },
    Circle { center: Vec2, radius: f32 },
    /// Closed loop, vertices in order.
    Polygon { vertices: Vec<Vec2> },
}

impl Shape {
    pub fn segment(a: Vec2, b: Vec2) -> Self {
        Shape::Segment { a, b }
    }

    pub fn circle(center: Vec2, radius: f32) -> Self {
        Shape::Circle { center, radius }
    }

    pub fn polygon(vertices: Vec<Vec2>) -> Self {
        Shape::Polygon { vertices }
    }

    /// Axis-aligned box centered on the body origin.
    pub fn rect(half_extents: Vec2) -> Self {
        let Vec2 { x, y } = half_extents;
        Shape::Polygon {
            vertices: vec![
                Vec2::new(-x, -y),
                Vec2::new(x, -y),
                Vec2::new(x, y),
                Vec2::new(-x, y),
            ],
        }
    }
}

/// Interior-mutable pose so lights holding an `Rc` see it move.
#[derive(Debug)]
pub struct RigidBody {
    id: BodyId,
    position: Cell<Vec2>,
    angle: Cell<f32>,
}

impl RigidBody {
    pub fn set_transform(&self, position: Vec2, angle: f32) {
        self.position.set(position);
        self.angle.set(angle);
    }

    pub fn world_point(&self, local: Vec2) -> Vec2 {
        self.position.get() + Vec2::from_angle(self.angle.get()).rotate(local)
    }
}

impl BodyPose for RigidBody {
    fn id(&self) -> BodyId {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.position.get()
    }

    fn angle(&self) -> f32 {
        self.angle.get()
    }
}

struct Fixture {
    shape: Shape,
    data: FixtureData,
}

struct BodyEntry {
    body: Rc<RigidBody>,
    fixtures: Vec<Fixture>,
}

#[derive(Default)]
pub struct OccluderWorld {
    bodies: Vec<BodyEntry>,
    next_body: u32,
}

impl OccluderWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_body(&mut self, position: Vec2, angle: f32) -> Rc<RigidBody> {
        let body = Rc::new(RigidBody {
            id: BodyId(self.next_body),
            position: Cell::new(position),
            angle: Cell::new(angle),
        });
        self.next_body += 1;
        self.bodies.push(BodyEntry {
            body: body.clone(),
            fixtures: Vec::new(),
        });
        body
    }

    /// Adds `shape`, in body-local coordinates, to `body`. Returns the new
    /// fixture's data for filter and sensor tweaks, or `None` when the body
    /// does not belong to this world.
    pub fn add_fixture(&mut self, body: &RigidBody, shape: Shape) -> Option<&mut FixtureData> {
        let entry = self.bodies.iter_mut().find(|e| e.body.id == body.id)?;
        entry.fixtures.push(Fixture {
            shape,
            data: FixtureData {
                body: body.id,
                filter: Filter::default(),
                sensor: false,
            },
        });
        entry.fixtures.last_mut().map(|f| &mut f.data)
    }

    pub fn destroy_body(&mut self, id: BodyId) {
        self.bodies.retain(|e| e.body.id != id);
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
    }

    pub fn bodies(&self) -> impl Iterator<Item = &Rc<RigidBody>> {
        self.bodies.iter().map(|e| &e.body)
    }

    pub fn fixture_count(&self) -> usize {
        self.bodies.iter().map(|e| e.fixtures.len()).sum()
    }

    /// Appends every fixture's outline, in world space, as line segments.
    pub fn outlines(&self, out: &mut Vec<(Vec2, Vec2)>) {
        for entry in &self.bodies {
            let body = &entry.body;
            for fixture in &entry.fixtures {
                match &fixture.shape {
                    Shape::Segment { a, b } => out.push((body.world_point(*a), body.world_point(*b))),
                    Shape::Circle { center, radius } => {
                        let center = body.world_point(*center);
                        let step = std::f32::consts::TAU / CIRCLE_OUTLINE_SEGMENTS as f32;
                        for i in 0..CIRCLE_OUTLINE_SEGMENTS {
                            let a = center + Vec2::from_angle(step * i as f32) * *radius;
                            let b = center + Vec2::from_angle(step * (i + 1) as f32) * *radius;
                            out.push((a, b));
                        }
                    }
                    Shape::Polygon { vertices } => {
                        for (i, v) in vertices.iter().enumerate() {
                            let next = vertices[(i + 1) % vertices.len()];
                            out.push((body.world_point(*v), body.world_point(next)));
                        }
                    }
                }
            }
        }
    }
}

impl RayCastWorld for OccluderWorld {
    fn ray_cast(&self, callback: &mut dyn FnMut(&RayHit<'_>) -> RayCastControl, start: Vec2, end: Vec2) {
        let d = end - start;
        let mut max_fraction = 1.0f32;
        for entry in &self.bodies {
            for fixture in &entry.fixtures {
                let Some((fraction, normal)) = intersect(&entry.body, &fixture.shape, start, d, max_fraction) else {
                    continue;
                };
                let hit = RayHit {
                    fraction,
                    point: start + d * fraction,
                    normal,
                    fixture: &fixture.data,
                };
                match callback(&hit) {
                    RayCastControl::Continue | RayCastControl::Ignore => {}
                    RayCastControl::Clip(f) => {
                        if f > 0.0 {
                            max_fraction = f.min(1.0);
                        }
                    }
                    RayCastControl::Terminate => return,
                }
            }
        }
    }
}

/// Nearest intersection of `p + t * d`, `t` in `[0, max]`, with a fixture.
fn intersect(body: &RigidBody, shape: &Shape, p: Vec2, d: Vec2, max: f32) -> Option<(f32, Vec2)> {
    match shape {
        Shape::Segment { a, b } => ray_segment(p, d, body.world_point(*a), body.world_point(*b), max),
        Shape::Circle { center, radius } => ray_circle(p, d, body.world_point(*center), *radius, max),
        Shape::Polygon { vertices } => {
            let mut best: Option<(f32, Vec2)> = None;
            for (i, v) in vertices.iter().enumerate() {
                let a = body.world_point(*v);
                let b = body.world_point(vertices[(i + 1) % vertices.len()]);
                let limit = best.map_or(max, |(t, _)| t);
                if let Some(hit) = ray_segment(p, d, a, b, limit) {
                    best = Some(hit);
                }
            }
            best
        }
    }
}

fn ray_segment(p: Vec2, d: Vec2, a: Vec2, b: Vec2, max: f32) -> Option<(f32, Vec2)> {
    let e = b - a;
    let denom = d.perp_dot(e);
    if denom.abs() <= f32::EPSILON {
        return None;
    }
    let ap = a - p;
    let t = ap.perp_dot(e) / denom;
    let u = ap.perp_dot(d) / denom;
    if !(0.0..=max).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }
    let mut normal = e.perp().normalize_or_zero();
    if normal.dot(d) > 0.0 {
        normal = -normal;
    }
    Some((t, normal))
}

/// Rays starting inside the circle do not hit it.
fn ray_circle(p: Vec2, d: Vec2, center: Vec2, radius: f32, max: f32) -> Option<(f32, Vec2)> {
    let s = p - center;
    let dd = d.length_squared();
    if dd <= f32::EPSILON {
        return None;
    }
    let b = s.dot(d);
    let c = s.length_squared() - radius * radius;
    let sigma = b * b - dd * c;
    if sigma < 0.0 {
        return None;
    }
    let t = -(b + sigma.sqrt()) / dd;
    if !(0.0..=max).contains(&t) {
        return None;
    }
    Some((t, (s + d * t).normalize_or_zero()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(world: &OccluderWorld, start: Vec2, end: Vec2, control: RayCastControl) -> Vec<f32> {
        let mut fractions = Vec::new();
        world.ray_cast(
            &mut |hit: &RayHit<'_>| {
                fractions.push(hit.fraction);
                match control {
                    RayCastControl::Clip(_) => RayCastControl::Clip(hit.fraction),
                    other => other,
                }
            },
            start,
            end,
        );
        fractions
    }

    #[test]
    fn segment_hit_fraction_and_normal() {
        let mut world = OccluderWorld::new();
        let body = world.create_body(Vec2::ZERO, 0.0);
        world.add_fixture(&body, Shape::segment(Vec2::new(-1.0, 4.0), Vec2::new(1.0, 4.0)));

        let mut normal = Vec2::ZERO;
        world.ray_cast(
            &mut |hit: &RayHit<'_>| {
                normal = hit.normal;
                assert!(hit.point.abs_diff_eq(Vec2::new(0.0, 4.0), 1e-5));
                RayCastControl::Clip(hit.fraction)
            },
            Vec2::ZERO,
            Vec2::new(0.0, 10.0),
        );
        assert!(normal.abs_diff_eq(Vec2::NEG_Y, 1e-5));
        assert_eq!(collect(&world, Vec2::ZERO, Vec2::new(0.0, 10.0), RayCastControl::Continue), vec![0.4]);
        assert!(collect(&world, Vec2::ZERO, Vec2::new(0.0, 3.0), RayCastControl::Continue).is_empty());
    }

    #[test]
    fn circle_and_rotated_box() {
        let mut world = OccluderWorld::new();
        let ball = world.create_body(Vec2::new(5.0, 0.0), 0.0);
        world.add_fixture(&ball, Shape::circle(Vec2::ZERO, 1.0));
        let fractions = collect(&world, Vec2::ZERO, Vec2::new(10.0, 0.0), RayCastControl::Continue);
        assert_eq!(fractions.len(), 1);
        assert!((fractions[0] - 0.4).abs() < 1e-5);

        let mut world = OccluderWorld::new();
        let crate_body = world.create_body(Vec2::new(5.0, 0.0), std::f32::consts::FRAC_PI_4);
        world.add_fixture(&crate_body, Shape::rect(Vec2::splat(1.0)));
        let fractions = collect(&world, Vec2::new(0.0, 0.5), Vec2::new(10.0, 0.5), RayCastControl::Continue);
        assert_eq!(fractions.len(), 1);
        // The near face rises at 45 degrees from the left corner.
        let entry = 5.0 - std::f32::consts::SQRT_2 + 0.5;
        assert!((fractions[0] * 10.0 - entry).abs() < 1e-4);
    }

    #[test]
    fn clipping_hides_farther_fixtures() {
        let mut world = OccluderWorld::new();
        let body = world.create_body(Vec2::ZERO, 0.0);
        world.add_fixture(&body, Shape::segment(Vec2::new(-1.0, 2.0), Vec2::new(1.0, 2.0)));
        world.add_fixture(&body, Shape::segment(Vec2::new(-1.0, 6.0), Vec2::new(1.0, 6.0)));
        world.add_fixture(&body, Shape::segment(Vec2::new(-1.0, 4.0), Vec2::new(1.0, 4.0)));

        let end = Vec2::new(0.0, 10.0);
        assert_eq!(collect(&world, Vec2::ZERO, end, RayCastControl::Continue), vec![0.2, 0.6, 0.4]);
        assert_eq!(collect(&world, Vec2::ZERO, end, RayCastControl::Clip(0.0)), vec![0.2]);
        assert_eq!(collect(&world, Vec2::ZERO, end, RayCastControl::Terminate), vec![0.2]);
    }

    #[test]
    fn fixtures_carry_body_and_filter() {
        let mut world = OccluderWorld::new();
        let body = world.create_body(Vec2::ZERO, 0.0);
        let data = world
            .add_fixture(&body, Shape::segment(Vec2::new(-1.0, 1.0), Vec2::new(1.0, 1.0)))
            .unwrap();
        data.sensor = true;
        data.filter.category_bits = 0x0004;

        let mut seen = None;
        world.ray_cast(
            &mut |hit: &RayHit<'_>| {
                seen = Some(*hit.fixture);
                RayCastControl::Continue
            },
            Vec2::ZERO,
            Vec2::new(0.0, 2.0),
        );
        let seen = seen.unwrap();
        assert_eq!(seen.body, body.id());
        assert!(seen.sensor);
        assert_eq!(seen.filter.category_bits, 0x0004);
    }

    #[test]
    fn foreign_bodies_are_rejected() {
        let mut other = OccluderWorld::new();
        let stranger = other.create_body(Vec2::ZERO, 0.0);
        other.create_body(Vec2::ZERO, 0.0);

        let mut world = OccluderWorld::new();
        let own = world.create_body(Vec2::ZERO, 0.0);
        let second = other.create_body(Vec2::ZERO, 0.0);
        assert!(world.add_fixture(&second, Shape::circle(Vec2::ZERO, 1.0)).is_none());
        assert!(world.add_fixture(&own, Shape::circle(Vec2::ZERO, 1.0)).is_some());
        assert_eq!(world.fixture_count(), 1);

        other.destroy_body(stranger.id());
        assert_eq!(other.bodies().count(), 2);
    }

    #[test]
    fn outlines_follow_body_pose() {
        let mut world = OccluderWorld::new();
        let body = world.create_body(Vec2::new(2.0, 0.0), 0.0);
        world.add_fixture(&body, Shape::rect(Vec2::splat(0.5)));
        world.add_fixture(&body, Shape::circle(Vec2::ZERO, 1.0));

        let mut lines = Vec::new();
        world.outlines(&mut lines);
        assert_eq!(lines.len(), 4 + CIRCLE_OUTLINE_SEGMENTS);
        assert!(lines[0].0.abs_diff_eq(Vec2::new(1.5, -0.5), 1e-5));

        body.set_transform(Vec2::new(0.0, 3.0), 0.0);
        lines.clear();
        world.outlines(&mut lines);
        assert!(lines[0].0.abs_diff_eq(Vec2::new(-0.5, 2.5), 1e-5));
    }
}
