//! Contracts between the lights and the collaborators they do not own: the
//! physics world they cast rays into, the bodies they follow and the view
//! bound they are culled against.

use glam::Vec2;

/// Collision filter data, with Box2D semantics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    pub category_bits: u16,
    pub mask_bits: u16,
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl Filter {
    pub fn new(category_bits: u16, mask_bits: u16, group_index: i16) -> Self {
        Self {
            category_bits,
            mask_bits,
            group_index,
        }
    }

    /// A shared non-zero group overrides the bits: positive groups always
    /// collide, negative groups never do.
    pub fn collides_with(&self, other: &Filter) -> bool {
        if self.group_index != 0 && self.group_index == other.group_index {
            return self.group_index > 0;
        }
        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

/// What a ray learns about the fixture it hit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FixtureData {
    pub body: BodyId,
    pub filter: Filter,
    pub sensor: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct RayHit<'a> {
    pub fraction: f32,
    pub point: Vec2,
    pub normal: Vec2,
    pub fixture: &'a FixtureData,
}

/// Answer of a ray cast callback, telling the world how to go on.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RayCastControl {
    /// Keep searching with the current clip fraction.
    Continue,
    /// Pretend this fixture was not there.
    Ignore,
    /// Only report hits closer than this fraction from now on.
    Clip(f32),
    /// Stop the cast.
    Terminate,
}

/// Physics ray cast primitive. The callback is invoked once per fixture
/// intersecting the segment `start..end`, in no particular order.
pub trait RayCastWorld {
    fn ray_cast(
        &self,
        callback: &mut dyn FnMut(&RayHit<'_>) -> RayCastControl,
        start: Vec2,
        end: Vec2,
    );
}

/// Pose of a rigid body a light can be attached to.
pub trait BodyPose {
    fn id(&self) -> BodyId;
    fn position(&self) -> Vec2;
    /// Radians, counter-clockwise.
    fn angle(&self) -> f32;
}

/// Visibility oracle consulted once per frame per light when culling is on.
pub trait ViewBounds {
    fn intersects(&self, x: f32, y: f32, radius: f32) -> bool;
}
