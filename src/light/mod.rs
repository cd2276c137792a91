mod cast;
mod chain;
pub mod mesh;
pub mod rays;

use std::any::Any;

use ecolor::Color32;
use glam::Vec2;
use thiserror::Error;

use crate::world::{Filter, RayCastWorld, ViewBounds};

pub use chain::ChainLight;
pub use mesh::{LightMesh, LightVertex};
pub use rays::{Chain, Ray, RaySet};

/// Lights never reach less than this far.
pub const MIN_DISTANCE: f32 = 0.01;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LightError {
    #[error("a chain needs at least two points, got {0}")]
    TooFewPoints(usize),
    #[error("chain coordinates come in x/y pairs, got {0} values")]
    OddCoordinateCount(usize),
    #[error("chain coordinate {index} is not finite")]
    NonFiniteCoordinate { index: usize },
    #[error("a light needs at least one ray")]
    ZeroRays,
    #[error("invalid light distance {0}")]
    InvalidDistance(f32),
    #[error("invalid soft shadow length {0}")]
    InvalidSoftShadowLength(f32),
}

/// Everything a light may consult during one frame. The world is borrowed
/// for the whole update so that every ray sees the same snapshot.
#[derive(Clone, Copy, Default)]
pub struct FrameContext<'a> {
    pub world: Option<&'a dyn RayCastWorld>,
    pub view: Option<&'a dyn ViewBounds>,
}

/// Vertex strips ready to be drawn for one light.
#[derive(Clone, Copy, Debug)]
pub struct LightRenderData<'a> {
    pub lit: &'a [LightVertex],
    pub penumbra: &'a [LightVertex],
}

pub trait Light: Any {
    /// Runs the per-frame geometry: pose, culling, casting and assembly.
    fn update(&mut self, frame: &FrameContext<'_>);

    /// `None` while inactive or culled.
    fn render_data(&self) -> Option<LightRenderData<'_>>;

    fn contains(&self, point: Vec2) -> bool;

    fn set_position(&mut self, position: Vec2);

    fn position(&self) -> Vec2;

    fn is_active(&self) -> bool;

    fn set_active(&mut self, active: bool);

    fn is_culled(&self) -> bool;

    /// Radius of the circle handed to the culling oracle.
    fn culling_radius(&self) -> f32;

    /// Upper bound of vertices in either strip.
    fn vertex_capacity(&self) -> usize;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Construction parameters of a chain light.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainLightDef {
    pub ray_num: usize,
    pub distance: f32,
    /// Linear RGBA, alpha scales the intensity.
    pub color: [f32; 4],
    pub soft: bool,
    pub soft_shadow_length: f32,
    pub xray: bool,
    pub static_light: bool,
    pub active: bool,
    pub contact_filter: Option<Filter>,
    pub ignore_attached_body: bool,
}

impl Default for ChainLightDef {
    fn default() -> Self {
        Self {
            ray_num: 64,
            distance: 15.0,
            color: [0.75, 0.75, 0.5, 0.75],
            soft: true,
            soft_shadow_length: 2.5,
            xray: false,
            static_light: false,
            active: true,
            contact_filter: None,
            ignore_attached_body: false,
        }
    }
}

/// Packs a linear RGBA color into the `u32` carried by every vertex.
pub fn pack_color(color: [f32; 4]) -> u32 {
    let [r, g, b, a] = color.map(ecolor::linear_u8_from_linear_f32);
    u32::from_le_bytes(Color32::from_rgba_premultiplied(r, g, b, a).to_array())
}

pub(crate) fn validate_distance(distance: f32) -> Result<f32, LightError> {
    if !distance.is_finite() || distance < 0.0 {
        return Err(LightError::InvalidDistance(distance));
    }
    Ok(distance.max(MIN_DISTANCE))
}

pub(crate) fn validate_soft_shadow_length(length: f32) -> Result<f32, LightError> {
    if !length.is_finite() || length < 0.0 {
        return Err(LightError::InvalidSoftShadowLength(length));
    }
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_white_and_transparent() {
        assert_eq!(pack_color([1.0, 1.0, 1.0, 1.0]), 0xFFFF_FFFF);
        assert_eq!(pack_color([0.0, 0.0, 0.0, 0.0]), 0);
    }

    #[test]
    fn packs_red_into_low_byte() {
        assert_eq!(pack_color([1.0, 0.0, 0.0, 1.0]), 0xFF00_00FF);
    }

    #[test]
    fn small_distances_are_raised() {
        assert_eq!(validate_distance(0.0), Ok(MIN_DISTANCE));
        assert_eq!(validate_distance(3.0), Ok(3.0));
        assert!(validate_distance(-1.0).is_err());
        assert!(validate_distance(f32::NAN).is_err());
    }
}
