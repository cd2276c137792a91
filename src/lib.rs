//! 2D lights cast from an open polyline: rays spread by arc length along the
//! chain, occluded by a physics world, assembled into triangle strips.

pub mod handler;
pub mod light;
pub mod occluders;
pub mod world;

pub use handler::{HandlerConfig, LightHandler, LightId, Viewport};
pub use light::{ChainLight, ChainLightDef, FrameContext, Light, LightError, LightRenderData, LightVertex};
