//! Arc-length ray distribution along a chain.
//!
//! Rays are spread by travelled distance, not by vertex index, so a chain
//! with one long and many short segments still gets evenly spaced rays.
//!
//! ```text
//! |--------|------|-----------|   segments
//! |---|---|---|---|---|---|---|   ray spacing
//!   ^   ^   ^   ^   ^   ^   ^     ray starts, half a spacing in
//! ```

use glam::Vec2;

use super::LightError;

/// Segments shorter than this have no usable direction.
const DEGENERATE_LENGTH: f32 = 1e-6;

/// An open polyline, at least one segment long.
#[derive(Clone, Debug, PartialEq)]
pub struct Chain {
    points: Vec<Vec2>,
}

impl Chain {
    /// Builds a chain from flattened `x, y` pairs.
    pub fn new(coords: &[f32]) -> Result<Self, LightError> {
        if coords.len() % 2 != 0 {
            return Err(LightError::OddCoordinateCount(coords.len()));
        }
        if let Some(index) = coords.iter().position(|c| !c.is_finite()) {
            return Err(LightError::NonFiniteCoordinate { index });
        }
        let points = coords
            .chunks_exact(2)
            .map(|pair| Vec2::new(pair[0], pair[1]))
            .collect();
        Self::from_points(points)
    }

    pub fn from_points(points: Vec<Vec2>) -> Result<Self, LightError> {
        if points.len() < 2 {
            return Err(LightError::TooFewPoints(points.len()));
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(LightError::NonFiniteCoordinate { index: index * 2 });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn segment_count(&self) -> usize {
        self.points.len() - 1
    }

    /// Total arc length.
    pub fn length(&self) -> f32 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    pub fn translated(&self, offset: Vec2) -> Self {
        Self {
            points: self.points.iter().map(|p| *p + offset).collect(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray {
    pub start: Vec2,
    /// Unit perpendicular of the segment the ray leaves from.
    pub normal: Vec2,
    /// `normal * distance`.
    pub perp: Vec2,
    pub end: Vec2,
    pub hit: Vec2,
    pub fraction: f32,
}

impl Ray {
    fn unoccluded(start: Vec2, normal: Vec2, distance: f32) -> Self {
        let perp = normal * distance;
        let end = start + perp;
        Self {
            start,
            normal,
            perp,
            end,
            hit: end,
            fraction: 1.0,
        }
    }

    pub fn set_fraction(&mut self, fraction: f32) {
        self.fraction = fraction;
        self.hit = if fraction >= 1.0 {
            self.end
        } else {
            self.start + (self.end - self.start) * fraction
        };
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct SegmentCache {
    origin: Vec2,
    length: f32,
    direction: Vec2,
}

/// The fixed-size fan of rays of one light, plus the per-segment data it
/// was distributed from.
#[derive(Clone, Debug, PartialEq)]
pub struct RaySet {
    rays: Vec<Ray>,
    segments: Vec<SegmentCache>,
    arc_length: f32,
    spacing: f32,
}

impl RaySet {
    /// Spreads `ray_num` rays along `chain`, each pointing along the +90°
    /// rotation of its segment and reaching `distance`. All rays start out
    /// unoccluded.
    pub fn distribute(chain: &Chain, ray_num: usize, distance: f32) -> Result<Self, LightError> {
        if ray_num == 0 {
            return Err(LightError::ZeroRays);
        }
        let segments = segment_caches(chain.points());
        let arc_length: f32 = segments.iter().map(|s| s.length).sum();
        let spacing = arc_length / ray_num as f32;
        let last = segments.len() - 1;

        let mut rays = Vec::with_capacity(ray_num);
        let mut segment = 0;
        let mut updating = usize::MAX;
        let mut normal = Vec2::ZERO;
        let mut step = 0.5 * spacing;
        for _ in 0..ray_num {
            while segment < last && step > segments[segment].length {
                step -= segments[segment].length;
                segment += 1;
            }
            let current = &segments[segment];
            if updating != segment {
                updating = segment;
                normal = current.direction.perp();
            }
            let along = step.min(current.length);
            let start = current.origin + current.direction * along;
            rays.push(Ray::unoccluded(start, normal, distance));
            step += spacing;
        }

        log::debug!(
            "distributed {} rays over {} segments, arc length {:.3}",
            ray_num,
            segments.len(),
            arc_length
        );
        Ok(Self {
            rays,
            segments,
            arc_length,
            spacing,
        })
    }

    pub fn len(&self) -> usize {
        self.rays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rays.is_empty()
    }

    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }

    pub fn rays_mut(&mut self) -> &mut [Ray] {
        &mut self.rays
    }

    pub fn arc_length(&self) -> f32 {
        self.arc_length
    }

    /// Arc length between consecutive ray starts.
    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn segment_lengths(&self) -> impl Iterator<Item = f32> + '_ {
        self.segments.iter().map(|s| s.length)
    }

    pub fn hits(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.rays.iter().map(|r| r.hit)
    }
}

/// Lengths and unit directions of every segment. A degenerate segment
/// borrows the direction of the closest non-degenerate segment before it,
/// or after it when there is none before; a fully degenerate chain points
/// along +X.
fn segment_caches(points: &[Vec2]) -> Vec<SegmentCache> {
    let mut segments: Vec<SegmentCache> = Vec::with_capacity(points.len() - 1);
    let mut previous: Option<Vec2> = None;
    for w in points.windows(2) {
        let delta = w[1] - w[0];
        let length = delta.length();
        let direction = if length > DEGENERATE_LENGTH {
            Some(delta / length)
        } else {
            previous
        };
        previous = direction.or(previous);
        segments.push(SegmentCache {
            origin: w[0],
            length,
            direction: direction.unwrap_or(Vec2::ZERO),
        });
    }

    let first = segments
        .iter()
        .find(|s| s.length > DEGENERATE_LENGTH)
        .map(|s| s.direction)
        .unwrap_or(Vec2::X);
    for s in segments.iter_mut().take_while(|s| s.length <= DEGENERATE_LENGTH) {
        s.direction = first;
    }
    segments
}
