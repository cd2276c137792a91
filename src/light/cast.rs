use crate::world::{BodyId, FixtureData, Filter, RayCastControl, RayCastWorld, RayHit};

use super::rays::RaySet;

/// Which fixtures a light's rays are allowed to stop at.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct OccluderFilter {
    pub contact_filter: Option<Filter>,
    pub ignored_body: Option<BodyId>,
}

impl OccluderFilter {
    fn blocks(&self, fixture: &FixtureData) -> bool {
        if fixture.sensor {
            return false;
        }
        if let Some(filter) = &self.contact_filter {
            if !filter.collides_with(&fixture.filter) {
                return false;
            }
        }
        self.ignored_body != Some(fixture.body)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CastStats {
    pub occluded: usize,
    pub clamped: usize,
}

/// Casts every ray of `rays` into `world`, keeping the closest blocking
/// fraction of each. Without a world every ray reaches its end.
pub(crate) fn cast_rays(rays: &mut RaySet, world: Option<&dyn RayCastWorld>, filter: &OccluderFilter) -> CastStats {
    let mut stats = CastStats::default();
    for ray in rays.rays_mut() {
        ray.set_fraction(1.0);
        let Some(world) = world else {
            continue;
        };

        let mut closest = 1.0f32;
        let mut clamped = false;
        world.ray_cast(
            &mut |hit: &RayHit<'_>| {
                if hit.fraction.is_nan() || !filter.blocks(hit.fixture) {
                    return RayCastControl::Ignore;
                }
                let fraction = hit.fraction.clamp(0.0, 1.0);
                if fraction != hit.fraction {
                    clamped = true;
                }
                closest = closest.min(fraction);
                if closest <= 0.0 {
                    RayCastControl::Terminate
                } else {
                    RayCastControl::Clip(closest)
                }
            },
            ray.start,
            ray.end,
        );

        if clamped {
            stats.clamped += 1;
        }
        if closest < 1.0 {
            stats.occluded += 1;
            ray.set_fraction(closest);
        }
    }
    stats
}
