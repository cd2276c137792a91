use super::rays::RaySet;

/// One vertex of a light strip, laid out as `[x, y, packed color, alpha]`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Zeroable, bytemuck::Pod)]
pub struct LightVertex {
    pub position: [f32; 2],
    pub color: u32,
    pub alpha: f32,
}

impl LightVertex {
    pub fn new(position: glam::Vec2, color: u32, alpha: f32) -> Self {
        Self {
            position: position.into(),
            color,
            alpha,
        }
    }
}

/// Lit region and penumbra strips of one light. Both buffers hold at most
/// two vertices per ray; their storage is allocated once.
#[derive(Clone, Debug)]
pub struct LightMesh {
    lit: Vec<LightVertex>,
    penumbra: Vec<LightVertex>,
    capacity: usize,
}

impl LightMesh {
    pub fn new(ray_num: usize) -> Self {
        let capacity = 2 * ray_num;
        Self {
            lit: Vec::with_capacity(capacity),
            penumbra: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lit(&self) -> &[LightVertex] {
        &self.lit
    }

    pub fn penumbra(&self) -> &[LightVertex] {
        &self.penumbra
    }

    /// Rebuilds both strips from the current hits. The penumbra reaches
    /// `soft_shadow_length * (1 - fraction)` past each hit and stays empty
    /// when `soft_shadow_length` is `None`.
    pub fn assemble(&mut self, rays: &RaySet, color: u32, soft_shadow_length: Option<f32>) {
        debug_assert!(2 * rays.len() <= self.capacity);

        self.lit.clear();
        for ray in rays.rays() {
            self.lit.push(LightVertex::new(ray.start, color, 1.0));
            self.lit.push(LightVertex::new(ray.hit, color, 1.0 - ray.fraction));
        }

        self.penumbra.clear();
        let Some(length) = soft_shadow_length else {
            return;
        };
        for ray in rays.rays() {
            let s = 1.0 - ray.fraction;
            self.penumbra.push(LightVertex::new(ray.hit, color, s));
            self.penumbra
                .push(LightVertex::new(ray.hit + ray.normal * (length * s), 0, 0.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::light::rays::Chain;

    const COLOR: u32 = 0xC080_C0C0;

    fn rays() -> RaySet {
        let chain = Chain::new(&[0.0, 0.0, 10.0, 0.0]).unwrap();
        RaySet::distribute(&chain, 2, 5.0).unwrap()
    }

    #[test]
    fn vertex_is_four_words() {
        assert_eq!(std::mem::size_of::<LightVertex>(), 16);
        let v = LightVertex::new(Vec2::new(1.0, 2.0), 3, 0.5);
        let words: &[u32] = bytemuck::cast_slice(std::slice::from_ref(&v));
        assert_eq!(words, &[1.0f32.to_bits(), 2.0f32.to_bits(), 3, 0.5f32.to_bits()]);
    }

    #[test]
    fn unoccluded_rays_fade_to_nothing() {
        let rays = rays();
        let mut mesh = LightMesh::new(rays.len());
        mesh.assemble(&rays, COLOR, Some(2.5));

        assert_eq!(mesh.lit().len(), 4);
        assert_eq!(mesh.lit()[0].position, [2.5, 0.0]);
        assert_eq!(mesh.lit()[0].alpha, 1.0);
        assert_eq!(mesh.lit()[1].position, [2.5, 5.0]);
        assert_eq!(mesh.lit()[1].alpha, 0.0);

        // A fully lit ray leaves a zero-length penumbra.
        assert_eq!(mesh.penumbra()[0].position, mesh.penumbra()[1].position);
    }

    #[test]
    fn occluded_ray_alphas() {
        let mut rays = rays();
        rays.rays_mut()[0].set_fraction(0.4);
        let mut mesh = LightMesh::new(rays.len());
        mesh.assemble(&rays, COLOR, Some(2.5));

        let far = mesh.lit()[1];
        assert!((far.alpha - 0.6).abs() < 1e-6);
        assert_eq!(far.color, COLOR);

        let near = mesh.penumbra()[0];
        let tail = mesh.penumbra()[1];
        assert!((near.alpha - 0.6).abs() < 1e-6);
        assert_eq!(near.position, far.position);
        assert_eq!(tail.alpha, 0.0);
        assert_eq!(tail.color, 0);
        let reach = Vec2::from(tail.position) - Vec2::from(near.position);
        assert!(reach.abs_diff_eq(Vec2::new(0.0, 1.5), 1e-5));
    }

    #[test]
    fn no_penumbra_without_soft_shadows() {
        let rays = rays();
        let mut mesh = LightMesh::new(rays.len());
        mesh.assemble(&rays, COLOR, Some(1.0));
        mesh.assemble(&rays, COLOR, None);
        assert!(mesh.penumbra().is_empty());
        assert_eq!(mesh.lit().len(), 4);
    }

    #[test]
    fn rebuilding_keeps_storage() {
        let rays = rays();
        let mut mesh = LightMesh::new(rays.len());
        mesh.assemble(&rays, COLOR, Some(1.0));
        let lit = mesh.lit().as_ptr();
        mesh.assemble(&rays, COLOR, Some(1.0));
        assert_eq!(lit, mesh.lit().as_ptr());
        assert_eq!(mesh.capacity(), 4);
    }
}
