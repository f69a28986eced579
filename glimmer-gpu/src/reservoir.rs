use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4, Vec4Swizzles};

/// Light-transport sample found by the manifold solver.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ManifoldSample {
    /// Vertex on the specular surface (xyz) and specular shape id (w, bits).
    pub vertex: Vec4,

    /// Path throughput (xyz) and the target function at this sample (w).
    pub thp: Vec4,
}

impl ManifoldSample {
    pub fn new(vertex: Vec3, shape_id: u32, thp: Vec3, p_hat: f32) -> Self {
        Self {
            vertex: vertex.extend(f32::from_bits(shape_id)),
            thp: thp.extend(p_hat),
        }
    }

    pub fn vertex(&self) -> Vec3 {
        self.vertex.xyz()
    }

    pub fn shape_id(&self) -> u32 {
        self.vertex.w.to_bits()
    }

    pub fn thp(&self) -> Vec3 {
        self.thp.xyz()
    }

    pub fn p_hat(&self) -> f32 {
        self.thp.w
    }
}

/// Per-pixel weighted-sample holder used for resampled importance sampling.
///
/// The orchestrator treats this as an opaque payload; the methods here exist
/// for kernels (and host-side references of kernels) that combine reservoirs.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Reservoir {
    pub sample: ManifoldSample,
    pub w_sum: f32,
    pub m: f32,
    pub w: f32,

    /// Number of solver iterations it took to find `sample`.
    pub iterations: u32,
}

impl Reservoir {
    pub fn new(sample: ManifoldSample, weight: f32) -> Self {
        Self {
            sample,
            w_sum: weight,
            m: 1.0,
            w: 0.0,
            iterations: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.m <= 0.0
    }

    /// Streams a candidate into the reservoir; `u` is a uniformly distributed
    /// random number from `0.0..1.0`.
    ///
    /// Returns whether the candidate got selected.
    pub fn update(
        &mut self,
        u: f32,
        sample: ManifoldSample,
        weight: f32,
    ) -> bool {
        self.m += 1.0;
        self.w_sum += weight;

        if u * self.w_sum <= weight {
            self.sample = sample;
            true
        } else {
            false
        }
    }

    /// Merges another, already normalized, reservoir into this one.
    pub fn merge(&mut self, u: f32, rhs: &Self, p_hat: f32) -> bool {
        if rhs.is_empty() {
            return false;
        }

        self.m += rhs.m - 1.0;
        self.update(u, rhs.sample, rhs.w * rhs.m * p_hat)
    }

    pub fn normalize(&mut self, p_hat: f32) {
        let t = self.m * p_hat;

        self.w = if t == 0.0 { 0.0 } else { self.w_sum / t };
    }

    /// Caps the confidence of this reservoir, bounding how much a single
    /// historical sample can dominate the ones combined with it.
    pub fn clamp_m(&mut self, max: f32) {
        self.m = self.m.min(max);
    }

    /// Throughput this reservoir contributes to its pixel.
    pub fn contribution(&self) -> Vec3 {
        self.sample.thp() * self.w
    }
}

#[cfg(test)]
mod tests {
    use std::mem;

    use approx::assert_relative_eq;
    use glam::vec3;

    use super::*;

    fn sample(id: u32) -> ManifoldSample {
        ManifoldSample::new(vec3(1.0, 2.0, 3.0), id, vec3(0.5, 0.5, 0.5), 2.0)
    }

    #[test]
    fn layout() {
        assert_eq!(32, mem::size_of::<ManifoldSample>());
        assert_eq!(48, mem::size_of::<Reservoir>());
    }

    #[test]
    fn update() {
        let mut target = Reservoir::default();

        assert!(target.is_empty());
        assert!(target.update(0.5, sample(1), 1.0));
        assert_eq!(1, target.sample.shape_id());

        // 0.9 * (1.0 + 1.0) > 1.0, so the second candidate gets rejected
        assert!(!target.update(0.9, sample(2), 1.0));
        assert_eq!(1, target.sample.shape_id());

        // 0.1 * (2.0 + 1.0) <= 1.0
        assert!(target.update(0.1, sample(3), 1.0));
        assert_eq!(3, target.sample.shape_id());

        assert_eq!(3.0, target.m);
        assert_eq!(3.0, target.w_sum);
    }

    #[test]
    fn merge_and_normalize() {
        let mut history = Reservoir::new(sample(7), 4.0);

        history.m = 40.0;
        history.normalize(2.0);
        history.clamp_m(20.0);

        assert_relative_eq!(history.w, 0.05);
        assert_eq!(20.0, history.m);

        let mut target = Reservoir::new(sample(1), 1.0);

        assert!(target.merge(0.0, &history, 2.0));
        assert_eq!(7, target.sample.shape_id());
        assert_eq!(21.0, target.m);
        assert_relative_eq!(target.w_sum, 1.0 + 0.05 * 20.0 * 2.0);

        assert!(!target.merge(0.0, &Reservoir::default(), 2.0));
    }

    #[test]
    fn normalize_with_zero_pdf() {
        let mut target = Reservoir::new(sample(1), 1.0);

        target.normalize(0.0);

        assert_eq!(0.0, target.w);
        assert_eq!(Vec3::ZERO, target.contribution());
    }
}
