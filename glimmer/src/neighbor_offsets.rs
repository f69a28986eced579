use log::debug;

/// Low-discrepancy offsets within a unit disk, used by spatial resampling
/// to pick neighbors.
///
/// Offsets are generated with an additive recurrence based on the plastic
/// number, keeping only points that fall into the disk, and are stored as
/// signed bytes (scaled by 254); the table is deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighborOffsets {
    offsets: Vec<[i8; 2]>,
}

impl NeighborOffsets {
    const SCALE: f32 = 254.0;

    pub fn new(count: usize) -> Self {
        debug!("Generating neighbor offsets; count={}", count);

        let phi2 = 1.0 / 1.324_718;
        let mut offsets = Vec::with_capacity(count);
        let mut u = 0.5_f32;
        let mut v = 0.5_f32;

        while offsets.len() < count {
            u += phi2;
            v += phi2 * phi2;

            if u >= 1.0 {
                u -= 1.0;
            }

            if v >= 1.0 {
                v -= 1.0;
            }

            let r_sq = (u - 0.5) * (u - 0.5) + (v - 0.5) * (v - 0.5);

            if r_sq > 0.25 {
                continue;
            }

            offsets.push([
                ((u - 0.5) * Self::SCALE) as i8,
                ((v - 0.5) * Self::SCALE) as i8,
            ]);
        }

        Self { offsets }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<[i8; 2]> {
        self.offsets.get(idx).copied()
    }

    pub fn as_slice(&self) -> &[[i8; 2]] {
        &self.offsets
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.offsets)
    }
}
