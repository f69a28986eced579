use bytemuck::{Pod, Zeroable};

/// Index of a frame since the last reset.
///
/// Frame zero is special: there's no history yet, so stages that depend on
/// the previous frame (e.g. temporal resampling) must not run.
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Pod, Zeroable,
)]
pub struct Frame(u32);

impl Frame {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn has_history(self) -> bool {
        self.0 != 0
    }

    /// Returns the following frame; saturates at `u32::MAX`, so only a reset
    /// ever gets back to frame zero.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}
