use thiserror::Error;

use crate::{gpu, FrameStage, KernelKind};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("couldn't allocate `{label}` ({size} bytes): {reason}")]
    Allocation {
        label: String,
        size: usize,
        reason: String,
    },

    #[error("`{0}` has not been allocated yet")]
    Unallocated(String),

    #[error(
        "access to `{label}` at offset {offset} (len={len}) exceeds its \
         capacity of {capacity} bytes"
    )]
    OutOfBounds {
        label: String,
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("readback failed: {0}")]
    Readback(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error(
        "pass {0} is out of range (at most {max} passes are supported)",
        max = gpu::MAX_PASSES
    )]
    PassOutOfRange(usize),

    #[error("kernel {0:?} has not been built")]
    KernelMissing(KernelKind),

    #[error("kernel {kernel:?} got dispatched with arguments for {got:?}")]
    KernelMismatch { kernel: KernelKind, got: KernelKind },

    #[error("expected pipeline to be at {expected:?}, but it's at {actual:?}")]
    UnexpectedStage {
        expected: FrameStage,
        actual: FrameStage,
    },

    #[error("pipeline has faulted during an earlier frame")]
    Faulted,
}
