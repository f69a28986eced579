use bytemuck::{Pod, Zeroable};

/// Diagnostic counters written by a single stage.
///
/// Each stage owns exactly one instance of this struct in its counter buffer;
/// kernels increment the fields atomically when counters are enabled.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Counters {
    /// Number of sampling (or shift-mapping) attempts.
    pub attempts: u32,

    /// Number of attempts that produced a valid manifold solution.
    pub successes: u32,

    /// Total number of solver (Newton) iterations.
    pub solver_iterations: u32,

    /// Total number of Bernoulli trials.
    pub trials: u32,
}

impl Counters {
    /// Number of `u32` counters in the struct.
    pub const LEN: usize = 4;

    /// Size of the struct, in bytes.
    pub const SIZE: usize = Self::LEN * 4;

    pub fn from_words(
        [attempts, successes, solver_iterations, trials]: [u32; 4],
    ) -> Self {
        Self {
            attempts,
            successes,
            solver_iterations,
            trials,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}
