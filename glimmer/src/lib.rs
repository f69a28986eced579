//! Glimmer: orchestration of a multi-pass spatiotemporal reservoir-resampling
//! pipeline for specular (caustic) light transport.
//!
//! Once per frame the [`Pipeline`] traces receivers, optionally builds a prior
//! distribution of manifold solutions, runs independent resampling passes
//! (initial, temporal, spatial) and finally resolves all passes into a single
//! throughput image. The kernels themselves are opaque: they're injected
//! through [`KernelFactory`] and talk to the device through [`Backend`].

mod backend;
mod buffers;
mod counters;
mod error;
mod frame;
mod importance;
mod kernels;
mod neighbor_offsets;
mod options;
mod pipeline;
mod prior;
mod reservoir_store;
mod scene;
mod specular_shapes;
mod stages;
mod utils;

#[cfg(test)]
mod testing;

pub use glimmer_gpu as gpu;

pub use self::backend::*;
pub use self::buffers::*;
pub use self::counters::*;
pub use self::error::*;
pub use self::frame::*;
pub use self::importance::*;
pub use self::kernels::*;
pub use self::neighbor_offsets::*;
pub use self::options::*;
pub use self::pipeline::*;
pub use self::prior::*;
pub use self::reservoir_store::*;
pub use self::scene::*;
pub use self::specular_shapes::*;
pub use self::utils::*;
