//! Arguments of each kernel, i.e. the I/O contracts of the stages.
//!
//! Buffers are passed by reference and stay owned by the pipeline; kernels
//! must not hold onto them past [`Kernel::dispatch()`](crate::Kernel).

use derivative::Derivative;
use glam::UVec3;

use crate::{gpu, Backend, FrameState, KernelKind, SpecularShapesView};

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub enum Dispatch<'a, B>
where
    B: Backend,
{
    TraceReceivers(TraceReceiversArgs<'a, B>),
    WriteEnvImportance(WriteEnvImportanceArgs<'a, B>),
    BuildPrior(BuildPriorArgs<'a, B>),
    InitialSampling(InitialSamplingArgs<'a, B>),
    TemporalResampling(TemporalResamplingArgs<'a, B>),
    SpatialResampling(SpatialResamplingArgs<'a, B>),
    Resolve(ResolveArgs<'a, B>),
}

impl<B> Dispatch<'_, B>
where
    B: Backend,
{
    pub fn kind(&self) -> KernelKind {
        match self {
            Self::TraceReceivers(_) => KernelKind::TraceReceivers,
            Self::WriteEnvImportance(_) => KernelKind::WriteEnvImportance,
            Self::BuildPrior(_) => KernelKind::BuildPrior,
            Self::InitialSampling(_) => KernelKind::InitialSampling,
            Self::TemporalResampling(_) => KernelKind::TemporalResampling,
            Self::SpatialResampling(_) => KernelKind::SpatialResampling,
            Self::Resolve(_) => KernelKind::Resolve,
        }
    }

    /// Number of invocations this dispatch covers.
    pub fn threads(&self) -> UVec3 {
        match self {
            Self::TraceReceivers(args) => args.threads,
            Self::WriteEnvImportance(args) => args.threads,
            Self::BuildPrior(args) => args.threads,
            Self::InitialSampling(args) => args.threads,
            Self::TemporalResampling(args) => args.threads,
            Self::SpatialResampling(args) => args.threads,
            Self::Resolve(args) => args.threads,
        }
    }
}

/// Traces one receiver per pixel, writing [`gpu::ReceiverInfo`]s into a
/// tile-aligned buffer shared by all of the passes.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct TraceReceiversArgs<'a, B>
where
    B: Backend,
{
    pub frame: &'a FrameState,
    pub threads: UVec3,
    pub params: gpu::TraceReceiversPassParams,
    pub vbuffer: &'a B::Texture,
    pub receivers: &'a B::Buffer,
    pub debug_output: &'a B::Texture,
}

/// Writes average environment radiance of each texel into the importance
/// buffer, laid out block-by-block (raster order within a block).
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct WriteEnvImportanceArgs<'a, B>
where
    B: Backend,
{
    pub threads: UVec3,
    pub params: gpu::WriteEnvImportancePassParams,
    pub importance: &'a B::Buffer,
}

/// Solves manifolds over image blocks, filling the pass' solution tiles
/// (which are pre-filled with [`gpu::SOLUTION_TILE_SENTINEL`]).
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct BuildPriorArgs<'a, B>
where
    B: Backend,
{
    pub frame: &'a FrameState,
    pub pass: usize,
    pub threads: UVec3,
    pub params: gpu::BuildPriorPassParams,
    pub specular_shapes: Option<SpecularShapesView<'a, B>>,
    pub receivers: &'a B::Buffer,
    pub solution_tiles: &'a B::Buffer,
    pub counters: &'a B::Buffer,
    pub debug_output: &'a B::Texture,
}

/// Generates new candidates, overwriting the pass' output reservoirs.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct InitialSamplingArgs<'a, B>
where
    B: Backend,
{
    pub frame: &'a FrameState,
    pub pass: usize,
    pub threads: UVec3,
    pub params: gpu::InitialSamplingPassParams,
    pub vbuffer: &'a B::Texture,
    pub receivers: &'a B::Buffer,

    /// Present only when the prior distribution is in use.
    pub solution_tiles: Option<&'a B::Buffer>,

    /// Present only when directional lighting is in use.
    pub importance: Option<&'a B::Buffer>,

    pub specular_shapes: Option<SpecularShapesView<'a, B>>,
    pub output: &'a B::Buffer,
    pub counters: &'a B::Buffer,
    pub debug_output: &'a B::Texture,
}

/// Combines the pass' output reservoirs (candidates) with its history,
/// writing the result back into `output`.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct TemporalResamplingArgs<'a, B>
where
    B: Backend,
{
    pub frame: &'a FrameState,
    pub pass: usize,
    pub threads: UVec3,
    pub params: gpu::TemporalResamplingPassParams,
    pub motion_vectors: &'a B::Texture,
    pub specular_shapes: Option<SpecularShapesView<'a, B>>,
    pub history: &'a B::Buffer,
    pub output: &'a B::Buffer,
    pub counters: &'a B::Buffer,
    pub debug_output: &'a B::Texture,
}

/// Gathers neighbors of each pixel from `input` into the (zeroed) `output`.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct SpatialResamplingArgs<'a, B>
where
    B: Backend,
{
    pub frame: &'a FrameState,
    pub pass: usize,
    pub threads: UVec3,
    pub params: gpu::SpatialResamplingPassParams,
    pub neighbor_offsets: &'a B::Buffer,
    pub receivers: &'a B::Buffer,
    pub specular_shapes: Option<SpecularShapesView<'a, B>>,
    pub input: &'a B::Buffer,
    pub output: &'a B::Buffer,
    pub counters: &'a B::Buffer,
    pub debug_output: &'a B::Texture,
}

/// Combines output reservoirs of all active passes into the final
/// throughput image.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct ResolveArgs<'a, B>
where
    B: Backend,
{
    pub frame: &'a FrameState,
    pub threads: UVec3,
    pub params: gpu::ResolvePassParams,

    /// Output reservoirs, in ascending pass order.
    pub reservoirs: Vec<&'a B::Buffer>,

    /// Counters of prior, initial, temporal and spatial stages.
    pub counters: [&'a B::Buffer; 4],

    pub final_thp: &'a B::Texture,
    pub debug_output: &'a B::Texture,
}
