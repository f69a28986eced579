//! Per-frame stage sequence; see [`crate::Pipeline::run_frame()`].

use log::trace;

use crate::{
    gpu, prior_params, prior_threads, Backend, BuildPriorArgs, CounterBuffers,
    CounterStage, Dispatch, FrameInputs, FrameState, InitialSamplingArgs,
    KernelSet, Options, PriorBuilder, ReservoirStore, ResolveArgs, Result,
    Role, SpatialResamplingArgs, SpecularShapesView, TemporalResamplingArgs,
    TraceReceiversArgs,
};

/// Number of bounces receivers are traced through.
const RECEIVER_MAX_DEPTH: u32 = 4;

/// Everything stages operate on during a single frame.
pub struct Stages<'a, B>
where
    B: Backend,
{
    pub kernels: &'a mut KernelSet<B>,
    pub store: &'a mut ReservoirStore<B>,
    pub prior: &'a PriorBuilder<B>,
    pub counters: &'a CounterBuffers<B>,
    pub specular_shapes: Option<SpecularShapesView<'a, B>>,
    pub neighbor_offsets: &'a B::Buffer,
    pub neighbor_offset_count: u32,
    pub debug_output: &'a B::Texture,
    pub final_thp: &'a B::Texture,
    pub options: &'a Options,
    pub frame: &'a FrameState,
    pub inputs: FrameInputs<'a, B>,
}

impl<B> Stages<'_, B>
where
    B: Backend,
{
    pub fn trace_receivers(&mut self, backend: &mut B) -> Result<()> {
        trace!("Tracing receivers");

        let args = TraceReceiversArgs {
            frame: self.frame,
            threads: self.frame.pixel_threads(),
            params: gpu::TraceReceiversPassParams {
                frame_dim: self.frame.frame_dim,
                frame: self.frame.frame.get(),
                max_depth: RECEIVER_MAX_DEPTH,
            },
            vbuffer: self.inputs.vbuffer,
            receivers: self.store.receivers()?,
            debug_output: self.debug_output,
        };

        self.kernels
            .dispatch(backend, Dispatch::TraceReceivers(args))
    }

    pub fn build_prior(&mut self, backend: &mut B, pass: usize) -> Result<()> {
        let args = BuildPriorArgs {
            frame: self.frame,
            pass,
            threads: prior_threads(self.frame, self.options),
            params: prior_params(self.frame, self.options, pass),
            specular_shapes: self.specular_shapes,
            receivers: self.store.receivers()?,
            solution_tiles: self.store.solution_tiles(pass)?,
            counters: self.counters.get(CounterStage::Prior)?,
            debug_output: self.debug_output,
        };

        self.prior.build(backend, self.kernels, args)
    }

    pub fn initial_sampling(
        &mut self,
        backend: &mut B,
        pass: usize,
    ) -> Result<()> {
        trace!("Initial sampling; pass={}", pass);

        let options = self.options;

        let solution_tiles = if options.uses_prior() {
            Some(self.store.solution_tiles(pass)?)
        } else {
            None
        };

        let importance = if options.use_directional {
            self.prior.importance().get().ok()
        } else {
            None
        };

        let args = InitialSamplingArgs {
            frame: self.frame,
            pass,
            threads: self.frame.tile_threads(),
            params: gpu::InitialSamplingPassParams {
                frame_dim: self.frame.frame_dim,
                image_block_dim: options.image_block_dim,
                env_map_blocks: options.env_map_blocks,
                importance_map_dim: options.importance_map_dim,
                frame: self.frame.frame.get(),
                pass_id: pass as u32,
                num_tiles_x: options.num_tiles_x,
                uniform_threshold: options.uniform_threshold,
                prior_threshold: options.prior_threshold,
                alpha: options.alpha,
                flags: options.flags(),
                _pad: 0,
            },
            vbuffer: self.inputs.vbuffer,
            receivers: self.store.receivers()?,
            solution_tiles,
            importance,
            specular_shapes: self.specular_shapes,
            output: self.store.get(pass, Role::Output)?,
            counters: self.counters.get(CounterStage::Initial)?,
            debug_output: self.debug_output,
        };

        self.kernels
            .dispatch(backend, Dispatch::InitialSampling(args))
    }

    pub fn temporal_resampling(
        &mut self,
        backend: &mut B,
        pass: usize,
    ) -> Result<()> {
        trace!("Temporal resampling; pass={}", pass);

        let args = TemporalResamplingArgs {
            frame: self.frame,
            pass,
            threads: self.frame.tile_threads(),
            params: gpu::TemporalResamplingPassParams {
                frame_dim: self.frame.frame_dim,
                frame: self.frame.frame.get(),
                pass_id: pass as u32,
                history_length: self.options.temporal_history_length,
                flags: self.options.flags(),
            },
            motion_vectors: self.inputs.motion_vectors,
            specular_shapes: self.specular_shapes,
            history: self.store.get(pass, Role::Temporal)?,
            output: self.store.get(pass, Role::Output)?,
            counters: self.counters.get(CounterStage::Temporal)?,
            debug_output: self.debug_output,
        };

        self.kernels
            .dispatch(backend, Dispatch::TemporalResampling(args))
    }

    /// Gathers from the pass' current reservoirs into fresh ones.
    ///
    /// Roles get exchanged first, so the reservoirs written so far during
    /// this frame become the input, and the other buffer, cleared, becomes
    /// the output. Either initial or temporal resampling has already written
    /// the output slot during this frame, so the input is never stale.
    pub fn spatial_resampling(
        &mut self,
        backend: &mut B,
        pass: usize,
    ) -> Result<()> {
        trace!("Spatial resampling; pass={}", pass);

        self.store.swap_roles(pass)?;

        let input = self.store.get(pass, Role::Temporal)?;
        let output = self.store.get(pass, Role::Output)?;

        backend.fill_buffer(output, 0)?;

        let args = SpatialResamplingArgs {
            frame: self.frame,
            pass,
            threads: self.frame.tile_threads(),
            params: gpu::SpatialResamplingPassParams {
                frame_dim: self.frame.frame_dim,
                frame: self.frame.frame.get(),
                pass_id: pass as u32,
                neighbor_count: self.options.spatial_neighbor_count,
                gather_radius: self.options.spatial_gather_radius,
                reuse_max_iterations: self.options.reuse_max_iterations,
                neighbor_offset_count: self.neighbor_offset_count,
                flags: self.options.flags(),
                _pad: 0,
            },
            neighbor_offsets: self.neighbor_offsets,
            receivers: self.store.receivers()?,
            specular_shapes: self.specular_shapes,
            input,
            output,
            counters: self.counters.get(CounterStage::Spatial)?,
            debug_output: self.debug_output,
        };

        self.kernels
            .dispatch(backend, Dispatch::SpatialResampling(args))
    }

    /// Combines output reservoirs of passes `0..num_passes`, in that order.
    pub fn resolve(&mut self, backend: &mut B) -> Result<()> {
        trace!("Resolving");

        let num_passes = self.options.num_passes;

        let reservoirs = (0..num_passes)
            .map(|pass| self.store.get(pass, Role::Output))
            .collect::<Result<Vec<_>>>()?;

        let args = ResolveArgs {
            frame: self.frame,
            threads: self.frame.pixel_threads(),
            params: gpu::ResolvePassParams {
                frame_dim: self.frame.frame_dim,
                frame: self.frame.frame.get(),
                num_passes: num_passes as u32,
                flags: self.options.flags(),
                _pad: 0,
            },
            reservoirs,
            counters: self.counters.all()?,
            final_thp: self.final_thp,
            debug_output: self.debug_output,
        };

        self.kernels.dispatch(backend, Dispatch::Resolve(args))
    }
}
