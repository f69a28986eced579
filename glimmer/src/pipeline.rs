use derivative::Derivative;
use glam::UVec2;
use log::{debug, error, info};
use rand::Rng;

use crate::stages::Stages;
use crate::{
    gpu, importance_layout, Backend, CounterBuffers, CounterReport, Error,
    FrameInputs, FrameStage, FrameState, FrameTexture, GrowableBuffer,
    ImportanceField, KernelDefines, KernelFactory, KernelSet, NeighborOffsets,
    Options, PriorBuilder, ReservoirStore, Result, Scene, SpecularShapes,
};

/// Multi-pass spatiotemporal reservoir-resampling pipeline.
///
/// Each frame goes through [`Self::begin_frame()`], [`Self::run_frame()`]
/// and [`Self::end_frame()`], in that order:
///
/// - `begin_frame()` rebuilds kernels (if options changed) and makes sure
///   all of the buffers are large enough,
/// - `run_frame()` traces receivers, runs passes one after another (prior,
///   initial, temporal, spatial) and resolves them,
/// - `end_frame()` turns the passes' output into history for the next frame.
///
/// Any error raised while a frame is in flight leaves the pipeline faulted.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct Pipeline<B>
where
    B: Backend,
{
    options: Options,
    #[derivative(Debug = "ignore")]
    factory: Box<dyn KernelFactory<B>>,
    kernels: KernelSet<B>,
    store: ReservoirStore<B>,
    prior: PriorBuilder<B>,
    counters: CounterBuffers<B>,
    specular_shapes: SpecularShapes<B>,
    neighbor_offsets: NeighborOffsets,
    neighbor_offsets_buffer: GrowableBuffer<B>,
    debug_output: FrameTexture<B>,
    final_thp: FrameTexture<B>,
    restir_params: gpu::ReStirParams,
    frame: gpu::Frame,
    frame_state: Option<FrameState>,
    stage: FrameStage,
    has_env_map: bool,
}

impl<B> Pipeline<B>
where
    B: Backend,
{
    pub fn new(
        scene: &dyn Scene,
        options: Options,
        factory: impl KernelFactory<B> + 'static,
    ) -> Result<Self> {
        options.validate()?;

        info!("Creating pipeline; num_passes={}", options.num_passes);

        let mut specular_shapes = SpecularShapes::new();

        specular_shapes.scan(scene);

        Ok(Self {
            options,
            factory: Box::new(factory),
            kernels: KernelSet::new(),
            store: ReservoirStore::new(),
            prior: PriorBuilder::new(),
            counters: CounterBuffers::new(),
            specular_shapes,
            neighbor_offsets: NeighborOffsets::new(gpu::NEIGHBOR_OFFSET_COUNT),
            neighbor_offsets_buffer: GrowableBuffer::of::<[i8; 2]>(
                "glimmer_neighbor_offsets",
            ),
            debug_output: FrameTexture::new("glimmer_debug_output"),
            final_thp: FrameTexture::new("glimmer_final_thp"),
            restir_params: Default::default(),
            frame: Default::default(),
            frame_state: None,
            stage: FrameStage::Idle,
            has_env_map: false,
        })
    }

    /// Applies new options.
    ///
    /// If anything has changed, kernels get marked for rebuilding (which
    /// happens during the next [`Self::begin_frame()`] and recreates only
    /// the kernels that actually need it) and the frame index gets reset.
    /// Buffers are left intact.
    ///
    /// Returns whether anything has changed.
    pub fn configure(&mut self, options: Options) -> Result<bool> {
        self.expect_stage(FrameStage::Idle)?;

        options.validate()?;

        let changes = self.options.changes(&options);

        if changes.is_empty() {
            return Ok(false);
        }

        info!("Options changed: {}", changes.join(", "));

        self.options = options;
        self.kernels.mark_dirty();
        self.frame = Default::default();

        Ok(true)
    }

    pub fn begin_frame(
        &mut self,
        backend: &mut B,
        scene: &mut dyn Scene,
        frame_dim: UVec2,
        screen_tiles: UVec2,
    ) -> Result<()> {
        self.expect_stage(FrameStage::Idle)?;

        // Invalid arguments are rejected without faulting
        if frame_dim.cmpeq(UVec2::ZERO).any() {
            return Err(Error::InvalidFrame(format!(
                "frame size must be non-zero, got {frame_dim}"
            )));
        }

        if (screen_tiles * gpu::SCREEN_TILE_DIM).cmplt(frame_dim).any() {
            return Err(Error::InvalidFrame(format!(
                "screen tiles {screen_tiles} don't cover frame of size \
                 {frame_dim}"
            )));
        }

        let result =
            self.try_begin_frame(backend, scene, frame_dim, screen_tiles);

        self.fault_on(result)
    }

    fn try_begin_frame(
        &mut self,
        backend: &mut B,
        scene: &mut dyn Scene,
        frame_dim: UVec2,
        screen_tiles: UVec2,
    ) -> Result<()> {
        if scene.uses_emissive_lights() {
            scene.refresh_emissive_lights();
        }

        self.has_env_map = scene.has_env_map();

        if self.kernels.is_dirty() {
            let defines =
                KernelDefines::new(&self.options, self.neighbor_offsets.len());

            let built = self.kernels.rebuild(
                backend,
                self.factory.as_mut(),
                &self.options,
                defines,
            )?;

            if built > 0 {
                info!("Rebuilt {} kernel(s)", built);
            }

            self.frame = Default::default();
        }

        let seed = if self.restir_params.use_fixed_seed != 0 {
            self.restir_params.fixed_seed
        } else {
            rand::thread_rng().gen()
        };

        let frame = FrameState {
            frame: self.frame,
            frame_dim,
            screen_tiles,
            seed,
            calculate_counters: self.options.calculate_counters,
        };

        debug!(
            "Beginning frame {}; frame_dim={}, screen_tiles={}",
            frame.frame.get(),
            frame_dim,
            screen_tiles
        );

        self.restir_params.frame_dim = frame_dim;
        self.restir_params.screen_tiles = screen_tiles;
        self.restir_params.frame_count = frame.frame.get();
        self.restir_params.seed = seed;

        for pass in 0..self.options.num_passes {
            self.store
                .ensure_capacity(backend, pass, frame.element_count())?;
        }

        self.counters.ensure(backend)?;
        self.specular_shapes.prepare(backend)?;

        if self
            .neighbor_offsets_buffer
            .ensure(backend, self.neighbor_offsets.len())?
        {
            self.neighbor_offsets_buffer.write(
                backend,
                0,
                self.neighbor_offsets.as_slice(),
            )?;
        }

        if self.has_env_map {
            self.prior
                .importance_mut()
                .ensure(backend, importance_layout(&self.options))?;
        }

        self.debug_output.ensure(backend, frame_dim)?;
        self.final_thp.ensure(backend, frame_dim)?;

        self.frame_state = Some(frame);
        self.stage = FrameStage::Begun;

        Ok(())
    }

    pub fn run_frame(
        &mut self,
        backend: &mut B,
        inputs: FrameInputs<'_, B>,
    ) -> Result<()> {
        self.expect_stage(FrameStage::Begun)?;

        let result = self.try_run_frame(backend, inputs);

        self.fault_on(result)
    }

    fn try_run_frame(
        &mut self,
        backend: &mut B,
        inputs: FrameInputs<'_, B>,
    ) -> Result<()> {
        let frame = self.frame_state.ok_or(Error::UnexpectedStage {
            expected: FrameStage::Begun,
            actual: self.stage,
        })?;

        self.prior.importance_mut().update(
            backend,
            &mut self.kernels,
            importance_layout(&self.options),
            self.has_env_map,
        )?;

        self.counters.clear(backend)?;

        let options = &self.options;

        let mut stages = Stages {
            kernels: &mut self.kernels,
            store: &mut self.store,
            prior: &self.prior,
            counters: &self.counters,
            specular_shapes: self.specular_shapes.view(),
            neighbor_offsets: self.neighbor_offsets_buffer.get()?,
            neighbor_offset_count: self.neighbor_offsets.len() as u32,
            debug_output: self.debug_output.get()?,
            final_thp: self.final_thp.get()?,
            options,
            frame: &frame,
            inputs,
        };

        stages.trace_receivers(backend)?;
        self.stage = FrameStage::ReceiverTraced;

        for pass in 0..options.num_passes {
            self.stage = FrameStage::Resampling { pass };

            if options.uses_prior() {
                stages.build_prior(backend, pass)?;
            }

            stages.initial_sampling(backend, pass)?;

            // There's no history on the first frame (after a reset)
            if options.use_temporal_resampling && frame.frame.has_history() {
                stages.temporal_resampling(backend, pass)?;
            }

            if options.use_spatial_resampling {
                stages.spatial_resampling(backend, pass)?;
            }
        }

        stages.resolve(backend)?;
        backend.submit();

        self.stage = FrameStage::Resolved;

        Ok(())
    }

    /// Finishes the frame: output of each pass becomes its history and the
    /// frame index advances.
    pub fn end_frame(&mut self) -> Result<()> {
        self.expect_stage(FrameStage::Resolved)?;

        self.store.swap_all_roles();
        self.frame = self.frame.next();
        self.frame_state = None;
        self.stage = FrameStage::Idle;

        Ok(())
    }

    /// Discards the history, so that the next frame doesn't reuse anything
    /// temporally.
    pub fn clear_reservoirs(&mut self) {
        debug!("Clearing reservoirs");

        self.frame = Default::default();
    }

    pub fn set_restir_params(
        &mut self,
        use_fixed_seed: bool,
        fixed_seed: u32,
        lod_bias: f32,
        specular_roughness_threshold: f32,
    ) {
        self.restir_params.use_fixed_seed = use_fixed_seed as u32;
        self.restir_params.fixed_seed = fixed_seed;
        self.restir_params.lod_bias = lod_bias;
        self.restir_params.specular_roughness_threshold =
            specular_roughness_threshold;
    }

    /// Returns what downstream consumers need to compose the final image.
    pub fn bind_output(&self) -> Result<OutputBinding<'_, B>> {
        Ok(OutputBinding {
            final_thp: self.final_thp.get()?,
            params: bytemuck::bytes_of(&self.restir_params),
        })
    }

    /// Reads diagnostic counters of the most recent frame; returns zeros if
    /// counters are disabled.
    pub fn read_counters(&self, backend: &mut B) -> Result<CounterReport> {
        self.counters
            .read(backend, self.options.calculate_counters)
    }

    /// Registers specular shapes the scene has gained since the last scan.
    ///
    /// Shapes are uploaded in [`Self::begin_frame()`], so this can be called
    /// only between frames.
    pub fn rescan_specular_shapes(
        &mut self,
        scene: &dyn Scene,
    ) -> Result<usize> {
        self.expect_stage(FrameStage::Idle)?;

        Ok(self.specular_shapes.scan(scene))
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn frame(&self) -> gpu::Frame {
        self.frame
    }

    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    pub fn restir_params(&self) -> &gpu::ReStirParams {
        &self.restir_params
    }

    pub fn debug_output(&self) -> Result<&B::Texture> {
        self.debug_output.get()
    }

    pub fn final_thp(&self) -> Result<&B::Texture> {
        self.final_thp.get()
    }

    pub fn store(&self) -> &ReservoirStore<B> {
        &self.store
    }

    pub fn kernels(&self) -> &KernelSet<B> {
        &self.kernels
    }

    pub fn importance(&self) -> &ImportanceField<B> {
        self.prior.importance()
    }

    pub fn specular_shapes(&self) -> &SpecularShapes<B> {
        &self.specular_shapes
    }

    pub fn neighbor_offsets(&self) -> &NeighborOffsets {
        &self.neighbor_offsets
    }

    fn expect_stage(&self, expected: FrameStage) -> Result<()> {
        if self.stage == FrameStage::Faulted {
            return Err(Error::Faulted);
        }

        if self.stage != expected {
            return Err(Error::UnexpectedStage {
                expected,
                actual: self.stage,
            });
        }

        Ok(())
    }

    fn fault_on<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            error!("Frame {} has failed: {}", self.frame.get(), err);

            self.stage = FrameStage::Faulted;
        }

        result
    }
}

/// Final-throughput image together with the parameter block describing it.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct OutputBinding<'a, B>
where
    B: Backend,
{
    pub final_thp: &'a B::Texture,

    /// [`gpu::ReStirParams`], as bytes.
    pub params: &'a [u8],
}
