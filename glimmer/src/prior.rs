use derivative::Derivative;
use glam::{uvec3, UVec3};
use log::trace;

use crate::{
    gpu, Backend, BuildPriorArgs, Dispatch, FrameState, ImportanceField,
    ImportanceLayout, KernelSet, Options, Result,
};

/// Builds the prior distribution, i.e. caches of manifold solutions found
/// within each screen tile, which initial sampling later uses as a proposal
/// distribution.
///
/// Also owns the environment-importance field, which is shared by all of the
/// passes.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct PriorBuilder<B>
where
    B: Backend,
{
    importance: ImportanceField<B>,
}

impl<B> PriorBuilder<B>
where
    B: Backend,
{
    pub fn new() -> Self {
        Self {
            importance: ImportanceField::new(),
        }
    }

    pub fn importance(&self) -> &ImportanceField<B> {
        &self.importance
    }

    pub fn importance_mut(&mut self) -> &mut ImportanceField<B> {
        &mut self.importance
    }

    /// Resets the pass' solution tiles and runs the solver over them.
    pub fn build(
        &self,
        backend: &mut B,
        kernels: &mut KernelSet<B>,
        args: BuildPriorArgs<'_, B>,
    ) -> Result<()> {
        trace!("Building prior; pass={}", args.pass);

        backend.fill_buffer(args.solution_tiles, gpu::SOLUTION_TILE_SENTINEL)?;
        kernels.dispatch(backend, Dispatch::BuildPrior(args))
    }
}

impl<B> Default for PriorBuilder<B>
where
    B: Backend,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the layout of the environment-importance field for given
/// options.
pub fn importance_layout(options: &Options) -> ImportanceLayout {
    ImportanceLayout::new(options.env_map_blocks, options.importance_map_dim)
}

/// Returns the number of invocations building the prior takes: a thread
/// group of `build_prior_thread_group_size` invocations per image block.
pub fn prior_threads(frame: &FrameState, options: &Options) -> UVec3 {
    let block_dim = options.image_block_dim.max(glam::UVec2::ONE);
    let blocks = (frame.frame_dim + block_dim - 1) / block_dim;

    uvec3(
        blocks.x * blocks.y * options.build_prior_thread_group_size,
        1,
        1,
    )
}

pub fn prior_params(
    frame: &FrameState,
    options: &Options,
    pass: usize,
) -> gpu::BuildPriorPassParams {
    gpu::BuildPriorPassParams {
        frame_dim: frame.frame_dim,
        image_block_dim: options.image_block_dim,
        env_map_blocks: options.env_map_blocks,
        frame: frame.frame.get(),
        pass_id: pass as u32,
        num_tiles_x: options.num_tiles_x,
        num_threads_used: options.num_threads_used_for_prior,
        flags: options.flags(),
        _pad: 0,
    }
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;
    use crate::testing::RecordingFactory;
    use crate::{HostBackend, HostTexture, KernelDefines, KernelKind};

    fn frame(frame_dim: glam::UVec2) -> FrameState {
        FrameState {
            frame: gpu::Frame::new(0),
            frame_dim,
            screen_tiles: (frame_dim + 15) / 16,
            seed: 0,
            calculate_counters: false,
        }
    }

    #[test]
    fn threads() {
        let options = Options::default();

        // 1920x1080 is covered by 120x68 blocks of 16x16
        assert_eq!(
            uvec3(120 * 68 * 128, 1, 1),
            prior_threads(&frame(uvec2(1920, 1080)), &options)
        );

        let options = Options {
            image_block_dim: uvec2(32, 8),
            build_prior_thread_group_size: 64,
            ..Default::default()
        };

        assert_eq!(
            uvec3(2 * 3 * 64, 1, 1),
            prior_threads(&frame(uvec2(40, 20)), &options)
        );
    }

    #[test]
    fn build_resets_solution_tiles() {
        let mut backend = HostBackend::new();
        let mut factory = RecordingFactory::default();
        let mut kernels = KernelSet::new();

        let options = Options {
            use_prior_distribution: true,
            ..Default::default()
        };

        kernels
            .rebuild(
                &mut backend,
                &mut factory,
                &options,
                KernelDefines::new(&options, 0),
            )
            .unwrap();

        let frame = frame(uvec2(16, 16));
        let receivers = backend.create_buffer("receivers", 256 * 48).unwrap();
        let solution_tiles =
            backend.create_buffer("tiles", 4 * 256 * 4).unwrap();
        let counters = backend.create_buffer("counters", 16).unwrap();
        let debug_output = HostTexture::new(uvec2(16, 16));

        solution_tiles.write_all(0, &[0_u32; 1024]).unwrap();

        PriorBuilder::new()
            .build(
                &mut backend,
                &mut kernels,
                BuildPriorArgs {
                    frame: &frame,
                    pass: 0,
                    threads: prior_threads(&frame, &options),
                    params: prior_params(&frame, &options, 0),
                    specular_shapes: None,
                    receivers: &receivers,
                    solution_tiles: &solution_tiles,
                    counters: &counters,
                    debug_output: &debug_output,
                },
            )
            .unwrap();

        // Receivers are all invalid, so the fake solver finds nothing and
        // the tiles keep the sentinel
        assert!(solution_tiles
            .read_all::<u32>()
            .into_iter()
            .all(|value| value == gpu::SOLUTION_TILE_SENTINEL));

        assert_eq!(1, factory.log().dispatches_of(KernelKind::BuildPrior));
    }
}
