mod dispatch;

use derivative::Derivative;
use fxhash::FxHashMap;
use log::{debug, info};

pub use self::dispatch::*;
use crate::{Backend, Error, Options, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KernelKind {
    TraceReceivers,
    WriteEnvImportance,
    BuildPrior,
    InitialSampling,
    TemporalResampling,
    SpatialResampling,
    Resolve,
}

impl KernelKind {
    pub const ALL: [Self; 7] = [
        Self::TraceReceivers,
        Self::WriteEnvImportance,
        Self::BuildPrior,
        Self::InitialSampling,
        Self::TemporalResampling,
        Self::SpatialResampling,
        Self::Resolve,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::TraceReceivers => "trace_receivers",
            Self::WriteEnvImportance => "write_env_importance",
            Self::BuildPrior => "build_prior",
            Self::InitialSampling => "initial_sampling",
            Self::TemporalResampling => "temporal_resampling",
            Self::SpatialResampling => "spatial_resampling",
            Self::Resolve => "resolve",
        }
    }

    /// Returns whether given options ever dispatch this kernel.
    pub fn is_required(self, options: &Options) -> bool {
        match self {
            Self::BuildPrior => options.uses_prior(),
            Self::TemporalResampling => options.use_temporal_resampling,
            Self::SpatialResampling => options.use_spatial_resampling,
            _ => true,
        }
    }
}

/// Compile-time constants kernels get specialized with; changing any of
/// them requires recreating the affected kernels.
#[derive(Clone, Copy, Debug, Default)]
pub struct KernelDefines {
    pub prior_thread_group_size: u32,
    pub max_bernoulli_trials: u32,
    pub solver_threshold: f32,
    pub neighbor_offset_count: u32,
}

impl KernelDefines {
    pub fn new(options: &Options, neighbor_offset_count: usize) -> Self {
        Self {
            prior_thread_group_size: options.build_prior_thread_group_size,
            max_bernoulli_trials: options.max_bernoulli_trials,
            solver_threshold: options.solver_threshold,
            neighbor_offset_count: neighbor_offset_count as u32,
        }
    }

    /// Returns only the defines given kernel gets compiled with, zeroing the
    /// rest, so that changing a define recreates only kernels that use it.
    pub fn relevant_to(self, kind: KernelKind) -> Self {
        let mut this = Self::default();

        match kind {
            KernelKind::BuildPrior => {
                this.prior_thread_group_size = self.prior_thread_group_size;
                this.max_bernoulli_trials = self.max_bernoulli_trials;
                this.solver_threshold = self.solver_threshold;
            }

            KernelKind::InitialSampling => {
                this.max_bernoulli_trials = self.max_bernoulli_trials;
                this.solver_threshold = self.solver_threshold;
            }

            KernelKind::TemporalResampling => {
                this.solver_threshold = self.solver_threshold;
            }

            KernelKind::SpatialResampling => {
                this.solver_threshold = self.solver_threshold;
                this.neighbor_offset_count = self.neighbor_offset_count;
            }

            KernelKind::TraceReceivers
            | KernelKind::WriteEnvImportance
            | KernelKind::Resolve => {
                //
            }
        }

        this
    }
}

impl PartialEq for KernelDefines {
    fn eq(&self, other: &Self) -> bool {
        self.prior_thread_group_size == other.prior_thread_group_size
            && self.max_bernoulli_trials == other.max_bernoulli_trials
            && self.solver_threshold.to_bits()
                == other.solver_threshold.to_bits()
            && self.neighbor_offset_count == other.neighbor_offset_count
    }
}

impl Eq for KernelDefines {}

/// Opaque compute kernel with a fixed I/O contract (see [`Dispatch`]).
pub trait Kernel<B>
where
    B: Backend,
{
    fn dispatch(&mut self, backend: &mut B, args: Dispatch<'_, B>)
        -> Result<()>;
}

/// Creates kernels; that's the seam through which the actual manifold
/// solver, shift mapping etc. get plugged into the pipeline.
pub trait KernelFactory<B>
where
    B: Backend,
{
    fn create(
        &mut self,
        backend: &mut B,
        kind: KernelKind,
        defines: &KernelDefines,
    ) -> Result<Box<dyn Kernel<B>>>;
}

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
struct KernelSlot<B>
where
    B: Backend,
{
    #[derivative(Debug = "ignore")]
    kernel: Box<dyn Kernel<B>>,
    defines: KernelDefines,
}

/// Kernels built so far, together with the defines they were built with.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct KernelSet<B>
where
    B: Backend,
{
    slots: FxHashMap<KernelKind, KernelSlot<B>>,
    dirty: bool,
}

impl<B> KernelSet<B>
where
    B: Backend,
{
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
            dirty: true,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn contains(&self, kind: KernelKind) -> bool {
        self.slots.contains_key(&kind)
    }

    /// Brings the kernels up to date with given options, returning how many
    /// kernels had to be created.
    ///
    /// This is idempotent: a kernel gets created only if it's required and
    /// either missing or built with different defines. Kernels that are no
    /// longer required are kept around, so that toggling a stage off and on
    /// doesn't recreate it.
    pub fn rebuild(
        &mut self,
        backend: &mut B,
        factory: &mut dyn KernelFactory<B>,
        options: &Options,
        defines: KernelDefines,
    ) -> Result<usize> {
        let mut built = 0;

        for kind in KernelKind::ALL {
            if !kind.is_required(options) {
                continue;
            }

            let defines = defines.relevant_to(kind);

            if let Some(slot) = self.slots.get(&kind) {
                if slot.defines == defines {
                    continue;
                }
            }

            info!("Building kernel `{}`; defines={:?}", kind.name(), defines);

            let kernel = factory.create(backend, kind, &defines)?;

            self.slots.insert(kind, KernelSlot { kernel, defines });
            built += 1;
        }

        debug!("Kernels rebuilt; built={}", built);

        self.dirty = false;

        Ok(built)
    }

    pub fn dispatch(
        &mut self,
        backend: &mut B,
        args: Dispatch<'_, B>,
    ) -> Result<()> {
        let kind = args.kind();

        let slot = self
            .slots
            .get_mut(&kind)
            .ok_or(Error::KernelMissing(kind))?;

        slot.kernel.dispatch(backend, args)
    }
}

impl<B> Default for KernelSet<B>
where
    B: Backend,
{
    fn default() -> Self {
        Self::new()
    }
}
