use derivative::Derivative;
use log::trace;

use crate::{gpu, Backend, GrowableBuffer, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CounterStage {
    Prior,
    Initial,
    Temporal,
    Spatial,
}

impl CounterStage {
    pub const ALL: [Self; 4] =
        [Self::Prior, Self::Initial, Self::Temporal, Self::Spatial];

    fn index(self) -> usize {
        match self {
            Self::Prior => 0,
            Self::Initial => 1,
            Self::Temporal => 2,
            Self::Spatial => 3,
        }
    }
}

/// Diagnostic counters of each stage; each buffer holds exactly one
/// [`gpu::Counters`].
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct CounterBuffers<B>
where
    B: Backend,
{
    buffers: [GrowableBuffer<B>; 4],
}

impl<B> CounterBuffers<B>
where
    B: Backend,
{
    pub fn new() -> Self {
        Self {
            buffers: [
                GrowableBuffer::of::<gpu::Counters>("glimmer_prior_counters"),
                GrowableBuffer::of::<gpu::Counters>("glimmer_initial_counters"),
                GrowableBuffer::of::<gpu::Counters>(
                    "glimmer_temporal_counters",
                ),
                GrowableBuffer::of::<gpu::Counters>("glimmer_spatial_counters"),
            ],
        }
    }

    pub fn ensure(&mut self, backend: &mut B) -> Result<()> {
        for buffer in &mut self.buffers {
            buffer.ensure(backend, 1)?;
        }

        Ok(())
    }

    /// Zeroes all of the counters; happens every frame, regardless of
    /// whether kernels are going to populate them.
    pub fn clear(&self, backend: &mut B) -> Result<()> {
        trace!("Clearing counters");

        for buffer in &self.buffers {
            buffer.fill(backend, 0)?;
        }

        Ok(())
    }

    pub fn get(&self, stage: CounterStage) -> Result<&B::Buffer> {
        self.buffers[stage.index()].get()
    }

    /// Returns counter buffers of all stages, in [`CounterStage::ALL`]
    /// order.
    pub fn all(&self) -> Result<[&B::Buffer; 4]> {
        Ok([
            self.get(CounterStage::Prior)?,
            self.get(CounterStage::Initial)?,
            self.get(CounterStage::Temporal)?,
            self.get(CounterStage::Spatial)?,
        ])
    }

    /// Reads the counters back.
    ///
    /// When counters are disabled, this returns zeros without touching the
    /// device (there's nothing to read but what [`Self::clear()`] wrote).
    pub fn read(
        &self,
        backend: &mut B,
        enabled: bool,
    ) -> Result<CounterReport> {
        let mut report = CounterReport::default();

        if !enabled {
            return Ok(report);
        }

        for stage in CounterStage::ALL {
            let counters = self.buffers[stage.index()]
                .read::<gpu::Counters>(backend, 1)?
                .pop()
                .unwrap_or_default();

            report.stages[stage.index()] = counters;
        }

        Ok(report)
    }
}

impl<B> Default for CounterBuffers<B>
where
    B: Backend,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Counters of all stages, as read back from the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterReport {
    stages: [gpu::Counters; 4],
}

impl CounterReport {
    pub fn get(&self, stage: CounterStage) -> gpu::Counters {
        self.stages[stage.index()]
    }

    pub fn is_zero(&self) -> bool {
        self.stages.iter().all(|counters| counters.is_zero())
    }

    /// Fraction of attempts that found a valid solution.
    pub fn success_rate(&self, stage: CounterStage) -> f32 {
        let counters = self.get(stage);

        ratio(counters.successes, counters.attempts)
    }

    pub fn iterations_per_attempt(&self, stage: CounterStage) -> f32 {
        let counters = self.get(stage);

        ratio(counters.solver_iterations, counters.attempts)
    }

    pub fn trials_per_success(&self, stage: CounterStage) -> f32 {
        let counters = self.get(stage);

        ratio(counters.trials, counters.successes)
    }
}

fn ratio(a: u32, b: u32) -> f32 {
    if b == 0 {
        0.0
    } else {
        a as f32 / b as f32
    }
}
