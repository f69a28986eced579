use derivative::Derivative;
use log::debug;

use crate::{
    gpu, Backend, DoubleBuffered, Error, GrowableBuffer, Result, Role,
};

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
struct PassBuffers<B>
where
    B: Backend,
{
    reservoirs: DoubleBuffered<GrowableBuffer<B>>,
    solution_tiles: GrowableBuffer<B>,
}

impl<B> PassBuffers<B>
where
    B: Backend,
{
    fn new(pass: usize) -> Self {
        Self {
            reservoirs: DoubleBuffered::new(
                GrowableBuffer::of::<gpu::Reservoir>(format!(
                    "glimmer_pass{pass}_reservoirs_a"
                )),
                GrowableBuffer::of::<gpu::Reservoir>(format!(
                    "glimmer_pass{pass}_reservoirs_b"
                )),
            ),
            solution_tiles: GrowableBuffer::of::<u32>(format!(
                "glimmer_pass{pass}_solution_tiles"
            )),
        }
    }
}

/// Per-pass reservoirs and solution tiles, plus the receivers shared by all
/// of the passes.
///
/// Each pass owns a pair of reservoir buffers whose roles ([`Role`]) get
/// exchanged instead of copied. All buffers are tile-aligned and grow-only.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct ReservoirStore<B>
where
    B: Backend,
{
    passes: Vec<PassBuffers<B>>,
    receivers: GrowableBuffer<B>,
}

impl<B> ReservoirStore<B>
where
    B: Backend,
{
    pub fn new() -> Self {
        Self {
            passes: Default::default(),
            receivers: GrowableBuffer::of::<gpu::ReceiverInfo>(
                "glimmer_receivers",
            ),
        }
    }

    /// Makes sure buffers of given pass (and the shared receivers) can hold
    /// at least `element_count` pixels.
    pub fn ensure_capacity(
        &mut self,
        backend: &mut B,
        pass: usize,
        element_count: usize,
    ) -> Result<()> {
        if pass >= gpu::MAX_PASSES {
            return Err(Error::PassOutOfRange(pass));
        }

        while self.passes.len() <= pass {
            debug!("Creating buffers for pass {}", self.passes.len());

            self.passes.push(PassBuffers::new(self.passes.len()));
        }

        let buffers = &mut self.passes[pass];

        for reservoirs in buffers.reservoirs.iter_mut() {
            reservoirs.ensure(backend, element_count)?;
        }

        buffers.solution_tiles.ensure(
            backend,
            element_count * gpu::SOLUTIONS_PER_PIXEL,
        )?;

        self.receivers.ensure(backend, element_count)?;

        Ok(())
    }

    /// Exchanges temporal and output roles of given pass, without touching
    /// the data.
    pub fn swap_roles(&mut self, pass: usize) -> Result<()> {
        self.pass_mut(pass)?.reservoirs.swap();

        Ok(())
    }

    pub fn swap_all_roles(&mut self) {
        for pass in &mut self.passes {
            pass.reservoirs.swap();
        }
    }

    pub fn get(&self, pass: usize, role: Role) -> Result<&B::Buffer> {
        self.pass(pass)?.reservoirs.get(role).get()
    }

    pub fn solution_tiles(&self, pass: usize) -> Result<&B::Buffer> {
        self.pass(pass)?.solution_tiles.get()
    }

    pub fn receivers(&self) -> Result<&B::Buffer> {
        self.receivers.get()
    }

    /// Number of pixels buffers of given pass can hold; zero for passes
    /// that haven't been allocated yet.
    pub fn capacity(&self, pass: usize) -> usize {
        self.passes
            .get(pass)
            .map(|pass| {
                pass.reservoirs
                    .get(Role::Output)
                    .capacity()
                    .min(pass.reservoirs.get(Role::Temporal).capacity())
                    .min(
                        pass.solution_tiles.capacity()
                            / gpu::SOLUTIONS_PER_PIXEL,
                    )
                    .min(self.receivers.capacity())
            })
            .unwrap_or(0)
    }

    /// Number of role swaps given pass has gone through.
    pub fn generation(&self, pass: usize) -> Option<u64> {
        self.passes
            .get(pass)
            .map(|pass| pass.reservoirs.generation())
    }

    /// Number of passes that have buffers allocated.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    fn pass(&self, pass: usize) -> Result<&PassBuffers<B>> {
        self.passes.get(pass).ok_or(Error::PassOutOfRange(pass))
    }

    fn pass_mut(&mut self, pass: usize) -> Result<&mut PassBuffers<B>> {
        self.passes.get_mut(pass).ok_or(Error::PassOutOfRange(pass))
    }
}

impl<B> Default for ReservoirStore<B>
where
    B: Backend,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HostBackend;

    #[test]
    fn ensure_capacity() {
        let mut backend = HostBackend::new();
        let mut target = ReservoirStore::new();

        target.ensure_capacity(&mut backend, 1, 256).unwrap();

        // Passes are allocated up to the requested one
        assert_eq!(2, target.pass_count());
        assert_eq!(0, target.capacity(0));
        assert_eq!(256, target.capacity(1));

        let solution_tiles = target.solution_tiles(1).unwrap();

        assert_eq!(4 * 256, solution_tiles.len_of::<u32>());

        assert!(matches!(
            target.ensure_capacity(&mut backend, gpu::MAX_PASSES, 256),
            Err(Error::PassOutOfRange(4))
        ));
    }

    #[test]
    fn grow_only() {
        let mut backend = HostBackend::new();
        let mut target = ReservoirStore::new();

        target.ensure_capacity(&mut backend, 0, 1024).unwrap();

        let allocated = backend.allocated_buffers();

        // reservoirs (x2), solution tiles, receivers
        assert_eq!(4, allocated);

        target.ensure_capacity(&mut backend, 0, 512).unwrap();
        target.ensure_capacity(&mut backend, 0, 1024).unwrap();

        assert_eq!(allocated, backend.allocated_buffers());
        assert_eq!(1024, target.capacity(0));

        target.ensure_capacity(&mut backend, 0, 2048).unwrap();

        assert_eq!(allocated + 4, backend.allocated_buffers());
        assert_eq!(2048, target.capacity(0));

        let output = target.get(0, Role::Output).unwrap();

        assert_eq!(2048, output.len_of::<gpu::Reservoir>());
    }

    #[test]
    fn swap_roles() {
        let mut backend = HostBackend::new();
        let mut target = ReservoirStore::new();

        target.ensure_capacity(&mut backend, 0, 16).unwrap();
        target.ensure_capacity(&mut backend, 1, 16).unwrap();

        let output = target.get(0, Role::Output).unwrap().id();
        let temporal = target.get(0, Role::Temporal).unwrap().id();
        let other = target.get(1, Role::Output).unwrap().id();

        assert_ne!(output, temporal);

        target.swap_roles(0).unwrap();

        assert_eq!(temporal, target.get(0, Role::Output).unwrap().id());
        assert_eq!(output, target.get(0, Role::Temporal).unwrap().id());
        assert_eq!(other, target.get(1, Role::Output).unwrap().id());
        assert_eq!(Some(1), target.generation(0));
        assert_eq!(Some(0), target.generation(1));

        target.swap_all_roles();

        assert_eq!(output, target.get(0, Role::Output).unwrap().id());
        assert_eq!(Some(1), target.generation(1));

        assert!(matches!(
            target.swap_roles(2),
            Err(Error::PassOutOfRange(2))
        ));
    }
}
