//! Fake scene and kernels for tests.
//!
//! Kernels here are tiny host-side references of the real ones: they follow
//! the same I/O contracts, but their math is trivial and deterministic.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use bytemuck::Pod;
use glam::{uvec2, UVec2, Vec3, Vec4};

use crate::{
    gpu, BoundingBox, Dispatch, FrameState, GeometryInstance, GeometryKind,
    HostBackend, HostBuffer, HostTexture, Kernel, KernelDefines,
    KernelFactory, KernelKind, MaterialInfo, Result, Scene,
};

#[derive(Debug, Default)]
pub struct FakeScene {
    pub instances: Vec<GeometryInstance>,
    pub has_env_map: bool,
    pub uses_emissive_lights: bool,
    pub emissive_refreshes: usize,
}

impl FakeScene {
    /// Adds an instance; `material` is `(id, is_caustic_bouncer,
    /// is_uv_space_sampling)`.
    pub fn push(
        &mut self,
        id: u32,
        kind: GeometryKind,
        material: Option<(u32, bool, bool)>,
    ) {
        self.instances.push(GeometryInstance {
            id,
            kind,
            material: material.map(
                |(id, is_caustic_bouncer, is_uv_space_sampling)| MaterialInfo {
                    id,
                    is_caustic_bouncer,
                    is_uv_space_sampling,
                },
            ),
            bounds: BoundingBox::new(Vec3::ZERO, Vec3::ONE),
        });
    }

    pub fn push_mesh(&mut self, id: u32, material: Option<(u32, bool, bool)>) {
        self.push(id, GeometryKind::TriangleMesh, material);
    }
}

impl Scene for FakeScene {
    fn geometry_instances(&self) -> Vec<GeometryInstance> {
        self.instances.clone()
    }

    fn has_env_map(&self) -> bool {
        self.has_env_map
    }

    fn uses_emissive_lights(&self) -> bool {
        self.uses_emissive_lights
    }

    fn refresh_emissive_lights(&mut self) {
        self.emissive_refreshes += 1;
    }
}

/// Visibility buffer and motion vectors covering given frame, with every
/// pixel hitting something.
pub fn frame_inputs(frame_dim: UVec2) -> (HostTexture, HostTexture) {
    let vbuffer = HostTexture::new(frame_dim);
    let motion_vectors = HostTexture::new(frame_dim);

    for y in 0..frame_dim.y {
        for x in 0..frame_dim.x {
            vbuffer
                .store(uvec2(x, y), Vec4::new(1.0, 0.0, 0.0, 1.0))
                .unwrap();
        }
    }

    (vbuffer, motion_vectors)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchRecord {
    pub kind: KernelKind,
    pub pass: Option<usize>,
    pub frame: Option<u32>,

    /// Ids of reservoir buffers the kernel got, in the order it got them
    /// (e.g. history and output for temporal resampling).
    pub reservoirs: Vec<usize>,

    /// Pass params the kernel got, as bytes.
    pub params: Vec<u8>,
}

impl DispatchRecord {
    pub fn params<T>(&self) -> T
    where
        T: Pod,
    {
        bytemuck::pod_read_unaligned(&self.params)
    }
}

#[derive(Debug, Default)]
pub struct Log {
    pub creates: Vec<KernelKind>,
    pub dispatches: Vec<DispatchRecord>,
}

impl Log {
    pub fn dispatches_of(&self, kind: KernelKind) -> usize {
        self.records_of(kind).count()
    }

    pub fn records_of(
        &self,
        kind: KernelKind,
    ) -> impl Iterator<Item = &DispatchRecord> + '_ {
        self.dispatches
            .iter()
            .filter(move |record| record.kind == kind)
    }

    /// Kernels dispatched for given frame, in order.
    pub fn kinds_of_frame(
        &self,
        frame: u32,
    ) -> Vec<(KernelKind, Option<usize>)> {
        self.dispatches
            .iter()
            .filter(|record| record.frame == Some(frame))
            .map(|record| (record.kind, record.pass))
            .collect()
    }
}

/// Creates stub kernels and records everything they do.
#[derive(Clone, Debug, Default)]
pub struct RecordingFactory {
    log: Rc<RefCell<Log>>,
}

impl RecordingFactory {
    pub fn log(&self) -> Ref<'_, Log> {
        self.log.borrow()
    }
}

impl KernelFactory<HostBackend> for RecordingFactory {
    fn create(
        &mut self,
        _: &mut HostBackend,
        kind: KernelKind,
        _: &KernelDefines,
    ) -> Result<Box<dyn Kernel<HostBackend>>> {
        self.log.borrow_mut().creates.push(kind);

        Ok(Box::new(StubKernel {
            kind,
            log: self.log.clone(),
        }))
    }
}

struct StubKernel {
    kind: KernelKind,
    log: Rc<RefCell<Log>>,
}

impl Kernel<HostBackend> for StubKernel {
    fn dispatch(
        &mut self,
        _: &mut HostBackend,
        args: Dispatch<'_, HostBackend>,
    ) -> Result<()> {
        assert_eq!(self.kind, args.kind());

        let record = match &args {
            Dispatch::TraceReceivers(args) => DispatchRecord {
                kind: self.kind,
                pass: None,
                frame: Some(args.frame.frame.get()),
                reservoirs: vec![],
                params: bytemuck::bytes_of(&args.params).to_vec(),
            },

            Dispatch::WriteEnvImportance(args) => DispatchRecord {
                kind: self.kind,
                pass: None,
                frame: None,
                reservoirs: vec![],
                params: bytemuck::bytes_of(&args.params).to_vec(),
            },

            Dispatch::BuildPrior(args) => DispatchRecord {
                kind: self.kind,
                pass: Some(args.pass),
                frame: Some(args.frame.frame.get()),
                reservoirs: vec![],
                params: bytemuck::bytes_of(&args.params).to_vec(),
            },

            Dispatch::InitialSampling(args) => DispatchRecord {
                kind: self.kind,
                pass: Some(args.pass),
                frame: Some(args.frame.frame.get()),
                reservoirs: vec![args.output.id()],
                params: bytemuck::bytes_of(&args.params).to_vec(),
            },

            Dispatch::TemporalResampling(args) => DispatchRecord {
                kind: self.kind,
                pass: Some(args.pass),
                frame: Some(args.frame.frame.get()),
                reservoirs: vec![args.history.id(), args.output.id()],
                params: bytemuck::bytes_of(&args.params).to_vec(),
            },

            Dispatch::SpatialResampling(args) => DispatchRecord {
                kind: self.kind,
                pass: Some(args.pass),
                frame: Some(args.frame.frame.get()),
                reservoirs: vec![args.input.id(), args.output.id()],
                params: bytemuck::bytes_of(&args.params).to_vec(),
            },

            Dispatch::Resolve(args) => DispatchRecord {
                kind: self.kind,
                pass: None,
                frame: Some(args.frame.frame.get()),
                reservoirs: args
                    .reservoirs
                    .iter()
                    .map(|buffer| buffer.id())
                    .collect(),
                params: bytemuck::bytes_of(&args.params).to_vec(),
            },
        };

        self.log.borrow_mut().dispatches.push(record);

        match args {
            Dispatch::TraceReceivers(args) => {
                let receivers = (0..args.frame.element_count())
                    .map(|idx| {
                        let pixel = pixel_of(idx, args.frame.screen_tiles);

                        if !contains(args.frame.frame_dim, pixel)
                            || args.vbuffer.load(pixel).w <= 0.0
                        {
                            return gpu::ReceiverInfo::default();
                        }

                        gpu::ReceiverInfo::new(
                            pixel.as_vec2().extend(0.0),
                            Vec3::Z,
                            0.5,
                            Vec3::Z,
                            1,
                        )
                    })
                    .collect::<Vec<_>>();

                args.receivers.write_all(0, &receivers)?;
                args.debug_output.store(UVec2::ZERO, Vec4::ONE)?;
            }

            Dispatch::WriteEnvImportance(args) => {
                let values: Vec<_> = (0..args.importance.len_of::<f32>())
                    .map(|idx| 1.0 + idx as f32)
                    .collect();

                args.importance.write_all(0, &values)?;
            }

            Dispatch::BuildPrior(args) => {
                let mut stats = gpu::Counters::default();

                for idx in 0..args.frame.element_count() {
                    let receiver: gpu::ReceiverInfo =
                        args.receivers.read(idx)?;

                    if !receiver.is_valid() {
                        continue;
                    }

                    let pixel = pixel_of(idx, args.frame.screen_tiles);
                    let local = pixel % gpu::SCREEN_TILE_DIM;

                    let slot = gpu::solution_tile_offset(
                        pixel,
                        args.frame.screen_tiles,
                    ) + ((local.y * gpu::SCREEN_TILE_DIM.x + local.x)
                        as usize)
                        * gpu::SOLUTIONS_PER_PIXEL;

                    args.solution_tiles.write(slot, idx as u32)?;

                    stats.attempts += 1;
                    stats.successes += 1;
                    stats.solver_iterations += 3;
                }

                record_counters(args.frame, args.counters, stats)?;
            }

            Dispatch::InitialSampling(args) => {
                let mut stats = gpu::Counters::default();
                let thp = Vec3::splat(args.pass as f32 + 1.0);

                let reservoirs = (0..args.frame.element_count())
                    .map(|idx| -> Result<gpu::Reservoir> {
                        let receiver: gpu::ReceiverInfo =
                            args.receivers.read(idx)?;

                        if !receiver.is_valid() {
                            return Ok(gpu::Reservoir::default());
                        }

                        stats.attempts += 1;
                        stats.successes += 1;
                        stats.solver_iterations += 2;
                        stats.trials += 1;

                        let sample = gpu::ManifoldSample::new(
                            receiver.position(),
                            0,
                            thp,
                            1.0,
                        );

                        let mut reservoir = gpu::Reservoir::new(sample, 1.0);

                        reservoir.normalize(sample.p_hat());
                        reservoir.iterations = 2;

                        Ok(reservoir)
                    })
                    .collect::<Result<Vec<_>>>()?;

                args.output.write_all(0, &reservoirs)?;
                record_counters(args.frame, args.counters, stats)?;
            }

            Dispatch::TemporalResampling(args) => {
                let mut stats = gpu::Counters::default();

                for idx in 0..args.frame.element_count() {
                    let mut curr: gpu::Reservoir = args.output.read(idx)?;
                    let mut prev: gpu::Reservoir = args.history.read(idx)?;

                    if curr.is_empty() || prev.is_empty() {
                        continue;
                    }

                    stats.attempts += 1;
                    stats.successes += 1;

                    prev.clamp_m(args.params.history_length);
                    curr.merge(0.5, &prev, prev.sample.p_hat());
                    curr.normalize(curr.sample.p_hat());

                    args.output.write(idx, curr)?;
                }

                record_counters(args.frame, args.counters, stats)?;
            }

            Dispatch::SpatialResampling(args) => {
                let reservoirs = args.input.read_all::<gpu::Reservoir>();
                let len = args.frame.element_count();

                args.output.write_all(0, &reservoirs[..len])?;

                record_counters(
                    args.frame,
                    args.counters,
                    gpu::Counters::from_words([1, 1, 0, 0]),
                )?;
            }

            Dispatch::Resolve(args) => {
                let frame_dim = args.frame.frame_dim;

                for y in 0..frame_dim.y {
                    for x in 0..frame_dim.x {
                        let pixel = uvec2(x, y);
                        let idx = index_of(pixel, args.frame.screen_tiles);
                        let mut thp = Vec3::ZERO;

                        for (pass, reservoirs) in
                            args.reservoirs.iter().enumerate()
                        {
                            let reservoir: gpu::Reservoir =
                                reservoirs.read(idx)?;

                            thp += (reservoir.contribution() - thp)
                                / (pass as f32 + 1.0);
                        }

                        args.final_thp.store(pixel, thp.extend(1.0))?;
                    }
                }

                let initial: gpu::Counters = args.counters[1].read(0)?;

                args.debug_output.store(
                    UVec2::ZERO,
                    Vec4::splat(initial.attempts as f32),
                )?;
            }
        }

        Ok(())
    }
}

fn record_counters(
    frame: &FrameState,
    counters: &HostBuffer,
    stats: gpu::Counters,
) -> Result<()> {
    if !frame.calculate_counters {
        return Ok(());
    }

    let mut curr: gpu::Counters = counters.read(0)?;

    curr.attempts += stats.attempts;
    curr.successes += stats.successes;
    curr.solver_iterations += stats.solver_iterations;
    curr.trials += stats.trials;

    counters.write(0, curr)
}

fn pixel_of(idx: usize, screen_tiles: UVec2) -> UVec2 {
    let width = (screen_tiles.x * gpu::SCREEN_TILE_DIM.x) as usize;

    uvec2((idx % width) as u32, (idx / width) as u32)
}

fn index_of(pixel: UVec2, screen_tiles: UVec2) -> usize {
    let width = (screen_tiles.x * gpu::SCREEN_TILE_DIM.x) as usize;

    (pixel.y as usize) * width + (pixel.x as usize)
}

fn contains(frame_dim: UVec2, pixel: UVec2) -> bool {
    pixel.x < frame_dim.x && pixel.y < frame_dim.y
}
