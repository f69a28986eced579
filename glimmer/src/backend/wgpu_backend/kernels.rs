use std::fmt;

use fxhash::FxHashMap;
use glam::{uvec3, UVec3};
use log::trace;

use super::{Binding, BindingKind, ComputeKernel};
use crate::{
    gpu, Backend, Dispatch, Error, Kernel, KernelDefines, KernelFactory,
    KernelKind, Result, WgpuBackend, WgpuBuffer,
};

type CompileFn =
    Box<dyn Fn(&wgpu::Device, &KernelDefines) -> wgpu::ShaderModule>;

/// Shader a kernel gets built from.
pub struct KernelSource {
    entry_point: String,
    compile: CompileFn,
}

impl fmt::Debug for KernelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelSource")
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

/// Builds compute pipelines out of caller-provided shaders.
///
/// Each kernel kind has a fixed binding layout (see [`layout_of()`]) and
/// receives its pass params as push constants.
#[derive(Debug, Default)]
pub struct WgpuKernelFactory {
    sources: FxHashMap<KernelKind, KernelSource>,
}

impl WgpuKernelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers shader for given kernel; `compile` gets invoked each time
    /// the kernel has to be (re)built, with the defines to specialize the
    /// shader with.
    pub fn with_source(
        mut self,
        kind: KernelKind,
        entry_point: impl ToString,
        compile: impl Fn(&wgpu::Device, &KernelDefines) -> wgpu::ShaderModule
            + 'static,
    ) -> Self {
        self.sources.insert(
            kind,
            KernelSource {
                entry_point: entry_point.to_string(),
                compile: Box::new(compile),
            },
        );

        self
    }
}

impl KernelFactory<WgpuBackend> for WgpuKernelFactory {
    fn create(
        &mut self,
        backend: &mut WgpuBackend,
        kind: KernelKind,
        defines: &KernelDefines,
    ) -> Result<Box<dyn Kernel<WgpuBackend>>> {
        let source =
            self.sources.get(&kind).ok_or(Error::KernelMissing(kind))?;

        let module = (source.compile)(backend.device(), defines);

        let pass = ComputeKernel::new(
            backend.device(),
            kind.name(),
            (&module, source.entry_point.as_str()),
            &layout_of(kind),
            push_constants_size_of(kind),
        );

        let workgroup_size = if kind == KernelKind::BuildPrior {
            uvec3(defines.prior_thread_group_size.max(1), 1, 1)
        } else {
            uvec3(16, 16, 1)
        };

        Ok(Box::new(WgpuKernel {
            kind,
            pass,
            workgroup_size,
            dummy: None,
        }))
    }
}

#[derive(Debug)]
struct WgpuKernel {
    kind: KernelKind,
    pass: ComputeKernel,
    workgroup_size: UVec3,

    /// Bound in place of optional buffers that are absent
    dummy: Option<WgpuBuffer>,
}

impl Kernel<WgpuBackend> for WgpuKernel {
    fn dispatch(
        &mut self,
        backend: &mut WgpuBackend,
        args: Dispatch<'_, WgpuBackend>,
    ) -> Result<()> {
        if args.kind() != self.kind {
            return Err(Error::KernelMismatch {
                kernel: self.kind,
                got: args.kind(),
            });
        }

        let dummy = match &self.dummy {
            Some(dummy) => dummy.clone(),
            None => {
                let dummy = backend.create_buffer("glimmer_dummy", 16)?;

                self.dummy = Some(dummy.clone());
                dummy
            }
        };

        let threads = args.threads();
        let workgroups = (threads + self.workgroup_size - 1)
            / self.workgroup_size;

        trace!(
            "Dispatching `{}`; threads={}, workgroups={}",
            self.kind.name(),
            threads,
            workgroups
        );

        let (bindings, params) = bindings_of(&args, &dummy);
        let device = backend.device.clone();

        self.pass
            .run(&device, backend.encoder(), &bindings, &params, workgroups);

        Ok(())
    }
}

fn layout_of(kind: KernelKind) -> Vec<BindingKind> {
    use BindingKind::*;

    let uint_texture = Texture(wgpu::TextureSampleType::Uint);

    let float_texture =
        Texture(wgpu::TextureSampleType::Float { filterable: false });

    match kind {
        KernelKind::TraceReceivers => {
            vec![uint_texture, Storage, StorageTexture]
        }

        KernelKind::WriteEnvImportance => vec![Storage],

        KernelKind::BuildPrior => vec![
            ReadOnlyStorage,
            ReadOnlyStorage,
            Storage,
            Storage,
            StorageTexture,
        ],

        KernelKind::InitialSampling => vec![
            uint_texture,
            ReadOnlyStorage,
            ReadOnlyStorage,
            ReadOnlyStorage,
            ReadOnlyStorage,
            Storage,
            Storage,
            StorageTexture,
        ],

        KernelKind::TemporalResampling => vec![
            float_texture,
            ReadOnlyStorage,
            ReadOnlyStorage,
            Storage,
            Storage,
            StorageTexture,
        ],

        KernelKind::SpatialResampling => vec![
            ReadOnlyStorage,
            ReadOnlyStorage,
            ReadOnlyStorage,
            ReadOnlyStorage,
            Storage,
            Storage,
            StorageTexture,
        ],

        KernelKind::Resolve => {
            let mut layout = vec![ReadOnlyStorage; gpu::MAX_PASSES + 4];

            layout.extend([StorageTexture, StorageTexture]);
            layout
        }
    }
}

fn push_constants_size_of(kind: KernelKind) -> u32 {
    let size = match kind {
        KernelKind::TraceReceivers => {
            std::mem::size_of::<gpu::TraceReceiversPassParams>()
        }
        KernelKind::WriteEnvImportance => {
            std::mem::size_of::<gpu::WriteEnvImportancePassParams>()
        }
        KernelKind::BuildPrior => {
            std::mem::size_of::<gpu::BuildPriorPassParams>()
        }
        KernelKind::InitialSampling => {
            std::mem::size_of::<gpu::InitialSamplingPassParams>()
        }
        KernelKind::TemporalResampling => {
            std::mem::size_of::<gpu::TemporalResamplingPassParams>()
        }
        KernelKind::SpatialResampling => {
            std::mem::size_of::<gpu::SpatialResamplingPassParams>()
        }
        KernelKind::Resolve => std::mem::size_of::<gpu::ResolvePassParams>(),
    };

    size as u32
}

fn bindings_of<'a>(
    args: &'a Dispatch<'a, WgpuBackend>,
    dummy: &'a WgpuBuffer,
) -> (Vec<Binding<'a>>, Vec<u8>) {
    use Binding::{Buffer, Texture};

    let optional = |buffer: Option<&'a WgpuBuffer>| {
        Buffer(buffer.unwrap_or(dummy))
    };

    match args {
        Dispatch::TraceReceivers(args) => (
            vec![
                Texture(args.vbuffer),
                Buffer(args.receivers),
                Texture(args.debug_output),
            ],
            bytemuck::bytes_of(&args.params).to_vec(),
        ),

        Dispatch::WriteEnvImportance(args) => (
            vec![Buffer(args.importance)],
            bytemuck::bytes_of(&args.params).to_vec(),
        ),

        Dispatch::BuildPrior(args) => (
            vec![
                optional(args.specular_shapes.map(|shapes| shapes.buffer)),
                Buffer(args.receivers),
                Buffer(args.solution_tiles),
                Buffer(args.counters),
                Texture(args.debug_output),
            ],
            bytemuck::bytes_of(&args.params).to_vec(),
        ),

        Dispatch::InitialSampling(args) => (
            vec![
                Texture(args.vbuffer),
                Buffer(args.receivers),
                optional(args.solution_tiles),
                optional(args.importance),
                optional(args.specular_shapes.map(|shapes| shapes.buffer)),
                Buffer(args.output),
                Buffer(args.counters),
                Texture(args.debug_output),
            ],
            bytemuck::bytes_of(&args.params).to_vec(),
        ),

        Dispatch::TemporalResampling(args) => (
            vec![
                Texture(args.motion_vectors),
                optional(args.specular_shapes.map(|shapes| shapes.buffer)),
                Buffer(args.history),
                Buffer(args.output),
                Buffer(args.counters),
                Texture(args.debug_output),
            ],
            bytemuck::bytes_of(&args.params).to_vec(),
        ),

        Dispatch::SpatialResampling(args) => (
            vec![
                Buffer(args.neighbor_offsets),
                Buffer(args.receivers),
                optional(args.specular_shapes.map(|shapes| shapes.buffer)),
                Buffer(args.input),
                Buffer(args.output),
                Buffer(args.counters),
                Texture(args.debug_output),
            ],
            bytemuck::bytes_of(&args.params).to_vec(),
        ),

        Dispatch::Resolve(args) => {
            // Slots of inactive passes get the dummy buffer; the kernel reads
            // only `num_passes` of them
            let reservoirs = (0..gpu::MAX_PASSES)
                .map(|pass| optional(args.reservoirs.get(pass).copied()));

            let counters = args.counters.iter().map(|buffer| Buffer(*buffer));

            let bindings = reservoirs
                .chain(counters)
                .chain([Texture(args.final_thp), Texture(args.debug_output)])
                .collect();

            (bindings, bytemuck::bytes_of(&args.params).to_vec())
        }
    }
}
