use std::ops::Range;

use glam::UVec3;
use log::debug;

use crate::{WgpuBuffer, WgpuTexture};

/// Kind of a resource bound at given slot of a [`ComputeKernel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    ReadOnlyStorage,
    Storage,
    Texture(wgpu::TextureSampleType),
    StorageTexture,
}

/// Resource bound at given slot of a [`ComputeKernel`].
#[derive(Clone, Copy, Debug)]
pub enum Binding<'a> {
    Buffer(&'a WgpuBuffer),
    Texture(&'a WgpuTexture),
}

/// Compute pipeline with a single bind group and push constants.
///
/// Since reservoir buffers rotate between roles from one dispatch to
/// another, the bind group is assembled anew for each [`Self::run()`].
#[derive(Debug)]
pub struct ComputeKernel {
    label: String,
    layout: Vec<BindingKind>,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
    push_constants_size: u32,
}

impl ComputeKernel {
    pub fn new(
        device: &wgpu::Device,
        label: impl ToString,
        (module, entry_point): (&wgpu::ShaderModule, &str),
        layout: &[BindingKind],
        push_constants_size: u32,
    ) -> Self {
        let label = label.to_string();

        debug!("Initializing kernel: {}:{}", label, entry_point);

        let entries: Vec<_> = layout
            .iter()
            .enumerate()
            .map(|(binding, kind)| wgpu::BindGroupLayoutEntry {
                binding: binding as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: match *kind {
                    BindingKind::ReadOnlyStorage => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage {
                            read_only: true,
                        },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },

                    BindingKind::Storage => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage {
                            read_only: false,
                        },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },

                    BindingKind::Texture(sample_type) => {
                        wgpu::BindingType::Texture {
                            sample_type,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        }
                    }

                    BindingKind::StorageTexture => {
                        wgpu::BindingType::StorageTexture {
                            access: wgpu::StorageTextureAccess::WriteOnly,
                            format: WgpuTexture::FORMAT,
                            view_dimension: wgpu::TextureViewDimension::D2,
                        }
                    }
                },
                count: None,
            })
            .collect();

        let bind_group_layout_label = format!("glimmer_{label}_bgl");

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&bind_group_layout_label),
                entries: &entries,
            });

        let push_constant_ranges = if push_constants_size > 0 {
            vec![wgpu::PushConstantRange {
                stages: wgpu::ShaderStages::COMPUTE,
                range: Range {
                    start: 0,
                    end: push_constants_size,
                },
            }]
        } else {
            vec![]
        };

        let pipeline_layout_label = format!("glimmer_{label}_pipeline_layout");

        let pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&pipeline_layout_label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &push_constant_ranges,
            });

        let pipeline_label = format!("glimmer_{label}_pipeline");

        let pipeline =
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&pipeline_label),
                layout: Some(&pipeline_layout),
                module,
                entry_point,
            });

        Self {
            label,
            layout: layout.to_vec(),
            bind_group_layout,
            pipeline,
            push_constants_size,
        }
    }

    pub fn layout(&self) -> &[BindingKind] {
        &self.layout
    }

    pub fn run(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        bindings: &[Binding<'_>],
        params: &[u8],
        workgroups: UVec3,
    ) {
        assert_eq!(
            self.layout.len(),
            bindings.len(),
            "kernel `{}` expects {} bindings",
            self.label,
            self.layout.len(),
        );

        assert_eq!(self.push_constants_size as usize, params.len());

        let entries: Vec<_> = bindings
            .iter()
            .enumerate()
            .map(|(binding, resource)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: match resource {
                    Binding::Buffer(buffer) => {
                        buffer.raw().as_entire_binding()
                    }
                    Binding::Texture(texture) => {
                        wgpu::BindingResource::TextureView(texture.view())
                    }
                },
            })
            .collect();

        let bind_group_label = format!("glimmer_{}_bg", self.label);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&bind_group_label),
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        let label = format!("glimmer_{}_pass", self.label);

        let mut pass =
            encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&label),
            });

        pass.set_pipeline(&self.pipeline);

        if !params.is_empty() {
            pass.set_push_constants(0, params);
        }

        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups.x, workgroups.y, workgroups.z);
    }
}
