use wgpu::naga::ShaderStage;

use crate::compile::{shader_module, validate_glsl, wrap_fragment};
use preview::{CompileError, ShaderSource};

/// Bind group layout shared by every program on one device.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("preview uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("preview pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        Self {
            uniform_layout,
            pipeline_layout,
        }
    }
}

/// Render target parameters a pipeline is baked against.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TargetFormat {
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
}

/// A linked vertex + fragment pipeline for one shader revision.
///
/// Dropping it releases the GPU pipeline.
pub struct GpuProgram {
    pub(crate) pipeline: wgpu::RenderPipeline,
    revision: u64,
}

impl GpuProgram {
    /// Validates `source` on the CPU, then links it on the GPU under a
    /// validation error scope.
    pub(crate) fn bind(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        target: TargetFormat,
        source: &ShaderSource,
    ) -> Result<Self, CompileError> {
        let fragment = wrap_fragment(source.fragment_text());
        fragment.validate()?;
        validate_glsl(source.vertex_text(), ShaderStage::Vertex)?;

        let label = format!("preview program r{}", source.revision());
        let pipeline = build_checked(device, &label, || {
            let vertex = shader_module(
                device,
                "preview vertex",
                source.vertex_text().to_string(),
                ShaderStage::Vertex,
            );
            let fragment = shader_module(
                device,
                "preview fragment",
                fragment.source,
                ShaderStage::Fragment,
            );
            build_pipeline(device, layouts, target, &label, &vertex, &fragment)
        })?;

        Ok(Self {
            pipeline,
            revision: source.revision(),
        })
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Runs `build` inside a validation error scope and converts any captured
/// error into a [`CompileError`]. The partially built value is dropped on error.
pub(crate) fn build_checked<T>(
    device: &wgpu::Device,
    label: &str,
    build: impl FnOnce() -> T,
) -> Result<T, CompileError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(value),
        Some(err) => {
            drop(value);
            Err(CompileError::new(format!("{label}: {err}")))
        }
    }
}

pub(crate) fn build_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    target: TargetFormat,
    label: &str,
    vertex_module: &wgpu::ShaderModule,
    fragment_module: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layouts.pipeline_layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some("main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: target.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}
