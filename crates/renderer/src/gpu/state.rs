use std::sync::Arc;

use anyhow::Result;
use preview::{
    CompileError, DrawError, ProgramBinder, ShaderSource, SurfaceBackend, SurfaceSize, Uniforms,
};
use tracing::{debug, warn};
use wgpu::naga::ShaderStage;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::compile::{fallback_fragment, shader_module, DEFAULT_VERTEX_SHADER};
use crate::types::RendererConfig;

use super::context::GpuContext;
use super::pipeline::{build_checked, build_pipeline, GpuProgram, PipelineLayouts, TargetFormat};
use super::uniforms::PreviewUniforms;

struct MultisampleTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        sample_count: u32,
    ) -> Self {
        let extent = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa color target"),
            size: extent,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }

    fn for_context(context: &GpuContext) -> Option<Self> {
        (context.sample_count > 1).then(|| {
            Self::new(
                &context.device,
                context.surface_format,
                context.size,
                context.sample_count,
            )
        })
    }
}

/// One preview window and the GPU state that draws into it.
///
/// Field order matters: the swapchain must be dropped before the window.
pub struct GpuSurface {
    fallback: wgpu::RenderPipeline,
    multisample_target: Option<MultisampleTarget>,
    uniform_bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    uniforms: PreviewUniforms,
    layouts: PipelineLayouts,
    context: GpuContext,
    window: Arc<Window>,
}

impl GpuSurface {
    pub(crate) fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let context = GpuContext::new(
            window.as_ref(),
            window.inner_size(),
            config.antialiasing,
            config.color_space,
        )?;
        let layouts = PipelineLayouts::new(&context.device);

        let uniforms = PreviewUniforms::new(context.size.width, context.size.height);
        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("preview uniform buffer"),
            size: std::mem::size_of::<PreviewUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        context
            .queue
            .write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("preview uniform bind group"),
                layout: &layouts.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let target = TargetFormat {
            format: context.surface_format,
            sample_count: context.sample_count,
        };
        let fallback = build_checked(&context.device, "fallback pipeline", || {
            let vertex = shader_module(
                &context.device,
                "fallback vertex",
                DEFAULT_VERTEX_SHADER.to_string(),
                ShaderStage::Vertex,
            );
            let fragment = shader_module(
                &context.device,
                "fallback fragment",
                fallback_fragment(config.fallback_color),
                ShaderStage::Fragment,
            );
            build_pipeline(
                &context.device,
                &layouts,
                target,
                "fallback pipeline",
                &vertex,
                &fragment,
            )
        })?;

        let multisample_target = MultisampleTarget::for_context(&context);

        Ok(Self {
            fallback,
            multisample_target,
            uniform_bind_group,
            uniform_buffer,
            uniforms,
            layouts,
            context,
            window,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    fn target_format(&self) -> TargetFormat {
        TargetFormat {
            format: self.context.surface_format,
            sample_count: self.context.sample_count,
        }
    }

    fn apply_size(&mut self, size: PhysicalSize<u32>) {
        if size == self.context.size || !self.context.resize(size) {
            return;
        }
        self.multisample_target = MultisampleTarget::for_context(&self.context);
        debug!(width = size.width, height = size.height, "resized preview surface");
    }

    fn acquire(&mut self) -> Result<wgpu::SurfaceTexture, DrawError> {
        match self.context.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.context.reconfigure();
                Err(DrawError::Transient(format!("{err}; surface reconfigured")))
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                Err(DrawError::Lost("surface out of memory".to_string()))
            }
            Err(other) => Err(DrawError::Transient(other.to_string())),
        }
    }
}

impl ProgramBinder for GpuSurface {
    type Program = GpuProgram;

    fn bind(&mut self, source: &ShaderSource) -> Result<GpuProgram, CompileError> {
        let program = GpuProgram::bind(
            &self.context.device,
            &self.layouts,
            self.target_format(),
            source,
        );
        match &program {
            Ok(program) => debug!(revision = program.revision(), "linked shader program"),
            Err(err) => warn!(revision = source.revision(), error = %err, "shader failed to compile"),
        }
        program
    }
}

impl SurfaceBackend for GpuSurface {
    fn measure(&self) -> SurfaceSize {
        let size = self.window.inner_size();
        SurfaceSize::new(size.width, size.height)
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.apply_size(PhysicalSize::new(size.width, size.height));
    }

    fn draw(&mut self, program: Option<&GpuProgram>, uniforms: &Uniforms) -> Result<(), DrawError> {
        // Catch resizes the event loop has not delivered yet.
        self.apply_size(self.window.inner_size());

        let frame = self.acquire()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.uniforms.update(uniforms);
        self.context.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.uniforms),
        );

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("preview encoder"),
                });
        let (attachment_view, resolve_target) = match self.multisample_target.as_ref() {
            Some(msaa) => (&msaa.view, Some(&view)),
            None => (&view, None),
        };
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("preview pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment_view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let pipeline = program.map_or(&self.fallback, |program| &program.pipeline);
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();
        Ok(())
    }
}
