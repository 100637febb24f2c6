//! GPU side of the preview windows.
//!
//! - `context` owns the wgpu instance/device/surface wiring and reconfigures
//!   the swapchain when the window resizes.
//! - `pipeline` links wrapped GLSL into render pipelines under a validation
//!   error scope so broken shaders surface as `CompileError`.
//! - `uniforms` mirrors the injected uniform block.
//! - `state` glues everything together as `GpuSurface`, the core's
//!   `SurfaceBackend` for one window.

mod context;
mod pipeline;
mod state;
mod uniforms;

pub use pipeline::GpuProgram;
pub use state::GpuSurface;
