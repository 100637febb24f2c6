//! Desktop host for the VJMix preview engine.
//!
//! The `preview` crate owns the rendering state machine; this crate provides
//! the environment it runs in:
//!
//! ```text
//!   vjmix edit
//!        │ RendererConfig + initial text
//!        ▼
//!   PreviewRuntime::run ──▶ winit event loop ──▶ RedrawRequested
//!        │                        ▲                   │
//!        │ PreviewEvent           │ request_redraw    ▼
//!        │ (SourceChanged)        └──────── PreviewController::frame(id)
//!        ▼                                            │
//!   PreviewController::set_source ──▶ GpuSurface::bind / draw ──▶ swapchain
//! ```
//!
//! Every preview window is a `GpuSurface` with its own device and swapchain.
//! Editor text is wrapped into GLSL 450, validated with naga on the CPU, and
//! only then linked into a wgpu pipeline, so a typo never reaches the driver.

mod compile;
mod gpu;
mod types;
mod window;

pub use compile::{DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER};
pub use gpu::{GpuProgram, GpuSurface};
pub use types::{Antialiasing, ColorSpaceMode, RendererConfig, DEFAULT_FALLBACK_COLOR};
pub use window::{
    key_action, window_title, KeyAction, PreviewEvent, PreviewRuntime, INLINE_TITLE,
    SECONDARY_TITLE,
};
