//! Live preview engine for the VJMix shader editor.
//!
//! The crate turns frequently changing, possibly broken fragment shader text
//! into continuously animated frames on one or more independent surfaces:
//!
//! ```text
//!   editor text ──▶ PreviewController::set_source
//!                         │  Arc<ShaderSource> snapshot
//!                         ├──────────────▶ RenderSurface (inline)    ─┐
//!                         └──────────────▶ RenderSurface (secondary) ─┤
//!                                                                     ▼
//!        frame(): Clock::advance ─▶ UniformProvider::sample ─▶ SurfaceBackend::draw
//! ```
//!
//! Nothing here touches a GPU or a window system directly. The environment
//! plugs in through [`SurfaceHost`] (creates draw targets) and
//! [`SurfaceBackend`] (binds programs, measures, draws); the `renderer` crate
//! provides the `wgpu`/`winit` implementation.

mod binder;
mod clock;
mod controller;
mod source;
mod surface;
mod uniforms;

#[cfg(test)]
mod testing;

pub use binder::{CompileError, DrawError, ProgramBinder, SurfaceBackend};
pub use clock::{Clock, TimeSample, DEFAULT_TIME_STEP};
pub use controller::{
    Persist, PersistenceError, PreviewController, PreviewError, SurfaceHost, SurfaceUnavailable,
    Visibility,
};
pub use source::ShaderSource;
pub use surface::{FrameOutcome, RenderSurface, SurfaceId, SurfaceKind, SurfaceState};
pub use uniforms::{SurfaceSize, UniformProvider, Uniforms, OVERLAY_DIM};
