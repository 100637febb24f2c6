use crate::clock::TimeSample;

/// Measured drawable size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Runtime inputs handed to a compiled program for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniforms {
    pub time: f64,
    pub resolution_width: u32,
    pub resolution_height: u32,
    pub frame: u64,
    /// Brightness multiplier; below 1.0 while the code overlay is shown.
    pub dim: f32,
}

/// Brightness applied while the code overlay covers the preview.
pub const OVERLAY_DIM: f32 = 0.5;

/// Derives per-frame uniforms from a clock sample and the measured size.
///
/// Deliberately stateless: it must be called every frame because the drawable
/// can be resized between frames without any source change.
pub struct UniformProvider;

impl UniformProvider {
    pub fn sample(time: TimeSample, size: SurfaceSize, overlay: bool) -> Uniforms {
        Uniforms {
            time: time.seconds.max(0.0),
            resolution_width: size.width.max(1),
            resolution_height: size.height.max(1),
            frame: time.frame_index,
            dim: if overlay { OVERLAY_DIM } else { 1.0 },
        }
    }
}
