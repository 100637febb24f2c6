use thiserror::Error;

use crate::source::ShaderSource;
use crate::uniforms::{SurfaceSize, Uniforms};

/// Shader text that could not be turned into a usable program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
    message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "shader failed to compile".to_string()
        } else {
            message
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure while presenting a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawError {
    /// The frame was skipped but the target is still usable.
    #[error("frame skipped: {0}")]
    Transient(String),
    /// The drawable target is gone; the surface must stop rendering.
    #[error("draw target lost: {0}")]
    Lost(String),
}

/// Turns shader source into a program owned by one surface.
///
/// Implementations release every resource from a failed attempt before
/// returning the error. A successful program releases its resources on
/// `Drop`, which lets the surface keep the previous program alive until the
/// replacement exists.
pub trait ProgramBinder {
    type Program;

    fn bind(&mut self, source: &ShaderSource) -> Result<Self::Program, CompileError>;
}

/// Drawable target plus the binder that produces programs for it.
pub trait SurfaceBackend: ProgramBinder {
    /// Current drawable size; queried every frame.
    fn measure(&self) -> SurfaceSize;

    /// Reacts to a size change reported by the environment.
    fn resize(&mut self, size: SurfaceSize);

    /// Draws one frame. `None` requests the fallback visual.
    fn draw(&mut self, program: Option<&Self::Program>, uniforms: &Uniforms)
        -> Result<(), DrawError>;
}
