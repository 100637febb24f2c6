use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::binder::{CompileError, SurfaceBackend};
use crate::clock::Clock;
use crate::source::ShaderSource;
use crate::surface::{FrameOutcome, RenderSurface, SurfaceId, SurfaceKind};
use crate::uniforms::SurfaceSize;

/// A drawable target could not be created (for example a blocked popup).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("draw target unavailable: {0}")]
pub struct SurfaceUnavailable(pub String);

/// Failure reported by the external persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PersistenceError {
    message: String,
}

impl PersistenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error(transparent)]
    SurfaceUnavailable(#[from] SurfaceUnavailable),
    #[error("failed to save shader: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("unknown surface {0}")]
    UnknownSurface(SurfaceId),
}

/// Environment capability that creates drawable targets.
pub trait SurfaceHost {
    type Backend: SurfaceBackend;

    fn create_draw_target(
        &mut self,
        id: SurfaceId,
        kind: SurfaceKind,
    ) -> Result<Self::Backend, SurfaceUnavailable>;
}

/// Stores the fragment text somewhere outside the preview engine.
pub trait Persist {
    fn persist(&mut self, fragment_text: &str) -> Result<(), PersistenceError>;
}

impl<F> Persist for F
where
    F: FnMut(&str) -> Result<(), PersistenceError>,
{
    fn persist(&mut self, fragment_text: &str) -> Result<(), PersistenceError> {
        self(fragment_text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub preview: bool,
    pub code_overlay: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            preview: true,
            code_overlay: false,
        }
    }
}

/// Owns the canonical shader text and fans it out to every active surface.
///
/// The controller is the only writer of [`ShaderSource`]; surfaces receive
/// shared snapshots and decide independently whether the new program binds.
pub struct PreviewController<B: SurfaceBackend> {
    source: Arc<ShaderSource>,
    time_step: f64,
    visibility: Visibility,
    inline: Option<RenderSurface<B>>,
    secondary: Option<RenderSurface<B>>,
    surfaces_created: u64,
}

impl<B: SurfaceBackend> PreviewController<B> {
    pub fn new(
        fragment_text: impl Into<String>,
        vertex_text: impl Into<String>,
        time_step: f64,
    ) -> Self {
        Self {
            source: ShaderSource::new(0, fragment_text, vertex_text),
            time_step,
            visibility: Visibility::default(),
            inline: None,
            secondary: None,
            surfaces_created: 0,
        }
    }

    pub fn source(&self) -> &Arc<ShaderSource> {
        &self.source
    }

    /// Replaces the fragment text, keeping the current vertex text.
    pub fn set_source(&mut self, fragment_text: impl Into<String>) {
        let vertex_text = self.source.vertex_text().to_string();
        self.set_source_with_vertex(fragment_text, vertex_text);
    }

    /// Publishes a new snapshot and pushes it to every active surface.
    pub fn set_source_with_vertex(
        &mut self,
        fragment_text: impl Into<String>,
        vertex_text: impl Into<String>,
    ) {
        let revision = self.source.revision() + 1;
        self.source = ShaderSource::new(revision, fragment_text, vertex_text);
        debug!(revision, "shader source updated");
        let snapshot = Arc::clone(&self.source);
        for surface in self.surfaces_mut() {
            // Errors are kept on the surface and reported through `last_error`.
            let _ = surface.apply_source(Arc::clone(&snapshot));
        }
    }

    /// Creates the inline surface when the editor mounts.
    pub fn mount_inline<H>(&mut self, host: &mut H) -> Result<SurfaceId, PreviewError>
    where
        H: SurfaceHost<Backend = B>,
    {
        if let Some(surface) = &self.inline {
            return Ok(surface.id());
        }
        let surface = self.create_surface(host, SurfaceKind::Inline)?;
        let id = surface.id();
        self.inline = Some(surface);
        self.visibility.preview = true;
        Ok(id)
    }

    /// Opens the popup surface seeded with the current snapshot.
    ///
    /// Returns the existing surface when one is already open; a failure leaves
    /// the controller untouched.
    pub fn open_secondary_surface<H>(&mut self, host: &mut H) -> Result<SurfaceId, PreviewError>
    where
        H: SurfaceHost<Backend = B>,
    {
        if let Some(surface) = &self.secondary {
            debug!(surface = %surface.id(), "secondary surface already open");
            return Ok(surface.id());
        }
        let surface = self.create_surface(host, SurfaceKind::SecondaryWindow)?;
        let id = surface.id();
        self.secondary = Some(surface);
        Ok(id)
    }

    /// Tears down the popup surface. Does nothing when none is open.
    pub fn close_secondary_surface(&mut self) {
        if let Some(mut surface) = self.secondary.take() {
            surface.teardown();
        }
    }

    /// Reacts to the environment destroying a target (e.g. a closed window).
    pub fn handle_teardown(&mut self, id: SurfaceId) -> bool {
        if self.secondary.as_ref().is_some_and(|s| s.id() == id) {
            self.close_secondary_surface();
            return true;
        }
        if self.inline.as_ref().is_some_and(|s| s.id() == id) {
            if let Some(mut surface) = self.inline.take() {
                surface.teardown();
            }
            self.visibility = Visibility {
                preview: false,
                code_overlay: false,
            };
            return true;
        }
        false
    }

    /// Shows or hides the inline preview pane.
    ///
    /// Hiding tears the inline surface down; showing it again creates a fresh
    /// surface whose clock starts at zero.
    pub fn set_preview_visible<H>(&mut self, host: &mut H, visible: bool) -> Result<(), PreviewError>
    where
        H: SurfaceHost<Backend = B>,
    {
        if visible {
            self.mount_inline(host).map(|_| ())
        } else {
            if let Some(mut surface) = self.inline.take() {
                surface.teardown();
            }
            self.visibility = Visibility {
                preview: false,
                code_overlay: false,
            };
            Ok(())
        }
    }

    /// Flips the code overlay; stays off while the preview is hidden.
    pub fn toggle_code_overlay(&mut self) -> bool {
        if !self.visibility.preview {
            return false;
        }
        self.visibility.code_overlay = !self.visibility.code_overlay;
        let overlay = self.visibility.code_overlay;
        for surface in self.surfaces_mut() {
            surface.set_overlay(overlay);
        }
        overlay
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Hands the exact current fragment text to the persistence collaborator.
    pub fn save<P>(&self, persist: &mut P) -> Result<(), PreviewError>
    where
        P: Persist + ?Sized,
    {
        let revision = self.source.revision();
        match persist.persist(self.source.fragment_text()) {
            Ok(()) => {
                info!(revision, "shader saved");
                Ok(())
            }
            Err(err) => {
                warn!(revision, error = %err, "shader save failed");
                Err(err.into())
            }
        }
    }

    /// Most recent compile error across active surfaces.
    pub fn last_error(&self) -> Option<&CompileError> {
        self.surfaces()
            .filter_map(|surface| Some((surface.error_revision()?, surface.last_error()?)))
            .max_by_key(|(revision, _)| *revision)
            .map(|(_, err)| err)
    }

    /// Runs one frame on the given surface.
    pub fn frame(&mut self, id: SurfaceId) -> FrameOutcome {
        let Some(surface) = self.surface_mut(id) else {
            return FrameOutcome::Cancelled;
        };
        let outcome = surface.frame();
        if outcome == FrameOutcome::Cancelled {
            self.forget_torn_down();
        }
        outcome
    }

    pub fn resize(&mut self, id: SurfaceId, size: SurfaceSize) -> Result<(), PreviewError> {
        let surface = self
            .surface_mut(id)
            .ok_or(PreviewError::UnknownSurface(id))?;
        surface.resize(size);
        Ok(())
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&RenderSurface<B>> {
        self.surfaces().find(|surface| surface.id() == id)
    }

    pub fn inline_surface(&self) -> Option<&RenderSurface<B>> {
        self.inline.as_ref()
    }

    pub fn secondary_surface(&self) -> Option<&RenderSurface<B>> {
        self.secondary.as_ref()
    }

    pub fn surface_ids(&self) -> Vec<SurfaceId> {
        self.surfaces().map(RenderSurface::id).collect()
    }

    /// Tears every surface down; used when the editing session ends.
    pub fn shutdown(&mut self) {
        for surface in self.surfaces_mut() {
            surface.teardown();
        }
        self.inline = None;
        self.secondary = None;
    }

    fn create_surface<H>(
        &mut self,
        host: &mut H,
        kind: SurfaceKind,
    ) -> Result<RenderSurface<B>, PreviewError>
    where
        H: SurfaceHost<Backend = B>,
    {
        let id = SurfaceId::new(self.surfaces_created + 1);
        let backend = host.create_draw_target(id, kind).map_err(|err| {
            warn!(surface = %id, ?kind, error = %err, "failed to create draw target");
            err
        })?;
        self.surfaces_created += 1;

        let mut surface = RenderSurface::new(id, kind, Clock::new(self.time_step));
        surface.attach(backend);
        surface.set_overlay(self.visibility.code_overlay);
        let _ = surface.apply_source(Arc::clone(&self.source));
        info!(surface = %id, ?kind, revision = self.source.revision(), "surface opened");
        Ok(surface)
    }

    fn forget_torn_down(&mut self) {
        use crate::surface::SurfaceState;
        if self
            .secondary
            .as_ref()
            .is_some_and(|s| s.state() == SurfaceState::TornDown)
        {
            self.secondary = None;
        }
        if self
            .inline
            .as_ref()
            .is_some_and(|s| s.state() == SurfaceState::TornDown)
        {
            self.inline = None;
            self.visibility = Visibility {
                preview: false,
                code_overlay: false,
            };
        }
    }

    fn surface_mut(&mut self, id: SurfaceId) -> Option<&mut RenderSurface<B>> {
        self.surfaces_mut().find(|surface| surface.id() == id)
    }

    fn surfaces(&self) -> impl Iterator<Item = &RenderSurface<B>> {
        self.inline.iter().chain(self.secondary.iter())
    }

    fn surfaces_mut(&mut self) -> impl Iterator<Item = &mut RenderSurface<B>> {
        self.inline.iter_mut().chain(self.secondary.iter_mut())
    }
}
