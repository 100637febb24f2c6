use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::binder::{CompileError, DrawError, SurfaceBackend};
use crate::clock::Clock;
use crate::source::ShaderSource;
use crate::uniforms::{UniformProvider, Uniforms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl SurfaceId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// Where a surface is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// Preview pane next to the editor.
    Inline,
    /// Independently sized popup window.
    SecondaryWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Uninitialized,
    Ready,
    Rendering,
    TornDown,
}

/// Result of running one frame step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame ran and the next one is requested.
    Rescheduled,
    /// Nothing ran; the host must not schedule another frame for this surface.
    Cancelled,
}

/// Token for the single outstanding frame callback of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameRequest(u64);

/// One drawable target with its own clock, program, and frame loop.
///
/// Field order matters: `program` is declared before `backend` so the
/// compiled program is released before the device that created it.
pub struct RenderSurface<B: SurfaceBackend> {
    id: SurfaceId,
    kind: SurfaceKind,
    state: SurfaceState,
    clock: Clock,
    overlay: bool,
    last_uniforms: Option<Uniforms>,
    program: Option<B::Program>,
    program_revision: Option<u64>,
    last_error: Option<(u64, CompileError)>,
    pending_frame: Option<FrameRequest>,
    requests_issued: u64,
    backend: Option<B>,
}

impl<B: SurfaceBackend> RenderSurface<B> {
    pub fn new(id: SurfaceId, kind: SurfaceKind, clock: Clock) -> Self {
        Self {
            id,
            kind,
            state: SurfaceState::Uninitialized,
            clock,
            overlay: false,
            last_uniforms: None,
            program: None,
            program_revision: None,
            last_error: None,
            pending_frame: None,
            requests_issued: 0,
            backend: None,
        }
    }

    /// Hands the drawable target to the surface (`Uninitialized -> Ready`).
    pub fn attach(&mut self, backend: B) {
        if self.state != SurfaceState::Uninitialized {
            warn!(surface = %self.id, state = ?self.state, "ignoring attach on initialised surface");
            return;
        }
        self.backend = Some(backend);
        self.state = SurfaceState::Ready;
    }

    /// Attempts to bind a new snapshot without pausing the frame loop.
    ///
    /// On success the new program replaces the old one, which is dropped only
    /// afterwards. On failure the previous program stays current and the
    /// error is remembered for display.
    pub fn apply_source(&mut self, source: Arc<ShaderSource>) -> Result<(), CompileError> {
        let Some(backend) = self.backend.as_mut() else {
            debug!(surface = %self.id, state = ?self.state, "no draw target; source ignored");
            return Ok(());
        };

        let result = match backend.bind(&source) {
            Ok(program) => {
                let previous = self.program.replace(program);
                drop(previous);
                self.program_revision = Some(source.revision());
                self.last_error = None;
                debug!(surface = %self.id, revision = source.revision(), "bound shader program");
                Ok(())
            }
            Err(err) => {
                warn!(
                    surface = %self.id,
                    revision = source.revision(),
                    keeps_previous = self.program.is_some(),
                    error = %err,
                    "shader failed to bind"
                );
                self.last_error = Some((source.revision(), err.clone()));
                Err(err)
            }
        };

        if self.state == SurfaceState::Ready {
            self.state = SurfaceState::Rendering;
            self.arm_frame();
            info!(surface = %self.id, kind = ?self.kind, "surface rendering");
        }
        result
    }

    /// Runs one frame: sample uniforms, draw, and request the next frame.
    pub fn frame(&mut self) -> FrameOutcome {
        if self.state != SurfaceState::Rendering || self.pending_frame.take().is_none() {
            return FrameOutcome::Cancelled;
        }
        let Some(backend) = self.backend.as_mut() else {
            return FrameOutcome::Cancelled;
        };

        let time = self.clock.advance();
        let uniforms = UniformProvider::sample(time, backend.measure(), self.overlay);
        match backend.draw(self.program.as_ref(), &uniforms) {
            Ok(()) => {}
            Err(DrawError::Transient(reason)) => {
                debug!(surface = %self.id, %reason, "frame skipped");
            }
            Err(DrawError::Lost(reason)) => {
                warn!(surface = %self.id, %reason, "draw target lost");
                self.teardown();
                return FrameOutcome::Cancelled;
            }
        }
        self.last_uniforms = Some(uniforms);
        self.arm_frame();
        FrameOutcome::Rescheduled
    }

    pub fn resize(&mut self, size: crate::uniforms::SurfaceSize) {
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(size);
        }
    }

    /// Cancels the pending frame and releases the program, then the target.
    ///
    /// Terminal and idempotent.
    pub fn teardown(&mut self) {
        if self.state == SurfaceState::TornDown {
            return;
        }
        self.pending_frame = None;
        drop(self.program.take());
        drop(self.backend.take());
        self.program_revision = None;
        self.state = SurfaceState::TornDown;
        info!(surface = %self.id, kind = ?self.kind, "surface torn down");
    }

    fn arm_frame(&mut self) {
        self.requests_issued = self.requests_issued.saturating_add(1);
        self.pending_frame = Some(FrameRequest(self.requests_issued));
    }

    pub fn set_overlay(&mut self, overlay: bool) {
        self.overlay = overlay;
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn last_uniforms(&self) -> Option<&Uniforms> {
        self.last_uniforms.as_ref()
    }

    pub fn last_error(&self) -> Option<&CompileError> {
        self.last_error.as_ref().map(|(_, err)| err)
    }

    /// Revision of the snapshot that produced the current error, if any.
    pub fn error_revision(&self) -> Option<u64> {
        self.last_error.as_ref().map(|(revision, _)| *revision)
    }

    pub fn program(&self) -> Option<&B::Program> {
        self.program.as_ref()
    }

    /// Revision of the snapshot the current program was built from.
    pub fn program_revision(&self) -> Option<u64> {
        self.program_revision
    }

    pub fn is_frame_pending(&self) -> bool {
        self.pending_frame.is_some()
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, Probe, INVALID, VALID_A, VALID_B};
    use crate::uniforms::SurfaceSize;

    fn attached_surface(probe: &Probe) -> RenderSurface<FakeBackend> {
        let mut surface = RenderSurface::new(
            SurfaceId::new(1),
            SurfaceKind::Inline,
            Clock::new(0.01),
        );
        surface.attach(FakeBackend::new(probe.clone()));
        surface
    }

    #[test]
    fn walks_lifecycle_states() {
        let probe = Probe::default();
        let mut surface: RenderSurface<FakeBackend> =
            RenderSurface::new(SurfaceId::new(7), SurfaceKind::Inline, Clock::default());
        assert_eq!(surface.state(), SurfaceState::Uninitialized);
        assert_eq!(surface.frame(), FrameOutcome::Cancelled);

        surface.attach(FakeBackend::new(probe.clone()));
        assert_eq!(surface.state(), SurfaceState::Ready);
        assert!(!surface.is_frame_pending());

        surface.apply_source(ShaderSource::new(1, VALID_A, "")).unwrap();
        assert_eq!(surface.state(), SurfaceState::Rendering);
        assert!(surface.is_frame_pending());

        surface.teardown();
        assert_eq!(surface.state(), SurfaceState::TornDown);
        assert!(probe.released.get());
        assert_eq!(probe.live_programs.get(), 0);
    }

    #[test]
    fn failed_first_bind_still_renders_fallback() {
        let probe = Probe::default();
        let mut surface = attached_surface(&probe);

        let err = surface
            .apply_source(ShaderSource::new(1, INVALID, ""))
            .unwrap_err();
        assert!(!err.message().is_empty());
        assert_eq!(surface.state(), SurfaceState::Rendering);
        assert!(surface.last_error().is_some());

        assert_eq!(surface.frame(), FrameOutcome::Rescheduled);
        assert_eq!(surface.frame(), FrameOutcome::Rescheduled);
        let draws = probe.draws.borrow();
        assert_eq!(draws.len(), 2);
        assert!(draws.iter().all(|draw| draw.program.is_none()));
    }

    #[test]
    fn failed_rebind_keeps_previous_program() {
        let probe = Probe::default();
        let mut surface = attached_surface(&probe);
        surface.apply_source(ShaderSource::new(1, VALID_A, "")).unwrap();
        assert!(surface.apply_source(ShaderSource::new(2, INVALID, "")).is_err());

        assert_eq!(surface.program().map(|p| p.fragment.as_str()), Some(VALID_A));
        assert_eq!(surface.program_revision(), Some(1));
        assert_eq!(surface.error_revision(), Some(2));
        assert_eq!(probe.live_programs.get(), 1);

        surface.frame();
        assert_eq!(
            probe.draws.borrow().last().and_then(|d| d.program.clone()),
            Some(VALID_A.to_string())
        );
    }

    #[test]
    fn successful_rebind_replaces_and_clears_error() {
        let probe = Probe::default();
        let mut surface = attached_surface(&probe);
        surface.apply_source(ShaderSource::new(1, VALID_A, "")).unwrap();
        let _ = surface.apply_source(ShaderSource::new(2, INVALID, ""));
        surface.apply_source(ShaderSource::new(3, VALID_B, "")).unwrap();

        assert!(surface.last_error().is_none());
        assert_eq!(surface.program().map(|p| p.fragment.as_str()), Some(VALID_B));
        assert_eq!(probe.live_programs.get(), 1);
    }

    #[test]
    fn repeated_failures_do_not_accumulate_programs() {
        let probe = Probe::default();
        let mut surface = attached_surface(&probe);
        surface.apply_source(ShaderSource::new(1, VALID_A, "")).unwrap();
        for revision in 2..50 {
            let _ = surface.apply_source(ShaderSource::new(revision, INVALID, ""));
            surface.frame();
        }
        assert_eq!(probe.live_programs.get(), 1);
        assert_eq!(probe.bind_attempts.get(), 49);
    }

    #[test]
    fn frame_uses_its_own_clock_value() {
        let probe = Probe::default();
        let mut surface = attached_surface(&probe);
        surface.apply_source(ShaderSource::new(1, VALID_A, "")).unwrap();
        for _ in 0..3 {
            surface.frame();
        }
        let times: Vec<f64> = probe.draws.borrow().iter().map(|d| d.uniforms.time).collect();
        assert_eq!(times.len(), 3);
        assert_eq!(times[0], 0.0);
        assert!((times[1] - 0.01).abs() < 1e-12);
        assert!((times[2] - 0.02).abs() < 1e-12);
        assert_eq!(surface.last_uniforms().map(|u| u.frame), Some(2));
    }

    #[test]
    fn resize_is_visible_in_next_frame() {
        let probe = Probe::default();
        let mut surface = attached_surface(&probe);
        surface.apply_source(ShaderSource::new(1, VALID_A, "")).unwrap();
        surface.frame();
        surface.resize(SurfaceSize::new(1024, 768));
        surface.frame();

        let draws = probe.draws.borrow();
        assert_eq!(draws[0].uniforms.resolution_width, 640);
        assert_eq!(draws[1].uniforms.resolution_width, 1024);
        assert_eq!(draws[1].uniforms.resolution_height, 768);
    }

    #[test]
    fn transient_draw_error_keeps_scheduling() {
        let probe = Probe::default();
        let mut surface = attached_surface(&probe);
        surface.apply_source(ShaderSource::new(1, VALID_A, "")).unwrap();
        *probe.next_draw_error.borrow_mut() = Some(DrawError::Transient("timeout".into()));
        assert_eq!(surface.frame(), FrameOutcome::Rescheduled);
        assert_eq!(surface.frame(), FrameOutcome::Rescheduled);
        assert_eq!(probe.draws.borrow().len(), 1);
    }

    #[test]
    fn lost_target_tears_surface_down() {
        let probe = Probe::default();
        let mut surface = attached_surface(&probe);
        surface.apply_source(ShaderSource::new(1, VALID_A, "")).unwrap();
        *probe.next_draw_error.borrow_mut() = Some(DrawError::Lost("out of memory".into()));
        assert_eq!(surface.frame(), FrameOutcome::Cancelled);
        assert_eq!(surface.state(), SurfaceState::TornDown);
        assert_eq!(probe.live_programs.get(), 0);
    }

    #[test]
    fn teardown_cancels_pending_frame() {
        let probe = Probe::default();
        let mut surface = attached_surface(&probe);
        surface.apply_source(ShaderSource::new(1, VALID_A, "")).unwrap();
        assert!(surface.is_frame_pending());
        surface.teardown();
        assert!(!surface.is_frame_pending());
        assert_eq!(surface.frame(), FrameOutcome::Cancelled);
        assert!(probe.draws.borrow().is_empty());
        surface.teardown();
        assert_eq!(surface.state(), SurfaceState::TornDown);
    }
}
