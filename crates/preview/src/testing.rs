//! In-memory backend used by the unit tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::binder::{CompileError, DrawError, ProgramBinder, SurfaceBackend};
use crate::controller::{SurfaceHost, SurfaceUnavailable};
use crate::source::ShaderSource;
use crate::surface::{SurfaceId, SurfaceKind};
use crate::uniforms::{SurfaceSize, Uniforms};

pub const VALID_A: &str = "void main() { gl_FragColor = vec4(1.0); }";
pub const VALID_B: &str = "void main() { gl_FragColor = vec4(0.5); }";
pub const INVALID: &str = "invalid{";

/// Shared view into a fake backend so tests can observe it after handing it
/// to a surface.
#[derive(Clone, Default)]
pub struct Probe {
    pub live_programs: Rc<Cell<i64>>,
    pub size: Rc<Cell<Option<SurfaceSize>>>,
    pub draws: Rc<RefCell<Vec<DrawRecord>>>,
    pub next_draw_error: Rc<RefCell<Option<DrawError>>>,
    pub released: Rc<Cell<bool>>,
    pub bind_attempts: Rc<Cell<u32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Fragment text of the program used, `None` for the fallback visual.
    pub program: Option<String>,
    pub uniforms: Uniforms,
}

pub struct FakeProgram {
    pub fragment: String,
    live: Rc<Cell<i64>>,
}

impl Drop for FakeProgram {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

pub struct FakeBackend {
    probe: Probe,
}

impl FakeBackend {
    pub fn new(probe: Probe) -> Self {
        if probe.size.get().is_none() {
            probe.size.set(Some(SurfaceSize::new(640, 360)));
        }
        Self { probe }
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.probe.released.set(true);
    }
}

impl ProgramBinder for FakeBackend {
    type Program = FakeProgram;

    fn bind(&mut self, source: &ShaderSource) -> Result<FakeProgram, CompileError> {
        self.probe
            .bind_attempts
            .set(self.probe.bind_attempts.get() + 1);
        let text = source.fragment_text();
        let balanced = text.matches('{').count() == text.matches('}').count();
        if !balanced || text.contains("invalid") {
            return Err(CompileError::new(format!(
                "0:1: syntax error in `{}`",
                text.trim()
            )));
        }
        self.probe
            .live_programs
            .set(self.probe.live_programs.get() + 1);
        Ok(FakeProgram {
            fragment: text.to_string(),
            live: Rc::clone(&self.probe.live_programs),
        })
    }
}

impl SurfaceBackend for FakeBackend {
    fn measure(&self) -> SurfaceSize {
        self.probe.size.get().unwrap_or(SurfaceSize::new(1, 1))
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.probe.size.set(Some(size));
    }

    fn draw(&mut self, program: Option<&FakeProgram>, uniforms: &Uniforms) -> Result<(), DrawError> {
        if let Some(err) = self.probe.next_draw_error.borrow_mut().take() {
            return Err(err);
        }
        self.probe.draws.borrow_mut().push(DrawRecord {
            program: program.map(|p| p.fragment.clone()),
            uniforms: *uniforms,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeHost {
    pub blocked: bool,
    pub opened: Vec<(SurfaceId, SurfaceKind, Probe)>,
}

impl FakeHost {
    pub fn probe(&self, id: SurfaceId) -> Probe {
        self.opened
            .iter()
            .find(|(opened, _, _)| *opened == id)
            .map(|(_, _, probe)| probe.clone())
            .expect("surface was opened through this host")
    }
}

impl SurfaceHost for FakeHost {
    type Backend = FakeBackend;

    fn create_draw_target(
        &mut self,
        id: SurfaceId,
        kind: SurfaceKind,
    ) -> Result<FakeBackend, SurfaceUnavailable> {
        if self.blocked && kind == SurfaceKind::SecondaryWindow {
            return Err(SurfaceUnavailable("popup blocked".into()));
        }
        let probe = Probe::default();
        self.opened.push((id, kind, probe.clone()));
        Ok(FakeBackend::new(probe))
    }
}
