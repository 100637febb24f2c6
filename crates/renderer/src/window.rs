use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use preview::{
    FrameOutcome, Persist, PreviewController, SurfaceHost, SurfaceId, SurfaceKind, SurfaceSize,
    SurfaceUnavailable,
};
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{
    ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget,
};
use winit::keyboard::{Key, ModifiersState, NamedKey};
use winit::window::{Window, WindowBuilder, WindowId};

use crate::compile::DEFAULT_VERTEX_SHADER;
use crate::gpu::GpuSurface;
use crate::types::RendererConfig;

pub const INLINE_TITLE: &str = "VJMix Preview";
pub const SECONDARY_TITLE: &str = "VJMix Preview (window)";

/// Messages other threads send into the preview event loop.
#[derive(Debug, Clone)]
pub enum PreviewEvent {
    /// The editor text changed; carries the full fragment source.
    SourceChanged(String),
    /// Close every window and leave the event loop.
    Shutdown,
}

/// Controller operations bound to keys in the preview windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Save,
    OpenSecondary,
    CloseSecondary,
    TogglePreview,
    ToggleOverlay,
}

/// Maps a pressed key to the controller operation it triggers.
pub fn key_action(key: &Key, modifiers: ModifiersState) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::F2) => Some(KeyAction::OpenSecondary),
        Key::Named(NamedKey::F3) => Some(KeyAction::TogglePreview),
        Key::Named(NamedKey::F4) => Some(KeyAction::ToggleOverlay),
        Key::Named(NamedKey::Escape) => Some(KeyAction::CloseSecondary),
        Key::Character(text)
            if modifiers.control_key() && text.as_str().eq_ignore_ascii_case("s") =>
        {
            Some(KeyAction::Save)
        }
        _ => None,
    }
}

/// Window title for a surface, carrying the current error banner if any.
pub fn window_title(kind: SurfaceKind, error: Option<&str>) -> String {
    let base = match kind {
        SurfaceKind::Inline => INLINE_TITLE,
        SurfaceKind::SecondaryWindow => SECONDARY_TITLE,
    };
    match error.and_then(|message| message.lines().next()) {
        Some(first_line) => format!("{base} | error: {first_line}"),
        None => base.to_string(),
    }
}

type Controller = PreviewController<GpuSurface>;

/// Creates winit windows for the controller on the live event loop.
struct WindowHost<'a> {
    target: &'a EventLoopWindowTarget<PreviewEvent>,
    config: &'a RendererConfig,
    windows: &'a mut HashMap<WindowId, SurfaceId>,
}

impl SurfaceHost for WindowHost<'_> {
    type Backend = GpuSurface;

    fn create_draw_target(
        &mut self,
        id: SurfaceId,
        kind: SurfaceKind,
    ) -> Result<GpuSurface, SurfaceUnavailable> {
        let (width, height) = match kind {
            SurfaceKind::Inline => self.config.inline_size,
            SurfaceKind::SecondaryWindow => self.config.secondary_size,
        };
        let window = WindowBuilder::new()
            .with_title(window_title(kind, None))
            .with_inner_size(PhysicalSize::new(width.max(1), height.max(1)))
            .build(self.target)
            .map_err(|err| SurfaceUnavailable(format!("failed to create window: {err}")))?;
        let window = Arc::new(window);

        let surface = GpuSurface::new(Arc::clone(&window), self.config)
            .map_err(|err| SurfaceUnavailable(format!("{err:#}")))?;
        self.windows.insert(window.id(), id);
        debug!(surface = %id, window = ?window.id(), "window registered");
        Ok(surface)
    }
}

/// Owns the event loop that drives every preview window of a session.
pub struct PreviewRuntime {
    event_loop: EventLoop<PreviewEvent>,
    config: RendererConfig,
}

impl PreviewRuntime {
    pub fn new(config: RendererConfig) -> Result<Self> {
        let event_loop = EventLoopBuilder::<PreviewEvent>::with_user_event()
            .build()
            .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
        Ok(Self { event_loop, config })
    }

    /// Handle for feeding [`PreviewEvent`]s from other threads.
    pub fn proxy(&self) -> EventLoopProxy<PreviewEvent> {
        self.event_loop.create_proxy()
    }

    /// Opens the preview windows and blocks until the last one closes.
    pub fn run<P>(self, fragment_text: String, mut persist: P) -> Result<()>
    where
        P: Persist,
    {
        let Self { event_loop, config } = self;
        let mut controller =
            Controller::new(fragment_text, DEFAULT_VERTEX_SHADER, config.time_step);
        let mut windows = HashMap::new();

        {
            let mut host = WindowHost {
                target: &event_loop,
                config: &config,
                windows: &mut windows,
            };
            controller
                .mount_inline(&mut host)
                .context("failed to open the inline preview")?;
            if config.open_secondary {
                if let Err(err) = controller.open_secondary_surface(&mut host) {
                    warn!(error = %err, "pop-out preview unavailable");
                }
            }
        }
        refresh_titles(&controller);
        for id in controller.surface_ids() {
            request_redraw(&controller, id);
        }

        let mut modifiers = ModifiersState::empty();
        let run_result = event_loop.run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);
            match event {
                Event::UserEvent(PreviewEvent::SourceChanged(fragment_text)) => {
                    controller.set_source(fragment_text);
                    refresh_titles(&controller);
                }
                Event::UserEvent(PreviewEvent::Shutdown) => {
                    controller.shutdown();
                    elwt.exit();
                }
                Event::WindowEvent { window_id, event } => {
                    let Some(&id) = windows.get(&window_id) else {
                        return;
                    };
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            windows.remove(&window_id);
                            if controller.handle_teardown(id) {
                                info!(surface = %id, "preview window closed");
                            }
                        }
                        WindowEvent::ModifiersChanged(state) => {
                            modifiers = state.state();
                        }
                        WindowEvent::KeyboardInput { event, .. }
                            if event.state == ElementState::Pressed && !event.repeat =>
                        {
                            if let Some(action) = key_action(&event.logical_key, modifiers) {
                                let mut host = WindowHost {
                                    target: elwt,
                                    config: &config,
                                    windows: &mut windows,
                                };
                                apply_key_action(
                                    &mut controller,
                                    &mut host,
                                    &mut persist,
                                    action,
                                    id,
                                );
                                refresh_titles(&controller);
                            }
                        }
                        WindowEvent::Resized(size) => {
                            if let Err(err) =
                                controller.resize(id, SurfaceSize::new(size.width, size.height))
                            {
                                debug!(error = %err, "resize for a closed surface ignored");
                            }
                        }
                        WindowEvent::RedrawRequested => match controller.frame(id) {
                            FrameOutcome::Rescheduled => request_redraw(&controller, id),
                            FrameOutcome::Cancelled => {
                                debug!(surface = %id, "frame loop stopped");
                            }
                        },
                        _ => {}
                    }

                    windows.retain(|_, surface| controller.surface(*surface).is_some());
                    if controller.surface_ids().is_empty() {
                        info!("no preview windows remain; exiting");
                        elwt.exit();
                    }
                }
                _ => {}
            }
        });

        run_result.map_err(|err| anyhow!("preview event loop error: {err}"))
    }
}

fn apply_key_action<P: Persist>(
    controller: &mut Controller,
    host: &mut WindowHost<'_>,
    persist: &mut P,
    action: KeyAction,
    from: SurfaceId,
) {
    match action {
        KeyAction::Save => {
            if let Err(err) = controller.save(persist) {
                error!(error = %err, "save failed");
            }
        }
        KeyAction::OpenSecondary => match controller.open_secondary_surface(host) {
            Ok(id) => request_redraw(controller, id),
            Err(err) => warn!(error = %err, "pop-out preview unavailable"),
        },
        KeyAction::CloseSecondary => {
            if controller.secondary_surface().is_some_and(|s| s.id() == from) {
                controller.close_secondary_surface();
            }
        }
        KeyAction::TogglePreview => {
            let visible = controller.visibility().preview;
            if visible && controller.secondary_surface().is_none() {
                // Hiding the only window would end the session.
                info!("open the pop-out preview (F2) before hiding the inline one");
                return;
            }
            match controller.set_preview_visible(host, !visible) {
                Ok(()) => {
                    if let Some(surface) = controller.inline_surface() {
                        request_redraw(controller, surface.id());
                    }
                }
                Err(err) => warn!(error = %err, "failed to show inline preview"),
            }
        }
        KeyAction::ToggleOverlay => {
            let shown = controller.toggle_code_overlay();
            debug!(shown, "code overlay toggled");
        }
    }
}

fn surface_window(controller: &Controller, id: SurfaceId) -> Option<&Arc<Window>> {
    controller
        .surface(id)
        .and_then(|surface| surface.backend())
        .map(GpuSurface::window)
}

fn request_redraw(controller: &Controller, id: SurfaceId) {
    if let Some(window) = surface_window(controller, id) {
        window.request_redraw();
    }
}

fn refresh_titles(controller: &Controller) {
    let error = controller.last_error().map(|err| err.message());
    for id in controller.surface_ids() {
        if let (Some(surface), Some(window)) =
            (controller.surface(id), surface_window(controller, id))
        {
            window.set_title(&window_title(surface.kind(), error));
        }
    }
}
