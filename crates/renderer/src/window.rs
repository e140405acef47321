use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use sequencer::Direction;
use slideconfig::SlideshowConfig;
use tracing::{error, info, trace, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::gpu::GpuState;
use crate::runtime::{FramePacer, SystemTimeSource, TimeSource};
use crate::scene::{Scene, SceneOptions};
use crate::types::RendererConfig;

const SOFTWARE_FPS_CAP: f32 = 30.0;
/// Pixels per wheel line for devices reporting line deltas.
const WHEEL_LINE_PIXELS: f32 = 100.0;

/// A slideshow request decoded from one key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Advance(Direction),
    Select(i64),
    Close,
}

fn key_action(event: &KeyEvent) -> Option<KeyAction> {
    if event.state != ElementState::Pressed || event.repeat {
        return None;
    }
    action_for_key(&event.logical_key)
}

fn action_for_key(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::ArrowRight | NamedKey::Space) => {
            Some(KeyAction::Advance(Direction::Forward))
        }
        Key::Named(NamedKey::ArrowLeft) => Some(KeyAction::Advance(Direction::Backward)),
        Key::Named(NamedKey::Escape) => Some(KeyAction::Close),
        Key::Character(value) => match value.as_str() {
            " " => Some(KeyAction::Advance(Direction::Forward)),
            digit => digit
                .parse::<i64>()
                .ok()
                .filter(|number| (1..=9).contains(number))
                .map(|number| KeyAction::Select(number - 1)),
        },
        _ => None,
    }
}

/// Converts a wheel event into the slideshow's pixel convention, where a
/// positive value scrolls down and advances forward.
fn wheel_pixels(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y * WHEEL_LINE_PIXELS,
        MouseScrollDelta::PixelDelta(position) => -(position.y as f32),
    }
}

struct WindowState {
    window: Arc<Window>,
    gpu: GpuState,
    scene: Scene,
    title: String,
}

impl WindowState {
    fn render(&mut self, time: &mut SystemTimeSource) -> Result<(), wgpu::SurfaceError> {
        let frame = self.scene.tick(time.sample());
        let title = frame.hud.window_title();
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
        self.gpu.render(&frame, &self.scene)
    }
}

/// Opens the slideshow window and runs it until the user closes it.
pub fn run_window(config: SlideshowConfig, renderer: RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(renderer.surface_size.0, renderer.surface_size.1);
    let window = WindowBuilder::new()
        .with_title("voxelreel")
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create slideshow window: {err}"))?;
    let window = Arc::new(window);

    let scene = Scene::new(
        config,
        SceneOptions {
            seed: renderer.seed,
            ..SceneOptions::default()
        },
        Instant::now(),
    )?;
    let gpu = GpuState::new(
        window.as_ref(),
        window.inner_size(),
        renderer.antialiasing,
        renderer.color_space,
        &scene,
    )
    .map_err(|err| anyhow!("failed to initialise window renderer: {err}"))?;

    let profile = gpu.adapter_profile().clone();
    let target_fps = match renderer.target_fps {
        None if profile.is_software() => {
            warn!(
                adapter = %profile.name,
                backend = ?profile.backend,
                cap = SOFTWARE_FPS_CAP,
                "software rasterizer detected; capping frame rate (override with --fps)"
            );
            Some(SOFTWARE_FPS_CAP)
        }
        other => other,
    };
    info!(
        adapter = %profile.name,
        backend = ?profile.backend,
        antialiasing = %renderer.antialiasing,
        target_fps = ?target_fps,
        "slideshow window ready"
    );

    let mut state = WindowState {
        window,
        gpu,
        scene,
        title: String::new(),
    };
    let mut pacer = FramePacer::new(target_fps);
    let mut time = SystemTimeSource::new();
    state.window.request_redraw();

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                    WindowEvent::KeyboardInput { event, .. } => match key_action(&event) {
                        Some(KeyAction::Advance(direction)) => {
                            state.scene.advance(direction, Instant::now());
                        }
                        Some(KeyAction::Select(index)) => {
                            state.scene.select_index(index, Instant::now());
                        }
                        Some(KeyAction::Close) => elwt.exit(),
                        None => {}
                    },
                    WindowEvent::CursorMoved { position, .. } => {
                        state
                            .scene
                            .pointer_moved_physical(position, state.gpu.size());
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        state.scene.wheel(wheel_pixels(delta), Instant::now());
                    }
                    WindowEvent::Resized(new_size) => state.gpu.resize(new_size),
                    WindowEvent::ScaleFactorChanged {
                        mut inner_size_writer,
                        ..
                    } => {
                        let _ = inner_size_writer.request_inner_size(state.gpu.size());
                    }
                    WindowEvent::RedrawRequested => match state.render(&mut time) {
                        Ok(()) => pacer.mark_rendered(Instant::now()),
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            state.gpu.recover_surface();
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            error!("surface out of memory; closing slideshow");
                            elwt.exit();
                        }
                        Err(wgpu::SurfaceError::Timeout) => {
                            warn!("surface timeout; retrying next frame");
                        }
                        Err(other) => {
                            warn!(error = ?other, "surface error; retrying next frame");
                        }
                    },
                    _ => {}
                }
            }
            Event::AboutToWait => {
                let now = Instant::now();
                if pacer.ready_for_frame(now) {
                    trace!("pacer: issuing redraw now");
                    state.window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                } else if let Some(deadline) = pacer.next_deadline() {
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                } else {
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}
