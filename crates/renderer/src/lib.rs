//! Renderer crate for voxelreel, a glitch-themed voxel image slideshow.
//!
//! The crate splits into a CPU core that can run headless and a thin wgpu
//! front end. The overall flow is:
//!
//! ```text
//!   winit input ──▶ Scene (pointer, TransitionController, assets, palettes)
//!                      │ tick(TimeSample)
//!                      ▼
//!               UniformSyncDriver ──▶ UniformFrame ──▶ GpuState ──▶ layers
//! ```
//!
//! `Scene` owns every mutable piece of slideshow state and is what the
//! `simulate` command drives with a stepped clock. `run_window` adds the
//! window, the surface and the six render layers on top (liquid background,
//! floating cubes, dust, base plane, voxel fragments, interference) and a
//! bloom and grain composite.

pub mod ambient;
pub mod assets;
pub mod camera;
pub mod color;
mod compile;
pub mod composite;
mod easing;
pub mod fragments;
mod gpu;
pub mod mesh;
pub mod palette;
pub mod pointer;
pub mod runtime;
pub mod scene;
pub mod sync;
pub mod types;
mod window;

pub use assets::{ContentState, SlideAssets};
pub use color::Rgb;
pub use palette::{extract, Palette, WorkStrategy};
pub use pointer::{PointerState, PointerTracker};
pub use runtime::{FramePacer, SteppedTimeSource, SystemTimeSource, TimeSample, TimeSource};
pub use scene::{HudSnapshot, Scene, SceneFrame, SceneOptions};
pub use sync::{UniformFrame, UniformSyncDriver};
pub use types::{AdapterProfile, Antialiasing, ColorSpaceMode, RendererConfig};
pub use window::run_window;
