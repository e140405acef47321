//! wgpu side of the slideshow.
//!
//! - `context` owns the instance, surface and device and rebuilds the
//!   swapchain on resize.
//! - `pipeline` compiles the layer shaders into render pipelines that share
//!   one uniform bind group layout.
//! - `layers` holds the six layer pipelines with their static geometry and
//!   records them in draw order into the offscreen scene target.
//! - `post` blooms the scene target and composites it, with film grain,
//!   onto the surface.
//! - `textures` uploads decoded slide images on first use.
//! - `uniforms` packs a `UniformFrame` into the std140 block the shaders read.
//! - `state` glues everything together behind the `GpuState` API used by
//!   `window`.

mod context;
mod layers;
mod pipeline;
mod post;
mod state;
mod textures;
mod uniforms;

pub(crate) use state::GpuState;
