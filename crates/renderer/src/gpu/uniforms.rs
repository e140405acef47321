use bytemuck::{Pod, Zeroable};
use winit::dpi::PhysicalSize;

use crate::ambient::{dust_color, DUST_OPACITY};
use crate::assets::ContentState;
use crate::camera::{dust_model, dust_quad_size, scene_model, CameraRig};
use crate::color::Rgb;
use crate::composite::{BLOOM_SMOOTHING, BLOOM_THRESHOLD, GRAIN_OPACITY};
use crate::sync::UniformFrame;

use super::context::SurfaceColorSpace;

/// std140 mirror of the `FrameUniforms` block in `shaders/prelude.glsl`.
/// Every field is a `vec4` or `mat4`, so no explicit padding is needed.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct FrameUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub dust_model: [[f32; 4]; 4],
    pub resolution: [f32; 4],
    pub clock: [f32; 4],
    pub transition: [f32; 4],
    pub content: [f32; 4],
    pub pointer: [f32; 4],
    pub accent: [f32; 4],
    pub dust_color: [f32; 4],
    pub post: [f32; 4],
    pub corners: [[f32; 4]; 4],
}

impl FrameUniforms {
    /// Packs `frame` for the GPU. Palette colours are sRGB-encoded and are
    /// decoded to linear light when the surface encodes on write.
    pub fn new(
        frame: &UniformFrame,
        size: PhysicalSize<u32>,
        background_scale: f32,
        color_space: SurfaceColorSpace,
    ) -> Self {
        let width = size.width.max(1) as f32;
        let height = size.height.max(1) as f32;
        let aspect = width / height;
        let camera = CameraRig::new(frame.parallax, aspect);
        let surface_color = |color: Rgb| match color_space {
            SurfaceColorSpace::Gamma => color,
            SurfaceColorSpace::Linear => color.to_linear(),
        };
        let has_texture = if frame.content == ContentState::Ready {
            1.0
        } else {
            0.0
        };

        Self {
            view: camera.view.to_cols_array_2d(),
            projection: camera.projection.to_cols_array_2d(),
            model: scene_model(frame.tilt).to_cols_array_2d(),
            dust_model: dust_model(frame.dust_offset, frame.time).to_cols_array_2d(),
            resolution: [width, height, aspect, dust_quad_size()],
            clock: [
                frame.time,
                frame.delta,
                frame.frame_index as f32,
                frame.seed,
            ],
            transition: [
                frame.progress,
                frame.exit_progress,
                frame.interference,
                frame.glitch,
            ],
            content: [
                frame.content_weight,
                frame.direction,
                has_texture,
                background_scale,
            ],
            pointer: [
                frame.mouse[0],
                frame.mouse[1],
                frame.background_mouse[0],
                frame.background_mouse[1],
            ],
            accent: surface_color(frame.accent).to_vec4(1.0),
            dust_color: surface_color(dust_color(frame.accent)).to_vec4(DUST_OPACITY),
            post: [frame.bloom, GRAIN_OPACITY, BLOOM_THRESHOLD, BLOOM_SMOOTHING],
            corners: frame
                .palette
                .corners()
                .map(|corner| surface_color(corner).to_vec4(1.0)),
        }
    }
}
