//! Background instance fields: slowly drifting cubes and the dust cloud.
//!
//! Both arenas are generated once from the scene RNG and uploaded as static
//! instance buffers; motion happens entirely in the vertex shaders
//! (`shaders/cubes.vert`, `shaders/dust.vert`), which read the cube constants
//! below from the generated shader header.

use bytemuck::{Pod, Zeroable};
use rand::Rng;
use slideconfig::SceneParams;

use crate::color::Rgb;
use crate::fragments::random4;

const CUBE_SPREAD: [f32; 2] = [140.0, 110.0];
const CUBE_DEPTH: (f32, f32) = (-140.0, 152.0);
pub const CUBE_BASE_SCALE: f32 = 0.36;
/// Horizontal glitch bands across the cube field's vertical span.
pub const CUBE_BANDS: f32 = 24.0;
/// Vertical world span divided into [`CUBE_BANDS`], centred on the origin.
pub const CUBE_BAND_SPAN: f32 = 150.0;
pub const CUBE_GLITCH_CUTOFF: f32 = 0.05;
/// Band hash above which a band of cubes is displaced.
pub const CUBE_TEAR_THRESHOLD: f32 = 0.35;

const DUST_SPREAD: [f32; 2] = [120.0, 100.0];
const DUST_DEPTH: (f32, f32) = (-10.0, 55.0);
pub const DUST_POINT_SIZE: f32 = 0.12;
pub const DUST_OPACITY: f32 = 0.35;
/// Per-frame approach rate of the dust cloud's counter-parallax.
pub const DUST_PARALLAX_RATE: f32 = 0.02;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CubeInstance {
    pub position: [f32; 3],
    pub _pad: f32,
    pub random: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct DustInstance {
    pub position: [f32; 3],
    pub _pad: f32,
}

#[derive(Debug, Clone)]
pub struct CubeField {
    instances: Vec<CubeInstance>,
}

impl CubeField {
    pub fn generate<R: Rng + ?Sized>(params: &SceneParams, rng: &mut R) -> Self {
        let instances = (0..params.floating_cubes)
            .map(|_| {
                let position = [
                    (rng.gen::<f32>() - 0.5) * CUBE_SPREAD[0],
                    (rng.gen::<f32>() - 0.5) * CUBE_SPREAD[1],
                    CUBE_DEPTH.0 + rng.gen::<f32>() * CUBE_DEPTH.1,
                ];
                CubeInstance {
                    position,
                    _pad: 0.0,
                    random: random4(rng),
                }
            })
            .collect();
        Self { instances }
    }

    pub fn instances(&self) -> &[CubeInstance] {
        &self.instances
    }
}

#[derive(Debug, Clone)]
pub struct DustField {
    instances: Vec<DustInstance>,
}

impl DustField {
    pub fn generate<R: Rng + ?Sized>(params: &SceneParams, rng: &mut R) -> Self {
        let instances = (0..params.dust)
            .map(|_| DustInstance {
                position: [
                    (rng.gen::<f32>() - 0.5) * DUST_SPREAD[0],
                    (rng.gen::<f32>() - 0.5) * DUST_SPREAD[1],
                    DUST_DEPTH.0 + rng.gen::<f32>() * DUST_DEPTH.1,
                ],
                _pad: 0.0,
            })
            .collect();
        Self { instances }
    }

    pub fn instances(&self) -> &[DustInstance] {
        &self.instances
    }
}

/// Tint of the dust cloud for the current accent.
pub fn dust_color(accent: Rgb) -> Rgb {
    accent.lerp(Rgb::WHITE, 0.5)
}

/// Target offset of the dust cloud for a raw top-left-origin pointer.
pub fn dust_parallax_target(pointer: [f32; 2]) -> [f32; 2] {
    [(pointer[0] - 0.5) * -1.5, (pointer[1] - 0.5) * 1.5]
}

/// Slow wobble of the whole dust cloud as `(pitch, yaw)` in radians.
pub fn dust_rotation(time: f32) -> (f32, f32) {
    ((time * 0.1).cos() * 0.05, (time * 0.1).sin() * 0.05)
}
