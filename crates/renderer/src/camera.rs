//! Camera and model transforms derived from a `UniformFrame`.

use glam::{EulerRot, Mat4, Vec3};

use crate::ambient::{dust_rotation, DUST_POINT_SIZE};

/// Distance from the camera to the image grid along +Z.
pub const CAMERA_DISTANCE: f32 = 48.0;
pub const FOV_Y_DEGREES: f32 = 24.0;
pub const NEAR: f32 = 0.1;
pub const FAR: f32 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraRig {
    pub eye: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl CameraRig {
    /// Camera swung by `parallax`, always looking at the grid centre.
    pub fn new(parallax: [f32; 2], aspect: f32) -> Self {
        let eye = Vec3::new(parallax[0], parallax[1], CAMERA_DISTANCE);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(fov_y(), aspect.max(0.1), NEAR, FAR);
        Self {
            eye,
            view,
            projection,
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }
}

pub fn fov_y() -> f32 {
    FOV_Y_DEGREES.to_radians()
}

/// Rotation applied to the voxel grid and the base plane.
pub fn scene_model(tilt: [f32; 2]) -> Mat4 {
    Mat4::from_euler(EulerRot::XYZ, tilt[0], tilt[1], 0.0)
}

/// Placement of the dust cloud: pointer counter-parallax plus slow wobble.
pub fn dust_model(offset: [f32; 2], time: f32) -> Mat4 {
    let (pitch, yaw) = dust_rotation(time);
    Mat4::from_translation(Vec3::new(offset[0], offset[1], 0.0))
        * Mat4::from_euler(EulerRot::XYZ, pitch, yaw, 0.0)
}

/// View-space edge length of a dust billboard. Matches a perspective-attenuated
/// point sprite of `DUST_POINT_SIZE`.
pub fn dust_quad_size() -> f32 {
    DUST_POINT_SIZE * (fov_y() * 0.5).tan()
}
