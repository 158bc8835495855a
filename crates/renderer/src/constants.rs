//! Constant blocks uploaded to the GPU (16-byte aligned rows).

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Per-frame constants: camera and time.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameConstants {
    pub world_to_camera: [[f32; 4]; 4],
    pub camera_to_projected: [[f32; 4]; 4],
    pub elapsed_seconds_system: f32,
    pub elapsed_seconds_simulation: f32,
    pub _padding0: [f32; 2],
    pub camera_position: [f32; 3],
    pub _padding1: f32,
}

impl Default for FrameConstants {
    fn default() -> Self {
        Self {
            world_to_camera: Mat4::IDENTITY.to_cols_array_2d(),
            camera_to_projected: Mat4::IDENTITY.to_cols_array_2d(),
            ..Zeroable::zeroed()
        }
    }
}

/// Per-draw constants: the command's transform and the scene light.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct DrawCallConstants {
    pub local_to_world: [[f32; 4]; 4],
    pub light_position: [f32; 3],
    pub _padding0: f32,
    pub light_color: [f32; 3],
    pub _padding1: f32,
}

impl DrawCallConstants {
    pub const DEFAULT_LIGHT_POSITION: [f32; 3] = [10.0, 5.0, 0.0];
    pub const DEFAULT_LIGHT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

    pub fn new(local_to_world: Mat4) -> Self {
        Self {
            local_to_world: local_to_world.to_cols_array_2d(),
            light_position: Self::DEFAULT_LIGHT_POSITION,
            light_color: Self::DEFAULT_LIGHT_COLOR,
            ..Zeroable::zeroed()
        }
    }
}

impl Default for DrawCallConstants {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY)
    }
}

/// Per-material colours. The shader reads `opacity` as `1 - transparency.r`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub base_color: [f32; 3],
    pub opacity: f32,
    pub specular_color: [f32; 3],
    pub _padding0: f32,
    pub ambient_color: [f32; 3],
    pub _padding1: f32,
    pub transparency: [f32; 3],
    pub _padding2: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_multiples_of_16_bytes() {
        assert_eq!(std::mem::size_of::<FrameConstants>() % 16, 0);
        assert_eq!(std::mem::size_of::<DrawCallConstants>() % 16, 0);
        assert_eq!(std::mem::size_of::<MaterialConstants>(), 64);
    }

    #[test]
    fn draw_call_defaults_to_white_light() {
        let constants = DrawCallConstants::default();
        assert_eq!(constants.light_position, [10.0, 5.0, 0.0]);
        assert_eq!(constants.light_color, [1.0, 1.0, 1.0]);
        assert_eq!(constants.local_to_world, Mat4::IDENTITY.to_cols_array_2d());
    }
}
