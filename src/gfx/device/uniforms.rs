use cgmath::{Matrix4, SquareMatrix};

use crate::gfx::transform::to_array;

/// Upper bound on non-ambient lights a single draw can receive.
pub const MAX_LIGHTS: usize = 4;

pub const LIGHT_NONE: f32 = 0.0;
pub const LIGHT_DIRECTIONAL: f32 = 1.0;
pub const LIGHT_POINT: f32 = 2.0;

/// One light slot, mirrored by `Light` in the WGSL sources.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// rgb color, w = kind (`LIGHT_*`)
    pub color: [f32; 4],
    /// xyz world direction, w = 1 when this light's shadow map is bound
    pub direction: [f32; 4],
    pub position: [f32; 4],
    /// constant, linear, quadratic
    pub attenuation: [f32; 4],
}

impl LightUniform {
    /// True for an unused slot.
    pub fn is_empty(&self) -> bool {
        self.color[3] == LIGHT_NONE
    }
}

/// Per-draw uniform block shared by every built-in program.
///
/// All members are 16-byte multiples so the layout matches WGSL uniform
/// rules without padding.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_space: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub base_color: [f32; 4],
    /// Summed ambient light, rgb.
    pub ambient: [f32; 4],
    /// specular strength, shininess, point size, shading model
    pub material: [f32; 4],
    /// use vertex colors, use texture, use shadow, light count
    pub flags: [u32; 4],
    /// repeat.xy, offset.xy
    pub uv_transform: [f32; 4],
    /// bias, strength
    pub shadow: [f32; 4],
    pub lights: [LightUniform; MAX_LIGHTS],
}

impl DrawUniforms {
    pub fn set_model(&mut self, model: &Matrix4<f32>) {
        self.model = to_array(model);
    }

    pub fn set_camera(&mut self, view: &Matrix4<f32>, projection: &Matrix4<f32>, position: [f32; 3]) {
        self.view = to_array(view);
        self.projection = to_array(projection);
        self.camera_position = [position[0], position[1], position[2], 1.0];
    }

    pub fn light_count(&self) -> usize {
        self.flags[3] as usize
    }
}

impl Default for DrawUniforms {
    fn default() -> Self {
        let identity = to_array(&Matrix4::identity());
        Self {
            model: identity,
            view: identity,
            projection: identity,
            light_space: identity,
            camera_position: [0.0, 0.0, 0.0, 1.0],
            base_color: [1.0, 1.0, 1.0, 1.0],
            ambient: [0.0; 4],
            material: [0.0, 1.0, 1.0, 0.0],
            flags: [0; 4],
            uv_transform: [1.0, 1.0, 0.0, 0.0],
            shadow: [0.0; 4],
            lights: [LightUniform::default(); MAX_LIGHTS],
        }
    }
}

impl Default for LightUniform {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, LIGHT_NONE],
            direction: [0.0, -1.0, 0.0, 0.0],
            position: [0.0, 0.0, 0.0, 1.0],
            attenuation: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_block_is_sixteen_byte_aligned() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 64);
        assert_eq!(std::mem::size_of::<DrawUniforms>() % 16, 0);
        assert_eq!(
            std::mem::size_of::<DrawUniforms>(),
            4 * 64 + 7 * 16 + MAX_LIGHTS * 64
        );
    }
}
