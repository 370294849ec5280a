//! Uniform block layouts shared with the GLSL programs.
//!
//! Two std140 blocks are used by every scene program:
//!
//! - `GlobalParams` at binding [`GLOBAL_PARAMS_BINDING`]: camera position and
//!   the lights of the active render category.
//! - `EntityParams` at binding [`ENTITY_PARAMS_BINDING`]: one
//!   [`EntityUniforms`] per entity, bound by range.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use prism_rhi::RhiResult;
use prism_rhi::buffer::{Buffer, STD140_VEC4_ALIGNMENT};
use prism_scene::Light;
use prism_scene::transform::normal_matrix;

/// Binding point of the `GlobalParams` block.
pub const GLOBAL_PARAMS_BINDING: u32 = 0;

/// Binding point of the `EntityParams` block.
pub const ENTITY_PARAMS_BINDING: u32 = 1;

pub const GLOBAL_PARAMS_BLOCK: &str = "GlobalParams";
pub const ENTITY_PARAMS_BLOCK: &str = "EntityParams";

/// Length of the `uLights` array the programs declare.
///
/// Programs receive it as the `MAX_LIGHTS` define, see [`MAX_LIGHTS_DEFINE`].
pub const MAX_SHADER_LIGHTS: u32 = 16;

/// Preprocessor symbol carrying [`MAX_SHADER_LIGHTS`] into the programs.
pub const MAX_LIGHTS_DEFINE: &str = "MAX_LIGHTS";

/// Byte offset of the light array inside `GlobalParams`.
pub const LIGHT_ARRAY_OFFSET: u32 = 16;

/// std140 size of one light.
pub const LIGHT_STRIDE: u32 = 64;

/// Per-entity uniform data.
///
/// # Memory Layout (std140)
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 64   | model |
/// | 64     | 64   | normal_matrix |
/// | 128    | 64   | mvp |
///
/// Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct EntityUniforms {
    /// Model matrix (object to world space).
    pub model: Mat4,
    /// Inverse transpose of `model`; identity for singular models.
    pub normal_matrix: Mat4,
    /// Model-view-projection matrix.
    pub mvp: Mat4,
}

impl EntityUniforms {
    /// Size of the struct in bytes.
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn new(model: Mat4, view_projection: Mat4) -> Self {
        Self {
            model,
            normal_matrix: normal_matrix(model),
            mvp: view_projection * model,
        }
    }
}

/// Bytes needed by `GlobalParams` holding `light_count` lights.
#[inline]
pub const fn global_params_size(light_count: u32) -> u32 {
    LIGHT_ARRAY_OFFSET + light_count * LIGHT_STRIDE
}

/// std140 data size of `GlobalParams` as the programs declare it.
pub const GLOBAL_PARAMS_BLOCK_SIZE: u32 = global_params_size(MAX_SHADER_LIGHTS);

/// Writes the `GlobalParams` block into a mapped buffer.
///
/// ```glsl
/// struct Light {
///     uint type;       // +0
///     vec3 color;      // +16, premultiplied by intensity
///     vec3 direction;  // +32
///     vec3 position;   // +48
/// };
/// layout(binding = 0, std140) uniform GlobalParams {
///     vec3 uCameraPosition;  // 0
///     uint uLightCount;      // 12
///     Light uLights[MAX_LIGHTS]; // 16
/// };
/// ```
///
/// Returns the number of bytes written.
pub fn pack_global_params<'a>(
    buffer: &mut Buffer,
    camera_position: Vec3,
    lights: impl ExactSizeIterator<Item = &'a Light>,
) -> RhiResult<u32> {
    buffer.push_vec3(camera_position)?;
    buffer.push_u32(lights.len() as u32)?;

    for light in lights {
        // Each array element starts on a vec4 boundary
        buffer.align_head(STD140_VEC4_ALIGNMENT)?;
        buffer.push_u32(light.kind.tag())?;
        buffer.push_vec3(light.radiance())?;
        buffer.push_vec3(light.direction)?;
        buffer.push_vec3(light.position)?;
    }
    buffer.align_head(STD140_VEC4_ALIGNMENT)?;
    Ok(buffer.head())
}
