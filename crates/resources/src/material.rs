//! Material definitions.

use glam::Vec3;

/// Texture slot value meaning "no texture".
pub const NO_TEXTURE: usize = 0;

/// Surface description shared by the geometry and forward programs.
///
/// Texture fields index the registry's texture table. Index 0 is the white
/// placeholder and doubles as "absent": renderers check it before binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Base color multiplied with the albedo texture.
    pub albedo: Vec3,
    pub emissive: Vec3,
    /// 0.0 = rough, 1.0 = mirror-like.
    pub smoothness: f32,
    pub albedo_texture: usize,
    pub normal_texture: usize,
    pub height_texture: usize,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            albedo: Vec3::ONE,
            emissive: Vec3::ZERO,
            smoothness: 0.5,
            albedo_texture: NO_TEXTURE,
            normal_texture: NO_TEXTURE,
            height_texture: NO_TEXTURE,
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn has_albedo_texture(&self) -> bool {
        self.albedo_texture != NO_TEXTURE
    }

    #[inline]
    pub fn has_normal_texture(&self) -> bool {
        self.normal_texture != NO_TEXTURE
    }

    #[inline]
    pub fn has_height_texture(&self) -> bool {
        self.height_texture != NO_TEXTURE
    }
}
