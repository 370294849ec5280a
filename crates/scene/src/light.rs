//! Light definitions for the scene.

use glam::Vec3;
use prism_core::RenderCategory;

/// Kind of light. The discriminant is the tag the shaders switch on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LightKind {
    /// Sun-like light; only `direction` is used.
    #[default]
    Directional = 0,
    /// Omnidirectional light; only `position` is used.
    Point = 1,
}

impl LightKind {
    /// Tag written into the light block.
    #[inline]
    pub fn tag(self) -> u32 {
        self as u32
    }
}

/// A light tagged with the render category it takes part in.
///
/// Both `direction` and `position` are stored for every kind so that an
/// editor can switch kinds without losing values; the unused one is ignored.
#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    /// Direction the light travels in (normalized)
    pub direction: Vec3,
    /// Light position in world space
    pub position: Vec3,
    pub category: RenderCategory,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Directional,
            color: Vec3::ONE,
            intensity: 1.0,
            direction: Vec3::NEG_Y,
            position: Vec3::ZERO,
            category: RenderCategory::default(),
        }
    }
}

impl Light {
    /// Create a directional light.
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            ..Default::default()
        }
    }

    /// Create a point light.
    pub fn point(position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            color,
            intensity,
            ..Default::default()
        }
    }

    /// Tag the light with a render category.
    pub fn with_category(mut self, category: RenderCategory) -> Self {
        self.category = category;
        self
    }

    /// Color premultiplied by intensity, as the shaders consume it.
    #[inline]
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }
}
