//! Drawable scene entities.

use prism_core::RenderCategory;

use crate::transform::Transform;

/// A model instance placed in the world.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub name: String,
    pub transform: Transform,
    /// Index of the model in the resource registry.
    pub model: usize,
    /// Byte offset of this entity's block in the entity uniform buffer.
    /// Written by the uniform packer every frame.
    pub uniform_offset: u32,
    /// Byte size of that block.
    pub uniform_size: u32,
    pub category: RenderCategory,
    /// Whether the entity is drawn this frame; derived from the render mode.
    pub active: bool,
}

impl Entity {
    pub fn new(name: impl Into<String>, model: usize, category: RenderCategory) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            model,
            uniform_offset: 0,
            uniform_size: 0,
            category,
            active: false,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}
