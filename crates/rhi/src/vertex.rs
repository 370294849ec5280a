//! Vertex data structures and input descriptions.
//!
//! A [`VertexBufferLayout`] describes how attributes sit inside one
//! interleaved vertex buffer. Programs declare the attributes they consume
//! ([`crate::shader::VertexShaderAttribute`]); matching the two produces a
//! [`VertexArrayDescriptor`].
//!
//! # Vertex Types
//!
//! - [`Vertex`] - Full mesh vertex with position, normal, UV, tangent, bitangent
//! - [`QuadVertex`] - Screen-space quad vertex with position and UV
//! - [`PositionVertex`] - Position only, for the skybox cube

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::device::BufferHandle;

/// One attribute inside an interleaved vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexBufferAttribute {
    /// Shader input location.
    pub location: u32,
    /// Number of `f32` components.
    pub component_count: u32,
    /// Byte offset inside one vertex.
    pub offset: u32,
}

/// Attribute list plus stride of an interleaved vertex buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VertexBufferLayout {
    pub attributes: Vec<VertexBufferAttribute>,
    pub stride: u32,
}

impl VertexBufferLayout {
    /// An empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a tightly packed `f32` attribute and grows the stride.
    pub fn with_attribute(mut self, location: u32, component_count: u32) -> Self {
        self.attributes.push(VertexBufferAttribute {
            location,
            component_count,
            offset: self.stride,
        });
        self.stride += component_count * 4;
        self
    }

    /// Finds the attribute bound to `location`.
    pub fn find(&self, location: u32) -> Option<&VertexBufferAttribute> {
        self.attributes.iter().find(|a| a.location == location)
    }
}

/// An attribute wired into a vertex array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttributeBinding {
    pub location: u32,
    pub component_count: u32,
    /// Byte offset of the first element inside the vertex buffer.
    pub offset: u32,
    pub stride: u32,
}

/// Everything needed to create a vertex array object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VertexArrayDescriptor {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub attributes: Vec<VertexAttributeBinding>,
}

/// Standard mesh vertex format.
///
/// # Memory Layout
///
/// - Offset 0: position (12 bytes)
/// - Offset 12: normal (12 bytes)
/// - Offset 24: tex_coord (8 bytes)
/// - Offset 32: tangent (12 bytes)
/// - Offset 44: bitangent (12 bytes)
/// - Total size: 56 bytes
///
/// # Shader Locations
///
/// - location 0: position (vec3)
/// - location 1: normal (vec3)
/// - location 2: tex_coord (vec2)
/// - location 3: tangent (vec3)
/// - location 4: bitangent (vec3)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// 3D position in object space.
    pub position: Vec3,
    /// Surface normal vector (should be normalized).
    pub normal: Vec3,
    /// Texture coordinates (UV).
    pub tex_coord: Vec2,
    /// Tangent along increasing U.
    pub tangent: Vec3,
    /// Bitangent along increasing V.
    pub bitangent: Vec3,
}

impl Vertex {
    /// Creates a new vertex with the specified attributes.
    #[inline]
    pub const fn new(
        position: Vec3,
        normal: Vec3,
        tex_coord: Vec2,
        tangent: Vec3,
        bitangent: Vec3,
    ) -> Self {
        Self {
            position,
            normal,
            tex_coord,
            tangent,
            bitangent,
        }
    }

    /// Returns the size of the vertex in bytes.
    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Layout of an interleaved buffer of these vertices.
    pub fn layout() -> VertexBufferLayout {
        VertexBufferLayout::new()
            .with_attribute(0, 3)
            .with_attribute(1, 3)
            .with_attribute(2, 2)
            .with_attribute(3, 3)
            .with_attribute(4, 3)
    }
}

/// Screen-space quad vertex.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: Vec3,
    pub tex_coord: Vec2,
}

impl QuadVertex {
    #[inline]
    pub const fn new(position: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            tex_coord,
        }
    }

    pub fn layout() -> VertexBufferLayout {
        VertexBufferLayout::new()
            .with_attribute(0, 3)
            .with_attribute(1, 2)
    }
}

/// Position-only vertex.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    pub position: Vec3,
}

impl PositionVertex {
    pub fn layout() -> VertexBufferLayout {
        VertexBufferLayout::new().with_attribute(0, 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        // Vertex: 4 x Vec3 (48) + Vec2 (8) = 56 bytes
        assert_eq!(std::mem::size_of::<Vertex>(), 56);
        assert_eq!(Vertex::size(), 56);
    }

    #[test]
    fn test_vertex_layout_matches_struct() {
        use std::mem::offset_of;

        let layout = Vertex::layout();
        assert_eq!(layout.stride as usize, Vertex::size());
        assert_eq!(layout.attributes.len(), 5);

        assert_eq!(layout.find(0).unwrap().offset as usize, offset_of!(Vertex, position));
        assert_eq!(layout.find(1).unwrap().offset as usize, offset_of!(Vertex, normal));
        assert_eq!(layout.find(2).unwrap().offset as usize, offset_of!(Vertex, tex_coord));
        assert_eq!(layout.find(3).unwrap().offset as usize, offset_of!(Vertex, tangent));
        assert_eq!(layout.find(4).unwrap().offset as usize, offset_of!(Vertex, bitangent));
        assert_eq!(layout.find(2).unwrap().component_count, 2);
    }

    #[test]
    fn test_quad_vertex_layout() {
        let layout = QuadVertex::layout();
        assert_eq!(layout.stride, 20);
        assert_eq!(std::mem::size_of::<QuadVertex>(), 20);
        assert_eq!(layout.find(1).unwrap().offset, 12);
    }

    #[test]
    fn test_position_vertex_layout() {
        let layout = PositionVertex::layout();
        assert_eq!(layout.stride, 12);
        assert!(layout.find(1).is_none());
    }

    #[test]
    fn test_vertex_new() {
        let vertex = Vertex::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::Y,
            Vec2::new(0.5, 0.5),
            Vec3::X,
            Vec3::Z,
        );

        assert_eq!(vertex.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(vertex.normal, Vec3::Y);
        assert_eq!(vertex.tex_coord, Vec2::new(0.5, 0.5));
        assert_eq!(vertex.tangent, Vec3::X);
        assert_eq!(vertex.bitangent, Vec3::Z);
    }

    #[test]
    fn test_vertex_pod_zeroable() {
        let vertex = Vertex::new(Vec3::ONE, Vec3::Y, Vec2::ONE, Vec3::X, Vec3::Z);

        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 56);

        let vertex_back: &Vertex = bytemuck::from_bytes(bytes);
        assert_eq!(*vertex_back, vertex);
    }
}
