//! Embedded geometry: the screen-filling quad and the skybox cube.

use glam::{Vec2, Vec3};
use prism_rhi::vertex::{PositionVertex, QuadVertex};

use crate::mesh::Submesh;

/// Quad covering clip space, UVs from (0, 0) bottom-left to (1, 1) top-right.
pub const SCREEN_QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex::new(Vec3::new(-1.0, -1.0, 0.0), Vec2::new(0.0, 0.0)),
    QuadVertex::new(Vec3::new(1.0, -1.0, 0.0), Vec2::new(1.0, 0.0)),
    QuadVertex::new(Vec3::new(1.0, 1.0, 0.0), Vec2::new(1.0, 1.0)),
    QuadVertex::new(Vec3::new(-1.0, 1.0, 0.0), Vec2::new(0.0, 1.0)),
];

pub const SCREEN_QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// Unit cube corners.
const CUBE_CORNERS: [Vec3; 8] = [
    Vec3::new(-1.0, -1.0, -1.0),
    Vec3::new(1.0, -1.0, -1.0),
    Vec3::new(1.0, 1.0, -1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(1.0, -1.0, 1.0),
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(-1.0, 1.0, 1.0),
];

/// Triangles wound to face inward; the camera sits inside the skybox.
pub const SKYBOX_INDICES: [u32; 36] = [
    0, 1, 2, 2, 3, 0, // -Z
    4, 7, 6, 6, 5, 4, // +Z
    0, 3, 7, 7, 4, 0, // -X
    1, 5, 6, 6, 2, 1, // +X
    3, 2, 6, 6, 7, 3, // +Y
    0, 4, 5, 5, 1, 0, // -Y
];

/// Screen quad submesh (location 0 position, location 1 UV).
pub fn screen_quad() -> Submesh {
    Submesh::new(
        QuadVertex::layout(),
        bytemuck::cast_slice(&SCREEN_QUAD_VERTICES).to_vec(),
        SCREEN_QUAD_INDICES.to_vec(),
    )
}

/// Skybox cube submesh (location 0 position only).
pub fn skybox_cube() -> Submesh {
    let vertices: Vec<PositionVertex> = CUBE_CORNERS
        .iter()
        .map(|&position| PositionVertex { position })
        .collect();
    Submesh::new(
        PositionVertex::layout(),
        bytemuck::cast_slice(&vertices).to_vec(),
        SKYBOX_INDICES.to_vec(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_quad() {
        let quad = screen_quad();
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.index_count(), 6);
        assert_eq!(quad.layout.stride, 20);
        // Second vertex UV
        assert_eq!(&quad.vertices[8..10], &[1.0, 0.0]);
    }

    #[test]
    fn test_skybox_cube() {
        let cube = skybox_cube();
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.index_count(), 36);
        assert!(cube.indices.iter().all(|&i| i < 8));
        assert!(cube.layout.find(1).is_none());
    }
}
