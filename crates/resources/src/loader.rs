//! glTF model loading.
//!
//! Produces CPU-side submeshes in the standard [`Vertex`] layout plus material
//! descriptions whose textures are still paths; the registry uploads both.
//! Missing normals are generated from faces, missing tangents from UVs.

use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3, Vec4};
use gltf::image::Source;
use prism_rhi::vertex::Vertex;
use tracing::{debug, warn};

use crate::error::{ResourceError, ResourceResult};
use crate::mesh::Submesh;

/// A material as described by the file.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDescription {
    pub name: String,
    pub albedo: Vec3,
    pub emissive: Vec3,
    pub smoothness: f32,
    pub albedo_texture: Option<PathBuf>,
    pub normal_texture: Option<PathBuf>,
    pub height_texture: Option<PathBuf>,
}

impl Default for MaterialDescription {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            albedo: Vec3::ONE,
            emissive: Vec3::ZERO,
            smoothness: 0.5,
            albedo_texture: None,
            normal_texture: None,
            height_texture: None,
        }
    }
}

/// CPU-side result of loading a model file.
#[derive(Debug, Default)]
pub struct ModelData {
    pub submeshes: Vec<Submesh>,
    pub materials: Vec<MaterialDescription>,
    /// Index into `materials` per submesh, `None` for the default material.
    pub submesh_materials: Vec<Option<usize>>,
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
}

impl ModelData {
    pub fn total_vertex_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.vertex_count()).sum()
    }

    pub fn total_triangle_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.indices.len() / 3).sum()
    }
}

/// Loads every primitive of every mesh in a `.gltf` / `.glb` file.
pub fn load_gltf(path: &Path) -> ResourceResult<ModelData> {
    if !path.exists() {
        return Err(ResourceError::FileNotFound(path.to_path_buf()));
    }

    let gltf_error = |e: gltf::Error| ResourceError::GltfLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    // Images are decoded later by the texture loader, so only buffers are
    // imported here; a missing texture file must not fail the whole model.
    let gltf = gltf::Gltf::open(path).map_err(gltf_error)?;
    let buffers =
        gltf::import_buffers(&gltf.document, Some(base_dir), gltf.blob.clone()).map_err(gltf_error)?;
    let document = gltf.document;
    let materials: Vec<MaterialDescription> = document
        .materials()
        .map(|material| describe_material(&material, base_dir))
        .collect();

    let mut data = ModelData {
        materials,
        aabb_min: Vec3::splat(f32::MAX),
        aabb_max: Vec3::splat(f32::MIN),
        ..Default::default()
    };

    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                warn!(
                    "Skipping non-triangle primitive {} of mesh '{}'",
                    primitive.index(),
                    mesh.name().unwrap_or("unnamed")
                );
                continue;
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions: Vec<Vec3> = reader
                .read_positions()
                .ok_or(ResourceError::NoPositionData)?
                .map(Vec3::from)
                .collect();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let normals: Option<Vec<Vec3>> =
                reader.read_normals().map(|n| n.map(Vec3::from).collect());
            let tex_coords: Option<Vec<Vec2>> = reader
                .read_tex_coords(0)
                .map(|t| t.into_f32().map(Vec2::from).collect());
            let tangents: Option<Vec<Vec4>> =
                reader.read_tangents().map(|t| t.map(Vec4::from).collect());

            for position in &positions {
                data.aabb_min = data.aabb_min.min(*position);
                data.aabb_max = data.aabb_max.max(*position);
            }

            let vertices = build_vertices(&positions, normals, tex_coords, tangents, &indices);
            data.submeshes.push(Submesh::new(
                Vertex::layout(),
                bytemuck::cast_slice(&vertices).to_vec(),
                indices,
            ));
            data.submesh_materials.push(primitive.material().index());
        }
    }

    if data.submeshes.is_empty() {
        return Err(ResourceError::NoMeshes(path.to_path_buf()));
    }

    debug!(
        "Loaded '{}': {} submeshes, {} vertices, {} triangles, {} materials",
        path.display(),
        data.submeshes.len(),
        data.total_vertex_count(),
        data.total_triangle_count(),
        data.materials.len()
    );
    Ok(data)
}

fn describe_material(material: &gltf::Material<'_>, base_dir: &Path) -> MaterialDescription {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _] = pbr.base_color_factor();

    MaterialDescription {
        name: material.name().unwrap_or("unnamed").to_string(),
        albedo: Vec3::new(r, g, b),
        emissive: Vec3::from(material.emissive_factor()),
        smoothness: 1.0 - pbr.roughness_factor(),
        albedo_texture: pbr
            .base_color_texture()
            .and_then(|info| texture_path(&info.texture(), base_dir)),
        normal_texture: material
            .normal_texture()
            .and_then(|normal| texture_path(&normal.texture(), base_dir)),
        // glTF has no height slot; height maps are assigned by the application
        height_texture: None,
    }
}

/// Path of an external texture image. Embedded images are not supported.
fn texture_path(texture: &gltf::Texture<'_>, base_dir: &Path) -> Option<PathBuf> {
    match texture.source().source() {
        Source::Uri { uri, .. } if !uri.starts_with("data:") => Some(base_dir.join(uri)),
        _ => {
            debug!(
                "Texture {} uses an embedded image, ignoring it",
                texture.index()
            );
            None
        }
    }
}

/// Assembles vertices, generating whatever the file did not provide.
pub(crate) fn build_vertices(
    positions: &[Vec3],
    normals: Option<Vec<Vec3>>,
    tex_coords: Option<Vec<Vec2>>,
    tangents: Option<Vec<Vec4>>,
    indices: &[u32],
) -> Vec<Vertex> {
    let count = positions.len();
    let normals = match normals {
        Some(normals) if normals.len() == count => normals,
        _ => generate_normals(positions, indices),
    };
    let tex_coords = match tex_coords {
        Some(tex_coords) if tex_coords.len() == count => tex_coords,
        _ => vec![Vec2::ZERO; count],
    };

    let (tangents, bitangents) = match tangents {
        Some(tangents) if tangents.len() == count => {
            let bitangents = tangents
                .iter()
                .zip(&normals)
                .map(|(t, n)| n.cross(t.truncate()) * t.w)
                .collect();
            (tangents.iter().map(|t| t.truncate()).collect(), bitangents)
        }
        _ => generate_tangents(positions, &normals, &tex_coords, indices),
    };

    (0..count)
        .map(|i| Vertex::new(positions[i], normals[i], tex_coords[i], tangents[i], bitangents[i]))
        .collect()
}

/// Area-weighted vertex normals from the triangle list.
pub(crate) fn generate_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
        .collect()
}

/// Per-vertex tangent frames from UV gradients, orthogonalized against the
/// normal.
pub(crate) fn generate_tangents(
    positions: &[Vec3],
    normals: &[Vec3],
    tex_coords: &[Vec2],
    indices: &[u32],
) -> (Vec<Vec3>, Vec<Vec3>) {
    let count = positions.len();
    let mut tangents = vec![Vec3::ZERO; count];
    let mut bitangents = vec![Vec3::ZERO; count];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= count || b >= count || c >= count {
            continue;
        }

        let edge1 = positions[b] - positions[a];
        let edge2 = positions[c] - positions[a];
        let duv1 = tex_coords[b] - tex_coords[a];
        let duv2 = tex_coords[c] - tex_coords[a];

        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (edge1 * duv2.y - edge2 * duv1.y) * r;
        let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * r;

        for i in [a, b, c] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
        }
    }

    for i in 0..count {
        let n = normals[i];
        // Gram-Schmidt
        let t = (tangents[i] - n * n.dot(tangents[i]))
            .try_normalize()
            .unwrap_or_else(|| n.any_orthonormal_vector());
        let handedness = if n.cross(t).dot(bitangents[i]) < 0.0 {
            -1.0
        } else {
            1.0
        };
        tangents[i] = t;
        bitangents[i] = n.cross(t) * handedness;
    }

    (tangents, bitangents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> (Vec<Vec3>, Vec<Vec2>, Vec<u32>) {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        (positions, uvs, vec![0, 1, 2, 0, 2, 3])
    }

    #[test]
    fn test_generate_normals_ccw_faces_plus_z() {
        let (positions, _, indices) = quad();
        let normals = generate_normals(&positions, &indices);
        for n in normals {
            assert!((n - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn test_generate_tangents_follow_uv_axes() {
        let (positions, uvs, indices) = quad();
        let normals = vec![Vec3::Z; 4];
        let (tangents, bitangents) = generate_tangents(&positions, &normals, &uvs, &indices);
        for (t, b) in tangents.iter().zip(&bitangents) {
            assert!((*t - Vec3::X).length() < 1e-5);
            assert!((*b - Vec3::Y).length() < 1e-5);
        }
    }

    #[test]
    fn test_build_vertices_uses_supplied_tangents() {
        let (positions, uvs, indices) = quad();
        let tangents = vec![Vec4::new(1.0, 0.0, 0.0, -1.0); 4];
        let vertices =
            build_vertices(&positions, Some(vec![Vec3::Z; 4]), Some(uvs), Some(tangents), &indices);
        assert_eq!(vertices.len(), 4);
        assert_eq!(vertices[0].tangent, Vec3::X);
        // Negative handedness flips the bitangent
        assert!((vertices[0].bitangent + Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_build_vertices_without_uvs() {
        let (positions, _, indices) = quad();
        let vertices = build_vertices(&positions, None, None, None, &indices);
        assert!(vertices.iter().all(|v| v.tex_coord == Vec2::ZERO));
        assert!(vertices.iter().all(|v| v.tangent.is_normalized()));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_gltf(Path::new("/nonexistent/model.gltf")),
            Err(ResourceError::FileNotFound(_))
        ));
    }
}
