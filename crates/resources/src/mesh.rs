//! Meshes, submeshes and the per-program vertex array cache.
//!
//! A [`Mesh`] packs the vertex and index data of all its submeshes into one
//! vertex buffer and one index buffer. Each submesh remembers where its data
//! starts and how its vertices are laid out.
//!
//! Vertex arrays are created lazily: the first time a submesh is drawn with a
//! program, the program's declared inputs are matched by location against the
//! submesh layout and a vertex array is created and cached under the program
//! handle. Later draws with the same program reuse it.

use prism_rhi::buffer::{Buffer, BufferUsage};
use prism_rhi::shader::Program;
use prism_rhi::vertex::{VertexArrayDescriptor, VertexAttributeBinding, VertexBufferLayout};
use prism_rhi::{GraphicsDevice, ProgramHandle, VertexArrayHandle};
use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// A cached vertex array and the program it was built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VaoBinding {
    pub program: ProgramHandle,
    pub vertex_array: VertexArrayHandle,
}

/// One draw range of a mesh.
#[derive(Debug, Clone, Default)]
pub struct Submesh {
    pub layout: VertexBufferLayout,
    /// Interleaved vertex data following `layout`.
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    /// Byte offset of the first vertex inside the mesh vertex buffer.
    pub vertex_offset: u32,
    /// Byte offset of the first index inside the mesh index buffer.
    pub index_offset: u32,
    vaos: Vec<VaoBinding>,
}

impl Submesh {
    pub fn new(layout: VertexBufferLayout, vertices: Vec<f32>, indices: Vec<u32>) -> Self {
        Self {
            layout,
            vertices,
            indices,
            vertex_offset: 0,
            index_offset: 0,
            vaos: Vec::new(),
        }
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Number of vertices, from the layout stride.
    pub fn vertex_count(&self) -> usize {
        if self.layout.stride == 0 {
            return 0;
        }
        self.vertices.len() * 4 / self.layout.stride as usize
    }

    /// Cached vertex arrays, one per program.
    #[inline]
    pub fn vaos(&self) -> &[VaoBinding] {
        &self.vaos
    }

    fn cached_vao(&self, program: ProgramHandle) -> Option<VertexArrayHandle> {
        self.vaos
            .iter()
            .find(|binding| binding.program == program)
            .map(|binding| binding.vertex_array)
    }
}

/// Geometry shared by one vertex buffer and one index buffer.
pub struct Mesh {
    submeshes: Vec<Submesh>,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
}

impl Mesh {
    /// Packs `submeshes` into new vertex and index buffers.
    ///
    /// Submesh offsets are assigned here.
    pub fn new(device: &mut dyn GraphicsDevice, mut submeshes: Vec<Submesh>) -> ResourceResult<Self> {
        let vertex_bytes: usize = submeshes.iter().map(|s| s.vertices.len() * 4).sum();
        let index_bytes: usize = submeshes.iter().map(|s| s.indices.len() * 4).sum();
        if vertex_bytes == 0 || index_bytes == 0 {
            return Err(ResourceError::EmptyMesh);
        }

        let mut vertex_buffer = Buffer::new(device, vertex_bytes as u32, BufferUsage::Vertex)?;
        let mut index_buffer = Buffer::new(device, index_bytes as u32, BufferUsage::Index)?;

        vertex_buffer.map()?;
        index_buffer.map()?;
        for submesh in &mut submeshes {
            submesh.vertex_offset =
                vertex_buffer.push_aligned(bytemuck::cast_slice(&submesh.vertices), 4)?;
            submesh.index_offset =
                index_buffer.push_aligned(bytemuck::cast_slice(&submesh.indices), 4)?;
        }
        vertex_buffer.unmap(device)?;
        index_buffer.unmap(device)?;

        debug!(
            "Created mesh with {} submeshes ({} vertex bytes, {} index bytes)",
            submeshes.len(),
            vertex_bytes,
            index_bytes
        );

        Ok(Self {
            submeshes,
            vertex_buffer,
            index_buffer,
        })
    }

    #[inline]
    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }

    #[inline]
    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    #[inline]
    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    #[inline]
    pub fn index_buffer(&self) -> &Buffer {
        &self.index_buffer
    }

    /// Returns the vertex array binding `submesh_index` to `program`, creating
    /// and caching it on first use.
    ///
    /// # Errors
    ///
    /// [`ResourceError::IncompatibleMesh`] if the program reads a location the
    /// submesh layout does not provide. Nothing is created or cached then.
    pub fn find_or_create_vao(
        &mut self,
        device: &mut dyn GraphicsDevice,
        submesh_index: usize,
        program: &Program,
    ) -> ResourceResult<VertexArrayHandle> {
        let handle = program.handle();
        if handle.is_null() {
            return Err(ResourceError::NullProgram);
        }

        let vertex_buffer = self.vertex_buffer.handle();
        let index_buffer = self.index_buffer.handle();
        let submesh = self
            .submeshes
            .get_mut(submesh_index)
            .ok_or(ResourceError::InvalidIndex {
                kind: "submesh",
                index: submesh_index,
            })?;

        if let Some(vertex_array) = submesh.cached_vao(handle) {
            return Ok(vertex_array);
        }

        let mut attributes = Vec::with_capacity(program.attributes().len());
        for input in program.attributes() {
            let attribute =
                submesh
                    .layout
                    .find(input.location)
                    .ok_or(ResourceError::IncompatibleMesh {
                        submesh: submesh_index,
                        program: handle,
                        location: input.location,
                    })?;
            attributes.push(VertexAttributeBinding {
                location: attribute.location,
                component_count: attribute.component_count,
                offset: attribute.offset + submesh.vertex_offset,
                stride: submesh.layout.stride,
            });
        }

        let vertex_array = device.create_vertex_array(&VertexArrayDescriptor {
            vertex_buffer,
            index_buffer,
            attributes,
        })?;
        submesh.vaos.push(VaoBinding {
            program: handle,
            vertex_array,
        });
        debug!(
            "Bound submesh {} to program '{}' ({}) as {}",
            submesh_index,
            program.name(),
            handle,
            vertex_array
        );
        Ok(vertex_array)
    }

    /// Destroys every vertex array built for `program`.
    ///
    /// Returns how many were removed.
    pub fn forget_program(
        &mut self,
        device: &mut dyn GraphicsDevice,
        program: ProgramHandle,
    ) -> usize {
        let mut removed = 0;
        for submesh in &mut self.submeshes {
            submesh.vaos.retain(|binding| {
                if binding.program == program {
                    device.destroy_vertex_array(binding.vertex_array);
                    removed += 1;
                    false
                } else {
                    true
                }
            });
        }
        removed
    }

    /// Releases buffers and all cached vertex arrays.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for submesh in &mut self.submeshes {
            for binding in submesh.vaos.drain(..) {
                device.destroy_vertex_array(binding.vertex_array);
            }
        }
        self.vertex_buffer.destroy(device);
        self.index_buffer.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_rhi::HeadlessDevice;
    use prism_rhi::vertex::Vertex;

    const FULL_PROGRAM: &str = "\
#ifdef VERTEX
layout(location = 0) in vec3 aPosition;
layout(location = 1) in vec3 aNormal;
layout(location = 2) in vec2 aTexCoord;
void main() {}
#endif
";

    const POSITION_PROGRAM: &str = "\
#ifdef VERTEX
layout(location = 0) in vec3 aPosition;
void main() {}
#endif
";

    const WIDE_PROGRAM: &str = "\
#ifdef VERTEX
layout(location = 0) in vec3 aPosition;
layout(location = 7) in vec4 aColor;
void main() {}
#endif
";

    fn triangle() -> Submesh {
        let vertices = vec![0.0f32; 3 * Vertex::size() / 4];
        Submesh::new(Vertex::layout(), vertices, vec![0, 1, 2])
    }

    fn two_submesh_mesh(device: &mut HeadlessDevice) -> Mesh {
        Mesh::new(device, vec![triangle(), triangle()]).unwrap()
    }

    #[test]
    fn test_offsets_are_packed() {
        let mut device = HeadlessDevice::new();
        let mesh = two_submesh_mesh(&mut device);

        assert_eq!(mesh.submeshes()[0].vertex_offset, 0);
        assert_eq!(mesh.submeshes()[1].vertex_offset, 3 * 56);
        assert_eq!(mesh.submeshes()[1].index_offset, 12);
        assert_eq!(mesh.submeshes()[1].vertex_count(), 3);
        assert_eq!(mesh.vertex_buffer().size(), 2 * 3 * 56);
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let mut device = HeadlessDevice::new();
        assert!(matches!(
            Mesh::new(&mut device, Vec::new()),
            Err(ResourceError::EmptyMesh)
        ));
    }

    #[test]
    fn test_cache_hit_returns_same_handle() {
        let mut device = HeadlessDevice::new();
        let mut mesh = two_submesh_mesh(&mut device);
        let program = Program::from_source(&mut device, "full", FULL_PROGRAM).unwrap();

        let first = mesh.find_or_create_vao(&mut device, 0, &program).unwrap();
        let created = device.vertex_arrays_created();
        let second = mesh.find_or_create_vao(&mut device, 0, &program).unwrap();

        assert_eq!(first, second);
        assert_eq!(device.vertex_arrays_created(), created);
        assert_eq!(mesh.submeshes()[0].vaos().len(), 1);
    }

    #[test]
    fn test_distinct_programs_get_distinct_vaos() {
        let mut device = HeadlessDevice::new();
        let mut mesh = two_submesh_mesh(&mut device);
        let full = Program::from_source(&mut device, "full", FULL_PROGRAM).unwrap();
        let position = Program::from_source(&mut device, "position", POSITION_PROGRAM).unwrap();

        let a = mesh.find_or_create_vao(&mut device, 0, &full).unwrap();
        let b = mesh.find_or_create_vao(&mut device, 0, &position).unwrap();
        assert_ne!(a, b);
        assert_eq!(mesh.submeshes()[0].vaos().len(), 2);

        // Both remain retrievable
        assert_eq!(mesh.find_or_create_vao(&mut device, 0, &full).unwrap(), a);
        assert_eq!(mesh.find_or_create_vao(&mut device, 0, &position).unwrap(), b);
    }

    #[test]
    fn test_vao_uses_submesh_offset_and_stride() {
        let mut device = HeadlessDevice::new();
        let mut mesh = two_submesh_mesh(&mut device);
        let program = Program::from_source(&mut device, "full", FULL_PROGRAM).unwrap();

        let vao = mesh.find_or_create_vao(&mut device, 1, &program).unwrap();
        let desc = device.vertex_array(vao).unwrap();

        assert_eq!(desc.vertex_buffer, mesh.vertex_buffer().handle());
        assert_eq!(desc.index_buffer, mesh.index_buffer().handle());
        assert_eq!(desc.attributes.len(), 3);
        let uv = desc.attributes.iter().find(|a| a.location == 2).unwrap();
        assert_eq!(uv.offset, 24 + 3 * 56);
        assert_eq!(uv.stride, 56);
        assert_eq!(uv.component_count, 2);
    }

    #[test]
    fn test_missing_attribute_is_fatal() {
        let mut device = HeadlessDevice::new();
        let mut mesh = two_submesh_mesh(&mut device);
        let program = Program::from_source(&mut device, "wide", WIDE_PROGRAM).unwrap();

        let err = mesh.find_or_create_vao(&mut device, 0, &program).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::IncompatibleMesh { submesh: 0, location: 7, .. }
        ));
        assert!(mesh.submeshes()[0].vaos().is_empty());
        assert_eq!(device.vertex_arrays_created(), 0);
    }

    #[test]
    fn test_invalid_submesh_index() {
        let mut device = HeadlessDevice::new();
        let mut mesh = two_submesh_mesh(&mut device);
        let program = Program::from_source(&mut device, "full", FULL_PROGRAM).unwrap();
        assert!(matches!(
            mesh.find_or_create_vao(&mut device, 5, &program),
            Err(ResourceError::InvalidIndex { kind: "submesh", index: 5 })
        ));
    }

    #[test]
    fn test_forget_program_and_destroy() {
        let mut device = HeadlessDevice::new();
        let mut mesh = two_submesh_mesh(&mut device);
        let full = Program::from_source(&mut device, "full", FULL_PROGRAM).unwrap();
        let position = Program::from_source(&mut device, "position", POSITION_PROGRAM).unwrap();

        for index in 0..2 {
            mesh.find_or_create_vao(&mut device, index, &full).unwrap();
            mesh.find_or_create_vao(&mut device, index, &position).unwrap();
        }
        assert_eq!(device.live_vertex_array_count(), 4);

        assert_eq!(mesh.forget_program(&mut device, full.handle()), 2);
        assert_eq!(device.live_vertex_array_count(), 2);
        assert!(
            mesh.submeshes()
                .iter()
                .all(|s| s.vaos().iter().all(|b| b.program == position.handle()))
        );

        mesh.destroy(&mut device);
        assert_eq!(device.live_vertex_array_count(), 0);
        assert_eq!(device.live_buffer_count(), 0);
    }
}
