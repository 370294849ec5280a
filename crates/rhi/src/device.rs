//! Device contract over the OpenGL object model.
//!
//! Every GPU object is named by a small integer handle, exactly like GL object
//! names. Handle `0` is the null object: binding it unbinds, destroying it is a
//! no-op, and a null program turns draws into no-ops.
//!
//! Two implementations exist:
//! - [`crate::GlDevice`] forwards to a `glow` context owned by the embedder
//! - [`crate::HeadlessDevice`] keeps every object in host memory and records draws

use glam::{Mat4, Vec3};
use tracing::info;

use crate::buffer::BufferUsage;
use crate::error::RhiResult;
use crate::pipeline::{CullMode, DepthState, IndexType};
use crate::shader::VertexShaderAttribute;
use crate::texture::{TextureData, TextureDescriptor, TextureTarget};
use crate::vertex::VertexArrayDescriptor;

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// The null object.
            pub const NULL: Self = Self(0);

            /// Returns true for the null object.
            #[inline]
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }

            /// Returns the raw backend name.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

gpu_handle!(
    /// Buffer object name.
    BufferHandle
);
gpu_handle!(
    /// Texture object name (2D or cubemap).
    TextureHandle
);
gpu_handle!(
    /// Framebuffer object name. The null handle is the default framebuffer.
    FramebufferHandle
);
gpu_handle!(
    /// Vertex array object name.
    VertexArrayHandle
);
gpu_handle!(
    /// Linked program object name.
    ProgramHandle
);

/// Implementation limits the engine depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceLimits {
    /// `GL_MAX_COLOR_ATTACHMENTS`.
    pub max_color_attachments: u32,
    /// `GL_MAX_UNIFORM_BLOCK_SIZE` in bytes.
    pub max_uniform_block_size: u32,
    /// `GL_UNIFORM_BUFFER_OFFSET_ALIGNMENT` in bytes.
    pub uniform_buffer_offset_alignment: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_color_attachments: 8,
            max_uniform_block_size: 16384,
            uniform_buffer_offset_alignment: 256,
        }
    }
}

/// Strings reported by the driver.
#[derive(Clone, Debug, Default)]
pub struct DeviceInfo {
    pub renderer: String,
    pub vendor: String,
    pub version: String,
    pub shading_language_version: String,
    pub extensions: Vec<String>,
}

impl DeviceInfo {
    /// Logs the device report at start-up.
    pub fn log(&self, limits: &DeviceLimits) {
        info!("Renderer: {}", self.renderer);
        info!("Vendor: {}", self.vendor);
        info!("Version: {}", self.version);
        info!("GLSL: {}", self.shading_language_version);
        info!(
            "Limits: {} color attachments, {} byte uniform blocks, {} byte UBO offset alignment",
            limits.max_color_attachments,
            limits.max_uniform_block_size,
            limits.uniform_buffer_offset_alignment
        );
        info!("{} extensions available", self.extensions.len());
        for extension in &self.extensions {
            tracing::trace!("  {}", extension);
        }
    }
}

/// The graphics device.
///
/// Methods take `&mut self`: the engine is single-threaded and all GPU state
/// changes go through one device reference owned by the caller.
pub trait GraphicsDevice {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Driver strings.
    fn info(&self) -> &DeviceInfo;

    /// Implementation limits.
    fn limits(&self) -> DeviceLimits;

    // Buffers

    /// Allocates an uninitialized buffer of `size` bytes.
    fn create_buffer(&mut self, usage: BufferUsage, size: u32) -> RhiResult<BufferHandle>;

    /// Uploads `data` at byte `offset`. Fails if the range exceeds the buffer.
    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        usage: BufferUsage,
        offset: u32,
        data: &[u8],
    ) -> RhiResult<()>;

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Binds `[offset, offset + size)` of a uniform buffer to a block binding point.
    fn bind_uniform_range(&mut self, binding: u32, buffer: BufferHandle, offset: u32, size: u32);

    // Vertex arrays

    fn create_vertex_array(&mut self, desc: &VertexArrayDescriptor)
    -> RhiResult<VertexArrayHandle>;

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    // Textures

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: TextureData<'_>,
    ) -> RhiResult<TextureHandle>;

    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Binds `texture` to texture `unit`. A null handle unbinds the unit.
    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: TextureHandle);

    // Framebuffers

    /// Creates a framebuffer with `colors` on consecutive color attachments and
    /// an optional depth attachment, checks completeness and sets the draw
    /// buffer list.
    fn create_framebuffer(
        &mut self,
        colors: &[TextureHandle],
        depth: TextureHandle,
    ) -> RhiResult<FramebufferHandle>;

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    /// Binds a framebuffer for drawing. The null handle is the default framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle);

    // Programs

    /// Compiles and links a program from complete stage sources.
    fn create_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> RhiResult<ProgramHandle>;

    /// Active vertex attributes of a linked program, sorted by location.
    fn program_attributes(&self, program: ProgramHandle) -> Vec<VertexShaderAttribute>;

    fn destroy_program(&mut self, program: ProgramHandle);

    fn use_program(&mut self, program: ProgramHandle);

    /// Sets an `int`/`sampler`/`bool` uniform on the current program.
    fn set_uniform_i32(&mut self, name: &str, value: i32);

    /// Sets a `float` uniform on the current program.
    fn set_uniform_f32(&mut self, name: &str, value: f32);

    /// Sets a `vec3` uniform on the current program.
    fn set_uniform_vec3(&mut self, name: &str, value: Vec3);

    /// Sets a `mat4` uniform on the current program.
    fn set_uniform_mat4(&mut self, name: &str, value: &Mat4);

    /// Assigns a named uniform block of `program` to a binding point.
    fn bind_uniform_block(&mut self, program: ProgramHandle, block: &str, binding: u32);

    // Fixed-function state and drawing

    fn set_viewport(&mut self, width: u32, height: u32);

    /// Clears color and depth of the bound framebuffer.
    fn clear(&mut self, color: [f32; 4]);

    fn set_depth_state(&mut self, state: DepthState);

    fn set_cull_mode(&mut self, mode: CullMode);

    /// Draws indexed triangles from the bound vertex array.
    fn draw_indexed(&mut self, index_count: u32, index_type: IndexType, byte_offset: u32);
}
