//! OpenGL-model render hardware interface.
//!
//! This crate mirrors the OpenGL object model (buffers, vertex arrays, textures,
//! framebuffers, programs) behind the [`GraphicsDevice`] trait. It provides:
//! - [`GlDevice`], backed by a `glow` context supplied by the host
//! - [`HeadlessDevice`], which records every call for tests and offline runs
//! - The linear buffer allocator ([`buffer::Buffer`])
//! - Vertex buffer layouts and the standard vertex formats
//! - Program loading, attribute reflection and hot reload

mod error;

pub mod buffer;
pub mod device;
pub mod gl;
pub mod headless;
pub mod pipeline;
pub mod shader;
pub mod texture;
pub mod vertex;

pub use device::{
    BufferHandle, DeviceInfo, DeviceLimits, FramebufferHandle, GraphicsDevice, ProgramHandle,
    TextureHandle, VertexArrayHandle,
};
pub use error::{RhiError, RhiResult};
pub use gl::GlDevice;
pub use headless::HeadlessDevice;
