//! RHI-specific error types.

use thiserror::Error;

use crate::shader::ShaderStage;

/// RHI-specific error type.
///
/// Everything except [`RhiError::Io`] and [`RhiError::Backend`] reports a broken
/// contract between the caller and the device: the operation is aborted and
/// nothing is written.
#[derive(Error, Debug)]
pub enum RhiError {
    /// The backend refused to create or update an object.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A handle does not name a live object of the expected kind.
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// An argument is outside what the operation accepts.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Alignment is not a power of two.
    #[error("Alignment {0} is not a power of two")]
    InvalidAlignment(u32),

    /// A write or alignment would move the head past the end of the buffer.
    #[error("Buffer overflow: write ends at byte {end} but capacity is {capacity}")]
    BufferOverflow {
        /// First byte past the attempted write.
        end: u64,
        /// Buffer size in bytes.
        capacity: u32,
    },

    /// `map` was called on a buffer that is already mapped.
    #[error("Buffer is already mapped")]
    BufferAlreadyMapped,

    /// A write or `unmap` was attempted on a buffer that is not mapped.
    #[error("Buffer is not mapped")]
    BufferNotMapped,

    /// More color attachments were requested than the device supports.
    #[error("Requested {requested} color attachments, device supports {max}")]
    TooManyAttachments {
        /// Requested attachment count.
        requested: u32,
        /// Device limit.
        max: u32,
    },

    /// Framebuffer completeness check failed.
    #[error("Framebuffer incomplete: {0}")]
    FramebufferIncomplete(String),

    /// A shader stage failed to compile.
    #[error("Failed to compile {stage} shader of program '{program}':\n{log}")]
    ShaderCompile {
        /// Program name.
        program: String,
        /// Stage that failed.
        stage: ShaderStage,
        /// Compiler info log.
        log: String,
    },

    /// The program failed to link.
    #[error("Failed to link program '{program}':\n{log}")]
    ShaderLink {
        /// Program name.
        program: String,
        /// Linker info log.
        log: String,
    },

    /// IO error while reading a shader source.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
