//! Error types for resource loading.

use std::path::PathBuf;

use prism_rhi::{ProgramHandle, RhiError};
use thiserror::Error;

/// Error type for resource operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Failed to load a glTF file.
    #[error("Failed to load glTF file '{path}': {message}")]
    GltfLoad {
        /// Path to the file that failed to load.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// glTF file contains no meshes.
    #[error("glTF file '{0}' contains no meshes")]
    NoMeshes(PathBuf),

    /// A mesh primitive has no position data.
    #[error("Mesh primitive has no position data")]
    NoPositionData,

    /// A mesh was created without any vertex or index data.
    #[error("Mesh has no vertex or index data")]
    EmptyMesh,

    /// A program reads a vertex attribute the submesh does not provide.
    #[error(
        "Submesh {submesh} has no attribute at location {location} required by program {program}"
    )]
    IncompatibleMesh {
        /// Submesh index inside its mesh.
        submesh: usize,
        /// Program that was being bound.
        program: ProgramHandle,
        /// Missing attribute location.
        location: u32,
    },

    /// A vertex array was requested for the null program.
    #[error("Cannot bind geometry to the null program")]
    NullProgram,

    /// An index does not name a loaded resource.
    #[error("No {kind} at index {index}")]
    InvalidIndex {
        /// Resource kind.
        kind: &'static str,
        /// Offending index.
        index: usize,
    },

    /// A cubemap face image is missing or has the wrong size.
    #[error("Invalid cubemap '{path}': {message}")]
    InvalidCubemap {
        /// Directory holding the faces.
        path: PathBuf,
        /// What is wrong.
        message: String,
    },

    /// Image has a channel count textures cannot be made from.
    #[error("Unsupported channel count {channels} in '{path}'")]
    UnsupportedChannels {
        /// Image path.
        path: PathBuf,
        /// Channel count.
        channels: u8,
    },

    /// Device error while creating GPU objects.
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image loading error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
