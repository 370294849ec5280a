//! Resource loading and management.
//!
//! This crate owns everything the renderer draws with:
//! - Textures (2D and cubemap) decoded with `image`
//! - Materials
//! - Meshes with the per-program vertex array cache
//! - Models and the glTF loader
//! - Embedded primitives (screen quad, skybox cube)
//! - The [`ResourceRegistry`] that indexes all of the above, plus programs

mod error;
pub mod loader;
pub mod material;
pub mod mesh;
pub mod model;
pub mod primitives;
pub mod registry;
pub mod texture;

pub use error::{ResourceError, ResourceResult};
pub use material::Material;
pub use mesh::{Mesh, Submesh};
pub use model::Model;
pub use registry::ResourceRegistry;
pub use texture::{INVALID_TEXTURE, TextureKind, WHITE_TEXTURE};
