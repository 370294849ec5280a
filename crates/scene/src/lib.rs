//! Scene graph and components.
//!
//! This crate provides scene management:
//! - Transforms and the normal-matrix helper
//! - The fly camera
//! - Light definitions
//! - Entities and the [`Scene`] aggregate with the render-mode selection

pub mod camera;
pub mod entity;
pub mod light;
pub mod scene;
pub mod transform;

pub use camera::{Camera, CameraMovement, Projection};
pub use entity::Entity;
pub use light::{Light, LightKind};
pub use scene::Scene;
pub use transform::Transform;
