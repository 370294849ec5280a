//! Frame rendering.
//!
//! This crate turns a [`prism_scene::Scene`] into draws:
//! - Uniform block layouts and per-frame packing
//! - The offscreen multi-attachment frame target
//! - Deferred (geometry + composition) and forward passes, with the skybox
//! - The [`Renderer`] that owns resources and sequences a frame

mod error;

pub mod frame_target;
pub mod passes;
pub mod renderer;
pub mod ubo;
pub mod uniforms;

pub use error::{RenderError, RenderResult};
pub use frame_target::{FrameTarget, TargetState};
pub use passes::{FrameStats, ShaderPrograms, ShaderSlot, ShaderTable};
pub use renderer::Renderer;
pub use uniforms::FrameUniforms;
