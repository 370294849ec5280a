//! Core utilities for the prism renderer.
//!
//! This crate provides foundational types and utilities used across the renderer:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities
//! - Configuration management
//! - Render mode vocabulary shared by the scene and the renderer

mod config;
mod error;
mod logging;
mod mode;
mod timer;

pub use config::{AssetConfig, DeviceLimitsConfig, EngineConfig, RenderConfig, ViewportConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use mode::{BufferView, RenderCategory, RenderPath};
pub use timer::Timer;
