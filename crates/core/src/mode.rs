//! Render mode vocabulary.
//!
//! These enums are shared by the scene (entity and light tags), the renderer
//! (pass selection) and the configuration file.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which pipeline renders the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPath {
    /// Shade directly into the visible framebuffer.
    Forward,
    /// Geometry pass into the offscreen target, then screen-space composition.
    #[default]
    Deferred,
}

impl RenderPath {
    /// Returns a human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            RenderPath::Forward => "forward",
            RenderPath::Deferred => "deferred",
        }
    }
}

impl fmt::Display for RenderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Category of an entity or light.
///
/// The active render mode is itself a category: only entities and lights tagged
/// with the active category take part in a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderCategory {
    /// Plain geometry shaded by the default geometry program.
    #[default]
    Deferred,
    /// Geometry with height-map driven parallax.
    ReliefMapping,
    /// Reflective geometry sampling the skybox cubemap.
    EnvironmentMap,
}

impl RenderCategory {
    /// Every category, in table order.
    pub const ALL: [RenderCategory; 3] = [
        RenderCategory::Deferred,
        RenderCategory::ReliefMapping,
        RenderCategory::EnvironmentMap,
    ];

    /// Number of categories.
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index for lookup tables.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            RenderCategory::Deferred => 0,
            RenderCategory::ReliefMapping => 1,
            RenderCategory::EnvironmentMap => 2,
        }
    }

    /// Returns a human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            RenderCategory::Deferred => "deferred",
            RenderCategory::ReliefMapping => "relief mapping",
            RenderCategory::EnvironmentMap => "environment map",
        }
    }
}

impl fmt::Display for RenderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which attachment the composition pass shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferView {
    /// Lit result.
    #[default]
    Main,
    Albedo,
    Normals,
    Position,
    ViewDir,
    Depth,
}

impl BufferView {
    /// Every view, in the order the composition shader numbers them.
    pub const ALL: [BufferView; 6] = [
        BufferView::Main,
        BufferView::Albedo,
        BufferView::Normals,
        BufferView::Position,
        BufferView::ViewDir,
        BufferView::Depth,
    ];

    /// Value written to the composition shader's `uViewMode` uniform.
    #[inline]
    pub fn shader_index(self) -> i32 {
        match self {
            BufferView::Main => 0,
            BufferView::Albedo => 1,
            BufferView::Normals => 2,
            BufferView::Position => 3,
            BufferView::ViewDir => 4,
            BufferView::Depth => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_indices_are_dense() {
        for (i, category) in RenderCategory::ALL.iter().enumerate() {
            assert_eq!(category.index(), i);
        }
    }

    #[test]
    fn test_buffer_view_indices_are_dense() {
        for (i, view) in BufferView::ALL.iter().enumerate() {
            assert_eq!(view.shader_index(), i as i32);
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&RenderCategory::ReliefMapping).unwrap();
        assert_eq!(json, "\"relief_mapping\"");

        let path: RenderPath = serde_json::from_str("\"forward\"").unwrap();
        assert_eq!(path, RenderPath::Forward);

        let view: BufferView = serde_json::from_str("\"view_dir\"").unwrap();
        assert_eq!(view, BufferView::ViewDir);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(RenderPath::default(), RenderPath::Deferred);
        assert_eq!(RenderCategory::default(), RenderCategory::Deferred);
        assert_eq!(BufferView::default(), BufferView::Main);
    }
}
