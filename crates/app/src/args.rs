//! Command line arguments.
//!
//! Every option overrides the matching field of the configuration file.

use std::path::PathBuf;

use clap::Parser;
use prism_core::{BufferView, EngineConfig, RenderCategory, RenderPath};

// CLI mirrors of the engine mode enums

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PathArg {
    Forward,
    Deferred,
}

impl From<PathArg> for RenderPath {
    fn from(arg: PathArg) -> Self {
        match arg {
            PathArg::Forward => RenderPath::Forward,
            PathArg::Deferred => RenderPath::Deferred,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    Deferred,
    Relief,
    Environment,
}

impl From<ModeArg> for RenderCategory {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Deferred => RenderCategory::Deferred,
            ModeArg::Relief => RenderCategory::ReliefMapping,
            ModeArg::Environment => RenderCategory::EnvironmentMap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ViewArg {
    Main,
    Albedo,
    Normals,
    Position,
    ViewDir,
    Depth,
}

impl From<ViewArg> for BufferView {
    fn from(arg: ViewArg) -> Self {
        match arg {
            ViewArg::Main => BufferView::Main,
            ViewArg::Albedo => BufferView::Albedo,
            ViewArg::Normals => BufferView::Normals,
            ViewArg::Position => BufferView::Position,
            ViewArg::ViewDir => BufferView::ViewDir,
            ViewArg::Depth => BufferView::Depth,
        }
    }
}

/// Renders a demo scene on the headless device.
#[derive(Debug, Parser)]
#[command(name = "prism", version, about)]
pub struct Args {
    /// Engine configuration file (JSON). Missing files fall back to defaults.
    #[arg(short, long, default_value = "prism.json")]
    pub config: PathBuf,

    /// Render path.
    #[arg(long, value_enum)]
    pub path: Option<PathArg>,

    /// Active render mode.
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Attachment shown by the composition pass.
    #[arg(long, value_enum)]
    pub view: Option<ViewArg>,

    /// Number of frames to render.
    #[arg(short, long)]
    pub frames: Option<u32>,

    /// glTF model drawn in every render mode.
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Directory holding the six skybox faces.
    #[arg(long)]
    pub skybox: Option<PathBuf>,

    /// Height map for the relief-mapped entities.
    #[arg(long)]
    pub height_map: Option<PathBuf>,

    /// Directory of the GLSL programs.
    #[arg(long)]
    pub shaders: Option<PathBuf>,

    /// Step through every render path and mode during the run.
    #[arg(long)]
    pub cycle: bool,
}

impl Args {
    /// Applies the overrides given on the command line.
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(path) = self.path {
            config.render.path = path.into();
        }
        if let Some(mode) = self.mode {
            config.render.category = mode.into();
        }
        if let Some(view) = self.view {
            config.render.buffer_view = view.into();
        }
        if let Some(frames) = self.frames {
            config.frames = frames;
        }
        if let Some(model) = &self.model {
            config.assets.model = Some(model.clone());
        }
        if let Some(skybox) = &self.skybox {
            config.assets.skybox_dir = Some(skybox.clone());
        }
        if let Some(height_map) = &self.height_map {
            config.assets.height_map = Some(height_map.clone());
        }
        if let Some(shaders) = &self.shaders {
            config.assets.shader_dir = shaders.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "prism", "--path", "forward", "--mode", "relief", "--view", "view-dir", "-f", "3",
        ]);
        let mut config = EngineConfig::default();
        args.apply(&mut config);

        assert_eq!(config.render.path, RenderPath::Forward);
        assert_eq!(config.render.category, RenderCategory::ReliefMapping);
        assert_eq!(config.render.buffer_view, BufferView::ViewDir);
        assert_eq!(config.frames, 3);
        assert!(!args.cycle);
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let args = Args::parse_from(["prism"]);
        let mut config = EngineConfig::default();
        args.apply(&mut config);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(args.config, PathBuf::from("prism.json"));
    }
}
