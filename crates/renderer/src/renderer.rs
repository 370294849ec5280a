//! Main renderer orchestration.
//!
//! This module provides the [`Renderer`], which owns every GPU resource the
//! engine draws with and runs one frame at a time against a caller-owned
//! device.
//!
//! # Frame order
//!
//! 1. Hot reload changed programs, purging vertex arrays of retired handles
//! 2. Resolve the [`ShaderTable`]
//! 3. Apply the render mode to the scene's entities
//! 4. Repack the global block if needed
//! 5. Repack every entity block
//! 6. Run the passes of the selected render path
//!
//! # Resource destruction
//!
//! [`Renderer::destroy`] releases uniform buffers, the frame target and the
//! registry, in that order. The device must outlive the renderer.

use std::path::Path;

use prism_core::{EngineConfig, RenderPath};
use prism_resources::{INVALID_TEXTURE, ResourceRegistry, primitives};
use prism_rhi::{GraphicsDevice, TextureHandle};
use prism_scene::Scene;
use tracing::{debug, info, warn};

use crate::error::RenderResult;
use crate::frame_target::FrameTarget;
use crate::passes::{Frame, FrameStats, ShaderPrograms, ShaderTable};
use crate::ubo::{MAX_LIGHTS_DEFINE, MAX_SHADER_LIGHTS};
use crate::uniforms::FrameUniforms;

pub struct Renderer {
    registry: ResourceRegistry,
    programs: ShaderPrograms,
    /// Handles resolved at the start of the last frame.
    table: ShaderTable,
    uniforms: FrameUniforms,
    target: FrameTarget,
    /// Registry mesh of the screen quad.
    quad_mesh: usize,
    /// Registry mesh of the skybox cube.
    skybox_mesh: usize,
    /// Registry texture of the environment cubemap.
    skybox: Option<usize>,
    viewport: (u32, u32),
    clear_color: [f32; 4],
    frame_index: u64,
}

impl Renderer {
    /// Creates the renderer: registry, embedded meshes, programs, uniform
    /// buffers and the offscreen target sized to the configured viewport.
    pub fn new(device: &mut dyn GraphicsDevice, config: &EngineConfig) -> RenderResult<Self> {
        let (width, height) = (config.viewport.width, config.viewport.height);
        info!(
            "Initializing {} renderer ({}x{})",
            device.name(),
            width,
            height
        );
        device.info().log(&device.limits());

        let mut registry = ResourceRegistry::new(device)?;
        registry.set_shader_define(MAX_LIGHTS_DEFINE, MAX_SHADER_LIGHTS);
        let quad_mesh = registry.add_mesh(device, vec![primitives::screen_quad()])?;
        let skybox_mesh = registry.add_mesh(device, vec![primitives::skybox_cube()])?;
        let programs = ShaderPrograms::load(device, &mut registry, &config.assets.shader_dir);

        let uniforms = FrameUniforms::new(device)?;
        let mut target = FrameTarget::new();
        target.create(device, config.render.gbuffer_attachments, width, height)?;

        info!("Renderer initialized");
        Ok(Self {
            registry,
            programs,
            table: ShaderTable::default(),
            uniforms,
            target,
            quad_mesh,
            skybox_mesh,
            skybox: None,
            viewport: (width, height),
            clear_color: config.render.clear_color,
            frame_index: 0,
        })
    }

    /// Loads the environment cubemap from a directory of six faces.
    ///
    /// Returns false and keeps the previous cubemap if loading fails.
    pub fn set_skybox(&mut self, device: &mut dyn GraphicsDevice, dir: &Path) -> bool {
        let index = self.registry.load_cubemap(device, dir);
        if index == INVALID_TEXTURE {
            warn!("Keeping previous skybox, '{}' failed to load", dir.display());
            return false;
        }
        info!("Skybox: {}", dir.display());
        self.skybox = Some(index);
        true
    }

    /// Renders one frame of `scene`.
    ///
    /// # Errors
    ///
    /// Any error aborts the frame: a mesh missing an attribute a program
    /// declares, a uniform write past capacity, a frame target that was never
    /// created, or an entity pointing at an unknown model.
    pub fn render_frame(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
    ) -> RenderResult<FrameStats> {
        let reloaded = self.registry.reload_changed_programs(device);
        if reloaded > 0 {
            info!("Hot reloaded {} programs", reloaded);
        }

        let table = ShaderTable::resolve(&self.programs, &self.registry);
        if table != self.table {
            table.bind_blocks(device);
            self.table = table;
        }

        scene.apply_render_mode();
        self.uniforms.update_global(device, scene)?;
        self.uniforms.update_entities(device, scene)?;

        let environment = self
            .skybox
            .map_or(TextureHandle::NULL, |index| self.registry.texture_handle(index));

        let mut frame = Frame {
            device,
            registry: &mut self.registry,
            uniforms: &self.uniforms,
            table: &self.table,
            scene,
            environment,
            viewport: self.viewport,
            clear_color: self.clear_color,
            stats: FrameStats {
                lights: self.uniforms.light_count(),
                programs_reloaded: reloaded as u32,
                ..FrameStats::default()
            },
        };

        match scene.render_path() {
            RenderPath::Deferred => {
                frame.geometry_pass(&self.target)?;
                frame.composition_pass(&self.target, self.quad_mesh)?;
            }
            RenderPath::Forward => frame.forward_pass(self.skybox_mesh)?,
        }

        let stats = frame.stats;
        self.frame_index += 1;
        debug!(
            "Frame {}: {} draws, {} entities, {} lights",
            self.frame_index, stats.draw_calls, stats.entities_drawn, stats.lights
        );
        Ok(stats)
    }

    /// Handles a window resize.
    ///
    /// Zero sizes (minimized windows) are ignored. The camera aspect follows
    /// the new size.
    pub fn resize(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        if width == 0 || height == 0 {
            debug!("Ignoring resize to zero dimensions");
            return Ok(());
        }
        if self.viewport == (width, height) {
            return Ok(());
        }

        debug!(
            "Resizing from {}x{} to {}x{}",
            self.viewport.0, self.viewport.1, width, height
        );
        self.target.resize(device, width, height)?;
        self.viewport = (width, height);
        scene.camera_mut().set_aspect(width as f32 / height as f32);
        Ok(())
    }

    #[inline]
    pub fn resources(&self) -> &ResourceRegistry {
        &self.registry
    }

    #[inline]
    pub fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.registry
    }

    #[inline]
    pub fn shader_table(&self) -> &ShaderTable {
        &self.table
    }

    #[inline]
    pub fn shader_programs(&self) -> &ShaderPrograms {
        &self.programs
    }

    #[inline]
    pub fn frame_target(&self) -> &FrameTarget {
        &self.target
    }

    #[inline]
    pub fn uniforms(&self) -> &FrameUniforms {
        &self.uniforms
    }

    #[inline]
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Frames rendered so far.
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Releases every GPU object the renderer owns.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.uniforms.destroy(device);
        self.target.clear(device);
        self.registry.destroy(device);
        self.skybox = None;
        info!("Renderer destroyed");
    }
}
