//! Render passes and the per-category program table.
//!
//! The deferred path draws the active entities into the [`FrameTarget`] with
//! the program of their category, then composites the attachments onto the
//! default framebuffer. The forward path draws straight to the default
//! framebuffer with one program whose features are toggled per entity, after
//! the skybox when environment mapping is active.
//!
//! # Texture units
//!
//! | Unit | Scene programs   | Composition   |
//! |------|------------------|---------------|
//! | 0    | albedo map       | attachment 0  |
//! | 1    | normal map       | attachment 1  |
//! | 2    | height map       | ...           |
//! | 3    | environment cube | depth (N)     |

use std::path::Path;

use prism_core::{BufferView, RenderCategory};
use prism_resources::ResourceRegistry;
use prism_resources::material::{Material, NO_TEXTURE};
use prism_rhi::pipeline::{CullMode, DepthState, IndexType};
use prism_rhi::texture::TextureTarget;
use prism_rhi::{GraphicsDevice, ProgramHandle, TextureHandle};
use prism_scene::{Entity, Scene};
use tracing::{debug, warn};

use crate::error::{RenderError, RenderResult};
use crate::frame_target::FrameTarget;
use crate::ubo::{
    ENTITY_PARAMS_BINDING, ENTITY_PARAMS_BLOCK, GLOBAL_PARAMS_BINDING, GLOBAL_PARAMS_BLOCK,
};
use crate::uniforms::FrameUniforms;

pub const ALBEDO_UNIT: u32 = 0;
pub const NORMAL_UNIT: u32 = 1;
pub const HEIGHT_UNIT: u32 = 2;
pub const ENVIRONMENT_UNIT: u32 = 3;

/// Units reset before each forward draw.
const SCENE_TEXTURE_UNITS: u32 = 4;

/// Unbinds every target of the scene units; GL keeps a 2D and a cube map
/// binding per unit, and a reflective entity leaves its cube map behind.
fn reset_scene_units(device: &mut dyn GraphicsDevice) {
    for unit in 0..SCENE_TEXTURE_UNITS {
        device.bind_texture(unit, TextureTarget::Texture2D, TextureHandle::NULL);
        device.bind_texture(unit, TextureTarget::CubeMap, TextureHandle::NULL);
    }
}

/// Registry indices of every program the passes use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderPrograms {
    /// Geometry pass program per [`RenderCategory`], by `index()`.
    pub geometry: [usize; RenderCategory::COUNT],
    pub forward: usize,
    pub composition: usize,
    pub skybox: usize,
}

impl ShaderPrograms {
    /// Loads the programs from `shader_dir`.
    ///
    /// Files that fail to build leave null handles behind; the passes skip
    /// them until a hot reload succeeds.
    pub fn load(
        device: &mut dyn GraphicsDevice,
        registry: &mut ResourceRegistry,
        shader_dir: &Path,
    ) -> Self {
        let mut load = |file: &str, name: &str| registry.load_program(device, shader_dir.join(file), name);

        let geometry = [
            load("geometry.glsl", "geometry"),
            load("relief.glsl", "relief"),
            load("environment.glsl", "environment"),
        ];
        Self {
            geometry,
            forward: load("forward.glsl", "forward"),
            composition: load("composition.glsl", "composition"),
            skybox: load("skybox.glsl", "skybox"),
        }
    }
}

/// A program index and the handle it resolved to this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShaderSlot {
    pub index: usize,
    pub handle: ProgramHandle,
}

impl ShaderSlot {
    fn resolve(registry: &ResourceRegistry, index: usize) -> Self {
        Self {
            index,
            handle: registry.program_handle(index),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.handle.is_null()
    }
}

/// Program handles resolved once per frame, after hot reload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShaderTable {
    geometry: [ShaderSlot; RenderCategory::COUNT],
    pub forward: ShaderSlot,
    pub composition: ShaderSlot,
    pub skybox: ShaderSlot,
}

impl ShaderTable {
    pub fn resolve(programs: &ShaderPrograms, registry: &ResourceRegistry) -> Self {
        Self {
            geometry: programs
                .geometry
                .map(|index| ShaderSlot::resolve(registry, index)),
            forward: ShaderSlot::resolve(registry, programs.forward),
            composition: ShaderSlot::resolve(registry, programs.composition),
            skybox: ShaderSlot::resolve(registry, programs.skybox),
        }
    }

    /// Geometry pass program of `category`.
    #[inline]
    pub fn geometry(&self, category: RenderCategory) -> ShaderSlot {
        self.geometry[category.index()]
    }

    /// Assigns the shared uniform blocks to their binding points.
    ///
    /// The composition program lights the G-buffer and only reads the global
    /// block.
    pub fn bind_blocks(&self, device: &mut dyn GraphicsDevice) {
        let scene_programs = self.geometry.iter().chain(std::iter::once(&self.forward));
        for slot in scene_programs.filter(|slot| !slot.is_null()) {
            device.bind_uniform_block(slot.handle, GLOBAL_PARAMS_BLOCK, GLOBAL_PARAMS_BINDING);
            device.bind_uniform_block(slot.handle, ENTITY_PARAMS_BLOCK, ENTITY_PARAMS_BINDING);
        }
        if !self.composition.is_null() {
            device.bind_uniform_block(
                self.composition.handle,
                GLOBAL_PARAMS_BLOCK,
                GLOBAL_PARAMS_BINDING,
            );
        }
    }
}

/// Counters for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub entities_drawn: u32,
    /// Lights in the global block.
    pub lights: u32,
    /// Programs replaced by hot reload at the start of the frame.
    pub programs_reloaded: u32,
    pub skybox_drawn: bool,
}

/// Everything a pass reads or writes during one frame.
pub struct Frame<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub registry: &'a mut ResourceRegistry,
    pub uniforms: &'a FrameUniforms,
    pub table: &'a ShaderTable,
    pub scene: &'a Scene,
    /// Cubemap sampled by environment entities and the skybox.
    pub environment: TextureHandle,
    pub viewport: (u32, u32),
    pub clear_color: [f32; 4],
    pub stats: FrameStats,
}

impl Frame<'_> {
    /// Draws the active entities into `target`.
    pub fn geometry_pass(&mut self, target: &FrameTarget) -> RenderResult<()> {
        if !target.bind(self.device) {
            return Err(RenderError::TargetNotReady);
        }
        self.device.clear(self.clear_color);
        self.device.set_depth_state(DepthState::OPAQUE);
        self.device.set_cull_mode(CullMode::Back);
        self.uniforms.bind_global(self.device)?;

        let scene = self.scene;
        for entity in scene.active_entities() {
            let program = self.table.geometry(entity.category);
            if program.is_null() {
                warn!(
                    "No {} program, skipping entity '{}'",
                    entity.category, entity.name
                );
                continue;
            }

            self.device.use_program(program.handle);
            set_sampler_units(self.device);
            self.device.set_uniform_f32("uReliefStrength", scene.relief_strength);
            if entity.category == RenderCategory::EnvironmentMap {
                self.device
                    .bind_texture(ENVIRONMENT_UNIT, TextureTarget::CubeMap, self.environment);
            }

            self.uniforms.bind_entity(self.device, entity)?;
            self.draw_entity(entity, program, bind_material_deferred)?;
        }
        Ok(())
    }

    /// Samples the attachments of `target` onto the default framebuffer.
    pub fn composition_pass(&mut self, target: &FrameTarget, quad_mesh: usize) -> RenderResult<()> {
        let program = self.table.composition;
        self.bind_default_framebuffer();
        self.device.set_depth_state(DepthState::DISABLED);
        self.device.set_cull_mode(CullMode::None);

        if program.is_null() {
            warn!("No composition program, skipping composition");
            return Ok(());
        }

        self.device.use_program(program.handle);
        let count = target.attachment_count();
        for unit in 0..count {
            self.device
                .set_uniform_i32(&format!("uAttachment{}", unit), unit as i32);
        }
        self.device.set_uniform_i32("uDepth", count as i32);
        self.device
            .set_uniform_i32("uViewMode", self.scene.buffer_view.shader_index());
        self.device
            .set_uniform_f32("uDepthIntensity", self.scene.depth_intensity);
        target.bind_attachments(self.device);

        self.draw_mesh(quad_mesh, program)?;

        if self.scene.buffer_view != BufferView::Main {
            debug!("Composited {:?} view", self.scene.buffer_view);
        }
        Ok(())
    }

    /// Draws the active entities straight to the default framebuffer.
    pub fn forward_pass(&mut self, skybox_mesh: usize) -> RenderResult<()> {
        self.bind_default_framebuffer();
        self.device.clear(self.clear_color);

        if self.scene.active_category() == RenderCategory::EnvironmentMap {
            self.skybox_pass(skybox_mesh)?;
        }

        self.device.set_depth_state(DepthState::OPAQUE);
        self.device.set_cull_mode(CullMode::Back);
        self.uniforms.bind_global(self.device)?;

        let program = self.table.forward;
        if program.is_null() {
            warn!("No forward program, skipping forward pass");
            return Ok(());
        }
        self.device.use_program(program.handle);
        set_sampler_units(self.device);
        self.device
            .set_uniform_f32("uReliefStrength", self.scene.relief_strength);

        let scene = self.scene;
        for entity in scene.active_entities() {
            reset_scene_units(self.device);
            self.device.set_uniform_i32(
                "uHeightMapping",
                (entity.category == RenderCategory::ReliefMapping) as i32,
            );
            let reflective = entity.category == RenderCategory::EnvironmentMap;
            self.device
                .set_uniform_i32("uEnvironmentReflection", reflective as i32);
            if reflective {
                self.device
                    .bind_texture(ENVIRONMENT_UNIT, TextureTarget::CubeMap, self.environment);
            }

            self.uniforms.bind_entity(self.device, entity)?;
            self.draw_entity(entity, program, bind_material_forward)?;
        }
        Ok(())
    }

    /// Draws the environment cubemap behind everything else.
    ///
    /// Depth writes and culling are switched off for the cube and restored to
    /// the opaque defaults afterwards.
    fn skybox_pass(&mut self, skybox_mesh: usize) -> RenderResult<()> {
        let program = self.table.skybox;
        if program.is_null() || self.environment.is_null() {
            debug!("Skybox skipped: program or cubemap missing");
            return Ok(());
        }

        self.device.set_depth_state(DepthState::SKYBOX);
        self.device.set_cull_mode(CullMode::None);
        self.device.use_program(program.handle);

        let camera = self.scene.camera();
        let view_projection = camera.projection_matrix() * camera.rotation_only_view_matrix();
        self.device
            .set_uniform_mat4("uViewProjection", &view_projection);
        self.device.set_uniform_i32("uSkybox", 0);
        self.device
            .bind_texture(0, TextureTarget::CubeMap, self.environment);

        let drawn = self.draw_mesh(skybox_mesh, program);

        self.device
            .bind_texture(0, TextureTarget::CubeMap, TextureHandle::NULL);
        self.device.set_depth_state(DepthState::OPAQUE);
        self.device.set_cull_mode(CullMode::Back);
        drawn?;
        self.stats.skybox_drawn = true;
        Ok(())
    }

    fn bind_default_framebuffer(&mut self) {
        self.device.bind_framebuffer(prism_rhi::FramebufferHandle::NULL);
        let (width, height) = self.viewport;
        self.device.set_viewport(width, height);
    }

    /// Draws every submesh of the entity's model with its material.
    fn draw_entity(
        &mut self,
        entity: &Entity,
        program: ShaderSlot,
        bind_material: fn(&mut dyn GraphicsDevice, &ResourceRegistry, &Material),
    ) -> RenderResult<()> {
        let model = self
            .registry
            .model(entity.model)
            .cloned()
            .ok_or_else(|| RenderError::UnknownModel {
                entity: entity.name.clone(),
                model: entity.model,
            })?;
        let submeshes = self.submesh_ranges(model.mesh)?;

        for (submesh, (index_count, index_offset)) in submeshes.into_iter().enumerate() {
            let material_index = model.material_for(submesh);
            if let Some(material) = self.registry.material(material_index) {
                bind_material(self.device, &*self.registry, material);
            }

            let vao = self
                .registry
                .vertex_array(self.device, model.mesh, submesh, program.index)?;
            self.device.bind_vertex_array(vao);
            self.device
                .draw_indexed(index_count, IndexType::U32, index_offset);
            self.stats.draw_calls += 1;
        }
        self.stats.entities_drawn += 1;
        Ok(())
    }

    /// Draws every submesh of a registry mesh without materials.
    fn draw_mesh(&mut self, mesh: usize, program: ShaderSlot) -> RenderResult<()> {
        for (submesh, (index_count, index_offset)) in
            self.submesh_ranges(mesh)?.into_iter().enumerate()
        {
            let vao = self
                .registry
                .vertex_array(self.device, mesh, submesh, program.index)?;
            self.device.bind_vertex_array(vao);
            self.device
                .draw_indexed(index_count, IndexType::U32, index_offset);
            self.stats.draw_calls += 1;
        }
        Ok(())
    }

    /// `(index count, index byte offset)` of each submesh.
    fn submesh_ranges(&self, mesh: usize) -> RenderResult<Vec<(u32, u32)>> {
        let mesh = self
            .registry
            .mesh(mesh)
            .ok_or(prism_resources::ResourceError::InvalidIndex {
                kind: "mesh",
                index: mesh,
            })?;
        Ok(mesh
            .submeshes()
            .iter()
            .map(|s| (s.index_count(), s.index_offset))
            .collect())
    }
}

fn set_sampler_units(device: &mut dyn GraphicsDevice) {
    device.set_uniform_i32("uAlbedoMap", ALBEDO_UNIT as i32);
    device.set_uniform_i32("uNormalMap", NORMAL_UNIT as i32);
    device.set_uniform_i32("uHeightMap", HEIGHT_UNIT as i32);
    device.set_uniform_i32("uEnvironmentMap", ENVIRONMENT_UNIT as i32);
}

fn set_material_constants(device: &mut dyn GraphicsDevice, material: &Material) {
    device.set_uniform_vec3("uAlbedo", material.albedo);
    device.set_uniform_vec3("uEmissive", material.emissive);
    device.set_uniform_f32("uSmoothness", material.smoothness);
    device.set_uniform_i32("uHasAlbedoMap", material.has_albedo_texture() as i32);
    device.set_uniform_i32("uHasNormalMap", material.has_normal_texture() as i32);
    device.set_uniform_i32("uHasHeightMap", material.has_height_texture() as i32);
}

/// Binds only the texture slots the material fills.
fn bind_material_deferred(
    device: &mut dyn GraphicsDevice,
    registry: &ResourceRegistry,
    material: &Material,
) {
    set_material_constants(device, material);
    let slots = [
        (ALBEDO_UNIT, material.albedo_texture),
        (NORMAL_UNIT, material.normal_texture),
        (HEIGHT_UNIT, material.height_texture),
    ];
    for (unit, texture) in slots {
        if texture != NO_TEXTURE {
            device.bind_texture(unit, TextureTarget::Texture2D, registry.texture_handle(texture));
        }
    }
}

/// Forward variant: units were reset by the caller, so normal mapping
/// follows the material.
fn bind_material_forward(
    device: &mut dyn GraphicsDevice,
    registry: &ResourceRegistry,
    material: &Material,
) {
    bind_material_deferred(device, registry, material);
    device.set_uniform_i32("uNormalMapping", material.has_normal_texture() as i32);
}
