//! Per-frame uniform packing.
//!
//! [`FrameUniforms`] owns the two uniform buffers the scene programs read:
//!
//! - the global buffer, repacked only when the light block is dirty, the
//!   active category changed or the camera moved;
//! - the entity buffer, rewritten every frame with one [`EntityUniforms`] per
//!   entity, each starting on the device's uniform offset alignment.
//!
//! Both grow on demand. Growth recreates the buffer before it is mapped; a
//! push never resizes.

use glam::Vec3;
use prism_core::RenderCategory;
use prism_rhi::GraphicsDevice;
use prism_rhi::buffer::{Buffer, BufferUsage, align_up};
use prism_scene::{Entity, Light, Scene};
use tracing::{debug, error};

use crate::error::RenderResult;
use crate::ubo::{
    ENTITY_PARAMS_BINDING, EntityUniforms, GLOBAL_PARAMS_BINDING, GLOBAL_PARAMS_BLOCK_SIZE,
    MAX_SHADER_LIGHTS, global_params_size, pack_global_params,
};

/// Initial capacity of the entity buffer, in entities.
const INITIAL_ENTITY_CAPACITY: u32 = 64;

/// What the global block was last packed from.
#[derive(Clone, Copy, Debug, PartialEq)]
struct GlobalKey {
    camera_position: Vec3,
    category: RenderCategory,
}

pub struct FrameUniforms {
    global: Buffer,
    entity: Buffer,
    global_size: u32,
    packed: Option<GlobalKey>,
    light_count: u32,
}

impl FrameUniforms {
    pub fn new(device: &mut dyn GraphicsDevice) -> RenderResult<Self> {
        let alignment = device.limits().uniform_buffer_offset_alignment;
        let global = Buffer::new(
            device,
            global_params_size(MAX_SHADER_LIGHTS),
            BufferUsage::Uniform,
        )?;
        let entity = Buffer::new(
            device,
            INITIAL_ENTITY_CAPACITY * entity_stride(alignment),
            BufferUsage::Uniform,
        )?;
        Ok(Self {
            global,
            entity,
            global_size: 0,
            packed: None,
            light_count: 0,
        })
    }

    /// Repacks the global block if anything it depends on changed.
    ///
    /// Returns true when the block was rewritten.
    pub fn update_global(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
    ) -> RenderResult<bool> {
        let key = GlobalKey {
            camera_position: scene.camera_position(),
            category: scene.active_category(),
        };
        if !scene.lights_dirty() && self.packed == Some(key) {
            return Ok(false);
        }

        let lights: Vec<&Light> = scene.active_lights().collect();
        let required = global_params_size(lights.len() as u32);
        let max = device.limits().max_uniform_block_size;
        if required > max {
            error!(
                "{} lights need a {} byte global block, more than the device limit of {}",
                lights.len(),
                required,
                max
            );
        }
        ensure_capacity(device, &mut self.global, required)?;

        self.global.map()?;
        let written = pack_global_params(&mut self.global, key.camera_position, lights.iter().copied());
        // Upload whatever was written even on failure so the buffer is never
        // left mapped
        self.global.unmap(device)?;
        self.global_size = written?;
        self.light_count = lights.len() as u32;
        self.packed = Some(key);
        scene.mark_lights_clean();

        debug!(
            "Packed {} {} lights ({} bytes)",
            self.light_count, key.category, self.global_size
        );
        Ok(true)
    }

    /// Rewrites every entity's block and records its offset and size on the
    /// entity.
    pub fn update_entities(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
    ) -> RenderResult<()> {
        let entities = scene.entities().len() as u32;
        if entities == 0 {
            return Ok(());
        }

        let alignment = device.limits().uniform_buffer_offset_alignment;
        let stride = entity_stride(alignment);
        ensure_capacity(device, &mut self.entity, entities * stride)?;

        let view_projection = scene.camera().view_projection_matrix();
        self.entity.map()?;
        let packed = pack_entities(&mut self.entity, scene.entities_mut(), view_projection, alignment);
        self.entity.unmap(device)?;
        packed
    }

    /// Binds the global block.
    ///
    /// The range always covers the block as the programs declare it, even
    /// when fewer lights were packed; the buffer never shrinks below that.
    pub fn bind_global(&self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        self.global.bind_uniform_range(
            device,
            GLOBAL_PARAMS_BINDING,
            0,
            self.global_range(),
        )?;
        Ok(())
    }

    /// Size of the range [`Self::bind_global`] binds.
    #[inline]
    pub fn global_range(&self) -> u32 {
        self.global_size.max(GLOBAL_PARAMS_BLOCK_SIZE)
    }

    /// Binds the block of one entity.
    pub fn bind_entity(&self, device: &mut dyn GraphicsDevice, entity: &Entity) -> RenderResult<()> {
        self.entity.bind_uniform_range(
            device,
            ENTITY_PARAMS_BINDING,
            entity.uniform_offset,
            entity.uniform_size,
        )?;
        Ok(())
    }

    /// Number of lights in the last packed global block.
    #[inline]
    pub fn light_count(&self) -> u32 {
        self.light_count
    }

    #[inline]
    pub fn global_buffer(&self) -> &Buffer {
        &self.global
    }

    #[inline]
    pub fn entity_buffer(&self) -> &Buffer {
        &self.entity
    }

    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.global.destroy(device);
        self.entity.destroy(device);
        self.packed = None;
    }
}

/// Bytes reserved per entity.
#[inline]
fn entity_stride(alignment: u32) -> u32 {
    align_up(EntityUniforms::SIZE, alignment.max(1))
}

fn pack_entities(
    buffer: &mut Buffer,
    entities: &mut [Entity],
    view_projection: glam::Mat4,
    alignment: u32,
) -> RenderResult<()> {
    for entity in entities {
        buffer.align_head(alignment)?;
        let uniforms = EntityUniforms::new(entity.transform.world_matrix(), view_projection);
        entity.uniform_offset = buffer.push_pod(&uniforms, alignment)?;
        entity.uniform_size = EntityUniforms::SIZE;
    }
    Ok(())
}

/// Recreates `buffer` at `required` bytes if it is smaller.
fn ensure_capacity(
    device: &mut dyn GraphicsDevice,
    buffer: &mut Buffer,
    required: u32,
) -> RenderResult<()> {
    if required <= buffer.size() {
        return Ok(());
    }
    debug!("Growing uniform buffer from {} to {} bytes", buffer.size(), required);
    buffer.recreate(device, required)?;
    Ok(())
}
