//! OpenGL 4.3 device on top of `glow`.
//!
//! The embedder owns the window and context; [`GlDevice::new`] takes the
//! loaded `glow::Context` and queries driver strings and limits once.

use std::num::NonZeroU32;

use glam::{Mat4, Vec3};
use glow::HasContext;
use tracing::{debug, warn};

use crate::buffer::BufferUsage;
use crate::device::{
    BufferHandle, DeviceInfo, DeviceLimits, FramebufferHandle, GraphicsDevice, ProgramHandle,
    TextureHandle, VertexArrayHandle,
};
use crate::error::{RhiError, RhiResult};
use crate::pipeline::{CullMode, DepthState, IndexType};
use crate::shader::{ShaderStage, VertexShaderAttribute};
use crate::texture::{TextureData, TextureDescriptor, TextureTarget};
use crate::vertex::VertexArrayDescriptor;

macro_rules! native_conversions {
    ($handle:ident, $native:path, $to_native:ident, $from_native:ident) => {
        fn $to_native(handle: $handle) -> Option<$native> {
            NonZeroU32::new(handle.0).map($native)
        }

        fn $from_native(native: $native) -> $handle {
            $handle(native.0.get())
        }
    };
}

native_conversions!(BufferHandle, glow::NativeBuffer, native_buffer, buffer_handle);
native_conversions!(TextureHandle, glow::NativeTexture, native_texture, texture_handle);
native_conversions!(
    FramebufferHandle,
    glow::NativeFramebuffer,
    native_framebuffer,
    framebuffer_handle
);
native_conversions!(
    VertexArrayHandle,
    glow::NativeVertexArray,
    native_vertex_array,
    vertex_array_handle
);
native_conversions!(ProgramHandle, glow::NativeProgram, native_program, program_handle);

/// Component count of an active attribute type, `None` for non-float inputs.
pub(crate) fn attribute_component_count(gl_type: u32) -> Option<u32> {
    match gl_type {
        glow::FLOAT => Some(1),
        glow::FLOAT_VEC2 => Some(2),
        glow::FLOAT_VEC3 => Some(3),
        glow::FLOAT_VEC4 => Some(4),
        _ => None,
    }
}

/// Name of a `glCheckFramebufferStatus` result.
pub(crate) fn framebuffer_status_name(status: u32) -> String {
    match status {
        glow::FRAMEBUFFER_COMPLETE => "GL_FRAMEBUFFER_COMPLETE".to_string(),
        glow::FRAMEBUFFER_UNDEFINED => "GL_FRAMEBUFFER_UNDEFINED".to_string(),
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => {
            "GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT".to_string()
        }
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => {
            "GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT".to_string()
        }
        glow::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => {
            "GL_FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER".to_string()
        }
        glow::FRAMEBUFFER_UNSUPPORTED => "GL_FRAMEBUFFER_UNSUPPORTED".to_string(),
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => {
            "GL_FRAMEBUFFER_INCOMPLETE_MULTISAMPLE".to_string()
        }
        other => format!("0x{:X}", other),
    }
}

/// OpenGL device.
pub struct GlDevice {
    gl: glow::Context,
    info: DeviceInfo,
    limits: DeviceLimits,
    current_program: Option<glow::NativeProgram>,
}

impl GlDevice {
    /// Wraps a current GL context and queries its report and limits.
    ///
    /// # Safety
    ///
    /// `gl` must be current on the calling thread for the whole lifetime of
    /// the device, and the device must only be used from that thread.
    pub unsafe fn new(gl: glow::Context) -> Self {
        let (info, limits) = unsafe {
            let info = DeviceInfo {
                renderer: gl.get_parameter_string(glow::RENDERER),
                vendor: gl.get_parameter_string(glow::VENDOR),
                version: gl.get_parameter_string(glow::VERSION),
                shading_language_version: gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION),
                extensions: {
                    let mut extensions: Vec<String> =
                        gl.supported_extensions().iter().cloned().collect();
                    extensions.sort();
                    extensions
                },
            };
            let limits = DeviceLimits {
                max_color_attachments: gl.get_parameter_i32(glow::MAX_COLOR_ATTACHMENTS).max(1)
                    as u32,
                max_uniform_block_size: gl.get_parameter_i32(glow::MAX_UNIFORM_BLOCK_SIZE).max(0)
                    as u32,
                uniform_buffer_offset_alignment: gl
                    .get_parameter_i32(glow::UNIFORM_BUFFER_OFFSET_ALIGNMENT)
                    .max(1) as u32,
            };
            (info, limits)
        };

        Self {
            gl,
            info,
            limits,
            current_program: None,
        }
    }

    /// The wrapped context.
    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    fn compile_stage(
        &self,
        label: &str,
        stage: ShaderStage,
        source: &str,
    ) -> RhiResult<glow::NativeShader> {
        unsafe {
            let shader = self
                .gl
                .create_shader(stage.to_gl())
                .map_err(RhiError::Backend)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);

            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(RhiError::ShaderCompile {
                    program: label.to_string(),
                    stage,
                    log,
                });
            }
            Ok(shader)
        }
    }

    fn uniform_location(&self, name: &str) -> Option<glow::NativeUniformLocation> {
        let program = self.current_program?;
        unsafe { self.gl.get_uniform_location(program, name) }
    }
}

impl GraphicsDevice for GlDevice {
    fn name(&self) -> &str {
        "OpenGL"
    }

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_buffer(&mut self, usage: BufferUsage, size: u32) -> RhiResult<BufferHandle> {
        let target = usage.to_gl_target();
        unsafe {
            // Binding an element buffer would otherwise modify the bound VAO
            self.gl.bind_vertex_array(None);
            let buffer = self.gl.create_buffer().map_err(RhiError::Backend)?;
            self.gl.bind_buffer(target, Some(buffer));
            self.gl
                .buffer_data_size(target, size as i32, usage.to_gl_usage());
            self.gl.bind_buffer(target, None);
            Ok(buffer_handle(buffer))
        }
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        usage: BufferUsage,
        offset: u32,
        data: &[u8],
    ) -> RhiResult<()> {
        let native = native_buffer(buffer)
            .ok_or_else(|| RhiError::InvalidHandle("write to null buffer".to_string()))?;
        let target = usage.to_gl_target();

        unsafe {
            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(target, Some(native));
            let ptr = self.gl.map_buffer_range(
                target,
                offset as i32,
                data.len() as i32,
                glow::MAP_WRITE_BIT | glow::MAP_INVALIDATE_RANGE_BIT,
            );
            if ptr.is_null() {
                self.gl.bind_buffer(target, None);
                return Err(RhiError::Backend(format!(
                    "glMapBufferRange failed for {} ({} bytes at {})",
                    buffer,
                    data.len(),
                    offset
                )));
            }
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
            self.gl.unmap_buffer(target);
            self.gl.bind_buffer(target, None);
        }
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(native) = native_buffer(buffer) {
            unsafe { self.gl.delete_buffer(native) };
        }
    }

    fn bind_uniform_range(&mut self, binding: u32, buffer: BufferHandle, offset: u32, size: u32) {
        unsafe {
            self.gl.bind_buffer_range(
                glow::UNIFORM_BUFFER,
                binding,
                native_buffer(buffer),
                offset as i32,
                size as i32,
            );
        }
    }

    fn create_vertex_array(
        &mut self,
        desc: &VertexArrayDescriptor,
    ) -> RhiResult<VertexArrayHandle> {
        unsafe {
            let vertex_array = self.gl.create_vertex_array().map_err(RhiError::Backend)?;
            self.gl.bind_vertex_array(Some(vertex_array));
            self.gl
                .bind_buffer(glow::ARRAY_BUFFER, native_buffer(desc.vertex_buffer));
            self.gl
                .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, native_buffer(desc.index_buffer));

            for attribute in &desc.attributes {
                self.gl.vertex_attrib_pointer_f32(
                    attribute.location,
                    attribute.component_count as i32,
                    glow::FLOAT,
                    false,
                    attribute.stride as i32,
                    attribute.offset as i32,
                );
                self.gl.enable_vertex_attrib_array(attribute.location);
            }

            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Ok(vertex_array_handle(vertex_array))
        }
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        if let Some(native) = native_vertex_array(vertex_array) {
            unsafe { self.gl.delete_vertex_array(native) };
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        unsafe { self.gl.bind_vertex_array(native_vertex_array(vertex_array)) };
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: TextureData<'_>,
    ) -> RhiResult<TextureHandle> {
        let target = desc.target.to_gl();
        let (internal, format, ty) = desc.format.to_gl();
        let (width, height) = (desc.width as i32, desc.height as i32);

        unsafe {
            let texture = self.gl.create_texture().map_err(RhiError::Backend)?;
            self.gl.bind_texture(target, Some(texture));
            // RGB rows are not 4-byte aligned
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);

            match (desc.target, data) {
                (TextureTarget::Texture2D, TextureData::Pixels(pixels)) => {
                    self.gl.tex_image_2d(
                        target,
                        0,
                        internal as i32,
                        width,
                        height,
                        0,
                        format,
                        ty,
                        Some(pixels),
                    );
                }
                (TextureTarget::CubeMap, TextureData::CubeFaces(faces)) => {
                    for (i, face) in faces.iter().enumerate() {
                        self.gl.tex_image_2d(
                            glow::TEXTURE_CUBE_MAP_POSITIVE_X + i as u32,
                            0,
                            internal as i32,
                            width,
                            height,
                            0,
                            format,
                            ty,
                            Some(face),
                        );
                    }
                }
                (TextureTarget::Texture2D, TextureData::Empty) => {
                    self.gl.tex_image_2d(
                        target,
                        0,
                        internal as i32,
                        width,
                        height,
                        0,
                        format,
                        ty,
                        None,
                    );
                }
                (TextureTarget::CubeMap, TextureData::Empty) => {
                    for i in 0..6 {
                        self.gl.tex_image_2d(
                            glow::TEXTURE_CUBE_MAP_POSITIVE_X + i,
                            0,
                            internal as i32,
                            width,
                            height,
                            0,
                            format,
                            ty,
                            None,
                        );
                    }
                }
                _ => {
                    self.gl.bind_texture(target, None);
                    self.gl.delete_texture(texture);
                    return Err(RhiError::InvalidArgument(format!(
                        "Texture data does not match target {:?}",
                        desc.target
                    )));
                }
            }

            let wrap = desc.wrap.to_gl() as i32;
            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, wrap);
            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, wrap);
            if desc.target == TextureTarget::CubeMap {
                self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, wrap);
            }
            self.gl.tex_parameter_i32(
                target,
                glow::TEXTURE_MIN_FILTER,
                desc.filter.to_gl(desc.mipmaps) as i32,
            );
            self.gl.tex_parameter_i32(
                target,
                glow::TEXTURE_MAG_FILTER,
                desc.filter.to_gl(false) as i32,
            );
            if desc.mipmaps {
                self.gl.generate_mipmap(target);
            }

            self.gl.bind_texture(target, None);
            Ok(texture_handle(texture))
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(native) = native_texture(texture) {
            unsafe { self.gl.delete_texture(native) };
        }
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: TextureHandle) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(target.to_gl(), native_texture(texture));
        }
    }

    fn create_framebuffer(
        &mut self,
        colors: &[TextureHandle],
        depth: TextureHandle,
    ) -> RhiResult<FramebufferHandle> {
        if colors.len() as u32 > self.limits.max_color_attachments {
            return Err(RhiError::TooManyAttachments {
                requested: colors.len() as u32,
                max: self.limits.max_color_attachments,
            });
        }

        unsafe {
            let framebuffer = self.gl.create_framebuffer().map_err(RhiError::Backend)?;
            self.gl
                .bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));

            let mut draw_buffers = Vec::with_capacity(colors.len());
            for (i, &color) in colors.iter().enumerate() {
                let attachment = glow::COLOR_ATTACHMENT0 + i as u32;
                self.gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    attachment,
                    glow::TEXTURE_2D,
                    native_texture(color),
                    0,
                );
                draw_buffers.push(attachment);
            }
            if !depth.is_null() {
                self.gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::DEPTH_ATTACHMENT,
                    glow::TEXTURE_2D,
                    native_texture(depth),
                    0,
                );
            }

            let status = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                self.gl.delete_framebuffer(framebuffer);
                return Err(RhiError::FramebufferIncomplete(framebuffer_status_name(
                    status,
                )));
            }

            if draw_buffers.is_empty() {
                self.gl.draw_buffers(&[glow::NONE]);
            } else {
                self.gl.draw_buffers(&draw_buffers);
            }
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);

            let handle = framebuffer_handle(framebuffer);
            debug!(
                "Created framebuffer {} with {} color attachments",
                handle,
                colors.len()
            );
            Ok(handle)
        }
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if let Some(native) = native_framebuffer(framebuffer) {
            unsafe { self.gl.delete_framebuffer(native) };
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        unsafe {
            self.gl
                .bind_framebuffer(glow::FRAMEBUFFER, native_framebuffer(framebuffer));
        }
    }

    fn create_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> RhiResult<ProgramHandle> {
        let vertex = self.compile_stage(label, ShaderStage::Vertex, vertex_source)?;
        let fragment = match self.compile_stage(label, ShaderStage::Fragment, fragment_source) {
            Ok(shader) => shader,
            Err(e) => {
                unsafe { self.gl.delete_shader(vertex) };
                return Err(e);
            }
        };

        unsafe {
            let program = match self.gl.create_program() {
                Ok(program) => program,
                Err(e) => {
                    self.gl.delete_shader(vertex);
                    self.gl.delete_shader(fragment);
                    return Err(RhiError::Backend(e));
                }
            };
            self.gl.attach_shader(program, vertex);
            self.gl.attach_shader(program, fragment);
            self.gl.link_program(program);

            let linked = self.gl.get_program_link_status(program);
            self.gl.detach_shader(program, vertex);
            self.gl.detach_shader(program, fragment);
            self.gl.delete_shader(vertex);
            self.gl.delete_shader(fragment);

            if !linked {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(RhiError::ShaderLink {
                    program: label.to_string(),
                    log,
                });
            }
            Ok(program_handle(program))
        }
    }

    fn program_attributes(&self, program: ProgramHandle) -> Vec<VertexShaderAttribute> {
        let Some(native) = native_program(program) else {
            return Vec::new();
        };

        let mut attributes = Vec::new();
        unsafe {
            let count = self.gl.get_active_attributes(native);
            for index in 0..count {
                let Some(active) = self.gl.get_active_attribute(native, index) else {
                    continue;
                };
                // Built-ins such as gl_VertexID have no location
                let Some(location) = self.gl.get_attrib_location(native, &active.name) else {
                    continue;
                };
                match attribute_component_count(active.atype) {
                    Some(component_count) => attributes.push(VertexShaderAttribute {
                        location,
                        component_count,
                    }),
                    None => warn!(
                        "Attribute '{}' of {} has unsupported type 0x{:X}",
                        active.name, program, active.atype
                    ),
                }
            }
        }
        attributes.sort_by_key(|a| a.location);
        attributes
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if let Some(native) = native_program(program) {
            if self.current_program == Some(native) {
                self.current_program = None;
            }
            unsafe { self.gl.delete_program(native) };
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        let native = native_program(program);
        self.current_program = native;
        unsafe { self.gl.use_program(native) };
    }

    fn set_uniform_i32(&mut self, name: &str, value: i32) {
        if let Some(location) = self.uniform_location(name) {
            unsafe { self.gl.uniform_1_i32(Some(&location), value) };
        }
    }

    fn set_uniform_f32(&mut self, name: &str, value: f32) {
        if let Some(location) = self.uniform_location(name) {
            unsafe { self.gl.uniform_1_f32(Some(&location), value) };
        }
    }

    fn set_uniform_vec3(&mut self, name: &str, value: Vec3) {
        if let Some(location) = self.uniform_location(name) {
            unsafe { self.gl.uniform_3_f32(Some(&location), value.x, value.y, value.z) };
        }
    }

    fn set_uniform_mat4(&mut self, name: &str, value: &Mat4) {
        if let Some(location) = self.uniform_location(name) {
            unsafe {
                self.gl
                    .uniform_matrix_4_f32_slice(Some(&location), false, &value.to_cols_array())
            };
        }
    }

    fn bind_uniform_block(&mut self, program: ProgramHandle, block: &str, binding: u32) {
        let Some(native) = native_program(program) else {
            return;
        };
        unsafe {
            match self.gl.get_uniform_block_index(native, block) {
                Some(index) => self.gl.uniform_block_binding(native, index, binding),
                None => debug!("{} has no uniform block '{}'", program, block),
            }
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        unsafe { self.gl.viewport(0, 0, width as i32, height as i32) };
    }

    fn clear(&mut self, color: [f32; 4]) {
        unsafe {
            self.gl.clear_color(color[0], color[1], color[2], color[3]);
            self.gl
                .clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    fn set_depth_state(&mut self, state: DepthState) {
        unsafe {
            if state.test_enable {
                self.gl.enable(glow::DEPTH_TEST);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }
            self.gl.depth_mask(state.write_enable);
            self.gl.depth_func(state.compare_op.to_gl());
        }
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        unsafe {
            match mode.to_gl() {
                Some(face) => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(face);
                }
                None => self.gl.disable(glow::CULL_FACE),
            }
        }
    }

    fn draw_indexed(&mut self, index_count: u32, index_type: IndexType, byte_offset: u32) {
        unsafe {
            self.gl.draw_elements(
                glow::TRIANGLES,
                index_count as i32,
                index_type.to_gl(),
                byte_offset as i32,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_conversion_round_trip() {
        assert!(native_buffer(BufferHandle::NULL).is_none());
        let native = native_texture(TextureHandle(9)).unwrap();
        assert_eq!(texture_handle(native), TextureHandle(9));
        assert!(native_program(ProgramHandle::NULL).is_none());
    }

    #[test]
    fn test_attribute_component_count() {
        assert_eq!(attribute_component_count(glow::FLOAT), Some(1));
        assert_eq!(attribute_component_count(glow::FLOAT_VEC3), Some(3));
        assert_eq!(attribute_component_count(glow::FLOAT_VEC4), Some(4));
        assert_eq!(attribute_component_count(glow::INT), None);
    }

    #[test]
    fn test_framebuffer_status_name() {
        assert_eq!(
            framebuffer_status_name(glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT),
            "GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT"
        );
        assert_eq!(framebuffer_status_name(0x1234), "0x1234");
    }
}
