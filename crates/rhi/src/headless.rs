//! Headless device for tests and offline runs.
//!
//! This backend performs no rendering. It keeps every object in host memory
//! with the same validation rules a GL driver applies (buffer ranges,
//! framebuffer completeness, program compilation) and records each draw with
//! the state it was issued under, so the engine can be exercised and inspected
//! without GPU hardware.
//!
//! Program compilation runs a small preprocessor over the composed stage
//! sources: `#define`, `#ifdef`, `#ifndef`, `#else` and `#endif` are honoured,
//! an active `#error` fails compilation, and active
//! `layout(location = N) in vecK name;` declarations of the vertex stage become
//! the program's reflected attributes. Uniform blocks are sized with the std140
//! rules; a draw whose bound range is smaller than a block the program
//! declares is refused, as GL leaves its results undefined.

use std::collections::{HashMap, HashSet};

use glam::{Mat4, Vec3};
use tracing::{trace, warn};

use crate::buffer::{BufferUsage, align_up};
use crate::device::{
    BufferHandle, DeviceInfo, DeviceLimits, FramebufferHandle, GraphicsDevice, ProgramHandle,
    TextureHandle, VertexArrayHandle,
};
use crate::error::{RhiError, RhiResult};
use crate::pipeline::{CullMode, DepthState, IndexType};
use crate::shader::{ShaderStage, VertexShaderAttribute};
use crate::texture::{TextureData, TextureDescriptor, TextureTarget};
use crate::vertex::VertexArrayDescriptor;

/// Number of texture units tracked.
pub const MAX_TEXTURE_UNITS: usize = 16;

/// Value last assigned to a loose uniform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Mat4(Mat4),
}

/// A framebuffer and its attachments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadlessFramebuffer {
    pub colors: Vec<TextureHandle>,
    pub depth: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// One recorded indexed draw and the state it was issued under.
#[derive(Clone, Debug)]
pub struct DrawRecord {
    pub program: ProgramHandle,
    pub vertex_array: VertexArrayHandle,
    pub framebuffer: FramebufferHandle,
    /// Non-null texture bindings as `(unit, target, texture)`.
    pub textures: Vec<(u32, TextureTarget, TextureHandle)>,
    pub uniforms: HashMap<String, UniformValue>,
    /// Uniform range bindings as `binding -> (buffer, offset, size)`.
    pub uniform_ranges: HashMap<u32, (BufferHandle, u32, u32)>,
    pub depth: DepthState,
    pub cull: CullMode,
    pub index_count: u32,
    pub index_type: IndexType,
    pub byte_offset: u32,
}

impl DrawRecord {
    /// Texture bound to `unit` at draw time.
    pub fn texture_at(&self, unit: u32) -> Option<TextureHandle> {
        self.textures
            .iter()
            .find(|(u, _, _)| *u == unit)
            .map(|(_, _, texture)| *texture)
    }

    /// Integer uniform value at draw time.
    pub fn uniform_i32(&self, name: &str) -> Option<i32> {
        match self.uniforms.get(name) {
            Some(UniformValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// Vector uniform value at draw time.
    pub fn uniform_vec3(&self, name: &str) -> Option<Vec3> {
        match self.uniforms.get(name) {
            Some(UniformValue::Vec3(value)) => Some(*value),
            _ => None,
        }
    }

    /// Float uniform value at draw time.
    pub fn uniform_f32(&self, name: &str) -> Option<f32> {
        match self.uniforms.get(name) {
            Some(UniformValue::Float(value)) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct HeadlessBuffer {
    usage: BufferUsage,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct HeadlessProgram {
    label: String,
    attributes: Vec<VertexShaderAttribute>,
    uniforms: HashMap<String, UniformValue>,
    /// Block name to binding point.
    blocks: HashMap<String, u32>,
    /// Block name to std140 data size.
    block_sizes: HashMap<String, u32>,
}

/// What compiling one stage revealed.
#[derive(Debug, Default, PartialEq)]
struct StageReflection {
    attributes: Vec<VertexShaderAttribute>,
    block_sizes: HashMap<String, u32>,
}

#[derive(Debug)]
struct BoundState {
    program: ProgramHandle,
    vertex_array: VertexArrayHandle,
    framebuffer: FramebufferHandle,
    /// Per unit: the 2D binding and the cube map binding.
    textures: [[TextureHandle; 2]; MAX_TEXTURE_UNITS],
    uniform_ranges: HashMap<u32, (BufferHandle, u32, u32)>,
    depth: DepthState,
    cull: CullMode,
    viewport: (u32, u32),
}

impl Default for BoundState {
    fn default() -> Self {
        Self {
            program: ProgramHandle::NULL,
            vertex_array: VertexArrayHandle::NULL,
            framebuffer: FramebufferHandle::NULL,
            textures: [[TextureHandle::NULL; 2]; MAX_TEXTURE_UNITS],
            uniform_ranges: HashMap::new(),
            depth: DepthState::DISABLED,
            cull: CullMode::None,
            viewport: (0, 0),
        }
    }
}

/// Headless recording device.
#[derive(Debug)]
pub struct HeadlessDevice {
    info: DeviceInfo,
    limits: DeviceLimits,
    next_name: u32,
    buffers: HashMap<u32, HeadlessBuffer>,
    textures: HashMap<u32, TextureDescriptor>,
    framebuffers: HashMap<u32, HeadlessFramebuffer>,
    vertex_arrays: HashMap<u32, VertexArrayDescriptor>,
    programs: HashMap<u32, HeadlessProgram>,
    vertex_arrays_created: usize,
    state: BoundState,
    draws: Vec<DrawRecord>,
    clears: Vec<FramebufferHandle>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Create a headless device with default limits.
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    /// Create a headless device reporting `limits`.
    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            info: DeviceInfo {
                renderer: "Headless".to_string(),
                vendor: "prism".to_string(),
                version: "4.3 (headless)".to_string(),
                shading_language_version: "4.30".to_string(),
                extensions: Vec::new(),
            },
            limits,
            next_name: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays_created: 0,
            state: BoundState::default(),
            draws: Vec::new(),
            clears: Vec::new(),
        }
    }

    fn allocate_name(&mut self) -> u32 {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    // Inspection

    /// Contents of a live buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(|b| b.data.as_slice())
    }

    /// Current `(buffer, offset, size)` bound to a uniform binding point.
    pub fn uniform_binding(&self, binding: u32) -> Option<(BufferHandle, u32, u32)> {
        self.state.uniform_ranges.get(&binding).copied()
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    pub fn framebuffer(&self, framebuffer: FramebufferHandle) -> Option<&HeadlessFramebuffer> {
        self.framebuffers.get(&framebuffer.0)
    }

    pub fn vertex_array(&self, vertex_array: VertexArrayHandle) -> Option<&VertexArrayDescriptor> {
        self.vertex_arrays.get(&vertex_array.0)
    }

    pub fn is_program_live(&self, program: ProgramHandle) -> bool {
        self.programs.contains_key(&program.0)
    }

    /// Label a program was created with.
    pub fn program_label(&self, program: ProgramHandle) -> Option<&str> {
        self.programs.get(&program.0).map(|p| p.label.as_str())
    }

    /// std140 data size of a uniform block a program declares.
    pub fn uniform_block_size(&self, program: ProgramHandle, block: &str) -> Option<u32> {
        self.programs
            .get(&program.0)
            .and_then(|p| p.block_sizes.get(block).copied())
    }

    /// Binding point assigned to a program's uniform block.
    pub fn uniform_block_binding(&self, program: ProgramHandle, block: &str) -> Option<u32> {
        self.programs
            .get(&program.0)
            .and_then(|p| p.blocks.get(block).copied())
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn live_framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn live_vertex_array_count(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_program_count(&self) -> usize {
        self.programs.len()
    }

    /// Total vertex arrays ever created, including destroyed ones.
    pub fn vertex_arrays_created(&self) -> usize {
        self.vertex_arrays_created
    }

    /// Draws recorded since the last [`Self::take_draws`].
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Drains the draw log.
    pub fn take_draws(&mut self) -> Vec<DrawRecord> {
        self.clears.clear();
        std::mem::take(&mut self.draws)
    }

    /// Framebuffers cleared since the last [`Self::take_draws`].
    pub fn clears(&self) -> &[FramebufferHandle] {
        &self.clears
    }

    pub fn depth_state(&self) -> DepthState {
        self.state.depth
    }

    pub fn cull_mode(&self) -> CullMode {
        self.state.cull
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.state.viewport
    }

    pub fn bound_framebuffer(&self) -> FramebufferHandle {
        self.state.framebuffer
    }

    fn check_attachment(
        &self,
        texture: TextureHandle,
        depth: bool,
    ) -> RhiResult<&TextureDescriptor> {
        let desc = self
            .textures
            .get(&texture.0)
            .ok_or_else(|| RhiError::InvalidHandle(format!("{} is not a texture", texture)))?;

        let format_ok = if depth {
            desc.format.is_depth()
        } else {
            desc.format.is_color_renderable()
        };
        if !format_ok || desc.target != TextureTarget::Texture2D {
            return Err(RhiError::FramebufferIncomplete(format!(
                "GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT ({} is {:?} {:?})",
                texture, desc.target, desc.format
            )));
        }
        Ok(desc)
    }
}

/// Runs the preprocessor over `source`.
///
/// Returns the active `layout(location = N) in` declarations and uniform block
/// sizes, or the message of the first active `#error`.
fn preprocess(source: &str) -> Result<StageReflection, String> {
    let mut defines: HashMap<&str, &str> = HashMap::new();
    let mut branches: Vec<bool> = Vec::new();
    let mut attributes = Vec::new();
    let mut active = String::new();

    for (number, line) in source.lines().enumerate() {
        let line = line.trim();

        if let Some(symbol) = line.strip_prefix("#ifdef") {
            branches.push(defines.contains_key(symbol.trim()));
            continue;
        }
        if let Some(symbol) = line.strip_prefix("#ifndef") {
            branches.push(!defines.contains_key(symbol.trim()));
            continue;
        }
        if line.starts_with("#else") {
            if let Some(top) = branches.last_mut() {
                *top = !*top;
            }
            continue;
        }
        if line.starts_with("#endif") {
            branches.pop();
            continue;
        }

        if !branches.iter().all(|&active| active) {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#define") {
            let mut tokens = rest.split_whitespace();
            if let Some(symbol) = tokens.next() {
                defines.insert(symbol, tokens.next().unwrap_or(""));
            }
            continue;
        }
        if let Some(message) = line.strip_prefix("#error") {
            return Err(format!("0:{}: error: {}", number + 1, message.trim()));
        }
        if line.starts_with('#') {
            continue;
        }
        if let Some(attribute) = parse_input_declaration(line) {
            attributes.push(attribute);
        }

        let code = line.split("//").next().unwrap_or("");
        active.push_str(code);
        active.push(' ');
    }

    attributes.sort_by_key(|a| a.location);
    Ok(StageReflection {
        attributes,
        block_sizes: reflect_uniform_blocks(&active, &defines),
    })
}

/// std140 `(size, alignment)` of a member type.
type Std140Layout = (u32, u32);

fn std140_scalar_layout(ty: &str) -> Option<Std140Layout> {
    let layout = match ty {
        "float" | "int" | "uint" | "bool" => (4, 4),
        "vec2" | "ivec2" | "uvec2" => (8, 8),
        "vec3" | "ivec3" | "uvec3" => (12, 16),
        "vec4" | "ivec4" | "uvec4" => (16, 16),
        "mat3" => (48, 16),
        "mat4" => (64, 16),
        _ => return None,
    };
    Some(layout)
}

/// Lays out the members of a struct or block body.
///
/// Returns the end offset of the last member and the largest alignment, or
/// `None` when a member type or array length cannot be resolved.
fn std140_members(
    body: &str,
    structs: &HashMap<String, Std140Layout>,
    defines: &HashMap<&str, &str>,
) -> Option<Std140Layout> {
    let mut offset = 0;
    let mut max_align = 4;

    for member in body.split(';').map(str::trim).filter(|m| !m.is_empty()) {
        let mut tokens = member.split_whitespace().rev();
        let declarator = tokens.next()?;
        let ty = tokens.next()?;

        let (mut size, mut align) = match std140_scalar_layout(ty) {
            Some(layout) => layout,
            None => *structs.get(ty)?,
        };

        if let Some((_, length)) = declarator.split_once('[') {
            let length = length.trim_end_matches(']').trim();
            let length = defines.get(length).copied().unwrap_or(length);
            let count: u32 = length.parse().ok()?;
            // Array elements are padded to vec4 strides
            align = align_up(align, 16);
            size = align_up(size, 16) * count;
        }

        offset = align_up(offset, align) + size;
        max_align = max_align.max(align);
    }
    Some((offset, max_align))
}

/// Finds `struct` and `uniform` block declarations in preprocessed code and
/// returns the std140 data size of every block.
fn reflect_uniform_blocks(code: &str, defines: &HashMap<&str, &str>) -> HashMap<String, u32> {
    let mut structs: HashMap<String, Std140Layout> = HashMap::new();
    let mut blocks = HashMap::new();
    let mut rest = code;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| open + c) else {
            break;
        };
        let head = rest[..open].rsplit(&[';', '}'][..]).next().unwrap_or("");
        let body = &rest[open + 1..close];
        rest = &rest[close + 1..];

        let mut tokens = head.split_whitespace().rev();
        let (Some(name), Some(keyword)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        let Some((end, align)) = std140_members(body, &structs, defines) else {
            continue;
        };
        match keyword {
            "struct" => {
                let align = align_up(align, 16);
                structs.insert(name.to_string(), (align_up(end, align), align));
            }
            "uniform" => {
                blocks.insert(name.to_string(), align_up(end, 16));
            }
            _ => {}
        }
    }
    blocks
}

/// Parses `layout(location = N) in TYPE name;`.
fn parse_input_declaration(line: &str) -> Option<VertexShaderAttribute> {
    let rest = line.strip_prefix("layout")?.trim_start().strip_prefix('(')?;
    let (qualifiers, declaration) = rest.split_once(')')?;

    let location = qualifiers.split(',').find_map(|qualifier| {
        let (key, value) = qualifier.split_once('=')?;
        if key.trim() == "location" {
            value.trim().parse::<u32>().ok()
        } else {
            None
        }
    })?;

    let mut tokens = declaration.trim().trim_end_matches(';').split_whitespace();
    if tokens.next()? != "in" {
        return None;
    }
    let component_count = match tokens.next()? {
        "float" => 1,
        "vec2" => 2,
        "vec3" => 3,
        "vec4" => 4,
        _ => return None,
    };

    Some(VertexShaderAttribute {
        location,
        component_count,
    })
}

/// Targets tracked per texture unit, in slot order.
const TEXTURE_TARGETS: [TextureTarget; 2] = [TextureTarget::Texture2D, TextureTarget::CubeMap];

#[inline]
fn target_slot(target: TextureTarget) -> usize {
    match target {
        TextureTarget::Texture2D => 0,
        TextureTarget::CubeMap => 1,
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn name(&self) -> &str {
        "Headless"
    }

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_buffer(&mut self, usage: BufferUsage, size: u32) -> RhiResult<BufferHandle> {
        let name = self.allocate_name();
        self.buffers.insert(
            name,
            HeadlessBuffer {
                usage,
                data: vec![0; size as usize],
            },
        );
        trace!("Headless: created {} buffer {} ({} bytes)", usage.name(), name, size);
        Ok(BufferHandle(name))
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        usage: BufferUsage,
        offset: u32,
        data: &[u8],
    ) -> RhiResult<()> {
        let target = self
            .buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| RhiError::InvalidHandle(format!("{} is not a buffer", buffer)))?;

        if target.usage != usage {
            warn!(
                "Headless: {} buffer {} written through the {} target",
                target.usage.name(),
                buffer,
                usage.name()
            );
        }

        let end = offset as u64 + data.len() as u64;
        if end > target.data.len() as u64 {
            return Err(RhiError::BufferOverflow {
                end,
                capacity: target.data.len() as u32,
            });
        }
        target.data[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
        self.state
            .uniform_ranges
            .retain(|_, (bound, _, _)| *bound != buffer);
    }

    fn bind_uniform_range(&mut self, binding: u32, buffer: BufferHandle, offset: u32, size: u32) {
        self.state
            .uniform_ranges
            .insert(binding, (buffer, offset, size));
    }

    fn create_vertex_array(
        &mut self,
        desc: &VertexArrayDescriptor,
    ) -> RhiResult<VertexArrayHandle> {
        for buffer in [desc.vertex_buffer, desc.index_buffer] {
            if !self.buffers.contains_key(&buffer.0) {
                return Err(RhiError::InvalidHandle(format!(
                    "{} is not a buffer",
                    buffer
                )));
            }
        }

        let name = self.allocate_name();
        self.vertex_arrays.insert(name, desc.clone());
        self.vertex_arrays_created += 1;
        trace!(
            "Headless: created vertex array {} with {} attributes",
            name,
            desc.attributes.len()
        );
        Ok(VertexArrayHandle(name))
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array.0);
        if self.state.vertex_array == vertex_array {
            self.state.vertex_array = VertexArrayHandle::NULL;
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.state.vertex_array = vertex_array;
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: TextureData<'_>,
    ) -> RhiResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RhiError::InvalidArgument(format!(
                "Texture size {}x{} has a zero dimension",
                desc.width, desc.height
            )));
        }

        let face_size = desc.face_size();
        let valid = match (desc.target, data) {
            (_, TextureData::Empty) => true,
            (TextureTarget::Texture2D, TextureData::Pixels(pixels)) => pixels.len() >= face_size,
            (TextureTarget::CubeMap, TextureData::CubeFaces(faces)) => {
                faces.iter().all(|face| face.len() >= face_size)
            }
            _ => false,
        };
        if !valid {
            return Err(RhiError::InvalidArgument(format!(
                "Texture data does not match {:?} {}x{} {:?}",
                desc.target, desc.width, desc.height, desc.format
            )));
        }

        let name = self.allocate_name();
        self.textures.insert(name, desc.clone());
        Ok(TextureHandle(name))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: TextureHandle) {
        match self.state.textures.get_mut(unit as usize) {
            Some(slots) => slots[target_slot(target)] = texture,
            None => warn!("Headless: texture unit {} out of range", unit),
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
        if colors.is_empty() && depth.is_null() {
            return Err(RhiError::FramebufferIncomplete(
                "GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT".to_string(),
            ));
        }

        let mut sizes = Vec::with_capacity(colors.len() + 1);
        for &color in colors {
            let desc = self.check_attachment(color, false)?;
            sizes.push((desc.width, desc.height));
        }
        if !depth.is_null() {
            let desc = self.check_attachment(depth, true)?;
            sizes.push((desc.width, desc.height));
        }

        let (width, height) = sizes[0];
        if sizes.iter().any(|&size| size != (width, height)) {
            return Err(RhiError::FramebufferIncomplete(
                "GL_FRAMEBUFFER_INCOMPLETE_DIMENSIONS".to_string(),
            ));
        }

        let name = self.allocate_name();
        self.framebuffers.insert(
            name,
            HeadlessFramebuffer {
                colors: colors.to_vec(),
                depth,
                width,
                height,
            },
        );
        Ok(FramebufferHandle(name))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.framebuffers.remove(&framebuffer.0);
        if self.state.framebuffer == framebuffer {
            self.state.framebuffer = FramebufferHandle::NULL;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.state.framebuffer = framebuffer;
    }

    fn create_program(
        &mut self,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> RhiResult<ProgramHandle> {
        let vertex = preprocess(vertex_source).map_err(|log| RhiError::ShaderCompile {
            program: label.to_string(),
            stage: ShaderStage::Vertex,
            log,
        })?;
        let fragment = preprocess(fragment_source).map_err(|log| RhiError::ShaderCompile {
            program: label.to_string(),
            stage: ShaderStage::Fragment,
            log,
        })?;

        let mut block_sizes = vertex.block_sizes;
        for (block, size) in fragment.block_sizes {
            let entry = block_sizes.entry(block).or_insert(0);
            *entry = (*entry).max(size);
        }

        let name = self.allocate_name();
        self.programs.insert(
            name,
            HeadlessProgram {
                label: label.to_string(),
                attributes: vertex.attributes,
                block_sizes,
                ..Default::default()
            },
        );
        Ok(ProgramHandle(name))
    }

    fn program_attributes(&self, program: ProgramHandle) -> Vec<VertexShaderAttribute> {
        self.programs
            .get(&program.0)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program.0);
        if self.state.program == program {
            self.state.program = ProgramHandle::NULL;
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.state.program = program;
    }

    fn set_uniform_i32(&mut self, name: &str, value: i32) {
        if let Some(program) = self.programs.get_mut(&self.state.program.0) {
            program
                .uniforms
                .insert(name.to_string(), UniformValue::Int(value));
        }
    }

    fn set_uniform_f32(&mut self, name: &str, value: f32) {
        if let Some(program) = self.programs.get_mut(&self.state.program.0) {
            program
                .uniforms
                .insert(name.to_string(), UniformValue::Float(value));
        }
    }

    fn set_uniform_vec3(&mut self, name: &str, value: Vec3) {
        if let Some(program) = self.programs.get_mut(&self.state.program.0) {
            program
                .uniforms
                .insert(name.to_string(), UniformValue::Vec3(value));
        }
    }

    fn set_uniform_mat4(&mut self, name: &str, value: &Mat4) {
        if let Some(program) = self.programs.get_mut(&self.state.program.0) {
            program
                .uniforms
                .insert(name.to_string(), UniformValue::Mat4(*value));
        }
    }

    fn bind_uniform_block(&mut self, program: ProgramHandle, block: &str, binding: u32) {
        if let Some(program) = self.programs.get_mut(&program.0) {
            program.blocks.insert(block.to_string(), binding);
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.state.viewport = (width, height);
    }

    fn clear(&mut self, _color: [f32; 4]) {
        self.clears.push(self.state.framebuffer);
    }

    fn set_depth_state(&mut self, state: DepthState) {
        self.state.depth = state;
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.state.cull = mode;
    }

    fn draw_indexed(&mut self, index_count: u32, index_type: IndexType, byte_offset: u32) {
        let Some(program) = self.programs.get(&self.state.program.0) else {
            warn!(
                "Headless: draw with {} skipped, no live program bound",
                self.state.program
            );
            return;
        };

        for (block, binding) in &program.blocks {
            let (Some(&declared), Some(&(buffer, _, bound))) = (
                program.block_sizes.get(block),
                self.state.uniform_ranges.get(binding),
            ) else {
                continue;
            };
            if bound < declared {
                warn!(
                    "Headless: draw with {} skipped, {} range of {} is {} bytes but the block needs {}",
                    self.state.program, block, buffer, bound, declared
                );
                return;
            }
        }

        let textures = self
            .state
            .textures
            .iter()
            .enumerate()
            .flat_map(|(unit, slots)| {
                TEXTURE_TARGETS
                    .into_iter()
                    .zip(slots.iter())
                    .filter(|(_, texture)| !texture.is_null())
                    .map(move |(target, texture)| (unit as u32, target, *texture))
            })
            .collect();

        self.draws.push(DrawRecord {
            program: self.state.program,
            vertex_array: self.state.vertex_array,
            framebuffer: self.state.framebuffer,
            textures,
            uniforms: program.uniforms.clone(),
            uniform_ranges: self.state.uniform_ranges.clone(),
            depth: self.state.depth,
            cull: self.state.cull,
            index_count,
            index_type,
            byte_offset,
        });
    }
}
