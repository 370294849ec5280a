//! GLSL program management.
//!
//! A program lives in one `.glsl` file holding both stages, separated with
//! `#ifdef VERTEX` / `#ifdef FRAGMENT`. [`compose_stage_source`] prepends the
//! version line, the stage define and any [`ShaderDefine`]s the engine shares
//! with its programs (array sizes, for instance) before compilation.
//!
//! [`Program`] remembers its source path and modification time so that a
//! changed file can be recompiled in place ([`Program::reload`]).
//!
//! # Example
//!
//! ```no_run
//! use prism_rhi::HeadlessDevice;
//! use prism_rhi::shader::Program;
//!
//! let mut device = HeadlessDevice::new();
//! let mut program = Program::load(&mut device, "assets/shaders/geometry.glsl", "geometry");
//!
//! // Once per frame
//! if program.is_stale() {
//!     program.reload(&mut device);
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, error, info};

use crate::device::{GraphicsDevice, ProgramHandle};
use crate::error::RhiResult;

/// GLSL version line prepended to every stage.
pub const GLSL_VERSION: &str = "#version 430 core";

/// Shader stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage - processes each vertex
    Vertex,
    /// Fragment shader stage - processes each fragment
    Fragment,
}

impl ShaderStage {
    /// Converts to the GL shader type.
    pub fn to_gl(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }

    /// Preprocessor symbol selecting this stage in a combined source.
    pub fn define(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "VERTEX",
            ShaderStage::Fragment => "FRAGMENT",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A `#define NAME VALUE` line placed ahead of a program's source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderDefine {
    pub name: String,
    pub value: String,
}

impl ShaderDefine {
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// One active vertex input of a linked program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexShaderAttribute {
    pub location: u32,
    pub component_count: u32,
}

/// Builds the source of one stage from a combined program source.
pub fn compose_stage_source(source: &str, stage: ShaderStage, defines: &[ShaderDefine]) -> String {
    let mut composed = format!("{}\n#define {}\n", GLSL_VERSION, stage.define());
    for define in defines {
        composed.push_str(&format!("#define {} {}\n", define.name, define.value));
    }
    composed.push_str("#line 1\n");
    composed.push_str(source);
    composed
}

/// Compiles both stages of `source` into a program and reflects its inputs.
pub fn build_program(
    device: &mut dyn GraphicsDevice,
    name: &str,
    source: &str,
    defines: &[ShaderDefine],
) -> RhiResult<(ProgramHandle, Vec<VertexShaderAttribute>)> {
    let vertex = compose_stage_source(source, ShaderStage::Vertex, defines);
    let fragment = compose_stage_source(source, ShaderStage::Fragment, defines);

    let handle = device.create_program(name, &vertex, &fragment)?;
    let attributes = device.program_attributes(handle);
    debug!(
        "Linked program '{}' as {} with {} vertex inputs",
        name,
        handle,
        attributes.len()
    );
    Ok((handle, attributes))
}

/// Last modification time of `path`, if it can be read.
pub fn file_timestamp(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// A linked program loaded from a source file.
///
/// A program whose compilation failed keeps a null handle (first load) or its
/// previous handle (reload). Draws with a null program are skipped by callers.
#[derive(Debug)]
pub struct Program {
    name: String,
    path: PathBuf,
    defines: Vec<ShaderDefine>,
    handle: ProgramHandle,
    last_write: Option<SystemTime>,
    attributes: Vec<VertexShaderAttribute>,
}

impl Program {
    /// Loads and links the program at `path`.
    ///
    /// Never fails: IO, compile and link errors are logged and leave the
    /// handle null.
    pub fn load(device: &mut dyn GraphicsDevice, path: impl Into<PathBuf>, name: &str) -> Self {
        Self::load_with_defines(device, path, name, &[])
    }

    /// Like [`Program::load`], with `defines` placed ahead of the source.
    /// Reloads keep the same defines.
    pub fn load_with_defines(
        device: &mut dyn GraphicsDevice,
        path: impl Into<PathBuf>,
        name: &str,
        defines: &[ShaderDefine],
    ) -> Self {
        let mut program = Self {
            name: name.to_string(),
            path: path.into(),
            defines: defines.to_vec(),
            handle: ProgramHandle::NULL,
            last_write: None,
            attributes: Vec::new(),
        };

        program.last_write = file_timestamp(&program.path);
        match program.compile(device) {
            Ok((handle, attributes)) => {
                info!("Loaded program '{}' from {}", name, program.path.display());
                program.handle = handle;
                program.attributes = attributes;
            }
            Err(e) => error!("Program '{}' unavailable: {}", name, e),
        }
        program
    }

    /// Links a program from an in-memory source. Such programs never reload.
    pub fn from_source(
        device: &mut dyn GraphicsDevice,
        name: &str,
        source: &str,
    ) -> RhiResult<Self> {
        let (handle, attributes) = build_program(device, name, source, &[])?;
        Ok(Self {
            name: name.to_string(),
            path: PathBuf::new(),
            defines: Vec::new(),
            handle,
            last_write: None,
            attributes,
        })
    }

    fn compile(
        &self,
        device: &mut dyn GraphicsDevice,
    ) -> RhiResult<(ProgramHandle, Vec<VertexShaderAttribute>)> {
        let source = std::fs::read_to_string(&self.path)?;
        build_program(device, &self.name, &source, &self.defines)
    }

    /// Returns true when the source file changed since the last (re)load.
    pub fn is_stale(&self) -> bool {
        if self.path.as_os_str().is_empty() {
            return false;
        }
        match (file_timestamp(&self.path), self.last_write) {
            (Some(current), Some(previous)) => current != previous,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Recompiles from disk.
    ///
    /// On success the old program is destroyed and its handle returned so that
    /// bindings made for it can be purged. On failure the previous handle is
    /// kept and `None` is returned; the file will not be retried until it
    /// changes again.
    pub fn reload(&mut self, device: &mut dyn GraphicsDevice) -> Option<ProgramHandle> {
        self.last_write = file_timestamp(&self.path);

        match self.compile(device) {
            Ok((handle, attributes)) => {
                let retired = self.handle;
                device.destroy_program(retired);
                self.handle = handle;
                self.attributes = attributes;
                info!(
                    "Reloaded program '{}': {} -> {}",
                    self.name, retired, handle
                );
                Some(retired)
            }
            Err(e) => {
                error!(
                    "Reload of program '{}' failed, keeping {}: {}",
                    self.name, self.handle, e
                );
                None
            }
        }
    }

    /// Destroys the program object.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        device.destroy_program(self.handle);
        self.handle = ProgramHandle::NULL;
        self.attributes.clear();
    }

    #[inline]
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn defines(&self) -> &[ShaderDefine] {
        &self.defines
    }

    /// Reflected vertex inputs, sorted by location.
    #[inline]
    pub fn attributes(&self) -> &[VertexShaderAttribute] {
        &self.attributes
    }
}
