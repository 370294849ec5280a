//! Resource registry: the tables every other part of the engine indexes into.
//!
//! Textures, materials, meshes, models and programs are addressed by plain
//! indices. Slot 0 of the texture table is the white placeholder and slot 0 of
//! the material table is the default material, so index 0 is always valid.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use prism_rhi::shader::{Program, ShaderDefine};
use prism_rhi::{GraphicsDevice, ProgramHandle, TextureHandle, VertexArrayHandle};
use tracing::{debug, error, info};

use crate::error::{ResourceError, ResourceResult};
use crate::loader::{self, MaterialDescription};
use crate::material::{Material, NO_TEXTURE};
use crate::mesh::{Mesh, Submesh};
use crate::model::Model;
use crate::texture::{self, INVALID_TEXTURE, Texture, TextureKind};

pub struct ResourceRegistry {
    textures: Vec<Texture>,
    materials: Vec<Material>,
    meshes: Vec<Mesh>,
    models: Vec<Model>,
    programs: Vec<Program>,
    /// Placed ahead of every program loaded afterwards.
    shader_defines: Vec<ShaderDefine>,
    model_paths: HashMap<PathBuf, usize>,
}

impl ResourceRegistry {
    /// Creates a registry holding the white texture and the default material.
    pub fn new(device: &mut dyn GraphicsDevice) -> ResourceResult<Self> {
        let white = texture::create_white_texture(device)?;
        Ok(Self {
            textures: vec![Texture {
                handle: white,
                path: PathBuf::new(),
                kind: TextureKind::Albedo,
            }],
            materials: vec![Material::default()],
            meshes: Vec::new(),
            models: Vec::new(),
            programs: Vec::new(),
            shader_defines: Vec::new(),
            model_paths: HashMap::new(),
        })
    }

    // ---- textures ----

    /// Earlier load of `path` as `kind`. The kind picks the wrap mode, so one
    /// file loaded as two kinds is two textures.
    fn find_texture(&self, path: &Path, kind: TextureKind) -> Option<usize> {
        self.textures
            .iter()
            .position(|t| !t.path.as_os_str().is_empty() && t.path == path && t.kind == kind)
    }

    /// Loads a 2D texture, reusing an earlier load of the same path and kind.
    ///
    /// Returns [`INVALID_TEXTURE`] and logs the cause when the file cannot be
    /// decoded or uploaded.
    pub fn load_texture(
        &mut self,
        device: &mut dyn GraphicsDevice,
        path: impl AsRef<Path>,
        kind: TextureKind,
    ) -> usize {
        let path = path.as_ref();
        if let Some(index) = self.find_texture(path, kind) {
            return index;
        }

        let handle = texture::decode_image(path)
            .and_then(|image| texture::create_texture(device, &image, kind));
        match handle {
            Ok(handle) => self.push_texture(handle, path, kind),
            Err(e) => {
                error!("Failed to load {} texture '{}': {}", kind.name(), path.display(), e);
                INVALID_TEXTURE
            }
        }
    }

    /// Loads a cubemap from a directory of six face images.
    pub fn load_cubemap(&mut self, device: &mut dyn GraphicsDevice, dir: impl AsRef<Path>) -> usize {
        let dir = dir.as_ref();
        if let Some(index) = self.find_texture(dir, TextureKind::Cubemap) {
            return index;
        }

        let handle = texture::decode_cubemap(dir).and_then(|faces| texture::create_cubemap(device, &faces));
        match handle {
            Ok(handle) => self.push_texture(handle, dir, TextureKind::Cubemap),
            Err(e) => {
                error!("Failed to load cubemap '{}': {}", dir.display(), e);
                INVALID_TEXTURE
            }
        }
    }

    fn push_texture(&mut self, handle: TextureHandle, path: &Path, kind: TextureKind) -> usize {
        self.textures.push(Texture {
            handle,
            path: path.to_path_buf(),
            kind,
        });
        self.textures.len() - 1
    }

    pub fn texture(&self, index: usize) -> Option<&Texture> {
        self.textures.get(index)
    }

    /// Backend handle of texture `index`, null when the index is unknown.
    pub fn texture_handle(&self, index: usize) -> TextureHandle {
        self.textures
            .get(index)
            .map_or(TextureHandle::NULL, |t| t.handle)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    // ---- materials ----

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn material(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    pub fn material_mut(&mut self, index: usize) -> Option<&mut Material> {
        self.materials.get_mut(index)
    }

    /// Loads `path` as a height map and assigns it to `material`.
    pub fn set_height_texture(
        &mut self,
        device: &mut dyn GraphicsDevice,
        material: usize,
        path: impl AsRef<Path>,
    ) -> ResourceResult<()> {
        if material >= self.materials.len() {
            return Err(ResourceError::InvalidIndex {
                kind: "material",
                index: material,
            });
        }
        let texture = self.load_texture(device, path, TextureKind::Height);
        self.materials[material].height_texture = substitute_invalid(texture);
        Ok(())
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    // ---- meshes and models ----

    pub fn add_mesh(
        &mut self,
        device: &mut dyn GraphicsDevice,
        submeshes: Vec<Submesh>,
    ) -> ResourceResult<usize> {
        let mesh = Mesh::new(device, submeshes)?;
        self.meshes.push(mesh);
        Ok(self.meshes.len() - 1)
    }

    pub fn add_model(&mut self, model: Model) -> ResourceResult<usize> {
        if model.mesh >= self.meshes.len() {
            return Err(ResourceError::InvalidIndex {
                kind: "mesh",
                index: model.mesh,
            });
        }
        self.models.push(model);
        Ok(self.models.len() - 1)
    }

    /// Loads a glTF model with its materials, reusing an earlier load of the
    /// same path.
    pub fn load_model(
        &mut self,
        device: &mut dyn GraphicsDevice,
        path: impl AsRef<Path>,
    ) -> ResourceResult<usize> {
        let path = path.as_ref();
        if let Some(&index) = self.model_paths.get(path) {
            return Ok(index);
        }

        let data = loader::load_gltf(path)?;

        let material_indices: Vec<usize> = data
            .materials
            .iter()
            .map(|description| self.add_described_material(device, description))
            .collect();
        let materials = data
            .submesh_materials
            .iter()
            .map(|m| m.and_then(|i| material_indices.get(i).copied()).unwrap_or(0))
            .collect();

        let mesh = self.add_mesh(device, data.submeshes)?;
        let index = self.add_model(Model::new(mesh, materials))?;
        self.model_paths.insert(path.to_path_buf(), index);

        info!(
            "Loaded model '{}' as #{} ({} submeshes)",
            path.display(),
            index,
            self.meshes[mesh].submesh_count()
        );
        Ok(index)
    }

    fn add_described_material(
        &mut self,
        device: &mut dyn GraphicsDevice,
        description: &MaterialDescription,
    ) -> usize {
        let mut load = |path: &Option<PathBuf>, kind| match path {
            Some(path) => substitute_invalid(self.load_texture(device, path, kind)),
            None => NO_TEXTURE,
        };
        let albedo_texture = load(&description.albedo_texture, TextureKind::Albedo);
        let normal_texture = load(&description.normal_texture, TextureKind::Normal);
        let height_texture = load(&description.height_texture, TextureKind::Height);

        self.add_material(Material {
            name: description.name.clone(),
            albedo: description.albedo,
            emissive: description.emissive,
            smoothness: description.smoothness,
            albedo_texture,
            normal_texture,
            height_texture,
        })
    }

    pub fn mesh(&self, index: usize) -> Option<&Mesh> {
        self.meshes.get(index)
    }

    pub fn model(&self, index: usize) -> Option<&Model> {
        self.models.get(index)
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Resolves the vertex array for drawing `submesh` of `mesh` with
    /// `program`, creating it on first use.
    pub fn vertex_array(
        &mut self,
        device: &mut dyn GraphicsDevice,
        mesh: usize,
        submesh: usize,
        program: usize,
    ) -> ResourceResult<VertexArrayHandle> {
        let program = self
            .programs
            .get(program)
            .ok_or(ResourceError::InvalidIndex {
                kind: "program",
                index: program,
            })?;
        self.meshes
            .get_mut(mesh)
            .ok_or(ResourceError::InvalidIndex {
                kind: "mesh",
                index: mesh,
            })?
            .find_or_create_vao(device, submesh, program)
    }

    // ---- programs ----

    /// Sets a define for programs loaded from now on, replacing an earlier
    /// value of the same name.
    pub fn set_shader_define(&mut self, name: &str, value: impl ToString) {
        let define = ShaderDefine::new(name, value);
        match self.shader_defines.iter_mut().find(|d| d.name == name) {
            Some(existing) => *existing = define,
            None => self.shader_defines.push(define),
        }
    }

    pub fn shader_defines(&self) -> &[ShaderDefine] {
        &self.shader_defines
    }

    /// Loads a program, reusing an earlier load with the same path and name.
    ///
    /// Compile and link failures are logged; the program is kept with a null
    /// handle so a later hot reload can fix it.
    pub fn load_program(
        &mut self,
        device: &mut dyn GraphicsDevice,
        path: impl AsRef<Path>,
        name: &str,
    ) -> usize {
        let path = path.as_ref();
        if let Some(index) = self
            .programs
            .iter()
            .position(|p| p.path() == path && p.name() == name)
        {
            return index;
        }
        self.programs.push(Program::load_with_defines(
            device,
            path,
            name,
            &self.shader_defines,
        ));
        self.programs.len() - 1
    }

    pub fn program(&self, index: usize) -> Option<&Program> {
        self.programs.get(index)
    }

    /// Current handle of program `index`, null when unknown or not built.
    pub fn program_handle(&self, index: usize) -> ProgramHandle {
        self.programs
            .get(index)
            .map_or(ProgramHandle::NULL, |p| p.handle())
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Rebuilds every program whose source changed on disk.
    ///
    /// Vertex arrays bound to a replaced handle are destroyed so they cannot
    /// be matched against a recycled handle value. Returns the number of
    /// programs replaced.
    pub fn reload_changed_programs(&mut self, device: &mut dyn GraphicsDevice) -> usize {
        let mut replaced = 0;
        for program in &mut self.programs {
            if !program.is_stale() {
                continue;
            }
            let Some(retired) = program.reload(device) else {
                continue;
            };
            replaced += 1;
            if retired.is_null() {
                continue;
            }
            let purged: usize = self
                .meshes
                .iter_mut()
                .map(|mesh| mesh.forget_program(device, retired))
                .sum();
            debug!(
                "Program '{}' reloaded, purged {} vertex arrays of {}",
                program.name(),
                purged,
                retired
            );
        }
        replaced
    }

    /// Releases every GPU object the registry owns.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for mesh in &mut self.meshes {
            mesh.destroy(device);
        }
        for program in &mut self.programs {
            program.destroy(device);
        }
        for texture in &self.textures {
            device.destroy_texture(texture.handle);
        }
        self.meshes.clear();
        self.models.clear();
        self.programs.clear();
        self.textures.clear();
        self.model_paths.clear();
        debug!("Resource registry destroyed");
    }
}

/// Maps a failed texture load onto the "absent" slot.
fn substitute_invalid(texture: usize) -> usize {
    if texture == INVALID_TEXTURE {
        NO_TEXTURE
    } else {
        texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_rhi::HeadlessDevice;
    use prism_rhi::texture::WrapMode;

    #[test]
    fn test_new_registry_has_placeholders() {
        let mut device = HeadlessDevice::new();
        let registry = ResourceRegistry::new(&mut device).unwrap();
        assert_eq!(registry.texture_count(), 1);
        assert_eq!(registry.material_count(), 1);
        assert!(!registry.texture_handle(0).is_null());
        assert_eq!(registry.material(0).unwrap().name, "default");
    }

    #[test]
    fn test_texture_dedup_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("albedo.png");
        image::RgbaImage::new(4, 4).save(&path).unwrap();

        let mut device = HeadlessDevice::new();
        let mut registry = ResourceRegistry::new(&mut device).unwrap();

        let first = registry.load_texture(&mut device, &path, TextureKind::Albedo);
        let second = registry.load_texture(&mut device, &path, TextureKind::Albedo);
        assert_eq!(first, 1);
        assert_eq!(first, second);
        assert_eq!(device.live_texture_count(), 2);

        let missing = registry.load_texture(&mut device, dir.path().join("nope.png"), TextureKind::Albedo);
        assert_eq!(missing, INVALID_TEXTURE);
        assert_eq!(registry.texture_count(), 2);
        assert!(registry.texture_handle(missing).is_null());
    }

    #[test]
    fn test_texture_dedup_respects_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bumps.png");
        image::RgbaImage::new(4, 4).save(&path).unwrap();

        let mut device = HeadlessDevice::new();
        let mut registry = ResourceRegistry::new(&mut device).unwrap();

        let albedo = registry.load_texture(&mut device, &path, TextureKind::Albedo);
        let height = registry.load_texture(&mut device, &path, TextureKind::Height);
        assert_ne!(albedo, height);
        assert_eq!(registry.load_texture(&mut device, &path, TextureKind::Height), height);

        let wrap = |index| device.texture(registry.texture_handle(index)).unwrap().wrap;
        assert_eq!(wrap(albedo), WrapMode::Repeat);
        assert_eq!(wrap(height), WrapMode::ClampToEdge);
    }

    #[test]
    fn test_height_texture_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("height.png");
        image::GrayImage::new(4, 4).save(&path).unwrap();

        let mut device = HeadlessDevice::new();
        let mut registry = ResourceRegistry::new(&mut device).unwrap();
        let material = registry.add_material(Material::new("bricks"));
        registry.set_height_texture(&mut device, material, &path).unwrap();

        let texture = registry.material(material).unwrap().height_texture;
        assert_ne!(texture, NO_TEXTURE);
        let handle = registry.texture_handle(texture);
        assert_eq!(device.texture(handle).unwrap().wrap, WrapMode::ClampToEdge);
    }

    #[test]
    fn test_missing_height_texture_leaves_slot_absent() {
        let mut device = HeadlessDevice::new();
        let mut registry = ResourceRegistry::new(&mut device).unwrap();
        let material = registry.add_material(Material::new("plain"));
        registry
            .set_height_texture(&mut device, material, "/nonexistent/height.png")
            .unwrap();
        assert!(!registry.material(material).unwrap().has_height_texture());
        assert!(registry.set_height_texture(&mut device, 42, "x.png").is_err());
    }

    #[test]
    fn test_add_model_checks_mesh_index() {
        let mut device = HeadlessDevice::new();
        let mut registry = ResourceRegistry::new(&mut device).unwrap();
        assert!(matches!(
            registry.add_model(Model::new(0, vec![])),
            Err(ResourceError::InvalidIndex { kind: "mesh", index: 0 })
        ));

        let mesh = registry
            .add_mesh(&mut device, vec![crate::primitives::screen_quad()])
            .unwrap();
        assert_eq!(registry.add_model(Model::new(mesh, vec![0])).unwrap(), 0);
    }

    #[test]
    fn test_program_dedup_by_path_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.glsl");
        std::fs::write(&path, "#ifdef VERTEX\nlayout(location = 0) in vec3 aPosition;\n#endif\n").unwrap();

        let mut device = HeadlessDevice::new();
        let mut registry = ResourceRegistry::new(&mut device).unwrap();
        let a = registry.load_program(&mut device, &path, "quad");
        let b = registry.load_program(&mut device, &path, "quad");
        let c = registry.load_program(&mut device, &path, "quad-copy");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(device.live_program_count(), 2);
    }

    #[test]
    fn test_shader_defines_reach_programs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sized.glsl");
        std::fs::write(
            &path,
            "layout(std140) uniform Colors { vec4 uColors[COUNT]; };\n",
        )
        .unwrap();

        let mut device = HeadlessDevice::new();
        let mut registry = ResourceRegistry::new(&mut device).unwrap();
        registry.set_shader_define("COUNT", 2);
        registry.set_shader_define("COUNT", 4);
        assert_eq!(registry.shader_defines().len(), 1);

        let index = registry.load_program(&mut device, &path, "sized");
        let handle = registry.program_handle(index);
        assert_eq!(device.uniform_block_size(handle, "Colors"), Some(64));
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut device = HeadlessDevice::new();
        let mut registry = ResourceRegistry::new(&mut device).unwrap();
        registry
            .add_mesh(&mut device, vec![crate::primitives::skybox_cube()])
            .unwrap();
        registry.destroy(&mut device);
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.live_buffer_count(), 0);
    }
}
