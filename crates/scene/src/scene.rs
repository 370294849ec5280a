//! The scene aggregate: entities, lights, camera and the selected render mode.
//!
//! Anything that changes the contents of the light block (the light list, the
//! active category, the camera) goes through a setter that marks it dirty.
//! The renderer repacks the block and calls [`Scene::mark_lights_clean`].

use glam::Vec3;
use prism_core::{BufferView, RenderCategory, RenderPath};
use tracing::{debug, info};

use crate::camera::Camera;
use crate::entity::Entity;
use crate::light::Light;

#[derive(Clone, Debug)]
pub struct Scene {
    entities: Vec<Entity>,
    lights: Vec<Light>,
    camera: Camera,
    render_path: RenderPath,
    active_category: RenderCategory,
    pub buffer_view: BufferView,
    pub relief_strength: f32,
    pub depth_intensity: f32,
    lights_dirty: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            lights: Vec::new(),
            camera: Camera::default(),
            render_path: RenderPath::default(),
            active_category: RenderCategory::default(),
            buffer_view: BufferView::default(),
            relief_strength: 0.05,
            depth_intensity: 1.0,
            lights_dirty: true,
        }
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- entities ----

    pub fn add_entity(&mut self, entity: Entity) -> usize {
        debug!("Adding entity '{}' ({})", entity.name, entity.category);
        self.entities.push(entity);
        self.entities.len() - 1
    }

    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[inline]
    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn entity_mut(&mut self, index: usize) -> Option<&mut Entity> {
        self.entities.get_mut(index)
    }

    pub fn active_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.active)
    }

    /// Sets every entity's `active` flag from the selected category.
    pub fn apply_render_mode(&mut self) {
        let category = self.active_category;
        for entity in &mut self.entities {
            entity.active = entity.category == category;
        }
    }

    // ---- lights ----

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights_dirty = true;
        self.lights.len() - 1
    }

    #[inline]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Mutable access to one light. Marks the light block dirty.
    pub fn light_mut(&mut self, index: usize) -> Option<&mut Light> {
        let light = self.lights.get_mut(index)?;
        self.lights_dirty = true;
        Some(light)
    }

    /// Removes the lights `keep` rejects. Returns how many were removed.
    pub fn retain_lights(&mut self, keep: impl FnMut(&Light) -> bool) -> usize {
        let before = self.lights.len();
        self.lights.retain(keep);
        let removed = before - self.lights.len();
        if removed > 0 {
            self.lights_dirty = true;
        }
        removed
    }

    pub fn remove_light(&mut self, index: usize) -> Option<Light> {
        if index >= self.lights.len() {
            return None;
        }
        self.lights_dirty = true;
        Some(self.lights.remove(index))
    }

    /// Lights tagged with the active category, in insertion order.
    pub fn active_lights(&self) -> impl Iterator<Item = &Light> {
        let category = self.active_category;
        self.lights.iter().filter(move |l| l.category == category)
    }

    #[inline]
    pub fn lights_dirty(&self) -> bool {
        self.lights_dirty
    }

    pub fn mark_lights_dirty(&mut self) {
        self.lights_dirty = true;
    }

    pub fn mark_lights_clean(&mut self) {
        self.lights_dirty = false;
    }

    // ---- camera ----

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Mutable camera access. The light block carries the camera position, so
    /// this marks it dirty.
    pub fn camera_mut(&mut self) -> &mut Camera {
        self.lights_dirty = true;
        &mut self.camera
    }

    #[inline]
    pub fn camera_position(&self) -> Vec3 {
        self.camera.position
    }

    // ---- render mode ----

    #[inline]
    pub fn render_path(&self) -> RenderPath {
        self.render_path
    }

    pub fn set_render_path(&mut self, path: RenderPath) {
        if self.render_path != path {
            info!("Render path: {} -> {}", self.render_path, path);
            self.render_path = path;
        }
    }

    #[inline]
    pub fn active_category(&self) -> RenderCategory {
        self.active_category
    }

    pub fn set_active_category(&mut self, category: RenderCategory) {
        if self.active_category != category {
            info!("Render mode: {} -> {}", self.active_category, category);
            self.active_category = category;
            self.lights_dirty = true;
        }
    }
}
