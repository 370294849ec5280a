//! End-to-end frame tests against the headless device.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use glam::{Vec2, Vec3};
use prism_core::{BufferView, EngineConfig, RenderCategory, RenderPath};
use prism_renderer::ubo::GLOBAL_PARAMS_BLOCK_SIZE;
use prism_renderer::{RenderError, Renderer, TargetState};
use prism_resources::{Model, ResourceError, Submesh};
use prism_rhi::headless::DrawRecord;
use prism_rhi::pipeline::{CullMode, DepthState};
use prism_rhi::texture::TextureTarget;
use prism_rhi::vertex::{QuadVertex, Vertex};
use prism_rhi::HeadlessDevice;
use prism_scene::{Entity, Light, Scene, Transform};

fn shader_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/shaders")
}

fn config(shader_dir: PathBuf) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.viewport.width = 320;
    config.viewport.height = 240;
    config.render.gbuffer_attachments = 4;
    config.assets.shader_dir = shader_dir;
    config
}

fn triangle_model(renderer: &mut Renderer, device: &mut HeadlessDevice) -> usize {
    let vertices = [
        Vertex::new(Vec3::ZERO, Vec3::Z, Vec2::ZERO, Vec3::X, Vec3::Y),
        Vertex::new(Vec3::X, Vec3::Z, Vec2::X, Vec3::X, Vec3::Y),
        Vertex::new(Vec3::Y, Vec3::Z, Vec2::Y, Vec3::X, Vec3::Y),
    ];
    let submesh = Submesh::new(
        Vertex::layout(),
        bytemuck::cast_slice(&vertices).to_vec(),
        vec![0, 1, 2],
    );
    let registry = renderer.resources_mut();
    let mesh = registry.add_mesh(device, vec![submesh]).unwrap();
    registry.add_model(Model::new(mesh, vec![0])).unwrap()
}

/// Entities 0 and 2 are deferred, 1 is relief mapped, 3 is reflective.
/// Three lights belong to the deferred category, two to relief mapping.
fn populated_scene(model: usize) -> Scene {
    let mut scene = Scene::new();
    scene.add_entity(Entity::new("floor", model, RenderCategory::Deferred));
    scene.add_entity(
        Entity::new("wall", model, RenderCategory::ReliefMapping)
            .with_transform(Transform::new().with_position(Vec3::new(2.0, 0.0, 0.0))),
    );
    scene.add_entity(
        Entity::new("crate", model, RenderCategory::Deferred)
            .with_transform(Transform::new().with_scale(Vec3::new(1.0, 3.0, 1.0))),
    );
    scene.add_entity(Entity::new("sphere", model, RenderCategory::EnvironmentMap));

    for i in 0..3 {
        scene.add_light(Light::point(Vec3::splat(i as f32), Vec3::ONE, 1.0));
    }
    for _ in 0..2 {
        scene.add_light(
            Light::directional(Vec3::NEG_Y, Vec3::ONE, 0.5)
                .with_category(RenderCategory::ReliefMapping),
        );
    }
    scene
}

fn setup(shader_dir: PathBuf) -> (HeadlessDevice, Renderer, Scene) {
    let mut device = HeadlessDevice::new();
    let mut renderer = Renderer::new(&mut device, &config(shader_dir)).unwrap();
    let model = triangle_model(&mut renderer, &mut device);
    (device, renderer, populated_scene(model))
}

fn label<'a>(device: &'a HeadlessDevice, draw: &DrawRecord) -> &'a str {
    device.program_label(draw.program).unwrap_or("")
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn write_cubemap(dir: &Path) {
    for face in prism_resources::texture::CUBEMAP_FACES {
        image::RgbaImage::from_pixel(2, 2, image::Rgba([64, 128, 255, 255]))
            .save(dir.join(format!("{face}.png")))
            .unwrap();
    }
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_device_report_logged_once() {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut device = HeadlessDevice::new();
        let mut renderer = Renderer::new(&mut device, &config(shader_dir())).unwrap();
        renderer.destroy(&mut device);
    });

    let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    assert_eq!(output.matches("Renderer: Headless").count(), 1);
}

#[test]
fn test_deferred_frame() {
    let (mut device, mut renderer, mut scene) = setup(shader_dir());

    let stats = renderer.render_frame(&mut device, &mut scene).unwrap();
    assert_eq!(stats.lights, 3);
    assert_eq!(stats.entities_drawn, 2);
    assert_eq!(stats.draw_calls, 3);
    assert!(!scene.lights_dirty());

    let global = renderer.uniforms().global_buffer().handle();
    let bytes = device.buffer_contents(global).unwrap();
    assert_eq!(read_u32(bytes, 12), 3);

    let draws = device.take_draws();
    assert_eq!(draws.len(), 3);

    let target = renderer.frame_target();
    let entity_buffer = renderer.uniforms().entity_buffer().handle();
    let expected_offsets = [0, 512];
    for (draw, offset) in draws[..2].iter().zip(expected_offsets) {
        assert_eq!(label(&device, draw), "geometry");
        assert_eq!(draw.framebuffer, target.framebuffer());
        assert_eq!(draw.depth, DepthState::OPAQUE);
        assert_eq!(draw.cull, CullMode::Back);
        assert_eq!(draw.uniform_ranges.get(&1), Some(&(entity_buffer, offset, 192)));
        assert_eq!(draw.uniform_ranges.get(&0).map(|r| r.2), Some(GLOBAL_PARAMS_BLOCK_SIZE));
        assert_eq!(
            device.uniform_block_size(draw.program, "GlobalParams"),
            Some(GLOBAL_PARAMS_BLOCK_SIZE)
        );
        assert_eq!(draw.uniform_vec3("uAlbedo"), Some(Vec3::ONE));
        // Default material has no textures, nothing is bound to the map units
        assert_eq!(draw.texture_at(0), None);
    }

    let composition = &draws[2];
    assert_eq!(label(&device, composition), "composition");
    assert!(composition.framebuffer.is_null());
    assert_eq!(composition.depth, DepthState::DISABLED);
    assert_eq!(composition.index_count, 6);
    assert_eq!(composition.uniform_i32("uViewMode"), Some(0));
    assert_eq!(composition.uniform_i32("uDepth"), Some(4));
    for (unit, color) in target.colors().iter().enumerate() {
        assert_eq!(composition.texture_at(unit as u32), Some(*color));
    }
    assert_eq!(composition.texture_at(4), Some(target.depth()));
}

#[test]
fn test_render_mode_switch() {
    let (mut device, mut renderer, mut scene) = setup(shader_dir());
    renderer.render_frame(&mut device, &mut scene).unwrap();
    device.take_draws();

    scene.set_active_category(RenderCategory::ReliefMapping);
    scene.relief_strength = 0.1;
    let stats = renderer.render_frame(&mut device, &mut scene).unwrap();
    assert_eq!(stats.lights, 2);
    assert_eq!(stats.entities_drawn, 1);

    let active: Vec<_> = scene.active_entities().map(|e| e.name.as_str()).collect();
    assert_eq!(active, ["wall"]);

    let draws = device.take_draws();
    assert_eq!(label(&device, &draws[0]), "relief");
    assert_eq!(draws[0].uniform_f32("uReliefStrength"), Some(0.1));
    let global = renderer.uniforms().global_buffer().handle();
    assert_eq!(read_u32(device.buffer_contents(global).unwrap(), 12), 2);
}

#[test]
fn test_buffer_view_selection() {
    let (mut device, mut renderer, mut scene) = setup(shader_dir());
    scene.buffer_view = BufferView::Depth;
    scene.depth_intensity = 0.5;
    renderer.render_frame(&mut device, &mut scene).unwrap();

    let draws = device.take_draws();
    let composition = draws.last().unwrap();
    assert_eq!(composition.uniform_i32("uViewMode"), Some(5));
    assert_eq!(composition.uniform_f32("uDepthIntensity"), Some(0.5));
}

#[test]
fn test_forward_environment_frame_draws_skybox_first() {
    let cubemap = tempfile::tempdir().unwrap();
    write_cubemap(cubemap.path());

    let (mut device, mut renderer, mut scene) = setup(shader_dir());
    assert!(renderer.set_skybox(&mut device, cubemap.path()));
    scene.set_render_path(RenderPath::Forward);
    scene.set_active_category(RenderCategory::EnvironmentMap);

    let stats = renderer.render_frame(&mut device, &mut scene).unwrap();
    assert!(stats.skybox_drawn);
    assert_eq!(stats.lights, 0);

    let draws = device.take_draws();
    assert_eq!(draws.len(), 2);

    let skybox = &draws[0];
    assert_eq!(label(&device, skybox), "skybox");
    assert_eq!(skybox.depth, DepthState::SKYBOX);
    assert_eq!(skybox.cull, CullMode::None);
    assert_eq!(skybox.index_count, 36);
    assert!(skybox.framebuffer.is_null());
    let cube = skybox.texture_at(0).unwrap();
    assert_eq!(device.texture(cube).unwrap().target, TextureTarget::CubeMap);

    let sphere = &draws[1];
    assert_eq!(label(&device, sphere), "forward");
    assert_eq!(sphere.depth, DepthState::OPAQUE);
    assert_eq!(sphere.cull, CullMode::Back);
    assert_eq!(sphere.uniform_i32("uEnvironmentReflection"), Some(1));
    assert_eq!(sphere.uniform_i32("uHeightMapping"), Some(0));
    assert_eq!(sphere.texture_at(3), Some(cube));
    assert_eq!(sphere.texture_at(0), None);
}

#[test]
fn test_forward_without_skybox_outside_environment_mode() {
    let cubemap = tempfile::tempdir().unwrap();
    write_cubemap(cubemap.path());

    let (mut device, mut renderer, mut scene) = setup(shader_dir());
    renderer.set_skybox(&mut device, cubemap.path());
    scene.set_render_path(RenderPath::Forward);
    scene.set_active_category(RenderCategory::ReliefMapping);

    let stats = renderer.render_frame(&mut device, &mut scene).unwrap();
    assert!(!stats.skybox_drawn);

    let draws = device.take_draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].uniform_i32("uHeightMapping"), Some(1));
    assert_eq!(draws[0].uniform_i32("uEnvironmentReflection"), Some(0));
    assert_eq!(draws[0].texture_at(3), None);
}

#[test]
fn test_forward_frame_unbinds_environment_cube() {
    let cubemap = tempfile::tempdir().unwrap();
    write_cubemap(cubemap.path());

    let (mut device, mut renderer, mut scene) = setup(shader_dir());
    renderer.set_skybox(&mut device, cubemap.path());
    scene.set_render_path(RenderPath::Forward);
    scene.set_active_category(RenderCategory::EnvironmentMap);
    renderer.render_frame(&mut device, &mut scene).unwrap();
    let draws = device.take_draws();
    assert!(draws[1].textures.contains(&(3, TextureTarget::CubeMap, draws[0].texture_at(0).unwrap())));

    scene.set_active_category(RenderCategory::Deferred);
    let stats = renderer.render_frame(&mut device, &mut scene).unwrap();
    assert_eq!(stats.entities_drawn, 2);

    let draws = device.take_draws();
    assert_eq!(draws.len(), 2);
    for draw in &draws {
        assert_eq!(draw.uniform_i32("uEnvironmentReflection"), Some(0));
        assert!(draw.textures.iter().all(|(_, target, _)| *target != TextureTarget::CubeMap));
    }
}

#[test]
fn test_missing_skybox_keeps_previous() {
    let (mut device, mut renderer, _scene) = setup(shader_dir());
    let missing = tempfile::tempdir().unwrap();
    assert!(!renderer.set_skybox(&mut device, missing.path()));
}

#[test]
fn test_resize() {
    let (mut device, mut renderer, mut scene) = setup(shader_dir());
    let framebuffer = renderer.frame_target().framebuffer();

    renderer.resize(&mut device, &mut scene, 320, 240).unwrap();
    renderer.resize(&mut device, &mut scene, 0, 240).unwrap();
    renderer.resize(&mut device, &mut scene, 320, 0).unwrap();
    assert_eq!(renderer.frame_target().framebuffer(), framebuffer);
    assert_eq!(renderer.viewport(), (320, 240));

    renderer.resize(&mut device, &mut scene, 640, 320).unwrap();
    assert_ne!(renderer.frame_target().framebuffer(), framebuffer);
    assert_eq!(
        renderer.frame_target().state(),
        TargetState::Sized { width: 640, height: 320 }
    );
    let fb = device.framebuffer(renderer.frame_target().framebuffer()).unwrap();
    assert_eq!((fb.width, fb.height), (640, 320));

    let projection = scene.camera().projection_matrix();
    assert!((projection.y_axis.y / projection.x_axis.x - 2.0).abs() < 1e-4);

    renderer.render_frame(&mut device, &mut scene).unwrap();
    assert_eq!(device.viewport(), (640, 320));
}

#[test]
fn test_missing_programs_make_draws_noops() {
    let empty = tempfile::tempdir().unwrap();
    let (mut device, mut renderer, mut scene) = setup(empty.path().to_path_buf());

    let stats = renderer.render_frame(&mut device, &mut scene).unwrap();
    assert_eq!(stats.draw_calls, 0);
    assert!(device.draws().is_empty());

    scene.set_render_path(RenderPath::Forward);
    let stats = renderer.render_frame(&mut device, &mut scene).unwrap();
    assert_eq!(stats.draw_calls, 0);
}

#[test]
fn test_missing_attribute_aborts_frame() {
    let (mut device, mut renderer, mut scene) = setup(shader_dir());

    let quad = [
        QuadVertex::new(Vec3::ZERO, Vec2::ZERO),
        QuadVertex::new(Vec3::X, Vec2::X),
        QuadVertex::new(Vec3::Y, Vec2::Y),
    ];
    let submesh = Submesh::new(
        QuadVertex::layout(),
        bytemuck::cast_slice(&quad).to_vec(),
        vec![0, 1, 2],
    );
    let registry = renderer.resources_mut();
    let mesh = registry.add_mesh(&mut device, vec![submesh]).unwrap();
    let model = registry.add_model(Model::new(mesh, vec![0])).unwrap();
    scene.add_entity(Entity::new("flat", model, RenderCategory::Deferred));

    let result = renderer.render_frame(&mut device, &mut scene);
    assert!(matches!(
        result,
        Err(RenderError::Resource(ResourceError::IncompatibleMesh { .. }))
    ));
}

#[test]
fn test_unknown_model_aborts_frame() {
    let (mut device, mut renderer, mut scene) = setup(shader_dir());
    scene.add_entity(Entity::new("ghost", 99, RenderCategory::Deferred));

    let result = renderer.render_frame(&mut device, &mut scene);
    assert!(matches!(
        result,
        Err(RenderError::UnknownModel { model: 99, .. })
    ));
}

#[test]
fn test_entity_buffer_grows_with_entities() {
    let (mut device, mut renderer, mut scene) = setup(shader_dir());
    let model = scene.entities()[0].model;
    for i in 0..100 {
        scene.add_entity(Entity::new(format!("extra{i}"), model, RenderCategory::Deferred));
    }

    renderer.render_frame(&mut device, &mut scene).unwrap();
    let last = scene.entities().last().unwrap();
    assert_eq!(last.uniform_offset, 103 * 256);
    assert!(renderer.uniforms().entity_buffer().size() >= 104 * 256);
}

#[test]
fn test_shader_hot_reload_rebinds_blocks() {
    let shaders = tempfile::tempdir().unwrap();
    for entry in std::fs::read_dir(shader_dir()).unwrap() {
        let path = entry.unwrap().path();
        std::fs::copy(&path, shaders.path().join(path.file_name().unwrap())).unwrap();
    }

    let (mut device, mut renderer, mut scene) = setup(shaders.path().to_path_buf());
    renderer.render_frame(&mut device, &mut scene).unwrap();
    device.take_draws();
    let old = renderer.shader_table().geometry(RenderCategory::Deferred).handle;
    assert_eq!(device.uniform_block_binding(old, "EntityParams"), Some(1));

    File::options()
        .write(true)
        .open(shaders.path().join("geometry.glsl"))
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    let stats = renderer.render_frame(&mut device, &mut scene).unwrap();
    assert_eq!(stats.programs_reloaded, 1);

    let new = renderer.shader_table().geometry(RenderCategory::Deferred).handle;
    assert_ne!(new, old);
    assert!(!device.is_program_live(old));
    assert_eq!(device.uniform_block_binding(new, "GlobalParams"), Some(0));
    assert_eq!(device.uniform_block_binding(new, "EntityParams"), Some(1));

    let draws = device.take_draws();
    assert!(draws.iter().any(|d| d.program == new));
    assert!(draws.iter().all(|d| d.program != old));
}

#[test]
fn test_destroy_releases_everything() {
    let cubemap = tempfile::tempdir().unwrap();
    write_cubemap(cubemap.path());

    let (mut device, mut renderer, mut scene) = setup(shader_dir());
    renderer.set_skybox(&mut device, cubemap.path());
    renderer.render_frame(&mut device, &mut scene).unwrap();

    renderer.destroy(&mut device);
    assert_eq!(device.live_buffer_count(), 0);
    assert_eq!(device.live_texture_count(), 0);
    assert_eq!(device.live_framebuffer_count(), 0);
    assert_eq!(device.live_vertex_array_count(), 0);
    assert_eq!(device.live_program_count(), 0);
}
