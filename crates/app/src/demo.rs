//! Demo scene: a floor, a row of shapes per render mode and lights for each
//! mode.

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use prism_core::{EngineConfig, RenderCategory};
use prism_renderer::Renderer;
use prism_resources::{Material, Model, Submesh};
use prism_rhi::GraphicsDevice;
use prism_rhi::vertex::Vertex;
use prism_scene::{Entity, Light, Scene, Transform};
use tracing::{info, warn};

/// Unit plane in XZ facing +Y, UVs tiled `repeat` times.
fn plane(repeat: f32) -> Submesh {
    let corners = [
        (Vec3::new(-0.5, 0.0, 0.5), Vec2::new(0.0, 0.0)),
        (Vec3::new(0.5, 0.0, 0.5), Vec2::new(repeat, 0.0)),
        (Vec3::new(0.5, 0.0, -0.5), Vec2::new(repeat, repeat)),
        (Vec3::new(-0.5, 0.0, -0.5), Vec2::new(0.0, repeat)),
    ];
    let vertices: Vec<Vertex> = corners
        .iter()
        .map(|&(position, uv)| Vertex::new(position, Vec3::Y, uv, Vec3::X, Vec3::NEG_Z))
        .collect();
    Submesh::new(
        Vertex::layout(),
        bytemuck::cast_slice(&vertices).to_vec(),
        vec![0, 1, 2, 0, 2, 3],
    )
}

/// Registry models the demo entities draw.
struct DemoModels {
    floor: usize,
    shape: usize,
    relief: usize,
}

fn build_models(
    device: &mut dyn GraphicsDevice,
    renderer: &mut Renderer,
    config: &EngineConfig,
) -> Result<DemoModels> {
    let registry = renderer.resources_mut();
    let plane_mesh = registry.add_mesh(device, vec![plane(8.0)])?;
    let floor = registry.add_model(Model::new(plane_mesh, vec![0]))?;

    let shape = match &config.assets.model {
        Some(path) => registry
            .load_model(device, path)
            .with_context(|| format!("loading model {}", path.display()))?,
        None => floor,
    };

    // Relief entities reuse the shape geometry with a height-mapped material
    let relief_material = registry.add_material(Material {
        smoothness: 0.3,
        ..Material::new("relief")
    });
    if let Some(height_map) = &config.assets.height_map {
        registry.set_height_texture(device, relief_material, height_map)?;
    }
    let shape_mesh = registry
        .model(shape)
        .map(|model| model.mesh)
        .context("shape model vanished from the registry")?;
    let relief = registry.add_model(Model::new(shape_mesh, vec![relief_material]))?;

    Ok(DemoModels {
        floor,
        shape,
        relief,
    })
}

/// Builds the demo scene and loads the assets it needs.
pub fn build(
    device: &mut dyn GraphicsDevice,
    renderer: &mut Renderer,
    config: &EngineConfig,
) -> Result<Scene> {
    let models = build_models(device, renderer, config)?;

    if let Some(dir) = &config.assets.skybox_dir {
        if !renderer.set_skybox(device, dir) {
            warn!("Environment mode will render without a skybox");
        }
    }

    let mut scene = Scene::new();
    scene.set_render_path(config.render.path);
    scene.set_active_category(config.render.category);
    scene.buffer_view = config.render.buffer_view;
    scene.relief_strength = config.render.relief_strength;
    scene.depth_intensity = config.render.depth_intensity;

    let (width, height) = (config.viewport.width, config.viewport.height);
    let camera = scene.camera_mut();
    camera.position = Vec3::new(0.0, 3.0, 8.0);
    camera.set_aspect(width as f32 / height as f32);
    camera.look_at(Vec3::ZERO);

    for category in RenderCategory::ALL {
        scene.add_entity(
            Entity::new(format!("{}-floor", category.name()), models.floor, category)
                .with_transform(Transform::new().with_uniform_scale(20.0)),
        );

        let model = match category {
            RenderCategory::ReliefMapping => models.relief,
            _ => models.shape,
        };
        for i in 0..3 {
            let x = (i as f32 - 1.0) * 3.0;
            scene.add_entity(
                Entity::new(format!("{}-{}", category.name(), i), model, category).with_transform(
                    Transform::new()
                        .with_position(Vec3::new(x, 1.0, 0.0))
                        .with_rotation(glam::Quat::from_rotation_y(i as f32 * 0.5)),
                ),
            );
        }

        scene.add_light(
            Light::directional(Vec3::new(-0.3, -1.0, -0.2), Vec3::ONE, 0.8).with_category(category),
        );
        for (i, color) in [Vec3::X, Vec3::Y, Vec3::Z].into_iter().enumerate() {
            let x = (i as f32 - 1.0) * 4.0;
            scene.add_light(
                Light::point(Vec3::new(x, 2.5, 2.0), color, 4.0).with_category(category),
            );
        }
    }

    info!(
        "Demo scene: {} entities, {} lights",
        scene.entities().len(),
        scene.lights().len()
    );
    Ok(scene)
}
