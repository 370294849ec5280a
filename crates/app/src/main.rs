//! Prism - headless driver
//!
//! Loads the engine configuration, builds a demo scene and renders it for a
//! fixed number of frames on the headless device. Frame errors abort the run
//! with a non-zero exit code.

mod args;
mod demo;

use anyhow::{Context, Result};
use clap::Parser;
use prism_core::{EngineConfig, RenderCategory, RenderPath, Timer};
use prism_renderer::{FrameStats, Renderer};
use prism_rhi::{DeviceLimits, HeadlessDevice};
use prism_scene::{CameraMovement, Scene};
use tracing::info;

use crate::args::Args;

/// Frames between progress reports.
const REPORT_INTERVAL: u32 = 30;

fn device_limits(config: &EngineConfig) -> DeviceLimits {
    DeviceLimits {
        max_color_attachments: config.limits.max_color_attachments,
        max_uniform_block_size: config.limits.max_uniform_block_size,
        uniform_buffer_offset_alignment: config.limits.uniform_buffer_offset_alignment,
    }
}

/// Render mode for `frame` when cycling: every path and category pair gets an
/// equal share of the run.
fn cycled_mode(frame: u32, frames: u32) -> (RenderPath, RenderCategory) {
    let modes = RenderCategory::COUNT as u32 * 2;
    let slot = (frame * modes / frames.max(1)).min(modes - 1);
    let path = if slot % 2 == 0 {
        RenderPath::Deferred
    } else {
        RenderPath::Forward
    };
    (path, RenderCategory::ALL[(slot / 2) as usize])
}

/// Slow orbit so the light block is repacked with a moving camera.
fn animate(scene: &mut Scene, dt: f32) {
    let camera = scene.camera_mut();
    camera.move_by(CameraMovement::Right, dt * 0.5);
    camera.look_at(glam::Vec3::ZERO);
}

fn run(args: &Args) -> Result<()> {
    let mut config = EngineConfig::load_or_default(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    args.apply(&mut config);
    config.validate()?;

    let mut device = HeadlessDevice::with_limits(device_limits(&config));
    let mut renderer = Renderer::new(&mut device, &config).context("creating renderer")?;
    let mut scene = demo::build(&mut device, &mut renderer, &config)?;

    info!("Initialization complete, rendering {} frames", config.frames);

    let mut timer = Timer::new();
    let mut totals = FrameStats::default();
    for frame in 0..config.frames {
        let dt = timer.delta_secs();
        if args.cycle {
            let (path, category) = cycled_mode(frame, config.frames);
            scene.set_render_path(path);
            scene.set_active_category(category);
        }
        animate(&mut scene, dt);

        let stats = renderer
            .render_frame(&mut device, &mut scene)
            .with_context(|| format!("rendering frame {}", frame))?;
        totals.draw_calls += stats.draw_calls;
        totals.entities_drawn += stats.entities_drawn;
        totals.programs_reloaded += stats.programs_reloaded;

        // The headless device records every draw; drop them once counted
        device.take_draws();

        if (frame + 1) % REPORT_INTERVAL == 0 {
            info!(
                "Frame {}: {:.1} fps, {} {} draws",
                frame + 1,
                timer.fps(),
                scene.render_path(),
                stats.draw_calls
            );
        }
    }

    info!(
        "Rendered {} frames in {:.2}s: {} draws, {} entity draws, {} program reloads",
        renderer.frame_index(),
        timer.elapsed_secs(),
        totals.draw_calls,
        totals.entities_drawn,
        totals.programs_reloaded
    );

    renderer.destroy(&mut device);
    Ok(())
}

fn main() -> Result<()> {
    prism_core::init_logging();
    info!("Starting Prism");

    let args = Args::parse();
    run(&args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycled_mode_covers_every_pair() {
        let frames = 12;
        let modes: Vec<_> = (0..frames).map(|f| cycled_mode(f, frames)).collect();
        for category in RenderCategory::ALL {
            for path in [RenderPath::Deferred, RenderPath::Forward] {
                assert!(modes.contains(&(path, category)));
            }
        }
        assert_eq!(modes[0], (RenderPath::Deferred, RenderCategory::Deferred));
        assert_eq!(
            modes[11],
            (RenderPath::Forward, RenderCategory::EnvironmentMap)
        );
    }

    #[test]
    fn test_cycled_mode_short_runs() {
        assert_eq!(cycled_mode(0, 0), (RenderPath::Deferred, RenderCategory::Deferred));
        assert_eq!(cycled_mode(0, 1), (RenderPath::Deferred, RenderCategory::Deferred));
    }

    #[test]
    fn test_device_limits_follow_config() {
        let mut config = EngineConfig::default();
        config.limits.uniform_buffer_offset_alignment = 64;
        assert_eq!(device_limits(&config).uniform_buffer_offset_alignment, 64);
    }
}
