//! Headless Pipeline Demo
//!
//! Drives the full flow without a window: loads the base asset group from
//! generated data, builds the patched human once the group completes, runs
//! a few frames on a manual clock, resizes, and disposes. Every device call
//! is recorded and summarized at the end.
//!
//! Run with `RUST_LOG=debug cargo run --example headless`.

use std::time::Duration;

use anyhow::Result;
use glam::Vec2;
use holo::assets::{Asset, AssetServer};
use holo::renderer::core::{DeviceCommand, HeadlessDevice};
use holo::resources::{Geometry, ImageData};
use holo::{Clock, PipelineSettings, RenderPipeline, SceneHost, holo_effect};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = PipelineSettings::default();
    let device = HeadlessDevice::new().with_shader_validation();
    let recorder = device.recorder();

    let effect = holo_effect(Vec2::new(WIDTH as f32, HEIGHT as f32), 1.0)?;
    let mut pipeline = RenderPipeline::new(device, settings.clone(), effect);
    pipeline.initialize(
        WIDTH,
        HEIGHT,
        1.0,
        settings.clear_color,
        settings.tone_mapping_settings(),
    )?;

    let mut assets = AssetServer::default();
    let mut host = SceneHost::new(&mut assets)?;

    assets.insert("lennaTexture", Asset::Texture(ImageData::solid(4, 4, [200, 180, 160, 255])?))?;
    assets.insert("envMap", Asset::Texture(ImageData::solid(8, 4, [40, 90, 160, 255])?))?;
    assets.insert("human", Asset::Model(Geometry::sphere(10.0, 24, 16)?))?;
    assets.insert("heart", Asset::Model(Geometry::sphere(1.0, 12, 8)?))?;

    let mut clock = Clock::new();
    for frame in 0..5u64 {
        clock.advance_to(Duration::from_millis(frame * 16));
        if host.poll(&mut pipeline, &assets)? {
            log::info!("Base group ready; human built");
        }
        host.update(clock.elapsed_ms());
        pipeline.update(clock.elapsed_ms())?;
    }

    pipeline.resize(1600, 1200, 1.0)?;
    pipeline.update(clock.elapsed_ms())?;

    log::info!("Passes: {:?}", pipeline.pass_names());
    for (label, source) in pipeline.program_sources() {
        log::debug!("--- {label} ---\n{source}");
    }

    pipeline.dispose()?;

    let commands = recorder.commands();
    let draws = commands
        .iter()
        .filter(|c| matches!(c, DeviceCommand::DrawFullscreen { .. }))
        .count();
    log::info!(
        "Recorded {} device calls ({draws} full-screen draws, {} target allocations)",
        commands.len(),
        recorder.target_allocations()
    );
    Ok(())
}
