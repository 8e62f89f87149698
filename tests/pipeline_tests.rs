//! Render Pipeline Integration Tests
//!
//! Tests for:
//! - Lifecycle: initialize / update / resize / dispose and rejected calls
//! - Pass order and ping-pong buffer routing
//! - Effect time uniform
//! - Resize idempotence and disposal completeness
//! - Direct (no post-processing) rendering and tone-mapping refresh

use glam::Vec2;
use holo::assets::{Asset, AssetServer};
use holo::errors::HoloError;
use holo::renderer::core::{DeviceCommand, DeviceRecorder, DrawTarget, HeadlessDevice, SceneOutput};
use holo::renderer::{PRIMARY_TARGET_LABEL, PipelineSettings, PipelineState, RenderPipeline};
use holo::resources::{Color, Geometry, ImageData, ToneMappingMode, ToneMappingSettings, holo_effect};
use holo::world::SceneHost;

const EFFECT_LABEL: &str = "Holo Effect";

fn new_pipeline(validate: bool) -> (RenderPipeline<HeadlessDevice>, DeviceRecorder) {
    let device = if validate {
        HeadlessDevice::new().with_shader_validation()
    } else {
        HeadlessDevice::new()
    };
    let recorder = device.recorder();
    let effect = holo_effect(Vec2::new(800.0, 600.0), 1.0).unwrap();
    (
        RenderPipeline::new(device, PipelineSettings::default(), effect),
        recorder,
    )
}

fn initialized(validate: bool) -> (RenderPipeline<HeadlessDevice>, DeviceRecorder) {
    let (mut pipeline, recorder) = new_pipeline(validate);
    pipeline
        .initialize(800, 600, 1.0, Color::from_hex("#010101").unwrap(), ToneMappingSettings::default())
        .unwrap();
    (pipeline, recorder)
}

fn load_base_group(assets: &mut AssetServer) {
    assets
        .insert("lennaTexture", Asset::Texture(ImageData::solid(2, 2, [255; 4]).unwrap()))
        .unwrap();
    assets
        .insert("envMap", Asset::Texture(ImageData::solid(8, 4, [30, 60, 120, 255]).unwrap()))
        .unwrap();
    assets
        .insert("human", Asset::Model(Geometry::sphere(10.0, 16, 12).unwrap()))
        .unwrap();
    assets
        .insert("heart", Asset::Model(Geometry::sphere(1.0, 8, 6).unwrap()))
        .unwrap();
}

fn frame_commands(recorder: &DeviceRecorder) -> Vec<DeviceCommand> {
    let commands = recorder.commands();
    let start = commands
        .iter()
        .rposition(|c| *c == DeviceCommand::BeginFrame)
        .expect("no frame recorded");
    commands[start..].to_vec()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn full_scenario_ends_in_lifecycle_error() {
    let (mut pipeline, recorder) = initialized(true);
    let mut assets = AssetServer::default();
    let mut host = SceneHost::new(&mut assets).unwrap();
    load_base_group(&mut assets);
    assert!(host.poll(&mut pipeline, &assets).unwrap());

    host.update(1000.0);
    pipeline.update(1000.0).unwrap();

    let effect_time = pipeline.effect_uniforms().unwrap().read().float("uTime").unwrap();
    assert_eq!(effect_time, 3.0);
    let material_time = host.human().unwrap().material().handle().float("uTime").unwrap();
    assert_eq!(material_time, 10.0);

    pipeline.resize(1600, 1200, 1.0).unwrap();
    let primary = recorder.live_target(PRIMARY_TARGET_LABEL).unwrap();
    assert_eq!((primary.width, primary.height), (1600, 1200));
    let buffer = recorder.live_target("composer.buffer1").unwrap();
    assert_eq!((buffer.width, buffer.height), (1600, 1200));

    pipeline.dispose().unwrap();
    assert_eq!(pipeline.state(), PipelineState::Disposed);

    let err = pipeline.update(2000.0).unwrap_err();
    assert!(matches!(
        err,
        HoloError::Lifecycle { operation: "update", state: PipelineState::Disposed }
    ));
}

#[test]
fn calls_outside_initialized_state_are_rejected() {
    let (mut pipeline, _) = new_pipeline(false);
    assert!(pipeline.update(0.0).unwrap_err().is_lifecycle());
    assert!(pipeline.resize(800, 600, 1.0).unwrap_err().is_lifecycle());
    assert!(pipeline.dispose().unwrap_err().is_lifecycle());
    assert_eq!(pipeline.state(), PipelineState::Uninitialized);

    let (mut pipeline, _) = initialized(false);
    pipeline.dispose().unwrap();
    assert!(pipeline.resize(800, 600, 1.0).unwrap_err().is_lifecycle());
    assert!(pipeline.dispose().unwrap_err().is_lifecycle());
    assert!(pipeline.compile().unwrap_err().is_lifecycle());
}

// ============================================================================
// Pass Chain
// ============================================================================

#[test]
fn passes_run_in_declared_order() {
    let (mut pipeline, recorder) = initialized(false);
    assert_eq!(pipeline.pass_names(), ["scene", "bloom", EFFECT_LABEL]);

    pipeline.update(16.0).unwrap();
    let groups: Vec<String> = frame_commands(&recorder)
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::PushDebugGroup(name) => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(groups, ["scene", "bloom", EFFECT_LABEL]);
}

#[test]
fn buffers_ping_pong_between_passes() {
    let (mut pipeline, recorder) = initialized(false);
    pipeline.update(16.0).unwrap();

    let primary = pipeline.render_target().unwrap();
    let buffer1 = recorder.target_id("composer.buffer1").unwrap();
    let buffer2 = recorder.target_id("composer.buffer2").unwrap();
    let commands = frame_commands(&recorder);

    // Scene resolves into the read buffer.
    assert!(commands.contains(&DeviceCommand::DrawScene {
        output: SceneOutput::Target { target: primary, resolve: Some(buffer2) },
        items: 0,
    }));

    let fullscreen: Vec<_> = commands
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::DrawFullscreen { label, inputs, output } => Some((label.as_str(), inputs.clone(), *output)),
            _ => None,
        })
        .collect();

    // luminosity + 5 * (h + v) + composite + blend + effect
    assert_eq!(fullscreen.len(), 14);
    assert_eq!(fullscreen[0].0, "bloom.luminosity");
    assert_eq!(fullscreen[0].1, [buffer2]);

    let blend = &fullscreen[12];
    assert_eq!(blend.0, "bloom.blend");
    assert_eq!(blend.1[0], buffer2);
    assert_eq!(blend.2, DrawTarget::Target(buffer1));

    let effect = &fullscreen[13];
    assert_eq!(effect.0, EFFECT_LABEL);
    assert_eq!(effect.1, [buffer1]);
    assert_eq!(effect.2, DrawTarget::Surface);

    assert_eq!(commands.last(), Some(&DeviceCommand::Present));
}

#[test]
fn effect_time_is_set_before_the_chain_runs() {
    let (mut pipeline, recorder) = initialized(false);
    pipeline.update(500.0).unwrap();

    let bytes = recorder.last_uniforms(EFFECT_LABEL).unwrap();
    let floats: &[f32] = bytemuck::cast_slice(&bytes);
    // uSize, uPixelRatio, uProgress, center, angle, scale, uTime
    assert_eq!(&floats[..2], &[800.0, 600.0]);
    assert_eq!(floats[7], 1.0);
    assert_eq!(floats[8], 1.5);
    assert_eq!(pipeline.effect_time(), 1.5);
}

#[test]
fn direct_mode_renders_scene_to_surface() {
    let (mut pipeline, recorder) = initialized(false);
    pipeline.set_use_postprocess(false);
    pipeline.update(16.0).unwrap();

    let commands = frame_commands(&recorder);
    assert!(commands.contains(&DeviceCommand::DrawScene { output: SceneOutput::Surface, items: 0 }));
    assert!(!commands.iter().any(|c| matches!(c, DeviceCommand::DrawFullscreen { .. })));

    pipeline.set_use_postprocess(true);
    pipeline.update(32.0).unwrap();
    assert!(frame_commands(&recorder)
        .iter()
        .any(|c| matches!(c, DeviceCommand::DrawFullscreen { .. })));
}

#[test]
fn direct_mode_leaves_effect_time_untouched() {
    let (mut pipeline, _recorder) = initialized(false);
    pipeline.update(1000.0).unwrap();

    pipeline.set_use_postprocess(false);
    pipeline.update(5000.0).unwrap();

    let time = pipeline.effect_uniforms().unwrap().read().float("uTime").unwrap();
    assert_eq!(time, 3.0);
    assert_eq!(pipeline.effect_time(), 3.0);
}

// ============================================================================
// Render Targets
// ============================================================================

#[test]
fn primary_target_is_multisampled_at_drawing_size() {
    let (mut pipeline, recorder) = new_pipeline(false);
    pipeline
        .initialize(800, 600, 2.0, Color::BLACK, ToneMappingSettings::default())
        .unwrap();

    let primary = recorder.live_target(PRIMARY_TARGET_LABEL).unwrap();
    assert_eq!((primary.width, primary.height), (1600, 1200));
    assert_eq!(primary.sample_count, 2);
    assert!(!primary.mipmaps);
    assert!(primary.depth);

    // primary + 2 ping-pong + bright + 5 * (h + v)
    assert_eq!(recorder.live_targets().len(), 14);
    assert_eq!(recorder.live_target("bloom.bright").unwrap().width, 800);
}

#[test]
fn repeated_resize_allocates_nothing() {
    let (mut pipeline, recorder) = initialized(false);
    let allocations = recorder.target_allocations();

    pipeline.resize(1024, 768, 1.0).unwrap();
    let live_after_one = recorder.live_targets();
    for _ in 0..5 {
        pipeline.resize(1024, 768, 1.0).unwrap();
    }

    assert_eq!(recorder.target_allocations(), allocations);
    assert_eq!(recorder.live_targets(), live_after_one);
    assert_eq!(pipeline.pass_names(), ["scene", "bloom", EFFECT_LABEL]);

    let uniforms = pipeline.effect_uniforms().unwrap();
    assert_eq!(uniforms.read().vec2("uSize"), Some(Vec2::new(1024.0, 768.0)));
}

#[test]
fn dispose_releases_everything_in_order() {
    let (mut pipeline, recorder) = initialized(false);
    recorder.clear_commands();
    pipeline.dispose().unwrap();

    let commands = recorder.commands();
    assert_eq!(commands[0], DeviceCommand::ReleaseRenderLists);
    assert_eq!(commands[1], DeviceCommand::Dispose);
    let released: Vec<&str> = commands[2..]
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::ReleaseTarget { label } => Some(label.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(&released[..3], [PRIMARY_TARGET_LABEL, "composer.buffer1", "composer.buffer2"]);
    assert_eq!(released.len(), 14);
    assert!(recorder.live_targets().is_empty());
    assert!(recorder.is_disposed());
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn tone_mapping_change_marks_opaque_materials() {
    let (mut pipeline, _) = initialized(false);
    let mut assets = AssetServer::default();
    let mut host = SceneHost::new(&mut assets).unwrap();
    load_base_group(&mut assets);
    host.poll(&mut pipeline, &assets).unwrap();

    let material = host.human().unwrap().material().material().clone();
    assert!(!material.read().needs_update());

    assert_eq!(pipeline.set_tone_mapping_mode(ToneMappingMode::Reinhard), 1);
    assert!(material.read().needs_update());
    assert_eq!(pipeline.set_tone_mapping_mode(ToneMappingMode::Reinhard), 0);

    pipeline.update(16.0).unwrap();
    assert_eq!(pipeline.program_sources().len(), 2);
    assert!(!material.read().needs_update());
}

#[test]
fn clear_color_and_exposure_are_tracked() {
    let (mut pipeline, _) = initialized(false);
    pipeline.set_clear_color(Color::rgb(0.5, 0.5, 0.5));
    pipeline.set_exposure(-3.0);

    assert_eq!(pipeline.clear_color(), Color::rgb(0.5, 0.5, 0.5));
    assert_eq!(pipeline.tone_mapping().exposure(), 0.0);
    assert_eq!(pipeline.settings().exposure, 0.0);
}
