//! Asset & World Integration Tests
//!
//! Tests for:
//! - Asset manifest loading and group completion signalling
//! - SceneHost: reacting to the `base` group only, human setup
//! - Resource errors when the group signal is faked

use glam::Vec2;
use holo::assets::{Asset, AssetGroup, AssetItem, AssetKind, AssetManifest, AssetServer};
use holo::errors::{ErrorCategory, HoloError};
use holo::renderer::core::HeadlessDevice;
use holo::renderer::{PipelineSettings, RenderPipeline};
use holo::resources::{Color, Geometry, ImageData, ToneMappingSettings, holo_effect};
use holo::world::SceneHost;
use holo::world::human::{HUMAN_METALNESS, HUMAN_ROUGHNESS, HUMAN_SCALE};

fn pipeline() -> RenderPipeline<HeadlessDevice> {
    let mut pipeline = RenderPipeline::new(
        HeadlessDevice::new(),
        PipelineSettings::default(),
        holo_effect(Vec2::new(800.0, 600.0), 1.0).unwrap(),
    );
    pipeline
        .initialize(800, 600, 1.0, Color::BLACK, ToneMappingSettings::default())
        .unwrap();
    pipeline
}

fn two_group_manifest() -> AssetManifest {
    AssetManifest::new(vec![
        AssetGroup {
            name: "extra".into(),
            items: vec![AssetItem::new("lennaTexture", "lenna.png", None)],
        },
        AssetGroup {
            name: "base".into(),
            items: vec![
                AssetItem::new("envMap", "env.jpeg", Some(AssetKind::Texture)),
                AssetItem::new("human", "demo3.glb", None),
            ],
        },
    ])
    .unwrap()
}

// ============================================================================
// Asset Server
// ============================================================================

#[test]
fn group_completes_exactly_once() {
    let mut assets = AssetServer::new(two_group_manifest());
    let mut ready = assets.group_ready("base").unwrap();
    assert!(!ready.try_resolve());

    let env = Asset::Texture(ImageData::solid(2, 2, [0; 4]).unwrap());
    assert_eq!(assets.insert("envMap", env.clone()).unwrap(), None);
    let human = Asset::Model(Geometry::sphere(1.0, 8, 6).unwrap());
    assert_eq!(assets.insert("human", human.clone()).unwrap(), Some("base".to_string()));
    assert_eq!(assets.insert("human", human).unwrap(), None);

    assert!(ready.try_resolve());
    assert!(!ready.try_resolve());
    assert!(ready.is_resolved());

    // Late subscribers resolve immediately.
    let late = assets.group_ready("base").unwrap();
    assert_eq!(pollster::block_on(late.wait()).unwrap(), "base");
}

#[test]
fn asset_kind_is_checked_against_manifest() {
    let mut assets = AssetServer::new(two_group_manifest());
    let err = assets
        .insert("human", Asset::Texture(ImageData::solid(1, 1, [0; 4]).unwrap()))
        .unwrap_err();
    assert!(matches!(err, HoloError::AssetTypeMismatch { expected: "model", .. }));

    let err = assets
        .insert("unknown", Asset::Texture(ImageData::solid(1, 1, [0; 4]).unwrap()))
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Resource);
}

// ============================================================================
// Scene Host
// ============================================================================

#[test]
fn host_ignores_groups_other_than_base() {
    let mut pipeline = pipeline();
    let mut assets = AssetServer::new(two_group_manifest());
    let mut host = SceneHost::new(&mut assets).unwrap();

    assets
        .insert("lennaTexture", Asset::Texture(ImageData::solid(2, 2, [0; 4]).unwrap()))
        .unwrap();
    assert!(!host.poll(&mut pipeline, &assets).unwrap());
    assert!(host.human().is_none());
    assert_eq!(pipeline.scene().mesh_count(), 0);

    assets
        .insert("envMap", Asset::Texture(ImageData::solid(2, 2, [90; 4]).unwrap()))
        .unwrap();
    assets
        .insert("human", Asset::Model(Geometry::sphere(5.0, 8, 6).unwrap()))
        .unwrap();
    assert!(host.poll(&mut pipeline, &assets).unwrap());
    assert!(!host.poll(&mut pipeline, &assets).unwrap());
    assert_eq!(pipeline.scene().mesh_count(), 1);
}

#[test]
fn human_is_scaled_centred_and_configured() {
    let mut pipeline = pipeline();
    let mut assets = AssetServer::new(two_group_manifest());
    let mut host = SceneHost::new(&mut assets).unwrap();

    let offset_sphere = {
        let mut g = Geometry::sphere(2.0, 8, 6).unwrap();
        g.translate(glam::Vec3::new(5.0, 1.0, -3.0));
        g
    };
    assets
        .insert("envMap", Asset::Texture(ImageData::solid(2, 2, [90; 4]).unwrap()))
        .unwrap();
    assets.insert("human", Asset::Model(offset_sphere)).unwrap();
    host.poll(&mut pipeline, &assets).unwrap();

    let human = host.human().unwrap();
    let mesh = pipeline.scene().get_mesh(human.mesh()).unwrap();
    assert_eq!(mesh.transform.scale, glam::Vec3::splat(HUMAN_SCALE));

    let bbox = mesh.geometry.bounding_box().unwrap();
    assert!(bbox.center().abs_diff_eq(glam::Vec3::ZERO, 1e-4));

    let material = mesh.material.read();
    assert_eq!(material.metalness, HUMAN_METALNESS);
    assert_eq!(material.roughness, HUMAN_ROUGHNESS);
    assert!(material.env_map().is_some());
    assert!(material.patched_handle().unwrap().is_compiled());
}

#[test]
fn host_update_before_group_is_noop() {
    let mut assets = AssetServer::default();
    let mut host = SceneHost::new(&mut assets).unwrap();
    host.update(1234.0);
    assert!(host.human().is_none());
}
