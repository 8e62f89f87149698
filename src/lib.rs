#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod assets;
pub mod errors;
pub mod material_patch;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod utils;
pub mod world;

pub use assets::{Asset, AssetManifest, AssetServer, GroupFuture};
pub use errors::{HoloError, Result};
pub use material_patch::{MaterialShaderPatcher, PatchedMaterial, PatchedShaderHandle};
pub use renderer::core::{HeadlessDevice, OutputDevice, WgpuDevice};
pub use renderer::{PipelineSettings, PipelineState, RenderPipeline};
pub use resources::{
    BloomSettings, Color, Geometry, MeshStandardMaterial, ShaderEffectDefinition, ToneMappingMode,
    holo_effect,
};
pub use scene::{Camera, Mesh, Scene};
pub use utils::Clock;
pub use world::SceneHost;
