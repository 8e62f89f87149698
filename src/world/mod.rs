//! World objects driven by asset-group readiness.

pub mod host;
pub mod human;

pub use host::SceneHost;
pub use human::{Human, orient_geometry};
