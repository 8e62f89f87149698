//! Asset manifests and the in-memory asset server.

pub mod manifest;
pub mod server;

pub use manifest::{AssetGroup, AssetItem, AssetKind, AssetManifest, BASE_GROUP};
pub use server::{Asset, AssetServer, GroupFuture};
