//! Asset Server
//!
//! Holds materialized assets by name. Model decoding is the caller's job;
//! textures can be handed over encoded through [`AssetServer::insert_texture_bytes`].
//! Every insert is checked against the [`AssetManifest`] and may signal
//! group completion.
//!
//! Completion is observable two ways:
//! - [`AssetServer::insert`] returns the name of a group it completed
//! - [`AssetServer::group_ready`] hands out a single-shot [`GroupFuture`]
//!
//! Each group completes exactly once.

use rustc_hash::{FxHashMap, FxHashSet};

use super::manifest::{AssetKind, AssetManifest};
use crate::errors::{HoloError, Result};
use crate::resources::{CubeTextureData, Geometry, ImageData};

/// A decoded asset.
#[derive(Debug, Clone)]
pub enum Asset {
    Texture(ImageData),
    Model(Geometry),
}

impl Asset {
    #[must_use]
    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Texture(_) => AssetKind::Texture,
            Self::Model(_) => AssetKind::Model,
        }
    }
}

pub struct AssetServer {
    manifest: AssetManifest,
    items: FxHashMap<String, Asset>,
    completed: FxHashSet<String>,
    waiters: FxHashMap<String, Vec<flume::Sender<String>>>,
}

impl Default for AssetServer {
    fn default() -> Self {
        Self::new(AssetManifest::default())
    }
}

impl AssetServer {
    #[must_use]
    pub fn new(manifest: AssetManifest) -> Self {
        Self {
            manifest,
            items: FxHashMap::default(),
            completed: FxHashSet::default(),
            waiters: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    /// Stores `asset` under `name`. Returns the group this insert completed,
    /// if any.
    pub fn insert(&mut self, name: &str, asset: Asset) -> Result<Option<String>> {
        let (group, item) = self
            .manifest
            .find_item(name)
            .ok_or_else(|| HoloError::AssetNotFound(name.to_string()))?;

        let expected = item.resolved_kind();
        if asset.kind() != expected {
            return Err(HoloError::AssetTypeMismatch {
                name: name.to_string(),
                expected: expected.name(),
            });
        }
        if let Asset::Texture(image) = &asset {
            image.validate()?;
        }
        let group_name = group.name.clone();

        self.items.insert(name.to_string(), asset);
        log::debug!("Asset `{name}` loaded");

        if self.completed.contains(&group_name) || !self.group_items_present(&group_name) {
            return Ok(None);
        }

        self.completed.insert(group_name.clone());
        log::info!("Asset group `{group_name}` complete");
        for tx in self.waiters.remove(&group_name).unwrap_or_default() {
            // Receivers that were dropped simply miss the signal.
            let _ = tx.try_send(group_name.clone());
        }
        Ok(Some(group_name))
    }

    /// Decodes a PNG/JPEG texture and stores it under `name`.
    pub fn insert_texture_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<Option<String>> {
        let image = ImageData::decode(bytes, name)?;
        self.insert(name, Asset::Texture(image))
    }

    fn group_items_present(&self, group: &str) -> bool {
        self.manifest
            .group(group)
            .is_some_and(|g| g.items.iter().all(|i| self.items.contains_key(&i.name)))
    }

    #[must_use]
    pub fn is_group_complete(&self, group: &str) -> bool {
        self.completed.contains(group)
    }

    /// Future resolving once `group` is complete (immediately if it already is).
    pub fn group_ready(&mut self, group: &str) -> Result<GroupFuture> {
        if self.manifest.group(group).is_none() {
            return Err(HoloError::AssetNotFound(format!("group `{group}`")));
        }
        let (tx, rx) = flume::bounded(1);
        if self.completed.contains(group) {
            let _ = tx.try_send(group.to_string());
        } else {
            self.waiters.entry(group.to_string()).or_default().push(tx);
        }
        Ok(GroupFuture {
            group: group.to_string(),
            rx,
            resolved: false,
        })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn texture(&self, name: &str) -> Result<&ImageData> {
        match self.items.get(name) {
            Some(Asset::Texture(image)) => Ok(image),
            Some(_) => Err(HoloError::AssetTypeMismatch {
                name: name.to_string(),
                expected: AssetKind::Texture.name(),
            }),
            None => Err(HoloError::AssetNotFound(name.to_string())),
        }
    }

    /// The equirectangular texture `name` projected onto a cube map with
    /// `face_size` texels per side and box-filtered mips.
    pub fn environment(&self, name: &str, face_size: u32) -> Result<CubeTextureData> {
        CubeTextureData::from_image(self.texture(name)?, face_size)
    }

    pub fn model(&self, name: &str) -> Result<&Geometry> {
        match self.items.get(name) {
            Some(Asset::Model(geometry)) => Ok(geometry),
            Some(_) => Err(HoloError::AssetTypeMismatch {
                name: name.to_string(),
                expected: AssetKind::Model.name(),
            }),
            None => Err(HoloError::AssetNotFound(name.to_string())),
        }
    }
}

/// Single-shot completion signal for one asset group.
#[derive(Debug)]
pub struct GroupFuture {
    group: String,
    rx: flume::Receiver<String>,
    resolved: bool,
}

impl GroupFuture {
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Non-blocking poll. Returns `true` exactly once, when the group has
    /// completed.
    pub fn try_resolve(&mut self) -> bool {
        if self.resolved {
            return false;
        }
        self.resolved = self.rx.try_recv().is_ok();
        self.resolved
    }

    /// Waits for completion. Fails if the server is dropped first.
    pub async fn wait(self) -> Result<String> {
        self.rx
            .recv_async()
            .await
            .map_err(|_| HoloError::AssetNotFound(format!("group `{}`", self.group)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::manifest::BASE_GROUP;

    fn load_base(server: &mut AssetServer) -> Vec<Option<String>> {
        let sphere = || Geometry::sphere(1.0, 8, 6).unwrap();
        vec![
            server
                .insert("lennaTexture", Asset::Texture(ImageData::solid(2, 2, [255; 4]).unwrap()))
                .unwrap(),
            server
                .insert("envMap", Asset::Texture(ImageData::solid(4, 2, [128; 4]).unwrap()))
                .unwrap(),
            server.insert("human", Asset::Model(sphere())).unwrap(),
            server.insert("heart", Asset::Model(sphere())).unwrap(),
        ]
    }

    #[test]
    fn group_completes_once_on_last_item() {
        let mut server = AssetServer::default();
        let mut ready = server.group_ready(BASE_GROUP).unwrap();
        assert!(!ready.try_resolve());

        let events = load_base(&mut server);
        assert_eq!(events, [None, None, None, Some(BASE_GROUP.to_string())]);
        assert!(ready.try_resolve());
        assert!(!ready.try_resolve());

        // Reinserting does not complete the group again.
        let again = server
            .insert("heart", Asset::Model(Geometry::sphere(1.0, 8, 6).unwrap()))
            .unwrap();
        assert_eq!(again, None);
    }

    #[test]
    fn late_subscribers_resolve_immediately() {
        let mut server = AssetServer::default();
        load_base(&mut server);
        let future = server.group_ready(BASE_GROUP).unwrap();
        assert_eq!(pollster::block_on(future.wait()).unwrap(), BASE_GROUP);
    }

    #[test]
    fn inserts_are_checked_against_manifest() {
        let mut server = AssetServer::default();
        let texel = ImageData::solid(1, 1, [0; 4]).unwrap();
        let unknown = server.insert("dragon", Asset::Texture(texel));
        assert!(matches!(unknown, Err(HoloError::AssetNotFound(_))));

        let texel = ImageData::solid(1, 1, [0; 4]).unwrap();
        let wrong = server.insert("human", Asset::Texture(texel));
        assert!(matches!(wrong, Err(HoloError::AssetTypeMismatch { .. })));

        let empty = ImageData {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        };
        let rejected = server.insert("envMap", Asset::Texture(empty));
        assert!(matches!(rejected, Err(HoloError::InvalidConfiguration(_))));
        assert!(!server.contains("envMap"));

        load_base(&mut server);
        assert!(server.texture("human").is_err());
        assert_eq!(server.model("human").unwrap().vertex_count(), 9 * 7);
    }
}
