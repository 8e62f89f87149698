//! Asset Manifests
//!
//! A manifest is an ordered list of named groups; each group lists the
//! assets (name, source path, optional type tag) that must be present before
//! the group counts as complete. Manifests are JSON:
//!
//! ```json
//! [
//!   { "name": "base", "items": [
//!       { "name": "envMap", "source": "/assets/environment-map.jpeg", "type": "texture" },
//!       { "name": "human", "source": "/assets/models/demo3.glb" }
//!   ] }
//! ]
//! ```

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::errors::{HoloError, Result};

/// Name of the group carrying the human mesh and the environment map.
pub const BASE_GROUP: &str = "base";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Texture,
    Model,
}

impl AssetKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Texture => "texture",
            Self::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetItem {
    pub name: String,
    pub source: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AssetKind>,
}

impl AssetItem {
    #[must_use]
    pub fn new(name: &str, source: &str, kind: Option<AssetKind>) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            kind,
        }
    }

    /// Declared type, or one inferred from the source extension.
    #[must_use]
    pub fn resolved_kind(&self) -> AssetKind {
        if let Some(kind) = self.kind {
            return kind;
        }
        let ext = std::path::Path::new(&self.source)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("png" | "jpg" | "jpeg" | "hdr" | "webp") => AssetKind::Texture,
            _ => AssetKind::Model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetGroup {
    pub name: String,
    #[serde(default)]
    pub items: Vec<AssetItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest {
    groups: Vec<AssetGroup>,
}

impl AssetManifest {
    /// Builds a manifest, rejecting duplicate group or asset names.
    pub fn new(groups: Vec<AssetGroup>) -> Result<Self> {
        let manifest = Self { groups };
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        let mut groups = FxHashSet::default();
        let mut items = FxHashSet::default();
        for group in &self.groups {
            if !groups.insert(group.name.as_str()) {
                return Err(HoloError::InvalidConfiguration(format!(
                    "duplicate asset group `{}`",
                    group.name
                )));
            }
            for item in &group.items {
                if !items.insert(item.name.as_str()) {
                    return Err(HoloError::InvalidConfiguration(format!(
                        "duplicate asset `{}`",
                        item.name
                    )));
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn groups(&self) -> &[AssetGroup] {
        &self.groups
    }

    #[must_use]
    pub fn group(&self, name: &str) -> Option<&AssetGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// The group and entry declaring asset `name`.
    #[must_use]
    pub fn find_item(&self, name: &str) -> Option<(&AssetGroup, &AssetItem)> {
        self.groups
            .iter()
            .find_map(|g| g.items.iter().find(|i| i.name == name).map(|i| (g, i)))
    }
}

impl Default for AssetManifest {
    /// The `base` group: test texture, environment map, human and heart models.
    fn default() -> Self {
        Self {
            groups: vec![AssetGroup {
                name: BASE_GROUP.to_string(),
                items: vec![
                    AssetItem::new("lennaTexture", "/assets/lenna.png", Some(AssetKind::Texture)),
                    AssetItem::new(
                        "envMap",
                        "/assets/environment-map.jpeg",
                        Some(AssetKind::Texture),
                    ),
                    AssetItem::new("human", "/assets/models/demo3.glb", None),
                    AssetItem::new("heart", "/assets/models/heart.glb", None),
                ],
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_type_tag_is_optional() {
        let manifest = AssetManifest::from_json(
            r#"[{ "name": "base", "items": [
                { "name": "envMap", "source": "env.jpeg", "type": "texture" },
                { "name": "human", "source": "demo3.glb" }
            ] }]"#,
        )
        .unwrap();

        let (group, human) = manifest.find_item("human").unwrap();
        assert_eq!(group.name, "base");
        assert_eq!(human.kind, None);
        assert_eq!(human.resolved_kind(), AssetKind::Model);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = AssetManifest::from_json(
            r#"[{ "name": "a", "items": [{ "name": "x", "source": "x.png" }] },
                { "name": "b", "items": [{ "name": "x", "source": "x.glb" }] }]"#,
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn default_manifest_has_base_group() {
        let manifest = AssetManifest::default();
        let base = manifest.group(BASE_GROUP).unwrap();
        let names: Vec<_> = base.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["lennaTexture", "envMap", "human", "heart"]);
    }
}
