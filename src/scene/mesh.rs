use std::borrow::Cow;

use crate::renderer::core::GeometryId;
use crate::resources::{Geometry, MaterialRef};
use crate::scene::Transform;

/// A drawable: geometry, a shared material and a transform.
#[derive(Debug)]
pub struct Mesh {
    pub name: Cow<'static, str>,
    pub geometry: Geometry,
    pub material: MaterialRef,
    pub transform: Transform,
    pub visible: bool,

    pub(crate) gpu_geometry: Option<GeometryId>,
    pub(crate) uploaded_version: Option<u64>,
}

impl Mesh {
    #[must_use]
    pub fn new(geometry: Geometry, material: MaterialRef) -> Self {
        Self {
            name: Cow::Borrowed("Mesh"),
            geometry,
            material,
            transform: Transform::new(),
            visible: true,
            gpu_geometry: None,
            uploaded_version: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether the geometry must be (re)uploaded before drawing.
    #[must_use]
    pub fn geometry_dirty(&self) -> bool {
        self.uploaded_version != Some(self.geometry.version())
    }
}
