//! Triangle Mesh Geometry
//!
//! CPU-side vertex data (positions, normals, optional UVs and indices) plus
//! the in-place transforms the scene setup needs: [`Geometry::center`] and
//! [`Geometry::rotate_y`]. Every mutation bumps [`Geometry::version`] so the
//! renderer re-uploads changed meshes.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Quat, Vec3};

use crate::errors::{HoloError, Result};

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[must_use]
    pub fn from_points(points: &[[f32; 3]]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let first = Vec3::from_array(*first);
        let (min, max) = rest.iter().fold((first, first), |(min, max), p| {
            let p = Vec3::from_array(*p);
            (min.min(p), max.max(p))
        });
        Some(Self { min, max })
    }
}

/// Vertex layout uploaded to the GPU: position + normal + uv.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u64 = std::mem::size_of::<Self>() as u64;
}

#[derive(Debug, Clone)]
pub struct Geometry {
    id: u64,
    version: u64,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: Option<Vec<[f32; 2]>>,
    indices: Option<Vec<u32>>,
}

impl Geometry {
    /// Creates a geometry from matching position and normal streams.
    pub fn new(positions: Vec<[f32; 3]>, normals: Vec<[f32; 3]>) -> Result<Self> {
        let geometry = Self {
            id: NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed),
            version: 0,
            positions,
            normals,
            uvs: None,
            indices: None,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn with_uvs(mut self, uvs: Vec<[f32; 2]>) -> Result<Self> {
        self.uvs = Some(uvs);
        self.validate()?;
        Ok(self)
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Result<Self> {
        self.indices = Some(indices);
        self.validate()?;
        Ok(self)
    }

    /// Checks attribute lengths and index bounds.
    pub fn validate(&self) -> Result<()> {
        let count = self.positions.len();
        if count == 0 {
            return Err(HoloError::InvalidGeometry("geometry has no vertices".into()));
        }
        if self.normals.len() != count {
            return Err(HoloError::InvalidGeometry(format!(
                "normal count {} does not match position count {count}",
                self.normals.len()
            )));
        }
        if let Some(uvs) = &self.uvs
            && uvs.len() != count
        {
            return Err(HoloError::InvalidGeometry(format!(
                "uv count {} does not match position count {count}",
                uvs.len()
            )));
        }
        if let Some(indices) = &self.indices {
            if indices.len() % 3 != 0 {
                return Err(HoloError::InvalidGeometry(format!(
                    "index count {} is not a multiple of 3",
                    indices.len()
                )));
            }
            if let Some(&bad) = indices.iter().find(|&&i| i as usize >= count) {
                return Err(HoloError::InvalidGeometry(format!(
                    "index {bad} out of range for {count} vertices"
                )));
            }
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    /// Number of elements drawn: index count when indexed, else vertex count.
    #[must_use]
    pub fn draw_count(&self) -> u32 {
        self.indices
            .as_ref()
            .map_or(self.vertex_count(), |i| i.len() as u32)
    }

    #[must_use]
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    #[must_use]
    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    #[must_use]
    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.positions)
    }

    /// Translates the vertices so the bounding box is centred on the origin.
    ///
    /// Returns the applied offset.
    pub fn center(&mut self) -> Vec3 {
        let Some(bbox) = self.bounding_box() else {
            return Vec3::ZERO;
        };
        let offset = -bbox.center();
        self.translate(offset);
        offset
    }

    pub fn translate(&mut self, offset: Vec3) {
        for p in &mut self.positions {
            *p = (Vec3::from_array(*p) + offset).to_array();
        }
        self.version += 1;
    }

    /// Rotates positions and normals about the Y axis (radians).
    pub fn rotate_y(&mut self, angle: f32) {
        let rotation = Quat::from_rotation_y(angle);
        for p in &mut self.positions {
            *p = (rotation * Vec3::from_array(*p)).to_array();
        }
        for n in &mut self.normals {
            *n = (rotation * Vec3::from_array(*n)).normalize_or_zero().to_array();
        }
        self.version += 1;
    }

    /// Interleaved vertex buffer contents.
    #[must_use]
    pub fn vertices(&self) -> Vec<Vertex> {
        (0..self.positions.len())
            .map(|i| Vertex {
                position: self.positions[i],
                normal: self.normals[i],
                uv: self.uvs.as_ref().map_or([0.0; 2], |uvs| uvs[i]),
            })
            .collect()
    }

    /// UV sphere, Y-up.
    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Result<Self> {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);

        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut uvs = Vec::new();

        for y in 0..=height_segments {
            let v = y as f32 / height_segments as f32;
            let theta = v * PI;
            let ring = radius * theta.sin();
            let py = -radius * theta.cos();

            for x in 0..=width_segments {
                let u = x as f32 / width_segments as f32;
                let phi = u * 2.0 * PI;
                let p = Vec3::new(-ring * phi.cos(), py, ring * phi.sin());

                positions.push(p.to_array());
                normals.push(p.normalize_or_zero().to_array());
                uvs.push([u, 1.0 - v]);
            }
        }

        let stride = width_segments + 1;
        let mut indices = Vec::new();
        for y in 0..height_segments {
            for x in 0..width_segments {
                let v0 = y * stride + x;
                let v1 = v0 + 1;
                let v2 = v0 + stride;
                let v3 = v2 + 1;
                indices.extend_from_slice(&[v0, v1, v2, v1, v3, v2]);
            }
        }

        Self::new(positions, normals)?
            .with_uvs(uvs)?
            .with_indices(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Geometry {
        Geometry::new(
            vec![[1.0, 1.0, 1.0], [3.0, 1.0, 1.0], [1.0, 5.0, 3.0]],
            vec![[0.0, 0.0, 1.0]; 3],
        )
        .unwrap()
    }

    #[test]
    fn center_moves_bbox_to_origin() {
        let mut geometry = triangle();
        let offset = geometry.center();

        assert_eq!(offset, Vec3::new(-2.0, -3.0, -2.0));
        let bbox = geometry.bounding_box().unwrap();
        assert!(bbox.center().length() < 1e-6);
        assert_eq!(bbox.size(), Vec3::new(2.0, 4.0, 2.0));
        assert_eq!(geometry.version(), 1);
    }

    #[test]
    fn rotate_y_quarter_turn_rotates_normals() {
        let mut geometry = triangle();
        geometry.rotate_y(-PI * 0.5);

        // +Z rotated by -90 degrees about Y lands on -X.
        let n = Vec3::from_array(geometry.normals()[0]);
        assert!((n - Vec3::NEG_X).length() < 1e-5);
    }

    #[test]
    fn validation_rejects_mismatched_streams() {
        let err = Geometry::new(vec![[0.0; 3]; 3], vec![[0.0; 3]; 2]).unwrap_err();
        assert!(matches!(err, HoloError::InvalidGeometry(_)));

        let err = triangle().with_indices(vec![0, 1, 7]).unwrap_err();
        assert!(matches!(err, HoloError::InvalidGeometry(_)));
    }

    #[test]
    fn sphere_is_valid_and_indexed() {
        let sphere = Geometry::sphere(1.0, 8, 4).unwrap();
        assert_eq!(sphere.vertex_count(), 9 * 5);
        assert_eq!(sphere.draw_count(), 8 * 4 * 6);
        let bbox = sphere.bounding_box().unwrap();
        assert!((bbox.max.y - 1.0).abs() < 1e-6);
    }
}
