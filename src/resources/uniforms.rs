//! Named Uniform Sets
//!
//! A [`UniformSet`] is an ordered table of named, typed uniform values. It
//! backs both the custom effect pass (`uSize`, `uTime`, ...) and the uniforms
//! a compile hook injects into a material program.
//!
//! # Layout
//!
//! The set lays itself out with WGSL uniform address-space rules, so
//! [`UniformSet::to_bytes`] can be uploaded as-is to a buffer bound to the
//! struct produced by [`UniformSet::wgsl_struct`]:
//!
//! | Value   | WGSL type   | Align | Size |
//! |---------|-------------|-------|------|
//! | Float   | `f32`       | 4     | 4    |
//! | Vec2    | `vec2<f32>` | 8     | 8    |
//! | Color   | `vec3<f32>` | 16    | 12   |
//!
//! The struct size is rounded up to 16 bytes.
//!
//! # Keys
//!
//! Keys are declared up front. Writes go through [`UniformSet::set`], which
//! rejects unknown names and type changes. Once the owning program has been
//! compiled the set is frozen and further declarations fail.

use std::fmt::Write as _;
use std::sync::Arc;

use glam::Vec2;
use parking_lot::RwLock;

use crate::errors::{HoloError, Result};
use crate::resources::Color;

/// A uniform set shared between a compiled program and whoever animates it.
pub type SharedUniforms = Arc<RwLock<UniformSet>>;

/// Typed uniform value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Color(Color),
}

impl UniformValue {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Vec2(_) => "vec2",
            Self::Color(_) => "color",
        }
    }

    #[must_use]
    pub fn wgsl_type(&self) -> &'static str {
        match self {
            Self::Float(_) => "f32",
            Self::Vec2(_) => "vec2<f32>",
            Self::Color(_) => "vec3<f32>",
        }
    }

    fn align(&self) -> usize {
        match self {
            Self::Float(_) => 4,
            Self::Vec2(_) => 8,
            Self::Color(_) => 16,
        }
    }

    fn size(&self) -> usize {
        match self {
            Self::Float(_) => 4,
            Self::Vec2(_) => 8,
            Self::Color(_) => 12,
        }
    }

    fn write_bytes(&self, out: &mut [u8]) {
        match self {
            Self::Float(v) => out[..4].copy_from_slice(bytemuck::bytes_of(v)),
            Self::Vec2(v) => out[..8].copy_from_slice(bytemuck::bytes_of(&v.to_array())),
            Self::Color(c) => {
                out[..12].copy_from_slice(bytemuck::cast_slice(&[c.r, c.g, c.b]));
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            Self::Vec2(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<Color> for UniformValue {
    fn from(v: Color) -> Self {
        Self::Color(v)
    }
}

/// Ordered name → value table with fixed keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformSet {
    entries: Vec<(String, UniformValue)>,
    frozen: bool,
}

impl UniformSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style declaration used for static tables.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<UniformValue>) -> Self {
        if self.index_of(name).is_none() {
            self.entries.push((name.to_string(), value.into()));
        }
        self
    }

    /// Declares a new key with its initial value.
    ///
    /// Redeclaring an existing key with the same type keeps the current value.
    pub fn declare(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<()> {
        let value = value.into();
        if let Some(idx) = self.index_of(name) {
            let current = &self.entries[idx].1;
            if current.type_name() != value.type_name() {
                return Err(HoloError::UniformTypeMismatch {
                    name: name.to_string(),
                    expected: current.type_name(),
                    actual: value.type_name(),
                });
            }
            return Ok(());
        }
        if self.frozen {
            return Err(HoloError::UniformSetFrozen(name.to_string()));
        }
        self.entries.push((name.to_string(), value));
        Ok(())
    }

    /// Overwrites the value of an existing key.
    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<()> {
        let value = value.into();
        let idx = self
            .index_of(name)
            .ok_or_else(|| HoloError::UnknownUniform(name.to_string()))?;
        let slot = &mut self.entries[idx].1;
        if slot.type_name() != value.type_name() {
            return Err(HoloError::UniformTypeMismatch {
                name: name.to_string(),
                expected: slot.type_name(),
                actual: value.type_name(),
            });
        }
        *slot = value;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.index_of(name).map(|idx| self.entries[idx].1)
    }

    #[must_use]
    pub fn float(&self, name: &str) -> Option<f32> {
        self.get(name).and_then(|v| v.as_float())
    }

    #[must_use]
    pub fn vec2(&self, name: &str) -> Option<Vec2> {
        self.get(name).and_then(|v| v.as_vec2())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Marks the key set as final.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    fn offsets(&self) -> (Vec<usize>, usize) {
        let mut offsets = Vec::with_capacity(self.entries.len());
        let mut cursor = 0usize;
        let mut max_align = 4usize;
        for (_, value) in &self.entries {
            let align = value.align();
            max_align = max_align.max(align);
            cursor = cursor.next_multiple_of(align);
            offsets.push(cursor);
            cursor += value.size();
        }
        let size = cursor.next_multiple_of(max_align).next_multiple_of(16);
        (offsets, size)
    }

    /// Size in bytes of the uniform block.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.offsets().1
    }

    /// Packs all values with WGSL uniform layout.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let (offsets, size) = self.offsets();
        let mut bytes = vec![0u8; size];
        for ((_, value), offset) in self.entries.iter().zip(offsets) {
            value.write_bytes(&mut bytes[offset..]);
        }
        bytes
    }

    /// WGSL struct declaration matching [`Self::to_bytes`].
    #[must_use]
    pub fn wgsl_struct(&self, struct_name: &str) -> String {
        let mut code = format!("struct {struct_name} {{\n");
        for (name, value) in &self.entries {
            let _ = writeln!(code, "    {name}: {},", value.wgsl_type());
        }
        code.push_str("};\n");
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_wgsl_alignment() {
        let set = UniformSet::new()
            .with("a", 1.0)
            .with("b", Vec2::new(2.0, 3.0));

        let bytes = set.to_bytes();
        assert_eq!(bytes.len(), 16);
        let floats: &[f32] = bytemuck::cast_slice(&bytes);
        assert_eq!(floats, &[1.0, 0.0, 2.0, 3.0]);

        let padded = set.with("c", 4.0);
        assert_eq!(padded.byte_size(), 32);
    }

    #[test]
    fn color_is_vec3_aligned_to_16() {
        let set = UniformSet::new()
            .with("t", 1.0)
            .with("tint", Color::rgb(0.5, 0.25, 1.0));
        let bytes = set.to_bytes();
        assert_eq!(bytes.len(), 32);
        let floats: &[f32] = bytemuck::cast_slice(&bytes);
        assert_eq!(&floats[4..7], &[0.5, 0.25, 1.0]);
    }

    #[test]
    fn set_rejects_unknown_and_mistyped_values() {
        let mut set = UniformSet::new().with("uTime", 0.0);
        assert!(matches!(
            set.set("uMissing", 1.0),
            Err(HoloError::UnknownUniform(_))
        ));
        assert!(matches!(
            set.set("uTime", Vec2::ONE),
            Err(HoloError::UniformTypeMismatch { .. })
        ));
        set.set("uTime", 2.5).unwrap();
        assert_eq!(set.float("uTime"), Some(2.5));
    }

    #[test]
    fn frozen_set_accepts_redeclaration_only() {
        let mut set = UniformSet::new();
        set.declare("uTime", 0.0).unwrap();
        set.set("uTime", 7.0).unwrap();
        set.freeze();

        set.declare("uTime", 0.0).unwrap();
        assert_eq!(set.float("uTime"), Some(7.0));
        assert_eq!(set.len(), 1);
        assert!(matches!(
            set.declare("uOther", 0.0),
            Err(HoloError::UniformSetFrozen(_))
        ));
    }

    #[test]
    fn wgsl_struct_lists_fields_in_order() {
        let set = UniformSet::new().with("uSize", Vec2::ZERO).with("uTime", 0.0);
        assert_eq!(
            set.wgsl_struct("Params"),
            "struct Params {\n    uSize: vec2<f32>,\n    uTime: f32,\n};\n"
        );
    }
}
