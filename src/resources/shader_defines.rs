//! Shader Define Sets
//!
//! A material declares its compile-time features (`USE_ENV_MAP`,
//! `TONE_MAPPING_MODE`, ...) as a [`ShaderDefines`] set. Each distinct set is
//! a distinct compiled variant of the material's program, and the set's hash
//! is part of the program cache key.
//!
//! Keys and values are interned [`Symbol`]s kept sorted by symbol id, so two
//! sets built in different insertion orders hash and compare equal.
//!
//! ```rust,ignore
//! use holo::resources::ShaderDefines;
//!
//! let mut defines = ShaderDefines::new();
//! defines.set("USE_ENV_MAP", "1");
//! defines.set("TONE_MAPPING_MODE", "4");
//! let key = defines.compute_hash();
//! ```

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::utils::interner::{self, Symbol};

/// Sorted set of `(key, value)` define pairs.
#[derive(Debug, Clone, Default)]
pub struct ShaderDefines {
    defines: Vec<(Symbol, Symbol)>,
}

impl ShaderDefines {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            defines: Vec::new(),
        }
    }

    /// Sets a define, replacing the value if the key already exists.
    pub fn set(&mut self, key: &str, value: &str) {
        self.set_symbol(interner::intern(key), interner::intern(value));
    }

    #[inline]
    pub fn set_symbol(&mut self, key: Symbol, value: Symbol) {
        match self.defines.binary_search_by_key(&key, |&(k, _)| k) {
            Ok(idx) => self.defines[idx].1 = value,
            Err(idx) => self.defines.insert(idx, (key, value)),
        }
    }

    /// Removes a define. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        let Some(key) = interner::get(key) else {
            return false;
        };
        match self.defines.binary_search_by_key(&key, |&(k, _)| k) {
            Ok(idx) => {
                self.defines.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        interner::get(key)
            .is_some_and(|key| self.defines.binary_search_by_key(&key, |&(k, _)| k).is_ok())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'static str> {
        let key = interner::get(key)?;
        self.defines
            .binary_search_by_key(&key, |&(k, _)| k)
            .ok()
            .map(|idx| interner::resolve(self.defines[idx].1))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.defines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.defines
            .iter()
            .map(|&(k, v)| (interner::resolve(k), interner::resolve(v)))
    }

    /// Converts to a map for template rendering.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<&'static str, &'static str> {
        self.iter().collect()
    }

    /// Merges `other` into `self`; values from `other` win on conflict.
    pub fn merge(&mut self, other: &ShaderDefines) {
        for &(key, value) in &other.defines {
            self.set_symbol(key, value);
        }
    }

    /// Content hash used in program cache keys.
    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        use std::hash::BuildHasher;

        rustc_hash::FxBuildHasher.hash_one(self)
    }
}

impl Hash for ShaderDefines {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.defines.hash(state);
    }
}

impl PartialEq for ShaderDefines {
    fn eq(&self, other: &Self) -> bool {
        self.defines == other.defines
    }
}

impl Eq for ShaderDefines {}

impl From<&[(&str, &str)]> for ShaderDefines {
    fn from(defines: &[(&str, &str)]) -> Self {
        let mut result = Self::new();
        for (k, v) in defines {
            result.set(k, v);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_existing_value() {
        let mut defines = ShaderDefines::new();
        defines.set("TONE_MAPPING_MODE", "1");
        defines.set("TONE_MAPPING_MODE", "4");

        assert_eq!(defines.len(), 1);
        assert_eq!(defines.get("TONE_MAPPING_MODE"), Some("4"));
    }

    #[test]
    fn insertion_order_does_not_change_hash() {
        let a = ShaderDefines::from(&[("USE_ENV_MAP", "1"), ("TONE_MAPPING_MODE", "4")][..]);
        let b = ShaderDefines::from(&[("TONE_MAPPING_MODE", "4"), ("USE_ENV_MAP", "1")][..]);

        assert_eq!(a, b);
        assert_eq!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn remove_and_merge() {
        let mut d1 = ShaderDefines::from(&[("A", "1"), ("B", "2")][..]);
        let d2 = ShaderDefines::from(&[("B", "3"), ("C", "4")][..]);
        d1.merge(&d2);

        assert_eq!(d1.get("B"), Some("3"));
        assert!(d1.remove("A"));
        assert!(!d1.remove("A"));
        assert!(!d1.contains("A"));
        assert_eq!(d1.len(), 2);
    }
}
