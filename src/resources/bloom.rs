//! Bloom Configuration
//!
//! Settings for the Unreal-style bloom pass: a luminosity high-pass, a
//! five-level separable Gaussian blur chain, and an additive composite of the
//! blurred levels back over the scene.
//!
//! The composite weights each mip level by a factor lerped towards its mirror
//! (`1.2 - factor`) by `radius`, so `radius = 0` keeps the sharp levels
//! dominant and `radius = 1` favours the wide ones.

use serde::{Deserialize, Serialize};

/// Number of blur mip levels.
pub const BLOOM_MIP_COUNT: usize = 5;

/// Gaussian kernel radius per mip level.
pub const BLOOM_KERNEL_SIZES: [u32; BLOOM_MIP_COUNT] = [3, 5, 7, 9, 11];

/// Base composite weight per mip level.
pub const BLOOM_FACTORS: [f32; BLOOM_MIP_COUNT] = [1.0, 0.8, 0.6, 0.4, 0.2];

/// Width of the smoothstep ramp above the luminosity threshold.
pub const LUMINOSITY_SMOOTH_WIDTH: f32 = 0.01;

/// Bloom parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    /// Overall contribution of the blurred image.
    pub strength: f32,
    /// Spread in `[0, 1]`.
    pub radius: f32,
    /// Luminance cut-off for the high-pass.
    pub threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: 1.5,
            radius: 0.8,
            threshold: 0.05,
        }
    }
}

impl BloomSettings {
    #[must_use]
    pub fn new(strength: f32, radius: f32, threshold: f32) -> Self {
        Self {
            strength: strength.max(0.0),
            radius: radius.clamp(0.0, 1.0),
            threshold: threshold.max(0.0),
        }
    }

    /// Per-level composite weights with `radius` applied.
    #[must_use]
    pub fn mip_factors(&self) -> [f32; BLOOM_MIP_COUNT] {
        let radius = self.radius.clamp(0.0, 1.0);
        BLOOM_FACTORS.map(|factor| {
            let mirror = 1.2 - factor;
            factor + (mirror - factor) * radius
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pass_parameters() {
        let settings = BloomSettings::default();
        assert_eq!(settings.strength, 1.5);
        assert_eq!(settings.radius, 0.8);
        assert_eq!(settings.threshold, 0.05);
    }

    #[test]
    fn radius_lerps_towards_mirror_factor() {
        let sharp = BloomSettings::new(1.0, 0.0, 0.0).mip_factors();
        assert_eq!(sharp, BLOOM_FACTORS);

        let wide = BloomSettings::new(1.0, 1.0, 0.0).mip_factors();
        let expected = [0.2, 0.4, 0.6, 0.8, 1.0];
        for (a, b) in wide.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
