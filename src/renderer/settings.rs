//! Pipeline Settings
//!
//! Configuration consumed by [`RenderPipeline::new`](super::RenderPipeline::new)
//! and applied by `initialize`. Every field has a default, so a partial JSON
//! document is enough:
//!
//! ```rust,ignore
//! use holo::renderer::PipelineSettings;
//!
//! let settings = PipelineSettings::from_json(r##"{ "clear_color": "#202020", "exposure": 1.2 }"##)?;
//! ```
//!
//! | Field             | Description                          | Default        |
//! |-------------------|--------------------------------------|----------------|
//! | `clear_color`     | Scene clear colour (`#rrggbb[aa]`)   | `#010101`      |
//! | `tone_mapping`    | Operator applied in material shaders | `aces_filmic`  |
//! | `exposure`        | Tone mapping exposure (>= 0)         | `1.0`          |
//! | `use_postprocess` | Run the pass chain or draw directly  | `true`         |
//! | `bloom`           | Bloom strength / radius / threshold  | `1.5/0.8/0.05` |
//! | `sample_count`    | MSAA samples of the primary target   | `2`            |

use serde::{Deserialize, Serialize};

use crate::errors::{HoloError, Result};
use crate::resources::{BloomSettings, Color, ToneMappingMode, ToneMappingSettings};

/// Samples of the primary render target.
pub const RENDER_TARGET_SAMPLES: u32 = 2;

/// Default scene clear colour.
pub const DEFAULT_CLEAR_COLOR: Color = Color::rgb(1.0 / 255.0, 1.0 / 255.0, 1.0 / 255.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub clear_color: Color,
    pub tone_mapping: ToneMappingMode,
    pub exposure: f32,
    pub use_postprocess: bool,
    pub bloom: BloomSettings,
    pub sample_count: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            clear_color: DEFAULT_CLEAR_COLOR,
            tone_mapping: ToneMappingMode::ACESFilmic,
            exposure: 1.0,
            use_postprocess: true,
            bloom: BloomSettings::default(),
            sample_count: RENDER_TARGET_SAMPLES,
        }
    }
}

impl PipelineSettings {
    /// Parses and validates settings from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.exposure.is_finite() || self.exposure < 0.0 {
            return Err(HoloError::InvalidConfiguration(format!(
                "exposure must be a finite value >= 0, got {}",
                self.exposure
            )));
        }
        if !matches!(self.sample_count, 1 | 2 | 4 | 8) {
            return Err(HoloError::InvalidConfiguration(format!(
                "sample_count must be 1, 2, 4 or 8, got {}",
                self.sample_count
            )));
        }
        let bloom = &self.bloom;
        if bloom.strength < 0.0 || !(0.0..=1.0).contains(&bloom.radius) || bloom.threshold < 0.0 {
            return Err(HoloError::InvalidConfiguration(format!(
                "bloom settings out of range: {bloom:?}"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn tone_mapping_settings(&self) -> ToneMappingSettings {
        ToneMappingSettings::new(self.tone_mapping, self.exposure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let settings = PipelineSettings::from_json(r##"{ "clear_color": "#ff0000", "tone_mapping": "reinhard" }"##).unwrap();
        assert_eq!(settings.clear_color, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(settings.tone_mapping, ToneMappingMode::Reinhard);
        assert_eq!(settings.sample_count, RENDER_TARGET_SAMPLES);
        assert!(settings.use_postprocess);
        assert_eq!(settings.bloom, BloomSettings::default());
    }

    #[test]
    fn negative_exposure_is_rejected() {
        let err = PipelineSettings::from_json(r#"{ "exposure": -1.0 }"#).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn bad_colour_is_a_json_error() {
        let err = PipelineSettings::from_json(r#"{ "clear_color": "red-ish" }"#).unwrap_err();
        assert!(matches!(err, HoloError::JsonError(_)));
    }
}
