//! Tone Mapping Configuration
//!
//! Tone mapping is resolved inside the material's own fragment program, not
//! in a separate pass: the mode is a shader define, so switching modes
//! produces a new compiled variant. Exposure is a per-frame uniform.

use serde::{Deserialize, Serialize};

use crate::resources::ShaderDefines;

/// Tone mapping operator applied at the end of the material fragment stage.
///
/// - [`None`](ToneMappingMode::None): output is written unchanged (no exposure)
/// - [`Linear`](ToneMappingMode::Linear): exposure only, then clamp
/// - [`Reinhard`](ToneMappingMode::Reinhard): classic operator, soft highlight rolloff
/// - [`Cineon`](ToneMappingMode::Cineon): Hejl/Burgess-Dawson film curve
/// - [`ACESFilmic`](ToneMappingMode::ACESFilmic): fitted ACES RRT+ODT curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMappingMode {
    None,
    Linear,
    Reinhard,
    Cineon,
    #[default]
    #[serde(rename = "aces_filmic", alias = "aces")]
    ACESFilmic,
}

impl ToneMappingMode {
    /// Sets (or, for [`ToneMappingMode::None`], removes) `TONE_MAPPING_MODE`.
    pub fn apply_to_defines(&self, defines: &mut ShaderDefines) {
        let mode_str = match self {
            Self::None => {
                defines.remove("TONE_MAPPING_MODE");
                return;
            }
            Self::Linear => "LINEAR",
            Self::Reinhard => "REINHARD",
            Self::Cineon => "CINEON",
            Self::ACESFilmic => "ACES_FILMIC",
        };
        defines.set("TONE_MAPPING_MODE", mode_str);
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Linear => "Linear",
            Self::Reinhard => "Reinhard",
            Self::Cineon => "Cineon",
            Self::ACESFilmic => "ACES Filmic",
        }
    }

    #[must_use]
    pub fn all() -> &'static [ToneMappingMode] {
        &[
            Self::None,
            Self::Linear,
            Self::Reinhard,
            Self::Cineon,
            Self::ACESFilmic,
        ]
    }
}

/// Tone mapping mode plus exposure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingSettings {
    pub mode: ToneMappingMode,
    exposure: f32,
}

impl Default for ToneMappingSettings {
    fn default() -> Self {
        Self {
            mode: ToneMappingMode::ACESFilmic,
            exposure: 1.0,
        }
    }
}

impl ToneMappingSettings {
    #[must_use]
    pub fn new(mode: ToneMappingMode, exposure: f32) -> Self {
        Self {
            mode,
            exposure: exposure.max(0.0),
        }
    }

    #[inline]
    #[must_use]
    pub fn exposure(&self) -> f32 {
        self.exposure.max(0.0)
    }

    /// Sets the exposure; negative values clamp to zero.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure.max(0.0);
    }

    /// Returns `true` if the mode changed (callers must refresh materials).
    pub fn set_mode(&mut self, mode: ToneMappingMode) -> bool {
        let changed = self.mode != mode;
        self.mode = mode;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_removes_define() {
        let mut defines = ShaderDefines::new();
        ToneMappingMode::Reinhard.apply_to_defines(&mut defines);
        assert_eq!(defines.get("TONE_MAPPING_MODE"), Some("REINHARD"));

        ToneMappingMode::None.apply_to_defines(&mut defines);
        assert!(!defines.contains("TONE_MAPPING_MODE"));
    }

    #[test]
    fn exposure_is_clamped() {
        let mut settings = ToneMappingSettings::new(ToneMappingMode::Linear, -2.0);
        assert_eq!(settings.exposure(), 0.0);
        settings.set_exposure(1.5);
        assert_eq!(settings.exposure(), 1.5);
    }

    #[test]
    fn set_mode_reports_change() {
        let mut settings = ToneMappingSettings::default();
        assert!(!settings.set_mode(ToneMappingMode::ACESFilmic));
        assert!(settings.set_mode(ToneMappingMode::Cineon));
    }
}
