//! Watermark settings and presets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-job watermark settings (plan dependent, decided upstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub preset: WatermarkPreset,
}

/// Named overlay configuration. Unknown names fall back to `Minimal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkPreset {
    Branded,
    Corner,
    Center,
    #[default]
    #[serde(other)]
    Minimal,
}

/// Visual treatment of the overlay text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkStyle {
    /// Soft drop shadow
    Shadow,
    /// Colored outline around the glyphs
    Border,
    /// Translucent box behind the text
    Box,
}

/// Fixed geometry of a preset, in percent of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetSpec {
    /// Horizontal anchor (0 = left edge, 100 = right edge)
    pub x_percent: f64,
    /// Vertical anchor (0 = top edge, 100 = bottom edge)
    pub y_percent: f64,
    /// Font size as percent of frame height
    pub size_percent: f64,
    /// Text opacity
    pub opacity_percent: f64,
    pub style: WatermarkStyle,
}

impl WatermarkPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatermarkPreset::Minimal => "minimal",
            WatermarkPreset::Branded => "branded",
            WatermarkPreset::Corner => "corner",
            WatermarkPreset::Center => "center",
        }
    }

    /// The preset's fixed geometry.
    pub fn spec(&self) -> PresetSpec {
        match self {
            WatermarkPreset::Minimal => PresetSpec {
                x_percent: 97.0,
                y_percent: 97.0,
                size_percent: 2.5,
                opacity_percent: 50.0,
                style: WatermarkStyle::Shadow,
            },
            WatermarkPreset::Branded => PresetSpec {
                x_percent: 50.0,
                y_percent: 92.0,
                size_percent: 4.0,
                opacity_percent: 85.0,
                style: WatermarkStyle::Border,
            },
            WatermarkPreset::Corner => PresetSpec {
                x_percent: 96.0,
                y_percent: 4.0,
                size_percent: 3.0,
                opacity_percent: 70.0,
                style: WatermarkStyle::Box,
            },
            WatermarkPreset::Center => PresetSpec {
                x_percent: 50.0,
                y_percent: 50.0,
                size_percent: 6.0,
                opacity_percent: 35.0,
                style: WatermarkStyle::Box,
            },
        }
    }
}

impl std::fmt::Display for WatermarkPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_preset_is_minimal() {
        let settings: WatermarkSettings =
            serde_json::from_value(json!({"enabled": true, "preset": "neon"})).unwrap();
        assert_eq!(settings.preset, WatermarkPreset::Minimal);
        assert_eq!(settings.preset.spec(), WatermarkPreset::Minimal.spec());
    }

    #[test]
    fn test_missing_fields_default() {
        let settings: WatermarkSettings = serde_json::from_value(json!({})).unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.preset, WatermarkPreset::Minimal);
    }

    #[test]
    fn test_preset_styles() {
        assert_eq!(WatermarkPreset::Minimal.spec().style, WatermarkStyle::Shadow);
        assert_eq!(WatermarkPreset::Branded.spec().style, WatermarkStyle::Border);
        assert_eq!(WatermarkPreset::Corner.spec().style, WatermarkStyle::Box);
        assert_eq!(WatermarkPreset::Center.spec().style, WatermarkStyle::Box);
    }
}
