//! Generated stand-in content for clips whose media cannot be resolved.
//!
//! The pattern and color are derived from a hash of the clip id, so the same
//! clip always renders the same placeholder.

use sha2::{Digest, Sha256};

use crate::command::FfmpegInput;
use crate::filters::Filter;

const PALETTE: [&str; 8] = [
    "0x7C3AED", "0x2563EB", "0x059669", "0xD97706", "0xDC2626", "0xDB2777", "0x0891B2",
    "0x4B5563",
];

/// Synthetic source pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderPattern {
    Solid,
    TestSource,
    Bars,
    RgbTest,
}

impl PlaceholderPattern {
    const ALL: [PlaceholderPattern; 4] = [
        PlaceholderPattern::Solid,
        PlaceholderPattern::TestSource,
        PlaceholderPattern::Bars,
        PlaceholderPattern::RgbTest,
    ];

    /// lavfi source filter name.
    pub fn source_name(&self) -> &'static str {
        match self {
            PlaceholderPattern::Solid => "color",
            PlaceholderPattern::TestSource => "testsrc2",
            PlaceholderPattern::Bars => "smptehdbars",
            PlaceholderPattern::RgbTest => "rgbtestsrc",
        }
    }
}

/// Placeholder chosen for one clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    pub pattern: PlaceholderPattern,
    pub color: &'static str,
}

impl Placeholder {
    /// Deterministic placeholder for a clip id.
    pub fn for_clip(clip_id: &str) -> Self {
        let digest = Sha256::digest(clip_id.as_bytes());
        let pattern = PlaceholderPattern::ALL[digest[0] as usize % PlaceholderPattern::ALL.len()];
        let color = PALETTE[digest[1] as usize % PALETTE.len()];
        Self { pattern, color }
    }

    /// The lavfi source filter at the requested size and rate.
    pub fn source_filter(&self, width: u32, height: u32, fps: u32) -> Filter {
        let filter = Filter::new(self.pattern.source_name());
        let filter = match self.pattern {
            PlaceholderPattern::Solid => filter.arg("c", self.color),
            _ => filter,
        };
        filter
            .arg("s", format!("{}x{}", width, height))
            .arg("r", fps)
    }

    /// FFmpeg input producing this placeholder.
    pub fn to_input(&self, width: u32, height: u32, fps: u32) -> FfmpegInput {
        FfmpegInput::lavfi(self.source_filter(width, height, fps).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_clip_same_placeholder() {
        assert_eq!(Placeholder::for_clip("clip-42"), Placeholder::for_clip("clip-42"));
    }

    #[test]
    fn test_ids_spread_over_patterns() {
        let patterns: std::collections::HashSet<_> = (0..64)
            .map(|i| Placeholder::for_clip(&format!("clip-{}", i)).pattern.source_name())
            .collect();
        assert!(patterns.len() > 1);
    }

    #[test]
    fn test_lavfi_input() {
        let placeholder = Placeholder {
            pattern: PlaceholderPattern::Solid,
            color: PALETTE[0],
        };
        let input = placeholder.to_input(1080, 1920, 30);
        assert!(input.is_lavfi());
        assert_eq!(input.source, "color=c=0x7C3AED:s=1080x1920:r=30");
    }
}
