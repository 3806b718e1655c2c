//! Timeline model: clips, effects, transitions and audio tracks.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The edit to render.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// Clips in render order (array order, not `start_time` order)
    #[serde(default)]
    pub clips: Vec<Clip>,
    /// Accepted but not composited
    #[serde(default)]
    pub audio_tracks: Vec<AudioTrack>,
    /// Overall duration in seconds as authored
    #[serde(default)]
    pub duration: f64,
}

/// A trimmed segment of source media placed on the timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: String,
    #[serde(default)]
    pub media_id: Option<String>,
    /// Absolute position on the timeline in seconds
    #[serde(default)]
    pub start_time: f64,
    /// Output duration in seconds (expected > 0, not enforced)
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub trim_start: f64,
    #[serde(default)]
    pub trim_end: f64,
    /// Accepted but not composited; clips render as one sequential stream
    #[serde(default)]
    pub layer: i32,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub transitions: ClipTransitions,
}

impl Clip {
    /// Effects that should be rendered, in authored order.
    pub fn enabled_effects(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter().filter(|e| e.enabled)
    }

    /// The transition blending this clip with the previous one.
    pub fn transition_in(&self) -> Option<&Transition> {
        self.transitions.r#in.as_ref()
    }
}

/// Transitions attached to a clip's boundaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClipTransitions {
    #[serde(default, rename = "in", skip_serializing_if = "Option::is_none")]
    pub r#in: Option<Transition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out: Option<Transition>,
}

/// Type-specific effect/transition parameters.
///
/// Values stay as raw JSON so numeric knobs and string options such as
/// `direction` share one map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Parameters(pub BTreeMap<String, Value>);

impl Parameters {
    /// Read a numeric parameter. Numeric strings are accepted.
    pub fn number(&self, key: &str) -> Option<f64> {
        let value = match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    /// Read a numeric parameter, falling back to `default`.
    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.number(key).unwrap_or(default)
    }

    /// Read a string parameter.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Insert a parameter (builder style, mostly for tests).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

/// A per-clip visual effect.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Effect {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EffectType,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Effect {
    pub fn new(kind: EffectType, parameters: Parameters) -> Self {
        Self {
            id: String::new(),
            kind,
            parameters,
            enabled: true,
        }
    }
}

/// Supported effect types. Anything else deserializes to `Unknown` and is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    Brightness,
    Contrast,
    Saturation,
    Speed,
    PanZoom,
    Fade,
    #[serde(other)]
    Unknown,
}

/// Blend between two consecutive clips.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Transition {
    #[serde(rename = "type")]
    pub kind: TransitionType,
    /// Seconds
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub parameters: Parameters,
}

impl Transition {
    pub fn new(kind: TransitionType, duration: f64) -> Self {
        Self {
            kind,
            duration,
            parameters: Parameters::default(),
        }
    }
}

/// Supported transition types. Unknown types render as a cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Crossfade,
    Slide,
    Wipe,
    #[default]
    #[serde(other)]
    Cut,
}

/// An audio track on the timeline (not mixed by the current pipeline).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub muted: bool,
}

fn default_volume() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clip_deserialize() {
        let clip: Clip = serde_json::from_value(json!({
            "id": "c1",
            "mediaId": "m1",
            "startTime": 2.0,
            "duration": 5,
            "trimStart": 1.5,
            "effects": [
                {"id": "e1", "type": "brightness", "parameters": {"value": 0.2}, "enabled": true},
                {"id": "e2", "type": "vhs_glitch", "parameters": {}, "enabled": true},
                {"id": "e3", "type": "contrast", "parameters": {"value": 1.4}, "enabled": false}
            ],
            "transitions": {"in": {"type": "crossfade", "duration": 0.5}}
        }))
        .unwrap();

        assert_eq!(clip.duration, 5.0);
        assert_eq!(clip.effects[1].kind, EffectType::Unknown);
        assert_eq!(clip.enabled_effects().count(), 2);
        assert_eq!(clip.transition_in().unwrap().kind, TransitionType::Crossfade);
        assert!(clip.transitions.out.is_none());
    }

    #[test]
    fn test_unknown_transition_is_cut() {
        let t: Transition = serde_json::from_value(json!({"type": "spin", "duration": 1})).unwrap();
        assert_eq!(t.kind, TransitionType::Cut);
    }

    #[test]
    fn test_parameters_accessors() {
        let params: Parameters =
            serde_json::from_value(json!({"zoom": 1.5, "panX": "0.25", "direction": "up"})).unwrap();
        assert_eq!(params.number("zoom"), Some(1.5));
        assert_eq!(params.number("panX"), Some(0.25));
        assert_eq!(params.number("missing"), None);
        assert_eq!(params.number_or("missing", 2.0), 2.0);
        assert_eq!(params.text("direction"), Some("up"));
        assert_eq!(params.number("direction"), None);
    }

    #[test]
    fn test_timeline_keeps_clip_order() {
        let timeline: Timeline = serde_json::from_value(json!({
            "clips": [
                {"id": "b", "startTime": 4, "duration": 3},
                {"id": "a", "startTime": 0, "duration": 2.5}
            ],
            "duration": 5.5
        }))
        .unwrap();
        let ids: Vec<_> = timeline.clips.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(timeline.audio_tracks.is_empty());
        assert!((timeline.duration - 5.5).abs() < 1e-9);
    }
}
