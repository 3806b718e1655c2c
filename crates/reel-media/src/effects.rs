//! Mapping of timeline effects to FFmpeg filters.
//!
//! Each supported effect type maps to a fixed set of filters; unknown types
//! map to nothing and are skipped.

use reel_models::{Clip, Effect, EffectType, Parameters};

use crate::filters::{fmt_num, Filter};

/// Filters for the clip's enabled effects, in authored order.
pub fn clip_effect_filters(clip: &Clip) -> Vec<Filter> {
    clip.enabled_effects()
        .flat_map(|effect| effect_filters(effect, clip))
        .collect()
}

/// Filters for a single effect.
pub fn effect_filters(effect: &Effect, clip: &Clip) -> Vec<Filter> {
    let params = &effect.parameters;
    match effect.kind {
        EffectType::Brightness => {
            let value = level(params, "brightness", 0.0).clamp(-1.0, 1.0);
            vec![Filter::new("eq").arg("brightness", fmt_num(value))]
        }
        EffectType::Contrast => {
            let value = level(params, "contrast", 1.0).clamp(-1000.0, 1000.0);
            vec![Filter::new("eq").arg("contrast", fmt_num(value))]
        }
        EffectType::Saturation => {
            let value = level(params, "saturation", 1.0).clamp(0.0, 3.0);
            vec![Filter::new("eq").arg("saturation", fmt_num(value))]
        }
        EffectType::Speed => speed_filter(params).into_iter().collect(),
        EffectType::PanZoom => pan_zoom_filters(params),
        EffectType::Fade => vec![fade_filter(params, clip)],
        EffectType::Unknown => Vec::new(),
    }
}

/// The effect's level under `value`, or under its own type name.
fn level(params: &Parameters, name: &str, default: f64) -> f64 {
    params
        .number("value")
        .or_else(|| params.number(name))
        .unwrap_or(default)
}

fn speed_filter(params: &Parameters) -> Option<Filter> {
    let rate = params
        .number("value")
        .or_else(|| params.number("speed"))
        .or_else(|| params.number("rate"))
        .unwrap_or(1.0);
    if rate <= 0.0 {
        return None;
    }
    Some(Filter::new("setpts").value(format!("PTS/{}", fmt_num(rate))))
}

fn pan_zoom_filters(params: &Parameters) -> Vec<Filter> {
    let zoom = params.number_or("zoom", 1.0).clamp(1.0, 10.0);
    let pan_x = params.number_or("panX", 0.0).clamp(-1.0, 1.0);
    let pan_y = params.number_or("panY", 0.0).clamp(-1.0, 1.0);

    // pan -1..1 maps to the crop window's left/top edge .. right/bottom edge
    let fx = (1.0 + pan_x) / 2.0;
    let fy = (1.0 + pan_y) / 2.0;
    let zoom = fmt_num(zoom);

    vec![
        Filter::new("scale")
            .arg("w", format!("trunc(iw*{}/2)*2", zoom))
            .arg("h", format!("trunc(ih*{}/2)*2", zoom)),
        Filter::new("crop")
            .arg("w", format!("iw/{}", zoom))
            .arg("h", format!("ih/{}", zoom))
            .arg("x", format!("(iw-ow)*{}", fmt_num(fx)))
            .arg("y", format!("(ih-oh)*{}", fmt_num(fy))),
    ]
}

/// Fade timing is anchored at the clip's absolute timeline start.
fn fade_filter(params: &Parameters, clip: &Clip) -> Filter {
    let fade_out = params
        .text("direction")
        .or_else(|| params.text("type"))
        .is_some_and(|d| d.eq_ignore_ascii_case("out"));

    let mut duration = params.number_or("duration", 1.0).max(0.0);
    if clip.duration > 0.0 {
        duration = duration.min(clip.duration);
    }

    let start = if fade_out {
        clip.start_time + (clip.duration - duration).max(0.0)
    } else {
        clip.start_time
    };

    Filter::new("fade")
        .arg("t", if fade_out { "out" } else { "in" })
        .arg("st", fmt_num(start))
        .arg("d", fmt_num(duration))
}
