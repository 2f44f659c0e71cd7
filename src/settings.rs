//! Persisted bracket configuration.
//!
//! A single [`Settings`] record lives under [`STORAGE_KEY`](crate::config::STORAGE_KEY).
//! Every value handed out by this crate has gone through [`Settings::clamped`]:
//! updates arrive as a [`SettingsPatch`], get merged onto the current value and
//! are clamped before anyone downstream can observe them.

use crate::config::*;
use crate::utils::{clamp_range, parse_hex_color};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Top of the reading band, percent of viewport height.
    pub top_offset: f64,
    /// Height of the reading band, percent of viewport height.
    pub bracket_height: f64,
    /// Left margin, percent from the left viewport edge.
    pub left_position: f64,
    /// Right margin, percent from the right viewport edge.
    pub right_position: f64,

    pub side_shading_enabled: bool,
    pub bracket_lines_enabled: bool,

    pub shading_color: String,
    pub shading_opacity: f64,
    pub side_color: String,
    pub side_opacity: f64,
    pub bracket_color: String,
    /// Bracket line width in pixels.
    #[serde(deserialize_with = "deserialize_pixels")]
    pub bracket_width: u32,

    pub auto_detect_enabled: bool,
    pub last_detected_left: Option<f64>,
    pub last_detected_right: Option<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            top_offset: DEFAULT_TOP_OFFSET,
            bracket_height: DEFAULT_BRACKET_HEIGHT,
            left_position: DEFAULT_SIDE_POSITION,
            right_position: DEFAULT_SIDE_POSITION,
            side_shading_enabled: true,
            bracket_lines_enabled: true,
            shading_color: DEFAULT_SHADING_COLOR.to_string(),
            shading_opacity: DEFAULT_SHADING_OPACITY,
            side_color: DEFAULT_SHADING_COLOR.to_string(),
            side_opacity: DEFAULT_SHADING_OPACITY,
            bracket_color: DEFAULT_BRACKET_COLOR.to_string(),
            bracket_width: DEFAULT_BRACKET_WIDTH,
            auto_detect_enabled: true,
            last_detected_left: None,
            last_detected_right: None,
        }
    }
}

/// Storage may hand back `7` or `7.0` depending on who wrote it last.
fn deserialize_pixels<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.is_finite() {
        Ok(raw.round().clamp(0.0, u32::MAX as f64) as u32)
    } else {
        Ok(DEFAULT_BRACKET_WIDTH)
    }
}

/// Keep `current` unless `candidate` is a valid hex color.
fn sanitize_color(field: &str, candidate: &str, fallback: &str) -> String {
    match parse_hex_color(candidate) {
        Some(color) => color,
        None => {
            warn!("Ignoring invalid {} value {:?}", field, candidate);
            fallback.to_string()
        }
    }
}

impl Settings {
    /// Decode a persisted record. Missing fields take their defaults, and so
    /// does any field whose stored value has the wrong shape; the rest of the
    /// record is kept.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let stored = match value {
            serde_json::Value::Object(map) => map,
            other => return serde_json::from_value::<Settings>(other).map(Settings::clamped),
        };

        let mut accepted = serde_json::Map::new();
        for (key, field) in stored {
            let mut candidate = accepted.clone();
            candidate.insert(key.clone(), field);
            match serde_json::from_value::<Settings>(serde_json::Value::Object(candidate.clone())) {
                Ok(_) => accepted = candidate,
                Err(e) => warn!("Ignoring stored {} value: {}", key, e),
            }
        }
        serde_json::from_value::<Settings>(serde_json::Value::Object(accepted)).map(Settings::clamped)
    }

    pub fn to_value(&self) -> serde_json::Value {
        // Settings only holds plain scalars and strings
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Force every field into its documented range.
    pub fn clamped(mut self) -> Self {
        let defaults = Settings::default();
        self.top_offset = clamp_range(self.top_offset, TOP_OFFSET_RANGE);
        self.bracket_height = clamp_range(self.bracket_height, BRACKET_HEIGHT_RANGE);
        self.left_position = clamp_range(self.left_position, SIDE_POSITION_RANGE);
        self.right_position = clamp_range(self.right_position, SIDE_POSITION_RANGE);
        self.shading_opacity = clamp_range(self.shading_opacity, OPACITY_RANGE);
        self.side_opacity = clamp_range(self.side_opacity, OPACITY_RANGE);
        self.bracket_width = self.bracket_width.max(MIN_BRACKET_WIDTH);
        self.shading_color =
            sanitize_color("shadingColor", &self.shading_color, &defaults.shading_color);
        self.side_color = sanitize_color("sideColor", &self.side_color, &defaults.side_color);
        self.bracket_color =
            sanitize_color("bracketColor", &self.bracket_color, &defaults.bracket_color);
        self
    }

    /// Shallow-merge `patch` onto a copy of `self`, then clamp.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.top_offset {
            next.top_offset = v;
        }
        if let Some(v) = patch.bracket_height {
            next.bracket_height = v;
        }
        if let Some(v) = patch.left_position {
            next.left_position = v;
        }
        if let Some(v) = patch.right_position {
            next.right_position = v;
        }
        if let Some(v) = patch.side_shading_enabled {
            next.side_shading_enabled = v;
        }
        if let Some(v) = patch.bracket_lines_enabled {
            next.bracket_lines_enabled = v;
        }
        if let Some(v) = &patch.shading_color {
            next.shading_color = sanitize_color("shadingColor", v, &self.shading_color);
        }
        if let Some(v) = patch.shading_opacity {
            next.shading_opacity = v;
        }
        if let Some(v) = &patch.side_color {
            next.side_color = sanitize_color("sideColor", v, &self.side_color);
        }
        if let Some(v) = patch.side_opacity {
            next.side_opacity = v;
        }
        if let Some(v) = &patch.bracket_color {
            next.bracket_color = sanitize_color("bracketColor", v, &self.bracket_color);
        }
        if let Some(v) = patch.bracket_width {
            next.bracket_width = v;
        }
        if let Some(v) = patch.auto_detect_enabled {
            next.auto_detect_enabled = v;
        }
        if let Some(v) = patch.last_detected_left {
            next.last_detected_left = Some(v);
        }
        if let Some(v) = patch.last_detected_right {
            next.last_detected_right = Some(v);
        }
        next.clamped()
    }
}

/// A partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_offset: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bracket_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_position: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_position: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_shading_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bracket_lines_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shading_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shading_opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bracket_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bracket_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_detect_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_detected_left: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_detected_right: Option<f64>,
}

impl SettingsPatch {
    /// Fold a later patch into this one; fields set in `later` win.
    pub fn absorb(&mut self, later: SettingsPatch) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if later.$field.is_some() { self.$field = later.$field; })*
            };
        }
        take!(
            top_offset,
            bracket_height,
            left_position,
            right_position,
            side_shading_enabled,
            bracket_lines_enabled,
            shading_color,
            shading_opacity,
            side_color,
            side_opacity,
            bracket_color,
            bracket_width,
            auto_detect_enabled,
            last_detected_left,
            last_detected_right,
        );
    }

    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }
}
