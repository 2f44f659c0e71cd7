use crate::config::{MAX_BRACKET_WIDTH, MIN_BRACKET_WIDTH};
use once_cell::sync::Lazy;
use regex::Regex;

// Colors end up inside inline CSS, so only plain hex notation is accepted
static HEX_COLOR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());

/// Clamp `value` into the inclusive `(min, max)` range.
///
/// `NaN` collapses to the lower bound so a bad number can never escape.
#[inline]
pub fn clamp_range(value: f64, (min, max): (f64, f64)) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.max(min).min(max)
    }
}

/// Return the normalized (lower-case) color if `input` is a `#rgb` or `#rrggbb` hex color.
pub fn parse_hex_color(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if HEX_COLOR_REGEX.is_match(trimmed) {
        Some(trimmed.to_ascii_lowercase())
    } else {
        None
    }
}

/// Generic numeric input validation
pub fn validate_numeric_input<T>(
    input: &str,
    min: Option<T>,
    max: Option<T>,
    field_name: &str,
) -> Result<T, String>
where
    T: std::str::FromStr + std::fmt::Display + PartialOrd,
{
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(format!("{} cannot be empty", field_name));
    }

    match trimmed.parse::<T>() {
        Ok(val) => {
            if let Some(min_val) = min {
                if val < min_val {
                    return Err(format!("{} must be at least {}", field_name, min_val));
                }
            }
            if let Some(max_val) = max {
                if val > max_val {
                    return Err(format!("{} cannot exceed {}", field_name, max_val));
                }
            }
            Ok(val)
        }
        Err(_) => Err(format!("{} must be a valid number", field_name)),
    }
}

/// Validate bracket width input (pixels)
pub fn validate_bracket_width(input: &str) -> Result<u32, String> {
    validate_numeric_input(
        input,
        Some(MIN_BRACKET_WIDTH),
        Some(MAX_BRACKET_WIDTH),
        "Bracket width",
    )
}
