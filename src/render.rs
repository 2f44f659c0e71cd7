//! Overlay geometry and per-element inline styles.
//!
//! Everything here is a pure function of [`Settings`]; the controller decides
//! which elements exist and the DOM layer only copies these declarations.

use crate::config::*;
use crate::settings::Settings;

/// Named overlay elements owned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    TopShade,
    BottomShade,
    LeftShade,
    RightShade,
    LeftLine,
    RightLine,
    TopHandle,
    BottomHandle,
    CloseButton,
    SettingsButton,
    Panel,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::TopShade,
        Role::BottomShade,
        Role::LeftShade,
        Role::RightShade,
        Role::LeftLine,
        Role::RightLine,
        Role::TopHandle,
        Role::BottomHandle,
        Role::CloseButton,
        Role::SettingsButton,
        Role::Panel,
    ];

    /// DOM id of the element playing this role.
    pub fn element_id(self) -> &'static str {
        match self {
            Role::TopShade => "focus-bracket-top",
            Role::BottomShade => "focus-bracket-bottom",
            Role::LeftShade => "focus-bracket-left-shade",
            Role::RightShade => "focus-bracket-right-shade",
            Role::LeftLine => "focus-bracket-left-line",
            Role::RightLine => "focus-bracket-right-line",
            Role::TopHandle => "focus-bracket-handle-top",
            Role::BottomHandle => "focus-bracket-handle-bottom",
            Role::CloseButton => "focus-bracket-close-btn",
            Role::SettingsButton => "focus-bracket-settings-btn",
            Role::Panel => "focus-bracket-settings-panel",
        }
    }

    /// Text shown inside the element, if any.
    pub fn label(self) -> Option<&'static str> {
        match self {
            Role::CloseButton => Some("×"),
            Role::SettingsButton => Some("⚙"),
            _ => None,
        }
    }

    /// Whether the element receives pointer input.
    pub fn is_interactive(self) -> bool {
        matches!(
            self,
            Role::TopHandle | Role::BottomHandle | Role::CloseButton | Role::SettingsButton
        )
    }
}

/// Visual feedback state of an interactive element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Affordance {
    #[default]
    Idle,
    Hover,
    Active,
}

/// Band geometry in viewport percentages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayGeometry {
    /// Height of the top shade (vh); equals the band's top edge.
    pub top_shade: f64,
    /// Height of the bottom shade (vh); equals the band's distance from the bottom.
    pub bottom_shade: f64,
    pub band_height: f64,
    pub left: f64,
    pub right: f64,
}

impl OverlayGeometry {
    /// The bottom shade never goes negative, even when the band runs off-screen.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            top_shade: settings.top_offset,
            bottom_shade: (100.0 - settings.top_offset - settings.bracket_height).max(0.0),
            band_height: settings.bracket_height,
            left: settings.left_position,
            right: settings.right_position,
        }
    }
}

/// Ordered CSS declarations for one element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    declarations: Vec<(&'static str, String)>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, property: &'static str, value: impl Into<String>) -> Self {
        self.declarations.push((property, value.into()));
        self
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(p, _)| *p == property)
            .map(|(_, v)| v.as_str())
    }

    pub fn declarations(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.declarations.iter().map(|(p, v)| (*p, v.as_str()))
    }

    pub fn to_css(&self) -> String {
        self.declarations
            .iter()
            .map(|(p, v)| format!("{}: {};", p, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn fixed(z_index: u32, interactive: bool) -> Style {
    Style::new()
        .set("position", "fixed")
        .set("z-index", z_index.to_string())
        .set("pointer-events", if interactive { "auto" } else { "none" })
}

fn shade(color: &str, opacity: f64) -> Style {
    fixed(Z_SHADE, false)
        .set("background", color)
        .set("opacity", opacity.to_string())
}

fn line(settings: &Settings, geometry: &OverlayGeometry) -> Style {
    fixed(Z_LINE, false)
        .set("top", format!("{}vh", geometry.top_shade))
        .set("bottom", format!("{}vh", geometry.bottom_shade))
        .set("width", format!("{}px", settings.bracket_width))
        .set("background", settings.bracket_color.as_str())
        .set("box-shadow", format!("0 0 15px {}", settings.bracket_color))
}

fn handle(settings: &Settings, affordance: Affordance) -> Style {
    let opacity = match affordance {
        Affordance::Idle => "0.3",
        Affordance::Hover => "0.8",
        Affordance::Active => "1",
    };
    fixed(Z_CONTROL, true)
        .set("left", "50%")
        .set("transform", "translateX(-50%)")
        .set("width", "60px")
        .set("height", "20px")
        .set("background", settings.bracket_color.as_str())
        .set("border", format!("2px solid {}", settings.bracket_color))
        .set("border-radius", "10px")
        .set("cursor", "ns-resize")
        .set("transition", "opacity 0.2s")
        .set("opacity", opacity)
}

fn button(settings: &Settings, affordance: Affordance) -> Style {
    let opacity = match affordance {
        Affordance::Idle => "0.4",
        Affordance::Hover | Affordance::Active => "1",
    };
    fixed(Z_CONTROL, true)
        .set("top", "10px")
        .set("width", "30px")
        .set("height", "30px")
        .set("background", "rgba(0, 0, 0, 0.7)")
        .set("color", settings.bracket_color.as_str())
        .set("display", "flex")
        .set("align-items", "center")
        .set("justify-content", "center")
        .set("border-radius", "50%")
        .set("cursor", "pointer")
        .set("line-height", "1")
        .set("transition", "opacity 0.2s")
        .set("opacity", opacity)
}

/// Inline style for `role` under `settings`.
pub fn style_for(role: Role, settings: &Settings, affordance: Affordance) -> Style {
    let geometry = OverlayGeometry::from_settings(settings);
    match role {
        Role::TopShade => shade(&settings.shading_color, settings.shading_opacity)
            .set("top", "0")
            .set("left", "0")
            .set("right", "0")
            .set("height", format!("{}vh", geometry.top_shade)),
        Role::BottomShade => shade(&settings.shading_color, settings.shading_opacity)
            .set("bottom", "0")
            .set("left", "0")
            .set("right", "0")
            .set("height", format!("{}vh", geometry.bottom_shade)),
        Role::LeftShade => shade(&settings.side_color, settings.side_opacity)
            .set("top", format!("{}vh", geometry.top_shade))
            .set("height", format!("{}vh", geometry.band_height))
            .set("left", "0")
            .set("width", format!("{}%", geometry.left)),
        Role::RightShade => shade(&settings.side_color, settings.side_opacity)
            .set("top", format!("{}vh", geometry.top_shade))
            .set("height", format!("{}vh", geometry.band_height))
            .set("right", "0")
            .set("width", format!("{}%", geometry.right)),
        Role::LeftLine => line(settings, &geometry).set("left", format!("{}%", geometry.left)),
        Role::RightLine => line(settings, &geometry).set("right", format!("{}%", geometry.right)),
        // Handles sit inside the shaded area, just outside the band
        Role::TopHandle => handle(settings, affordance).set(
            "top",
            format!("calc({}vh - {}px)", geometry.top_shade, HANDLE_INSET_PX),
        ),
        Role::BottomHandle => handle(settings, affordance).set(
            "bottom",
            format!("calc({}vh - {}px)", geometry.bottom_shade, HANDLE_INSET_PX),
        ),
        Role::CloseButton => button(settings, affordance)
            .set("right", "60px")
            .set("font-size", "24px")
            .set("font-weight", "bold"),
        Role::SettingsButton => button(settings, affordance)
            .set("right", "20px")
            .set("font-size", "18px"),
        Role::Panel => fixed(Z_PANEL, true)
            .set("top", "50px")
            .set("right", "20px")
            .set("width", "250px")
            .set("background", "rgba(0, 0, 0, 0.9)")
            .set("color", settings.bracket_color.as_str())
            .set("padding", "20px")
            .set("border-radius", "10px")
            .set("border", format!("2px solid {}", settings.bracket_color))
            .set("font-family", "Arial, sans-serif")
            .set("font-size", "14px"),
    }
}
