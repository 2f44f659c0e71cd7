//! Yew view for the settings panel.
//!
//! The panel is stateless apart from the width field's text: it renders the
//! settings it is given and reports every change as a [`PanelAction`]. The
//! controller persists the change and pushes fresh props back in.

use crate::controller::PanelAction;
use crate::hooks::use_validated_field;
use crate::settings::Settings;
use crate::utils::validate_bracket_width;
use std::rc::Rc;
use web_sys::HtmlInputElement;
use yew::prelude::*;

const ROW_STYLE: &str = "display: flex; align-items: center; margin-bottom: 10px; cursor: pointer;";
const HEADER_STYLE: &str =
    "display: flex; justify-content: space-between; align-items: center; margin-bottom: 15px;";
const FOOTER_STYLE: &str = "margin-top: 10px; font-size: 11px; opacity: 0.7; text-align: center;";

#[derive(Properties, PartialEq)]
pub struct PanelProps {
    pub settings: Settings,
    pub on_action: Callback<PanelAction>,
}

/// Checkbox row bound to one boolean setting.
#[derive(Properties, PartialEq)]
pub struct ToggleRowProps {
    pub label: AttrValue,
    pub checked: bool,
    pub on_toggle: Callback<bool>,
}

#[function_component(ToggleRow)]
pub fn toggle_row(props: &ToggleRowProps) -> Html {
    let onchange = {
        let on_toggle = props.on_toggle.clone();
        Callback::from(move |e: Event| {
            let input: HtmlInputElement = e.target_unchecked_into();
            on_toggle.emit(input.checked());
        })
    };

    html! {
        <label style={ROW_STYLE}>
            <input type="checkbox"
                checked={props.checked}
                {onchange}
                style="margin-right: 8px;"
            />
            { props.label.clone() }
        </label>
    }
}

#[function_component(SettingsPanel)]
pub fn settings_panel(props: &PanelProps) -> Html {
    let settings = &props.settings;
    let emit = {
        let on_action = props.on_action.clone();
        move |map: fn(bool) -> PanelAction| {
            let on_action = on_action.clone();
            Callback::from(move |checked: bool| on_action.emit(map(checked)))
        }
    };

    let width = use_validated_field(
        settings.bracket_width,
        Rc::new(validate_bracket_width),
        props
            .on_action
            .reform(PanelAction::SetBracketWidth),
    );

    let on_close = props.on_action.reform(|_: MouseEvent| PanelAction::Close);
    let on_reset = props.on_action.reform(|_: MouseEvent| PanelAction::Reset);

    let on_color = {
        let on_action = props.on_action.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            on_action.emit(PanelAction::SetThemeColor(input.value()));
        })
    };

    let on_opacity = {
        let on_action = props.on_action.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            if let Ok(opacity) = input.value().parse::<f64>() {
                on_action.emit(PanelAction::SetShadingOpacity(opacity));
            }
        })
    };

    let accent = settings.bracket_color.clone();

    html! {
        <div class="focus-bracket-panel">
            <div style={HEADER_STYLE}>
                <div style="font-weight: bold; font-size: 16px;">{ "Settings" }</div>
                <button onclick={on_close}
                    style={format!("background: none; border: none; color: {}; font-size: 20px; cursor: pointer; padding: 0; width: 24px; height: 24px;", accent)}>
                    { "×" }
                </button>
            </div>

            <ToggleRow label="Bracket Lines"
                checked={settings.bracket_lines_enabled}
                on_toggle={emit(PanelAction::SetBracketLines)} />
            <ToggleRow label="Side Shading"
                checked={settings.side_shading_enabled}
                on_toggle={emit(PanelAction::SetSideShading)} />
            <ToggleRow label="Auto-detect Margins"
                checked={settings.auto_detect_enabled}
                on_toggle={emit(PanelAction::SetAutoDetect)} />

            <div style="margin-bottom: 10px;">
                <label style="display: block; margin-bottom: 5px;">{ "Theme Color" }</label>
                <input type="color"
                    value={settings.bracket_color.clone()}
                    oninput={on_color}
                    style={format!("width: 100%; height: 30px; border: 1px solid {}; border-radius: 5px; cursor: pointer;", accent)}
                />
            </div>

            <div style="margin-bottom: 10px;">
                <label style="display: block; margin-bottom: 5px;">
                    { format!("Shading Opacity ({:.0}%)", settings.shading_opacity * 100.0) }
                </label>
                <input type="range"
                    min="0"
                    max="1"
                    step="0.05"
                    value={settings.shading_opacity.to_string()}
                    oninput={on_opacity}
                    style="width: 100%;"
                />
            </div>

            <div style="margin-bottom: 10px;">
                <label style="display: block; margin-bottom: 5px;">{ "Bracket Width (px)" }</label>
                <input type="text"
                    value={width.text.clone()}
                    oninput={width.on_text_input.clone()}
                    onchange={width.on_commit.clone()}
                    style="width: 100%; box-sizing: border-box;"
                />
                { if let Some(msg) = &width.error {
                    html! { <div class="focus-bracket-error" style="color: #ff5555; font-size: 11px;">{ msg.clone() }</div> }
                } else { html! {} } }
            </div>

            <button onclick={on_reset}
                style={format!("width: 100%; padding: 8px; margin-top: 15px; background: {}; color: black; border: none; border-radius: 5px; cursor: pointer; font-weight: bold;", accent)}>
                { "Reset to Defaults" }
            </button>

            <div style={FOOTER_STYLE}>
                { "Use Alt+Arrow keys to adjust" }<br />
                { "Drag handles to reposition" }
            </div>
        </div>
    }
}
