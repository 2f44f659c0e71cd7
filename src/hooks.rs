use std::rc::Rc;
use web_sys::HtmlInputElement;
use yew::prelude::*;

/// Text state and callbacks for a field that only reports valid values.
#[derive(Clone)]
pub struct ValidatedField {
    /// What the user currently sees in the input.
    pub text: String,
    /// Validation message from the last commit, if it failed.
    pub error: Option<String>,
    /// Attach to `oninput`: tracks the raw text.
    pub on_text_input: Callback<InputEvent>,
    /// Attach to `onchange`: validates and, on success, emits the value.
    pub on_commit: Callback<Event>,
}

/// Hook for a text input bound to a typed, validated value.
///
/// `value` is the committed value owned by the caller; when it changes from
/// outside (another page, a reset) the text follows it.
#[hook]
pub fn use_validated_field<T>(
    value: T,
    parse_and_validate: Rc<dyn Fn(&str) -> Result<T, String>>,
    on_valid: Callback<T>,
) -> ValidatedField
where
    T: Clone + PartialEq + std::fmt::Display + 'static,
{
    let initial_text = value.to_string();
    let text = use_state_eq(move || initial_text);
    let error = use_state_eq(|| None::<String>);

    {
        let text = text.clone();
        let error = error.clone();
        use_effect_with(value, move |committed| {
            text.set(committed.to_string());
            error.set(None);
            || ()
        });
    }

    let on_text_input = {
        let text = text.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            text.set(input.value());
        })
    };

    let on_commit = {
        let text = text.clone();
        let error = error.clone();
        Callback::from(move |e: Event| {
            let input: HtmlInputElement = e.target_unchecked_into();
            match parse_and_validate(&input.value()) {
                Ok(parsed) => {
                    // Show the canonical form, e.g. " 7" -> "7"
                    text.set(parsed.to_string());
                    error.set(None);
                    on_valid.emit(parsed);
                }
                Err(msg) => error.set(Some(msg)),
            }
        })
    };

    ValidatedField {
        text: (*text).clone(),
        error: (*error).clone(),
        on_text_input,
        on_commit,
    }
}
