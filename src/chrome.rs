//! JavaScript interop for the extension host APIs.
//! Every binding is `catch`, so a page without `chrome.*` yields an `Err`
//! instead of an uncaught exception.

use js_sys::{global, Promise, Reflect};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = get)]
    pub fn storage_sync_get(keys: &str) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = set)]
    pub fn storage_sync_set(items: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "onChanged"], js_name = addListener)]
    pub fn storage_on_changed(listener: &Closure<dyn FnMut(JsValue, String)>) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "runtime", "onMessage"], js_name = addListener)]
    pub fn runtime_on_message(listener: &Closure<dyn FnMut(JsValue)>) -> Result<(), JsValue>;
}

fn lookup(target: &JsValue, path: &[&str]) -> Option<JsValue> {
    let mut current = target.clone();
    for key in path {
        current = Reflect::get(&current, &JsValue::from_str(key)).ok()?;
        if current.is_undefined() || current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// Whether `chrome.storage.sync` exists in this context.
pub fn storage_available() -> bool {
    lookup(&global(), &["chrome", "storage", "sync"]).is_some()
}

/// Best-effort text for a thrown JavaScript value.
pub fn describe(error: &JsValue) -> String {
    if let Some(text) = error.as_string() {
        return text;
    }
    lookup(error, &["message"])
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}
