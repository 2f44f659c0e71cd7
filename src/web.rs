//! Browser implementations of the storage, timer, layout and DOM boundaries,
//! plus the content-script wiring.

use crate::chrome;
use crate::config::STORAGE_AREA;
use crate::controller::{Controller, DragAxis, OverlayDom, PanelAction, UiEvent};
use crate::detector::{
    detect_content_bounds, has_layout_changed, DetectionResult, LayoutSource, TextBlock, Viewport,
};
use crate::messages::{dispatch, Inbound, Message};
use crate::panel::{PanelProps, SettingsPanel};
use crate::render::{Role, Style};
use crate::settings::Settings;
use crate::store::{ChangeListener, KeyValueStore, MemoryStore, SettingsStore, StoreError, Timer};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::future::{FutureExt, LocalBoxFuture};
use gloo_timers::future::TimeoutFuture;
use js_sys::Reflect;
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Document, Element, HtmlElement, MouseEvent, Window};
use yew::{AppHandle, Callback};

fn host_error(err: JsValue) -> StoreError {
    StoreError::Host(chrome::describe(&err))
}

/// `chrome.storage.sync`.
#[derive(Clone, Copy, Default)]
pub struct ChromeStorage;

impl KeyValueStore for ChromeStorage {
    fn get(&self, key: &str) -> LocalBoxFuture<'static, Result<Option<Value>, StoreError>> {
        let key = key.to_string();
        async move {
            let promise = chrome::storage_sync_get(&key).map_err(host_error)?;
            let items = JsFuture::from(promise).await.map_err(host_error)?;
            let raw = Reflect::get(&items, &JsValue::from_str(&key)).map_err(host_error)?;
            if raw.is_undefined() || raw.is_null() {
                return Ok(None);
            }
            serde_wasm_bindgen::from_value::<Value>(raw)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string()))
        }
        .boxed_local()
    }

    fn set(&self, key: &str, value: Value) -> LocalBoxFuture<'static, Result<(), StoreError>> {
        let mut items = serde_json::Map::new();
        items.insert(key.to_string(), value);
        async move {
            // Plain objects, not JS `Map`s, or storage drops the fields
            let js_items = Value::Object(items)
                .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            let promise = chrome::storage_sync_set(&js_items).map_err(host_error)?;
            JsFuture::from(promise).await.map_err(host_error)?;
            Ok(())
        }
        .boxed_local()
    }

    fn subscribe(&self, key: &str, listener: ChangeListener) {
        let key = key.to_string();
        let closure = Closure::<dyn FnMut(JsValue, String)>::new(move |changes: JsValue, area: String| {
            if area != STORAGE_AREA {
                return;
            }
            let change = match Reflect::get(&changes, &JsValue::from_str(&key)) {
                Ok(change) if !change.is_undefined() => change,
                _ => return,
            };
            let new_value = Reflect::get(&change, &JsValue::from_str("newValue"))
                .unwrap_or(JsValue::UNDEFINED);
            if new_value.is_undefined() {
                return;
            }
            match serde_wasm_bindgen::from_value::<Value>(new_value) {
                Ok(value) => listener(value),
                Err(e) => warn!("Ignoring undecodable storage change: {}", e),
            }
        });
        if let Err(e) = chrome::storage_on_changed(&closure) {
            warn!("Storage change feed unavailable: {}", chrome::describe(&e));
        }
        // Lives as long as the page
        closure.forget();
    }
}

#[derive(Clone, Copy, Default)]
pub struct GlooTimer;

impl Timer for GlooTimer {
    fn sleep(&self, ms: u32) -> LocalBoxFuture<'static, ()> {
        TimeoutFuture::new(ms).boxed_local()
    }
}

// ──────────────────────────────────────────────────────────────────────────────

fn viewport_of(window: &Window) -> Viewport {
    let read = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    Viewport {
        width: read(window.inner_width()),
        height: read(window.inner_height()),
    }
}

/// Live layout of the current document.
pub struct DocumentLayout {
    window: Window,
    document: Document,
}

impl DocumentLayout {
    pub fn from_page() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self { window, document })
    }
}

impl LayoutSource for DocumentLayout {
    fn viewport(&self) -> Viewport {
        viewport_of(&self.window)
    }

    fn select(&self, selector: &str) -> Vec<TextBlock> {
        let Ok(nodes) = self.document.query_selector_all(selector) else {
            return Vec::new();
        };
        (0..nodes.length())
            .filter_map(|i| nodes.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .map(|element| {
                let rect = element.get_bounding_client_rect();
                let text_len = element
                    .text_content()
                    .map(|text| text.trim().chars().count())
                    .unwrap_or(0);
                TextBlock {
                    left: rect.left(),
                    top: rect.top(),
                    width: rect.width(),
                    height: rect.height(),
                    text_len,
                }
            })
            .collect()
    }
}

// ──────────────────────────────────────────────────────────────────────────────

type MouseListener = Closure<dyn FnMut(MouseEvent)>;

pub struct DomElement {
    node: HtmlElement,
    _listeners: Vec<MouseListener>,
    panel: Option<AppHandle<SettingsPanel>>,
}

/// Creates overlay elements under `<body>` and forwards their input to the
/// controller's inbox.
pub struct DomOverlay {
    window: Window,
    document: Document,
    inbox: UnboundedSender<Inbound>,
    on_panel_action: Callback<PanelAction>,
}

impl DomOverlay {
    pub fn new(inbox: UnboundedSender<Inbound>) -> Self {
        let on_panel_action = {
            let inbox = inbox.clone();
            Callback::from(move |action: PanelAction| {
                let _ = inbox.unbounded_send(Inbound::Ui(UiEvent::Panel(action)));
            })
        };
        Self {
            window: gloo_utils::window(),
            document: gloo_utils::document(),
            inbox,
            on_panel_action,
        }
    }

    fn listen(
        &self,
        node: &HtmlElement,
        event: &str,
        to_event: impl Fn(&MouseEvent) -> UiEvent + 'static,
    ) -> Option<MouseListener> {
        let inbox = self.inbox.clone();
        let listener = Closure::<dyn FnMut(MouseEvent)>::new(move |e: MouseEvent| {
            let _ = inbox.unbounded_send(Inbound::Ui(to_event(&e)));
        });
        node.add_event_listener_with_callback(event, listener.as_ref().unchecked_ref())
            .ok()?;
        Some(listener)
    }

    fn wire(&self, role: Role, node: &HtmlElement) -> Vec<MouseListener> {
        if !role.is_interactive() {
            return Vec::new();
        }
        let mut listeners = vec![
            self.listen(node, "mouseenter", move |_| UiEvent::Hover { role, inside: true }),
            self.listen(node, "mouseleave", move |_| UiEvent::Hover { role, inside: false }),
        ];
        if DragAxis::for_handle(role).is_some() {
            listeners.push(self.listen(node, "mousedown", move |e| {
                e.prevent_default();
                UiEvent::PointerDown {
                    role,
                    y: e.client_y() as f64,
                }
            }));
        } else {
            listeners.push(self.listen(node, "click", move |_| UiEvent::Click(role)));
        }
        listeners.into_iter().flatten().collect()
    }
}

impl OverlayDom for DomOverlay {
    type Element = DomElement;

    fn create(&self, role: Role) -> Option<DomElement> {
        let node = self
            .document
            .create_element("div")
            .ok()?
            .dyn_into::<HtmlElement>()
            .ok()?;
        node.set_id(role.element_id());
        if let Some(label) = role.label() {
            node.set_text_content(Some(label));
        }
        let listeners = self.wire(role, &node);
        self.document.body()?.append_child(&node).ok()?;
        Some(DomElement {
            node,
            _listeners: listeners,
            panel: None,
        })
    }

    fn apply_style(&self, element: &DomElement, style: &Style) {
        let css = element.node.style();
        for (property, value) in style.declarations() {
            let _ = css.set_property(property, value);
        }
    }

    fn remove(&self, element: DomElement) {
        if let Some(panel) = element.panel {
            panel.destroy();
        }
        element.node.remove();
    }

    fn sync_panel(&self, element: &mut DomElement, settings: &Settings) {
        let props = PanelProps {
            settings: settings.clone(),
            on_action: self.on_panel_action.clone(),
        };
        match element.panel.as_mut() {
            Some(handle) => handle.update(props),
            None => {
                let root: Element = element.node.clone().into();
                element.panel =
                    Some(yew::Renderer::<SettingsPanel>::with_root_and_props(root, props).render());
            }
        }
    }

    fn viewport_height(&self) -> f64 {
        viewport_of(&self.window).height
    }
}

// ──────────────────────────────────────────────────────────────────────────────

/// Forward `chrome.runtime.onMessage` into the inbox.
fn listen_for_messages(inbox: UnboundedSender<Inbound>) {
    let listener = Closure::<dyn FnMut(JsValue)>::new(move |raw: JsValue| {
        match serde_wasm_bindgen::from_value::<Message>(raw) {
            Ok(message) => {
                let _ = inbox.unbounded_send(Inbound::Host(message));
            }
            Err(e) => warn!("Focus Reader: ignoring unrecognized message: {}", e),
        }
    });
    if let Err(e) = chrome::runtime_on_message(&listener) {
        error!("Focus Reader: cannot receive messages: {}", chrome::describe(&e));
    }
    listener.forget();
}

/// Drag tracking follows the pointer anywhere on the page.
fn listen_for_pointer(inbox: UnboundedSender<Inbound>) {
    let document = gloo_utils::document();
    let moves = {
        let inbox = inbox.clone();
        Closure::<dyn FnMut(MouseEvent)>::new(move |e: MouseEvent| {
            let _ = inbox.unbounded_send(Inbound::Ui(UiEvent::PointerMove {
                y: e.client_y() as f64,
            }));
        })
    };
    let ups = Closure::<dyn FnMut(MouseEvent)>::new(move |_: MouseEvent| {
        let _ = inbox.unbounded_send(Inbound::Ui(UiEvent::PointerUp));
    });
    let _ = document.add_event_listener_with_callback("mousemove", moves.as_ref().unchecked_ref());
    let _ = document.add_event_listener_with_callback("mouseup", ups.as_ref().unchecked_ref());
    moves.forget();
    ups.forget();
}

fn start<K: KeyValueStore + 'static>(
    backend: K,
    inbox: UnboundedSender<Inbound>,
    outbox: UnboundedReceiver<Inbound>,
) {
    let store = Rc::new(SettingsStore::new(backend, GlooTimer));
    let layout = DocumentLayout::from_page().map(|l| Box::new(l) as Box<dyn LayoutSource>);
    let controller = Controller::new(store, DomOverlay::new(inbox.clone()), layout);

    listen_for_messages(inbox.clone());
    listen_for_pointer(inbox);

    let init = controller.clone();
    spawn_local(async move { init.initialize().await });
    spawn_local(dispatch(controller, outbox));
}

/// Wire the content script into the page.
pub fn run() {
    let (inbox, outbox) = mpsc::unbounded();
    if chrome::storage_available() {
        start(ChromeStorage, inbox, outbox);
    } else {
        warn!("Focus Reader: chrome.storage unavailable, settings will not persist");
        start(MemoryStore::new(), inbox, outbox);
    }
    info!("Focus Reader: content script loaded");
}

/// Run detection on the live page; `null` when no trustworthy column exists.
#[wasm_bindgen(js_name = detectContentBounds)]
pub fn detect_content_bounds_js() -> JsValue {
    DocumentLayout::from_page()
        .and_then(|layout| detect_content_bounds(&layout))
        .and_then(|result| serde_wasm_bindgen::to_value(&result).ok())
        .unwrap_or(JsValue::NULL)
}

/// Whether the page's column moved noticeably since `previous`
/// (a `{leftPercent, rightPercent}` object, `confidence` optional, or `null`).
#[wasm_bindgen(js_name = hasLayoutChanged)]
pub fn has_layout_changed_js(previous: JsValue) -> bool {
    let previous: Option<DetectionResult> = serde_wasm_bindgen::from_value(previous).unwrap_or(None);
    match DocumentLayout::from_page() {
        Some(layout) => has_layout_changed(&layout, previous.as_ref()),
        None => false,
    }
}
