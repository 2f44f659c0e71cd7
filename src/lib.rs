//! Focus Reader: a reading-focus overlay for web pages.
//!
//! A horizontal band stays clear while the rest of the page is shaded, so the
//! reader's eye tracks one region of text. The crate is built as the
//! extension's content script (see [`web::run`]); everything below `web` is
//! plain Rust and runs under `cargo test` with in-memory fakes.

pub mod chrome;
pub mod config;
pub mod controller;
pub mod detector;
pub mod hooks;
pub mod messages;
pub mod panel;
pub mod render;
pub mod settings;
pub mod store;
pub mod utils;
pub mod web;

#[cfg(test)]
mod testing;

pub use controller::{Controller, OverlayDom, PanelAction, UiEvent};
pub use detector::{detect_content_bounds, has_layout_changed, DetectionResult, LayoutSource};
pub use messages::{KeyCommand, Message};
pub use settings::{Settings, SettingsPatch};
pub use store::{KeyValueStore, SettingsStore, StoreError, Timer};
