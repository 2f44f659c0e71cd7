//! In-crate fakes for the storage, timer, layout and DOM boundaries.

use crate::controller::OverlayDom;
use crate::detector::{LayoutSource, TextBlock, Viewport};
use crate::render::{Role, Style};
use crate::settings::Settings;
use crate::store::{ChangeListener, KeyValueStore, StoreError, Timer};
use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Every sleep completes at once.
#[derive(Clone, Copy, Default)]
pub struct ImmediateTimer;

impl Timer for ImmediateTimer {
    fn sleep(&self, _ms: u32) -> LocalBoxFuture<'static, ()> {
        future::ready(()).boxed_local()
    }
}

/// Sleeps complete only when the test fires them.
#[derive(Clone, Default)]
pub struct ManualTimer {
    sleepers: Rc<RefCell<Vec<oneshot::Sender<()>>>>,
}

impl ManualTimer {
    /// Sleeps still being awaited.
    pub fn pending(&self) -> usize {
        self.sleepers
            .borrow()
            .iter()
            .filter(|tx| !tx.is_canceled())
            .count()
    }

    pub fn fire_all(&self) {
        for tx in self.sleepers.borrow_mut().drain(..) {
            let _ = tx.send(());
        }
    }
}

impl Timer for ManualTimer {
    fn sleep(&self, _ms: u32) -> LocalBoxFuture<'static, ()> {
        let (tx, rx) = oneshot::channel();
        self.sleepers.borrow_mut().push(tx);
        rx.map(|_| ()).boxed_local()
    }
}

/// Backend whose every call fails.
#[derive(Clone, Copy, Default)]
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> LocalBoxFuture<'static, Result<Option<Value>, StoreError>> {
        future::ready(Err(StoreError::Host("quota exceeded".into()))).boxed_local()
    }

    fn set(&self, _key: &str, _value: Value) -> LocalBoxFuture<'static, Result<(), StoreError>> {
        future::ready(Err(StoreError::Host("quota exceeded".into()))).boxed_local()
    }

    fn subscribe(&self, _key: &str, _listener: ChangeListener) {}
}

/// Backend whose reads never answer.
#[derive(Clone, Default)]
pub struct StalledStore {
    writes: Rc<Cell<usize>>,
}

impl StalledStore {
    pub fn write_attempts(&self) -> usize {
        self.writes.get()
    }
}

impl KeyValueStore for StalledStore {
    fn get(&self, _key: &str) -> LocalBoxFuture<'static, Result<Option<Value>, StoreError>> {
        future::pending().boxed_local()
    }

    fn set(&self, _key: &str, _value: Value) -> LocalBoxFuture<'static, Result<(), StoreError>> {
        self.writes.set(self.writes.get() + 1);
        future::ready(Ok(())).boxed_local()
    }

    fn subscribe(&self, _key: &str, _listener: ChangeListener) {}
}

/// Fixed page geometry keyed by selector; unknown selectors match nothing.
#[derive(Clone)]
pub struct FakeLayout {
    viewport: Viewport,
    blocks: HashMap<String, Vec<TextBlock>>,
}

impl FakeLayout {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            viewport: Viewport { width, height },
            blocks: HashMap::new(),
        }
    }

    pub fn with(mut self, selector: &str, blocks: Vec<TextBlock>) -> Self {
        self.blocks.insert(selector.to_string(), blocks);
        self
    }
}

impl LayoutSource for FakeLayout {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn select(&self, selector: &str) -> Vec<TextBlock> {
        self.blocks.get(selector).cloned().unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct FakeElement {
    id: usize,
    role: Role,
}

#[derive(Default)]
struct DomLog {
    next_id: usize,
    attached: HashMap<usize, Role>,
    creates: HashMap<Role, usize>,
    styles: HashMap<Role, Style>,
    style_counts: HashMap<Role, usize>,
    panel_settings: Option<Settings>,
}

/// Records what the controller does to the page.
#[derive(Clone)]
pub struct FakeDom {
    viewport_height: f64,
    log: Rc<RefCell<DomLog>>,
}

impl FakeDom {
    pub fn new(viewport_height: f64) -> Self {
        Self {
            viewport_height,
            log: Rc::new(RefCell::new(DomLog::default())),
        }
    }

    pub fn is_attached(&self, role: Role) -> bool {
        self.log.borrow().attached.values().any(|r| *r == role)
    }

    pub fn attached_count(&self) -> usize {
        self.log.borrow().attached.len()
    }

    pub fn create_count(&self, role: Role) -> usize {
        self.log.borrow().creates.get(&role).copied().unwrap_or(0)
    }

    pub fn style_count(&self, role: Role) -> usize {
        self.log.borrow().style_counts.get(&role).copied().unwrap_or(0)
    }

    /// Last value applied to `property` on the element for `role`.
    pub fn style_of(&self, role: Role, property: &str) -> Option<String> {
        self.log
            .borrow()
            .styles
            .get(&role)
            .and_then(|s| s.get(property).map(str::to_string))
    }

    pub fn panel_settings(&self) -> Option<Settings> {
        self.log.borrow().panel_settings.clone()
    }
}

impl OverlayDom for FakeDom {
    type Element = FakeElement;

    fn create(&self, role: Role) -> Option<FakeElement> {
        let mut log = self.log.borrow_mut();
        log.next_id += 1;
        let id = log.next_id;
        log.attached.insert(id, role);
        *log.creates.entry(role).or_default() += 1;
        Some(FakeElement { id, role })
    }

    fn apply_style(&self, element: &FakeElement, style: &Style) {
        let mut log = self.log.borrow_mut();
        log.styles.insert(element.role, style.clone());
        *log.style_counts.entry(element.role).or_default() += 1;
    }

    fn remove(&self, element: FakeElement) {
        self.log.borrow_mut().attached.remove(&element.id);
    }

    fn sync_panel(&self, _element: &mut FakeElement, settings: &Settings) {
        self.log.borrow_mut().panel_settings = Some(settings.clone());
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }
}
