//! Overlay controller: owns the overlay elements and keeps them in step with
//! the settings store.
//!
//! The controller is an explicit object, one per page, shared as
//! `Rc<Controller<..>>` with every event handler. It never holds a `RefCell`
//! borrow across an `.await`, so store callbacks can re-enter it safely.

use crate::config::{BRACKET_HEIGHT_RANGE, MOVE_STEP, RESIZE_STEP, TOP_OFFSET_RANGE};
use crate::detector::{detect_content_bounds, LayoutSource};
use crate::messages::{Inbound, KeyCommand, Message};
use crate::render::{style_for, Affordance, Role, Style};
use crate::settings::{Settings, SettingsPatch};
use crate::store::{KeyValueStore, SettingsStore, Timer};
use crate::utils::clamp_range;
use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// DOM capabilities the controller needs. Elements are owned by the
/// controller once created and handed back for removal.
pub trait OverlayDom {
    type Element;

    /// Create and attach the element for `role`, or `None` if the page
    /// cannot host it.
    fn create(&self, role: Role) -> Option<Self::Element>;
    fn apply_style(&self, element: &Self::Element, style: &Style);
    /// Detach `element`; must tolerate elements already gone from the page.
    fn remove(&self, element: Self::Element);
    /// Refresh the settings panel's controls from `settings`.
    fn sync_panel(&self, element: &mut Self::Element, settings: &Settings);
    fn viewport_height(&self) -> f64;
}

/// Which field a drag adjusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAxis {
    /// Top handle: moves the band (`topOffset`).
    Move,
    /// Bottom handle: resizes the band (`bracketHeight`).
    Resize,
}

impl DragAxis {
    pub fn for_handle(role: Role) -> Option<Self> {
        match role {
            Role::TopHandle => Some(DragAxis::Move),
            Role::BottomHandle => Some(DragAxis::Resize),
            _ => None,
        }
    }

    pub fn handle(self) -> Role {
        match self {
            DragAxis::Move => Role::TopHandle,
            DragAxis::Resize => Role::BottomHandle,
        }
    }

    fn range(self) -> (f64, f64) {
        match self {
            DragAxis::Move => TOP_OFFSET_RANGE,
            DragAxis::Resize => BRACKET_HEIGHT_RANGE,
        }
    }

    fn read(self, settings: &Settings) -> f64 {
        match self {
            DragAxis::Move => settings.top_offset,
            DragAxis::Resize => settings.bracket_height,
        }
    }

    fn write(self, settings: &mut Settings, value: f64) {
        match self {
            DragAxis::Move => settings.top_offset = value,
            DragAxis::Resize => settings.bracket_height = value,
        }
    }
}

/// An in-progress drag. `value` is the local, unpersisted result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub axis: DragAxis,
    pub start_pointer_y: f64,
    pub start_value: f64,
    pub value: f64,
}

/// User input routed to the controller by the DOM layer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    PointerDown { role: Role, y: f64 },
    PointerMove { y: f64 },
    PointerUp,
    Hover { role: Role, inside: bool },
    Click(Role),
    Panel(PanelAction),
}

/// Field-level controls of the settings panel.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelAction {
    SetBracketLines(bool),
    SetSideShading(bool),
    SetAutoDetect(bool),
    SetThemeColor(String),
    SetShadingOpacity(f64),
    SetBracketWidth(u32),
    Reset,
    Close,
}

/// Runtime-only overlay state.
pub struct OverlayState<E> {
    pub active: bool,
    elements: BTreeMap<Role, E>,
    drag: Option<DragSession>,
    hovered: Option<Role>,
}

impl<E> Default for OverlayState<E> {
    fn default() -> Self {
        Self {
            active: false,
            elements: BTreeMap::new(),
            drag: None,
            hovered: None,
        }
    }
}

impl<E> OverlayState<E> {
    fn affordance(&self, role: Role) -> Affordance {
        match (self.drag, self.hovered) {
            (Some(drag), _) if drag.axis.handle() == role => Affordance::Active,
            (_, Some(hovered)) if hovered == role => Affordance::Hover,
            _ => Affordance::Idle,
        }
    }
}

/// Single-resolution "initialization finished" signal.
pub struct Readiness {
    trigger: RefCell<Option<oneshot::Sender<()>>>,
    signal: Shared<oneshot::Receiver<()>>,
}

impl Default for Readiness {
    fn default() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            trigger: RefCell::new(Some(tx)),
            signal: rx.shared(),
        }
    }
}

impl Readiness {
    pub fn mark_ready(&self) {
        if let Some(tx) = self.trigger.borrow_mut().take() {
            let _ = tx.send(());
        }
    }

    pub fn is_ready(&self) -> bool {
        self.trigger.borrow().is_none()
    }

    pub async fn wait(&self) {
        let _ = self.signal.clone().await;
    }
}

/// Roles that must exist while the overlay is active, panel excluded.
fn wanted_roles(settings: &Settings) -> Vec<Role> {
    let mut roles = vec![Role::TopShade, Role::BottomShade];
    if settings.side_shading_enabled {
        roles.extend([Role::LeftShade, Role::RightShade]);
    }
    if settings.bracket_lines_enabled {
        roles.extend([Role::LeftLine, Role::RightLine]);
    }
    roles.extend([
        Role::TopHandle,
        Role::BottomHandle,
        Role::CloseButton,
        Role::SettingsButton,
    ]);
    roles
}

pub struct Controller<K, T, D: OverlayDom> {
    store: Rc<SettingsStore<K, T>>,
    dom: D,
    layout: Option<Box<dyn LayoutSource>>,
    settings: RefCell<Settings>,
    state: RefCell<OverlayState<D::Element>>,
    ready: Readiness,
}

impl<K, T, D> Controller<K, T, D>
where
    K: KeyValueStore + 'static,
    T: Timer + 'static,
    D: OverlayDom + 'static,
{
    pub fn new(
        store: Rc<SettingsStore<K, T>>,
        dom: D,
        layout: Option<Box<dyn LayoutSource>>,
    ) -> Rc<Self> {
        Rc::new(Self {
            store,
            dom,
            layout,
            settings: RefCell::new(Settings::default()),
            state: RefCell::new(OverlayState::default()),
            ready: Readiness::default(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    /// Current settings as last loaded or saved (drag previews excluded).
    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    pub fn drag_session(&self) -> Option<DragSession> {
        self.state.borrow().drag
    }

    pub fn has_element(&self, role: Role) -> bool {
        self.state.borrow().elements.contains_key(&role)
    }

    /// Load settings, wire the change feed and release queued messages.
    pub async fn initialize(self: &Rc<Self>) {
        info!("Focus Reader: initializing");
        let loaded = self.store.load().await;
        *self.settings.borrow_mut() = loaded;

        let weak = Rc::downgrade(self);
        self.store.subscribe_to_changes(move |settings| {
            if let Some(controller) = weak.upgrade() {
                controller.apply_external(settings);
            }
        });

        if self.layout.is_none() {
            warn!("Auto-detect not available: page layout cannot be read");
        }

        self.ready.mark_ready();
        info!("Focus Reader: initialization complete");
    }

    /// Process one inbound item once initialization has finished.
    pub async fn handle(&self, inbound: Inbound) {
        self.ready.wait().await;
        match inbound {
            Inbound::Host(Message::Toggle) => self.toggle().await,
            Inbound::Host(Message::KeyboardCommand { command }) => {
                self.keyboard_command(command).await
            }
            Inbound::Ui(event) => self.ui_event(event).await,
        }
    }

    pub async fn toggle(&self) {
        if self.is_active() {
            self.deactivate();
        } else {
            self.activate().await;
        }
    }

    async fn activate(&self) {
        debug!("Focus Reader: activating overlay");
        let mut settings = self.store.load().await;
        if settings.auto_detect_enabled {
            if let Some(patch) = self.detect_patch() {
                settings = self.store.save(patch, true).await;
            }
        }
        *self.settings.borrow_mut() = settings;
        self.state.borrow_mut().active = true;
        self.render();
    }

    /// Remove every element held, tolerating ones already gone.
    pub fn deactivate(&self) {
        debug!("Focus Reader: removing overlay");
        let elements = {
            let mut state = self.state.borrow_mut();
            state.active = false;
            state.drag = None;
            state.hovered = None;
            std::mem::take(&mut state.elements)
        };
        for (_, element) in elements {
            self.dom.remove(element);
        }
    }

    fn detect_patch(&self) -> Option<SettingsPatch> {
        let Some(layout) = self.layout.as_deref() else {
            warn!("Auto-detect not available, skipping");
            return None;
        };
        let detected = detect_content_bounds(layout)?;
        Some(SettingsPatch {
            left_position: Some(detected.left_percent.round()),
            right_position: Some(detected.right_percent.round()),
            last_detected_left: Some(detected.left_percent),
            last_detected_right: Some(detected.right_percent),
            ..Default::default()
        })
    }

    /// Adopt settings written by another context.
    pub fn apply_external(&self, settings: Settings) {
        if *self.settings.borrow() == settings {
            return;
        }
        debug!("Focus Reader: settings changed elsewhere");
        *self.settings.borrow_mut() = settings;
        self.render();
    }

    pub async fn keyboard_command(&self, command: KeyCommand) {
        if !self.is_active() {
            return;
        }
        let current = self.settings();
        let patch = match command {
            KeyCommand::MoveUp => SettingsPatch {
                top_offset: Some(current.top_offset - MOVE_STEP),
                ..Default::default()
            },
            KeyCommand::MoveDown => SettingsPatch {
                top_offset: Some(current.top_offset + MOVE_STEP),
                ..Default::default()
            },
            KeyCommand::ResizeTaller => SettingsPatch {
                bracket_height: Some(current.bracket_height + RESIZE_STEP),
                ..Default::default()
            },
            KeyCommand::ResizeShorter => SettingsPatch {
                bracket_height: Some(current.bracket_height - RESIZE_STEP),
                ..Default::default()
            },
            KeyCommand::Unknown => {
                debug!("Focus Reader: ignoring unknown keyboard command");
                return;
            }
        };
        self.commit(patch).await;
    }

    pub async fn ui_event(&self, event: UiEvent) {
        match event {
            UiEvent::PointerDown { role, y } => self.pointer_down(role, y),
            UiEvent::PointerMove { y } => self.pointer_move(y),
            UiEvent::PointerUp => self.pointer_up().await,
            UiEvent::Hover { role, inside } => self.hover(role, inside),
            UiEvent::Click(Role::CloseButton) => self.deactivate(),
            UiEvent::Click(Role::SettingsButton) => self.toggle_panel(),
            UiEvent::Click(_) => {}
            UiEvent::Panel(action) => self.panel_action(action).await,
        }
    }

    pub fn pointer_down(&self, role: Role, y: f64) {
        let Some(axis) = DragAxis::for_handle(role) else {
            return;
        };
        {
            let mut state = self.state.borrow_mut();
            if !state.active || state.drag.is_some() {
                return;
            }
            let start_value = axis.read(&self.settings.borrow());
            state.drag = Some(DragSession {
                axis,
                start_pointer_y: y,
                start_value,
                value: start_value,
            });
        }
        self.render();
    }

    /// Preview the drag locally; nothing is persisted until pointer-up.
    pub fn pointer_move(&self, y: f64) {
        let viewport_height = self.dom.viewport_height();
        if viewport_height <= 0.0 {
            return;
        }
        {
            let mut state = self.state.borrow_mut();
            let Some(drag) = state.drag.as_mut() else {
                return;
            };
            let delta = (y - drag.start_pointer_y) / viewport_height * 100.0;
            drag.value = clamp_range(drag.start_value + delta, drag.axis.range());
        }
        self.render();
    }

    pub async fn pointer_up(&self) {
        let finished = {
            let mut state = self.state.borrow_mut();
            let drag = state.drag.take();
            if drag.is_some() {
                state.hovered = None;
            }
            drag
        };
        let Some(drag) = finished else {
            return;
        };

        let patch = {
            let mut settings = self.settings.borrow_mut();
            drag.axis.write(&mut settings, drag.value);
            SettingsPatch {
                top_offset: Some(settings.top_offset),
                bracket_height: Some(settings.bracket_height),
                ..Default::default()
            }
        };
        self.render();
        self.commit(patch).await;
    }

    fn hover(&self, role: Role, inside: bool) {
        {
            let mut state = self.state.borrow_mut();
            if inside {
                state.hovered = Some(role);
            } else if state.hovered == Some(role) {
                state.hovered = None;
            }
        }
        self.render();
    }

    /// Open or close the settings panel, independently of the bracket.
    pub fn toggle_panel(&self) {
        let existing = self.state.borrow_mut().elements.remove(&Role::Panel);
        match existing {
            Some(panel) => self.dom.remove(panel),
            None => {
                let Some(panel) = self.dom.create(Role::Panel) else {
                    warn!("Focus Reader: could not create settings panel");
                    return;
                };
                self.state.borrow_mut().elements.insert(Role::Panel, panel);
                self.render();
            }
        }
    }

    fn close_panel(&self) {
        let existing = self.state.borrow_mut().elements.remove(&Role::Panel);
        if let Some(panel) = existing {
            self.dom.remove(panel);
        }
    }

    pub async fn panel_action(&self, action: PanelAction) {
        let patch = match action {
            PanelAction::SetBracketLines(enabled) => SettingsPatch {
                bracket_lines_enabled: Some(enabled),
                ..Default::default()
            },
            PanelAction::SetSideShading(enabled) => SettingsPatch {
                side_shading_enabled: Some(enabled),
                ..Default::default()
            },
            PanelAction::SetAutoDetect(enabled) => SettingsPatch {
                auto_detect_enabled: Some(enabled),
                ..Default::default()
            },
            PanelAction::SetThemeColor(color) => SettingsPatch {
                bracket_color: Some(color),
                ..Default::default()
            },
            PanelAction::SetShadingOpacity(opacity) => SettingsPatch {
                shading_opacity: Some(opacity),
                ..Default::default()
            },
            PanelAction::SetBracketWidth(width) => SettingsPatch {
                bracket_width: Some(width),
                ..Default::default()
            },
            PanelAction::Reset => {
                let defaults = self.store.reset().await;
                *self.settings.borrow_mut() = defaults;
                self.render();
                self.close_panel();
                return;
            }
            PanelAction::Close => {
                self.close_panel();
                return;
            }
        };
        self.commit(patch).await;
    }

    /// Persist immediately, adopt the stored result and redraw.
    async fn commit(&self, patch: SettingsPatch) {
        let saved = self.store.save(patch, true).await;
        *self.settings.borrow_mut() = saved;
        self.render();
    }

    /// Settings with any in-progress drag applied on top.
    fn effective_settings(&self) -> Settings {
        let mut settings = self.settings();
        if let Some(drag) = self.state.borrow().drag {
            drag.axis.write(&mut settings, drag.value);
        }
        settings
    }

    /// Bring the elements in line with the current settings, touching only
    /// what changed: shades are restyled in place, optional elements are
    /// created or removed individually.
    fn render(&self) {
        let settings = self.effective_settings();
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;

        if state.active {
            let wanted = wanted_roles(&settings);
            let stale: Vec<Role> = state
                .elements
                .keys()
                .copied()
                .filter(|role| *role != Role::Panel && !wanted.contains(role))
                .collect();
            for role in stale {
                if let Some(element) = state.elements.remove(&role) {
                    self.dom.remove(element);
                }
            }

            for role in wanted {
                if !state.elements.contains_key(&role) {
                    match self.dom.create(role) {
                        Some(element) => {
                            state.elements.insert(role, element);
                        }
                        None => {
                            warn!("Focus Reader: could not create {:?}", role);
                            continue;
                        }
                    }
                }
                let style = style_for(role, &settings, state.affordance(role));
                if let Some(element) = state.elements.get(&role) {
                    self.dom.apply_style(element, &style);
                }
            }
        }

        if let Some(panel) = state.elements.get_mut(&Role::Panel) {
            self.dom
                .apply_style(panel, &style_for(Role::Panel, &settings, Affordance::Idle));
            self.dom.sync_panel(panel, &settings);
        }
    }
}
