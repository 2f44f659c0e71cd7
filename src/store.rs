//! Settings persistence over an asynchronous key-value store.
//!
//! [`SettingsStore`] is the only code that talks to storage. It debounces
//! non-immediate saves, bounds `load` with a timeout and absorbs every
//! backend failure: callers always get a usable [`Settings`] back.

use crate::config::{LOAD_TIMEOUT_MS, SAVE_DEBOUNCE_MS, STORAGE_KEY};
use crate::settings::{Settings, SettingsPatch};
use futures::channel::oneshot;
use futures::future::{self, Either, LocalBoxFuture};
use futures::FutureExt;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Failure reported by a storage backend.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The backend did not answer within the given number of milliseconds.
    Timeout(u32),
    /// The host API rejected the call (quota, missing permission, ...).
    Host(String),
    /// The value could not be converted to or from the host representation.
    Serialization(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Timeout(ms) => write!(f, "Storage did not respond within {} ms", ms),
            StoreError::Host(msg) => write!(f, "Storage host error: {}", msg),
            StoreError::Serialization(msg) => write!(f, "Storage serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Called with the new value whenever a watched key changes.
pub type ChangeListener = Box<dyn Fn(Value)>;

/// An opaque asynchronous dictionary with a change feed.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> LocalBoxFuture<'static, Result<Option<Value>, StoreError>>;
    fn set(&self, key: &str, value: Value) -> LocalBoxFuture<'static, Result<(), StoreError>>;
    /// Register `listener` for changes to `key`, from any context.
    fn subscribe(&self, key: &str, listener: ChangeListener);
}

/// Source of delays for debouncing and timeouts.
pub trait Timer {
    fn sleep(&self, ms: u32) -> LocalBoxFuture<'static, ()>;
}

// ──────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryInner {
    values: HashMap<String, Value>,
    listeners: Vec<(String, Rc<dyn Fn(Value)>)>,
    writes: usize,
}

/// In-process backend. Clones share the same data and change feed, which
/// mirrors how several pages see one extension storage area.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls since creation.
    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes
    }

    pub fn peek(&self, key: &str) -> Option<Value> {
        self.inner.borrow().values.get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> LocalBoxFuture<'static, Result<Option<Value>, StoreError>> {
        future::ready(Ok(self.peek(key))).boxed_local()
    }

    fn set(&self, key: &str, value: Value) -> LocalBoxFuture<'static, Result<(), StoreError>> {
        let listeners: Vec<Rc<dyn Fn(Value)>> = {
            let mut inner = self.inner.borrow_mut();
            inner.values.insert(key.to_string(), value.clone());
            inner.writes += 1;
            inner
                .listeners
                .iter()
                .filter(|(k, _)| k == key)
                .map(|(_, l)| l.clone())
                .collect()
        };
        // Fan out after the borrow ends; listeners may read the store again
        for listener in listeners {
            listener(value.clone());
        }
        future::ready(Ok(())).boxed_local()
    }

    fn subscribe(&self, key: &str, listener: ChangeListener) {
        self.inner
            .borrow_mut()
            .listeners
            .push((key.to_string(), Rc::from(listener)));
    }
}

// ──────────────────────────────────────────────────────────────────────────────

/// What a debounced caller is woken with.
enum Handoff {
    /// The flush happened; here is its result.
    Saved(Settings),
    /// The caller due to flush went away; wait out a fresh window and flush.
    Flush,
}

#[derive(Default)]
struct PendingSave {
    generation: u64,
    patch: SettingsPatch,
    waiters: Vec<oneshot::Sender<Handoff>>,
}

/// Held by a debounced caller while it waits out its window. If the caller
/// is dropped while it is still the newest, flushing passes to the most
/// recent caller that is still listening.
struct FlushGuard<'a> {
    pending: &'a RefCell<PendingSave>,
    generation: u64,
    armed: bool,
}

impl FlushGuard<'_> {
    /// Take the pending patch and waiters if this caller is the newest.
    fn claim(&mut self) -> Option<(SettingsPatch, Vec<oneshot::Sender<Handoff>>)> {
        self.armed = false;
        let mut pending = self.pending.borrow_mut();
        if pending.generation != self.generation {
            return None;
        }
        Some((
            std::mem::take(&mut pending.patch),
            std::mem::take(&mut pending.waiters),
        ))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut pending = self.pending.borrow_mut();
        if pending.generation != self.generation {
            return;
        }
        // The newest caller pushed last
        pending.waiters.pop();
        while let Some(waiter) = pending.waiters.pop() {
            if waiter.send(Handoff::Flush).is_ok() {
                return;
            }
        }
        debug!("Debounced save abandoned, patch kept for the next save");
    }
}

pub struct SettingsStore<K, T> {
    backend: K,
    timer: T,
    pending: RefCell<PendingSave>,
}

impl<K: KeyValueStore, T: Timer> SettingsStore<K, T> {
    pub fn new(backend: K, timer: T) -> Self {
        Self {
            backend,
            timer,
            pending: RefCell::new(PendingSave::default()),
        }
    }

    /// Fetch the persisted settings.
    ///
    /// An empty store is initialized with the defaults. A failed or slow
    /// fetch yields the defaults without persisting anything.
    pub async fn load(&self) -> Settings {
        let fetch = self.backend.get(STORAGE_KEY);
        let timeout = self.timer.sleep(LOAD_TIMEOUT_MS);

        match future::select(fetch, timeout).await {
            Either::Left((Ok(Some(value)), _)) => match Settings::from_value(value) {
                Ok(settings) => settings,
                Err(e) => {
                    error!("Error decoding stored settings: {}", e);
                    Settings::default()
                }
            },
            Either::Left((Ok(None), _)) => {
                info!("No saved settings, storing defaults");
                let defaults = Settings::default();
                if let Err(e) = self.backend.set(STORAGE_KEY, defaults.to_value()).await {
                    error!("Error saving default settings: {}", e);
                }
                defaults
            }
            Either::Left((Err(e), _)) => {
                error!("Error loading settings: {}", e);
                Settings::default()
            }
            Either::Right(((), _)) => {
                error!(
                    "Error loading settings: {}",
                    StoreError::Timeout(LOAD_TIMEOUT_MS)
                );
                Settings::default()
            }
        }
    }

    /// Merge `patch` onto the stored settings and persist the result.
    ///
    /// Non-immediate saves are coalesced: every call made within the debounce
    /// window resolves with the settings produced by the single write at the
    /// end of it. Dropping the newest caller hands the flush to an earlier one.
    pub async fn save(&self, patch: SettingsPatch, immediate: bool) -> Settings {
        if immediate {
            return self.write_merged(patch).await;
        }

        self.pending.borrow_mut().patch.absorb(patch);

        loop {
            let (tx, rx) = oneshot::channel();
            let generation = {
                let mut pending = self.pending.borrow_mut();
                pending.generation += 1;
                pending.waiters.push(tx);
                pending.generation
            };
            let mut guard = FlushGuard {
                pending: &self.pending,
                generation,
                armed: true,
            };

            self.timer.sleep(SAVE_DEBOUNCE_MS).await;

            if let Some((patch, waiters)) = guard.claim() {
                debug!("Flushing {} debounced save(s)", waiters.len());
                let settings = self.write_merged(patch).await;
                for waiter in waiters {
                    let _ = waiter.send(Handoff::Saved(settings.clone()));
                }
            }

            match rx.await {
                Ok(Handoff::Saved(settings)) => return settings,
                Ok(Handoff::Flush) => debug!("Taking over an abandoned debounced save"),
                Err(_) => {
                    warn!("Debounced save was dropped before flushing, reloading");
                    return self.load().await;
                }
            }
        }
    }

    /// Persist and return the default settings.
    pub async fn reset(&self) -> Settings {
        let defaults = Settings::default();
        if let Err(e) = self.backend.set(STORAGE_KEY, defaults.to_value()).await {
            error!("Error resetting settings: {}", e);
        }
        defaults
    }

    /// Deliver every change of the stored settings to `callback`, clamped.
    ///
    /// The backend's feed is used as-is, so local writes echo back too.
    pub fn subscribe_to_changes(&self, callback: impl Fn(Settings) + 'static) {
        self.backend.subscribe(
            STORAGE_KEY,
            Box::new(move |value| match Settings::from_value(value) {
                Ok(settings) => callback(settings),
                Err(e) => warn!("Ignoring undecodable settings change: {}", e),
            }),
        );
    }

    async fn write_merged(&self, patch: SettingsPatch) -> Settings {
        let current = self.load().await;
        let merged = current.merged(&patch);
        if let Err(e) = self.backend.set(STORAGE_KEY, merged.to_value()).await {
            error!("Error saving settings: {}", e);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingStore, ImmediateTimer, ManualTimer, StalledStore};
    use futures::executor::{block_on, LocalPool};
    use futures::task::{noop_waker_ref, LocalSpawnExt};
    use std::task::Context;

    fn seeded(settings: &Settings) -> MemoryStore {
        let backend = MemoryStore::new();
        block_on(backend.set(STORAGE_KEY, settings.to_value())).unwrap();
        backend
    }

    #[test]
    fn load_initializes_empty_storage_with_defaults() {
        let backend = MemoryStore::new();
        let store = SettingsStore::new(backend.clone(), ImmediateTimer);

        let loaded = block_on(store.load());

        assert_eq!(loaded, Settings::default());
        assert_eq!(backend.write_count(), 1);
        assert_eq!(
            backend.peek(STORAGE_KEY),
            Some(Settings::default().to_value())
        );
    }

    #[test]
    fn load_merges_partial_record_onto_defaults() {
        let backend = MemoryStore::new();
        block_on(backend.set(STORAGE_KEY, serde_json::json!({ "leftPosition": 12 }))).unwrap();
        let store = SettingsStore::new(backend, ImmediateTimer);

        let loaded = block_on(store.load());

        assert_eq!(loaded.left_position, 12.0);
        assert_eq!(loaded.right_position, Settings::default().right_position);
    }

    #[test]
    fn load_times_out_to_defaults_without_persisting() {
        let backend = StalledStore::default();
        let timer = ManualTimer::default();
        let store = SettingsStore::new(backend.clone(), timer.clone());
        let mut pool = LocalPool::new();
        let result = Rc::new(RefCell::new(None));

        let slot = result.clone();
        pool.spawner()
            .spawn_local(async move {
                *slot.borrow_mut() = Some(store.load().await);
            })
            .unwrap();

        pool.run_until_stalled();
        assert!(result.borrow().is_none());
        assert_eq!(timer.pending(), 1);

        timer.fire_all();
        pool.run_until_stalled();

        assert_eq!(result.borrow().clone(), Some(Settings::default()));
        assert_eq!(backend.write_attempts(), 0);
    }

    #[test]
    fn failures_are_absorbed() {
        let store = SettingsStore::new(FailingStore, ImmediateTimer);

        assert_eq!(block_on(store.load()), Settings::default());

        let saved = block_on(store.save(
            SettingsPatch {
                top_offset: Some(200.0),
                ..Default::default()
            },
            true,
        ));
        assert_eq!(saved.top_offset, 80.0);

        assert_eq!(block_on(store.reset()), Settings::default());
    }

    #[test]
    fn immediate_save_merges_clamps_and_persists() {
        let backend = seeded(&Settings::default());
        let store = SettingsStore::new(backend.clone(), ImmediateTimer);
        let before = backend.write_count();

        let saved = block_on(store.save(
            SettingsPatch {
                bracket_height: Some(1.0),
                left_position: Some(55.0),
                ..Default::default()
            },
            true,
        ));

        assert_eq!(saved.bracket_height, 2.0);
        assert_eq!(saved.left_position, 40.0);
        assert_eq!(backend.write_count(), before + 1);
        assert_eq!(backend.peek(STORAGE_KEY), Some(saved.to_value()));
    }

    #[test]
    fn debounced_saves_coalesce_into_one_write() {
        let backend = seeded(&Settings::default());
        let timer = ManualTimer::default();
        let store = Rc::new(SettingsStore::new(backend.clone(), timer.clone()));
        let results = Rc::new(RefCell::new(Vec::new()));
        let before = backend.write_count();

        let patches = vec![
            SettingsPatch {
                top_offset: Some(10.0),
                bracket_color: Some("#ff00ff".into()),
                ..Default::default()
            },
            SettingsPatch {
                top_offset: Some(20.0),
                ..Default::default()
            },
            SettingsPatch {
                top_offset: Some(30.0),
                bracket_height: Some(25.0),
                ..Default::default()
            },
        ];

        let mut pool = LocalPool::new();
        for patch in patches {
            let store = store.clone();
            let results = results.clone();
            pool.spawner()
                .spawn_local(async move {
                    let settings = store.save(patch, false).await;
                    results.borrow_mut().push(settings);
                })
                .unwrap();
        }

        pool.run_until_stalled();
        assert_eq!(timer.pending(), 3);
        assert_eq!(backend.write_count(), before);

        timer.fire_all();
        pool.run_until_stalled();

        assert_eq!(backend.write_count(), before + 1);
        let results = results.borrow();
        assert_eq!(results.len(), 3);
        for settings in results.iter() {
            assert_eq!(settings.top_offset, 30.0);
            assert_eq!(settings.bracket_height, 25.0);
            assert_eq!(settings.bracket_color, "#ff00ff");
        }
        assert_eq!(backend.peek(STORAGE_KEY), Some(results[0].to_value()));
    }

    #[test]
    fn dropping_the_newest_debounced_caller_still_flushes() {
        let backend = seeded(&Settings::default());
        let timer = ManualTimer::default();
        let store = Rc::new(SettingsStore::new(backend.clone(), timer.clone()));
        let before = backend.write_count();
        let first = Rc::new(RefCell::new(None));

        let mut pool = LocalPool::new();
        {
            let store = store.clone();
            let slot = first.clone();
            pool.spawner()
                .spawn_local(async move {
                    let patch = SettingsPatch {
                        top_offset: Some(10.0),
                        ..Default::default()
                    };
                    *slot.borrow_mut() = Some(store.save(patch, false).await);
                })
                .unwrap();
        }
        pool.run_until_stalled();

        // Polled once, then abandoned mid-window
        {
            let patch = SettingsPatch {
                top_offset: Some(20.0),
                ..Default::default()
            };
            let mut second = store.save(patch, false).boxed_local();
            let mut cx = Context::from_waker(noop_waker_ref());
            assert!(second.poll_unpin(&mut cx).is_pending());
        }

        timer.fire_all();
        pool.run_until_stalled();
        assert!(first.borrow().is_none());
        assert_eq!(timer.pending(), 1);
        assert_eq!(backend.write_count(), before);

        timer.fire_all();
        pool.run_until_stalled();

        assert_eq!(backend.write_count(), before + 1);
        let saved = first.borrow().clone().unwrap();
        assert_eq!(saved.top_offset, 20.0);
        assert_eq!(backend.peek(STORAGE_KEY), Some(saved.to_value()));
    }

    #[test]
    fn malformed_field_does_not_wipe_the_stored_record() {
        let backend = MemoryStore::new();
        block_on(backend.set(
            STORAGE_KEY,
            serde_json::json!({
                "topOffset": 30,
                "bracketColor": "#ff0000",
                "bracketWidth": "7",
            }),
        ))
        .unwrap();
        let store = SettingsStore::new(backend.clone(), ImmediateTimer);

        let loaded = block_on(store.load());
        assert_eq!(loaded.top_offset, 30.0);
        assert_eq!(loaded.bracket_color, "#ff0000");

        block_on(store.save(
            SettingsPatch {
                bracket_height: Some(30.0),
                ..Default::default()
            },
            true,
        ));

        let stored = Settings::from_value(backend.peek(STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(stored.top_offset, 30.0);
        assert_eq!(stored.bracket_color, "#ff0000");
        assert_eq!(stored.bracket_height, 30.0);
        assert_eq!(stored.bracket_width, Settings::default().bracket_width);
    }

    #[test]
    fn reset_then_load_round_trips_defaults() {
        let backend = seeded(&Settings {
            top_offset: 5.0,
            bracket_lines_enabled: false,
            ..Default::default()
        });
        let store = SettingsStore::new(backend, ImmediateTimer);

        assert_eq!(block_on(store.reset()), Settings::default());
        assert_eq!(block_on(store.load()), Settings::default());
    }

    #[test]
    fn subscribers_receive_clamped_changes_from_other_contexts() {
        let backend = MemoryStore::new();
        let store = SettingsStore::new(backend.clone(), ImmediateTimer);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        store.subscribe_to_changes(move |settings| sink.borrow_mut().push(settings));

        // Another page writing the same storage area
        let other = backend.clone();
        block_on(other.set(STORAGE_KEY, serde_json::json!({ "topOffset": 120 }))).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].top_offset, 80.0);
    }
}
