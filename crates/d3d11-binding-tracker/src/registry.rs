//! Process-wide named resources shared by every pipeline.
//!
//! Resources such as the active camera constant buffer or the shadow map are published here once
//! and pushed into every attached [`GlobalResourceListener`] (normally a
//! [`ResourceBindingList`](crate::ResourceBindingList)).
//!
//! Locking: one mutex guards both the entry map and the listener list, and it stays held while a
//! change is fanned out or while a newly attached listener is replayed. A listener attaching
//! concurrently with a `set` therefore either sees the update through the replay or through the
//! broadcast, never neither. Listeners must not call back into the registry from their callback;
//! the lock is not reentrant.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};

use hashbrown::HashMap;
use tracing::debug;

use crate::binder::KEEP_UAV_COUNTER;
use crate::binding_model::ResourceCategory;
use crate::handle::ResourceHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalResourceEntry {
    pub name: Arc<str>,
    pub category: ResourceCategory,
    pub handle: ResourceHandle,
    /// UAV initial count; [`KEEP_UAV_COUNTER`] for every other category.
    pub initial_count: u32,
}

/// One registry mutation as seen by listeners.
///
/// `old` is the entry the registry held before the change, `new` the entry after it (`None` when
/// the name was removed).
#[derive(Debug, Clone, Copy)]
pub struct GlobalResourceChange<'a> {
    pub name: &'a str,
    pub old: Option<&'a GlobalResourceEntry>,
    pub new: Option<&'a GlobalResourceEntry>,
}

pub trait GlobalResourceListener: Send + Sync {
    /// Called with the registry lock held.
    fn on_global_resource_changed(&self, change: &GlobalResourceChange<'_>);
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<Arc<str>, GlobalResourceEntry>,
    listeners: Vec<Weak<dyn GlobalResourceListener>>,
}

impl RegistryState {
    fn prune_listeners(&mut self) {
        self.listeners.retain(|listener| listener.strong_count() > 0);
    }

    fn position_of(&self, listener: *const ()) -> Option<usize> {
        self.listeners
            .iter()
            .position(|weak| weak.as_ptr().cast::<()>() == listener)
    }
}

#[derive(Default)]
pub struct GlobalResourceRegistry {
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for GlobalResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("GlobalResourceRegistry")
            .field("entries", &state.entries.len())
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl GlobalResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<GlobalResourceRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Self::new())).clone()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish `handle` under `name`, or remove `name` when `handle` is null, and notify every
    /// live listener.
    ///
    /// Returns the entry previously registered under `name`.
    pub fn set(
        &self,
        name: &str,
        category: ResourceCategory,
        handle: ResourceHandle,
        initial_count: u32,
    ) -> Option<GlobalResourceEntry> {
        let new = (!handle.is_null()).then(|| GlobalResourceEntry {
            name: Arc::from(name),
            category,
            handle,
            initial_count,
        });
        self.replace(name, new)
    }

    fn replace(&self, name: &str, new: Option<GlobalResourceEntry>) -> Option<GlobalResourceEntry> {
        let mut state = self.lock();
        let RegistryState { entries, listeners } = &mut *state;

        let old = match new {
            None => {
                let old = entries.remove(name)?;
                debug!(name, category = %old.category, "global resource removed");
                Some(old)
            }
            Some(new) => {
                if let Some(current) = entries.get(name).filter(|current| **current == new) {
                    return Some(current.clone());
                }
                debug!(name, category = %new.category, handle = ?new.handle, "global resource set");
                entries.insert(new.name.clone(), new)
            }
        };

        Self::broadcast(listeners, name, old.as_ref(), entries.get(name));
        old
    }

    fn broadcast(
        listeners: &mut Vec<Weak<dyn GlobalResourceListener>>,
        name: &str,
        old: Option<&GlobalResourceEntry>,
        new: Option<&GlobalResourceEntry>,
    ) {
        let change = GlobalResourceChange { name, old, new };
        listeners.retain(|listener| match listener.upgrade() {
            Some(listener) => {
                listener.on_global_resource_changed(&change);
                true
            }
            None => false,
        });
    }

    pub fn set_constant_buffer(&self, name: &str, buffer: ResourceHandle) {
        self.set(name, ResourceCategory::ConstantBuffer, buffer, KEEP_UAV_COUNTER);
    }

    pub fn set_shader_resource(&self, name: &str, view: ResourceHandle) {
        self.set(name, ResourceCategory::ShaderResource, view, KEEP_UAV_COUNTER);
    }

    pub fn set_unordered_access_view(&self, name: &str, view: ResourceHandle, initial_count: u32) {
        self.set(name, ResourceCategory::UnorderedAccess, view, initial_count);
    }

    pub fn set_sampler(&self, name: &str, sampler: ResourceHandle) {
        self.set(name, ResourceCategory::Sampler, sampler, KEEP_UAV_COUNTER);
    }

    /// Remove `name`, notifying listeners. Returns the removed entry.
    pub fn remove(&self, name: &str) -> Option<GlobalResourceEntry> {
        self.replace(name, None)
    }

    pub fn get(&self, name: &str) -> Option<GlobalResourceEntry> {
        self.lock().entries.get(name).cloned()
    }

    pub fn snapshot(&self) -> Vec<GlobalResourceEntry> {
        let mut entries: Vec<_> = self.lock().entries.values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Subscribe `listener` and replay every current entry into it under the same lock.
    ///
    /// Attaching an already attached listener only replays. The registry holds a weak reference;
    /// dropping the last `Arc` detaches implicitly.
    pub fn attach<L>(&self, listener: &Arc<L>)
    where
        L: GlobalResourceListener + 'static,
    {
        let mut state = self.lock();
        state.prune_listeners();

        if state.position_of(Arc::as_ptr(listener).cast()).is_none() {
            let listener: Arc<dyn GlobalResourceListener> = listener.clone();
            state.listeners.push(Arc::downgrade(&listener));
        }

        for entry in state.entries.values() {
            listener.on_global_resource_changed(&GlobalResourceChange {
                name: &entry.name,
                old: None,
                new: Some(entry),
            });
        }

        debug!(
            replayed = state.entries.len(),
            listeners = state.listeners.len(),
            "global resource listener attached"
        );
    }

    /// Unsubscribe `listener`. Returns whether it was attached.
    pub fn detach<L>(&self, listener: &Arc<L>) -> bool
    where
        L: GlobalResourceListener + 'static,
    {
        let mut state = self.lock();
        state.prune_listeners();
        let Some(index) = state.position_of(Arc::as_ptr(listener).cast()) else {
            return false;
        };
        state.listeners.swap_remove(index);
        debug!(
            listeners = state.listeners.len(),
            "global resource listener detached"
        );
        true
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        let mut state = self.lock();
        state.prune_listeners();
        state.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log {
        changes: Mutex<Vec<(String, Option<ResourceHandle>, Option<ResourceHandle>)>>,
    }

    impl GlobalResourceListener for Log {
        fn on_global_resource_changed(&self, change: &GlobalResourceChange<'_>) {
            self.changes.lock().unwrap().push((
                change.name.to_owned(),
                change.old.map(|e| e.handle),
                change.new.map(|e| e.handle),
            ));
        }
    }

    impl Log {
        fn take(&self) -> Vec<(String, Option<ResourceHandle>, Option<ResourceHandle>)> {
            std::mem::take(&mut *self.changes.lock().unwrap())
        }
    }

    fn h(raw: usize) -> ResourceHandle {
        ResourceHandle::from_raw(raw)
    }

    #[test]
    fn set_and_remove_notify_with_previous_entry() {
        let registry = GlobalResourceRegistry::new();
        let log = Arc::new(Log::default());
        registry.attach(&log);

        registry.set_shader_resource("ShadowMap", h(1));
        registry.set_shader_resource("ShadowMap", h(2));
        registry.set_shader_resource("ShadowMap", ResourceHandle::NULL);

        assert_eq!(
            log.take(),
            vec![
                ("ShadowMap".into(), None, Some(h(1))),
                ("ShadowMap".into(), Some(h(1)), Some(h(2))),
                ("ShadowMap".into(), Some(h(2)), None),
            ]
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn unchanged_and_absent_updates_are_silent() {
        let registry = GlobalResourceRegistry::new();
        let log = Arc::new(Log::default());
        registry.attach(&log);

        registry.set_constant_buffer("CameraCB", h(4));
        registry.set_constant_buffer("CameraCB", h(4));
        registry.set_constant_buffer("Missing", ResourceHandle::NULL);
        assert!(registry.remove("Missing").is_none());

        assert_eq!(log.take(), vec![("CameraCB".into(), None, Some(h(4)))]);
    }

    #[test]
    fn attach_replays_current_entries() {
        let registry = GlobalResourceRegistry::new();
        registry.set_shader_resource("Sun", h(7));
        registry.set_sampler("LinearWrap", h(8));

        let log = Arc::new(Log::default());
        registry.attach(&log);

        let mut replay = log.take();
        replay.sort();
        assert_eq!(
            replay,
            vec![
                ("LinearWrap".into(), None, Some(h(8))),
                ("Sun".into(), None, Some(h(7))),
            ]
        );

        // Re-attaching replays again without subscribing twice.
        registry.attach(&log);
        assert_eq!(log.take().len(), 2);
        assert_eq!(registry.listener_count(), 1);
    }

    #[test]
    fn dropped_and_detached_listeners_stop_receiving() {
        let registry = GlobalResourceRegistry::new();
        let kept = Arc::new(Log::default());
        let dropped = Arc::new(Log::default());
        registry.attach(&kept);
        registry.attach(&dropped);
        assert_eq!(registry.listener_count(), 2);

        drop(dropped);
        assert_eq!(registry.listener_count(), 1);

        assert!(registry.detach(&kept));
        assert!(!registry.detach(&kept));
        registry.set_sampler("PointClamp", h(1));
        assert!(kept.take().is_empty());
    }

    #[test]
    fn remove_returns_entry() {
        let registry = GlobalResourceRegistry::new();
        registry.set_unordered_access_view("Particles", h(3), 0);
        let removed = registry.remove("Particles").unwrap();
        assert_eq!(removed.category, ResourceCategory::UnorderedAccess);
        assert_eq!(removed.initial_count, 0);
        assert!(registry.get("Particles").is_none());
    }

    #[test]
    fn snapshot_is_sorted_by_name() {
        let registry = GlobalResourceRegistry::new();
        registry.set_constant_buffer("b", h(2));
        registry.set_constant_buffer("a", h(1));
        let names: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|e| e.name.to_string())
            .collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn global_registry_is_shared() {
        assert!(Arc::ptr_eq(
            &GlobalResourceRegistry::global(),
            &GlobalResourceRegistry::global()
        ));
    }
}
