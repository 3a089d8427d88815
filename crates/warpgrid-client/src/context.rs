//! Per-response attribute bag shared by all filters of one response.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Attribute = Arc<dyn Any + Send + Sync>;

/// Caller-owned, per-response state passed unchanged to every filter.
///
/// Cloning yields another handle to the same attributes. Filters may run
/// on different worker threads, so the map is internally synchronized;
/// the lock is never held across an `.await`.
#[derive(Clone, Default)]
pub struct FilterContext {
    attrs: Arc<Mutex<HashMap<String, Attribute>>>,
}

impl FilterContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn attrs(&self) -> MutexGuard<'_, HashMap<String, Attribute>> {
        self.attrs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `value` under `name`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        self.attrs().insert(name.into(), Arc::new(value));
    }

    /// Typed lookup. `None` if absent or stored with a different type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let value = self.attrs().get(name).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Remove the attribute, returning whether it was present.
    pub fn remove(&self, name: &str) -> bool {
        self.attrs().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attrs().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.attrs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs().is_empty()
    }
}

impl std::fmt::Debug for FilterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.attrs().keys().cloned().collect();
        names.sort();
        f.debug_struct("FilterContext").field("attrs", &names).finish()
    }
}
