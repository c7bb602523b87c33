//! Typed state maps for applications and requests.
//!
//! State is a type-keyed container of shared values. The application owns
//! one, populated at build time, and every request carries its own, seeded
//! from the application's by [`StateMiddleware`](crate::middleware::StateMiddleware)
//! before user middleware runs. Values are stored behind `Arc`, so cloning a
//! map clones handles, not data.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Type-keyed state container.
#[derive(Clone, Default)]
pub struct State {
    map: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl State {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a typed value, replacing any existing value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.map.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Insert an already-shared value without re-wrapping it.
    pub fn insert_arc<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.map.insert(TypeId::of::<T>(), value);
    }

    /// Borrow a typed value.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Get a shared handle to a typed value, for use across awaits.
    pub fn get_arc<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.clone().downcast::<T>().ok())
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    /// Remove a typed value. Returns true if one existed.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> bool {
        self.map.remove(&TypeId::of::<T>()).is_some()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Merge another map into this one. Entries from `other` win on
    /// type collisions.
    pub fn merge(&mut self, other: State) {
        self.map.extend(other.map);
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("count", &self.map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pool(&'static str);

    #[test]
    fn test_insert_and_get() {
        let mut state = State::new();
        state.insert(Pool("primary"));
        state.insert(42u32);

        assert_eq!(state.get::<Pool>(), Some(&Pool("primary")));
        assert_eq!(state.get::<u32>(), Some(&42));
        assert_eq!(state.get::<String>(), None);
    }

    #[test]
    fn test_insert_replaces() {
        let mut state = State::new();
        state.insert(Pool("primary"));
        state.insert(Pool("replica"));

        assert_eq!(state.get::<Pool>(), Some(&Pool("replica")));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_get_arc_shares_value() {
        let mut state = State::new();
        state.insert_arc(Arc::new(Pool("primary")));

        let handle = state.get_arc::<Pool>().unwrap();
        assert_eq!(*handle, Pool("primary"));
    }

    #[test]
    fn test_merge_other_wins() {
        let mut request_state = State::new();
        request_state.insert(Pool("request-local"));
        request_state.insert("kept".to_string());

        let mut app_state = State::new();
        app_state.insert(Pool("application"));

        request_state.merge(app_state);

        assert_eq!(request_state.get::<Pool>(), Some(&Pool("application")));
        assert_eq!(request_state.get::<String>(), Some(&"kept".to_string()));
    }

    #[test]
    fn test_remove() {
        let mut state = State::new();
        state.insert(7i64);
        assert!(state.remove::<i64>());
        assert!(!state.remove::<i64>());
        assert!(state.is_empty());
    }
}
