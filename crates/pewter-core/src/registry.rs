//! Priority-ordered listener registry.
//!
//! The registry holds the persistent listeners shared by every connection.
//! Dispatch never iterates the live list: [`ordered_listeners`] copies it
//! under the lock, so listeners may be (un)registered while a message is
//! being routed, including by the listener currently running.
//!
//! [`ordered_listeners`]: ListenerRegistry::ordered_listeners

use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::listener::Listener;

#[derive(Clone)]
struct Registration {
    listener: Arc<dyn Listener>,
    priority: i32,
}

/// Thread-safe collection of registered listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Mutex<Vec<Registration>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` at its own [`priority`](Listener::priority).
    pub fn register(&self, listener: Arc<dyn Listener>) {
        let priority = listener.priority();
        self.register_with_priority(listener, priority);
    }

    /// Registers `listener` at an explicit priority. Duplicates are allowed.
    pub fn register_with_priority(&self, listener: Arc<dyn Listener>, priority: i32) {
        debug!(listener = %listener.name(), priority, "Listener registered");
        self.entries.lock().push(Registration { listener, priority });
    }

    /// Removes every registration of `listener` (pointer identity).
    ///
    /// Returns the number of registrations removed.
    pub fn unregister(&self, listener: &Arc<dyn Listener>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|r| !ptr::addr_eq(Arc::as_ptr(&r.listener), Arc::as_ptr(listener)));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(listener = %listener.name(), removed, "Listener unregistered");
        }
        removed
    }

    /// Returns `true` if `listener` is registered at least once.
    pub fn contains(&self, listener: &Arc<dyn Listener>) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|r| ptr::addr_eq(Arc::as_ptr(&r.listener), Arc::as_ptr(listener)))
    }

    /// `extra` followed by the registered listeners, stably sorted by
    /// ascending priority. Ties keep `extra` first, then registration order.
    pub fn ordered_listeners(&self, extra: &[Arc<dyn Listener>]) -> Vec<Arc<dyn Listener>> {
        let mut all: Vec<(i32, Arc<dyn Listener>)> = extra
            .iter()
            .map(|l| (l.priority(), Arc::clone(l)))
            .collect();
        {
            let entries = self.entries.lock();
            all.extend(
                entries
                    .iter()
                    .map(|r| (r.priority, Arc::clone(&r.listener))),
            );
        }
        all.sort_by_key(|(priority, _)| *priority);
        all.into_iter().map(|(_, listener)| listener).collect()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes every registration.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listener_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::context::Context;
    use crate::listener::{ListenerResult, Outcome};
    use crate::message::Message;

    struct Named(&'static str, i32);

    #[async_trait]
    impl Listener for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn priority(&self) -> i32 {
            self.1
        }
        async fn receive_message(&self, _ctx: &Context, _msg: &Message) -> ListenerResult {
            Ok(Outcome::Continue)
        }
    }

    fn names(list: &[Arc<dyn Listener>]) -> Vec<&str> {
        list.iter().map(|l| l.name()).collect()
    }

    #[test]
    fn test_ordering_is_stable_by_priority() {
        let registry = ListenerRegistry::new();
        registry.register(Arc::new(Named("a", 5)));
        registry.register(Arc::new(Named("b", -1)));
        registry.register(Arc::new(Named("c", 5)));
        registry.register(Arc::new(Named("d", 0)));
        let ordered = registry.ordered_listeners(&[]);
        assert_eq!(names(&ordered), ["b", "d", "a", "c"]);
    }

    #[test]
    fn test_extra_listeners_are_merged() {
        let registry = ListenerRegistry::new();
        registry.register(Arc::new(Named("plugin", 0)));
        let extra: Vec<Arc<dyn Listener>> =
            vec![Arc::new(Named("ping", -1000)), Arc::new(Named("late", 0))];
        let ordered = registry.ordered_listeners(&extra);
        assert_eq!(names(&ordered), ["ping", "late", "plugin"]);
    }

    #[test]
    fn test_explicit_priority_overrides() {
        let registry = ListenerRegistry::new();
        registry.register(Arc::new(Named("a", 0)));
        registry.register_with_priority(Arc::new(Named("b", 0)), -5);
        assert_eq!(names(&registry.ordered_listeners(&[])), ["b", "a"]);
    }

    #[test]
    fn test_unregister_removes_all_duplicates() {
        let registry = ListenerRegistry::new();
        let a: Arc<dyn Listener> = Arc::new(Named("a", 0));
        let b: Arc<dyn Listener> = Arc::new(Named("a", 0));
        registry.register(Arc::clone(&a));
        registry.register(Arc::clone(&a));
        registry.register(Arc::clone(&b));
        assert_eq!(registry.unregister(&a), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&b));
        assert_eq!(registry.unregister(&a), 0);
        registry.clear();
        assert!(registry.is_empty());
    }
}
