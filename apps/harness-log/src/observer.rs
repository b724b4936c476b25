//! Observer registry
//!
//! Keeps subscribers in registration order. The registry only stores and
//! hands out observers; invoking them, and isolating a failing one from the
//! rest, is up to the context that owns the logger.

/// Handle returned by [`ObserverRegistry::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Debug)]
pub struct ObserverRegistry<O> {
    next_id: u64,
    observers: Vec<(ObserverId, O)>,
}

impl<O> Default for ObserverRegistry<O> {
    fn default() -> Self {
        Self {
            next_id: 0,
            observers: Vec::new(),
        }
    }
}

impl<O> ObserverRegistry<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: O) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Returns false if `id` was not registered (or already removed)
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &O> {
        self.observers.iter().map(|(_, observer)| observer)
    }
}

impl<O: Clone> ObserverRegistry<O> {
    /// Copy of the current observers, so they can be invoked without holding
    /// whatever guards the registry.
    pub fn snapshot(&self) -> Vec<O> {
        self.iter().cloned().collect()
    }
}
