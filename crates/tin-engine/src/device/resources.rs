use std::collections::HashMap;

use super::backend::{ResourceId, ResourceKind};

/// Live native objects of a backend, keyed by handle.
///
/// Indices are never reused, so a stale handle can not alias a newer object.
pub(crate) struct ResourceTable<T> {
    next_index: u64,
    live: HashMap<ResourceId, T>,
}

impl<T> ResourceTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_index: 1,
            live: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, kind: ResourceKind, value: T) -> ResourceId {
        let id = ResourceId::new(self.next_index, kind);
        self.next_index += 1;
        self.live.insert(id, value);
        id
    }

    pub(crate) fn get(&self, id: ResourceId) -> Option<&T> {
        self.live.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ResourceId) -> Option<&mut T> {
        self.live.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: ResourceId) -> Option<T> {
        self.live.remove(&id)
    }

    pub(crate) fn contains(&self, id: ResourceId) -> bool {
        self.live.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub(crate) fn count_of(&self, kind: ResourceKind) -> usize {
        self.live.keys().filter(|id| id.kind() == kind).count()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ResourceId, &T)> {
        self.live.iter().map(|(id, v)| (*id, v))
    }
}
