//! Identity registry for live windows, trays and menu items.
//!
//! Each category owns one `Registry`. Identifiers are allocated under their
//! own lock and are never handed out twice, even after the object they named
//! has been unregistered, so a stale id can only ever miss.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::lock;

/// Object category tracked by a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Window,
    Tray,
    MenuItem,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Window => "window",
            Self::Tray => "tray",
            Self::MenuItem => "menu item",
        };
        f.write_str(name)
    }
}

/// Id-to-object map for one category
pub struct Registry<T: ?Sized> {
    kind: ObjectKind,
    last_id: Mutex<u64>,
    entries: Mutex<HashMap<u64, Arc<T>>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            last_id: Mutex::new(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Issue the next identifier for this category. The first id is 1.
    pub fn allocate(&self) -> u64 {
        let mut last = lock(&self.last_id);
        *last += 1;
        *last
    }

    pub fn register(&self, id: u64, object: Arc<T>) {
        if lock(&self.entries).insert(id, object).is_some() {
            tracing::warn!(kind = %self.kind, id, "replaced existing registry entry");
        }
    }

    pub fn unregister(&self, id: u64) -> Option<Arc<T>> {
        lock(&self.entries).remove(&id)
    }

    /// `None` means the object was already destroyed (or never existed).
    pub fn lookup(&self, id: u64) -> Option<Arc<T>> {
        lock(&self.entries).get(&id).cloned()
    }

    /// Linear scan under the lock. Only meant for small categories.
    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<Arc<T>> {
        lock(&self.entries)
            .values()
            .find(|object| predicate(object))
            .cloned()
    }

    /// Current entries ordered by id
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        let entries = lock(&self.entries);
        let mut ids: Vec<_> = entries.keys().copied().collect();
        ids.sort_unstable();
        ids.iter().filter_map(|id| entries.get(id).cloned()).collect()
    }

    /// Remove and return every entry, ordered by id
    pub fn drain(&self) -> Vec<Arc<T>> {
        let mut entries: Vec<_> = lock(&self.entries).drain().collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, object)| object).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
