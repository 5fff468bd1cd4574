//! In-flight registry
//!
//! Maps an image id to the callbacks waiting on its resolution. An entry
//! exists exactly while one resolution for that id is running.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::SyncCallback;

/// Outcome of registering interest in an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First request: the caller must launch the resolution
    Started,
    /// A resolution is already running; the callback was appended
    Joined,
}

/// Registry of in-flight resolutions
#[derive(Default)]
pub struct InFlightRegistry {
    entries: Mutex<HashMap<String, Vec<SyncCallback>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<SyncCallback>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check-and-insert in one critical section.
    ///
    /// `None` registers interest without a callback.
    pub fn register(&self, id: &str, callback: Option<SyncCallback>) -> Registration {
        let mut entries = self.lock();
        match entries.get_mut(id) {
            Some(waiting) => {
                waiting.extend(callback);
                Registration::Joined
            }
            None => {
                entries.insert(id.to_string(), callback.into_iter().collect());
                Registration::Started
            }
        }
    }

    /// Remove the entry for `id` and hand back its callbacks in
    /// registration order. `None` if nothing was registered.
    pub fn drain(&self, id: &str) -> Option<Vec<SyncCallback>> {
        self.lock().remove(id)
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl std::fmt::Debug for InFlightRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("in_flight", &self.len())
            .finish()
    }
}
