//! Resolvable, reference-counted handles to open containers.
//!
//! A decoded reference only carries a token. To dereference it later the
//! reference must remember which container it was read from; it does so by
//! holding a [`LocationHandle`] issued by a [`HandleRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use hcf_types::ContainerId;
use tracing::{debug, warn};

use crate::container::Container;
use crate::error::{RefError, Result};

/// Registry-assigned identifier of a container handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle:{}", self.0)
    }
}

struct Entry {
    container: Arc<dyn Container>,
    count: usize,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<HandleId, Entry>,
    by_container: HashMap<ContainerId, HandleId>,
    next_id: u64,
}

/// Maps handle ids to open containers, with a reference count per id.
///
/// An id stays registered while at least one [`LocationHandle`] for it is
/// alive; the last drop unregisters it.
#[derive(Default)]
pub struct HandleRegistry {
    state: RwLock<RegistryState>,
}

impl HandleRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Acquire an owned handle for `container`.
    ///
    /// Reuses the id already registered for the container, if any.
    pub fn file_handle(self: &Arc<Self>, container: &Arc<dyn Container>) -> LocationHandle {
        let mut state = self.state.write().expect("lock poisoned");
        let existing = state.by_container.get(&container.id()).copied();
        let id = match existing {
            Some(id) => {
                if let Some(entry) = state.entries.get_mut(&id) {
                    entry.count += 1;
                }
                id
            }
            None => {
                state.next_id += 1;
                let id = HandleId(state.next_id);
                state.entries.insert(
                    id,
                    Entry {
                        container: Arc::clone(container),
                        count: 1,
                    },
                );
                state.by_container.insert(container.id(), id);
                debug!(%id, container = %container.id(), "container handle registered");
                id
            }
        };
        LocationHandle {
            id,
            registry: Arc::clone(self),
        }
    }

    /// The container registered under `id`.
    pub fn resolve(&self, id: HandleId) -> Result<Arc<dyn Container>> {
        self.state
            .read()
            .expect("lock poisoned")
            .entries
            .get(&id)
            .map(|e| Arc::clone(&e.container))
            .ok_or_else(|| RefError::BadType(format!("{id} is not registered")))
    }

    /// Current reference count of `id`; zero when unregistered.
    pub fn ref_count(&self, id: HandleId) -> usize {
        self.state
            .read()
            .expect("lock poisoned")
            .entries
            .get(&id)
            .map_or(0, |e| e.count)
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn inc_ref(&self, id: HandleId) -> Result<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or_else(|| RefError::BadType(format!("{id} is not registered")))?;
        entry.count += 1;
        Ok(())
    }

    fn dec_ref(&self, id: HandleId) -> Result<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or_else(|| RefError::CantFree(format!("{id}: not registered")))?;
        entry.count -= 1;
        if entry.count == 0 {
            if let Some(entry) = state.entries.remove(&id) {
                state.by_container.remove(&entry.container.id());
            }
            debug!(%id, "container handle released");
        }
        Ok(())
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("handles", &self.len())
            .finish()
    }
}

/// An owned, counted handle to a registered container.
///
/// Cloning increments the registry count and dropping decrements it, so a
/// handle acquired partway through an operation is released exactly once
/// on every exit path.
pub struct LocationHandle {
    id: HandleId,
    registry: Arc<HandleRegistry>,
}

impl LocationHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The container this handle refers to.
    pub fn resolve(&self) -> Result<Arc<dyn Container>> {
        self.registry.resolve(self.id)
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }
}

impl Clone for LocationHandle {
    fn clone(&self) -> Self {
        if let Err(e) = self.registry.inc_ref(self.id) {
            warn!(id = %self.id, error = %e, "unable to increment handle count");
        }
        Self {
            id: self.id,
            registry: Arc::clone(&self.registry),
        }
    }
}

impl Drop for LocationHandle {
    fn drop(&mut self) {
        if let Err(e) = self.registry.dec_ref(self.id) {
            warn!(id = %self.id, error = %e, "unable to release handle");
        }
    }
}

impl fmt::Debug for LocationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocationHandle").field(&self.id).finish()
    }
}
