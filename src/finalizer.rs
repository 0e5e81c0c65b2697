//! GC-driven reclamation of native resources.
//!
//! Every handle created by `hold` registers one guaranteed weak callback,
//! tied 1:1 to the handle object. When the collector decides the handle is
//! unreachable — or, at the latest, when the isolate is torn down — the
//! callback frees whatever the slot still owns.
//!
//! The registry below is the bookkeeping side: it pins the `v8::Weak` for
//! each live handle and records which finalizers have already run. Finalizers
//! execute at collector-determined times, so they never remove their own
//! entry; they only mark it, and the script thread prunes dead entries the
//! next time it pumps callbacks. Dropping V8 handles stays out of GC
//! callbacks entirely that way.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::handle::{HandleSlot, SlotId};
use crate::media::MediaLibrary;

struct FinalizerEntry {
    type_name: &'static str,
    slot: *mut HandleSlot,
    _weak: v8::Weak<v8::Object>,
}

/// Per-runtime finalizer bookkeeping. Script-thread only.
pub struct FinalizerRegistry {
    entries: RefCell<HashMap<SlotId, FinalizerEntry>>,
    finalized: RefCell<Vec<SlotId>>,
}

impl Default for FinalizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FinalizerRegistry {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            finalized: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn register(
        &self,
        id: SlotId,
        type_name: &'static str,
        slot: *mut HandleSlot,
        weak: v8::Weak<v8::Object>,
    ) {
        self.entries.borrow_mut().insert(
            id,
            FinalizerEntry {
                type_name,
                slot,
                _weak: weak,
            },
        );
    }

    /// Called from a finalizer once it has released its slot.
    pub(crate) fn mark_finalized(&self, id: SlotId) {
        self.finalized.borrow_mut().push(id);
    }

    /// Drop bookkeeping for handles whose finalizers have run. Must be
    /// called from the script thread with the isolate alive.
    pub(crate) fn prune(&self) {
        let dead: Vec<SlotId> = self.finalized.borrow_mut().drain(..).collect();
        if dead.is_empty() {
            return;
        }
        let mut entries = self.entries.borrow_mut();
        for id in &dead {
            entries.remove(id);
        }
        tracing::trace!(count = dead.len(), "pruned finalized handles");
    }

    /// Number of handles whose finalizer has not yet run.
    pub fn live_handles(&self) -> usize {
        self.entries
            .borrow()
            .len()
            .saturating_sub(self.finalized.borrow().len())
    }

    /// Free every resource still owned by a live handle. Runs during
    /// runtime shutdown, before the isolate is destroyed; the finalizers
    /// that fire during isolate teardown then find empty slots and release
    /// only their own storage.
    pub(crate) fn release_all(&self, library: &dyn MediaLibrary) {
        self.prune();
        let mut entries = self.entries.borrow_mut();
        for (id, entry) in entries.drain() {
            // SAFETY: finalized entries were pruned above, so this handle's
            // finalizer has not run and the slot box is still live.
            let slot = unsafe { &*entry.slot };
            let ptr = slot.clear();
            if !ptr.is_null()
                && let Some(free) = slot.free_fn()
            {
                tracing::debug!(type_name = entry.type_name, slot = id, "shutdown freed resource");
                free(library, ptr);
            }
        }
        self.finalized.borrow_mut().clear();
    }
}
