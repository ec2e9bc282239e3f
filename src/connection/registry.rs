// src/connection/registry.rs

//! The per-connection table of outstanding requests, keyed by handle.
//!
//! Both tables live behind a single lock. Callers register and remove entries
//! from their own tasks while pending results remove themselves once resolved,
//! possibly from a drain running elsewhere.
//!
//! Queries are held strongly so a later drain can collect them. Execs have no
//! drain, so the registry only tracks an exec while its caller still holds it.

use super::listener::RequestKind;
use super::pending::{PendingExecution, PendingQuery};
use super::Handle;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Tables {
    execs: HashMap<Handle, Weak<PendingExecution>>,
    queries: HashMap<Handle, Arc<PendingQuery>>,
}

/// Maps handles to their pending results.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    tables: Mutex<Tables>,
}

impl HandleRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers an exec-class handle. A handle that is already present is
    /// overwritten. The entry disappears once every `Arc` to `pending` is gone.
    pub fn register_exec(self: &Arc<Self>, handle: Handle, pending: Arc<PendingExecution>) {
        pending.bind(Arc::downgrade(self));
        let previous = self
            .tables
            .lock()
            .execs
            .insert(handle, Arc::downgrade(&pending));
        if previous.is_some_and(|old| old.strong_count() > 0) {
            warn!(handle, "Overwrote an outstanding exec registration");
        }
        debug!(handle, "Registered exec");
    }

    /// Registers a query-class handle. A handle that is already present is
    /// overwritten.
    pub fn register_query(self: &Arc<Self>, handle: Handle, pending: Arc<PendingQuery>) {
        pending.bind(Arc::downgrade(self));
        if self.tables.lock().queries.insert(handle, pending).is_some() {
            warn!(handle, "Overwrote an outstanding query registration");
        }
        debug!(handle, "Registered query");
    }

    pub fn remove_exec(&self, handle: Handle) -> Option<Arc<PendingExecution>> {
        self.tables.lock().execs.remove(&handle)?.upgrade()
    }

    /// Removes a query handle. Removing an absent handle is a no-op.
    pub fn remove_query(&self, handle: Handle) -> Option<Arc<PendingQuery>> {
        self.tables.lock().queries.remove(&handle)
    }

    pub fn get_exec(&self, handle: Handle) -> Option<Arc<PendingExecution>> {
        self.tables.lock().execs.get(&handle)?.upgrade()
    }

    pub fn get_query(&self, handle: Handle) -> Option<Arc<PendingQuery>> {
        self.tables.lock().queries.get(&handle).cloned()
    }

    /// The queries outstanding right now. Registrations made after this call
    /// are not part of the returned set.
    pub fn query_snapshot(&self) -> Vec<Arc<PendingQuery>> {
        self.tables.lock().queries.values().cloned().collect()
    }

    /// The number of execs still held by a caller. Abandoned entries are
    /// pruned on the way.
    pub fn exec_count(&self) -> usize {
        let mut tables = self.tables.lock();
        tables.execs.retain(|_, pending| pending.strong_count() > 0);
        tables.execs.len()
    }

    pub fn query_count(&self) -> usize {
        self.tables.lock().queries.len()
    }

    /// Forgets every exec. Called on close, when none of them can be answered.
    pub fn clear_execs(&self) -> usize {
        let mut tables = self.tables.lock();
        let cleared = tables.execs.len();
        tables.execs.clear();
        cleared
    }

    /// Drops the entry for `handle` only if it is the one at `ptr`, so a
    /// resolved slot never evicts a newer registration of the same handle.
    pub(crate) fn release(&self, kind: RequestKind, handle: Handle, ptr: *const ()) {
        let mut tables = self.tables.lock();
        let released = match kind {
            RequestKind::Exec => {
                remove_if(&mut tables.execs, handle, |e| Weak::as_ptr(e) as *const () == ptr)
            }
            RequestKind::Query => {
                remove_if(&mut tables.queries, handle, |e| Arc::as_ptr(e) as *const () == ptr)
            }
        };
        if released {
            debug!(handle, ?kind, "Released resolved handle");
        }
    }
}

fn remove_if<V>(map: &mut HashMap<Handle, V>, handle: Handle, same: impl FnOnce(&V) -> bool) -> bool {
    let matched = map.get(&handle).is_some_and(same);
    if matched {
        map.remove(&handle);
    }
    matched
}
