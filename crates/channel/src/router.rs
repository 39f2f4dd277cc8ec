//! Name-keyed handler registry for inbound messages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

type Handler = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// Identifies a registered listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    listeners: HashMap<String, Vec<Listener>>,
    next_id: u64,
    closed: bool,
}

/// Routes inbound messages to handlers by message name.
///
/// Handlers run on the endpoint's dispatch task, in arrival order, and
/// must not block. Once the router is closed every handler is dropped and
/// later registrations are discarded immediately.
#[derive(Clone, Default)]
pub struct Router {
    inner: Arc<Mutex<Inner>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a handler invoked for every message named `name`.
    pub fn on<F>(&self, name: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(Vec<Value>) + Send + Sync + 'static,
    {
        self.register(name.into(), false, Arc::new(handler))
    }

    /// Registers a handler invoked for the next message named `name` only.
    pub fn once<F>(&self, name: impl Into<String>, handler: F) -> ListenerId
    where
        F: FnOnce(Vec<Value>) + Send + 'static,
    {
        let slot = Mutex::new(Some(handler));
        let handler = move |payload: Vec<Value>| {
            let taken = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(f) = taken {
                f(payload);
            }
        };
        self.register(name.into(), true, Arc::new(handler))
    }

    fn register(&self, name: String, once: bool, handler: Handler) -> ListenerId {
        let mut inner = self.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        if inner.closed {
            // Dropping the handler here releases whatever it captured.
            return id;
        }
        inner.listeners.entry(name).or_default().push(Listener {
            id,
            once,
            handler,
        });
        id
    }

    /// Removes a listener. Returns `false` if it already fired or was removed.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let mut found = false;
        inner.listeners.retain(|_, list| {
            let before = list.len();
            list.retain(|l| l.id != id);
            found |= list.len() != before;
            !list.is_empty()
        });
        found
    }

    /// Number of listeners currently registered under `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.lock().listeners.get(name).map_or(0, Vec::len)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Invokes the handlers registered for `name`. Returns `false` when
    /// nobody was listening.
    pub(crate) fn dispatch(&self, name: &str, payload: Vec<Value>) -> bool {
        let handlers: Vec<Handler> = {
            let mut inner = self.lock();
            let Some(list) = inner.listeners.get_mut(name) else {
                return false;
            };
            let handlers = list.iter().map(|l| l.handler.clone()).collect();
            list.retain(|l| !l.once);
            if list.is_empty() {
                inner.listeners.remove(name);
            }
            handlers
        };

        let count = handlers.len();
        for (i, handler) in handlers.into_iter().enumerate() {
            if i + 1 == count {
                handler(payload);
                break;
            }
            handler(payload.clone());
        }
        count > 0
    }

    /// Drops every listener and refuses new ones.
    pub(crate) fn close(&self) {
        let drained = {
            let mut inner = self.lock();
            inner.closed = true;
            std::mem::take(&mut inner.listeners)
        };
        drop(drained);
    }
}
