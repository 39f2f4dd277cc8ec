//! Local fan-out of session events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use chattray_protocol::types::User;
use chattray_protocol::{EventKind, ForwardedEvent};

/// What a subscriber listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Synthetic: a logon completed.
    UserLoggedOn,
    /// A remote event forwarded from the execution process.
    Forwarded(EventKind),
}

impl From<EventKind> for Topic {
    fn from(kind: EventKind) -> Self {
        Topic::Forwarded(kind)
    }
}

/// An event emitted by the session proxy.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyEvent {
    UserLoggedOn(User),
    Forwarded(ForwardedEvent),
}

impl ProxyEvent {
    pub fn topic(&self) -> Topic {
        match self {
            ProxyEvent::UserLoggedOn(_) => Topic::UserLoggedOn,
            ProxyEvent::Forwarded(event) => Topic::Forwarded(event.kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&ProxyEvent) + Send + Sync>;

#[derive(Default)]
struct Inner {
    listeners: HashMap<Topic, Vec<(SubscriptionId, Listener)>>,
    next_id: u64,
}

/// Topic-keyed listener registry. Purely local; nothing here crosses the
/// process boundary.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, topic: impl Into<Topic>, listener: F) -> SubscriptionId
    where
        F: Fn(&ProxyEvent) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner
            .listeners
            .entry(topic.into())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Subscribes to several topics, delivering into a channel.
    ///
    /// Useful for consumers that react asynchronously; the subscriptions
    /// stay registered until removed with [`EventBus::unsubscribe`].
    pub fn channel(
        &self,
        topics: &[Topic],
    ) -> (Vec<SubscriptionId>, mpsc::UnboundedReceiver<ProxyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ids = topics
            .iter()
            .map(|topic| {
                let tx = tx.clone();
                self.subscribe(*topic, move |event| {
                    let _ = tx.send(event.clone());
                })
            })
            .collect();
        (ids, rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let mut found = false;
        inner.listeners.retain(|_, list| {
            let before = list.len();
            list.retain(|(sid, _)| *sid != id);
            found |= list.len() != before;
            !list.is_empty()
        });
        found
    }

    pub fn listener_count(&self, topic: impl Into<Topic>) -> usize {
        self.lock().listeners.get(&topic.into()).map_or(0, Vec::len)
    }

    /// Delivers `event` to its topic's listeners and returns how many ran.
    pub fn emit(&self, event: &ProxyEvent) -> usize {
        let listeners: Vec<Listener> = self
            .lock()
            .listeners
            .get(&event.topic())
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }
}
