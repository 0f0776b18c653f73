//! Notification fabric: outbound stream events on a broadcast channel, inbound
//! notifications gated by handle-based subscriptions.

use std::collections::HashMap;

use tokio::sync::broadcast;

use crate::error::StreamError;
use crate::types::{MediaCategory, StreamDescriptor, TrackDescriptor};

/// Events published by a stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    StreamInitialized {
        stream: StreamDescriptor,
        error: Option<StreamError>,
    },
    StreamBufferingCompleted {
        stream: StreamDescriptor,
    },
    ManifestReloadRequested {
        url: String,
    },
}

/// The content-protection error variants a stream reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectionErrorKind {
    KeyError,
    ServerCertificateUpdated,
    LicenseRequestComplete,
    KeySystemSelected,
    KeySessionCreated,
}

impl ProtectionErrorKind {
    pub const ALL: [ProtectionErrorKind; 5] = [
        ProtectionErrorKind::KeyError,
        ProtectionErrorKind::ServerCertificateUpdated,
        ProtectionErrorKind::LicenseRequestComplete,
        ProtectionErrorKind::KeySystemSelected,
        ProtectionErrorKind::KeySessionCreated,
    ];
}

/// Notifications delivered to a stream.
#[derive(Debug, Clone)]
pub enum Notification {
    TrackChanged {
        old: TrackDescriptor,
        new: TrackDescriptor,
    },
    DataUpdateCompleted {
        stream_id: String,
        category: MediaCategory,
        error: Option<String>,
    },
    BufferingCompleted {
        stream_id: String,
        category: MediaCategory,
    },
    Protection {
        kind: ProtectionErrorKind,
        message: String,
    },
}

impl Notification {
    pub fn topic(&self) -> Topic {
        match self {
            Notification::TrackChanged { .. } => Topic::TrackChanged,
            Notification::DataUpdateCompleted { .. } => Topic::DataUpdateCompleted,
            Notification::BufferingCompleted { .. } => Topic::BufferingCompleted,
            Notification::Protection { kind, .. } => Topic::Protection(*kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    TrackChanged,
    DataUpdateCompleted,
    BufferingCompleted,
    Protection(ProtectionErrorKind),
}

/// Outbound event bus. Cloning shares the channel.
#[derive(Clone, Debug)]
pub struct NotificationBus {
    tx: broadcast::Sender<StreamEvent>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Events are dropped when nobody listens.
    pub fn publish(&self, event: StreamEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// Subscriptions held by one component.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    next_id: u64,
    active: HashMap<SubscriptionHandle, Topic>,
}

impl SubscriptionRegistry {
    pub fn subscribe(&mut self, topic: Topic) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_id);
        self.next_id += 1;
        self.active.insert(handle, topic);
        handle
    }

    /// Returns whether the handle was still registered.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.active.remove(&handle).is_some()
    }

    pub fn unsubscribe_all(&mut self) {
        self.active.clear();
    }

    pub fn is_subscribed(&self, topic: Topic) -> bool {
        self.active.values().any(|t| *t == topic)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsubscribe_removes_only_its_handle() {
        let mut registry = SubscriptionRegistry::default();
        let a = registry.subscribe(Topic::TrackChanged);
        let b = registry.subscribe(Topic::TrackChanged);

        assert!(registry.unsubscribe(a));
        assert!(registry.is_subscribed(Topic::TrackChanged));
        assert!(!registry.unsubscribe(a));
        assert!(registry.unsubscribe(b));
        assert!(!registry.is_subscribed(Topic::TrackChanged));
    }

    #[test]
    fn protection_topics_are_distinct() {
        let mut registry = SubscriptionRegistry::default();
        registry.subscribe(Topic::Protection(ProtectionErrorKind::KeyError));
        assert!(registry.is_subscribed(Topic::Protection(ProtectionErrorKind::KeyError)));
        assert!(!registry.is_subscribed(Topic::Protection(ProtectionErrorKind::KeySessionCreated)));
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = NotificationBus::new(4);
        bus.publish(StreamEvent::ManifestReloadRequested { url: "a.mpd".into() });
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = NotificationBus::new(4);
        let mut rx = bus.subscribe();
        bus.publish(StreamEvent::ManifestReloadRequested { url: "a.mpd".into() });
        match rx.recv().await.unwrap() {
            StreamEvent::ManifestReloadRequested { url } => assert_eq!(url, "a.mpd"),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
