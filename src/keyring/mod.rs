//! Wallet registry with lifecycle event fan-out.
//!
//! The keyring owns the mapping from device identity to wallet handle and
//! is its sole mutator. Lifecycle events are published to subscribers by
//! (provider, device, kind) topic. The mapping and the subscriber list
//! live behind one lock so registration changes never race event delivery.

mod events;

pub use events::{EventCallback, EventKind, SubscriptionId, Topic, WalletEvent};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::wallet::{DeviceId, Wallet, WalletEntry};

struct Registered {
    wallet: Arc<dyn Wallet>,
    entry: WalletEntry,
}

#[derive(Default)]
struct KeyringInner {
    wallets: HashMap<DeviceId, Registered>,
    subscribers: Vec<events::Subscriber>,
}

/// Registry owning all active wallet handles and their lifecycle events.
///
/// Cheap to clone; clones share the same underlying registry. All
/// operations are synchronous and non-blocking.
#[derive(Clone)]
pub struct Keyring {
    inner: Arc<RwLock<KeyringInner>>,
}

impl Keyring {
    /// Create an empty keyring.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(KeyringInner::default())),
        }
    }

    /// Insert or replace the registration for the handle's own identity.
    ///
    /// Keying by the handle's `device_id` keeps the mapping invariant
    /// (entry key equals handle identity) true by construction. Returns
    /// the displaced handle, if any. Emits nothing; callers emit around
    /// registration changes.
    pub fn add(&self, wallet: Arc<dyn Wallet>) -> Option<Arc<dyn Wallet>> {
        let id = wallet.device_id().clone();
        let mut inner = self.inner.write().expect("keyring lock poisoned");
        let displaced = inner.wallets.insert(
            id.clone(),
            Registered {
                wallet,
                entry: WalletEntry::new(),
            },
        );
        tracing::debug!(device = %id, replaced = displaced.is_some(), "Wallet registered");
        displaced.map(|r| r.wallet)
    }

    /// Remove the registration for `id`, returning the handle if present.
    ///
    /// An absent id is a silent no-op: disconnects race re-pairing under
    /// the reconciliation protocol, so missing entries are expected.
    pub fn remove(&self, id: &DeviceId) -> Option<Arc<dyn Wallet>> {
        let mut inner = self.inner.write().expect("keyring lock poisoned");
        let removed = inner.wallets.remove(id);
        if removed.is_some() {
            tracing::debug!(device = %id, "Wallet unregistered");
        }
        removed.map(|r| r.wallet)
    }

    /// Look up a registered handle by identity.
    pub fn get(&self, id: &DeviceId) -> Option<Arc<dyn Wallet>> {
        let inner = self.inner.read().expect("keyring lock poisoned");
        inner.wallets.get(id).map(|r| Arc::clone(&r.wallet))
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        let inner = self.inner.read().expect("keyring lock poisoned");
        inner.wallets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().expect("keyring lock poisoned");
        inner.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the current registrations.
    ///
    /// A copy, never the live mapping; mutating the result has no effect
    /// on the registry.
    pub fn wallets(&self) -> Vec<(DeviceId, Arc<dyn Wallet>)> {
        let inner = self.inner.read().expect("keyring lock poisoned");
        inner
            .wallets
            .iter()
            .map(|(id, r)| (id.clone(), Arc::clone(&r.wallet)))
            .collect()
    }

    /// Registration metadata for `id`, if registered.
    pub fn entry(&self, id: &DeviceId) -> Option<WalletEntry> {
        let inner = self.inner.read().expect("keyring lock poisoned");
        inner.wallets.get(id).map(|r| r.entry.clone())
    }

    /// Refresh the last-seen timestamp for `id`. Returns `false` if the
    /// identity is not registered.
    pub fn touch(&self, id: &DeviceId) -> bool {
        let mut inner = self.inner.write().expect("keyring lock poisoned");
        match inner.wallets.get_mut(id) {
            Some(r) => {
                r.entry.touch();
                true
            }
            None => false,
        }
    }

    /// Subscribe a callback to one topic. Multiple subscribers per topic
    /// are allowed; delivery order is registration order.
    pub fn subscribe(
        &self,
        topic: Topic,
        callback: impl Fn(&WalletEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = Uuid::new_v4();
        let mut inner = self.inner.write().expect("keyring lock poisoned");
        inner.subscribers.push(events::Subscriber {
            id,
            topic,
            callback: Arc::new(callback),
        });
        id
    }

    /// Drop a subscription. Returns `false` if the token was not found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.write().expect("keyring lock poisoned");
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != id);
        inner.subscribers.len() < before
    }

    /// Publish an event to all subscribers whose topic matches.
    ///
    /// The matching list is snapshotted first and each subscription is
    /// re-checked immediately before its callback runs: a subscriber
    /// removed mid-delivery (including by an earlier callback) is not
    /// invoked, and no other subscriber is skipped. No lock is held while
    /// a callback runs, so callbacks may mutate the registry.
    pub fn emit(&self, topic: Topic, device_id: DeviceId) {
        let event = WalletEvent { topic, device_id };
        let matched: Vec<(SubscriptionId, EventCallback)> = {
            let inner = self.inner.read().expect("keyring lock poisoned");
            inner
                .subscribers
                .iter()
                .filter(|s| s.topic == event.topic)
                .map(|s| (s.id, Arc::clone(&s.callback)))
                .collect()
        };

        tracing::debug!(topic = %event.topic, subscribers = matched.len(), "Emitting wallet event");

        for (id, callback) in matched {
            let still_registered = {
                let inner = self.inner.read().expect("keyring lock poisoned");
                inner.subscribers.iter().any(|s| s.id == id)
            };
            if still_registered {
                callback(&event);
            }
        }
    }
}

impl Default for Keyring {
    fn default() -> Self {
        Self::new()
    }
}
