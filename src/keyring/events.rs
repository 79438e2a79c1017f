//! Lifecycle event topics and subscriptions.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::wallet::DeviceId;

/// Kind of lifecycle event emitted for a device identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Connect,
    Disconnect,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Connect => write!(f, "CONNECT"),
            EventKind::Disconnect => write!(f, "DISCONNECT"),
        }
    }
}

/// Topic triple identifying one event stream: provider, device, kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    pub provider: String,
    pub device: DeviceId,
    pub kind: EventKind,
}

impl Topic {
    pub fn new(provider: impl Into<String>, device: DeviceId, kind: EventKind) -> Self {
        Self {
            provider: provider.into(),
            device,
            kind,
        }
    }

    /// Connect topic for a device under a provider.
    pub fn connect(provider: impl Into<String>, device: DeviceId) -> Self {
        Self::new(provider, device, EventKind::Connect)
    }

    /// Disconnect topic for a device under a provider.
    pub fn disconnect(provider: impl Into<String>, device: DeviceId) -> Self {
        Self::new(provider, device, EventKind::Disconnect)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.provider, self.device, self.kind)
    }
}

/// A delivered lifecycle event. The payload is the device identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEvent {
    pub topic: Topic,
    pub device_id: DeviceId,
}

/// Token identifying one subscription.
pub type SubscriptionId = Uuid;

/// Subscriber callback, invoked synchronously at emit time.
pub type EventCallback = Arc<dyn Fn(&WalletEvent) + Send + Sync>;

pub(crate) struct Subscriber {
    pub(crate) id: SubscriptionId,
    pub(crate) topic: Topic,
    pub(crate) callback: EventCallback,
}
