//! Injected external-collaborator interfaces.
//!
//! The concrete wallet provider (authentication UI, network transport) and
//! the chain-specific handle construction live outside this crate. The
//! session consumes them through these narrow traits, so test doubles can
//! stand in for the real thing.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::ProviderError;
use crate::wallet::Wallet;

/// Opaque connection state from a successful [`WalletProvider::connect`].
///
/// The registry never looks inside; only the matching [`WalletBuilder`]
/// recovers the concrete type.
pub struct ProviderHandle(Box<dyn Any + Send + Sync>);

impl ProviderHandle {
    pub fn new(state: impl Any + Send + Sync) -> Self {
        Self(Box::new(state))
    }

    /// Recover the concrete connection state.
    pub fn downcast<T: Any>(self) -> Result<Box<T>, Self> {
        self.0.downcast::<T>().map_err(Self)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProviderHandle(..)")
    }
}

/// Notification that the provider's active wallet address changed
/// out-of-band. Receives the raw, unscoped address.
pub type DriftCallback = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

/// Notification that the provider ended its session.
pub type LogoutCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// The external wallet provider, reduced to the operations the core
/// consumes.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Stable provider name used to scope device identities and event
    /// topics.
    fn name(&self) -> &str;

    /// Establish a connection. Typically suspends on user interaction or
    /// a network round-trip; this is the session's only blocking step.
    async fn connect(&self) -> Result<ProviderHandle, ProviderError>;

    /// Register the drift notification callback.
    fn on_active_wallet_changed(&self, callback: DriftCallback);

    /// Register the logout notification callback.
    fn on_logout(&self, callback: LogoutCallback);

    /// Ask the provider to end its session. Implementations fire the
    /// logout notification as part of this.
    async fn logout(&self) -> Result<(), ProviderError>;
}

/// Chain-specific wallet construction, injected alongside the provider.
#[async_trait]
pub trait WalletBuilder: Send + Sync {
    /// Build a fully initialized wallet handle from a fresh provider
    /// connection. The handle's own `device_id` is its identity; there is
    /// no separate identity lookup.
    async fn build(&self, connection: ProviderHandle) -> Result<Arc<dyn Wallet>, ProviderError>;
}
