//! Wallet registry and pairing-session lifecycle management.
//!
//! `keywarden` tracks a set of active wallet connections behind a uniform
//! capability interface and keeps each registration consistent with the
//! external provider that backs it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       PairingSession                         │
//! │                                                              │
//! │   WalletProvider ──connect──▶ WalletBuilder ──▶ dyn Wallet   │
//! │        │                                          │          │
//! │        │ drift / logout                           │ add      │
//! │        ▼                                          ▼          │
//! │   InactivityMonitor                            Keyring       │
//! │        │ expiry ──▶ provider.logout()             │ emit     │
//! │        │                                          ▼          │
//! │        └──────────────────────────────▶ CONNECT/DISCONNECT   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`Keyring`] owns the mapping from device identity to wallet handle
//! and fans lifecycle events out to subscribers. A [`PairingSession`]
//! establishes a connection through an injected [`WalletProvider`],
//! registers the handle the injected [`WalletBuilder`] produces, and
//! reconciles the registry when the provider's active wallet drifts, the
//! provider logs out, or the [`InactivityMonitor`]'s idle window elapses.
//! Chain- and feature-specific operations are dispatched only after a
//! [`CapabilitySet`] probe succeeds.

pub mod capability;
pub mod error;
pub mod keyring;
pub mod provider;
pub mod session;
pub mod wallet;

pub use capability::{Capability, CapabilitySet, caps};
pub use error::{CapabilityError, Error, PairingError, ProviderError};
pub use keyring::{EventCallback, EventKind, Keyring, SubscriptionId, Topic, WalletEvent};
pub use provider::{DriftCallback, LogoutCallback, ProviderHandle, WalletBuilder, WalletProvider};
pub use session::{
    ActivitySignal, InactivityMonitor, PairingSession, SessionConfig, SessionState,
};
pub use wallet::{DeviceId, Wallet, WalletEntry};
