//! Pairing-session orchestration.
//!
//! A [`PairingSession`] establishes a wallet connection through an injected
//! provider, registers the resulting handle in the keyring, and keeps that
//! registration consistent with the provider's own notion of its active
//! wallet: out-of-band account switches re-key the registry, provider
//! logouts tear it down, and an idle session is logged out through the
//! provider so teardown stays single-sourced.

mod inactivity;

pub use inactivity::{ActivitySignal, ExpireCallback, InactivityMonitor};

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{PairingError, ProviderError};
use crate::keyring::{Keyring, Topic};
use crate::provider::{WalletBuilder, WalletProvider};
use crate::wallet::{DeviceId, Wallet};

/// Idle window after which a paired session is logged out.
const DEFAULT_IDLE_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Failure-message fragment the default config classifies as user
/// cancellation.
const USER_DENIED_MARKER: &str = "User denied login.";

/// Session policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle window before the session is logged out.
    pub idle_window: Duration,
    /// Provider failure-message fragments classified as user cancellation.
    pub cancellation_markers: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_window: DEFAULT_IDLE_WINDOW,
            cancellation_markers: vec![USER_DENIED_MARKER.to_string()],
        }
    }
}

/// Lifecycle phase of a pairing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Pairing,
    Paired,
    Reconciling,
    LoggedOut,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Pairing => "pairing",
            SessionState::Paired => "paired",
            SessionState::Reconciling => "reconciling",
            SessionState::LoggedOut => "logged-out",
        };
        f.write_str(name)
    }
}

struct SessionShared {
    state: SessionState,
    current: Option<DeviceId>,
}

/// Orchestrates one wallet connection's lifecycle against the keyring.
///
/// Pairing, drift reconciliation, logout handling, and inactivity expiry
/// are mutually exclusive phases: a notification arriving while another
/// phase is in flight is rejected, not interleaved.
pub struct PairingSession {
    keyring: Keyring,
    provider: Arc<dyn WalletProvider>,
    builder: Arc<dyn WalletBuilder>,
    config: SessionConfig,
    monitor: InactivityMonitor,
    shared: StdMutex<SessionShared>,
    /// Held across every phase; notification handlers take it with
    /// `try_lock` so re-entrant provider callbacks are rejected.
    phase: Mutex<()>,
    /// Handed to stored callbacks so a dropped session silences them.
    weak: Weak<Self>,
}

impl PairingSession {
    /// Create a session bound to a keyring and its external collaborators.
    ///
    /// `signals` are the activity sources that keep the session alive; an
    /// empty list means only the idle window governs logout.
    pub fn new(
        keyring: Keyring,
        provider: Arc<dyn WalletProvider>,
        builder: Arc<dyn WalletBuilder>,
        config: SessionConfig,
        signals: Vec<Arc<dyn ActivitySignal>>,
    ) -> Arc<Self> {
        let monitor = InactivityMonitor::new(config.idle_window, signals);
        Arc::new_cyclic(|weak| Self {
            keyring,
            provider,
            builder,
            config,
            monitor,
            shared: StdMutex::new(SessionShared {
                state: SessionState::Idle,
                current: None,
            }),
            phase: Mutex::new(()),
            weak: weak.clone(),
        })
    }

    /// Number of wallets currently registered. Pure query.
    pub fn initialize(&self) -> usize {
        self.keyring.len()
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().expect("session lock poisoned").state
    }

    /// The identity this session considers authoritative, if paired.
    pub fn current_device_id(&self) -> Option<DeviceId> {
        self.shared
            .lock()
            .expect("session lock poisoned")
            .current
            .clone()
    }

    /// Pair with the provider's active wallet.
    ///
    /// On success the handle is registered, a `CONNECT` event is emitted,
    /// the inactivity watch is armed, and the provider's drift and logout
    /// notifications are wired to this session. On failure no partial
    /// registration is left behind: the keyring is only touched after the
    /// handle is fully built.
    pub async fn pair_device(&self) -> Result<Arc<dyn Wallet>, PairingError> {
        let Ok(_phase) = self.phase.try_lock() else {
            return Err(PairingError::Busy {
                state: self.state().to_string(),
            });
        };

        let resume = self.state();
        self.set_state(SessionState::Pairing);

        match self.establish().await {
            Ok(wallet) => {
                self.register_provider_callbacks();
                self.set_state(SessionState::Paired);
                Ok(wallet)
            }
            Err(err) => {
                self.set_state(resume);
                Err(self.classify(err))
            }
        }
    }

    /// Caller-initiated teardown: announce the disconnect, unregister, and
    /// ask the provider to end its session best-effort.
    pub async fn disconnect(&self) -> Result<(), PairingError> {
        {
            let Ok(_phase) = self.phase.try_lock() else {
                return Err(PairingError::Busy {
                    state: self.state().to_string(),
                });
            };
            self.teardown("Wallet disconnected");
        }

        // Outside the phase guard: the provider may deliver its logout
        // notification synchronously, and that handler no-ops cleanly on
        // an already-torn-down session.
        if let Err(err) = self.provider.logout().await {
            tracing::warn!(error = %err, "Provider logout during disconnect failed");
        }
        Ok(())
    }

    /// Reconcile the registry after the provider reports a (possibly)
    /// different active wallet address.
    ///
    /// A no-op when the scoped address matches the current identity
    /// case-insensitively. Otherwise the old registration is disconnected
    /// and the full pairing handshake re-runs against the fresh identity;
    /// re-running the handshake trades latency for a single pairing path
    /// instead of incremental re-keying.
    pub async fn handle_active_wallet_changed(&self, address: String) {
        let Ok(_phase) = self.phase.try_lock() else {
            tracing::warn!(address = %address, state = %self.state(), "Ignoring drift notification while busy");
            return;
        };

        let reported = DeviceId::scoped(self.provider.name(), &address);
        let current = self.current_device_id();
        if let Some(current) = &current
            && current.matches(&reported)
        {
            tracing::debug!(device = %reported, "Active wallet unchanged, nothing to reconcile");
            return;
        }

        self.set_state(SessionState::Reconciling);
        if let Some(old) = current {
            tracing::info!(old = %old, new = %reported, "Active wallet drifted, re-pairing");
            self.keyring.emit(
                Topic::disconnect(self.provider.name(), old.clone()),
                old.clone(),
            );
            self.keyring.remove(&old);
            self.set_current(None);
        } else {
            tracing::info!(new = %reported, "Active wallet reported with no current session, pairing");
        }

        match self.establish().await {
            Ok(_) => self.set_state(SessionState::Paired),
            Err(err) => {
                tracing::warn!(error = %err, "Re-pairing after drift failed");
                self.monitor.disarm();
                self.set_state(SessionState::Idle);
            }
        }
    }

    /// Provider-reported logout: tear down the current registration. The
    /// session returns to idle; no automatic re-pair.
    pub async fn handle_logout(&self) {
        let Ok(_phase) = self.phase.try_lock() else {
            tracing::warn!(state = %self.state(), "Ignoring logout notification while busy");
            return;
        };
        self.teardown("Session logged out");
    }

    /// Run the pairing handshake: connect, build the handle, register it,
    /// announce it, and arm the idle watch. Caller holds the phase guard.
    async fn establish(&self) -> Result<Arc<dyn Wallet>, ProviderError> {
        let connection = self.provider.connect().await?;
        let wallet = self.builder.build(connection).await?;
        let device_id = wallet.device_id().clone();

        self.keyring.add(Arc::clone(&wallet));
        self.set_current(Some(device_id.clone()));
        self.keyring.emit(
            Topic::connect(self.provider.name(), device_id.clone()),
            device_id.clone(),
        );
        tracing::info!(device = %device_id, provider = self.provider.name(), "Wallet paired");

        let session = self.weak.clone();
        self.monitor.arm(move || {
            if let Some(session) = session.upgrade() {
                session.on_idle_expired();
            }
        });

        Ok(wallet)
    }

    /// Classify a pairing failure exactly once at this boundary.
    fn classify(&self, err: ProviderError) -> PairingError {
        let text = err.to_string();
        if self
            .config
            .cancellation_markers
            .iter()
            .any(|marker| text.contains(marker.as_str()))
        {
            tracing::info!("Pairing cancelled by user");
            PairingError::ActionCancelled
        } else {
            PairingError::Provider(err)
        }
    }

    /// Wire the provider's notifications to this session. Registered once
    /// per successful `pair_device`; the handles hold only a weak
    /// reference, so a dropped session silences its callbacks.
    fn register_provider_callbacks(&self) {
        let session = self.weak.clone();
        self.provider.on_active_wallet_changed(Arc::new(move |address: String| {
            let session = session.clone();
            Box::pin(async move {
                if let Some(session) = session.upgrade() {
                    session.handle_active_wallet_changed(address).await;
                }
            })
        }));

        let session = self.weak.clone();
        self.provider.on_logout(Arc::new(move || {
            let session = session.clone();
            Box::pin(async move {
                if let Some(session) = session.upgrade() {
                    session.handle_logout().await;
                }
            })
        }));
    }

    /// Inactivity expiry routes through the provider's own logout so the
    /// notification path stays single-sourced; the keyring is never
    /// mutated from here.
    fn on_idle_expired(&self) {
        tracing::info!(provider = self.provider.name(), "Idle window elapsed, logging out");
        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            if let Err(err) = provider.logout().await {
                tracing::warn!(error = %err, "Provider logout after inactivity failed");
            }
        });
    }

    /// Shared terminal transition: DISCONNECT before removal, idle watch
    /// disarmed, back to idle. Caller holds the phase guard.
    fn teardown(&self, reason: &'static str) {
        self.set_state(SessionState::LoggedOut);
        if let Some(current) = self.take_current() {
            self.keyring.emit(
                Topic::disconnect(self.provider.name(), current.clone()),
                current.clone(),
            );
            self.keyring.remove(&current);
            tracing::info!(device = %current, "{reason}");
        }
        self.monitor.disarm();
        self.set_state(SessionState::Idle);
    }

    fn set_state(&self, next: SessionState) {
        self.shared.lock().expect("session lock poisoned").state = next;
    }

    fn set_current(&self, id: Option<DeviceId>) {
        self.shared.lock().expect("session lock poisoned").current = id;
    }

    fn take_current(&self) -> Option<DeviceId> {
        self.shared
            .lock()
            .expect("session lock poisoned")
            .current
            .take()
    }
}
