//! Error types for keywarden.

/// Top-level error type for the registry core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Pairing error: {0}")]
    Pairing(#[from] PairingError),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Failures surfaced by a pairing session.
///
/// Classification happens exactly once, at the adapter boundary: a provider
/// failure is either recognized as user cancellation or passed through
/// unchanged. Nothing downstream re-classifies.
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    /// The user declined the pairing at the provider. Recoverable; the
    /// caller may retry.
    #[error("Pairing cancelled by user")]
    ActionCancelled,

    /// A pairing, reconciliation, or teardown is already in flight for
    /// this session.
    #[error("Session is busy: {state}")]
    Busy { state: String },

    /// Opaque provider failure, propagated unchanged.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Capability-contract violations.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// The caller invoked an operation the wallet does not advertise.
    /// A programming error on the caller's side, not retried.
    #[error("Wallet {device_id} does not support capability {capability}")]
    Unsupported {
        device_id: String,
        capability: String,
    },
}

/// Opaque failure from the external wallet provider.
///
/// The core never inspects this beyond the one-time cancellation
/// classification during pairing.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ProviderError(#[from] anyhow::Error);

impl ProviderError {
    /// Build a provider error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(anyhow::anyhow!(message.into()))
    }
}
