//! Wallet handles and device identity.

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::{Capability, CapabilitySet};
use crate::error::CapabilityError;

/// Opaque, provider-scoped identifier for one paired wallet instance.
///
/// Registry keys compare exactly (`Eq`/`Hash`). Drift reconciliation
/// compares with [`DeviceId::matches`], the crate's single case-insensitive
/// comparison policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Scope a provider-reported address: `"<provider>:<address>"`.
    pub fn scoped(provider: &str, address: &str) -> Self {
        Self(format!("{provider}:{address}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ASCII case-insensitive equivalence. Both sides are folded.
    ///
    /// This is the only comparison used when deciding whether a provider's
    /// active wallet has drifted away from the current identity.
    pub fn matches(&self, other: &DeviceId) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The registry's view of one connected wallet instance.
///
/// Implementations come from chain-specific collaborators; the core only
/// sees the device identity and the capability set. Chain-specific
/// extension traits are reached by downcasting through [`Wallet::as_any`]
/// after a successful capability probe.
pub trait Wallet: Send + Sync {
    /// Identity this handle is registered under.
    fn device_id(&self) -> &DeviceId;

    /// Human-readable wallet label.
    fn label(&self) -> &str;

    /// Operation groups this handle supports.
    fn capabilities(&self) -> &CapabilitySet;

    /// Probe for a capability, failing with a contract error if absent.
    fn ensure_capability(&self, tag: &Capability) -> Result<(), CapabilityError> {
        self.capabilities().ensure(self.device_id(), tag)
    }

    /// Downcast support for chain-specific extension traits.
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("device_id", self.device_id())
            .field("label", &self.label())
            .finish()
    }
}

/// Registration metadata the keyring keeps for each wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    /// When the wallet was registered.
    pub paired_at: DateTime<Utc>,
    /// When the wallet was last seen active.
    pub last_seen: DateTime<Utc>,
}

impl WalletEntry {
    pub(crate) fn new() -> Self {
        let now = Utc::now();
        Self {
            paired_at: now,
            last_seen: now,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_seen = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_identity_format() {
        let id = DeviceId::scoped("portis", "0xAA");
        assert_eq!(id.as_str(), "portis:0xAA");
        assert_eq!(id.to_string(), "portis:0xAA");
    }

    #[test]
    fn test_matches_is_case_insensitive_both_ways() {
        let upper = DeviceId::new("portis:0xAA");
        let lower = DeviceId::new("portis:0xaa");
        assert!(upper.matches(&lower));
        assert!(lower.matches(&upper));
        assert!(upper.matches(&upper));

        let other = DeviceId::new("portis:0xBB");
        assert!(!upper.matches(&other));
    }

    #[test]
    fn test_exact_equality_is_case_sensitive() {
        // Registry keys are exact; only drift reconciliation folds case.
        assert_ne!(DeviceId::new("portis:0xAA"), DeviceId::new("portis:0xaa"));
        assert_eq!(DeviceId::new("portis:0xAA"), DeviceId::new("portis:0xAA"));
    }

    #[test]
    fn test_entry_touch_advances_last_seen() {
        let mut entry = WalletEntry::new();
        let before = entry.last_seen;
        entry.touch();
        assert!(entry.last_seen >= before);
        assert!(entry.paired_at <= entry.last_seen);
    }
}
