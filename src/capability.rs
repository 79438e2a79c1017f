//! Capability tags and probes for wallet handles.
//!
//! A wallet advertises the operation groups it supports as an open-ended
//! set of named tags. Callers probe with [`CapabilitySet::has`] before
//! dispatching a chain- or feature-specific operation; new chains add new
//! tags without widening any shared interface.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;
use crate::wallet::DeviceId;

/// A named operation-group tag, e.g. `"sign-tx:ripple"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    /// Create a tag from its name.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for Capability {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// Well-known capability tag constructors.
///
/// Tags are namespaced `<group>:<chain>`, so each chain contributes its
/// own entries without touching existing handles.
pub mod caps {
    use super::Capability;

    /// Address retrieval for a chain.
    pub fn address_derivation(chain: &str) -> Capability {
        Capability::new(format!("address-derivation:{chain}"))
    }

    /// Transaction signing for a chain.
    pub fn sign_tx(chain: &str) -> Capability {
        Capability::new(format!("sign-tx:{chain}"))
    }

    /// Account path enumeration for a chain.
    pub fn account_paths(chain: &str) -> Capability {
        Capability::new(format!("account-paths:{chain}"))
    }

    /// Read-only wallet metadata for a chain.
    pub fn wallet_info(chain: &str) -> Capability {
        Capability::new(format!("wallet-info:{chain}"))
    }
}

/// The set of capability tags one wallet instance supports.
///
/// Immutable after construction; probing is O(1) set membership and stable
/// for the lifetime of the handle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    tags: HashSet<Capability>,
}

impl CapabilitySet {
    /// Create an empty capability set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of a tag.
    pub fn with(mut self, tag: impl Into<Capability>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Presence probe for a tag.
    pub fn has(&self, tag: &Capability) -> bool {
        self.tags.contains(tag)
    }

    /// Probe for a tag, failing with a contract error if absent.
    pub fn ensure(&self, device_id: &DeviceId, tag: &Capability) -> Result<(), CapabilityError> {
        if self.has(tag) {
            Ok(())
        } else {
            Err(CapabilityError::Unsupported {
                device_id: device_id.to_string(),
                capability: tag.to_string(),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterate over the tags in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.tags.iter()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_present_and_absent() {
        let set = CapabilitySet::new()
            .with(caps::address_derivation("ripple"))
            .with(caps::sign_tx("ripple"));

        assert!(set.has(&caps::address_derivation("ripple")));
        assert!(set.has(&caps::sign_tx("ripple")));
        assert!(!set.has(&caps::account_paths("ripple")));
        assert!(!set.has(&caps::sign_tx("cosmos")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_ensure_fails_with_unsupported() {
        let set = CapabilitySet::new().with(caps::wallet_info("ripple"));
        let id = DeviceId::new("portis:0xAA");

        assert!(set.ensure(&id, &caps::wallet_info("ripple")).is_ok());

        let err = set.ensure(&id, &caps::sign_tx("ripple")).unwrap_err();
        assert!(matches!(err, CapabilityError::Unsupported { .. }));
        assert!(err.to_string().contains("sign-tx:ripple"));
        assert!(err.to_string().contains("portis:0xAA"));
    }

    #[test]
    fn test_well_known_tag_formats() {
        assert_eq!(
            caps::address_derivation("ripple").as_str(),
            "address-derivation:ripple"
        );
        assert_eq!(caps::sign_tx("ripple").as_str(), "sign-tx:ripple");
        assert_eq!(caps::account_paths("eth").as_str(), "account-paths:eth");
        assert_eq!(caps::wallet_info("eth").as_str(), "wallet-info:eth");
    }

    #[test]
    fn test_open_ended_tags() {
        // Chains unknown at build time are just more tags.
        let set = CapabilitySet::new().with("sign-tx:some-future-chain");
        assert!(set.has(&Capability::new("sign-tx:some-future-chain")));
    }

    #[test]
    fn test_serde_round_trip() {
        let set = CapabilitySet::new().with(caps::sign_tx("ripple"));
        let json = serde_json::to_string(&set).unwrap();
        let back: CapabilitySet = serde_json::from_str(&json).unwrap();
        assert!(back.has(&caps::sign_tx("ripple")));
    }
}
