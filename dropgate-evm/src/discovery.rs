//! Wallet provider discovery and vendor classification.
//!
//! The injected namespace (`window.ethereum` in a browser) either exposes a
//! list of sub-providers or is itself the single endpoint. [`scan`] turns
//! whatever is there into a fresh list of [`ProviderDescriptor`]s; every
//! re-scan fully replaces the previous result.
//!
//! Classification is deliberately centralized here because the vendor flags
//! are mutually dishonest: Trust Wallet sets the generic MetaMask flag for
//! compatibility, so its own markers must win whenever both are present,
//! while a real MetaMask is recognized by its private namespace or
//! unlocked-state marker.

use std::fmt;
use std::sync::Arc;

use crate::endpoint::{EndpointFlags, WalletEndpoint};
use crate::runtime::HostRuntime;

/// Closed set of wallet vendors this flow distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletVendor {
    /// MetaMask extension (the primary vendor).
    MetaMask,
    /// Trust Wallet (secondary, mobile-first vendor).
    Trust,
    /// Remote QR/deep-link pairing; synthetic, no injected endpoint.
    WalletConnect,
    /// Endpoint present but not recognized.
    Unknown,
}

impl WalletVendor {
    /// Stable identifier used for persistence and lookups.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::MetaMask => "metamask",
            Self::Trust => "trust",
            Self::WalletConnect => "walletconnect",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a persisted vendor identifier.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "metamask" => Some(Self::MetaMask),
            "trust" => Some(Self::Trust),
            "walletconnect" => Some(Self::WalletConnect),
            _ => None,
        }
    }

    /// Human-readable wallet name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::MetaMask => "MetaMask",
            Self::Trust => "Trust Wallet",
            Self::WalletConnect => "WalletConnect",
            Self::Unknown => "Unknown Wallet",
        }
    }
}

impl fmt::Display for WalletVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One detected injected wallet endpoint.
#[derive(Clone)]
pub struct ProviderDescriptor {
    /// Position in the namespace's sub-provider list, or `None` for the
    /// single global endpoint and synthetic entries.
    pub index: Option<usize>,
    /// Human-readable name.
    pub name: &'static str,
    /// Vendor classification, derived once at scan time.
    pub vendor: WalletVendor,
    /// Handle to the underlying endpoint. `None` only for the synthetic
    /// WalletConnect entry.
    pub endpoint: Option<Arc<dyn WalletEndpoint>>,
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("vendor", &self.vendor)
            .field("has_endpoint", &self.endpoint.is_some())
            .finish()
    }
}

/// The global injected wallet namespace.
///
/// Implementations only read ambient state; no network calls.
pub trait InjectedNamespace: Send + Sync {
    /// The namespace's sub-provider list, if it multiplexes several
    /// endpoints.
    fn providers(&self) -> Option<Vec<Arc<dyn WalletEndpoint>>>;

    /// The namespace itself as a single endpoint, if present.
    fn root(&self) -> Option<Arc<dyn WalletEndpoint>>;
}

/// Namespace with no injected provider at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyNamespace;

impl InjectedNamespace for EmptyNamespace {
    fn providers(&self) -> Option<Vec<Arc<dyn WalletEndpoint>>> {
        None
    }
    fn root(&self) -> Option<Arc<dyn WalletEndpoint>> {
        None
    }
}

/// Classifies one endpoint by its static vendor markers.
///
/// Checked in order, first match wins:
///
/// 1. MetaMask's private/unlocked markers, unless a Trust marker is also
///    present (an endpoint carrying both is not a real MetaMask).
/// 2. Either Trust marker. Wins over the generic `isMetaMask` flag, which
///    Trust sets for compatibility.
/// 3. The generic `isMetaMask` flag alone.
#[must_use]
pub fn classify(flags: EndpointFlags) -> WalletVendor {
    let trust_marker = flags.is_trust || flags.is_trust_wallet;
    if (flags.has_metamask_internal || flags.reports_unlocked) && !trust_marker {
        WalletVendor::MetaMask
    } else if trust_marker {
        WalletVendor::Trust
    } else if flags.is_metamask {
        WalletVendor::MetaMask
    } else {
        WalletVendor::Unknown
    }
}

/// Scans the injected namespace and returns a fresh descriptor list.
///
/// Sub-providers are classified individually; a lone root endpoint is
/// classified as itself. On a mobile runtime a synthetic WalletConnect
/// entry is always appended, regardless of what was injected. The returned
/// list fully replaces any previous scan.
#[must_use]
pub fn scan(
    namespace: &dyn InjectedNamespace,
    runtime: &dyn HostRuntime,
) -> Vec<ProviderDescriptor> {
    let mut found = Vec::new();

    if let Some(providers) = namespace.providers() {
        for (index, endpoint) in providers.into_iter().enumerate() {
            let vendor = classify(endpoint.flags());
            found.push(ProviderDescriptor {
                index: Some(index),
                name: vendor.display_name(),
                vendor,
                endpoint: Some(endpoint),
            });
        }
    } else if let Some(endpoint) = namespace.root() {
        let vendor = classify(endpoint.flags());
        let name = if vendor == WalletVendor::Unknown {
            "Web3 Provider"
        } else {
            vendor.display_name()
        };
        found.push(ProviderDescriptor {
            index: None,
            name,
            vendor,
            endpoint: Some(endpoint),
        });
    }

    if runtime.is_mobile() {
        found.push(ProviderDescriptor {
            index: None,
            name: WalletVendor::WalletConnect.display_name(),
            vendor: WalletVendor::WalletConnect,
            endpoint: None,
        });
    }

    tracing::debug!(
        count = found.len(),
        vendors = ?found.iter().map(|d| d.vendor).collect::<Vec<_>>(),
        "provider scan complete"
    );
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockEndpoint, MockNamespace, MockRuntime};

    fn flags(
        is_metamask: bool,
        is_trust: bool,
        has_internal: bool,
        unlocked: bool,
    ) -> EndpointFlags {
        EndpointFlags {
            is_metamask,
            is_trust,
            is_trust_wallet: false,
            has_metamask_internal: has_internal,
            reports_unlocked: unlocked,
        }
    }

    #[test]
    fn classification_precedence() {
        // Real MetaMask: private marker, no trust flags.
        assert_eq!(classify(flags(true, false, true, false)), WalletVendor::MetaMask);
        // Unlocked-state marker alone is also MetaMask.
        assert_eq!(classify(flags(false, false, false, true)), WalletVendor::MetaMask);
        // Trust marker wins even alongside the internal marker.
        assert_eq!(classify(flags(true, true, true, false)), WalletVendor::Trust);
        // Trust impersonating via generic isMetaMask.
        assert_eq!(classify(flags(true, true, false, false)), WalletVendor::Trust);
        // isTrustWallet variant counts as a trust marker.
        let f = EndpointFlags {
            is_metamask: true,
            is_trust_wallet: true,
            ..EndpointFlags::default()
        };
        assert_eq!(classify(f), WalletVendor::Trust);
        // Generic flag alone is treated as MetaMask.
        assert_eq!(classify(flags(true, false, false, false)), WalletVendor::MetaMask);
        // Nothing recognizable.
        assert_eq!(classify(flags(false, false, false, false)), WalletVendor::Unknown);
    }

    #[test]
    fn scan_classifies_sub_providers_individually() {
        let metamask = MockEndpoint::metamask();
        let trust = MockEndpoint::trust();
        let namespace = MockNamespace::with_providers(vec![metamask, trust]);
        let runtime = MockRuntime::desktop();

        let descriptors = scan(&namespace, &runtime);
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].index, Some(0));
        assert_eq!(descriptors[0].vendor, WalletVendor::MetaMask);
        assert_eq!(descriptors[1].index, Some(1));
        assert_eq!(descriptors[1].vendor, WalletVendor::Trust);
    }

    #[test]
    fn scan_classifies_single_root_endpoint() {
        let namespace = MockNamespace::with_root(MockEndpoint::metamask());
        let descriptors = scan(&namespace, &MockRuntime::desktop());
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].index, None);
        assert_eq!(descriptors[0].vendor, WalletVendor::MetaMask);
    }

    #[test]
    fn scan_labels_unrecognized_root_as_generic() {
        let namespace = MockNamespace::with_root(MockEndpoint::with_flags(EndpointFlags::default()));
        let descriptors = scan(&namespace, &MockRuntime::desktop());
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].vendor, WalletVendor::Unknown);
        assert_eq!(descriptors[0].name, "Web3 Provider");
    }

    #[test]
    fn mobile_scan_appends_walletconnect() {
        let descriptors = scan(&EmptyNamespace, &MockRuntime::mobile());
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].vendor, WalletVendor::WalletConnect);
        assert!(descriptors[0].endpoint.is_none());

        // Appended even when endpoints exist.
        let namespace = MockNamespace::with_root(MockEndpoint::metamask());
        let descriptors = scan(&namespace, &MockRuntime::mobile());
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[1].vendor, WalletVendor::WalletConnect);
    }

    #[test]
    fn rescan_replaces_rather_than_accumulates() {
        let namespace = MockNamespace::with_root(MockEndpoint::metamask());
        let runtime = MockRuntime::desktop();
        let first = scan(&namespace, &runtime);
        let second = scan(&namespace, &runtime);
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn vendor_id_roundtrip() {
        for vendor in [
            WalletVendor::MetaMask,
            WalletVendor::Trust,
            WalletVendor::WalletConnect,
        ] {
            assert_eq!(WalletVendor::from_id(vendor.id()), Some(vendor));
        }
        assert_eq!(WalletVendor::from_id("unknown"), None);
        assert_eq!(WalletVendor::from_id(""), None);
    }
}
