//! Wallet connection lifecycle.
//!
//! [`WalletSession`] owns the mutable connection state (active account,
//! chain, vendor) and drives the connect flow: provider lookup, account
//! authorization, chain alignment, persistence of the chosen vendor, and
//! the endpoint event listener. Exactly one connect attempt runs at a
//! time; a second call while one is in flight is a no-op.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::Address;
use dropgate::network::TargetNetwork;
use dropgate::notify::Notifier;
use dropgate::storage::KeyValueStore;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use url::Url;

use crate::chain::{self, AddChainParams, SwitchChainParams};
use crate::discovery::{self, InjectedNamespace, ProviderDescriptor, WalletVendor};
use crate::endpoint::{EndpointError, EndpointEvent, WalletEndpoint, methods};
use crate::runtime::HostRuntime;

/// Storage key holding the id of the last connected vendor. Matches the
/// original site's storage layout.
pub const ACTIVE_WALLET_KEY: &str = "activeWallet";

/// MetaMask mobile deep-link prefix; host and path of the current page are
/// appended.
pub const METAMASK_DEEPLINK_PREFIX: &str = "https://metamask.app.link/dapp/";

/// MetaMask install page.
pub const METAMASK_INSTALL_URL: &str = "https://metamask.io/download/";

/// Trust Wallet deep-link base; the page URL goes in the `url` query pair.
pub const TRUST_DEEPLINK_BASE: &str = "https://link.trustwallet.com/open_url";

/// Trust Wallet install page.
pub const TRUST_INSTALL_URL: &str = "https://trustwallet.com/download";

/// Delay between a chain change and the page reload that follows it.
const DEFAULT_RELOAD_DELAY: Duration = Duration::from_millis(1500);

/// Why a connect attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// The user declined the wallet's connection prompt.
    #[error("connection rejected in the wallet")]
    Rejected,
    /// The wallet already has a connection prompt open.
    #[error("a connection request is already pending, open your wallet to continue")]
    RequestPending,
    /// The requested vendor has no injected endpoint.
    #[error("{0} was not detected")]
    WalletNotFound(WalletVendor),
    /// Any other wallet-reported failure.
    #[error(transparent)]
    Endpoint(EndpointError),
}

impl ConnectError {
    fn from_endpoint(error: EndpointError) -> Self {
        if error.is_user_rejected() {
            Self::Rejected
        } else if error.is_request_pending() {
            Self::RequestPending
        } else {
            Self::Endpoint(error)
        }
    }
}

/// Snapshot of the current connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    /// The active account, when connected.
    pub account: Option<Address>,
    /// Chain the wallet currently reports. May differ from the target
    /// network when switching failed.
    pub chain_id: Option<u64>,
    /// Vendor of the connected endpoint.
    pub vendor: Option<WalletVendor>,
    /// Message of the most recent connect failure, cleared on success.
    pub last_error: Option<String>,
}

struct SessionInner {
    network: TargetNetwork,
    namespace: Arc<dyn InjectedNamespace>,
    runtime: Arc<dyn HostRuntime>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn KeyValueStore>,
    state: Mutex<ConnectionState>,
    endpoint: Mutex<Option<Arc<dyn WalletEndpoint>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    connecting: AtomicBool,
    reload_delay: Mutex<Duration>,
}

/// Manages the wallet connection for one target network.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct WalletSession {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSession")
            .field("network", &self.inner.network.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl WalletSession {
    /// Creates a disconnected session bound to `network`.
    #[must_use]
    pub fn new(
        network: TargetNetwork,
        namespace: Arc<dyn InjectedNamespace>,
        runtime: Arc<dyn HostRuntime>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                network,
                namespace,
                runtime,
                notifier,
                store,
                state: Mutex::new(ConnectionState::default()),
                endpoint: Mutex::new(None),
                listener: Mutex::new(None),
                connecting: AtomicBool::new(false),
                reload_delay: Mutex::new(DEFAULT_RELOAD_DELAY),
            }),
        }
    }

    /// Overrides the delay between a chain change and the page reload.
    /// Takes effect for all clones of this session.
    #[must_use]
    pub fn with_reload_delay(self, delay: Duration) -> Self {
        *self.inner.reload_delay.lock().expect("reload delay lock") = delay;
        self
    }

    /// Returns a snapshot of the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().expect("session state lock").clone()
    }

    /// The connected account, if any.
    #[must_use]
    pub fn account(&self) -> Option<Address> {
        self.state().account
    }

    /// The chain the wallet currently reports, if connected.
    #[must_use]
    pub fn chain_id(&self) -> Option<u64> {
        self.state().chain_id
    }

    /// Whether a wallet is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().account.is_some()
    }

    /// Whether the connected wallet is on the target network.
    #[must_use]
    pub fn is_correct_network(&self) -> bool {
        self.chain_id() == Some(self.inner.network.chain_id)
    }

    /// The network this session targets.
    #[must_use]
    pub fn network(&self) -> &TargetNetwork {
        &self.inner.network
    }

    /// The connected endpoint, for components issuing their own wallet
    /// calls.
    #[must_use]
    pub fn endpoint(&self) -> Option<Arc<dyn WalletEndpoint>> {
        self.inner.endpoint.lock().expect("endpoint lock").clone()
    }

    /// Scans the injected namespace for available providers.
    #[must_use]
    pub fn scan(&self) -> Vec<ProviderDescriptor> {
        discovery::scan(self.inner.namespace.as_ref(), self.inner.runtime.as_ref())
    }

    /// The vendor persisted by the last successful connect, if any.
    #[must_use]
    pub fn saved_vendor(&self) -> Option<WalletVendor> {
        self.inner
            .store
            .get(ACTIVE_WALLET_KEY)
            .ok()
            .flatten()
            .as_deref()
            .and_then(WalletVendor::from_id)
    }

    /// Connects to the given wallet vendor.
    ///
    /// Returns `Ok(true)` when an account is connected, `Ok(false)` for the
    /// benign no-op outcomes: another attempt already in flight, a mobile
    /// deep-link redirect, the unsupported WalletConnect option, or the
    /// wallet returning zero accounts.
    ///
    /// # Errors
    ///
    /// [`ConnectError`] when the wallet is missing or the authorization
    /// flow fails. Failures are also surfaced through the notifier and
    /// recorded in [`ConnectionState::last_error`].
    pub async fn connect(&self, vendor: WalletVendor) -> Result<bool, ConnectError> {
        if self.inner.connecting.swap(true, Ordering::SeqCst) {
            tracing::debug!(%vendor, "connect attempt already in flight, ignoring");
            return Ok(false);
        }
        let result = self.connect_inner(vendor).await;
        self.inner.connecting.store(false, Ordering::SeqCst);

        match &result {
            Ok(true) => {
                tracing::info!(%vendor, "wallet connected");
            }
            Ok(false) => {}
            Err(error) => {
                let message = error.to_string();
                tracing::warn!(%vendor, error = %message, "connect failed");
                self.inner.notifier.error(&message);
                self.inner
                    .state
                    .lock()
                    .expect("session state lock")
                    .last_error = Some(message);
            }
        }
        result
    }

    async fn connect_inner(&self, vendor: WalletVendor) -> Result<bool, ConnectError> {
        // Any previous session is torn down before a new attempt.
        self.disconnect().await;

        if vendor == WalletVendor::WalletConnect {
            self.inner
                .notifier
                .info("Remote wallet pairing is not supported yet, choose an installed wallet.");
            return Ok(false);
        }

        let endpoint = self
            .scan()
            .into_iter()
            .find(|d| d.vendor == vendor)
            .and_then(|d| d.endpoint);

        let Some(endpoint) = endpoint else {
            if self.inner.runtime.is_mobile() {
                if let Some(link) = deep_link(vendor, &self.inner.runtime.current_url()) {
                    tracing::info!(%vendor, %link, "no injected endpoint on mobile, deep-linking");
                    self.inner
                        .notifier
                        .info(&format!("Opening {vendor} to continue..."));
                    self.inner.runtime.redirect(&link);
                    return Ok(false);
                }
            }
            if let Some(install) = install_url(vendor) {
                self.inner
                    .notifier
                    .warning(&format!("{vendor} is not installed. Get it at {install}"));
            }
            return Err(ConnectError::WalletNotFound(vendor));
        };

        let accounts = request_accounts(endpoint.as_ref())
            .await
            .map_err(ConnectError::from_endpoint)?;
        let Some(first) = accounts.first() else {
            // An empty account list is the one silent failure mode: the
            // wallet completed the request without authorizing anything.
            tracing::debug!(%vendor, "wallet returned no accounts");
            return Ok(false);
        };
        let account: Address = first.parse().map_err(|_| {
            ConnectError::Endpoint(EndpointError::new(
                -32603,
                format!("wallet returned an invalid account address: {first}"),
            ))
        })?;

        let mut chain_id = self
            .reported_chain_id(endpoint.as_ref())
            .await
            .map_err(ConnectError::from_endpoint)?;

        if chain_id != self.inner.network.chain_id {
            match self.ensure_target_chain(endpoint.as_ref()).await {
                Ok(active) => {
                    chain_id = active;
                    self.inner
                        .notifier
                        .success(&format!("Switched to {}", self.inner.network.name));
                }
                Err(error) => {
                    // The connection survives on the wrong chain; payment
                    // is gated separately on the network check.
                    tracing::warn!(error = %error, "chain switch failed, staying connected");
                    self.inner.notifier.warning(&format!(
                        "Could not switch to {}. Please switch networks in your wallet.",
                        self.inner.network.name
                    ));
                }
            }
        }

        if let Err(error) = self.inner.store.set(ACTIVE_WALLET_KEY, vendor.id()) {
            tracing::warn!(error = %error, "failed to persist active wallet vendor");
        }

        {
            let mut state = self.inner.state.lock().expect("session state lock");
            *state = ConnectionState {
                account: Some(account),
                chain_id: Some(chain_id),
                vendor: Some(vendor),
                last_error: None,
            };
        }
        *self.inner.endpoint.lock().expect("endpoint lock") = Some(Arc::clone(&endpoint));
        self.spawn_listener(&endpoint);

        tracing::info!(%vendor, %account, chain_id, "connection established");
        Ok(true)
    }

    async fn reported_chain_id(&self, endpoint: &dyn WalletEndpoint) -> Result<u64, EndpointError> {
        let raw = endpoint.request(methods::CHAIN_ID, Value::Null).await?;
        raw.as_str().and_then(chain::parse_chain_id).ok_or_else(|| {
            EndpointError::new(-32603, format!("wallet reported unparseable chain id: {raw}"))
        })
    }

    /// Switches the wallet to the target chain, adding it first when the
    /// wallet does not know it (one add, then exactly one switch retry).
    async fn ensure_target_chain(
        &self,
        endpoint: &dyn WalletEndpoint,
    ) -> Result<u64, EndpointError> {
        let network = &self.inner.network;
        let switch_params = json!([SwitchChainParams::for_network(network)]);
        match endpoint
            .request(methods::SWITCH_CHAIN, switch_params.clone())
            .await
        {
            Ok(_) => {}
            Err(error) if error.is_unrecognized_chain() => {
                tracing::info!(chain_id = network.chain_id, "chain unknown to wallet, adding it");
                endpoint
                    .request(methods::ADD_CHAIN, json!([AddChainParams::for_network(network)]))
                    .await?;
                endpoint.request(methods::SWITCH_CHAIN, switch_params).await?;
            }
            Err(error) => return Err(error),
        }
        self.reported_chain_id(endpoint).await
    }

    fn spawn_listener(&self, endpoint: &Arc<dyn WalletEndpoint>) {
        let mut events = endpoint.subscribe();
        let session = self.clone();
        let target = self.inner.network.chain_id;
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(EndpointEvent::AccountsChanged(accounts)) => {
                        if accounts.is_empty() {
                            tracing::info!("wallet revoked account access");
                            session.teardown().await;
                            break;
                        }
                        if let Some(address) =
                            accounts.first().and_then(|a| a.parse::<Address>().ok())
                        {
                            tracing::info!(%address, "active account changed");
                            session
                                .inner
                                .state
                                .lock()
                                .expect("session state lock")
                                .account = Some(address);
                        }
                    }
                    Ok(EndpointEvent::ChainChanged(raw)) => {
                        let parsed = chain::parse_chain_id(&raw);
                        tracing::info!(chain = ?parsed, "wallet chain changed");
                        session
                            .inner
                            .state
                            .lock()
                            .expect("session state lock")
                            .chain_id = parsed;
                        if parsed == Some(target) {
                            session
                                .inner
                                .notifier
                                .success(&format!("Connected to {}", session.inner.network.name));
                        }
                        // A wallet's signing context is not trusted to
                        // survive a chain switch; reload after a short
                        // grace period.
                        let delay = *session
                            .inner
                            .reload_delay
                            .lock()
                            .expect("reload delay lock");
                        tokio::time::sleep(delay).await;
                        session.inner.runtime.reload();
                    }
                    Ok(EndpointEvent::Disconnected) => {
                        tracing::info!("wallet reported disconnect");
                        session.teardown().await;
                        break;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "wallet event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        *self.inner.listener.lock().expect("listener lock") = Some(handle);
    }

    /// Disconnects the wallet and clears all session state. Idempotent.
    pub async fn disconnect(&self) {
        let listener = self.inner.listener.lock().expect("listener lock").take();
        if let Some(handle) = listener {
            handle.abort();
        }
        self.teardown().await;
    }

    /// Drops the endpoint, revokes permissions where supported, and
    /// resets state and persistence. Does not touch the listener so the
    /// listener task itself can call it.
    async fn teardown(&self) {
        let endpoint = self.inner.endpoint.lock().expect("endpoint lock").take();
        if let Some(endpoint) = endpoint {
            if discovery::classify(endpoint.flags()) == WalletVendor::MetaMask {
                // Best effort: older wallets don't implement revocation.
                if let Err(error) = endpoint
                    .request(methods::REVOKE_PERMISSIONS, json!([{ "eth_accounts": {} }]))
                    .await
                {
                    tracing::debug!(error = %error, "permission revocation not supported");
                }
            }
        }
        if let Err(error) = self.inner.store.remove(ACTIVE_WALLET_KEY) {
            tracing::warn!(error = %error, "failed to clear persisted wallet vendor");
        }
        *self.inner.state.lock().expect("session state lock") = ConnectionState::default();
    }
}

/// Requests account authorization from an endpoint.
///
/// MetaMask gets the two-step permission sequence so it re-shows its
/// account picker even when the site is already authorized; if that
/// sequence fails for any reason the plain request is used instead, as it
/// is for every other vendor.
async fn request_accounts(endpoint: &dyn WalletEndpoint) -> Result<Vec<String>, EndpointError> {
    if discovery::classify(endpoint.flags()) == WalletVendor::MetaMask {
        let permissions = endpoint
            .request(methods::REQUEST_PERMISSIONS, json!([{ "eth_accounts": {} }]))
            .await;
        match permissions {
            Ok(_) => {
                let accounts = endpoint.request(methods::REQUEST_ACCOUNTS, Value::Null).await?;
                return Ok(parse_accounts(&accounts));
            }
            Err(error) => {
                tracing::debug!(error = %error, "permission sequence failed, using plain request");
            }
        }
    }
    let accounts = endpoint.request(methods::REQUEST_ACCOUNTS, Value::Null).await?;
    Ok(parse_accounts(&accounts))
}

fn parse_accounts(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|accounts| {
            accounts
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Builds the mobile deep link that opens `current` inside the vendor's
/// in-app browser. `None` for vendors without one.
#[must_use]
pub fn deep_link(vendor: WalletVendor, current: &Url) -> Option<String> {
    match vendor {
        WalletVendor::MetaMask => {
            let host = current.host_str()?;
            Some(format!("{METAMASK_DEEPLINK_PREFIX}{host}{}", current.path()))
        }
        WalletVendor::Trust => {
            let mut link = Url::parse(TRUST_DEEPLINK_BASE).ok()?;
            link.query_pairs_mut()
                .append_pair("coin_id", "20000714")
                .append_pair("url", current.as_str());
            Some(link.into())
        }
        WalletVendor::WalletConnect | WalletVendor::Unknown => None,
    }
}

/// The vendor's install page, for prompts when no endpoint is injected.
#[must_use]
pub const fn install_url(vendor: WalletVendor) -> Option<&'static str> {
    match vendor {
        WalletVendor::MetaMask => Some(METAMASK_INSTALL_URL),
        WalletVendor::Trust => Some(TRUST_INSTALL_URL),
        WalletVendor::WalletConnect | WalletVendor::Unknown => None,
    }
}

/// Shortens an address for display: first six and last four characters of
/// its checksummed form.
#[must_use]
pub fn format_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
