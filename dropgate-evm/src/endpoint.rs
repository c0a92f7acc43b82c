//! Injected wallet endpoint abstraction.
//!
//! An endpoint is the EIP-1193 provider object a wallet injects into the
//! page: a `request({method, params})` call surface plus an event emitter
//! for account, chain, and disconnect notifications. Hosts adapt whatever
//! bridge they have (extension provider, in-app webview, test double) to
//! [`WalletEndpoint`]; the rest of this crate is written against the trait.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

/// EIP-1193: the user rejected the request.
pub const CODE_USER_REJECTED: i64 = 4001;

/// MetaMask: a request of this kind is already open in the wallet UI.
pub const CODE_REQUEST_PENDING: i64 = -32002;

/// EIP-3326: the wallet does not recognize the requested chain.
pub const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;

/// Wallet RPC method names used by this crate.
pub mod methods {
    /// Request account access (prompts the user if not yet authorized).
    pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    /// Force a fresh permission prompt (MetaMask re-shows its picker).
    pub const REQUEST_PERMISSIONS: &str = "wallet_requestPermissions";
    /// Best-effort permission revocation on disconnect.
    pub const REVOKE_PERMISSIONS: &str = "wallet_revokePermissions";
    /// Current chain ID as a hex string.
    pub const CHAIN_ID: &str = "eth_chainId";
    /// Switch the wallet's active chain (EIP-3326).
    pub const SWITCH_CHAIN: &str = "wallet_switchEthereumChain";
    /// Add a chain to the wallet (EIP-3085).
    pub const ADD_CHAIN: &str = "wallet_addEthereumChain";
    /// Native-currency balance of an address.
    pub const GET_BALANCE: &str = "eth_getBalance";
    /// Network-suggested gas price.
    pub const GAS_PRICE: &str = "eth_gasPrice";
    /// Gas estimation for a transaction request.
    pub const ESTIMATE_GAS: &str = "eth_estimateGas";
    /// Submit a transaction for signing and broadcast.
    pub const SEND_TRANSACTION: &str = "eth_sendTransaction";
    /// Fetch the inclusion receipt of a transaction.
    pub const GET_TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
}

/// Error returned by a wallet endpoint request.
///
/// Carries the wallet-reported numeric code so callers can distinguish the
/// well-known cases (rejection, pending request, unrecognized chain) from
/// generic failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("wallet error {code}: {message}")]
pub struct EndpointError {
    /// Wallet-reported error code.
    pub code: i64,
    /// Wallet-reported error message.
    pub message: String,
}

impl EndpointError {
    /// Creates an endpoint error from a code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates a user-rejection error (code 4001).
    pub fn user_rejected(message: impl Into<String>) -> Self {
        Self::new(CODE_USER_REJECTED, message)
    }

    /// Whether the user declined the request in the wallet.
    #[must_use]
    pub const fn is_user_rejected(&self) -> bool {
        self.code == CODE_USER_REJECTED
    }

    /// Whether a request of this kind is already open in the wallet.
    #[must_use]
    pub const fn is_request_pending(&self) -> bool {
        self.code == CODE_REQUEST_PENDING
    }

    /// Whether the wallet does not know the requested chain.
    #[must_use]
    pub const fn is_unrecognized_chain(&self) -> bool {
        self.code == CODE_UNRECOGNIZED_CHAIN
    }
}

/// Static vendor markers exposed by an injected endpoint.
///
/// These mirror the ad-hoc flags wallets set on their provider objects.
/// They are read once at discovery time; classification lives in
/// [`crate::discovery`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointFlags {
    /// Generic `isMetaMask` flag. Many wallets impersonate it.
    pub is_metamask: bool,
    /// Trust Wallet's `isTrust` marker.
    pub is_trust: bool,
    /// Trust Wallet's alternate `isTrustWallet` marker.
    pub is_trust_wallet: bool,
    /// MetaMask's private `_metamask` namespace, not impersonated.
    pub has_metamask_internal: bool,
    /// MetaMask's `_state.isUnlocked` marker.
    pub reports_unlocked: bool,
}

/// Event emitted by a wallet endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    /// The authorized account list changed. An empty list means access was
    /// revoked.
    AccountsChanged(Vec<String>),
    /// The wallet's active chain changed. Payload is the new chain ID,
    /// usually as a 0x-prefixed hex string.
    ChainChanged(String),
    /// The endpoint disconnected from its chain.
    Disconnected,
}

/// An injected wallet endpoint (EIP-1193 provider).
#[async_trait]
pub trait WalletEndpoint: Send + Sync {
    /// Performs one `request({method, params})` call against the wallet.
    ///
    /// # Errors
    ///
    /// Returns the wallet-reported [`EndpointError`]; see the `CODE_*`
    /// constants for the codes this crate inspects.
    async fn request(&self, method: &str, params: Value) -> Result<Value, EndpointError>;

    /// Returns the endpoint's static vendor markers.
    fn flags(&self) -> EndpointFlags;

    /// Subscribes to the endpoint's event stream.
    ///
    /// Each call returns an independent receiver; dropping it detaches the
    /// listener.
    fn subscribe(&self) -> broadcast::Receiver<EndpointEvent>;
}
