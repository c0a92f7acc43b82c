//! Chain switch/add request shapes and chain-id helpers.
//!
//! `wallet_switchEthereumChain` (EIP-3326) and `wallet_addEthereumChain`
//! (EIP-3085) take camelCase JSON parameter objects with hex chain IDs;
//! this module builds them from a [`TargetNetwork`].

use dropgate::network::{NativeCurrency, TargetNetwork};
use serde::Serialize;

/// Formats a numeric chain ID as the 0x-prefixed hex string wallets expect.
#[must_use]
pub fn hex_chain_id(chain_id: u64) -> String {
    format!("0x{chain_id:x}")
}

/// Parses a chain ID reported by a wallet.
///
/// Accepts 0x-prefixed hex (the common form) and bare decimal, which some
/// endpoints emit on `chainChanged`.
#[must_use]
pub fn parse_chain_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .map_or_else(|| raw.parse().ok(), |hex| u64::from_str_radix(hex, 16).ok())
}

/// Parameter object for `wallet_switchEthereumChain`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchChainParams {
    /// Hex chain ID to switch to.
    pub chain_id: String,
}

impl SwitchChainParams {
    /// Builds switch parameters for a target network.
    #[must_use]
    pub fn for_network(network: &TargetNetwork) -> Self {
        Self {
            chain_id: hex_chain_id(network.chain_id),
        }
    }
}

/// Parameter object for `wallet_addEthereumChain`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    /// Hex chain ID of the chain being added.
    pub chain_id: String,
    /// Display name of the chain.
    pub chain_name: String,
    /// Native currency metadata.
    pub native_currency: NativeCurrency,
    /// RPC endpoints the wallet should use.
    pub rpc_urls: Vec<String>,
    /// Block explorer base URLs.
    pub block_explorer_urls: Vec<String>,
}

impl AddChainParams {
    /// Builds add-chain parameters for a target network.
    #[must_use]
    pub fn for_network(network: &TargetNetwork) -> Self {
        Self {
            chain_id: hex_chain_id(network.chain_id),
            chain_name: network.name.clone(),
            native_currency: network.currency.clone(),
            rpc_urls: network.rpc_urls.clone(),
            block_explorer_urls: vec![network.explorer_url.clone()],
        }
    }
}
