//! Target network definitions.
//!
//! A deployment operates against exactly one chain. Which one is a pure
//! function of the deployed hostname: loopback and test-labelled hosts get
//! the testnet, everything else the mainnet.

use serde::{Deserialize, Serialize};

/// BNB Smart Chain mainnet chain ID.
pub const BSC_MAINNET: u64 = 56;

/// BNB Smart Chain testnet chain ID.
pub const BSC_TESTNET: u64 = 97;

/// Native-currency metadata in the shape wallets expect for
/// `wallet_addEthereumChain` (EIP-3085).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    /// Full currency name (e.g. "BNB").
    pub name: String,
    /// Ticker symbol shown by wallets.
    pub symbol: String,
    /// Number of decimals in the smallest unit (18 for all EVM natives).
    pub decimals: u8,
}

/// Static configuration of the one chain a deployment operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetNetwork {
    /// Numeric EIP-155 chain ID.
    pub chain_id: u64,
    /// Human-readable network name.
    pub name: String,
    /// Native currency metadata.
    pub currency: NativeCurrency,
    /// Ordered RPC endpoint URLs, handed to the wallet when adding the
    /// chain. This SDK never dials them itself.
    pub rpc_urls: Vec<String>,
    /// Block-explorer base URL.
    pub explorer_url: String,
}

impl TargetNetwork {
    /// Returns the explorer deep link for a transaction hash.
    ///
    /// Display-only: the link is never fetched by this SDK.
    #[must_use]
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url.trim_end_matches('/'))
    }
}

/// BNB Smart Chain mainnet configuration.
#[must_use]
pub fn bsc_mainnet() -> TargetNetwork {
    TargetNetwork {
        chain_id: BSC_MAINNET,
        name: "BNB Smart Chain".to_owned(),
        currency: NativeCurrency {
            name: "BNB".to_owned(),
            symbol: "BNB".to_owned(),
            decimals: 18,
        },
        rpc_urls: [
            "https://bsc-dataseed1.binance.org/",
            "https://bsc-dataseed2.binance.org/",
            "https://bsc-dataseed3.binance.org/",
            "https://bsc-dataseed4.binance.org/",
            "https://bsc-dataseed1.defibit.io/",
            "https://bsc-dataseed2.defibit.io/",
            "https://bsc-dataseed1.ninicoin.io/",
            "https://bsc-dataseed2.ninicoin.io/",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect(),
        explorer_url: "https://bscscan.com".to_owned(),
    }
}

/// BNB Smart Chain testnet configuration.
#[must_use]
pub fn bsc_testnet() -> TargetNetwork {
    TargetNetwork {
        chain_id: BSC_TESTNET,
        name: "BNB Smart Chain Testnet".to_owned(),
        currency: NativeCurrency {
            name: "tBNB".to_owned(),
            symbol: "tBNB".to_owned(),
            decimals: 18,
        },
        rpc_urls: [
            "https://data-seed-prebsc-1-s1.binance.org:8545/",
            "https://data-seed-prebsc-2-s1.binance.org:8545/",
            "https://data-seed-prebsc-1-s2.binance.org:8545/",
            "https://data-seed-prebsc-2-s2.binance.org:8545/",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect(),
        explorer_url: "https://testnet.bscscan.com".to_owned(),
    }
}

/// Selects the active network for a deployed hostname.
///
/// Loopback hosts and hosts with a `test`/`staging` label resolve to the
/// testnet; every other hostname resolves to the mainnet.
#[must_use]
pub fn target_for_hostname(hostname: &str) -> TargetNetwork {
    let host = hostname.to_ascii_lowercase();
    let is_test = host == "localhost"
        || host == "127.0.0.1"
        || host == "[::1]"
        || host
            .split('.')
            .any(|label| label == "test" || label == "testnet" || label == "staging");
    if is_test { bsc_testnet() } else { bsc_mainnet() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explorer_tx_url_joins_hash() {
        let net = bsc_mainnet();
        assert_eq!(
            net.explorer_tx_url("0xabc"),
            "https://bscscan.com/tx/0xabc"
        );
    }

    #[test]
    fn explorer_tx_url_handles_trailing_slash() {
        let mut net = bsc_testnet();
        net.explorer_url = "https://testnet.bscscan.com/".to_owned();
        assert_eq!(
            net.explorer_tx_url("0x1"),
            "https://testnet.bscscan.com/tx/0x1"
        );
    }

    #[test]
    fn hostname_selection() {
        assert_eq!(target_for_hostname("localhost").chain_id, BSC_TESTNET);
        assert_eq!(target_for_hostname("127.0.0.1").chain_id, BSC_TESTNET);
        assert_eq!(
            target_for_hostname("staging.example.com").chain_id,
            BSC_TESTNET
        );
        assert_eq!(
            target_for_hostname("testnet.example.com").chain_id,
            BSC_TESTNET
        );
        assert_eq!(target_for_hostname("example.com").chain_id, BSC_MAINNET);
        assert_eq!(target_for_hostname("www.example.com").chain_id, BSC_MAINNET);
        // "test" must be a whole label, not a substring.
        assert_eq!(target_for_hostname("contest.com").chain_id, BSC_MAINNET);
    }
}
