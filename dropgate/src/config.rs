//! Claim-fee and price-feed configuration.
//!
//! Defaults mirror the original deployment: a 10 USD processing fee paid in
//! BNB, a 5000-token display allocation, and a CoinGecko price feed.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configuration of the claim fee and payment transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimConfig {
    /// Fee charged per claim, in USD. Converted to native currency at the
    /// oracle's cached price.
    pub usd_fee: Decimal,

    /// Token amount "granted" per claim. Display bookkeeping only; nothing
    /// is minted or transferred besides the fee payment.
    pub display_token_amount: u64,

    /// Ticker symbol of the displayed token.
    pub token_symbol: String,

    /// Address receiving the fee payment, as configured (hex, 0x-prefixed).
    pub receiver_address: String,

    /// Native-currency amount held back for gas when checking eligibility.
    pub gas_reserve_native: Decimal,

    /// Multiplier applied to the network-suggested gas price, in percent.
    pub gas_price_buffer_pct: u32,

    /// Multiplier applied to the estimated gas limit, in percent.
    pub gas_limit_buffer_pct: u32,

    /// Gas price used when the network suggestion is unavailable, in wei.
    pub fallback_gas_price_wei: u128,

    /// Gas limit used when estimation fails. A plain native transfer costs
    /// 21000.
    pub fallback_gas_limit: u64,

    /// Bound on the wallet's transaction-submission call.
    #[serde(with = "duration_secs")]
    pub submit_timeout: Duration,

    /// Bound on waiting for the inclusion receipt.
    #[serde(with = "duration_secs")]
    pub confirm_timeout: Duration,

    /// Interval between receipt polls while waiting for confirmation.
    #[serde(with = "duration_secs")]
    pub receipt_poll_interval: Duration,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            usd_fee: Decimal::new(10, 0),
            display_token_amount: 5000,
            token_symbol: "FNVA".to_owned(),
            receiver_address: "0x8fC18E1f65993864db46Dd1FBA2dffF1DE97955c".to_owned(),
            gas_reserve_native: Decimal::new(5, 3), // 0.005
            gas_price_buffer_pct: 110,
            gas_limit_buffer_pct: 120,
            fallback_gas_price_wei: 3_000_000_000, // 3 gwei
            fallback_gas_limit: 21_000,
            submit_timeout: Duration::from_secs(60),
            confirm_timeout: Duration::from_secs(180),
            receipt_poll_interval: Duration::from_secs(3),
        }
    }
}

/// Configuration of the third-party price feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeedConfig {
    /// Quote endpoint returning `{ "<asset_id>": { "usd": <price> } }`.
    pub feed_url: String,

    /// Asset identifier within the feed response (e.g. "binancecoin").
    pub asset_id: String,

    /// Seed price used before the first successful refresh when no
    /// persisted price exists.
    pub default_price_usd: Decimal,

    /// Interval between periodic refreshes.
    #[serde(with = "duration_secs")]
    pub refresh_interval: Duration,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            feed_url:
                "https://api.coingecko.com/api/v3/simple/price?ids=binancecoin&vs_currencies=usd"
                    .to_owned(),
            asset_id: "binancecoin".to_owned(),
            default_price_usd: Decimal::new(68397, 2), // 683.97
            refresh_interval: Duration::from_secs(300),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
