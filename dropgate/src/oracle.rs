//! USD to native-currency fee quoting.
//!
//! The claim fee is configured in USD and converted to native currency at a
//! cached price, refreshed from a third-party quote feed on a timer. Feed
//! failures are an accepted degradation: the cache keeps serving the last
//! good value (or the last persisted one) and nothing is surfaced to the
//! user.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::PriceFeedConfig;
use crate::storage::KeyValueStore;

/// Storage key for the last fetched price.
pub const PRICE_STORAGE_KEY: &str = "native_price_usd";

/// Storage key for the Unix timestamp of the last successful fetch.
pub const PRICE_UPDATED_STORAGE_KEY: &str = "native_price_updated_at";

/// Number of fractional places in a fee quote.
const QUOTE_DECIMALS: u32 = 6;

/// Errors from the price feed. Never user-facing; callers log and move on.
#[derive(Debug, thiserror::Error)]
pub enum PriceFeedError {
    /// HTTP request to the feed failed.
    #[error("price feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsed but the configured asset was missing.
    #[error("price feed response missing asset '{0}'")]
    MissingAsset(String),

    /// The feed returned a zero, negative, or non-finite price.
    #[error("price feed returned unusable price: {0}")]
    InvalidPrice(f64),
}

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: Decimal,
    updated_at: Option<u64>,
}

/// Converts the configured USD fee into native currency at a cached price.
pub struct PriceOracle {
    http: reqwest::Client,
    config: PriceFeedConfig,
    usd_fee: Decimal,
    cache: RwLock<CachedPrice>,
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for PriceOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceOracle")
            .field("config", &self.config)
            .field("usd_fee", &self.usd_fee)
            .finish_non_exhaustive()
    }
}

impl PriceOracle {
    /// Creates an oracle seeded from the last persisted price if one exists,
    /// otherwise from the configured default.
    #[must_use]
    pub fn new(config: PriceFeedConfig, usd_fee: Decimal, store: Arc<dyn KeyValueStore>) -> Self {
        let seed = Self::load_persisted(store.as_ref()).unwrap_or(CachedPrice {
            price: config.default_price_usd,
            updated_at: None,
        });
        Self {
            http: reqwest::Client::new(),
            config,
            usd_fee,
            cache: RwLock::new(seed),
            store,
        }
    }

    /// Returns the cached native-currency price, in USD.
    #[must_use]
    pub fn price(&self) -> Decimal {
        self.read_cache().price
    }

    /// Returns the Unix timestamp of the last successful refresh, if any.
    #[must_use]
    pub fn last_updated(&self) -> Option<u64> {
        self.read_cache().updated_at
    }

    /// Returns the claim fee in native currency as a decimal string with
    /// exactly six fractional places: `usd_fee / cached_price`.
    #[must_use]
    pub fn fee_in_native(&self) -> String {
        let quote = (self.usd_fee / self.price())
            .round_dp_with_strategy(QUOTE_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
        format!("{quote:.6}")
    }

    /// Fetches the current price from the feed.
    ///
    /// On success the cache is overwritten and the value persisted for
    /// reuse across restarts. On failure the in-memory cache is left
    /// untouched; only when no refresh has ever succeeded in this process
    /// is the last persisted value loaded as a fallback.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceFeedError`] describing the failed fetch. Stale
    /// pricing is an accepted degradation, so callers typically log the
    /// error and continue.
    pub async fn refresh(&self) -> Result<(), PriceFeedError> {
        match self.fetch().await {
            Ok(price) => {
                let updated_at = unix_now();
                if let Ok(mut cache) = self.cache.write() {
                    *cache = CachedPrice {
                        price,
                        updated_at: Some(updated_at),
                    };
                }
                if let Err(e) = self
                    .store
                    .set(PRICE_STORAGE_KEY, &price.to_string())
                    .and_then(|()| {
                        self.store
                            .set(PRICE_UPDATED_STORAGE_KEY, &updated_at.to_string())
                    })
                {
                    tracing::warn!(error = %e, "failed to persist refreshed price");
                }
                tracing::debug!(%price, "price cache refreshed");
                Ok(())
            }
            Err(e) => {
                // A cache that has refreshed at least once is at least as
                // fresh as anything persisted; never overwrite it.
                if self.last_updated().is_none() {
                    if let Some(persisted) = Self::load_persisted(self.store.as_ref()) {
                        if let Ok(mut cache) = self.cache.write() {
                            *cache = persisted;
                        }
                    }
                }
                Err(e)
            }
        }
    }

    /// Runs the startup refresh and then refreshes on the configured
    /// interval for the lifetime of the task. Feed failures are logged and
    /// never propagated.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.refresh_interval);
        loop {
            // First tick completes immediately, giving the startup refresh.
            ticker.tick().await;
            if let Err(e) = self.refresh().await {
                tracing::warn!(error = %e, "price refresh failed, serving cached price");
            }
        }
    }

    async fn fetch(&self) -> Result<Decimal, PriceFeedError> {
        let body: HashMap<String, HashMap<String, f64>> = self
            .http
            .get(&self.config.feed_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let raw = body
            .get(&self.config.asset_id)
            .and_then(|quotes| quotes.get("usd"))
            .copied()
            .ok_or_else(|| PriceFeedError::MissingAsset(self.config.asset_id.clone()))?;
        let price = Decimal::try_from(raw).map_err(|_| PriceFeedError::InvalidPrice(raw))?;
        if price <= Decimal::ZERO {
            return Err(PriceFeedError::InvalidPrice(raw));
        }
        Ok(price)
    }

    fn read_cache(&self) -> CachedPrice {
        self.cache.read().map_or(
            CachedPrice {
                price: self.config.default_price_usd,
                updated_at: None,
            },
            |cache| *cache,
        )
    }

    fn load_persisted(store: &dyn KeyValueStore) -> Option<CachedPrice> {
        let raw = store.get(PRICE_STORAGE_KEY).ok()??;
        let price: Decimal = raw.parse().ok()?;
        if price <= Decimal::ZERO {
            return None;
        }
        let updated_at = store
            .get(PRICE_UPDATED_STORAGE_KEY)
            .ok()
            .flatten()
            .and_then(|s| s.parse().ok());
        Some(CachedPrice { price, updated_at })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oracle_with(price: Decimal, usd_fee: Decimal) -> PriceOracle {
        let config = PriceFeedConfig {
            default_price_usd: price,
            ..PriceFeedConfig::default()
        };
        PriceOracle::new(config, usd_fee, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn fee_quote_is_usd_over_price_at_six_places() {
        let oracle = oracle_with(Decimal::new(500, 0), Decimal::new(10, 0));
        assert_eq!(oracle.fee_in_native(), "0.020000");
    }

    #[test]
    fn fee_quote_rounds_to_six_places() {
        let oracle = oracle_with(Decimal::new(68397, 2), Decimal::new(10, 0));
        // 10 / 683.97 = 0.0146205681...
        assert_eq!(oracle.fee_in_native(), "0.014621");
    }

    #[test]
    fn fee_quote_pads_to_six_places() {
        let oracle = oracle_with(Decimal::new(2, 0), Decimal::new(1, 0));
        assert_eq!(oracle.fee_in_native(), "0.500000");
    }

    #[tokio::test]
    async fn refresh_overwrites_cache_and_persists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"binancecoin": {"usd": 412.5}})),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let config = PriceFeedConfig {
            feed_url: server.uri(),
            ..PriceFeedConfig::default()
        };
        let oracle = PriceOracle::new(config, Decimal::new(10, 0), Arc::<MemoryStore>::clone(&store));

        oracle.refresh().await.unwrap();
        assert_eq!(oracle.price().to_string(), "412.5");
        assert!(oracle.last_updated().is_some());
        assert_eq!(store.get(PRICE_STORAGE_KEY).unwrap().as_deref(), Some("412.5"));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_cache_and_loads_persisted_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        store.set(PRICE_STORAGE_KEY, "601.25").unwrap();

        let config = PriceFeedConfig {
            feed_url: server.uri(),
            default_price_usd: Decimal::new(500, 0),
            ..PriceFeedConfig::default()
        };
        // Seed load already picks up the persisted value.
        let oracle = PriceOracle::new(config, Decimal::new(10, 0), Arc::<MemoryStore>::clone(&store));
        assert_eq!(oracle.price().to_string(), "601.25");

        let result = oracle.refresh().await;
        assert!(result.is_err());
        assert_eq!(oracle.price().to_string(), "601.25");
    }

    #[tokio::test]
    async fn failed_refresh_never_overwrites_a_refreshed_cache() {
        // Store that serves its seeded values but rejects every write, so
        // a successful refresh cannot persist its fresher price.
        struct SealedStore(MemoryStore);
        impl KeyValueStore for SealedStore {
            fn get(&self, key: &str) -> Result<Option<String>, crate::storage::StorageError> {
                self.0.get(key)
            }
            fn set(&self, _key: &str, _value: &str) -> Result<(), crate::storage::StorageError> {
                Err(std::io::Error::other("read-only").into())
            }
            fn remove(&self, key: &str) -> Result<(), crate::storage::StorageError> {
                self.0.remove(key)
            }
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"binancecoin": {"usd": 700.0}})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let seed = MemoryStore::new();
        seed.set(PRICE_STORAGE_KEY, "600").unwrap();
        let config = PriceFeedConfig {
            feed_url: server.uri(),
            ..PriceFeedConfig::default()
        };
        let oracle = PriceOracle::new(config, Decimal::new(10, 0), Arc::new(SealedStore(seed)));
        assert_eq!(oracle.price().to_string(), "600");

        // First refresh succeeds in memory even though the persist fails.
        oracle.refresh().await.unwrap();
        assert_eq!(oracle.price().to_string(), "700");

        // A later feed failure must not replace the fresher in-memory
        // price with the stale persisted one.
        assert!(oracle.refresh().await.is_err());
        assert_eq!(oracle.price().to_string(), "700");
    }

    #[tokio::test]
    async fn refresh_rejects_zero_price() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"binancecoin": {"usd": 0.0}})),
            )
            .mount(&server)
            .await;

        let config = PriceFeedConfig {
            feed_url: server.uri(),
            default_price_usd: Decimal::new(500, 0),
            ..PriceFeedConfig::default()
        };
        let oracle = PriceOracle::new(config, Decimal::new(10, 0), Arc::new(MemoryStore::new()));
        assert!(matches!(
            oracle.refresh().await,
            Err(PriceFeedError::InvalidPrice(_))
        ));
        assert_eq!(oracle.price().to_string(), "500");
    }

    #[tokio::test]
    async fn refresh_rejects_missing_asset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ethereum": {"usd": 3000.0}})),
            )
            .mount(&server)
            .await;

        let config = PriceFeedConfig {
            feed_url: server.uri(),
            ..PriceFeedConfig::default()
        };
        let oracle = PriceOracle::new(config, Decimal::new(10, 0), Arc::new(MemoryStore::new()));
        assert!(matches!(
            oracle.refresh().await,
            Err(PriceFeedError::MissingAsset(_))
        ));
    }
}
