//! Locally persisted claim records.
//!
//! One receipt per wallet address, stored as a single JSON map under one
//! storage key with lowercased address keys. This is a per-store convenience
//! that stops a second claim attempt from the same address in the same
//! storage origin; it is **not** a security boundary. Anyone can clear the
//! store or use another device, and nothing verifies the record server-side
//! or on-chain.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStore, StorageError};

/// Storage key holding the JSON receipt map.
pub const CLAIMS_STORAGE_KEY: &str = "fnva_airdrop_claims";

/// Permanent record of one successful fee payment.
///
/// Serialized with camelCase keys, preserving the storage layout of the
/// original site so existing records remain readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimReceipt {
    /// Token amount "granted". Display bookkeeping only.
    pub total_claimed: u64,
    /// RFC 3339 timestamp of the claim.
    pub claim_date: String,
    /// Hash of the fee-payment transaction.
    pub payment_tx_hash: String,
    /// Quoted fee in native currency (6 decimal places).
    pub fee_paid_native: String,
    /// Actual fee inferred from balance deltas minus gas. Informational:
    /// derived by subtraction, so unrelated balance movement between the
    /// two reads skews it.
    pub actual_fee_paid: String,
    /// Fee in USD at claim time.
    pub fee_paid_usd: String,
    /// Gas units consumed by the payment.
    pub gas_used: String,
    /// Gas cost in native currency.
    pub gas_cost_native: String,
    /// Total native-currency cost (balance before minus balance after).
    pub total_cost_native: String,
    /// Effective gas price, in gwei.
    pub gas_price_gwei: String,
    /// Block the payment was included in.
    pub block_number: u64,
    /// Receiver the fee was paid to.
    pub receiver_address: String,
    /// Cached native-currency USD price at claim time.
    pub native_price_usd: String,
    /// Name of the network the payment was made on.
    pub network_name: String,
}

/// The local claim ledger.
///
/// Reads and writes one JSON-serialized address→receipt map. Receipts are
/// written once by the claim flow and never mutated or deleted by the SDK.
#[derive(Clone)]
pub struct ClaimLedger {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for ClaimLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimLedger").finish_non_exhaustive()
    }
}

impl ClaimLedger {
    /// Creates a ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn read_all(&self) -> Result<HashMap<String, ClaimReceipt>, StorageError> {
        match self.store.get(CLAIMS_STORAGE_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(HashMap::new()),
        }
    }

    /// Returns the receipt recorded for `address`, if any.
    ///
    /// Address matching is case-insensitive: keys are lowercased on write
    /// and lookups lowercase the query.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be read or the stored
    /// map fails to parse.
    pub fn get(&self, address: &str) -> Result<Option<ClaimReceipt>, StorageError> {
        let all = self.read_all()?;
        Ok(all.get(&address.to_lowercase()).cloned())
    }

    /// Returns whether `address` already holds a receipt.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be read.
    pub fn has_claimed(&self, address: &str) -> Result<bool, StorageError> {
        Ok(self.get(address)?.is_some())
    }

    /// Records a receipt for `address`, keyed by its lowercased form.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the map cannot be serialized or
    /// persisted.
    pub fn put(&self, address: &str, receipt: ClaimReceipt) -> Result<(), StorageError> {
        let mut all = self.read_all()?;
        all.insert(address.to_lowercase(), receipt);
        let raw = serde_json::to_string(&all)?;
        self.store.set(CLAIMS_STORAGE_KEY, &raw)
    }
}
