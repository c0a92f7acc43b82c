//! Fee-payment claim flow.
//!
//! A claim is a plain native-currency transfer of the quoted fee to the
//! configured receiver, signed and broadcast by the connected wallet. The
//! transactor runs the precondition checks, builds the transaction with
//! buffered gas parameters, waits for inclusion, and records the receipt
//! in the local ledger. One attempt at a time; the whole flow is an
//! explicit state machine with no retries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy_primitives::utils::{UnitsError, format_units, parse_units};
use alloy_primitives::{Address, U256};
use chrono::Utc;
use dropgate::config::ClaimConfig;
use dropgate::ledger::{ClaimLedger, ClaimReceipt};
use dropgate::notify::Notifier;
use dropgate::oracle::PriceOracle;
use dropgate::storage::StorageError;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use crate::endpoint::{EndpointError, WalletEndpoint, methods};
use crate::session::WalletSession;

/// Why a claim attempt failed. No payment was broadcast unless the variant
/// says otherwise.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    /// Another claim attempt is still running.
    #[error("a claim is already in progress")]
    AttemptInFlight,

    /// No wallet is connected.
    #[error("connect a wallet before claiming")]
    NotConnected,

    /// The wallet is connected to a different chain.
    #[error("wrong network, switch your wallet to {expected}")]
    WrongNetwork {
        /// Name of the required network.
        expected: String,
    },

    /// The connected address already holds a local claim receipt.
    #[error("this wallet has already claimed")]
    AlreadyClaimed,

    /// The configured receiver address is unparseable or the zero address.
    #[error("fee receiver is not configured correctly")]
    InvalidReceiver,

    /// Balance is below fee plus gas reserve.
    #[error("insufficient balance: need {required} {symbol}, have {available} {symbol}")]
    InsufficientFunds {
        /// Fee plus gas reserve.
        required: Decimal,
        /// Current wallet balance.
        available: Decimal,
        /// Native currency ticker.
        symbol: String,
    },

    /// The user declined the payment in the wallet.
    #[error("transaction rejected in the wallet")]
    Rejected,

    /// The wallet did not answer the submission call in time. The payment
    /// may still have been broadcast.
    #[error("wallet did not respond to the payment request in time")]
    SubmitTimeout,

    /// The payment was broadcast but no inclusion receipt appeared in time.
    #[error("payment was sent but not confirmed in time")]
    ConfirmTimeout,

    /// The payment was included but reverted.
    #[error("payment transaction failed on chain")]
    Reverted,

    /// Any other wallet-reported failure.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// Unit conversion between native currency and wei failed.
    #[error(transparent)]
    Units(#[from] UnitsError),

    /// The claim ledger could not be read.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Runs fee-payment claims against the session's connected wallet.
pub struct ClaimTransactor {
    session: WalletSession,
    config: ClaimConfig,
    oracle: Arc<PriceOracle>,
    ledger: ClaimLedger,
    notifier: Arc<dyn Notifier>,
    in_flight: AtomicBool,
}

impl std::fmt::Debug for ClaimTransactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimTransactor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClaimTransactor {
    /// Creates a transactor over an existing session, oracle, and ledger.
    #[must_use]
    pub fn new(
        session: WalletSession,
        config: ClaimConfig,
        oracle: Arc<PriceOracle>,
        ledger: ClaimLedger,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session,
            config,
            oracle,
            ledger,
            notifier,
            in_flight: AtomicBool::new(false),
        }
    }

    /// The current fee quote in native currency, six decimal places.
    #[must_use]
    pub fn quoted_fee(&self) -> String {
        self.oracle.fee_in_native()
    }

    /// The receipt already recorded for the connected account, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`ClaimError::Storage`] if the ledger cannot be read.
    pub fn recorded_claim(&self) -> Result<Option<ClaimReceipt>, ClaimError> {
        match self.session.account() {
            Some(account) => Ok(self.ledger.get(&account.to_checksum(None))?),
            None => Ok(None),
        }
    }

    /// Executes one claim: precondition checks, fee payment, confirmation
    /// wait, and ledger write.
    ///
    /// # Errors
    ///
    /// Returns a [`ClaimError`] naming the failed step. Failures before
    /// [`ClaimError::SubmitTimeout`] guarantee nothing was broadcast.
    pub async fn claim(&self) -> Result<ClaimReceipt, ClaimError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(ClaimError::AttemptInFlight);
        }
        let result = self.claim_inner().await;
        self.in_flight.store(false, Ordering::SeqCst);

        match &result {
            Ok(receipt) => {
                self.notifier.success(&format!(
                    "{} {} claimed! Fee paid: {} {}",
                    receipt.total_claimed,
                    self.config.token_symbol,
                    receipt.fee_paid_native,
                    self.session.network().currency.symbol
                ));
            }
            Err(error) => {
                tracing::warn!(error = %error, "claim attempt failed");
                self.notifier.error(&error.to_string());
            }
        }
        result
    }

    async fn claim_inner(&self) -> Result<ClaimReceipt, ClaimError> {
        let account = self.session.account().ok_or(ClaimError::NotConnected)?;
        let endpoint = self.session.endpoint().ok_or(ClaimError::NotConnected)?;
        if !self.session.is_correct_network() {
            return Err(ClaimError::WrongNetwork {
                expected: self.session.network().name.clone(),
            });
        }

        let account_str = account.to_checksum(None);
        if self.ledger.has_claimed(&account_str)? {
            return Err(ClaimError::AlreadyClaimed);
        }

        let receiver: Address = self
            .config
            .receiver_address
            .parse()
            .map_err(|_| ClaimError::InvalidReceiver)?;
        if receiver == Address::ZERO {
            return Err(ClaimError::InvalidReceiver);
        }
        let receiver_str = receiver.to_checksum(None);

        let fee_quote = self.oracle.fee_in_native();
        let fee_native: Decimal = fee_quote
            .parse()
            .map_err(|_| malformed("fee quote", &Value::String(fee_quote.clone())))?;
        let fee_wei: U256 = parse_units(&fee_quote, 18)?.get_absolute();

        let balance_before = self.balance_of(endpoint.as_ref(), &account_str).await?;
        let required = fee_native + self.config.gas_reserve_native;
        if balance_before < required {
            return Err(ClaimError::InsufficientFunds {
                required,
                available: balance_before,
                symbol: self.session.network().currency.symbol.clone(),
            });
        }

        let gas_price = self.buffered_gas_price(endpoint.as_ref()).await;
        let mut tx = json!({
            "from": account_str,
            "to": receiver_str,
            "value": hex_u256(fee_wei),
            "gasPrice": hex_u256(gas_price),
        });
        let gas_limit = self.buffered_gas_limit(endpoint.as_ref(), &tx).await;
        tx["gas"] = Value::String(hex_u256(gas_limit));

        tracing::info!(
            fee = %fee_quote,
            gas_price = %gas_price,
            gas_limit = %gas_limit,
            "submitting fee payment"
        );
        let submitted = tokio::time::timeout(
            self.config.submit_timeout,
            endpoint.request(methods::SEND_TRANSACTION, json!([tx])),
        )
        .await
        .map_err(|_| ClaimError::SubmitTimeout)?;
        let tx_hash = match submitted {
            Ok(value) => value
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| malformed("transaction hash", &value))?,
            Err(error) if error.is_user_rejected() => return Err(ClaimError::Rejected),
            Err(error) => return Err(error.into()),
        };
        tracing::info!(%tx_hash, "payment submitted, awaiting confirmation");

        let inclusion = self.await_receipt(endpoint.as_ref(), &tx_hash).await?;
        let status = hex_field(&inclusion, "status").unwrap_or(U256::ZERO);
        if status != U256::from(1u64) {
            return Err(ClaimError::Reverted);
        }

        let gas_used = hex_field(&inclusion, "gasUsed").unwrap_or_else(|| U256::from(0u64));
        let effective_price = hex_field(&inclusion, "effectiveGasPrice").unwrap_or(gas_price);
        let block_number = hex_field(&inclusion, "blockNumber")
            .map(|n| n.saturating_to::<u64>())
            .unwrap_or_default();

        let balance_after = self.balance_of(endpoint.as_ref(), &account_str).await?;
        // Balance-delta accounting: informational only, other transfers
        // landing between the two reads skew it.
        let total_cost = (balance_before - balance_after).max(Decimal::ZERO);
        let gas_cost = wei_to_native(gas_used * effective_price)?;
        let actual_fee = (total_cost - gas_cost).max(Decimal::ZERO);
        let gas_price_gwei: Decimal = format_units(effective_price, 9)?
            .parse()
            .unwrap_or_default();

        let receipt = ClaimReceipt {
            total_claimed: self.config.display_token_amount,
            claim_date: Utc::now().to_rfc3339(),
            payment_tx_hash: tx_hash.clone(),
            fee_paid_native: fee_quote,
            actual_fee_paid: format!("{actual_fee:.6}"),
            fee_paid_usd: format!("{:.2}", self.config.usd_fee),
            gas_used: gas_used.to_string(),
            gas_cost_native: format!("{gas_cost:.6}"),
            total_cost_native: format!("{total_cost:.6}"),
            gas_price_gwei: format!("{gas_price_gwei:.2}"),
            block_number,
            receiver_address: receiver_str,
            native_price_usd: self.oracle.price().to_string(),
            network_name: self.session.network().name.clone(),
        };

        // The payment is already confirmed on chain at this point: a ledger
        // write failure must not turn the claim into an error.
        if let Err(error) = self.ledger.put(&account_str, receipt.clone()) {
            tracing::error!(error = %error, %tx_hash, "failed to record claim receipt");
            self.notifier
                .warning("Payment confirmed, but the claim record could not be saved on this device.");
        }

        tracing::info!(
            %tx_hash,
            block_number,
            explorer = %self.session.network().explorer_tx_url(&tx_hash),
            "claim complete"
        );
        Ok(receipt)
    }

    async fn balance_of(
        &self,
        endpoint: &dyn WalletEndpoint,
        account: &str,
    ) -> Result<Decimal, ClaimError> {
        let raw = endpoint
            .request(methods::GET_BALANCE, json!([account, "latest"]))
            .await?;
        let wei = parse_hex(&raw).ok_or_else(|| malformed("balance", &raw))?;
        wei_to_native(wei)
    }

    /// Network gas price plus the configured buffer; configured fallback
    /// when the wallet cannot answer.
    async fn buffered_gas_price(&self, endpoint: &dyn WalletEndpoint) -> U256 {
        let suggested = match endpoint.request(methods::GAS_PRICE, json!([])).await {
            Ok(raw) => parse_hex(&raw),
            Err(error) => {
                tracing::debug!(error = %error, "gas price unavailable, using fallback");
                None
            }
        };
        let base = suggested.unwrap_or_else(|| U256::from(self.config.fallback_gas_price_wei));
        apply_pct(base, self.config.gas_price_buffer_pct)
    }

    /// Estimated gas plus the configured buffer; configured fallback when
    /// estimation fails.
    async fn buffered_gas_limit(&self, endpoint: &dyn WalletEndpoint, tx: &Value) -> U256 {
        let estimated = match endpoint
            .request(methods::ESTIMATE_GAS, json!([tx]))
            .await
        {
            Ok(raw) => parse_hex(&raw),
            Err(error) => {
                tracing::debug!(error = %error, "gas estimation failed, using fallback");
                None
            }
        };
        let base = estimated.unwrap_or_else(|| U256::from(self.config.fallback_gas_limit));
        apply_pct(base, self.config.gas_limit_buffer_pct)
    }

    /// Polls for the inclusion receipt until the confirmation deadline.
    async fn await_receipt(
        &self,
        endpoint: &dyn WalletEndpoint,
        tx_hash: &str,
    ) -> Result<Value, ClaimError> {
        let poll = async {
            loop {
                let receipt = endpoint
                    .request(methods::GET_TRANSACTION_RECEIPT, json!([tx_hash]))
                    .await?;
                if !receipt.is_null() {
                    return Ok::<Value, ClaimError>(receipt);
                }
                tokio::time::sleep(self.config.receipt_poll_interval).await;
            }
        };
        tokio::time::timeout(self.config.confirm_timeout, poll)
            .await
            .map_err(|_| ClaimError::ConfirmTimeout)?
    }
}

fn hex_u256(value: U256) -> String {
    format!("0x{value:x}")
}

fn parse_hex(value: &Value) -> Option<U256> {
    value.as_str().and_then(|s| s.trim().parse().ok())
}

fn hex_field(object: &Value, field: &str) -> Option<U256> {
    parse_hex(object.get(field)?)
}

fn apply_pct(value: U256, pct: u32) -> U256 {
    value * U256::from(pct) / U256::from(100u64)
}

fn wei_to_native(wei: U256) -> Result<Decimal, ClaimError> {
    let formatted = format_units(wei, 18)?;
    formatted
        .parse()
        .map_err(|_| malformed("native amount", &Value::String(formatted.clone())))
}

fn malformed(what: &str, value: &Value) -> ClaimError {
    ClaimError::Endpoint(EndpointError::new(
        -32603,
        format!("wallet returned malformed {what}: {value}"),
    ))
}
