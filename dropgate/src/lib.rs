//! Core types for the dropgate claim-fee payment flow.
//!
//! An airdrop "claim" in this system is a single native-currency payment from
//! a user's wallet to a configured receiver address, recorded locally as a
//! claim receipt. This crate holds everything that is independent of any
//! particular blockchain family:
//!
//! - [`config`] - Claim fee and price-feed configuration
//! - [`network`] - Target network definitions and hostname-based selection
//! - [`oracle`] - USD to native-currency fee quoting with a cached price feed
//! - [`ledger`] - The locally persisted one-receipt-per-address claim record
//! - [`notify`] - User-facing notification seam
//! - [`storage`] - Key-value persistence abstraction (local-storage analog)
//!
//! Chain-specific wallet integration (endpoint discovery, connection
//! management, the payment transaction itself) lives in `dropgate-evm`.

pub mod config;
pub mod ledger;
pub mod network;
pub mod notify;
pub mod oracle;
pub mod storage;
