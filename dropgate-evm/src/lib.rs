//! EIP-1193 wallet integration for the dropgate claim-fee flow.
//!
//! Everything chain-facing in this SDK goes through an injected wallet
//! endpoint — the in-page provider object a wallet extension or in-app
//! browser exposes — never a transport of its own. This crate provides:
//!
//! - [`endpoint`] - The [`endpoint::WalletEndpoint`] trait, EIP-1193 error
//!   codes, and endpoint events
//! - [`discovery`] - Scanning the injected namespace and classifying
//!   endpoints by wallet vendor
//! - [`session`] - The connection manager: permission requests, chain
//!   switching, endpoint event handling
//! - [`chain`] - EIP-3085/EIP-3326 chain switch/add parameter shapes
//! - [`claim`] - The fee-payment transactor and claim-receipt accounting
//! - [`runtime`] - Host environment seam (mobile detection, redirects,
//!   reloads)

pub mod chain;
pub mod claim;
pub mod discovery;
pub mod endpoint;
pub mod runtime;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;
