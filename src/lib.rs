//! Wallet bridge between a host application and an Ethereum token contract.
//!
//! The bridge keeps a [`WalletSession`](session::WalletSession) with the user's injected
//! wallet, resolves token and native transfers to the values actually delivered, and
//! prepares signed delegated transfers that a relayer can submit on the user's behalf.
//!
//! # Modules
//!
//! - [`session`] - connection state machine, probe retries and account polling
//! - [`resolver`] - transaction hash to [`TransferOutcome`](resolver::TransferOutcome)
//! - [`delegated`] - nonce selection and typed-data signing for `transferDelegated`
//! - [`chain`] - node and wallet access behind the [`ChainReader`](chain::ChainReader) and
//!   [`InjectedWallet`](chain::InjectedWallet) traits
//! - [`contract`] - token and token sale ABIs with view-call wrappers
//! - [`decoder`] - calldata and event log decoding
//! - [`observer`] - notifications for the host UI
//! - [`config`] - JSON configuration with environment fallbacks
//! - [`util`] - telemetry and signal handling for the binary
//!
//! User actions ([`send_transaction`](session::WalletSession::send_transaction),
//! [`sign_login`](session::WalletSession::sign_login), ...) and account queries
//! ([`token_balance`](session::WalletSession::token_balance), ...) are methods on the
//! session.

mod actions;
pub mod chain;
pub mod config;
pub mod contract;
pub mod decoder;
pub mod delegated;
pub mod error;
pub mod observer;
mod queries;
pub mod resolver;
pub mod session;
pub mod util;

#[cfg(test)]
mod testing;

pub use actions::GasOptions;
pub use chain::utf8_to_hex;
pub use coinlink_types::{ChecksummedAddress, NetworkType};
pub use error::{BridgeError, ErrorReason};
