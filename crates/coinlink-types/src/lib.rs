//! Value types shared across the coinlink wallet bridge.
//!
//! This crate holds the small, chain-agnostic building blocks the bridge is made of.
//! Nothing here talks to a node; everything is plain data with serde support.
//!
//! # Modules
//!
//! - [`address`] - Address wrapper that always renders with an EIP-55 checksum
//! - [`amount`] - Decimal rendering of 256-bit token amounts, including the grouped display form
//! - [`config`] - RPC endpoint configuration and `$ENV` reference resolution
//! - [`network`] - Named Ethereum networks as reported by injected wallets
//! - [`timestamp`] - Block timestamps

pub mod address;
pub mod amount;
pub mod config;
pub mod network;
pub mod timestamp;

pub use address::ChecksummedAddress;
pub use network::NetworkType;
pub use timestamp::UnixTimestamp;
