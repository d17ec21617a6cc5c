//! Chain access for the wallet bridge.
//!
//! Two kinds of connection back every operation:
//!
//! - [`ChainReader`] - read-only node access (transactions, receipts, blocks, view calls,
//!   event logs). [`RemoteChain`] implements it over HTTP JSON-RPC.
//! - [`InjectedWallet`] - the user's wallet: account discovery, network reporting,
//!   message and typed-data signing, transaction submission. [`Eip1193Wallet`]
//!   implements it by forwarding EIP-1193 requests to a wallet endpoint.
//!
//! Records returned by the reader keep the node's wire shape where it matters. In
//! particular a receipt's `status` stays a [`ReceiptStatus`] instead of being folded into
//! a boolean, because older nodes report it as a number or hex string.

pub mod injected;
pub mod remote;

pub use injected::*;
pub use remote::*;

use alloy_primitives::{Address, B256, Bytes, U64, U256};
use alloy_transport::TransportError;
use serde::Deserialize;
use std::sync::Arc;

/// A transaction as fetched by hash.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub hash: B256,
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    /// `None` until the transaction is mined.
    #[serde(default, with = "optional_quantity")]
    pub block_number: Option<u64>,
}

/// Receipt `status` as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ReceiptStatus {
    Flag(bool),
    Number(u64),
    Text(String),
}

impl ReceiptStatus {
    /// Exactly `false`, `0` and `"0x0"` mark a failed execution.
    pub fn is_failure(&self) -> bool {
        match self {
            ReceiptStatus::Flag(flag) => !flag,
            ReceiptStatus::Number(n) => *n == 0,
            ReceiptStatus::Text(s) => s == "0x0",
        }
    }
}

/// An event log emitted during execution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogRecord {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// A transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReceiptRecord {
    /// Absent on receipts from before the status field existed.
    #[serde(default)]
    pub status: Option<ReceiptStatus>,
    #[serde(default)]
    pub logs: Vec<LogRecord>,
}

/// Whether a receipt reports successful execution.
///
/// A missing receipt is never a success. A present receipt succeeds unless its status
/// is one of the failure values listed in [`ReceiptStatus::is_failure`].
pub fn is_receipt_success(receipt: Option<&ReceiptRecord>) -> bool {
    match receipt {
        None => false,
        Some(receipt) => !receipt.status.as_ref().is_some_and(ReceiptStatus::is_failure),
    }
}

/// Event log filter: logs emitted by `address` with `event` as topic0 and, optionally,
/// `indexed` as topic1, starting at `from_block`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub event: B256,
    pub indexed: Option<B256>,
    pub from_block: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Cannot decode contract data: {0}")]
    Abi(#[from] alloy_sol_types::Error),
}

/// Read-only access to an Ethereum-compatible node.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    /// `None` when the node does not know the transaction (yet).
    async fn transaction(&self, hash: B256) -> Result<Option<TransactionRecord>, ChainError>;

    /// `None` until the transaction is mined.
    async fn receipt(&self, hash: B256) -> Result<Option<ReceiptRecord>, ChainError>;

    /// Timestamp of block `number`, `None` if the block is unknown.
    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, ChainError>;

    /// Current block height.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Native coin balance of `address`.
    async fn balance(&self, address: Address) -> Result<U256, ChainError>;

    /// Executes a view call against `to` and returns the raw return data.
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ChainError>;

    /// Event logs matching `query`.
    async fn logs(&self, query: &LogQuery) -> Result<Vec<LogRecord>, ChainError>;
}

#[async_trait::async_trait]
impl<T: ChainReader + ?Sized> ChainReader for Arc<T> {
    async fn transaction(&self, hash: B256) -> Result<Option<TransactionRecord>, ChainError> {
        (**self).transaction(hash).await
    }

    async fn receipt(&self, hash: B256) -> Result<Option<ReceiptRecord>, ChainError> {
        (**self).receipt(hash).await
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, ChainError> {
        (**self).block_timestamp(number).await
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        (**self).block_number().await
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        (**self).balance(address).await
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ChainError> {
        (**self).call(to, input).await
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<LogRecord>, ChainError> {
        (**self).logs(query).await
    }
}

/// Serde adapter for nullable hex quantities such as `blockNumber`.
mod optional_quantity {
    use alloy_primitives::U64;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let quantity = Option::<U64>::deserialize(deserializer)?;
        Ok(quantity.map(|q| q.to::<u64>()))
    }
}

/// Block header fields the bridge reads.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BlockHeaderRecord {
    pub timestamp: U64,
}
