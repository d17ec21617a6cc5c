//! Transfer resolution: turns a transaction hash into the value actually delivered.
//!
//! Native transfers are reported as sent. Token transfers are decoded from calldata, and
//! once the transaction is final its receipt is consulted:
//!
//! - `transferDelegated` reports the receipt's matching `Transfer` event, so the value is
//!   what the recipient received after the relayer's reward was deducted.
//! - `transferAndLock` reports the receipt's first `Transfer` event.
//! - a plain `transfer` keeps its nominal values.
//!
//! A transaction is final when the chain head is more than `confirmations` blocks past
//! the transaction's block. Before that, outcomes are provisional: `finalized` and
//! `failed` are both false and the values are the nominal ones from calldata.

use alloy_primitives::{Address, B256, U256};
use coinlink_types::{ChecksummedAddress, UnixTimestamp};
use coinlink_types::amount::decimal_u256;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::chain::{ChainReader, ReceiptRecord, TransactionRecord, is_receipt_success};
use crate::decoder::{TokenCall, TransferEvent, decode_call, decode_transfers};
use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferKind {
    /// Value carried by the transaction itself.
    Native,
    Transfer,
    TransferDelegated,
    TransferAndLock,
}

/// Who sent what to whom, and whether it stuck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub kind: TransferKind,
    pub from: ChecksummedAddress,
    pub to: ChecksummedAddress,
    #[serde(with = "decimal_u256")]
    pub value: U256,
    /// Block timestamp, unknown until final.
    pub timestamp: UnixTimestamp,
    pub failed: bool,
    pub finalized: bool,
}

impl TransferOutcome {
    fn provisional(kind: TransferKind, from: Address, to: Address, value: U256) -> Self {
        Self {
            kind,
            from: from.into(),
            to: to.into(),
            value,
            timestamp: UnixTimestamp::UNKNOWN,
            failed: false,
            finalized: false,
        }
    }

    fn settled(self, timestamp: UnixTimestamp, failed: bool) -> Self {
        Self {
            timestamp,
            failed,
            finalized: true,
            ..self
        }
    }
}

/// Execution result of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxCompletion {
    pub timestamp: UnixTimestamp,
    pub failed: bool,
}

/// How to treat a transaction the node does not know yet.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Fail with [`BridgeError::NotFound`].
    Once,
    /// Keep polling until the transaction shows up or the token is cancelled.
    UntilFound(CancellationToken),
}

pub struct TransferResolver {
    reader: Arc<dyn ChainReader>,
    token: Address,
    confirmations: u64,
    poll_interval: Duration,
}

impl TransferResolver {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        token: Address,
        confirmations: u64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            reader,
            token,
            confirmations,
            poll_interval,
        }
    }

    #[cfg_attr(feature = "telemetry", tracing::instrument(skip(self, lookup), err))]
    pub async fn resolve(&self, tx_hash: B256, lookup: Lookup) -> Result<TransferOutcome, BridgeError> {
        let (tx, head) = self.fetch_transaction(tx_hash, &lookup).await?;
        if tx.value > U256::ZERO {
            return self.resolve_native(tx, head).await;
        }
        if tx.to != Some(self.token) {
            return Err(BridgeError::NotRecognized(tx_hash));
        }

        let (kind, from, to, value) = match decode_call(&tx.input) {
            TokenCall::Transfer { to, value } => (TransferKind::Transfer, tx.from, to, value),
            TokenCall::TransferDelegated { from, to, value } => {
                (TransferKind::TransferDelegated, from, to, value)
            }
            TokenCall::TransferAndLock { to, value } => {
                (TransferKind::TransferAndLock, tx.from, to, value)
            }
            TokenCall::Unrecognized => return Err(BridgeError::NotRecognized(tx_hash)),
        };
        let nominal = TransferOutcome::provisional(kind, from, to, value);
        let Some(block) = self.final_block(tx.block_number, head) else {
            return Ok(nominal);
        };

        let (receipt, timestamp) = self.fetch_settlement(tx_hash, block).await?;
        let receipt = match receipt {
            Some(receipt) if is_receipt_success(Some(&receipt)) => receipt,
            _ => return Ok(nominal.settled(timestamp, true)),
        };
        let transfers = decode_transfers(&receipt.logs);
        let delivered = match kind {
            TransferKind::TransferDelegated => transfers
                .iter()
                .find(|event| event.to == to)
                .map(|event| (event.from, event.to, event.value)),
            TransferKind::TransferAndLock => transfers
                .first()
                .map(|&TransferEvent { to, value, .. }| (from, to, value)),
            TransferKind::Transfer | TransferKind::Native => Some((from, to, value)),
        };
        let (from, to, value) = delivered.ok_or(BridgeError::CannotParseReceipt(tx_hash))?;
        Ok(TransferOutcome {
            from: from.into(),
            to: to.into(),
            value,
            ..nominal
        }
        .settled(timestamp, false))
    }

    async fn resolve_native(
        &self,
        tx: TransactionRecord,
        head: u64,
    ) -> Result<TransferOutcome, BridgeError> {
        let to = tx.to.ok_or(BridgeError::NotRecognized(tx.hash))?;
        let nominal = TransferOutcome::provisional(TransferKind::Native, tx.from, to, tx.value);
        let Some(block) = self.final_block(tx.block_number, head) else {
            return Ok(nominal);
        };
        let (receipt, timestamp) = self.fetch_settlement(tx.hash, block).await?;
        Ok(nominal.settled(timestamp, !is_receipt_success(receipt.as_ref())))
    }

    /// Fetches the transaction together with the chain head, polling if asked to.
    async fn fetch_transaction(
        &self,
        tx_hash: B256,
        lookup: &Lookup,
    ) -> Result<(TransactionRecord, u64), BridgeError> {
        loop {
            let (tx, head) =
                tokio::try_join!(self.reader.transaction(tx_hash), self.reader.block_number())?;
            if let Some(tx) = tx.filter(|_| head > 0) {
                return Ok((tx, head));
            }
            match lookup {
                Lookup::Once => return Err(BridgeError::NotFound(tx_hash)),
                Lookup::UntilFound(cancel) => {
                    tracing::debug!(%tx_hash, "Transaction not found yet");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(BridgeError::Cancelled),
                        _ = sleep(self.poll_interval) => {}
                    }
                }
            }
        }
    }

    async fn fetch_settlement(
        &self,
        tx_hash: B256,
        block: u64,
    ) -> Result<(Option<ReceiptRecord>, UnixTimestamp), BridgeError> {
        let (receipt, timestamp) = tokio::try_join!(
            self.reader.receipt(tx_hash),
            self.reader.block_timestamp(block)
        )?;
        Ok((receipt, timestamp.map(UnixTimestamp::from).unwrap_or_default()))
    }

    /// The transaction's block if it has more than `confirmations` blocks on top.
    fn final_block(&self, tx_block: Option<u64>, head: u64) -> Option<u64> {
        tx_block.filter(|block| head.saturating_sub(*block) > self.confirmations)
    }

    /// Resolves once the transaction is final.
    ///
    /// Polls the transaction, its receipt and the chain head every poll interval. Fails
    /// with `TransactionFailed` as soon as a receipt reports failed execution, and with
    /// `Cancelled` when `cancel` fires. There is no built-in timeout.
    pub async fn wait_for_confirmations(
        &self,
        tx_hash: B256,
        cancel: &CancellationToken,
    ) -> Result<(), BridgeError> {
        loop {
            let (tx, receipt, head) = tokio::try_join!(
                self.reader.transaction(tx_hash),
                self.reader.receipt(tx_hash),
                self.reader.block_number()
            )?;
            if receipt.is_some() && !is_receipt_success(receipt.as_ref()) {
                tracing::warn!(%tx_hash, "Transaction failed while waiting for confirmations");
                return Err(BridgeError::TransactionFailed(tx_hash));
            }
            let block = tx.and_then(|tx| tx.block_number);
            if receipt.is_some() && self.final_block(block, head).is_some() {
                tracing::info!(%tx_hash, head, "Transaction confirmed");
                return Ok(());
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(BridgeError::Cancelled),
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    /// Execution result of a transaction.
    ///
    /// `None` while the node does not know the transaction. Until the transaction is
    /// final, or while its receipt is missing, the result is
    /// `{ timestamp: unknown, failed: false }`.
    pub async fn completion_status(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TxCompletion>, BridgeError> {
        let (tx, head) =
            tokio::try_join!(self.reader.transaction(tx_hash), self.reader.block_number())?;
        let Some(tx) = tx.filter(|_| head > 0) else {
            return Ok(None);
        };
        let Some(block) = self.final_block(tx.block_number, head) else {
            return Ok(Some(TxCompletion {
                timestamp: UnixTimestamp::UNKNOWN,
                failed: false,
            }));
        };
        let completion = match self.fetch_settlement(tx_hash, block).await? {
            (Some(receipt), timestamp) => TxCompletion {
                timestamp,
                failed: !is_receipt_success(Some(&receipt)),
            },
            (None, _) => TxCompletion {
                timestamp: UnixTimestamp::UNKNOWN,
                failed: false,
            },
        };
        Ok(Some(completion))
    }
}
