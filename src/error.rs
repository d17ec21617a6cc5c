use alloy_primitives::B256;
use serde::Serialize;
use std::fmt::{Display, Formatter};

use crate::chain::{ChainError, WalletError};

/// Errors raised to the caller of a bridge operation.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Wallet session is not initialized")]
    NotReady,
    #[error("Cannot find transaction {0}")]
    NotFound(B256),
    #[error("Transaction {0} is not a recognized token transfer")]
    NotRecognized(B256),
    #[error("Cannot parse receipt of transaction {0}")]
    CannotParseReceipt(B256),
    #[error("Transaction {0} failed")]
    TransactionFailed(B256),
    #[error("Signing rejected")]
    SigningRejected,
    #[error("Delegated transfer is not supported by the active signer")]
    Unsupported,
    #[error("Operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Connection problems reported through [`crate::observer::SessionObserver::on_error`].
///
/// These never surface as [`BridgeError`]; the session retries on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorReason {
    /// No injected wallet is present.
    #[serde(rename = "web3")]
    NoProvider,
    /// The injected wallet is connected to another network.
    #[serde(rename = "testnet")]
    NetworkMismatch,
    /// The injected wallet exposes no account.
    #[serde(rename = "locked")]
    Locked,
}

impl ErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::NoProvider => "web3",
            ErrorReason::NetworkMismatch => "testnet",
            ErrorReason::Locked => "locked",
        }
    }
}

impl Display for ErrorReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
