//! Delegated token transfers.
//!
//! The user signs a `transferDelegated` authorization with their wallet. A relayer later
//! submits it on chain and claims up to `max_reward` tokens for paying the gas. Each
//! authorization carries a random 256-bit nonce that the token contract has not seen yet
//! for the sender.

use alloy_primitives::{Address, B256, Bytes, U256, hex};
use coinlink_types::ChecksummedAddress;
use coinlink_types::amount::{decimal_u256, group_digits};
use rand::{Rng, rng};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::chain::{InjectedWallet, TypedDataField};
use crate::contract::TokenContract;
use crate::error::BridgeError;
use crate::observer::SignIntent;
use crate::session::WalletSession;

/// A signed authorization, ready to hand to a relayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedTransferRequest {
    pub from: ChecksummedAddress,
    pub to: ChecksummedAddress,
    #[serde(with = "decimal_u256")]
    pub value: U256,
    #[serde(with = "decimal_u256")]
    pub max_reward: U256,
    pub nonce: B256,
    /// 65-byte ECDSA signature over the typed data.
    pub signature: Bytes,
}

/// Typed data signed for a delegated transfer, in the order the token contract hashes it.
///
/// Amounts are shown with space-separated digit groups so the wallet prompt stays
/// readable.
pub fn transfer_typed_data(
    contract: Address,
    to: Address,
    value: U256,
    max_reward: U256,
    nonce: B256,
) -> Vec<TypedDataField> {
    vec![
        TypedDataField::new("address", "contract", contract.to_checksum(None)),
        TypedDataField::new("string", "method", "transferDelegated"),
        TypedDataField::new("address", "to", to.to_checksum(None)),
        TypedDataField::new("uint256", "value", group_digits(&value)),
        TypedDataField::new("uint256", "maxReward", group_digits(&max_reward)),
        TypedDataField::new("uint256", "nonce", hex::encode_prefixed(nonce)),
    ]
}

pub struct DelegatedTransferSigner {
    session: WalletSession,
}

impl DelegatedTransferSigner {
    pub fn new(session: WalletSession) -> Self {
        Self { session }
    }

    pub async fn prepare(
        &self,
        to: Address,
        value: U256,
        max_reward: U256,
    ) -> Result<DelegatedTransferRequest, BridgeError> {
        self.prepare_with_cancel(to, value, max_reward, &CancellationToken::new())
            .await
    }

    /// Signs a delegated transfer of `value` tokens to `to`.
    ///
    /// Fails with `Unsupported` before touching the chain when the active signer cannot
    /// sign typed data, and with `SigningRejected` when the wallet returns no signature.
    /// `cancel` aborts the nonce search.
    #[cfg_attr(feature = "telemetry", tracing::instrument(skip(self, cancel), err))]
    pub async fn prepare_with_cancel(
        &self,
        to: Address,
        value: U256,
        max_reward: U256,
        cancel: &CancellationToken,
    ) -> Result<DelegatedTransferRequest, BridgeError> {
        let (wallet, from) = self.session.delegated_signer()?;
        let observer = self.session.observer();
        observer.on_sign_start(Some(&SignIntent::send_token(to, value)));
        let result = self
            .sign(wallet.as_ref(), from, to, value, max_reward, cancel)
            .await;
        observer.on_sign_end();
        result
    }

    async fn sign(
        &self,
        wallet: &dyn InjectedWallet,
        from: Address,
        to: Address,
        value: U256,
        max_reward: U256,
        cancel: &CancellationToken,
    ) -> Result<DelegatedTransferRequest, BridgeError> {
        let token = self.session.token();
        let nonce = unused_nonce(token, from, cancel).await?;
        let fields = transfer_typed_data(token.address(), to, value, max_reward, nonce);
        let signature = match wallet.sign_typed_data(&fields, from).await {
            Ok(signature) => signature,
            Err(error) => {
                tracing::error!(%error, "Typed data signing failed");
                String::new()
            }
        };
        let digits = signature.strip_prefix("0x").unwrap_or(&signature);
        if digits.is_empty() {
            return Err(BridgeError::SigningRejected);
        }
        let signature = hex::decode(digits).map_err(|error| {
            tracing::warn!(%error, "Wallet returned a malformed signature");
            BridgeError::SigningRejected
        })?;
        Ok(DelegatedTransferRequest {
            from: from.into(),
            to: to.into(),
            value,
            max_reward,
            nonce,
            signature: signature.into(),
        })
    }
}

/// Draws random nonces until the token contract reports one as unused for `from`.
async fn unused_nonce(
    token: &TokenContract,
    from: Address,
    cancel: &CancellationToken,
) -> Result<B256, BridgeError> {
    loop {
        let nonce = B256::from(rng().random::<[u8; 32]>());
        let used = tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::Cancelled),
            used = token.used_nonce(from, nonce) => used?,
        };
        if !used {
            return Ok(nonce);
        }
        tracing::debug!(%from, %nonce, "Nonce already used, drawing another");
    }
}
