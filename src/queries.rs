//! Read-only account queries.
//!
//! Every query takes an optional address. Without one, the session's current account is
//! used: that fails with `NotReady` while the session is not initialized, and yields an
//! empty answer when the wallet exposes no account.

use alloy_primitives::{Address, U256};

use crate::contract::{PurchaseEvent, PurchaseTotal};
use crate::error::BridgeError;
use crate::session::WalletSession;

impl WalletSession {
    fn query_target(&self, address: Option<Address>) -> Result<Option<Address>, BridgeError> {
        match address {
            Some(address) => Ok(Some(address)),
            None if self.is_initialized() => Ok(self.wallet_address()),
            None => Err(BridgeError::NotReady),
        }
    }

    /// Token balance in the token's smallest unit.
    pub async fn token_balance(&self, address: Option<Address>) -> Result<Option<U256>, BridgeError> {
        let Some(address) = self.query_target(address)? else {
            return Ok(None);
        };
        Ok(Some(self.token().balance_of(address).await?))
    }

    /// Native balance in wei.
    pub async fn native_balance(&self, address: Option<Address>) -> Result<Option<U256>, BridgeError> {
        let Some(address) = self.query_target(address)? else {
            return Ok(None);
        };
        Ok(Some(self.reader().balance(address).await?))
    }

    /// Whether the token sale has completed KYC for the account.
    pub async fn kyc_status(&self, address: Option<Address>) -> Result<bool, BridgeError> {
        let Some(address) = self.query_target(address)? else {
            return Ok(false);
        };
        Ok(self.token_sale().kyc_done(address).await?)
    }

    pub async fn purchase_events(
        &self,
        address: Option<Address>,
    ) -> Result<Vec<PurchaseEvent>, BridgeError> {
        let Some(address) = self.query_target(address)? else {
            return Ok(Vec::new());
        };
        Ok(self.token_sale().purchase_events(address).await?)
    }

    /// Coins bought and ethers paid over all of the account's purchases.
    pub async fn purchase_total(&self, address: Option<Address>) -> Result<PurchaseTotal, BridgeError> {
        let events = self.purchase_events(address).await?;
        Ok(events.into_iter().collect())
    }
}
