//! User actions that go through the injected wallet.

use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, B256, Bytes, U256, hex};
use alloy_rpc_types_eth::TransactionRequest;

use crate::error::BridgeError;
use crate::session::WalletSession;

/// Optional gas overrides for [`WalletSession::send_transaction`]. Unset fields are left
/// for the wallet to estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasOptions {
    pub gas_price: Option<u128>,
    pub gas_limit: Option<u64>,
}

impl WalletSession {
    /// Sends `value` wei from the current account to `to` and returns the transaction hash.
    pub async fn send_transaction(
        &self,
        to: Address,
        value: U256,
        gas: GasOptions,
    ) -> Result<B256, BridgeError> {
        let (wallet, from) = self.active_signer()?;
        let mut request = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(value);
        if let Some(gas_price) = gas.gas_price {
            request.set_gas_price(gas_price);
        }
        if let Some(gas_limit) = gas.gas_limit {
            request.set_gas_limit(gas_limit);
        }
        self.observer().on_sign_start(None);
        let result = wallet.send_transaction(request).await;
        self.observer().on_sign_end();
        let hash = result?;
        tracing::info!(%hash, %from, %to, "Transaction submitted");
        Ok(hash)
    }

    /// Signs a login challenge.
    pub async fn sign_login(&self, payload: &str) -> Result<Bytes, BridgeError> {
        self.active_signer()?;
        self.observer().on_login_start();
        self.personal_sign(payload).await
    }

    /// Signs an arbitrary user-facing payload, e.g. a profile update.
    pub async fn sign_user_payload(&self, payload: &str) -> Result<Bytes, BridgeError> {
        self.active_signer()?;
        self.observer().on_sign_start(None);
        self.personal_sign(payload).await
    }

    /// `personal_sign` over the UTF-8 bytes of `payload` with the current account.
    pub async fn personal_sign(&self, payload: &str) -> Result<Bytes, BridgeError> {
        let (wallet, from) = self.active_signer()?;
        let result = wallet.personal_sign(payload, from).await;
        self.observer().on_sign_end();
        let signature = result?;
        let digits = signature.strip_prefix("0x").unwrap_or(&signature);
        if digits.is_empty() {
            return Err(BridgeError::SigningRejected);
        }
        let bytes = hex::decode(digits).map_err(|_| BridgeError::SigningRejected)?;
        Ok(bytes.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InjectedWallet;
    use crate::session::ConnectMode;
    use crate::testing::{MockChain, MockWallet, ObserverEvent, RecordingObserver, test_config};
    use alloy_primitives::address;
    use coinlink_types::NetworkType;
    use std::sync::Arc;

    const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");
    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

    async fn connected() -> (WalletSession, Arc<MockWallet>, Arc<RecordingObserver>) {
        let wallet = Arc::new(MockWallet::new(NetworkType::Rinkeby));
        wallet.set_accounts(vec![ALICE]);
        let observer = Arc::new(RecordingObserver::default());
        let injected: Option<Arc<dyn InjectedWallet>> = Some(wallet.clone());
        let session = WalletSession::new(
            &test_config(),
            Arc::new(MockChain::default()),
            Arc::new(injected),
            observer.clone(),
        );
        session.connect(ConnectMode::Passive).await;
        (session, wallet, observer)
    }

    #[tokio::test(start_paused = true)]
    async fn send_transaction_fills_sender_and_gas() {
        let (session, wallet, observer) = connected().await;

        let gas = GasOptions {
            gas_price: Some(20_000_000_000),
            gas_limit: Some(21_000),
        };
        let hash = session
            .send_transaction(BOB, U256::from(5u64), gas)
            .await
            .unwrap();

        assert_eq!(hash, B256::repeat_byte(0x77));
        let sent = wallet.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, Some(ALICE));
        assert_eq!(sent[0].value, Some(U256::from(5u64)));
        assert_eq!(sent[0].gas, Some(21_000));
        assert_eq!(sent[0].gas_price, Some(20_000_000_000));
        let events = observer.events();
        assert!(events.ends_with(&[ObserverEvent::SignStart(None), ObserverEvent::SignEnd]));
    }

    #[tokio::test(start_paused = true)]
    async fn login_signs_utf8_payload() {
        let (session, wallet, observer) = connected().await;

        let signature = session.sign_login("Login to coinlink").await.unwrap();

        assert_eq!(signature.len(), 65);
        assert_eq!(wallet.signed_messages(), vec!["Login to coinlink".to_owned()]);
        assert!(
            observer
                .events()
                .ends_with(&[ObserverEvent::LoginStart, ObserverEvent::SignEnd])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn user_payload_rejection_surfaces() {
        let (session, wallet, observer) = connected().await;
        wallet.set_signature(Err("User denied message signature"));

        let result = session.sign_user_payload("{\"displayName\":\"alice\"}").await;

        assert!(matches!(result, Err(BridgeError::Wallet(_))));
        assert!(
            observer
                .events()
                .ends_with(&[ObserverEvent::SignStart(None), ObserverEvent::SignEnd])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn actions_require_ready_session() {
        let (session, wallet, _) = connected().await;
        session.disable();

        assert!(matches!(
            session.sign_login("x").await,
            Err(BridgeError::NotReady)
        ));
        assert!(matches!(
            session
                .send_transaction(BOB, U256::from(1u64), GasOptions::default())
                .await,
            Err(BridgeError::NotReady)
        ));
        assert!(wallet.signed_messages().is_empty());
    }
}
