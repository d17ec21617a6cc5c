use alloy_primitives::{Address, B256, hex};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_transport::TransportError;
use coinlink_types::NetworkType;
use coinlink_types::config::RpcConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use crate::chain::{RemoteChain, RemoteChainError};

/// Wallet implementations the bridge knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    #[default]
    Generic,
    /// Trust wallet: cannot sign typed data carrying 256-bit integers.
    Trust,
}

/// One entry of a legacy `eth_signTypedData` message: `{ "type", "name", "value" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedDataField {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'static str,
    pub value: String,
}

impl TypedDataField {
    pub fn new(kind: &'static str, name: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            name,
            value: value.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Wallet request rejected: {0}")]
    Rejected(String),
}

/// The user's wallet, reached through its EIP-1193 request surface.
///
/// Signing methods return the raw signature string produced by the wallet. An empty
/// string means the wallet answered without a signature.
#[async_trait::async_trait]
pub trait InjectedWallet: Send + Sync {
    fn kind(&self) -> WalletKind {
        WalletKind::Generic
    }

    fn supports_typed_data(&self) -> bool {
        self.kind() != WalletKind::Trust
    }

    /// Whether the wallet can prompt the user to re-authorize account access.
    fn can_request_accounts(&self) -> bool {
        true
    }

    async fn network_type(&self) -> Result<NetworkType, WalletError>;

    async fn accounts(&self) -> Result<Vec<Address>, WalletError>;

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    async fn sign_typed_data(
        &self,
        data: &[TypedDataField],
        from: Address,
    ) -> Result<String, WalletError>;

    async fn personal_sign(&self, message: &str, from: Address) -> Result<String, WalletError>;

    async fn send_transaction(&self, request: TransactionRequest) -> Result<B256, WalletError>;
}

/// Yields the injected wallet when one is present at probe time.
pub trait WalletDetector: Send + Sync {
    fn detect(&self) -> Option<Arc<dyn InjectedWallet>>;
}

impl WalletDetector for Option<Arc<dyn InjectedWallet>> {
    fn detect(&self) -> Option<Arc<dyn InjectedWallet>> {
        self.clone()
    }
}

/// Hex encoding of a UTF-8 string, `0x`-prefixed, as wallets expect for `personal_sign`.
pub fn utf8_to_hex(text: &str) -> String {
    hex::encode_prefixed(text.as_bytes())
}

/// A wallet reached over JSON-RPC, e.g. a desktop wallet exposing its EIP-1193
/// provider on a local HTTP port.
#[derive(Debug, Clone)]
pub struct Eip1193Wallet {
    provider: RootProvider,
    kind: WalletKind,
}

impl Eip1193Wallet {
    pub fn new(endpoint: Url, kind: WalletKind) -> Result<Self, RemoteChainError> {
        let client = RemoteChain::rpc_client(&[RpcConfig::new(endpoint)])?;
        let provider: RootProvider = RootProvider::new(client);
        Ok(Self { provider, kind })
    }
}

#[async_trait::async_trait]
impl InjectedWallet for Eip1193Wallet {
    fn kind(&self) -> WalletKind {
        self.kind
    }

    async fn network_type(&self) -> Result<NetworkType, WalletError> {
        let chain_id = self.provider.get_chain_id().await?;
        Ok(NetworkType::from_chain_id(chain_id))
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(self.provider.get_accounts().await?)
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let accounts = self
            .provider
            .raw_request::<_, Vec<Address>>("eth_requestAccounts".into(), ())
            .await?;
        Ok(accounts)
    }

    async fn sign_typed_data(
        &self,
        data: &[TypedDataField],
        from: Address,
    ) -> Result<String, WalletError> {
        let signature = self
            .provider
            .raw_request::<_, Option<String>>("eth_signTypedData".into(), (data.to_vec(), from))
            .await?;
        Ok(signature.unwrap_or_default())
    }

    async fn personal_sign(&self, message: &str, from: Address) -> Result<String, WalletError> {
        let payload = utf8_to_hex(message);
        let signature = self
            .provider
            .raw_request::<_, Option<String>>("personal_sign".into(), (payload, from))
            .await?;
        Ok(signature.unwrap_or_default())
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<B256, WalletError> {
        let hash = self
            .provider
            .raw_request::<_, B256>("eth_sendTransaction".into(), (request,))
            .await?;
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_data_field_wire_shape() {
        let field = TypedDataField::new("string", "method", "transferDelegated");
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "string", "name": "method", "value": "transferDelegated" })
        );
    }

    #[test]
    fn utf8_payload_is_prefixed_hex() {
        assert_eq!(utf8_to_hex("Login"), "0x4c6f67696e");
        assert_eq!(utf8_to_hex(""), "0x");
        assert_eq!(utf8_to_hex("é"), "0xc3a9");
    }

    #[tokio::test]
    async fn trust_wallet_lacks_typed_data() {
        let url = Url::parse("http://127.0.0.1:1248").unwrap();
        let trust = Eip1193Wallet::new(url.clone(), WalletKind::Trust).unwrap();
        let generic = Eip1193Wallet::new(url, WalletKind::Generic).unwrap();
        assert!(!trust.supports_typed_data());
        assert!(generic.supports_typed_data());
    }
}
