use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, B256, Bytes, U64, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{Filter, TransactionRequest};
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use coinlink_types::config::RpcConfig;
use std::num::NonZeroUsize;
use tower::ServiceBuilder;

use crate::chain::{
    BlockHeaderRecord, ChainError, ChainReader, LogQuery, LogRecord, ReceiptRecord,
    TransactionRecord,
};

/// Read-only connection to a configured node.
///
/// Requests are spread over every configured HTTP endpoint through a fallback
/// transport; each endpoint is throttled to its configured rate limit.
#[derive(Debug, Clone)]
pub struct RemoteChain {
    provider: RootProvider,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteChainError {
    #[error("At least one http(s) RPC endpoint should be configured")]
    NoEndpoints,
}

impl RemoteChain {
    /// Builds the fallback RPC client over all http(s) endpoints in `rpc`.
    pub fn rpc_client(rpc: &[RpcConfig]) -> Result<RpcClient, RemoteChainError> {
        let transports = rpc
            .iter()
            .filter_map(|endpoint| {
                let url = endpoint.http.inner().clone();
                let is_http = url.scheme() == "http" || url.scheme() == "https";
                if !is_http {
                    tracing::warn!(rpc_url = %url, "Skipping non-http RPC endpoint");
                    return None;
                }
                tracing::info!(rpc_url = %url, rate_limit = ?endpoint.rate_limit, "Using HTTP transport");
                let rate_limit = endpoint.rate_limit.unwrap_or(u32::MAX);
                let service = ServiceBuilder::new()
                    .layer(ThrottleLayer::new(rate_limit))
                    .service(Http::new(url));
                Some(service)
            })
            .collect::<Vec<_>>();
        let active = NonZeroUsize::new(transports.len()).ok_or(RemoteChainError::NoEndpoints)?;
        let fallback = ServiceBuilder::new()
            .layer(FallbackLayer::default().with_active_transport_count(active))
            .service(transports);
        Ok(RpcClient::new(fallback, false))
    }

    pub fn new(rpc: &[RpcConfig]) -> Result<Self, RemoteChainError> {
        let client = Self::rpc_client(rpc)?;
        let provider: RootProvider = RootProvider::new(client);
        Ok(Self { provider })
    }

    pub fn provider(&self) -> &RootProvider {
        &self.provider
    }
}

#[async_trait::async_trait]
impl ChainReader for RemoteChain {
    async fn transaction(&self, hash: B256) -> Result<Option<TransactionRecord>, ChainError> {
        let tx = self
            .provider
            .raw_request::<_, Option<TransactionRecord>>(
                "eth_getTransactionByHash".into(),
                (hash,),
            )
            .await?;
        Ok(tx)
    }

    async fn receipt(&self, hash: B256) -> Result<Option<ReceiptRecord>, ChainError> {
        let receipt = self
            .provider
            .raw_request::<_, Option<ReceiptRecord>>("eth_getTransactionReceipt".into(), (hash,))
            .await?;
        Ok(receipt)
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, ChainError> {
        let header = self
            .provider
            .raw_request::<_, Option<BlockHeaderRecord>>(
                "eth_getBlockByNumber".into(),
                (U64::from(number), false),
            )
            .await?;
        Ok(header.map(|header| header.timestamp.to::<u64>()))
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        Ok(self.provider.get_balance(address).await?)
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ChainError> {
        let request = TransactionRequest::default().with_to(to).with_input(input);
        Ok(self.provider.call(request).await?)
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<LogRecord>, ChainError> {
        let mut filter = Filter::new()
            .address(query.address)
            .event_signature(query.event)
            .from_block(query.from_block);
        if let Some(indexed) = query.indexed {
            filter = filter.topic1(indexed);
        }
        let logs = self.provider.get_logs(&filter).await?;
        let logs = logs
            .into_iter()
            .map(|log| LogRecord {
                address: log.address(),
                topics: log.topics().to_vec(),
                data: log.data().data.clone(),
            })
            .collect();
        Ok(logs)
    }
}
