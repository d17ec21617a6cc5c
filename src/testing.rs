//! In-memory doubles for the chain reader, the injected wallet and the session observer.

use alloy_primitives::{Address, B256, Bytes, U256, address};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_sol_types::{SolCall, SolEvent, SolType, sol_data};
use alloy_transport::TransportErrorKind;
use coinlink_types::NetworkType;
use coinlink_types::config::RpcConfig;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

use crate::chain::{
    ChainError, ChainReader, InjectedWallet, LogQuery, LogRecord, ReceiptRecord, ReceiptStatus,
    TransactionRecord, TypedDataField, WalletError, WalletKind,
};
use crate::config::BridgeConfig;
use crate::contract::{IToken, ITokenSale};
use crate::error::ErrorReason;
use crate::observer::{SessionObserver, SignIntent};
use crate::session::ProviderMode;

pub const TOKEN: Address = address!("0x02f61fd266da6e8b102d4121f5ce7b992640cf98");
pub const TOKEN_SALE: Address = address!("0x5e4b6ec4b3e1b4b4e0a0d5b7a2a4b2f4b0c2f2a1");

/// Rinkeby configuration pointing at [`TOKEN`] and [`TOKEN_SALE`].
pub fn test_config() -> BridgeConfig {
    let rpc = RpcConfig::new(Url::parse("http://127.0.0.1:8545").unwrap());
    BridgeConfig::new(NetworkType::Rinkeby, vec![rpc], TOKEN, TOKEN_SALE)
}

pub fn transfer_log(token: Address, from: Address, to: Address, value: U256) -> LogRecord {
    let data = IToken::Transfer { from, to, value }.encode_log_data();
    LogRecord {
        address: token,
        topics: data.topics().to_vec(),
        data: data.data,
    }
}

pub fn receipt(status: ReceiptStatus, logs: Vec<LogRecord>) -> ReceiptRecord {
    ReceiptRecord {
        status: Some(status),
        logs,
    }
}

#[derive(Default)]
struct ChainState {
    head: u64,
    transactions: HashMap<B256, TransactionRecord>,
    receipts: HashMap<B256, ReceiptRecord>,
    timestamps: HashMap<u64, u64>,
    balances: HashMap<Address, U256>,
    token_balances: HashMap<Address, U256>,
    kyc: HashSet<Address>,
    used_nonces: HashSet<(Address, B256)>,
    forced_collisions: usize,
    checked_nonces: Vec<(Address, B256)>,
    logs: Vec<LogRecord>,
    calls: usize,
}

/// A chain whose state is set up by the test.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    fn state(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    pub fn set_head(&self, head: u64) {
        self.state().head = head;
    }

    pub fn insert_transaction(&self, tx: TransactionRecord) {
        self.state().transactions.insert(tx.hash, tx);
    }

    pub fn insert_receipt(&self, hash: B256, receipt: ReceiptRecord) {
        self.state().receipts.insert(hash, receipt);
    }

    pub fn set_block_timestamp(&self, block: u64, timestamp: u64) {
        self.state().timestamps.insert(block, timestamp);
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state().balances.insert(address, balance);
    }

    pub fn set_token_balance(&self, address: Address, balance: U256) {
        self.state().token_balances.insert(address, balance);
    }

    pub fn set_kyc_done(&self, address: Address) {
        self.state().kyc.insert(address);
    }

    pub fn mark_nonce_used(&self, from: Address, nonce: B256) {
        self.state().used_nonces.insert((from, nonce));
    }

    /// Reports the next `count` nonce checks as already used.
    pub fn collide_next_nonces(&self, count: usize) {
        self.state().forced_collisions = count;
    }

    pub fn checked_nonces(&self) -> Vec<(Address, B256)> {
        self.state().checked_nonces.clone()
    }

    pub fn push_purchase(&self, sale: Address, buyer: Address, coins: U256, ethers: U256) {
        let data = ITokenSale::Purchase {
            _addr: buyer,
            _coins: coins,
            _ethers: ethers,
        }
        .encode_log_data();
        self.state().logs.push(LogRecord {
            address: sale,
            topics: data.topics().to_vec(),
            data: data.data,
        });
    }

    /// Number of reader calls served so far.
    pub fn calls(&self) -> usize {
        self.state().calls
    }

    fn view_call(&self, input: &[u8]) -> Result<Vec<u8>, ChainError> {
        let mut state = self.state();
        if let Ok(call) = IToken::usedNonceCall::abi_decode(input) {
            let nonce = B256::from(call._nonce.to_be_bytes::<32>());
            state.checked_nonces.push((call._from, nonce));
            let used = if state.forced_collisions > 0 {
                state.forced_collisions -= 1;
                true
            } else {
                state.used_nonces.contains(&(call._from, nonce))
            };
            return Ok(<sol_data::Bool as SolType>::abi_encode(&used));
        }
        if let Ok(call) = IToken::balanceOfCall::abi_decode(input) {
            let balance = state
                .token_balances
                .get(&call._owner)
                .copied()
                .unwrap_or_default();
            return Ok(<sol_data::Uint<256> as SolType>::abi_encode(&balance));
        }
        if let Ok(call) = ITokenSale::kycDoneCall::abi_decode(input) {
            let done = state.kyc.contains(&call._addr);
            return Ok(<sol_data::Bool as SolType>::abi_encode(&done));
        }
        Err(TransportErrorKind::custom_str("execution reverted").into())
    }
}

#[async_trait::async_trait]
impl ChainReader for MockChain {
    async fn transaction(&self, hash: B256) -> Result<Option<TransactionRecord>, ChainError> {
        let mut state = self.state();
        state.calls += 1;
        Ok(state.transactions.get(&hash).cloned())
    }

    async fn receipt(&self, hash: B256) -> Result<Option<ReceiptRecord>, ChainError> {
        let mut state = self.state();
        state.calls += 1;
        Ok(state.receipts.get(&hash).cloned())
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, ChainError> {
        let mut state = self.state();
        state.calls += 1;
        Ok(state.timestamps.get(&number).copied())
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let mut state = self.state();
        state.calls += 1;
        Ok(state.head)
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        let mut state = self.state();
        state.calls += 1;
        Ok(state.balances.get(&address).copied().unwrap_or_default())
    }

    async fn call(&self, _to: Address, input: Bytes) -> Result<Bytes, ChainError> {
        self.state().calls += 1;
        self.view_call(&input).map(Bytes::from)
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<LogRecord>, ChainError> {
        let mut state = self.state();
        state.calls += 1;
        let logs = state
            .logs
            .iter()
            .filter(|log| log.address == query.address)
            .filter(|log| log.topics.first() == Some(&query.event))
            .filter(|log| query.indexed.is_none() || log.topics.get(1) == query.indexed.as_ref())
            .cloned()
            .collect();
        Ok(logs)
    }
}

struct WalletState {
    kind: WalletKind,
    network: NetworkType,
    network_fails: bool,
    accounts: Vec<Address>,
    account_delay: Duration,
    deny_requests: bool,
    signature: Result<String, String>,
    typed_data: Vec<Vec<TypedDataField>>,
    messages: Vec<String>,
    transactions: Vec<TransactionRequest>,
    network_calls: usize,
    account_calls: usize,
    request_calls: usize,
}

/// An injected wallet scripted by the test.
pub struct MockWallet {
    state: Mutex<WalletState>,
}

impl MockWallet {
    pub fn new(network: NetworkType) -> Self {
        Self {
            state: Mutex::new(WalletState {
                kind: WalletKind::Generic,
                network,
                network_fails: false,
                accounts: Vec::new(),
                account_delay: Duration::ZERO,
                deny_requests: false,
                signature: Ok(format!("0x{}", "ab".repeat(65))),
                typed_data: Vec::new(),
                messages: Vec::new(),
                transactions: Vec::new(),
                network_calls: 0,
                account_calls: 0,
                request_calls: 0,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, WalletState> {
        self.state.lock().unwrap()
    }

    pub fn set_kind(&self, kind: WalletKind) {
        self.state().kind = kind;
    }

    pub fn set_network(&self, network: NetworkType) {
        self.state().network = network;
    }

    pub fn fail_network(&self, fails: bool) {
        self.state().network_fails = fails;
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.state().accounts = accounts;
    }

    /// Makes every account lookup take `delay` before answering.
    pub fn set_account_delay(&self, delay: Duration) {
        self.state().account_delay = delay;
    }

    pub fn deny_account_requests(&self, deny: bool) {
        self.state().deny_requests = deny;
    }

    /// What signing requests return. `Err` makes them fail at the transport.
    pub fn set_signature(&self, signature: Result<&str, &str>) {
        self.state().signature = signature.map(str::to_owned).map_err(str::to_owned);
    }

    pub fn network_calls(&self) -> usize {
        self.state().network_calls
    }

    pub fn account_calls(&self) -> usize {
        self.state().account_calls
    }

    pub fn request_calls(&self) -> usize {
        self.state().request_calls
    }

    pub fn typed_data_requests(&self) -> Vec<Vec<TypedDataField>> {
        self.state().typed_data.clone()
    }

    pub fn signed_messages(&self) -> Vec<String> {
        self.state().messages.clone()
    }

    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.state().transactions.clone()
    }

    fn signature(&self) -> Result<String, WalletError> {
        self.state().signature.clone().map_err(WalletError::Rejected)
    }
}

#[async_trait::async_trait]
impl InjectedWallet for MockWallet {
    fn kind(&self) -> WalletKind {
        self.state().kind
    }

    async fn network_type(&self) -> Result<NetworkType, WalletError> {
        let mut state = self.state();
        state.network_calls += 1;
        if state.network_fails {
            return Err(WalletError::Rejected("provider crashed".into()));
        }
        Ok(state.network)
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        let delay = {
            let mut state = self.state();
            state.account_calls += 1;
            state.account_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.state().accounts.clone())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let mut state = self.state();
        state.request_calls += 1;
        if state.deny_requests {
            return Err(WalletError::Rejected("User denied account authorization".into()));
        }
        Ok(state.accounts.clone())
    }

    async fn sign_typed_data(
        &self,
        data: &[TypedDataField],
        _from: Address,
    ) -> Result<String, WalletError> {
        self.state().typed_data.push(data.to_vec());
        self.signature()
    }

    async fn personal_sign(&self, message: &str, _from: Address) -> Result<String, WalletError> {
        self.state().messages.push(message.to_owned());
        self.signature()
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<B256, WalletError> {
        self.state().transactions.push(request);
        Ok(B256::repeat_byte(0x77))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    Error(ErrorReason),
    ErrorCleared,
    WalletChanged(Option<Address>),
    ProviderChanged(ProviderMode),
    SignStart(Option<SignIntent>),
    SignEnd,
    LoginStart,
}

/// Observer that records every notification in order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: ObserverEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl SessionObserver for RecordingObserver {
    fn on_error(&self, reason: ErrorReason) {
        self.push(ObserverEvent::Error(reason));
    }

    fn on_error_cleared(&self) {
        self.push(ObserverEvent::ErrorCleared);
    }

    fn on_wallet_changed(&self, address: Option<Address>) {
        self.push(ObserverEvent::WalletChanged(address));
    }

    fn on_provider_changed(&self, mode: ProviderMode) {
        self.push(ObserverEvent::ProviderChanged(mode));
    }

    fn on_sign_start(&self, intent: Option<&SignIntent>) {
        self.push(ObserverEvent::SignStart(intent.cloned()));
    }

    fn on_sign_end(&self) {
        self.push(ObserverEvent::SignEnd);
    }

    fn on_login_start(&self) {
        self.push(ObserverEvent::LoginStart);
    }
}
