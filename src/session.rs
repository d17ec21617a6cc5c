//! Wallet session state machine.
//!
//! A [`WalletSession`] decides which connection backs user actions, verifies that the
//! injected wallet is on the configured network, and keeps the current account in sync.
//!
//! ```text
//! Uninitialized ──connect──▶ Probing(Injected) ──network ok──▶ Ready ◀──▶ Locked
//!                        └─▶ Probing(Remote)
//! ```
//!
//! Two timers drive the machine. The *retry* timer is one-shot and re-runs the probe
//! while a connection is being established. The *poll* timer repeats every poll period
//! once the session is ready and refreshes the account list. Starting either timer
//! cancels whichever one was active, so at most one of them exists at any time.
//!
//! Connection problems are never returned as errors. They are reported through
//! [`SessionObserver::on_error`] and retried on the session's own schedule.

use alloy_primitives::Address;
use coinlink_types::NetworkType;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, sleep};

use crate::chain::{
    ChainReader, Eip1193Wallet, InjectedWallet, RemoteChain, RemoteChainError, WalletDetector,
};
use crate::config::{BridgeConfig, Timing};
use crate::contract::{TokenContract, TokenSaleContract};
use crate::error::{BridgeError, ErrorReason};
use crate::observer::SessionObserver;
use crate::resolver::TransferResolver;

/// Which connection backs signing and account discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    Unset,
    /// The user's wallet.
    Injected,
    /// The configured read-only node.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Probing(ProviderMode),
    Ready,
    Locked,
}

/// How eagerly [`WalletSession::connect`] keeps trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Initial probe on startup: without an injected wallet, settle for remote mode and
    /// stop.
    Passive,
    /// User-initiated: keep retrying until a wallet shows up.
    Active,
}

enum Probe {
    Ready,
    Retry(Duration),
    Idle,
}

struct Timer {
    id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Timers {
    poll: Option<Timer>,
    retry: Option<Timer>,
    issued: u64,
}

impl Timers {
    fn next_id(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn cancel(&mut self) {
        for timer in [self.poll.take(), self.retry.take()].into_iter().flatten() {
            timer.handle.abort();
        }
    }
}

struct SessionState {
    mode: ProviderMode,
    connection: ConnectionState,
    initialized: bool,
    address: Option<Address>,
    wallet: Option<Arc<dyn InjectedWallet>>,
    timers: Timers,
    /// Id of the latest connection attempt. Older attempts stop at their next step.
    attempt: u64,
}

struct SessionInner {
    network: NetworkType,
    confirmations: u64,
    timing: Timing,
    reader: Arc<dyn ChainReader>,
    token: TokenContract,
    token_sale: TokenSaleContract,
    detector: Arc<dyn WalletDetector>,
    observer: Arc<dyn SessionObserver>,
    state: Mutex<SessionState>,
}

/// Wallet connection owned by the host application.
///
/// Cloning is cheap and yields a handle to the same session. Timers are cancelled when
/// the last handle is dropped.
#[derive(Clone)]
pub struct WalletSession {
    inner: Arc<SessionInner>,
}

impl WalletSession {
    pub fn new(
        config: &BridgeConfig,
        reader: Arc<dyn ChainReader>,
        detector: Arc<dyn WalletDetector>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let inner = SessionInner {
            network: config.network(),
            confirmations: config.confirmations(),
            timing: config.timing(),
            token: TokenContract::new(config.token_address(), reader.clone()),
            token_sale: TokenSaleContract::new(config.token_sale_address(), reader.clone()),
            reader,
            detector,
            observer,
            state: Mutex::new(SessionState {
                mode: ProviderMode::Unset,
                connection: ConnectionState::Uninitialized,
                initialized: false,
                address: None,
                wallet: None,
                timers: Timers::default(),
                attempt: 0,
            }),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Builds a session reading through the configured RPC endpoints and, if a wallet
    /// endpoint is configured, signing through it.
    pub fn from_config(
        config: &BridgeConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, RemoteChainError> {
        let reader = Arc::new(RemoteChain::new(config.rpc())?);
        let wallet: Option<Arc<dyn InjectedWallet>> = match config.wallet() {
            Some(wallet) => Some(Arc::new(Eip1193Wallet::new(
                wallet.endpoint.inner().clone(),
                wallet.kind,
            )?)),
            None => None,
        };
        Ok(Self::new(config, reader, Arc::new(wallet), observer))
    }

    /// Cancels pending timers and probes for a wallet.
    ///
    /// Returns once the probe has settled: either the session is ready and the first
    /// account lookup has completed, or a retry has been scheduled, or (passive mode
    /// without a wallet) the session stays in remote mode.
    pub async fn connect(&self, mode: ConnectMode) {
        let attempt = self.inner.begin_probe();
        self.inner.attempt(mode, attempt).await;
    }

    /// Re-runs the connection probe as a user-initiated attempt.
    pub async fn reset(&self) {
        self.connect(ConnectMode::Active).await;
    }

    /// Marks the session as not initialized. Timers keep running.
    pub fn disable(&self) {
        self.inner.disable();
    }

    /// Fetches the wallet's accounts and reconciles the session's current address.
    pub async fn refresh_accounts(&self) -> Result<(), BridgeError> {
        self.inner.refresh_accounts().await
    }

    pub fn mode(&self) -> ProviderMode {
        self.inner.state().mode
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state().connection
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state().initialized
    }

    pub fn wallet_address(&self) -> Option<Address> {
        self.inner.state().address
    }

    pub fn has_poll_timer(&self) -> bool {
        self.inner.state().timers.poll.is_some()
    }

    pub fn has_retry_timer(&self) -> bool {
        self.inner.state().timers.retry.is_some()
    }

    pub fn network(&self) -> NetworkType {
        self.inner.network
    }

    pub fn reader(&self) -> &Arc<dyn ChainReader> {
        &self.inner.reader
    }

    pub fn token(&self) -> &TokenContract {
        &self.inner.token
    }

    pub fn token_sale(&self) -> &TokenSaleContract {
        &self.inner.token_sale
    }

    /// Transaction resolver reading through this session's remote connection.
    pub fn resolver(&self) -> TransferResolver {
        TransferResolver::new(
            self.inner.reader.clone(),
            self.inner.token.address(),
            self.inner.confirmations,
            self.inner.timing.confirmation_poll(),
        )
    }

    pub(crate) fn observer(&self) -> &Arc<dyn SessionObserver> {
        &self.inner.observer
    }

    /// Wallet and account for user actions. Fails with `NotReady` unless the session is
    /// initialized and exposes an account.
    pub(crate) fn active_signer(&self) -> Result<(Arc<dyn InjectedWallet>, Address), BridgeError> {
        let state = self.inner.state();
        if !state.initialized {
            return Err(BridgeError::NotReady);
        }
        let wallet = state.wallet.clone().ok_or(BridgeError::NotReady)?;
        let address = state.address.ok_or(BridgeError::NotReady)?;
        Ok((wallet, address))
    }

    /// Like [`Self::active_signer`], but first rejects signers that cannot produce a
    /// delegated-transfer signature.
    pub(crate) fn delegated_signer(
        &self,
    ) -> Result<(Arc<dyn InjectedWallet>, Address), BridgeError> {
        {
            let state = self.inner.state();
            match state.mode {
                ProviderMode::Remote => return Err(BridgeError::Unsupported),
                ProviderMode::Unset => return Err(BridgeError::NotReady),
                ProviderMode::Injected => {}
            }
            let supported = state
                .wallet
                .as_ref()
                .is_some_and(|wallet| wallet.supports_typed_data());
            if !supported {
                return Err(BridgeError::Unsupported);
            }
        }
        self.active_signer()
    }
}

impl SessionInner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn disable(&self) {
        self.state().initialized = false;
    }

    /// Starts a new connection attempt, superseding any attempt still in flight.
    fn begin_probe(&self) -> u64 {
        let mut state = self.state();
        state.initialized = false;
        state.timers.cancel();
        state.attempt += 1;
        state.attempt
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.state().attempt == attempt
    }

    /// Switches the backing connection, notifying the observer when the mode changes.
    fn switch_provider(&self, mode: ProviderMode, wallet: Option<Arc<dyn InjectedWallet>>) {
        let changed = {
            let mut state = self.state();
            let changed = state.mode != mode;
            state.mode = mode;
            state.wallet = wallet;
            state.connection = ConnectionState::Probing(mode);
            changed
        };
        if changed {
            tracing::info!(?mode, "Provider mode changed");
            self.observer.on_provider_changed(mode);
        }
    }

    async fn probe(&self, mode: ConnectMode, attempt: u64) -> Probe {
        let Some(wallet) = self.detector.detect() else {
            tracing::debug!("No injected wallet, falling back to remote node");
            self.observer.on_error(ErrorReason::NoProvider);
            self.switch_provider(ProviderMode::Remote, None);
            return match mode {
                ConnectMode::Passive => Probe::Idle,
                ConnectMode::Active => Probe::Retry(self.timing.retry_delay()),
            };
        };
        self.switch_provider(ProviderMode::Injected, Some(wallet.clone()));
        let network = wallet.network_type().await;
        if !self.is_current(attempt) {
            tracing::debug!(attempt, "Connection attempt superseded");
            return Probe::Idle;
        }
        match network {
            Ok(network) if network == self.network => {
                let mut state = self.state();
                if state.attempt != attempt {
                    return Probe::Idle;
                }
                state.initialized = true;
                state.connection = ConnectionState::Ready;
                tracing::info!(%network, "Injected wallet connected");
                Probe::Ready
            }
            Ok(network) => {
                tracing::warn!(%network, expected = %self.network, "Injected wallet is on another network");
                self.observer.on_error(ErrorReason::NetworkMismatch);
                Probe::Retry(self.timing.retry_delay())
            }
            Err(error) => {
                tracing::error!(%error, "Wallet probe failed");
                self.observer.on_error(ErrorReason::NoProvider);
                self.state().timers.cancel();
                Probe::Retry(self.timing.crash_retry_delay())
            }
        }
    }

    async fn attempt(self: &Arc<Self>, mode: ConnectMode, attempt: u64) {
        match self.probe(mode, attempt).await {
            Probe::Ready => self.start_polling(attempt).await,
            Probe::Retry(delay) => self.schedule_retry(mode, delay, attempt),
            Probe::Idle => {}
        }
    }

    fn schedule_retry(self: &Arc<Self>, mode: ConnectMode, delay: Duration, attempt: u64) {
        let session = Arc::downgrade(self);
        let mut state = self.state();
        if state.attempt != attempt {
            return;
        }
        state.timers.cancel();
        let id = state.timers.next_id();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let Some(inner) = session.upgrade() else {
                return;
            };
            if inner.fire_retry(id) {
                let attempt = inner.begin_probe();
                inner.attempt(mode, attempt).await;
            }
        });
        state.timers.retry = Some(Timer { id, handle });
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Scheduled connection retry");
    }

    /// Clears the retry slot if it still holds timer `id`. Returns whether it did.
    fn fire_retry(&self, id: u64) -> bool {
        let mut state = self.state();
        match &state.timers.retry {
            Some(timer) if timer.id == id => {
                state.timers.retry = None;
                true
            }
            _ => false,
        }
    }

    /// Arms the poll timer for `attempt`, then runs the first account lookup.
    async fn start_polling(self: &Arc<Self>, attempt: u64) {
        {
            let mut state = self.state();
            if state.attempt != attempt || !state.initialized {
                tracing::debug!(attempt, "Connection attempt superseded, not polling");
                return;
            }
            let session = Arc::downgrade(self);
            let period = self.timing.poll_interval();
            state.timers.cancel();
            let id = state.timers.next_id();
            let handle = tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                loop {
                    ticker.tick().await;
                    let Some(inner) = session.upgrade() else {
                        break;
                    };
                    if let Err(error) = inner.refresh_accounts().await {
                        tracing::debug!(%error, "Account lookup skipped");
                    }
                }
            });
            state.timers.poll = Some(Timer { id, handle });
        }
        if let Err(error) = self.refresh_accounts().await {
            tracing::debug!(%error, "Initial account lookup failed");
        }
    }

    async fn refresh_accounts(&self) -> Result<(), BridgeError> {
        let (wallet, mode, attempt) = {
            let state = self.state();
            if !state.initialized {
                return Err(BridgeError::NotReady);
            }
            let wallet = state.wallet.clone().ok_or(BridgeError::NotReady)?;
            (wallet, state.mode, state.attempt)
        };
        let accounts = wallet.accounts().await?;

        if let Some(&account) = accounts.first() {
            let changed = {
                let mut state = self.state();
                // A reconnect started while the wallet answered.
                if state.attempt != attempt || !state.initialized {
                    return Err(BridgeError::NotReady);
                }
                state.connection = ConnectionState::Ready;
                let changed = state.address != Some(account);
                state.address = Some(account);
                changed
            };
            if changed {
                tracing::info!(address = %account, "Wallet account changed");
                self.observer.on_wallet_changed(Some(account));
                self.observer.on_error_cleared();
            }
            return Ok(());
        }

        let locked_now = {
            let mut state = self.state();
            let was_ready = state.attempt == attempt
                && state.initialized
                && state.connection == ConnectionState::Ready;
            if was_ready {
                state.address = None;
                state.connection = ConnectionState::Locked;
            }
            was_ready
        };
        if !locked_now {
            return Ok(());
        }
        tracing::warn!("Wallet exposes no account");
        self.observer.on_wallet_changed(None);
        self.observer.on_error(ErrorReason::Locked);
        if mode == ProviderMode::Injected && wallet.can_request_accounts() {
            if let Err(error) = wallet.request_accounts().await {
                tracing::warn!(%error, "Account access not granted, disabling session");
                self.disable();
            }
        }
        Ok(())
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .timers
            .cancel();
    }
}
