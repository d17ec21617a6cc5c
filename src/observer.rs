//! Host UI notifications.
//!
//! The session reports connection problems, wallet changes, and signing progress through
//! a [`SessionObserver`]. Every method has an empty default, so an observer implements
//! only what it renders. Calls are made synchronously from the session's own control
//! flow and must not block.

use alloy_primitives::{Address, U256};
use serde::Serialize;

use crate::error::ErrorReason;
use crate::session::ProviderMode;

/// What the user is about to sign, for display while the wallet prompt is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignIntent {
    pub action: &'static str,
    pub to: coinlink_types::ChecksummedAddress,
    #[serde(with = "coinlink_types::amount::decimal_u256")]
    pub value: U256,
}

impl SignIntent {
    pub fn send_token(to: Address, value: U256) -> Self {
        Self {
            action: "sendToken",
            to: to.into(),
            value,
        }
    }
}

pub trait SessionObserver: Send + Sync {
    fn on_error(&self, _reason: ErrorReason) {}

    fn on_error_cleared(&self) {}

    /// `None` when the wallet no longer exposes an account.
    fn on_wallet_changed(&self, _address: Option<Address>) {}

    fn on_provider_changed(&self, _mode: ProviderMode) {}

    fn on_sign_start(&self, _intent: Option<&SignIntent>) {}

    fn on_sign_end(&self) {}

    fn on_login_start(&self) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Observer that forwards every notification to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_error(&self, reason: ErrorReason) {
        tracing::warn!(%reason, "Wallet connection problem");
    }

    fn on_error_cleared(&self) {
        tracing::info!("Wallet connection restored");
    }

    fn on_wallet_changed(&self, address: Option<Address>) {
        match address {
            Some(address) => tracing::info!(%address, "Wallet changed"),
            None => tracing::info!("Wallet account unavailable"),
        }
    }

    fn on_provider_changed(&self, mode: ProviderMode) {
        tracing::info!(?mode, "Provider changed");
    }

    fn on_sign_start(&self, intent: Option<&SignIntent>) {
        tracing::debug!(?intent, "Waiting for signature");
    }

    fn on_sign_end(&self) {
        tracing::debug!("Signature request finished");
    }

    fn on_login_start(&self) {
        tracing::debug!("Waiting for login signature");
    }
}
