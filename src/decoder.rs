//! Decoding of token contract calldata and event logs.
//!
//! Both functions are pure: they never touch the network, and anything that does not
//! match the token interface decodes to "unrecognized" instead of an error.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolEvent, SolInterface};

use crate::chain::LogRecord;
use crate::contract::IToken;

/// A transaction's calldata as a token contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCall {
    Transfer {
        to: Address,
        value: U256,
    },
    /// Relayed transfer. The relayer's reward is taken out of `value` on chain.
    TransferDelegated {
        from: Address,
        to: Address,
        value: U256,
    },
    TransferAndLock {
        to: Address,
        value: U256,
    },
    Unrecognized,
}

pub fn decode_call(input: &[u8]) -> TokenCall {
    match IToken::ITokenCalls::abi_decode(input) {
        Ok(IToken::ITokenCalls::transfer(call)) => TokenCall::Transfer {
            to: call._to,
            value: call._value,
        },
        Ok(IToken::ITokenCalls::transferDelegated(call)) => TokenCall::TransferDelegated {
            from: call._from,
            to: call._to,
            value: call._value,
        },
        Ok(IToken::ITokenCalls::transferAndLock(call)) => TokenCall::TransferAndLock {
            to: call._to,
            value: call._value,
        },
        Ok(_) | Err(_) => TokenCall::Unrecognized,
    }
}

/// A token `Transfer` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

/// Decodes every `Transfer` log, in emission order. Other logs are skipped.
pub fn decode_transfers(logs: &[LogRecord]) -> Vec<TransferEvent> {
    logs.iter().filter_map(decode_transfer).collect()
}

fn decode_transfer(log: &LogRecord) -> Option<TransferEvent> {
    if log.topics.first() != Some(&IToken::Transfer::SIGNATURE_HASH) {
        return None;
    }
    let event = IToken::Transfer::decode_raw_log(log.topics.iter().copied(), &log.data).ok()?;
    Some(TransferEvent {
        from: event.from,
        to: event.to,
        value: event.value,
    })
}
