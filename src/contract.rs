//! Contract interfaces and thin view-call wrappers.
//!
//! The token contract is the transfer target resolved by [`crate::resolver`] and the
//! verifier of delegated transfers prepared by [`crate::delegated`]. The token sale
//! contract only serves account queries (KYC state and purchase history).

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, SolEvent, sol};
use serde::Serialize;
use std::sync::Arc;

use crate::chain::{ChainError, ChainReader, LogQuery};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IToken {
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);
        event Lock(address indexed _addr, uint256 _value);

        function transfer(address _to, uint256 _value) external returns (bool success);
        function transferDelegated(
            address _from,
            address _to,
            uint256 _value,
            uint256 _maxReward,
            uint256 _claimedReward,
            uint256 _nonce,
            bytes _signature
        ) external returns (bool success);
        function transferAndLock(address _to, uint256 _value) external returns (bool success);
        function balanceOf(address _owner) external view returns (uint256 balance);
        function usedNonce(address _from, uint256 _nonce) external view returns (bool used);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface ITokenSale {
        event Purchase(address indexed _addr, uint256 _coins, uint256 _ethers);

        function kycDone(address _addr) external view returns (bool done);
    }
}

/// View access to the token contract.
#[derive(Clone)]
pub struct TokenContract {
    address: Address,
    reader: Arc<dyn ChainReader>,
}

impl TokenContract {
    pub fn new(address: Address, reader: Arc<dyn ChainReader>) -> Self {
        Self { address, reader }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256, ChainError> {
        let input = IToken::balanceOfCall { _owner: owner }.abi_encode();
        let output = self.reader.call(self.address, input.into()).await?;
        Ok(IToken::balanceOfCall::abi_decode_returns(&output)?)
    }

    /// Whether `nonce` was already consumed by a delegated transfer from `from`.
    pub async fn used_nonce(&self, from: Address, nonce: B256) -> Result<bool, ChainError> {
        let input = IToken::usedNonceCall {
            _from: from,
            _nonce: U256::from_be_slice(nonce.as_slice()),
        }
        .abi_encode();
        let output = self.reader.call(self.address, input.into()).await?;
        Ok(IToken::usedNonceCall::abi_decode_returns(&output)?)
    }
}

/// A `Purchase` event from the token sale contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseEvent {
    pub buyer: coinlink_types::ChecksummedAddress,
    #[serde(with = "coinlink_types::amount::decimal_u256")]
    pub coins: U256,
    #[serde(with = "coinlink_types::amount::decimal_u256")]
    pub ethers: U256,
}

/// Sum of all purchases made by one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PurchaseTotal {
    #[serde(with = "coinlink_types::amount::decimal_u256")]
    pub coins: U256,
    #[serde(with = "coinlink_types::amount::decimal_u256")]
    pub ethers: U256,
}

impl FromIterator<PurchaseEvent> for PurchaseTotal {
    fn from_iter<I: IntoIterator<Item = PurchaseEvent>>(iter: I) -> Self {
        iter.into_iter()
            .fold(PurchaseTotal::default(), |acc, event| PurchaseTotal {
                coins: acc.coins.saturating_add(event.coins),
                ethers: acc.ethers.saturating_add(event.ethers),
            })
    }
}

/// View access to the token sale contract.
#[derive(Clone)]
pub struct TokenSaleContract {
    address: Address,
    reader: Arc<dyn ChainReader>,
}

impl TokenSaleContract {
    pub fn new(address: Address, reader: Arc<dyn ChainReader>) -> Self {
        Self { address, reader }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn kyc_done(&self, address: Address) -> Result<bool, ChainError> {
        let input = ITokenSale::kycDoneCall { _addr: address }.abi_encode();
        let output = self.reader.call(self.address, input.into()).await?;
        Ok(ITokenSale::kycDoneCall::abi_decode_returns(&output)?)
    }

    /// All purchases made by `buyer` since genesis.
    pub async fn purchase_events(&self, buyer: Address) -> Result<Vec<PurchaseEvent>, ChainError> {
        let query = LogQuery {
            address: self.address,
            event: ITokenSale::Purchase::SIGNATURE_HASH,
            indexed: Some(buyer.into_word()),
            from_block: 0,
        };
        let logs = self.reader.logs(&query).await?;
        logs.iter()
            .map(|log| -> Result<PurchaseEvent, ChainError> {
                let event =
                    ITokenSale::Purchase::decode_raw_log(log.topics.iter().copied(), &log.data)?;
                Ok(PurchaseEvent {
                    buyer: event._addr.into(),
                    coins: event._coins,
                    ethers: event._ethers,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChain;
    use alloy_primitives::{address, b256};

    const TOKEN: Address = address!("0x02f61fd266da6e8b102d4121f5ce7b992640cf98");
    const SALE: Address = address!("0x5e4b6ec4b3e1b4b4e0a0d5b7a2a4b2f4b0c2f2a1");
    const BUYER: Address = address!("0x00000000000000000000000000000000000000b0");

    #[tokio::test]
    async fn used_nonce_round_trips_through_view_call() {
        let chain = Arc::new(MockChain::default());
        let nonce = b256!("0x00000000000000000000000000000000000000000000000000000000000000aa");
        chain.mark_nonce_used(BUYER, nonce);
        let token = TokenContract::new(TOKEN, chain.clone());
        assert!(token.used_nonce(BUYER, nonce).await.unwrap());
        assert!(!token.used_nonce(BUYER, B256::ZERO).await.unwrap());
    }

    #[tokio::test]
    async fn purchase_total_sums_events() {
        let chain = Arc::new(MockChain::default());
        chain.push_purchase(SALE, BUYER, U256::from(100u64), U256::from(1u64));
        chain.push_purchase(SALE, BUYER, U256::from(250u64), U256::from(3u64));
        let sale = TokenSaleContract::new(SALE, chain.clone());
        let events = sale.purchase_events(BUYER).await.unwrap();
        assert_eq!(events.len(), 2);
        let total: PurchaseTotal = events.into_iter().collect();
        assert_eq!(total.coins, U256::from(350u64));
        assert_eq!(total.ethers, U256::from(4u64));
    }
}
