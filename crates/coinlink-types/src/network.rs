//! Named Ethereum networks.
//!
//! Injected wallets report the network they are connected to. The bridge compares that
//! name against the configured target before it lets the wallet sign anything.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A network as identified by the wallet it is reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkType {
    Main,
    Morden,
    Ropsten,
    Rinkeby,
    Goerli,
    Kovan,
    Sepolia,
    /// Any chain without a well-known name.
    Private,
}

impl NetworkType {
    /// Maps an EIP-155 chain id to its network name.
    pub fn from_chain_id(chain_id: u64) -> Self {
        match chain_id {
            1 => NetworkType::Main,
            2 => NetworkType::Morden,
            3 => NetworkType::Ropsten,
            4 => NetworkType::Rinkeby,
            5 => NetworkType::Goerli,
            42 => NetworkType::Kovan,
            11155111 => NetworkType::Sepolia,
            _ => NetworkType::Private,
        }
    }

    /// The network a deployment targets: `rinkeby` for test deployments, `main` otherwise.
    pub fn target(testnet: bool) -> Self {
        if testnet {
            NetworkType::Rinkeby
        } else {
            NetworkType::Main
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Main => "main",
            NetworkType::Morden => "morden",
            NetworkType::Ropsten => "ropsten",
            NetworkType::Rinkeby => "rinkeby",
            NetworkType::Goerli => "goerli",
            NetworkType::Kovan => "kovan",
            NetworkType::Sepolia => "sepolia",
            NetworkType::Private => "private",
        }
    }
}

impl Display for NetworkType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown network type {0}")]
pub struct UnknownNetworkType(String);

impl FromStr for NetworkType {
    type Err = UnknownNetworkType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let network = match s {
            "main" | "mainnet" => NetworkType::Main,
            "morden" => NetworkType::Morden,
            "ropsten" => NetworkType::Ropsten,
            "rinkeby" => NetworkType::Rinkeby,
            "goerli" => NetworkType::Goerli,
            "kovan" => NetworkType::Kovan,
            "sepolia" => NetworkType::Sepolia,
            "private" => NetworkType::Private,
            other => return Err(UnknownNetworkType(other.to_string())),
        };
        Ok(network)
    }
}

impl Serialize for NetworkType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NetworkType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
