//! Configuration primitives.
//!
//! Values in a configuration file may be written literally or as a reference to an
//! environment variable, which keeps API keys embedded in RPC URLs out of the file:
//!
//! ```json
//! {
//!   "rpc": [
//!     { "http": "$INFURA_URL" },
//!     { "http": "${FALLBACK_RPC_URL}", "rate_limit": 10 }
//!   ]
//! }
//! ```
//!
//! Only whole-value references (`$VAR` or `${VAR}`) are resolved; a `$` inside a longer
//! literal is left untouched.

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::str::FromStr;
use url::Url;

/// A single remote RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcConfig {
    /// HTTP(S) URL of the node.
    pub http: LiteralOrEnv<Url>,
    /// Requests per second allowed against this endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

impl RpcConfig {
    pub fn new(http: Url) -> Self {
        Self {
            http: LiteralOrEnv::from_literal(http),
            rate_limit: None,
        }
    }
}

/// A value read either literally or from the environment variable it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Returns the variable name when `s` is exactly `$VAR` or `${VAR}`.
fn env_reference(s: &str) -> Option<&str> {
    if let Some(braced) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        return Some(braced);
    }
    let name = s.strip_prefix('$')?;
    let is_name = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    is_name.then_some(name)
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let value = match env_reference(&raw) {
            Some(name) => std::env::var(name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{name}' not found (referenced as '{raw}')"
                ))
            })?,
            None => raw,
        };
        value
            .parse::<T>()
            .map(LiteralOrEnv)
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {e}")))
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_env_references() {
        assert_eq!(env_reference("$RPC_URL"), Some("RPC_URL"));
        assert_eq!(env_reference("${RPC_URL}"), Some("RPC_URL"));
        assert_eq!(env_reference("https://node/$KEY"), None);
        assert_eq!(env_reference("$"), None);
        assert_eq!(env_reference("$not-a-name"), None);
    }

    #[test]
    fn literal_url_parses() {
        let config: RpcConfig =
            serde_json::from_str(r#"{"http": "https://rinkeby.example.org/rpc"}"#).unwrap();
        assert_eq!(config.http.as_str(), "https://rinkeby.example.org/rpc");
        assert_eq!(config.rate_limit, None);
    }

    #[test]
    fn missing_env_variable_is_an_error() {
        let result: Result<RpcConfig, _> =
            serde_json::from_str(r#"{"http": "$COINLINK_TEST_SURELY_UNSET_VARIABLE"}"#);
        assert!(result.is_err());
    }
}
