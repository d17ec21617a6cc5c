use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Seconds since the Unix epoch, as reported in a block header.
///
/// Zero stands for "unknown": the block was not fetched yet or the node did not return
/// it. Serialized as a plain JSON number.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    pub const UNKNOWN: Self = Self(0);

    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for UnixTimestamp {
    fn from(secs: u64) -> Self {
        Self(secs)
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
