//! Account sources — which backend account a store or a message belongs to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One backend account (or the push account's upstream override store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountSource {
    /// Device map owned by an upstream integration the push account overrides.
    Upstream,
    /// Real-time push-notification account.
    Push,
    /// Request/response API account.
    Api,
}

impl AccountSource {
    /// Every source, in the default aggregation priority.
    pub const ALL: [Self; 3] = [Self::Upstream, Self::Push, Self::Api];

    /// Stable lowercase name, as used in configuration and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Push => "push",
            Self::Api => "api",
        }
    }

    /// The account whose backend connection serves this source.
    ///
    /// The upstream store has no connection of its own; it rides on the
    /// push account.
    #[must_use]
    pub fn owning_account(self) -> Self {
        match self {
            Self::Upstream | Self::Push => Self::Push,
            Self::Api => Self::Api,
        }
    }
}

impl fmt::Display for AccountSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown account source name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown account source {0:?}")]
pub struct UnknownAccountSource(pub String);

impl FromStr for AccountSource {
    type Err = UnknownAccountSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "upstream" => Ok(Self::Upstream),
            "push" => Ok(Self::Push),
            "api" => Ok(Self::Api),
            other => Err(UnknownAccountSource(other.to_string())),
        }
    }
}
