//! Supported networks and their chain ids
//!
//! Network names arrive as plain strings from the network provider. Only the
//! names listed here resolve to a [`NetworkId`]; anything else (a local node, a
//! custom RPC) is unresolved and simply has no incoming transaction support.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Network type name of the primary network
pub const MAINNET: &str = "mainnet";
pub const ROPSTEN: &str = "ropsten";
pub const RINKEBY: &str = "rinkeby";
pub const KOVAN: &str = "kovan";
pub const GOERLI: &str = "goerli";

/// Identifier of a network that incoming transactions are tracked on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    Mainnet,
    Ropsten,
    Rinkeby,
    Kovan,
    Goerli,
}

impl NetworkId {
    /// Every tracked network, in a stable order
    pub const ALL: [NetworkId; 5] = [
        NetworkId::Ropsten,
        NetworkId::Rinkeby,
        NetworkId::Kovan,
        NetworkId::Goerli,
        NetworkId::Mainnet,
    ];

    /// Network type name as reported by the network provider
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkId::Mainnet => MAINNET,
            NetworkId::Ropsten => ROPSTEN,
            NetworkId::Rinkeby => RINKEBY,
            NetworkId::Kovan => KOVAN,
            NetworkId::Goerli => GOERLI,
        }
    }

    /// Numeric chain id recorded on every transaction fetched from this network
    pub fn chain_id(&self) -> u64 {
        match self {
            NetworkId::Mainnet => 1,
            NetworkId::Ropsten => 3,
            NetworkId::Rinkeby => 4,
            NetworkId::Goerli => 5,
            NetworkId::Kovan => 42,
        }
    }

    /// Whether this is the primary network (served from the bare explorer host)
    pub fn is_mainnet(&self) -> bool {
        matches!(self, NetworkId::Mainnet)
    }

    /// Resolve a provider network name, `None` when the network is not supported
    pub fn resolve(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a network name has no entry in the chain id table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown network '{0}'")]
pub struct UnknownNetwork(pub String);

impl FromStr for NetworkId {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            MAINNET => Ok(NetworkId::Mainnet),
            ROPSTEN => Ok(NetworkId::Ropsten),
            RINKEBY => Ok(NetworkId::Rinkeby),
            KOVAN => Ok(NetworkId::Kovan),
            GOERLI => Ok(NetworkId::Goerli),
            other => Err(UnknownNetwork(other.to_string())),
        }
    }
}
