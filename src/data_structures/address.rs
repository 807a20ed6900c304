//! Address prefix conversion
//!
//! XDC addresses are written either in the canonical `0x` form used inside the
//! wallet or with the network specific `xdc` prefix some external consumers
//! expect. Conversion only touches the prefix; malformed input passes through
//! unchanged.

use serde::{Deserialize, Serialize};

/// Canonical address prefix
pub const CANONICAL_PREFIX: &str = "0x";
/// Network specific address prefix
pub const NETWORK_PREFIX: &str = "xdc";

/// Target representation for [`convert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddressPrefix {
    /// `0x...`
    #[default]
    Canonical,
    /// `xdc...`
    Network,
}

impl AddressPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressPrefix::Canonical => CANONICAL_PREFIX,
            AddressPrefix::Network => NETWORK_PREFIX,
        }
    }

    fn other(&self) -> AddressPrefix {
        match self {
            AddressPrefix::Canonical => AddressPrefix::Network,
            AddressPrefix::Network => AddressPrefix::Canonical,
        }
    }

    /// Detect the prefix at the start of `address`, ignoring ASCII case
    pub fn detect(address: &str) -> Option<AddressPrefix> {
        [AddressPrefix::Canonical, AddressPrefix::Network]
            .into_iter()
            .find(|prefix| has_prefix(address, prefix.as_str()))
    }
}

fn has_prefix(address: &str, prefix: &str) -> bool {
    address
        .get(..prefix.len())
        .map(|start| start.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

/// Rewrite `address` so that it starts with `target`
///
/// Addresses already in the target form and addresses with no recognized
/// prefix are returned unchanged.
pub fn convert(address: &str, target: AddressPrefix) -> String {
    let source = target.other();
    if has_prefix(address, target.as_str()) || !has_prefix(address, source.as_str()) {
        return address.to_string();
    }
    format!("{}{}", target.as_str(), &address[source.as_str().len()..])
}

/// Shorthand for `convert(address, AddressPrefix::Canonical)`
pub fn to_canonical(address: &str) -> String {
    convert(address, AddressPrefix::Canonical)
}

/// Shorthand for `convert(address, AddressPrefix::Network)`
pub fn to_network(address: &str) -> String {
    convert(address, AddressPrefix::Network)
}

/// Case-insensitive comparison of two addresses in either representation
pub fn addresses_match(a: &str, b: &str) -> bool {
    to_canonical(a).eq_ignore_ascii_case(&to_canonical(b))
}
