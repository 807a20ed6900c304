//! Core data structures for incoming transaction tracking

pub mod address;
pub mod incoming_transaction;
pub mod network;

pub use address::{addresses_match, convert, to_canonical, to_network, AddressPrefix};
pub use incoming_transaction::{
    IncomingTransaction, IncomingTransactionsMap, IncomingTxState, LastFetchedBlocks,
    TransactionCategory, TransactionStatus, TxParams,
};
pub use network::NetworkId;
