//! Live view of a Vite NFT collection and its marketplace.
//!
//! Contract state and VM event logs are pulled over a node's JSON-RPC WebSocket and kept fresh
//! by subscriptions; wallet backends turn call descriptors into signed account blocks.

pub mod abi;
pub mod config;
pub mod marketplace;
pub mod metadata;
pub mod provider;
pub mod sync;
pub mod utils;
pub mod wallet;

#[cfg(test)]
mod test_support;
