//! Record types returned by chain readers and written to the store.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub hash: String,
    pub proposer_address: String,
    /// Unix timestamp of block production, used for derived timing fields.
    pub time_unix: i64,
    pub tx_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub height: u64,
    pub from_address: String,
    pub to_address: String,
    pub amount: u64,
    pub fee: u64,
}

/// Node observed as staked at a given height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub address: String,
    pub public_key: String,
    pub staked_tokens: u64,
}

/// Application observed as staked at a given height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRef {
    pub address: String,
    pub public_key: String,
    pub staked_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub height: u64,
    pub balance: u64,
    pub denomination: String,
}
