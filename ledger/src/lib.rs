use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod abi;
mod rpc;
pub use rpc::EthLedger;

/// Connection settings for an Ethereum-compatible JSON-RPC endpoint and
/// the deployed hash-registration contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Address of the deployed storeHash/getHash contract.
    pub contract_address: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Upper bound on the wait for transaction inclusion.
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_rpc_url() -> String {
    "http://localhost:7545".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_confirm_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            rpc_url: default_rpc_url(),
            contract_address: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Hex address of a ledger account able to sign transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountAddress(String);

impl AccountAddress {
    pub fn new(address: impl Into<String>) -> Self {
        AccountAddress(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof that a registration transaction was included on the ledger.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub transaction_hash: String,
    pub block_number: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger has no available signing accounts")]
    NoAccountsAvailable,
    #[error("ledger rejected the transaction: {0}")]
    Rejected(String),
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Registration surface of the hash contract. `register_hash` blocks until
/// the transaction is confirmed included, not merely broadcast.
#[async_trait]
pub trait HashLedger: Send + Sync {
    async fn current_signing_account(&self) -> Result<AccountAddress, LedgerError>;

    async fn register_hash(
        &self,
        account: &AccountAddress,
        ipfs_hash: &str,
    ) -> Result<Confirmation, LedgerError>;

    async fn get_hash(&self, account: &AccountAddress) -> Result<String, LedgerError>;
}
