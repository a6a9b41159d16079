use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::{abi, AccountAddress, Confirmation, HashLedger, LedgerConfig, LedgerError};

/// JSON-RPC client for an Ethereum-compatible node. One configured
/// instance is shared across all uploads.
pub struct EthLedger {
    client: reqwest::Client,
    config: LedgerConfig,
}

impl EthLedger {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let payload = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 1});
        let response = self
            .client
            .post(&self.config.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("malformed rpc response: {e}")))?;
        if let Some(error) = body.get("error") {
            return Err(LedgerError::Rejected(error.to_string()));
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Polls for the transaction receipt until it appears or the
    /// confirmation deadline passes. Unbounded waits would let a stalled
    /// node hang the request path.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<Confirmation, LedgerError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.confirm_timeout_secs);
        loop {
            let receipt = self
                .rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if !receipt.is_null() {
                let status = receipt
                    .get("status")
                    .and_then(|v| v.as_str())
                    .unwrap_or("0x1");
                if status == "0x0" {
                    return Err(LedgerError::Rejected(format!(
                        "transaction {tx_hash} reverted"
                    )));
                }
                let block_number = receipt
                    .get("blockNumber")
                    .and_then(|v| v.as_str())
                    .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
                    .unwrap_or_default();
                return Ok(Confirmation {
                    transaction_hash: tx_hash.to_string(),
                    block_number,
                });
            }
            if Instant::now() >= deadline {
                return Err(LedgerError::Unavailable(format!(
                    "transaction {tx_hash} not confirmed within {}s",
                    self.config.confirm_timeout_secs
                )));
            }
            tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
        }
    }
}

#[async_trait]
impl HashLedger for EthLedger {
    async fn current_signing_account(&self) -> Result<AccountAddress, LedgerError> {
        let accounts = self.rpc_call("eth_accounts", json!([])).await?;
        accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(|v| v.as_str())
            .map(AccountAddress::new)
            .ok_or(LedgerError::NoAccountsAvailable)
    }

    async fn register_hash(
        &self,
        account: &AccountAddress,
        ipfs_hash: &str,
    ) -> Result<Confirmation, LedgerError> {
        let data = format!("0x{}", hex::encode(abi::encode_store_hash(ipfs_hash)));
        let tx = json!([{
            "from": account.as_str(),
            "to": self.config.contract_address,
            "data": data,
        }]);
        let tx_hash = self
            .rpc_call("eth_sendTransaction", tx)
            .await?
            .as_str()
            .ok_or_else(|| {
                LedgerError::Unavailable("eth_sendTransaction returned no hash".to_string())
            })?
            .to_string();
        let confirmation = self.wait_for_receipt(&tx_hash).await?;
        info!(
            account = %account,
            ipfs_hash,
            tx = %confirmation.transaction_hash,
            block = confirmation.block_number,
            "hash registered on ledger"
        );
        Ok(confirmation)
    }

    async fn get_hash(&self, account: &AccountAddress) -> Result<String, LedgerError> {
        let data = format!("0x{}", hex::encode(abi::encode_get_hash(account.as_str())?));
        let call = json!([{ "to": self.config.contract_address, "data": data }, "latest"]);
        let output = self.rpc_call("eth_call", call).await?;
        let output = output.as_str().ok_or_else(|| {
            LedgerError::Unavailable("eth_call returned no output".to_string())
        })?;
        abi::decode_string_return(output)
    }
}
