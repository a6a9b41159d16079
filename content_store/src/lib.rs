use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

mod pinata;
pub use pinata::PinataClient;

/// Connection settings for a Pinata-compatible pinning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinningConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_api_key: String,
    /// CID version requested from the pinning service.
    #[serde(default)]
    pub cid_version: u8,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.pinata.cloud".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for PinningConfig {
    fn default() -> Self {
        PinningConfig {
            api_url: default_api_url(),
            api_key: String::new(),
            secret_api_key: String::new(),
            cid_version: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PinResult {
    /// Content identifier under which the artifact is retrievable.
    pub ipfs_hash: String,
    pub pin_size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("pinning service unavailable: {0}")]
    Unavailable(String),
    #[error("pinning service rejected the payload ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Content-addressable store. Pinning is a single attempt; the caller
/// decides what to do with a failure.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn pin(&self, bytes: Bytes, display_name: &str) -> Result<PinResult, StoreError>;
}
