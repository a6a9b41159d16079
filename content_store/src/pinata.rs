use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{ContentStore, PinResult, PinningConfig, StoreError};

/// Client for the Pinata pin-file API. One configured instance is shared
/// across all uploads.
pub struct PinataClient {
    client: reqwest::Client,
    config: PinningConfig,
}

impl PinataClient {
    pub fn new(config: PinningConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn pin_url(&self) -> String {
        format!(
            "{}/pinning/pinFileToIPFS",
            self.config.api_url.trim_end_matches('/')
        )
    }
}

#[derive(Deserialize)]
struct PinFileResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
    #[serde(rename = "PinSize", default)]
    pin_size: u64,
}

#[async_trait]
impl ContentStore for PinataClient {
    async fn pin(&self, bytes: Bytes, display_name: &str) -> Result<PinResult, StoreError> {
        let metadata = serde_json::json!({ "name": display_name });
        let options = serde_json::json!({ "cidVersion": self.config.cid_version });
        let file_part = multipart::Part::bytes(bytes.to_vec()).file_name(display_name.to_string());
        let form = multipart::Form::new()
            .part("file", file_part)
            .text("pinataMetadata", metadata.to_string())
            .text("pinataOptions", options.to_string());

        let response = self
            .client
            .post(self.pin_url())
            .header("pinata_api_key", &self.config.api_key)
            .header("pinata_secret_api_key", &self.config.secret_api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: PinFileResponse = response
                .json()
                .await
                .map_err(|e| StoreError::Unavailable(format!("invalid pin response: {}", e)))?;
            debug!(ipfs_hash = %body.ipfs_hash, "pinned {}", display_name);
            return Ok(PinResult {
                ipfs_hash: body.ipfs_hash,
                pin_size: body.pin_size,
            });
        }

        let message = response.text().await.unwrap_or_default();
        // Auth failures and service-side errors mean the store could not be
        // used, not that the payload was refused.
        if status == StatusCode::UNAUTHORIZED ||
            status == StatusCode::FORBIDDEN ||
            status.is_server_error()
        {
            return Err(StoreError::Unavailable(format!("{}: {}", status, message)));
        }
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
