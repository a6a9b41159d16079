use std::sync::Arc;

use bytes::Bytes;
use content_store::{ContentStore, StoreError};
use ledger::{AccountAddress, HashLedger, LedgerError};
use tracing::info;

/// One inbound artifact. Owned by the pipeline for the duration of a
/// single invocation.
pub struct UploadRequest {
    pub bytes: Bytes,
    pub display_name: String,
    /// Explicit registration identity. Absent in single-tenant
    /// deployments, where the first available ledger account is used.
    pub account: Option<AccountAddress>,
}

#[derive(Debug, Clone)]
pub struct PinnedRegistration {
    pub ipfs_hash: String,
    pub account: AccountAddress,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no file provided")]
    NoFileProvided,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("ledger has no available signing accounts")]
    NoAccountAvailable,
    #[error("hash registration failed: {0}")]
    Registration(LedgerError),
}

/// Sequences pin -> resolve account -> register for one upload. Stages
/// run strictly in order; each stage's side effect is final, so a pinned
/// artifact stays pinned even when registration fails.
pub struct UploadPipeline {
    content_store: Arc<dyn ContentStore>,
    ledger: Arc<dyn HashLedger>,
}

impl UploadPipeline {
    pub fn new(content_store: Arc<dyn ContentStore>, ledger: Arc<dyn HashLedger>) -> Self {
        Self {
            content_store,
            ledger,
        }
    }

    pub async fn process(
        &self,
        request: UploadRequest,
    ) -> Result<PinnedRegistration, PipelineError> {
        if request.bytes.is_empty() {
            return Err(PipelineError::NoFileProvided);
        }

        let pin = self
            .content_store
            .pin(request.bytes, &request.display_name)
            .await?;

        let account = match request.account {
            Some(account) => account,
            None => self
                .ledger
                .current_signing_account()
                .await
                .map_err(|e| match e {
                    LedgerError::NoAccountsAvailable => PipelineError::NoAccountAvailable,
                    other => PipelineError::Registration(other),
                })?,
        };

        // Concurrent uploads registering under the same account race to
        // overwrite the on-ledger mapping; the ledger keeps whichever
        // transaction it confirms last.
        self.ledger
            .register_hash(&account, &pin.ipfs_hash)
            .await
            .map_err(PipelineError::Registration)?;

        info!(
            ipfs_hash = %pin.ipfs_hash,
            account = %account,
            "uploaded {} ({} bytes pinned)",
            request.display_name,
            pin.pin_size,
        );
        Ok(PinnedRegistration {
            ipfs_hash: pin.ipfs_hash,
            account,
        })
    }
}
