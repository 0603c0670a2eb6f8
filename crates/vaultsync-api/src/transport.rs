//! `ISyncTransport` over the HTTP contract
//!
//! Endpoint map:
//! - `POST /sync/diff`, `POST /sync/commit`: the two-phase protocol
//! - `POST /vectorize/file`, `DELETE /vectorize/file/:id`,
//!   `GET /vectorize/status/:id`: async vectorization side channel
//! - `GET /usage`: quota snapshot
//! - `GET /user/me`: the authenticated account

use serde::{Deserialize, Serialize};
use tracing::debug;

use vaultsync_core::error::SyncError;
use vaultsync_core::ports::sync_transport::{
    CommitRequest, CommitResponse, DiffRequest, DiffResponse, ISyncTransport, UsageSnapshot,
    UserInfoDto, VectorizeState,
};

use crate::client::ApiClient;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VectorizeRequest<'a> {
    file_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VectorizeStatusResponse {
    status: VectorizeState,
}

/// HTTP implementation of the sync transport port
pub struct HttpSyncTransport {
    client: ApiClient,
}

impl HttpSyncTransport {
    /// Wraps an authenticated API client
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ISyncTransport for HttpSyncTransport {
    async fn diff(&self, request: &DiffRequest) -> Result<DiffResponse, SyncError> {
        debug!(
            vault_id = %request.vault_id,
            files = request.local_files.len(),
            "Requesting diff"
        );
        self.client.post_json("/sync/diff", request).await
    }

    async fn commit(&self, request: &CommitRequest) -> Result<CommitResponse, SyncError> {
        debug!(
            vault_id = %request.vault_id,
            completed = request.completed.len(),
            deleted = request.deleted.len(),
            "Committing round"
        );
        self.client.post_json("/sync/commit", request).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        self.client.get_transfer(url).await
    }

    async fn upload(&self, url: &str, data: &[u8]) -> Result<(), SyncError> {
        self.client.put_transfer(url, data).await
    }

    async fn vectorize_file(&self, file_id: &str) -> Result<(), SyncError> {
        let _: serde_json::Value = self
            .client
            .post_json("/vectorize/file", &VectorizeRequest { file_id })
            .await?;
        Ok(())
    }

    async fn remove_vectorized(&self, file_id: &str) -> Result<(), SyncError> {
        self.client
            .delete(&format!("/vectorize/file/{file_id}"))
            .await
    }

    async fn vectorize_status(&self, file_id: &str) -> Result<VectorizeState, SyncError> {
        let response: VectorizeStatusResponse = self
            .client
            .get_json(&format!("/vectorize/status/{file_id}"))
            .await?;
        Ok(response.status)
    }

    async fn get_usage(&self) -> Result<UsageSnapshot, SyncError> {
        self.client.get_json("/usage").await
    }

    async fn current_user(&self) -> Result<UserInfoDto, SyncError> {
        self.client.get_json("/user/me").await
    }
}
