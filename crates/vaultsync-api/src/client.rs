//! Authenticated JSON client
//!
//! Wraps `reqwest::Client` with bearer authentication, base-URL
//! construction, and the HTTP-status → [`SyncError`] mapping that the rest
//! of the system branches on. Transfer URLs issued by the server are
//! pre-signed and absolute; they are fetched without the bearer header.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use vaultsync_core::error::SyncError;

/// Request timeout; an expired timeout is a network failure (no in-flight
/// cancellation exists in the protocol)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the sync backend
pub struct ApiClient {
    /// The underlying HTTP client
    http: Client,
    /// Base URL for API requests
    base_url: String,
    /// Bearer token for authenticated requests
    token: String,
}

impl ApiClient {
    /// Creates a client for the given base URL and bearer token
    ///
    /// The base URL is typically taken from config; tests point it at a
    /// mock server.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Creates an authenticated request builder for a path under the base URL
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http.request(method, url).bearer_auth(&self.token)
    }

    /// Sends a POST with a JSON body, decoding a JSON response
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, SyncError> {
        let response = self
            .request(Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode_json(path, response).await
    }

    /// Sends a GET, decoding a JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode_json(path, response).await
    }

    /// Sends a DELETE, expecting an empty success response
    pub async fn delete(&self, path: &str) -> Result<(), SyncError> {
        let response = self
            .request(Method::DELETE, path)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(path, response).await.map(|_| ())
    }

    /// Fetches bytes from a pre-signed absolute transfer URL
    pub async fn get_transfer(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        let response = self.http.get(url).send().await.map_err(map_reqwest_error)?;
        let response = check_status(url, response).await?;
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        debug!(url, len = bytes.len(), "Transfer download complete");
        Ok(bytes.to_vec())
    }

    /// Pushes bytes to a pre-signed absolute transfer URL
    pub async fn put_transfer(&self, url: &str, data: &[u8]) -> Result<(), SyncError> {
        let response = self
            .http
            .put(url)
            .body(data.to_vec())
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(url, response).await?;
        debug!(url, len = data.len(), "Transfer upload complete");
        Ok(())
    }
}

/// Maps transport-level failures (unreachable, timeout, TLS) to `Network`
fn map_reqwest_error(err: reqwest::Error) -> SyncError {
    SyncError::Network(err.to_string())
}

/// Maps a non-success HTTP status to the error taxonomy
async fn check_status(context: &str, response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    warn!(context, status = %status, "API request failed");

    Err(match status {
        StatusCode::UNAUTHORIZED => SyncError::Unauthorized,
        StatusCode::FORBIDDEN => SyncError::QuotaExceeded(message),
        _ => SyncError::Server {
            status: status.as_u16(),
            message,
        },
    })
}

async fn decode_json<T: DeserializeOwned>(
    context: &str,
    response: Response,
) -> Result<T, SyncError> {
    let response = check_status(context, response).await?;
    response.json().await.map_err(|e| SyncError::Server {
        status: 200,
        message: format!("malformed response body: {e}"),
    })
}
