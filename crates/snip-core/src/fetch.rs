//! HTTP transport
//!
//! The single place where HTTP status codes become typed [`ApiError`]s.
//! Everything above this layer reasons about the error taxonomy, never
//! about status codes or response bodies.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::models::{SaveRequest, SavedFields, Snippet, SnippetId};

/// How save requests reach the server.
///
/// The sync engine only depends on this trait; tests substitute a
/// scripted fake, the CLI plugs in [`ApiClient`].
pub trait SaveTransport: Send + Sync + 'static {
    fn save(&self, request: SaveRequest) -> impl Future<Output = ApiResult<SavedFields>> + Send;
}

/// Error body shape returned by the server on non-2xx responses
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// HTTP client for the snippet API
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: normalize_base(base_url.into()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Fetch a snippet by id
    pub async fn fetch_snippet(&self, id: &SnippetId) -> ApiResult<Snippet> {
        self.get(&format!("snippets/{}", id)).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode_response(response).await
    }

    async fn patch<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let url = self.url(path);
        debug!(%url, "PATCH");
        let response = self
            .http
            .patch(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode_response(response).await
    }
}

impl SaveTransport for ApiClient {
    async fn save(&self, request: SaveRequest) -> ApiResult<SavedFields> {
        let path = format!("snippets/{}", request.snippet_id);
        self.patch(&path, &request).await
    }
}

/// Translate a response into either a decoded body or a typed error.
///
/// Failure to reach the server at all surfaces as `Network`; a reply
/// with a non-2xx status maps through [`ApiError::from_status`] using
/// the server's `{ "message": ... }` body when one is present.
async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| invalid_body(status.as_u16(), &e.to_string()));
    }

    let message = match response.text().await {
        Ok(body) => match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => parsed.message,
            Err(_) if !body.is_empty() => body,
            Err(_) => status.to_string(),
        },
        Err(_) => status.to_string(),
    };

    Err(ApiError::from_status(status.as_u16(), message))
}

/// A reply arrived but its body could not be decoded.
///
/// Not `Network`: the server did respond, so the request may already
/// have been applied, and retrying it would be wrong.
fn invalid_body(status: u16, details: &str) -> ApiError {
    ApiError::UnknownServer {
        status,
        message: format!("invalid response body: {}", details),
    }
}

fn normalize_base(base: String) -> String {
    base.trim_end_matches('/').to_string()
}
