//! GCS connector implementation
//!
//! Implements the `StoreClient` trait for the Cloud Storage JSON API v1.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::DateTime;
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument, warn};

use store_traits::error::{Result, StoreError};
use store_traits::fingerprint::Fingerprint;
use store_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use store_traits::key::{self, Key};
use store_traits::store::{ByteStream, StoreClient};

use crate::error::GcsError;
use crate::types::{ObjectListResponse, ObjectResource};

/// Cloud Storage JSON API base URL
const STORAGE_API_BASE: &str = "https://storage.googleapis.com/storage/v1";

/// Cloud Storage upload API base URL
const UPLOAD_API_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";

/// Maximum results per listing page
const MAX_PAGE_SIZE: u32 = 1000;

/// Fields to request for object resources
const OBJECT_FIELDS: &str = "name,size,etag,md5Hash,updated";

/// GCS object-store client
///
/// Implements `StoreClient` for objects under `gs://{bucket}/{prefix}`.
/// The prefix always carries a trailing slash so listing can never leak
/// keys from a sibling prefix.
///
/// # Example
///
/// ```ignore
/// use provider_gcs::{GcsStore, ReqwestHttpClient};
/// use std::sync::Arc;
///
/// let store = GcsStore::new(
///     Arc::new(ReqwestHttpClient::new()),
///     "my-bucket",
///     "backups/laptop",
///     access_token,
/// );
/// let keys = store.list_keys().await?;
/// ```
pub struct GcsStore {
    /// HTTP client for API requests
    http: Arc<dyn HttpClient>,

    /// Bucket name
    bucket: String,

    /// Object-name prefix, empty or slash-terminated
    prefix: String,

    /// OAuth 2.0 access token with `devstorage.read_write` scope
    access_token: String,

    /// Retry policy for 429/5xx and transport failures
    retry: RetryPolicy,
}

impl GcsStore {
    /// Create a new GCS store client.
    ///
    /// # Arguments
    ///
    /// * `http` - HTTP client implementation
    /// * `bucket` - bucket name
    /// * `prefix` - object-name prefix; a trailing slash is appended if
    ///   absent (an empty prefix addresses the whole bucket)
    /// * `access_token` - ready OAuth 2.0 access token; acquisition and
    ///   refresh belong to the embedder
    pub fn new(
        http: Arc<dyn HttpClient>,
        bucket: impl Into<String>,
        prefix: &str,
        access_token: impl Into<String>,
    ) -> Self {
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            key::ensure_trailing_slash(&key::normalize(prefix))
        };

        Self {
            http,
            bucket: bucket.into(),
            prefix,
            access_token: access_token.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the default retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Full object name for a key.
    fn object_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Metadata URL for a key.
    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/b/{}/o/{}",
            STORAGE_API_BASE,
            self.bucket,
            urlencoding::encode(&self.object_name(key))
        )
    }

    /// Parse RFC 3339 timestamp to Unix timestamp.
    fn parse_timestamp(rfc3339: &str) -> Option<i64> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.timestamp())
    }

    /// Convert an object resource into a fingerprint.
    ///
    /// The content hash is the object's `md5Hash`, falling back to the
    /// etag; either way it is stable for unchanged content and only
    /// ever compared against this side's own history.
    fn to_fingerprint(resource: &ObjectResource) -> std::result::Result<Fingerprint, GcsError> {
        let size = resource
            .size
            .as_deref()
            .unwrap_or("0")
            .parse::<u64>()
            .map_err(|e| GcsError::ParseError(format!("bad object size: {}", e)))?;

        let content_hash = resource
            .md5_hash
            .clone()
            .or_else(|| resource.etag.clone())
            .ok_or_else(|| {
                GcsError::ParseError(format!("object {} has no md5Hash or etag", resource.name))
            })?;

        let modified_at = resource
            .updated
            .as_deref()
            .and_then(Self::parse_timestamp)
            .unwrap_or(0);

        Ok(Fingerprint::new(size, content_hash, modified_at))
    }

    /// Execute a request, retrying 429/5xx and transient transport
    /// failures with exponential backoff.
    ///
    /// Any other response, success or not, is returned to the caller
    /// for protocol-level interpretation.
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, GcsError> {
        let mut attempt = 0u32;
        let mut last_status = 0u16;

        while attempt < self.retry.max_attempts {
            attempt += 1;

            match self.http.execute(request.clone()).await {
                Ok(response) => {
                    let status = response.status;
                    if status != 429 && !response.is_server_error() {
                        return Ok(response);
                    }

                    last_status = status;
                    warn!(
                        status,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "GCS request failed with retryable status"
                    );
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(attempt, error = %e, "GCS request failed, retrying");
                }
                Err(e) => return Err(e.into()),
            }

            if attempt < self.retry.max_attempts {
                tokio::time::sleep(self.retry.backoff(attempt)).await;
            }
        }

        Err(GcsError::RetriesExhausted {
            attempts: self.retry.max_attempts,
            status_code: last_status,
        })
    }

    /// Map a non-success response to the provider error taxonomy.
    fn api_error(key: &str, response: &HttpResponse) -> GcsError {
        match response.status {
            401 | 403 => GcsError::AccessDenied {
                status_code: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            },
            404 => GcsError::ObjectNotFound {
                key: key.to_string(),
            },
            status => GcsError::ApiError {
                status_code: status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            },
        }
    }

    fn authed(&self, request: HttpRequest) -> HttpRequest {
        request.bearer_token(&self.access_token)
    }
}

#[async_trait]
impl StoreClient for GcsStore {
    #[instrument(skip(self), fields(uri = %self.uri()))]
    async fn list_keys(&self) -> Result<Vec<Key>> {
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;
        let mut page_count = 0;

        loop {
            page_count += 1;
            let mut url = format!(
                "{}/b/{}/o?prefix={}&maxResults={}&fields=nextPageToken,items({})",
                STORAGE_API_BASE,
                self.bucket,
                urlencoding::encode(&self.prefix),
                MAX_PAGE_SIZE,
                OBJECT_FIELDS
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            debug!(page = page_count, "Fetching object listing page");
            let response = self
                .execute_with_retry(self.authed(HttpRequest::new(HttpMethod::Get, url)))
                .await
                .map_err(StoreError::from)?;

            if !response.is_success() {
                return Err(Self::api_error("<listing>", &response).into());
            }

            let page: ObjectListResponse = response
                .json()
                .map_err(|e| GcsError::ParseError(e.to_string()))
                .map_err(StoreError::from)?;

            for object in page.items {
                if let Some(relative) = object.name.strip_prefix(&self.prefix) {
                    if !relative.is_empty() {
                        keys.push(key::normalize(relative));
                    }
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        keys.sort();
        info!(count = keys.len(), pages = page_count, "Listed objects");
        Ok(keys)
    }

    async fn stat(&self, key: &str) -> Result<Option<Fingerprint>> {
        let url = format!("{}?fields={}", self.object_url(key), OBJECT_FIELDS);
        let response = self
            .execute_with_retry(self.authed(HttpRequest::new(HttpMethod::Get, url)))
            .await
            .map_err(StoreError::from)?;

        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(Self::api_error(key, &response).into());
        }

        let resource: ObjectResource = response
            .json()
            .map_err(|e| GcsError::ParseError(e.to_string()))
            .map_err(StoreError::from)?;

        Ok(Some(Self::to_fingerprint(&resource).map_err(StoreError::from)?))
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn open_read(&self, key: &str) -> Result<ByteStream> {
        let url = format!("{}?alt=media", self.object_url(key));
        let response = self
            .execute_with_retry(self.authed(HttpRequest::new(HttpMethod::Get, url)))
            .await
            .map_err(StoreError::from)?;

        if !response.is_success() {
            return Err(Self::api_error(key, &response).into());
        }

        debug!(key, size = response.body.len(), "Downloaded object");
        Ok(Box::new(Cursor::new(response.body.to_vec())))
    }

    #[instrument(skip(self, reader), fields(key = %key, expected_size))]
    async fn write(
        &self,
        key: &str,
        mut reader: ByteStream,
        expected_size: u64,
    ) -> Result<Fingerprint> {
        let mut data = Vec::with_capacity(expected_size as usize);
        reader.read_to_end(&mut data).await?;
        if data.len() as u64 != expected_size {
            return Err(StoreError::Protocol(format!(
                "short write for {}: expected {} bytes, got {}",
                key,
                expected_size,
                data.len()
            )));
        }

        let url = format!(
            "{}/b/{}/o?uploadType=media&name={}&fields={}",
            UPLOAD_API_BASE,
            self.bucket,
            urlencoding::encode(&self.object_name(key)),
            OBJECT_FIELDS
        );

        let request = self
            .authed(HttpRequest::new(HttpMethod::Post, url))
            .header("Content-Type", "application/octet-stream")
            .body(Bytes::from(data));

        let response = self
            .execute_with_retry(request)
            .await
            .map_err(StoreError::from)?;

        if !response.is_success() {
            return Err(Self::api_error(key, &response).into());
        }

        let resource: ObjectResource = response
            .json()
            .map_err(|e| GcsError::ParseError(e.to_string()))
            .map_err(StoreError::from)?;

        info!(key, size = expected_size, "Uploaded object");
        Ok(Self::to_fingerprint(&resource).map_err(StoreError::from)?)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<()> {
        let response = self
            .execute_with_retry(self.authed(HttpRequest::new(
                HttpMethod::Delete,
                self.object_url(key),
            )))
            .await
            .map_err(StoreError::from)?;

        if !response.is_success() {
            return Err(Self::api_error(key, &response).into());
        }

        info!(key, "Deleted object");
        Ok(())
    }

    fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.prefix)
    }
}
