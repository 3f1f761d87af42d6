//! GCS JSON API response types
//!
//! Data structures for deserializing Cloud Storage JSON API v1
//! responses.

use serde::{Deserialize, Serialize};

/// GCS object resource
///
/// See: https://cloud.google.com/storage/docs/json_api/v1/objects#resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectResource {
    /// Full object name, including any prefix
    pub name: String,

    /// Content size in bytes, encoded as a decimal string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// HTTP etag of the object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Base64-encoded MD5 of the object data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_hash: Option<String>,

    /// Last modification time (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

/// GCS objects.list response
///
/// See: https://cloud.google.com/storage/docs/json_api/v1/objects/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectListResponse {
    /// Objects in this page
    #[serde(default)]
    pub items: Vec<ObjectResource>,

    /// Token for the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}
