//! Typed operation surface.
//!
//! Request and response structs for every gateway operation, shaped
//! for serialization at a transport boundary.  Field names are the
//! wire names; hosts embedding the gateway construct these directly.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Register a bucket at runtime.  The bucket references a named store
/// entry from the gateway configuration; credentials never travel in
/// requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterBucketRequest {
    pub name: String,
    pub store: String,
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub visibility: String,
    #[serde(default)]
    pub max_concurrent_operations: i64,
    #[serde(default)]
    pub part_size: i64,
    #[serde(default)]
    pub part_concurrency: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterBucketResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListBucketsResponse {
    pub buckets: Vec<String>,
    pub default: String,
}

/// Upload an object.  An empty `bucket` targets the default bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteRequest {
    #[serde(default)]
    pub bucket: String,
    pub pathname: String,
    pub content: Vec<u8>,
    /// Caller-supplied object metadata stored alongside the object.
    #[serde(default)]
    pub config: HashMap<String, String>,
    /// `public` or `private`; empty means the bucket default.
    #[serde(default)]
    pub visibility: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    pub success: bool,
    pub pathname: String,
    pub size: i64,
    pub last_modified: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadRequest {
    #[serde(default)]
    pub bucket: String,
    pub pathname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResponse {
    pub content: Vec<u8>,
    pub size: i64,
    pub mime_type: String,
    pub last_modified: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExistsRequest {
    #[serde(default)]
    pub bucket: String,
    pub pathname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub bucket: String,
    pub pathname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyRequest {
    #[serde(default)]
    pub source_bucket: String,
    pub source_pathname: String,
    #[serde(default)]
    pub dest_bucket: String,
    pub dest_pathname: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default)]
    pub visibility: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyResponse {
    pub success: bool,
    pub pathname: String,
    pub size: i64,
    pub last_modified: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoveRequest {
    #[serde(default)]
    pub source_bucket: String,
    pub source_pathname: String,
    #[serde(default)]
    pub dest_bucket: String,
    pub dest_pathname: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default)]
    pub visibility: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResponse {
    pub success: bool,
    pub pathname: String,
    pub size: i64,
    pub last_modified: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetMetadataRequest {
    #[serde(default)]
    pub bucket: String,
    pub pathname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMetadataResponse {
    pub size: i64,
    pub mime_type: String,
    pub last_modified: i64,
    pub visibility: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub etag: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetVisibilityRequest {
    #[serde(default)]
    pub bucket: String,
    pub pathname: String,
    pub visibility: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetVisibilityResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetPublicUrlRequest {
    #[serde(default)]
    pub bucket: String,
    pub pathname: String,
    /// Seconds; 0 for a permanent URL.
    #[serde(default)]
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPublicUrlResponse {
    pub url: String,
    /// Unix timestamp; 0 for a permanent URL.
    #[serde(default)]
    pub expires_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListObjectsRequest {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub delimiter: String,
    /// Values <= 0 default to 1000.
    #[serde(default)]
    pub max_keys: i32,
    #[serde(default)]
    pub continuation_token: String,
}

/// One object in a listing, with the bucket prefix already stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    pub last_modified: i64,
    pub etag: String,
    pub storage_class: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListObjectsResponse {
    pub objects: Vec<ObjectSummary>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_continuation_token: String,
    pub key_count: i32,
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_request_defaults() {
        let req: WriteRequest =
            serde_json::from_str(r#"{"pathname": "a.txt", "content": [104, 105]}"#).unwrap();
        assert_eq!(req.bucket, "");
        assert_eq!(req.content, b"hi");
        assert!(req.config.is_empty());
        assert_eq!(req.visibility, "");
    }

    #[test]
    fn test_list_response_omits_empty_token() {
        let resp = ListObjectsResponse {
            objects: vec![],
            common_prefixes: vec![],
            is_truncated: false,
            next_continuation_token: String::new(),
            key_count: 0,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("next_continuation_token"));
    }

    #[test]
    fn test_register_bucket_request_roundtrip() {
        let json = r#"{"name": "uploads", "store": "main", "bucket": "app-data", "prefix": "u/"}"#;
        let req: RegisterBucketRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "uploads");
        assert_eq!(req.store, "main");
        assert_eq!(req.max_concurrent_operations, 0);
    }
}
