//! S3 object store client.
//!
//! One client per configured store entry, shared by every bucket that
//! references it.  Talks to AWS S3 or any S3-compatible endpoint
//! (MinIO, Ceph RGW) via the AWS SDK.
//!
//! Credentials come from the store configuration when present,
//! otherwise the standard AWS credential chain (env vars,
//! `~/.aws/credentials`, IAM role, etc.).

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{ListChunk, ListEntry, ListParams, ObjectHead, ObjectStore, PutInput, RemoteObject, StoreError};
use crate::config::StoreConfig;

/// Store client backed by the AWS S3 SDK.
#[derive(Debug)]
pub struct S3ObjectStore {
    client: Client,
    region: String,
    endpoint: String,
}

impl S3ObjectStore {
    /// Create a client from a store configuration.
    pub async fn new(cfg: &StoreConfig) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if !cfg.region.is_empty() {
            config_loader = config_loader.region(aws_config::Region::new(cfg.region.clone()));
        }

        if !cfg.endpoint.is_empty() {
            config_loader = config_loader.endpoint_url(&cfg.endpoint);
        }

        // If explicit credentials are provided, inject them as static credentials.
        if !cfg.credentials.key.is_empty() {
            let session_token = if cfg.credentials.token.is_empty() {
                None
            } else {
                Some(cfg.credentials.token.clone())
            };
            let creds = aws_sdk_s3::config::Credentials::new(
                &cfg.credentials.key,
                &cfg.credentials.secret,
                session_token,
                None, // expiry
                "storegate-config",
            );
            config_loader = config_loader.credentials_provider(creds);
        }

        let sdk_config = config_loader.load().await;

        // Custom endpoints (MinIO and friends) rarely support
        // virtual-hosted addressing.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(cfg.force_path_style || !cfg.endpoint.is_empty())
            .build();

        info!(
            region = %cfg.region,
            endpoint = %cfg.endpoint,
            "S3 store client initialized"
        );

        Ok(Self {
            client: Client::from_conf(s3_config),
            region: cfg.region.clone(),
            endpoint: cfg.endpoint.clone(),
        })
    }

    /// Classify an SDK error into the store error taxonomy.
    fn classify_sdk<E, R>(err: SdkError<E, R>) -> StoreError
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        if matches!(err, SdkError::TimeoutError(_)) {
            return StoreError::Timeout;
        }
        match err.code() {
            Some("NoSuchKey") | Some("NoSuchBucket") | Some("NotFound") => StoreError::NotFound,
            Some("AccessDenied") => StoreError::AccessDenied,
            Some("RequestTimeout") => StoreError::Timeout,
            _ => StoreError::Other(format!("{}", DisplayErrorContext(&err))),
        }
    }

    async fn put_single(&self, bucket: &str, input: &PutInput) -> Result<(), StoreError> {
        debug!(bucket, key = %input.key, "S3 put_object");

        self.client
            .put_object()
            .bucket(bucket)
            .key(&input.key)
            .content_type(&input.content_type)
            .acl(ObjectCannedAcl::from(input.acl.as_str()))
            .set_metadata(if input.metadata.is_empty() {
                None
            } else {
                Some(input.metadata.clone())
            })
            .body(ByteStream::from(input.content.clone()))
            .send()
            .await
            .map_err(Self::classify_sdk)?;

        Ok(())
    }

    async fn put_multipart(&self, bucket: &str, input: &PutInput) -> Result<(), StoreError> {
        debug!(
            bucket,
            key = %input.key,
            size = input.content.len(),
            part_size = input.part_size,
            "S3 multipart upload"
        );

        let create_resp = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(&input.key)
            .content_type(&input.content_type)
            .acl(ObjectCannedAcl::from(input.acl.as_str()))
            .set_metadata(if input.metadata.is_empty() {
                None
            } else {
                Some(input.metadata.clone())
            })
            .send()
            .await
            .map_err(Self::classify_sdk)?;

        let upload_id = create_resp
            .upload_id()
            .ok_or_else(|| StoreError::Other("S3 did not return an upload ID".to_string()))?
            .to_string();

        match self.upload_parts(bucket, input, &upload_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Abort on any failure so the store does not accumulate
                // orphaned parts.
                warn!(bucket, key = %input.key, upload_id = %upload_id, error = %e, "aborting multipart upload");
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(&input.key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(error = %DisplayErrorContext(&abort_err), "failed to abort multipart upload");
                }
                Err(e)
            }
        }
    }

    /// Upload all parts with bounded parallelism, then complete the
    /// multipart upload.
    async fn upload_parts(
        &self,
        bucket: &str,
        input: &PutInput,
        upload_id: &str,
    ) -> Result<(), StoreError> {
        let semaphore = Arc::new(Semaphore::new(input.part_concurrency.max(1)));
        let part_size = (input.part_size as usize).max(1);
        let total = input.content.len();

        let mut tasks: JoinSet<Result<(i32, String), StoreError>> = JoinSet::new();
        let mut part_number: i32 = 1;
        let mut offset = 0usize;

        while offset < total {
            let end = (offset + part_size).min(total);
            let chunk = input.content.slice(offset..end);

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| StoreError::Other("part semaphore closed".to_string()))?;

            let client = self.client.clone();
            let bucket = bucket.to_string();
            let key = input.key.clone();
            let upload_id = upload_id.to_string();
            let number = part_number;

            tasks.spawn(async move {
                let _permit = permit;
                let resp = client
                    .upload_part()
                    .bucket(&bucket)
                    .key(&key)
                    .upload_id(&upload_id)
                    .part_number(number)
                    .body(ByteStream::from(chunk))
                    .send()
                    .await
                    .map_err(Self::classify_sdk)?;
                Ok((number, resp.e_tag().unwrap_or("").to_string()))
            });

            part_number += 1;
            offset = end;
        }

        let mut completed_parts = Vec::with_capacity((part_number - 1) as usize);
        while let Some(joined) = tasks.join_next().await {
            let (number, etag) = joined
                .map_err(|e| StoreError::Other(format!("part upload task failed: {e}")))??;
            completed_parts.push(
                CompletedPart::builder()
                    .part_number(number)
                    .e_tag(etag)
                    .build(),
            );
        }

        // Parts finish out of order; S3 requires them sorted.
        completed_parts.sort_by_key(|p| p.part_number());

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(&input.key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(Self::classify_sdk)?;

        Ok(())
    }
}

impl ObjectStore for S3ObjectStore {
    fn put(
        &self,
        bucket: &str,
        input: PutInput,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            if input.content.len() as u64 > input.part_size {
                self.put_multipart(&bucket, &input).await
            } else {
                self.put_single(&bucket, &input).await
            }
        })
    }

    fn get(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<RemoteObject, StoreError>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            debug!(bucket = %bucket, key = %key, "S3 get_object");

            let resp = self
                .client
                .get_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| match &e {
                    SdkError::ServiceError(ctx) if ctx.err().is_no_such_key() => {
                        StoreError::NotFound
                    }
                    _ => Self::classify_sdk(e),
                })?;

            let mime_type = resp.content_type().unwrap_or("").to_string();
            let last_modified = resp.last_modified().map(|t| t.secs()).unwrap_or(0);

            let body = resp
                .body
                .collect()
                .await
                .map_err(|e| StoreError::Other(format!("reading object body: {e}")))?
                .into_bytes();

            Ok(RemoteObject {
                size: body.len() as i64,
                content: body,
                mime_type,
                last_modified,
            })
        })
    }

    fn head(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectHead, StoreError>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            debug!(bucket = %bucket, key = %key, "S3 head_object");

            let resp = self
                .client
                .head_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| match &e {
                    // A HEAD 404 carries no error body, so there is no
                    // service code to classify on.
                    SdkError::ServiceError(ctx) if ctx.err().is_not_found() => StoreError::NotFound,
                    _ => Self::classify_sdk(e),
                })?;

            Ok(ObjectHead {
                size: resp.content_length().unwrap_or(0),
                mime_type: resp.content_type().unwrap_or("").to_string(),
                last_modified: resp.last_modified().map(|t| t.secs()).unwrap_or(0),
                etag: resp.e_tag().unwrap_or("").to_string(),
            })
        })
    }

    fn delete(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            debug!(bucket = %bucket, key = %key, "S3 delete_object");

            // delete_object is idempotent; missing keys are not an error.
            self.client
                .delete_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(Self::classify_sdk)?;

            Ok(())
        })
    }

    fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
        acl: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let copy_source = format!("{source_bucket}/{source_key}");
        let dest_bucket = dest_bucket.to_string();
        let dest_key = dest_key.to_string();
        let acl = acl.to_string();
        Box::pin(async move {
            debug!(source = %copy_source, bucket = %dest_bucket, key = %dest_key, "S3 copy_object");

            self.client
                .copy_object()
                .copy_source(&copy_source)
                .bucket(&dest_bucket)
                .key(&dest_key)
                .acl(ObjectCannedAcl::from(acl.as_str()))
                .send()
                .await
                .map_err(Self::classify_sdk)?;

            Ok(())
        })
    }

    fn set_acl(
        &self,
        bucket: &str,
        key: &str,
        acl: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        let acl = acl.to_string();
        Box::pin(async move {
            debug!(bucket = %bucket, key = %key, acl = %acl, "S3 put_object_acl");

            self.client
                .put_object_acl()
                .bucket(&bucket)
                .key(&key)
                .acl(ObjectCannedAcl::from(acl.as_str()))
                .send()
                .await
                .map_err(|e| match &e {
                    SdkError::ServiceError(ctx) if ctx.err().is_no_such_key() => {
                        StoreError::NotFound
                    }
                    _ => Self::classify_sdk(e),
                })?;

            Ok(())
        })
    }

    fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: u64,
    ) -> Pin<Box<dyn Future<Output = Result<String, StoreError>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            let presigning = PresigningConfig::expires_in(Duration::from_secs(expires_in))
                .map_err(|e| StoreError::Other(format!("presigning config: {e}")))?;

            let presigned = self
                .client
                .get_object()
                .bucket(&bucket)
                .key(&key)
                .presigned(presigning)
                .await
                .map_err(Self::classify_sdk)?;

            Ok(presigned.uri().to_string())
        })
    }

    fn url_for(&self, bucket: &str, key: &str) -> String {
        if self.endpoint.is_empty() {
            format!("https://s3.{}.amazonaws.com/{bucket}/{key}", self.region)
        } else {
            format!("{}/{bucket}/{key}", self.endpoint.trim_end_matches('/'))
        }
    }

    fn list(
        &self,
        bucket: &str,
        params: ListParams,
    ) -> Pin<Box<dyn Future<Output = Result<ListChunk, StoreError>> + Send + '_>> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            debug!(bucket = %bucket, prefix = ?params.prefix, "S3 list_objects_v2");

            let resp = self
                .client
                .list_objects_v2()
                .bucket(&bucket)
                .set_prefix(params.prefix)
                .set_delimiter(params.delimiter)
                .max_keys(params.max_keys)
                .set_continuation_token(params.continuation_token)
                .send()
                .await
                .map_err(Self::classify_sdk)?;

            let objects = resp
                .contents()
                .iter()
                .map(|obj| ListEntry {
                    key: obj.key().unwrap_or("").to_string(),
                    size: obj.size().unwrap_or(0),
                    last_modified: obj.last_modified().map(|t| t.secs()).unwrap_or(0),
                    etag: obj.e_tag().unwrap_or("").to_string(),
                    storage_class: obj
                        .storage_class()
                        .map(|c| c.as_str().to_string())
                        .unwrap_or_default(),
                })
                .collect();

            let common_prefixes = resp
                .common_prefixes()
                .iter()
                .filter_map(|p| p.prefix().map(str::to_string))
                .collect();

            Ok(ListChunk {
                objects,
                common_prefixes,
                is_truncated: resp.is_truncated().unwrap_or(false),
                next_continuation_token: resp.next_continuation_token().map(str::to_string),
                key_count: resp.key_count().unwrap_or(0),
            })
        })
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    fn test_store_config(region: &str, endpoint: &str) -> StoreConfig {
        StoreConfig {
            kind: "s3".to_string(),
            region: region.to_string(),
            endpoint: endpoint.to_string(),
            credentials: Credentials {
                key: "test-key".to_string(),
                secret: "test-secret".to_string(),
                token: String::new(),
            },
            force_path_style: false,
        }
    }

    #[tokio::test]
    async fn test_url_for_aws_endpoint() {
        let store = S3ObjectStore::new(&test_store_config("us-east-1", ""))
            .await
            .unwrap();
        assert_eq!(
            store.url_for("app-data", "uploads/a.txt"),
            "https://s3.us-east-1.amazonaws.com/app-data/uploads/a.txt"
        );
    }

    #[tokio::test]
    async fn test_url_for_custom_endpoint() {
        let store = S3ObjectStore::new(&test_store_config("us-east-1", "http://localhost:9000/"))
            .await
            .unwrap();
        assert_eq!(
            store.url_for("app-data", "a.txt"),
            "http://localhost:9000/app-data/a.txt"
        );
    }

    #[test]
    fn test_copy_source_format() {
        let source = format!("{}/{}", "src-bucket", "path/to/key.txt");
        assert_eq!(source, "src-bucket/path/to/key.txt");
    }

    #[test]
    fn test_part_boundaries() {
        // 12 bytes at a part size of 5 splits into 5 + 5 + 2.
        let total = 12usize;
        let part_size = 5usize;
        let mut boundaries = Vec::new();
        let mut offset = 0;
        while offset < total {
            let end = (offset + part_size).min(total);
            boundaries.push((offset, end));
            offset = end;
        }
        assert_eq!(boundaries, vec![(0, 5), (5, 10), (10, 12)]);
    }
}
