//! Gateway operations.
//!
//! Every operation follows the same skeleton: begin a coordinator
//! guard (so drain accounting brackets the whole call, validation
//! included), validate inputs, resolve the bucket, race the admission
//! gate against shutdown cancellation, perform the store call, and
//! classify any store error into the caller-facing taxonomy.
//!
//! Move is the one composite operation: a copy step then a delete
//! step. A failed copy leaves nothing mutated; a failed delete after a
//! successful copy surfaces as `PartialFailure` with no rollback.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::admission::AdmissionPermit;
use crate::api::*;
use crate::coordinator::OperationCoordinator;
use crate::errors::StorageError;
use crate::metrics;
use crate::registry::{Bucket, BucketRegistry};
use crate::store::{ListParams, PutInput, StoreError};
use crate::validate::validate_pathname;

/// Executes gateway operations against registered buckets.
#[derive(Debug, Clone)]
pub struct Operations {
    registry: Arc<BucketRegistry>,
    coordinator: Arc<OperationCoordinator>,
}

impl Operations {
    pub fn new(registry: Arc<BucketRegistry>, coordinator: Arc<OperationCoordinator>) -> Self {
        Self {
            registry,
            coordinator,
        }
    }

    /// Wait for an admission slot, abandoning the wait if shutdown is
    /// signalled while queued.
    async fn admit(
        &self,
        bucket: &Bucket,
        operation: &str,
    ) -> Result<AdmissionPermit, StorageError> {
        tokio::select! {
            permit = bucket.gate.acquire() => permit,
            _ = self.coordinator.cancelled() => Err(StorageError::OperationFailed {
                operation: operation.to_string(),
                message: "gateway is shutting down".to_string(),
            }),
        }
    }

    // -- Write ----------------------------------------------------------------

    pub async fn write(&self, req: WriteRequest) -> Result<WriteResponse, StorageError> {
        let bucket_label = req.bucket.clone();
        let result = self.write_inner(req).await;
        record("upload", &bucket_label, result.as_ref().err());
        result
    }

    async fn write_inner(&self, req: WriteRequest) -> Result<WriteResponse, StorageError> {
        let _op = self.coordinator.begin("upload")?;
        validate_pathname(&req.pathname)?;
        let bucket = self.registry.resolve(&req.bucket).await?;
        let _permit = self.admit(&bucket, "upload").await?;

        let key = bucket.full_key(&req.pathname);
        let visibility = bucket.effective_visibility(&req.visibility);
        let size_hint = req.content.len() as i64;

        debug!(bucket = %bucket.name, pathname = %req.pathname, size = size_hint, "write");

        let input = PutInput {
            key: key.clone(),
            content: Bytes::from(req.content),
            content_type: detect_content_type(&req.pathname),
            acl: acl_for(&visibility).to_string(),
            metadata: req.config,
            part_size: bucket.settings.part_size,
            part_concurrency: bucket.settings.part_concurrency,
        };

        bucket
            .store
            .put(&bucket.settings.bucket, input)
            .await
            .map_err(|e| e.classify("upload", &req.pathname))?;

        // Best-effort head for the authoritative size and timestamp.
        // The write already succeeded, so a head failure only degrades
        // the response.
        match bucket.store.head(&bucket.settings.bucket, &key).await {
            Ok(head) => Ok(WriteResponse {
                success: true,
                pathname: req.pathname,
                size: head.size,
                last_modified: head.last_modified,
            }),
            Err(e) => {
                warn!(pathname = %req.pathname, error = %e, "head after write failed");
                Ok(WriteResponse {
                    success: true,
                    pathname: req.pathname,
                    size: size_hint,
                    last_modified: chrono::Utc::now().timestamp(),
                })
            }
        }
    }

    // -- Read -----------------------------------------------------------------

    pub async fn read(&self, req: ReadRequest) -> Result<ReadResponse, StorageError> {
        let bucket_label = req.bucket.clone();
        let result = self.read_inner(req).await;
        record("download", &bucket_label, result.as_ref().err());
        result
    }

    async fn read_inner(&self, req: ReadRequest) -> Result<ReadResponse, StorageError> {
        let _op = self.coordinator.begin("download")?;
        validate_pathname(&req.pathname)?;
        let bucket = self.registry.resolve(&req.bucket).await?;
        let _permit = self.admit(&bucket, "download").await?;

        let key = bucket.full_key(&req.pathname);
        let object = bucket
            .store
            .get(&bucket.settings.bucket, &key)
            .await
            .map_err(|e| e.classify("download", &req.pathname))?;

        Ok(ReadResponse {
            content: object.content.to_vec(),
            size: object.size,
            mime_type: object.mime_type,
            last_modified: object.last_modified,
        })
    }

    // -- Exists ---------------------------------------------------------------

    pub async fn exists(&self, req: ExistsRequest) -> Result<ExistsResponse, StorageError> {
        let bucket_label = req.bucket.clone();
        let result = self.exists_inner(req).await;
        record("head object", &bucket_label, result.as_ref().err());
        result
    }

    async fn exists_inner(&self, req: ExistsRequest) -> Result<ExistsResponse, StorageError> {
        let _op = self.coordinator.begin("head object")?;
        validate_pathname(&req.pathname)?;
        let bucket = self.registry.resolve(&req.bucket).await?;
        let _permit = self.admit(&bucket, "head object").await?;

        let key = bucket.full_key(&req.pathname);
        match bucket.store.head(&bucket.settings.bucket, &key).await {
            Ok(_) => Ok(ExistsResponse { exists: true }),
            // Absence is an answer, not an error.
            Err(StoreError::NotFound) => Ok(ExistsResponse { exists: false }),
            Err(e) => Err(e.classify("head object", &req.pathname)),
        }
    }

    // -- Delete ---------------------------------------------------------------

    pub async fn delete(&self, req: DeleteRequest) -> Result<DeleteResponse, StorageError> {
        let bucket_label = req.bucket.clone();
        let result = self.delete_inner(req).await;
        record("delete", &bucket_label, result.as_ref().err());
        result
    }

    async fn delete_inner(&self, req: DeleteRequest) -> Result<DeleteResponse, StorageError> {
        let _op = self.coordinator.begin("delete")?;
        validate_pathname(&req.pathname)?;
        let bucket = self.registry.resolve(&req.bucket).await?;
        let _permit = self.admit(&bucket, "delete").await?;

        let key = bucket.full_key(&req.pathname);
        bucket
            .store
            .delete(&bucket.settings.bucket, &key)
            .await
            .map_err(|e| e.classify("delete", &req.pathname))?;

        Ok(DeleteResponse { success: true })
    }

    // -- Copy -----------------------------------------------------------------

    pub async fn copy(&self, req: CopyRequest) -> Result<CopyResponse, StorageError> {
        let bucket_label = req.dest_bucket.clone();
        let result = self.copy_inner(req).await;
        record("copy", &bucket_label, result.as_ref().err());
        result
    }

    async fn copy_inner(&self, req: CopyRequest) -> Result<CopyResponse, StorageError> {
        let _op = self.coordinator.begin("copy")?;
        validate_pathname(&req.source_pathname)?;
        validate_pathname(&req.dest_pathname)?;
        let source = self.registry.resolve(&req.source_bucket).await?;
        let dest = self.registry.resolve(&req.dest_bucket).await?;

        // Same-bucket copies take their gate once.  Cross-bucket
        // copies take both gates in bucket-name order; a fixed order
        // keeps opposite-direction copies from deadlocking against
        // each other at exhausted capacity.
        let _permits = if dest.name == source.name {
            (self.admit(&source, "copy").await?, None)
        } else if source.name <= dest.name {
            let first = self.admit(&source, "copy").await?;
            let second = self.admit(&dest, "copy").await?;
            (first, Some(second))
        } else {
            let first = self.admit(&dest, "copy").await?;
            let second = self.admit(&source, "copy").await?;
            (first, Some(second))
        };

        let source_key = source.full_key(&req.source_pathname);
        let dest_key = dest.full_key(&req.dest_pathname);
        let visibility = dest.effective_visibility(&req.visibility);

        debug!(
            source_bucket = %source.name,
            source = %req.source_pathname,
            dest_bucket = %dest.name,
            dest = %req.dest_pathname,
            "copy"
        );

        // The destination bucket's client executes the server-side copy.
        dest.store
            .copy(
                &source.settings.bucket,
                &source_key,
                &dest.settings.bucket,
                &dest_key,
                acl_for(&visibility),
            )
            .await
            .map_err(|e| e.classify("copy", &req.source_pathname))?;

        // Best-effort head; the copy already succeeded.
        match dest.store.head(&dest.settings.bucket, &dest_key).await {
            Ok(head) => Ok(CopyResponse {
                success: true,
                pathname: req.dest_pathname,
                size: head.size,
                last_modified: head.last_modified,
            }),
            Err(e) => {
                warn!(pathname = %req.dest_pathname, error = %e, "head after copy failed");
                Ok(CopyResponse {
                    success: true,
                    pathname: req.dest_pathname,
                    size: 0,
                    last_modified: 0,
                })
            }
        }
    }

    // -- Move -----------------------------------------------------------------

    /// Move an object: copy, then delete the source.  Each step holds
    /// its own coordinator bracket, but only the composite records a
    /// metrics entry, so one caller-visible move counts once.  If the
    /// delete fails after a successful copy, the destination object is
    /// retrievable, the source is untouched, and the error is
    /// `PartialFailure`.
    pub async fn move_object(&self, req: MoveRequest) -> Result<MoveResponse, StorageError> {
        let bucket_label = req.dest_bucket.clone();
        let result = self.move_inner(req).await;
        record("move", &bucket_label, result.as_ref().err());
        result
    }

    async fn move_inner(&self, req: MoveRequest) -> Result<MoveResponse, StorageError> {
        let copy_resp = self
            .copy_inner(CopyRequest {
                source_bucket: req.source_bucket.clone(),
                source_pathname: req.source_pathname.clone(),
                dest_bucket: req.dest_bucket.clone(),
                dest_pathname: req.dest_pathname.clone(),
                config: req.config,
                visibility: req.visibility,
            })
            .await?;

        if let Err(delete_err) = self
            .delete_inner(DeleteRequest {
                bucket: req.source_bucket,
                pathname: req.source_pathname.clone(),
            })
            .await
        {
            warn!(
                source = %req.source_pathname,
                dest = %req.dest_pathname,
                error = %delete_err,
                "move copied but failed to delete source"
            );
            return Err(StorageError::PartialFailure {
                pathname: req.dest_pathname,
                source: Box::new(delete_err),
            });
        }

        Ok(MoveResponse {
            success: true,
            pathname: copy_resp.pathname,
            size: copy_resp.size,
            last_modified: copy_resp.last_modified,
        })
    }

    // -- Metadata -------------------------------------------------------------

    pub async fn get_metadata(
        &self,
        req: GetMetadataRequest,
    ) -> Result<GetMetadataResponse, StorageError> {
        let bucket_label = req.bucket.clone();
        let result = self.get_metadata_inner(req).await;
        record("head object", &bucket_label, result.as_ref().err());
        result
    }

    async fn get_metadata_inner(
        &self,
        req: GetMetadataRequest,
    ) -> Result<GetMetadataResponse, StorageError> {
        let _op = self.coordinator.begin("head object")?;
        validate_pathname(&req.pathname)?;
        let bucket = self.registry.resolve(&req.bucket).await?;
        let _permit = self.admit(&bucket, "head object").await?;

        let key = bucket.full_key(&req.pathname);
        let head = bucket
            .store
            .head(&bucket.settings.bucket, &key)
            .await
            .map_err(|e| e.classify("head object", &req.pathname))?;

        Ok(GetMetadataResponse {
            size: head.size,
            mime_type: head.mime_type,
            last_modified: head.last_modified,
            // Per-object ACLs are not readable back cheaply; report the
            // bucket default.
            visibility: bucket.settings.visibility.clone(),
            etag: head.etag,
        })
    }

    // -- Visibility -----------------------------------------------------------

    pub async fn set_visibility(
        &self,
        req: SetVisibilityRequest,
    ) -> Result<SetVisibilityResponse, StorageError> {
        let bucket_label = req.bucket.clone();
        let result = self.set_visibility_inner(req).await;
        record("put object acl", &bucket_label, result.as_ref().err());
        result
    }

    async fn set_visibility_inner(
        &self,
        req: SetVisibilityRequest,
    ) -> Result<SetVisibilityResponse, StorageError> {
        let _op = self.coordinator.begin("put object acl")?;
        validate_pathname(&req.pathname)?;
        if req.visibility != "public" && req.visibility != "private" {
            return Err(StorageError::InvalidVisibility {
                value: req.visibility,
            });
        }
        let bucket = self.registry.resolve(&req.bucket).await?;
        let _permit = self.admit(&bucket, "put object acl").await?;

        let key = bucket.full_key(&req.pathname);
        bucket
            .store
            .set_acl(&bucket.settings.bucket, &key, acl_for(&req.visibility))
            .await
            .map_err(|e| e.classify("put object acl", &req.pathname))?;

        Ok(SetVisibilityResponse { success: true })
    }

    // -- Public URLs ----------------------------------------------------------

    /// Generate a permanent or presigned URL.  URL minting never takes
    /// an admission gate slot: the permanent branch does no I/O and
    /// presigning is local SDK work.
    pub async fn get_public_url(
        &self,
        req: GetPublicUrlRequest,
    ) -> Result<GetPublicUrlResponse, StorageError> {
        let bucket_label = req.bucket.clone();
        let result = self.get_public_url_inner(req).await;
        record("presign get object", &bucket_label, result.as_ref().err());
        result
    }

    async fn get_public_url_inner(
        &self,
        req: GetPublicUrlRequest,
    ) -> Result<GetPublicUrlResponse, StorageError> {
        let _op = self.coordinator.begin("presign get object")?;
        validate_pathname(&req.pathname)?;
        let bucket = self.registry.resolve(&req.bucket).await?;

        let key = bucket.full_key(&req.pathname);

        if req.expires_in <= 0 {
            return Ok(GetPublicUrlResponse {
                url: bucket.store.url_for(&bucket.settings.bucket, &key),
                expires_at: 0,
            });
        }

        let url = bucket
            .store
            .presign_get(&bucket.settings.bucket, &key, req.expires_in as u64)
            .await
            .map_err(|e| e.classify("presign get object", &req.pathname))?;

        Ok(GetPublicUrlResponse {
            url,
            expires_at: chrono::Utc::now().timestamp() + req.expires_in,
        })
    }

    // -- Listing --------------------------------------------------------------

    pub async fn list_objects(
        &self,
        req: ListObjectsRequest,
    ) -> Result<ListObjectsResponse, StorageError> {
        let bucket_label = req.bucket.clone();
        let result = self.list_objects_inner(req).await;
        record("list objects", &bucket_label, result.as_ref().err());
        result
    }

    async fn list_objects_inner(
        &self,
        req: ListObjectsRequest,
    ) -> Result<ListObjectsResponse, StorageError> {
        let _op = self.coordinator.begin("list objects")?;
        let bucket = self.registry.resolve(&req.bucket).await?;
        let _permit = self.admit(&bucket, "list objects").await?;

        // The caller's prefix is relative to the bucket namespace.
        let full_prefix = format!("{}{}", bucket.settings.prefix, req.prefix);
        let max_keys = if req.max_keys <= 0 { 1000 } else { req.max_keys };

        let params = ListParams {
            prefix: if full_prefix.is_empty() {
                None
            } else {
                Some(full_prefix)
            },
            delimiter: if req.delimiter.is_empty() {
                None
            } else {
                Some(req.delimiter)
            },
            max_keys,
            continuation_token: if req.continuation_token.is_empty() {
                None
            } else {
                Some(req.continuation_token)
            },
        };

        let chunk = bucket
            .store
            .list(&bucket.settings.bucket, params)
            .await
            .map_err(|e| e.classify("list objects", &req.prefix))?;

        let objects = chunk
            .objects
            .into_iter()
            .map(|entry| ObjectSummary {
                key: bucket.strip_prefix(&entry.key).to_string(),
                size: entry.size,
                last_modified: entry.last_modified,
                etag: entry.etag,
                storage_class: entry.storage_class,
            })
            .collect();

        let common_prefixes = chunk
            .common_prefixes
            .iter()
            .map(|p| bucket.strip_prefix(p).to_string())
            .collect();

        Ok(ListObjectsResponse {
            objects,
            common_prefixes,
            is_truncated: chunk.is_truncated,
            next_continuation_token: chunk.next_continuation_token.unwrap_or_default(),
            key_count: chunk.key_count,
        })
    }
}

// -- Helpers ------------------------------------------------------------------

/// Map a visibility value to a canned ACL.
fn acl_for(visibility: &str) -> &'static str {
    if visibility == "public" {
        "public-read"
    } else {
        "private"
    }
}

/// Detect the content type from the pathname extension.
fn detect_content_type(pathname: &str) -> String {
    let ext = pathname
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    let content_type = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    };
    content_type.to_string()
}

fn record(operation: &str, bucket: &str, error: Option<&StorageError>) {
    match error {
        None => metrics::record_operation(operation, bucket, "ok"),
        Some(e) => {
            metrics::record_operation(operation, bucket, "error");
            metrics::record_error(bucket, e.code());
        }
    }
}

// -- Tests --------------------------------------------------------------------
