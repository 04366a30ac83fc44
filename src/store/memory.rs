//! In-process object store for local development and tests.
//!
//! Objects live in a `tokio::sync::RwLock<HashMap<...>>` keyed by
//! `{bucket}/{key}`, with quoted MD5-hex ETags.  Listing follows S3
//! list-v2 semantics: lexicographic order, prefix filtering, delimiter
//! grouping into common prefixes, and token-based pagination.

use bytes::Bytes;
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::RwLock;

use super::{ListChunk, ListEntry, ListParams, ObjectHead, ObjectStore, PutInput, RemoteObject, StoreError};

#[derive(Debug, Clone)]
struct StoredEntry {
    data: Bytes,
    etag: String,
    content_type: String,
    last_modified: i64,
    acl: String,
}

/// HashMap-backed object store.
#[derive(Debug)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    fn storage_key(bucket: &str, key: &str) -> String {
        format!("{bucket}/{key}")
    }

    /// Compute the quoted MD5-hex ETag for a byte slice.
    fn compute_etag(data: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(data);
        format!("\"{}\"", hex::encode(hasher.finalize()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryStore {
    fn put(
        &self,
        bucket: &str,
        input: PutInput,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let storage_key = Self::storage_key(bucket, &input.key);
        Box::pin(async move {
            let entry = StoredEntry {
                etag: Self::compute_etag(&input.content),
                data: input.content,
                content_type: input.content_type,
                last_modified: chrono::Utc::now().timestamp(),
                acl: input.acl,
            };

            let mut objects = self.objects.write().await;
            objects.insert(storage_key, entry);
            Ok(())
        })
    }

    fn get(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<RemoteObject, StoreError>> + Send + '_>> {
        let storage_key = Self::storage_key(bucket, key);
        Box::pin(async move {
            let objects = self.objects.read().await;
            let entry = objects.get(&storage_key).ok_or(StoreError::NotFound)?;
            Ok(RemoteObject {
                content: entry.data.clone(),
                size: entry.data.len() as i64,
                mime_type: entry.content_type.clone(),
                last_modified: entry.last_modified,
            })
        })
    }

    fn head(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectHead, StoreError>> + Send + '_>> {
        let storage_key = Self::storage_key(bucket, key);
        Box::pin(async move {
            let objects = self.objects.read().await;
            let entry = objects.get(&storage_key).ok_or(StoreError::NotFound)?;
            Ok(ObjectHead {
                size: entry.data.len() as i64,
                mime_type: entry.content_type.clone(),
                last_modified: entry.last_modified,
                etag: entry.etag.clone(),
            })
        })
    }

    fn delete(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let storage_key = Self::storage_key(bucket, key);
        Box::pin(async move {
            let mut objects = self.objects.write().await;
            objects.remove(&storage_key);
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
        let src = Self::storage_key(source_bucket, source_key);
        let dst = Self::storage_key(dest_bucket, dest_key);
        let acl = acl.to_string();
        Box::pin(async move {
            let mut objects = self.objects.write().await;
            let mut entry = objects.get(&src).cloned().ok_or(StoreError::NotFound)?;
            entry.last_modified = chrono::Utc::now().timestamp();
            entry.acl = acl;
            objects.insert(dst, entry);
            Ok(())
        })
    }

    fn set_acl(
        &self,
        bucket: &str,
        key: &str,
        acl: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let storage_key = Self::storage_key(bucket, key);
        let acl = acl.to_string();
        Box::pin(async move {
            let mut objects = self.objects.write().await;
            let entry = objects.get_mut(&storage_key).ok_or(StoreError::NotFound)?;
            entry.acl = acl;
            Ok(())
        })
    }

    fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: u64,
    ) -> Pin<Box<dyn Future<Output = Result<String, StoreError>> + Send + '_>> {
        let url = format!("memory://{bucket}/{key}?expires_in={expires_in}");
        Box::pin(async move { Ok(url) })
    }

    fn url_for(&self, bucket: &str, key: &str) -> String {
        format!("memory://{bucket}/{key}")
    }

    fn list(
        &self,
        bucket: &str,
        params: ListParams,
    ) -> Pin<Box<dyn Future<Output = Result<ListChunk, StoreError>> + Send + '_>> {
        let bucket_prefix = format!("{bucket}/");
        Box::pin(async move {
            let prefix = params.prefix.unwrap_or_default();
            let delimiter = params.delimiter.filter(|d| !d.is_empty());
            let token = params.continuation_token.unwrap_or_default();
            let max_keys = if params.max_keys <= 0 {
                1000
            } else {
                params.max_keys as usize
            };

            let objects = self.objects.read().await;

            // Keys within this bucket, filtered and sorted.
            let mut keys: Vec<&str> = objects
                .keys()
                .filter_map(|k| k.strip_prefix(&bucket_prefix))
                .filter(|k| k.starts_with(&prefix))
                .filter(|k| token.is_empty() || *k > token.as_str())
                .collect();
            keys.sort_unstable();

            let mut chunk = ListChunk::default();
            let mut count = 0usize;
            let mut last_consumed = "";
            let mut truncated = false;

            let mut i = 0;
            while i < keys.len() {
                let key = keys[i];

                if let Some(ref delim) = delimiter {
                    let rest = &key[prefix.len()..];
                    if let Some(pos) = rest.find(delim.as_str()) {
                        if count == max_keys {
                            truncated = true;
                            break;
                        }
                        let group = &key[..prefix.len() + pos + delim.len()];
                        chunk.common_prefixes.push(group.to_string());
                        count += 1;
                        // Consume every key in this group; sorted order
                        // makes them contiguous.
                        while i < keys.len() && keys[i].starts_with(group) {
                            last_consumed = keys[i];
                            i += 1;
                        }
                        continue;
                    }
                }

                if count == max_keys {
                    truncated = true;
                    break;
                }

                let entry = &objects[&format!("{bucket_prefix}{key}")];
                chunk.objects.push(ListEntry {
                    key: key.to_string(),
                    size: entry.data.len() as i64,
                    last_modified: entry.last_modified,
                    etag: entry.etag.clone(),
                    storage_class: "STANDARD".to_string(),
                });
                count += 1;
                last_consumed = key;
                i += 1;
            }

            chunk.is_truncated = truncated;
            if truncated {
                chunk.next_continuation_token = Some(last_consumed.to_string());
            }
            chunk.key_count = count as i32;

            Ok(chunk)
        })
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn put_input(key: &str, content: &str) -> PutInput {
        PutInput {
            key: key.to_string(),
            content: Bytes::from(content.to_string()),
            content_type: "text/plain".to_string(),
            acl: "private".to_string(),
            metadata: HashMap::new(),
            part_size: 5 * 1024 * 1024,
            part_concurrency: 5,
        }
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryStore::new();
        store.put("b", put_input("a.txt", "hello")).await.unwrap();

        let obj = store.get("b", "a.txt").await.unwrap();
        assert_eq!(obj.content, Bytes::from("hello"));
        assert_eq!(obj.size, 5);
        assert_eq!(obj.mime_type, "text/plain");
        assert!(obj.last_modified > 0);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryStore::new();
        assert_eq!(store.get("b", "nope").await.unwrap_err(), StoreError::NotFound);
    }

    #[tokio::test]
    async fn test_head_reports_md5_etag() {
        let store = MemoryStore::new();
        store.put("b", put_input("empty", "")).await.unwrap();

        let head = store.head("b", "empty").await.unwrap();
        assert_eq!(head.etag, "\"d41d8cd98f00b204e9800998ecf8427e\"");
        assert_eq!(head.size, 0);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.put("b", put_input("a.txt", "x")).await.unwrap();

        store.delete("b", "a.txt").await.unwrap();
        assert!(store.head("b", "a.txt").await.is_err());
        store.delete("b", "a.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_copy_across_buckets() {
        let store = MemoryStore::new();
        store.put("src", put_input("a.txt", "payload")).await.unwrap();

        store
            .copy("src", "a.txt", "dst", "b.txt", "public-read")
            .await
            .unwrap();

        let obj = store.get("dst", "b.txt").await.unwrap();
        assert_eq!(obj.content, Bytes::from("payload"));
        // Source untouched.
        assert!(store.get("src", "a.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let store = MemoryStore::new();
        let err = store
            .copy("src", "nope", "dst", "b.txt", "private")
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound);
    }

    #[tokio::test]
    async fn test_set_acl_requires_object() {
        let store = MemoryStore::new();
        assert!(store.set_acl("b", "nope", "public-read").await.is_err());

        store.put("b", put_input("a.txt", "x")).await.unwrap();
        store.set_acl("b", "a.txt", "public-read").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_sorted_with_prefix() {
        let store = MemoryStore::new();
        for key in ["docs/b.txt", "docs/a.txt", "img/c.png"] {
            store.put("b", put_input(key, "x")).await.unwrap();
        }

        let chunk = store
            .list(
                "b",
                ListParams {
                    prefix: Some("docs/".to_string()),
                    ..ListParams::default()
                },
            )
            .await
            .unwrap();

        let keys: Vec<&str> = chunk.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["docs/a.txt", "docs/b.txt"]);
        assert!(!chunk.is_truncated);
        assert_eq!(chunk.key_count, 2);
    }

    #[tokio::test]
    async fn test_list_delimiter_groups() {
        let store = MemoryStore::new();
        for key in ["a/1.txt", "a/2.txt", "b/1.txt", "top.txt"] {
            store.put("b", put_input(key, "x")).await.unwrap();
        }

        let chunk = store
            .list(
                "b",
                ListParams {
                    delimiter: Some("/".to_string()),
                    ..ListParams::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(chunk.common_prefixes, vec!["a/", "b/"]);
        let keys: Vec<&str> = chunk.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["top.txt"]);
        assert_eq!(chunk.key_count, 3);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.put("b", put_input(&format!("k{i}"), "x")).await.unwrap();
        }

        let page1 = store
            .list(
                "b",
                ListParams {
                    max_keys: 2,
                    ..ListParams::default()
                },
            )
            .await
            .unwrap();
        assert!(page1.is_truncated);
        assert_eq!(page1.key_count, 2);
        let token = page1.next_continuation_token.clone().unwrap();

        let page2 = store
            .list(
                "b",
                ListParams {
                    max_keys: 10,
                    continuation_token: Some(token),
                    ..ListParams::default()
                },
            )
            .await
            .unwrap();
        assert!(!page2.is_truncated);
        assert_eq!(page2.key_count, 3);

        let mut all: Vec<String> = page1
            .objects
            .iter()
            .chain(page2.objects.iter())
            .map(|o| o.key.clone())
            .collect();
        all.sort();
        assert_eq!(all, vec!["k0", "k1", "k2", "k3", "k4"]);
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let store = MemoryStore::new();
        store.put("b1", put_input("a.txt", "x")).await.unwrap();

        assert!(store.get("b2", "a.txt").await.is_err());
        let chunk = store.list("b2", ListParams::default()).await.unwrap();
        assert_eq!(chunk.key_count, 0);
    }

    #[test]
    fn test_urls() {
        let store = MemoryStore::new();
        assert_eq!(store.url_for("b", "a/b.txt"), "memory://b/a/b.txt");
    }
}
