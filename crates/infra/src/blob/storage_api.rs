//! Blob namespace backed by a storage REST API.
//!
//! - `POST {base}/object/list/{bucket}` with `{prefix, limit, offset, sortBy}`
//!   lists one directory. Entries carrying an `id` are stored objects; entries
//!   with a null `id` are sub-directories.
//! - `DELETE {base}/object/{bucket}` with `{prefixes: [...]}` removes objects
//!   by full path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{BlobEntry, BlobError, BlobNamespace, EntryKind, ListOptions, SortColumn};

/// Storage REST API client authenticated with a service key.
#[derive(Clone)]
pub struct StorageApiNamespace {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl core::fmt::Debug for StorageApiNamespace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StorageApiNamespace")
            .field("base_url", &self.base_url)
            .field("service_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: usize,
    offset: usize,
    sort_by: SortBy,
}

#[derive(Debug, Serialize)]
struct SortBy {
    column: SortColumn,
    order: &'static str,
}

#[derive(Debug, Serialize)]
struct RemoveRequest<'a> {
    prefixes: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ListedEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    id: Option<String>,
}

impl From<ListedEntry> for BlobEntry {
    fn from(entry: ListedEntry) -> Self {
        let kind = if entry.name.is_empty() {
            EntryKind::Unknown
        } else if entry.id.is_some() {
            EntryKind::Object
        } else {
            EntryKind::Prefix
        };
        BlobEntry {
            name: entry.name,
            kind,
        }
    }
}

impl StorageApiNamespace {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, service_key)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }
}

/// Body of a non-2xx response, for error messages.
async fn failure_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if body.is_empty() {
        format!("storage API returned {status}")
    } else {
        format!("storage API returned {status}: {body}")
    }
}

#[async_trait]
impl BlobNamespace for StorageApiNamespace {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        options: &ListOptions,
    ) -> Result<Vec<BlobEntry>, BlobError> {
        let listing = |message: String| BlobError::Listing {
            prefix: prefix.to_string(),
            message,
        };

        let url = format!("{}/object/list/{}", self.base_url, bucket);
        let body = ListRequest {
            prefix,
            limit: options.limit,
            offset: 0,
            sort_by: SortBy {
                column: options.sort_by,
                order: "asc",
            },
        };

        let resp = self
            .authorized(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| listing(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(listing(failure_message(resp).await));
        }

        let entries: Vec<ListedEntry> = resp.json().await.map_err(|e| listing(e.to_string()))?;
        Ok(entries.into_iter().map(BlobEntry::from).collect())
    }

    async fn remove_batch(&self, bucket: &str, paths: &[String]) -> Result<(), BlobError> {
        let delete = |message: String| BlobError::Delete {
            count: paths.len(),
            message,
        };

        let url = format!("{}/object/{}", self.base_url, bucket);
        let resp = self
            .authorized(self.http.delete(&url))
            .json(&RemoveRequest { prefixes: paths })
            .send()
            .await
            .map_err(|e| delete(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(delete(failure_message(resp).await));
        }
        Ok(())
    }
}
