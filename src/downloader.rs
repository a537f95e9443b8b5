// src/downloader.rs

//! HTTP implementation of the listing and transfer collaborators, speaking a
//! small JSON media API:
//!
//! - `GET {base}/collections?limit=N&offset=K` → collections the account can see
//! - `GET {base}/collections/{ref}` → collection info
//! - `GET {base}/collections/{id}/messages?limit=N&offset_id=C` → raw messages
//! - `GET {base}/collections/{id}/media/{item}` → the item's bytes

use crate::models::{Collection, DisplayName, Item, RawMessage};
use crate::source::{MediaTransfer, MessageSource, SourceError, TransferError};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Used when a 429 response carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Page size for the collection listing.
pub const COLLECTION_PAGE: usize = 200;

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

impl From<CollectionInfo> for Collection {
    fn from(info: CollectionInfo) -> Self {
        let name = DisplayName::resolve(
            info.id,
            info.title.as_deref(),
            info.first_name.as_deref(),
            info.last_name.as_deref(),
        );
        Collection::new(info.id, name)
    }
}

/// Client for the media API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Looks up a collection by id or username and fixes its display name.
    pub async fn resolve_collection(&self, reference: &str) -> Result<Collection, SourceError> {
        let url = format!("{}/collections/{}", self.base_url, reference);
        let resp = self.client.get(&url).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => return Err(SourceError::NotFound(reference.to_string())),
            status if !status.is_success() => return Err(SourceError::Status(status.as_u16())),
            _ => {}
        }
        let body = resp.bytes().await?;
        let info: CollectionInfo = serde_json::from_slice(&body)?;
        Ok(info.into())
    }

    /// Every collection the account can see, in listing order.
    pub async fn list_collections(&self) -> Result<Vec<Collection>, SourceError> {
        let url = format!("{}/collections", self.base_url);
        let mut collections = Vec::new();
        loop {
            let resp = self
                .client
                .get(&url)
                .query(&[("limit", COLLECTION_PAGE), ("offset", collections.len())])
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(SourceError::Status(resp.status().as_u16()));
            }
            let body = resp.bytes().await?;
            let page: Vec<CollectionInfo> = serde_json::from_slice(&body)?;
            let short = page.len() < COLLECTION_PAGE;
            collections.extend(page.into_iter().map(Collection::from));
            if short {
                break;
            }
        }
        debug!(count = collections.len(), "Collections listed");
        Ok(collections)
    }
}

fn retry_after(resp: &reqwest::Response) -> Duration {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[async_trait]
impl MessageSource for HttpSource {
    async fn list_page(
        &self,
        collection: &Collection,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<RawMessage>, SourceError> {
        let url = format!("{}/collections/{}/messages", self.base_url, collection.id);
        let mut request = self.client.get(&url).query(&[("limit", limit as u64)]);
        if let Some(before) = before {
            request = request.query(&[("offset_id", before)]);
        }
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(SourceError::Status(resp.status().as_u16()));
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl MediaTransfer for HttpSource {
    async fn transfer(
        &self,
        item: &Item,
        destination_dir: &Path,
        on_progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> Result<Option<PathBuf>, TransferError> {
        let url = format!(
            "{}/collections/{}/media/{}",
            self.base_url, item.collection_id, item.id
        );
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(TransferError::RateLimited {
                wait: retry_after(&resp),
            });
        }
        if !resp.status().is_success() {
            return Err(TransferError::Status(resp.status().as_u16()));
        }
        let total = resp.content_length().unwrap_or(item.size);

        tokio::fs::create_dir_all(destination_dir).await?;
        let path = destination_dir.join(item.local_file_name());
        let mut file = File::create(&path).await?;

        let mut downloaded = 0u64;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            file.write_all(&bytes).await?;
            downloaded += bytes.len() as u64;
            on_progress(downloaded, total);
        }
        file.flush().await?;
        debug!(item_id = item.id, bytes = downloaded, path = %path.display(), "Transfer finished");

        Ok(Some(path))
    }
}
