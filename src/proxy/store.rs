//! Second hop of a resolution: fetching a located artifact.

use std::fmt;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::{header, Client, Url};

use super::Located;
use crate::error::{Error, Result};

/// Fetches the bytes behind a [`Located`] artifact.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn fetch(&self, located: &Located) -> Result<FetchedAsset>;
}

/// A fetched artifact: the headers worth mirroring plus a body stream.
pub struct FetchedAsset {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes>>,
}

impl FetchedAsset {
    pub const PREALLOCATE_LIMIT: u64 = 64 * 1024;

    /// Wrap an in-memory body.
    pub fn from_bytes(bytes: impl Into<Bytes>, content_type: Option<String>) -> Self {
        let bytes = bytes.into();
        Self {
            content_type,
            cache_control: None,
            content_length: Some(bytes.len() as u64),
            body: stream::once(async move { Ok(bytes) }).boxed(),
        }
    }

    /// Drain the body into a single buffer.
    ///
    /// The advertised length only seeds the buffer, up to [`Self::PREALLOCATE_LIMIT`];
    /// the upstream controls that header and the body may never arrive.
    pub async fn into_bytes(self) -> Result<Bytes> {
        let mut body = self.body;
        let capacity = self
            .content_length
            .map_or(0, |len| len.min(Self::PREALLOCATE_LIMIT) as usize);
        let mut buf = BytesMut::with_capacity(capacity);
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for FetchedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedAsset")
            .field("content_type", &self.content_type)
            .field("cache_control", &self.cache_control)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Fetches presigned URLs directly over HTTP, server-side.
#[derive(Debug, Clone, Default)]
pub struct HttpAssetStore {
    client: Client,
}

impl HttpAssetStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn header_value(headers: &header::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn fetch(&self, located: &Located) -> Result<FetchedAsset> {
        let url = Url::parse(&located.url).map_err(|e| {
            Error::MalformedResponse(format!("invalid {}: {e}", located.kind.url_field()))
        })?;

        tracing::debug!(job_id = %located.job_id, kind = %located.kind, "fetching located asset");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(job_id = %located.job_id, kind = %located.kind, %status, "upstream fetch failed");
            return Err(Error::UpstreamFetchError {
                status: status.as_u16(),
                body,
            });
        }

        let headers = response.headers();
        let content_type = header_value(headers, header::CONTENT_TYPE);
        let cache_control = header_value(headers, header::CACHE_CONTROL);
        let content_length = response.content_length();

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::UpstreamUnavailable(e.to_string())))
            .boxed();

        Ok(FetchedAsset {
            content_type,
            cache_control,
            content_length,
            body,
        })
    }
}
