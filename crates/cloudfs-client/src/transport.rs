//! HTTP transport
//!
//! The adapter never talks to the network directly. Every request goes
//! through a [`Transport`], which reports the raw status code and body and
//! leaves all interpretation to the caller. [`ReqwestTransport`] is the
//! default implementation.

use crate::{ClientError, Config, Exists, ProgressCallback, Result, TransferProgress};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, LOCATION, USER_AGENT};
use reqwest::{Body, Client, Response, multipart, redirect};
use std::path::PathBuf;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};
use url::Url;

/// Form field carrying the file bytes of an upload
pub const UPLOAD_FIELD: &str = "file";

/// Chunk size used when streaming an upload body (64 KB)
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Raw HTTP response
#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Outcome of a streaming download
#[derive(Clone, Debug, Default)]
pub struct DownloadResponse {
    pub status: u16,
    pub bytes_written: u64,
    /// Response body when the server answered with an error instead of content
    pub error_body: Bytes,
}

/// Outcome of a request made without following redirects
#[derive(Clone, Debug, Default)]
pub struct RedirectResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: Bytes,
}

/// A local file to send as a multipart upload
#[derive(Clone, Debug)]
pub struct MultipartUpload {
    /// Name of the file on the server
    pub name: String,
    /// Local source path
    pub source: PathBuf,
    /// Conflict policy
    pub exists: Exists,
}

/// HTTP transport capability
///
/// Implementations perform exactly one exchange per call and never retry.
/// Connection-level failures are reported as [`ClientError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, headers: HeaderMap) -> Result<HttpResponse>;

    async fn post(&self, url: &Url, headers: HeaderMap, body: String) -> Result<HttpResponse>;

    async fn delete(&self, url: &Url, headers: HeaderMap) -> Result<HttpResponse>;

    async fn post_multipart(
        &self,
        url: &Url,
        headers: HeaderMap,
        upload: MultipartUpload,
        progress: Option<ProgressCallback>,
    ) -> Result<HttpResponse>;

    /// Stream the response body of a GET into `sink`
    async fn download(
        &self,
        url: &Url,
        headers: HeaderMap,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadResponse>;

    /// Issue a GET without following redirects and report `Location`
    async fn redirect_location(&self, url: &Url, headers: HeaderMap) -> Result<RedirectResponse>;
}

/// [`Transport`] backed by `reqwest`
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: Client,
    no_redirect: Client,
}

impl ReqwestTransport {
    /// Create a transport honoring the configured timeout and user agent
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| ClientError::Config(format!("invalid user agent: {}", e)))?,
        );

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers.clone())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        let no_redirect = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, no_redirect })
    }

    async fn collect(response: Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url, headers: HeaderMap) -> Result<HttpResponse> {
        debug!("Sending GET request to {}", url);
        let response = self.http.get(url.clone()).headers(headers).send().await?;
        Self::collect(response).await
    }

    async fn post(&self, url: &Url, headers: HeaderMap, body: String) -> Result<HttpResponse> {
        debug!("Sending POST request to {}", url);
        let response = self
            .http
            .post(url.clone())
            .headers(headers)
            .body(body)
            .send()
            .await?;
        Self::collect(response).await
    }

    async fn delete(&self, url: &Url, headers: HeaderMap) -> Result<HttpResponse> {
        debug!("Sending DELETE request to {}", url);
        let response = self.http.delete(url.clone()).headers(headers).send().await?;
        Self::collect(response).await
    }

    #[instrument(
        skip(self, headers, progress),
        fields(url = %url, source = %upload.source.display())
    )]
    async fn post_multipart(
        &self,
        url: &Url,
        headers: HeaderMap,
        upload: MultipartUpload,
        progress: Option<ProgressCallback>,
    ) -> Result<HttpResponse> {
        let file = tokio::fs::File::open(&upload.source).await?;
        let total = file.metadata().await?.len();

        let mut sent = 0u64;
        let body = ReaderStream::with_capacity(file, UPLOAD_CHUNK_SIZE).map(move |chunk| {
            let chunk = chunk?;
            sent += chunk.len() as u64;
            if let Some(cb) = &progress {
                cb(TransferProgress {
                    bytes_transferred: sent,
                    total_bytes: Some(total),
                });
            }
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let part = multipart::Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(upload.name.clone())
            .mime_str("application/octet-stream")?;

        let form = multipart::Form::new()
            .text("name", upload.name.clone())
            .text("exists", upload.exists.as_str())
            .part(UPLOAD_FIELD, part);

        debug!("Uploading {} bytes to {}", total, url);
        let response = self
            .http
            .post(url.clone())
            .headers(headers)
            .multipart(form)
            .send()
            .await?;
        Self::collect(response).await
    }

    #[instrument(skip(self, headers, sink, progress), fields(url = %url))]
    async fn download(
        &self,
        url: &Url,
        headers: HeaderMap,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadResponse> {
        let mut response = self.http.get(url.clone()).headers(headers).send().await?;
        let status = response.status().as_u16();

        if !response.status().is_success() {
            let error_body = response.bytes().await?;
            return Ok(DownloadResponse {
                status,
                bytes_written: 0,
                error_body,
            });
        }

        let total = response.content_length();
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let Some(cb) = &progress {
                cb(TransferProgress {
                    bytes_transferred: written,
                    total_bytes: total,
                });
            }
        }
        sink.flush().await?;

        debug!("Downloaded {} bytes from {}", written, url);
        Ok(DownloadResponse {
            status,
            bytes_written: written,
            error_body: Bytes::new(),
        })
    }

    async fn redirect_location(&self, url: &Url, headers: HeaderMap) -> Result<RedirectResponse> {
        debug!("Resolving redirect for {}", url);
        let response = self.no_redirect.get(url.clone()).headers(headers).send().await?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.bytes().await?;
        Ok(RedirectResponse {
            status,
            location,
            body,
        })
    }
}
