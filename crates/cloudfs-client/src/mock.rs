//! Recording transport for unit tests

use crate::transport::{
    DownloadResponse, HttpResponse, MultipartUpload, RedirectResponse, Transport,
};
use crate::{FormBody, ProgressCallback, Result, TransferProgress};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub method: &'static str,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub upload: Option<MultipartUpload>,
}

impl RecordedRequest {
    pub fn form(&self) -> FormBody {
        let mut form = FormBody::new();
        if let Some(body) = &self.body {
            for (k, v) in url::form_urlencoded::parse(body.as_bytes()) {
                form.append(k.into_owned(), v.into_owned());
            }
        }
        form
    }
}

#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<VecDeque<RedirectResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: HttpResponse) {
        self.responses.lock().push_back(RedirectResponse {
            status: response.status,
            location: None,
            body: response.body,
        });
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push(HttpResponse::new(status, body.to_string()));
    }

    pub fn push_redirect(&self, status: u16, location: &str) {
        self.responses.lock().push_back(RedirectResponse {
            status,
            location: Some(location.to_string()),
            body: Bytes::new(),
        });
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests.lock().last().cloned().expect("no request recorded")
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn record(
        &self,
        method: &'static str,
        url: &Url,
        headers: HeaderMap,
        body: Option<String>,
        upload: Option<MultipartUpload>,
    ) -> RedirectResponse {
        self.requests.lock().push(RecordedRequest {
            method,
            url: url.clone(),
            headers,
            body,
            upload,
        });
        self.responses
            .lock()
            .pop_front()
            .expect("no response queued for request")
    }
}

fn plain(response: RedirectResponse) -> HttpResponse {
    HttpResponse {
        status: response.status,
        body: response.body,
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &Url, headers: HeaderMap) -> Result<HttpResponse> {
        Ok(plain(self.record("GET", url, headers, None, None)))
    }

    async fn post(&self, url: &Url, headers: HeaderMap, body: String) -> Result<HttpResponse> {
        Ok(plain(self.record("POST", url, headers, Some(body), None)))
    }

    async fn delete(&self, url: &Url, headers: HeaderMap) -> Result<HttpResponse> {
        Ok(plain(self.record("DELETE", url, headers, None, None)))
    }

    async fn post_multipart(
        &self,
        url: &Url,
        headers: HeaderMap,
        upload: MultipartUpload,
        _progress: Option<ProgressCallback>,
    ) -> Result<HttpResponse> {
        Ok(plain(self.record("MULTIPART", url, headers, None, Some(upload))))
    }

    async fn download(
        &self,
        url: &Url,
        headers: HeaderMap,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadResponse> {
        let response = self.record("DOWNLOAD", url, headers, None, None);
        if !(200..300).contains(&response.status) {
            return Ok(DownloadResponse {
                status: response.status,
                bytes_written: 0,
                error_body: response.body,
            });
        }

        sink.write_all(&response.body).await?;
        let written = response.body.len() as u64;
        if let Some(cb) = progress {
            cb(TransferProgress {
                bytes_transferred: written,
                total_bytes: Some(written),
            });
        }
        Ok(DownloadResponse {
            status: response.status,
            bytes_written: written,
            error_body: Bytes::new(),
        })
    }

    async fn redirect_location(&self, url: &Url, headers: HeaderMap) -> Result<RedirectResponse> {
        Ok(self.record("REDIRECT", url, headers, None, None))
    }
}
