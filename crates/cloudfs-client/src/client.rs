//! REST adapter: authentication, folder and file operations

use crate::{
    ClientError, Config, Credential, Exists, FormBody, Item, ItemOrigin, ProgressCallback, Query,
    ResourceKind, Result, UserProfile, VersionConflict, VersionRange,
    credential::validate_path,
    response::{
        check_status, expect_first_item, expect_items, expect_list, expect_meta, expect_success,
        parse_envelope, parse_json,
    },
    signing::{
        FORM_CONTENT_TYPE, HmacSha1Signer, RequestSigner, authorization_header, canonical_string,
        http_date,
    },
    transport::{HttpResponse, MultipartUpload, ReqwestTransport, Transport},
    types::Operation,
};
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, DATE, HeaderMap, HeaderValue};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};
use tokio::io::AsyncWrite;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Log target for request/response dumps enabled by `Config::debug`
const WIRE_TARGET: &str = "cloudfs_client::wire";

pub(crate) struct Inner {
    credential: Credential,
    transport: Arc<dyn Transport>,
    signer: Arc<dyn RequestSigner>,
    debug: bool,
}

/// CloudFS REST adapter
///
/// A cheap, cloneable handle. Every operation issues exactly one HTTP
/// request; nothing is retried or cached. Items and shares returned by the
/// adapter keep only a weak reference back to it.
#[derive(Clone)]
pub struct RestAdapter {
    inner: Arc<Inner>,
}

impl fmt::Debug for RestAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestAdapter")
            .field("credential", &self.inner.credential)
            .field("debug", &self.inner.debug)
            .finish()
    }
}

/// Non-owning reference from an item or share back to its adapter
#[derive(Clone, Debug, Default)]
pub(crate) struct AdapterHandle(Weak<Inner>);

impl AdapterHandle {
    pub(crate) fn upgrade(&self) -> Result<RestAdapter> {
        self.0
            .upgrade()
            .map(|inner| RestAdapter { inner })
            .ok_or(ClientError::Detached)
    }
}

#[derive(Clone, Copy, Debug)]
enum Verb {
    Get,
    Post,
    Delete,
}

impl Verb {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl RestAdapter {
    /// Create an adapter using the default `reqwest` transport
    pub fn new(config: Config) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Create an adapter over a caller-supplied transport
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::with_parts(config, transport, Arc::new(HmacSha1Signer))
    }

    /// Create an adapter with a caller-supplied transport and signer
    pub fn with_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        signer: Arc<dyn RequestSigner>,
    ) -> Result<Self> {
        let credential = Credential::new(&config)?;
        Ok(Self {
            inner: Arc::new(Inner {
                credential,
                transport,
                signer,
                debug: config.debug,
            }),
        })
    }

    /// Get the session credential
    pub fn credential(&self) -> &Credential {
        &self.inner.credential
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.credential.is_authenticated()
    }

    pub(crate) fn handle(&self) -> AdapterHandle {
        AdapterHandle(Arc::downgrade(&self.inner))
    }

    // ==================== Authentication ====================

    /// Obtain an access token with a signed password grant.
    ///
    /// A no-op when a token is already held. Any failure, transport or API,
    /// is reported as [`ClientError::Authentication`] and leaves the
    /// credential without a token.
    ///
    /// Arguments are validated before the held-token shortcut, so an empty
    /// username or password fails with [`ClientError::InvalidArgument`] even
    /// on an authenticated adapter.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        require_non_empty(username, "username", 1)?;
        require_non_empty(password, "password", 2)?;

        let credential = &self.inner.credential;
        if credential.is_authenticated() {
            debug!("Token already held, skipping token request");
            return Ok(());
        }

        credential.begin_authentication();
        match self.request_token(username, password).await {
            Ok((access_token, token_type)) => {
                credential.set_session(username, access_token, token_type);
                info!("Authenticated as {}", username);
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                warn!("Authentication failed: {}", reason);
                credential.fail_authentication(reason.clone());
                Err(ClientError::Authentication {
                    reason,
                    source: Some(Box::new(err)),
                })
            }
        }
    }

    /// Drop the session token
    pub fn sign_out(&self) {
        self.inner.credential.clear();
        info!("Signed out");
    }

    async fn request_token(&self, username: &str, password: &str) -> Result<(String, String)> {
        let credential = &self.inner.credential;
        let url = credential.resource_url(ResourceKind::Token);

        let mut form = FormBody::new();
        form.set("grant_type", "password")
            .set("username", username)
            .set("password", password);

        let date = http_date(Utc::now());
        let canonical =
            canonical_string("POST", url.path(), form.pairs(), FORM_CONTENT_TYPE, &date);
        let signature = self.inner.signer.sign(credential.client_secret(), &canonical)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        headers.insert(DATE, header_value(&date)?);
        headers.insert(
            AUTHORIZATION,
            header_value(&authorization_header(credential.client_id(), &signature))?,
        );

        self.dump_request(Verb::Post, &url, Some(&form.redacted(&["password"])));
        let response = self.inner.transport.post(&url, headers, form.encode()).await?;
        self.dump_response(&response);

        let body = parse_json(response.status, &response.body)?;
        if let Some(err) = ClientError::from_envelope(&body, response.status) {
            return Err(err);
        }

        token_fields(&body)
            .or_else(|| body.get("result").and_then(token_fields))
            .ok_or_else(|| {
                if response.status >= 400 {
                    ClientError::Api {
                        status: response.status,
                        code: format!("HTTP{}", response.status),
                        message: String::from_utf8_lossy(&response.body).into_owned(),
                    }
                } else {
                    ClientError::InvalidResponse(
                        "token response lacks access_token or token_type".to_string(),
                    )
                }
            })
    }

    // ==================== Folder Operations ====================

    /// List the children of a folder (`None` lists the root)
    #[instrument(skip(self))]
    pub async fn list_folder(
        &self,
        path: Option<&str>,
        depth: u32,
        filter: Option<&str>,
    ) -> Result<Vec<Item>> {
        if let Some(p) = path {
            validate_path(p, "path", 1)?;
        }
        let query = Query::new().depth(depth).filter(filter);
        let url = self.credential().build_url(ResourceKind::Folders, path, &query)?;
        let result = self.send(Verb::Get, url, None).await?;

        let parent = path.filter(|p| !p.is_empty()).unwrap_or("/");
        self.items_under(expect_items(result)?, parent)
    }

    /// Fetch folder metadata
    #[instrument(skip(self))]
    pub async fn folder_meta(&self, path: &str) -> Result<Item> {
        self.meta(ResourceKind::Folders, path, 0).await
    }

    /// Create a folder named `name` under `parent`
    #[instrument(skip(self))]
    pub async fn create_folder(&self, parent: &str, name: &str, exists: Exists) -> Result<Item> {
        validate_path(parent, "parent", 1)?;
        require_non_empty(name, "name", 2)?;

        let query = Query::new().operation(Operation::Create);
        let url = self.credential().build_url(ResourceKind::Folders, Some(parent), &query)?;

        let mut form = FormBody::new();
        form.set("name", name).set("exists", exists.as_str());

        let result = self.send(Verb::Post, url, Some(&form)).await?;
        Item::from_child(expect_first_item(result)?, parent, self.handle())
    }

    /// Delete a folder. `commit` skips the trash, `force` removes non-empty folders.
    #[instrument(skip(self))]
    pub async fn delete_folder(&self, path: &str, commit: bool, force: bool) -> Result<bool> {
        validate_path(path, "path", 1)?;
        let query = Query::new().commit(commit).force(force);
        let url = self.credential().build_url(ResourceKind::Folders, Some(path), &query)?;
        let result = self.send(Verb::Delete, url, None).await?;
        expect_success(&result)
    }

    /// Copy a folder into `destination`, optionally under a new name
    #[instrument(skip(self))]
    pub async fn copy_folder(
        &self,
        path: &str,
        destination: &str,
        name: Option<&str>,
        exists: Exists,
    ) -> Result<Item> {
        self.transfer(ResourceKind::Folders, Operation::Copy, path, destination, name, exists)
            .await
    }

    /// Move a folder into `destination`, optionally under a new name
    #[instrument(skip(self))]
    pub async fn move_folder(
        &self,
        path: &str,
        destination: &str,
        name: Option<&str>,
        exists: Exists,
    ) -> Result<Item> {
        self.transfer(ResourceKind::Folders, Operation::Move, path, destination, name, exists)
            .await
    }

    /// Change folder attributes
    #[instrument(skip(self, attributes))]
    pub async fn alter_folder_meta(
        &self,
        path: &str,
        attributes: &BTreeMap<String, String>,
        conflict: VersionConflict,
    ) -> Result<Item> {
        self.alter_meta(ResourceKind::Folders, path, attributes, conflict)
            .await
    }

    // ==================== File Operations ====================

    /// Fetch file metadata
    #[instrument(skip(self))]
    pub async fn file_meta(&self, path: &str) -> Result<Item> {
        self.meta(ResourceKind::Files, path, 0).await
    }

    /// Fetch the metadata of one version of a file (`0` is the current one)
    #[instrument(skip(self))]
    pub async fn file_version(&self, path: &str, version: u64) -> Result<Item> {
        self.meta(ResourceKind::Files, path, version).await
    }

    /// List the stored versions of a file
    #[instrument(skip(self))]
    pub async fn file_versions(&self, path: &str, range: VersionRange) -> Result<Vec<Item>> {
        require_non_empty(path, "path", 1)?;
        validate_path(path, "path", 1)?;

        let query = Query::new()
            .positive("start-version", range.start)
            .positive("stop-version", range.stop)
            .positive("limit", range.limit);
        let versions_path = format!("{}/versions", path.trim_end_matches('/'));
        let url = self
            .credential()
            .build_url(ResourceKind::Files, Some(&versions_path), &query)?;
        let result = self.send(Verb::Get, url, None).await?;

        let parent = parent_path(path).unwrap_or_else(|| "/".to_string());
        expect_list(result)?
            .into_iter()
            .map(|value| Item::from_child(value, &parent, self.handle()))
            .collect()
    }

    /// Delete a file. `commit` skips the trash.
    #[instrument(skip(self))]
    pub async fn delete_file(&self, path: &str, commit: bool) -> Result<bool> {
        require_non_empty(path, "path", 1)?;
        validate_path(path, "path", 1)?;
        let query = Query::new().commit(commit);
        let url = self.credential().build_url(ResourceKind::Files, Some(path), &query)?;
        let result = self.send(Verb::Delete, url, None).await?;
        expect_success(&result)
    }

    /// Copy a file into `destination`, optionally under a new name
    #[instrument(skip(self))]
    pub async fn copy_file(
        &self,
        path: &str,
        destination: &str,
        name: Option<&str>,
        exists: Exists,
    ) -> Result<Item> {
        self.transfer(ResourceKind::Files, Operation::Copy, path, destination, name, exists)
            .await
    }

    /// Move a file into `destination`, optionally under a new name
    #[instrument(skip(self))]
    pub async fn move_file(
        &self,
        path: &str,
        destination: &str,
        name: Option<&str>,
        exists: Exists,
    ) -> Result<Item> {
        self.transfer(ResourceKind::Files, Operation::Move, path, destination, name, exists)
            .await
    }

    /// Change file attributes
    #[instrument(skip(self, attributes))]
    pub async fn alter_file_meta(
        &self,
        path: &str,
        attributes: &BTreeMap<String, String>,
        conflict: VersionConflict,
    ) -> Result<Item> {
        self.alter_meta(ResourceKind::Files, path, attributes, conflict)
            .await
    }

    /// Stream a file's content into `sink`, returning the byte count
    #[instrument(skip(self, sink, progress))]
    pub async fn download_file(
        &self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: Option<ProgressCallback>,
    ) -> Result<u64> {
        require_non_empty(path, "path", 1)?;
        validate_path(path, "path", 1)?;

        let url = self.credential().build_url(ResourceKind::Files, Some(path), &Query::new())?;
        let headers = self.data_headers(false)?;

        self.dump_request(Verb::Get, &url, None);
        let response = self
            .inner
            .transport
            .download(&url, headers, sink, progress)
            .await?;
        check_status(response.status, &response.error_body)?;

        if !(200..300).contains(&response.status) {
            return Err(unexpected_status(response.status, &response.error_body));
        }

        debug!("Downloaded {} bytes from {}", response.bytes_written, path);
        Ok(response.bytes_written)
    }

    /// Resolve the direct download location of a file without fetching it
    #[instrument(skip(self))]
    pub async fn download_location(&self, path: &str) -> Result<String> {
        require_non_empty(path, "path", 1)?;
        validate_path(path, "path", 1)?;

        let url = self.credential().build_url(ResourceKind::Files, Some(path), &Query::new())?;
        let headers = self.data_headers(false)?;

        self.dump_request(Verb::Get, &url, None);
        let response = self.inner.transport.redirect_location(&url, headers).await?;
        check_status(response.status, &response.body)?;

        match response.location {
            Some(location) if (300..400).contains(&response.status) => Ok(location),
            _ if response.status >= 400 => Err(unexpected_status(response.status, &response.body)),
            _ => Err(ClientError::InvalidResponse(format!(
                "expected a redirect, got status {}",
                response.status
            ))),
        }
    }

    /// Upload a local file into `parent` as `name`
    #[instrument(skip(self, progress))]
    pub async fn upload_file(
        &self,
        parent: &str,
        name: &str,
        source: &Path,
        exists: Exists,
        progress: Option<ProgressCallback>,
    ) -> Result<Item> {
        require_non_empty(parent, "parent", 1)?;
        validate_path(parent, "parent", 1)?;
        require_non_empty(name, "name", 2)?;
        if source.as_os_str().is_empty() {
            return Err(ClientError::invalid_argument("source", 3, "must not be empty"));
        }

        let mut folder = parent.to_string();
        if !folder.ends_with('/') {
            folder.push('/');
        }
        let url = self.credential().build_url(ResourceKind::Files, Some(&folder), &Query::new())?;
        let headers = self.data_headers(false)?;

        let upload = MultipartUpload {
            name: name.to_string(),
            source: source.to_path_buf(),
            exists,
        };

        self.dump_request(
            Verb::Post,
            &url,
            Some(&format!("multipart name={} exists={}", name, exists)),
        );
        let response = self
            .inner
            .transport
            .post_multipart(&url, headers, upload, progress)
            .await?;
        self.dump_response(&response);

        let result = parse_envelope(response.status, &response.body)?;
        Item::from_child(expect_first_item(result)?, parent, self.handle())
    }

    // ==================== Account ====================

    /// Fetch the profile of the signed-in account
    #[instrument(skip(self))]
    pub async fn user_profile(&self) -> Result<UserProfile> {
        let url = self
            .credential()
            .build_url(ResourceKind::UserProfile, None, &Query::new())?;
        let result = self.send(Verb::Get, url, None).await?;
        serde_json::from_value(result)
            .map_err(|e| ClientError::InvalidResponse(format!("malformed profile: {}", e)))
    }

    // ==================== Helper Methods ====================

    async fn meta(&self, kind: ResourceKind, path: &str, version: u64) -> Result<Item> {
        validate_path(path, "path", 1)?;
        let query = Query::new().version(version);
        let url = self.credential().build_meta_url(kind, Some(path), &query)?;
        let result = self.send(Verb::Get, url, None).await?;
        let at = if path.is_empty() { "/" } else { path };
        Item::from_path(expect_meta(result)?, at, self.handle())
    }

    async fn transfer(
        &self,
        kind: ResourceKind,
        operation: Operation,
        path: &str,
        destination: &str,
        name: Option<&str>,
        exists: Exists,
    ) -> Result<Item> {
        require_non_empty(path, "path", 1)?;
        validate_path(path, "path", 1)?;
        validate_path(destination, "destination", 2)?;
        if let Some(name) = name {
            require_non_empty(name, "name", 3)?;
        }

        let query = Query::new().operation(operation);
        let url = self.credential().build_url(kind, Some(path), &query)?;

        let mut form = FormBody::new();
        form.set("to", destination);
        if let Some(name) = name {
            form.set("name", name);
        }
        form.set("exists", exists.as_str());

        let result = self.send(Verb::Post, url, Some(&form)).await?;
        let parent = if destination.is_empty() { "/" } else { destination };
        Item::from_child(expect_first_item(result)?, parent, self.handle())
    }

    async fn alter_meta(
        &self,
        kind: ResourceKind,
        path: &str,
        attributes: &BTreeMap<String, String>,
        conflict: VersionConflict,
    ) -> Result<Item> {
        require_non_empty(path, "path", 1)?;
        validate_path(path, "path", 1)?;

        let url = self.credential().build_meta_url(kind, Some(path), &Query::new())?;

        let mut form = FormBody::new();
        for (key, value) in attributes {
            form.set(key.as_str(), value.as_str());
        }
        form.set("version-conflict", conflict.as_str());

        let result = self.send(Verb::Post, url, Some(&form)).await?;
        Item::from_path(expect_meta(result)?, path, self.handle())
    }

    pub(crate) fn items_under(&self, values: Vec<Value>, parent: &str) -> Result<Vec<Item>> {
        self.items_in(values, parent, ItemOrigin::Drive)
    }

    pub(crate) fn items_in(
        &self,
        values: Vec<Value>,
        parent: &str,
        origin: ItemOrigin,
    ) -> Result<Vec<Item>> {
        values
            .into_iter()
            .map(|value| {
                Item::from_child(value, parent, self.handle())
                    .map(|item| item.with_origin(origin.clone()))
            })
            .collect()
    }

    /// Issue one JSON request and return the envelope's `result`
    async fn send(&self, verb: Verb, url: Url, form: Option<&FormBody>) -> Result<Value> {
        let headers = self.data_headers(form.is_some())?;
        self.dump_request(verb, &url, form.map(|f| f.redacted(SECRET_FIELDS)).as_deref());

        let transport = &self.inner.transport;
        let response = match verb {
            Verb::Get => transport.get(&url, headers).await,
            Verb::Delete => transport.delete(&url, headers).await,
            Verb::Post => {
                let body = form.map(FormBody::encode).unwrap_or_default();
                transport.post(&url, headers, body).await
            }
        }
        .inspect_err(|e| warn!("{} {} failed: {}", verb.as_str(), url, e))?;

        self.dump_response(&response);
        parse_envelope(response.status, &response.body)
    }

    pub(crate) async fn send_get(&self, url: Url) -> Result<Value> {
        self.send(Verb::Get, url, None).await
    }

    pub(crate) async fn send_form(&self, url: Url, form: &FormBody) -> Result<Value> {
        self.send(Verb::Post, url, Some(form)).await
    }

    pub(crate) async fn send_delete(&self, url: Url) -> Result<Value> {
        self.send(Verb::Delete, url, None).await
    }

    fn data_headers(&self, form: bool) -> Result<HeaderMap> {
        let authorization = self.inner.credential.authorization()?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&authorization)?);
        headers.insert(DATE, header_value(&http_date(Utc::now()))?);
        if form {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        }
        Ok(headers)
    }

    fn dump_request(&self, verb: Verb, url: &Url, body: Option<&str>) {
        if self.inner.debug {
            debug!(target: WIRE_TARGET, "--> {} {} {}", verb.as_str(), url, body.unwrap_or(""));
        }
    }

    fn dump_response(&self, response: &HttpResponse) {
        if self.inner.debug {
            debug!(
                target: WIRE_TARGET,
                "<-- {} {}",
                response.status,
                String::from_utf8_lossy(&response.body)
            );
        }
    }
}

/// Form fields never written to the log
const SECRET_FIELDS: &[&str] = &["password", "current_password"];

pub(crate) fn require_non_empty(value: &str, name: &'static str, position: usize) -> Result<()> {
    if value.is_empty() {
        return Err(ClientError::invalid_argument(name, position, "must not be empty"));
    }
    Ok(())
}

/// Parent of a remote path, `None` for the root
pub(crate) fn parent_path(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rsplit_once('/') {
        Some(("", _)) | None => Some("/".to_string()),
        Some((head, _)) => Some(head.to_string()),
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ClientError::Config(format!("invalid header value: {}", e)))
}

fn token_fields(value: &Value) -> Option<(String, String)> {
    let token = value.get("access_token")?.as_str()?;
    let token_type = value.get("token_type")?.as_str()?;
    if token.is_empty() || token_type.is_empty() {
        return None;
    }
    Some((token.to_string(), token_type.to_string()))
}

fn unexpected_status(status: u16, body: &[u8]) -> ClientError {
    match parse_envelope(status, body) {
        Err(err) => err,
        Ok(_) => ClientError::Api {
            status,
            code: format!("HTTP{}", status),
            message: "unexpected status".to_string(),
        },
    }
}
