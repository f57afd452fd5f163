//! Session credential and endpoint URL construction
//!
//! A [`Credential`] holds everything needed to address the API: the server
//! base URL, the API version tag, the application client id/secret used to
//! sign the token request, and the session state produced by authentication.

use crate::{ClientError, Config, Operation, Result};
use parking_lot::RwLock;
use std::fmt;
use url::Url;

/// Which REST collection an endpoint path is rooted under
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Folders,
    Files,
    Token,
    Shares,
    Trash,
    UserProfile,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folders => "folders",
            Self::Files => "files",
            Self::Token => "oauth2/token",
            Self::Shares => "shares",
            Self::Trash => "trash",
            Self::UserProfile => "user/profile",
        }
    }
}

/// Query parameters for one request.
///
/// Default-valued parameters are never emitted: the server treats the mere
/// presence of `force`, `commit`, `version`, `depth` and `filter` as the
/// trigger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.pairs.push(("operation".to_string(), operation.as_str().to_string()));
        self
    }

    pub fn version(self, version: u64) -> Self {
        self.positive("version", version)
    }

    pub fn depth(self, depth: u32) -> Self {
        self.positive("depth", u64::from(depth))
    }

    pub fn filter(mut self, filter: Option<&str>) -> Self {
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            self.pairs.push(("filter".to_string(), filter.to_string()));
        }
        self
    }

    pub fn force(self, force: bool) -> Self {
        self.flag("force", force)
    }

    pub fn commit(self, commit: bool) -> Self {
        self.flag("commit", commit)
    }

    /// Add `key=value` only when `value` is positive
    pub fn positive(mut self, key: &str, value: u64) -> Self {
        if value > 0 {
            self.pairs.push((key.to_string(), value.to_string()));
        }
        self
    }

    /// Add `key=true` only when `value` is set
    pub fn flag(mut self, key: &str, value: bool) -> Self {
        if value {
            self.pairs.push((key.to_string(), "true".to_string()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// An authenticated session
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub account: String,
    pub access_token: String,
    pub token_type: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("account", &self.account)
            .field("access_token", &mask(&self.access_token))
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Authentication state machine
///
/// `Unauthenticated -> Authenticating -> Authenticated`, with `Failed` as the
/// retryable failure state. Only `Authenticated` holds a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated(Session),
    Failed(String),
}

/// Account identity, session token and server address
pub struct Credential {
    endpoint: Url,
    api_version: String,
    client_id: String,
    client_secret: String,
    state: RwLock<AuthState>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_version", &self.api_version)
            .field("client_id", &self.client_id)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl Credential {
    /// Create an unauthenticated credential from the configuration
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config.validate()?;
        Ok(Self {
            endpoint,
            api_version: config.api_version.trim_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            state: RwLock::new(AuthState::Unauthenticated),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(crate) fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn state(&self) -> AuthState {
        self.state.read().clone()
    }

    /// True when both access token and token type are held
    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.read(), AuthState::Authenticated(_))
    }

    pub fn session(&self) -> Option<Session> {
        match &*self.state.read() {
            AuthState::Authenticated(session) => Some(session.clone()),
            _ => None,
        }
    }

    pub fn account(&self) -> Option<String> {
        self.session().map(|s| s.account)
    }

    pub fn access_token(&self) -> Option<String> {
        self.session().map(|s| s.access_token)
    }

    pub fn token_type(&self) -> Option<String> {
        self.session().map(|s| s.token_type)
    }

    /// `Authorization` header value for data-plane calls
    pub(crate) fn authorization(&self) -> Result<String> {
        match &*self.state.read() {
            AuthState::Authenticated(session) => {
                Ok(format!("{} {}", session.token_type, session.access_token))
            }
            _ => Err(ClientError::not_authenticated()),
        }
    }

    /// Install a previously obtained token
    pub fn set_session(
        &self,
        account: impl Into<String>,
        access_token: impl Into<String>,
        token_type: impl Into<String>,
    ) {
        *self.state.write() = AuthState::Authenticated(Session {
            account: account.into(),
            access_token: access_token.into(),
            token_type: token_type.into(),
        });
    }

    pub(crate) fn begin_authentication(&self) {
        *self.state.write() = AuthState::Authenticating;
    }

    pub(crate) fn fail_authentication(&self, reason: impl Into<String>) {
        *self.state.write() = AuthState::Failed(reason.into());
    }

    /// Drop the session token
    pub fn clear(&self) {
        *self.state.write() = AuthState::Unauthenticated;
    }

    /// URL of a resource collection, e.g. `https://host/v2/oauth2/token`
    pub fn resource_url(&self, kind: ResourceKind) -> Url {
        let mut url = self.endpoint.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}/{}/{}", base, self.api_version, kind.as_str()));
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    /// Build a fully-qualified request URL.
    ///
    /// Each path segment is percent-encoded on its own, `/` separators are
    /// kept, and `None` or `""` addresses the root (`/`).
    pub fn build_url(&self, kind: ResourceKind, path: Option<&str>, query: &Query) -> Result<Url> {
        let encoded = encode_path(path)?;
        Ok(self.finish_url(kind, &encoded, query))
    }

    /// Like [`Credential::build_url`] with exactly one trailing `/meta` segment
    pub fn build_meta_url(
        &self,
        kind: ResourceKind,
        path: Option<&str>,
        query: &Query,
    ) -> Result<Url> {
        let mut encoded = encode_path(path)?;
        if !encoded.ends_with('/') {
            encoded.push('/');
        }
        encoded.push_str("meta");
        Ok(self.finish_url(kind, &encoded, query))
    }

    fn finish_url(&self, kind: ResourceKind, encoded_path: &str, query: &Query) -> Url {
        let mut url = self.resource_url(kind);
        let full = format!("{}{}", url.path(), encoded_path);
        url.set_path(&full);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.pairs().iter());
        }
        url
    }
}

/// Check that `path` has no segment the URL layer would collapse
pub(crate) fn validate_path(path: &str, name: &'static str, position: usize) -> Result<()> {
    if path.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(ClientError::invalid_argument(
            name,
            position,
            format!("path {:?} contains a relative segment", path),
        ));
    }
    Ok(())
}

/// Percent-encode every segment of `path` independently
pub fn encode_path(path: Option<&str>) -> Result<String> {
    let path = match path {
        None | Some("") => return Ok("/".to_string()),
        Some(p) => p,
    };
    validate_path(path, "path", 1)?;

    let relative = path.strip_prefix('/').unwrap_or(path);
    let mut encoded = String::with_capacity(path.len() + 1);
    for segment in relative.split('/') {
        encoded.push('/');
        encoded.push_str(&urlencoding::encode(segment));
    }
    Ok(encoded)
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".into();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
