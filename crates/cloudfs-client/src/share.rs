//! Share operations

use crate::client::{AdapterHandle, require_non_empty};
use crate::credential::validate_path;
use crate::response::{expect_items, expect_list, expect_share, expect_success};
use crate::{
    ClientError, Exists, FormBody, Item, ItemOrigin, Query, ResourceKind, RestAdapter, Result,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::instrument;

#[derive(Deserialize)]
struct RawShare {
    share_key: String,
    #[serde(default, alias = "share_name")]
    name: Option<String>,
    #[serde(default)]
    share_type: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    short_url: Option<String>,
    #[serde(default, alias = "share_size", deserialize_with = "crate::item::lenient_u64")]
    size: Option<u64>,
    #[serde(default, deserialize_with = "crate::item::timestamp")]
    date_created: Option<DateTime<Utc>>,
    #[serde(default, alias = "is_password_protected")]
    password_protected: bool,
    #[serde(default)]
    paths: Vec<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// A share link on the server
#[derive(Clone, Debug)]
pub struct Share {
    pub key: String,
    pub name: Option<String>,
    pub share_type: Option<String>,
    /// Paths included in the share
    pub paths: Vec<String>,
    pub url: Option<String>,
    pub short_url: Option<String>,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub password_protected: bool,
    pub extra: Map<String, Value>,
    adapter: AdapterHandle,
}

impl Share {
    /// Build a detached share from a JSON record
    pub fn from_json(value: Value) -> Result<Self> {
        Self::from_value(value, Vec::new(), AdapterHandle::default())
    }

    pub(crate) fn from_value(
        value: Value,
        paths: Vec<String>,
        adapter: AdapterHandle,
    ) -> Result<Self> {
        let raw: RawShare = serde_json::from_value(value)
            .map_err(|e| ClientError::InvalidResponse(format!("malformed share: {}", e)))?;

        Ok(Self {
            key: raw.share_key,
            name: raw.name,
            share_type: raw.share_type,
            paths: if raw.paths.is_empty() { paths } else { raw.paths },
            url: raw.url,
            short_url: raw.short_url,
            size: raw.size.unwrap_or(0),
            created: raw.date_created,
            password_protected: raw.password_protected,
            extra: raw.extra,
            adapter,
        })
    }

    pub fn adapter(&self) -> Result<RestAdapter> {
        self.adapter.upgrade()
    }

    /// List the contents of this share at `path`
    pub async fn browse(&self, path: Option<&str>) -> Result<Vec<Item>> {
        self.adapter()?.browse_share(&self.key, path).await
    }

    pub async fn unlock(&self, password: &str) -> Result<bool> {
        self.adapter()?.unlock_share(&self.key, password).await
    }

    pub async fn alter(
        &self,
        current_password: Option<&str>,
        attributes: &BTreeMap<String, String>,
    ) -> Result<Share> {
        self.adapter()?
            .alter_share(&self.key, current_password, attributes)
            .await
    }

    pub async fn delete(&self) -> Result<bool> {
        self.adapter()?.delete_share(&self.key).await
    }

    /// Copy the shared content into `destination`
    pub async fn receive(&self, destination: &str, exists: Exists) -> Result<Vec<Item>> {
        self.adapter()?
            .receive_share(&self.key, destination, exists)
            .await
    }
}

fn require_share_key(key: &str, position: usize) -> Result<()> {
    require_non_empty(key, "share_key", position)?;
    if key.contains('/') || key == "." || key == ".." {
        return Err(ClientError::invalid_argument(
            "share_key",
            position,
            format!("{:?} is not a share key", key),
        ));
    }
    Ok(())
}

impl RestAdapter {
    /// Share one or more paths, optionally behind a password
    #[instrument(skip(self, paths, password))]
    pub async fn create_share<I, S>(&self, paths: I, password: Option<&str>) -> Result<Share>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths: Vec<String> = paths.into_iter().map(|p| p.as_ref().to_string()).collect();
        if paths.is_empty() {
            return Err(ClientError::invalid_argument("paths", 1, "at least one path is required"));
        }
        for path in &paths {
            require_non_empty(path, "paths", 1)?;
            validate_path(path, "paths", 1)?;
        }

        let url = self.credential().build_url(ResourceKind::Shares, None, &Query::new())?;

        let mut form = FormBody::new();
        for path in &paths {
            form.append("path", path.as_str());
        }
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            form.set("password", password);
        }

        let result = self.send_form(url, &form).await?;
        Share::from_value(expect_share(result)?, paths, self.handle())
    }

    /// List the shares owned by the account
    #[instrument(skip(self))]
    pub async fn list_shares(&self) -> Result<Vec<Share>> {
        let url = self.credential().build_url(ResourceKind::Shares, None, &Query::new())?;
        let result = self.send_get(url).await?;
        expect_list(result)?
            .into_iter()
            .map(|value| Share::from_value(value, Vec::new(), self.handle()))
            .collect()
    }

    /// List the contents of a share at `path` (`None` for its root)
    #[instrument(skip(self))]
    pub async fn browse_share(&self, key: &str, path: Option<&str>) -> Result<Vec<Item>> {
        require_share_key(key, 1)?;
        let inner = path.filter(|p| !p.is_empty()).unwrap_or("/");
        validate_path(inner, "path", 2)?;

        let share_path = format!("/{}/{}", key, inner.trim_start_matches('/'));
        let url = self
            .credential()
            .build_meta_url(ResourceKind::Shares, Some(&share_path), &Query::new())?;
        let result = self.send_get(url).await?;
        let origin = ItemOrigin::Share {
            key: key.to_string(),
        };
        self.items_in(expect_items(result)?, inner, origin)
    }

    /// Unlock a password-protected share for this session
    #[instrument(skip(self, password))]
    pub async fn unlock_share(&self, key: &str, password: &str) -> Result<bool> {
        require_share_key(key, 1)?;
        require_non_empty(password, "password", 2)?;

        let url = self.credential().build_url(
            ResourceKind::Shares,
            Some(&format!("/{}/unlock", key)),
            &Query::new(),
        )?;

        let mut form = FormBody::new();
        form.set("password", password);

        let result = self.send_form(url, &form).await?;
        expect_success(&result)
    }

    /// Change share attributes.
    ///
    /// `current_password` is placed first; a caller attribute with the same
    /// key replaces it.
    #[instrument(skip(self, current_password, attributes))]
    pub async fn alter_share(
        &self,
        key: &str,
        current_password: Option<&str>,
        attributes: &BTreeMap<String, String>,
    ) -> Result<Share> {
        require_share_key(key, 1)?;

        let url = self.credential().build_url(
            ResourceKind::Shares,
            Some(&format!("/{}/info", key)),
            &Query::new(),
        )?;

        let mut form = FormBody::new();
        if let Some(password) = current_password {
            form.set("current_password", password);
        }
        for (field, value) in attributes {
            form.set(field.as_str(), value.as_str());
        }

        let result = self.send_form(url, &form).await?;
        Share::from_value(expect_share(result)?, Vec::new(), self.handle())
    }

    #[instrument(skip(self))]
    pub async fn delete_share(&self, key: &str) -> Result<bool> {
        require_share_key(key, 1)?;
        let url = self.credential().build_url(
            ResourceKind::Shares,
            Some(&format!("/{}/", key)),
            &Query::new(),
        )?;
        let result = self.send_delete(url).await?;
        expect_success(&result)
    }

    /// Copy the contents of a share into `destination`
    #[instrument(skip(self))]
    pub async fn receive_share(
        &self,
        key: &str,
        destination: &str,
        exists: Exists,
    ) -> Result<Vec<Item>> {
        require_share_key(key, 1)?;
        require_non_empty(destination, "destination", 2)?;
        validate_path(destination, "destination", 2)?;

        let url = self.credential().build_url(
            ResourceKind::Shares,
            Some(&format!("/{}/", key)),
            &Query::new(),
        )?;

        let mut form = FormBody::new();
        form.set("path", destination).set("exists", exists.as_str());

        let result = self.send_form(url, &form).await?;
        self.items_under(expect_list(result)?, destination)
    }
}
