//! Remote filesystem items
//!
//! Files, folders and their document/photo/video flavours are one [`Item`]
//! type; [`ItemKind`] only classifies. Items hold a weak handle to the
//! adapter that produced them, so convenience calls such as
//! [`Item::list`] work for as long as the caller keeps the adapter alive.

use crate::client::{AdapterHandle, parent_path};
use crate::{
    ClientError, Exists, ProgressCallback, RestAdapter, RestoreMethod, Result, VersionConflict,
    VersionRange,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::io::AsyncWrite;

/// Classification of a remote item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Folder,
    File,
    Document,
    Photo,
    Video,
}

impl ItemKind {
    /// Classify from the `type` tag, then the category, then the MIME type
    pub fn classify(type_tag: Option<&str>, category: Option<&str>, mime: Option<&str>) -> Self {
        if matches!(type_tag, Some("folder") | Some("root")) {
            return Self::Folder;
        }

        match category.map(|c| c.to_ascii_lowercase()).as_deref() {
            Some("documents" | "document") => return Self::Document,
            Some("photos" | "photo" | "images" | "image") => return Self::Photo,
            Some("videos" | "video") => return Self::Video,
            _ => {}
        }

        let Some(mime) = mime.map(|m| m.to_ascii_lowercase()) else {
            return Self::File;
        };
        if mime.starts_with("image/") {
            Self::Photo
        } else if mime.starts_with("video/") {
            Self::Video
        } else if mime.starts_with("text/")
            || DOCUMENT_MIME_TYPES.iter().any(|d| mime.starts_with(d))
        {
            Self::Document
        } else {
            Self::File
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder)
    }
}

const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/rtf",
    "application/vnd.ms-excel",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument",
    "application/vnd.oasis.opendocument",
];

#[derive(Deserialize)]
struct RawItem {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    type_tag: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    parent_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    size: Option<u64>,
    #[serde(default)]
    mime: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    extension: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    version: Option<u64>,
    #[serde(default, deserialize_with = "timestamp")]
    date_created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp")]
    date_content_last_modified: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp")]
    date_meta_last_modified: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Where an item lives, which decides the endpoints its conveniences use
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ItemOrigin {
    /// The account's own folders and files
    #[default]
    Drive,
    /// The trash; `path` is relative to the trash root
    Trash,
    /// A share; `path` is relative to the share root
    Share { key: String },
}

impl ItemOrigin {
    fn describe(&self) -> String {
        match self {
            Self::Drive => "drive".to_string(),
            Self::Trash => "trash".to_string(),
            Self::Share { key } => format!("share {}", key),
        }
    }
}

/// A file or folder on the server
#[derive(Clone, Debug)]
pub struct Item {
    pub name: String,
    /// Remote path used to address this item, relative to its origin
    pub path: String,
    pub kind: ItemKind,
    /// Raw `type` tag as sent by the server
    pub type_tag: String,
    pub id: Option<String>,
    pub parent_id: Option<String>,
    /// Path of the containing folder, `None` for the root
    pub parent_path: Option<String>,
    pub size: u64,
    pub mime: Option<String>,
    pub extension: Option<String>,
    pub version: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub meta_modified: Option<DateTime<Utc>>,
    /// Fields not modelled above (`application_data` and friends)
    pub extra: Map<String, Value>,
    pub origin: ItemOrigin,
    adapter: AdapterHandle,
}

impl Item {
    /// Build a detached item from a JSON record located under `parent`
    pub fn from_json(value: Value, parent: &str) -> Result<Self> {
        Self::from_child(value, parent, AdapterHandle::default())
    }

    pub(crate) fn from_child(value: Value, parent: &str, adapter: AdapterHandle) -> Result<Self> {
        let raw = parse_raw(value)?;
        let segment = raw.id.clone().unwrap_or_else(|| raw.name.clone());
        let path = join_path(parent, &segment);
        let parent = if parent.is_empty() { "/" } else { parent };
        Ok(Self::build(raw, path, Some(parent.to_string()), adapter))
    }

    pub(crate) fn from_path(value: Value, path: &str, adapter: AdapterHandle) -> Result<Self> {
        let raw = parse_raw(value)?;
        Ok(Self::build(raw, path.to_string(), parent_path(path), adapter))
    }

    pub(crate) fn with_origin(mut self, origin: ItemOrigin) -> Self {
        self.origin = origin;
        self
    }

    fn build(
        raw: RawItem,
        path: String,
        parent_path: Option<String>,
        adapter: AdapterHandle,
    ) -> Self {
        let kind = ItemKind::classify(
            raw.type_tag.as_deref(),
            raw.category.as_deref(),
            raw.mime.as_deref(),
        );
        let mut extra = raw.extra;
        if let Some(category) = raw.category {
            extra.insert("category".to_string(), Value::String(category));
        }

        Self {
            name: raw.name,
            path,
            kind,
            type_tag: raw.type_tag.unwrap_or_else(|| "file".to_string()),
            id: raw.id,
            parent_id: raw.parent_id,
            parent_path,
            size: raw.size.unwrap_or(0),
            mime: raw.mime,
            extension: raw.extension,
            version: raw.version.unwrap_or(0),
            created: raw.date_created,
            modified: raw.date_content_last_modified,
            meta_modified: raw.date_meta_last_modified,
            extra,
            origin: ItemOrigin::Drive,
            adapter,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    pub fn is_file(&self) -> bool {
        !self.is_folder()
    }

    /// The adapter this item came from, if it is still alive
    pub fn adapter(&self) -> Result<RestAdapter> {
        self.adapter.upgrade()
    }

    fn ensure_folder(&self, operation: &str) -> Result<()> {
        if !self.is_folder() {
            return Err(ClientError::invalid_argument(
                "self",
                0,
                format!("{} requires a folder, {} is a file", operation, self.path),
            ));
        }
        Ok(())
    }

    fn ensure_file(&self, operation: &str) -> Result<()> {
        if self.is_folder() {
            return Err(ClientError::invalid_argument(
                "self",
                0,
                format!("{} requires a file, {} is a folder", operation, self.path),
            ));
        }
        Ok(())
    }

    /// Fail unless this item lives in the account's own drive
    fn ensure_drive(&self, operation: &str) -> Result<()> {
        if self.origin != ItemOrigin::Drive {
            return Err(self.unsupported(operation));
        }
        Ok(())
    }

    fn unsupported(&self, operation: &str) -> ClientError {
        ClientError::invalid_argument(
            "self",
            0,
            format!(
                "{} is not available for {} in the {}",
                operation,
                self.path,
                self.origin.describe()
            ),
        )
    }

    /// Re-fetch this item's metadata
    pub async fn refresh(&self) -> Result<Item> {
        self.ensure_drive("refresh")?;
        let adapter = self.adapter()?;
        if self.is_folder() {
            adapter.folder_meta(&self.path).await
        } else {
            adapter.file_meta(&self.path).await
        }
    }

    /// List the children of this folder within its origin.
    ///
    /// Drive folders are listed with `depth` and `filter`; trash and share
    /// folders ignore both.
    pub async fn list(&self, depth: u32, filter: Option<&str>) -> Result<Vec<Item>> {
        self.ensure_folder("list")?;
        let adapter = self.adapter()?;
        match &self.origin {
            ItemOrigin::Drive => adapter.list_folder(Some(&self.path), depth, filter).await,
            ItemOrigin::Trash => adapter.list_trash(Some(&self.path)).await,
            ItemOrigin::Share { key } => adapter.browse_share(key, Some(&self.path)).await,
        }
    }

    /// Delete this item. A trashed item is removed for good; `commit` and
    /// `force` then have no effect.
    pub async fn delete(&self, commit: bool, force: bool) -> Result<bool> {
        let adapter = self.adapter()?;
        match &self.origin {
            ItemOrigin::Drive if self.is_folder() => {
                adapter.delete_folder(&self.path, commit, force).await
            }
            ItemOrigin::Drive => adapter.delete_file(&self.path, commit).await,
            ItemOrigin::Trash => adapter.delete_trash_item(&self.path).await,
            ItemOrigin::Share { .. } => Err(self.unsupported("delete")),
        }
    }

    pub async fn copy_to(&self, destination: &str, exists: Exists) -> Result<Item> {
        self.ensure_drive("copy")?;
        let adapter = self.adapter()?;
        if self.is_folder() {
            adapter.copy_folder(&self.path, destination, None, exists).await
        } else {
            adapter.copy_file(&self.path, destination, None, exists).await
        }
    }

    pub async fn move_to(&self, destination: &str, exists: Exists) -> Result<Item> {
        self.ensure_drive("move")?;
        let adapter = self.adapter()?;
        if self.is_folder() {
            adapter.move_folder(&self.path, destination, None, exists).await
        } else {
            adapter.move_file(&self.path, destination, None, exists).await
        }
    }

    /// Rename in place: a move into the current parent under `name`
    pub async fn rename(&self, name: &str, exists: Exists) -> Result<Item> {
        self.ensure_drive("rename")?;
        let adapter = self.adapter()?;
        let parent = self.parent_path.clone().unwrap_or_else(|| "/".to_string());
        if self.is_folder() {
            adapter.move_folder(&self.path, &parent, Some(name), exists).await
        } else {
            adapter.move_file(&self.path, &parent, Some(name), exists).await
        }
    }

    pub async fn alter_meta(
        &self,
        attributes: &BTreeMap<String, String>,
        conflict: VersionConflict,
    ) -> Result<Item> {
        self.ensure_drive("alter_meta")?;
        let adapter = self.adapter()?;
        if self.is_folder() {
            adapter.alter_folder_meta(&self.path, attributes, conflict).await
        } else {
            adapter.alter_file_meta(&self.path, attributes, conflict).await
        }
    }

    /// Stream this file's content into `sink`
    pub async fn download(
        &self,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: Option<ProgressCallback>,
    ) -> Result<u64> {
        self.ensure_file("download")?;
        self.ensure_drive("download")?;
        self.adapter()?.download_file(&self.path, sink, progress).await
    }

    /// Upload a local file into this folder
    pub async fn upload(
        &self,
        name: &str,
        source: &Path,
        exists: Exists,
        progress: Option<ProgressCallback>,
    ) -> Result<Item> {
        self.ensure_folder("upload")?;
        self.ensure_drive("upload")?;
        self.adapter()?
            .upload_file(&self.path, name, source, exists, progress)
            .await
    }

    pub async fn versions(&self, range: VersionRange) -> Result<Vec<Item>> {
        self.ensure_file("versions")?;
        self.ensure_drive("versions")?;
        self.adapter()?.file_versions(&self.path, range).await
    }

    /// Restore this item out of the trash
    pub async fn restore(
        &self,
        destination: Option<&str>,
        method: RestoreMethod,
    ) -> Result<bool> {
        if self.origin != ItemOrigin::Trash {
            return Err(self.unsupported("restore"));
        }
        self.adapter()?.restore(&self.path, destination, method).await
    }
}

fn parse_raw(value: Value) -> Result<RawItem> {
    serde_json::from_value(value)
        .map_err(|e| ClientError::InvalidResponse(format!("malformed item: {}", e)))
}

fn join_path(parent: &str, segment: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, segment)
    } else {
        format!("{}/{}", parent, segment)
    }
}

pub(crate) fn lenient_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

/// Seconds or milliseconds since the epoch, or an RFC 3339 string
pub(crate) fn timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64().and_then(from_epoch),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<f64>().ok().and_then(from_epoch)),
        _ => None,
    })
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    let millis = if value.abs() > 1e11 { value } else { value * 1000.0 };
    DateTime::from_timestamp_millis(millis as i64)
}
