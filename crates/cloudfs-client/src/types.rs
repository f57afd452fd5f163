//! Common types for the client SDK

use crate::ClientError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Conflict policy for create, copy, move and upload (`exists` field)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Exists {
    /// Fail if the target already exists
    #[default]
    Fail,
    /// Replace the existing target
    Overwrite,
    /// Let the server pick a new name
    Rename,
}

impl Exists {
    pub const ALL: [Exists; 3] = [Exists::Fail, Exists::Overwrite, Exists::Rename];

    /// Wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Overwrite => "overwrite",
            Self::Rename => "rename",
        }
    }
}

impl FromStr for Exists {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == s)
            .ok_or_else(|| {
                let message = format!("unknown conflict policy {:?}", s);
                ClientError::invalid_argument("exists", 0, message)
            })
    }
}

impl fmt::Display for Exists {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conflict policy for meta alteration (`version-conflict` field)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VersionConflict {
    #[default]
    Fail,
    Overwrite,
    Ignore,
}

impl VersionConflict {
    pub const ALL: [VersionConflict; 3] = [
        VersionConflict::Fail,
        VersionConflict::Overwrite,
        VersionConflict::Ignore,
    ];

    /// Wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Overwrite => "overwrite",
            Self::Ignore => "ignore",
        }
    }
}

impl FromStr for VersionConflict {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == s)
            .ok_or_else(|| {
                ClientError::invalid_argument(
                    "version-conflict",
                    0,
                    format!("unknown version conflict policy {:?}", s),
                )
            })
    }
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a trashed item is put back
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RestoreMethod {
    /// Restore to the original location, failing if it is gone
    Fail,
    /// Recreate the original location under `recreate-path`
    Recreate,
    /// Restore into `rescue-path` if the original location is gone
    Rescue,
}

impl RestoreMethod {
    /// Wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Recreate => "recreate",
            Self::Rescue => "rescue",
        }
    }
}

impl FromStr for RestoreMethod {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(Self::Fail),
            "recreate" => Ok(Self::Recreate),
            "rescue" => Ok(Self::Rescue),
            other => Err(ClientError::invalid_argument(
                "method",
                0,
                format!("unknown restore method {:?}", other),
            )),
        }
    }
}

impl fmt::Display for RestoreMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `operation` query parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Copy,
    Move,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Copy => "copy",
            Self::Move => "move",
        }
    }
}

/// Transfer progress information
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes transferred so far
    pub bytes_transferred: u64,
    /// Total bytes, when the transport knows it
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Get percentage complete
    pub fn percentage(&self) -> Option<f64> {
        let total = self.total_bytes?;
        if total == 0 {
            return Some(100.0);
        }
        Some((self.bytes_transferred as f64 / total as f64) * 100.0)
    }
}

/// Progress callback type. Advisory only.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Ordered `application/x-www-form-urlencoded` body.
///
/// `set` replaces an existing key in place, `append` allows repeated keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormBody {
    pairs: Vec<(String, String)>,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, overwriting any earlier value for the same key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
        self
    }

    /// Add a field without touching earlier values for the same key
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Encode as `k=v&k=v`
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }

    /// Encoded form with the values of `secret_keys` replaced, for logging
    pub(crate) fn redacted(&self, secret_keys: &[&str]) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter().map(|(k, v)| {
                if secret_keys.contains(&k.as_str()) {
                    (k.as_str(), "***")
                } else {
                    (k.as_str(), v.as_str())
                }
            }))
            .finish()
    }
}

/// Version window for [`crate::RestAdapter::file_versions`]. Zero means unset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VersionRange {
    pub start: u64,
    pub stop: u64,
    pub limit: u64,
}

/// Storage quota
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageUsage {
    /// Bytes in use
    #[serde(default)]
    pub usage: u64,
    /// Quota in bytes, if limited
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Account profile returned by `user/profile`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub storage: Option<StorageUsage>,
    /// Everything else the server sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
