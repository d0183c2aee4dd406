//! Repository, blob type, and blob key types.
//!
//! A repository maps to one backend bucket. Inside the bucket every object
//! lives under `<type>/<name>`, except the singular `config` object.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a blob name (hex-encoded SHA-256).
pub const BLOB_NAME_LEN: usize = 64;

/// In-bucket key of the repository config object.
pub const CONFIG_KEY: &str = "config";

/// Repository name (one path segment, usable as a bucket name).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryName(String);

impl RepositoryName {
    /// Minimum repository name length.
    pub const MIN_LEN: usize = 3;
    /// Maximum repository name length.
    pub const MAX_LEN: usize = 63;

    /// Validate and wrap a repository name.
    ///
    /// Names follow bucket naming rules: lowercase letters, digits, `.` and
    /// `-`, starting and ending with a letter or digit. A valid name can
    /// never contain `/`.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.len() < Self::MIN_LEN || name.len() > Self::MAX_LEN {
            return Err(crate::Error::InvalidRepository(format!(
                "repository name must be {}-{} characters, got {}",
                Self::MIN_LEN,
                Self::MAX_LEN,
                name.len()
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return Err(crate::Error::InvalidRepository(format!(
                "invalid character in repository name: {c:?}"
            )));
        }
        let bytes = name.as_bytes();
        if !bytes[0].is_ascii_alphanumeric() || !bytes[bytes.len() - 1].is_ascii_alphanumeric() {
            return Err(crate::Error::InvalidRepository(
                "repository name must start and end with a letter or digit".to_string(),
            ));
        }
        if name.contains("..") {
            return Err(crate::Error::InvalidRepository(
                "repository name must not contain '..'".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Get the repository name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepositoryName {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<RepositoryName> for String {
    fn from(value: RepositoryName) -> Self {
        value.0
    }
}

impl FromStr for RepositoryName {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::new(s)
    }
}

impl fmt::Debug for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepositoryName({self})")
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Enumerable restic object types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobType {
    Data,
    Index,
    Keys,
    Locks,
    Snapshots,
}

impl BlobType {
    pub const ALL: [BlobType; 5] = [
        BlobType::Data,
        BlobType::Index,
        BlobType::Keys,
        BlobType::Locks,
        BlobType::Snapshots,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlobType::Data => "data",
            BlobType::Index => "index",
            BlobType::Keys => "keys",
            BlobType::Locks => "locks",
            BlobType::Snapshots => "snapshots",
        }
    }

    /// Locks stay deletable under write-once credentials.
    pub fn is_lock(self) -> bool {
        self == BlobType::Locks
    }

    /// Listing prefix inside the repository bucket, e.g. `data/`.
    pub fn list_prefix(self) -> String {
        format!("{}/", self.as_str())
    }

    /// Recover a blob name from an in-bucket key returned by a prefix listing.
    pub fn strip_prefix(self, key: &str) -> Option<&str> {
        key.strip_prefix(self.as_str())?.strip_prefix('/')
    }
}

impl FromStr for BlobType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "data" => Ok(BlobType::Data),
            "index" => Ok(BlobType::Index),
            "keys" => Ok(BlobType::Keys),
            "locks" => Ok(BlobType::Locks),
            "snapshots" => Ok(BlobType::Snapshots),
            other => Err(crate::Error::InvalidBlobType(other.to_string())),
        }
    }
}

impl fmt::Display for BlobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content-addressed blob name: 64 lowercase hex characters.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobName(String);

impl BlobName {
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.len() != BLOB_NAME_LEN {
            return Err(crate::Error::InvalidBlobName(format!(
                "blob name must be {BLOB_NAME_LEN} chars, got {}",
                name.len()
            )));
        }
        if let Some(c) = name.chars().find(|c| !matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(crate::Error::InvalidBlobName(format!(
                "invalid character in blob name: {c:?}"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BlobName {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<BlobName> for String {
    fn from(value: BlobName) -> Self {
        value.0
    }
}

impl FromStr for BlobName {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::new(s)
    }
}

impl fmt::Debug for BlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobName({self})")
    }
}

impl fmt::Display for BlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a key addresses inside a repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Config,
    Blob { blob_type: BlobType, name: BlobName },
}

/// Fully qualified object address: repository plus object kind.
///
/// `Display` renders the logical key (`repo/type/name` or `repo/config`);
/// [`BlobKey::object_key`] renders the key inside the repository bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlobKey {
    repository: RepositoryName,
    kind: ObjectKind,
}

impl BlobKey {
    /// Key of the repository config object.
    pub fn config(repository: RepositoryName) -> Self {
        Self {
            repository,
            kind: ObjectKind::Config,
        }
    }

    /// Key of a blob.
    pub fn blob(repository: RepositoryName, blob_type: BlobType, name: BlobName) -> Self {
        Self {
            repository,
            kind: ObjectKind::Blob { blob_type, name },
        }
    }

    /// Parse a blob key from raw path segments.
    pub fn parse(repository: &str, blob_type: &str, name: &str) -> crate::Result<Self> {
        Ok(Self::blob(
            repository.parse()?,
            blob_type.parse()?,
            name.parse()?,
        ))
    }

    pub fn repository(&self) -> &RepositoryName {
        &self.repository
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// The blob type, or `None` for the config object.
    pub fn blob_type(&self) -> Option<BlobType> {
        match &self.kind {
            ObjectKind::Config => None,
            ObjectKind::Blob { blob_type, .. } => Some(*blob_type),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self.kind, ObjectKind::Config)
    }

    /// Bucket holding this object.
    pub fn bucket(&self) -> &str {
        self.repository.as_str()
    }

    /// Key of this object inside its bucket.
    pub fn object_key(&self) -> String {
        match &self.kind {
            ObjectKind::Config => CONFIG_KEY.to_string(),
            ObjectKind::Blob { blob_type, name } => format!("{blob_type}/{name}"),
        }
    }

    /// Label used for metrics and logs: the blob type or `config`.
    pub fn type_label(&self) -> &'static str {
        match &self.kind {
            ObjectKind::Config => CONFIG_KEY,
            ObjectKind::Blob { blob_type, .. } => blob_type.as_str(),
        }
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repository, self.object_key())
    }
}
